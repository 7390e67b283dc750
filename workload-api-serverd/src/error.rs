// Copyright (c) Microsoft. All rights reserved.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("error parsing config: {0}")]
    ErrorParsingConfig(#[source] std::io::Error),
    #[error("error initializing the CA: {0}")]
    CaInit(#[from] ca_core::error::Error),
    #[error("error starting the Workload API HTTP listener: {0}")]
    StartServer(#[source] std::io::Error),
}
