// Copyright (c) Microsoft. All rights reserved.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("error parsing config: {0}")]
    ErrorParsingConfig(#[source] std::io::Error),
    #[error("error starting the user-auth service HTTP listener: {0}")]
    StartServer(#[source] std::io::Error),
}
