// Copyright (c) Microsoft. All rights reserved.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("delegation token is invalid")]
    TokenInvalid,
    #[error("delegation token audience does not match this workload")]
    AudienceMismatch,
    #[error("remote validation call failed {0}")]
    RemoteCall(Box<dyn std::error::Error + Send + Sync>),
}
