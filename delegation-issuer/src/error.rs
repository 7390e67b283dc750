// Copyright (c) Microsoft. All rights reserved.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("error serializing token claims {0}")]
    ErrorJsonSerializing(serde_json::Error),
    #[error("error signing token {0}")]
    SigningDigest(#[from] openssl::error::ErrorStack),
    #[error("requested ttl_seconds {0} exceeds the maximum of {1}")]
    TtlTooLarge(u64, u64),
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token has expired")]
    Expired,
}
