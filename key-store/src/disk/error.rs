// Copyright (c) Microsoft. All rights reserved.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("key {0} not found")]
    KeyNotFound(String),
    #[error("error reading key from disk {0}")]
    FileReadError(std::io::Error),
    #[error("error writing key to disk {0}")]
    FileWrite(std::io::Error),
    #[error("error deleting key from disk {0}")]
    FileDelete(std::io::Error),
    #[error("openssl error {0}")]
    Openssl(#[from] openssl::error::ErrorStack),
    #[error("unsupported key mechanism for signing")]
    UnsupportedMechanismType(),
}
