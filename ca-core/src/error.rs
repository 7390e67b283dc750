// Copyright (c) Microsoft. All rights reserved.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("error loading or creating the CA key pair {0}")]
    KeyStore(Box<dyn std::error::Error + Send>),
    #[error("openssl error {0}")]
    Openssl(#[from] openssl::error::ErrorStack),
    #[error("error reading CA certificate from disk {0}")]
    CertRead(std::io::Error),
    #[error("error writing CA certificate to disk {0}")]
    CertWrite(std::io::Error),
    #[error("CA certificate is unreadable PEM: {0}")]
    CertParse(openssl::error::ErrorStack),
}
