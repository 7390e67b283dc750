// Copyright (c) Microsoft. All rights reserved.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to parse PEM certificate material")]
    CertParse,

    #[error("failed to parse PEM private key material")]
    KeyParse,

    #[error("SVID bundle did not contain a leaf certificate")]
    MissingLeafCertificate,

    #[error("no trusted root certificates were supplied")]
    MissingRoots,

    #[error("rustls rejected the supplied certificate/key material: {0}")]
    Rustls(#[from] rustls::Error),

    #[error("failed to build the client certificate verifier: {0}")]
    VerifierBuild(#[source] Box<dyn std::error::Error + Send + Sync>),
}
