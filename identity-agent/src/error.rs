// Copyright (c) Microsoft. All rights reserved.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("could not parse workload API address: {0}")]
    InvalidAddress(url::ParseError),

    #[error("could not build a connector to the workload API: {0}")]
    Connector(String),

    #[error("attestation with the workload API failed after retrying: {0}")]
    Attest(#[source] Box<dyn std::error::Error + Send>),

    #[error("fetching a certificate bundle from the workload API failed: {0}")]
    Certificates(#[source] Box<dyn std::error::Error + Send>),

    #[error("failed to fetch an SVID bundle after retrying: {0}")]
    Bootstrap(#[source] Box<dyn std::error::Error + Send>),

    #[error("workload API returned a certificate bundle that failed to parse")]
    MalformedBundle,

    #[error("workload API call timed out")]
    Timeout,
}

impl From<http_common::ConnectorError> for Error {
    fn from(err: http_common::ConnectorError) -> Self {
        Error::Connector(format!("{err}"))
    }
}
