// Copyright (c) Microsoft. All rights reserved.

use thiserror::Error;

/// Taxonomy kinds from spec §7, scoped to what the Workload API's three
/// routes can produce. Each variant carries its own HTTP status via
/// [`Error::status_code`]; the route handlers are the only place that
/// maps a kind to a response, so no crypto or parser detail escapes to a
/// caller (spec §7's propagation policy).
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed request: {0}")]
    MalformedRequest(&'static str),
    #[error("attestation was denied")]
    AttestationDenied(#[source] attestation_registry::error::Error),
    #[error("attestation ticket is unknown, expired, or does not match the claimed service")]
    TicketInvalid,
    #[error("certificate signing failed")]
    Signing(#[source] ca_core::error::Error),
}

impl Error {
    #[must_use]
    pub fn status_code(&self) -> hyper::StatusCode {
        match self {
            Error::MalformedRequest(_) => hyper::StatusCode::BAD_REQUEST,
            Error::AttestationDenied(_) | Error::TicketInvalid => hyper::StatusCode::UNAUTHORIZED,
            Error::Signing(_) => hyper::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
