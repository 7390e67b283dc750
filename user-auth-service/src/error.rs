// Copyright (c) Microsoft. All rights reserved.

use thiserror::Error;

/// Taxonomy kinds from spec §7, scoped to the user-auth shell's four routes.
/// Each variant carries its own HTTP status via [`Error::status_code`]; no
/// argon2 or signing detail escapes past the route layer.
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed request: {0}")]
    MalformedRequest(&'static str),
    #[error("username is already registered")]
    DuplicateUsername,
    #[error("error hashing password: {0}")]
    PasswordHashing(argon2::password_hash::Error),
    #[error("invalid username or password")]
    BadCredentials,
    #[error("missing or invalid bearer session token")]
    Unauthenticated,
    #[error("session token does not belong to the requesting user")]
    UserMismatch,
    #[error("delegation token could not be minted: {0}")]
    Delegation(#[from] delegation_issuer::error::Error),
}

impl Error {
    #[must_use]
    pub fn status_code(&self) -> hyper::StatusCode {
        match self {
            Error::MalformedRequest(_) => hyper::StatusCode::BAD_REQUEST,
            Error::DuplicateUsername => hyper::StatusCode::CONFLICT,
            Error::PasswordHashing(_) => hyper::StatusCode::INTERNAL_SERVER_ERROR,
            Error::BadCredentials | Error::Unauthenticated => hyper::StatusCode::UNAUTHORIZED,
            Error::UserMismatch => hyper::StatusCode::FORBIDDEN,
            Error::Delegation(delegation_issuer::error::Error::TtlTooLarge(_, _)) => {
                hyper::StatusCode::BAD_REQUEST
            }
            Error::Delegation(_) => hyper::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
