// Copyright (c) Microsoft. All rights reserved.

use thiserror::Error;

/// Maps 1:1 onto the HTTP status the enforcement point returns; see
/// spec §4.9's fault table. `Internal` never carries detail a client should
/// see — only its `Display` is logged server-side.
#[derive(Error, Debug)]
pub enum Error {
    #[error("missing or malformed Authorization header")]
    MissingBearerToken,
    #[error("delegation token is invalid")]
    TokenInvalid,
    #[error("permission denied: caller lacks one of the required scopes")]
    PermissionDenied,
}

impl Error {
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Error::MissingBearerToken | Error::TokenInvalid => 401,
            Error::PermissionDenied => 403,
        }
    }
}
