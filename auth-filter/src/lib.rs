// Copyright (c) Microsoft. All rights reserved.

#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::default_trait_access,
    clippy::let_unit_value,
    clippy::missing_errors_doc,
    clippy::similar_names,
    clippy::too_many_lines
)]

pub mod error;

use std::{collections::BTreeSet, future::Future};

use auth_context::AuthenticationContext;
use delegation_validator::DelegationValidator;
use error::Error;

const BEARER_PREFIX: &str = "Bearer ";

/// Per-request enforcement point every non-trivial workload wires in front
/// of its handlers. Holds no per-request state itself — [`AuthFilter::admit`]
/// is called once per incoming request and returns either the context to run
/// the handler under, or the error to reject it with.
pub struct AuthFilter {
    validator: DelegationValidator,
    exempt_paths: BTreeSet<String>,
}

impl AuthFilter {
    #[must_use]
    pub fn new(validator: DelegationValidator, exempt_paths: impl IntoIterator<Item = String>) -> Self {
        AuthFilter {
            validator,
            exempt_paths: exempt_paths.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.contains(path)
    }

    /// Steps 2-4 of spec §4.7: parse the bearer token, validate it, and
    /// build the context a handler will run under. Does not itself dispatch
    /// to the handler — callers combine this with [`auth_context::scope`]
    /// (or [`AuthFilter::admit_and_run`] below) so the context provably
    /// cannot outlive the request.
    pub async fn admit(&self, authorization_header: Option<&str>) -> Result<AuthenticationContext, Error> {
        let header = authorization_header.ok_or(Error::MissingBearerToken)?;
        let token = header.strip_prefix(BEARER_PREFIX).ok_or(Error::MissingBearerToken)?;

        let outcome = self.validator.validate(token).await.map_err(|err| {
            log::warn!("rejecting delegation token: {err}");
            Error::TokenInvalid
        })?;

        Ok(AuthenticationContext {
            user_id: outcome.user_id,
            permissions: outcome.permissions,
            peer_service_identity: None,
            raw_token: token.to_string(),
        })
    }

    /// Runs `handler` scoped to the context built from `authorization_header`.
    /// The context is destroyed the moment `handler`'s future resolves,
    /// whether it returned success or failure — step 5 of spec §4.7.
    pub async fn admit_and_run<F, Fut, T>(
        &self,
        authorization_header: Option<&str>,
        handler: F,
    ) -> Result<T, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let context = self.admit(authorization_header).await?;
        Ok(auth_context::scope(context, handler()).await)
    }
}

/// The "must have at least one of {permissions}" helper spec §4.7 asks for.
/// Handlers call this (or inspect [`AuthenticationContext`] directly for
/// finer-grained checks like user-id-equality on a path parameter).
pub fn require_any_permission(context: &AuthenticationContext, permissions: &[&str]) -> Result<(), Error> {
    if context.has_any_permission(permissions) {
        Ok(())
    } else {
        Err(Error::PermissionDenied)
    }
}
