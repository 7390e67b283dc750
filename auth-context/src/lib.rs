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

use std::collections::BTreeSet;
use std::future::Future;

use uuid::Uuid;

/// The per-request record a handler consults to make authorization
/// decisions. Carries the caller's identity and scopes plus the raw token,
/// in case a handler needs to forward it downstream unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticationContext {
    pub user_id: Uuid,
    pub permissions: BTreeSet<String>,
    pub peer_service_identity: Option<String>,
    pub raw_token: String,
}

impl AuthenticationContext {
    #[must_use]
    pub fn has_any_permission(&self, required: &[&str]) -> bool {
        required.iter().any(|p| self.permissions.contains(*p))
    }
}

tokio::task_local! {
    /// Bound for the lifetime of exactly one request via [`scope`]. Never a
    /// `thread_local!`: a work-stealing executor may resume a suspended
    /// request on a different worker thread mid-handler, and a thread-local
    /// would then observe whatever context that thread last bound, not the
    /// one the request started with.
    static AUTH_CONTEXT: AuthenticationContext;
}

/// Runs `fut` with `context` bound as the current authentication context.
/// The binding is visible to `fut` and everything it awaits, and disappears
/// the instant `fut` resolves — there is no way for a context to leak past
/// the request that created it, or for a concurrently running request to
/// observe it.
pub async fn scope<F>(context: AuthenticationContext, fut: F) -> F::Output
where
    F: Future,
{
    AUTH_CONTEXT.scope(context, fut).await
}

/// Returns the context bound by the innermost enclosing [`scope`] call, or
/// `None` if called outside one (e.g. an exempted route, or a background
/// task spawned without carrying the context forward).
pub fn current() -> Option<AuthenticationContext> {
    AUTH_CONTEXT.try_with(Clone::clone).ok()
}
