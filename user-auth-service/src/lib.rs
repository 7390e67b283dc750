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
mod http;
mod user_store;

use std::{io, sync::Arc};

use delegation_api_types::{delegate, login, register, validate};
use delegation_issuer::DelegationIssuer;
use error::Error;
use http_common::Connector;
use tokio::task::JoinHandle;
use trust_core_config::HttpServerConfig;
use user_store::UserStore;

const SOCKET_DEFAULT_PERMISSION: u32 = 0o660;

/// Starts the user-auth shell's HTTP facade (spec §6): account registration,
/// login, and the Delegation Issuer's own `/auth/delegate` + `/auth/validate`
/// surface, hosted from the same process since `issuer_workload_name`
/// defaults to `"user-auth"` — the issuer's `iss`/`sub` identity and this
/// shell's own identity are one and the same. Mirrors
/// `workload_api_service::start_workload_api`'s `Connector::Tcp` +
/// `incoming().serve()` shape.
pub async fn start_user_auth_service(
    config: &HttpServerConfig,
    issuer: Arc<DelegationIssuer>,
) -> Result<JoinHandle<Result<(), io::Error>>, io::Error> {
    let api = Api {
        issuer,
        users: Arc::new(UserStore::new()),
    };
    let service = http::Service { api };

    let connector = Connector::Tcp {
        host: config.address.clone(),
        port: config.port,
    };

    let mut incoming = connector.incoming(SOCKET_DEFAULT_PERMISSION, None).await?;

    Ok(tokio::spawn(async move {
        let (_shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        log::info!("Starting user-auth service");
        let res = incoming.serve(service, shutdown_rx).await;
        if let Err(err) = res {
            log::error!("Closing user-auth service: {:?}", err);
        } else {
            log::info!("Closing user-auth service");
        }

        Ok(())
    }))
}

pub mod uri {
    pub const REGISTER: &str = "/auth/register";
    pub const LOGIN: &str = "/auth/login";
    pub const DELEGATE: &str = "/auth/delegate";
    pub const VALIDATE: &str = "/auth/validate";
}

#[derive(Clone)]
struct Api {
    issuer: Arc<DelegationIssuer>,
    users: Arc<UserStore>,
}

impl Api {
    /// `POST /auth/register`.
    async fn register(&self, req: register::Request) -> Result<register::Response, Error> {
        let user_id = self.users.register(&req.username, &req.email, &req.password)?;
        Ok(register::Response { user_id })
    }

    /// `POST /auth/login`. The returned `access_token` is a User Session
    /// Token (spec §3), minted through the same header/claims/signature
    /// pipeline the Delegation Issuer uses for delegation tokens, with no
    /// audience.
    async fn login(&self, req: login::Request) -> Result<login::Response, Error> {
        let user_id = self.users.authenticate(&req.username, &req.password)?;
        let access_token = self.issuer.mint_user_session_token(user_id)?;
        Ok(login::Response { access_token })
    }

    /// `POST /auth/delegate`. `bearer_token` is the caller's User Session
    /// Token, carried as a query parameter per the established convention
    /// (see `http::delegate::Route`). An `userId` in the body must match the
    /// session's own subject; it exists so a caller can assert who it is
    /// delegating on behalf of without a second round trip, not to delegate
    /// for someone else.
    async fn delegate(
        &self,
        bearer_token: &str,
        req: delegate::Request,
    ) -> Result<delegate::Response, Error> {
        if req.target_service.is_empty() {
            return Err(Error::MalformedRequest("targetService must not be empty"));
        }

        let session = self
            .issuer
            .verify_user_session_token(bearer_token)
            .map_err(|_| Error::Unauthenticated)?;

        if let Some(user_id) = req.user_id {
            if user_id != session.sub {
                return Err(Error::UserMismatch);
            }
        }

        let (delegation_token, expires_in) = self.issuer.mint_delegation_token(
            session.sub,
            &req.target_service,
            req.permissions,
            req.ttl_seconds,
        )?;

        Ok(delegate::Response {
            delegation_token,
            expires_in,
        })
    }

    /// `POST /auth/validate`. Always answers with 200; a bad token is a
    /// `{valid: false, error}` body, not an HTTP error, per spec §6.
    async fn validate(&self, req: validate::Request) -> validate::Response {
        match self.issuer.verify_delegation_token(&req.token) {
            Ok(claims) => validate::Response::Valid {
                valid: true,
                token: validate::ValidatedToken {
                    user_id: claims.user_id,
                    permissions: claims.permissions,
                    audience: vec![claims.aud.to_string()],
                    expires_at: claims.exp,
                },
            },
            Err(err) => validate::Response::Invalid {
                valid: false,
                error: err.to_string(),
            },
        }
    }
}
