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

use std::{io, sync::Arc};

use attestation_registry::AttestationRegistry;
use ca_core::CaCore;
use core_objects::AttestationProof;
use error::Error;
use http_common::Connector;
use tokio::task::JoinHandle;
use trust_core_config::HttpServerConfig;
use uuid::Uuid;
use workload_api_types::{attest, certificates, health};

const SOCKET_DEFAULT_PERMISSION: u32 = 0o660;

/// Starts the Workload API's HTTP facade (spec §4.3): attestation, SVID
/// issuance, health. Mirrors `server_api::start_server_api`'s
/// `Connector::Tcp` + `incoming().serve()` shape, generalized from a
/// Unix-socket admin surface to a plain-HTTP listener every workload's
/// Identity Agent dials.
pub async fn start_workload_api(
    config: &HttpServerConfig,
    ca: Arc<CaCore>,
    registry: Arc<AttestationRegistry>,
) -> Result<JoinHandle<Result<(), io::Error>>, io::Error> {
    let api = Api { ca, registry };
    let service = http::Service { api };

    let connector = Connector::Tcp {
        host: config.address.clone(),
        port: config.port,
    };

    let mut incoming = connector.incoming(SOCKET_DEFAULT_PERMISSION, None).await?;

    Ok(tokio::spawn(async move {
        let (_shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        log::info!("Starting Workload API");
        let res = incoming.serve(service, shutdown_rx).await;
        if let Err(err) = res {
            log::error!("Closing Workload API: {:?}", err);
        } else {
            log::info!("Closing Workload API");
        }

        Ok(())
    }))
}

pub mod uri {
    pub const ATTEST: &str = "/workload/v1/attest";
    pub const CERTIFICATES: &str = "/workload/v1/certificates";
    pub const HEALTH: &str = "/workload/v1/health";
}

#[derive(Clone)]
struct Api {
    ca: Arc<CaCore>,
    registry: Arc<AttestationRegistry>,
}

impl Api {
    /// `POST /workload/v1/attest`. Never reveals why a proof was rejected
    /// beyond the generic 401 the route layer maps [`Error::AttestationDenied`]
    /// to; the registry's own error is only ever logged.
    async fn attest(&self, req: attest::Request) -> Result<attest::Response, Error> {
        if req.service_name.is_empty() {
            return Err(Error::MalformedRequest("service_name must not be empty"));
        }

        match &req.attestation_proof {
            AttestationProof::StaticSecret { token } if token.is_empty() => {
                return Err(Error::MalformedRequest("attestation_proof.token must not be empty"));
            }
            _ => {}
        }

        let ticket_id = self.registry.attest(&req.attestation_proof).await.map_err(|err| {
            log::warn!("attestation denied for service {}: {err}", req.service_name);
            Error::AttestationDenied(err)
        })?;

        Ok(attest::Response {
            token: ticket_id.to_string(),
        })
    }

    /// `GET /workload/v1/certificates`. Redeems the ticket against the
    /// claimed `service_name` and, on success, mints a fresh key pair and
    /// an SVID for it. The response carries private key material exactly
    /// once and must never be logged (spec §4.3).
    async fn certificates(
        &self,
        service_name: &str,
        ticket: &str,
    ) -> Result<certificates::Response, Error> {
        if service_name.is_empty() {
            return Err(Error::MalformedRequest("service_name is required"));
        }

        let ticket_id: Uuid = ticket.parse().map_err(|_| Error::TicketInvalid)?;

        let spiffe_id = self.registry.redeem_ticket(ticket_id).map_err(|_| Error::TicketInvalid)?;

        if spiffe_id.path != service_name {
            return Err(Error::TicketInvalid);
        }

        let bundle = self.ca.issue_svid(&spiffe_id, None).await.map_err(Error::Signing)?;

        Ok(certificates::Response {
            svid: certificates::Svid {
                cert: bundle.certificate_pem,
                key: bundle.private_key_pem,
                spiffe_id: bundle.spiffe_id.to_string(),
            },
            ca_certs: bundle.ca_chain_pem,
            expires_at: bundle.expires_at,
            ttl: bundle.ttl_seconds,
        })
    }

    async fn health(&self) -> health::Response {
        health::Response::default()
    }
}
