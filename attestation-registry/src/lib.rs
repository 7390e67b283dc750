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
pub mod static_secret;

use std::{collections::HashMap, sync::Arc};

use core_objects::{get_epoch_time, AttestationProof, SpiffeId};
use error::Error;
use parking_lot::RwLock;
use trust_core_config::AttestationRegistryConfig;
use uuid::Uuid;

/// One attestation scheme's verdict on a presented proof.
#[async_trait::async_trait]
pub trait AttestationScheme: Sync + Send {
    async fn attest(&self, proof: &AttestationProof) -> Result<SpiffeId, Error>;
}

pub struct AttestationSchemeFactory {}

impl AttestationSchemeFactory {
    #[must_use]
    pub fn get(config: &AttestationRegistryConfig, trust_domain: &str) -> AttestationSchemes {
        AttestationSchemes {
            static_secret: Arc::new(static_secret::StaticSecretScheme::new(
                trust_domain,
                config.static_secrets.clone(),
            )),
        }
    }
}

/// All schemes this build knows how to dispatch to. Unimplemented schemes
/// (`ServiceAccountToken`, `CloudInstanceIdentity`, `ProcessAuthority`) are
/// not modeled here at all: `AttestationRegistry::attest` matches on the
/// `AttestationProof` tag directly and panics with `unimplemented!()` for
/// those variants, the same way the teacher's node-attestation factory
/// panics on configuration variants with no driver.
pub struct AttestationSchemes {
    static_secret: Arc<dyn AttestationScheme>,
}

struct Ticket {
    spiffe_id: SpiffeId,
    expires_at: u64,
}

/// Accepts attestation proofs, issues short-lived single-use tickets for
/// the ones it accepts, and redeems tickets for the Workload API to trade
/// for an SVID. The ticket map is a plain in-memory table: it is not meant
/// to survive a process restart, and expired entries are reaped lazily on
/// the next `attest`/`redeem_ticket` call rather than by a background timer.
pub struct AttestationRegistry {
    schemes: AttestationSchemes,
    ticket_ttl_seconds: u64,
    tickets: RwLock<HashMap<Uuid, Ticket>>,
}

impl AttestationRegistry {
    #[must_use]
    pub fn new(config: &AttestationRegistryConfig, trust_domain: &str) -> Self {
        AttestationRegistry {
            schemes: AttestationSchemeFactory::get(config, trust_domain),
            ticket_ttl_seconds: config.ticket_ttl_seconds,
            tickets: RwLock::new(HashMap::new()),
        }
    }

    /// Validates `proof` against the scheme it names and, on success, mints
    /// a ticket the caller can redeem exactly once for the attested identity.
    pub async fn attest(&self, proof: &AttestationProof) -> Result<Uuid, Error> {
        let spiffe_id = match proof {
            AttestationProof::StaticSecret { .. } => self.schemes.static_secret.attest(proof).await?,
            AttestationProof::ServiceAccountToken { .. } => {
                unimplemented!("service account token attestation has no driver in this build")
            }
            AttestationProof::CloudInstanceIdentity { .. } => {
                unimplemented!("cloud instance identity attestation has no driver in this build")
            }
            AttestationProof::ProcessAuthority { .. } => {
                unimplemented!("process authority attestation has no driver in this build")
            }
        };

        let ticket_id = Uuid::new_v4();
        let expires_at = get_epoch_time() + self.ticket_ttl_seconds;

        let mut tickets = self.tickets.write();
        evict_expired(&mut tickets);
        tickets.insert(
            ticket_id,
            Ticket {
                spiffe_id,
                expires_at,
            },
        );

        Ok(ticket_id)
    }

    /// Consumes the ticket: a second redemption of the same id fails with
    /// [`Error::TicketNotFound`], whether or not it has also expired.
    pub fn redeem_ticket(&self, ticket_id: Uuid) -> Result<SpiffeId, Error> {
        let mut tickets = self.tickets.write();
        evict_expired(&mut tickets);

        let ticket = tickets.remove(&ticket_id).ok_or(Error::TicketNotFound)?;

        if ticket.expires_at <= get_epoch_time() {
            return Err(Error::TicketExpired);
        }

        Ok(ticket.spiffe_id)
    }
}

fn evict_expired(tickets: &mut HashMap<Uuid, Ticket>) {
    let now = get_epoch_time();
    tickets.retain(|_, ticket| ticket.expires_at > now);
}
