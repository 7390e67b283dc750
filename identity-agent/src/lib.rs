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
pub mod http;

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
#[cfg(feature = "tests")]
use mockall::automock;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use zeroize::Zeroize;

use core_objects::{AttestationProof, SvidBundle};
use error::Error;
use trust_core_config::IdentityAgentConfig;

/// Seam the agent attests and fetches certificates through. Grounded on
/// `spiffe-server-client::Client`: a plain async trait so the bootstrap and
/// rotation logic below can be unit-tested against a `mockall`-generated
/// double instead of a real workload API process.
#[cfg_attr(feature = "tests", automock)]
#[async_trait::async_trait]
pub trait WorkloadApiClient: Sync + Send {
    async fn attest(
        &self,
        service_name: &str,
        proof: AttestationProof,
    ) -> Result<String, Box<dyn std::error::Error + Send>>;

    async fn fetch_certificates(
        &self,
        service_name: &str,
        ticket: &str,
    ) -> Result<workload_api_types::certificates::Response, Box<dyn std::error::Error + Send>>;
}

/// Client-side counterpart of the Workload API: attests once at startup,
/// holds the resulting SVID bundle in memory, and keeps it fresh on a
/// rotation timer. Spec §4.4.
///
/// `current()`'s fast path is a single atomic pointer load — no lock is ever
/// taken on a reader's path, the way `ArcSwapOption` is meant to be used.
/// Bundle replacement during rotation goes through the same pointer, so a
/// reader either sees the old bundle or the new one in full, never a mix of
/// the two (the ordering guarantee spec §5 asks for).
pub struct IdentityAgent {
    client: Arc<dyn WorkloadApiClient>,
    workload_name: String,
    attestation_secret: String,
    rotation_fraction: f64,
    current: ArcSwapOption<SvidBundle>,
    rotation_task: Mutex<Option<JoinHandle<()>>>,
}

impl IdentityAgent {
    /// Attests, fetches the first SVID bundle (retrying with the bounded
    /// backoff loop `TrustBundleManager::get_init_trust_bundle` uses), and
    /// spawns the background rotation task. Returns an `Arc` because the
    /// rotation task needs to outlive the caller's stack frame.
    pub async fn start(
        config: &IdentityAgentConfig,
        client: Arc<dyn WorkloadApiClient>,
    ) -> Result<Arc<Self>, Error> {
        let bundle = bootstrap(
            client.as_ref(),
            &config.workload_name,
            &config.attestation_secret,
            config.server_client.max_retry,
            config.server_client.wait_retry_sec,
        )
        .await?;

        let agent = Arc::new(IdentityAgent {
            client,
            workload_name: config.workload_name.clone(),
            attestation_secret: config.attestation_secret.clone(),
            rotation_fraction: config.rotation.rotation_fraction,
            current: ArcSwapOption::from(Some(Arc::new(bundle))),
            rotation_task: Mutex::new(None),
        });

        let rotation_handle = tokio::spawn(Arc::clone(&agent).rotate_periodic());
        *agent.rotation_task.lock().await = Some(rotation_handle);

        Ok(agent)
    }

    /// Returns the current SVID bundle, never an expired one.
    ///
    /// The fast path is a single atomic pointer load. Once the bundle is past
    /// its rotation threshold (the point `rotate_periodic` would itself wake
    /// up at) this makes one synchronous refresh attempt first, so a caller
    /// racing the background task still sees a fresh bundle instead of
    /// waiting out `rotate_periodic`'s own sleep. If the bundle has actually
    /// expired and the refresh attempt (if any) didn't succeed, this clears
    /// the stored bundle and reports `None` instead of handing out stale key
    /// material.
    pub async fn current(&self) -> Option<Arc<SvidBundle>> {
        let bundle = self.current.load_full()?;
        let now = core_objects::get_epoch_time();

        if rotation_delay(bundle.issued_at, bundle.expires_at, self.rotation_fraction).is_zero()
            && now < bundle.expires_at
        {
            match attest_and_fetch(self.client.as_ref(), &self.workload_name, &self.attestation_secret).await {
                Ok(fresh) => {
                    let fresh = Arc::new(fresh);
                    self.current.store(Some(Arc::clone(&fresh)));
                    return Some(fresh);
                }
                Err(err) => log::warn!(
                    "synchronous SVID refresh failed for {}, falling back to the still-valid current bundle: {err}",
                    self.workload_name
                ),
            }
        }

        if now >= bundle.expires_at {
            // Best-effort: if a concurrent rotation already replaced the slot,
            // this clears the fresh bundle instead, same race `stop()` accepts.
            self.current.store(None);
            return None;
        }

        Some(bundle)
    }

    /// Aborts the rotation task and clears the in-memory bundle, best-effort
    /// zeroizing the private key material first. "Best-effort" because the
    /// bundle is reference-counted: if a handler is mid-request holding its
    /// own `Arc` to it, that copy's key bytes outlive `stop()` until the
    /// handler drops it, which is both unavoidable and harmless (the bundle
    /// only ever lived in process memory anyway).
    pub async fn stop(&self) {
        if let Some(handle) = self.rotation_task.lock().await.take() {
            handle.abort();
        }

        if let Some(mut bundle) = self.current.swap(None).and_then(|arc| Arc::try_unwrap(arc).ok()) {
            bundle.private_key_pem.zeroize();
        }
    }

    async fn rotate_periodic(self: Arc<Self>) {
        loop {
            let Some(bundle) = self.current.load_full() else {
                return;
            };

            let sleep_for = rotation_delay(bundle.issued_at, bundle.expires_at, self.rotation_fraction);
            sleep(sleep_for).await;

            match attest_and_fetch(
                self.client.as_ref(),
                &self.workload_name,
                &self.attestation_secret,
            )
            .await
            {
                Ok(fresh) => self.current.store(Some(Arc::new(fresh))),
                Err(err) => {
                    log::error!(
                        "SVID rotation failed for {}, keeping current bundle until it expires: {err}",
                        self.workload_name
                    );
                    // Back off briefly rather than busy-looping against an unreachable workload API.
                    sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }
}

/// How long to sleep before the next rotation attempt: `rotation_fraction`
/// of the bundle's lifetime, measured from issuance, clamped to never be
/// negative if the bundle is already past that point (rotate immediately).
fn rotation_delay(issued_at: u64, expires_at: u64, rotation_fraction: f64) -> Duration {
    let lifetime = expires_at.saturating_sub(issued_at);
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let rotate_after = (lifetime as f64 * rotation_fraction) as u64;
    let rotate_at = issued_at + rotate_after;
    let now = core_objects::get_epoch_time();
    Duration::from_secs(rotate_at.saturating_sub(now))
}

async fn attest_and_fetch(
    client: &dyn WorkloadApiClient,
    workload_name: &str,
    attestation_secret: &str,
) -> Result<SvidBundle, Error> {
    let proof = AttestationProof::StaticSecret {
        token: attestation_secret.to_string(),
    };
    let ticket = client
        .attest(workload_name, proof)
        .await
        .map_err(Error::Attest)?;

    let response = client
        .fetch_certificates(workload_name, &ticket)
        .await
        .map_err(Error::Certificates)?;

    let spiffe_id: core_objects::SpiffeId = response
        .svid
        .spiffe_id
        .parse()
        .map_err(|_| Error::MalformedBundle)?;

    Ok(SvidBundle {
        spiffe_id,
        certificate_pem: response.svid.cert,
        private_key_pem: response.svid.key,
        ca_chain_pem: response.ca_certs,
        issued_at: core_objects::get_epoch_time(),
        expires_at: response.expires_at,
        ttl_seconds: response.ttl,
    })
}

async fn bootstrap(
    client: &dyn WorkloadApiClient,
    workload_name: &str,
    attestation_secret: &str,
    max_retry: usize,
    wait_retry_sec: u64,
) -> Result<SvidBundle, Error> {
    log::info!("bootstrapping SVID for {workload_name}");
    let mut retry = 0;

    loop {
        match attest_and_fetch(client, workload_name, attestation_secret).await {
            Ok(bundle) => return Ok(bundle),
            Err(err) => {
                if retry >= max_retry {
                    return Err(Error::Bootstrap(Box::new(err)));
                }
                retry += 1;
                log::warn!(
                    "failed to bootstrap SVID for {workload_name}: {err}, retrying {retry} out of {max_retry}"
                );
                sleep(Duration::from_secs(wait_retry_sec)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workload_api_types::certificates::{Response as CertificatesResponse, Svid};

    fn config() -> IdentityAgentConfig {
        IdentityAgentConfig {
            trust_domain: "example.org".to_string(),
            workload_name: "print-service".to_string(),
            attestation_secret: "pre-shared-secret".to_string(),
            server_client: trust_core_config::WorkloadApiClientConfig {
                address: "127.0.0.1".to_string(),
                port: 8080,
                max_retry: 3,
                wait_retry_sec: 0,
            },
            rotation: trust_core_config::RotationConfig {
                rotation_fraction: 0.8,
            },
            mtls_port: 8443,
        }
    }

    fn certificates_response() -> CertificatesResponse {
        CertificatesResponse {
            svid: Svid {
                cert: "cert-pem".to_string(),
                key: "key-pem".to_string(),
                spiffe_id: "spiffe://example.org/print-service".to_string(),
            },
            ca_certs: vec!["ca-pem".to_string()],
            expires_at: core_objects::get_epoch_time() + 3600,
            ttl: 3600,
        }
    }

    #[tokio::test]
    async fn start_bootstraps_and_exposes_the_current_bundle() {
        let mut mock_client = MockWorkloadApiClient::new();
        mock_client
            .expect_attest()
            .return_once(|_, _| Ok("ticket-123".to_string()));
        mock_client
            .expect_fetch_certificates()
            .return_once(|_, _| Ok(certificates_response()));

        let agent = IdentityAgent::start(&config(), Arc::new(mock_client))
            .await
            .unwrap();

        let bundle = agent.current().await.unwrap();
        assert_eq!(bundle.spiffe_id.to_string(), "spiffe://example.org/print-service");

        agent.stop().await;
        assert!(agent.current().await.is_none());
    }

    #[tokio::test]
    async fn start_retries_bootstrap_then_gives_up() {
        let mut mock_client = MockWorkloadApiClient::new();
        mock_client
            .expect_attest()
            .times(4)
            .returning(|_, _| Err(Box::new(std::io::Error::other("unreachable")) as _));

        let mut cfg = config();
        cfg.server_client.max_retry = 3;
        cfg.server_client.wait_retry_sec = 0;

        let error = IdentityAgent::start(&cfg, Arc::new(mock_client))
            .await
            .unwrap_err();
        matches::assert_matches!(error, Error::Bootstrap(_));
    }

    #[tokio::test]
    async fn current_refreshes_synchronously_past_the_rotation_threshold() {
        let mut mock_client = MockWorkloadApiClient::new();
        mock_client
            .expect_attest()
            .times(1)
            .returning(|_, _| Ok("ticket-bootstrap".to_string()));
        mock_client
            .expect_fetch_certificates()
            .times(1)
            .returning(|_, _| Ok(certificates_response()));
        mock_client
            .expect_attest()
            .times(1)
            .returning(|_, _| Ok("ticket-refresh".to_string()));
        mock_client
            .expect_fetch_certificates()
            .times(1)
            .returning(|_, _| {
                let mut response = certificates_response();
                response.svid.spiffe_id = "spiffe://example.org/print-service-refreshed".to_string();
                Ok(response)
            });

        let mut cfg = config();
        cfg.rotation.rotation_fraction = 0.0;

        let agent = IdentityAgent::start(&cfg, Arc::new(mock_client))
            .await
            .unwrap();

        let bundle = agent.current().await.unwrap();
        assert_eq!(
            bundle.spiffe_id.to_string(),
            "spiffe://example.org/print-service-refreshed"
        );
    }

    #[tokio::test]
    async fn current_clears_an_expired_bundle_with_no_successful_refresh() {
        let mut mock_client = MockWorkloadApiClient::new();
        mock_client
            .expect_attest()
            .times(1)
            .returning(|_, _| Ok("ticket-bootstrap".to_string()));
        mock_client.expect_fetch_certificates().times(1).returning(|_, _| {
            let mut response = certificates_response();
            response.expires_at = core_objects::get_epoch_time();
            Ok(response)
        });

        let agent = IdentityAgent::start(&config(), Arc::new(mock_client))
            .await
            .unwrap();

        assert!(agent.current().await.is_none());
    }

    #[test]
    fn rotation_delay_is_a_fraction_of_remaining_lifetime() {
        let now = core_objects::get_epoch_time();
        let delay = rotation_delay(now, now + 100, 0.8);
        // rotate_at = now + 80, so delay should be roughly 80s (minus test execution drift).
        assert!(delay.as_secs() <= 80);
    }

    #[test]
    fn rotation_delay_is_zero_once_past_the_threshold() {
        let now = core_objects::get_epoch_time();
        let delay = rotation_delay(now - 1000, now - 100, 0.8);
        assert_eq!(delay.as_secs(), 0);
    }
}
