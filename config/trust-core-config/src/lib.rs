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

use std::{fs, io, path::Path};

/// Top-level configuration for the Workload API / CA process (`trust-cored`).
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct TrustCoreServerConfig {
    pub trust_domain: String,

    #[serde(alias = "server-config")]
    pub server: HttpServerConfig,
    #[serde(alias = "key-store-config")]
    pub key_store: KeyStoreConfig,
    #[serde(alias = "ca-config", default = "default_ca_config")]
    pub ca: CaConfig,
    #[serde(
        alias = "attestation-registry-config",
        default = "default_attestation_registry_config"
    )]
    pub attestation_registry: AttestationRegistryConfig,
}

impl TrustCoreServerConfig {
    pub fn load_config(filename: impl AsRef<Path>) -> Result<Self, io::Error> {
        let config = fs::read_to_string(&filename)?;
        let config = toml::from_str(&config)?;
        Ok(config)
    }
}

/// Configuration for the Identity Agent process (`identity-agentd`).
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct IdentityAgentConfig {
    pub trust_domain: String,
    pub workload_name: String,

    /// Pre-shared token presented to the Attestation Registry's static-secret
    /// scheme. Stronger schemes (§4.2) are not yet wired into the agent.
    #[serde(alias = "attestation-secret")]
    pub attestation_secret: String,

    #[serde(alias = "server-client-config")]
    pub server_client: WorkloadApiClientConfig,
    #[serde(
        alias = "rotation-config",
        default = "default_rotation_config"
    )]
    pub rotation: RotationConfig,

    /// Port the workload's mTLS listener binds, distinct from whatever plain
    /// HTTP port its Auth Filter path uses (spec §6's `mtls_port`).
    #[serde(alias = "mtls-port", default = "default_mtls_port")]
    pub mtls_port: u16,
}

impl IdentityAgentConfig {
    pub fn load_config(filename: impl AsRef<Path>) -> Result<Self, io::Error> {
        let config = fs::read_to_string(&filename)?;
        let config = toml::from_str(&config)?;
        Ok(config)
    }
}

/// Configuration for the Delegation Token Service process (`delegation-issuerd`).
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct DelegationIssuerConfig {
    pub trust_domain: String,
    /// Identity the issuer signs delegation tokens as (`iss` and `sub`).
    #[serde(
        alias = "issuer-workload-name",
        default = "default_issuer_workload_name"
    )]
    pub issuer_workload_name: String,

    #[serde(alias = "server-config")]
    pub server: HttpServerConfig,
    #[serde(alias = "signing-config")]
    pub signing: DelegationSigningConfig,
    #[serde(
        alias = "user-session-ttl-seconds",
        default = "default_user_session_ttl_seconds"
    )]
    pub user_session_ttl_seconds: u64,
}

fn default_issuer_workload_name() -> String {
    "user-auth".to_string()
}

impl DelegationIssuerConfig {
    pub fn load_config(filename: impl AsRef<Path>) -> Result<Self, io::Error> {
        let config = fs::read_to_string(&filename)?;
        let config = toml::from_str(&config)?;
        Ok(config)
    }
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct HttpServerConfig {
    pub address: String,
    pub port: u16,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct WorkloadApiClientConfig {
    pub address: String,
    pub port: u16,
    #[serde(default = "default_max_retry")]
    pub max_retry: usize,
    #[serde(default = "default_wait_retry_sec")]
    pub wait_retry_sec: u64,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct RotationConfig {
    /// Fraction of the SVID's TTL elapsed before a rotation is scheduled.
    #[serde(default = "default_rotation_fraction")]
    pub rotation_fraction: f64,
}

fn default_rotation_config() -> RotationConfig {
    RotationConfig {
        rotation_fraction: default_rotation_fraction(),
    }
}

fn default_rotation_fraction() -> f64 {
    0.8
}

fn default_max_retry() -> usize {
    3
}

fn default_wait_retry_sec() -> u64 {
    2
}

fn default_user_session_ttl_seconds() -> u64 {
    3600
}

fn default_mtls_port() -> u16 {
    8443
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum KeyStoreConfig {
    Disk(KeyStoreConfigDisk),
    Memory(),
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct KeyStoreConfigDisk {
    pub key_base_path: String,
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum SecureKeyStoreConfig {
    Disk(KeyStoreConfigDisk),
    /// Reserved for an HSM/KMS-backed store. No driver ships with this crate.
    HsmStub(),
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct CaConfig {
    #[serde(default = "default_ca_key_base_path")]
    pub ca_key_base_path: String,
    #[serde(default = "default_ca_ttl_seconds")]
    pub ca_ttl_seconds: u64,
    #[serde(default = "default_svid_ttl_seconds")]
    pub svid_ttl_seconds: u64,
    #[serde(default = "default_rsa_key_bits")]
    pub rsa_key_bits: u32,
}

fn default_ca_config() -> CaConfig {
    CaConfig {
        ca_key_base_path: default_ca_key_base_path(),
        ca_ttl_seconds: default_ca_ttl_seconds(),
        svid_ttl_seconds: default_svid_ttl_seconds(),
        rsa_key_bits: default_rsa_key_bits(),
    }
}

fn default_ca_key_base_path() -> String {
    "/var/lib/trust-core/ca".to_string()
}

fn default_ca_ttl_seconds() -> u64 {
    365 * 24 * 3600
}

fn default_svid_ttl_seconds() -> u64 {
    3600
}

fn default_rsa_key_bits() -> u32 {
    2048
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct AttestationRegistryConfig {
    #[serde(default = "default_ticket_ttl_seconds")]
    pub ticket_ttl_seconds: u64,
    /// Static-secret scheme: maps a pre-shared token to the workload path it
    /// attests (joined to the trust domain to form the resulting SPIFFE ID).
    #[serde(default)]
    pub static_secrets: std::collections::BTreeMap<String, String>,
}

fn default_attestation_registry_config() -> AttestationRegistryConfig {
    AttestationRegistryConfig {
        ticket_ttl_seconds: default_ticket_ttl_seconds(),
        static_secrets: std::collections::BTreeMap::new(),
    }
}

fn default_ticket_ttl_seconds() -> u64 {
    60
}

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct DelegationSigningConfig {
    pub secret: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: core_objects::SigningAlgorithm,
    #[serde(default = "default_delegation_ttl_seconds")]
    pub delegation_ttl_seconds: u64,
}

fn default_algorithm() -> core_objects::SigningAlgorithm {
    core_objects::SigningAlgorithm::Hs256
}

fn default_delegation_ttl_seconds() -> u64 {
    900
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_parses_minimal_toml() {
        let raw = r#"
            trust_domain = "example.org"

            [server]
            address = "0.0.0.0"
            port = 8443

            [key_store]
            type = "disk"
            content = { key_base_path = "/tmp/keys" }
        "#;

        let config: TrustCoreServerConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.trust_domain, "example.org");
        assert_eq!(config.ca.svid_ttl_seconds, default_svid_ttl_seconds());
    }

    #[test]
    fn delegation_issuer_config_applies_defaults() {
        let raw = r#"
            trust_domain = "example.org"

            [server]
            address = "0.0.0.0"
            port = 9443

            [signing]
            secret = "test-secret"
        "#;

        let config: DelegationIssuerConfig = toml::from_str(raw).unwrap();
        assert_eq!(
            config.signing.algorithm,
            core_objects::SigningAlgorithm::Hs256
        );
        assert_eq!(config.user_session_ttl_seconds, 3600);
    }
}
