// Copyright (c) Microsoft. All rights reserved.

#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_safety_doc,
    clippy::default_trait_access,
    clippy::let_unit_value,
    clippy::missing_errors_doc,
    clippy::similar_names,
    clippy::too_many_lines,
    clippy::missing_panics_doc
)]

use std::sync::Arc;

use core_objects::KeyType;
use openssl::pkey::{PKey, Private, Public};
use trust_core_config::KeyStoreConfig;

pub mod disk;

pub struct KeyStoreFactory {}

impl KeyStoreFactory {
    #[must_use]
    pub fn get(config: &KeyStoreConfig) -> Arc<dyn KeyStore> {
        match config {
            KeyStoreConfig::Disk(config) => Arc::new(disk::KeyStore::new(config)),
            KeyStoreConfig::Memory() => unimplemented!(
                "in-memory key store is reserved for tests that construct one directly"
            ),
        }
    }
}

/// Plugin point for where private keys live. The disk variant is the only
/// one backed by a driver; HSM- or secret-manager-backed stores are a
/// deployment decision this crate doesn't make for its caller.
#[async_trait::async_trait]
pub trait KeyStore: Sync + Send {
    async fn create_key_pair_if_not_exists(
        &self,
        id: &str,
        key_type: KeyType,
    ) -> Result<PKey<Public>, Box<dyn std::error::Error + Send>>;

    /// Raw signature over `digest` using the named key. Used by callers that
    /// sign opaque payloads (delegation tokens, bundle checksums) rather than
    /// building an X.509 structure.
    async fn sign(
        &self,
        id: &str,
        key_type: KeyType,
        digest: &[u8],
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send>>;

    async fn get_public_key(
        &self,
        id: &str,
    ) -> Result<PKey<Public>, Box<dyn std::error::Error + Send>>;

    /// Returns the raw PEM-encoded private key. The CA core loads it back
    /// into a [`PKey<Private>`] to drive [`openssl::x509::X509Builder`]
    /// directly, since certificate signing isn't expressible through the
    /// opaque `sign` method above.
    async fn get_private_key_pem(
        &self,
        id: &str,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send>>;

    async fn delete_key_pair(&self, id: &str) -> Result<(), Box<dyn std::error::Error + Send>>;
}

/// Convenience used by callers that need the typed private key rather than
/// its PEM bytes.
pub async fn load_private_key(
    store: &dyn KeyStore,
    id: &str,
) -> Result<PKey<Private>, Box<dyn std::error::Error + Send>> {
    let pem = store.get_private_key_pem(id).await?;
    PKey::private_key_from_pem(&pem).map_err(|err| Box::new(err) as _)
}
