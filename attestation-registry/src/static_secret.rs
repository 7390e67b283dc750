// Copyright (c) Microsoft. All rights reserved.

use std::collections::BTreeMap;

use core_objects::{AttestationProof, SpiffeId};

use crate::{error::Error, AttestationScheme};

/// Matches a presented pre-shared token against a static table configured
/// up front. The simplest possible attestation scheme, and the only one
/// this build ships a driver for.
pub struct StaticSecretScheme {
    trust_domain: String,
    tokens: BTreeMap<String, String>,
}

impl StaticSecretScheme {
    #[must_use]
    pub fn new(trust_domain: impl Into<String>, tokens: BTreeMap<String, String>) -> Self {
        StaticSecretScheme {
            trust_domain: trust_domain.into(),
            tokens,
        }
    }
}

#[async_trait::async_trait]
impl AttestationScheme for StaticSecretScheme {
    async fn attest(&self, proof: &AttestationProof) -> Result<SpiffeId, Error> {
        let AttestationProof::StaticSecret { token } = proof else {
            return Err(Error::ProofRejected);
        };

        let path = self.tokens.get(token).ok_or(Error::ProofRejected)?;
        Ok(SpiffeId::new(self.trust_domain.clone(), path.clone()))
    }
}
