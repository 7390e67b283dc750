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

use std::{collections::BTreeSet, time::Duration};

use core_objects::SpiffeId;
use delegation_api_types::validate;
use delegation_issuer::DelegationIssuer;
use error::Error;

const REMOTE_VALIDATE_TIMEOUT: Duration = Duration::from_secs(5);
const REMOTE_VALIDATE_PATH: &str = "/auth/validate";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub user_id: uuid::Uuid,
    pub permissions: BTreeSet<String>,
}

/// Verifies delegation tokens at the point of use. A sum of exactly two
/// modes — never a base class with overrides, per the redesign note this
/// crate's shape is grounded on — selected once at construction, not
/// per-call: a verifier configured with the shared secret never falls back
/// to the network, even on a non-signature local error.
pub enum DelegationValidator {
    Local {
        issuer: DelegationIssuer,
        own_identity: SpiffeId,
    },
    Remote {
        connector: http_common::Connector,
        base_url: String,
        own_identity: SpiffeId,
    },
}

impl DelegationValidator {
    #[must_use]
    pub fn local(issuer: DelegationIssuer, own_identity: SpiffeId) -> Self {
        DelegationValidator::Local {
            issuer,
            own_identity,
        }
    }

    #[must_use]
    pub fn remote(connector: http_common::Connector, base_url: String, own_identity: SpiffeId) -> Self {
        DelegationValidator::Remote {
            connector,
            base_url,
            own_identity,
        }
    }

    pub async fn validate(&self, token: &str) -> Result<ValidationOutcome, Error> {
        match self {
            DelegationValidator::Local {
                issuer,
                own_identity,
            } => {
                let claims = issuer.verify_delegation_token(token).map_err(|_| Error::TokenInvalid)?;

                if &claims.aud != own_identity {
                    return Err(Error::AudienceMismatch);
                }

                Ok(ValidationOutcome {
                    user_id: claims.user_id,
                    permissions: claims.permissions,
                })
            }

            DelegationValidator::Remote {
                connector,
                base_url,
                own_identity,
            } => {
                let uri = format!("{base_url}{REMOTE_VALIDATE_PATH}");
                let body = validate::Request {
                    token: token.to_string(),
                };
                let request = http_common::HttpRequest::post(connector.clone(), &uri, Some(body));

                let response = tokio::time::timeout(REMOTE_VALIDATE_TIMEOUT, request.json_response())
                    .await
                    .map_err(|_| Error::RemoteCall("remote validation timed out".into()))?
                    .map_err(|err| Error::RemoteCall(Box::new(err)))?;

                let response: validate::Response = response
                    .parse_expect_ok::<_, delegation_api_types::ErrorBody>()
                    .map_err(|err| Error::RemoteCall(Box::new(err)))?;

                match response {
                    validate::Response::Valid { valid: true, token } => {
                        let audience = SpiffeId::new(
                            own_identity.trust_domain.clone(),
                            own_identity.path.clone(),
                        );
                        if !token.audience.iter().any(|a| a == &audience.to_string()) {
                            return Err(Error::AudienceMismatch);
                        }

                        Ok(ValidationOutcome {
                            user_id: token.user_id,
                            permissions: token.permissions,
                        })
                    }
                    _ => Err(Error::TokenInvalid),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matches::assert_matches;
    use trust_core_config::{DelegationIssuerConfig, DelegationSigningConfig, HttpServerConfig};

    fn issuer_config() -> DelegationIssuerConfig {
        DelegationIssuerConfig {
            trust_domain: "example.org".to_string(),
            issuer_workload_name: "user-auth".to_string(),
            server: HttpServerConfig {
                address: "0.0.0.0".to_string(),
                port: 9443,
            },
            signing: DelegationSigningConfig {
                secret: "unit-test-secret-unit-test-secret".to_string(),
                algorithm: core_objects::SigningAlgorithm::Hs256,
                delegation_ttl_seconds: 900,
            },
            user_session_ttl_seconds: 3600,
        }
    }

    #[tokio::test]
    async fn local_validator_accepts_matching_audience() {
        let config = issuer_config();
        let issuer = DelegationIssuer::new(&config);
        let (token, _) = issuer
            .mint_delegation_token(
                uuid::Uuid::new_v4(),
                "print-service",
                vec!["print:photos".to_string()],
                None,
            )
            .unwrap();

        let validator = DelegationValidator::local(
            DelegationIssuer::new(&config),
            SpiffeId::new("example.org", "print-service"),
        );

        let outcome = validator.validate(&token).await.unwrap();
        assert!(outcome.permissions.contains("print:photos"));
    }

    #[tokio::test]
    async fn local_validator_rejects_audience_mismatch() {
        let config = issuer_config();
        let issuer = DelegationIssuer::new(&config);
        let (token, _) = issuer
            .mint_delegation_token(uuid::Uuid::new_v4(), "print-service", vec![], None)
            .unwrap();

        let validator = DelegationValidator::local(
            DelegationIssuer::new(&config),
            SpiffeId::new("example.org", "photo-service"),
        );

        let error = validator.validate(&token).await.unwrap_err();
        assert_matches!(error, Error::AudienceMismatch);
    }

    #[tokio::test]
    async fn local_validator_rejects_tampered_token() {
        let config = issuer_config();
        let issuer = DelegationIssuer::new(&config);
        let (token, _) = issuer
            .mint_delegation_token(uuid::Uuid::new_v4(), "print-service", vec![], None)
            .unwrap();

        let mut tampered = token.into_bytes();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        let tampered = String::from_utf8(tampered).unwrap();

        let validator = DelegationValidator::local(
            DelegationIssuer::new(&config),
            SpiffeId::new("example.org", "print-service"),
        );

        let error = validator.validate(&tampered).await.unwrap_err();
        assert_matches!(error, Error::TokenInvalid);
    }
}
