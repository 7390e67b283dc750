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

use std::collections::BTreeSet;

use core_objects::{
    get_epoch_time, DelegationClaims, SignedTokenHeader, SigningAlgorithm, SpiffeId,
    UserSessionClaims, DEFAULT_DELEGATION_PERMISSIONS,
};
use error::Error;
use openssl::{hash::MessageDigest, memcmp, pkey::PKey, sign::Signer};
use trust_core_config::DelegationIssuerConfig;

const MAX_DELEGATION_TTL_SECONDS: u64 = 3600;

/// Mints and verifies the HMAC-signed bearer tokens the Delegation Token
/// Service hands out, and the user session tokens the user-auth shell
/// protects its own `/auth/delegate` callers with. Both token kinds go
/// through the same header/claims/signature assembly pipeline, generalizing
/// `SVIDFactory::create_jwt_svid_inner`'s base64url-concat-then-sign shape
/// from an ECDSA digest signature to a direct HMAC over the signing input.
pub struct DelegationIssuer {
    trust_domain: String,
    issuer_identity: SpiffeId,
    secret: Vec<u8>,
    algorithm: SigningAlgorithm,
    default_delegation_ttl_seconds: u64,
    user_session_ttl_seconds: u64,
}

impl DelegationIssuer {
    #[must_use]
    pub fn new(config: &DelegationIssuerConfig) -> Self {
        DelegationIssuer {
            trust_domain: config.trust_domain.clone(),
            issuer_identity: SpiffeId::new(
                config.trust_domain.clone(),
                config.issuer_workload_name.clone(),
            ),
            secret: config.signing.secret.clone().into_bytes(),
            algorithm: config.signing.algorithm,
            default_delegation_ttl_seconds: config.signing.delegation_ttl_seconds,
            user_session_ttl_seconds: config.user_session_ttl_seconds,
        }
    }

    /// Mints a delegation token scoped to `target_workload` on behalf of
    /// `user_id`. An empty `permissions` list is substituted with
    /// [`DEFAULT_DELEGATION_PERMISSIONS`] per the reference corpus'
    /// backward-compatibility behavior (see `DESIGN.md`).
    pub fn mint_delegation_token(
        &self,
        user_id: uuid::Uuid,
        target_workload: &str,
        permissions: Vec<String>,
        ttl_seconds: Option<u64>,
    ) -> Result<(String, u64), Error> {
        let ttl_seconds = ttl_seconds.unwrap_or(self.default_delegation_ttl_seconds);
        if ttl_seconds > MAX_DELEGATION_TTL_SECONDS {
            return Err(Error::TtlTooLarge(ttl_seconds, MAX_DELEGATION_TTL_SECONDS));
        }

        let permissions: BTreeSet<String> = if permissions.is_empty() {
            DEFAULT_DELEGATION_PERMISSIONS
                .iter()
                .map(ToString::to_string)
                .collect()
        } else {
            permissions.into_iter().collect()
        };

        let issued_at = get_epoch_time();
        let expires_at = issued_at + ttl_seconds;

        let claims = DelegationClaims {
            iss: self.issuer_identity.clone(),
            sub: self.issuer_identity.clone(),
            aud: SpiffeId::new(self.trust_domain.clone(), target_workload.to_string()),
            user_id,
            permissions,
            iat: issued_at,
            exp: expires_at,
        };

        let token = self.sign(&claims)?;
        Ok((token, ttl_seconds))
    }

    /// Mints a user session token: same construction, no audience. Shared by
    /// the user-auth shell so it does not carry its own signing stack.
    pub fn mint_user_session_token(&self, user_id: uuid::Uuid) -> Result<String, Error> {
        let issued_at = get_epoch_time();
        let claims = UserSessionClaims {
            iss: self.issuer_identity.to_string(),
            sub: user_id,
            iat: issued_at,
            exp: issued_at + self.user_session_ttl_seconds,
        };
        self.sign(&claims)
    }

    /// Verifies a token minted by either method above and returns its
    /// decoded claims. Used by the local path of the Delegation Validator and
    /// by `/auth/validate`'s remote path, so both surfaces reject an expired
    /// token the same way: signature-valid but past `exp` is still an error,
    /// never a `valid: true` response.
    pub fn verify_delegation_token(&self, token: &str) -> Result<DelegationClaims, Error> {
        let (claims_json, _header) = self.verify(token)?;
        let claims: DelegationClaims =
            serde_json::from_slice(&claims_json).map_err(Error::ErrorJsonSerializing)?;

        if claims.exp <= get_epoch_time() {
            return Err(Error::Expired);
        }

        Ok(claims)
    }

    pub fn verify_user_session_token(&self, token: &str) -> Result<UserSessionClaims, Error> {
        let (claims_json, _header) = self.verify(token)?;
        let claims: UserSessionClaims =
            serde_json::from_slice(&claims_json).map_err(Error::ErrorJsonSerializing)?;

        if claims.exp <= get_epoch_time() {
            return Err(Error::Expired);
        }

        Ok(claims)
    }

    fn sign(&self, claims: &impl serde::Serialize) -> Result<String, Error> {
        let header = SignedTokenHeader {
            alg: self.algorithm,
            typ: "JWT",
        };

        let header_compact = encode(&header)?;
        let claims_compact = encode(claims)?;

        let signing_input = format!("{header_compact}.{claims_compact}");
        let signature = self.hmac(signing_input.as_bytes())?;
        let signature_compact = base64::encode_config(signature, base64::URL_SAFE_NO_PAD);

        Ok(format!("{signing_input}.{signature_compact}"))
    }

    /// Returns the decoded (but not yet parsed into a claims type) JSON
    /// payload once the signature has checked out.
    fn verify(&self, token: &str) -> Result<(Vec<u8>, SignedTokenHeader), Error> {
        let mut parts = token.split('.');
        let (Some(header_compact), Some(claims_compact), Some(signature_compact), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::Malformed);
        };

        let signing_input = format!("{header_compact}.{claims_compact}");
        let expected_signature = self.hmac(signing_input.as_bytes())?;

        let signature = base64::decode_config(signature_compact, base64::URL_SAFE_NO_PAD)
            .map_err(|_| Error::Malformed)?;

        if signature.len() != expected_signature.len()
            || !memcmp::eq(&signature, &expected_signature)
        {
            return Err(Error::BadSignature);
        }

        let header_json = base64::decode_config(header_compact, base64::URL_SAFE_NO_PAD)
            .map_err(|_| Error::Malformed)?;
        let header: SignedTokenHeader =
            serde_json::from_slice(&header_json).map_err(Error::ErrorJsonSerializing)?;

        let claims_json = base64::decode_config(claims_compact, base64::URL_SAFE_NO_PAD)
            .map_err(|_| Error::Malformed)?;

        Ok((claims_json, header))
    }

    fn hmac(&self, signing_input: &[u8]) -> Result<Vec<u8>, Error> {
        let digest = match self.algorithm {
            SigningAlgorithm::Hs256 => MessageDigest::sha256(),
            SigningAlgorithm::Hs512 => MessageDigest::sha512(),
        };

        let key = PKey::hmac(&self.secret)?;
        let mut signer = Signer::new(digest, &key)?;
        signer.update(signing_input)?;
        Ok(signer.sign_to_vec()?)
    }
}

fn encode(value: &impl serde::Serialize) -> Result<String, Error> {
    let json = serde_json::to_vec(value).map_err(Error::ErrorJsonSerializing)?;
    Ok(base64::encode_config(json, base64::URL_SAFE_NO_PAD))
}

#[cfg(test)]
mod tests {
    use super::*;
    use matches::assert_matches;
    use trust_core_config::{DelegationSigningConfig, HttpServerConfig};

    fn issuer() -> DelegationIssuer {
        let config = DelegationIssuerConfig {
            trust_domain: "example.org".to_string(),
            issuer_workload_name: "user-auth".to_string(),
            server: HttpServerConfig {
                address: "0.0.0.0".to_string(),
                port: 9443,
            },
            signing: DelegationSigningConfig {
                secret: "unit-test-secret-unit-test-secret".to_string(),
                algorithm: SigningAlgorithm::Hs256,
                delegation_ttl_seconds: 900,
            },
            user_session_ttl_seconds: 3600,
        };
        DelegationIssuer::new(&config)
    }

    #[test]
    fn mint_and_verify_round_trip() {
        let issuer = issuer();
        let user_id = uuid::Uuid::new_v4();

        let (token, expires_in) = issuer
            .mint_delegation_token(user_id, "print-service", vec!["print:photos".to_string()], None)
            .unwrap();
        assert_eq!(expires_in, 900);

        let claims = issuer.verify_delegation_token(&token).unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.aud, SpiffeId::new("example.org", "print-service"));
        assert!(claims.permissions.contains("print:photos"));
    }

    #[test]
    fn empty_permissions_default_to_read_photos() {
        let issuer = issuer();
        let (token, _) = issuer
            .mint_delegation_token(uuid::Uuid::new_v4(), "print-service", vec![], None)
            .unwrap();

        let claims = issuer.verify_delegation_token(&token).unwrap();
        assert_eq!(
            claims.permissions,
            BTreeSet::from(["read:photos".to_string()])
        );
    }

    #[test]
    fn ttl_above_maximum_is_rejected() {
        let issuer = issuer();
        let error = issuer
            .mint_delegation_token(uuid::Uuid::new_v4(), "print-service", vec![], Some(7200))
            .unwrap_err();
        assert_matches!(error, Error::TtlTooLarge(7200, MAX_DELEGATION_TTL_SECONDS));
    }

    #[test]
    fn tampered_token_fails_verification() {
        let issuer = issuer();
        let (token, _) = issuer
            .mint_delegation_token(uuid::Uuid::new_v4(), "print-service", vec![], None)
            .unwrap();

        let mut tampered = token.into_bytes();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x01;
        let tampered = String::from_utf8(tampered).unwrap();

        let error = issuer.verify_delegation_token(&tampered).unwrap_err();
        assert_matches!(error, Error::BadSignature | Error::Malformed);
    }

    #[test]
    fn expired_delegation_token_is_rejected() {
        let issuer = issuer();
        let (token, _) = issuer
            .mint_delegation_token(uuid::Uuid::new_v4(), "print-service", vec![], Some(0))
            .unwrap();

        std::thread::sleep(std::time::Duration::from_secs(1));

        let error = issuer.verify_delegation_token(&token).unwrap_err();
        assert_matches!(error, Error::Expired);
    }

    #[test]
    fn user_session_token_round_trips() {
        let issuer = issuer();
        let user_id = uuid::Uuid::new_v4();
        let token = issuer.mint_user_session_token(user_id).unwrap();

        let claims = issuer.verify_user_session_token(&token).unwrap();
        assert_eq!(claims.sub, user_id);
    }
}
