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

pub mod error;

use std::sync::Arc;

use core_objects::{get_epoch_time, KeyType, SpiffeId, SvidBundle};
use error::Error;
use key_store::KeyStore;
use openssl::{
    asn1::Asn1Time,
    bn::BigNum,
    hash::MessageDigest,
    pkey::{PKey, Private},
    rsa::Rsa,
    x509::{
        extension::{
            AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage,
            SubjectAlternativeName, SubjectKeyIdentifier,
        },
        X509Name, X509NameBuilder, X509,
    },
};
use rand::RngCore;
use tokio::sync::RwLock;
use trust_core_config::CaConfig;

/// Identifier under which the CA's own signing key is stored in the
/// `KeyStore`. Never handed out to a caller.
const CA_KEY_ID: &str = "trust-core-ca";

/// Owns the trust domain's signing key and issues and rotates X.509 SVIDs
/// for workloads. The CA's own key pair never leaves the configured
/// `KeyStore`; only the public certificate is ever serialized out.
pub struct CaCore {
    trust_domain: String,
    key_store: Arc<dyn KeyStore>,
    ca_ttl_seconds: u64,
    svid_default_ttl_seconds: u64,
    rsa_key_bits: u32,
    ca_cert_path: std::path::PathBuf,
    state: RwLock<CaState>,
}

struct CaState {
    ca_certificate: X509,
}

impl CaCore {
    /// Loads the CA certificate from `config.ca_key_base_path`, generating
    /// and self-signing a fresh one (and its backing key pair, via
    /// `key_store`) the first time the trust domain is bootstrapped.
    pub async fn init(
        trust_domain: impl Into<String>,
        config: &CaConfig,
        key_store: Arc<dyn KeyStore>,
    ) -> Result<Self, Error> {
        let trust_domain = trust_domain.into();
        let ca_cert_path = std::path::Path::new(&config.ca_key_base_path).join("ca.crt.pem");

        key_store
            .create_key_pair_if_not_exists(CA_KEY_ID, KeyType::Rsa2048)
            .await
            .map_err(Error::KeyStore)?;

        let ca_certificate = match tokio::fs::read(&ca_cert_path).await {
            Ok(pem) => X509::from_pem(&pem).map_err(Error::CertParse)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let private_key = key_store::load_private_key(key_store.as_ref(), CA_KEY_ID)
                    .await
                    .map_err(Error::KeyStore)?;

                let certificate =
                    build_self_signed_ca_certificate(&trust_domain, &private_key, config.ca_ttl_seconds)?;

                if let Some(parent) = ca_cert_path.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(Error::CertWrite)?;
                }
                tokio::fs::write(&ca_cert_path, certificate.to_pem()?)
                    .await
                    .map_err(Error::CertWrite)?;

                certificate
            }
            Err(err) => return Err(Error::CertRead(err)),
        };

        Ok(CaCore {
            trust_domain,
            key_store,
            ca_ttl_seconds: config.ca_ttl_seconds,
            svid_default_ttl_seconds: config.svid_ttl_seconds,
            rsa_key_bits: config.rsa_key_bits,
            ca_cert_path,
            state: RwLock::new(CaState { ca_certificate }),
        })
    }

    #[must_use]
    pub fn trust_domain(&self) -> &str {
        &self.trust_domain
    }

    /// PEM encoding of the current CA certificate, as handed out by the
    /// Workload API's trust bundle endpoint.
    pub async fn trust_bundle_pem(&self) -> Result<String, Error> {
        let state = self.state.read().await;
        let pem = state.ca_certificate.to_pem()?;
        Ok(String::from_utf8_lossy(&pem).into_owned())
    }

    /// Issues a fresh X.509 SVID for `spiffe_id`, generating a new workload
    /// key pair held only in memory (it is never written through the
    /// `KeyStore`, which is reserved for the CA's own signing key).
    pub async fn issue_svid(
        &self,
        spiffe_id: &SpiffeId,
        ttl_seconds: Option<u64>,
    ) -> Result<SvidBundle, Error> {
        let ttl_seconds = ttl_seconds.unwrap_or(self.svid_default_ttl_seconds);

        let workload_key = {
            let rsa = Rsa::generate(self.rsa_key_bits)?;
            PKey::from_rsa(rsa)?
        };

        let state = self.state.read().await;
        let ca_private_key = key_store::load_private_key(self.key_store.as_ref(), CA_KEY_ID)
            .await
            .map_err(Error::KeyStore)?;

        let issued_at = get_epoch_time();
        let expires_at = issued_at + ttl_seconds;

        let leaf = build_leaf_certificate(
            spiffe_id,
            &workload_key,
            &state.ca_certificate,
            &ca_private_key,
            issued_at,
            ttl_seconds,
        )?;

        let ca_chain_pem = vec![String::from_utf8_lossy(&state.ca_certificate.to_pem()?).into_owned()];

        Ok(SvidBundle {
            spiffe_id: spiffe_id.clone(),
            certificate_pem: String::from_utf8_lossy(&leaf.to_pem()?).into_owned(),
            private_key_pem: String::from_utf8_lossy(
                &workload_key.private_key_to_pem_pkcs8()?,
            )
            .into_owned(),
            ca_chain_pem,
            issued_at,
            expires_at,
            ttl_seconds,
        })
    }

    /// Re-signs the CA certificate with a fresh validity window, keeping the
    /// existing key pair. Out of scope for the spec's tested properties but
    /// kept so long-lived deployments aren't stuck regenerating the key.
    pub async fn rotate_ca_certificate(&self) -> Result<(), Error> {
        let private_key = key_store::load_private_key(self.key_store.as_ref(), CA_KEY_ID)
            .await
            .map_err(Error::KeyStore)?;

        let certificate =
            build_self_signed_ca_certificate(&self.trust_domain, &private_key, self.ca_ttl_seconds)?;

        tokio::fs::write(&self.ca_cert_path, certificate.to_pem()?)
            .await
            .map_err(Error::CertWrite)?;

        let mut state = self.state.write().await;
        state.ca_certificate = certificate;
        Ok(())
    }
}

fn build_ca_name(trust_domain: &str) -> Result<X509Name, Error> {
    let mut builder = X509NameBuilder::new()?;
    builder.append_entry_by_text("O", trust_domain)?;
    builder.append_entry_by_text("CN", trust_domain)?;
    Ok(builder.build())
}

fn random_serial_number() -> Result<openssl::asn1::Asn1Integer, Error> {
    let mut data = [0_u8; 20];
    rand::thread_rng().fill_bytes(&mut data);
    data[0] &= 0x7f;
    let serial = BigNum::from_slice(&data)?;
    Ok(serial.to_asn1_integer()?)
}

fn build_self_signed_ca_certificate(
    trust_domain: &str,
    private_key: &PKey<Private>,
    ttl_seconds: u64,
) -> Result<X509, Error> {
    let mut builder = X509::builder()?;
    builder.set_version(2)?;

    let name = build_ca_name(trust_domain)?;
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;
    builder.set_pubkey(private_key)?;

    builder.set_not_before(Asn1Time::days_from_now(0)?.as_ref())?;
    let ttl_days = u32::try_from(ttl_seconds / (24 * 3600)).unwrap_or(u32::MAX).max(1);
    builder.set_not_after(Asn1Time::days_from_now(ttl_days)?.as_ref())?;
    builder.set_serial_number(&random_serial_number()?)?;

    builder.append_extension(BasicConstraints::new().critical().ca().build()?)?;
    builder.append_extension(
        KeyUsage::new()
            .critical()
            .key_cert_sign()
            .crl_sign()
            .build()?,
    )?;
    let subject_key_id =
        SubjectKeyIdentifier::new().build(&builder.x509v3_context(None, None))?;
    builder.append_extension(subject_key_id)?;

    builder.sign(private_key, MessageDigest::sha256())?;
    Ok(builder.build())
}

fn build_leaf_certificate(
    spiffe_id: &SpiffeId,
    workload_key: &PKey<Private>,
    ca_certificate: &X509,
    ca_private_key: &PKey<Private>,
    issued_at: u64,
    ttl_seconds: u64,
) -> Result<X509, Error> {
    let mut builder = X509::builder()?;
    builder.set_version(2)?;

    let mut subject = X509NameBuilder::new()?;
    subject.append_entry_by_text("O", &spiffe_id.trust_domain)?;
    subject.append_entry_by_text("CN", &spiffe_id.path)?;
    builder.set_subject_name(&subject.build())?;
    builder.set_issuer_name(ca_certificate.subject_name())?;
    builder.set_pubkey(workload_key)?;

    // Second-precision validity window anchored to issuance: the spec's 1h
    // SVID TTL must yield a cert whose notAfter - notBefore is exactly 1h,
    // which day-granularity `Asn1Time::days_from_now` cannot express.
    let not_before = Asn1Time::from_unix(i64::try_from(issued_at).unwrap_or(i64::MAX))?;
    let not_after = Asn1Time::from_unix(
        i64::try_from(issued_at + ttl_seconds).unwrap_or(i64::MAX),
    )?;
    builder.set_not_before(not_before.as_ref())?;
    builder.set_not_after(not_after.as_ref())?;
    builder.set_serial_number(&random_serial_number()?)?;

    builder.append_extension(BasicConstraints::new().critical().build()?)?;
    builder.append_extension(
        KeyUsage::new()
            .critical()
            .digital_signature()
            .key_encipherment()
            .build()?,
    )?;
    builder.append_extension(
        ExtendedKeyUsage::new()
            .client_auth()
            .server_auth()
            .build()?,
    )?;

    let context = builder.x509v3_context(Some(ca_certificate), None);
    let authority_key_id = AuthorityKeyIdentifier::new()
        .keyid(false)
        .issuer(false)
        .build(&context)?;
    builder.append_extension(authority_key_id)?;

    let context = builder.x509v3_context(Some(ca_certificate), None);
    let san = SubjectAlternativeName::new()
        .uri(&spiffe_id.to_string())
        .critical()
        .build(&context)?;
    builder.append_extension(san)?;

    builder.sign(ca_private_key, MessageDigest::sha256())?;
    Ok(builder.build())
}
