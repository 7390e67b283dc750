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

use std::sync::Arc;

use error::Error;
use rustls::{
    pki_types::{CertificateDer, PrivateKeyDer},
    server::WebPkiClientVerifier,
    ClientConfig, RootCertStore, ServerConfig,
};

use core_objects::SpiffeId;

/// Workload-to-workload calls authenticate each other by presenting the
/// current SVID bundle on both sides of a TLS handshake and checking the
/// peer certificate's chain against the trust domain's own CA — there is no
/// external PKI or OCSP/CRL step. Grounded on the config-rebuild-per-bundle
/// approach `rustls-spiffe`'s `SpiffeServerConfigStream`/`SpiffeClientConfigStream`
/// use, minus the streaming machinery: a caller rebuilds a config from
/// whatever `identity_agent::IdentityAgent::current()` returns whenever it
/// changes, rather than this crate polling for updates itself.
fn parse_cert_chain(pem: &str) -> Result<Vec<CertificateDer<'static>>, Error> {
    let chain: Result<Vec<_>, _> = rustls_pemfile::certs(&mut pem.as_bytes()).collect();
    let chain = chain.map_err(|_| Error::CertParse)?;
    if chain.is_empty() {
        return Err(Error::MissingLeafCertificate);
    }
    Ok(chain)
}

fn parse_private_key(pem: &str) -> Result<PrivateKeyDer<'static>, Error> {
    rustls_pemfile::private_key(&mut pem.as_bytes())
        .map_err(|_| Error::KeyParse)?
        .ok_or(Error::KeyParse)
}

fn build_root_store(trusted_roots_pem: &[String]) -> Result<Arc<RootCertStore>, Error> {
    let mut root_store = RootCertStore::empty();
    for root_pem in trusted_roots_pem {
        let certs = parse_cert_chain(root_pem)?;
        let (_, ignored) = root_store.add_parsable_certificates(certs);
        if ignored != 0 {
            log::warn!("ignored {ignored} unparsable certificate(s) while building trust root store");
        }
    }
    if root_store.is_empty() {
        return Err(Error::MissingRoots);
    }
    Ok(Arc::new(root_store))
}

/// Builds a server-side TLS config that presents `bundle`'s certificate and
/// key and requires (and verifies) a client certificate chaining up to one of
/// `trusted_roots_pem`. Call again whenever the bundle rotates; each call is
/// self-contained and cheap relative to the TLS handshakes it will serve.
pub fn build_server_config(
    bundle: &core_objects::SvidBundle,
    trusted_roots_pem: &[String],
) -> Result<Arc<ServerConfig>, Error> {
    let roots = build_root_store(trusted_roots_pem)?;
    let verifier = WebPkiClientVerifier::builder(roots)
        .build()
        .map_err(|err| Error::VerifierBuild(err.into()))?;

    let chain = parse_cert_chain(&bundle.certificate_pem)?;
    let key = parse_private_key(&bundle.private_key_pem)?;

    let config = ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(chain, key)?;
    Ok(Arc::new(config))
}

/// Builds a client-side TLS config that presents `bundle`'s certificate and
/// key and verifies the server's certificate against `trusted_roots_pem`.
pub fn build_client_config(
    bundle: &core_objects::SvidBundle,
    trusted_roots_pem: &[String],
) -> Result<Arc<ClientConfig>, Error> {
    let roots = build_root_store(trusted_roots_pem)?;

    let chain = parse_cert_chain(&bundle.certificate_pem)?;
    let key = parse_private_key(&bundle.private_key_pem)?;

    let config = ClientConfig::builder()
        .with_root_certificates((*roots).clone())
        .with_client_auth_cert(chain, key)?;
    Ok(Arc::new(config))
}

/// Extracts the peer's SPIFFE ID from the URI SAN of its leaf certificate,
/// rejecting anything that isn't a well-formed X.509-SVID of the local trust
/// domain: absent SAN, no URI entry, a URI that doesn't parse as
/// `spiffe://...`, or one whose authority differs from `local_trust_domain`
/// (spec §4.8: "reject ids whose authority differs from the local trust
/// domain unless an explicit peering policy allows it" — this crate carries
/// no peering policy, so a mismatch is always rejected here).
#[must_use]
pub fn extract_spiffe_id(leaf: &CertificateDer<'_>, local_trust_domain: &str) -> Option<SpiffeId> {
    let (_, cert) = x509_parser::parse_x509_certificate(leaf).ok()?;
    let san = cert.subject_alternative_name().ok()??;
    let uri = san.value.general_names.iter().find_map(|name| match name {
        x509_parser::extensions::GeneralName::URI(uri) => Some(*uri),
        _ => None,
    })?;
    let spiffe_id: SpiffeId = uri.parse().ok()?;
    if spiffe_id.trust_domain != local_trust_domain {
        return None;
    }
    Some(spiffe_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_core::CaCore;
    use key_store::KeyStoreFactory;
    use trust_core_config::{CaConfig, KeyStoreConfig, KeyStoreConfigDisk};

    async fn issue_bundle(tempdir: &tempdir::TempDir, spiffe_path: &str) -> core_objects::SvidBundle {
        let key_store_config = KeyStoreConfig::Disk(KeyStoreConfigDisk {
            key_base_path: tempdir.path().to_str().unwrap().to_string(),
        });
        let key_store = KeyStoreFactory::get(&key_store_config);

        let ca_config = CaConfig {
            ca_key_base_path: tempdir.path().to_str().unwrap().to_string(),
            ca_ttl_seconds: 365 * 24 * 3600,
            svid_ttl_seconds: 3600,
            rsa_key_bits: 2048,
        };
        let ca = CaCore::init("example.org", &ca_config, key_store)
            .await
            .unwrap();

        let spiffe_id = core_objects::SpiffeId::new("example.org", spiffe_path);
        ca.issue_svid(&spiffe_id, None).await.unwrap()
    }

    #[tokio::test]
    async fn builds_a_server_config_from_an_issued_bundle() {
        let tempdir = tempdir::TempDir::new("mtls-transport-test").unwrap();
        let bundle = issue_bundle(&tempdir, "print-service").await;

        build_server_config(&bundle, &bundle.ca_chain_pem).unwrap();
    }

    #[tokio::test]
    async fn builds_a_client_config_from_an_issued_bundle() {
        let tempdir = tempdir::TempDir::new("mtls-transport-test").unwrap();
        let bundle = issue_bundle(&tempdir, "photo-service").await;

        build_client_config(&bundle, &bundle.ca_chain_pem).unwrap();
    }

    #[tokio::test]
    async fn rejects_an_empty_trust_root_list() {
        let tempdir = tempdir::TempDir::new("mtls-transport-test").unwrap();
        let bundle = issue_bundle(&tempdir, "print-service").await;

        let err = build_server_config(&bundle, &[]).unwrap_err();
        assert!(matches!(err, Error::MissingRoots));
    }

    #[tokio::test]
    async fn extracts_the_spiffe_id_embedded_in_the_leaf_certificate() {
        let tempdir = tempdir::TempDir::new("mtls-transport-test").unwrap();
        let bundle = issue_bundle(&tempdir, "print-service").await;

        let chain = parse_cert_chain(&bundle.certificate_pem).unwrap();
        let spiffe_id = extract_spiffe_id(&chain[0], "example.org").unwrap();
        assert_eq!(spiffe_id.to_string(), "spiffe://example.org/print-service");
    }

    #[tokio::test]
    async fn rejects_a_leaf_from_a_foreign_trust_domain() {
        let tempdir = tempdir::TempDir::new("mtls-transport-test").unwrap();
        let bundle = issue_bundle(&tempdir, "print-service").await;

        let chain = parse_cert_chain(&bundle.certificate_pem).unwrap();
        assert!(extract_spiffe_id(&chain[0], "other.org").is_none());
    }
}
