// Copyright (c) Microsoft. All rights reserved.

//! Drives the Workload API / CA and the user-auth shell as real HTTP
//! services on loopback ports inside the test process, the way this
//! workspace's earlier admin-API integration tests drove the teacher's
//! admin API with its own `SpiffeHttpClient` against a `start_test_server`
//! helper — generalized from a Unix-socket admin surface to two TCP
//! listeners and a real user-facing delegation flow.

use std::{collections::BTreeMap, sync::Arc};

use attestation_registry::AttestationRegistry;
use ca_core::CaCore;
use core_objects::{AttestationProof, SpiffeId};
use delegation_api_types::{delegate, login, register, validate};
use delegation_issuer::DelegationIssuer;
use delegation_validator::DelegationValidator;
use http_common::{Connector, HttpRequest};
use trust_core_config::{
    AttestationRegistryConfig, CaConfig, DelegationIssuerConfig, DelegationSigningConfig,
    HttpServerConfig, KeyStoreConfig, KeyStoreConfigDisk,
};

const TRUST_DOMAIN: &str = "example.org";
const DELEGATION_SECRET: &str = "integration-test-shared-secret-0123456789";

struct TrustCore {
    workload_api_port: u16,
    user_auth_port: u16,
    issuer_config: DelegationIssuerConfig,
}

/// Boots a real Workload API / CA listener and a real user-auth listener on
/// the given ports, backed by a fresh on-disk key store under `dir`. Both
/// run for the lifetime of the test process (the spawned tasks are never
/// joined; they are dropped, and therefore aborted, at process exit).
async fn start_trust_core(dir: &tempdir::TempDir, workload_api_port: u16, user_auth_port: u16) -> TrustCore {
    let key_store_config = KeyStoreConfig::Disk(KeyStoreConfigDisk {
        key_base_path: dir.path().to_str().unwrap().to_string(),
    });
    let key_store = key_store::KeyStoreFactory::get(&key_store_config);

    let ca_config = CaConfig {
        ca_key_base_path: dir.path().to_str().unwrap().to_string(),
        ca_ttl_seconds: 365 * 24 * 3600,
        svid_ttl_seconds: 3600,
        rsa_key_bits: 2048,
    };
    let ca = Arc::new(CaCore::init(TRUST_DOMAIN, &ca_config, key_store).await.unwrap());

    let mut static_secrets = BTreeMap::new();
    static_secrets.insert("dev-token-print-service".to_string(), "print-service".to_string());
    static_secrets.insert("dev-token-photo-service".to_string(), "photo-service".to_string());
    let registry_config = AttestationRegistryConfig {
        ticket_ttl_seconds: 60,
        static_secrets,
    };
    let registry = Arc::new(AttestationRegistry::new(&registry_config, TRUST_DOMAIN));

    let workload_api_server = HttpServerConfig {
        address: "127.0.0.1".to_string(),
        port: workload_api_port,
    };
    workload_api_service::start_workload_api(&workload_api_server, ca, registry)
        .await
        .unwrap();

    let issuer_config = DelegationIssuerConfig {
        trust_domain: TRUST_DOMAIN.to_string(),
        issuer_workload_name: "user-auth".to_string(),
        server: HttpServerConfig {
            address: "127.0.0.1".to_string(),
            port: user_auth_port,
        },
        signing: DelegationSigningConfig {
            secret: DELEGATION_SECRET.to_string(),
            algorithm: core_objects::SigningAlgorithm::Hs256,
            delegation_ttl_seconds: 900,
        },
        user_session_ttl_seconds: 3600,
    };
    let issuer = Arc::new(DelegationIssuer::new(&issuer_config));
    user_auth_service::start_user_auth_service(&issuer_config.server, issuer)
        .await
        .unwrap();

    // Give both listeners a moment to come up before the test drives them,
    // mirroring the teacher's own `sleep(Duration::from_millis(10))` after
    // spawning its admin API in `start_test_server`.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    TrustCore {
        workload_api_port,
        user_auth_port,
        issuer_config,
    }
}

async fn post<Req: serde::Serialize, Res: serde::de::DeserializeOwned>(
    url: &str,
    body: &Req,
    expect: hyper::StatusCode,
) -> Res {
    let url = url::Url::parse(url).unwrap();
    let connector = Connector::new(&url).unwrap();
    let request = HttpRequest::post(connector, url.as_str(), Some(body));
    let response = request.json_response().await.unwrap();
    response
        .parse::<Res, delegation_api_types::ErrorBody>(&[expect])
        .unwrap()
}

/// E1 — Happy-path delegation: register, login, delegate, validate, driven
/// end to end against the real `user-auth-service` HTTP surface.
#[tokio::test]
async fn e1_happy_path_delegation() {
    let dir = tempdir::TempDir::new("trust-core-e1").unwrap();
    let core = start_trust_core(&dir, 18443, 19443).await;
    let base = format!("http://127.0.0.1:{}", core.user_auth_port);

    let registered: register::Response = post(
        &format!("{base}/auth/register"),
        &register::Request {
            username: "alice".to_string(),
            email: "a@x".to_string(),
            password: "pw".to_string(),
        },
        hyper::StatusCode::CREATED,
    )
    .await;

    let logged_in: login::Response = post(
        &format!("{base}/auth/login"),
        &login::Request {
            username: "alice".to_string(),
            password: "pw".to_string(),
        },
        hyper::StatusCode::OK,
    )
    .await;

    let delegated: delegate::Response = post(
        &format!("{base}/auth/delegate?user_token={}", logged_in.access_token),
        &delegate::Request {
            user_id: None,
            target_service: "print-service".to_string(),
            permissions: vec!["print:photos".to_string()],
            ttl_seconds: Some(900),
        },
        hyper::StatusCode::OK,
    )
    .await;
    assert_eq!(delegated.expires_in, 900);

    let validated: validate::Response = post(
        &format!("{base}/auth/validate"),
        &validate::Request {
            token: delegated.delegation_token.clone(),
        },
        hyper::StatusCode::OK,
    )
    .await;

    match validated {
        validate::Response::Valid { valid, token } => {
            assert!(valid);
            assert_eq!(token.user_id, registered.user_id);
            assert_eq!(token.permissions, std::collections::BTreeSet::from(["print:photos".to_string()]));
            assert_eq!(token.audience, vec!["spiffe://example.org/print-service".to_string()]);
        }
        validate::Response::Invalid { .. } => panic!("expected a valid token"),
    }

    // E2 — Audience mismatch: any workload other than print-service rejects
    // T_d with 401 through its own Auth Filter.
    let other_workload_validator = DelegationValidator::local(
        DelegationIssuer::new(&core.issuer_config),
        SpiffeId::new(TRUST_DOMAIN, "photo-service"),
    );
    let other_workload_filter = auth_filter::AuthFilter::new(other_workload_validator, []);
    let header = format!("Bearer {}", delegated.delegation_token);
    let error = other_workload_filter.admit(Some(&header)).await.unwrap_err();
    matches::assert_matches!(error, auth_filter::error::Error::TokenInvalid);

    // E3 — Permission shortfall: a token scoped correctly but missing the
    // required permission is accepted by the filter, then rejected by the
    // handler's own scope check.
    let short_delegated: delegate::Response = post(
        &format!("{base}/auth/delegate?user_token={}", logged_in.access_token),
        &delegate::Request {
            user_id: None,
            target_service: "print-service".to_string(),
            permissions: vec!["read:photos".to_string()],
            ttl_seconds: None,
        },
        hyper::StatusCode::OK,
    )
    .await;

    let print_service_validator = DelegationValidator::local(
        DelegationIssuer::new(&core.issuer_config),
        SpiffeId::new(TRUST_DOMAIN, "print-service"),
    );
    let print_service_filter = auth_filter::AuthFilter::new(print_service_validator, []);
    let header = format!("Bearer {}", short_delegated.delegation_token);
    let context = print_service_filter.admit(Some(&header)).await.unwrap();
    let error = auth_filter::require_any_permission(&context, &["print:photos"]).unwrap_err();
    matches::assert_matches!(error, auth_filter::error::Error::PermissionDenied);

    // E5 — Tampered token: flipping a byte of T_d fails both local and
    // remote validation.
    let mut tampered = delegated.delegation_token.into_bytes();
    let last = tampered.len() - 1;
    tampered[last] ^= 0x01;
    let tampered = String::from_utf8(tampered).unwrap();

    let local_result = DelegationIssuer::new(&core.issuer_config).verify_delegation_token(&tampered);
    assert!(local_result.is_err());

    let remote_validated: validate::Response = post(
        &format!("{base}/auth/validate"),
        &validate::Request { token: tampered },
        hyper::StatusCode::OK,
    )
    .await;
    matches::assert_matches!(remote_validated, validate::Response::Invalid { valid: false, .. });
}

/// E6 — Attestation failure: a wrong static secret is rejected with 401,
/// and no ticket is ever recorded for the caller to redeem.
#[tokio::test]
async fn e6_attestation_failure_leaves_no_redeemable_ticket() {
    let dir = tempdir::TempDir::new("trust-core-e6").unwrap();
    let core = start_trust_core(&dir, 18444, 19444).await;

    let client = identity_agent::http::Client::new("127.0.0.1", core.workload_api_port).unwrap();

    client
        .attest(
            "photo-service",
            AttestationProof::StaticSecret {
                token: "wrong".to_string(),
            },
        )
        .await
        .unwrap_err();

    client
        .fetch_certificates("photo-service", "00000000-0000-0000-0000-000000000000")
        .await
        .unwrap_err();
}

/// E1's registration step rejects a second registration under the same
/// username, independent of which process runs it — spec §6's `409
/// duplicate username`.
#[tokio::test]
async fn register_rejects_a_duplicate_username() {
    let dir = tempdir::TempDir::new("trust-core-duplicate").unwrap();
    let core = start_trust_core(&dir, 18445, 19445).await;
    let base = format!("http://127.0.0.1:{}", core.user_auth_port);

    let _first: register::Response = post(
        &format!("{base}/auth/register"),
        &register::Request {
            username: "bob".to_string(),
            email: "b@x".to_string(),
            password: "pw".to_string(),
        },
        hyper::StatusCode::CREATED,
    )
    .await;

    let url = url::Url::parse(&format!("{base}/auth/register")).unwrap();
    let connector = Connector::new(&url).unwrap();
    let request = HttpRequest::post(
        connector,
        url.as_str(),
        Some(register::Request {
            username: "bob".to_string(),
            email: "other@x".to_string(),
            password: "different".to_string(),
        }),
    );
    let response = request.json_response().await.unwrap();
    response
        .parse::<register::Response, delegation_api_types::ErrorBody>(&[hyper::StatusCode::CREATED])
        .unwrap_err();
}
