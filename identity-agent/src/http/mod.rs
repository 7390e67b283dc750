// Copyright (c) Microsoft. All rights reserved.

use std::time::Duration;

use core_objects::AttestationProof;
use http_common::{Connector, HttpRequest};
use url::Url;
use workload_api_types::{attest, certificates, ApiVersion, ErrorBody};

use crate::error::Error;
use crate::WorkloadApiClient;

/// Spec §5: every Workload-API client call carries a 10s timeout so a
/// rotation or bootstrap attempt against an unreachable Workload API fails
/// closed instead of hanging the caller indefinitely.
const WORKLOAD_API_TIMEOUT: Duration = Duration::from_secs(10);

/// Query parameter the workload API reads the attestation ticket from on
/// `/workload/v1/certificates`. `http_common`'s `server::Route::from_uri`
/// surfaces path and query only (no header access, mirroring
/// `attest_agent.rs`'s own query-parameter-carried token in the teacher
/// corpus) so the ticket travels the same way a bearer token would, just as
/// a query parameter instead of an `Authorization` header.
const TICKET_QUERY_PARAM: &str = "ticket";

pub struct Client {
    connector: Connector,
    address_url: Url,
}

#[must_use]
pub fn attest_uri() -> String {
    format!("/workload/v1/attest?api-version={}", ApiVersion::V2024_01_01)
}

#[must_use]
pub fn certificates_uri(service_name: &str, ticket: &str) -> String {
    format!(
        "/workload/v1/certificates?api-version={}&service_name={}&{}={}",
        ApiVersion::V2024_01_01,
        service_name,
        TICKET_QUERY_PARAM,
        ticket,
    )
}

impl Client {
    pub fn new(address: &str, port: u16) -> Result<Self, Error> {
        let address_url =
            Url::parse(&format!("http://{address}:{port}")).map_err(Error::InvalidAddress)?;
        let connector = Connector::new(&address_url)?;

        Ok(Client {
            connector,
            address_url,
        })
    }
}

#[async_trait::async_trait]
impl WorkloadApiClient for Client {
    async fn attest(
        &self,
        service_name: &str,
        proof: AttestationProof,
    ) -> Result<String, Box<dyn std::error::Error + Send>> {
        let url = format!("{}{}", self.address_url, attest_uri());
        let body = attest::Request {
            service_name: service_name.to_string(),
            attestation_proof: proof,
        };
        let request = HttpRequest::post(self.connector.clone(), &url, Some(body));

        let response = tokio::time::timeout(WORKLOAD_API_TIMEOUT, request.json_response())
            .await
            .map_err(|_| Box::new(Error::Timeout) as _)?
            .map_err(|err| Box::new(Error::Attest(Box::new(err))) as _)?;

        let attest::Response { token } = response
            .parse::<attest::Response, ErrorBody>(&[hyper::StatusCode::OK])
            .map_err(|err| Box::new(Error::Attest(Box::new(err))) as _)?;

        Ok(token)
    }

    async fn fetch_certificates(
        &self,
        service_name: &str,
        ticket: &str,
    ) -> Result<certificates::Response, Box<dyn std::error::Error + Send>> {
        let url = format!(
            "{}{}",
            self.address_url,
            certificates_uri(service_name, ticket)
        );
        let request: HttpRequest<(), _> = HttpRequest::get(self.connector.clone(), &url);

        let response = tokio::time::timeout(WORKLOAD_API_TIMEOUT, request.json_response())
            .await
            .map_err(|_| Box::new(Error::Timeout) as _)?
            .map_err(|err| Box::new(Error::Certificates(Box::new(err))) as _)?;

        response
            .parse::<certificates::Response, ErrorBody>(&[hyper::StatusCode::OK])
            .map_err(|err| Box::new(Error::Certificates(Box::new(err))) as _)
    }
}
