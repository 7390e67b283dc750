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

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum ApiVersion {
    V2024_01_01,
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ApiVersion::V2024_01_01 => "2024-01-01",
        })
    }
}

impl std::str::FromStr for ApiVersion {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2024-01-01" => Ok(ApiVersion::V2024_01_01),
            _ => Err(()),
        }
    }
}

pub mod attest {
    use core_objects::AttestationProof;

    #[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
    pub struct Request {
        pub service_name: String,
        pub attestation_proof: AttestationProof,
    }

    /// `token` here is the opaque attestation ticket, named to match the
    /// wire contract this endpoint was specified against.
    #[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
    pub struct Response {
        pub token: String,
    }
}

pub mod certificates {
    #[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
    pub struct Svid {
        pub cert: String,
        pub key: String,
        pub spiffe_id: String,
    }

    #[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
    pub struct Response {
        pub svid: Svid,
        pub ca_certs: Vec<String>,
        pub expires_at: u64,
        pub ttl: u64,
    }
}

pub mod health {
    #[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
    pub struct Response {
        pub status: &'static str,
    }

    impl Default for Response {
        fn default() -> Self {
            Response { status: "healthy" }
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct ErrorBody {
    pub error: String,
}
