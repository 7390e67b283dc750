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

pub mod delegate {
    #[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
    pub struct Request {
        #[serde(rename = "userId")]
        pub user_id: Option<uuid::Uuid>,
        #[serde(rename = "targetService")]
        pub target_service: String,
        #[serde(default)]
        pub permissions: Vec<String>,
        #[serde(rename = "ttlSeconds")]
        pub ttl_seconds: Option<u64>,
    }

    #[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
    pub struct Response {
        pub delegation_token: String,
        pub expires_in: u64,
    }
}

pub mod validate {
    #[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
    pub struct Request {
        pub token: String,
    }

    #[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
    pub struct ValidatedToken {
        pub user_id: uuid::Uuid,
        pub permissions: std::collections::BTreeSet<String>,
        pub audience: Vec<String>,
        pub expires_at: u64,
    }

    #[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
    #[serde(untagged)]
    pub enum Response {
        Valid { valid: bool, token: ValidatedToken },
        Invalid { valid: bool, error: String },
    }
}

pub mod register {
    #[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
    pub struct Request {
        pub username: String,
        pub email: String,
        pub password: String,
    }

    #[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
    pub struct Response {
        pub user_id: uuid::Uuid,
    }
}

pub mod login {
    #[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
    pub struct Request {
        pub username: String,
        pub password: String,
    }

    #[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
    pub struct Response {
        pub access_token: String,
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct ErrorBody {
    pub error: String,
}
