// Copyright (c) Microsoft. All rights reserved.

use std::borrow::Cow;

use delegation_api_types::{validate::Request, ApiVersion};
use http::{Extensions, StatusCode};
use http_common::{server, DynRangeBounds};

use crate::Api;

pub(super) struct Route {
    api: Api,
}

#[async_trait::async_trait]
impl server::Route for Route {
    type ApiVersion = ApiVersion;
    type Service = super::Service;
    type DeleteBody = serde::de::IgnoredAny;
    type PostBody = Request;
    type PutBody = serde::de::IgnoredAny;

    fn api_version() -> &'static dyn DynRangeBounds<Self::ApiVersion> {
        &((ApiVersion::V2024_01_01)..)
    }

    fn from_uri(
        service: &Self::Service,
        path: &str,
        _query: &[(Cow<'_, str>, Cow<'_, str>)],
        _extensions: &Extensions,
    ) -> Option<Self> {
        if path != crate::uri::VALIDATE {
            return None;
        }

        Some(Route {
            api: service.api.clone(),
        })
    }

    /// Always answers 200; an invalid token surfaces as `{valid: false,
    /// error}` in the body, not an HTTP error status (spec §6).
    async fn post(self, body: Option<Self::PostBody>) -> server::RouteResponse {
        let body = body.ok_or_else(|| server::Error {
            status_code: StatusCode::BAD_REQUEST,
            message: "missing request body".into(),
        })?;

        let res = self.api.validate(body).await;
        Ok(server::response::json(StatusCode::OK, &res))
    }
}
