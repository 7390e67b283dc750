// Copyright (c) Microsoft. All rights reserved.

use std::borrow::Cow;

use delegation_api_types::{login::Request, ApiVersion};
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
        if path != crate::uri::LOGIN {
            return None;
        }

        Some(Route {
            api: service.api.clone(),
        })
    }

    async fn post(self, body: Option<Self::PostBody>) -> server::RouteResponse {
        let body = body.ok_or_else(|| server::Error {
            status_code: StatusCode::BAD_REQUEST,
            message: "missing request body".into(),
        })?;

        let res = self.api.login(body).await.map_err(|err| server::Error {
            status_code: err.status_code(),
            message: "login failed".into(),
        })?;

        Ok(server::response::json(StatusCode::OK, &res))
    }
}
