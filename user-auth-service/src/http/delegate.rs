// Copyright (c) Microsoft. All rights reserved.

use std::borrow::Cow;

use delegation_api_types::{delegate::Request, ApiVersion};
use http::{Extensions, StatusCode};
use http_common::{server, DynRangeBounds};

use crate::Api;

/// Query parameter the caller's bearer User Session Token travels in.
/// `http_common`'s `server::Route::from_uri` surfaces path and query only,
/// no header access (see `workload_api_service::http::certificates::Route`'s
/// matching convention), so the `Authorization: Bearer <token>` header
/// spec §6 describes is carried as `?user_token=<token>` instead.
const USER_TOKEN_QUERY_PARAM: &str = "user_token";

pub(super) struct Route {
    user_token: Option<String>,
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
        query: &[(Cow<'_, str>, Cow<'_, str>)],
        _extensions: &Extensions,
    ) -> Option<Self> {
        if path != crate::uri::DELEGATE {
            return None;
        }

        let mut user_token = None;
        for (key, value) in query {
            if key.as_ref() == USER_TOKEN_QUERY_PARAM {
                user_token = Some(value.to_string());
            }
        }

        Some(Route {
            user_token,
            api: service.api.clone(),
        })
    }

    async fn post(self, body: Option<Self::PostBody>) -> server::RouteResponse {
        let user_token = self.user_token.ok_or_else(|| server::Error {
            status_code: StatusCode::UNAUTHORIZED,
            message: "missing user_token".into(),
        })?;

        let body = body.ok_or_else(|| server::Error {
            status_code: StatusCode::BAD_REQUEST,
            message: "missing request body".into(),
        })?;

        let res = self
            .api
            .delegate(&user_token, body)
            .await
            .map_err(|err| server::Error {
                status_code: err.status_code(),
                message: "delegation failed".into(),
            })?;

        Ok(server::response::json(StatusCode::OK, &res))
    }
}
