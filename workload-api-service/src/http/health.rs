// Copyright (c) Microsoft. All rights reserved.

use std::borrow::Cow;

use http::{Extensions, StatusCode};
use http_common::{server, DynRangeBounds};
use workload_api_types::ApiVersion;

use crate::Api;

pub(super) struct Route {
    api: Api,
}

#[async_trait::async_trait]
impl server::Route for Route {
    type ApiVersion = ApiVersion;
    type Service = super::Service;
    type DeleteBody = serde::de::IgnoredAny;
    type PostBody = serde::de::IgnoredAny;
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
        if path != crate::uri::HEALTH {
            return None;
        }

        Some(Route {
            api: service.api.clone(),
        })
    }

    async fn get(self) -> server::RouteResponse {
        let res = self.api.health().await;
        Ok(server::response::json(StatusCode::OK, &res))
    }
}
