// Copyright (c) Microsoft. All rights reserved.

use std::borrow::Cow;

use http::{Extensions, StatusCode};
use http_common::{server, DynRangeBounds};
use workload_api_types::ApiVersion;

use crate::Api;

/// Query parameter the bearer ticket travels in. `http_common`'s
/// `server::Route::from_uri` surfaces path and query only, no header
/// access (see `identity_agent::http::Client`'s matching client-side
/// convention), so the `Authorization: Bearer <ticket>` header spec §4.3
/// describes is carried as `?ticket=<ticket>` instead.
const TICKET_QUERY_PARAM: &str = "ticket";
const SERVICE_NAME_QUERY_PARAM: &str = "service_name";

pub(super) struct Route {
    service_name: Option<String>,
    ticket: Option<String>,
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
        query: &[(Cow<'_, str>, Cow<'_, str>)],
        _extensions: &Extensions,
    ) -> Option<Self> {
        if path != crate::uri::CERTIFICATES {
            return None;
        }

        let mut service_name = None;
        let mut ticket = None;
        for (key, value) in query {
            match key.as_ref() {
                SERVICE_NAME_QUERY_PARAM => service_name = Some(value.to_string()),
                TICKET_QUERY_PARAM => ticket = Some(value.to_string()),
                _ => {}
            }
        }

        Some(Route {
            service_name,
            ticket,
            api: service.api.clone(),
        })
    }

    async fn get(self) -> server::RouteResponse {
        let service_name = self.service_name.ok_or_else(|| server::Error {
            status_code: StatusCode::BAD_REQUEST,
            message: "missing service_name".into(),
        })?;

        let ticket = self.ticket.ok_or_else(|| server::Error {
            status_code: StatusCode::UNAUTHORIZED,
            message: "missing ticket".into(),
        })?;

        let res = self
            .api
            .certificates(&service_name, &ticket)
            .await
            .map_err(|err| server::Error {
                status_code: err.status_code(),
                message: "could not issue certificate bundle".into(),
            })?;

        Ok(server::response::json(StatusCode::OK, &res))
    }
}
