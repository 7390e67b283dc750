// Copyright (c) Microsoft. All rights reserved.

mod attest;
mod certificates;
mod health;

#[derive(Clone)]
pub struct Service {
    pub(crate) api: crate::Api,
}

http_common::make_service! {
    service: Service,
    api_version: workload_api_types::ApiVersion,
    routes: [
        attest::Route,
        certificates::Route,
        health::Route,
    ],
}
