// Copyright (c) Microsoft. All rights reserved.

mod delegate;
mod login;
mod register;
mod validate;

#[derive(Clone)]
pub struct Service {
    pub(crate) api: crate::Api,
}

http_common::make_service! {
    service: Service,
    api_version: delegation_api_types::ApiVersion,
    routes: [
        register::Route,
        login::Route,
        delegate::Route,
        validate::Route,
    ],
}
