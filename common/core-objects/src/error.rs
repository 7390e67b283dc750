// Copyright (c) Microsoft. All rights reserved.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed SPIFFE ID {0:?}")]
    MalformedSpiffeId(String),
}
