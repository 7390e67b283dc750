// Copyright (c) Microsoft. All rights reserved.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("attestation proof was rejected")]
    ProofRejected,
    #[error("attestation ticket not found or already redeemed")]
    TicketNotFound,
    #[error("attestation ticket has expired")]
    TicketExpired,
}
