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

use std::{error::Error as StdError, sync::Arc};

use attestation_registry::AttestationRegistry;
use ca_core::CaCore;
use error::Error;
use trust_core_config::TrustCoreServerConfig;

mod error;

const CONFIG_DEFAULT_PATH: &str = "/etc/trust-core/workload-api.toml";

#[tokio::main]
async fn main() {
    logger::try_init()
        .expect("cannot fail to initialize global logger from the process entrypoint");

    log::info!("Starting Workload API / CA");
    if let Err(err) = main_inner().await {
        log::error!("{}", err);

        let mut source = StdError::source(&*err);
        while let Some(err) = source {
            log::error!("caused by: {}", err);
            source = StdError::source(err);
        }

        std::process::exit(1);
    }
}

async fn main_inner() -> Result<(), Box<dyn StdError>> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| CONFIG_DEFAULT_PATH.to_string());

    let config = TrustCoreServerConfig::load_config(&path).map_err(Error::ErrorParsingConfig)?;

    let key_store = key_store::KeyStoreFactory::get(&config.key_store);
    let ca = Arc::new(CaCore::init(&config.trust_domain, &config.ca, key_store).await?);
    let registry = Arc::new(AttestationRegistry::new(&config.attestation_registry, &config.trust_domain));

    let handle = workload_api_service::start_workload_api(&config.server, ca, registry)
        .await
        .map_err(Error::StartServer)?;

    handle.await??;

    Ok(())
}
