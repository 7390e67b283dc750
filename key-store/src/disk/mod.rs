// Copyright (c) Microsoft. All rights reserved.

use std::path::{Path, PathBuf};

use core_objects::KeyType;
use openssl::{
    hash::MessageDigest,
    pkey::{self, PKey, Public},
    rsa::Rsa,
    sign::Signer,
};
use tokio::fs;
use trust_core_config::KeyStoreConfigDisk;

pub mod error;

use error::Error;

use crate::KeyStore as KeyStoreTrait;

struct KeyPair {
    public_key: PKey<Public>,
    private_key: PKey<pkey::Private>,
}

pub struct KeyStore {
    key_base_path: PathBuf,
}

impl KeyStore {
    #[must_use]
    pub fn new(config: &KeyStoreConfigDisk) -> Self {
        let key_base_path = Path::new(&config.key_base_path).to_path_buf();
        KeyStore { key_base_path }
    }

    fn get_key_path(&self, id: &str) -> PathBuf {
        let mut path = self.key_base_path.clone();
        path.push(Path::new(id));
        path
    }
}

#[async_trait::async_trait]
impl KeyStoreTrait for KeyStore {
    async fn create_key_pair_if_not_exists(
        &self,
        id: &str,
        key_type: KeyType,
    ) -> Result<PKey<Public>, Box<dyn std::error::Error + Send>> {
        let path = &self.get_key_path(id);

        let key_pair = if let Some(key_pair) = load_inner(path).await? {
            key_pair
        } else {
            create_inner(path, key_type).await?;

            load_inner(path).await?.ok_or_else(|| {
                Box::new(Error::KeyNotFound(
                    "key created successfully but could not be found".to_string(),
                )) as _
            })?
        };

        Ok(key_pair.public_key)
    }

    async fn sign(
        &self,
        id: &str,
        key_type: KeyType,
        digest: &[u8],
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send>> {
        let path = &self.get_key_path(id);

        let key_pair = load_inner(path)
            .await?
            .ok_or_else(|| Box::new(Error::KeyNotFound("could not find key for signing".to_string())) as _)?;

        match key_type {
            KeyType::Rsa2048 => {
                let mut signer = Signer::new(MessageDigest::sha256(), &key_pair.private_key)
                    .map_err(|err| Box::new(Error::Openssl(err)) as _)?;
                signer
                    .update(digest)
                    .map_err(|err| Box::new(Error::Openssl(err)) as _)?;
                signer
                    .sign_to_vec()
                    .map_err(|err| Box::new(Error::Openssl(err)) as _)
            }
        }
    }

    async fn get_public_key(
        &self,
        id: &str,
    ) -> Result<PKey<Public>, Box<dyn std::error::Error + Send>> {
        let path = &self.get_key_path(id);

        let key_pair = load_inner(path)
            .await?
            .ok_or_else(|| Box::new(Error::KeyNotFound("cannot get public key".to_string())) as _)?;

        Ok(key_pair.public_key)
    }

    async fn get_private_key_pem(
        &self,
        id: &str,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send>> {
        let path = &self.get_key_path(id);

        fs::read(path)
            .await
            .map_err(|err| Box::new(Error::FileReadError(err)) as _)
    }

    async fn delete_key_pair(&self, id: &str) -> Result<(), Box<dyn std::error::Error + Send>> {
        let path = &self.get_key_path(id);

        fs::remove_file(path)
            .await
            .map_err(|err| Box::new(Error::FileDelete(err)) as _)
    }
}

async fn load_inner(path: &Path) -> Result<Option<KeyPair>, Box<dyn std::error::Error + Send>> {
    match fs::read(path).await {
        Ok(private_key_pem) => {
            let private_key = PKey::private_key_from_pem(&private_key_pem)
                .map_err(|err| Box::new(Error::Openssl(err)) as _)?;

            let public_key_der = private_key
                .public_key_to_der()
                .map_err(|err| Box::new(Error::Openssl(err)) as _)?;
            let public_key = PKey::public_key_from_der(&public_key_der)
                .map_err(|err| Box::new(Error::Openssl(err)) as _)?;

            Ok(Some(KeyPair {
                public_key,
                private_key,
            }))
        }

        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),

        Err(err) => Err(Box::new(Error::FileReadError(err))),
    }
}

async fn create_inner(
    path: &Path,
    preferred_algorithm: KeyType,
) -> Result<KeyPair, Box<dyn std::error::Error + Send>> {
    let private_key = match preferred_algorithm {
        KeyType::Rsa2048 => {
            let rsa = Rsa::generate(2048).map_err(|err| Box::new(Error::Openssl(err)) as _)?;
            PKey::from_rsa(rsa).map_err(|err| Box::new(Error::Openssl(err)) as _)?
        }
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|err| Box::new(Error::FileWrite(err)) as _)?;
    }

    let private_key_pem = private_key
        .private_key_to_pem_pkcs8()
        .map_err(|err| Box::new(Error::Openssl(err)) as _)?;
    fs::write(path, &private_key_pem)
        .await
        .map_err(|err| Box::new(Error::FileWrite(err)) as _)?;

    let public_key_der = private_key
        .public_key_to_der()
        .map_err(|err| Box::new(Error::Openssl(err)) as _)?;
    let public_key = PKey::public_key_from_der(&public_key_der)
        .map_err(|err| Box::new(Error::Openssl(err)) as _)?;

    Ok(KeyPair {
        public_key,
        private_key,
    })
}
