// Copyright (c) Microsoft. All rights reserved.

use std::collections::HashMap;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::Error;

struct User {
    user_id: Uuid,
    #[allow(dead_code)]
    email: String,
    password_hash: String,
}

/// In-memory user directory backing the user-auth shell (spec §6). Keyed by
/// username; holds a salted Argon2 hash only, never the password itself, the
/// same `parking_lot::RwLock<HashMap<..>>` shape `AttestationRegistry` uses
/// for its own short-critical-section in-memory store.
pub struct UserStore {
    users: RwLock<HashMap<String, User>>,
}

impl UserStore {
    #[must_use]
    pub fn new() -> Self {
        UserStore {
            users: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, username: &str, email: &str, password: &str) -> Result<Uuid, Error> {
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(Error::MalformedRequest(
                "username, email and password must not be empty",
            ));
        }

        let mut users = self.users.write();
        if users.contains_key(username) {
            return Err(Error::DuplicateUsername);
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(Error::PasswordHashing)?
            .to_string();

        let user_id = Uuid::new_v4();
        users.insert(
            username.to_string(),
            User {
                user_id,
                email: email.to_string(),
                password_hash,
            },
        );

        Ok(user_id)
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Result<Uuid, Error> {
        let users = self.users.read();
        let user = users.get(username).ok_or(Error::BadCredentials)?;

        let parsed_hash =
            PasswordHash::new(&user.password_hash).map_err(Error::PasswordHashing)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| Error::BadCredentials)?;

        Ok(user.user_id)
    }
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}
