//! Admin credential checks for HTTP basic authentication
//!
//! Pure functions only; the HTTP middleware lives in the web crate.
//!
//! The documented placeholder password `default_pass` is never accepted,
//! even when configured, and neither is an empty password. A deployment
//! left on the placeholder therefore rejects every request.

use sha2::{Digest, Sha256};

/// Placeholder password that must never authenticate
pub const REJECTED_DEFAULT_PASSWORD: &str = "default_pass";

/// The single configured admin identity
#[derive(Clone)]
pub struct AdminCredentials {
    username: String,
    password_digest: Option<[u8; 32]>,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("usable", &self.is_usable())
            .finish()
    }
}

impl AdminCredentials {
    pub fn new(username: impl Into<String>, password: Option<&str>) -> Self {
        let password_digest = password
            .filter(|p| !p.is_empty() && *p != REJECTED_DEFAULT_PASSWORD)
            .map(digest);
        Self {
            username: username.into(),
            password_digest,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// False when no acceptable password is configured
    pub fn is_usable(&self) -> bool {
        self.password_digest.is_some()
    }

    /// Check submitted basic-auth credentials
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let Some(expected) = self.password_digest else {
            return false;
        };
        if password == REJECTED_DEFAULT_PASSWORD {
            return false;
        }
        // Compare fixed-size digests so timing does not depend on input length
        let user_ok = digest(username) == digest(&self.username);
        let pass_ok = digest(password) == expected;
        user_ok & pass_ok
    }
}

fn digest(value: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(value.as_bytes()));
    out
}

/// Split a decoded `user:password` basic-auth payload
pub fn split_basic_credentials(decoded: &str) -> Option<(&str, &str)> {
    decoded.split_once(':')
}
