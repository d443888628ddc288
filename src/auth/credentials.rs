//! Login credential check against the single configured account

use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::auth::password::verify_password;
use crate::config::{Credential, GatewayConfig};

/// Validates submitted username/password pairs
#[derive(Clone)]
pub struct CredentialValidator {
    config: Arc<GatewayConfig>,
}

impl CredentialValidator {
    pub fn new(config: Arc<GatewayConfig>) -> Self {
        Self { config }
    }

    /// True iff both the username and the password match the configuration.
    ///
    /// Callers must not reveal which of the two was wrong.
    pub fn validate(&self, username: &str, password: &str) -> bool {
        if !constant_time_eq(username, &self.config.username) {
            return false;
        }

        match &self.config.credential {
            Credential::Hash { hash, .. } => match verify_password(password, hash) {
                Ok(valid) => valid,
                Err(e) => {
                    // Hash was checked at startup; reaching this means the backend refused it
                    warn!("Password verification error: {}", e);
                    false
                }
            },
            Credential::Plaintext(expected) => constant_time_eq(password, expected),
        }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
