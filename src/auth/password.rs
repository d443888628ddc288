//! Password hashing and verification
//!
//! Argon2id is the default for new hashes. bcrypt hashes (`$2a$`, `$2b$`,
//! `$2y$`) are accepted as well so existing deployments keep their
//! configured hash.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::types::GatewayError;

/// Supported one-way hash formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordHashKind {
    Argon2,
    Bcrypt,
}

impl PasswordHashKind {
    /// Identify the hash format, rejecting anything that cannot be verified
    pub fn detect(hash: &str) -> Result<Self, GatewayError> {
        if is_bcrypt(hash) {
            // bcrypt strings are fixed width: $2b$NN$ + 53 chars of salt and digest
            if hash.len() != 60 {
                return Err(GatewayError::Config(
                    "password hash looks like bcrypt but has the wrong length".into(),
                ));
            }
            return Ok(PasswordHashKind::Bcrypt);
        }

        PasswordHash::new(hash)
            .map(|_| PasswordHashKind::Argon2)
            .map_err(|e| GatewayError::Config(format!("Invalid password hash format: {e}")))
    }

    pub fn label(&self) -> &'static str {
        match self {
            PasswordHashKind::Argon2 => "argon2",
            PasswordHashKind::Bcrypt => "bcrypt",
        }
    }
}

fn is_bcrypt(hash: &str) -> bool {
    ["$2a$", "$2b$", "$2x$", "$2y$"]
        .iter()
        .any(|prefix| hash.starts_with(prefix))
}

/// Hash a password using Argon2id
///
/// Returns the PHC-formatted hash string that includes the salt and parameters.
pub fn hash_password(password: &str) -> Result<String, GatewayError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| GatewayError::Auth(format!("Failed to hash password: {e}")))
}

/// Hash a password using bcrypt with the given cost
pub fn hash_password_bcrypt(password: &str, cost: u32) -> Result<String, GatewayError> {
    bcrypt::hash(password, cost)
        .map_err(|e| GatewayError::Auth(format!("Failed to hash password: {e}")))
}

/// Verify a password against a stored hash
///
/// Returns true if the password matches the hash. Both backends compare the
/// derived digest in constant time.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, GatewayError> {
    if is_bcrypt(hash) {
        return bcrypt::verify(password, hash)
            .map_err(|e| GatewayError::Auth(format!("Invalid bcrypt hash: {e}")));
    }

    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| GatewayError::Auth(format!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).unwrap();

        // Hash should be in PHC format
        assert!(hash.starts_with("$argon2"));
        assert_eq!(PasswordHashKind::detect(&hash).unwrap(), PasswordHashKind::Argon2);

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn test_different_salts() {
        let password = "same-password";
        let hash1 = hash_password(password).unwrap();
        let hash2 = hash_password(password).unwrap();

        assert_ne!(hash1, hash2);
        assert!(verify_password(password, &hash1).unwrap());
        assert!(verify_password(password, &hash2).unwrap());
    }

    #[test]
    fn test_bcrypt_verify() {
        let hash = hash_password_bcrypt("letmein", 4).unwrap();
        assert_eq!(PasswordHashKind::detect(&hash).unwrap(), PasswordHashKind::Bcrypt);

        assert!(verify_password("letmein", &hash).unwrap());
        assert!(!verify_password("letmeout", &hash).unwrap());
    }

    #[test]
    fn test_invalid_hash_format() {
        assert!(verify_password("password", "not-a-valid-hash").is_err());
        assert!(PasswordHashKind::detect("not-a-valid-hash").is_err());
        assert!(PasswordHashKind::detect("$2b$10$short").is_err());
    }
}
