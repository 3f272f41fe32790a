use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::AppError;

/// Argon2id cost parameters. The production defaults put a single hash above 50 ms.
#[derive(Debug, Clone, Copy)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        HashCost {
            memory_kib: 19 * 1024,
            iterations: 2,
        }
    }
}

fn argon2(cost: HashCost) -> Result<Argon2<'static>, AppError> {
    let params = Params::new(cost.memory_kib, cost.iterations, 1, None)
        .map_err(|e| AppError::Config(format!("Invalid Argon2 parameters: {}", e)))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Generate a cryptographically secure random salt
fn generate_salt() -> Result<SaltString, AppError> {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    SaltString::encode_b64(&bytes)
        .map_err(|e| AppError::Internal(format!("Salt encoding failed: {}", e)))
}

/// Hash a password with Argon2id; the result is a self-describing PHC string.
pub fn hash_password(password: &str, cost: HashCost) -> Result<String, AppError> {
    let salt = generate_salt()?;
    let hash = argon2(cost)?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored PHC string. Parameters come from the string itself.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AppError::Internal(format!("Stored password hash is corrupt: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(format!("Password verification failed: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHEAP: HashCost = HashCost {
        memory_kib: 64,
        iterations: 1,
    };

    #[test]
    fn test_hash_verify() {
        let password = "test_password_123";

        let hash = hash_password(password, CHEAP).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("Hunter22x", CHEAP).unwrap();
        let b = hash_password("Hunter22x", CHEAP).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_corrupt_hash_is_error() {
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }
}
