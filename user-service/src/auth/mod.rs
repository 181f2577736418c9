use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::Rng;
use shared::auth::UNUSABLE_PASSWORD_PREFIX;

use crate::models::{UserError, UserResult};

/// Password hashing and one-time token generation.
pub struct AuthService;

impl AuthService {
    pub fn new() -> Self {
        Self
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> UserResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| UserError::Internal(format!("Failed to hash password: {}", e)))?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a hash. Accounts created from a public
    /// review link carry an unusable hash and never match.
    pub fn verify_password(&self, password: &str, password_hash: &str) -> UserResult<bool> {
        if password_hash.starts_with(UNUSABLE_PASSWORD_PREFIX) {
            return Ok(false);
        }

        let parsed_hash = PasswordHash::new(password_hash)
            .map_err(|e| UserError::Internal(format!("Invalid password hash: {}", e)))?;

        let argon2 = Argon2::default();

        match argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    /// Generate a URL-safe token for email verification / password reset
    pub fn generate_verification_token(&self) -> String {
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        const TOKEN_LEN: usize = 48;
        let mut rng = rand::thread_rng();

        (0..TOKEN_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }
}

impl Default for AuthService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing() {
        let auth_service = AuthService::new();
        let password = "SecurePassword123!";

        let hash = auth_service.hash_password(password).unwrap();
        assert!(auth_service.verify_password(password, &hash).unwrap());
        assert!(!auth_service.verify_password("WrongPassword", &hash).unwrap());
    }

    #[test]
    fn test_unusable_password_never_matches() {
        let auth_service = AuthService::new();
        assert!(!auth_service.verify_password("", "!abc").unwrap());
    }

    #[test]
    fn test_verification_token_generation() {
        let auth_service = AuthService::new();
        let token = auth_service.generate_verification_token();

        assert_eq!(token.len(), 48);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, auth_service.generate_verification_token());
    }
}
