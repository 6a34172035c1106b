use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{Error, Result};

/// PIN hashing and verification using Argon2id
pub struct PinManager;

impl PinManager {
    /// Hash a PIN with a fresh random salt
    pub fn hash_pin(pin: &SecretString) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(pin.expose_secret().as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::Security(format!("Failed to hash PIN: {}", e)))
    }

    /// Verify a PIN against a stored PHC hash string
    pub fn verify_pin(pin: &SecretString, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| Error::Security(format!("Stored PIN hash is corrupt: {}", e)))?;

        match Argon2::default().verify_password(pin.expose_secret().as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Security(format!("Failed to verify PIN: {}", e))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PinAttempt {
    pub timestamp: DateTime<Utc>,
    pub successful: bool,
}

/// Rate limiting for PIN attempts
#[derive(Debug)]
pub struct RateLimiter {
    attempts: Vec<PinAttempt>,
    max_attempts: usize,
    window_minutes: i64,
}

impl RateLimiter {
    /// Create a new rate limiter (5 failed attempts per 15 minutes)
    pub fn new() -> Self {
        Self { attempts: Vec::new(), max_attempts: 5, window_minutes: 15 }
    }

    /// Check whether another attempt should be allowed
    pub fn check_rate_limit(&mut self) -> bool {
        let cutoff = Utc::now() - Duration::minutes(self.window_minutes);
        self.attempts.retain(|attempt| attempt.timestamp > cutoff);

        // A success inside the window clears the lockout
        if let Some(last_success) = self.attempts.iter().rposition(|a| a.successful) {
            self.attempts.drain(..=last_success);
        }

        let recent_failures = self.attempts.len();
        if recent_failures >= self.max_attempts {
            tracing::warn!(
                "PIN rate limit exceeded: {} failed attempts in {} minutes",
                recent_failures,
                self.window_minutes
            );
            false
        } else {
            true
        }
    }

    pub fn record_attempt(&mut self, successful: bool) {
        self.attempts.push(PinAttempt { timestamp: Utc::now(), successful });
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_hashing_and_verification() {
        let pin = SecretString::new("4821".to_string().into());

        let hash = PinManager::hash_pin(&pin).expect("Failed to hash PIN");
        assert!(hash.starts_with("$argon2"));

        assert!(PinManager::verify_pin(&pin, &hash).expect("Failed to verify PIN"));

        let wrong_pin = SecretString::new("0000".to_string().into());
        assert!(!PinManager::verify_pin(&wrong_pin, &hash).expect("Failed to verify wrong PIN"));
    }

    #[test]
    fn test_same_pin_hashes_differently() {
        let pin = SecretString::new("1234".to_string().into());
        let first = PinManager::hash_pin(&pin).unwrap();
        let second = PinManager::hash_pin(&pin).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_corrupt_hash_is_an_error() {
        let pin = SecretString::new("1234".to_string().into());
        assert!(PinManager::verify_pin(&pin, "not-a-hash").is_err());
    }

    #[test]
    fn test_rate_limiting() {
        let mut limiter = RateLimiter::new();

        assert!(limiter.check_rate_limit());

        for _ in 0..5 {
            limiter.record_attempt(false);
        }
        assert!(!limiter.check_rate_limit());

        limiter.record_attempt(true);
        assert!(limiter.check_rate_limit());
    }
}
