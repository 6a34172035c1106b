use anyhow::{bail, Context, Result};
use dots_screentime_common::security::{PinManager, RateLimiter};
use dots_screentime_db::queries::SettingsQueries;
use dots_screentime_db::Database;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

const PIN_HASH_KEY: &str = "pin_hash";

/// Parental PIN stored as an Argon2id hash in the settings table.
pub struct PinService {
    db: Database,
    limiter: Mutex<RateLimiter>,
}

impl PinService {
    pub fn new(db: Database) -> Self {
        Self { db, limiter: Mutex::new(RateLimiter::new()) }
    }

    pub async fn has_pin(&self) -> Result<bool> {
        Ok(SettingsQueries::get(&self.db, PIN_HASH_KEY).await?.is_some())
    }

    /// Check a PIN. Succeeds when no PIN is set. Fails with an error while
    /// too many recent attempts were wrong.
    pub async fn verify(&self, pin: &SecretString) -> Result<bool> {
        let Some(hash) = SettingsQueries::get(&self.db, PIN_HASH_KEY).await? else {
            return Ok(true);
        };

        if !self.limiter.lock().check_rate_limit() {
            bail!("Too many failed PIN attempts");
        }

        let valid = PinManager::verify_pin(pin, &hash)?;
        self.limiter.lock().record_attempt(valid);
        if !valid {
            warn!("Incorrect PIN entered");
        }
        Ok(valid)
    }

    /// Replace the PIN. The old PIN must match when one is set; an empty
    /// new PIN removes protection.
    pub async fn set(&self, old_pin: &SecretString, new_pin: &SecretString) -> Result<bool> {
        if !self.verify(old_pin).await? {
            return Ok(false);
        }

        let new_pin = new_pin.expose_secret().trim();
        if new_pin.is_empty() {
            SettingsQueries::delete(&self.db, PIN_HASH_KEY).await?;
            info!("PIN removed");
            return Ok(true);
        }

        let hash = PinManager::hash_pin(&SecretString::from(new_pin.to_string()))?;
        SettingsQueries::set(&self.db, PIN_HASH_KEY, &hash)
            .await
            .context("Failed to store PIN hash")?;
        info!("PIN updated");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dots_screentime_db::DatabaseConfig;

    async fn service() -> (PinService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pin.db");
        let db = Database::new(DatabaseConfig::at(&path))
            .await
            .unwrap();
        db.run_migrations().await.unwrap();
        (PinService::new(db), dir)
    }

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[tokio::test]
    async fn test_bdd_given_no_pin_when_verifying_then_anything_passes() {
        let (pins, _dir) = service().await;
        assert!(!pins.has_pin().await.unwrap());
        assert!(pins.verify(&secret("whatever")).await.unwrap());
    }

    #[tokio::test]
    async fn test_bdd_given_pin_set_when_verifying_then_only_match_passes() {
        let (pins, _dir) = service().await;
        assert!(pins.set(&secret(""), &secret("4821")).await.unwrap());

        assert!(pins.verify(&secret("4821")).await.unwrap());
        assert!(!pins.verify(&secret("1111")).await.unwrap());

        let stored = SettingsQueries::get(&pins.db, PIN_HASH_KEY).await.unwrap().unwrap();
        assert!(stored.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn test_bdd_given_wrong_old_pin_when_changing_then_rejected() {
        let (pins, _dir) = service().await;
        pins.set(&secret(""), &secret("4821")).await.unwrap();

        assert!(!pins.set(&secret("0000"), &secret("9999")).await.unwrap());
        assert!(pins.verify(&secret("4821")).await.unwrap());

        assert!(pins.set(&secret("4821"), &secret("")).await.unwrap());
        assert!(!pins.has_pin().await.unwrap());
    }

    #[tokio::test]
    async fn test_bdd_given_five_failures_when_verifying_then_locked_out() {
        let (pins, _dir) = service().await;
        pins.set(&secret(""), &secret("4821")).await.unwrap();

        for _ in 0..5 {
            assert!(!pins.verify(&secret("0000")).await.unwrap());
        }

        let locked = pins.verify(&secret("4821")).await;
        assert!(locked.unwrap_err().to_string().contains("Too many failed PIN attempts"));
    }
}
