//! Relay worker configuration

use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use super::error::ValidationError;

/// Outbox relay configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Sleep between relay cycles, in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Maximum records fetched per cycle
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Attempts ceiling before a record is quarantined
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,

    /// Row-claim expiry, in seconds (multi-instance safety)
    #[serde(default = "default_claim_expiry")]
    pub claim_expiry_secs: u64,

    /// Identifier stamped on claimed rows
    #[serde(default = "default_worker_id")]
    pub worker_id: String,
}

impl RelayConfig {
    /// Get poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Get claim expiry as Duration
    pub fn claim_expiry(&self) -> Duration {
        Duration::from_secs(self.claim_expiry_secs)
    }

    /// Validate relay configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_secs == 0 {
            return Err(ValidationError::InvalidPollInterval);
        }
        if self.batch_size == 0 {
            return Err(ValidationError::InvalidBatchSize);
        }
        if self.max_attempts <= 0 {
            return Err(ValidationError::InvalidMaxAttempts);
        }
        if self.claim_expiry_secs == 0 {
            return Err(ValidationError::InvalidClaimExpiry);
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            claim_expiry_secs: default_claim_expiry(),
            worker_id: default_worker_id(),
        }
    }
}

fn default_poll_interval() -> u64 {
    10
}

fn default_batch_size() -> u32 {
    20
}

fn default_max_attempts() -> i32 {
    5
}

fn default_claim_expiry() -> u64 {
    60
}

fn default_worker_id() -> String {
    format!("courier-{}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.claim_expiry(), Duration::from_secs(60));
        assert!(config.worker_id.starts_with("courier-"));
    }

    #[test]
    fn test_worker_ids_are_unique() {
        assert_ne!(default_worker_id(), default_worker_id());
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let mut config = RelayConfig::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.poll_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_accepts_defaults() {
        assert!(RelayConfig::default().validate().is_ok());
    }
}
