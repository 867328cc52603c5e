//! Configuration key access and validation.
//!
//! Provides a type-safe interface for getting and setting configuration
//! values by `section.key` name, with validation through value
//! specifications.

use std::str::FromStr;
use thiserror::Error;

use super::parser::expand_tilde;
use super::settings::ConfigFile;
use super::writer::path_to_string;

/// Errors that can occur when getting or setting configuration values.
#[derive(Debug, Error)]
pub enum ConfigKeyError {
    /// Unknown configuration key.
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    /// Validation failed for the value.
    #[error("Invalid value for {key}: {reason}")]
    ValidationFailed { key: String, reason: String },
}

/// Supported configuration keys.
///
/// Each key maps to a specific field in [`ConfigFile`] and knows how to
/// get and set its value with proper validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    // Scheduler settings
    SchedulerMaxConcurrency,
    SchedulerLeaseTimeoutSecs,
    SchedulerShutdownGraceSecs,

    // Pool settings
    PoolCapacity,
    PoolPrewarm,
    PoolNavigationRetries,
    PoolElementWaitSecs,

    // Sweeper settings
    SweeperIntervalSecs,
    SweeperRetentionSecs,
    SweeperLeaseIdleSecs,

    // Logging settings
    LoggingFile,
}

impl FromStr for ConfigKey {
    type Err = ConfigKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|key| key.name() == lower)
            .ok_or_else(|| ConfigKeyError::UnknownKey(s.to_string()))
    }
}

impl ConfigKey {
    /// Get the canonical key name (e.g., "pool.capacity").
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::SchedulerMaxConcurrency => "scheduler.max_concurrency",
            ConfigKey::SchedulerLeaseTimeoutSecs => "scheduler.lease_timeout_secs",
            ConfigKey::SchedulerShutdownGraceSecs => "scheduler.shutdown_grace_secs",
            ConfigKey::PoolCapacity => "pool.capacity",
            ConfigKey::PoolPrewarm => "pool.prewarm",
            ConfigKey::PoolNavigationRetries => "pool.navigation_retries",
            ConfigKey::PoolElementWaitSecs => "pool.element_wait_secs",
            ConfigKey::SweeperIntervalSecs => "sweeper.interval_secs",
            ConfigKey::SweeperRetentionSecs => "sweeper.retention_secs",
            ConfigKey::SweeperLeaseIdleSecs => "sweeper.lease_idle_secs",
            ConfigKey::LoggingFile => "logging.file",
        }
    }

    /// Get the section name (e.g., "pool").
    pub fn section(&self) -> &'static str {
        self.name().split('.').next().unwrap_or("")
    }

    /// Get the key name within the section (e.g., "capacity").
    pub fn key_name(&self) -> &'static str {
        self.name().split('.').nth(1).unwrap_or(self.name())
    }

    /// Get the value from a config file as a string.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::SchedulerMaxConcurrency => config.scheduler.max_concurrency.to_string(),
            ConfigKey::SchedulerLeaseTimeoutSecs => config.scheduler.lease_timeout_secs.to_string(),
            ConfigKey::SchedulerShutdownGraceSecs => {
                config.scheduler.shutdown_grace_secs.to_string()
            }
            ConfigKey::PoolCapacity => config.pool.capacity.to_string(),
            ConfigKey::PoolPrewarm => config.pool.prewarm.to_string(),
            ConfigKey::PoolNavigationRetries => config.pool.navigation_retries.to_string(),
            ConfigKey::PoolElementWaitSecs => config.pool.element_wait_secs.to_string(),
            ConfigKey::SweeperIntervalSecs => config.sweeper.interval_secs.to_string(),
            ConfigKey::SweeperRetentionSecs => config.sweeper.retention_secs.to_string(),
            ConfigKey::SweeperLeaseIdleSecs => config.sweeper.lease_idle_secs.to_string(),
            ConfigKey::LoggingFile => path_to_string(&config.logging.file),
        }
    }

    /// Set the value in a config file.
    ///
    /// Validates the value according to the key's specification before setting.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigKeyError> {
        self.validate(value)?;
        let value = value.trim();
        match self {
            ConfigKey::SchedulerMaxConcurrency => {
                config.scheduler.max_concurrency = self.parse(value)?
            }
            ConfigKey::SchedulerLeaseTimeoutSecs => {
                config.scheduler.lease_timeout_secs = self.parse(value)?
            }
            ConfigKey::SchedulerShutdownGraceSecs => {
                config.scheduler.shutdown_grace_secs = self.parse(value)?
            }
            ConfigKey::PoolCapacity => config.pool.capacity = self.parse(value)?,
            ConfigKey::PoolPrewarm => config.pool.prewarm = self.parse(value)?,
            ConfigKey::PoolNavigationRetries => config.pool.navigation_retries = self.parse(value)?,
            ConfigKey::PoolElementWaitSecs => config.pool.element_wait_secs = self.parse(value)?,
            ConfigKey::SweeperIntervalSecs => config.sweeper.interval_secs = self.parse(value)?,
            ConfigKey::SweeperRetentionSecs => config.sweeper.retention_secs = self.parse(value)?,
            ConfigKey::SweeperLeaseIdleSecs => config.sweeper.lease_idle_secs = self.parse(value)?,
            ConfigKey::LoggingFile => config.logging.file = expand_tilde(value),
        }
        Ok(())
    }

    fn parse<T: FromStr>(&self, value: &str) -> Result<T, ConfigKeyError> {
        value.parse().map_err(|_| ConfigKeyError::ValidationFailed {
            key: self.name().to_string(),
            reason: "value out of range".to_string(),
        })
    }

    /// Validate a value according to this key's specification.
    pub fn validate(&self, value: &str) -> Result<(), ConfigKeyError> {
        self.specification()
            .is_satisfied_by(value.trim())
            .map_err(|reason| ConfigKeyError::ValidationFailed {
                key: self.name().to_string(),
                reason,
            })
    }

    /// Get the validation specification for this key.
    fn specification(&self) -> Box<dyn ValueSpecification> {
        match self {
            ConfigKey::SchedulerMaxConcurrency
            | ConfigKey::SchedulerLeaseTimeoutSecs
            | ConfigKey::PoolNavigationRetries
            | ConfigKey::SweeperIntervalSecs
            | ConfigKey::SweeperLeaseIdleSecs => Box::new(PositiveIntegerSpec),
            ConfigKey::SchedulerShutdownGraceSecs
            | ConfigKey::PoolCapacity
            | ConfigKey::PoolPrewarm
            | ConfigKey::PoolElementWaitSecs
            | ConfigKey::SweeperRetentionSecs => Box::new(NonNegativeIntegerSpec),
            ConfigKey::LoggingFile => Box::new(PathSpec),
        }
    }

    /// Get all supported configuration keys.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::SchedulerMaxConcurrency,
            ConfigKey::SchedulerLeaseTimeoutSecs,
            ConfigKey::SchedulerShutdownGraceSecs,
            ConfigKey::PoolCapacity,
            ConfigKey::PoolPrewarm,
            ConfigKey::PoolNavigationRetries,
            ConfigKey::PoolElementWaitSecs,
            ConfigKey::SweeperIntervalSecs,
            ConfigKey::SweeperRetentionSecs,
            ConfigKey::SweeperLeaseIdleSecs,
            ConfigKey::LoggingFile,
        ]
    }
}

// ============================================================================
// Value Specifications
// ============================================================================

trait ValueSpecification {
    /// Returns Ok(()) if valid, Err(reason) if invalid.
    fn is_satisfied_by(&self, value: &str) -> Result<(), String>;
}

/// Integers `>= 0`.
struct NonNegativeIntegerSpec;

impl ValueSpecification for NonNegativeIntegerSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        value
            .parse::<u64>()
            .map(|_| ())
            .map_err(|_| "must be a non-negative integer".to_string())
    }
}

/// Integers `> 0`.
struct PositiveIntegerSpec;

impl ValueSpecification for PositiveIntegerSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        match value.parse::<u64>() {
            Ok(n) if n > 0 => Ok(()),
            _ => Err("must be a positive integer".to_string()),
        }
    }
}

/// Specification for path values (non-empty).
struct PathSpec;

impl ValueSpecification for PathSpec {
    fn is_satisfied_by(&self, value: &str) -> Result<(), String> {
        if value.is_empty() {
            Err("must be a valid path".to_string())
        } else {
            Ok(())
        }
    }
}
