use std::env;
use std::fmt;
use std::time::Duration;

use crate::matching::classifier::{RiskThresholds, ScoringThresholds};

/// Top-level configuration for the matching engine.
///
/// Every serving-time threshold is overridable through the environment so
/// operators can retune against observed outcomes without a code change.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Reschedule-rate percentage above which a window flags a tutor.
    pub risk_threshold: f64,
    pub thresholds: ScoringThresholds,
    /// TTL for the tutor risk summary read-through cache.
    pub summary_cache_ttl: Duration,
    /// Largest candidate pool the assignment solver accepts; bounds the
    /// O(n^3) solve and the n^2 prediction lookups behind it.
    pub max_pool_size: usize,
    pub telemetry: TelemetryConfig,
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            risk_threshold: 15.0,
            thresholds: ScoringThresholds::default(),
            summary_cache_ttl: Duration::from_secs(300),
            max_pool_size: 64,
            telemetry: TelemetryConfig {
                log_level: "info".to_string(),
            },
        }
    }
}

impl MatchingConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let risk_threshold = parse_var("TUTOR_RISK_THRESHOLD", defaults.risk_threshold)?;
        if !(0.0..=100.0).contains(&risk_threshold) {
            return Err(ConfigError::OutOfRange {
                name: "TUTOR_RISK_THRESHOLD",
                value: risk_threshold.to_string(),
                expected: "a percentage between 0 and 100",
            });
        }

        let match_risk = threshold_pair(
            "MATCH_RISK_THRESHOLD_LOW",
            "MATCH_RISK_THRESHOLD_HIGH",
            RiskThresholds::match_risk(),
        )?;
        let reschedule_risk = threshold_pair(
            "RESCHEDULE_RISK_THRESHOLD_LOW",
            "RESCHEDULE_RISK_THRESHOLD_HIGH",
            RiskThresholds::reschedule_risk(),
        )?;

        let ttl_secs = parse_var(
            "SUMMARY_CACHE_TTL_SECS",
            defaults.summary_cache_ttl.as_secs(),
        )?;

        let max_pool_size = parse_var("MAX_MATCHING_POOL", defaults.max_pool_size)?;
        if max_pool_size < 2 {
            return Err(ConfigError::OutOfRange {
                name: "MAX_MATCHING_POOL",
                value: max_pool_size.to_string(),
                expected: "at least 2",
            });
        }

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or(defaults.telemetry.log_level);

        Ok(Self {
            risk_threshold,
            thresholds: ScoringThresholds {
                match_risk,
                reschedule_risk,
            },
            summary_cache_ttl: Duration::from_secs(ttl_secs),
            max_pool_size,
            telemetry: TelemetryConfig { log_level },
        })
    }
}

fn threshold_pair(
    low_name: &'static str,
    high_name: &'static str,
    defaults: RiskThresholds,
) -> Result<RiskThresholds, ConfigError> {
    let low = parse_var(low_name, defaults.low)?;
    let high = parse_var(high_name, defaults.high)?;

    for (name, value) in [(low_name, low), (high_name, high)] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::OutOfRange {
                name,
                value: value.to_string(),
                expected: "a probability between 0 and 1",
            });
        }
    }

    if low >= high {
        return Err(ConfigError::ThresholdOrder {
            low_name,
            high_name,
        });
    }

    Ok(RiskThresholds { low, high })
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber {
                name,
                value: raw,
            }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidNumber {
        name: &'static str,
        value: String,
    },
    OutOfRange {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    ThresholdOrder {
        low_name: &'static str,
        high_name: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber { name, value } => {
                write!(f, "{name} must be numeric, got '{value}'")
            }
            ConfigError::OutOfRange {
                name,
                value,
                expected,
            } => write!(f, "{name} must be {expected}, got {value}"),
            ConfigError::ThresholdOrder {
                low_name,
                high_name,
            } => write!(f, "{low_name} must be strictly below {high_name}"),
        }
    }
}

impl std::error::Error for ConfigError {}
