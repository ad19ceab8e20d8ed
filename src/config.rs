use std::env;

use chrono::Duration as ChronoDuration;
use tokio::time::Duration;

use crate::error::AppError;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;
const MAX_FAIRNESS_WINDOW_HOURS: i64 = 24 * 365 * 10;
const MAX_BIDDING_LEAD_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: String,
    pub event_buffer_size: usize,
    pub sweep_interval: Duration,
    pub engine: EngineConfig,
}

/// Score weights. They must be non-negative and sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub rating: f64,
    pub availability: f64,
    pub price: f64,
    pub fairness: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            rating: 0.3,
            availability: 0.0,
            price: 0.5,
            fairness: 0.2,
        }
    }
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.rating + self.availability + self.price + self.fairness
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub weights: ScoreWeights,
    /// Bids scoring within this distance of the best score count as tied.
    pub tie_epsilon: f64,
    /// Normalized rating used for drivers that have not been rated yet.
    pub neutral_rating: f64,
    pub max_jobs_per_window: usize,
    pub fairness_window: ChronoDuration,
    /// How long before the scheduled start bidding closes.
    pub bidding_lead: ChronoDuration,
    pub lock_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            tie_epsilon: 0.02,
            neutral_rating: 0.7,
            max_jobs_per_window: 3,
            fairness_window: ChronoDuration::days(7),
            bidding_lead: ChronoDuration::hours(24),
            lock_timeout: Duration::from_millis(2_000),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        let w = &self.weights;
        if [w.rating, w.availability, w.price, w.fairness]
            .iter()
            .any(|weight| !weight.is_finite() || *weight < 0.0)
        {
            return Err(AppError::Internal(
                "score weights must be finite and non-negative".to_string(),
            ));
        }

        if (w.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(AppError::Internal(format!(
                "score weights must sum to 1.0, got {}",
                w.sum()
            )));
        }

        if !(0.0..1.0).contains(&self.tie_epsilon) {
            return Err(AppError::Internal(format!(
                "tie epsilon must be in [0, 1), got {}",
                self.tie_epsilon
            )));
        }

        if !(0.0..=1.0).contains(&self.neutral_rating) {
            return Err(AppError::Internal(format!(
                "neutral rating must be in [0, 1], got {}",
                self.neutral_rating
            )));
        }

        if self.max_jobs_per_window == 0 {
            return Err(AppError::Internal(
                "max jobs per window must be > 0".to_string(),
            ));
        }

        if self.fairness_window <= ChronoDuration::zero()
            || self.fairness_window > ChronoDuration::hours(MAX_FAIRNESS_WINDOW_HOURS)
        {
            return Err(AppError::Internal(format!(
                "fairness window must be positive and at most {MAX_FAIRNESS_WINDOW_HOURS}h, got {}h",
                self.fairness_window.num_hours()
            )));
        }

        if self.bidding_lead < ChronoDuration::zero()
            || self.bidding_lead > ChronoDuration::hours(MAX_BIDDING_LEAD_HOURS)
        {
            return Err(AppError::Internal(format!(
                "bidding lead must be between 0 and {MAX_BIDDING_LEAD_HOURS}h, got {}h",
                self.bidding_lead.num_hours()
            )));
        }

        Ok(())
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let defaults = EngineConfig::default();
        let default_weights = defaults.weights;

        let engine = EngineConfig {
            weights: ScoreWeights {
                rating: parse_or_default("WEIGHT_RATING", default_weights.rating)?,
                availability: parse_or_default(
                    "WEIGHT_AVAILABILITY",
                    default_weights.availability,
                )?,
                price: parse_or_default("WEIGHT_PRICE", default_weights.price)?,
                fairness: parse_or_default("WEIGHT_FAIRNESS", default_weights.fairness)?,
            },
            tie_epsilon: parse_or_default("TIE_EPSILON", defaults.tie_epsilon)?,
            neutral_rating: parse_or_default("NEUTRAL_RATING", defaults.neutral_rating)?,
            max_jobs_per_window: parse_or_default(
                "MAX_JOBS_PER_WINDOW",
                defaults.max_jobs_per_window,
            )?,
            fairness_window: hours_or_default("FAIRNESS_WINDOW_HOURS", 168)?,
            bidding_lead: hours_or_default("BIDDING_LEAD_HOURS", 24)?,
            lock_timeout: Duration::from_millis(parse_or_default("LOCK_TIMEOUT_MS", 2_000_u64)?),
        };
        engine.validate()?;

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            sweep_interval: Duration::from_secs(parse_or_default("SWEEP_INTERVAL_SECS", 60)?),
            engine,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

fn hours_or_default(key: &str, default: i64) -> Result<ChronoDuration, AppError> {
    let hours = parse_or_default(key, default)?;
    ChronoDuration::try_hours(hours)
        .ok_or_else(|| AppError::Internal(format!("invalid {key}: {hours}h is out of range")))
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::{EngineConfig, ScoreWeights};

    #[test]
    fn default_engine_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn weights_not_summing_to_one_are_rejected() {
        let config = EngineConfig {
            weights: ScoreWeights {
                rating: 0.5,
                availability: 0.0,
                price: 0.5,
                fairness: 0.2,
            },
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn negative_weight_is_rejected() {
        let config = EngineConfig {
            weights: ScoreWeights {
                rating: -0.1,
                availability: 0.1,
                price: 0.8,
                fairness: 0.2,
            },
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_cap_is_rejected() {
        let config = EngineConfig {
            max_jobs_per_window: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_fairness_window_is_rejected() {
        let config = EngineConfig {
            fairness_window: ChronoDuration::days(1_000_000_000),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());

        let ten_years = EngineConfig {
            fairness_window: ChronoDuration::hours(24 * 365 * 10),
            ..EngineConfig::default()
        };
        assert!(ten_years.validate().is_ok());
    }

    #[test]
    fn bidding_lead_out_of_range_is_rejected() {
        for lead in [ChronoDuration::hours(-1), ChronoDuration::days(1_000_000)] {
            let config = EngineConfig {
                bidding_lead: lead,
                ..EngineConfig::default()
            };
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn hour_counts_beyond_duration_range_are_errors() {
        assert!(super::hours_or_default("ROUTE_BID_ENGINE_TEST_UNSET_HOURS", i64::MAX).is_err());
        assert_eq!(
            super::hours_or_default("ROUTE_BID_ENGINE_TEST_UNSET_HOURS", 168).unwrap(),
            ChronoDuration::days(7)
        );
    }
}
