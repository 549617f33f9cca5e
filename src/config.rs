use crate::error::ConfigError;
use crate::models::MarketType;
use crate::utils::ev_calculator::{quantize_rebate, EvEvaluator, VerdictThresholds};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

const DEFAULT_SPORT_KEY: &str = "baseball_npb";
const DEFAULT_REGIONS: &str = "eu";
const DEFAULT_BOOKMAKER: &str = "pinnacle";
const DEFAULT_REFERENCE_ODDS: f64 = 1.9;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CACHE_TTL_SECS: u64 = 60;

/// Settings consumed when the pipeline is constructed
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_key: Option<String>,
    pub sport_key: String,
    pub regions: String,
    pub bookmaker: String,
    pub market_type: MarketType,
    pub enable_fallback: bool,
    pub reference_odds: f64,
    pub rebate_rate: f64,
    pub thresholds: VerdictThresholds,
    pub fetch_timeout: Duration,
    pub cache_ttl: Duration, // zero disables the ladder cache
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            sport_key: DEFAULT_SPORT_KEY.to_string(),
            regions: DEFAULT_REGIONS.to_string(),
            bookmaker: DEFAULT_BOOKMAKER.to_string(),
            market_type: MarketType::MultiLine,
            enable_fallback: true,
            reference_odds: DEFAULT_REFERENCE_ODDS,
            rebate_rate: 0.0,
            thresholds: VerdictThresholds::default(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

impl Config {
    /// Load settings from the process environment (and `.env` if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key/value source; unset keys take defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let market_type = match get("MARKET_TYPE") {
            Some(value) => MarketType::from_str(&value).map_err(|reason| {
                ConfigError::InvalidValue {
                    field: "MARKET_TYPE",
                    reason,
                }
            })?,
            None => defaults.market_type,
        };

        // Out-of-range rates are clamped to [0, 3%], never rejected
        let rebate_rate = parse_or("REBATE_RATE", get("REBATE_RATE"), defaults.rebate_rate)?;
        let quantized = quantize_rebate(rebate_rate);
        if quantized != rebate_rate {
            warn!("REBATE_RATE {} adjusted to {}", rebate_rate, quantized);
        }

        let thresholds = VerdictThresholds {
            clear_plus: parse_or(
                "EV_CLEAR_PLUS",
                get("EV_CLEAR_PLUS"),
                defaults.thresholds.clear_plus,
            )?,
            plus: parse_or("EV_PLUS", get("EV_PLUS"), defaults.thresholds.plus)?,
            fair: parse_or("EV_FAIR", get("EV_FAIR"), defaults.thresholds.fair)?,
        };
        thresholds.validate()?;

        let config = Config {
            api_key: get("ODDS_API_KEY"),
            sport_key: get("ODDS_SPORT_KEY").unwrap_or(defaults.sport_key),
            regions: get("ODDS_REGIONS").unwrap_or(defaults.regions),
            bookmaker: get("ODDS_BOOKMAKER").unwrap_or(defaults.bookmaker),
            market_type,
            enable_fallback: parse_bool(
                "ENABLE_FALLBACK",
                get("ENABLE_FALLBACK"),
                defaults.enable_fallback,
            )?,
            reference_odds: parse_or(
                "REFERENCE_ODDS",
                get("REFERENCE_ODDS"),
                defaults.reference_odds,
            )?,
            rebate_rate: quantized,
            thresholds,
            fetch_timeout: Duration::from_secs(parse_or(
                "FETCH_TIMEOUT_SECS",
                get("FETCH_TIMEOUT_SECS"),
                DEFAULT_FETCH_TIMEOUT_SECS,
            )?),
            cache_ttl: Duration::from_secs(parse_or(
                "CACHE_TTL_SECS",
                get("CACHE_TTL_SECS"),
                DEFAULT_CACHE_TTL_SECS,
            )?),
        };

        if config.fetch_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "FETCH_TIMEOUT_SECS",
                reason: "must be at least 1 second".to_string(),
            });
        }

        // Fails early on a bad reference payout
        config.evaluator()?;
        Ok(config)
    }

    pub fn evaluator(&self) -> Result<EvEvaluator, ConfigError> {
        EvEvaluator::new(self.reference_odds, self.rebate_rate, self.thresholds)
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .ok_or(ConfigError::MissingField {
                field: "ODDS_API_KEY",
            })
    }
}

fn parse_or<T: FromStr>(
    field: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                field,
                reason: format!("'{}': {}", raw, e),
            }),
        None => Ok(default),
    }
}

fn parse_bool(
    field: &'static str,
    value: Option<String>,
    default: bool,
) -> Result<bool, ConfigError> {
    match value.as_deref().map(|v| v.trim().to_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "off") => Ok(false),
        Some(v) => Err(ConfigError::InvalidValue {
            field,
            reason: format!("'{}' is not a boolean", v),
        }),
    }
}
