use crate::models::Line;
use thiserror::Error;

/// A decimal value that does not sit on the 0.05 handicap grid
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("line {0} is not a multiple of 0.05")]
pub struct LineError(pub f64);

/// A handicap token that does not match the notation grammar
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotationError {
    #[error("empty handicap notation")]
    Empty,

    #[error("unrecognized handicap notation '{token}'")]
    Unrecognized { token: String },

    #[error("fractional digit out of range in '{token}'")]
    DigitOutOfRange { token: String },

    #[error("handicap '{token}' is too large")]
    Overflow { token: String },
}

/// Failures talking to the odds provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status} for fixture {fixture_id}")]
    Status { fixture_id: String, status: u16 },

    #[error("could not decode provider response: {0}")]
    Decode(String),

    #[error("no {market} odds for fixture {fixture_id}")]
    NoData { fixture_id: String, market: String },

    #[error("{market} fetch for fixture {fixture_id} timed out after {secs}s")]
    Timeout {
        fixture_id: String,
        market: String,
        secs: u64,
    },

    #[error("all strategies failed (primary: {primary}; fallback: {fallback})")]
    StrategiesExhausted { primary: String, fallback: String },
}

/// Provider odds that cannot describe a real two-way market
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("invalid decimal odds {odds} at line {line} (must be greater than 1.0)")]
pub struct InvalidOddsError {
    pub line: Line,
    pub odds: f64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpolationError {
    #[error("ladder has no two-way quotes to anchor on")]
    NoAnchors,

    #[error("line {target} is outside the quoted range {min}..{max}")]
    OutOfRange { target: Line, min: Line, max: Line },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing required setting: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Everything that can stop one fixture from being evaluated
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error(transparent)]
    Notation(#[from] NotationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    InvalidOdds(#[from] InvalidOddsError),

    #[error(transparent)]
    Interpolation(#[from] InterpolationError),

    #[error("win probability {0} is outside (0, 1]")]
    InvalidProbability(f64),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("evaluation task failed: {0}")]
    Task(String),
}

impl EvaluationError {
    /// Stable code a caller can map to a user-facing message
    pub fn reason_code(&self) -> &'static str {
        match self {
            EvaluationError::Notation(_) => "handicap_not_recognized",
            EvaluationError::Provider(_) => "no_odds",
            EvaluationError::InvalidOdds(_) => "invalid_odds",
            EvaluationError::Interpolation(_) => "insufficient_data",
            EvaluationError::InvalidProbability(_) => "invalid_probability",
            EvaluationError::Config(_) => "config",
            EvaluationError::Task(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_are_distinct() {
        let errors = [
            EvaluationError::from(NotationError::Empty),
            EvaluationError::from(ProviderError::Decode("truncated body".to_string())),
            EvaluationError::from(InvalidOddsError {
                line: Line::ZERO,
                odds: 1.0,
            }),
            EvaluationError::from(InterpolationError::NoAnchors),
        ];
        let codes: Vec<_> = errors.iter().map(|e| e.reason_code()).collect();
        assert_eq!(
            codes,
            vec![
                "handicap_not_recognized",
                "no_odds",
                "invalid_odds",
                "insufficient_data"
            ]
        );
    }
}
