use crate::error::{ConfigError, EvaluationError};
use crate::models::{EvResult, Line, Side, Verdict};
use crate::utils::devig::fair_odds;
use crate::utils::interpolator::round_prob;
use serde::{Deserialize, Serialize};

/// Upper bound on the turnover rebate (3% of stake)
pub const MAX_REBATE_RATE: f64 = 0.03;
/// Rebates are offered in half-percent steps
pub const REBATE_STEP: f64 = 0.005;

/// Clamp a rebate rate to [0, 3%] and snap it to the 0.5% grid
pub fn quantize_rebate(rate: f64) -> f64 {
    if !rate.is_finite() {
        return 0.0;
    }
    let clamped = rate.clamp(0.0, MAX_REBATE_RATE);
    let stepped = (clamped / REBATE_STEP).round() * REBATE_STEP;
    (stepped * 1000.0).round() / 1000.0
}

/// Payout per unit stake once the rebate is folded in.
///
/// The rebate is paid on every stake, win or lose, so per winning bet it is
/// worth `rebate_rate / fair_prob`. Rounded for display only.
pub fn effective_odds(reference_odds: f64, rebate_rate: f64, fair_prob: f64) -> f64 {
    round_prob(exact_effective_odds(reference_odds, rebate_rate, fair_prob))
}

fn exact_effective_odds(reference_odds: f64, rebate_rate: f64, fair_prob: f64) -> f64 {
    reference_odds + rebate_rate / fair_prob
}

/// Expected value in percent of stake
pub fn expected_value_pct(fair_prob: f64, effective_odds: f64) -> f64 {
    round_prob((fair_prob * effective_odds - 1.0) * 100.0)
}

/// EV% for a fair probability against a reference payout and rebate
pub fn ev_pct(fair_prob: f64, reference_odds: f64, rebate_rate: f64) -> f64 {
    // Unrounded odds here: rounding them first can push EV across a threshold
    expected_value_pct(
        fair_prob,
        exact_effective_odds(reference_odds, rebate_rate, fair_prob),
    )
}

/// Lower EV% bounds of the three upper verdict buckets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerdictThresholds {
    pub clear_plus: f64,
    pub plus: f64,
    pub fair: f64,
}

impl Default for VerdictThresholds {
    fn default() -> Self {
        Self {
            clear_plus: 5.0,
            plus: 0.0,
            fair: -3.0,
        }
    }
}

impl VerdictThresholds {
    pub fn verdict(&self, ev_pct: f64) -> Verdict {
        if ev_pct >= self.clear_plus {
            Verdict::ClearPlus
        } else if ev_pct >= self.plus {
            Verdict::Plus
        } else if ev_pct >= self.fair {
            Verdict::Fair
        } else {
            Verdict::Minus
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let values = [self.clear_plus, self.plus, self.fair];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::InvalidValue {
                field: "EV thresholds",
                reason: "thresholds must be finite".to_string(),
            });
        }
        if !(self.clear_plus >= self.plus && self.plus >= self.fair) {
            return Err(ConfigError::InvalidValue {
                field: "EV thresholds",
                reason: format!(
                    "expected clear_plus >= plus >= fair, got {} / {} / {}",
                    self.clear_plus, self.plus, self.fair
                ),
            });
        }
        Ok(())
    }
}

/// Scores fair probabilities against a fixed external payout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvEvaluator {
    reference_odds: f64,
    rebate_rate: f64,
    thresholds: VerdictThresholds,
}

impl EvEvaluator {
    pub fn new(
        reference_odds: f64,
        rebate_rate: f64,
        thresholds: VerdictThresholds,
    ) -> Result<Self, ConfigError> {
        if !(reference_odds.is_finite() && reference_odds > 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "REFERENCE_ODDS",
                reason: format!("{} must be greater than 1.0", reference_odds),
            });
        }
        thresholds.validate()?;

        Ok(Self {
            reference_odds,
            rebate_rate: quantize_rebate(rebate_rate),
            thresholds,
        })
    }

    pub fn reference_odds(&self) -> f64 {
        self.reference_odds
    }

    pub fn rebate_rate(&self) -> f64 {
        self.rebate_rate
    }

    /// Score backing `side` at `line` (that side's framing) with win probability `fair_prob`
    pub fn evaluate(
        &self,
        line: Line,
        side: Side,
        fair_prob: f64,
    ) -> Result<EvResult, EvaluationError> {
        if !(fair_prob > 0.0 && fair_prob <= 1.0) {
            return Err(EvaluationError::InvalidProbability(fair_prob));
        }

        let ev_pct = ev_pct(fair_prob, self.reference_odds, self.rebate_rate);

        Ok(EvResult {
            line,
            side,
            win_prob: fair_prob,
            fair_odds: round_prob(fair_odds(fair_prob)),
            effective_odds: effective_odds(self.reference_odds, self.rebate_rate, fair_prob),
            ev_pct,
            verdict: self.thresholds.verdict(ev_pct),
        })
    }
}
