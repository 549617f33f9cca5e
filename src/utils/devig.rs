//! Bookmaker margin removal.
//!
//! Proportional method: each side's implied probability is divided by the
//! overround so the pair sums to one.

use crate::error::InvalidOddsError;
use crate::models::{FairValue, Quote};

/// Convert decimal odds to the bookmaker's implied probability
pub fn implied_probability(decimal_odds: f64) -> f64 {
    1.0 / decimal_odds
}

/// Sum of implied probabilities; at least 1.0 for a real two-way market
pub fn overround(home_odds: f64, away_odds: f64) -> f64 {
    implied_probability(home_odds) + implied_probability(away_odds)
}

/// Decimal odds with no margin for a probability
pub fn fair_odds(prob: f64) -> f64 {
    1.0 / prob
}

/// Remove the margin from a two-way quote.
///
/// `home` and `away` are the two sides of the same market, so the away quote
/// sits at the mirrored line. The returned value is keyed by the home line.
pub fn devig(home: &Quote, away: &Quote) -> Result<FairValue, InvalidOddsError> {
    validate(home)?;
    validate(away)?;

    let implied_home = implied_probability(home.decimal_odds);
    let implied_away = implied_probability(away.decimal_odds);
    let total = implied_home + implied_away;

    Ok(FairValue {
        line: home.line,
        home_prob: implied_home / total,
        away_prob: implied_away / total,
    })
}

fn validate(quote: &Quote) -> Result<(), InvalidOddsError> {
    if quote.decimal_odds.is_finite() && quote.decimal_odds > 1.0 {
        Ok(())
    } else {
        Err(InvalidOddsError {
            line: quote.line,
            odds: quote.decimal_odds,
        })
    }
}
