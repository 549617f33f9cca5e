use crate::error::InvalidOddsError;
use crate::models::{Line, LineLadder, Quote, RawQuote, Side};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
enum QuoteError {
    #[error("expected '<Home|Away> <line>'")]
    Shape,

    #[error("unknown side '{0}'")]
    Side(String),

    #[error("unparseable line '{0}'")]
    Line(String),

    #[error(transparent)]
    Odds(#[from] InvalidOddsError),
}

/// Turns provider quotes into a typed, sorted ladder
pub struct LineLadderBuilder;

impl LineLadderBuilder {
    /// Build a ladder from raw provider quotes.
    ///
    /// Malformed entries are dropped one by one with a warning. When a side
    /// repeats a line the later price wins.
    pub fn build(raw_quotes: &[RawQuote]) -> LineLadder {
        let mut home: BTreeMap<Line, f64> = BTreeMap::new();
        let mut away: BTreeMap<Line, f64> = BTreeMap::new();

        for raw in raw_quotes {
            match parse_quote(raw) {
                Ok((Side::Home, quote)) => {
                    home.insert(quote.line, quote.decimal_odds);
                }
                Ok((Side::Away, quote)) => {
                    away.insert(quote.line, quote.decimal_odds);
                }
                Err(e) => {
                    warn!("Dropping quote '{}' @ {}: {}", raw.token, raw.price, e);
                }
            }
        }

        let into_quotes = |side: BTreeMap<Line, f64>| -> Vec<Quote> {
            side.into_iter()
                .map(|(line, decimal_odds)| Quote { line, decimal_odds })
                .collect()
        };

        let ladder = LineLadder::from_sorted(into_quotes(home), into_quotes(away));
        info!(
            "Built ladder: {} home lines, {} away lines, {} two-way pairs",
            ladder.home().len(),
            ladder.away().len(),
            ladder.pair_count()
        );
        ladder
    }
}

fn parse_quote(raw: &RawQuote) -> Result<(Side, Quote), QuoteError> {
    let mut parts = raw.token.split_whitespace();
    let (side_str, line_str) = match (parts.next(), parts.next(), parts.next()) {
        (Some(side), Some(line), None) => (side, line),
        _ => return Err(QuoteError::Shape),
    };

    let side = match side_str.to_lowercase().as_str() {
        "home" => Side::Home,
        "away" => Side::Away,
        _ => return Err(QuoteError::Side(side_str.to_string())),
    };

    let line = line_str
        .parse::<f64>()
        .ok()
        .and_then(|value| Line::from_f64(value).ok())
        .ok_or_else(|| QuoteError::Line(line_str.to_string()))?;

    if !(raw.price.is_finite() && raw.price > 1.0) {
        return Err(InvalidOddsError {
            line,
            odds: raw.price,
        }
        .into());
    }

    Ok((
        side,
        Quote {
            line,
            decimal_odds: raw.price,
        },
    ))
}
