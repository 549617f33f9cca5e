//! Fair probability at an arbitrary handicap line.
//!
//! Quoted two-way markets are devigged into anchors keyed by the home line.
//! A target that is not quoted is linearly interpolated between the two
//! anchors around it. The zero line is never interpolated straight across
//! from a negative to a positive anchor; it is derived from a symmetric pair
//! (see [`ZeroRule`]) and then used as an anchor itself. Targets outside the
//! quoted range are an error, never extrapolated.
//!
//! Every probability is rounded to [`PRECISION`] decimal places before it is
//! compared or fed into further arithmetic.

use crate::error::InterpolationError;
use crate::models::{FairValue, Line, LineLadder, Side};
use crate::utils::devig::devig;
use tracing::{debug, warn};

/// Decimal places kept on intermediate probabilities
pub const PRECISION: i32 = 4;

pub fn round_prob(value: f64) -> f64 {
    let scale = 10f64.powi(PRECISION);
    (value * scale).round() / scale
}

/// Which rule produced the zero-line probability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroRule {
    /// The line 0 was quoted directly
    Quoted,
    /// Average of the ±0.5 pair
    HalfPair,
    /// Average of the ±1.0 pair
    WholePair,
    /// Average of the smallest ±k pair available
    SmallestPair(Line),
    /// Only one side of zero quoted: the nearest line stands in
    NearestLine(Line),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Anchor {
    line: Line,
    home_prob: f64,
}

/// Stateless; every call works on the ladder snapshot it is given
pub struct Interpolator;

impl Interpolator {
    /// Fair probabilities at `target`, a line in home framing
    pub fn probability_at(
        target: Line,
        ladder: &LineLadder,
    ) -> Result<FairValue, InterpolationError> {
        let anchors = anchors(ladder);
        probability_from_anchors(target, &anchors)
    }

    /// Fair probabilities for backing `side` at `side_line` (in that side's framing)
    pub fn probability_for_side(
        side: Side,
        side_line: Line,
        ladder: &LineLadder,
    ) -> Result<FairValue, InterpolationError> {
        let home_line = match side {
            Side::Home => side_line,
            Side::Away => side_line.mirrored(),
        };
        Self::probability_at(home_line, ladder)
    }

    /// The zero line and the rule that produced it
    pub fn zero_line(ladder: &LineLadder) -> Result<(FairValue, ZeroRule), InterpolationError> {
        let anchors = anchors(ladder);
        if let Some(quoted) = anchors.iter().find(|a| a.line.is_zero()) {
            return Ok((to_fair_value(*quoted), ZeroRule::Quoted));
        }
        let (anchor, rule) = zero_anchor(&anchors)?;
        Ok((to_fair_value(anchor), rule))
    }

    /// Fair values at every 0.05 line inside the quoted range
    pub fn fine_ladder(ladder: &LineLadder) -> Result<Vec<FairValue>, InterpolationError> {
        Self::sample(ladder, Line::from_steps(1))
    }

    /// Fair values from the lowest quoted line to the highest, every `step`.
    /// A step below 0.05 is treated as 0.05.
    pub fn sample(ladder: &LineLadder, step: Line) -> Result<Vec<FairValue>, InterpolationError> {
        let anchors = anchors(ladder);
        let (first, last) = match (anchors.first(), anchors.last()) {
            (Some(first), Some(last)) => (first.line.steps(), last.line.steps()),
            _ => return Err(InterpolationError::NoAnchors),
        };

        let stride = step.steps().max(1) as usize;
        (first..=last)
            .step_by(stride)
            .map(|steps| probability_from_anchors(Line::from_steps(steps), &anchors))
            .collect()
    }
}

/// Devig every two-way pair; pairs with unusable odds are skipped
fn anchors(ladder: &LineLadder) -> Vec<Anchor> {
    ladder
        .pairs()
        .filter_map(|(line, home, away)| match devig(home, away) {
            Ok(fair) => Some(Anchor {
                line,
                home_prob: round_prob(fair.home_prob),
            }),
            Err(e) => {
                warn!("Skipping anchor at {}: {}", line, e);
                None
            }
        })
        .collect()
}

fn probability_from_anchors(
    target: Line,
    anchors: &[Anchor],
) -> Result<FairValue, InterpolationError> {
    let (min, max) = match (anchors.first(), anchors.last()) {
        (Some(first), Some(last)) => (first.line, last.line),
        _ => return Err(InterpolationError::NoAnchors),
    };

    // Quoted lines need no interpolation
    if let Some(exact) = anchors.iter().find(|a| a.line == target) {
        return Ok(to_fair_value(*exact));
    }

    // Unquoted zero comes from the symmetric pair rule
    if target.is_zero() {
        let (zero, _) = zero_anchor(anchors)?;
        return Ok(to_fair_value(zero));
    }

    // Anchors are sorted by line, so the nearest neighbours bracket the target
    let lower = anchors.iter().rev().find(|a| a.line < target);
    let upper = anchors.iter().find(|a| a.line > target);

    // Outside the quoted range: never extrapolate
    let (lower, upper) = match (lower, upper) {
        (Some(lower), Some(upper)) => (*lower, *upper),
        _ => return Err(InterpolationError::OutOfRange { target, min, max }),
    };

    // Bracket spans zero: anchor on the derived zero line instead
    let (lower, upper) = if lower.line < Line::ZERO && upper.line > Line::ZERO {
        let (zero, _) = zero_anchor(anchors)?;
        if target > Line::ZERO {
            (zero, upper)
        } else {
            (lower, zero)
        }
    } else {
        (lower, upper)
    };

    let home_prob = interpolate(lower, upper, target);
    debug!(
        "Interpolated {} between {} ({:.4}) and {} ({:.4}): {:.4}",
        target, lower.line, lower.home_prob, upper.line, upper.home_prob, home_prob
    );

    Ok(to_fair_value(Anchor {
        line: target,
        home_prob,
    }))
}

fn interpolate(lower: Anchor, upper: Anchor, target: Line) -> f64 {
    let span = (upper.line.steps() - lower.line.steps()) as f64;
    let offset = (target.steps() - lower.line.steps()) as f64;
    round_prob(lower.home_prob + offset / span * (upper.home_prob - lower.home_prob))
}

/// Derive the zero line when it was not quoted.
///
/// Tiers, first match wins: the ±0.5 pair, the ±1.0 pair, the smallest ±k
/// pair, then the single line nearest to zero.
fn zero_anchor(anchors: &[Anchor]) -> Result<(Anchor, ZeroRule), InterpolationError> {
    let find = |line: Line| anchors.iter().find(|a| a.line == line);
    let symmetric = |k: Line| match (find(k), find(k.mirrored())) {
        (Some(pos), Some(neg)) => Some(round_prob((pos.home_prob + neg.home_prob) / 2.0)),
        _ => None,
    };

    let half = Line::from_steps(Line::STEPS_PER_UNIT / 2);
    let whole = Line::from_steps(Line::STEPS_PER_UNIT);

    // First tier that has data wins
    let found = symmetric(half)
        .map(|p| (p, ZeroRule::HalfPair))
        .or_else(|| symmetric(whole).map(|p| (p, ZeroRule::WholePair)))
        .or_else(|| {
            anchors
                .iter()
                .filter(|a| a.line > Line::ZERO)
                .find_map(|a| symmetric(a.line).map(|p| (p, ZeroRule::SmallestPair(a.line))))
        })
        .or_else(|| {
            anchors
                .iter()
                .min_by_key(|a| a.line.steps().abs())
                .map(|a| (a.home_prob, ZeroRule::NearestLine(a.line)))
        });

    match found {
        Some((home_prob, rule)) => {
            debug!("Zero line {:.4} via {:?}", home_prob, rule);
            Ok((
                Anchor {
                    line: Line::ZERO,
                    home_prob,
                },
                rule,
            ))
        }
        None => Err(InterpolationError::NoAnchors),
    }
}

fn to_fair_value(anchor: Anchor) -> FairValue {
    FairValue {
        line: anchor.line,
        home_prob: anchor.home_prob,
        away_prob: round_prob(1.0 - anchor.home_prob),
    }
}
