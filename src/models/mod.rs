use crate::error::LineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Which side of a fixture a price or a bet refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "home" => Ok(Side::Home),
            "away" => Ok(Side::Away),
            other => Err(format!("unknown side '{}', expected home or away", other)),
        }
    }
}

/// A handicap line stored as a whole number of 0.05 steps.
///
/// Keeping the line integral makes equality, ordering and hashing exact, which
/// the ladder relies on when pairing a home line with its mirrored away line.
/// Magnitude is bounded only by `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub struct Line(i64);

impl Line {
    /// Number of steps in one whole unit of handicap
    pub const STEPS_PER_UNIT: i64 = 20;
    pub const ZERO: Line = Line(0);

    pub const fn from_steps(steps: i64) -> Self {
        Line(steps)
    }

    /// Accepts a decimal line only when it sits on the 0.05 grid
    pub fn from_f64(value: f64) -> Result<Self, LineError> {
        if !value.is_finite() {
            return Err(LineError(value));
        }
        let scaled = value * Self::STEPS_PER_UNIT as f64;
        let steps = scaled.round();
        if (scaled - steps).abs() > 1e-6 || steps.abs() > i64::MAX as f64 {
            return Err(LineError(value));
        }
        Ok(Line(steps as i64))
    }

    pub fn steps(&self) -> i64 {
        self.0
    }

    pub fn value(&self) -> f64 {
        self.0 as f64 / Self::STEPS_PER_UNIT as f64
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn abs(&self) -> Line {
        Line(self.0.abs())
    }

    /// The same handicap seen from the other side
    pub fn mirrored(&self) -> Line {
        Line(-self.0)
    }
}

impl From<Line> for f64 {
    fn from(line: Line) -> f64 {
        line.value()
    }
}

impl TryFrom<f64> for Line {
    type Error = LineError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Line::from_f64(value)
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            f.write_str("0.00")
        } else {
            write!(f, "{:+.2}", self.value())
        }
    }
}

/// One side's price at one line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub line: Line,
    pub decimal_odds: f64,
}

/// A quote exactly as the provider boundary hands it over, e.g. ("Home -0.50", 1.95)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawQuote {
    pub token: String,
    pub price: f64,
}

impl RawQuote {
    pub fn new(token: impl Into<String>, price: f64) -> Self {
        Self {
            token: token.into(),
            price,
        }
    }
}

/// Quoted lines for one fixture, one sorted list per side.
///
/// Lines are strictly increasing within a side. A home quote at `L` is paired
/// with the away quote at `-L`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "LadderParts")]
pub struct LineLadder {
    home: Vec<Quote>,
    away: Vec<Quote>,
}

impl LineLadder {
    /// Callers must pass each side sorted by line with no duplicates;
    /// `LineLadderBuilder` is the normal way in.
    pub(crate) fn from_sorted(home: Vec<Quote>, away: Vec<Quote>) -> Self {
        debug_assert!(home.windows(2).all(|w| w[0].line < w[1].line));
        debug_assert!(away.windows(2).all(|w| w[0].line < w[1].line));
        Self { home, away }
    }

    pub fn home(&self) -> &[Quote] {
        &self.home
    }

    pub fn away(&self) -> &[Quote] {
        &self.away
    }

    pub fn side(&self, side: Side) -> &[Quote] {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    /// Total number of quoted lines across both sides
    pub fn len(&self) -> usize {
        self.home.len() + self.away.len()
    }

    pub fn is_empty(&self) -> bool {
        self.home.is_empty() && self.away.is_empty()
    }

    pub fn quote(&self, side: Side, line: Line) -> Option<&Quote> {
        let quotes = self.side(side);
        quotes
            .binary_search_by(|q| q.line.cmp(&line))
            .ok()
            .map(|idx| &quotes[idx])
    }

    /// Two-way markets keyed by the home line: (home line, home quote, away quote)
    pub fn pairs(&self) -> impl Iterator<Item = (Line, &Quote, &Quote)> + '_ {
        self.home.iter().filter_map(move |home| {
            self.quote(Side::Away, home.line.mirrored())
                .map(|away| (home.line, home, away))
        })
    }

    pub fn pair_count(&self) -> usize {
        self.pairs().count()
    }
}

/// Unchecked ladder as read from a file; cleaned up on the way in
#[derive(Deserialize)]
struct LadderParts {
    #[serde(default)]
    home: Vec<Quote>,
    #[serde(default)]
    away: Vec<Quote>,
}

impl From<LadderParts> for LineLadder {
    fn from(parts: LadderParts) -> Self {
        fn sorted_unique(side: Side, quotes: Vec<Quote>) -> Vec<Quote> {
            let by_line: BTreeMap<Line, Quote> = quotes
                .into_iter()
                .filter(|q| {
                    let usable = q.decimal_odds.is_finite() && q.decimal_odds > 1.0;
                    if !usable {
                        warn!("Dropping {} quote at {} @ {}", side, q.line, q.decimal_odds);
                    }
                    usable
                })
                // Later quotes for the same line win
                .map(|q| (q.line, q))
                .collect();
            by_line.into_values().collect()
        }
        LineLadder::from_sorted(
            sorted_unique(Side::Home, parts.home),
            sorted_unique(Side::Away, parts.away),
        )
    }
}

/// Margin-free probabilities at one home-relative line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FairValue {
    pub line: Line,
    pub home_prob: f64,
    pub away_prob: f64,
}

impl FairValue {
    pub fn prob(&self, side: Side) -> f64 {
        match side {
            Side::Home => self.home_prob,
            Side::Away => self.away_prob,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Minus,
    Fair,
    Plus,
    ClearPlus,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::ClearPlus => "clear_plus",
            Verdict::Plus => "plus",
            Verdict::Fair => "fair",
            Verdict::Minus => "minus",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "clear_plus" => Ok(Verdict::ClearPlus),
            "plus" => Ok(Verdict::Plus),
            "fair" => Ok(Verdict::Fair),
            "minus" => Ok(Verdict::Minus),
            other => Err(format!("unknown verdict '{}'", other)),
        }
    }
}

/// Expected value of backing one side at one line against the reference payout
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvResult {
    pub line: Line, // in the backed side's own framing
    pub side: Side,
    pub win_prob: f64,
    pub fair_odds: f64, // margin-free odds at `win_prob`
    pub effective_odds: f64,
    pub ev_pct: f64,
    pub verdict: Verdict,
}

/// How the provider's market for a fixture is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    /// One quoted line per side (the `spreads` market)
    #[serde(rename = "spreads")]
    SingleLine,
    /// A ladder of quoted lines per side (the `alternate_spreads` market)
    #[serde(rename = "alternate_spreads")]
    MultiLine,
}

impl MarketType {
    pub fn market_key(&self) -> &'static str {
        match self {
            MarketType::SingleLine => "spreads",
            MarketType::MultiLine => "alternate_spreads",
        }
    }

    pub fn other(self) -> MarketType {
        match self {
            MarketType::SingleLine => MarketType::MultiLine,
            MarketType::MultiLine => MarketType::SingleLine,
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.market_key())
    }
}

impl FromStr for MarketType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "spreads" | "single" | "single_line" => Ok(MarketType::SingleLine),
            "alternate_spreads" | "multi" | "multi_line" => Ok(MarketType::MultiLine),
            other => Err(format!(
                "unknown market type '{}', expected spreads or alternate_spreads",
                other
            )),
        }
    }
}

/// Names the provider uses for each side of a fixture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideConfig {
    pub home: String,
    pub away: String,
}

impl SideConfig {
    pub fn new(home: impl Into<String>, away: impl Into<String>) -> Self {
        Self {
            home: home.into(),
            away: away.into(),
        }
    }

    /// Which side a provider outcome name belongs to, if either
    pub fn side_of(&self, name: &str) -> Option<Side> {
        if name == self.home {
            Some(Side::Home)
        } else if name == self.away {
            Some(Side::Away)
        } else {
            None
        }
    }
}

/// One fixture to evaluate: resolved upstream, handed to the pipeline as-is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub fixture_id: String,
    pub sides: SideConfig,
    pub favorite: Side,
    pub handicap: String, // handicap notation token, e.g. "1半5"
}

/// Everything the downstream consumer needs about one evaluated fixture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureEvaluation {
    pub fixture_id: String,
    pub handicap: String,
    pub notation: String, // canonical form of `handicap`
    pub line: Line,       // converted handicap magnitude
    pub ladder_size: usize,
    pub strategy: Option<MarketType>, // None when the ladder came from the cache
    pub results: Vec<EvResult>,
}

impl FixtureEvaluation {
    pub fn result(&self, side: Side) -> Option<&EvResult> {
        self.results.iter().find(|r| r.side == side)
    }

    /// The better of the two sides by EV
    pub fn best(&self) -> Option<&EvResult> {
        self.results
            .iter()
            .max_by(|a, b| a.ev_pct.total_cmp(&b.ev_pct))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(line: f64, odds: f64) -> Quote {
        Quote {
            line: Line::from_f64(line).unwrap(),
            decimal_odds: odds,
        }
    }

    #[test]
    fn test_line_grid() {
        assert_eq!(Line::from_f64(1.15).unwrap().steps(), 23);
        assert_eq!(Line::from_f64(-0.25).unwrap().steps(), -5);
        assert_eq!(Line::from_f64(1.15).unwrap().value(), 1.15);
        assert!(Line::from_f64(0.125).is_err());
        assert!(Line::from_f64(f64::NAN).is_err());

        // Far beyond any hand-written table
        let big = Line::from_f64(137.45).unwrap();
        assert_eq!(big.steps(), 2749);
        assert_eq!(big.value(), 137.45);
    }

    #[test]
    fn test_line_display_and_serde() {
        assert_eq!(Line::from_steps(5).to_string(), "+0.25");
        assert_eq!(Line::from_steps(-30).to_string(), "-1.50");
        assert_eq!(Line::ZERO.to_string(), "0.00");

        let json = serde_json::to_string(&Line::from_steps(-30)).unwrap();
        assert_eq!(json, "-1.5");
        let back: Line = serde_json::from_str("0.35").unwrap();
        assert_eq!(back, Line::from_steps(7));
        assert!(serde_json::from_str::<Line>("0.33").is_err());
    }

    #[test]
    fn test_ladder_pairs_mirror_lines() {
        let ladder = LineLadder::from_sorted(
            vec![quote(-0.5, 1.95), quote(0.5, 1.60)],
            vec![quote(-0.5, 2.30), quote(0.5, 1.90)],
        );

        let pairs: Vec<_> = ladder.pairs().collect();
        assert_eq!(pairs.len(), 2);
        // Home -0.5 pairs with Away +0.5
        assert_eq!(pairs[0].0, Line::from_steps(-10));
        assert_eq!(pairs[0].1.decimal_odds, 1.95);
        assert_eq!(pairs[0].2.decimal_odds, 1.90);
        assert_eq!(ladder.len(), 4);
    }

    #[test]
    fn test_ladder_unpaired_line_is_skipped() {
        let ladder = LineLadder::from_sorted(
            vec![quote(-1.0, 2.10), quote(-0.5, 1.95)],
            vec![quote(0.5, 1.90)],
        );
        assert_eq!(ladder.pair_count(), 1);
        assert!(ladder.quote(Side::Home, Line::from_steps(-20)).is_some());
        assert!(ladder.quote(Side::Away, Line::from_steps(20)).is_none());
    }

    #[test]
    fn test_ladder_from_json_is_sorted_and_deduplicated() {
        let ladder: LineLadder = serde_json::from_str(
            r#"{"home": [
                {"line": 0.5, "decimal_odds": 1.6},
                {"line": -0.5, "decimal_odds": 1.9},
                {"line": -0.5, "decimal_odds": 1.95}
            ]}"#,
        )
        .unwrap();
        assert_eq!(ladder.home().len(), 2);
        assert_eq!(ladder.home()[0].line, Line::from_steps(-10));
        assert_eq!(ladder.home()[0].decimal_odds, 1.95);
        assert!(ladder.away().is_empty());
    }

    #[test]
    fn test_ladder_from_json_drops_unusable_odds() {
        let ladder: LineLadder = serde_json::from_str(
            r#"{"home": [
                    {"line": -0.5, "decimal_odds": 1.0},
                    {"line": 0.5, "decimal_odds": 1.6}
                ],
                "away": [
                    {"line": 0.5, "decimal_odds": 1.9},
                    {"line": -0.5, "decimal_odds": 2.4}
                ]}"#,
        )
        .unwrap();
        assert_eq!(ladder.home().len(), 1);
        assert_eq!(ladder.pair_count(), 1);
        assert!(ladder.quote(Side::Home, Line::from_steps(-10)).is_none());
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("Home".parse::<Side>().unwrap(), Side::Home);
        assert_eq!(Side::Home.opposite(), Side::Away);
        assert_eq!(
            "alternate_spreads".parse::<MarketType>().unwrap(),
            MarketType::MultiLine
        );
        assert!("totals".parse::<MarketType>().is_err());
        assert!(Verdict::ClearPlus > Verdict::Plus);
        assert!(Verdict::Fair > Verdict::Minus);
    }
}
