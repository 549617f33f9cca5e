use crate::models::{EvaluationRequest, FixtureEvaluation, Line, LineLadder, Side, Verdict};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Save any serializable value as pretty JSON, creating parent directories
pub fn save_json<T: Serialize + ?Sized>(value: &T, path: &str) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value).context("Failed to serialize data")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path))?;
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &str) -> Result<T> {
    let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to deserialize {}", path))
}

/// Load batch requests: a JSON array of `{fixture_id, sides, favorite, handicap}`
pub fn load_requests(path: &str) -> Result<Vec<EvaluationRequest>> {
    load_json(path)
}

pub fn save_ladder(ladder: &LineLadder, path: &str) -> Result<()> {
    save_json(ladder, path)
}

/// Load a saved ladder; sides are re-sorted and repeated lines collapsed
pub fn load_ladder(path: &str) -> Result<LineLadder> {
    load_json(path)
}

/// One CSV row per evaluated side
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct EvaluationRow {
    pub fixture_id: String,
    pub handicap: String,
    pub side: Side,
    pub line: Line,
    pub win_prob: f64,
    pub fair_odds: f64,
    pub effective_odds: f64,
    pub ev_pct: f64,
    pub verdict: Verdict,
    pub market: String,
}

pub fn evaluation_rows(evaluations: &[FixtureEvaluation]) -> Vec<EvaluationRow> {
    evaluations
        .iter()
        .flat_map(|evaluation| {
            let market = evaluation
                .strategy
                .map(|m| m.to_string())
                .unwrap_or_else(|| "cache".to_string());
            evaluation.results.iter().map(move |result| EvaluationRow {
                fixture_id: evaluation.fixture_id.clone(),
                handicap: evaluation.handicap.clone(),
                side: result.side,
                line: result.line,
                win_prob: result.win_prob,
                fair_odds: result.fair_odds,
                effective_odds: result.effective_odds,
                ev_pct: result.ev_pct,
                verdict: result.verdict,
                market: market.clone(),
            })
        })
        .collect()
}

/// Save evaluations to CSV, one row per side
pub fn save_evaluations_to_csv(evaluations: &[FixtureEvaluation], path: &str) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path).with_context(|| format!("Failed to create CSV file: {}", path))?;
    let mut writer = csv::Writer::from_writer(file);

    for row in evaluation_rows(evaluations) {
        writer.serialize(&row).context("Failed to write CSV row")?;
    }

    writer.flush()?;
    Ok(())
}

pub fn load_evaluation_rows(path: &str) -> Result<Vec<EvaluationRow>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("Failed to open CSV file: {}", path))?;
    reader
        .deserialize()
        .collect::<Result<Vec<EvaluationRow>, csv::Error>>()
        .context("Failed to parse CSV rows")
}

fn ensure_parent(path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EvResult, MarketType, RawQuote, SideConfig};
    use crate::utils::devig::fair_odds;
    use crate::utils::interpolator::{round_prob, Interpolator};
    use crate::utils::ladder::LineLadderBuilder;
    use tempfile::tempdir;

    fn path_in(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    fn evaluation() -> FixtureEvaluation {
        let result =
            |side: Side, steps: i64, win_prob: f64, ev_pct: f64, verdict: Verdict| EvResult {
                line: Line::from_steps(steps),
                side,
                win_prob,
                fair_odds: round_prob(fair_odds(win_prob)),
                effective_odds: 1.9,
                ev_pct,
                verdict,
            };
        FixtureEvaluation {
            fixture_id: "fx1".to_string(),
            handicap: "1".to_string(),
            notation: "1".to_string(),
            line: Line::from_steps(20),
            ladder_size: 12,
            strategy: Some(MarketType::MultiLine),
            results: vec![
                result(Side::Home, -20, 0.4, -24.0, Verdict::Minus),
                result(Side::Away, 20, 0.6, 14.0, Verdict::ClearPlus),
            ],
        }
    }

    #[test]
    fn test_requests_file() {
        let dir = tempdir().unwrap();
        let path = path_in(&dir, "requests.json");
        std::fs::write(
            &path,
            r#"[{"fixture_id": "fx1",
                 "sides": {"home": "Hanshin Tigers", "away": "Yomiuri Giants"},
                 "favorite": "away",
                 "handicap": "1半5"}]"#,
        )
        .unwrap();

        let requests = load_requests(&path).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].favorite, Side::Away);
        assert_eq!(requests[0].sides, SideConfig::new("Hanshin Tigers", "Yomiuri Giants"));
        assert_eq!(requests[0].handicap, "1半5");
    }

    #[test]
    fn test_ladder_file_in_new_directory() {
        let dir = tempdir().unwrap();
        let path = path_in(&dir, "ladders/fx1.json");
        let ladder = LineLadderBuilder::build(&[
            RawQuote::new("Home -0.5", 1.95),
            RawQuote::new("Away +0.5", 1.90),
        ]);

        save_ladder(&ladder, &path).unwrap();
        assert_eq!(load_ladder(&path).unwrap(), ladder);
    }

    #[test]
    fn test_ladder_file_with_unusable_odds_still_interpolates() {
        let dir = tempdir().unwrap();
        let path = path_in(&dir, "fx2.json");
        std::fs::write(
            &path,
            r#"{"home": [
                    {"line": -1.0, "decimal_odds": 2.40},
                    {"line": -0.5, "decimal_odds": 1.0},
                    {"line": 1.0, "decimal_odds": 1.70}
                ],
                "away": [
                    {"line": 1.0, "decimal_odds": 1.60},
                    {"line": 0.5, "decimal_odds": 1.90},
                    {"line": -1.0, "decimal_odds": 2.20}
                ]}"#,
        )
        .unwrap();

        let ladder = load_ladder(&path).unwrap();
        assert_eq!(ladder.pair_count(), 2);

        let fair = Interpolator::probability_at(Line::from_steps(-10), &ladder).unwrap();
        assert!(fair.home_prob > 0.4 && fair.home_prob < 0.5);
    }

    #[test]
    fn test_evaluations_csv() {
        let dir = tempdir().unwrap();
        let path = path_in(&dir, "results.csv");
        save_evaluations_to_csv(&[evaluation()], &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(
            header,
            "fixture_id,handicap,side,line,win_prob,fair_odds,effective_odds,ev_pct,verdict,market"
        );

        let rows = load_evaluation_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].side, Side::Away);
        assert_eq!(rows[1].line, Line::from_steps(20));
        assert_eq!(rows[1].verdict, Verdict::ClearPlus);
        assert_eq!(rows[1].market, "alternate_spreads");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_requests(&path_in(&dir, "nope.json")).is_err());
    }
}
