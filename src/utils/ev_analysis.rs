use crate::error::EvaluationError;
use crate::models::{
    EvResult, EvaluationRequest, FixtureEvaluation, Line, LineLadder, Side, Verdict,
};
use crate::utils::ev_calculator::EvEvaluator;
use crate::utils::interpolator::Interpolator;
use crate::EvaluationPipeline;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Lines to evaluate for a handicap of magnitude `line`, each in its own side's framing.
///
/// The favorite gives the handicap (`-L`), the underdog receives it (`+L`).
/// The favorite comes first.
pub fn target_lines(favorite: Side, line: Line) -> [(Side, Line); 2] {
    let magnitude = line.abs();
    [
        (favorite, magnitude.mirrored()),
        (favorite.opposite(), magnitude),
    ]
}

/// The single home-relative line both targets map onto
pub fn home_line(favorite: Side, line: Line) -> Line {
    let magnitude = line.abs();
    match favorite {
        Side::Home => magnitude.mirrored(),
        Side::Away => magnitude,
    }
}

/// EV for both sides of a handicap against one ladder snapshot
pub fn evaluate_ladder(
    evaluator: &EvEvaluator,
    ladder: &LineLadder,
    favorite: Side,
    line: Line,
) -> Result<Vec<EvResult>, EvaluationError> {
    let fair = Interpolator::probability_at(home_line(favorite, line), ladder)?;

    target_lines(favorite, line)
        .into_iter()
        .map(|(side, side_line)| evaluator.evaluate(side_line, side, fair.prob(side)))
        .collect()
}

/// EV for both sides at every `step` across the quoted range, best EV first
pub fn evaluate_all_lines(
    evaluator: &EvEvaluator,
    ladder: &LineLadder,
    step: Line,
) -> Result<Vec<EvResult>, EvaluationError> {
    let mut results = Vec::new();
    for fair in Interpolator::sample(ladder, step)? {
        // Home takes the sampled line, away the mirrored one
        results.push(evaluator.evaluate(fair.line, Side::Home, fair.home_prob)?);
        results.push(evaluator.evaluate(fair.line.mirrored(), Side::Away, fair.away_prob)?);
    }
    results.sort_by(|a, b| b.ev_pct.total_cmp(&a.ev_pct));
    Ok(results)
}

/// The `top_n` best lines, optionally only those with at least `min_ev` percent
pub fn find_best_lines(
    evaluator: &EvEvaluator,
    ladder: &LineLadder,
    step: Line,
    top_n: usize,
    min_ev: Option<f64>,
) -> Result<Vec<EvResult>, EvaluationError> {
    Ok(evaluate_all_lines(evaluator, ladder, step)?
        .into_iter()
        .filter(|r| min_ev.map_or(true, |min| r.ev_pct >= min))
        .take(top_n)
        .collect())
}

/// One fixture's outcome in a batch
#[derive(Debug)]
pub struct BatchOutcome {
    pub fixture_id: String,
    pub outcome: Result<FixtureEvaluation, EvaluationError>,
}

/// Evaluate every request concurrently. Results come back in request order and
/// a failing fixture only fails its own entry.
pub async fn evaluate_fixtures(
    pipeline: Arc<EvaluationPipeline>,
    requests: Vec<EvaluationRequest>,
) -> Vec<BatchOutcome> {
    let fixture_ids: Vec<String> = requests.iter().map(|r| r.fixture_id.clone()).collect();
    let mut slots: Vec<Option<Result<FixtureEvaluation, EvaluationError>>> =
        (0..requests.len()).map(|_| None).collect();

    let mut tasks = JoinSet::new();
    for (idx, request) in requests.into_iter().enumerate() {
        let pipeline = Arc::clone(&pipeline);
        tasks.spawn(async move { (idx, pipeline.evaluate(&request).await) });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, outcome)) => slots[idx] = Some(outcome),
            Err(e) => warn!("Evaluation task failed: {}", e),
        }
    }

    let outcomes: Vec<BatchOutcome> = fixture_ids
        .into_iter()
        .zip(slots)
        .map(|(fixture_id, slot)| BatchOutcome {
            outcome: slot.unwrap_or_else(|| {
                Err(EvaluationError::Task(format!(
                    "evaluation of {} did not complete",
                    fixture_id
                )))
            }),
            fixture_id,
        })
        .collect();

    let failed = outcomes.iter().filter(|o| o.outcome.is_err()).count();
    info!("Evaluated {} fixture(s), {} failed", outcomes.len(), failed);
    outcomes
}

/// Failure count per reason code
pub fn failure_counts(outcomes: &[BatchOutcome]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for outcome in outcomes {
        if let Err(e) = &outcome.outcome {
            *counts.entry(e.reason_code()).or_insert(0) += 1;
        }
    }
    counts
}

/// An EV result tagged with the fixture it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub fixture_id: String,
    pub handicap: String,
    pub result: EvResult,
}

impl RankedResult {
    pub fn format(&self) -> String {
        format!(
            "{} | {} {} ({}) | p={:.4} | fair {:.4} | odds {:.4} | EV: {:+.2}% | {}",
            self.fixture_id,
            self.result.side,
            self.result.line,
            self.handicap,
            self.result.win_prob,
            self.result.fair_odds,
            self.result.effective_odds,
            self.result.ev_pct,
            self.result.verdict
        )
    }
}

/// Every successful result, best EV first, optionally keeping only `min_verdict` and better
pub fn rank_results(outcomes: &[BatchOutcome], min_verdict: Option<Verdict>) -> Vec<RankedResult> {
    let mut ranked: Vec<RankedResult> = outcomes
        .iter()
        .filter_map(|o| o.outcome.as_ref().ok())
        .flat_map(|evaluation| {
            evaluation.results.iter().map(move |result| RankedResult {
                fixture_id: evaluation.fixture_id.clone(),
                handicap: evaluation.handicap.clone(),
                result: *result,
            })
        })
        .filter(|r| min_verdict.map_or(true, |min| r.result.verdict >= min))
        .collect();

    ranked.sort_by(|a, b| b.result.ev_pct.total_cmp(&a.result.ev_pct));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::strategy::tests::{ladder_quotes, ScriptedProvider};
    use crate::config::Config;
    use crate::models::{RawQuote, SideConfig};
    use crate::utils::ev_calculator::VerdictThresholds;
    use crate::utils::ladder::LineLadderBuilder;

    fn line(value: f64) -> Line {
        Line::from_f64(value).unwrap()
    }

    fn evaluator() -> EvEvaluator {
        EvEvaluator::new(1.9, 0.0, VerdictThresholds::default()).unwrap()
    }

    fn request(fixture_id: &str, favorite: Side, handicap: &str) -> EvaluationRequest {
        EvaluationRequest {
            fixture_id: fixture_id.to_string(),
            sides: SideConfig::new("Home", "Away"),
            favorite,
            handicap: handicap.to_string(),
        }
    }

    #[test]
    fn test_target_lines() {
        let targets = target_lines(Side::Home, line(1.4));
        assert_eq!(targets[0], (Side::Home, line(-1.4)));
        assert_eq!(targets[1], (Side::Away, line(1.4)));
        assert_eq!(home_line(Side::Home, line(1.4)), line(-1.4));

        let targets = target_lines(Side::Away, line(0.3));
        assert_eq!(targets[0], (Side::Away, line(-0.3)));
        assert_eq!(targets[1], (Side::Home, line(0.3)));
        assert_eq!(home_line(Side::Away, line(0.3)), line(0.3));

        // Sign of the input does not matter, the favorite does
        assert_eq!(home_line(Side::Home, line(-1.4)), line(-1.4));
    }

    #[test]
    fn test_evaluate_ladder_sides_are_complementary() {
        let ladder = LineLadderBuilder::build(&ladder_quotes());
        let results = evaluate_ladder(&evaluator(), &ladder, Side::Home, line(0.75)).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].side, Side::Home);
        assert_eq!(results[0].line, line(-0.75));
        assert_eq!(results[1].side, Side::Away);
        assert_eq!(results[1].line, line(0.75));
        assert!((results[0].win_prob + results[1].win_prob - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_evaluate_ladder_out_of_range() {
        let ladder = LineLadderBuilder::build(&ladder_quotes());
        let err = evaluate_ladder(&evaluator(), &ladder, Side::Home, line(3.0)).unwrap_err();
        assert_eq!(err.reason_code(), "insufficient_data");
    }

    #[test]
    fn test_evaluate_all_lines_covers_both_sides() {
        let ladder = LineLadderBuilder::build(&ladder_quotes());
        let results = evaluate_all_lines(&evaluator(), &ladder, line(0.25)).unwrap();

        // -1.5..=1.5 every 0.25, two sides each
        assert_eq!(results.len(), 26);
        assert!(results.windows(2).all(|w| w[0].ev_pct >= w[1].ev_pct));

        let home = results
            .iter()
            .find(|r| r.side == Side::Home && r.line == line(-0.75))
            .unwrap();
        let away = results
            .iter()
            .find(|r| r.side == Side::Away && r.line == line(0.75))
            .unwrap();
        assert!((home.win_prob + away.win_prob - 1.0).abs() < 1e-9);

        // Same numbers as the single-handicap path
        let single = evaluate_ladder(&evaluator(), &ladder, Side::Home, line(0.75)).unwrap();
        assert_eq!(single[0], *home);
        assert_eq!(single[1], *away);
    }

    #[test]
    fn test_find_best_lines() {
        let ladder = LineLadderBuilder::build(&ladder_quotes());
        let all = evaluate_all_lines(&evaluator(), &ladder, line(0.05)).unwrap();
        assert_eq!(all.len(), 122);

        let best = find_best_lines(&evaluator(), &ladder, line(0.05), 5, None).unwrap();
        assert_eq!(best.len(), 5);
        assert_eq!(best[..], all[..5]);

        let floor = all[10].ev_pct;
        let above = find_best_lines(&evaluator(), &ladder, line(0.05), 100, Some(floor)).unwrap();
        assert!(above.iter().all(|r| r.ev_pct >= floor));
        assert!(above.len() >= 11);

        let none = find_best_lines(&evaluator(), &ladder, line(0.05), 5, Some(100.0)).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_evaluate_all_lines_needs_a_pair() {
        let ladder = LineLadderBuilder::build(&[RawQuote::new("Home -0.5", 1.95)]);
        let err = evaluate_all_lines(&evaluator(), &ladder, line(0.05)).unwrap_err();
        assert_eq!(err.reason_code(), "insufficient_data");
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let provider = Arc::new(ScriptedProvider::new(None, Some(ladder_quotes())));
        let pipeline =
            Arc::new(EvaluationPipeline::with_provider(&Config::default(), provider).unwrap());

        let outcomes = evaluate_fixtures(
            pipeline,
            vec![
                request("fx1", Side::Home, "0半5"),
                request("fx2", Side::Home, "not a line"),
                request("fx3", Side::Away, "9"),
                request("fx4", Side::Away, "1"),
            ],
        )
        .await;

        let ids: Vec<&str> = outcomes.iter().map(|o| o.fixture_id.as_str()).collect();
        assert_eq!(ids, ["fx1", "fx2", "fx3", "fx4"]);
        assert!(outcomes[0].outcome.is_ok());
        assert!(outcomes[3].outcome.is_ok());

        let counts = failure_counts(&outcomes);
        assert_eq!(counts.get("handicap_not_recognized"), Some(&1));
        assert_eq!(counts.get("insufficient_data"), Some(&1));
    }

    #[tokio::test]
    async fn test_rank_results_orders_and_filters() {
        let provider = Arc::new(ScriptedProvider::new(
            Some(vec![RawQuote::new("Home -0.5", 1.95), RawQuote::new("Away +0.5", 1.90)]),
            Some(ladder_quotes()),
        ));
        let pipeline =
            Arc::new(EvaluationPipeline::with_provider(&Config::default(), provider).unwrap());

        let outcomes = evaluate_fixtures(
            pipeline,
            vec![request("fx1", Side::Home, "1"), request("fx2", Side::Away, "bad")],
        )
        .await;

        let ranked = rank_results(&outcomes, None);
        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].result.ev_pct >= ranked[1].result.ev_pct);
        assert!(ranked.iter().all(|r| r.fixture_id == "fx1"));

        let clear = rank_results(&outcomes, Some(Verdict::ClearPlus));
        assert!(clear.iter().all(|r| r.result.verdict == Verdict::ClearPlus));
        assert!(clear.len() < ranked.len());
    }
}
