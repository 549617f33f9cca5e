use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use handicap_ev::config::Config;
use handicap_ev::data::{load_ladder, load_requests, save_evaluations_to_csv, save_ladder};
use handicap_ev::ev_analysis::{
    evaluate_fixtures, evaluate_ladder, failure_counts, find_best_lines, rank_results,
};
use handicap_ev::ev_calculator::EvEvaluator;
use handicap_ev::interpolator::Interpolator;
use handicap_ev::notation::{to_line, to_notation};
use handicap_ev::odds_api::OddsApiClient;
use handicap_ev::{
    EvResult, EvaluationPipeline, EvaluationRequest, Line, LineLadder, Side, SideConfig, Verdict,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cli", about = "Handicap EV calculator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert handicap tokens to decimal lines (or back with --from-line)
    Convert {
        values: Vec<String>,
        #[arg(long)]
        from_line: bool,
    },
    /// Show a fixture's ladder and its interpolated fair values
    Ladder {
        #[command(flatten)]
        fixture: FixtureArgs,
        /// Read the ladder from a JSON file instead of the provider
        #[arg(long)]
        ladder_file: Option<String>,
        /// Save the fetched ladder to this JSON file
        #[arg(long)]
        save: Option<String>,
        /// Print fair values at every 0.05 line
        #[arg(long)]
        fine: bool,
        /// Print the N best-EV lines across the ladder
        #[arg(long)]
        best: Option<usize>,
        /// Only list lines with at least this EV percent
        #[arg(long, allow_hyphen_values = true)]
        min_ev: Option<f64>,
        /// Line spacing for --best
        #[arg(long, default_value_t = 0.05)]
        step: f64,
    },
    /// Evaluate both sides of one fixture's handicap
    Evaluate {
        #[command(flatten)]
        fixture: FixtureArgs,
        #[arg(long)]
        favorite: Side,
        #[arg(long)]
        handicap: String,
        /// Evaluate against a saved ladder instead of the provider
        #[arg(long)]
        ladder_file: Option<String>,
    },
    /// Evaluate every request in a JSON file concurrently
    Batch {
        requests: String,
        #[arg(long)]
        min_verdict: Option<Verdict>,
        #[arg(long, default_value_t = 30)]
        top: usize,
        /// Export evaluations to CSV
        #[arg(long)]
        csv: Option<String>,
    },
    /// Show remaining API quota
    Usage,
}

#[derive(Args)]
struct FixtureArgs {
    #[arg(long)]
    fixture_id: String,
    #[arg(long, default_value = "Home")]
    home: String,
    #[arg(long, default_value = "Away")]
    away: String,
}

impl FixtureArgs {
    fn sides(&self) -> SideConfig {
        SideConfig::new(self.home.clone(), self.away.clone())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    match cli.command {
        Command::Convert { values, from_line } => convert(&values, from_line),
        Command::Ladder {
            fixture,
            ladder_file,
            save,
            fine,
            best,
            min_ev,
            step,
        } => {
            let ladder = match ladder_file {
                Some(path) => load_ladder(&path)?,
                None => {
                    let pipeline = EvaluationPipeline::from_config(&config)?;
                    let fetched = pipeline
                        .fetch_ladder(&fixture.fixture_id, &fixture.sides())
                        .await
                        .context("Failed to fetch ladder")?;
                    fetched.ladder
                }
            };
            if let Some(path) = save {
                save_ladder(&ladder, &path)?;
                println!("Saved ladder to {}\n", path);
            }
            show_ladder(&ladder, fine)?;
            if let Some(top_n) = best {
                let evaluator = config.evaluator()?;
                let step = Line::from_f64(step)?;
                let results = find_best_lines(&evaluator, &ladder, step, top_n, min_ev)?;
                show_best_lines(&evaluator, &results);
            }
            Ok(())
        }
        Command::Evaluate {
            fixture,
            favorite,
            handicap,
            ladder_file,
        } => match ladder_file {
            Some(path) => {
                let ladder = load_ladder(&path)?;
                let line = to_line(&handicap)?.abs();
                let results = evaluate_ladder(&config.evaluator()?, &ladder, favorite, line)?;
                println!("{} {} (line {})\n", fixture.fixture_id, handicap, line);
                for result in &results {
                    println!("{}", result_line(result));
                }
                Ok(())
            }
            None => {
                let pipeline = EvaluationPipeline::from_config(&config)?;
                let request = EvaluationRequest {
                    fixture_id: fixture.fixture_id.clone(),
                    sides: fixture.sides(),
                    favorite,
                    handicap,
                };
                let evaluation = match pipeline.evaluate(&request).await {
                    Ok(evaluation) => evaluation,
                    Err(e) => {
                        eprintln!("Error ({}): {}", e.reason_code(), e);
                        return Err(e.into());
                    }
                };
                println!(
                    "{} {} (line {}, {} quoted lines, {})\n",
                    evaluation.fixture_id,
                    evaluation.notation,
                    evaluation.line,
                    evaluation.ladder_size,
                    evaluation
                        .strategy
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "cached".to_string())
                );
                for result in &evaluation.results {
                    println!("{}", result_line(result));
                }
                Ok(())
            }
        },
        Command::Batch {
            requests,
            min_verdict,
            top,
            csv,
        } => {
            let requests = load_requests(&requests)?;
            println!("Evaluating {} fixture(s)...\n", requests.len());

            let pipeline = Arc::new(EvaluationPipeline::from_config(&config)?);
            let outcomes = evaluate_fixtures(pipeline, requests).await;

            for outcome in &outcomes {
                if let Err(e) = &outcome.outcome {
                    println!("⚠️  {}: {} ({})", outcome.fixture_id, e, e.reason_code());
                }
            }

            let ranked = rank_results(&outcomes, min_verdict);
            if ranked.is_empty() {
                println!("\nNo results to show.");
            } else {
                println!("\nTop {} Results:\n", ranked.len().min(top));
                for (i, result) in ranked.iter().take(top).enumerate() {
                    println!("{}. {}", i + 1, result.format());
                }
            }

            let failures = failure_counts(&outcomes);
            if !failures.is_empty() {
                println!("\nFailures:");
                for (code, count) in failures {
                    println!("  {}: {}", code, count);
                }
            }

            if let Some(path) = csv {
                let evaluations: Vec<_> = outcomes
                    .into_iter()
                    .filter_map(|o| o.outcome.ok())
                    .collect();
                save_evaluations_to_csv(&evaluations, &path)?;
                println!("\nSaved evaluations to {}", path);
            }
            Ok(())
        }
        Command::Usage => {
            let client = OddsApiClient::from_config(&config)?;
            let usage = client.check_usage().await?;
            println!(
                "Requests remaining: {}",
                usage.remaining.as_deref().unwrap_or("unknown")
            );
            println!(
                "Requests used: {}",
                usage.used.as_deref().unwrap_or("unknown")
            );
            Ok(())
        }
    }
}

fn convert(values: &[String], from_line: bool) -> Result<()> {
    for value in values {
        if from_line {
            let decimal: f64 = value
                .parse()
                .with_context(|| format!("'{}' is not a number", value))?;
            let line = Line::from_f64(decimal)?;
            println!("{} -> {}", value, to_notation(line));
        } else {
            match to_line(value) {
                Ok(line) => println!("{} -> {}", value, line),
                Err(e) => println!("{} -> error: {}", value, e),
            }
        }
    }
    Ok(())
}

fn show_ladder(ladder: &LineLadder, fine: bool) -> Result<()> {
    println!("{:>7} | {:>6} | {:>6}", "home", "home", "away");
    for (line, home, away) in ladder.pairs() {
        println!(
            "{:>7} | {:>6.3} | {:>6.3}",
            line.to_string(),
            home.decimal_odds,
            away.decimal_odds
        );
    }

    let (zero, rule) = Interpolator::zero_line(ladder)?;
    println!(
        "\nZero line: home {:.4} / away {:.4} ({:?})",
        zero.home_prob, zero.away_prob, rule
    );

    if fine {
        println!();
        for fair in Interpolator::fine_ladder(ladder)? {
            println!(
                "{:>7} {:>6} | home {:.4} | away {:.4}",
                fair.line.to_string(),
                to_notation(fair.line),
                fair.home_prob,
                fair.away_prob
            );
        }
    }
    Ok(())
}

fn result_line(result: &EvResult) -> String {
    format!(
        "{:>4} {:>6} | p={:.4} | fair {:.4} | odds {:.4} | EV: {:+.2}% | {}",
        result.side.as_str(),
        result.line.to_string(),
        result.win_prob,
        result.fair_odds,
        result.effective_odds,
        result.ev_pct,
        result.verdict
    )
}

fn show_best_lines(evaluator: &EvEvaluator, results: &[EvResult]) {
    println!(
        "\nBest lines (reference {:.2}, rebate {:.3}):\n",
        evaluator.reference_odds(),
        evaluator.rebate_rate()
    );
    if results.is_empty() {
        println!("No lines meet the criteria.");
    }
    for (i, result) in results.iter().enumerate() {
        println!("{}. {} ({})", i + 1, result_line(result), to_notation(result.line.abs()));
    }
}
