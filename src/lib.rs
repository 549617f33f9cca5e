pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod utils;

pub use api::*;
pub use error::*;
pub use models::*;
pub use utils::*;

use api::cache::LadderCache;
use api::odds_api::OddsApiClient;
use api::strategy::{FetchedLadder, LadderFetcher, LadderSource, StrategyFactory};
use config::Config;
use std::sync::Arc;
use tracing::info;
use utils::ev_analysis::evaluate_ladder;
use utils::ev_calculator::EvEvaluator;
use utils::notation::{to_line, to_notation};

/// Per-fixture orchestration: notation, ladder fetch, interpolation, EV
pub struct EvaluationPipeline {
    fetcher: LadderFetcher,
    evaluator: EvEvaluator,
}

impl EvaluationPipeline {
    pub fn new(fetcher: LadderFetcher, evaluator: EvEvaluator) -> Self {
        Self { fetcher, evaluator }
    }

    /// Pipeline backed by The Odds API; needs `ODDS_API_KEY`
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let client = OddsApiClient::from_config(config)?;
        Self::with_provider(config, Arc::new(client))
    }

    /// Pipeline over any provider, wired from the same settings
    pub fn with_provider(
        config: &Config,
        provider: Arc<dyn OddsProvider>,
    ) -> Result<Self, ConfigError> {
        let mut fetcher = LadderFetcher::new(
            provider,
            StrategyFactory::from_config(config),
            config.fetch_timeout,
        );
        if !config.cache_ttl.is_zero() {
            fetcher = fetcher.with_cache(LadderCache::new(config.cache_ttl));
        }
        Ok(Self::new(fetcher, config.evaluator()?))
    }

    pub async fn fetch_ladder(
        &self,
        fixture_id: &str,
        sides: &SideConfig,
    ) -> Result<FetchedLadder, EvaluationError> {
        Ok(self.fetcher.fetch(fixture_id, sides).await?)
    }

    /// Evaluate both sides of one fixture's handicap.
    ///
    /// The notation is checked before any request goes out, so a bad token
    /// never costs an API call.
    pub async fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> Result<FixtureEvaluation, EvaluationError> {
        let line = to_line(&request.handicap)?.abs();
        let fetched = self
            .fetch_ladder(&request.fixture_id, &request.sides)
            .await?;

        let results = evaluate_ladder(&self.evaluator, &fetched.ladder, request.favorite, line)?;
        info!(
            "{}: {} ({}) favorite {} -> {} result(s)",
            request.fixture_id,
            request.handicap,
            line,
            request.favorite,
            results.len()
        );

        Ok(FixtureEvaluation {
            fixture_id: request.fixture_id.clone(),
            handicap: request.handicap.clone(),
            notation: to_notation(line),
            line,
            ladder_size: fetched.ladder.len(),
            strategy: match fetched.source {
                LadderSource::Strategy(market) => Some(market),
                LadderSource::Cache => None,
            },
            results,
        })
    }
}
