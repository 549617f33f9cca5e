use crate::api::cache::LadderCache;
use crate::api::OddsProvider;
use crate::config::Config;
use crate::error::ProviderError;
use crate::models::{LineLadder, MarketType, SideConfig};
use crate::utils::ladder::LineLadderBuilder;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A multi-line fetch with fewer outcomes than this is suspicious
const LOW_LADDER_OUTCOMES: usize = 10;

/// How to ask the provider for a fixture's odds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketStrategy {
    /// One quoted line per side from the bulk endpoint
    SingleLine,
    /// A dense ladder per side from the per-fixture endpoint
    MultiLine,
}

impl MarketStrategy {
    pub fn market_type(&self) -> MarketType {
        match self {
            MarketStrategy::SingleLine => MarketType::SingleLine,
            MarketStrategy::MultiLine => MarketType::MultiLine,
        }
    }

    pub fn supports_multiple_lines(&self) -> bool {
        matches!(self, MarketStrategy::MultiLine)
    }

    /// Fetch and build the ladder; an unusable response is `NoData`, never an empty ladder
    pub async fn fetch(
        &self,
        provider: &dyn OddsProvider,
        fixture_id: &str,
        sides: &SideConfig,
    ) -> Result<LineLadder, ProviderError> {
        // Each strategy reads a different endpoint
        let raw = match self {
            MarketStrategy::SingleLine => provider.fetch_single_line(fixture_id, sides).await?,
            MarketStrategy::MultiLine => provider.fetch_line_ladder(fixture_id, sides).await?,
        };

        let ladder = LineLadderBuilder::build(&raw);
        // Without a single home/away pair nothing can be devigged
        if ladder.pair_count() == 0 {
            return Err(ProviderError::NoData {
                fixture_id: fixture_id.to_string(),
                market: self.market_type().to_string(),
            });
        }

        if self.supports_multiple_lines() && ladder.len() < LOW_LADDER_OUTCOMES {
            warn!(
                "Unexpectedly low outcome count ({}) for {} on {}",
                ladder.len(),
                self.market_type(),
                fixture_id
            );
        }

        info!(
            "{} fetched for {}: {} quoted lines",
            self.market_type(),
            fixture_id,
            ladder.len()
        );
        Ok(ladder)
    }
}

/// Primary strategy plus the optional one tried after it fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyChain {
    pub primary: MarketStrategy,
    pub fallback: Option<MarketStrategy>,
}

pub struct StrategyFactory;

impl StrategyFactory {
    pub fn create(market: MarketType) -> MarketStrategy {
        match market {
            MarketType::SingleLine => MarketStrategy::SingleLine,
            MarketType::MultiLine => MarketStrategy::MultiLine,
        }
    }

    /// The requested strategy, with the other one wired as fallback when enabled
    pub fn create_with_fallback(market: MarketType, enable_fallback: bool) -> StrategyChain {
        let chain = StrategyChain {
            primary: Self::create(market),
            fallback: enable_fallback.then(|| Self::create(market.other())),
        };
        info!(
            "Using {} strategy (fallback: {})",
            chain.primary.market_type(),
            chain
                .fallback
                .map(|f| f.market_type().to_string())
                .unwrap_or_else(|| "disabled".to_string())
        );
        chain
    }

    pub fn from_config(config: &Config) -> StrategyChain {
        Self::create_with_fallback(config.market_type, config.enable_fallback)
    }
}

/// Where a fetched ladder came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderSource {
    Cache,
    Strategy(MarketType),
}

#[derive(Debug, Clone)]
pub struct FetchedLadder {
    pub ladder: LineLadder,
    pub source: LadderSource,
}

/// Runs a strategy chain against a provider, with a per-attempt timeout and an optional cache
#[derive(Clone)]
pub struct LadderFetcher {
    provider: Arc<dyn OddsProvider>,
    chain: StrategyChain,
    timeout: Duration,
    cache: Option<LadderCache>,
}

impl LadderFetcher {
    pub fn new(provider: Arc<dyn OddsProvider>, chain: StrategyChain, timeout: Duration) -> Self {
        Self {
            provider,
            chain,
            timeout,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: LadderCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// A complete ladder for the fixture, or an error; the fallback runs at most once
    pub async fn fetch(
        &self,
        fixture_id: &str,
        sides: &SideConfig,
    ) -> Result<FetchedLadder, ProviderError> {
        // Cache first
        if let Some(cache) = &self.cache {
            if let Some(ladder) = cache.get(fixture_id).await {
                info!("Ladder cache hit for {}", fixture_id);
                return Ok(FetchedLadder {
                    ladder,
                    source: LadderSource::Cache,
                });
            }
        }

        // Primary, then at most one fallback attempt
        let primary = self.chain.primary;
        let (ladder, used) = match self.attempt(primary, fixture_id, sides).await {
            Ok(ladder) => (ladder, primary),
            Err(primary_err) => {
                let fallback = match self.chain.fallback {
                    Some(fallback) => fallback,
                    None => return Err(primary_err),
                };
                warn!(
                    "{} failed for {} ({}), falling back to {}",
                    primary.market_type(),
                    fixture_id,
                    primary_err,
                    fallback.market_type()
                );
                match self.attempt(fallback, fixture_id, sides).await {
                    Ok(ladder) => (ladder, fallback),
                    Err(fallback_err) => {
                        return Err(ProviderError::StrategiesExhausted {
                            primary: primary_err.to_string(),
                            fallback: fallback_err.to_string(),
                        })
                    }
                }
            }
        };

        // Only successful ladders are stored
        if let Some(cache) = &self.cache {
            cache.insert(fixture_id, ladder.clone()).await;
        }

        Ok(FetchedLadder {
            ladder,
            source: LadderSource::Strategy(used.market_type()),
        })
    }

    async fn attempt(
        &self,
        strategy: MarketStrategy,
        fixture_id: &str,
        sides: &SideConfig,
    ) -> Result<LineLadder, ProviderError> {
        // An elapsed timer becomes a provider failure so the fallback can run
        tokio::time::timeout(
            self.timeout,
            strategy.fetch(self.provider.as_ref(), fixture_id, sides),
        )
        .await
        .map_err(|_| ProviderError::Timeout {
            fixture_id: fixture_id.to_string(),
            market: strategy.market_type().to_string(),
            secs: self.timeout.as_secs(),
        })?
    }
}
