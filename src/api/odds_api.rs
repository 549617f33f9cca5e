use crate::api::OddsProvider;
use crate::config::Config;
use crate::error::{ConfigError, ProviderError};
use crate::models::{RawQuote, Side, SideConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

const ODDS_API_BASE_URL: &str = "https://api.the-odds-api.com/v4";

/// Response from The Odds API for a single event
#[derive(Debug, Deserialize)]
struct OddsApiEvent {
    id: String,
    commence_time: Option<DateTime<Utc>>,
    home_team: String,
    away_team: String,
    #[serde(default)]
    bookmakers: Vec<OddsApiBookmaker>,
}

/// Bookmaker data from The Odds API
#[derive(Debug, Deserialize)]
struct OddsApiBookmaker {
    key: String,
    #[serde(default)]
    markets: Vec<OddsApiMarket>,
}

/// Market data (spreads or alternate_spreads)
#[derive(Debug, Deserialize)]
struct OddsApiMarket {
    key: String,
    #[serde(default)]
    outcomes: Vec<OddsApiOutcome>,
}

/// One side at one point
#[derive(Debug, Deserialize)]
struct OddsApiOutcome {
    name: String,
    price: f64,
    point: Option<f64>,
}

/// Remaining request quota as reported by the API
#[derive(Debug, Clone, Default)]
pub struct ApiUsage {
    pub remaining: Option<String>,
    pub used: Option<String>,
}

pub struct OddsApiClient {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    sport_key: String,
    regions: String,
    bookmaker: String,
}

impl OddsApiClient {
    pub fn new(api_key: String, sport_key: impl Into<String>) -> Self {
        let defaults = Config::default();
        Self {
            api_key,
            client: reqwest::Client::new(),
            base_url: ODDS_API_BASE_URL.to_string(),
            sport_key: sport_key.into(),
            regions: defaults.regions,
            bookmaker: defaults.bookmaker,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let api_key = config.require_api_key()?.to_string();
        Ok(Self {
            regions: config.regions.clone(),
            bookmaker: config.bookmaker.clone(),
            ..Self::new(api_key, config.sport_key.clone())
        })
    }

    /// Single quoted line per side, from the bulk odds endpoint
    async fn fetch_spreads(
        &self,
        fixture_id: &str,
        sides: &SideConfig,
    ) -> Result<Vec<RawQuote>, ProviderError> {
        let url = format!("{}/sports/{}/odds", self.base_url, self.sport_key);
        debug!(
            "GET {} markets=spreads eventIds={} bookmakers={}",
            url, fixture_id, self.bookmaker
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("regions", self.regions.as_str()),
                ("markets", "spreads"),
                ("bookmakers", self.bookmaker.as_str()),
                ("oddsFormat", "decimal"),
                ("dateFormat", "iso"),
                ("eventIds", fixture_id),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                fixture_id: fixture_id.to_string(),
                status: response.status().as_u16(),
            });
        }

        let events: Vec<OddsApiEvent> = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let quotes = events
            .iter()
            .find(|event| event.id == fixture_id)
            .map(|event| event_to_quotes(event, sides, &self.bookmaker, "spreads"))
            .unwrap_or_default();

        info!("spreads fetched for {}: {} outcome(s)", fixture_id, quotes.len());
        Ok(quotes)
    }

    /// Ladder of quoted lines per side, from the per-event endpoint
    async fn fetch_alternate_spreads(
        &self,
        fixture_id: &str,
        sides: &SideConfig,
    ) -> Result<Vec<RawQuote>, ProviderError> {
        let url = format!(
            "{}/sports/{}/events/{}/odds",
            self.base_url, self.sport_key, fixture_id
        );
        debug!(
            "GET {} markets=alternate_spreads bookmakers={}",
            url, self.bookmaker
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("regions", self.regions.as_str()),
                ("markets", "alternate_spreads"),
                ("bookmakers", self.bookmaker.as_str()),
                ("oddsFormat", "decimal"),
                ("dateFormat", "iso"),
            ])
            .send()
            .await?;

        // 422 means the sport has no alternate_spreads market
        if !response.status().is_success() {
            return Err(ProviderError::Status {
                fixture_id: fixture_id.to_string(),
                status: response.status().as_u16(),
            });
        }

        let event: OddsApiEvent = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        debug!(
            "{} vs {} starts {}",
            event.home_team,
            event.away_team,
            event
                .commence_time
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string())
        );

        let quotes = event_to_quotes(&event, sides, &self.bookmaker, "alternate_spreads");
        info!(
            "alternate_spreads fetched for {}: {} outcome(s)",
            fixture_id,
            quotes.len()
        );
        Ok(quotes)
    }

    /// Check how many API requests you have remaining
    pub async fn check_usage(&self) -> Result<ApiUsage, ProviderError> {
        let url = format!("{}/sports", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Ok(ApiUsage {
            remaining: header("x-requests-remaining"),
            used: header("x-requests-used"),
        })
    }
}

#[async_trait]
impl OddsProvider for OddsApiClient {
    async fn fetch_single_line(
        &self,
        fixture_id: &str,
        sides: &SideConfig,
    ) -> Result<Vec<RawQuote>, ProviderError> {
        self.fetch_spreads(fixture_id, sides).await
    }

    async fn fetch_line_ladder(
        &self,
        fixture_id: &str,
        sides: &SideConfig,
    ) -> Result<Vec<RawQuote>, ProviderError> {
        self.fetch_alternate_spreads(fixture_id, sides).await
    }
}

/// Flatten one bookmaker's market into "<Home|Away> <point>" tokens
fn event_to_quotes(
    event: &OddsApiEvent,
    sides: &SideConfig,
    bookmaker: &str,
    market: &str,
) -> Vec<RawQuote> {
    let event_sides = SideConfig::new(event.home_team.clone(), event.away_team.clone());

    event
        .bookmakers
        .iter()
        .filter(|b| b.key == bookmaker)
        .flat_map(|b| b.markets.iter().filter(|m| m.key == market))
        .flat_map(|m| m.outcomes.iter())
        .map(|outcome| {
            let label = sides
                .side_of(&outcome.name)
                .or_else(|| event_sides.side_of(&outcome.name))
                .map(|side| match side {
                    Side::Home => "Home",
                    Side::Away => "Away",
                })
                .unwrap_or(outcome.name.as_str());
            let point = outcome.point.unwrap_or(0.0);
            RawQuote::new(format!("{} {:+.2}", label, point), outcome.price)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ladder::LineLadderBuilder;

    const ALTERNATE_EVENT: &str = r#"{
        "id": "ev1",
        "commence_time": "2025-06-01T09:00:00Z",
        "home_team": "Hanshin Tigers",
        "away_team": "Yomiuri Giants",
        "bookmakers": [
            {
                "key": "pinnacle",
                "markets": [
                    {
                        "key": "alternate_spreads",
                        "outcomes": [
                            {"name": "Hanshin Tigers", "price": 2.45, "point": -1.5},
                            {"name": "Yomiuri Giants", "price": 1.56, "point": 1.5},
                            {"name": "Hanshin Tigers", "price": 1.52, "point": 1.5},
                            {"name": "Yomiuri Giants", "price": 2.55, "point": -1.5}
                        ]
                    }
                ]
            },
            {
                "key": "bet365",
                "markets": [
                    {
                        "key": "alternate_spreads",
                        "outcomes": [
                            {"name": "Hanshin Tigers", "price": 9.0, "point": -0.5}
                        ]
                    }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_event_to_quotes_uses_only_configured_bookmaker() {
        let event: OddsApiEvent = serde_json::from_str(ALTERNATE_EVENT).unwrap();
        let sides = SideConfig::new("Hanshin Tigers", "Yomiuri Giants");

        let quotes = event_to_quotes(&event, &sides, "pinnacle", "alternate_spreads");
        assert_eq!(quotes.len(), 4);
        assert_eq!(quotes[0], RawQuote::new("Home -1.50", 2.45));
        assert_eq!(quotes[1], RawQuote::new("Away +1.50", 1.56));

        let ladder = LineLadderBuilder::build(&quotes);
        assert_eq!(ladder.pair_count(), 2);
    }

    #[test]
    fn test_event_to_quotes_ignores_other_markets() {
        let event: OddsApiEvent = serde_json::from_str(ALTERNATE_EVENT).unwrap();
        let sides = SideConfig::new("Hanshin Tigers", "Yomiuri Giants");
        assert!(event_to_quotes(&event, &sides, "pinnacle", "spreads").is_empty());
    }

    #[test]
    fn test_unknown_outcome_name_is_kept_for_the_builder_to_drop() {
        let event: OddsApiEvent = serde_json::from_str(
            r#"{
                "id": "ev2",
                "home_team": "A",
                "away_team": "B",
                "bookmakers": [{"key": "pinnacle", "markets": [{"key": "spreads", "outcomes": [
                    {"name": "A", "price": 1.9, "point": -0.5},
                    {"name": "Draw", "price": 3.2, "point": 0.0}
                ]}]}]
            }"#,
        )
        .unwrap();
        // Side names given upstream differ from the provider's; event names still resolve
        let sides = SideConfig::new("Team A", "Team B");
        let quotes = event_to_quotes(&event, &sides, "pinnacle", "spreads");
        assert_eq!(quotes[0].token, "Home -0.50");
        assert_eq!(quotes[1].token, "Draw +0.00");
        assert_eq!(LineLadderBuilder::build(&quotes).len(), 1);
    }

    #[tokio::test]
    #[ignore]
    async fn test_check_usage_live() {
        let config = Config::from_env().unwrap();
        let client = OddsApiClient::from_config(&config).unwrap();
        let usage = client.check_usage().await.unwrap();
        assert!(usage.remaining.is_some());
    }
}
