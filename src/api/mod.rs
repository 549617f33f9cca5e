pub mod cache;
pub mod odds_api;
pub mod strategy;

use crate::error::ProviderError;
use crate::models::{RawQuote, SideConfig};
use async_trait::async_trait;

/// The external odds provider, reduced to the two requests the strategies make
#[async_trait]
pub trait OddsProvider: Send + Sync {
    /// One quoted line per side for the fixture
    async fn fetch_single_line(
        &self,
        fixture_id: &str,
        sides: &SideConfig,
    ) -> Result<Vec<RawQuote>, ProviderError>;

    /// Every quoted line per side for the fixture
    async fn fetch_line_ladder(
        &self,
        fixture_id: &str,
        sides: &SideConfig,
    ) -> Result<Vec<RawQuote>, ProviderError>;
}
