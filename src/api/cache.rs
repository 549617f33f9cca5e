use crate::models::LineLadder;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CachedLadder {
    ladder: LineLadder,
    stored_at: Instant,
}

/// Short-lived fixture_id -> ladder cache.
///
/// Cloning shares the same entries. Writes replace whatever is stored, so
/// duplicate concurrent fetches for one fixture simply leave the last result.
#[derive(Debug, Clone)]
pub struct LadderCache {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<String, CachedLadder>>>,
}

impl LadderCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// A fresh ladder for the fixture, if one is stored
    pub async fn get(&self, fixture_id: &str) -> Option<LineLadder> {
        let entries = self.entries.read().await;
        entries
            .get(fixture_id)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.ladder.clone())
    }

    /// Store a ladder, dropping any entries that have expired
    pub async fn insert(&self, fixture_id: &str, ladder: LineLadder) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        entries.insert(
            fixture_id.to_string(),
            CachedLadder {
                ladder,
                stored_at: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawQuote;
    use crate::utils::ladder::LineLadderBuilder;

    fn sample_ladder(home_odds: f64) -> LineLadder {
        LineLadderBuilder::build(&[
            RawQuote::new("Home -0.5", home_odds),
            RawQuote::new("Away +0.5", 1.90),
        ])
    }

    #[tokio::test]
    async fn test_get_and_overwrite() {
        let cache = LadderCache::new(Duration::from_secs(60));
        assert!(cache.get("fx1").await.is_none());

        cache.insert("fx1", sample_ladder(1.95)).await;
        cache.insert("fx1", sample_ladder(2.01)).await;

        let ladder = cache.get("fx1").await.unwrap();
        assert_eq!(ladder.home()[0].decimal_odds, 2.01);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = LadderCache::new(Duration::from_millis(20));
        cache.insert("fx1", sample_ladder(1.95)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(cache.get("fx1").await.is_none());
    }

    #[tokio::test]
    async fn test_insert_drops_expired_entries() {
        let cache = LadderCache::new(Duration::from_millis(20));
        for i in 0..50 {
            cache.insert(&format!("fx{}", i), sample_ladder(1.95)).await;
        }
        assert_eq!(cache.len().await, 50);

        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.insert("fresh", sample_ladder(1.95)).await;

        assert_eq!(cache.len().await, 1);
        assert!(cache.get("fresh").await.is_some());
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let cache = LadderCache::new(Duration::from_secs(60));
        let other = cache.clone();
        other.insert("fx2", sample_ladder(1.95)).await;
        assert!(cache.get("fx2").await.is_some());

        // Separate instances do not interfere
        let unrelated = LadderCache::new(Duration::from_secs(60));
        assert!(unrelated.get("fx2").await.is_none());
    }
}
