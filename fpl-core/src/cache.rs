//! Cache-aside access to upstream resources.
//!
//! Each resource kind has one fixed TTL. Upstream failures are never cached, so the
//! next read after a failure goes upstream again.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::client::FplClient;
use crate::error::FplError;
use crate::models::{
    BootstrapStatic, Entry, EntryHistory, EntryId, Fixture, LeagueId, LeagueStandings, LiveRound,
    Picks, RoundId,
};
use crate::storage::CacheStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Catalog,
    Entrant,
    EntrantHistory,
    Picks,
    LiveRound,
    Fixtures,
    LeagueStandings,
}

impl ResourceType {
    pub fn ttl(self) -> Duration {
        match self {
            ResourceType::Catalog => Duration::from_secs(600),
            ResourceType::Entrant => Duration::from_secs(300),
            ResourceType::EntrantHistory => Duration::from_secs(300),
            ResourceType::Picks => Duration::from_secs(120),
            ResourceType::LiveRound => Duration::from_secs(60),
            ResourceType::Fixtures => Duration::from_secs(600),
            ResourceType::LeagueStandings => Duration::from_secs(300),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Catalog => "catalog",
            ResourceType::Entrant => "entrant",
            ResourceType::EntrantHistory => "entrant-history",
            ResourceType::Picks => "picks",
            ResourceType::LiveRound => "live-round",
            ResourceType::Fixtures => "fixtures",
            ResourceType::LeagueStandings => "league-standings",
        }
    }
}

/// Structured cache key: resource kind plus an ordered id tuple.
///
/// Renders as `kind[:id]*`. Ids are numeric and kinds contain no `:`, so two distinct
/// keys never render to the same string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    resource: ResourceType,
    ids: Vec<u64>,
}

impl CacheKey {
    pub fn new(resource: ResourceType) -> Self {
        Self {
            resource,
            ids: Vec::new(),
        }
    }

    pub fn id(mut self, id: impl Into<u64>) -> Self {
        self.ids.push(id.into());
        self
    }

    pub fn resource(&self) -> ResourceType {
        self.resource
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource.as_str())?;
        for id in &self.ids {
            write!(f, ":{id}")?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct ResourceCache {
    store: Arc<dyn CacheStore>,
    client: FplClient,
}

impl ResourceCache {
    pub fn new(store: Arc<dyn CacheStore>, client: FplClient) -> Self {
        Self { store, client }
    }

    pub fn client(&self) -> &FplClient {
        &self.client
    }

    pub async fn bootstrap(&self) -> Result<BootstrapStatic, FplError> {
        self.get_or_fetch(CacheKey::new(ResourceType::Catalog), || {
            self.client.bootstrap_static()
        })
        .await
    }

    pub async fn entry(&self, entry_id: EntryId) -> Result<Entry, FplError> {
        self.get_or_fetch(CacheKey::new(ResourceType::Entrant).id(entry_id), || {
            self.client.entry(entry_id)
        })
        .await
    }

    pub async fn entry_history(&self, entry_id: EntryId) -> Result<EntryHistory, FplError> {
        self.get_or_fetch(
            CacheKey::new(ResourceType::EntrantHistory).id(entry_id),
            || self.client.entry_history(entry_id),
        )
        .await
    }

    pub async fn picks(&self, entry_id: EntryId, round: RoundId) -> Result<Picks, FplError> {
        self.get_or_fetch(
            CacheKey::new(ResourceType::Picks).id(entry_id).id(round),
            || self.client.picks(entry_id, round),
        )
        .await
    }

    pub async fn live_round(&self, round: RoundId) -> Result<LiveRound, FplError> {
        self.get_or_fetch(CacheKey::new(ResourceType::LiveRound).id(round), || {
            self.client.live_round(round)
        })
        .await
    }

    pub async fn fixtures(&self, round: RoundId) -> Result<Vec<Fixture>, FplError> {
        self.get_or_fetch(CacheKey::new(ResourceType::Fixtures).id(round), || {
            self.client.fixtures(round)
        })
        .await
    }

    pub async fn league_standings(
        &self,
        league_id: LeagueId,
        page: u32,
    ) -> Result<LeagueStandings, FplError> {
        self.get_or_fetch(
            CacheKey::new(ResourceType::LeagueStandings)
                .id(league_id)
                .id(page),
            || self.client.league_standings(league_id, page),
        )
        .await
    }

    async fn get_or_fetch<T, F, Fut>(&self, key: CacheKey, fetch: F) -> Result<T, FplError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FplError>>,
    {
        let rendered = key.to_string();
        match self.store.get(&rendered).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    debug!(key = %rendered, "cache hit");
                    return Ok(value);
                }
                Err(err) => warn!(key = %rendered, error = %err, "unreadable cache entry, refetching"),
            },
            Ok(None) => debug!(key = %rendered, "cache miss"),
            Err(err) => warn!(key = %rendered, error = %err, "cache read failed, going upstream"),
        }

        let value = fetch().await?;
        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(err) = self
                    .store
                    .set_ex(&rendered, &raw, key.resource().ttl())
                    .await
                {
                    warn!(key = %rendered, error = %err, "cache write failed");
                }
            }
            Err(err) => warn!(key = %rendered, error = %err, "failed to serialize for cache"),
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_render_kind_and_ordered_ids() {
        assert_eq!(CacheKey::new(ResourceType::Catalog).to_string(), "catalog");
        assert_eq!(
            CacheKey::new(ResourceType::Picks).id(1234u64).id(7u32).to_string(),
            "picks:1234:7"
        );
        assert_ne!(
            CacheKey::new(ResourceType::Entrant).id(5u64).to_string(),
            CacheKey::new(ResourceType::EntrantHistory).id(5u64).to_string()
        );
        assert_ne!(
            CacheKey::new(ResourceType::LeagueStandings)
                .id(1u64)
                .id(23u32)
                .to_string(),
            CacheKey::new(ResourceType::LeagueStandings)
                .id(12u64)
                .id(3u32)
                .to_string()
        );
    }

    #[test]
    fn ttl_policy_is_fixed_per_kind() {
        assert_eq!(ResourceType::Catalog.ttl(), Duration::from_secs(600));
        assert_eq!(ResourceType::Entrant.ttl(), Duration::from_secs(300));
        assert_eq!(ResourceType::Picks.ttl(), Duration::from_secs(120));
        assert_eq!(ResourceType::LiveRound.ttl(), Duration::from_secs(60));
        assert_eq!(ResourceType::Fixtures.ttl(), Duration::from_secs(600));
        assert_eq!(ResourceType::LeagueStandings.ttl(), Duration::from_secs(300));
    }
}
