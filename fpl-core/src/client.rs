use std::time::Duration;

use reqwest::{Client, ClientBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::FplError;
use crate::models::{
    BootstrapStatic, Entry, EntryHistory, EntryId, Fixture, LeagueId, LeagueStandings, LiveRound,
    Picks, RoundId,
};

pub const DEFAULT_BASE_URL: &str = "https://fantasy.premierleague.com/api/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "fplwatch/0.1";

/// Read-only client for the upstream statistics API. Requests are never retried.
#[derive(Debug, Clone)]
pub struct FplClient {
    http: Client,
    base: Url,
}

impl FplClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FplError> {
        let http = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Self::with_client(http, base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, FplError> {
        // Url::join drops the last segment unless the base ends with a slash.
        let base = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{base_url}/"))?
        };
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub async fn bootstrap_static(&self) -> Result<BootstrapStatic, FplError> {
        self.get_json("bootstrap-static/").await
    }

    pub async fn entry(&self, entry_id: EntryId) -> Result<Entry, FplError> {
        self.get_json(&format!("entry/{entry_id}/")).await
    }

    pub async fn entry_history(&self, entry_id: EntryId) -> Result<EntryHistory, FplError> {
        self.get_json(&format!("entry/{entry_id}/history/")).await
    }

    pub async fn picks(&self, entry_id: EntryId, round: RoundId) -> Result<Picks, FplError> {
        self.get_json(&format!("entry/{entry_id}/event/{round}/picks/"))
            .await
    }

    pub async fn live_round(&self, round: RoundId) -> Result<LiveRound, FplError> {
        self.get_json(&format!("event/{round}/live/")).await
    }

    pub async fn fixtures(&self, round: RoundId) -> Result<Vec<Fixture>, FplError> {
        self.get_json(&format!("fixtures/?event={round}")).await
    }

    pub async fn league_standings(
        &self,
        league_id: LeagueId,
        page: u32,
    ) -> Result<LeagueStandings, FplError> {
        self.get_json(&format!(
            "leagues-classic/{league_id}/standings/?page_standings={page}"
        ))
        .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FplError> {
        let url = self.base.join(path)?;
        debug!(%url, "upstream request");
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}
