//! Player-news change detection over periodic full-catalog polls.
//!
//! Each cycle diffs a sparse snapshot of watched fields against the previous one and
//! appends the resulting events to a time-ordered log in the store.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::FplClient;
use crate::error::FplError;
use crate::models::{BootstrapStatic, Element, ElementId};
use crate::scoring::UNKNOWN_LABEL;
use crate::storage::CacheStore;

pub const SNAPSHOT_KEY: &str = "detector:snapshot";
pub const EVENTS_KEY: &str = "detector:events";
pub const LAST_CHECKED_KEY: &str = "detector:last_checked";
pub const LEASE_KEY: &str = "detector:lease";
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Watched fields of one athlete as of the last successful poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshotRecord {
    pub news: String,
    pub news_added: Option<String>,
    pub status: String,
    pub chance_of_playing_next_round: Option<u8>,
    pub chance_of_playing_this_round: Option<u8>,
}

impl PlayerSnapshotRecord {
    fn from_element(element: &Element) -> Self {
        Self {
            news: element.news.clone(),
            news_added: element.news_added.clone(),
            status: element.status.clone(),
            chance_of_playing_next_round: element.chance_of_playing_next_round,
            chance_of_playing_this_round: element.chance_of_playing_this_round,
        }
    }

    pub fn has_news(&self) -> bool {
        !self.news.is_empty()
    }
}

pub type Snapshot = HashMap<ElementId, PlayerSnapshotRecord>;

/// Keeps only athletes with news or a known playing chance.
pub fn extract_snapshot(catalog: &BootstrapStatic) -> Snapshot {
    catalog
        .elements
        .iter()
        .filter(|e| {
            !e.news.is_empty()
                || e.chance_of_playing_next_round.is_some()
                || e.chance_of_playing_this_round.is_some()
        })
        .map(|e| (e.id, PlayerSnapshotRecord::from_element(e)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    New,
    Updated,
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: Uuid,
    pub player_id: ElementId,
    pub web_name: String,
    pub team: String,
    pub change_type: ChangeType,
    pub old_news: Option<String>,
    pub new_news: Option<String>,
    pub old_status: Option<String>,
    pub new_status: Option<String>,
    pub old_chance: Option<u8>,
    pub new_chance: Option<u8>,
    pub news_added: Option<String>,
    pub timestamp: DateTime<Utc>,
}

fn with_news(snapshot: &Snapshot, id: ElementId) -> Option<&PlayerSnapshotRecord> {
    snapshot.get(&id).filter(|record| record.has_news())
}

/// Classifies every athlete that had or has news. Athletes that vanished from the
/// catalog while carrying news come out as `Cleared`. Output is ordered by player id.
pub fn diff_snapshots(
    previous: &Snapshot,
    current: &Snapshot,
    catalog: &BootstrapStatic,
    now: DateTime<Utc>,
) -> Vec<ChangeEvent> {
    let elements: HashMap<ElementId, &Element> =
        catalog.elements.iter().map(|e| (e.id, e)).collect();
    let teams: HashMap<u32, &str> = catalog
        .teams
        .iter()
        .map(|t| (t.id, t.short_name.as_str()))
        .collect();

    let ids: BTreeSet<ElementId> = previous
        .iter()
        .chain(current.iter())
        .filter(|(_, record)| record.has_news())
        .map(|(id, _)| *id)
        .collect();

    let mut events = Vec::new();
    for id in ids {
        let old = with_news(previous, id);
        let new = with_news(current, id);
        let change_type = match (old, new) {
            (None, Some(_)) => ChangeType::New,
            (Some(old), Some(new))
                if old.news != new.news || old.news_added != new.news_added =>
            {
                ChangeType::Updated
            }
            (Some(_), None) => ChangeType::Cleared,
            _ => continue,
        };
        // On clear, report the current (possibly news-free) record as the new side.
        let new_side = new.or_else(|| current.get(&id));
        let element = elements.get(&id);
        events.push(ChangeEvent {
            id: Uuid::new_v4(),
            player_id: id,
            web_name: element
                .map(|e| e.web_name.clone())
                .unwrap_or_else(|| UNKNOWN_LABEL.to_owned()),
            team: element
                .and_then(|e| teams.get(&e.team))
                .map(|name| (*name).to_owned())
                .unwrap_or_else(|| UNKNOWN_LABEL.to_owned()),
            change_type,
            old_news: old.map(|r| r.news.clone()),
            new_news: new.map(|r| r.news.clone()),
            old_status: old.map(|r| r.status.clone()),
            new_status: new_side.map(|r| r.status.clone()),
            old_chance: old.and_then(|r| r.chance_of_playing_next_round),
            new_chance: new_side.and_then(|r| r.chance_of_playing_next_round),
            news_added: new.and_then(|r| r.news_added.clone()),
            timestamp: now,
        });
    }
    events
}

/// Result of one detection cycle. Never an `Err`: failures land in `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub changes_detected: usize,
    pub is_initial_run: bool,
    pub skipped: bool,
    pub error: Option<String>,
    pub events: Vec<ChangeEvent>,
}

impl CycleOutcome {
    fn initial() -> Self {
        Self {
            is_initial_run: true,
            ..Default::default()
        }
    }

    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }

    fn failed(err: &FplError) -> Self {
        Self {
            error: Some(err.to_string()),
            ..Default::default()
        }
    }

    fn changes(events: Vec<ChangeEvent>) -> Self {
        Self {
            changes_detected: events.len(),
            events,
            ..Default::default()
        }
    }
}

struct ProcessingGuard<'a>(&'a AtomicBool);

impl<'a> ProcessingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ChangeDetector {
    store: Arc<dyn CacheStore>,
    client: FplClient,
    processing: AtomicBool,
    retention: Duration,
    lease_ttl: Option<Duration>,
    instance_id: String,
}

impl ChangeDetector {
    /// The client is used directly so every poll sees fresh upstream data.
    pub fn new(store: Arc<dyn CacheStore>, client: FplClient) -> Self {
        Self {
            store,
            client,
            processing: AtomicBool::new(false),
            retention: DEFAULT_RETENTION,
            lease_ttl: None,
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Also take a store-wide lease for each cycle so separate processes sharing one
    /// store do not poll at the same time.
    pub fn with_lease(mut self, ttl: Duration) -> Self {
        self.lease_ttl = Some(ttl);
        self
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub async fn run_cycle(&self) -> CycleOutcome {
        let Some(_guard) = ProcessingGuard::acquire(&self.processing) else {
            info!("detection cycle already running, skipping");
            return CycleOutcome::skipped();
        };

        if let Some(ttl) = self.lease_ttl {
            match self.store.set_nx_ex(LEASE_KEY, &self.instance_id, ttl).await {
                Ok(true) => {}
                Ok(false) => {
                    info!("detection lease held elsewhere, skipping");
                    return CycleOutcome::skipped();
                }
                Err(err) => {
                    warn!(error = %err, "failed to acquire detection lease");
                    self.touch_last_checked().await;
                    return CycleOutcome::failed(&err);
                }
            }
        }

        let outcome = match self.detect().await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "detection cycle failed");
                CycleOutcome::failed(&err)
            }
        };
        self.touch_last_checked().await;

        if self.lease_ttl.is_some() {
            match self.store.del_if_eq(LEASE_KEY, &self.instance_id).await {
                Ok(true) => {}
                Ok(false) => warn!("detection lease expired during the cycle and was not released"),
                Err(err) => warn!(error = %err, "failed to release detection lease"),
            }
        }
        outcome
    }

    async fn detect(&self) -> Result<CycleOutcome, FplError> {
        let catalog = self.client.bootstrap_static().await?;
        let current = extract_snapshot(&catalog);

        let Some(previous) = self.load_snapshot().await? else {
            self.save_snapshot(&current).await?;
            info!(tracked = current.len(), "stored initial snapshot");
            return Ok(CycleOutcome::initial());
        };

        let now = Utc::now();
        let events = diff_snapshots(&previous, &current, &catalog, now);
        let score = now.timestamp_millis() as f64;
        let members = events
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        for (appended, member) in members.iter().enumerate() {
            if let Err(err) = self.store.zadd(EVENTS_KEY, member, score).await {
                if appended > 0 {
                    warn!(
                        appended,
                        "event append failed midway, baseline kept; the next cycle will log these changes again"
                    );
                }
                return Err(err);
            }
        }

        let cutoff = self.retention_cutoff(now);
        match self
            .store
            .zrem_range_by_score(EVENTS_KEY, f64::NEG_INFINITY, (cutoff - 1) as f64)
            .await
        {
            Ok(0) => {}
            Ok(pruned) => debug!(pruned, "pruned expired change events"),
            Err(err) => warn!(error = %err, "failed to prune expired change events"),
        }

        if let Err(err) = self.save_snapshot(&current).await {
            if !events.is_empty() {
                warn!(
                    appended = events.len(),
                    "snapshot save failed after appending events, baseline kept; the next cycle will log these changes again"
                );
            }
            return Err(err);
        }

        info!(
            changes = events.len(),
            tracked = current.len(),
            "detection cycle complete"
        );
        Ok(CycleOutcome::changes(events))
    }

    async fn load_snapshot(&self) -> Result<Option<Snapshot>, FplError> {
        let Some(raw) = self.store.get(SNAPSHOT_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<Snapshot>(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                warn!(error = %err, "stored snapshot unreadable, treating as first run");
                Ok(None)
            }
        }
    }

    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), FplError> {
        let raw = serde_json::to_string(snapshot)?;
        self.store.set(SNAPSHOT_KEY, &raw).await
    }

    async fn touch_last_checked(&self) {
        let now = Utc::now().timestamp_millis().to_string();
        if let Err(err) = self.store.set(LAST_CHECKED_KEY, &now).await {
            warn!(error = %err, "failed to update last-checked time");
        }
    }

    /// Epoch-ms score below which events fall outside the retention window.
    fn retention_cutoff(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp_millis() - self.retention.as_millis() as i64
    }

    pub async fn last_checked(&self) -> Result<Option<DateTime<Utc>>, FplError> {
        let Some(raw) = self.store.get(LAST_CHECKED_KEY).await? else {
            return Ok(None);
        };
        let millis = raw
            .parse::<i64>()
            .map_err(|err| FplError::Store(format!("bad last-checked value {raw:?}: {err}")))?;
        Ok(Utc.timestamp_millis_opt(millis).single())
    }

    /// Events newer than `since` and inside the retention window, newest first.
    pub async fn get_events(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ChangeEvent>, FplError> {
        let floor = self.retention_cutoff(Utc::now());
        let min = since.map_or(floor, |since| (since.timestamp_millis() + 1).max(floor));
        let members = self
            .store
            .zrange_by_score(EVENTS_KEY, min as f64, f64::INFINITY)
            .await?;

        let mut events: Vec<ChangeEvent> = members
            .iter()
            .filter_map(|member| match serde_json::from_str::<ChangeEvent>(member) {
                Ok(event) => Some(event),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable change event");
                    None
                }
            })
            .collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(events)
    }

    pub async fn get_events_for_entities(
        &self,
        ids: &HashSet<ElementId>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ChangeEvent>, FplError> {
        let mut events = self.get_events(since).await?;
        events.retain(|event| ids.contains(&event.player_id));
        Ok(events)
    }
}
