use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::ResourceCache;
use crate::error::FplError;
use crate::models::{
    BootstrapStatic, Element, ElementId, ElementType, EntryId, Fixture, LiveRound, LiveStats, Pick,
    Picks, RoundId, Team, TeamId,
};

pub const UNKNOWN_LABEL: &str = "Unknown";
pub const UNKNOWN_POSITION: &str = "UNK";
const LAST_FIELDED_SLOT: u8 = 11;

/// Live stats of one athlete, or the explicit all-zero state before they have a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "stats", rename_all = "snake_case")]
pub enum LiveStat {
    Recorded(LiveStats),
    NotYetPlayed,
}

impl LiveStat {
    pub fn stats(&self) -> LiveStats {
        match self {
            LiveStat::Recorded(stats) => *stats,
            LiveStat::NotYetPlayed => LiveStats::default(),
        }
    }

    pub fn total_points(&self) -> i32 {
        self.stats().total_points
    }

    pub fn minutes(&self) -> i32 {
        self.stats().minutes
    }
}

/// One fixture of a pick's team in the round, seen from that team's side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureSummary {
    pub fixture_id: u32,
    pub opponent_id: TeamId,
    pub opponent: String,
    pub is_home: bool,
    pub kickoff_time: Option<String>,
    pub started: bool,
    pub finished: bool,
    pub team_score: Option<i32>,
    pub opponent_score: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPick {
    pub element_id: ElementId,
    pub web_name: String,
    pub team_id: TeamId,
    pub team: String,
    pub position: String,
    pub slot: u8,
    pub multiplier: i32,
    pub is_captain: bool,
    pub is_vice_captain: bool,
    pub live: LiveStat,
    /// Zero, one or two entries.
    pub fixtures: Vec<FixtureSummary>,
    pub points: i32,
    pub fielded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveScoreView {
    pub entry_id: EntryId,
    pub round: RoundId,
    pub active_chip: Option<String>,
    pub picks: Vec<ScoredPick>,
    pub total_points: i32,
    pub bench_points: i32,
    pub transfer_cost: i32,
    pub net_points: i32,
}

impl LiveScoreView {
    pub fn fielded(&self) -> impl Iterator<Item = &ScoredPick> {
        self.picks.iter().filter(|pick| pick.fielded)
    }

    pub fn reserves(&self) -> impl Iterator<Item = &ScoredPick> {
        self.picks.iter().filter(|pick| !pick.fielded)
    }

    pub fn captain(&self) -> Option<&ScoredPick> {
        self.picks.iter().find(|pick| pick.is_captain)
    }
}

/// Contribution of a pick: its raw total, scaled by its own multiplier only when captain.
pub fn pick_points(pick: &Pick, live: &LiveStat) -> i32 {
    let raw = live.total_points();
    if pick.is_captain {
        raw * pick.multiplier
    } else {
        raw
    }
}

/// Joins already-fetched payloads into a view. Ids missing from the catalog get
/// placeholder labels instead of failing the view.
pub fn build_live_view(
    entry_id: EntryId,
    round: RoundId,
    picks: &Picks,
    live: &LiveRound,
    catalog: &BootstrapStatic,
    fixtures: &[Fixture],
) -> LiveScoreView {
    let elements: HashMap<ElementId, &Element> =
        catalog.elements.iter().map(|e| (e.id, e)).collect();
    let teams: HashMap<TeamId, &Team> = catalog.teams.iter().map(|t| (t.id, t)).collect();
    let positions: HashMap<u32, &ElementType> =
        catalog.element_types.iter().map(|p| (p.id, p)).collect();
    let live_stats: HashMap<ElementId, LiveStats> =
        live.elements.iter().map(|e| (e.id, e.stats)).collect();
    let team_label = |id: TeamId| {
        teams
            .get(&id)
            .map(|team| team.short_name.clone())
            .unwrap_or_else(|| UNKNOWN_LABEL.to_owned())
    };

    let mut by_team: HashMap<TeamId, Vec<FixtureSummary>> = HashMap::new();
    for fixture in fixtures {
        let started = fixture.started.unwrap_or(false);
        by_team
            .entry(fixture.team_h)
            .or_default()
            .push(FixtureSummary {
                fixture_id: fixture.id,
                opponent_id: fixture.team_a,
                opponent: team_label(fixture.team_a),
                is_home: true,
                kickoff_time: fixture.kickoff_time.clone(),
                started,
                finished: fixture.finished,
                team_score: fixture.team_h_score,
                opponent_score: fixture.team_a_score,
            });
        by_team
            .entry(fixture.team_a)
            .or_default()
            .push(FixtureSummary {
                fixture_id: fixture.id,
                opponent_id: fixture.team_h,
                opponent: team_label(fixture.team_h),
                is_home: false,
                kickoff_time: fixture.kickoff_time.clone(),
                started,
                finished: fixture.finished,
                team_score: fixture.team_a_score,
                opponent_score: fixture.team_h_score,
            });
    }

    let mut scored: Vec<ScoredPick> = picks
        .picks
        .iter()
        .map(|pick| {
            let element = elements.get(&pick.element);
            if element.is_none() {
                debug!(element = pick.element, "pick missing from catalog");
            }
            let team_id = element.map(|e| e.team).unwrap_or_default();
            let live = live_stats
                .get(&pick.element)
                .copied()
                .map_or(LiveStat::NotYetPlayed, LiveStat::Recorded);
            ScoredPick {
                element_id: pick.element,
                web_name: element
                    .map(|e| e.web_name.clone())
                    .unwrap_or_else(|| UNKNOWN_LABEL.to_owned()),
                team_id,
                team: team_label(team_id),
                position: element
                    .and_then(|e| positions.get(&e.element_type))
                    .map(|p| p.singular_name_short.clone())
                    .unwrap_or_else(|| UNKNOWN_POSITION.to_owned()),
                slot: pick.position,
                multiplier: pick.multiplier,
                is_captain: pick.is_captain,
                is_vice_captain: pick.is_vice_captain,
                fixtures: by_team.get(&team_id).cloned().unwrap_or_default(),
                points: pick_points(pick, &live),
                fielded: (1..=LAST_FIELDED_SLOT).contains(&pick.position),
                live,
            }
        })
        .collect();
    scored.sort_by_key(|pick| pick.slot);

    let total_points: i32 = scored.iter().filter(|p| p.fielded).map(|p| p.points).sum();
    let bench_points: i32 = scored.iter().filter(|p| !p.fielded).map(|p| p.points).sum();
    let transfer_cost = picks.entry_history.event_transfers_cost;

    LiveScoreView {
        entry_id,
        round,
        active_chip: picks.active_chip.clone(),
        picks: scored,
        total_points,
        bench_points,
        transfer_cost,
        net_points: total_points - transfer_cost,
    }
}

/// Captain-aware live scoring for one entrant and round, read through the resource cache.
#[derive(Clone)]
pub struct LiveScoringEngine {
    cache: ResourceCache,
}

impl LiveScoringEngine {
    pub fn new(cache: ResourceCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Fails as a whole if any of the four inputs cannot be fetched.
    pub async fn live_score_view(
        &self,
        entry_id: EntryId,
        round: RoundId,
    ) -> Result<LiveScoreView, FplError> {
        let (picks, live, catalog, fixtures) = tokio::try_join!(
            self.cache.picks(entry_id, round),
            self.cache.live_round(round),
            self.cache.bootstrap(),
            self.cache.fixtures(round),
        )?;
        let view = build_live_view(entry_id, round, &picks, &live, &catalog, &fixtures);
        debug!(
            entry_id,
            round,
            total = view.total_points,
            net = view.net_points,
            "built live score view"
        );
        Ok(view)
    }
}
