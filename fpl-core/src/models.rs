//! Subset of the upstream JSON payloads read by the core.
//!
//! Only identity fields are required; everything else defaults so that upstream
//! schema drift does not break decoding.

use serde::{Deserialize, Serialize};

pub type ElementId = u32;
pub type TeamId = u32;
pub type EntryId = u64;
pub type LeagueId = u64;
pub type RoundId = u32;

/// The season-long reference catalog (`bootstrap-static`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BootstrapStatic {
    #[serde(default)]
    pub events: Vec<Round>,
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default)]
    pub element_types: Vec<ElementType>,
}

impl BootstrapStatic {
    /// Round flagged as current, falling back to the next one before the season starts.
    pub fn current_round(&self) -> Option<RoundId> {
        self.events
            .iter()
            .find(|round| round.is_current)
            .or_else(|| self.events.iter().find(|round| round.is_next))
            .map(|round| round.id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Round {
    pub id: RoundId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub deadline_time: Option<String>,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub is_current: bool,
    #[serde(default)]
    pub is_next: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Team {
    pub id: TeamId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub short_name: String,
}

/// One athlete in the catalog, including the news fields watched by the detector.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Element {
    pub id: ElementId,
    #[serde(default)]
    pub web_name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub second_name: String,
    #[serde(default)]
    pub team: TeamId,
    #[serde(default)]
    pub element_type: u32,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub news: String,
    #[serde(default)]
    pub news_added: Option<String>,
    #[serde(default)]
    pub chance_of_playing_next_round: Option<u8>,
    #[serde(default)]
    pub chance_of_playing_this_round: Option<u8>,
    #[serde(default)]
    pub now_cost: i32,
    #[serde(default)]
    pub total_points: i32,
}

/// Playing position (goalkeeper, defender, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ElementType {
    pub id: u32,
    #[serde(default)]
    pub singular_name_short: String,
    #[serde(default)]
    pub plural_name_short: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub id: EntryId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub player_first_name: String,
    #[serde(default)]
    pub player_last_name: String,
    #[serde(default)]
    pub summary_overall_points: Option<i32>,
    #[serde(default)]
    pub summary_overall_rank: Option<u64>,
    #[serde(default)]
    pub summary_event_points: Option<i32>,
    #[serde(default)]
    pub current_event: Option<RoundId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EntryHistory {
    #[serde(default)]
    pub current: Vec<RoundHistory>,
    #[serde(default)]
    pub chips: Vec<ChipPlay>,
}

/// Per-round summary of an entrant, shared by the history and picks payloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoundHistory {
    #[serde(default)]
    pub event: RoundId,
    #[serde(default)]
    pub points: i32,
    #[serde(default)]
    pub total_points: i32,
    #[serde(default)]
    pub rank: Option<u64>,
    #[serde(default)]
    pub overall_rank: Option<u64>,
    #[serde(default)]
    pub event_transfers: u32,
    #[serde(default)]
    pub event_transfers_cost: i32,
    #[serde(default)]
    pub points_on_bench: i32,
    #[serde(default)]
    pub bank: i32,
    #[serde(default)]
    pub value: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChipPlay {
    pub name: String,
    #[serde(default)]
    pub event: RoundId,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Picks {
    #[serde(default)]
    pub active_chip: Option<String>,
    #[serde(default)]
    pub entry_history: RoundHistory,
    #[serde(default)]
    pub picks: Vec<Pick>,
}

/// One athlete in one squad slot. `position` is the slot rank, 1..=15.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Pick {
    pub element: ElementId,
    pub position: u8,
    #[serde(default = "default_multiplier")]
    pub multiplier: i32,
    #[serde(default)]
    pub is_captain: bool,
    #[serde(default)]
    pub is_vice_captain: bool,
}

fn default_multiplier() -> i32 {
    1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LiveRound {
    #[serde(default)]
    pub elements: Vec<LiveElement>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LiveElement {
    pub id: ElementId,
    #[serde(default)]
    pub stats: LiveStats,
}

/// Live per-athlete counters for one round. `Default` is the all-zero record.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LiveStats {
    pub minutes: i32,
    pub goals_scored: i32,
    pub assists: i32,
    pub clean_sheets: i32,
    pub goals_conceded: i32,
    pub own_goals: i32,
    pub penalties_saved: i32,
    pub penalties_missed: i32,
    pub yellow_cards: i32,
    pub red_cards: i32,
    pub saves: i32,
    pub bonus: i32,
    pub bps: i32,
    pub total_points: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Fixture {
    pub id: u32,
    #[serde(default)]
    pub event: Option<RoundId>,
    pub team_h: TeamId,
    pub team_a: TeamId,
    #[serde(default)]
    pub team_h_score: Option<i32>,
    #[serde(default)]
    pub team_a_score: Option<i32>,
    #[serde(default)]
    pub kickoff_time: Option<String>,
    #[serde(default)]
    pub started: Option<bool>,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub finished_provisional: bool,
    #[serde(default)]
    pub minutes: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LeagueStandings {
    #[serde(default)]
    pub league: LeagueInfo,
    #[serde(default)]
    pub standings: StandingsPage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LeagueInfo {
    #[serde(default)]
    pub id: LeagueId,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StandingsPage {
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub results: Vec<Standing>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Standing {
    #[serde(default)]
    pub id: u64,
    pub entry: EntryId,
    #[serde(default)]
    pub entry_name: String,
    #[serde(default)]
    pub player_name: String,
    #[serde(default)]
    pub rank: u32,
    #[serde(default)]
    pub last_rank: u32,
    #[serde(default)]
    pub total: i32,
    #[serde(default)]
    pub event_total: i32,
}
