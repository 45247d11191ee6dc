use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FplError;
use crate::models::{ElementId, EntryId, RoundId};
use crate::scoring::{LiveScoreView, LiveScoringEngine, ScoredPick};

/// Gap in differential points above which the summary calls out the differentials.
pub const DIFFERENTIAL_NARRATIVE_THRESHOLD: i32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedPick {
    pub element_id: ElementId,
    pub web_name: String,
    pub points_a: i32,
    pub points_b: i32,
}

/// Captain-adjusted comparison of both captains. `swing > 0` favours side A.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptainSwing {
    pub captain_a: Option<String>,
    pub captain_b: Option<String>,
    pub points_a: i32,
    pub points_b: i32,
    pub swing: i32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub round: RoundId,
    pub entry_a: EntryId,
    pub entry_b: EntryId,
    pub net_points_a: i32,
    pub net_points_b: i32,
    pub shared: Vec<SharedPick>,
    pub differentials_a: Vec<ScoredPick>,
    pub differentials_b: Vec<ScoredPick>,
    pub differential_points_a: i32,
    pub differential_points_b: i32,
    pub captain_swing: CaptainSwing,
    pub summary: Vec<String>,
}

/// Derives shared and differential sets over fielded picks only.
pub fn compare_views(a: &LiveScoreView, b: &LiveScoreView) -> ComparisonResult {
    let fielded_b: HashMap<ElementId, &ScoredPick> =
        b.fielded().map(|pick| (pick.element_id, pick)).collect();
    let ids_a: HashSet<ElementId> = a.fielded().map(|pick| pick.element_id).collect();

    let shared: Vec<SharedPick> = a
        .fielded()
        .filter_map(|pick| {
            fielded_b.get(&pick.element_id).map(|other| SharedPick {
                element_id: pick.element_id,
                web_name: pick.web_name.clone(),
                points_a: pick.points,
                points_b: other.points,
            })
        })
        .collect();
    let differentials_a: Vec<ScoredPick> = a
        .fielded()
        .filter(|pick| !fielded_b.contains_key(&pick.element_id))
        .cloned()
        .collect();
    let differentials_b: Vec<ScoredPick> = b
        .fielded()
        .filter(|pick| !ids_a.contains(&pick.element_id))
        .cloned()
        .collect();
    let differential_points_a: i32 = differentials_a.iter().map(|pick| pick.points).sum();
    let differential_points_b: i32 = differentials_b.iter().map(|pick| pick.points).sum();

    let captain_swing = captain_swing(a, b);
    let summary = narrate(
        a,
        b,
        differential_points_a,
        differential_points_b,
        &captain_swing,
    );

    ComparisonResult {
        round: a.round,
        entry_a: a.entry_id,
        entry_b: b.entry_id,
        net_points_a: a.net_points,
        net_points_b: b.net_points,
        shared,
        differentials_a,
        differentials_b,
        differential_points_a,
        differential_points_b,
        captain_swing,
        summary,
    }
}

fn captain_swing(a: &LiveScoreView, b: &LiveScoreView) -> CaptainSwing {
    let captain_a = a.captain();
    let captain_b = b.captain();
    let points_a = captain_a.map_or(0, |pick| pick.points);
    let points_b = captain_b.map_or(0, |pick| pick.points);
    let swing = points_a - points_b;
    let label = |pick: Option<&ScoredPick>| pick.map(|p| p.web_name.clone());

    let description = match (captain_a, captain_b) {
        (None, None) => "No captain on either side".to_owned(),
        (Some(ca), Some(cb)) if ca.element_id == cb.element_id && swing == 0 => {
            format!("Both captained {} ({} pts), no swing", ca.web_name, points_a)
        }
        _ => {
            let name_a = label(captain_a).unwrap_or_else(|| "none".to_owned());
            let name_b = label(captain_b).unwrap_or_else(|| "none".to_owned());
            let verdict = match swing {
                0 => "level".to_owned(),
                s if s > 0 => format!("+{s} to A"),
                s => format!("+{} to B", -s),
            };
            format!("Captains {name_a} ({points_a}) vs {name_b} ({points_b}): {verdict}")
        }
    };

    CaptainSwing {
        captain_a: label(captain_a),
        captain_b: label(captain_b),
        points_a,
        points_b,
        swing,
        description,
    }
}

fn narrate(
    a: &LiveScoreView,
    b: &LiveScoreView,
    differential_points_a: i32,
    differential_points_b: i32,
    captain: &CaptainSwing,
) -> Vec<String> {
    let mut lines = Vec::new();
    let lead = a.net_points - b.net_points;
    lines.push(match lead {
        0 => format!("Level on {} points", a.net_points),
        d if d > 0 => format!(
            "Entry {} leads entry {} by {} ({} to {})",
            a.entry_id, b.entry_id, d, a.net_points, b.net_points
        ),
        d => format!(
            "Entry {} leads entry {} by {} ({} to {})",
            b.entry_id, a.entry_id, -d, b.net_points, a.net_points
        ),
    });

    let gap = differential_points_a - differential_points_b;
    if gap.abs() > DIFFERENTIAL_NARRATIVE_THRESHOLD {
        let (winner, points, other) = if gap > 0 {
            (a.entry_id, differential_points_a, differential_points_b)
        } else {
            (b.entry_id, differential_points_b, differential_points_a)
        };
        lines.push(format!(
            "Differentials are deciding it: entry {winner}'s unique picks have {points} points against {other}"
        ));
    }

    if captain.swing != 0 {
        lines.push(captain.description.clone());
    }
    lines
}

#[derive(Clone)]
pub struct ComparisonEngine {
    scoring: LiveScoringEngine,
}

impl ComparisonEngine {
    pub fn new(scoring: LiveScoringEngine) -> Self {
        Self { scoring }
    }

    pub async fn compare_entrants(
        &self,
        entry_a: EntryId,
        entry_b: EntryId,
        round: RoundId,
    ) -> Result<ComparisonResult, FplError> {
        let (view_a, view_b) = tokio::try_join!(
            self.scoring.live_score_view(entry_a, round),
            self.scoring.live_score_view(entry_b, round),
        )?;
        let result = compare_views(&view_a, &view_b);
        debug!(
            entry_a,
            entry_b,
            round,
            shared = result.shared.len(),
            swing = result.captain_swing.swing,
            "compared entrants"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LiveStats;
    use crate::scoring::LiveStat;

    fn scored(element_id: ElementId, points: i32, captain: bool) -> ScoredPick {
        let multiplier = if captain { 2 } else { 1 };
        ScoredPick {
            element_id,
            web_name: format!("P{element_id}"),
            team_id: 1,
            team: "ARS".into(),
            position: "MID".into(),
            slot: 1,
            multiplier,
            is_captain: captain,
            is_vice_captain: false,
            live: LiveStat::Recorded(LiveStats {
                total_points: points,
                ..Default::default()
            }),
            fixtures: Vec::new(),
            points: points * multiplier,
            fielded: true,
        }
    }

    fn view(entry_id: EntryId, picks: Vec<ScoredPick>) -> LiveScoreView {
        let total: i32 = picks.iter().filter(|p| p.fielded).map(|p| p.points).sum();
        LiveScoreView {
            entry_id,
            round: 3,
            active_chip: None,
            picks,
            total_points: total,
            bench_points: 0,
            transfer_cost: 0,
            net_points: total,
        }
    }

    #[test]
    fn splits_shared_and_differential_sets() {
        let a = view(1, vec![scored(1, 6, true), scored(2, 2, false), scored(3, 5, false)]);
        let mut bench = scored(9, 15, false);
        bench.fielded = false;
        let b = view(
            2,
            vec![scored(2, 2, true), scored(3, 5, false), scored(4, 1, false), bench],
        );

        let result = compare_views(&a, &b);

        let shared: Vec<ElementId> = result.shared.iter().map(|p| p.element_id).collect();
        assert_eq!(shared, vec![2, 3]);
        assert_eq!(result.differentials_a.len(), 1);
        assert_eq!(result.differentials_a[0].element_id, 1);
        assert_eq!(result.differentials_b.len(), 1);
        assert_eq!(result.differentials_b[0].element_id, 4);
        // captain multiplier only counts on the side that owns the captaincy
        assert_eq!(result.differential_points_a, 12);
        assert_eq!(result.differential_points_b, 1);
        assert_eq!(result.shared[0].points_a, 2);
        assert_eq!(result.shared[0].points_b, 4);
    }

    #[test]
    fn captain_swing_is_positive_for_side_a() {
        let a = view(1, vec![scored(1, 10, true)]);
        let b = view(2, vec![scored(2, 3, true)]);
        let swing = compare_views(&a, &b).captain_swing;
        assert_eq!(swing.points_a, 20);
        assert_eq!(swing.points_b, 6);
        assert_eq!(swing.swing, 14);
        assert_eq!(swing.description, "Captains P1 (20) vs P2 (6): +14 to A");

        let reversed = compare_views(&b, &a).captain_swing;
        assert_eq!(reversed.swing, -14);
        assert!(reversed.description.ends_with("+14 to B"));
    }

    #[test]
    fn same_captain_has_no_swing() {
        let a = view(1, vec![scored(5, 4, true), scored(6, 1, false)]);
        let b = view(2, vec![scored(5, 4, true)]);
        let result = compare_views(&a, &b);
        assert_eq!(result.captain_swing.swing, 0);
        assert_eq!(result.captain_swing.description, "Both captained P5 (8 pts), no swing");
        assert_eq!(result.summary, vec!["Entry 1 leads entry 2 by 1 (9 to 8)".to_owned()]);
    }

    #[test]
    fn differential_line_only_above_threshold() {
        let a = view(1, vec![scored(1, 11, false), scored(7, 0, true)]);
        let b = view(2, vec![scored(7, 0, true)]);
        let over = compare_views(&a, &b);
        assert_eq!(over.differential_points_a - over.differential_points_b, 11);
        assert_eq!(over.summary.len(), 2);
        assert!(over.summary[1].starts_with("Differentials are deciding it: entry 1's"));

        let a = view(1, vec![scored(1, 10, false), scored(7, 0, true)]);
        let exact = compare_views(&a, &b);
        assert_eq!(exact.summary.len(), 1);
    }
}
