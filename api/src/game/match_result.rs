//! Win conditions and standings
//!
//! Decides when a running round is over and ranks players for the
//! leaderboard.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::game::constants::matches;
use crate::game::state::{MatchPhase, Player, PlayerId, WinReason, World};

/// How a round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    pub winner: Option<PlayerId>,
    pub reason: WinReason,
}

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRanking {
    pub id: PlayerId,
    pub name: String,
    pub rank: u32,
    pub kills: u32,
    pub deaths: u32,
    pub alive: bool,
    pub is_bot: bool,
}

/// Survivors first, then kills, then remaining health
fn standing(a: &Player, b: &Player) -> Ordering {
    b.is_active()
        .cmp(&a.is_active())
        .then_with(|| b.kills.cmp(&a.kills))
        .then_with(|| b.health.total_cmp(&a.health))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Every player, best first
pub fn rankings(world: &World) -> Vec<PlayerRanking> {
    let mut players: Vec<&Player> = world.players.values().collect();
    players.sort_by(|a, b| standing(a, b));
    players
        .into_iter()
        .enumerate()
        .map(|(i, p)| PlayerRanking {
            id: p.id,
            name: p.name.clone(),
            rank: i as u32 + 1,
            kills: p.kills,
            deaths: p.deaths,
            alive: p.is_active(),
            is_bot: p.is_bot,
        })
        .collect()
}

/// Top rows for snapshots
pub fn leaderboard(world: &World) -> Vec<PlayerRanking> {
    let mut rows = rankings(world);
    rows.truncate(matches::LEADERBOARD_SIZE);
    rows
}

/// Check if the running round should end
pub fn check_match_end(world: &World) -> Option<MatchOutcome> {
    if world.match_state.phase != MatchPhase::Running {
        return None;
    }

    let mut alive = world.active_players();
    match (alive.next(), alive.next()) {
        (None, _) => {
            return Some(MatchOutcome {
                winner: None,
                reason: WinReason::NoSurvivors,
            })
        }
        (Some(last), None) => {
            return Some(MatchOutcome {
                winner: Some(last.id),
                reason: WinReason::LastAlive,
            })
        }
        _ => {}
    }

    if world.now() >= world.match_state.ends_at {
        let winner = world
            .active_players()
            .min_by(|a, b| {
                b.kills
                    .cmp(&a.kills)
                    .then_with(|| b.health.total_cmp(&a.health))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|p| p.id);
        return Some(MatchOutcome {
            winner,
            reason: WinReason::TimeLimit,
        });
    }

    None
}
