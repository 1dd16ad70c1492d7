//! Match controller
//!
//! lobby -> countdown -> running -> ended -> lobby. Countdown falls back to
//! lobby when players leave; everything else only moves forward.

use std::f32::consts::TAU;

use rand::Rng;
use uuid::Uuid;

use crate::game::constants::{arena, matches, player};
use crate::game::map;
use crate::game::match_result::{self, MatchOutcome};
use crate::game::state::{EventKind, MatchPhase, MatchState, Player, PlayerId, World};
use crate::game::systems::{feast, loot, movement, relics, shrines, storm};
use crate::util::vec2::Vec2;

/// Outcome of a human join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinResult {
    pub id: PlayerId,
    /// Stale player with the same name that was replaced
    pub replaced: Option<PlayerId>,
}

/// Add a human. A previous human with the same name is replaced.
pub fn join_human(world: &mut World, name: String, device: String) -> JoinResult {
    let now = world.now();
    let replaced = world
        .players
        .values()
        .find(|p| !p.is_bot && p.name == name)
        .map(|p| p.id);
    if let Some(old) = replaced {
        world.remove_player(old, "replaced by a new session");
    }

    let id = Uuid::new_v4();
    let mut p = Player::new(id, name.clone(), device.clone(), now);
    place_newcomer(world, &mut p);
    let detail = if p.spectator { "joined as spectator" } else { "joined" };
    world.add_player(p);
    world.events.push(now, EventKind::Join, name, device, detail);
    tracing::info!(%id, "Player joined");

    JoinResult { id, replaced }
}

/// Mid-round arrivals spectate; otherwise drop them at a free lobby spot
pub fn place_newcomer(world: &mut World, p: &mut Player) {
    match world.match_state.phase {
        MatchPhase::Running | MatchPhase::Ended => {
            p.make_spectator();
            p.position = Vec2::ZERO;
        }
        MatchPhase::Lobby | MatchPhase::Countdown => {
            let position = lobby_spot(world);
            p.respawn(position, world.now(), 0);
        }
    }
}

fn lobby_spot(world: &mut World) -> Vec2 {
    let spawns = map::spawn_points();
    let base = spawns[world.rng.gen_range(0..spawns.len())];
    world.map.find_free_spot(base.x, base.y, player::RADIUS)
}

/// Drop humans that stopped sending input. Returns the removed ids.
pub fn prune_idle(world: &mut World) -> Vec<PlayerId> {
    let now = world.now();
    let timeout = world.config.idle_timeout_ms();
    let mut stale: Vec<PlayerId> = world
        .players
        .values()
        .filter(|p| !p.is_bot && now.saturating_sub(p.last_input_at) > timeout)
        .map(|p| p.id)
        .collect();
    stale.sort();
    for id in &stale {
        world.remove_player(*id, "timed out");
    }
    if !stale.is_empty() {
        tracing::info!(count = stale.len(), "Pruned idle players");
    }
    stale
}

/// Phase transitions driven by time and head count
pub fn update(world: &mut World) {
    let now = world.now();
    let present = world.players.len();
    let min_players = world.config.min_players as usize;

    match world.match_state.phase {
        MatchPhase::Lobby => {
            if present >= min_players {
                world.match_state.phase = MatchPhase::Countdown;
                world.match_state.phase_started_at = now;
                world.match_state.countdown_ends_at = now + world.config.countdown_ms();
                world
                    .events
                    .system(now, format!("Match starting in {} seconds", world.config.countdown_secs));
                tracing::info!(players = present, "Countdown started");
            }
        }
        MatchPhase::Countdown => {
            if present < min_players {
                world.match_state.phase = MatchPhase::Lobby;
                world.match_state.phase_started_at = now;
                world.match_state.countdown_ends_at = 0;
                world.events.system(now, "Countdown cancelled, waiting for players");
                tracing::info!(players = present, "Countdown cancelled");
            } else if now >= world.match_state.countdown_ends_at {
                start_round(world);
            }
        }
        MatchPhase::Running => {}
        MatchPhase::Ended => {
            if now >= world.match_state.ended_at + matches::END_DISPLAY_MS {
                reset_to_lobby(world);
            }
        }
    }
}

/// Reset loot, hazards and players, and start the clock
pub fn start_round(world: &mut World) {
    let now = world.now();
    let ids = world.sorted_player_ids();
    let count = ids.len();

    world.chests = loot::build_chests();
    relics::clear(world);
    shrines::reset_cooldowns(world);
    storm::schedule_first(world);

    let offset = world.rng.gen_range(0.0..TAU);
    for (i, id) in ids.iter().enumerate() {
        let angle = offset + i as f32 * TAU / count.max(1) as f32;
        let ideal = Vec2::from_angle(angle) * arena::OUTER_RING_RADIUS;
        let position = world.map.find_free_spot(ideal.x, ideal.y, player::RADIUS);
        if let Some(p) = world.get_player_mut(*id) {
            p.respawn(position, now, matches::SPAWN_INVULNERABILITY_MS);
            p.kills = 0;
            p.deaths = 0;
        }
    }

    world.match_state = MatchState {
        phase: MatchPhase::Running,
        phase_started_at: now,
        started_at: now,
        ends_at: now + world.config.match_duration_ms(),
        participants: count as u32,
        border_radius: world.config.border_start_radius,
        feast_at: feast::scheduled_at(world, now),
        ..MatchState::default()
    };

    world.events.system(now, format!("Round started with {count} players"));
    tracing::info!(players = count, "Round started");
}

/// Freeze the round and record the result
pub fn end_match(world: &mut World, outcome: MatchOutcome) {
    let now = world.now();
    let winner_name = outcome
        .winner
        .and_then(|id| world.get_player(id))
        .map(|p| p.name.clone());

    let state = &mut world.match_state;
    state.phase = MatchPhase::Ended;
    state.phase_started_at = now;
    state.ended_at = now;
    state.winner = outcome.winner;
    state.winner_name = winner_name.clone();
    state.reason = Some(outcome.reason);

    relics::clear(world);
    storm::shutdown(world);
    for p in world.players.values_mut() {
        p.move_intent = Vec2::ZERO;
        p.knockback = Vec2::ZERO;
        p.attack_queued = false;
    }

    let detail = match &winner_name {
        Some(name) => format!("{name} wins ({})", outcome.reason.label()),
        None => format!("No winner ({})", outcome.reason.label()),
    };
    world.events.system(now, detail);
    tracing::info!(winner = ?winner_name, reason = outcome.reason.label(), "Match ended");
}

/// End the round if a win condition holds
pub fn finish_if_over(world: &mut World) -> bool {
    if !world.is_running() {
        return false;
    }
    match match_result::check_match_end(world) {
        Some(outcome) => {
            end_match(world, outcome);
            true
        }
        None => false,
    }
}

/// Back to the lobby: clear hazards and loot, bring everyone back to life
pub fn reset_to_lobby(world: &mut World) {
    let now = world.now();
    relics::clear(world);
    storm::shutdown(world);
    world.chests = loot::build_chests();
    world.match_state = MatchState {
        phase: MatchPhase::Lobby,
        phase_started_at: now,
        border_radius: world.config.border_start_radius,
        ..MatchState::default()
    };

    for id in world.sorted_player_ids() {
        let position = lobby_spot(world);
        if let Some(p) = world.get_player_mut(id) {
            p.respawn(position, now, 0);
        }
    }

    world.events.system(now, "Back to the lobby");
    tracing::info!("Reset to lobby");
}

/// Rebuild the arena from the current config, optionally with a new seed.
/// Shrines are re-placed and anyone left inside an obstacle is moved out.
pub fn regenerate_map(world: &mut World, seed: Option<u64>) {
    if let Some(seed) = seed {
        world.config.map_seed = seed;
    }
    world.map = map::generate(&map::MapParams::from_config(&world.config));
    world.bump_map();
    shrines::rebuild(world);
    movement::unstick_all(world);

    let now = world.now();
    let seed = world.config.map_seed;
    world.events.system(now, format!("Arena regenerated (seed {seed})"));
    tracing::info!(seed, props = world.map.props.len(), "Map regenerated");
}
