//! Shrinking border
//!
//! The radius is a pure function of time since round start, so it can be
//! recomputed every tick without drift.

use crate::config::GameConfig;
use crate::game::constants::items;
use crate::game::state::{BuffKind, DeathCause, Millis, World};
use crate::game::systems::combat;

/// Border radius `elapsed_ms` after round start.
///
/// Pinned at the start radius until the delay passes, interpolates linearly
/// over the shrink window, then stays pinned at the end radius.
pub fn border_radius(config: &GameConfig, elapsed_ms: Millis) -> f32 {
    let delay = config.border_delay_secs * 1000;
    let window = config.border_shrink_secs * 1000;
    if elapsed_ms <= delay {
        return config.border_start_radius;
    }
    if window == 0 || elapsed_ms >= delay + window {
        return config.border_end_radius;
    }
    let t = (elapsed_ms - delay) as f32 / window as f32;
    config.border_start_radius + (config.border_end_radius - config.border_start_radius) * t
}

/// Recompute the radius and damage everyone outside it
pub fn update(world: &mut World, dt: f32) {
    let now = world.now();
    let elapsed = now.saturating_sub(world.match_state.started_at);
    let radius = border_radius(&world.config, elapsed);
    world.match_state.border_radius = radius;

    let dps = world.config.border_dps;
    if dps <= 0.0 {
        return;
    }

    let outside: Vec<_> = world
        .active_players()
        .filter(|p| p.position.length() > radius)
        .map(|p| (p.id, p.buffs.has(BuffKind::Fortify, now)))
        .collect();

    for (id, fortified) in outside {
        let mitigation = if fortified { items::FORTIFY_HAZARD_MITIGATION } else { 1.0 };
        combat::apply_damage(world, id, dps * dt * mitigation, DeathCause::Border);
    }
}
