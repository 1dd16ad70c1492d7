//! Roaming storm hazard
//!
//! Never active and scheduled at the same time: `next_at` is zero while the
//! storm is up, and set again when it ends.

use std::f32::consts::TAU;

use rand::Rng;

use crate::game::constants::{hazards, items, player};
use crate::game::state::{BuffKind, DeathCause, StormState, World};
use crate::game::systems::combat;
use crate::util::vec2::Vec2;

/// Schedule the first activation relative to round start
pub fn schedule_first(world: &mut World) {
    let now = world.now();
    world.storm = StormState {
        next_at: if world.config.storm_enabled {
            now + world.config.storm_first_delay_secs * 1000
        } else {
            0
        },
        ..StormState::default()
    };
    world.bump_storm();
}

/// Stop the storm and clear its schedule (round end)
pub fn shutdown(world: &mut World) {
    world.storm = StormState::default();
    world.bump_storm();
}

pub fn update(world: &mut World, dt: f32) {
    let now = world.now();

    if !world.config.storm_enabled {
        if world.storm.active || world.storm.next_at != 0 {
            shutdown(world);
        }
        return;
    }

    if world.storm.active {
        if now >= world.storm.ends_at {
            deactivate(world);
        } else {
            damage_inside(world, dt);
        }
        return;
    }

    if world.storm.next_at == 0 {
        // Enabled mid-round by an admin
        world.storm.next_at = now + world.config.storm_interval_secs * 1000;
        world.bump_storm();
    } else if now >= world.storm.next_at {
        activate(world);
    }
}

fn activate(world: &mut World) {
    let now = world.now();
    let border = world.match_state.border_radius;
    let radius = (border * hazards::STORM_RADIUS_FRACTION)
        .clamp(hazards::STORM_MIN_RADIUS, hazards::STORM_MAX_RADIUS);

    let angle = world.rng.gen_range(0.0..TAU);
    let distance = world.rng.gen_range(0.0..=1.0f32) * border * hazards::STORM_PLACEMENT_FRACTION;
    let ideal = Vec2::from_angle(angle) * distance;
    let center = world.map.find_free_spot(ideal.x, ideal.y, player::RADIUS);

    world.storm = StormState {
        active: true,
        center,
        radius,
        started_at: now,
        ends_at: now + world.config.storm_duration_secs * 1000,
        next_at: 0,
    };
    world.bump_storm();
    world.events.system(now, "A storm is brewing");
    tracing::debug!(x = center.x, y = center.y, radius, "Storm activated");
}

fn deactivate(world: &mut World) {
    let now = world.now();
    world.storm.active = false;
    world.storm.next_at = now + world.config.storm_interval_secs * 1000;
    world.bump_storm();
}

fn damage_inside(world: &mut World, dt: f32) {
    let now = world.now();
    let dps = world.config.storm_dps;
    if dps <= 0.0 {
        return;
    }
    let (center, radius) = (world.storm.center, world.storm.radius);
    let inside: Vec<_> = world
        .active_players()
        .filter(|p| p.position.distance_sq_to(center) <= radius * radius)
        .map(|p| (p.id, p.buffs.has(BuffKind::Fortify, now)))
        .collect();

    for (id, fortified) in inside {
        let mitigation = if fortified { items::FORTIFY_HAZARD_MITIGATION } else { 1.0 };
        combat::apply_damage(world, id, dps * dt * mitigation, DeathCause::Storm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::state::Player;
    use uuid::Uuid;

    fn create_test_world() -> World {
        let config = GameConfig {
            storm_first_delay_secs: 5,
            storm_interval_secs: 20,
            storm_duration_secs: 10,
            storm_dps: 10.0,
            ..GameConfig::default()
        };
        let mut world = World::with_seed(config, 17);
        world.match_state.border_radius = 1000.0;
        schedule_first(&mut world);
        world
    }

    fn assert_consistent(storm: &StormState) {
        if storm.active {
            assert_eq!(storm.next_at, 0);
            assert!(storm.ends_at > storm.started_at);
        }
    }

    #[test]
    fn test_lifecycle() {
        let mut world = create_test_world();
        let first = world.storm.next_at;
        assert!(!world.storm.active);

        world.clock = first;
        update(&mut world, 0.1);
        assert!(world.storm.active);
        assert_consistent(&world.storm);
        assert_eq!(world.storm.radius, 250.0);
        assert!(world.storm.center.length() <= 1000.0 * hazards::STORM_PLACEMENT_FRACTION + 600.0);

        world.clock = world.storm.ends_at;
        update(&mut world, 0.1);
        assert!(!world.storm.active);
        assert_eq!(world.storm.next_at, world.clock + 20_000);
    }

    #[test]
    fn test_radius_clamped() {
        let mut world = create_test_world();
        world.match_state.border_radius = 100.0;
        world.clock = world.storm.next_at;
        update(&mut world, 0.1);
        assert_eq!(world.storm.radius, hazards::STORM_MIN_RADIUS);
    }

    #[test]
    fn test_damages_players_inside() {
        let mut world = create_test_world();
        world.clock = world.storm.next_at;
        update(&mut world, 0.1);

        let id = Uuid::new_v4();
        let mut p = Player::new(id, "Wet".into(), String::new(), world.clock);
        p.position = world.storm.center;
        world.add_player(p);

        update(&mut world, 1.0);
        let p = world.get_player(id).unwrap();
        assert!((p.health - 90.0).abs() < 0.01);
    }

    #[test]
    fn test_disabling_shuts_down() {
        let mut world = create_test_world();
        world.clock = world.storm.next_at;
        update(&mut world, 0.1);
        world.config.storm_enabled = false;
        update(&mut world, 0.1);
        assert!(!world.storm.active);
        assert_eq!(world.storm.next_at, 0);
    }
}
