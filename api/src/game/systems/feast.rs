//! Feast event: one-shot chest reset at the center

use crate::game::constants::hazards;
use crate::game::state::{Millis, World};

/// Feast time for a round starting at `started_at`
pub fn scheduled_at(world: &World, started_at: Millis) -> Millis {
    let duration = world.config.match_duration_ms() as f32;
    started_at + (duration * world.config.feast_fraction) as Millis
}

pub fn update(world: &mut World) {
    if !world.config.feast_enabled || world.match_state.feast_triggered {
        return;
    }
    let now = world.now();
    let feast_at = world.match_state.feast_at;

    if !world.match_state.feast_announced && now + hazards::FEAST_ANNOUNCE_LEAD_MS >= feast_at {
        world.match_state.feast_announced = true;
        let secs = feast_at.saturating_sub(now).div_ceil(1000);
        world
            .events
            .system(now, format!("The feast begins in {secs} seconds"));
    }

    if now >= feast_at {
        trigger(world);
    }
}

/// Reset the nearest chests to the center, ignoring their refill timers
pub fn trigger(world: &mut World) {
    let now = world.now();
    world.match_state.feast_announced = true;
    world.match_state.feast_triggered = true;

    let mut order: Vec<usize> = (0..world.chests.len()).collect();
    order.sort_by(|&a, &b| {
        world.chests[a]
            .position
            .length_sq()
            .total_cmp(&world.chests[b].position.length_sq())
            .then_with(|| a.cmp(&b))
    });

    let count = world.config.feast_chest_count as usize;
    for &i in order.iter().take(count) {
        let chest = &mut world.chests[i];
        chest.opened_at = 0;
        chest.next_refill_at = 0;
    }

    world.events.system(now, "The feast has begun at the center");
    tracing::info!(chests = count.min(world.chests.len()), "Feast triggered");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::state::MatchPhase;

    fn create_test_world() -> World {
        let config = GameConfig {
            feast_chest_count: 4,
            match_duration_secs: 200,
            feast_fraction: 0.5,
            ..GameConfig::default()
        };
        let mut world = World::with_seed(config, 8);
        world.match_state.phase = MatchPhase::Running;
        world.match_state.started_at = world.clock;
        world.match_state.feast_at = scheduled_at(&world, world.clock);
        world
    }

    fn close_all_chests(world: &mut World) {
        let now = world.clock;
        for chest in &mut world.chests {
            chest.opened_at = now;
            chest.next_refill_at = now + 60_000;
        }
    }

    #[test]
    fn test_feast_overrides_pending_cooldowns() {
        let mut world = create_test_world();
        close_all_chests(&mut world);

        world.clock = world.match_state.feast_at;
        update(&mut world);
        assert!(world.match_state.feast_triggered);

        let mut by_distance: Vec<_> = world.chests.iter().collect();
        by_distance.sort_by(|a, b| a.position.length().total_cmp(&b.position.length()));
        for (i, chest) in by_distance.iter().enumerate() {
            if i < 4 {
                assert!(chest.is_lootable(world.clock), "nearest chest {i} reset");
            } else {
                assert!(!chest.is_lootable(world.clock), "far chest {i} untouched");
            }
        }
    }

    #[test]
    fn test_announced_before_trigger() {
        let mut world = create_test_world();
        world.clock = world.match_state.feast_at - hazards::FEAST_ANNOUNCE_LEAD_MS;
        update(&mut world);
        assert!(world.match_state.feast_announced);
        assert!(!world.match_state.feast_triggered);
    }

    #[test]
    fn test_fires_once() {
        let mut world = create_test_world();
        world.clock = world.match_state.feast_at;
        update(&mut world);
        close_all_chests(&mut world);
        world.clock += 1000;
        update(&mut world);
        assert!(world.chests.iter().all(|c| !c.is_lootable(world.clock)));
    }

    #[test]
    fn test_scheduled_at_fraction() {
        let world = create_test_world();
        assert_eq!(scheduled_at(&world, 1000), 101_000);
    }
}
