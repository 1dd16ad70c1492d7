//! Shrine placement and capture

use std::f32::consts::TAU;

use crate::game::constants::{arena, items, player};
use crate::game::state::{BuffKind, EventKind, PlayerId, Shrine, ShrineId, World};
use crate::game::systems::relics;
use crate::util::rng::Lcg;
use crate::util::vec2::Vec2;

/// Salt so the shrine ring offset differs from the prop stream of the same seed
const SHRINE_SEED_SALT: u64 = 0x5348_5249_4e45;

/// Recompute shrine positions from the current map and config
pub fn rebuild(world: &mut World) {
    world.shrines.clear();
    world.bump_shrines();
    if !world.config.shrines_enabled || world.config.shrine_count == 0 {
        return;
    }

    let count = world.config.shrine_count as usize;
    let offset = Lcg::new(world.map.seed ^ SHRINE_SEED_SALT).range(0.0, TAU);
    for i in 0..count {
        let angle = offset + i as f32 * TAU / count as f32;
        let ideal = Vec2::from_angle(angle) * arena::SHRINE_RING_RADIUS;
        let position = world.map.find_free_spot(ideal.x, ideal.y, player::RADIUS);
        world.shrines.push(Shrine {
            id: i as ShrineId,
            kind: BuffKind::ALL[i % BuffKind::ALL.len()],
            position,
            radius: world.config.shrine_radius,
            next_ready_at: 0,
            activations: 0,
        });
    }
}

/// Make every shrine ready again (round start)
pub fn reset_cooldowns(world: &mut World) {
    for shrine in &mut world.shrines {
        shrine.next_ready_at = 0;
        shrine.activations = 0;
    }
    world.bump_shrines();
}

/// Capture ready shrines. The nearest active player inside the radius wins
/// the capture; the cooldown then blocks everyone until it expires.
pub fn update(world: &mut World) {
    let now = world.now();
    let cooldown = world.config.shrine_cooldown_secs * 1000;

    for index in 0..world.shrines.len() {
        let shrine = &world.shrines[index];
        if !shrine.is_ready(now) {
            continue;
        }
        let Some(captor) = nearest_captor(world, shrine.position, shrine.radius) else {
            continue;
        };

        let kind = shrine.kind;
        let shrine = &mut world.shrines[index];
        shrine.next_ready_at = now + cooldown;
        shrine.activations += 1;
        world.bump_shrines();

        let config = world.config.clone();
        if let Some(p) = world.get_player_mut(captor) {
            relics::apply_buff(p, kind, items::SHRINE_TIER, now, &config);
            let (name, device) = (p.name.clone(), p.device.clone());
            world
                .events
                .push(now, EventKind::Loot, name, device, format!("captured the {} shrine", kind.label()));
        }
    }
}

fn nearest_captor(world: &World, position: Vec2, radius: f32) -> Option<PlayerId> {
    world
        .active_players()
        .map(|p| (p.id, p.position.distance_sq_to(position)))
        .filter(|(_, d)| *d <= radius * radius)
        // Break exact ties by id so captures do not depend on hash order
        .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
        .map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::state::Player;
    use uuid::Uuid;

    fn create_test_world() -> World {
        World::with_seed(GameConfig::default(), 21)
    }

    #[test]
    fn test_rebuild_places_shrines_on_ring() {
        let world = create_test_world();
        assert_eq!(world.shrines.len(), 3);
        for shrine in &world.shrines {
            assert!(!world.map.is_blocked(shrine.position.x, shrine.position.y, player::RADIUS));
            let r = shrine.position.length();
            assert!((r - arena::SHRINE_RING_RADIUS).abs() < 600.0);
        }
    }

    #[test]
    fn test_rebuild_is_stable_for_a_seed() {
        let mut a = create_test_world();
        let before: Vec<Vec2> = a.shrines.iter().map(|s| s.position).collect();
        rebuild(&mut a);
        let after: Vec<Vec2> = a.shrines.iter().map(|s| s.position).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_disabled_shrines_are_removed() {
        let mut world = create_test_world();
        world.config.shrines_enabled = false;
        rebuild(&mut world);
        assert!(world.shrines.is_empty());
    }

    #[test]
    fn test_one_capture_per_window() {
        let mut world = create_test_world();
        let at = world.shrines[0].position;
        let kind = world.shrines[0].kind;
        let mut ids = Vec::new();
        for name in ["A", "B"] {
            let id = Uuid::new_v4();
            let mut p = Player::new(id, name.into(), String::new(), world.clock);
            p.position = at;
            world.add_player(p);
            ids.push(id);
        }

        update(&mut world);
        assert_eq!(world.shrines[0].activations, 1);
        let buffed = ids
            .iter()
            .filter(|id| world.get_player(**id).unwrap().buffs.has(kind, world.clock))
            .count();
        assert_eq!(buffed, 1);

        // Still cooling down
        world.clock += 1000;
        update(&mut world);
        assert_eq!(world.shrines[0].activations, 1);

        world.clock += world.config.shrine_cooldown_secs * 1000;
        update(&mut world);
        assert_eq!(world.shrines[0].activations, 2);
    }
}
