//! Consumables and activated abilities

use serde::{Deserialize, Serialize};

use crate::game::constants::{ai, items, player};
use crate::game::state::{AbilityKind, BuffKind, EventKind, PlayerId, World};

/// Result of a compass use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompassReading {
    pub target_name: String,
    /// Radians from the user toward the target
    pub bearing: f32,
    pub distance: f32,
    /// Charge was not consumed (tracker buff)
    pub free: bool,
}

/// Eat a soup if hurt. Returns the health restored.
pub fn try_soup(world: &mut World, player_id: PlayerId) -> Option<f32> {
    let p = world.get_player_mut(player_id)?;
    if !p.is_active() || p.inventory.soups == 0 || p.health >= player::MAX_HEALTH {
        return None;
    }
    p.inventory.soups -= 1;
    let before = p.health;
    p.health = (p.health + items::SOUP_HEAL).min(player::MAX_HEALTH);
    Some(p.health - before)
}

/// Spend a stealth or speed charge, subject to the shared ability cooldown
pub fn try_ability(world: &mut World, player_id: PlayerId, kind: AbilityKind) -> bool {
    let now = world.now();
    let Some(p) = world.get_player_mut(player_id) else {
        return false;
    };
    if !p.is_active() || now < p.cooldowns.ability_ready_at {
        return false;
    }
    let charges = match kind {
        AbilityKind::Stealth => &mut p.inventory.stealth,
        AbilityKind::Speed => &mut p.inventory.speed,
    };
    if *charges == 0 {
        return false;
    }
    *charges -= 1;
    match kind {
        AbilityKind::Stealth => p.buffs.stealth_until = now + items::STEALTH_DURATION_MS,
        AbilityKind::Speed => p.buffs.speed_until = now + items::SPEED_BOOST_DURATION_MS,
    }
    p.cooldowns.ability_ready_at = now + items::ABILITY_COOLDOWN_MS;

    let label = match kind {
        AbilityKind::Stealth => "used stealth",
        AbilityKind::Speed => "used speed boost",
    };
    let (name, device) = (p.name.clone(), p.device.clone());
    world.events.push(now, EventKind::Ability, name, device, label);
    true
}

/// Bearing to the nearest visible enemy. Consumes a charge unless the tracker
/// buff is active; nothing is consumed when there is no one to point at.
pub fn try_compass(world: &mut World, player_id: PlayerId) -> Option<CompassReading> {
    let now = world.now();
    let (origin, free) = {
        let p = world.get_player(player_id)?;
        if !p.is_active() || now < p.cooldowns.compass_ready_at {
            return None;
        }
        let free = p.buffs.has(BuffKind::Tracker, now);
        if !free && p.inventory.compass == 0 {
            return None;
        }
        (p.position, free)
    };

    let (target_name, target_pos, distance) = world
        .active_players()
        .filter(|t| t.id != player_id)
        .filter_map(|t| {
            let d = t.position.distance_to(origin);
            // Stealth hides you from the compass unless they are right there
            let hidden = t.buffs.is_stealthed(now) && d > ai::STEALTH_SIGHT_RADIUS;
            (!hidden).then(|| (t.name.clone(), t.position, d))
        })
        .min_by(|a, b| a.2.total_cmp(&b.2))?;

    let p = world.get_player_mut(player_id)?;
    if !free {
        p.inventory.compass -= 1;
    }
    p.cooldowns.compass_ready_at = now + items::COMPASS_COOLDOWN_MS;

    Some(CompassReading {
        target_name,
        bearing: origin.bearing_to(target_pos),
        distance,
        free,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::state::{MatchPhase, Player};
    use crate::util::vec2::Vec2;
    use uuid::Uuid;

    fn create_test_world() -> World {
        let mut world = World::with_seed(GameConfig::default(), 4);
        world.match_state.phase = MatchPhase::Running;
        world.clock = 50_000;
        world
    }

    fn add_player(world: &mut World, name: &str, position: Vec2) -> PlayerId {
        let id = Uuid::new_v4();
        let mut p = Player::new(id, name.into(), String::new(), world.clock);
        p.position = position;
        world.add_player(p);
        id
    }

    #[test]
    fn test_soup_heals_and_consumes() {
        let mut world = create_test_world();
        let a = add_player(&mut world, "A", Vec2::ZERO);
        assert!(try_soup(&mut world, a).is_none(), "full health wastes nothing");

        world.get_player_mut(a).unwrap().health = 80.0;
        assert_eq!(try_soup(&mut world, a), Some(20.0));
        let p = world.get_player(a).unwrap();
        assert_eq!(p.health, player::MAX_HEALTH);
        assert_eq!(p.inventory.soups, items::STARTING_SOUPS - 1);
    }

    #[test]
    fn test_ability_needs_charge_and_cooldown() {
        let mut world = create_test_world();
        let a = add_player(&mut world, "A", Vec2::ZERO);
        assert!(!try_ability(&mut world, a, AbilityKind::Stealth));

        world.get_player_mut(a).unwrap().inventory.stealth = 2;
        assert!(try_ability(&mut world, a, AbilityKind::Stealth));
        assert!(world.get_player(a).unwrap().buffs.is_stealthed(world.clock));
        // Shared cooldown
        world.get_player_mut(a).unwrap().inventory.speed = 1;
        assert!(!try_ability(&mut world, a, AbilityKind::Speed));

        world.clock += items::ABILITY_COOLDOWN_MS;
        assert!(try_ability(&mut world, a, AbilityKind::Speed));
        assert_eq!(world.get_player(a).unwrap().inventory.stealth, 1);
    }

    #[test]
    fn test_compass_points_at_nearest() {
        let mut world = create_test_world();
        let a = add_player(&mut world, "A", Vec2::ZERO);
        add_player(&mut world, "North", Vec2::new(0.0, 500.0));
        add_player(&mut world, "Far", Vec2::new(-1500.0, 0.0));

        let reading = try_compass(&mut world, a).unwrap();
        assert_eq!(reading.target_name, "North");
        assert!((reading.bearing - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
        assert!(!reading.free);
        assert_eq!(world.get_player(a).unwrap().inventory.compass, items::STARTING_COMPASS - 1);

        // Out of charges
        world.clock += items::COMPASS_COOLDOWN_MS;
        assert!(try_compass(&mut world, a).is_none());
    }

    #[test]
    fn test_tracker_makes_compass_free() {
        let mut world = create_test_world();
        let a = add_player(&mut world, "A", Vec2::ZERO);
        add_player(&mut world, "B", Vec2::new(300.0, 0.0));
        let until = world.clock + 10_000;
        {
            let p = world.get_player_mut(a).unwrap();
            p.inventory.compass = 0;
            p.buffs.extend(BuffKind::Tracker, until);
        }
        let reading = try_compass(&mut world, a).unwrap();
        assert!(reading.free);
        assert_eq!(world.get_player(a).unwrap().inventory.compass, 0);
    }

    #[test]
    fn test_compass_without_targets_keeps_charge() {
        let mut world = create_test_world();
        let a = add_player(&mut world, "A", Vec2::ZERO);
        assert!(try_compass(&mut world, a).is_none());
        assert_eq!(world.get_player(a).unwrap().inventory.compass, items::STARTING_COMPASS);
    }
}
