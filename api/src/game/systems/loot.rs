//! Chest looting
//!
//! Chests sit at fixed points and refill on a timer. Each open rolls a tier,
//! then rolls every loot category independently against that tier's odds.

use rand::Rng;

use crate::config::GameConfig;
use crate::game::constants::{hazards, player};
use crate::game::map;
use crate::game::state::{BuffKind, Chest, ChestId, EventKind, Millis, PlayerId, RelicId, World};
use crate::game::systems::relics;
use crate::util::vec2::Vec2;

/// Everything a single chest open grants
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChestLoot {
    pub heal: f32,
    pub weapon_up: bool,
    pub armor_up: bool,
    pub soups: u8,
    pub compass: u8,
    pub stealth: u8,
    pub speed: u8,
    /// Drop a relic on the chest
    pub relic: bool,
}

impl ChestLoot {
    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.heal > 0.0 {
            parts.push(format!("+{:.0} hp", self.heal));
        }
        if self.weapon_up {
            parts.push("weapon".to_string());
        }
        if self.armor_up {
            parts.push("armor".to_string());
        }
        if self.soups > 0 {
            parts.push(format!("{} soup", self.soups));
        }
        if self.compass > 0 {
            parts.push("compass".to_string());
        }
        if self.stealth > 0 {
            parts.push("stealth".to_string());
        }
        if self.speed > 0 {
            parts.push("speed".to_string());
        }
        if self.relic {
            parts.push("relic".to_string());
        }
        if parts.is_empty() {
            "nothing".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Result of an open attempt
#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    /// A relic in range was grabbed instead of a chest
    Relic { id: RelicId, kind: BuffKind, tier: u8 },
    Chest { id: ChestId, tier: u8, loot: ChestLoot },
    Nothing,
}

/// Fresh chests at the fixed layout
pub fn build_chests() -> Vec<Chest> {
    map::chest_points()
        .into_iter()
        .enumerate()
        .map(|(i, position)| Chest::new(i as ChestId, position))
        .collect()
}

/// Tier 1-3, biased upward near the center and floored by the feast
pub fn roll_tier<R: Rng>(config: &GameConfig, distance_to_center: f32, feast_floor: Option<u8>, rng: &mut R) -> u8 {
    let bonus = if config.center_bias_radius > 0.0 && distance_to_center < config.center_bias_radius {
        config.center_tier_bonus * (1.0 - distance_to_center / config.center_bias_radius)
    } else {
        0.0
    };
    let p3 = (config.tier3_chance + bonus).clamp(0.0, 1.0);
    let p2 = (config.tier2_chance + bonus).clamp(0.0, 1.0);

    let roll: f32 = rng.gen();
    let tier = if roll < p3 {
        3
    } else if roll < p3 + p2 {
        2
    } else {
        1
    };
    match feast_floor {
        Some(floor) => tier.max(floor.clamp(1, 3)),
        None => tier,
    }
}

/// Roll each loot category independently for a chest of `tier`
pub fn roll_chest_loot<R: Rng>(tier: u8, config: &GameConfig, rng: &mut R) -> ChestLoot {
    let i = (tier.clamp(1, 3) - 1) as usize;
    let mut chance = |p: f32| rng.gen::<f32>() < p;

    let mut loot = ChestLoot::default();
    if chance(config.heal_chance[i]) {
        loot.heal = config.heal_amount[i];
    }
    loot.weapon_up = chance(config.weapon_chance[i]);
    loot.armor_up = chance(config.armor_chance[i]);
    if chance(config.soup_chance[i]) {
        loot.soups = if tier >= 3 { 2 } else { 1 };
    }
    loot.compass = chance(config.consumable_chance[i]) as u8;
    loot.stealth = chance(config.consumable_chance[i]) as u8;
    loot.speed = chance(config.consumable_chance[i]) as u8;
    loot.relic = chance(config.relic_drop_chance[i]);
    loot
}

/// Open the nearest lootable chest in range, or grab a relic if one is closer at hand
pub fn try_open(world: &mut World, player_id: PlayerId) -> OpenOutcome {
    let now = world.now();
    let range = world.config.chest_open_range;
    let Some(position) = world
        .get_player(player_id)
        .filter(|p| p.is_active())
        .map(|p| p.position)
    else {
        return OpenOutcome::Nothing;
    };

    // A relic within range takes priority
    if let Some(relic_id) = relics::nearest_in_range(world, position, range, None) {
        if let Some((kind, tier)) = relics::claim(world, player_id, relic_id) {
            return OpenOutcome::Relic { id: relic_id, kind, tier };
        }
    }

    let Some(chest_index) = nearest_lootable(&world.chests, position, range, now) else {
        return OpenOutcome::Nothing;
    };

    let chest_position = world.chests[chest_index].position;
    let distance = chest_position.length();
    let feast_floor = (world.match_state.feast_triggered && distance <= hazards::FEAST_RADIUS)
        .then_some(world.config.feast_min_tier as u8);
    let tier = roll_tier(&world.config, distance, feast_floor, &mut world.rng);
    let loot = roll_chest_loot(tier, &world.config, &mut world.rng);

    let refill_ms = world.config.chest_refill_secs * 1000;
    let chest = &mut world.chests[chest_index];
    chest.opened_at = now;
    chest.next_refill_at = now + refill_ms;
    chest.last_tier = tier;
    let chest_id = chest.id;

    apply_loot(world, player_id, &loot);

    if loot.relic {
        let kind = BuffKind::ALL[world.rng.gen_range(0..BuffKind::ALL.len())];
        relics::spawn(world, kind, tier, chest_position);
    }

    if let Some(p) = world.get_player(player_id) {
        let (name, device) = (p.name.clone(), p.device.clone());
        world.events.push(
            now,
            EventKind::Loot,
            name,
            device,
            format!("tier {tier} chest: {}", loot.describe()),
        );
    }

    OpenOutcome::Chest {
        id: chest_id,
        tier,
        loot,
    }
}

fn nearest_lootable(chests: &[Chest], position: Vec2, range: f32, now: Millis) -> Option<usize> {
    chests
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_lootable(now))
        .map(|(i, c)| (i, c.position.distance_sq_to(position)))
        .filter(|(_, d)| *d <= range * range)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

fn apply_loot(world: &mut World, player_id: PlayerId, loot: &ChestLoot) {
    let max_weapon = world.config.max_weapon_tier as u8;
    let max_armor = world.config.max_armor_tier as u8;
    let Some(p) = world.get_player_mut(player_id) else {
        return;
    };
    p.health = (p.health + loot.heal).min(player::MAX_HEALTH);
    if loot.weapon_up {
        p.weapon_tier = (p.weapon_tier + 1).min(max_weapon);
    }
    if loot.armor_up {
        p.armor_tier = (p.armor_tier + 1).min(max_armor);
    }
    p.inventory.soups = p.inventory.soups.saturating_add(loot.soups);
    p.inventory.compass = p.inventory.compass.saturating_add(loot.compass);
    p.inventory.stealth = p.inventory.stealth.saturating_add(loot.stealth);
    p.inventory.speed = p.inventory.speed.saturating_add(loot.speed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{MatchPhase, Player};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uuid::Uuid;

    fn quiet_config() -> GameConfig {
        GameConfig {
            relic_max: 0,
            relic_drop_chance: [0.0, 0.0, 0.0],
            chest_refill_secs: 30,
            ..GameConfig::default()
        }
    }

    fn create_test_world() -> (World, PlayerId, usize) {
        let mut world = World::with_seed(quiet_config(), 11);
        world.match_state.phase = MatchPhase::Running;
        let chest_index = 0;
        let id = Uuid::new_v4();
        let mut p = Player::new(id, "Looter".into(), String::new(), world.clock);
        p.position = world.chests[chest_index].position + Vec2::new(20.0, 0.0);
        world.add_player(p);
        (world, id, chest_index)
    }

    #[test]
    fn test_weapon_roll_independent_at_tier3() {
        let config = GameConfig {
            weapon_chance: [0.2, 0.45, 0.9],
            ..GameConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(2024);
        let hits = (0..1000)
            .filter(|_| roll_chest_loot(3, &config, &mut rng).weapon_up)
            .count();
        let rate = hits as f32 / 1000.0;
        assert!((0.85..=0.95).contains(&rate), "weapon rate {rate}");
    }

    #[test]
    fn test_categories_can_stack() {
        let config = GameConfig {
            heal_chance: [1.0; 3],
            weapon_chance: [1.0; 3],
            armor_chance: [1.0; 3],
            ..GameConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let loot = roll_chest_loot(2, &config, &mut rng);
        assert!(loot.heal > 0.0 && loot.weapon_up && loot.armor_up);
    }

    #[test]
    fn test_roll_tier_center_bias_and_floor() {
        let config = GameConfig {
            tier2_chance: 0.0,
            tier3_chance: 0.0,
            center_tier_bonus: 0.0,
            ..GameConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(roll_tier(&config, 0.0, None, &mut rng), 1);
        assert_eq!(roll_tier(&config, 0.0, Some(2), &mut rng), 2);

        let biased = GameConfig {
            tier2_chance: 0.0,
            tier3_chance: 0.0,
            center_tier_bonus: 0.5,
            center_bias_radius: 600.0,
            ..GameConfig::default()
        };
        let high = (0..400)
            .filter(|_| roll_tier(&biased, 0.0, None, &mut rng) > 1)
            .count();
        let far = (0..400)
            .filter(|_| roll_tier(&biased, 1500.0, None, &mut rng) > 1)
            .count();
        assert!(high > 300);
        assert_eq!(far, 0);
    }

    #[test]
    fn test_chest_refill_gating() {
        let (mut world, id, chest_index) = create_test_world();

        assert!(matches!(try_open(&mut world, id), OpenOutcome::Chest { .. }));
        assert!(!world.chests[chest_index].is_lootable(world.clock));

        // Still cooling down
        world.clock += 29_000;
        assert_eq!(try_open(&mut world, id), OpenOutcome::Nothing);

        world.clock += 1_000;
        assert!(matches!(try_open(&mut world, id), OpenOutcome::Chest { .. }));
    }

    #[test]
    fn test_out_of_range_opens_nothing() {
        let (mut world, id, chest_index) = create_test_world();
        let far = world.chests[chest_index].position + Vec2::new(500.0, 0.0);
        if let Some(p) = world.get_player_mut(id) {
            p.position = far;
        }
        assert_eq!(try_open(&mut world, id), OpenOutcome::Nothing);
    }

    #[test]
    fn test_relic_in_range_takes_priority() {
        let (mut world, id, chest_index) = create_test_world();
        let at = world.chests[chest_index].position;
        relics::spawn(&mut world, BuffKind::Swift, 1, at);
        let outcome = try_open(&mut world, id);
        assert!(matches!(outcome, OpenOutcome::Relic { kind: BuffKind::Swift, .. }));
        // Chest untouched
        assert!(world.chests[chest_index].is_lootable(world.clock));
        assert!(world.relics.is_empty());
    }

    #[test]
    fn test_spectator_cannot_loot() {
        let (mut world, id, _) = create_test_world();
        if let Some(p) = world.get_player_mut(id) {
            p.make_spectator();
        }
        assert_eq!(try_open(&mut world, id), OpenOutcome::Nothing);
    }
}
