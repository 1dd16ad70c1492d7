//! Relic spawning, expiry and pickup

use std::f32::consts::TAU;

use hashbrown::HashSet;
use rand::Rng;

use crate::config::GameConfig;
use crate::game::constants::{items, player};
use crate::game::state::{BuffKind, EventKind, Millis, Player, PlayerId, Relic, RelicId, World};
use crate::util::vec2::Vec2;

/// Buff duration for a relic of `tier`: base, plus half again per tier above 1
pub fn buff_duration(tier: u8) -> Millis {
    let tier = tier.clamp(1, 3) as f32;
    (items::RELIC_BASE_DURATION_MS as f32 * (1.0 + 0.5 * (tier - 1.0))) as Millis
}

/// Apply a buff. Expiry is max-with-existing; fury and fortify also raise gear.
pub fn apply_buff(player: &mut Player, kind: BuffKind, tier: u8, now: Millis, config: &GameConfig) {
    player.buffs.extend(kind, now + buff_duration(tier));
    match kind {
        BuffKind::Fury => {
            player.weapon_tier = (player.weapon_tier + 1).min(config.max_weapon_tier as u8);
        }
        BuffKind::Fortify => {
            player.armor_tier = (player.armor_tier + 1).min(config.max_armor_tier as u8);
        }
        BuffKind::Swift | BuffKind::Tracker | BuffKind::Regen => {}
    }
}

/// Place a relic at `position`, ignoring the concurrency cap
pub fn spawn(world: &mut World, kind: BuffKind, tier: u8, position: Vec2) -> RelicId {
    let id = world.alloc_relic_id();
    let now = world.now();
    let relic = Relic {
        id,
        kind,
        position,
        tier: tier.clamp(1, 3),
        spawned_at: now,
        expires_at: now + world.config.relic_ttl_secs * 1000,
    };
    world.relics.insert(id, relic);
    world.bump_relics();
    id
}

/// Nearest relic within `range` of `position`, skipping already claimed ids
pub fn nearest_in_range(
    world: &World,
    position: Vec2,
    range: f32,
    claimed: Option<&HashSet<RelicId>>,
) -> Option<RelicId> {
    let range_sq = range * range;
    world
        .relics
        .values()
        .filter(|r| claimed.map_or(true, |set| !set.contains(&r.id)))
        .map(|r| (r.id, r.position.distance_sq_to(position)))
        .filter(|(_, d)| *d <= range_sq)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

/// Remove a relic and give its buff to `player_id`
pub fn claim(world: &mut World, player_id: PlayerId, relic_id: RelicId) -> Option<(BuffKind, u8)> {
    if !world.get_player(player_id).is_some_and(|p| p.is_active()) {
        return None;
    }
    let relic = world.relics.remove(&relic_id)?;
    world.bump_relics();

    let now = world.now();
    let config = world.config.clone();
    let player = world.get_player_mut(player_id)?;
    apply_buff(player, relic.kind, relic.tier, now, &config);
    let (name, device) = (player.name.clone(), player.device.clone());
    world.events.push(
        now,
        EventKind::Loot,
        name,
        device,
        format!("tier {} {} relic", relic.tier, relic.kind.label()),
    );
    Some((relic.kind, relic.tier))
}

/// Per-tick relic work: purge expired, spawn on schedule, then auto-pickup
pub fn update(world: &mut World) {
    purge_expired(world);
    spawn_scheduled(world);
    auto_pickup(world);
}

/// Drop every relic (round boundaries)
pub fn clear(world: &mut World) {
    if !world.relics.is_empty() {
        world.relics.clear();
        world.bump_relics();
    }
    world.next_relic_spawn_at = 0;
}

fn purge_expired(world: &mut World) {
    let now = world.now();
    let before = world.relics.len();
    world.relics.retain(|_, r| r.expires_at > now);
    if world.relics.len() != before {
        world.bump_relics();
    }
}

fn spawn_scheduled(world: &mut World) {
    let now = world.now();
    let interval = world.config.relic_spawn_interval_secs * 1000;
    if world.next_relic_spawn_at == 0 {
        world.next_relic_spawn_at = now + interval;
        return;
    }
    if now < world.next_relic_spawn_at {
        return;
    }
    world.next_relic_spawn_at = now + interval;
    if world.relics.len() >= world.config.relic_max as usize {
        return;
    }

    let anchor = if world.map.pois.is_empty() {
        let reach = world.match_state.border_radius * 0.8;
        Vec2::new(
            world.rng.gen_range(-reach..=reach),
            world.rng.gen_range(-reach..=reach),
        )
    } else {
        let i = world.rng.gen_range(0..world.map.pois.len());
        let offset = Vec2::from_angle(world.rng.gen_range(0.0..TAU)) * world.rng.gen_range(40.0..160.0);
        world.map.pois[i].position + offset
    };
    let position = world.map.find_free_spot(anchor.x, anchor.y, player::RADIUS);

    let kind = BuffKind::ALL[world.rng.gen_range(0..BuffKind::ALL.len())];
    let roll: f32 = world.rng.gen();
    let tier = if roll < 0.1 {
        3
    } else if roll < 0.4 {
        2
    } else {
        1
    };
    spawn(world, kind, tier, position);
}

/// Each active player takes the nearest unclaimed relic in range. The
/// claimed set keeps two players from taking the same relic this tick.
fn auto_pickup(world: &mut World) {
    if world.relics.is_empty() {
        return;
    }
    let range = world.config.relic_pickup_range;
    let mut claimed: HashSet<RelicId> = HashSet::new();
    let mut grants: Vec<(PlayerId, RelicId)> = Vec::new();

    for id in world.sorted_player_ids() {
        let Some(position) = world.get_player(id).filter(|p| p.is_active()).map(|p| p.position) else {
            continue;
        };
        if let Some(relic_id) = nearest_in_range(world, position, range, Some(&claimed)) {
            claimed.insert(relic_id);
            grants.push((id, relic_id));
        }
    }

    for (player_id, relic_id) in grants {
        claim(world, player_id, relic_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::MatchPhase;
    use uuid::Uuid;

    fn create_test_world() -> World {
        let config = GameConfig {
            relic_max: 0,
            ..GameConfig::default()
        };
        let mut world = World::with_seed(config, 5);
        world.match_state.phase = MatchPhase::Running;
        world
    }

    fn add_player_at(world: &mut World, name: &str, position: Vec2) -> PlayerId {
        let id = Uuid::new_v4();
        let mut p = Player::new(id, name.into(), String::new(), world.clock);
        p.position = position;
        world.add_player(p);
        id
    }

    #[test]
    fn test_buff_duration_scales_with_tier() {
        assert_eq!(buff_duration(1), 20_000);
        assert_eq!(buff_duration(2), 30_000);
        assert_eq!(buff_duration(3), 40_000);
    }

    #[test]
    fn test_apply_buff_extends_and_caps_gear() {
        let config = GameConfig {
            max_weapon_tier: 1,
            ..GameConfig::default()
        };
        let mut p = Player::new(Uuid::new_v4(), "A".into(), String::new(), 0);
        apply_buff(&mut p, BuffKind::Fury, 3, 1000, &config);
        assert_eq!(p.buffs.fury_until, 41_000);
        assert_eq!(p.weapon_tier, 1);

        // A weaker relic later never shortens the buff
        apply_buff(&mut p, BuffKind::Fury, 1, 2000, &config);
        assert_eq!(p.buffs.fury_until, 41_000);
        assert_eq!(p.weapon_tier, 1);

        apply_buff(&mut p, BuffKind::Fortify, 1, 0, &config);
        assert_eq!(p.armor_tier, 1);
    }

    #[test]
    fn test_no_double_claim() {
        let mut world = create_test_world();
        let relic_at = Vec2::new(300.0, 300.0);
        let a = add_player_at(&mut world, "A", relic_at + Vec2::new(15.0, 0.0));
        let b = add_player_at(&mut world, "B", relic_at - Vec2::new(15.0, 0.0));
        spawn(&mut world, BuffKind::Regen, 1, relic_at);
        let version = world.versions.relics;

        auto_pickup(&mut world);

        let got_a = world.get_player(a).map(|p| p.buffs.has(BuffKind::Regen, world.clock)).unwrap();
        let got_b = world.get_player(b).map(|p| p.buffs.has(BuffKind::Regen, world.clock)).unwrap();
        assert!(got_a ^ got_b, "exactly one player gets the relic");
        assert!(world.relics.is_empty());
        // Removed exactly once
        assert_eq!(world.versions.relics, version + 1);
    }

    #[test]
    fn test_each_player_takes_at_most_one_per_tick() {
        let mut world = create_test_world();
        let at = Vec2::new(-400.0, 200.0);
        let a = add_player_at(&mut world, "A", at);
        spawn(&mut world, BuffKind::Swift, 1, at);
        spawn(&mut world, BuffKind::Tracker, 1, at + Vec2::new(5.0, 0.0));

        auto_pickup(&mut world);
        assert_eq!(world.relics.len(), 1);
        auto_pickup(&mut world);
        assert!(world.relics.is_empty());
        let p = world.get_player(a).unwrap();
        assert!(p.buffs.has(BuffKind::Swift, world.clock));
        assert!(p.buffs.has(BuffKind::Tracker, world.clock));
    }

    #[test]
    fn test_expired_relics_purged_before_pickup() {
        let mut world = create_test_world();
        let at = Vec2::new(100.0, -600.0);
        let a = add_player_at(&mut world, "A", at);
        spawn(&mut world, BuffKind::Fury, 1, at);
        world.clock += world.config.relic_ttl_secs * 1000;

        update(&mut world);
        assert!(world.relics.is_empty());
        assert!(!world.get_player(a).unwrap().buffs.has(BuffKind::Fury, world.clock));
    }

    #[test]
    fn test_spawn_respects_cap() {
        let mut world = create_test_world();
        world.config.relic_max = 2;
        world.config.relic_spawn_interval_secs = 1;
        for _ in 0..10 {
            world.clock += 1000;
            spawn_scheduled(&mut world);
        }
        assert_eq!(world.relics.len(), 2);
    }

    #[test]
    fn test_spectators_do_not_pick_up() {
        let mut world = create_test_world();
        let at = Vec2::new(700.0, 0.0);
        let a = add_player_at(&mut world, "A", at);
        world.get_player_mut(a).unwrap().make_spectator();
        spawn(&mut world, BuffKind::Regen, 2, at);
        auto_pickup(&mut world);
        assert_eq!(world.relics.len(), 1);
    }
}
