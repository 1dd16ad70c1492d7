//! Melee combat, damage and death

use rand::Rng;

use crate::game::constants::{combat, items, player};
use crate::game::state::{BuffKind, DeathCause, EventKind, Millis, PlayerId, World};
use crate::game::systems::relics;
use crate::util::vec2::{angle_diff, Vec2};

/// A landed swing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub target: PlayerId,
    pub damage: f32,
    pub killed: bool,
}

/// Inputs of the damage formula, separated so it can be tested on its own
#[derive(Debug, Clone, Copy)]
pub struct DamageRoll {
    pub base: f32,
    pub weapon_tier: u8,
    pub armor_tier: u8,
    pub fury: bool,
    pub tracker: bool,
    pub fortified: bool,
    /// Random factor in `[VARIANCE_MIN, VARIANCE_MAX]`
    pub variance: f32,
}

/// `(base + weapon*k1 - armor*k2) * fury * tracker * variance * fortify`, clamped
pub fn compute_damage(roll: &DamageRoll) -> f32 {
    let raw = roll.base + roll.weapon_tier as f32 * combat::WEAPON_TIER_DAMAGE
        - roll.armor_tier as f32 * combat::ARMOR_TIER_REDUCTION;
    let fury = if roll.fury { combat::FURY_MULTIPLIER } else { 1.0 };
    let tracker = if roll.tracker { combat::TRACKER_MULTIPLIER } else { 1.0 };
    let fortify = if roll.fortified { combat::FORTIFY_MITIGATION } else { 1.0 };
    (raw * fury * tracker * roll.variance * fortify).clamp(combat::DAMAGE_FLOOR, combat::DAMAGE_CEILING)
}

/// Swing at the nearest valid target in the facing cone.
///
/// Only one target is hit per swing. The cooldown starts even on a miss.
pub fn try_attack(world: &mut World, attacker_id: PlayerId) -> Option<Hit> {
    let now = world.now();
    let (origin, facing, weapon_tier, fury, tracker) = {
        let a = world.get_player(attacker_id)?;
        if !a.is_active() || a.is_invulnerable(now) || now < a.cooldowns.attack_ready_at {
            return None;
        }
        (
            a.position,
            a.facing,
            a.weapon_tier,
            a.buffs.has(BuffKind::Fury, now),
            a.buffs.has(BuffKind::Tracker, now),
        )
    };

    let cooldown = if fury {
        (world.config.attack_cooldown_ms as f32 * combat::FURY_COOLDOWN_FACTOR) as Millis
    } else {
        world.config.attack_cooldown_ms
    };
    if let Some(a) = world.get_player_mut(attacker_id) {
        a.cooldowns.attack_ready_at = now + cooldown;
        // Swinging gives away your position
        a.buffs.stealth_until = 0;
    }

    let range = world.config.attack_range;
    let half_fov = world.config.attack_half_fov();
    let (target_id, target_pos, distance) = world
        .active_players()
        .filter(|t| t.id != attacker_id && !t.is_invulnerable(now))
        .filter_map(|t| {
            let d = t.position.distance_to(origin);
            (d <= range).then_some((t.id, t.position, d))
        })
        .filter(|(_, pos, d)| *d <= f32::EPSILON || angle_diff(facing, origin.bearing_to(*pos)).abs() <= half_fov)
        .filter(|(_, pos, _)| world.map.has_line_of_sight(origin, *pos))
        .min_by(|a, b| a.2.total_cmp(&b.2).then_with(|| a.0.cmp(&b.0)))?;

    let (armor_tier, fortified) = world
        .get_player(target_id)
        .map(|t| (t.armor_tier, t.buffs.has(BuffKind::Fortify, now)))?;
    let variance = world.rng.gen_range(combat::VARIANCE_MIN..=combat::VARIANCE_MAX);
    let damage = compute_damage(&DamageRoll {
        base: world.config.base_damage,
        weapon_tier,
        armor_tier,
        fury,
        tracker,
        fortified,
        variance,
    });

    let dir = (target_pos - origin).normalize();

    // Lunge, stopping short of the target and of obstacles
    let lunge = combat::LUNGE_DISTANCE.min((distance - player::RADIUS * 2.0).max(0.0));
    if lunge > 0.0 {
        let dest = origin + dir * lunge;
        if !world.map.is_blocked(dest.x, dest.y, player::RADIUS) {
            if let Some(a) = world.get_player_mut(attacker_id) {
                a.position = dest;
            }
        }
    }

    if let Some(t) = world.get_player_mut(target_id) {
        t.knockback = dir * combat::KNOCKBACK_SPEED;
    }
    let killed = apply_damage(world, target_id, damage, DeathCause::Player { killer: attacker_id });

    Some(Hit {
        target: target_id,
        damage,
        killed,
    })
}

/// Subtract health and kill at zero. Returns true if this killed the player.
pub fn apply_damage(world: &mut World, target_id: PlayerId, amount: f32, cause: DeathCause) -> bool {
    let now = world.now();
    let Some(target) = world.get_player_mut(target_id) else {
        return false;
    };
    if !target.is_active() || amount <= 0.0 {
        return false;
    }
    target.health -= amount;
    target.last_damaged_at = now;
    if target.health > 0.0 {
        return false;
    }
    kill(world, target_id, cause);
    true
}

/// Turn a player into a spectator and credit the kill
pub fn kill(world: &mut World, victim_id: PlayerId, cause: DeathCause) {
    let now = world.now();
    let Some(victim) = world.get_player_mut(victim_id) else {
        return;
    };
    let site = victim.position;
    let gear = victim.gear_score();
    victim.make_spectator();
    victim.deaths += 1;
    victim.death_cause = Some(cause);
    let (victim_name, victim_device) = (victim.name.clone(), victim.device.clone());

    let detail = match cause {
        DeathCause::Player { killer } => {
            let killer_name = match world.get_player_mut(killer) {
                Some(k) => {
                    k.kills += 1;
                    k.name.clone()
                }
                None => "someone".to_string(),
            };
            maybe_drop_relic(world, site, gear);
            format!("slain by {killer_name}")
        }
        DeathCause::Border => "caught outside the border".to_string(),
        DeathCause::Storm => "swallowed by the storm".to_string(),
    };

    world
        .events
        .push(now, EventKind::Death, victim_name, victim_device, detail);
}

fn maybe_drop_relic(world: &mut World, site: Vec2, victim_gear: i32) {
    if !world.rng.gen_bool(world.config.kill_drop_chance.clamp(0.0, 1.0) as f64) {
        return;
    }
    let kind = BuffKind::ALL[world.rng.gen_range(0..BuffKind::ALL.len())];
    // Better-geared victims drop better relics
    let tier = (1 + victim_gear / 3).clamp(1, 3) as u8;
    let position = world.map.find_free_spot(site.x, site.y, player::RADIUS);
    relics::spawn(world, kind, tier, position);
}

/// Resolve attacks queued by input or bots since the last combat step
pub fn resolve_queued(world: &mut World) -> Vec<Hit> {
    let mut queued: Vec<PlayerId> = world
        .players
        .values()
        .filter(|p| p.attack_queued)
        .map(|p| p.id)
        .collect();
    queued.sort();

    let mut hits = Vec::new();
    for id in queued {
        if let Some(p) = world.get_player_mut(id) {
            p.attack_queued = false;
        }
        if let Some(hit) = try_attack(world, id) {
            hits.push(hit);
        }
    }
    hits
}

/// Regen buff plus passive regeneration once out of combat
pub fn update_regen(world: &mut World, dt: f32) {
    let now = world.now();
    for p in world.players.values_mut().filter(|p| p.is_active()) {
        let mut rate = 0.0;
        if p.buffs.has(BuffKind::Regen, now) {
            rate += items::REGEN_BUFF_RATE;
        }
        if p.last_damaged_at == 0 || now.saturating_sub(p.last_damaged_at) >= player::PASSIVE_REGEN_DELAY_MS {
            rate += player::PASSIVE_REGEN;
        }
        if rate > 0.0 {
            p.health = (p.health + rate * dt).min(player::MAX_HEALTH);
        }
    }
}
