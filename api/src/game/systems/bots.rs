//! Bot director
//!
//! Bots pick a goal on their own randomized timer and steer toward it every
//! tick. Attacks, soups, abilities and looting are checked every tick
//! independently of the goal.

use std::f32::consts::TAU;

use rand::Rng;
use uuid::Uuid;

use crate::game::constants::ai;
use crate::game::state::{
    AbilityKind, BotBrain, BotGoal, EventKind, MatchPhase, Millis, Player, PlayerId, World,
};
use crate::game::systems::{abilities, loot, phase};
use crate::util::vec2::{angle_diff, Vec2};

/// Randomized decision interval, shorter at higher difficulty
fn decision_interval<R: Rng>(difficulty: u8, rng: &mut R) -> Millis {
    let base = rng.gen_range(ai::DECISION_MIN_MS..=ai::DECISION_MAX_MS);
    let speedup = 1.0 + 0.35 * (difficulty.clamp(1, 3) as f32 - 1.0);
    (base / speedup) as Millis
}

/// Add a bot. Mid-round bots join as spectators like anyone else.
pub fn add_bot(world: &mut World, name: Option<String>, difficulty: Option<u8>) -> PlayerId {
    let now = world.now();
    let index = world.bots_created as usize;
    world.bots_created += 1;

    let name = name.unwrap_or_else(|| {
        let base = ai::NAMES[index % ai::NAMES.len()];
        let round = index / ai::NAMES.len();
        if round == 0 {
            format!("{base} (bot)")
        } else {
            format!("{base} {} (bot)", round + 1)
        }
    });
    let difficulty = difficulty.unwrap_or(world.config.bot_difficulty as u8);
    let heading = world.rng.gen_range(0.0..TAU);

    let id = Uuid::new_v4();
    let mut bot = Player::new_bot(id, name.clone(), BotBrain::new(difficulty, heading), now);
    phase::place_newcomer(world, &mut bot);
    world.add_player(bot);
    world.events.push(now, EventKind::Join, name, "Bot", "joined");
    id
}

/// Keep the lobby at the configured size with filler bots
pub fn fill(world: &mut World) {
    if !matches!(world.match_state.phase, MatchPhase::Lobby | MatchPhase::Countdown) {
        return;
    }
    let target = world.config.bot_fill as usize;
    let total = world.players.len();

    if total < target {
        for _ in total..target {
            add_bot(world, None, None);
        }
        tracing::debug!(added = target - total, "Bot fill");
    } else if total > target {
        // Only bots make room
        let mut bots: Vec<(String, PlayerId)> = world
            .players
            .values()
            .filter(|p| p.is_bot)
            .map(|p| (p.name.clone(), p.id))
            .collect();
        bots.sort();
        let excess = (total - target).min(bots.len());
        for (_, id) in bots.into_iter().rev().take(excess) {
            world.remove_player(id, "left (lobby full)");
        }
        if excess > 0 {
            tracing::debug!(removed = excess, "Bot fill");
        }
    }
}

/// What a bot sees of an opponent
#[derive(Debug, Clone, Copy)]
struct Sighting {
    id: PlayerId,
    position: Vec2,
    distance: f32,
    gear: i32,
}

fn nearest_enemy(world: &World, bot_id: PlayerId, origin: Vec2, now: Millis) -> Option<Sighting> {
    world
        .active_players()
        .filter(|p| p.id != bot_id)
        .filter_map(|p| {
            let distance = p.position.distance_to(origin);
            let sight = if p.buffs.is_stealthed(now) {
                ai::STEALTH_SIGHT_RADIUS
            } else {
                ai::SIGHT_RADIUS
            };
            (distance <= sight).then_some(Sighting {
                id: p.id,
                position: p.position,
                distance,
                gear: p.gear_score(),
            })
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

/// Re-plan and steer every bot
pub fn update(world: &mut World) {
    if world.match_state.phase == MatchPhase::Ended {
        return;
    }
    let now = world.now();
    let running = world.is_running();

    let mut bot_ids: Vec<PlayerId> = world
        .players
        .values()
        .filter(|p| p.is_bot && p.is_active())
        .map(|p| p.id)
        .collect();
    bot_ids.sort();

    for id in bot_ids {
        if world
            .get_player(id)
            .and_then(|p| p.bot.as_ref())
            .is_some_and(|b| now >= b.next_decision_at)
        {
            decide(world, id);
        }
        steer(world, id);
        if running {
            act(world, id);
        }
    }
}

fn decide(world: &mut World, id: PlayerId) {
    let now = world.now();
    let Some(bot) = world.get_player(id) else {
        return;
    };
    let Some(brain) = bot.bot.clone() else {
        return;
    };
    let origin = bot.position;
    let low_health = bot.health < ai::LOW_HEALTH;
    let own_gear = bot.gear_score();
    let running = world.is_running();

    let nearest_relic = world
        .relics
        .values()
        .map(|r| (r.id, r.position.distance_to(origin)))
        .filter(|(_, d)| *d <= ai::RELIC_INTEREST_RADIUS)
        .min_by(|a, b| a.1.total_cmp(&b.1));
    let enemy = nearest_enemy(world, id, origin, now);
    let nearest_chest = world
        .chests
        .iter()
        .filter(|c| c.is_lootable(now))
        .map(|c| (c.id, c.position.distance_to(origin)))
        .filter(|(_, d)| *d <= ai::RELIC_INTEREST_RADIUS)
        .min_by(|a, b| a.1.total_cmp(&b.1));

    let relic_roll = world.rng.gen_bool(0.5);
    let goal = match (nearest_relic, enemy) {
        (Some((relic_id, _)), _) if running && (low_health || relic_roll) => BotGoal::Relic { id: relic_id },
        (_, Some(enemy)) if running => {
            let outmatched = enemy.gear - own_gear >= ai::OUTMATCHED_GAP;
            if low_health || outmatched {
                BotGoal::Flee { threat: enemy.id }
            } else {
                BotGoal::Chase { target: enemy.id }
            }
        }
        _ => match nearest_chest {
            Some((chest_id, _)) if running => BotGoal::Chest { id: chest_id },
            _ => BotGoal::Wander,
        },
    };

    let drift = world.rng.gen_range(-ai::WANDER_DRIFT..=ai::WANDER_DRIFT);
    let flip = world.rng.gen_bool(0.3);
    let interval = decision_interval(brain.difficulty, &mut world.rng);

    if let Some(brain) = world.get_player_mut(id).and_then(|p| p.bot.as_mut()) {
        brain.goal = goal;
        brain.heading = (brain.heading + drift).rem_euclid(TAU);
        if flip {
            brain.strafe_dir = -brain.strafe_dir;
        }
        brain.next_decision_at = now + interval;
    }
}

fn steer(world: &mut World, id: PlayerId) {
    let now = world.now();
    let border = world.match_state.border_radius;
    let attack_range = world.config.attack_range;
    let running = world.is_running();
    let Some(bot) = world.get_player(id) else {
        return;
    };
    let Some(brain) = bot.bot.clone() else {
        return;
    };
    let origin = bot.position;

    let toward = |target: Vec2| (target - origin).normalize();

    let (mut intent, mut facing) = match brain.goal {
        BotGoal::Relic { id: relic_id } => match world.relics.get(&relic_id) {
            Some(r) => (toward(r.position), origin.bearing_to(r.position)),
            None => wander(origin, brain.heading),
        },
        BotGoal::Chest { id: chest_id } => match world.chests.get(chest_id as usize) {
            Some(c) if c.is_lootable(now) => (toward(c.position), origin.bearing_to(c.position)),
            _ => wander(origin, brain.heading),
        },
        BotGoal::Chase { target } => match world.get_player(target).filter(|t| t.is_active()) {
            Some(t) => {
                let facing = origin.bearing_to(t.position);
                let dir = toward(t.position);
                let distance = t.position.distance_to(origin);
                if distance > attack_range * 0.8 {
                    (dir, facing)
                } else {
                    // Circle the target while in reach
                    let strafe = dir.perpendicular() * brain.strafe_dir;
                    ((strafe + dir * 0.25).normalize(), facing)
                }
            }
            None => wander(origin, brain.heading),
        },
        BotGoal::Flee { threat } => match world.get_player(threat).filter(|t| t.is_active()) {
            Some(t) => {
                let away = (origin - t.position).normalize();
                // Fleeing outward into the border is worse than the fight
                let inward = (-origin).normalize() * 0.6;
                ((away + inward).normalize(), origin.bearing_to(t.position))
            }
            None => wander(origin, brain.heading),
        },
        BotGoal::Wander => wander(origin, brain.heading),
    };

    // Border always wins
    if running && origin.length() > border * 0.9 {
        intent = (-origin).normalize();
        facing = intent.angle();
    }

    if let Some(p) = world.get_player_mut(id) {
        p.move_intent = intent;
        p.facing = facing;
        // Bots never idle out
        p.last_input_at = now;
    }
}

/// Wanderers past this distance from the center steer back in
const WANDER_LEASH: f32 = 1200.0;

fn wander(origin: Vec2, heading: f32) -> (Vec2, f32) {
    // Lean back toward the middle when drifting out
    let dir = if origin.length() > WANDER_LEASH {
        (Vec2::from_angle(heading) + (-origin).normalize()).normalize()
    } else {
        Vec2::from_angle(heading)
    };
    (dir, dir.angle())
}

/// Per-tick actions: eat when hurt, pop abilities, loot, and swing
fn act(world: &mut World, id: PlayerId) {
    let now = world.now();
    let Some(bot) = world.get_player(id) else {
        return;
    };
    let origin = bot.position;
    let facing = bot.facing;
    let health = bot.health;
    let difficulty = bot.bot.as_ref().map_or(1, |b| b.difficulty);
    let goal = bot.bot.as_ref().map(|b| b.goal);

    if health < ai::LOW_HEALTH {
        abilities::try_soup(world, id);
    }

    let chance = 0.002 * difficulty as f64;
    if world.rng.gen_bool(chance) {
        let kind = if matches!(goal, Some(BotGoal::Flee { .. })) || world.rng.gen_bool(0.5) {
            AbilityKind::Speed
        } else {
            AbilityKind::Stealth
        };
        abilities::try_ability(world, id, kind);
    }

    let open_range = world.config.chest_open_range;
    if world
        .chests
        .iter()
        .any(|c| c.is_lootable(now) && c.position.distance_to(origin) <= open_range)
    {
        loot::try_open(world, id);
    }

    if let Some(enemy) = nearest_enemy(world, id, origin, now) {
        let half_fov = world.config.attack_half_fov();
        let in_reach = enemy.distance <= world.config.attack_range;
        let facing_ok = angle_diff(facing, origin.bearing_to(enemy.position)).abs() <= half_fov;
        if in_reach && facing_ok && world.map.has_line_of_sight(origin, enemy.position) {
            if let Some(p) = world.get_player_mut(id) {
                if now >= p.cooldowns.attack_ready_at {
                    p.attack_queued = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::map::ArenaMap;
    use rand::SeedableRng;

    fn create_test_world(bot_fill: u32) -> World {
        let config = GameConfig {
            bot_fill,
            ..GameConfig::default()
        };
        let mut world = World::with_seed(config, 31);
        world.map = ArenaMap::from_props(0, Vec::new(), Vec::new());
        world
    }

    #[test]
    fn test_fill_adds_and_trims_bots() {
        let mut world = create_test_world(4);
        fill(&mut world);
        assert_eq!(world.players.len(), 4);
        assert_eq!(world.bot_count(), 4);

        world.config.bot_fill = 2;
        fill(&mut world);
        assert_eq!(world.players.len(), 2);
    }

    #[test]
    fn test_fill_only_in_lobby_phases() {
        let mut world = create_test_world(4);
        world.match_state.phase = MatchPhase::Running;
        fill(&mut world);
        assert!(world.players.is_empty());
    }

    #[test]
    fn test_fill_never_removes_humans() {
        let mut world = create_test_world(1);
        for name in ["A", "B"] {
            let p = Player::new(Uuid::new_v4(), name.into(), String::new(), world.clock);
            world.add_player(p);
        }
        fill(&mut world);
        assert_eq!(world.players.len(), 2);
    }

    #[test]
    fn test_bot_names_unique() {
        let mut world = create_test_world(0);
        for _ in 0..(ai::NAMES.len() + 2) {
            add_bot(&mut world, None, None);
        }
        let mut names: Vec<_> = world.players.values().map(|p| p.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ai::NAMES.len() + 2);
    }

    #[test]
    fn test_decision_interval_faster_when_harder() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let easy: Millis = (0..200).map(|_| decision_interval(1, &mut rng)).sum();
        let hard: Millis = (0..200).map(|_| decision_interval(3, &mut rng)).sum();
        assert!(hard < easy);
    }

    #[test]
    fn test_bot_chases_and_swings() {
        let mut world = create_test_world(0);
        let bot = add_bot(&mut world, None, Some(3));
        world.match_state.phase = MatchPhase::Running;
        world.match_state.border_radius = 1900.0;
        let mut human = Player::new(Uuid::new_v4(), "Human".into(), String::new(), world.clock);
        human.position = Vec2::new(60.0, 0.0);
        let human_id = human.id;
        world.add_player(human);
        {
            let b = world.get_player_mut(bot).unwrap();
            b.position = Vec2::ZERO;
            b.invulnerable_until = 0;
            b.health = 100.0;
        }

        update(&mut world);
        let b = world.get_player(bot).unwrap();
        assert_eq!(b.bot.as_ref().unwrap().goal, BotGoal::Chase { target: human_id });
        assert!(b.attack_queued);
    }

    #[test]
    fn test_low_health_bot_flees() {
        let mut world = create_test_world(0);
        let bot = add_bot(&mut world, None, Some(1));
        world.match_state.phase = MatchPhase::Running;
        world.match_state.border_radius = 1900.0;
        let mut human = Player::new(Uuid::new_v4(), "Human".into(), String::new(), world.clock);
        human.position = Vec2::new(300.0, 0.0);
        let human_id = human.id;
        world.add_player(human);
        {
            let b = world.get_player_mut(bot).unwrap();
            b.position = Vec2::ZERO;
            b.health = 10.0;
            b.inventory.soups = 0;
        }

        update(&mut world);
        let b = world.get_player(bot).unwrap();
        assert_eq!(b.bot.as_ref().unwrap().goal, BotGoal::Flee { threat: human_id });
        assert!(b.move_intent.x < 0.0);
    }
}
