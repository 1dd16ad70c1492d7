use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::game::constants::{arena, tick};

/// Per-tier probabilities for chest rolls, index 0 = tier 1
pub type TierTable = [f32; 3];

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error(
        "tick rate must be between {min} and {max} Hz, got {0}",
        min = tick::MIN_TICK_RATE,
        max = tick::MAX_TICK_RATE
    )]
    TickRate(u32),
    #[error("broadcast rate {broadcast} must be between 1 and the tick rate {tick}")]
    BroadcastRate { broadcast: u32, tick: u32 },
}

/// Process-level configuration (environment driven)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Snapshot broadcasts per second
    pub broadcast_rate: u32,
    /// Target lobby size reached with filler bots
    pub bot_fill: usize,
    /// Arena seed; random when unset
    pub map_seed: Option<u64>,
    /// Seconds without input before a human player is pruned
    pub idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: tick::TICK_RATE,
            broadcast_rate: tick::BROADCAST_RATE,
            bot_fill: 6,
            map_seed: None,
            idle_timeout_secs: 60,
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(rate) = std::env::var("TICK_RATE") {
            match rate.parse::<u32>() {
                Ok(parsed) if (tick::MIN_TICK_RATE..=tick::MAX_TICK_RATE).contains(&parsed) => {
                    config.tick_rate = parsed
                }
                _ => tracing::warn!("Invalid TICK_RATE '{}', using default", rate),
            }
        }

        if let Ok(rate) = std::env::var("BROADCAST_RATE") {
            match rate.parse::<u32>() {
                Ok(parsed) if parsed > 0 && parsed <= config.tick_rate => {
                    config.broadcast_rate = parsed
                }
                _ => tracing::warn!("Invalid BROADCAST_RATE '{}', using default", rate),
            }
        }

        if let Ok(fill) = std::env::var("BOT_FILL") {
            match fill.parse::<usize>() {
                Ok(parsed) if parsed <= 32 => config.bot_fill = parsed,
                _ => tracing::warn!("BOT_FILL must be 0-32, using default"),
            }
        }

        if let Ok(seed) = std::env::var("MAP_SEED") {
            match seed.parse::<u64>() {
                Ok(parsed) => config.map_seed = Some(parsed),
                Err(_) => tracing::warn!("Invalid MAP_SEED '{}', using a random seed", seed),
            }
        }

        if let Ok(idle) = std::env::var("IDLE_TIMEOUT_SECS") {
            match idle.parse::<u64>() {
                Ok(parsed) if (10..=3600).contains(&parsed) => config.idle_timeout_secs = parsed,
                _ => tracing::warn!("IDLE_TIMEOUT_SECS must be 10-3600, using default"),
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(tick::MIN_TICK_RATE..=tick::MAX_TICK_RATE).contains(&self.tick_rate) {
            return Err(ConfigError::TickRate(self.tick_rate));
        }
        if self.broadcast_rate == 0 || self.broadcast_rate > self.tick_rate {
            return Err(ConfigError::BroadcastRate {
                broadcast: self.broadcast_rate,
                tick: self.tick_rate,
            });
        }
        Ok(())
    }

    /// Broadcast every N ticks
    pub fn broadcast_every(&self) -> u64 {
        (self.tick_rate as f32 / self.broadcast_rate.max(1) as f32).round().max(1.0) as u64
    }

    /// Initial gameplay config derived from the process config
    pub fn game_config(&self) -> GameConfig {
        GameConfig {
            bot_fill: self.bot_fill as u32,
            idle_timeout_secs: self.idle_timeout_secs,
            map_seed: self.map_seed.unwrap_or_else(rand::random),
            ..GameConfig::default()
        }
    }
}

/// Admin-tunable gameplay configuration.
///
/// Every field has an independent safe range; see [`GameConfig::apply_patch`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameConfig {
    // Match flow
    pub min_players: u32,
    pub countdown_secs: u64,
    pub match_duration_secs: u64,
    pub bot_fill: u32,
    pub bot_difficulty: u32,
    pub idle_timeout_secs: u64,

    // Arena generation
    pub map_seed: u64,
    pub obstacle_count: u32,
    pub obstacle_density: f32,
    pub size_variance: f32,
    pub lane_width: f32,

    // Border
    pub border_start_radius: f32,
    pub border_end_radius: f32,
    pub border_delay_secs: u64,
    pub border_shrink_secs: u64,
    pub border_dps: f32,

    // Storm
    pub storm_enabled: bool,
    pub storm_first_delay_secs: u64,
    pub storm_interval_secs: u64,
    pub storm_duration_secs: u64,
    pub storm_dps: f32,

    // Feast
    pub feast_enabled: bool,
    pub feast_fraction: f32,
    pub feast_chest_count: u32,
    pub feast_min_tier: u32,

    // Chests
    pub chest_open_range: f32,
    pub chest_refill_secs: u64,
    pub tier2_chance: f32,
    pub tier3_chance: f32,
    pub center_bias_radius: f32,
    pub center_tier_bonus: f32,
    pub heal_chance: TierTable,
    pub heal_amount: TierTable,
    pub weapon_chance: TierTable,
    pub armor_chance: TierTable,
    pub soup_chance: TierTable,
    pub consumable_chance: TierTable,
    pub relic_drop_chance: TierTable,
    pub max_weapon_tier: u32,
    pub max_armor_tier: u32,

    // Relics
    pub relic_spawn_interval_secs: u64,
    pub relic_max: u32,
    pub relic_ttl_secs: u64,
    pub relic_pickup_range: f32,
    pub kill_drop_chance: f32,

    // Shrines
    pub shrines_enabled: bool,
    pub shrine_count: u32,
    pub shrine_radius: f32,
    pub shrine_cooldown_secs: u64,

    // Combat
    pub attack_range: f32,
    pub attack_fov_deg: f32,
    pub attack_cooldown_ms: u64,
    pub base_damage: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            countdown_secs: 10,
            match_duration_secs: 300,
            bot_fill: 6,
            bot_difficulty: 2,
            idle_timeout_secs: 60,

            map_seed: 1337,
            obstacle_count: 140,
            obstacle_density: 0.6,
            size_variance: 0.5,
            lane_width: 90.0,

            border_start_radius: 1900.0,
            border_end_radius: 250.0,
            border_delay_secs: 30,
            border_shrink_secs: 180,
            border_dps: 6.0,

            storm_enabled: true,
            storm_first_delay_secs: 45,
            storm_interval_secs: 60,
            storm_duration_secs: 15,
            storm_dps: 10.0,

            feast_enabled: true,
            feast_fraction: 0.5,
            feast_chest_count: 4,
            feast_min_tier: 2,

            chest_open_range: 70.0,
            chest_refill_secs: 45,
            tier2_chance: 0.3,
            tier3_chance: 0.1,
            center_bias_radius: 600.0,
            center_tier_bonus: 0.15,
            heal_chance: [0.6, 0.7, 0.8],
            heal_amount: [20.0, 30.0, 45.0],
            weapon_chance: [0.2, 0.45, 0.9],
            armor_chance: [0.2, 0.4, 0.8],
            soup_chance: [0.4, 0.5, 0.6],
            consumable_chance: [0.15, 0.25, 0.35],
            relic_drop_chance: [0.02, 0.06, 0.15],
            max_weapon_tier: 4,
            max_armor_tier: 4,

            relic_spawn_interval_secs: 8,
            relic_max: 6,
            relic_ttl_secs: 30,
            relic_pickup_range: 40.0,
            kill_drop_chance: 0.35,

            shrines_enabled: true,
            shrine_count: 3,
            shrine_radius: 60.0,
            shrine_cooldown_secs: 45,

            attack_range: 90.0,
            attack_fov_deg: 100.0,
            attack_cooldown_ms: 450,
            base_damage: 12.0,
        }
    }
}

/// What an admin patch touched, so callers know which derived state to rebuild
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigChange {
    /// Any field changed
    pub any: bool,
    /// A field that feeds the arena generator changed
    pub map: bool,
    /// Shrine layout changed
    pub shrines: bool,
}

impl GameConfig {
    /// Apply an admin key/value patch.
    ///
    /// Each known field is clamped to its safe range on its own. Unknown keys
    /// and values of the wrong JSON type are ignored, so one bad field never
    /// rejects the rest of the patch.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) -> ConfigChange {
        let mut change = ConfigChange::default();
        let max_radius = arena::HALF_EXTENT * 1.5;

        let mut gen = false;
        gen |= patch_u64(patch, "map_seed", &mut self.map_seed, 0, u64::MAX);
        gen |= patch_u32(patch, "obstacle_count", &mut self.obstacle_count, 0, 400);
        gen |= patch_f32(patch, "obstacle_density", &mut self.obstacle_density, 0.0, 1.0);
        gen |= patch_f32(patch, "size_variance", &mut self.size_variance, 0.0, 1.0);
        gen |= patch_f32(patch, "lane_width", &mut self.lane_width, 20.0, 300.0);
        change.map = gen;

        let mut shrines = false;
        shrines |= patch_bool(patch, "shrines_enabled", &mut self.shrines_enabled);
        shrines |= patch_u32(patch, "shrine_count", &mut self.shrine_count, 0, 8);
        shrines |= patch_f32(patch, "shrine_radius", &mut self.shrine_radius, 20.0, 200.0);
        change.shrines = shrines;

        let mut rest = false;
        rest |= patch_u32(patch, "min_players", &mut self.min_players, 1, 32);
        rest |= patch_u64(patch, "countdown_secs", &mut self.countdown_secs, 3, 60);
        rest |= patch_u64(patch, "match_duration_secs", &mut self.match_duration_secs, 60, 1800);
        rest |= patch_u32(patch, "bot_fill", &mut self.bot_fill, 0, 32);
        rest |= patch_u32(patch, "bot_difficulty", &mut self.bot_difficulty, 1, 3);
        rest |= patch_u64(patch, "idle_timeout_secs", &mut self.idle_timeout_secs, 10, 3600);

        rest |= patch_f32(patch, "border_start_radius", &mut self.border_start_radius, 200.0, max_radius);
        rest |= patch_f32(patch, "border_end_radius", &mut self.border_end_radius, 50.0, max_radius);
        rest |= patch_u64(patch, "border_delay_secs", &mut self.border_delay_secs, 0, 600);
        rest |= patch_u64(patch, "border_shrink_secs", &mut self.border_shrink_secs, 10, 1800);
        rest |= patch_f32(patch, "border_dps", &mut self.border_dps, 0.0, 100.0);
        // Keep the border shrinking, never growing
        if self.border_end_radius > self.border_start_radius {
            self.border_end_radius = self.border_start_radius;
        }

        rest |= patch_bool(patch, "storm_enabled", &mut self.storm_enabled);
        rest |= patch_u64(patch, "storm_first_delay_secs", &mut self.storm_first_delay_secs, 0, 600);
        rest |= patch_u64(patch, "storm_interval_secs", &mut self.storm_interval_secs, 10, 600);
        rest |= patch_u64(patch, "storm_duration_secs", &mut self.storm_duration_secs, 3, 120);
        rest |= patch_f32(patch, "storm_dps", &mut self.storm_dps, 0.0, 100.0);

        rest |= patch_bool(patch, "feast_enabled", &mut self.feast_enabled);
        rest |= patch_f32(patch, "feast_fraction", &mut self.feast_fraction, 0.1, 0.95);
        rest |= patch_u32(patch, "feast_chest_count", &mut self.feast_chest_count, 0, 32);
        rest |= patch_u32(patch, "feast_min_tier", &mut self.feast_min_tier, 1, 3);

        rest |= patch_f32(patch, "chest_open_range", &mut self.chest_open_range, 20.0, 200.0);
        rest |= patch_u64(patch, "chest_refill_secs", &mut self.chest_refill_secs, 5, 600);
        rest |= patch_f32(patch, "tier2_chance", &mut self.tier2_chance, 0.0, 1.0);
        rest |= patch_f32(patch, "tier3_chance", &mut self.tier3_chance, 0.0, 1.0);
        rest |= patch_f32(patch, "center_bias_radius", &mut self.center_bias_radius, 0.0, max_radius);
        rest |= patch_f32(patch, "center_tier_bonus", &mut self.center_tier_bonus, 0.0, 0.5);
        rest |= patch_tiers(patch, "heal_chance", &mut self.heal_chance, 0.0, 1.0);
        rest |= patch_tiers(patch, "heal_amount", &mut self.heal_amount, 0.0, 100.0);
        rest |= patch_tiers(patch, "weapon_chance", &mut self.weapon_chance, 0.0, 1.0);
        rest |= patch_tiers(patch, "armor_chance", &mut self.armor_chance, 0.0, 1.0);
        rest |= patch_tiers(patch, "soup_chance", &mut self.soup_chance, 0.0, 1.0);
        rest |= patch_tiers(patch, "consumable_chance", &mut self.consumable_chance, 0.0, 1.0);
        rest |= patch_tiers(patch, "relic_drop_chance", &mut self.relic_drop_chance, 0.0, 1.0);
        rest |= patch_u32(patch, "max_weapon_tier", &mut self.max_weapon_tier, 1, 8);
        rest |= patch_u32(patch, "max_armor_tier", &mut self.max_armor_tier, 1, 8);

        rest |= patch_u64(patch, "relic_spawn_interval_secs", &mut self.relic_spawn_interval_secs, 1, 300);
        rest |= patch_u32(patch, "relic_max", &mut self.relic_max, 0, 32);
        rest |= patch_u64(patch, "relic_ttl_secs", &mut self.relic_ttl_secs, 5, 600);
        rest |= patch_f32(patch, "relic_pickup_range", &mut self.relic_pickup_range, 10.0, 150.0);
        rest |= patch_f32(patch, "kill_drop_chance", &mut self.kill_drop_chance, 0.0, 1.0);

        rest |= patch_u64(patch, "shrine_cooldown_secs", &mut self.shrine_cooldown_secs, 5, 600);

        rest |= patch_f32(patch, "attack_range", &mut self.attack_range, 30.0, 250.0);
        rest |= patch_f32(patch, "attack_fov_deg", &mut self.attack_fov_deg, 20.0, 360.0);
        rest |= patch_u64(patch, "attack_cooldown_ms", &mut self.attack_cooldown_ms, 100, 3000);
        rest |= patch_f32(patch, "base_damage", &mut self.base_damage, 1.0, 50.0);

        change.any = gen || shrines || rest;
        change
    }

    pub fn countdown_ms(&self) -> u64 {
        self.countdown_secs * 1000
    }

    pub fn match_duration_ms(&self) -> u64 {
        self.match_duration_secs * 1000
    }

    pub fn idle_timeout_ms(&self) -> u64 {
        self.idle_timeout_secs * 1000
    }

    /// Half-angle of the attack cone in radians
    pub fn attack_half_fov(&self) -> f32 {
        (self.attack_fov_deg * 0.5).to_radians()
    }
}

fn patch_f32(patch: &Map<String, Value>, key: &str, target: &mut f32, min: f32, max: f32) -> bool {
    let Some(v) = patch.get(key).and_then(Value::as_f64) else {
        return false;
    };
    let v = v as f32;
    if !v.is_finite() {
        return false;
    }
    let v = v.clamp(min, max);
    let changed = *target != v;
    *target = v;
    changed
}

fn patch_u32(patch: &Map<String, Value>, key: &str, target: &mut u32, min: u32, max: u32) -> bool {
    let mut wide = *target as u64;
    let changed = patch_u64(patch, key, &mut wide, min as u64, max as u64);
    *target = wide as u32;
    changed
}

fn patch_u64(patch: &Map<String, Value>, key: &str, target: &mut u64, min: u64, max: u64) -> bool {
    let Some(value) = patch.get(key) else {
        return false;
    };
    // Accept integral JSON numbers; negative or fractional values clamp/truncate
    let v = if let Some(u) = value.as_u64() {
        u
    } else if let Some(f) = value.as_f64() {
        if !f.is_finite() {
            return false;
        }
        f.max(0.0) as u64
    } else {
        return false;
    };
    let v = v.clamp(min, max);
    let changed = *target != v;
    *target = v;
    changed
}

fn patch_bool(patch: &Map<String, Value>, key: &str, target: &mut bool) -> bool {
    let Some(v) = patch.get(key).and_then(Value::as_bool) else {
        return false;
    };
    let changed = *target != v;
    *target = v;
    changed
}

/// Per-tier arrays: each entry is clamped on its own, non-numeric entries keep
/// their previous value
fn patch_tiers(patch: &Map<String, Value>, key: &str, target: &mut TierTable, min: f32, max: f32) -> bool {
    let Some(values) = patch.get(key).and_then(Value::as_array) else {
        return false;
    };
    let mut changed = false;
    for (slot, value) in target.iter_mut().zip(values.iter()) {
        if let Some(v) = value.as_f64() {
            let v = (v as f32).clamp(min, max);
            if v.is_finite() && *slot != v {
                *slot = v;
                changed = true;
            }
        }
    }
    changed
}
