//! Fixed gameplay constants.
//!
//! Anything an admin can tune at runtime lives in `config::GameConfig`; the
//! values here are structural and never change while the server is running.

/// Tick scheduler constants
pub mod tick {
    /// Default simulation rate in Hz
    pub const TICK_RATE: u32 = 60;
    /// Default snapshot broadcast rate in Hz
    pub const BROADCAST_RATE: u32 = 20;
    /// Calls arriving sooner than this after the last processed tick are skipped
    pub const MIN_TICK_MS: u64 = 15;
    /// Elapsed time is clamped to this after a stall
    pub const MAX_STEP_MS: u64 = 500;
    pub const MIN_TICK_RATE: u32 = 10;
    /// Highest rate whose period stays above `MIN_TICK_MS`
    pub const MAX_TICK_RATE: u32 = 60;
}

/// Arena geometry
pub mod arena {
    /// Half the side of the square playfield (origin = center)
    pub const HALF_EXTENT: f32 = 2000.0;
    /// Spatial grid cell size for obstacle lookups
    pub const GRID_CELL_SIZE: f32 = 128.0;
    /// Radius of the ring chests and spawn points are laid out on
    pub const OUTER_RING_RADIUS: f32 = 1450.0;
    /// Radius of the inner chest ring
    pub const INNER_RING_RADIUS: f32 = 800.0;
    /// Radius of the central chest cluster
    pub const CENTER_RING_RADIUS: f32 = 220.0;
    /// Radius of the ring shrines are placed on
    pub const SHRINE_RING_RADIUS: f32 = 1050.0;
    /// Obstacle-free radius around POIs, spawns and chests
    pub const AVOID_RADIUS: f32 = 140.0;
    /// Minimum spacing between an obstacle and the last few placed ones
    pub const LOCAL_SPACING: f32 = 70.0;
    /// How many recent obstacles the local density check looks back over
    pub const LOCAL_WINDOW: usize = 12;
    /// Lower bound on obstacle size (keeps segment sampling from tunneling)
    pub const MIN_PROP_SIZE: f32 = 24.0;
    /// Upper bound on obstacle size
    pub const MAX_PROP_SIZE: f32 = 120.0;
    /// Segment sampling step for line-of-sight tests
    pub const SEGMENT_STEP: f32 = 16.0;
    /// Free-spot search: angular samples per ring
    pub const FREE_SPOT_ANGLE_STEPS: usize = 12;
    /// Free-spot search: radial step between rings
    pub const FREE_SPOT_RING_STEP: f32 = 24.0;
    /// Free-spot search: number of rings before falling back
    pub const FREE_SPOT_MAX_RINGS: usize = 24;
    /// Backfill attempts budget multiplier (attempts = target * this)
    pub const BACKFILL_ATTEMPTS_PER_PROP: usize = 20;
}

/// Player constants
pub mod player {
    pub const MAX_HEALTH: f32 = 100.0;
    /// Collision radius used as padding for obstacle tests
    pub const RADIUS: f32 = 18.0;
    /// Base movement speed (units per second)
    pub const BASE_SPEED: f32 = 220.0;
    /// Knockback velocity decay per second (fraction retained)
    pub const KNOCKBACK_RETAIN_PER_SEC: f32 = 0.02;
    /// Passive regeneration (hp/s) once out of combat
    pub const PASSIVE_REGEN: f32 = 1.5;
    /// Time since last damage before passive regen resumes (ms)
    pub const PASSIVE_REGEN_DELAY_MS: u64 = 5000;
    /// Maximum length of a display name
    pub const MAX_NAME_LEN: usize = 20;
    /// Name used when the client sends an empty one
    pub const DEFAULT_NAME: &str = "Player";
}

/// Combat constants
pub mod combat {
    /// Distance of the forward lunge on hit
    pub const LUNGE_DISTANCE: f32 = 22.0;
    /// Knockback impulse (units per second) applied to the target
    pub const KNOCKBACK_SPEED: f32 = 260.0;
    /// Damage bonus per weapon tier
    pub const WEAPON_TIER_DAMAGE: f32 = 4.0;
    /// Damage reduction per armor tier
    pub const ARMOR_TIER_REDUCTION: f32 = 3.0;
    pub const FURY_MULTIPLIER: f32 = 1.35;
    pub const TRACKER_MULTIPLIER: f32 = 1.1;
    /// Damage taken while fortified
    pub const FORTIFY_MITIGATION: f32 = 0.75;
    /// Attack cooldown multiplier while fury is active
    pub const FURY_COOLDOWN_FACTOR: f32 = 0.75;
    pub const VARIANCE_MIN: f32 = 0.9;
    pub const VARIANCE_MAX: f32 = 1.1;
    pub const DAMAGE_FLOOR: f32 = 3.0;
    pub const DAMAGE_CEILING: f32 = 60.0;
}

/// Buffs, consumables and abilities
pub mod items {
    /// Health restored by one soup
    pub const SOUP_HEAL: f32 = 35.0;
    /// Regen buff healing (hp/s)
    pub const REGEN_BUFF_RATE: f32 = 4.0;
    /// Movement multiplier while the swift buff is active
    pub const SWIFT_MULTIPLIER: f32 = 1.3;
    /// Movement multiplier while the speed ability is active
    pub const SPEED_BOOST_MULTIPLIER: f32 = 1.5;
    pub const STEALTH_DURATION_MS: u64 = 5000;
    pub const SPEED_BOOST_DURATION_MS: u64 = 4000;
    pub const ABILITY_COOLDOWN_MS: u64 = 8000;
    pub const COMPASS_COOLDOWN_MS: u64 = 1500;
    /// Relic buff duration at tier 1; each tier above adds half again
    pub const RELIC_BASE_DURATION_MS: u64 = 20_000;
    /// Shrines always grant this tier
    pub const SHRINE_TIER: u8 = 2;
    /// Damage dealt to storm/border targets while fortified
    pub const FORTIFY_HAZARD_MITIGATION: f32 = 0.5;
    /// Starting kit handed out at round start
    pub const STARTING_SOUPS: u8 = 1;
    pub const STARTING_COMPASS: u8 = 1;
}

/// Hazard constants that are not admin-tunable
pub mod hazards {
    /// Storm radius as a fraction of the current border radius
    pub const STORM_RADIUS_FRACTION: f32 = 0.25;
    pub const STORM_MIN_RADIUS: f32 = 120.0;
    pub const STORM_MAX_RADIUS: f32 = 320.0;
    /// Storm centers are picked within this fraction of the border radius
    pub const STORM_PLACEMENT_FRACTION: f32 = 0.6;
    /// Feast is announced this long before it fires
    pub const FEAST_ANNOUNCE_LEAD_MS: u64 = 10_000;
    /// Chests within this distance of the center count as "central" for the feast
    pub const FEAST_RADIUS: f32 = 600.0;
}

/// Bot director constants
pub mod ai {
    /// Base decision interval range (ms) at difficulty 1
    pub const DECISION_MIN_MS: f32 = 600.0;
    pub const DECISION_MAX_MS: f32 = 1400.0;
    /// Health fraction under which bots flee or eat
    pub const LOW_HEALTH: f32 = 35.0;
    /// Relics closer than this are worth a detour
    pub const RELIC_INTEREST_RADIUS: f32 = 450.0;
    /// Enemies closer than this are considered
    pub const SIGHT_RADIUS: f32 = 900.0;
    /// Stealthed players are only noticed inside this radius
    pub const STEALTH_SIGHT_RADIUS: f32 = 120.0;
    /// Gear-score gap (weapon+armor tiers) that counts as "clearly outmatched"
    pub const OUTMATCHED_GAP: i32 = 3;
    /// Heading drift per decision while wandering (radians)
    pub const WANDER_DRIFT: f32 = 0.6;
    /// Names handed out to filler bots
    pub const NAMES: [&str; 12] = [
        "Ash", "Birch", "Cinder", "Dusk", "Ember", "Flint", "Gale", "Haze", "Ivy", "Jade",
        "Kestrel", "Lark",
    ];
}

/// Match controller constants
pub mod matches {
    /// Delay after a match ends before returning to the lobby
    pub const END_DISPLAY_MS: u64 = 8000;
    /// Spawn invulnerability after round start
    pub const SPAWN_INVULNERABILITY_MS: u64 = 3000;
    /// Number of leaderboard rows in snapshots
    pub const LEADERBOARD_SIZE: usize = 10;
}

/// Event log constants
pub mod events {
    /// Entries kept in memory
    pub const LOG_CAPACITY: usize = 200;
    /// Entries included in a welcome snapshot
    pub const WELCOME_TAIL: usize = 10;
    /// Entries included in the admin state
    pub const ADMIN_TAIL: usize = 100;
}
