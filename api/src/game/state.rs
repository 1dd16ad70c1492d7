//! Game state definitions and structures
//!
//! Contains all entities (players, chests, relics, shrines), the hazard and
//! match singletons, and the [`World`] aggregate that owns them.

use std::collections::{BTreeMap, VecDeque};

use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::game::constants::{events, items, player};
use crate::game::map::{self, ArenaMap};
use crate::game::systems::{loot, shrines};
use crate::util::vec2::Vec2;

/// Unique player identifier
pub type PlayerId = Uuid;

/// Relic identifier, monotonically increasing per world
pub type RelicId = u64;

/// Chest identifier (index into the fixed chest layout)
pub type ChestId = u32;

/// Shrine identifier
pub type ShrineId = u32;

/// Simulation time in milliseconds. Zero means "never".
pub type Millis = u64;

/// The five buff archetypes carried by relics and shrines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuffKind {
    /// Damage multiplier, shorter attack cooldown, +1 weapon tier
    Fury,
    /// Damage mitigation, +1 armor tier
    Fortify,
    /// Movement speed
    Swift,
    /// Free compass use, small damage bonus
    Tracker,
    /// Healing over time
    Regen,
}

impl BuffKind {
    pub const ALL: [BuffKind; 5] = [
        BuffKind::Fury,
        BuffKind::Fortify,
        BuffKind::Swift,
        BuffKind::Tracker,
        BuffKind::Regen,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            BuffKind::Fury => "fury",
            BuffKind::Fortify => "fortify",
            BuffKind::Swift => "swift",
            BuffKind::Tracker => "tracker",
            BuffKind::Regen => "regen",
        }
    }
}

/// Player-activated abilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityKind {
    Stealth,
    #[serde(alias = "speed_boost")]
    Speed,
}

/// Consumable counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub soups: u8,
    pub compass: u8,
    pub stealth: u8,
    pub speed: u8,
}

impl Inventory {
    pub fn starter() -> Self {
        Self {
            soups: items::STARTING_SOUPS,
            compass: items::STARTING_COMPASS,
            stealth: 0,
            speed: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Buff and ability expiry timestamps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buffs {
    pub fury_until: Millis,
    pub fortify_until: Millis,
    pub swift_until: Millis,
    pub tracker_until: Millis,
    pub regen_until: Millis,
    pub stealth_until: Millis,
    pub speed_until: Millis,
}

impl Buffs {
    fn slot_mut(&mut self, kind: BuffKind) -> &mut Millis {
        match kind {
            BuffKind::Fury => &mut self.fury_until,
            BuffKind::Fortify => &mut self.fortify_until,
            BuffKind::Swift => &mut self.swift_until,
            BuffKind::Tracker => &mut self.tracker_until,
            BuffKind::Regen => &mut self.regen_until,
        }
    }

    pub fn until(&self, kind: BuffKind) -> Millis {
        match kind {
            BuffKind::Fury => self.fury_until,
            BuffKind::Fortify => self.fortify_until,
            BuffKind::Swift => self.swift_until,
            BuffKind::Tracker => self.tracker_until,
            BuffKind::Regen => self.regen_until,
        }
    }

    #[inline]
    pub fn has(&self, kind: BuffKind, now: Millis) -> bool {
        now < self.until(kind)
    }

    /// Set or extend a buff; never shortens an existing one
    pub fn extend(&mut self, kind: BuffKind, until: Millis) {
        let slot = self.slot_mut(kind);
        *slot = (*slot).max(until);
    }

    pub fn is_stealthed(&self, now: Millis) -> bool {
        now < self.stealth_until
    }

    pub fn is_speed_boosted(&self, now: Millis) -> bool {
        now < self.speed_until
    }

    /// Buffs currently running, in a stable order
    pub fn active(&self, now: Millis) -> Vec<BuffKind> {
        BuffKind::ALL
            .iter()
            .copied()
            .filter(|kind| self.has(*kind, now))
            .collect()
    }
}

/// Cooldown "ready at" timestamps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cooldowns {
    pub attack_ready_at: Millis,
    pub ability_ready_at: Millis,
    pub compass_ready_at: Millis,
}

/// What killed a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeathCause {
    Player { killer: PlayerId },
    Border,
    Storm,
}

/// Current goal of a bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotGoal {
    Wander,
    Relic { id: RelicId },
    Chest { id: ChestId },
    Chase { target: PlayerId },
    Flee { threat: PlayerId },
}

/// Bot-control block for AI-owned players
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotBrain {
    /// 1 (easy) to 3 (hard)
    pub difficulty: u8,
    pub goal: BotGoal,
    pub next_decision_at: Millis,
    /// Wander heading in radians
    pub heading: f32,
    /// +1 or -1, flips on each decision while strafing
    pub strafe_dir: f32,
}

impl BotBrain {
    pub fn new(difficulty: u8, heading: f32) -> Self {
        Self {
            difficulty: difficulty.clamp(1, 3),
            goal: BotGoal::Wander,
            next_decision_at: 0,
            heading,
            strafe_dir: 1.0,
        }
    }
}

/// Player state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Device label derived from the user agent ("Bot" for bots)
    pub device: String,
    pub is_bot: bool,

    pub position: Vec2,
    /// Facing angle in radians
    pub facing: f32,
    /// Latest movement intent, each component in [-1, 1]
    pub move_intent: Vec2,
    /// Knockback velocity, decays every tick
    pub knockback: Vec2,
    /// Attack requested since the last combat step
    pub attack_queued: bool,

    pub health: f32,
    pub alive: bool,
    pub spectator: bool,

    pub inventory: Inventory,
    pub weapon_tier: u8,
    pub armor_tier: u8,
    pub buffs: Buffs,
    pub cooldowns: Cooldowns,

    pub invulnerable_until: Millis,
    pub last_damaged_at: Millis,
    pub last_input_at: Millis,

    pub kills: u32,
    pub deaths: u32,
    pub death_cause: Option<DeathCause>,

    pub bot: Option<BotBrain>,
}

impl Player {
    pub fn new(id: PlayerId, name: String, device: String, now: Millis) -> Self {
        Self {
            id,
            name,
            device,
            is_bot: false,
            position: Vec2::ZERO,
            facing: 0.0,
            move_intent: Vec2::ZERO,
            knockback: Vec2::ZERO,
            attack_queued: false,
            health: player::MAX_HEALTH,
            alive: true,
            spectator: false,
            inventory: Inventory::starter(),
            weapon_tier: 0,
            armor_tier: 0,
            buffs: Buffs::default(),
            cooldowns: Cooldowns::default(),
            invulnerable_until: 0,
            last_damaged_at: 0,
            last_input_at: now,
            kills: 0,
            deaths: 0,
            death_cause: None,
            bot: None,
        }
    }

    pub fn new_bot(id: PlayerId, name: String, brain: BotBrain, now: Millis) -> Self {
        Self {
            is_bot: true,
            bot: Some(brain),
            ..Self::new(id, name, "Bot".to_string(), now)
        }
    }

    /// Alive and taking part in the round
    #[inline]
    pub fn is_active(&self) -> bool {
        self.alive && !self.spectator
    }

    #[inline]
    pub fn is_invulnerable(&self, now: Millis) -> bool {
        now < self.invulnerable_until
    }

    /// Combined weapon and armor tiers, used by bots to size up opponents
    pub fn gear_score(&self) -> i32 {
        self.weapon_tier as i32 + self.armor_tier as i32
    }

    /// Turn into a spectator: dead, zero health, empty inventory
    pub fn make_spectator(&mut self) {
        self.alive = false;
        self.spectator = true;
        self.health = 0.0;
        self.inventory = Inventory::default();
        self.weapon_tier = 0;
        self.armor_tier = 0;
        self.buffs = Buffs::default();
        self.move_intent = Vec2::ZERO;
        self.knockback = Vec2::ZERO;
        self.attack_queued = false;
    }

    /// Fresh kit at `position`, used at round start and on lobby return
    pub fn respawn(&mut self, position: Vec2, now: Millis, invulnerable_for: Millis) {
        self.position = position;
        self.facing = (-position).angle();
        self.move_intent = Vec2::ZERO;
        self.knockback = Vec2::ZERO;
        self.attack_queued = false;
        self.health = player::MAX_HEALTH;
        self.alive = true;
        self.spectator = false;
        self.inventory = Inventory::starter();
        self.weapon_tier = 0;
        self.armor_tier = 0;
        self.buffs = Buffs::default();
        self.cooldowns = Cooldowns::default();
        self.invulnerable_until = if invulnerable_for > 0 { now + invulnerable_for } else { 0 };
        self.last_damaged_at = 0;
        self.death_cause = None;
    }
}

/// Loot chest at a fixed position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chest {
    pub id: ChestId,
    pub position: Vec2,
    pub opened_at: Millis,
    pub next_refill_at: Millis,
    /// Tier rolled on the most recent open
    pub last_tier: u8,
}

impl Chest {
    pub fn new(id: ChestId, position: Vec2) -> Self {
        Self {
            id,
            position,
            opened_at: 0,
            next_refill_at: 0,
            last_tier: 0,
        }
    }

    #[inline]
    pub fn is_lootable(&self, now: Millis) -> bool {
        self.opened_at == 0 || now >= self.next_refill_at
    }
}

/// Timed pickup granting a buff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relic {
    pub id: RelicId,
    pub kind: BuffKind,
    pub position: Vec2,
    /// 1 to 3
    pub tier: u8,
    pub spawned_at: Millis,
    pub expires_at: Millis,
}

/// Capture point granting a tier-2 buff on cooldown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shrine {
    pub id: ShrineId,
    pub kind: BuffKind,
    pub position: Vec2,
    pub radius: f32,
    pub next_ready_at: Millis,
    pub activations: u32,
}

impl Shrine {
    #[inline]
    pub fn is_ready(&self, now: Millis) -> bool {
        now >= self.next_ready_at
    }
}

/// Roaming damage zone. `active` implies `next_at == 0` and `ends_at > started_at`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StormState {
    pub active: bool,
    pub center: Vec2,
    pub radius: f32,
    pub started_at: Millis,
    pub ends_at: Millis,
    /// Next activation; zero while active or when unscheduled
    pub next_at: Millis,
}

/// Match phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPhase {
    /// Waiting for the minimum player count
    #[default]
    Lobby,
    /// Counting down to round start, cancelable
    Countdown,
    /// Full simulation running
    Running,
    /// Frozen, showing the result
    Ended,
}

/// Why a match ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WinReason {
    LastAlive,
    NoSurvivors,
    TimeLimit,
}

impl WinReason {
    pub fn label(&self) -> &'static str {
        match self {
            WinReason::LastAlive => "last-alive",
            WinReason::NoSurvivors => "no-survivors",
            WinReason::TimeLimit => "time-limit",
        }
    }
}

/// Match state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchState {
    pub phase: MatchPhase,
    pub phase_started_at: Millis,
    pub countdown_ends_at: Millis,
    pub started_at: Millis,
    /// Time limit deadline while running
    pub ends_at: Millis,
    pub ended_at: Millis,
    /// Players placed at round start
    pub participants: u32,
    pub winner: Option<PlayerId>,
    pub winner_name: Option<String>,
    pub reason: Option<WinReason>,
    pub border_radius: f32,
    pub feast_at: Millis,
    pub feast_announced: bool,
    pub feast_triggered: bool,
}

/// Activity log entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Join,
    Leave,
    Death,
    Loot,
    Ability,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub seq: u64,
    pub at: Millis,
    pub kind: EventKind,
    pub name: String,
    pub device: String,
    pub detail: String,
}

/// Bounded activity log with monotonic sequence numbers
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_seq: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(events::LOG_CAPACITY)
    }
}

impl EventLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            next_seq: 1,
        }
    }

    pub fn push(
        &mut self,
        at: Millis,
        kind: EventKind,
        name: impl Into<String>,
        device: impl Into<String>,
        detail: impl Into<String>,
    ) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(LogEntry {
            seq,
            at,
            kind,
            name: name.into(),
            device: device.into(),
            detail: detail.into(),
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        seq
    }

    pub fn system(&mut self, at: Millis, detail: impl Into<String>) -> u64 {
        self.push(at, EventKind::System, "", "", detail)
    }

    /// Entries with a sequence number greater than `seq`
    pub fn since(&self, seq: u64) -> Vec<LogEntry> {
        self.entries.iter().filter(|e| e.seq > seq).cloned().collect()
    }

    /// Last `n` entries, oldest first
    pub fn tail(&self, n: usize) -> Vec<LogEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Sequence number of the newest entry (0 if none were ever pushed)
    pub fn last_seq(&self) -> u64 {
        self.next_seq - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-subsystem version counters that gate snapshot sections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versions {
    pub map: u64,
    pub relics: u64,
    pub shrines: u64,
    pub storm: u64,
}

/// The single owned aggregate every subsystem operates on
pub struct World {
    pub config: GameConfig,
    /// Simulation clock in ms, starts at 1 so zero can mean "never"
    pub clock: Millis,
    pub tick: u64,
    pub players: HashMap<PlayerId, Player>,
    pub map: ArenaMap,
    pub chests: Vec<Chest>,
    pub relics: BTreeMap<RelicId, Relic>,
    pub next_relic_id: RelicId,
    pub next_relic_spawn_at: Millis,
    pub shrines: Vec<Shrine>,
    pub storm: StormState,
    pub match_state: MatchState,
    pub events: EventLog,
    pub versions: Versions,
    /// Gameplay randomness (loot, bots, hazards); the map has its own LCG
    pub rng: StdRng,
    /// Counter used to hand out bot names
    pub bots_created: u32,
}

impl World {
    pub fn new(config: GameConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic gameplay randomness, for tests and replays
    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: GameConfig, rng: StdRng) -> Self {
        let map = map::generate(&map::MapParams::from_config(&config));
        let mut world = Self {
            match_state: MatchState {
                border_radius: config.border_start_radius,
                phase_started_at: 1,
                ..MatchState::default()
            },
            config,
            clock: 1,
            tick: 0,
            players: HashMap::new(),
            map,
            chests: loot::build_chests(),
            relics: BTreeMap::new(),
            next_relic_id: 1,
            next_relic_spawn_at: 0,
            shrines: Vec::new(),
            storm: StormState::default(),
            events: EventLog::default(),
            versions: Versions {
                map: 1,
                ..Versions::default()
            },
            rng,
            bots_created: 0,
        };
        shrines::rebuild(&mut world);
        world
    }

    #[inline]
    pub fn now(&self) -> Millis {
        self.clock
    }

    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn get_player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// Player ids in a stable order, so iteration does not depend on hashing
    pub fn sorted_player_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.players.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Alive, non-spectating players
    pub fn active_players(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| p.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active_players().count()
    }

    pub fn human_count(&self) -> usize {
        self.players.values().filter(|p| !p.is_bot).count()
    }

    pub fn bot_count(&self) -> usize {
        self.players.values().filter(|p| p.is_bot).count()
    }

    /// Add a player that is already fully set up
    pub fn add_player(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    /// Remove a player, logging the departure
    pub fn remove_player(&mut self, id: PlayerId, reason: &str) -> Option<Player> {
        let removed = self.players.remove(&id)?;
        let now = self.clock;
        self.events
            .push(now, EventKind::Leave, removed.name.clone(), removed.device.clone(), reason);
        Some(removed)
    }

    /// Bump a relic id
    pub fn alloc_relic_id(&mut self) -> RelicId {
        let id = self.next_relic_id;
        self.next_relic_id += 1;
        id
    }

    pub fn bump_relics(&mut self) {
        self.versions.relics += 1;
    }

    pub fn bump_shrines(&mut self) {
        self.versions.shrines += 1;
    }

    pub fn bump_storm(&mut self) {
        self.versions.storm += 1;
    }

    pub fn bump_map(&mut self) {
        self.versions.map += 1;
    }

    /// Whether gameplay intents (loot, abilities, combat) are accepted
    pub fn is_running(&self) -> bool {
        self.match_state.phase == MatchPhase::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_new() {
        let p = Player::new(Uuid::new_v4(), "Alice".into(), "Mac · Safari".into(), 10);
        assert!(p.is_active());
        assert_eq!(p.health, player::MAX_HEALTH);
        assert_eq!(p.inventory, Inventory::starter());
        assert_eq!(p.last_input_at, 10);
        assert!(!p.is_bot);
    }

    #[test]
    fn test_spectator_has_no_inventory() {
        let mut p = Player::new(Uuid::new_v4(), "Bob".into(), String::new(), 1);
        p.weapon_tier = 2;
        p.make_spectator();
        assert!(!p.alive);
        assert!(p.spectator);
        assert_eq!(p.health, 0.0);
        assert!(p.inventory.is_empty());
    }

    #[test]
    fn test_buff_extend_never_shortens() {
        let mut buffs = Buffs::default();
        buffs.extend(BuffKind::Fury, 5000);
        buffs.extend(BuffKind::Fury, 3000);
        assert_eq!(buffs.fury_until, 5000);
        buffs.extend(BuffKind::Fury, 9000);
        assert_eq!(buffs.fury_until, 9000);
        assert!(buffs.has(BuffKind::Fury, 8999));
        assert!(!buffs.has(BuffKind::Fury, 9000));
        assert_eq!(buffs.active(100), vec![BuffKind::Fury]);
    }

    #[test]
    fn test_chest_lootable() {
        let mut chest = Chest::new(0, Vec2::ZERO);
        assert!(chest.is_lootable(5));
        chest.opened_at = 100;
        chest.next_refill_at = 1100;
        assert!(!chest.is_lootable(500));
        assert!(chest.is_lootable(1100));
    }

    #[test]
    fn test_match_phase_default() {
        assert_eq!(MatchPhase::default(), MatchPhase::Lobby);
    }

    #[test]
    fn test_win_reason_serializes_kebab() {
        let json = serde_json::to_string(&WinReason::LastAlive).unwrap();
        assert_eq!(json, "\"last-alive\"");
        assert_eq!(WinReason::NoSurvivors.label(), "no-survivors");
    }

    #[test]
    fn test_event_log_trims_but_keeps_sequence() {
        let mut log = EventLog::with_capacity(3);
        for i in 0..5 {
            log.system(i, format!("event {i}"));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.last_seq(), 5);
        let newer = log.since(3);
        assert_eq!(newer.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![4, 5]);
        // Entries trimmed away are simply gone, not re-sent
        assert_eq!(log.since(0).len(), 3);
        assert_eq!(log.tail(2).first().map(|e| e.seq), Some(4));
    }

    #[test]
    fn test_world_starts_in_lobby_with_map() {
        let world = World::with_seed(GameConfig::default(), 7);
        assert_eq!(world.match_state.phase, MatchPhase::Lobby);
        assert_eq!(world.clock, 1);
        assert!(!world.map.props.is_empty());
        assert!(!world.chests.is_empty());
        assert_eq!(world.shrines.len(), world.config.shrine_count as usize);
    }
}
