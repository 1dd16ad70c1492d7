//! Wire messages
//!
//! Clients speak JSON objects tagged by `"t"`. Snapshots are plain structs so
//! they can also be packed with bincode; the `arena` bench compares both
//! encodings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::GameConfig;
use crate::game::map::{Poi, Prop};
use crate::game::match_result::PlayerRanking;
use crate::game::performance::TickStatsReport;
use crate::game::state::{
    AbilityKind, BuffKind, ChestId, Inventory, LogEntry, MatchPhase, Millis, PlayerId, RelicId,
    ShrineId, WinReason, World,
};
use crate::game::systems::abilities::CompassReading;
use crate::util::vec2::Vec2;

/// Messages from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        #[serde(default)]
        name: String,
        /// User agent, used for the device label
        #[serde(default)]
        ua: String,
    },
    Input {
        #[serde(default)]
        mx: f32,
        #[serde(default)]
        my: f32,
        /// Facing in radians; missing keeps the current facing
        #[serde(default = "keep_facing")]
        angle: f32,
    },
    Attack,
    Ability {
        kind: AbilityKind,
    },
    Soup,
    OpenChest,
    Compass,
    Leave,

    // Admin only
    AdminConfig {
        cfg: Map<String, Value>,
    },
    AdminMapRegenerate {
        #[serde(default)]
        seed: Option<u64>,
    },
    AdminAddBot {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        difficulty: Option<u8>,
    },
    AdminRemove {
        pid: PlayerId,
    },
    AdminReset,
    AdminState,
}

fn keep_facing() -> f32 {
    f32::NAN
}

impl ClientMessage {
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            ClientMessage::AdminConfig { .. }
                | ClientMessage::AdminMapRegenerate { .. }
                | ClientMessage::AdminAddBot { .. }
                | ClientMessage::AdminRemove { .. }
                | ClientMessage::AdminReset
                | ClientMessage::AdminState
        )
    }
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome { id: PlayerId, snapshot: WorldSnapshot },
    Snapshot(WorldSnapshot),
    Compass(CompassReading),
    AdminState(AdminState),
    Kicked { reason: String },
}

/// Player as seen by every client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub position: Vec2,
    pub facing: f32,
    pub health: f32,
    pub alive: bool,
    pub spectator: bool,
    pub is_bot: bool,
    pub weapon_tier: u8,
    pub armor_tier: u8,
    pub inventory: Inventory,
    pub buffs: Vec<BuffKind>,
    pub stealthed: bool,
    pub speed_boosted: bool,
    pub invulnerable: bool,
    pub kills: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchView {
    pub phase: MatchPhase,
    pub phase_elapsed_ms: Millis,
    /// Countdown remaining, zero outside the countdown
    pub countdown_ms: Millis,
    /// Time limit remaining, zero unless running
    pub time_left_ms: Millis,
    pub border_radius: f32,
    pub alive: u32,
    pub participants: u32,
    pub winner: Option<PlayerId>,
    pub winner_name: Option<String>,
    pub reason: Option<WinReason>,
    pub feast_announced: bool,
    pub feast_triggered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChestView {
    pub id: ChestId,
    pub position: Vec2,
    pub lootable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub version: u64,
    pub seed: u64,
    pub props: Vec<Prop>,
    pub pois: Vec<Poi>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelicView {
    pub id: RelicId,
    pub kind: BuffKind,
    pub tier: u8,
    pub position: Vec2,
    pub expires_in_ms: Millis,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShrineView {
    pub id: ShrineId,
    pub kind: BuffKind,
    pub position: Vec2,
    pub radius: f32,
    pub ready_in_ms: Millis,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StormView {
    pub active: bool,
    pub center: Vec2,
    pub radius: f32,
    pub ends_in_ms: Millis,
    pub next_in_ms: Millis,
}

/// Broadcast state. The optional sections are only present when the
/// matching subsystem changed since the previous broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub now: Millis,
    pub players: Vec<PlayerView>,
    pub leaderboard: Vec<PlayerRanking>,
    #[serde(rename = "match")]
    pub match_info: MatchView,
    pub chests: Vec<ChestView>,
    pub events: Vec<LogEntry>,
    pub map: Option<MapView>,
    pub relics: Option<Vec<RelicView>>,
    pub shrines: Option<Vec<ShrineView>>,
    pub storm: Option<StormView>,
}

/// Raw per-player counters for the admin view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminPlayerView {
    pub id: PlayerId,
    pub name: String,
    pub device: String,
    pub is_bot: bool,
    pub difficulty: Option<u8>,
    pub alive: bool,
    pub spectator: bool,
    pub health: f32,
    pub kills: u32,
    pub deaths: u32,
    pub weapon_tier: u8,
    pub armor_tier: u8,
    pub inventory: Inventory,
    pub idle_ms: Millis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminState {
    pub config: GameConfig,
    pub phase: MatchPhase,
    pub players: Vec<AdminPlayerView>,
    pub connections: usize,
    pub stats: TickStatsReport,
    pub events: Vec<LogEntry>,
}

impl PlayerView {
    pub fn from_player(p: &crate::game::state::Player, now: Millis) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            position: p.position,
            facing: p.facing,
            health: p.health,
            alive: p.alive,
            spectator: p.spectator,
            is_bot: p.is_bot,
            weapon_tier: p.weapon_tier,
            armor_tier: p.armor_tier,
            inventory: p.inventory,
            buffs: p.buffs.active(now),
            stealthed: p.buffs.is_stealthed(now),
            speed_boosted: p.buffs.is_speed_boosted(now),
            invulnerable: p.is_invulnerable(now),
            kills: p.kills,
        }
    }
}

impl AdminPlayerView {
    pub fn from_player(p: &crate::game::state::Player, now: Millis) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            device: p.device.clone(),
            is_bot: p.is_bot,
            difficulty: p.bot.as_ref().map(|b| b.difficulty),
            alive: p.alive,
            spectator: p.spectator,
            health: p.health,
            kills: p.kills,
            deaths: p.deaths,
            weapon_tier: p.weapon_tier,
            armor_tier: p.armor_tier,
            inventory: p.inventory,
            idle_ms: if p.is_bot { 0 } else { now.saturating_sub(p.last_input_at) },
        }
    }
}

impl MatchView {
    pub fn from_world(world: &World) -> Self {
        let now = world.now();
        let m = &world.match_state;
        Self {
            phase: m.phase,
            phase_elapsed_ms: now.saturating_sub(m.phase_started_at),
            countdown_ms: match m.phase {
                MatchPhase::Countdown => m.countdown_ends_at.saturating_sub(now),
                _ => 0,
            },
            time_left_ms: match m.phase {
                MatchPhase::Running => m.ends_at.saturating_sub(now),
                _ => 0,
            },
            border_radius: m.border_radius,
            alive: world.active_count() as u32,
            participants: m.participants,
            winner: m.winner,
            winner_name: m.winner_name.clone(),
            reason: m.reason,
            feast_announced: m.feast_announced,
            feast_triggered: m.feast_triggered,
        }
    }
}

impl MapView {
    pub fn from_world(world: &World) -> Self {
        Self {
            version: world.versions.map,
            seed: world.map.seed,
            props: world.map.props.clone(),
            pois: world.map.pois.clone(),
        }
    }
}

pub fn relic_views(world: &World) -> Vec<RelicView> {
    let now = world.now();
    world
        .relics
        .values()
        .map(|r| RelicView {
            id: r.id,
            kind: r.kind,
            tier: r.tier,
            position: r.position,
            expires_in_ms: r.expires_at.saturating_sub(now),
        })
        .collect()
}

pub fn shrine_views(world: &World) -> Vec<ShrineView> {
    let now = world.now();
    world
        .shrines
        .iter()
        .map(|s| ShrineView {
            id: s.id,
            kind: s.kind,
            position: s.position,
            radius: s.radius,
            ready_in_ms: s.next_ready_at.saturating_sub(now),
        })
        .collect()
}

impl StormView {
    pub fn from_world(world: &World) -> Self {
        let now = world.now();
        let storm = &world.storm;
        Self {
            active: storm.active,
            center: storm.center,
            radius: storm.radius,
            ends_in_ms: if storm.active { storm.ends_at.saturating_sub(now) } else { 0 },
            next_in_ms: if storm.next_at > 0 { storm.next_at.saturating_sub(now) } else { 0 },
        }
    }
}

impl WorldSnapshot {
    /// The always-present sections; optional ones start empty
    pub fn core(world: &World, events: Vec<LogEntry>) -> Self {
        let now = world.now();
        let mut players: Vec<PlayerView> = world
            .players
            .values()
            .map(|p| PlayerView::from_player(p, now))
            .collect();
        players.sort_by(|a, b| a.id.cmp(&b.id));

        Self {
            tick: world.tick,
            now,
            players,
            leaderboard: crate::game::match_result::leaderboard(world),
            match_info: MatchView::from_world(world),
            chests: world
                .chests
                .iter()
                .map(|c| ChestView {
                    id: c.id,
                    position: c.position,
                    lootable: c.is_lootable(now),
                })
                .collect(),
            events,
            map: None,
            relics: None,
            shrines: None,
            storm: None,
        }
    }
}

impl AdminState {
    pub fn from_world(world: &World, connections: usize, stats: TickStatsReport) -> Self {
        let now = world.now();
        let mut players: Vec<AdminPlayerView> = world
            .players
            .values()
            .map(|p| AdminPlayerView::from_player(p, now))
            .collect();
        players.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        Self {
            config: world.config.clone(),
            phase: world.match_state.phase,
            players,
            connections,
            stats,
            events: world.events.tail(crate::game::constants::events::ADMIN_TAIL),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Parse one inbound text frame
pub fn decode_client(text: &str) -> Result<ClientMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

/// Serialize an outbound message for the JSON wire
pub fn encode_json(message: &ServerMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

/// Compact binary encoding (fixed-size integers)
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    bincode::serde::encode_to_vec(value, bincode::config::legacy())
        .map_err(|e| ProtocolError::Encode(e.to_string()))
}

pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(value, _)| value)
        .map_err(|e| ProtocolError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_decode_join_and_input() {
        let msg = decode_client(r#"{"t":"join","name":"Ada","ua":"Mozilla/5.0"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join {
                name: "Ada".into(),
                ua: "Mozilla/5.0".into()
            }
        );

        match decode_client(r#"{"t":"input","mx":1,"my":-0.5}"#).unwrap() {
            ClientMessage::Input { mx, my, angle } => {
                assert_eq!((mx, my), (1.0, -0.5));
                assert!(angle.is_nan());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_unit_and_ability() {
        assert_eq!(decode_client(r#"{"t":"attack"}"#).unwrap(), ClientMessage::Attack);
        assert_eq!(decode_client(r#"{"t":"open_chest"}"#).unwrap(), ClientMessage::OpenChest);
        assert_eq!(
            decode_client(r#"{"t":"ability","kind":"speed_boost"}"#).unwrap(),
            ClientMessage::Ability {
                kind: AbilityKind::Speed
            }
        );
    }

    #[test]
    fn test_decode_admin() {
        let msg = decode_client(r#"{"t":"admin_config","cfg":{"border_dps":9}}"#).unwrap();
        assert!(msg.is_admin());
        let msg = decode_client(r#"{"t":"admin_map_regenerate"}"#).unwrap();
        assert_eq!(msg, ClientMessage::AdminMapRegenerate { seed: None });
        assert!(!ClientMessage::Soup.is_admin());
    }

    #[test]
    fn test_malformed_is_error() {
        assert!(matches!(decode_client("not json"), Err(ProtocolError::Json(_))));
        assert!(decode_client(r#"{"t":"fly"}"#).is_err());
        assert!(decode_client(r#"{"t":"ability","kind":"teleport"}"#).is_err());
    }

    #[test]
    fn test_kicked_json_shape() {
        let json = encode_json(&ServerMessage::Kicked {
            reason: "idle".into(),
        })
        .unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["t"], "kicked");
        assert_eq!(value["reason"], "idle");
    }

    #[test]
    fn test_snapshot_json_and_binary() {
        let mut world = World::with_seed(GameConfig::default(), 2);
        let p = crate::game::state::Player::new(Uuid::new_v4(), "A".into(), String::new(), 1);
        world.add_player(p);
        let mut snapshot = WorldSnapshot::core(&world, world.events.tail(5));
        snapshot.map = Some(MapView::from_world(&world));

        let json = encode_json(&ServerMessage::Snapshot(snapshot.clone())).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["t"], "snapshot");
        assert_eq!(value["match"]["phase"], "lobby");
        assert!(value["relics"].is_null());

        let bytes = encode(&snapshot).unwrap();
        let back: WorldSnapshot = decode(&bytes).unwrap();
        assert_eq!(back, snapshot);
    }
}
