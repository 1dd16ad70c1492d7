//! Game session - binds connections to players and runs the game loop
//!
//! The transport layer owns sockets and authentication. It hands this module
//! a connection id, an admin flag and raw text frames, and gets back a list
//! of messages to deliver.

use hashbrown::HashMap;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::game::constants::player;
use crate::game::game_loop::{Advance, GameLoop};
use crate::game::state::{MatchPhase, Player, PlayerId, World};
use crate::game::systems::{abilities, bots, loot, movement, phase, shrines};
use crate::net::delta::SnapshotAssembler;
use crate::net::protocol::{decode_client, encode_json, AdminState, ClientMessage, ServerMessage};

/// Opaque connection handle assigned by the transport
pub type ConnectionId = u64;

/// A message to deliver
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    To(ConnectionId, ServerMessage),
    Broadcast(ServerMessage),
}

#[derive(Debug, Clone, Copy)]
struct Connection {
    player: Option<PlayerId>,
    is_admin: bool,
}

pub struct GameSession {
    game: GameLoop,
    connections: HashMap<ConnectionId, Connection>,
    assembler: SnapshotAssembler,
}

impl GameSession {
    pub fn new(config: &ServerConfig) -> Self {
        let world = World::new(config.game_config());
        info!(
            tick_rate = config.tick_rate,
            broadcast_rate = config.broadcast_rate,
            seed = world.config.map_seed,
            "Game session created"
        );
        Self::with_world(world, config.tick_rate, config.broadcast_every())
    }

    pub fn with_world(world: World, tick_rate: u32, broadcast_every: u64) -> Self {
        Self {
            game: GameLoop::new(world, tick_rate, broadcast_every),
            connections: HashMap::new(),
            assembler: SnapshotAssembler::new(),
        }
    }

    pub fn world(&self) -> &World {
        &self.game.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.game.world
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Player bound to `conn`, if any
    pub fn player_of(&self, conn: ConnectionId) -> Option<PlayerId> {
        self.connections.get(&conn).and_then(|c| c.player)
    }

    pub fn connect(&mut self, conn: ConnectionId, is_admin: bool) {
        self.connections.insert(
            conn,
            Connection {
                player: None,
                is_admin,
            },
        );
        debug!(conn, is_admin, "Connection attached");
    }

    /// Drop the connection and its player
    pub fn disconnect(&mut self, conn: ConnectionId) {
        if let Some(c) = self.connections.remove(&conn) {
            if let Some(pid) = c.player {
                self.game.world.remove_player(pid, "left");
                info!(%pid, "Player disconnected");
            }
        }
    }

    /// Parse and dispatch a text frame. Malformed frames are dropped.
    pub fn handle_text(&mut self, conn: ConnectionId, text: &str) -> Vec<Outbound> {
        match decode_client(text) {
            Ok(msg) => self.handle(conn, msg),
            Err(e) => {
                debug!(conn, error = %e, "Dropped inbound message");
                Vec::new()
            }
        }
    }

    pub fn handle(&mut self, conn: ConnectionId, msg: ClientMessage) -> Vec<Outbound> {
        let Some(connection) = self.connections.get(&conn).copied() else {
            debug!(conn, "Message from unknown connection");
            return Vec::new();
        };
        if msg.is_admin() && !connection.is_admin {
            debug!(conn, "Ignored admin message from non-admin connection");
            return Vec::new();
        }

        let mut out = Vec::new();
        let world = &mut self.game.world;
        let now = world.now();
        let running = world.is_running();
        let frozen = world.match_state.phase == MatchPhase::Ended;

        // Every intent from a bound player counts as activity
        let pid = connection.player;
        if let Some(p) = bound_player(world, pid) {
            p.last_input_at = now;
        }

        match msg {
            ClientMessage::Join { name, ua } => {
                if let Some(old) = pid {
                    world.remove_player(old, "rejoined");
                }
                let result = phase::join_human(world, sanitize_name(&name), parse_device(&ua));
                if let Some(replaced) = result.replaced {
                    out.extend(self.unbind_player(replaced, "replaced by a new session"));
                }
                if let Some(c) = self.connections.get_mut(&conn) {
                    c.player = Some(result.id);
                }
                let snapshot = self.assembler.full(&self.game.world);
                out.push(Outbound::To(
                    conn,
                    ServerMessage::Welcome {
                        id: result.id,
                        snapshot,
                    },
                ));
            }
            ClientMessage::Input { mx, my, angle } => {
                if let (false, Some(p)) = (frozen, bound_player(world, pid)) {
                    movement::set_intent(p, mx, my, angle, now);
                }
            }
            ClientMessage::Attack => {
                if let Some(p) = bound_player(world, pid) {
                    if running && p.is_active() {
                        p.attack_queued = true;
                    }
                }
            }
            ClientMessage::Ability { kind } => {
                if let (true, Some(pid)) = (running, pid) {
                    abilities::try_ability(world, pid, kind);
                }
            }
            ClientMessage::Soup => {
                if let (true, Some(pid)) = (running, pid) {
                    abilities::try_soup(world, pid);
                }
            }
            ClientMessage::OpenChest => {
                if let (true, Some(pid)) = (running, pid) {
                    loot::try_open(world, pid);
                }
            }
            ClientMessage::Compass => {
                if let (true, Some(pid)) = (running, pid) {
                    if let Some(reading) = abilities::try_compass(world, pid) {
                        out.push(Outbound::To(conn, ServerMessage::Compass(reading)));
                    }
                }
            }
            ClientMessage::Leave => {
                if let Some(pid) = pid {
                    world.remove_player(pid, "left");
                    if let Some(c) = self.connections.get_mut(&conn) {
                        c.player = None;
                    }
                }
            }
            ClientMessage::AdminConfig { cfg } => {
                let change = world.config.apply_patch(&cfg);
                if change.map {
                    phase::regenerate_map(world, None);
                } else if change.shrines {
                    shrines::rebuild(world);
                }
                if change.any {
                    world.events.system(now, "Settings updated");
                    info!(fields = cfg.len(), "Admin config applied");
                }
                out.push(self.admin_state(conn));
            }
            ClientMessage::AdminMapRegenerate { seed } => {
                phase::regenerate_map(world, seed);
                out.push(self.admin_state(conn));
            }
            ClientMessage::AdminAddBot { name, difficulty } => {
                let name = name.map(|n| sanitize_name(&n));
                let id = bots::add_bot(world, name, difficulty.map(|d| d.clamp(1, 3)));
                info!(%id, "Admin added bot");
                out.push(self.admin_state(conn));
            }
            ClientMessage::AdminRemove { pid: target } => {
                if world.remove_player(target, "removed by admin").is_some() {
                    info!(%target, "Admin removed player");
                    out.extend(self.unbind_player(target, "removed by admin"));
                }
                out.push(self.admin_state(conn));
            }
            ClientMessage::AdminReset => {
                phase::reset_to_lobby(world);
                info!("Admin forced reset");
                out.push(self.admin_state(conn));
            }
            ClientMessage::AdminState => {
                out.push(self.admin_state(conn));
            }
        }
        out
    }

    /// Advance the loop; returns a snapshot broadcast when one is due
    pub fn advance(&mut self, now_ms: u64) -> Vec<Outbound> {
        let Advance::Ticked { broadcast, report } = self.game.advance(now_ms) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for pid in report.pruned {
            out.extend(self.unbind_player(pid, "idle"));
        }

        if broadcast {
            let snapshot = self.assembler.assemble(&self.game.world);
            let message = ServerMessage::Snapshot(snapshot);
            if let Ok(json) = encode_json(&message) {
                self.game.stats.record_payload(json.len());
            }
            out.push(Outbound::Broadcast(message));
        }
        out
    }

    fn admin_state(&self, conn: ConnectionId) -> Outbound {
        Outbound::To(
            conn,
            ServerMessage::AdminState(AdminState::from_world(
                &self.game.world,
                self.connections.len(),
                self.game.stats.report(),
            )),
        )
    }

    /// Detach a player that left the world from whichever connection held it
    fn unbind_player(&mut self, pid: PlayerId, reason: &str) -> Option<Outbound> {
        let (conn, c) = self
            .connections
            .iter_mut()
            .find(|(_, c)| c.player == Some(pid))?;
        c.player = None;
        Some(Outbound::To(
            *conn,
            ServerMessage::Kicked {
                reason: reason.to_string(),
            },
        ))
    }
}

fn bound_player(world: &mut World, pid: Option<PlayerId>) -> Option<&mut Player> {
    world.get_player_mut(pid?)
}

/// Trim, cap at the maximum length, fall back to the default name
pub fn sanitize_name(raw: &str) -> String {
    let name: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(player::MAX_NAME_LEN)
        .collect();
    let name = name.trim().to_string();
    if name.is_empty() {
        player::DEFAULT_NAME.to_string()
    } else {
        name
    }
}

/// Short "platform · browser" label from a user agent
pub fn parse_device(ua: &str) -> String {
    if ua.is_empty() || ua == "Unknown" {
        return "Unknown".to_string();
    }

    let platform = if ua.contains("iPad") {
        "iPad"
    } else if ua.contains("iPhone") {
        "iPhone"
    } else if ua.contains("Android") {
        if ua.contains("Mobile") {
            "Android Phone"
        } else {
            "Android Tablet"
        }
    } else if ua.contains("Macintosh") || ua.contains("Mac OS") {
        "Mac"
    } else if ua.contains("Windows") {
        "Windows"
    } else if ua.contains("Linux") {
        "Linux"
    } else {
        "Other"
    };

    // Edge claims Chrome, Chrome claims Safari
    let chrome = ua.contains("Chrome") || ua.contains("CriOS");
    let edge = ua.contains("Edg");
    let browser = if chrome && !edge {
        Some("Chrome")
    } else if ua.contains("Safari") && !ua.contains("Chrome") {
        Some("Safari")
    } else if ua.contains("Firefox") || ua.contains("FxiOS") {
        Some("Firefox")
    } else if edge {
        Some("Edge")
    } else {
        None
    };

    match browser {
        Some(browser) => format!("{platform} · {browser}"),
        None => platform.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::util::vec2::Vec2;

    fn create_test_session() -> GameSession {
        let config = GameConfig {
            bot_fill: 0,
            ..GameConfig::default()
        };
        GameSession::with_world(World::with_seed(config, 17), 60, 3)
    }

    fn join(session: &mut GameSession, conn: ConnectionId, name: &str) -> PlayerId {
        session.connect(conn, false);
        let out = session.handle_text(conn, &format!(r#"{{"t":"join","name":"{name}","ua":""}}"#));
        match out.last() {
            Some(Outbound::To(c, ServerMessage::Welcome { id, snapshot })) => {
                assert_eq!(*c, conn);
                assert!(snapshot.map.is_some());
                *id
            }
            other => panic!("expected welcome, got {other:?}"),
        }
    }

    #[test]
    fn test_join_binds_connection() {
        let mut session = create_test_session();
        let id = join(&mut session, 1, "  Ada  ");
        assert_eq!(session.player_of(1), Some(id));
        assert_eq!(session.world().get_player(id).unwrap().name, "Ada");
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let mut session = create_test_session();
        session.connect(1, false);
        assert!(session.handle_text(1, "{").is_empty());
        assert!(session.handle_text(1, r#"{"t":"warp"}"#).is_empty());
        assert!(session.world().players.is_empty());
    }

    #[test]
    fn test_admin_gating() {
        let mut session = create_test_session();
        session.connect(1, false);
        session.connect(2, true);

        assert!(session.handle_text(1, r#"{"t":"admin_add_bot"}"#).is_empty());
        assert_eq!(session.world().bot_count(), 0);

        let out = session.handle_text(2, r#"{"t":"admin_add_bot","difficulty":3}"#);
        assert!(matches!(out.last(), Some(Outbound::To(2, ServerMessage::AdminState(_)))));
        assert_eq!(session.world().bot_count(), 1);
    }

    #[test]
    fn test_admin_config_patch() {
        let mut session = create_test_session();
        session.connect(9, true);
        let map_version = session.world().versions.map;

        session.handle_text(9, r#"{"t":"admin_config","cfg":{"border_dps":9,"bogus":1}}"#);
        assert_eq!(session.world().config.border_dps, 9.0);
        assert_eq!(session.world().versions.map, map_version);

        session.handle_text(9, r#"{"t":"admin_config","cfg":{"obstacle_count":50}}"#);
        assert_eq!(session.world().versions.map, map_version + 1);
    }

    #[test]
    fn test_same_name_kicks_old_connection() {
        let mut session = create_test_session();
        let first = join(&mut session, 1, "Dup");
        session.connect(2, false);
        let out = session.handle_text(2, r#"{"t":"join","name":"Dup"}"#);

        assert!(out.iter().any(|o| matches!(o, Outbound::To(1, ServerMessage::Kicked { .. }))));
        assert_eq!(session.player_of(1), None);
        assert!(session.world().get_player(first).is_none());
    }

    #[test]
    fn test_admin_remove_kicks() {
        let mut session = create_test_session();
        let victim = join(&mut session, 1, "Victim");
        session.connect(2, true);
        let out = session.handle(2, ClientMessage::AdminRemove { pid: victim });
        assert!(out.iter().any(|o| matches!(o, Outbound::To(1, ServerMessage::Kicked { .. }))));
        assert!(session.world().players.is_empty());
    }

    #[test]
    fn test_gameplay_intents_need_running_round() {
        let mut session = create_test_session();
        let id = join(&mut session, 1, "A");
        session.handle_text(1, r#"{"t":"attack"}"#);
        assert!(!session.world().get_player(id).unwrap().attack_queued);

        session.world_mut().match_state.phase = MatchPhase::Running;
        session.handle_text(1, r#"{"t":"attack"}"#);
        assert!(session.world().get_player(id).unwrap().attack_queued);
    }

    #[test]
    fn test_input_ignored_after_round_ends() {
        let mut session = create_test_session();
        let id = join(&mut session, 1, "A");
        session.world_mut().match_state.phase = MatchPhase::Ended;
        session.handle_text(1, r#"{"t":"input","mx":1,"my":0}"#);
        assert_eq!(session.world().get_player(id).unwrap().move_intent, Vec2::ZERO);

        session.world_mut().match_state.phase = MatchPhase::Lobby;
        session.handle_text(1, r#"{"t":"input","mx":1,"my":0}"#);
        assert!(session.world().get_player(id).unwrap().move_intent.x > 0.0);
    }

    #[test]
    fn test_disconnect_removes_player() {
        let mut session = create_test_session();
        join(&mut session, 1, "A");
        session.disconnect(1);
        assert!(session.world().players.is_empty());
        assert_eq!(session.connection_count(), 0);
    }

    #[test]
    fn test_broadcast_cadence_and_payload() {
        let mut session = create_test_session();
        let mut broadcasts = 0;
        for i in 0..9u64 {
            let out = session.advance(1_000 + i * 20);
            broadcasts += out.iter().filter(|o| matches!(o, Outbound::Broadcast(_))).count();
        }
        assert_eq!(broadcasts, 3);
        assert!(session.game.stats.report().payload_bytes > 0);
    }

    #[test]
    fn test_idle_player_is_kicked() {
        let mut session = create_test_session();
        join(&mut session, 1, "Idle");
        let timeout = session.world().config.idle_timeout_ms();
        session.world_mut().clock += timeout + 1;
        let out = session.advance(5_000);
        assert!(out.iter().any(|o| matches!(o, Outbound::To(1, ServerMessage::Kicked { .. }))));
        assert_eq!(session.player_of(1), None);
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("   "), "Player");
        assert_eq!(sanitize_name(" Bob "), "Bob");
        assert_eq!(sanitize_name("abcdefghijklmnopqrstuvwxyz").chars().count(), player::MAX_NAME_LEN);
    }

    #[test]
    fn test_parse_device() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
        assert_eq!(parse_device(iphone), "iPhone · Safari");
        let windows = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36 Edg/120.0";
        assert_eq!(parse_device(windows), "Windows · Edge");
        let linux = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
        assert_eq!(parse_device(linux), "Linux · Firefox");
        let android = "Mozilla/5.0 (Linux; Android 14) AppleWebKit/537.36 Chrome/120.0 Mobile Safari/537.36";
        assert_eq!(parse_device(android), "Android Phone · Chrome");
        let tablet = "Mozilla/5.0 (Linux; Android 14; SM-X710) AppleWebKit/537.36 Chrome/120.0 Safari/537.36";
        assert_eq!(parse_device(tablet), "Android Tablet · Chrome");
        assert_eq!(parse_device("curl/8.4.0"), "Other");
        assert_eq!(parse_device(""), "Unknown");
        assert_eq!(parse_device("Unknown"), "Unknown");
    }
}
