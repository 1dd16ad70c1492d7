//! Survival Games Server Library
//!
//! Authoritative match engine for the Survival Games arena mode: procedural
//! arena, loot, hazards, melee combat, bots and the match state machine,
//! driven by a fixed-cadence tick. Transport is left to the embedding
//! process; [`net::game_session::GameSession`] takes connection ids and text
//! frames and returns messages to deliver.

pub mod config;
pub mod game;
pub mod net;
pub mod util;
