pub mod delta;
pub mod game_session;
pub mod protocol;
