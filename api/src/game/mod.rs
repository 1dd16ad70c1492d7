pub mod constants;
pub mod game_loop;
pub mod map;
pub mod match_result;
pub mod performance;
pub mod spatial;
pub mod state;
pub mod systems;
