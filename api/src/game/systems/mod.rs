pub mod abilities;
pub mod border;
pub mod bots;
pub mod combat;
pub mod feast;
pub mod loot;
pub mod movement;
pub mod phase;
pub mod relics;
pub mod shrines;
pub mod storm;
