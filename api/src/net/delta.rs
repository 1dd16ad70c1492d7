//! Version-gated snapshot assembly
//!
//! Players, leaderboard, match summary and chest flags go out with every
//! broadcast. The map, relics, shrines and storm only go out when their
//! version counter moved since the previous broadcast, and the event log is
//! flushed incrementally by sequence number.

use crate::game::constants::events;
use crate::game::state::{Versions, World};
use crate::net::protocol::{relic_views, shrine_views, MapView, StormView, WorldSnapshot};

/// Remembers what the last broadcast carried
#[derive(Debug, Default)]
pub struct SnapshotAssembler {
    /// Versions at the last broadcast; `None` until the first one
    sent: Option<Versions>,
    last_event_seq: u64,
}

impl SnapshotAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next broadcast snapshot. Advances the remembered versions.
    pub fn assemble(&mut self, world: &World) -> WorldSnapshot {
        let current = world.versions;
        let changed = |pick: fn(&Versions) -> u64| match &self.sent {
            Some(sent) => pick(sent) != pick(&current),
            None => true,
        };
        let (map, relics, shrines, storm) = (
            changed(|v| v.map),
            changed(|v| v.relics),
            changed(|v| v.shrines),
            changed(|v| v.storm),
        );

        let mut snapshot = WorldSnapshot::core(world, world.events.since(self.last_event_seq));
        if map {
            snapshot.map = Some(MapView::from_world(world));
        }
        if relics {
            snapshot.relics = Some(relic_views(world));
        }
        if shrines {
            snapshot.shrines = Some(shrine_views(world));
        }
        if storm {
            snapshot.storm = Some(StormView::from_world(world));
        }

        self.sent = Some(current);
        self.last_event_seq = world.events.last_seq();
        snapshot
    }

    /// Everything, for a newly joined client. Does not touch broadcast state.
    pub fn full(&self, world: &World) -> WorldSnapshot {
        let mut snapshot = WorldSnapshot::core(world, world.events.tail(events::WELCOME_TAIL));
        snapshot.map = Some(MapView::from_world(world));
        snapshot.relics = Some(relic_views(world));
        snapshot.shrines = Some(shrine_views(world));
        snapshot.storm = Some(StormView::from_world(world));
        snapshot
    }
}
