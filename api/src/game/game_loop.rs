//! Tick scheduler
//!
//! `advance` is called with a monotonic timestamp as often as the driver
//! likes; it decides whether a tick runs, how much simulated time it covers,
//! and whether a broadcast is due afterwards.

use crate::game::constants::tick;
use crate::game::match_result::MatchOutcome;
use crate::game::performance::TickStats;
use crate::game::state::{MatchPhase, Millis, PlayerId, World};
use crate::game::systems::{
    border, bots, combat, feast, movement, phase, relics, shrines, storm,
};

/// Result of a call to [`GameLoop::advance`]
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// Too soon after the previous tick
    Skipped,
    Ticked {
        /// Snapshot broadcast is due
        broadcast: bool,
        report: TickReport,
    },
}

/// What happened during one tick that the session layer cares about
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Humans dropped for inactivity
    pub pruned: Vec<PlayerId>,
    /// Set on the tick the round ended
    pub ended: Option<MatchOutcome>,
}

/// Owns the world and drives it at a fixed cadence
pub struct GameLoop {
    pub world: World,
    pub stats: TickStats,
    last_tick_at: Option<Millis>,
    nominal_step: Millis,
    broadcast_every: u64,
    ticks: u64,
}

impl GameLoop {
    pub fn new(world: World, tick_rate: u32, broadcast_every: u64) -> Self {
        Self {
            world,
            stats: TickStats::new(tick_rate),
            last_tick_at: None,
            nominal_step: (1000 / tick_rate.max(1)) as Millis,
            broadcast_every: broadcast_every.max(1),
            ticks: 0,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advance the simulation to `now_ms` (any monotonic clock)
    pub fn advance(&mut self, now_ms: Millis) -> Advance {
        let elapsed = match self.last_tick_at {
            None => self.nominal_step,
            Some(last) => {
                let elapsed = now_ms.saturating_sub(last);
                if elapsed < tick::MIN_TICK_MS {
                    self.stats.record_skip();
                    return Advance::Skipped;
                }
                elapsed
            }
        };
        let step = elapsed.min(tick::MAX_STEP_MS);
        if step < elapsed {
            tracing::warn!(elapsed_ms = elapsed, "Tick stalled, clamping step");
        }
        self.last_tick_at = Some(now_ms);

        self.stats.tick_start();
        let report = run_tick(&mut self.world, step);
        self.stats.tick_end();

        self.ticks += 1;
        Advance::Ticked {
            broadcast: self.ticks % self.broadcast_every == 0,
            report,
        }
    }
}

/// One simulation step of `dt_ms` milliseconds
pub fn run_tick(world: &mut World, dt_ms: Millis) -> TickReport {
    world.clock += dt_ms;
    world.tick += 1;
    let dt = dt_ms as f32 / 1000.0;

    let pruned = phase::prune_idle(world);
    bots::fill(world);
    bots::update(world);
    phase::update(world);

    let running = world.is_running();
    if running {
        border::update(world, dt);
        storm::update(world, dt);
        feast::update(world);
        relics::update(world);
        shrines::update(world);
    }

    // Ended freezes everyone in place until the reset
    if world.match_state.phase != MatchPhase::Ended {
        movement::update(world, dt);
    }

    if running {
        combat::resolve_queued(world);
        combat::update_regen(world, dt);
    } else {
        for p in world.players.values_mut() {
            p.attack_queued = false;
        }
    }

    let ended = if phase::finish_if_over(world) {
        world.match_state.reason.map(|reason| MatchOutcome {
            winner: world.match_state.winner,
            reason,
        })
    } else {
        None
    };

    TickReport { pruned, ended }
}
