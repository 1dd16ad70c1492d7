use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use tracing_subscriber::EnvFilter;

use survival_games_server::config::ServerConfig;
use survival_games_server::net::game_session::{ConnectionId, GameSession, Outbound};
use survival_games_server::net::protocol::encode_json;

/// Stdin is attached as an admin connection with this id
const CONSOLE: ConnectionId = 0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Survival Games Server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    config.validate().context("invalid server configuration")?;
    info!(
        tick_rate = config.tick_rate,
        broadcast_rate = config.broadcast_rate,
        bot_fill = config.bot_fill,
        "Configuration loaded"
    );

    let mut session = GameSession::new(&config);
    session.connect(CONSOLE, true);

    let mut ticker = interval(Duration::from_millis(1000 / config.tick_rate as u64));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let start = Instant::now();
    let stats_every = config.tick_rate as u64 * 30;

    let mut console = BufReader::new(tokio::io::stdin()).lines();
    let mut console_open = true;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Game loop started at {} Hz", config.tick_rate);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now_ms = start.elapsed().as_millis() as u64;
                deliver(session.advance(now_ms));

                let world = session.world();
                if world.tick > 0 && world.tick % stats_every == 0 {
                    info!(
                        tick = world.tick,
                        phase = ?world.match_state.phase,
                        humans = world.human_count(),
                        bots = world.bot_count(),
                        alive = world.active_count(),
                        "Game status"
                    );
                }
            }
            line = console.next_line(), if console_open => {
                match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if !line.is_empty() {
                            deliver(session.handle_text(CONSOLE, line));
                        }
                    }
                    Ok(None) => {
                        info!("Admin console closed");
                        console_open = false;
                    }
                    Err(e) => {
                        warn!(error = %e, "Admin console read failed");
                        console_open = false;
                    }
                }
            }
            result = &mut shutdown => {
                result.context("failed to install Ctrl+C handler")?;
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Server stopped");
    Ok(())
}

/// Console replies go to stdout; nothing else has a transport here
fn deliver(out: Vec<Outbound>) {
    for message in out {
        match message {
            Outbound::To(CONSOLE, msg) => match encode_json(&msg) {
                Ok(json) => println!("{json}"),
                Err(e) => warn!(error = %e, "Failed to encode console reply"),
            },
            Outbound::To(conn, _) => debug!(conn, "No transport attached for connection"),
            Outbound::Broadcast(_) => trace!("Snapshot broadcast"),
        }
    }
}
