//! # zax
//!
//! IRC channel bot with a durable conversation history.
//!
//! This binary provides:
//! - **History commands** (`.m`, `.u`, `!nick`) answered from the in-memory
//!   index kept by `zax-history`, rebuilt from the append-only log at start
//! - **Link previews** and **storefront lookups**, each bounded by a timeout
//! - **Admin commands** gated by a nick or host regex
//!
//! Events are handled one at a time: the history store has a single owner
//! and is never touched concurrently.

mod admin;
mod bot;
mod commands;
mod config;
mod error;
mod events;
mod irc;
mod lookup;

use std::path::PathBuf;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use zax_history::HistoryStore;

use crate::bot::Bot;
use crate::config::BotConfig;
use crate::events::Outbound;
use crate::irc::IrcConnection;
use crate::lookup::Lookups;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,zax_bot=debug,zax_history=debug")),
        )
        .init();

    info!("Starting zax v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config_path = std::env::var("ZAX_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("conf.json"));
    let config = BotConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    info!(
        server = %config.server,
        nickname = %config.nickname,
        tls = ?config.tls_mode(),
        channels = config.channels.len(),
        history = %config.history_path.display(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Rebuild history (fatal on failure)
    // -----------------------------------------------------------------------
    let (store, stats) = HistoryStore::open(&config.history_path)
        .with_context(|| format!("opening history {}", config.history_path.display()))?;
    info!(
        records = stats.records(),
        skipped = stats.skipped,
        participants = store.history().participant_count(),
        "History ready"
    );

    let lookups = Lookups::new(&config.user_agent, config.lookup_timeout());
    let mut bot = Bot::new(store, config, lookups, StdRng::from_entropy());

    // -----------------------------------------------------------------------
    // 4. Connect and register
    // -----------------------------------------------------------------------
    let mut conn = IrcConnection::connect(
        &bot.config().server,
        bot.config().tls_mode(),
        bot.config().read_timeout(),
    )
    .await?;
    conn.register(&bot.config().nickname, &bot.config().username)
        .await?;

    // -----------------------------------------------------------------------
    // 5. Event loop (one event at a time until disconnect or Ctrl+C)
    // -----------------------------------------------------------------------
    loop {
        let event = tokio::select! {
            event = conn.next_event() => event?,
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                conn.send_outbound(&Outbound::Disconnect {
                    reason: "Interrupted".to_string(),
                })
                .await?;
                break;
            }
        };
        let Some(event) = event else {
            break;
        };

        let outbound = match bot.handle(event).await {
            Ok(outbound) => outbound,
            Err(e) => {
                error!(error = %e, "History append failed, stopping");
                return Err(e.into());
            }
        };

        for out in &outbound {
            conn.send_outbound(out).await?;
        }
        if outbound
            .iter()
            .any(|o| matches!(o, Outbound::Disconnect { .. }))
        {
            info!("Disconnect requested");
            break;
        }
    }

    info!(
        messages = bot.store().history().messages().len(),
        links = bot.store().history().links().len(),
        "Stopped"
    );
    Ok(())
}
