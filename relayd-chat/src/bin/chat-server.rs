//! Chat relay server.
//!
//! Embeds `relayd::Server`: LOGIN requests are answered with a SYSTEM
//! notice to the whole room, CHAT messages are re-broadcast to every
//! connected peer. SIGINT/SIGTERM set the exit flag observed by the
//! reactor tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use relayd::Server;
use relayd_chat::config::{load_server_config, ServerArgs};
use relayd_chat::protocol::{ChatMessage, LoginRequest, SYSTEM_SENDER, TARGET_CHAT, TARGET_LOGIN};

static EXIT_FLAG: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_signal(_sig: libc::c_int) {
    // Async-signal-safe: a single atomic store.
    EXIT_FLAG.store(true, Ordering::SeqCst);
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = ServerArgs::parse();
    let config = load_server_config(&args)?;
    info!(?config, "configuration loaded");

    let mut server = Server::bind(config, on_client_message).context("failed to bind server")?;
    let addr = server.local_addr()?;

    // SAFETY: handle_signal only performs an atomic store, which is
    // async-signal-safe.
    unsafe {
        libc::signal(libc::SIGINT, handle_signal as *const () as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handle_signal as *const () as libc::sighandler_t);
    }

    info!(%addr, "chat server running, Ctrl+C to stop");
    server.run(&EXIT_FLAG).context("server loop failed")?;

    let stats = server.handle().stats();
    server.shutdown();
    info!(?stats, "chat server terminated");
    Ok(())
}

fn on_client_message(
    handle: &relayd::ServerHandle,
    peer: relayd::PeerId,
    target: &relayd_wire::TargetTag,
    body: &[u8],
) {
    if *target == TARGET_LOGIN {
        let login = match LoginRequest::decode(body) {
            Ok(login) => login,
            Err(e) => {
                warn!(%peer, error = %e, "malformed login request");
                return;
            }
        };
        info!(%peer, user = %login.user_id, version = login.version, "login");

        let notice = ChatMessage {
            sender: SYSTEM_SENDER.to_string(),
            text: format!("{} joined ({} online)", login.user_id, handle.client_count()),
            timestamp: unix_now(),
        };
        if let Err(e) = handle.broadcast(&TARGET_CHAT, &notice.encode()) {
            warn!(error = %e, "could not queue join notice");
        }
    } else if *target == TARGET_CHAT {
        let msg = match ChatMessage::decode(body) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(%peer, error = %e, "malformed chat message");
                return;
            }
        };
        info!(%peer, sender = %msg.sender, text = %msg.text, "chat");

        // Echo broadcast: every peer, including the sender, sees the
        // message in room order.
        if let Err(e) = handle.broadcast(&TARGET_CHAT, body) {
            warn!(error = %e, "could not queue chat broadcast");
        }
    } else {
        warn!(%peer, %target, "unknown target");
    }
}
