//! Interactive chat client.
//!
//! Connects with background reconnect, logs in, then relays stdin lines
//! as chat messages until `q` or EOF. Received messages print from the
//! callback thread.

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::warn;

use relayd::{Client, ClientConfig};
use relayd_chat::config::DEFAULT_PORT;
use relayd_chat::protocol::{ChatMessage, LoginRequest, TARGET_CHAT, TARGET_LOGIN};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct ClientArgs {
    /// User id to log in with
    user_id: String,

    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Seconds to wait for the initial connection
    #[arg(long, default_value_t = 30)]
    connect_timeout: u64,
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
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = ClientArgs::parse();
    let addr = format!("{}:{}", args.host, args.port);

    println!("connecting to {addr} as {} ...", args.user_id);

    let mut client = Client::connect(ClientConfig::default(), &addr, on_server_message)
        .context("failed to start client")?;

    let deadline = Instant::now() + Duration::from_secs(args.connect_timeout);
    while !client.is_connected() {
        if Instant::now() >= deadline {
            bail!("connection timeout after {}s", args.connect_timeout);
        }
        thread::sleep(Duration::from_millis(100));
    }
    println!("connected.");

    let login = LoginRequest {
        user_id: args.user_id.clone(),
        password: format!("{}_{}", args.user_id, args.port),
        version: 1,
    };
    if let Err(e) = client.send(&TARGET_LOGIN, &login.encode()) {
        warn!(error = %e, "login send failed, continuing anyway");
    }

    println!("=== chat room (type 'q' to quit) ===");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("stdin read failed")?;
        let text = line.trim();

        if text == "q" {
            break;
        }
        if text.is_empty() {
            continue;
        }

        let msg = ChatMessage {
            sender: args.user_id.clone(),
            text: text.to_string(),
            timestamp: unix_now(),
        };
        if client.send(&TARGET_CHAT, &msg.encode()).is_err() {
            // The manager keeps reconnecting in the background; this
            // message is lost either way.
            println!("[offline] message dropped, reconnecting ...");
        }
    }

    println!("leaving.");
    client.disconnect();
    Ok(())
}

fn on_server_message(
    _handle: &relayd::ClientHandle,
    target: &relayd_wire::TargetTag,
    body: &[u8],
) {
    if *target != TARGET_CHAT {
        return;
    }
    match ChatMessage::decode(body) {
        Ok(msg) => {
            // Overwrite the pending prompt, print, re-prompt.
            print!("\r>> [{}] {}\n> ", msg.sender, msg.text);
            let _ = io::stdout().flush();
        }
        Err(e) => warn!(error = %e, "malformed chat body"),
    }
}
