//! CLI for realtime-channel
//!
//! Subcommands:
//! - `listen`: connect, subscribe to channels and log every event until Ctrl-C
//! - `config`: print the effective configuration

use clap::Parser;
use realtime_channel::client::events;
use realtime_channel::config::{Settings, load_config};
use realtime_channel::utils::logging;
use realtime_channel::{ChannelClient, ChannelError};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "realtime-channel")]
enum Command {
    /// Connect to the realtime endpoint and log incoming events
    Listen {
        /// Endpoint URL, overrides `server.url`
        #[arg(long)]
        url: Option<String>,
        /// Channel to subscribe to (repeatable), overrides `channels.default`
        #[arg(long = "channel")]
        channels: Vec<String>,
        /// Token sent in the `auth` message, overrides `auth.token`
        #[arg(long)]
        token: Option<String>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cmd = Command::parse();

    if let Err(e) = run(cmd).await {
        // logging may not be set up yet when the config itself failed
        logging::init("info");
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cmd: Command) -> Result<(), ChannelError> {
    let settings = load_config()?;
    logging::init(&settings.logging.level);

    match cmd {
        Command::Listen {
            url,
            channels,
            token,
        } => run_listen(settings, url, channels, token).await,
        Command::Config => {
            println!("{settings:#?}");
            Ok(())
        }
    }
}

async fn run_listen(
    mut settings: Settings,
    url: Option<String>,
    channels: Vec<String>,
    token: Option<String>,
) -> Result<(), ChannelError> {
    if let Some(url) = url {
        settings.server.url = url;
    }
    if token.is_some() {
        settings.auth.token = token;
    }
    let channels = if channels.is_empty() {
        settings.channels.default.clone()
    } else {
        channels
    };

    let client = ChannelClient::with_websocket(&settings);
    let (exhausted_tx, mut exhausted_rx) = mpsc::unbounded_channel();

    client.on(events::CONNECTED, |_| info!("connected"));
    client.on(events::DISCONNECTED, |payload| {
        warn!(code = %payload["code"], reason = %payload["reason"], "disconnected");
    });
    client.on(events::NOTIFICATION, |payload| {
        info!(level = %payload["level"], message = %payload["message"], "notification");
    });
    client.on(events::MESSAGE, |payload| info!(%payload, "message"));
    client.on(events::MAX_RECONNECT_ATTEMPTS_REACHED, move |payload| {
        let _ = exhausted_tx.send(payload["attempts"].as_u64().unwrap_or_default());
    });

    for channel in &channels {
        client.subscribe(channel);
    }
    client.connect();

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.map(|()| info!("Shutdown signal received. Exiting gracefully."))
                .map_err(ChannelError::from)
        }
        Some(attempts) = exhausted_rx.recv() => {
            Err(ChannelError::Connect(format!(
                "{}: server unreachable after {attempts} attempts",
                settings.server.url
            )))
        }
    };

    client.disconnect();
    outcome
}
