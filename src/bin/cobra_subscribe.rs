//! Subscribe to a Cobra channel and print every message
//!
//! Usage: `cobra_subscribe [config-path] [publish-message]`
//!
//! The role secret may come from `COBRA_ROLE_SECRET` (a `.env` file works).
//! When a second argument is given it is published once on the channel after
//! the first authentication.

use anyhow::{Context, Result};
use cobra::logging::init_tracing;
use cobra::{CobraClient, CobraConfig, ConnectionEvent};
use cobra_rtm::bin_common::{load_config_from_env, parse_args, ConfigType};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args = parse_args();
    let config_path = match args.first() {
        Some(path) => load_config_from_env(ConfigType::Custom(path.clone())),
        None => load_config_from_env(ConfigType::Subscriber),
    };
    let config = CobraConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    print_banner(&config);

    let mut builder = CobraClient::builder()
        .config(config.connection.clone())
        .channel(config.channel.clone())
        .settings(config.settings.clone())
        .on_message(|message| match message {
            Value::String(text) => println!("{}", text),
            other => println!("{}", other),
        });
    if let Some(filter) = config.filter.clone() {
        builder = builder.filter(filter);
    }
    let client = builder.build().await?;

    let mut to_publish = args.get(1).cloned();
    let mut ticker = tokio::time::interval(Duration::from_millis(200));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stopped = false;

    while !stopped {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Ctrl+C received, stopping");
                break;
            }
            _ = ticker.tick() => {
                while let Some(event) = client.try_recv_event() {
                    match event {
                        ConnectionEvent::Connected { connection_id, server_version, .. } => {
                            info!("Connected (connection {:?}, server {:?})", connection_id, server_version);
                            if let Some(text) = to_publish.take() {
                                match client.publish_confirmed(config.channel.clone(), Value::String(text)).await {
                                    Ok(()) => info!("Published to {}", config.channel),
                                    Err(e) => error!("Publish failed: {}", e),
                                }
                            }
                        }
                        ConnectionEvent::Disconnected { reason } => warn!("Disconnected: {}", reason),
                        ConnectionEvent::Reconnecting { attempt, delay } => {
                            info!("Reconnecting (attempt {}) in {:?}", attempt, delay)
                        }
                        ConnectionEvent::Error(e) => error!("{}", e),
                        ConnectionEvent::GaveUp { reason } => {
                            error!("Giving up: {}", reason);
                            return Err(anyhow::anyhow!("connection abandoned: {}", reason));
                        }
                        ConnectionEvent::Stopped => stopped = true,
                    }
                }
            }
        }
    }

    client.shutdown().await?;
    print_shutdown();
    Ok(())
}

fn print_banner(config: &CobraConfig) {
    info!("");
    info!("========================================");
    info!("Cobra subscriber");
    info!("Endpoint: {}", config.connection.endpoint);
    info!("Channel: {}", config.channel);
    info!("Press Ctrl+C to stop");
    info!("========================================");
    info!("");
}

fn print_shutdown() {
    info!("");
    info!("========================================");
    info!("Cobra subscriber stopped");
    info!("========================================");
}
