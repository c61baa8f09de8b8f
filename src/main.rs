// MIT License - Copyright (c) 2026 Peter Wright
// Interactive simulator: drives the engine against a fake panel on stdin/stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Duration;
use tracing::{info, warn};

use panel_sms_bridge::{
    EngineConfig, LinkedTransport, MemoryStore, PermissionFlags, SmsPanel, ZoneSet,
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "sms-panel-sim")]
#[command(about = "Exercise the SMS panel engine against a fake panel on stdin")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Panel phone number (overrides the config file)
    #[arg(long)]
    panel_number: Option<String>,

    /// Reply timeout in seconds (overrides the config file)
    #[arg(long)]
    timeout_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FileConfig {
    #[serde(default)]
    panel_number: Option<String>,
    #[serde(default = "default_timeout_secs")]
    reply_timeout_secs: u64,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            panel_number: None,
            reply_timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

const HELP: &str = "\
commands:
  arm <slot>           arm predefined scenario 1-16
  custom <digits>      arm ad-hoc zones, e.g. custom 134
  disarm               disarm the panel
  status               query panel status
  perm <slot> <bits>   set user permissions, e.g. perm 3 1011
  sync                 run the CONF1..CONF5 configuration download
  cancel               cancel the running download / pending exchange
  state                print download state, progress, and records
  rx <body>            inject an incoming SMS from the panel
  quit                 exit";

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let mut file_config = FileConfig::default();
    if let Some(path) = &cli.config {
        let text = std::fs::read_to_string(path).context("Failed to read config file")?;
        file_config = toml::from_str(&text).context("Failed to parse config file")?;
    }

    let panel_number = cli
        .panel_number
        .or(file_config.panel_number)
        .unwrap_or_default();
    let timeout_secs = cli.timeout_secs.unwrap_or(file_config.reply_timeout_secs);

    let config = EngineConfig::builder()
        .panel_number(panel_number.clone())
        .reply_timeout(Duration::from_secs(timeout_secs))
        .build();

    let (transport, mut outgoing) = LinkedTransport::new();
    let panel = Arc::new(SmsPanel::new(config, transport, MemoryStore::new()));

    // Task 1: print what the engine transmits.
    let outgoing_handle = tokio::spawn(async move {
        while let Some(sms) = outgoing.recv().await {
            println!("-> SMS to {}: {}", sms.destination, sms.body);
        }
    });

    // Task 2: print engine events.
    let mut events = panel.subscribe();
    let events_handle = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("** {event:?}");
        }
    });

    info!("simulator ready; panel number: {:?}", panel_number);
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("stdin read failed")?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));

        match verb {
            "arm" => match rest.trim().parse::<u8>() {
                Ok(slot) => spawn_command(&panel, move |p| async move {
                    report(p.arm_scenario(slot).await);
                }),
                Err(_) => println!("usage: arm <slot 1-16>"),
            },
            "custom" => {
                let zones = ZoneSet::from_digits(rest.trim());
                spawn_command(&panel, move |p| async move {
                    report(p.arm_custom(zones).await);
                });
            }
            "disarm" => spawn_command(&panel, |p| async move {
                report(p.disarm().await);
            }),
            "status" => spawn_command(&panel, |p| async move {
                report(p.query_status().await);
            }),
            "perm" => {
                let mut parts = rest.split_whitespace();
                match (parts.next().and_then(|s| s.parse::<u8>().ok()), parts.next()) {
                    (Some(slot), Some(bits)) => {
                        let permissions = PermissionFlags::from_bit_string(bits);
                        spawn_command(&panel, move |p| async move {
                            report(p.set_user_permissions(slot, permissions).await);
                        });
                    }
                    _ => println!("usage: perm <slot 1-16> <bits, e.g. 1011>"),
                }
            }
            "sync" => spawn_command(&panel, |p| async move {
                match p.run_configuration().await {
                    Ok(()) => println!("configuration download complete"),
                    Err(e) => println!("configuration download failed: {e}"),
                }
            }),
            "cancel" => {
                panel.cancel_configuration();
                panel.cancel_exchange().await;
                println!("cancelled");
            }
            "state" => print_state(&panel).await,
            "rx" => {
                let from = panel_number.clone();
                panel.handle_incoming(&from, rest).await;
            }
            "quit" | "exit" => break,
            "help" => println!("{HELP}"),
            other => {
                warn!("unknown command: {other}");
                println!("{HELP}");
            }
        }
    }

    outgoing_handle.abort();
    events_handle.abort();
    info!("shutdown complete");
    Ok(())
}

fn spawn_command<F, Fut>(panel: &Arc<SmsPanel<LinkedTransport, MemoryStore>>, f: F)
where
    F: FnOnce(Arc<SmsPanel<LinkedTransport, MemoryStore>>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let panel = panel.clone();
    tokio::spawn(async move { f(panel).await });
}

fn report<V: std::fmt::Debug>(result: panel_sms_bridge::Result<V>) {
    match result {
        Ok(value) => println!("<- {value:?}"),
        Err(e) => println!("!! {e}"),
    }
}

async fn print_state(panel: &SmsPanel<LinkedTransport, MemoryStore>) {
    println!(
        "download: {:?} ({}%)",
        panel.configuration_state().await,
        panel.configuration_percent().await
    );
    let store = panel.store();
    println!("configured: {}", store.is_configured().await);
    if let Some(info) = panel.system_info().await {
        println!(
            "firmware: {:?}, main account: {}, options: {}",
            info.firmware,
            info.is_main,
            info.options.to_bit_string()
        );
    }
    for zone in store.zones().await {
        println!("zone {}: {} (enabled={})", zone.slot, zone.name, zone.enabled);
    }
    for scenario in store.scenarios().await {
        println!(
            "scenario {}: {} (custom={}, zones={})",
            scenario.slot,
            scenario.name,
            scenario.is_custom,
            scenario.zones.digits()
        );
    }
    for user in store.users().await {
        println!("user {}: {} (joker={})", user.slot, user.name, user.is_joker);
    }
    if let Some(snapshot) = store.status().await {
        println!(
            "status: {} (scenario={:?}, at={})",
            snapshot.status, snapshot.scenario, snapshot.received_at
        );
    }
}
