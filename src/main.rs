use std::time::Duration;

use anyhow::{bail, Context};
use args::{Args, Command};
use clap::Parser;
use events::{emit_on_timer, run_until, Refresh};
use futures::future::join_all;
use ios_monitor_core::{
    remote::{commands, ManagerPolicy, RconConnectionManager, RconSession},
    server::{ServerSnapshot, ServerSnapshotAssembler},
    settings::{self, AppDetails, ServerConfig, Settings},
};
use tracing_setup::init_tracing;

mod args;
mod events;
mod render;
mod tracing_setup;

pub const APP: AppDetails<'static> = AppDetails {
    qualifier: "com.iosoccer",
    organization: "IOS",
    application: "IOSMonitor",
};

/// Command attempts allowed to the `match-json` and `rcon` commands.
const DIAGNOSTIC_ATTEMPTS: u32 = 3;
const DEFAULT_RCON_COMMAND: &str = "status";

fn load_settings(args: &Args) -> anyhow::Result<Settings> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => Settings::default_file_location(APP).unwrap_or_else(|e| {
            tracing::error!(
                "Failed to find a suitable location to store settings ({e}). Settings will be written to {}",
                settings::CONFIG_FILE_NAME
            );
            settings::CONFIG_FILE_NAME.into()
        }),
    };

    let exists = path.exists();
    let settings = Settings::load_or_create(path).context("Failed to load settings")?;
    if !exists {
        tracing::info!("No config file found, writing a template");
        settings.save_ok();
    }
    Ok(settings)
}

fn server_at(settings: &Settings, index: usize) -> anyhow::Result<&ServerConfig> {
    let count = settings.servers.len();
    match index.checked_sub(1).and_then(|i| settings.servers.get(i)) {
        Some(server) => Ok(server),
        None => bail!("No server number {index}, valid numbers are 1 to {count}"),
    }
}

async fn acquire(
    assembler: &ServerSnapshotAssembler,
    settings: &Settings,
    server: &ServerConfig,
) -> ServerSnapshot {
    match settings.acquire_deadline() {
        Some(deadline) => assembler.acquire_within(server, deadline).await,
        None => assembler.acquire(server).await,
    }
}

async fn acquire_all(
    assembler: &ServerSnapshotAssembler,
    settings: &Settings,
) -> Vec<ServerSnapshot> {
    join_all(
        settings
            .servers
            .iter()
            .map(|server| acquire(assembler, settings, server)),
    )
    .await
}

fn print_snapshots(snapshots: &[ServerSnapshot], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshots)?);
        return Ok(());
    }

    println!("{}", render::summary(snapshots));
    for snapshot in snapshots {
        println!();
        print!("{}", render::server_block(snapshot));
    }
    Ok(())
}

async fn watch(
    assembler: &ServerSnapshotAssembler,
    settings: &Settings,
    interval: Duration,
    json: bool,
) -> anyhow::Result<()> {
    tracing::info!("Refreshing every {interval:?}, press Ctrl+C to stop");

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Can't listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    run_until(emit_on_timer(interval, || Refresh), ctrl_c, move || async move {
        let snapshots = acquire_all(assembler, settings).await;
        print_snapshots(&snapshots, json)
    })
    .await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = init_tracing();

    let args = Args::parse();
    let settings = load_settings(&args)?;

    if matches!(args.command, Command::Config) {
        print!("{}", serde_yaml::to_string(&settings.redacted())?);
        return Ok(());
    }

    settings.validate()?;

    let manager = RconConnectionManager::new(RconSession::default(), ManagerPolicy::default());
    let assembler = ServerSnapshotAssembler::from_settings(manager, &settings);

    match args.command {
        Command::Status => {
            let snapshots = acquire_all(&assembler, &settings).await;
            print_snapshots(&snapshots, args.json)?;
        }
        Command::Server { index } => {
            let server = server_at(&settings, index)?;
            let snapshot = acquire(&assembler, &settings, server).await;
            print_snapshots(std::slice::from_ref(&snapshot), args.json)?;
        }
        Command::MatchJson { index } => {
            let server = server_at(&settings, index)?;
            let payload = assembler
                .fetch_payload(server, DIAGNOSTIC_ATTEMPTS)
                .await
                .with_context(|| format!("Couldn't get match data from {}", server.name))?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        Command::Rcon { index, command } => {
            let server = server_at(&settings, index)?;
            let command = if command.is_empty() {
                DEFAULT_RCON_COMMAND.to_owned()
            } else {
                command.join(" ")
            };
            if !commands::is_known(&command) {
                tracing::warn!("`{command}` is not a command the monitor knows, sending it anyway");
            }
            let output = assembler
                .run_diagnostic(server, &command, DIAGNOSTIC_ATTEMPTS)
                .await
                .with_context(|| format!("`{command}` failed on {}", server.name))?;
            println!(
                "{} port {} ({} attempt(s), {:.1?})",
                server.name, output.port, output.attempts, output.elapsed
            );
            println!("{}", render::truncate(&output.response, render::RCON_OUTPUT_LIMIT));
        }
        Command::Watch { interval } => {
            let interval =
                interval.map_or_else(|| settings.refresh_interval(), Duration::from_secs);
            watch(&assembler, &settings, interval, args.json).await?;
        }
        Command::Config => {}
    }

    Ok(())
}
