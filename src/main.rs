// src/main.rs - Headless print host CLI
use std::path::Path;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast;

use printhost::config::{self, Config};
use printhost::serial::transport;
use printhost::{JobController, JobState, SerialLink, StatusSnapshot, StorageRoot};

type HostError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Parser)]
#[command(name = "printhost", version, about = "Headless serial G-code print host")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "printhost.toml")]
    config: String,

    /// Serial port (overrides the config file)
    #[arg(long)]
    port: Option<String>,

    /// Baud rate (overrides the config file)
    #[arg(long)]
    baud: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream a G-code file from the uploads directory to the printer
    Print { filename: String },
    /// Connect and log every line the printer emits
    Monitor,
    /// List serial devices on this system
    ListPorts,
}

#[tokio::main]
async fn main() -> Result<(), HostError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::ListPorts => {
            for port in transport::available_ports()? {
                println!("{}", port.display());
            }
            Ok(())
        }
        Command::Monitor => {
            let config = load_or_default(&cli.config)?;
            let link = connect(&cli, &config).await?;
            monitor(&link).await;
            link.disconnect().await;
            Ok(())
        }
        Command::Print { ref filename } => {
            let config = load_or_default(&cli.config)?;
            let link = connect(&cli, &config).await?;
            let storage = StorageRoot::new(&config.storage.uploads_dir);
            let jobs = JobController::new(link.clone(), storage, config.job_options());
            let result = run_print(&link, &jobs, filename).await;
            link.disconnect().await;
            result
        }
    }
}

fn load_or_default(path: &str) -> Result<Config, HostError> {
    if Path::new(path).exists() {
        Ok(config::load_config(path)?)
    } else {
        tracing::warn!(path, "config file not found, using defaults");
        Ok(Config::default())
    }
}

async fn connect(cli: &Cli, config: &Config) -> Result<SerialLink, HostError> {
    let port = cli
        .port
        .clone()
        .or_else(|| config.serial.port.clone())
        .ok_or("no serial port configured (use --port or printhost.toml)")?;
    let baud = cli.baud.unwrap_or(config.serial.baud);

    let link = SerialLink::new();
    link.connect(&port, baud).await?;
    // Initial temperature ping; the report comes back through the reader.
    let _ = link.send("M105").await;
    Ok(link)
}

async fn monitor(link: &SerialLink) {
    let mut lines = link.subscribe_lines();
    tracing::info!("monitoring; press Ctrl-C to exit");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.recv() => match line {
                Ok(line) => tracing::info!(target: "printer", "{line}"),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("observer lagged, dropped {n} lines");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

async fn run_print(
    link: &SerialLink,
    jobs: &JobController,
    filename: &str,
) -> Result<(), HostError> {
    jobs.start(filename).await?;

    let mut ticks = 0u64;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("interrupted, cancelling job");
                jobs.cancel().await;
                return Ok(());
            }
            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                ticks += 1;
                // Lightweight temperature poll between job commands.
                if ticks % 5 == 0 && link.is_connected().await {
                    let _ = link.send("M105").await;
                }
                let snapshot = StatusSnapshot::collect(link, jobs).await;
                match serde_json::to_string(&snapshot) {
                    Ok(json) => tracing::info!(target: "status", "{json}"),
                    Err(e) => tracing::warn!("status serialize failed: {e}"),
                }
                if snapshot.job_state == JobState::Idle {
                    if let Some(error) = snapshot.error {
                        tracing::error!("job failed: {error}");
                        return Err(error.into());
                    }
                    tracing::info!("job finished");
                    return Ok(());
                }
            }
        }
    }
}
