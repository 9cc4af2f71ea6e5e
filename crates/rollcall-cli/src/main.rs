mod app;
mod config;
mod devices;
mod menu;
mod terminal;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::app::{Context, ControlLoop};
use crate::config::Config;
use crate::devices::Hardware;

#[derive(Parser)]
#[command(name = "rollcall", about = "Face registration and attendance register", version)]
struct Cli {
    /// TOML config file (defaults to $ROLLCALL_CONFIG when set)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding one folder per registered person
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Attendance CSV file
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// V4L2 camera device (e.g., /dev/video0)
    #[arg(long)]
    camera: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive menu (the default)
    Menu,
    /// List V4L2 capture devices
    Devices,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.face_data_dir = dir;
    }
    if let Some(path) = cli.ledger {
        config.ledger_path = path;
    }
    if let Some(device) = cli.camera {
        config.camera_device = device;
    }
    tracing::debug!(?config, "configuration resolved");

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Devices => {
            let devices = rollcall_hw::Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for dev in devices {
                println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
        }
        Commands::Menu => {
            let ctx = Context::open(config)?;
            let devices = Hardware::from_config(&ctx.config);
            let stdin = std::io::stdin();
            ControlLoop::new(&ctx, devices, stdin.lock(), std::io::stdout()).run()?;
        }
    }

    Ok(())
}
