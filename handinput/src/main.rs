//! atomic-handinput: replay recorded hand frames through the gesture
//! pipeline and print every emitted event as an s-expression.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use atomic_handinput::{replay, GestureConfig, HandInputSystem};

#[derive(Parser, Debug)]
#[command(name = "atomic-handinput", about = "Replay hand frames through the gesture pipeline")]
struct Cli {
    /// Frame script to replay (one `(:frame ...)` per frame)
    #[arg(long)]
    script: Option<PathBuf>,

    /// Gesture configuration plist (default: built-in calibration)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the active configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Print pipeline status after the last frame
    #[arg(long)]
    status: bool,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("atomic-handinput {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atomic_handinput=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => GestureConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => GestureConfig::default(),
    };

    if cli.print_config {
        println!("{}", config.config_sexp());
        return Ok(());
    }

    let Some(script) = cli.script else {
        anyhow::bail!("nothing to do: pass --script or --print-config");
    };
    let frames = replay::load_script(&script)
        .with_context(|| format!("failed to read frame script {}", script.display()))?;

    let mut system = HandInputSystem::builder()
        .with_config(config)
        .build()
        .context("failed to build hand input pipeline")?;

    info!("replaying {} frames from {}", frames.len(), script.display());
    let mut emitted = 0usize;
    for frame in &frames {
        for event in system.step_raw(frame) {
            println!("{}", event.to_sexp());
            emitted += 1;
        }
    }
    info!("replay finished: {} events", emitted);

    if cli.status {
        println!("{}", system.status_sexp());
    }
    Ok(())
}
