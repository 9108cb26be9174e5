//! Light server: loads the configuration, switches the lights on and serves
//! the control plane until Ctrl-C, then switches everything off.
//!
//! Run with: playd --config play.json

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::info;
use play_lights::{BleConnector, Config, Connector, LightServer, Orchestrator, ShellTvControl};

#[derive(Parser)]
#[command(name = "playd")]
#[command(about = "Serve Playbulb and Milight lights over TCP", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "play.json")]
    config: PathBuf,

    /// Write to the devices of a sweep concurrently
    #[arg(long)]
    threaded: bool,

    /// Ignore the quiet hours
    #[arg(long)]
    notime: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    let mut settings = config.settings();
    if cli.threaded {
        settings.threaded = true;
    }
    if cli.notime {
        settings.quiet_hours = None;
    }

    let connector: Arc<dyn Connector> = Arc::new(BleConnector::new(config.bluetooth.clone()));
    let orchestrator = Arc::new(Orchestrator::new(config.build_devices(connector)?, settings));
    for description in orchestrator.descriptions() {
        info!("{}", description);
    }

    let server = LightServer::new(
        orchestrator,
        Arc::new(ShellTvControl::new(config.tv.clone())),
    );
    let listener = server.bind(&config.server.address()).await?;
    server.startup().await?;

    tokio::select! {
        served = server.serve(listener) => served?,
        _ = tokio::signal::ctrl_c() => {
            info!("Closing down server and lights.");
            server.shutdown().await?;
        }
    }
    Ok(())
}
