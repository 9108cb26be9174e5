//! Command-line client for a running playd server.
//!
//! Run with: playctl --help

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use play_lights::client::{self, StreamSession};
use play_lights::{
    BatchRequest, BleConnector, Config, Connector, Orchestrator, StreamTarget,
};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "playctl")]
#[command(about = "Change the colors of the lights served by playd", long_about = None)]
struct Cli {
    /// One value per device: -1 skip, 0 off, 1 on, or a color
    #[arg(allow_negative_numbers = true)]
    hexvalues: Vec<String>,

    /// Values for the Playbulb devices only, comma separated
    #[arg(long)]
    playbulb: Option<String>,

    /// Values for the Milight devices only, comma separated
    #[arg(long)]
    milight: Option<String>,

    /// Request priority (1-3)
    #[arg(short, long, value_parser = clap::value_parser!(i64).range(1..=3))]
    priority: Option<i64>,

    /// Restrict the request to a group
    #[arg(short, long)]
    group: Option<String>,

    /// Restrict the request to a subgroup of the group
    #[arg(short, long, requires = "group")]
    subgroup: Option<String>,

    /// Ignore the quiet hours
    #[arg(long)]
    notime: bool,

    /// Turn every device on
    #[arg(long)]
    on: bool,

    /// Turn every device off
    #[arg(long)]
    off: bool,

    /// Turn everything off if anything is on, else everything on
    #[arg(long)]
    toggle: bool,

    #[arg(long, conflicts_with = "tvoff")]
    tvon: bool,

    #[arg(long)]
    tvoff: bool,

    #[arg(long)]
    tvrestart: bool,

    /// Stream colors read from stdin to one device
    #[arg(long, conflicts_with = "stream_group")]
    stream_dev: Option<usize>,

    /// Stream colors read from stdin to a group
    #[arg(long)]
    stream_group: Option<String>,

    /// Print the current color of every device
    #[arg(long)]
    state: bool,

    /// List the configured devices
    #[arg(long)]
    list: bool,

    /// Server address, overrides the configuration
    #[arg(long)]
    server: Option<String>,

    /// Configuration file
    #[arg(short, long, default_value = "play.json")]
    config: PathBuf,
}

impl Cli {
    fn batch(&self) -> BatchRequest {
        BatchRequest {
            hexvalues: self.hexvalues.clone(),
            playbulb: self.playbulb.as_deref().map(split_values),
            milight: self.milight.as_deref().map(split_values),
            on: self.on,
            off: self.off,
            toggle: self.toggle,
            notime: self.notime,
            tvon: self.tvon,
            tvoff: self.tvoff,
            tvrestart: self.tvrestart,
            priority: self.priority,
            group: self.group.clone(),
            subgroup: self.subgroup.clone(),
        }
    }

    fn stream_target(&self) -> Option<StreamTarget> {
        match (&self.stream_dev, &self.stream_group) {
            (Some(index), _) => Some(StreamTarget::Device(*index)),
            (None, Some(group)) => Some(StreamTarget::Group(group.clone())),
            (None, None) => None,
        }
    }
}

fn split_values(values: &str) -> Vec<String> {
    values
        .replace(['"', '\''], "")
        .split(',')
        .map(|v| v.trim().to_string())
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    let addr = cli
        .server
        .clone()
        .unwrap_or_else(|| format!("127.0.0.1:{}", config.server.port));

    if cli.list {
        let connector: Arc<dyn Connector> = Arc::new(BleConnector::new(config.bluetooth.clone()));
        let orchestrator = Orchestrator::new(config.build_devices(connector)?, config.settings());
        for description in orchestrator.descriptions() {
            println!("{}", description);
        }
        return Ok(());
    }

    if cli.state {
        for (index, color) in client::query_state(&addr).await?.iter().enumerate() {
            println!("{}: {}", index, color);
        }
        return Ok(());
    }

    if let Some(target) = cli.stream_target() {
        let mut session = StreamSession::open(&addr, target).await?;
        println!("Streaming to {}, one color per line, 'quit' to stop", session.target());

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let token = line.trim();
            if token == "quit" {
                break;
            }
            if !token.is_empty() {
                session.send(token).await?;
            }
        }
        session.close().await?;
        return Ok(());
    }

    client::send_request(&addr, &cli.batch()).await?;
    Ok(())
}
