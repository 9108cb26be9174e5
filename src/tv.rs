//! Television power control.
//!
//! Requests can switch the living-room TV alongside the lights. The actual
//! work is done by shell commands (HDMI-CEC, ssh to the media box, ...)
//! listed in the configuration.

use std::path::Path;
use std::process::Command;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::errors::Error;
use crate::runtime::{self, BoxFuture};

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TvAction {
    On,
    Off,
    Restart,
}

/// Anything able to carry out a [`TvAction`].
pub trait TvControl: Send + Sync {
    fn apply(&self, action: TvAction) -> BoxFuture<'_, Result<()>>;
}

/// Shell commands to run for each action, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TvConfig {
    pub on: Vec<String>,
    pub off: Vec<String>,
    pub restart: Vec<String>,
}

/// Runs the configured commands through `sh -c` on a blocking worker.
#[derive(Debug, Clone, Default)]
pub struct ShellTvControl {
    config: TvConfig,
}

impl ShellTvControl {
    pub fn new(config: TvConfig) -> Self {
        ShellTvControl { config }
    }

    fn commands(&self, action: TvAction) -> &[String] {
        match action {
            TvAction::On => &self.config.on,
            TvAction::Off => &self.config.off,
            TvAction::Restart => &self.config.restart,
        }
    }
}

impl TvControl for ShellTvControl {
    fn apply(&self, action: TvAction) -> BoxFuture<'_, Result<()>> {
        let commands = self.commands(action).to_vec();
        Box::pin(async move {
            if commands.is_empty() {
                warn!("No command configured for TV action {}", action);
                return Ok(());
            }
            for command in commands {
                let shell_command = command.clone();
                let status = runtime::spawn_blocking(move || {
                    Command::new("sh").arg("-c").arg(&shell_command).status()
                })
                .await
                .map_err(|e| Error::io(Path::new("sh"), e))?;

                if !status.success() {
                    warn!("TV command {:?} exited with {}", command, status);
                }
            }
            info!("TV action {} done", action);
            Ok(())
        })
    }
}
