//! # play_lights
//!
//! A priority-aware orchestrator and socket server for Playbulb and Milight
//! Bluetooth LE bulbs.
//!
//! Clients describe the wanted state of the whole fleet as one token per
//! device (`"-1"` skip, `"0"` off, `"1"` on, or an explicit color). The
//! [`Orchestrator`] queues these requests, arbitrates them by priority and
//! sweeps over the devices until every one of them reached its color or the
//! retry budget ran out. A [`LightServer`] exposes this over a small
//! length-prefixed TCP protocol, including a streaming mode for live color
//! changes.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::path::Path;
//! use std::sync::Arc;
//! use play_lights::{BleConnector, Config, LightServer, Orchestrator, ShellTvControl};
//!
//! async fn serve() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Path::new("play.json"))?;
//!     let connector = Arc::new(BleConnector::new(config.bluetooth.clone()));
//!     let devices = config.build_devices(connector)?;
//!     let orchestrator = Arc::new(Orchestrator::new(devices, config.settings()));
//!
//!     let server = LightServer::new(orchestrator, Arc::new(ShellTvControl::new(config.tv.clone())));
//!     server.run(&config.server.address()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Priorities**: a level 2 color is kept against later level 1 requests,
//!   level 3 is a one-off override, see [`Priority`]
//! - **Quiet hours**: non-urgent requests are dropped during the day, see [`QuietHours`]
//! - **Groups**: restrict a request to a group or subgroup of devices
//! - **Streaming**: push colors to one device or group without queueing
//! - **Client**: [`client`] helpers to talk to a running server
//!
//! ## Runtime Selection
//!
//! This library is runtime-agnostic. Select your preferred runtime using feature flags:
//!
//! ### Using tokio (default)
//!
//! ```toml
//! [dependencies]
//! play-lights = "0.1"
//! tokio = { version = "1", features = ["rt-multi-thread", "macros"] }
//! ```
//!
//! ### Using async-std
//!
//! ```toml
//! [dependencies]
//! play-lights = { version = "0.1", default-features = false, features = ["runtime-async-std"] }
//! async-std = { version = "1.12", features = ["attributes"] }
//! ```
//!
//! ### Using smol
//!
//! ```toml
//! [dependencies]
//! play-lights = { version = "0.1", default-features = false, features = ["runtime-smol"] }
//! smol = "2"
//! ```
//!
//! ## Feature Flags
//!
//! - `runtime-tokio` (default): Use the tokio async runtime
//! - `runtime-async-std`: Use the async-std runtime
//! - `runtime-smol`: Use the smol runtime
//! - `ble` (default): [`BleConnector`], the btleplug-backed hardware transport
//!
//! The `playd` and `playctl` binaries need `runtime-tokio` and `ble`.

#[cfg(feature = "ble")]
mod bluetooth;
pub mod client;
pub mod codec;
mod config;
mod device;
mod errors;
mod orchestrator;
pub mod protocol;
mod request;
mod retry;
mod roster;
pub mod runtime;
mod server;
mod transport;
mod tv;
mod types;

// Re-export public API
#[cfg(feature = "ble")]
pub use bluetooth::BleConnector;
pub use config::{BluetoothConfig, Config, DeviceConfig, QuietHours, ServerConfig};
pub use device::{Device, Profile, Progress};
pub use errors::Error;
pub use orchestrator::{Dispatch, Orchestrator, Settings, StreamTarget};
pub use request::{BatchRequest, Plan, Request};
pub use retry::{RetryOutcome, RetryPolicy};
pub use roster::{Member, Roster};
pub use server::LightServer;
pub use transport::{Connector, Link};
pub use tv::{ShellTvControl, TvAction, TvConfig, TvControl};
pub use types::{ColorToken, DeviceKind, Priority};
