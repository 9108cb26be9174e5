//! Runtime-agnostic async abstractions.
//!
//! The orchestrator and the control-plane server only talk to the async
//! runtime through this module, so the crate works with tokio, async-std or
//! smol. The Bluetooth connector is the exception: btleplug brings its own
//! tokio-based backend on Linux.
//!
//! # Feature Flags
//!
//! Enable one of the following features to select your runtime:
//!
//! - `runtime-tokio` (default) - Use the tokio runtime
//! - `runtime-async-std` - Use the async-std runtime
//! - `runtime-smol` - Use the smol runtime
//!
//! # Example
//!
//! ```toml
//! [dependencies]
//! # Using async-std
//! play-lights = { version = "0.1", default-features = false, features = ["runtime-async-std"] }
//!
//! # Using smol
//! play-lights = { version = "0.1", default-features = false, features = ["runtime-smol"] }
//! ```

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

#[cfg(feature = "runtime-tokio")]
mod tokio_impl;

#[cfg(feature = "runtime-async-std")]
mod async_std_impl;

#[cfg(feature = "runtime-smol")]
mod smol_impl;

// Re-export the active runtime's types
#[cfg(feature = "runtime-tokio")]
pub use tokio_impl::*;

#[cfg(feature = "runtime-async-std")]
pub use async_std_impl::*;

#[cfg(feature = "runtime-smol")]
pub use smol_impl::*;

/// A boxed future type for runtime abstraction.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for a connected async TCP stream.
pub trait AsyncTcpStream: Send + Sized {
    /// Open a connection to the specified address.
    fn connect(addr: &str) -> impl Future<Output = io::Result<Self>> + Send;

    /// Fill `buf` completely, failing with `UnexpectedEof` if the peer closes first.
    fn read_exact(&mut self, buf: &mut [u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Read until the peer closes the connection.
    fn read_to_end(&mut self, buf: &mut Vec<u8>) -> impl Future<Output = io::Result<usize>> + Send;

    /// Write the whole buffer.
    fn write_all(&mut self, buf: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Flush and close the write half.
    fn shutdown(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

/// Trait for an async TCP listener.
pub trait AsyncTcpListener: Send + Sync + Sized {
    /// Stream type produced by [`AsyncTcpListener::accept`].
    type Stream: AsyncTcpStream + 'static;

    /// Bind to the specified address.
    fn bind(addr: &str) -> impl Future<Output = io::Result<Self>> + Send;

    /// Wait for the next inbound connection.
    fn accept(&self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;

    /// The address the listener is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Trait for async task spawning.
///
/// This trait abstracts over different async runtime's task spawning mechanisms.
pub trait Spawner {
    /// A handle to a spawned task.
    type JoinHandle<T: Send + 'static>: Future<Output = T> + Send;

    /// Spawn a future as a background task.
    fn spawn<F, T>(future: F) -> Self::JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static;
}

/// Sleep for the specified duration.
pub async fn sleep(duration: Duration) {
    sleep_impl(duration).await
}

/// Run a future with a timeout.
///
/// Returns `Err(TimedOut)` if the timeout expires before the future completes.
pub async fn timeout<F, T>(duration: Duration, future: F) -> Result<T, TimedOut>
where
    F: Future<Output = T>,
{
    timeout_impl(duration, future).await
}

/// Run a blocking closure on the runtime's blocking thread pool.
pub async fn spawn_blocking<F, T>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    spawn_blocking_impl(f).await
}

/// Error returned when a timeout expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut;

impl std::fmt::Display for TimedOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation timed out")
    }
}

impl std::error::Error for TimedOut {}

// Async mutex re-export
#[cfg(feature = "runtime-tokio")]
pub use tokio::sync::Mutex;

#[cfg(feature = "runtime-async-std")]
pub use async_std::sync::Mutex;

#[cfg(feature = "runtime-smol")]
pub use async_lock::Mutex;

// JoinHandle type alias for task spawning
#[cfg(feature = "runtime-tokio")]
pub type JoinHandle<T> = tokio_impl::TokioJoinHandle<T>;

#[cfg(feature = "runtime-async-std")]
pub type JoinHandle<T> = async_std_impl::AsyncStdJoinHandle<T>;

#[cfg(feature = "runtime-smol")]
pub type JoinHandle<T> = smol_impl::SmolJoinHandle<T>;

// Compile-time check to ensure exactly one runtime is selected
#[cfg(not(any(
    feature = "runtime-tokio",
    feature = "runtime-async-std",
    feature = "runtime-smol"
)))]
compile_error!(
    "One of \"runtime-tokio\", \"runtime-async-std\", or \"runtime-smol\" features must be enabled"
);

#[cfg(all(feature = "runtime-tokio", feature = "runtime-async-std"))]
compile_error!("Features \"runtime-tokio\" and \"runtime-async-std\" are mutually exclusive");

#[cfg(all(feature = "runtime-tokio", feature = "runtime-smol"))]
compile_error!("Features \"runtime-tokio\" and \"runtime-smol\" are mutually exclusive");

#[cfg(all(feature = "runtime-async-std", feature = "runtime-smol"))]
compile_error!("Features \"runtime-async-std\" and \"runtime-smol\" are mutually exclusive");
