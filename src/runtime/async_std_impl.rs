//! async-std runtime implementation.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_std::net::{TcpListener as AsyncStdTcpListener, TcpStream as AsyncStdTcpStream};
use futures::io::{AsyncReadExt, AsyncWriteExt};

use super::{AsyncTcpListener, AsyncTcpStream, Spawner, TimedOut};

/// async-std-based TCP stream.
pub struct TcpStream(AsyncStdTcpStream);

impl AsyncTcpStream for TcpStream {
    async fn connect(addr: &str) -> io::Result<Self> {
        AsyncStdTcpStream::connect(addr).await.map(TcpStream)
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        AsyncReadExt::read_exact(&mut self.0, buf).await
    }

    async fn read_to_end(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        AsyncReadExt::read_to_end(&mut self.0, buf).await
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        AsyncWriteExt::write_all(&mut self.0, buf).await
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        AsyncWriteExt::close(&mut self.0).await
    }
}

/// async-std-based TCP listener.
pub struct TcpListener(AsyncStdTcpListener);

impl AsyncTcpListener for TcpListener {
    type Stream = TcpStream;

    async fn bind(addr: &str) -> io::Result<Self> {
        AsyncStdTcpListener::bind(addr).await.map(TcpListener)
    }

    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = self.0.accept().await?;
        Ok((TcpStream(stream), addr))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.0.local_addr()
    }
}

/// async-std task spawner.
pub struct AsyncStdSpawner;

impl Spawner for AsyncStdSpawner {
    type JoinHandle<T: Send + 'static> = AsyncStdJoinHandle<T>;

    fn spawn<F, T>(future: F) -> Self::JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        AsyncStdJoinHandle(async_std::task::spawn(future))
    }
}

/// Wrapper around async-std's JoinHandle.
pub struct AsyncStdJoinHandle<T>(async_std::task::JoinHandle<T>);

impl<T> Future for AsyncStdJoinHandle<T> {
    type Output = T;

    fn poll(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        std::pin::Pin::new(&mut self.0).poll(cx)
    }
}

impl<T: Send + 'static> AsyncStdJoinHandle<T> {
    /// Let the task run to completion in the background.
    ///
    /// Dropping an async-std handle already detaches the task.
    pub fn detach(self) {
        drop(self.0);
    }
}

/// Sleep for the specified duration using async-std.
pub async fn sleep_impl(duration: Duration) {
    async_std::task::sleep(duration).await
}

/// Run a future with a timeout using async-std.
pub async fn timeout_impl<F, T>(duration: Duration, future: F) -> Result<T, TimedOut>
where
    F: Future<Output = T>,
{
    async_std::future::timeout(duration, future)
        .await
        .map_err(|_| TimedOut)
}

/// Run a blocking closure on async-std's blocking pool.
pub async fn spawn_blocking_impl<F, T>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    async_std::task::spawn_blocking(f).await
}

/// Spawn a task using async-std.
pub fn spawn<F, T>(future: F) -> AsyncStdJoinHandle<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    AsyncStdSpawner::spawn(future)
}
