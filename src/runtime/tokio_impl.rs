//! Tokio runtime implementation.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener as TokioTcpListener, TcpStream as TokioTcpStream};

use super::{AsyncTcpListener, AsyncTcpStream, Spawner, TimedOut};

/// Tokio-based TCP stream.
pub struct TcpStream(TokioTcpStream);

impl AsyncTcpStream for TcpStream {
    async fn connect(addr: &str) -> io::Result<Self> {
        TokioTcpStream::connect(addr).await.map(TcpStream)
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.0.read_exact(buf).await.map(|_| ())
    }

    async fn read_to_end(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        self.0.read_to_end(buf).await
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.0.write_all(buf).await
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        self.0.shutdown().await
    }
}

/// Tokio-based TCP listener.
pub struct TcpListener(TokioTcpListener);

impl AsyncTcpListener for TcpListener {
    type Stream = TcpStream;

    async fn bind(addr: &str) -> io::Result<Self> {
        TokioTcpListener::bind(addr).await.map(TcpListener)
    }

    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = self.0.accept().await?;
        Ok((TcpStream(stream), addr))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.0.local_addr()
    }
}

/// Tokio task spawner.
pub struct TokioSpawner;

impl Spawner for TokioSpawner {
    type JoinHandle<T: Send + 'static> = TokioJoinHandle<T>;

    fn spawn<F, T>(future: F) -> Self::JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        TokioJoinHandle(tokio::spawn(future))
    }
}

/// Wrapper around tokio's JoinHandle that extracts the value on await.
pub struct TokioJoinHandle<T>(tokio::task::JoinHandle<T>);

impl<T> Future for TokioJoinHandle<T> {
    type Output = T;

    fn poll(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        use std::task::Poll;
        match std::pin::Pin::new(&mut self.0).poll(cx) {
            Poll::Ready(Ok(v)) => Poll::Ready(v),
            Poll::Ready(Err(e)) => {
                // Task was cancelled or panicked - propagate panic
                if e.is_panic() {
                    std::panic::resume_unwind(e.into_panic());
                }
                // Task was cancelled - this shouldn't happen in normal usage
                panic!("Task was cancelled unexpectedly");
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T: Send + 'static> TokioJoinHandle<T> {
    /// Let the task run to completion in the background.
    pub fn detach(self) {
        drop(self.0);
    }
}

/// Sleep for the specified duration using tokio.
pub async fn sleep_impl(duration: Duration) {
    tokio::time::sleep(duration).await
}

/// Run a future with a timeout using tokio.
pub async fn timeout_impl<F, T>(duration: Duration, future: F) -> Result<T, TimedOut>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimedOut)
}

/// Run a blocking closure on tokio's blocking pool.
pub async fn spawn_blocking_impl<F, T>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(v) => v,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => panic!("Blocking task was cancelled unexpectedly"),
    }
}

/// Spawn a task using tokio.
pub fn spawn<F, T>(future: F) -> TokioJoinHandle<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    TokioSpawner::spawn(future)
}
