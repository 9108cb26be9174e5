//! smol runtime implementation.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_io::Timer;
use futures::io::{AsyncReadExt, AsyncWriteExt};
use smol::net::{TcpListener as SmolTcpListener, TcpStream as SmolTcpStream};

use super::{AsyncTcpListener, AsyncTcpStream, Spawner, TimedOut};

/// smol-based TCP stream.
pub struct TcpStream(SmolTcpStream);

impl AsyncTcpStream for TcpStream {
    async fn connect(addr: &str) -> io::Result<Self> {
        SmolTcpStream::connect(addr).await.map(TcpStream)
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

/// smol-based TCP listener.
pub struct TcpListener(SmolTcpListener);

impl AsyncTcpListener for TcpListener {
    type Stream = TcpStream;

    async fn bind(addr: &str) -> io::Result<Self> {
        SmolTcpListener::bind(addr).await.map(TcpListener)
    }

    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = self.0.accept().await?;
        Ok((TcpStream(stream), addr))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.0.local_addr()
    }
}

/// smol task spawner.
pub struct SmolSpawner;

impl Spawner for SmolSpawner {
    type JoinHandle<T: Send + 'static> = SmolJoinHandle<T>;

    fn spawn<F, T>(future: F) -> Self::JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        SmolJoinHandle(smol::spawn(future))
    }
}

/// Wrapper around smol's Task.
pub struct SmolJoinHandle<T>(smol::Task<T>);

impl<T> Future for SmolJoinHandle<T> {
    type Output = T;

    fn poll(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        std::pin::Pin::new(&mut self.0).poll(cx)
    }
}

impl<T: Send + 'static> SmolJoinHandle<T> {
    /// Let the task run to completion in the background.
    ///
    /// smol cancels a task when its handle is dropped, so fire-and-forget
    /// tasks must be detached explicitly.
    pub fn detach(self) {
        self.0.detach();
    }
}

/// Sleep for the specified duration using smol.
pub async fn sleep_impl(duration: Duration) {
    Timer::after(duration).await;
}

/// Run a future with a timeout using smol.
pub async fn timeout_impl<F, T>(duration: Duration, future: F) -> Result<T, TimedOut>
where
    F: Future<Output = T>,
{
    use futures::future::Either;

    let timeout_future = Timer::after(duration);

    futures::pin_mut!(future);
    futures::pin_mut!(timeout_future);

    match futures::future::select(future, timeout_future).await {
        Either::Left((result, _)) => Ok(result),
        Either::Right((_, _)) => Err(TimedOut),
    }
}

/// Run a blocking closure on smol's blocking pool.
pub async fn spawn_blocking_impl<F, T>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    smol::unblock(f).await
}

/// Spawn a task using smol.
pub fn spawn<F, T>(future: F) -> SmolJoinHandle<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    SmolSpawner::spawn(future)
}
