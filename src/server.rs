//! TCP control plane.
//!
//! Each connection carries either one batch request, one `getstate` query,
//! or a streaming session:
//!
//! ```text
//! stream      -> device index -> token -> token -> ... -> nostream
//! streamgroup -> group name   -> token -> token -> ... -> nostream
//! ```
//!
//! When the last connection closes and nothing else arrives for a while,
//! every device is disconnected so other BLE clients can reach them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::errors::Error;
use crate::orchestrator::{Dispatch, Orchestrator, StreamTarget};
use crate::protocol::{self, Control};
use crate::request::{BatchRequest, Request};
use crate::runtime::{self, AsyncTcpListener, AsyncTcpStream, TcpListener};
use crate::tv::TvControl;
use crate::types::{ColorToken, Priority};

type Result<T> = std::result::Result<T, Error>;

/// Delay-then-disconnect timer, cancelled by any client activity.
///
/// Every schedule or cancel bumps the generation; a timer only fires if the
/// generation is still the one it was armed with.
#[derive(Debug)]
struct IdleDisconnect {
    generation: AtomicU64,
    delay: Duration,
}

impl IdleDisconnect {
    fn new(delay: Duration) -> Self {
        IdleDisconnect {
            generation: AtomicU64::new(0),
            delay,
        }
    }

    fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn schedule(self: &Arc<Self>, orchestrator: Arc<Orchestrator>) {
        let armed = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let idle = Arc::clone(self);
        runtime::spawn(async move {
            runtime::sleep(idle.delay).await;
            if idle.generation.load(Ordering::SeqCst) == armed {
                info!("Server unused, disconnecting devices.");
                orchestrator.disconnect_all().await;
            }
        })
        .detach();
    }
}

enum Mode {
    Command,
    AwaitDevice,
    AwaitGroup,
    Streaming(StreamTarget),
}

/// Serves the control-plane protocol on top of an [`Orchestrator`].
#[derive(Clone)]
pub struct LightServer {
    orchestrator: Arc<Orchestrator>,
    tv: Arc<dyn TvControl>,
    idle: Arc<IdleDisconnect>,
    read_timeout: Duration,
}

impl LightServer {
    pub const READ_TIMEOUT: Duration = Duration::from_secs(30);
    pub const IDLE_DISCONNECT: Duration = Duration::from_secs(60);

    pub fn new(orchestrator: Arc<Orchestrator>, tv: Arc<dyn TvControl>) -> Self {
        LightServer {
            orchestrator,
            tv,
            idle: Arc::new(IdleDisconnect::new(Self::IDLE_DISCONNECT)),
            read_timeout: Self::READ_TIMEOUT,
        }
    }

    /// Override the per-frame read timeout and the idle disconnect delay.
    pub fn with_timeouts(mut self, read_timeout: Duration, idle_disconnect: Duration) -> Self {
        self.read_timeout = read_timeout;
        self.idle = Arc::new(IdleDisconnect::new(idle_disconnect));
        self
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub async fn bind(&self, addr: &str) -> Result<TcpListener> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::socket("bind", e))?;
        if let Ok(local) = listener.local_addr() {
            info!("Listening on {}", local);
        }
        Ok(listener)
    }

    /// Switch every device on, then release the links until a client shows up.
    ///
    /// Subject to the quiet hours like any other request.
    pub async fn startup(&self) -> Result<Dispatch> {
        let count = self.orchestrator.device_count();
        let dispatch = self
            .orchestrator
            .apply_request(Request::uniform(count, ColorToken::On, Priority::new()))
            .await?;
        self.orchestrator.disconnect_all().await;
        Ok(dispatch)
    }

    /// Switch every device off, whatever the time, and disconnect.
    pub async fn shutdown(&self) -> Result<Dispatch> {
        let count = self.orchestrator.device_count();
        let dispatch = self
            .orchestrator
            .apply_request(
                Request::uniform(count, ColorToken::Off, Priority::new()).bypassing_quiet_hours(),
            )
            .await?;
        self.orchestrator.disconnect_all().await;
        Ok(dispatch)
    }

    /// Bind, run the startup request and serve forever.
    pub async fn run(&self, addr: &str) -> Result<()> {
        let listener = self.bind(addr).await?;
        self.startup().await?;
        self.serve(listener).await
    }

    /// Accept connections forever, one task each.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept a connection: {}", e);
                    continue;
                }
            };
            debug!("Connection from {}", peer);
            let server = self.clone();
            runtime::spawn(async move { server.handle_client(stream, peer).await }).detach();
        }
    }

    async fn handle_client<S: AsyncTcpStream>(self, mut stream: S, peer: SocketAddr) {
        match self.converse(&mut stream).await {
            Ok(()) => {}
            Err(e @ (Error::MalformedPayload(_) | Error::InvalidRequest(_))) => {
                error!("Rejected request from {}: {}", peer, e);
            }
            Err(e) => error!("Error serving {}: {}", peer, e),
        }

        debug!("Closing connection with {}", peer);
        let _ = stream.shutdown().await;
        self.idle.schedule(Arc::clone(&self.orchestrator));
    }

    async fn converse<S: AsyncTcpStream>(&self, stream: &mut S) -> Result<()> {
        let mut mode = Mode::Command;
        loop {
            let Some(frame) = self.next_frame(stream).await? else {
                return Ok(());
            };
            self.idle.cancel();

            if let Some(control) = Control::parse(&frame) {
                match control {
                    Control::GetState => return self.send_state(stream).await,
                    Control::Stream => mode = Mode::AwaitDevice,
                    Control::StreamGroup => mode = Mode::AwaitGroup,
                    Control::NoStream => {
                        debug!("Streaming ended by client");
                        return Ok(());
                    }
                }
                continue;
            }

            mode = match mode {
                Mode::Command => return self.handle_batch(&frame).await,
                Mode::AwaitDevice => {
                    let index = frame
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| Error::malformed(format!("bad device index {frame:?}")))?;
                    if index >= self.orchestrator.device_count() {
                        return Err(Error::DeviceNotFound(index));
                    }
                    info!("Streaming to device {}", index);
                    Mode::Streaming(StreamTarget::Device(index))
                }
                Mode::AwaitGroup => {
                    info!("Streaming to group {}", frame);
                    Mode::Streaming(StreamTarget::Group(frame))
                }
                Mode::Streaming(target) => {
                    self.orchestrator
                        .stream_write(&target, &ColorToken::from(frame.as_str()))
                        .await?;
                    Mode::Streaming(target)
                }
            };
        }
    }

    async fn next_frame<S: AsyncTcpStream>(&self, stream: &mut S) -> Result<Option<String>> {
        match runtime::timeout(self.read_timeout, protocol::read_frame(stream)).await {
            Ok(frame) => frame,
            Err(_) => {
                debug!("No frame within {:?}, closing", self.read_timeout);
                Ok(None)
            }
        }
    }

    async fn send_state<S: AsyncTcpStream>(&self, stream: &mut S) -> Result<()> {
        let state = self.orchestrator.query_state().await;
        debug!("Sending state {:?}", state);
        let body = serde_json::to_vec(&state).map_err(Error::JsonDump)?;
        stream
            .write_all(&body)
            .await
            .map_err(|e| Error::socket("write", e))
    }

    async fn handle_batch(&self, payload: &str) -> Result<()> {
        let batch = BatchRequest::from_json(payload)?;
        info!("Change of lights requested: {:?}", batch);
        let plan = self.orchestrator.plan(&batch).await?;

        for action in plan.tv {
            if let Err(e) = self.tv.apply(action).await {
                error!("TV action {} failed: {}", action, e);
            }
        }

        if let Some(request) = plan.request {
            match self.orchestrator.apply_request(request).await? {
                Dispatch::Dropped => info!("Request dropped by the quiet hours"),
                Dispatch::Queued => debug!("Request queued behind the running cycle"),
                Dispatch::Applied => debug!("Request applied"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::Settings;
    use crate::transport::mock::{Event, MockConnector};
    use crate::types::DeviceKind;

    fn orchestrator(connector: &MockConnector) -> Arc<Orchestrator> {
        let device = crate::device::Device::new(
            0,
            "AA",
            "Desk",
            "salon",
            None,
            crate::device::Profile::Playbulb {
                default_intensity: "ff000000".to_string(),
            },
            Arc::new(connector.clone()),
        );
        Arc::new(Orchestrator::new(vec![device], Settings::default()))
    }

    #[tokio::test]
    async fn test_startup_and_shutdown() {
        let connector = MockConnector::new();
        let server = LightServer::new(
            orchestrator(&connector),
            Arc::new(crate::tv::ShellTvControl::default()),
        );

        assert_eq!(server.startup().await.unwrap(), Dispatch::Applied);
        assert_eq!(server.orchestrator().query_state().await, vec!["ff000000"]);
        assert_eq!(
            connector.events(),
            vec![
                Event::Connect("AA".into()),
                Event::Write("AA".into(), DeviceKind::Playbulb.characteristic(), vec![0xff, 0, 0, 0]),
                Event::Disconnect("AA".into()),
            ]
        );

        assert_eq!(server.shutdown().await.unwrap(), Dispatch::Applied);
        assert_eq!(
            server.orchestrator().query_state().await,
            vec!["00000000"]
        );
        assert_eq!(connector.events().last(), Some(&Event::Disconnect("AA".into())));
    }

    #[tokio::test]
    async fn test_idle_disconnect_cancelled_by_activity() {
        let connector = MockConnector::new();
        let orchestrator = orchestrator(&connector);
        orchestrator
            .apply_request(Request::uniform(1, ColorToken::On, Priority::new()).bypassing_quiet_hours())
            .await
            .unwrap();

        let idle = Arc::new(IdleDisconnect::new(Duration::from_millis(50)));
        idle.schedule(Arc::clone(&orchestrator));
        idle.cancel();
        runtime::sleep(Duration::from_millis(120)).await;
        assert!(!connector.events().contains(&Event::Disconnect("AA".into())));

        idle.schedule(Arc::clone(&orchestrator));
        runtime::sleep(Duration::from_millis(120)).await;
        assert!(connector.events().contains(&Event::Disconnect("AA".into())));
    }
}
