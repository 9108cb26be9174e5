//! Client side of the control plane.

use log::{debug, warn};

use crate::errors::Error;
use crate::orchestrator::StreamTarget;
use crate::protocol::{self, Control};
use crate::request::BatchRequest;
use crate::runtime::{AsyncTcpStream, TcpStream};

type Result<T> = std::result::Result<T, Error>;

async fn connect(addr: &str) -> Result<TcpStream> {
    TcpStream::connect(addr)
        .await
        .map_err(|e| Error::socket("connect", e))
}

/// Send one batch request and close the connection.
pub async fn send_request(addr: &str, request: &BatchRequest) -> Result<()> {
    let payload = request.to_json()?;
    let mut stream = connect(addr).await?;
    protocol::write_frame(&mut stream, &payload).await?;
    stream
        .shutdown()
        .await
        .map_err(|e| Error::socket("shutdown", e))
}

/// Fetch the current color of every device.
pub async fn query_state(addr: &str) -> Result<Vec<String>> {
    let mut stream = connect(addr).await?;
    protocol::write_frame(&mut stream, Control::GetState.as_ref()).await?;

    let mut body = Vec::new();
    stream
        .read_to_end(&mut body)
        .await
        .map_err(|e| Error::socket("read", e))?;
    serde_json::from_slice(&body).map_err(Error::JsonLoad)
}

/// An open streaming session to one device or group.
///
/// A broken connection is reopened once per token before giving up.
pub struct StreamSession {
    addr: String,
    target: StreamTarget,
    stream: TcpStream,
}

impl StreamSession {
    pub async fn open(addr: &str, target: StreamTarget) -> Result<Self> {
        let stream = Self::handshake(addr, &target).await?;
        Ok(StreamSession {
            addr: addr.to_string(),
            target,
            stream,
        })
    }

    async fn handshake(addr: &str, target: &StreamTarget) -> Result<TcpStream> {
        let mut stream = connect(addr).await?;
        match target {
            StreamTarget::Device(index) => {
                protocol::write_frame(&mut stream, Control::Stream.as_ref()).await?;
                protocol::write_frame(&mut stream, &index.to_string()).await?;
            }
            StreamTarget::Group(group) => {
                protocol::write_frame(&mut stream, Control::StreamGroup.as_ref()).await?;
                protocol::write_frame(&mut stream, group).await?;
            }
        }
        debug!("Streaming session open to {}", target);
        Ok(stream)
    }

    pub fn target(&self) -> &StreamTarget {
        &self.target
    }

    /// Send one token to the target.
    pub async fn send(&mut self, token: &str) -> Result<()> {
        if let Err(e) = protocol::write_frame(&mut self.stream, token).await {
            warn!("Streaming connection lost ({}), reconnecting", e);
            self.stream = Self::handshake(&self.addr, &self.target).await?;
            protocol::write_frame(&mut self.stream, token).await?;
        }
        Ok(())
    }

    /// Leave streaming mode and close the connection.
    pub async fn close(mut self) -> Result<()> {
        protocol::write_frame(&mut self.stream, Control::NoStream.as_ref()).await?;
        self.stream
            .shutdown()
            .await
            .map_err(|e| Error::socket("shutdown", e))
    }
}
