//! Control-plane framing.
//!
//! Every message is a 4-digit ASCII decimal length followed by that many
//! bytes of UTF-8 payload, e.g. `0008getstate`. Payloads are either a JSON
//! [`BatchRequest`](crate::BatchRequest), one of the [`Control`] keywords,
//! or a bare token while streaming.

use std::io::ErrorKind;
use std::str::FromStr;

use strum_macros::{AsRefStr, Display, EnumString};

use crate::errors::Error;
use crate::runtime::AsyncTcpStream;

type Result<T> = std::result::Result<T, Error>;

pub const HEADER_LEN: usize = 4;
pub const MAX_PAYLOAD_LEN: usize = 9999;

/// Keywords recognised in place of a JSON request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
pub enum Control {
    /// Reply with the current color of every device, then close
    #[strum(serialize = "getstate")]
    GetState,
    /// The next frame is a device index to stream to
    #[strum(serialize = "stream")]
    Stream,
    /// The next frame is a group name to stream to
    #[strum(serialize = "streamgroup")]
    StreamGroup,
    /// Leave streaming mode and close
    #[strum(serialize = "nostream")]
    NoStream,
}

impl Control {
    pub fn parse(payload: &str) -> Option<Control> {
        Control::from_str(payload).ok()
    }
}

/// Parse a frame header into a payload length.
pub fn parse_header(header: &[u8]) -> Result<usize> {
    if header.len() != HEADER_LEN || !header.iter().all(u8::is_ascii_digit) {
        return Err(Error::malformed(format!(
            "bad frame header {:?}",
            String::from_utf8_lossy(header)
        )));
    }
    Ok(header
        .iter()
        .fold(0, |len, digit| len * 10 + usize::from(digit - b'0')))
}

/// Prefix `payload` with its length.
pub fn encode_frame(payload: &str) -> Result<Vec<u8>> {
    let len = payload.len();
    if len > MAX_PAYLOAD_LEN {
        return Err(Error::malformed(format!(
            "payload of {len} bytes does not fit a frame"
        )));
    }
    let mut frame = format!("{len:04}").into_bytes();
    frame.extend_from_slice(payload.as_bytes());
    Ok(frame)
}

/// Read one frame. `Ok(None)` means the peer closed the connection cleanly.
pub async fn read_frame<S: AsyncTcpStream>(stream: &mut S) -> Result<Option<String>> {
    let mut header = [0u8; HEADER_LEN];
    match stream.read_exact(&mut header).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(Error::socket("read", e)),
    }

    let len = parse_header(&header)?;
    let mut payload = vec![0u8; len];
    stream
        .read_exact(&mut payload)
        .await
        .map_err(|e| Error::socket("read", e))?;

    String::from_utf8(payload)
        .map(Some)
        .map_err(|e| Error::malformed(e.to_string()))
}

pub async fn write_frame<S: AsyncTcpStream>(stream: &mut S, payload: &str) -> Result<()> {
    let frame = encode_frame(payload)?;
    stream
        .write_all(&frame)
        .await
        .map_err(|e| Error::socket("write", e))
}
