//! Shared frame model and binary codec for the StratoNet TCP protocol.
//!
//! This crate owns the wire representation used by both `server` and `cli`.
//! Every message is one length-prefixed frame:
//!
//! ```text
//! byte    phase      (0 = Auth, 1 = Query)
//! byte    type       (meaning depends on phase)
//! int32   length     (payload byte count, big-endian, >= 0)
//! bytes   payload    (exactly `length` bytes)
//! ```
//!
//! No checksum and no compression; integrity is left to TCP.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Bytes preceding the payload: phase, type and the 4-byte length.
pub const HEADER_LEN: usize = 6;

/// Largest payload either side will accept. Image-of-the-day assets are the
/// biggest frames on the wire.
pub const MAX_PAYLOAD_LEN: usize = 32 * 1024 * 1024;

/// Separates the session token from the request argument in query payloads.
pub const QUERY_SEPARATOR: u8 = b'\n';

/// Error returned by the decoding side of the codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The peer closed the stream cleanly between two frames.
    #[error("connection closed")]
    Closed,
    /// The stream ended before the header or payload was complete.
    #[error("stream ended mid-frame: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    /// The phase byte does not map to a known [`Phase`].
    #[error("invalid frame phase: {0}")]
    InvalidPhase(u8),
    /// The length field is negative.
    #[error("negative payload length: {0}")]
    NegativeLength(i32),
    /// The length field exceeds [`MAX_PAYLOAD_LEN`].
    #[error("payload length {0} exceeds limit")]
    PayloadTooLarge(usize),
    /// The payload is longer than `i32::MAX` and cannot be framed.
    #[error("payload of {0} bytes cannot be encoded")]
    Unencodable(usize),
    /// A buffer held bytes past the end of the frame.
    #[error("{0} trailing bytes after frame")]
    TrailingBytes(usize),
    /// Transport failure while reading or writing.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// PHASE AND TYPE CODES
// =============================================================================

/// Connection phase a frame belongs to. Governs which type codes are valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Auth,
    Query,
}

impl Phase {
    /// Wire tag for this phase.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Auth => 0,
            Self::Query => 1,
        }
    }

    fn from_u8(value: u8) -> Result<Self, CodecError> {
        match value {
            0 => Ok(Self::Auth),
            1 => Ok(Self::Query),
            other => Err(CodecError::InvalidPhase(other)),
        }
    }
}

/// Type codes valid in the [`Phase::Auth`] phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthType {
    /// client -> server: username or password.
    Request,
    /// server -> client: prompt text.
    Challenge,
    /// server -> client: issued token.
    Success,
    /// server -> client: terminal failure message.
    Fail,
}

impl AuthType {
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Request => 0,
            Self::Challenge => 1,
            Self::Success => 2,
            Self::Fail => 3,
        }
    }

    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Request),
            1 => Some(Self::Challenge),
            2 => Some(Self::Success),
            3 => Some(Self::Fail),
            _ => None,
        }
    }
}

/// Type codes valid in the [`Phase::Query`] phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryType {
    /// Image of the day for a `YYYY-MM-DD` date; the reply carries raw bytes.
    Image,
    /// Weather sample; the reply carries text.
    Weather,
    /// Disconnect request or notice, either direction.
    Exit,
    /// server -> client: successful reply (also used for the welcome banner).
    Success,
    /// server -> client: the request failed but the session stays open.
    Fail,
}

impl QueryType {
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Image => 0,
            Self::Weather => 1,
            Self::Exit => 2,
            Self::Success => 3,
            Self::Fail => 4,
        }
    }

    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Image),
            1 => Some(Self::Weather),
            2 => Some(Self::Exit),
            3 => Some(Self::Success),
            4 => Some(Self::Fail),
            _ => None,
        }
    }
}

// =============================================================================
// FRAME
// =============================================================================

/// A single protocol message.
///
/// The type code is kept raw so that frames with codes unknown to this build
/// still decode; use [`Frame::auth_type`] / [`Frame::query_type`] to interpret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub phase: Phase,
    pub code: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    #[must_use]
    pub fn auth(kind: AuthType, payload: impl Into<Vec<u8>>) -> Self {
        Self { phase: Phase::Auth, code: kind.as_u8(), payload: payload.into() }
    }

    #[must_use]
    pub fn query(kind: QueryType, payload: impl Into<Vec<u8>>) -> Self {
        Self { phase: Phase::Query, code: kind.as_u8(), payload: payload.into() }
    }

    /// Auth type of this frame, `None` for query frames or unknown codes.
    #[must_use]
    pub fn auth_type(&self) -> Option<AuthType> {
        match self.phase {
            Phase::Auth => AuthType::from_u8(self.code),
            Phase::Query => None,
        }
    }

    /// Query type of this frame, `None` for auth frames or unknown codes.
    #[must_use]
    pub fn query_type(&self) -> Option<QueryType> {
        match self.phase {
            Phase::Query => QueryType::from_u8(self.code),
            Phase::Auth => None,
        }
    }

    /// Payload interpreted as UTF-8, with invalid sequences replaced.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

// =============================================================================
// BUFFER CODEC
// =============================================================================

/// Encode a frame into its wire bytes.
///
/// # Errors
///
/// Returns [`CodecError::Unencodable`] when the payload does not fit the
/// signed 32-bit length field.
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, CodecError> {
    let header = encode_header(frame)?;
    let mut out = Vec::with_capacity(HEADER_LEN + frame.payload.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(&frame.payload);
    Ok(out)
}

/// Decode exactly one frame from `bytes`.
///
/// # Errors
///
/// Returns [`CodecError::Truncated`] for short input,
/// [`CodecError::TrailingBytes`] when `bytes` holds more than one frame, and
/// the header validation errors of [`read_frame`].
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::Closed);
    }
    let Some(header) = bytes.get(..HEADER_LEN) else {
        return Err(CodecError::Truncated { expected: HEADER_LEN, actual: bytes.len() });
    };
    let (phase, code, len) = parse_header(header)?;
    let body = &bytes[HEADER_LEN..];
    match body.len().cmp(&len) {
        std::cmp::Ordering::Less => Err(CodecError::Truncated { expected: len, actual: body.len() }),
        std::cmp::Ordering::Greater => Err(CodecError::TrailingBytes(body.len() - len)),
        std::cmp::Ordering::Equal => Ok(Frame { phase, code, payload: body.to_vec() }),
    }
}

fn encode_header(frame: &Frame) -> Result<[u8; HEADER_LEN], CodecError> {
    let len = i32::try_from(frame.payload.len()).map_err(|_| CodecError::Unencodable(frame.payload.len()))?;
    let mut header = [0u8; HEADER_LEN];
    header[0] = frame.phase.as_u8();
    header[1] = frame.code;
    header[2..].copy_from_slice(&len.to_be_bytes());
    Ok(header)
}

fn parse_header(header: &[u8]) -> Result<(Phase, u8, usize), CodecError> {
    let phase = Phase::from_u8(header[0])?;
    let code = header[1];
    let raw = i32::from_be_bytes([header[2], header[3], header[4], header[5]]);
    let len = usize::try_from(raw).map_err(|_| CodecError::NegativeLength(raw))?;
    if len > MAX_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLarge(len));
    }
    Ok((phase, code, len))
}

// =============================================================================
// STREAM CODEC
// =============================================================================

/// Read one frame, waiting until the full payload has arrived.
///
/// # Errors
///
/// Returns [`CodecError::Closed`] if the stream ends before the first header
/// byte, [`CodecError::Truncated`] if it ends anywhere after that, and the
/// header validation errors otherwise.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let first = read_full(reader, &mut header).await?;
    if first == 0 {
        return Err(CodecError::Closed);
    }
    if first < HEADER_LEN {
        return Err(CodecError::Truncated { expected: HEADER_LEN, actual: first });
    }

    let (phase, code, len) = parse_header(&header)?;
    let mut payload = vec![0u8; len];
    let got = read_full(reader, &mut payload).await?;
    if got < len {
        return Err(CodecError::Truncated { expected: len, actual: got });
    }
    Ok(Frame { phase, code, payload })
}

/// Write one frame and flush it.
///
/// # Errors
///
/// Returns [`CodecError::Unencodable`] for oversize payloads and
/// [`CodecError::Io`] on transport failure.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let header = encode_header(frame)?;
    writer.write_all(&header).await?;
    writer.write_all(&frame.payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Fill `buf` as far as the stream allows. Returns the number of bytes read,
/// which is short of `buf.len()` only at EOF.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

// =============================================================================
// QUERY PAYLOAD
// =============================================================================

/// Build a query request payload: the session token, then the argument.
#[must_use]
pub fn query_payload(token: &str, argument: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(token.len() + 1 + argument.len());
    out.extend_from_slice(token.as_bytes());
    if !argument.is_empty() {
        out.push(QUERY_SEPARATOR);
        out.extend_from_slice(argument.as_bytes());
    }
    out
}

/// Split a query request payload into `(token, argument)`. The argument is
/// empty when the payload carries only a token.
#[must_use]
pub fn split_query_payload(payload: &[u8]) -> (String, String) {
    let text = String::from_utf8_lossy(payload);
    match text.split_once(char::from(QUERY_SEPARATOR)) {
        Some((token, argument)) => (token.to_owned(), argument.trim().to_owned()),
        None => (text.into_owned(), String::new()),
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
