//! Envelope codec: length-prefixed JSON framing.
//!
//! Every frame is a 4-byte big-endian body length followed by the JSON body.
//! The same framing is used over plain TCP and over TLS.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::ProtocolError;
use meshchat_messages::Envelope;

/// Maximum message size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024; // 16 MiB

const LEN_PREFIX: usize = 4;

/// Encode a message for transmission (length-prefixed JSON).
pub fn encode(message: &impl Serialize) -> Result<Vec<u8>, ProtocolError> {
    let body =
        serde_json::to_vec(message).map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))?;
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: body.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    let mut frame = Vec::with_capacity(LEN_PREFIX + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decode a message body (no length prefix).
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ProtocolError> {
    serde_json::from_slice(body).map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))
}

/// Decode one frame from the front of `data`.
///
/// Returns the message and the number of bytes consumed, or `Ok(None)` if
/// `data` does not yet hold a complete frame.
pub fn decode_framed<T: DeserializeOwned>(data: &[u8]) -> Result<Option<(T, usize)>, ProtocolError> {
    if data.len() < LEN_PREFIX {
        return Ok(None);
    }
    let mut len_buf = [0u8; LEN_PREFIX];
    len_buf.copy_from_slice(&data[..LEN_PREFIX]);
    let body_len = u32::from_be_bytes(len_buf) as usize;
    if body_len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: body_len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    let end = LEN_PREFIX + body_len;
    if data.len() < end {
        return Ok(None);
    }
    let message = decode(&data[LEN_PREFIX..end])?;
    Ok(Some((message, end)))
}

/// Read one envelope from a stream.
///
/// `Ok(None)` means the peer closed the stream cleanly between frames.
pub async fn read_envelope<R>(reader: &mut R) -> Result<Option<Envelope>, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut len_buf = [0u8; LEN_PREFIX];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let body_len = u32::from_be_bytes(len_buf) as usize;
    if body_len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: body_len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    let mut body = vec![0u8; body_len];
    reader.read_exact(&mut body).await?;
    decode(&body).map(Some)
}

/// Write one framed envelope and flush.
pub async fn write_envelope<W>(writer: &mut W, envelope: &Envelope) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let frame = encode(envelope)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
