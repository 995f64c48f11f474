//! List-ping wire format.
//!
//! Every packet is framed as
//!
//! ```text
//! +----------------+----------------+---------------------+
//! | length: VarInt | id: VarInt     | payload             |
//! +----------------+----------------+---------------------+
//!                  |<------------ length bytes ---------->|
//! ```
//!
//! A status query is a handshake (id 0x00, next state 1) followed by an
//! empty status request (id 0x00). The server answers with one packet
//! (id 0x00) whose payload is a length-prefixed JSON document.

use crate::types::ServerStatus;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::string::FromUtf8Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Packet id shared by the handshake, the status request and the response
pub const PACKET_ID_STATUS: i32 = 0x00;

/// Protocol version sent when the client does not know the server's version
pub const HANDSHAKE_PROTOCOL_VERSION: i32 = -1;

/// Handshake "next state" value selecting the status exchange
pub const NEXT_STATE_STATUS: i32 = 1;

/// Upper bound for a single response frame (favicons are large)
pub const MAX_PACKET_LEN: usize = 2 * 1024 * 1024;

const VARINT_MAX_BYTES: usize = 5;

/// Wire-level failure
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed before the response was complete")]
    Truncated,

    #[error("VarInt longer than 5 bytes")]
    VarIntTooLong,

    #[error("invalid length prefix {0}")]
    InvalidLength(i32),

    #[error("packet of {0} bytes exceeds the 2 MiB limit")]
    PacketTooLarge(usize),

    #[error("unexpected packet id {0:#04x}")]
    UnexpectedPacket(i32),

    #[error("status string is not UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),

    #[error("status document is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Append a VarInt.
pub fn put_varint(buf: &mut BytesMut, value: i32) {
    let mut v = value as u32;
    loop {
        if v & !0x7f == 0 {
            buf.put_u8(v as u8);
            return;
        }
        buf.put_u8((v & 0x7f) as u8 | 0x80);
        v >>= 7;
    }
}

/// Read a VarInt from an in-memory buffer.
pub fn get_varint(buf: &mut impl Buf) -> Result<i32, ProtocolError> {
    let mut result: u32 = 0;
    for i in 0..VARINT_MAX_BYTES {
        if !buf.has_remaining() {
            return Err(ProtocolError::Truncated);
        }
        let byte = buf.get_u8();
        result |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(result as i32);
        }
    }
    Err(ProtocolError::VarIntTooLong)
}

/// Read a VarInt from a stream.
pub async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32, ProtocolError> {
    let mut result: u32 = 0;
    for i in 0..VARINT_MAX_BYTES {
        let byte = reader.read_u8().await.map_err(eof_as_truncated)?;
        result |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(result as i32);
        }
    }
    Err(ProtocolError::VarIntTooLong)
}

/// Append a length-prefixed UTF-8 string.
pub fn put_string(buf: &mut BytesMut, value: &str) {
    put_varint(buf, value.len() as i32);
    buf.put_slice(value.as_bytes());
}

/// Read a length-prefixed UTF-8 string.
pub fn get_string(buf: &mut impl Buf) -> Result<String, ProtocolError> {
    let len = get_varint(buf)?;
    let len = usize::try_from(len).map_err(|_| ProtocolError::InvalidLength(len))?;
    if buf.remaining() < len {
        return Err(ProtocolError::Truncated);
    }
    let raw = buf.copy_to_bytes(len);
    Ok(String::from_utf8(raw.to_vec())?)
}

/// Frame a packet: length prefix, packet id, payload.
pub fn frame(packet_id: i32, payload: &[u8]) -> Bytes {
    let mut body = BytesMut::with_capacity(payload.len() + VARINT_MAX_BYTES);
    put_varint(&mut body, packet_id);
    body.put_slice(payload);

    let mut out = BytesMut::with_capacity(body.len() + VARINT_MAX_BYTES);
    put_varint(&mut out, body.len() as i32);
    out.put(body);
    out.freeze()
}

/// Handshake packet switching the connection into the status state.
pub fn handshake(host: &str, port: u16) -> Bytes {
    let mut payload = BytesMut::new();
    put_varint(&mut payload, HANDSHAKE_PROTOCOL_VERSION);
    put_string(&mut payload, host);
    payload.put_u16(port);
    put_varint(&mut payload, NEXT_STATE_STATUS);
    frame(PACKET_ID_STATUS, &payload)
}

/// Empty status request packet.
pub fn status_request() -> Bytes {
    frame(PACKET_ID_STATUS, &[])
}

/// Server side: status response packet carrying `json`.
pub fn status_response(json: &str) -> Bytes {
    let mut payload = BytesMut::with_capacity(json.len() + VARINT_MAX_BYTES);
    put_string(&mut payload, json);
    frame(PACKET_ID_STATUS, &payload)
}

/// Read one framed packet and return its id and payload.
pub async fn read_packet<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<(i32, Bytes), ProtocolError> {
    let len = read_varint(reader).await?;
    let len = match usize::try_from(len) {
        Ok(0) | Err(_) => return Err(ProtocolError::InvalidLength(len)),
        Ok(len) if len > MAX_PACKET_LEN => return Err(ProtocolError::PacketTooLarge(len)),
        Ok(len) => len,
    };

    let mut raw = vec![0u8; len];
    reader.read_exact(&mut raw).await.map_err(eof_as_truncated)?;

    let mut body = Bytes::from(raw);
    let packet_id = get_varint(&mut body)?;
    Ok((packet_id, body))
}

/// Decode the payload of a status response packet.
pub fn decode_status(mut payload: Bytes) -> Result<ServerStatus, ProtocolError> {
    let json = get_string(&mut payload)?;
    Ok(serde_json::from_str(&json)?)
}

/// Run the handshake and status exchange over an open stream.
pub async fn query_status<S>(
    stream: &mut S,
    host: &str,
    port: u16,
) -> Result<ServerStatus, ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&handshake(host, port)).await?;
    stream.write_all(&status_request()).await?;
    stream.flush().await?;

    let (packet_id, payload) = read_packet(stream).await?;
    if packet_id != PACKET_ID_STATUS {
        return Err(ProtocolError::UnexpectedPacket(packet_id));
    }
    decode_status(payload)
}

fn eof_as_truncated(err: std::io::Error) -> ProtocolError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        ProtocolError::Truncated
    } else {
        ProtocolError::Io(err)
    }
}
