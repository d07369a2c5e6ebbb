//! Message framing over a byte stream.
//!
//! Each frame is a big-endian `u32` length followed by one encoded packet.
//! Reading yields raw packet bytes so that a malformed packet can be dropped
//! without tearing down the connection.

use crate::packet::{CodecError, Packet, MAX_PACKET_LEN};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame of {0} bytes exceeds the packet size limit")]
    TooLarge(usize),
    #[error("could not encode packet: {0}")]
    Codec(#[from] CodecError),
}

pub async fn write_frame<W>(writer: &mut W, packet: &Packet) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = packet.encode()?;
    if bytes.len() > MAX_PACKET_LEN {
        return Err(FrameError::TooLarge(bytes.len()));
    }
    writer.write_u32(bytes.len() as u32).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads the next frame. Returns `Ok(None)` once the peer has closed the stream.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_PACKET_LEN {
        return Err(FrameError::TooLarge(len));
    }

    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes).await?;
    Ok(Some(bytes))
}
