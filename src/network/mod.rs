pub mod codec;
pub mod packet;
pub mod sink;

use anyhow::{bail, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const FRAME_MAGIC: u8 = 0xAA;
pub const FRAME_HEADER_LEN: usize = 5;

/// Read one 0xAA-framed packet body from `stream`.
/// `max_len` bounds the declared body length.
pub async fn read_framed_packet<R>(stream: &mut R, max_len: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    stream.read_exact(&mut header).await?;
    if header[0] != FRAME_MAGIC {
        bail!("expected 0xAA header, got {:02X}", header[0]);
    }
    let body_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    if body_len > max_len {
        bail!("frame of {} bytes exceeds limit {}", body_len, max_len);
    }
    let mut buf = vec![0u8; body_len];
    stream.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Write `body` as one 0xAA-framed packet.
pub async fn write_framed_packet<W>(stream: &mut W, body: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(body.len())?;
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
    frame.push(FRAME_MAGIC);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(body);
    stream.write_all(&frame).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_round_trip() {
        let (mut client, mut server) = tokio::io::duplex(256);
        write_framed_packet(&mut client, b"hello").await.unwrap();
        assert_eq!(read_framed_packet(&mut server, 64).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_bad_magic_and_oversize() {
        let (mut client, mut server) = tokio::io::duplex(256);
        client.write_all(&[0x55, 0, 0, 0, 1, 0]).await.unwrap();
        assert!(read_framed_packet(&mut server, 64).await.is_err());

        let (mut client, mut server) = tokio::io::duplex(256);
        write_framed_packet(&mut client, &[0u8; 100]).await.unwrap();
        assert!(read_framed_packet(&mut server, 64).await.is_err());
    }
}
