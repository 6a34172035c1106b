use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;

/// Largest frame either side accepts unless configured otherwise.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;

/// Read one length-prefixed frame.
///
/// The declared length is validated before any of the body is read, so a
/// zero or oversized prefix fails without allocating or blocking on it.
pub async fn read_frame<R>(reader: &mut R, max_bytes: usize) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix).await?;
    let length = u32::from_le_bytes(prefix);

    if length == 0 || length as usize > max_bytes {
        return Err(ProtocolError::InvalidLength { length, max: max_bytes });
    }

    let mut body = vec![0u8; length as usize];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

pub async fn write_frame<W>(writer: &mut W, body: &[u8], max_bytes: usize) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let length = u32::try_from(body.len())
        .ok()
        .filter(|len| *len > 0 && (*len as usize) <= max_bytes)
        .ok_or(ProtocolError::InvalidLength {
            length: body.len().min(u32::MAX as usize) as u32,
            max: max_bytes,
        })?;

    writer.write_all(&length.to_le_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_message<R, T>(reader: &mut R, max_bytes: usize) -> Result<T, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let body = read_frame(reader, max_bytes).await?;
    Ok(serde_json::from_slice(&body)?)
}

pub async fn write_message<W, T>(writer: &mut W, message: &T, max_bytes: usize) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(message)?;
    write_frame(writer, &body, max_bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::IpcRequest;
    use crate::Action;
    use std::time::Duration;

    #[tokio::test]
    async fn test_request_survives_framing() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let request = IpcRequest::new(Action::GetUsageByDate, &serde_json::json!({"dateLocal": "2024-05-01"}))
            .unwrap();

        write_message(&mut client, &request, DEFAULT_MAX_FRAME_BYTES).await.unwrap();
        let received: IpcRequest = read_message(&mut server, DEFAULT_MAX_FRAME_BYTES).await.unwrap();

        assert_eq!(received, request);
    }

    #[tokio::test]
    async fn test_prefix_is_little_endian() {
        let (mut client, mut server) = tokio::io::duplex(64);
        write_frame(&mut client, b"{}", DEFAULT_MAX_FRAME_BYTES).await.unwrap();

        let mut raw = [0u8; 6];
        server.read_exact(&mut raw).await.unwrap();
        assert_eq!(raw, [2, 0, 0, 0, b'{', b'}']);
    }

    #[tokio::test]
    async fn test_oversize_length_rejected_before_body() {
        let (mut client, mut server) = tokio::io::duplex(64);
        // Only the prefix is ever sent; reading the body would hang
        client.write_all(&(2048u32).to_le_bytes()).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), read_frame(&mut server, 1024))
            .await
            .expect("read_frame must not wait for the body");

        assert!(matches!(result, Err(ProtocolError::InvalidLength { length: 2048, max: 1024 })));
    }

    #[tokio::test]
    async fn test_zero_length_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&0u32.to_le_bytes()).await.unwrap();

        let result = read_frame(&mut server, 1024).await;
        assert!(matches!(result, Err(ProtocolError::InvalidLength { length: 0, .. })));
    }

    #[tokio::test]
    async fn test_truncated_body_is_io_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&10u32.to_le_bytes()).await.unwrap();
        client.write_all(b"abc").await.unwrap();
        drop(client);

        let result = read_frame(&mut server, 1024).await;
        assert!(matches!(result, Err(ProtocolError::Io(_))));
    }

    #[tokio::test]
    async fn test_write_refuses_oversize_body() {
        let (mut client, _server) = tokio::io::duplex(64);
        let result = write_frame(&mut client, &[b'x'; 32], 16).await;
        assert!(matches!(result, Err(ProtocolError::InvalidLength { length: 32, max: 16 })));
    }
}
