//! Length-prefixed framing: a little-endian i64 byte count followed by the
//! payload. The codec carries opaque bytes; callers JSON-encode on top.

use flash_core::FlashError;
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Write one frame.
pub async fn send_bytes<S>(payload: &[u8], stream: &mut S) -> Result<(), FlashError>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    let len = payload.len() as i64;
    stream.write_all(&len.to_le_bytes()).await?;
    stream.write_all(payload).await?;
    stream.flush().await?;
    Ok(())
}

/// Read one frame. Header and payload come from the same reader.
///
/// EOF before the announced length is reached is a `ShortRead`.
pub async fn receive_bytes<S>(stream: &mut S) -> Result<Vec<u8>, FlashError>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; 8];
    read_full(stream, &mut header).await?;

    let len = i64::from_le_bytes(header);
    if len < 0 {
        return Err(FlashError::InvalidFrameLength(len));
    }

    let mut payload = vec![0u8; len as usize];
    read_full(stream, &mut payload).await?;
    Ok(payload)
}

async fn read_full<S>(stream: &mut S, buf: &mut [u8]) -> Result<(), FlashError>
where
    S: AsyncRead + Unpin + ?Sized,
{
    stream.read_exact(buf).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => FlashError::ShortRead,
        _ => FlashError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::io::Cursor;

    #[test]
    fn frame_round_trip() {
        block_on(async {
            let mut wire = Cursor::new(Vec::new());
            send_bytes(b"hello flash", &mut wire).await.unwrap();
            send_bytes(b"", &mut wire).await.unwrap();

            let mut wire = Cursor::new(wire.into_inner());
            assert_eq!(receive_bytes(&mut wire).await.unwrap(), b"hello flash");
            assert_eq!(receive_bytes(&mut wire).await.unwrap(), b"");
        });
    }

    #[test]
    fn header_is_little_endian_i64() {
        block_on(async {
            let mut wire = Cursor::new(Vec::new());
            send_bytes(b"ok", &mut wire).await.unwrap();

            let bytes = wire.into_inner();
            assert_eq!(&bytes[..8], &2i64.to_le_bytes());
            assert_eq!(&bytes[8..], b"ok");
        });
    }

    #[test]
    fn truncated_payload_is_short_read() {
        block_on(async {
            let mut bytes = 10i64.to_le_bytes().to_vec();
            bytes.extend_from_slice(b"only4");

            let mut wire = Cursor::new(bytes);
            assert!(matches!(
                receive_bytes(&mut wire).await,
                Err(FlashError::ShortRead)
            ));
        });
    }

    #[test]
    fn truncated_header_is_short_read() {
        block_on(async {
            let mut wire = Cursor::new(vec![0x05, 0x00, 0x00]);
            assert!(matches!(
                receive_bytes(&mut wire).await,
                Err(FlashError::ShortRead)
            ));
        });
    }

    #[test]
    fn negative_length_is_rejected() {
        block_on(async {
            let mut wire = Cursor::new((-1i64).to_le_bytes().to_vec());
            assert!(matches!(
                receive_bytes(&mut wire).await,
                Err(FlashError::InvalidFrameLength(-1))
            ));
        });
    }
}
