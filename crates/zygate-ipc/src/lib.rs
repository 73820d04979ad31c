//! # zygate-ipc
//!
//! Wire framing for the hook <-> companion channel.
//!
//! The channel carries a fixed, single-exchange message sequence. Frames are
//! either length-prefixed strings (u32 little-endian byte count *including a
//! trailing NUL*, capped at 16 KiB) or fixed-width scalars (u32 LE, or a
//! single-byte boolean). The trailing NUL is legacy wire compatibility: the
//! peer on the other side of this protocol historically exchanged C strings.
//!
//! Two flavors of the same framing:
//! - blocking functions over `std::io` (used by the in-process hook, which
//!   cannot run an async runtime inside the host process),
//! - async functions in [`aio`] behind the `tokio` feature (used by the
//!   companion's accept loop).

use std::io::{self, Read, Write};

use tracing::warn;

/// Sanity cap on string frames: paths and package names are small.
pub const MAX_STRING_LEN: u32 = 16 * 1024;

/// Default companion socket path.
pub fn default_socket_path() -> &'static str {
    "/tmp/zygate.sock"
}

/// Companion socket path, honoring the `ZYGATE_SOCKET` override.
pub fn socket_path() -> String {
    std::env::var("ZYGATE_SOCKET").unwrap_or_else(|_| default_socket_path().to_string())
}

/// Write a length-prefixed string frame.
///
/// Oversized strings are refused before anything hits the wire: a frame the
/// peer is required to reject must never be sent.
pub fn write_string<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    let len = s.len() + 1; // trailing NUL included in the count
    if len > MAX_STRING_LEN as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "string frame exceeds 16 KiB cap",
        ));
    }
    w.write_all(&(len as u32).to_le_bytes())?;
    w.write_all(s.as_bytes())?;
    w.write_all(&[0])?;
    Ok(())
}

/// Read a length-prefixed string frame.
///
/// Returns an empty string on a closed peer, a short read, or a corrupt
/// length (0 or > 16 KiB). Callers treat empty as "no data" and take their
/// abort path; the decode itself never fails loudly.
pub fn read_string<R: Read>(r: &mut R) -> String {
    let mut len_buf = [0u8; 4];
    if r.read_exact(&mut len_buf).is_err() {
        return String::new();
    }
    let len = u32::from_le_bytes(len_buf);
    if len == 0 || len > MAX_STRING_LEN {
        warn!(component = "IPC", length = len, "invalid string frame length");
        return String::new();
    }
    let mut buf = vec![0u8; len as usize];
    if r.read_exact(&mut buf).is_err() {
        return String::new();
    }
    decode_string_bytes(buf)
}

pub fn write_u32<W: Write>(w: &mut W, value: u32) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

pub fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn write_bool<W: Write>(w: &mut W, value: bool) -> io::Result<()> {
    w.write_all(&[value as u8])
}

pub fn read_bool<R: Read>(r: &mut R) -> io::Result<bool> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0] != 0)
}

/// Truncate at the first NUL and convert lossily. A well-behaved sender
/// always appends a NUL; a buggy one must not break the decode.
fn decode_string_bytes(buf: Vec<u8>) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// Async flavor of the same framing, for the companion side.
#[cfg(feature = "tokio")]
pub mod aio {
    use super::{decode_string_bytes, MAX_STRING_LEN};
    use std::io;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
    use tracing::warn;

    pub async fn write_string<W: AsyncWrite + Unpin>(w: &mut W, s: &str) -> io::Result<()> {
        let len = s.len() + 1;
        if len > MAX_STRING_LEN as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "string frame exceeds 16 KiB cap",
            ));
        }
        w.write_all(&(len as u32).to_le_bytes()).await?;
        w.write_all(s.as_bytes()).await?;
        w.write_all(&[0]).await?;
        Ok(())
    }

    pub async fn read_string<R: AsyncRead + Unpin>(r: &mut R) -> String {
        let mut len_buf = [0u8; 4];
        if r.read_exact(&mut len_buf).await.is_err() {
            return String::new();
        }
        let len = u32::from_le_bytes(len_buf);
        if len == 0 || len > MAX_STRING_LEN {
            warn!(component = "IPC", length = len, "invalid string frame length");
            return String::new();
        }
        let mut buf = vec![0u8; len as usize];
        if r.read_exact(&mut buf).await.is_err() {
            return String::new();
        }
        decode_string_bytes(buf)
    }

    pub async fn write_u32<W: AsyncWrite + Unpin>(w: &mut W, value: u32) -> io::Result<()> {
        w.write_all(&value.to_le_bytes()).await
    }

    pub async fn read_u32<R: AsyncRead + Unpin>(r: &mut R) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        r.read_exact(&mut buf).await?;
        Ok(u32::from_le_bytes(buf))
    }

    pub async fn write_bool<W: AsyncWrite + Unpin>(w: &mut W, value: bool) -> io::Result<()> {
        w.write_all(&[value as u8]).await
    }

    pub async fn read_bool<R: AsyncRead + Unpin>(r: &mut R) -> io::Result<bool> {
        let mut buf = [0u8; 1];
        r.read_exact(&mut buf).await?;
        Ok(buf[0] != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_string_roundtrip() {
        let mut buf = Vec::new();
        write_string(&mut buf, "com.example.app").unwrap();
        // u32 length prefix + bytes + NUL
        assert_eq!(buf.len(), 4 + 15 + 1);
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_string(&mut cursor), "com.example.app");
    }

    #[test]
    fn test_empty_string_still_framed() {
        // An empty string is a valid sentinel and travels as a 1-byte frame
        // (just the NUL), never as a zero length.
        let mut buf = Vec::new();
        write_string(&mut buf, "").unwrap();
        assert_eq!(&buf[..4], &1u32.to_le_bytes());
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_string(&mut cursor), "");
    }

    #[test]
    fn test_zero_length_rejected() {
        let mut cursor = Cursor::new(0u32.to_le_bytes().to_vec());
        assert_eq!(read_string(&mut cursor), "");
    }

    #[test]
    fn test_oversized_length_rejected() {
        let mut frame = (MAX_STRING_LEN + 1).to_le_bytes().to_vec();
        frame.extend_from_slice(&[b'x'; 32]);
        let mut cursor = Cursor::new(frame);
        // Must yield empty without attempting to read 16 KiB+ of payload.
        assert_eq!(read_string(&mut cursor), "");
    }

    #[test]
    fn test_max_length_accepted() {
        let s = "a".repeat(MAX_STRING_LEN as usize - 1);
        let mut buf = Vec::new();
        write_string(&mut buf, &s).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_string(&mut cursor), s);
    }

    #[test]
    fn test_oversized_write_refused() {
        let s = "a".repeat(MAX_STRING_LEN as usize);
        let mut buf = Vec::new();
        assert!(write_string(&mut buf, &s).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_truncated_payload_yields_empty() {
        let mut frame = 10u32.to_le_bytes().to_vec();
        frame.extend_from_slice(b"abc"); // 3 of the promised 10 bytes
        let mut cursor = Cursor::new(frame);
        assert_eq!(read_string(&mut cursor), "");
    }

    #[test]
    fn test_missing_terminator_tolerated() {
        // Buggy sender: count right, no NUL. Decode takes the whole payload.
        let mut frame = 3u32.to_le_bytes().to_vec();
        frame.extend_from_slice(b"abc");
        let mut cursor = Cursor::new(frame);
        assert_eq!(read_string(&mut cursor), "abc");
    }

    #[test]
    fn test_embedded_nul_truncates() {
        let mut frame = 8u32.to_le_bytes().to_vec();
        frame.extend_from_slice(b"ab\0cdef\0");
        let mut cursor = Cursor::new(frame);
        assert_eq!(read_string(&mut cursor), "ab");
    }

    #[test]
    fn test_scalar_roundtrips() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 300_000).unwrap();
        write_bool(&mut buf, true).unwrap();
        write_bool(&mut buf, false).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_u32(&mut cursor).unwrap(), 300_000);
        assert!(read_bool(&mut cursor).unwrap());
        assert!(!read_bool(&mut cursor).unwrap());
    }

    #[test]
    fn test_scalar_read_on_closed_peer() {
        let mut cursor = Cursor::new(Vec::new());
        assert!(read_u32(&mut cursor).is_err());
        assert!(read_bool(&mut cursor).is_err());
    }

    #[test]
    fn test_default_socket_path() {
        let path = default_socket_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".sock"));
    }

    #[tokio::test]
    async fn test_aio_matches_blocking_wire_format() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        aio::write_string(&mut a, "com.example.app").await.unwrap();
        aio::write_u32(&mut a, 42).await.unwrap();
        aio::write_bool(&mut a, true).await.unwrap();

        assert_eq!(aio::read_string(&mut b).await, "com.example.app");
        assert_eq!(aio::read_u32(&mut b).await.unwrap(), 42);
        assert!(aio::read_bool(&mut b).await.unwrap());
    }

    #[tokio::test]
    async fn test_aio_rejects_corrupt_length() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        use tokio::io::AsyncWriteExt;
        a.write_all(&0u32.to_le_bytes()).await.unwrap();
        assert_eq!(aio::read_string(&mut b).await, "");
    }
}
