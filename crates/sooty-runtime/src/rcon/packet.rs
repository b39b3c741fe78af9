//! Source RCON packet framing.
//!
//! ```text
//! size: i32 LE   (bytes after this field)
//! id:   i32 LE
//! type: i32 LE
//! body: bytes, NUL terminated
//! pad:  one NUL
//! ```

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const SERVERDATA_AUTH: i32 = 3;
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;

/// Id the server answers with when authentication fails.
pub const AUTH_FAILED_ID: i32 = -1;

/// id + type + two terminators.
const HEADER_LEN: usize = 10;

/// Largest accepted packet; protects against garbage size fields.
pub const MAX_PACKET_LEN: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl Packet {
    pub fn new(id: i32, kind: i32, body: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let size = HEADER_LEN + self.body.len();
        if size > MAX_PACKET_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("packet of {size} bytes exceeds the {MAX_PACKET_LEN} byte limit"),
            ));
        }
        let size = i32::try_from(size)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let mut buf = Vec::with_capacity(4 + HEADER_LEN + self.body.len());
        buf.extend_from_slice(&size.to_le_bytes());
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.kind.to_le_bytes());
        buf.extend_from_slice(self.body.as_bytes());
        buf.extend_from_slice(&[0, 0]);
        Ok(buf)
    }

    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.encode()?).await?;
        writer.flush().await
    }

    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Self> {
        let size = reader.read_i32_le().await?;
        let size = usize::try_from(size)
            .ok()
            .filter(|s| (HEADER_LEN..=MAX_PACKET_LEN).contains(s))
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid packet size {size}"),
                )
            })?;

        let mut buf = vec![0_u8; size];
        reader.read_exact(&mut buf).await?;
        let id = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let kind = i32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let body = &buf[8..];
        let end = body.iter().position(|b| *b == 0).unwrap_or(body.len());
        Ok(Self {
            id,
            kind,
            body: String::from_utf8_lossy(&body[..end]).into_owned(),
        })
    }
}
