//! Single-reply RESP decoder.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{ConnectionError, ProtocolError};

/// Longest header or status line accepted, excluding its CRLF.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Classification of one decoded reply.
///
/// Payloads are consumed but never kept; only their shape is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK`, `+PONG`, ...
    Simple,
    /// `-ERR ...`, carrying the text after the marker.
    Error(String),
    /// `:<n>`
    Integer,
    /// `$<len>`; `None` for the null bulk string.
    Bulk(Option<usize>),
    /// `*<len>`; elements are left unread on the stream.
    Array(Option<usize>),
}

#[cfg(test)]
impl Reply {
    pub fn is_success(&self) -> bool {
        !matches!(self, Reply::Error(_))
    }
}

/// Read exactly one reply from `reader`.
///
/// End of stream before the first byte is a transport failure
/// ([`ConnectionError::Closed`]); anything short or malformed after that is a
/// [`ProtocolError`]. Arrays are not descended into.
pub async fn read_reply<R>(reader: &mut R) -> Result<Reply, ConnectionError>
where
    R: AsyncBufRead + Unpin,
{
    let marker = match reader.read_u8().await {
        Ok(byte) => byte,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(ConnectionError::Closed),
        Err(e) => return Err(e.into()),
    };

    match marker {
        b'+' => {
            read_line(reader).await?;
            Ok(Reply::Simple)
        }
        b'-' => {
            let line = read_line(reader).await?;
            Ok(Reply::Error(String::from_utf8_lossy(&line).trim().to_string()))
        }
        b':' => {
            parse_len(&read_line(reader).await?)?;
            Ok(Reply::Integer)
        }
        b'$' => {
            let len = parse_len(&read_line(reader).await?)?;
            let Ok(len) = usize::try_from(len) else {
                return Ok(Reply::Bulk(None));
            };
            skip_payload(reader, len).await?;
            Ok(Reply::Bulk(Some(len)))
        }
        b'*' => {
            let len = parse_len(&read_line(reader).await?)?;
            Ok(Reply::Array(usize::try_from(len).ok()))
        }
        other => Err(ProtocolError::UnexpectedMarker(char::from(other)).into()),
    }
}

/// Read one CRLF-terminated line and return it without the terminator.
async fn read_line<R>(reader: &mut R) -> Result<Vec<u8>, ConnectionError>
where
    R: AsyncBufRead + Unpin,
{
    let limit = (MAX_LINE_LEN + 2) as u64;
    let mut line = Vec::new();
    let read = (&mut *reader).take(limit).read_until(b'\n', &mut line).await?;

    if line.last() != Some(&b'\n') {
        if read as u64 >= limit {
            return Err(ProtocolError::LineTooLong {
                limit: MAX_LINE_LEN,
            }
            .into());
        }
        return Err(ProtocolError::Truncated.into());
    }
    if !line.ends_with(b"\r\n") {
        return Err(ProtocolError::Malformed("line not terminated by CRLF".into()).into());
    }
    line.truncate(line.len() - 2);
    Ok(line)
}

fn parse_len(line: &[u8]) -> Result<i64, ProtocolError> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            ProtocolError::Malformed(format!(
                "invalid length {:?}",
                String::from_utf8_lossy(line)
            ))
        })
}

/// Discard a bulk payload of `len` bytes plus its CRLF without buffering it.
async fn skip_payload<R>(reader: &mut R, len: usize) -> Result<(), ConnectionError>
where
    R: AsyncBufRead + Unpin,
{
    let copied = tokio::io::copy(&mut (&mut *reader).take(len as u64), &mut tokio::io::sink()).await?;
    if copied < len as u64 {
        return Err(ProtocolError::Truncated.into());
    }

    let mut terminator = [0u8; 2];
    reader.read_exact(&mut terminator).await.map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ConnectionError::Protocol(ProtocolError::Truncated)
        } else {
            ConnectionError::Io(e)
        }
    })?;
    if &terminator != b"\r\n" {
        return Err(ProtocolError::Malformed("bulk payload not terminated by CRLF".into()).into());
    }
    Ok(())
}
