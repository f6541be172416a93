//! Minimal RESP codec.
//!
//! Only the three commands needed to keep a connection valid are encoded:
//! `PING`, `AUTH` and `SELECT`. Replies are decoded one value at a time and
//! classified as success or error without interpreting their payload.
//!
//! Outbound commands are arrays of bulk strings:
//!
//! ```text
//! *2\r\n$4\r\nAUTH\r\n$6\r\nsecret\r\n
//! ```

mod reply;

pub use reply::{read_reply, Reply, MAX_LINE_LEN};

use std::borrow::Cow;

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};

use crate::error::{ConnectionError, ProtocolError};

/// A command the soak tester is allowed to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Ping,
    /// `AUTH [username] password`. An empty username selects the
    /// single-argument form.
    Auth {
        username: Option<&'a str>,
        password: &'a str,
    },
    Select {
        db: u32,
    },
}

impl<'a> Command<'a> {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::Auth { .. } => "AUTH",
            Command::Select { .. } => "SELECT",
        }
    }

    fn args(&self) -> Vec<Cow<'a, [u8]>> {
        let mut args: Vec<Cow<'a, [u8]>> = vec![Cow::Borrowed(self.name().as_bytes())];
        match *self {
            Command::Ping => {}
            Command::Auth { username, password } => {
                if let Some(user) = username.filter(|u| !u.is_empty()) {
                    args.push(Cow::Borrowed(user.as_bytes()));
                }
                args.push(Cow::Borrowed(password.as_bytes()));
            }
            Command::Select { db } => args.push(Cow::Owned(db.to_string().into_bytes())),
        }
        args
    }

    /// Append the wire form of this command to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        let args = self.args();
        buf.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
        for arg in &args {
            buf.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
            buf.extend_from_slice(arg);
            buf.extend_from_slice(b"\r\n");
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32);
        self.encode_into(&mut buf);
        buf
    }
}

/// Write `command`, flush, and read exactly one reply.
///
/// An `-` reply is returned as [`ProtocolError::ServerError`]; callers only
/// see `Ok` for replies classified as success.
pub async fn round_trip<S>(stream: &mut S, command: Command<'_>) -> Result<Reply, ConnectionError>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    stream.write_all(&command.encode()).await?;
    stream.flush().await?;
    match read_reply(stream).await? {
        Reply::Error(text) => Err(ProtocolError::ServerError(text).into()),
        reply => Ok(reply),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_has_no_arguments() {
        assert_eq!(Command::Ping.encode(), b"*1\r\n$4\r\nPING\r\n");
    }

    #[test]
    fn auth_with_username_uses_three_elements() {
        let cmd = Command::Auth {
            username: Some("app"),
            password: "hunter22",
        };
        assert_eq!(
            cmd.encode(),
            b"*3\r\n$4\r\nAUTH\r\n$3\r\napp\r\n$8\r\nhunter22\r\n".to_vec()
        );
    }

    #[test]
    fn auth_with_empty_username_omits_it() {
        let cmd = Command::Auth {
            username: Some(""),
            password: "pw",
        };
        assert_eq!(cmd.encode(), b"*2\r\n$4\r\nAUTH\r\n$2\r\npw\r\n".to_vec());

        let cmd = Command::Auth {
            username: None,
            password: "pw",
        };
        assert_eq!(cmd.encode(), b"*2\r\n$4\r\nAUTH\r\n$2\r\npw\r\n".to_vec());
    }

    #[test]
    fn auth_lengths_count_bytes_not_chars() {
        let cmd = Command::Auth {
            username: Some("ünï"),
            password: "pässwörd",
        };
        let encoded = cmd.encode();
        let expected = format!(
            "*3\r\n$4\r\nAUTH\r\n${}\r\nünï\r\n${}\r\npässwörd\r\n",
            "ünï".len(),
            "pässwörd".len()
        );
        assert_eq!(encoded, expected.into_bytes());
        assert_eq!("ünï".len(), 5);
    }

    #[test]
    fn select_encodes_decimal_index() {
        assert_eq!(
            Command::Select { db: 12 }.encode(),
            b"*2\r\n$6\r\nSELECT\r\n$2\r\n12\r\n".to_vec()
        );
    }

    #[tokio::test]
    async fn round_trip_surfaces_server_errors() {
        let mock = tokio_test::io::Builder::new()
            .write(b"*2\r\n$4\r\nAUTH\r\n$3\r\nbad\r\n")
            .read(b"-WRONGPASS invalid username-password pair\r\n")
            .build();
        let mut stream = tokio::io::BufStream::new(mock);

        let err = round_trip(
            &mut stream,
            Command::Auth {
                username: None,
                password: "bad",
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ConnectionError::Protocol(ProtocolError::ServerError(ref text))
                if text == "WRONGPASS invalid username-password pair"
        ));
    }

    #[tokio::test]
    async fn round_trip_accepts_pong() {
        let mock = tokio_test::io::Builder::new()
            .write(b"*1\r\n$4\r\nPING\r\n")
            .read(b"+PONG\r\n")
            .build();
        let mut stream = tokio::io::BufStream::new(mock);

        let reply = round_trip(&mut stream, Command::Ping).await.unwrap();
        assert_eq!(reply, Reply::Simple);
    }
}
