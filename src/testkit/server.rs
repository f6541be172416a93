//! In-process RESP server for exercising real connections.
//!
//! Answers `AUTH`, `SELECT` and `PING` the way a key-value node would, can
//! require a password, and counts everything it sees.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};

#[derive(Debug, Default)]
struct Counters {
    connections: AtomicU64,
    open: AtomicI64,
    auths: AtomicU64,
    auth_failures: AtomicU64,
    selects: AtomicU64,
    pings: AtomicU64,
}

/// Copy of the server counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Connections accepted since start.
    pub connections: u64,
    /// Connections currently open.
    pub open: i64,
    pub auths: u64,
    pub auth_failures: u64,
    pub selects: u64,
    /// PINGs answered.
    pub pings: u64,
}

#[derive(Debug, Clone, Default)]
struct Behavior {
    password: Option<String>,
    silent_pings: bool,
}

#[derive(Debug, Default)]
pub struct FakeKvServerBuilder {
    behavior: Behavior,
}

impl FakeKvServerBuilder {
    /// Reject AUTH unless the last argument equals `password`.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.behavior.password = Some(password.into());
        self
    }

    /// Read PINGs but never answer them.
    pub fn silent_pings(mut self) -> Self {
        self.behavior.silent_pings = true;
        self
    }

    /// Bind an ephemeral loopback port and start serving.
    pub async fn start(self) -> FakeKvServer {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake server");
        let addr = listener.local_addr().expect("fake server address");
        let counters = Arc::new(Counters::default());
        let behavior = Arc::new(self.behavior);

        let task = tokio::spawn({
            let counters = Arc::clone(&counters);
            async move {
                let mut conns = JoinSet::new();
                while let Ok((stream, _)) = listener.accept().await {
                    counters.connections.fetch_add(1, Ordering::Relaxed);
                    counters.open.fetch_add(1, Ordering::Relaxed);
                    let counters = Arc::clone(&counters);
                    let behavior = Arc::clone(&behavior);
                    conns.spawn(async move {
                        let _ = serve(stream, &counters, &behavior).await;
                        counters.open.fetch_sub(1, Ordering::Relaxed);
                    });
                }
            }
        });

        FakeKvServer {
            addr,
            counters,
            task,
        }
    }
}

/// Dropping the server closes the listener and every accepted connection.
pub struct FakeKvServer {
    addr: SocketAddr,
    counters: Arc<Counters>,
    task: JoinHandle<()>,
}

impl FakeKvServer {
    pub fn builder() -> FakeKvServerBuilder {
        FakeKvServerBuilder::default()
    }

    /// A server that accepts any credentials.
    pub async fn start() -> Self {
        Self::builder().start().await
    }

    /// `host:port` string suitable for a target list.
    pub fn addr(&self) -> String {
        self.addr.to_string()
    }

    pub fn stats(&self) -> ServerStats {
        let c = &self.counters;
        ServerStats {
            connections: c.connections.load(Ordering::Relaxed),
            open: c.open.load(Ordering::Relaxed),
            auths: c.auths.load(Ordering::Relaxed),
            auth_failures: c.auth_failures.load(Ordering::Relaxed),
            selects: c.selects.load(Ordering::Relaxed),
            pings: c.pings.load(Ordering::Relaxed),
        }
    }
}

impl Drop for FakeKvServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// An address nothing is listening on.
pub async fn unused_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind probe listener");
    let addr = listener.local_addr().expect("probe address");
    drop(listener);
    addr.to_string()
}

async fn serve(stream: TcpStream, counters: &Counters, behavior: &Behavior) -> io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    while let Some(args) = read_command(&mut reader).await? {
        let name = args.first().map(|a| a.to_ascii_uppercase()).unwrap_or_default();
        let reply: Option<&[u8]> = match name.as_str() {
            "AUTH" => {
                let given = args.last().map(String::as_str);
                match behavior.password.as_deref() {
                    Some(expected) if given != Some(expected) || args.len() < 2 => {
                        counters.auth_failures.fetch_add(1, Ordering::Relaxed);
                        Some(b"-WRONGPASS invalid username-password pair or user is disabled.\r\n".as_slice())
                    }
                    _ => {
                        counters.auths.fetch_add(1, Ordering::Relaxed);
                        Some(b"+OK\r\n".as_slice())
                    }
                }
            }
            "SELECT" => {
                counters.selects.fetch_add(1, Ordering::Relaxed);
                Some(b"+OK\r\n".as_slice())
            }
            "PING" if behavior.silent_pings => None,
            "PING" => {
                counters.pings.fetch_add(1, Ordering::Relaxed);
                Some(b"+PONG\r\n".as_slice())
            }
            _ => Some(b"-ERR unknown command\r\n".as_slice()),
        };
        if let Some(reply) = reply {
            write.write_all(reply).await?;
        }
    }
    Ok(())
}

/// Read one command sent as an array of bulk strings. `None` on clean EOF.
async fn read_command<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Option<Vec<String>>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let count = parse_header(&line, '*')?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        reader.read_line(&mut line).await?;
        let len = parse_header(&line, '$')?;
        let mut buf = vec![0u8; len + 2];
        reader.read_exact(&mut buf).await?;
        buf.truncate(len);
        args.push(String::from_utf8_lossy(&buf).into_owned());
    }
    Ok(Some(args))
}

fn parse_header(line: &str, marker: char) -> io::Result<usize> {
    line.trim_end()
        .strip_prefix(marker)
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, format!("bad header {line:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_array_commands() {
        let mut input: &[u8] = b"*3\r\n$4\r\nAUTH\r\n$2\r\nme\r\n$2\r\npw\r\n*1\r\n$4\r\nPING\r\n";
        assert_eq!(
            read_command(&mut input).await.unwrap(),
            Some(vec!["AUTH".to_string(), "me".into(), "pw".into()])
        );
        assert_eq!(
            read_command(&mut input).await.unwrap(),
            Some(vec!["PING".to_string()])
        );
        assert_eq!(read_command(&mut input).await.unwrap(), None);
    }

    #[tokio::test]
    async fn answers_ping_and_counts_it() {
        let server = FakeKvServer::start().await;
        let mut stream = TcpStream::connect(server.addr()).await.unwrap();
        stream.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        let mut reply = [0u8; 7];
        stream.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, b"+PONG\r\n");
        assert_eq!(server.stats().pings, 1);
        assert_eq!(server.stats().connections, 1);
    }
}
