//! One worker keeps one connection alive for the lifetime of the process.
//!
//! The lifecycle is an explicit [`ConnState`] enum driven by a single
//! transition function, `Worker::step`:
//!
//! ```text
//! Connecting -> Authenticating? -> SelectingNamespace? -> SteadyState
//!     ^                                                       |
//!     +-------------------- Backoff <----- Closing <----------+
//! ```
//!
//! Any handshake or keepalive failure discards the whole connection. The only
//! way out of the loop is the shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::sync::watch;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, warn};

use super::backoff::{jitter, Backoff, RETRY_WINDOW};
use super::limiter::BurstLimiter;
use super::metrics::{ActiveConnection, Metrics};
use super::rotator::TargetRotator;
use super::shutdown_requested;
use crate::config::{Config, Credentials, DialTarget};
use crate::error::ConnectionError;
use crate::protocol::{round_trip, Command, Reply};
use crate::transport::{Dialer, Transport};

/// Relative jitter applied to each ping tick (±10 %).
pub const PING_JITTER: f64 = 0.1;

/// Immutable per-worker settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub id: usize,
    pub targets: Arc<[DialTarget]>,
    pub credentials: Option<Credentials>,
    pub db: u32,
    pub ping_interval: Duration,
    pub read_timeout: Duration,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
    pub backoff: Backoff,
}

impl WorkerConfig {
    pub fn from_config(id: usize, config: &Config, targets: Arc<[DialTarget]>) -> Self {
        let conn = &config.connection;
        Self {
            id,
            targets,
            credentials: config.credentials(),
            db: conn.db,
            ping_interval: conn.ping_interval,
            read_timeout: conn.read_timeout,
            idle_timeout: conn.idle_timeout,
            connect_timeout: conn.connect_timeout,
            backoff: Backoff::new(config.backoff.min, config.backoff.max),
        }
    }
}

/// A live connection owned by exactly one worker.
struct Session {
    stream: BufStream<Transport>,
    target: String,
    idle_deadline: Instant,
    _active: ActiveConnection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    Idle,
    PingFailed,
    Shutdown,
}

enum ConnState {
    Connecting,
    Authenticating(Session),
    SelectingNamespace(Session),
    SteadyState(Session),
    Closing(Session, CloseReason),
    Backoff,
}

impl ConnState {
    fn name(&self) -> &'static str {
        match self {
            ConnState::Connecting => "connecting",
            ConnState::Authenticating(_) => "authenticating",
            ConnState::SelectingNamespace(_) => "selecting",
            ConnState::SteadyState(_) => "steady",
            ConnState::Closing(..) => "closing",
            ConnState::Backoff => "backoff",
        }
    }
}

/// Result of one command exchange raced against shutdown.
enum Exchange {
    Reply(Reply),
    Failed(ConnectionError),
    Cancelled,
}

pub struct Worker {
    config: WorkerConfig,
    dialer: Arc<Dialer>,
    metrics: Arc<Metrics>,
    shutdown: watch::Receiver<bool>,
    rotator: TargetRotator,
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        dialer: Arc<Dialer>,
        metrics: Arc<Metrics>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let rotator = TargetRotator::new(config.id, Arc::clone(&config.targets));
        Self {
            config,
            dialer,
            metrics,
            shutdown,
            rotator,
        }
    }

    /// Drive the lifecycle until shutdown.
    ///
    /// With a limiter, the first connect waits for an admission; reconnects
    /// are never gated.
    pub async fn run(mut self, limiter: Option<Arc<BurstLimiter>>) {
        if let Some(limiter) = limiter {
            tokio::select! {
                _ = shutdown_requested(&mut self.shutdown) => return,
                _ = limiter.admit() => {}
            }
        }

        let mut state = ConnState::Connecting;
        loop {
            let from = state.name();
            match self.step(state).await {
                Some(next) => {
                    debug!(worker = self.config.id, from, to = next.name(), "Transition");
                    state = next;
                }
                None => break,
            }
        }
        debug!(worker = self.config.id, "Worker stopped");
    }

    /// Perform one transition. `None` means the worker is done.
    async fn step(&mut self, state: ConnState) -> Option<ConnState> {
        match state {
            ConnState::Connecting => self.connect().await,
            ConnState::Authenticating(session) => self.authenticate(session).await,
            ConnState::SelectingNamespace(session) => self.select_namespace(session).await,
            ConnState::SteadyState(session) => self.keepalive(session).await,
            ConnState::Closing(session, reason) => self.close(session, reason).await,
            ConnState::Backoff => self.back_off().await,
        }
    }

    async fn connect(&mut self) -> Option<ConnState> {
        let target = self.rotator.next_target()?.clone();
        let dialed = tokio::select! {
            _ = shutdown_requested(&mut self.shutdown) => return None,
            result = self.dialer.dial(&target, self.config.connect_timeout) => result,
        };

        match dialed {
            Ok(transport) => {
                debug!(worker = self.config.id, target = %target.address, tls = transport.is_tls(), "Connected");
                let session = Session {
                    stream: BufStream::new(transport),
                    target: target.address,
                    idle_deadline: Instant::now() + self.config.idle_timeout,
                    _active: self.metrics.connection_opened(),
                };
                Some(self.after_connect(session))
            }
            Err(err) => {
                self.metrics.record_error();
                warn!(worker = self.config.id, target = %target.address, error = %err, "Connect failed");
                Some(ConnState::Backoff)
            }
        }
    }

    fn after_connect(&mut self, session: Session) -> ConnState {
        if self.config.credentials.is_some() {
            ConnState::Authenticating(session)
        } else {
            self.after_auth(session)
        }
    }

    fn after_auth(&mut self, session: Session) -> ConnState {
        if self.config.db > 0 {
            ConnState::SelectingNamespace(session)
        } else {
            self.enter_steady(session)
        }
    }

    fn enter_steady(&mut self, mut session: Session) -> ConnState {
        session.idle_deadline = Instant::now() + self.config.idle_timeout;
        ConnState::SteadyState(session)
    }

    async fn authenticate(&mut self, mut session: Session) -> Option<ConnState> {
        let Some(creds) = self.config.credentials.as_ref() else {
            return Some(self.after_auth(session));
        };
        let command = Command::Auth {
            username: creds.username.as_deref(),
            password: &creds.password,
        };
        match exchange(
            &mut session.stream,
            command,
            self.config.read_timeout,
            &mut self.shutdown,
        )
        .await
        {
            Exchange::Reply(_) => {
                self.metrics.record_auth();
                Some(self.after_auth(session))
            }
            Exchange::Failed(err) => Some(self.abandon(session, "AUTH", err).await),
            Exchange::Cancelled => {
                shut_down(&mut session.stream, self.config.read_timeout).await;
                None
            }
        }
    }

    async fn select_namespace(&mut self, mut session: Session) -> Option<ConnState> {
        let command = Command::Select { db: self.config.db };
        match exchange(
            &mut session.stream,
            command,
            self.config.read_timeout,
            &mut self.shutdown,
        )
        .await
        {
            Exchange::Reply(_) => Some(self.enter_steady(session)),
            Exchange::Failed(err) => Some(self.abandon(session, "SELECT", err).await),
            Exchange::Cancelled => {
                shut_down(&mut session.stream, self.config.read_timeout).await;
                None
            }
        }
    }

    /// Handshake failure: count it, drop the connection, back off.
    async fn abandon(
        &mut self,
        mut session: Session,
        stage: &'static str,
        err: ConnectionError,
    ) -> ConnState {
        self.metrics.record_error();
        warn!(worker = self.config.id, target = %session.target, stage, error = %err, "Handshake failed");
        shut_down(&mut session.stream, self.config.read_timeout).await;
        ConnState::Backoff
    }

    /// Wait for the earliest of the next ping tick, the idle deadline, or
    /// shutdown.
    async fn keepalive(&mut self, mut session: Session) -> Option<ConnState> {
        let tick = jitter(self.config.ping_interval, PING_JITTER);
        let idle_deadline = session.idle_deadline;

        tokio::select! {
            _ = shutdown_requested(&mut self.shutdown) => {
                Some(ConnState::Closing(session, CloseReason::Shutdown))
            }
            _ = sleep_until(idle_deadline) => {
                debug!(worker = self.config.id, target = %session.target, "Idle deadline reached");
                Some(ConnState::Closing(session, CloseReason::Idle))
            }
            _ = sleep(tick) => {
                match exchange(
                    &mut session.stream,
                    Command::Ping,
                    self.config.read_timeout,
                    &mut self.shutdown,
                )
                .await
                {
                    Exchange::Reply(_) => {
                        self.metrics.record_pong();
                        session.idle_deadline = Instant::now() + self.config.idle_timeout;
                        Some(ConnState::SteadyState(session))
                    }
                    Exchange::Failed(err) => {
                        self.metrics.record_error();
                        warn!(worker = self.config.id, target = %session.target, error = %err, "Ping failed");
                        Some(ConnState::Closing(session, CloseReason::PingFailed))
                    }
                    Exchange::Cancelled => Some(ConnState::Closing(session, CloseReason::Shutdown)),
                }
            }
        }
    }

    async fn close(&mut self, mut session: Session, reason: CloseReason) -> Option<ConnState> {
        shut_down(&mut session.stream, self.config.read_timeout).await;
        debug!(worker = self.config.id, target = %session.target, ?reason, "Connection closed");
        drop(session);
        self.metrics.record_restart();

        match reason {
            CloseReason::Shutdown => None,
            CloseReason::Idle | CloseReason::PingFailed => Some(ConnState::Backoff),
        }
    }

    /// Sleep before redialing. The retry count is the process-wide
    /// `restarts` counter folded into [`RETRY_WINDOW`], so dial failures alone
    /// never lengthen the delay.
    async fn back_off(&mut self) -> Option<ConnState> {
        let retry = (self.metrics.restarts() % u64::from(RETRY_WINDOW)) as u32;
        let delay = self.config.backoff.delay(retry);
        debug!(worker = self.config.id, retry, ?delay, "Backing off");
        tokio::select! {
            _ = shutdown_requested(&mut self.shutdown) => None,
            _ = sleep(delay) => Some(ConnState::Connecting),
        }
    }
}

/// Send `command` and read its reply within `read_timeout`, abandoning the
/// exchange as soon as shutdown is requested.
async fn exchange<S>(
    stream: &mut S,
    command: Command<'_>,
    read_timeout: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> Exchange
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    tokio::select! {
        _ = shutdown_requested(shutdown) => Exchange::Cancelled,
        result = timed_round_trip(stream, command, read_timeout) => match result {
            Ok(reply) => Exchange::Reply(reply),
            Err(err) => Exchange::Failed(err),
        },
    }
}

async fn timed_round_trip<S>(
    stream: &mut S,
    command: Command<'_>,
    read_timeout: Duration,
) -> Result<Reply, ConnectionError>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    tokio::time::timeout(read_timeout, round_trip(stream, command))
        .await
        .map_err(|_| ConnectionError::ReadTimeout(read_timeout))?
}

/// Best-effort orderly close; the socket is released on drop regardless.
async fn shut_down<S: AsyncWrite + Unpin>(stream: &mut S, limit: Duration) {
    let _ = tokio::time::timeout(limit, stream.shutdown()).await;
}

/// Dial `target` once, run the configured handshake and a single PING.
///
/// Returns the total time taken. Used by `check connection`.
pub async fn probe(
    dialer: &Dialer,
    target: &DialTarget,
    config: &WorkerConfig,
) -> Result<Duration, ConnectionError> {
    let started = std::time::Instant::now();
    let transport = dialer.dial(target, config.connect_timeout).await?;
    let mut stream = BufStream::new(transport);

    if let Some(creds) = config.credentials.as_ref() {
        let auth = Command::Auth {
            username: creds.username.as_deref(),
            password: &creds.password,
        };
        timed_round_trip(&mut stream, auth, config.read_timeout).await?;
    }
    if config.db > 0 {
        timed_round_trip(&mut stream, Command::Select { db: config.db }, config.read_timeout)
            .await?;
    }
    timed_round_trip(&mut stream, Command::Ping, config.read_timeout).await?;

    let elapsed = started.elapsed();
    shut_down(&mut stream, config.read_timeout).await;
    Ok(elapsed)
}
