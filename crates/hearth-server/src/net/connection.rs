//! Per-connection plumbing: the reader/writer task pair, the bounded
//! outbound queue, keep-alive bookkeeping, and the connection error
//! taxonomy.
//!
//! Each accepted socket gets exactly one reader task and one writer task.
//! The reader owns the inbound frame pipeline and the protocol state
//! machine (see [`super::handler`]); the writer services the outbound
//! queue, emits keep-alives, and is the only task that touches the write
//! half. Stream-transform switches ride the queue as markers so they take
//! effect at exactly the right byte boundary between packets.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use hearth_core::codec::buffer::{BufferPool, CodecError, PacketWriter};
use hearth_core::frame::{FrameError, FrameReader, FrameWriter};
use hearth_core::protocol::login::ClientboundLoginPacket;
use hearth_core::protocol::play::ClientboundPlayPacket;
use hearth_core::protocol::types::{Chat, ConnectionState, GameProfile};
use hearth_core::protocol::ClientboundPacket;

use crate::auth::AuthError;
use crate::net::handler::Driver;
use crate::net::session::ConnectionHandle;
use crate::net::{ConnectionId, ServerContext};

/// Bound of the per-connection outbound queue.
pub(crate) const OUTBOUND_QUEUE_DEPTH: usize = 256;

/// Grace the writer gets to flush a final Disconnect before it is aborted.
const WRITER_FLUSH_GRACE: Duration = Duration::from_secs(5);

/// Items serviced by the writer task, in queue order.
#[derive(Debug)]
pub(crate) enum Outbound {
    /// Encode and send one packet.
    Packet(ClientboundPacket),
    /// Switch the outbound stream to AES/CFB8 before the next packet.
    EnableEncryption([u8; 16]),
    /// Switch outbound framing to the compressed layout.
    EnableCompression(usize),
    /// Send one last packet, then stop the writer.
    DisconnectAfter(ClientboundPacket),
    /// Stop the writer without sending anything further.
    Close,
}

/// Keep-alive bookkeeping shared between the two tasks.
#[derive(Debug)]
pub(crate) struct KeepAliveState {
    /// The token sent and not yet echoed, with its send time.
    pub pending: Option<(i64, Instant)>,
    /// Last time any well-formed packet arrived.
    pub last_seen: Instant,
}

/// State shared between a connection's reader, writer, and the session
/// manager.
#[derive(Debug)]
pub(crate) struct ConnectionShared {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub profile: Mutex<Option<GameProfile>>,
    state: Mutex<ConnectionState>,
    pub keepalive: Mutex<KeepAliveState>,
}

impl ConnectionShared {
    pub fn new(id: ConnectionId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            profile: Mutex::new(None),
            state: Mutex::new(ConnectionState::Handshaking),
            keepalive: Mutex::new(KeepAliveState {
                pending: None,
                last_seen: Instant::now(),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().expect("state lock")
    }

    pub fn set_state(&self, state: ConnectionState) {
        *self.state.lock().expect("state lock") = state;
    }
}

// ── Error taxonomy ────────────────────────────────────────────────────────────

/// Why a connection terminated. Mirrors the protocol-level taxonomy;
/// unknown packet ids are deliberately absent because they are non-fatal
/// and handled inline.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Socket or transform failure.
    #[error("I/O failure: {0}")]
    Io(#[source] std::io::Error),

    /// The peer closed the stream.
    #[error("peer closed the connection")]
    Closed,

    /// Codec-level bad bytes.
    #[error("malformed data: {0}")]
    Malformed(String),

    /// Well-formed bytes, wrong state or wrong semantics.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A keep-alive echo was missing or mismatched.
    #[error("keep-alive timeout")]
    KeepAliveTimeout,

    /// Session verification failed.
    #[error("authentication failed: {0}")]
    AuthFailed(#[from] AuthError),

    /// The server is at its connection cap.
    #[error("server is full")]
    Capacity,

    /// The client did not finish login within the deadline.
    #[error("login deadline exceeded")]
    LoginTimeout,
}

impl From<FrameError> for ConnectionError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(e) => ConnectionError::Io(e),
            FrameError::ConnectionClosed => ConnectionError::Closed,
            FrameError::Malformed(m) => ConnectionError::Malformed(m),
            FrameError::FrameTooLarge(n) => {
                ConnectionError::Malformed(format!("frame of {n} bytes over the cap"))
            }
            FrameError::TransformAlreadyEnabled(t) => {
                ConnectionError::ProtocolViolation(format!("{t} enabled twice"))
            }
        }
    }
}

impl From<CodecError> for ConnectionError {
    fn from(err: CodecError) -> Self {
        ConnectionError::Malformed(err.to_string())
    }
}

impl ConnectionError {
    /// The Disconnect packet this error sends before closing, when the
    /// current state has one. Keep-alive timeouts and dead sockets close
    /// silently.
    fn farewell(&self, state: ConnectionState) -> Option<ClientboundPacket> {
        let reason = match self {
            ConnectionError::Io(_) | ConnectionError::Closed | ConnectionError::KeepAliveTimeout => {
                return None
            }
            ConnectionError::Malformed(_) | ConnectionError::ProtocolViolation(_) => {
                Chat::text("Invalid packet")
            }
            ConnectionError::AuthFailed(e) => Chat::text(format!("Failed to verify session: {e}")),
            ConnectionError::Capacity => Chat::text("The server is full"),
            ConnectionError::LoginTimeout => Chat::text("Took too long to log in"),
        };
        match state {
            ConnectionState::Login => Some(ClientboundPacket::Login(
                ClientboundLoginPacket::Disconnect { reason },
            )),
            ConnectionState::Play => Some(ClientboundPacket::Play(
                ClientboundPlayPacket::Disconnect { reason },
            )),
            ConnectionState::Handshaking | ConnectionState::Status => None,
        }
    }
}

// ── Task wiring ───────────────────────────────────────────────────────────────

/// Spawns the reader/writer pair plus a supervisor that tears the
/// connection down when either side finishes.
pub(crate) fn spawn_connection(
    ctx: Arc<ServerContext>,
    stream: TcpStream,
    addr: SocketAddr,
    shutdown: watch::Receiver<bool>,
) {
    let id = ctx.sessions.next_id();
    if let Err(e) = stream.set_nodelay(true) {
        debug!(id, "set_nodelay failed: {e}");
    }
    let (read_half, write_half) = stream.into_split();

    let frame_reader = FrameReader::new(read_half, ctx.pool.clone());
    let frame_writer = FrameWriter::new(write_half, ctx.pool.clone());
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
    let shared = Arc::new(ConnectionShared::new(id, addr));

    let handle = ConnectionHandle::new(id, addr, outbound_tx.clone(), Arc::clone(&shared));
    ctx.sessions.register(handle);
    debug!(id, %addr, "connection accepted");

    let driver = Driver::new(
        Arc::clone(&ctx),
        Arc::clone(&shared),
        outbound_tx,
        frame_reader,
    );
    let mut reader_task = tokio::spawn(run_reader(driver, shutdown.clone()));
    let mut writer_task = tokio::spawn(run_writer(
        frame_writer,
        outbound_rx,
        Arc::clone(&shared),
        Arc::clone(&ctx),
        shutdown,
    ));

    tokio::spawn(async move {
        tokio::select! {
            _ = &mut reader_task => {
                // Let the writer drain the farewell, then stop it.
                let _ = tokio::time::timeout(WRITER_FLUSH_GRACE, &mut writer_task).await;
                writer_task.abort();
            }
            _ = &mut writer_task => {
                reader_task.abort();
            }
        }
        let removed = ctx.sessions.remove(id).await;
        let profile = removed.and_then(|handle| handle.profile());
        if let Some(profile) = profile {
            ctx.events.on_leave(&profile).await;
        }
        debug!(id, "connection closed");
    });
}

/// Drives the state machine until the connection ends, then enqueues the
/// final queue item that stops the writer.
async fn run_reader<R>(mut driver: Driver<R>, mut shutdown: watch::Receiver<bool>)
where
    R: AsyncRead + Unpin + Send,
{
    let outcome = driver.run(&mut shutdown).await;

    let final_item = match &outcome {
        Ok(()) => Outbound::Close,
        Err(e) => match e.farewell(driver.shared().state()) {
            Some(packet) => Outbound::DisconnectAfter(packet),
            None => Outbound::Close,
        },
    };
    let _ = driver.outbound().send(final_item).await;

    match outcome {
        Ok(()) => {}
        Err(ConnectionError::Closed) => {
            debug!(id = driver.shared().id, "peer closed");
        }
        Err(e) => {
            info!(id = driver.shared().id, state = %driver.shared().state(), "connection terminated: {e}");
        }
    }
}

async fn run_writer<W>(
    writer: FrameWriter<W>,
    rx: mpsc::Receiver<Outbound>,
    shared: Arc<ConnectionShared>,
    ctx: Arc<ServerContext>,
    shutdown: watch::Receiver<bool>,
) where
    W: AsyncWrite + Unpin + Send,
{
    if let Err(e) = write_loop(writer, rx, &shared, &ctx, shutdown).await {
        match e {
            ConnectionError::KeepAliveTimeout => {
                info!(id = shared.id, "keep-alive timeout");
            }
            ConnectionError::Io(e) => {
                debug!(id = shared.id, "write failure: {e}");
            }
            other => {
                warn!(id = shared.id, "writer stopped: {other}");
            }
        }
    }
}

/// Services the outbound queue and the keep-alive timer.
async fn write_loop<W>(
    mut writer: FrameWriter<W>,
    mut rx: mpsc::Receiver<Outbound>,
    shared: &ConnectionShared,
    ctx: &ServerContext,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ConnectionError>
where
    W: AsyncWrite + Unpin + Send,
{
    let keepalive_interval = Duration::from_millis(u64::from(ctx.config.keepalive_interval_ms));
    let keepalive_timeout = Duration::from_millis(u64::from(ctx.config.keepalive_timeout_ms));
    let mut ticker = tokio::time::interval(keepalive_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // Armed at `sent_at + keepalive_timeout` while a token awaits its
    // echo; the deadline fires independently of the emission interval.
    let mut echo_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                // Flush a farewell so the client learns why, then close.
                if let Some(farewell) = shutdown_farewell(shared.state()) {
                    let _ = write_packet(&mut writer, &ctx.pool, &farewell).await;
                }
                return Ok(());
            }

            item = rx.recv() => match item {
                None => return Ok(()),
                Some(Outbound::Packet(packet)) => {
                    write_packet(&mut writer, &ctx.pool, &packet).await?;
                }
                Some(Outbound::EnableEncryption(key)) => {
                    writer.enable_encryption(&key)?;
                }
                Some(Outbound::EnableCompression(threshold)) => {
                    writer.enable_compression(threshold)?;
                }
                Some(Outbound::DisconnectAfter(packet)) => {
                    write_packet(&mut writer, &ctx.pool, &packet).await?;
                    return Ok(());
                }
                Some(Outbound::Close) => return Ok(()),
            },

            _ = tokio::time::sleep_until(echo_deadline.unwrap_or_else(Instant::now)),
                if echo_deadline.is_some() =>
            {
                // The reader clears `pending` when the echo arrives; only
                // a still-pending token past its deadline is fatal.
                let pending = shared.keepalive.lock().expect("keepalive lock").pending;
                match pending {
                    Some((_, sent_at)) if sent_at.elapsed() >= keepalive_timeout => {
                        return Err(ConnectionError::KeepAliveTimeout);
                    }
                    Some((_, sent_at)) => {
                        echo_deadline = Some(sent_at + keepalive_timeout);
                    }
                    None => {
                        echo_deadline = None;
                    }
                }
            }

            _ = ticker.tick() => {
                if shared.state() != ConnectionState::Play {
                    continue;
                }
                // At most one token in flight; a fresh one waits for the
                // echo (or the deadline above) before the next emission.
                let token = {
                    let mut ka = shared.keepalive.lock().expect("keepalive lock");
                    if ka.pending.is_some() {
                        None
                    } else {
                        let token: i64 = rand::random();
                        let sent_at = Instant::now();
                        ka.pending = Some((token, sent_at));
                        echo_deadline = Some(sent_at + keepalive_timeout);
                        Some(token)
                    }
                };
                if let Some(token) = token {
                    let packet = ClientboundPacket::Play(ClientboundPlayPacket::KeepAlive {
                        id: token,
                    });
                    write_packet(&mut writer, &ctx.pool, &packet).await?;
                }
            }
        }
    }
}

fn shutdown_farewell(state: ConnectionState) -> Option<ClientboundPacket> {
    let reason = Chat::text("Server closed");
    match state {
        ConnectionState::Login => Some(ClientboundPacket::Login(
            ClientboundLoginPacket::Disconnect { reason },
        )),
        ConnectionState::Play => Some(ClientboundPacket::Play(
            ClientboundPlayPacket::Disconnect { reason },
        )),
        _ => None,
    }
}

/// Encodes one packet into a pooled buffer and frames it out.
async fn write_packet<W>(
    writer: &mut FrameWriter<W>,
    pool: &BufferPool,
    packet: &ClientboundPacket,
) -> Result<(), ConnectionError>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut w = PacketWriter::new(pool);
    packet.encode(&mut w)?;
    writer.write_frame(w.as_slice()).await?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
