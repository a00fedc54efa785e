//! The connection state machine: Handshaking → Status | Login → Play.
//!
//! [`Driver`] runs on the reader task. It parses each frame through the
//! registry, walks the state transitions, performs the login and
//! encryption handshake, answers status queries, verifies keep-alive
//! echoes, and hands everything else in Play to the inbound handler
//! boundary.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, trace};

use hearth_core::codec::buffer::PacketReader;
use hearth_core::frame::FrameReader;
use hearth_core::protocol::handshake::{
    Handshake, ServerboundHandshakePacket, NEXT_STATE_LOGIN, NEXT_STATE_STATUS,
};
use hearth_core::protocol::login::{ClientboundLoginPacket, ServerboundLoginPacket};
use hearth_core::protocol::play::{
    ClientboundPlayPacket, PlayerInfoAction, PlayerInfoEntry, ServerboundPlayPacket,
};
use hearth_core::protocol::status::{ClientboundStatusPacket, ServerboundStatusPacket};
use hearth_core::protocol::types::{
    default_dimension_codec, overworld_dimension_type, AbsolutePosition, BlockPos, ConnectionState,
    Direction, GameProfile,
};
use hearth_core::protocol::{registry, ClientboundPacket, ServerboundPacket};
use hearth_core::codec::nbt::NbtTag;

use crate::auth::{offline_uuid, server_id_hash};
use crate::net::connection::{ConnectionError, ConnectionShared, Outbound};
use crate::net::ServerContext;

/// Login-phase scratch: set when EncryptionRequest goes out, consumed by
/// EncryptionResponse.
struct PendingEncryption {
    username: String,
    verify_token: [u8; 4],
}

/// The per-connection protocol driver; owns the inbound frame pipeline.
pub(crate) struct Driver<R> {
    ctx: Arc<ServerContext>,
    shared: Arc<ConnectionShared>,
    out: mpsc::Sender<Outbound>,
    frame: FrameReader<R>,
    state: ConnectionState,
    protocol_version: i32,
    pending_encryption: Option<PendingEncryption>,
}

impl<R: AsyncRead + Unpin + Send> Driver<R> {
    pub fn new(
        ctx: Arc<ServerContext>,
        shared: Arc<ConnectionShared>,
        out: mpsc::Sender<Outbound>,
        frame: FrameReader<R>,
    ) -> Self {
        Self {
            ctx,
            shared,
            out,
            frame,
            state: ConnectionState::Handshaking,
            protocol_version: 0,
            pending_encryption: None,
        }
    }

    pub fn shared(&self) -> &ConnectionShared {
        &self.shared
    }

    pub fn outbound(&self) -> &mpsc::Sender<Outbound> {
        &self.out
    }

    /// Reads and dispatches frames until shutdown, a clean close, or an
    /// error. Shutdown returns `Ok`; everything else surfaces its cause.
    pub async fn run(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), ConnectionError> {
        let login_deadline =
            Instant::now() + Duration::from_millis(u64::from(self.ctx.config.login_timeout_ms));

        loop {
            let logging_in = self.state != ConnectionState::Play;
            let frame = tokio::select! {
                _ = shutdown.changed() => return Ok(()),
                result = self.frame.next_frame() => result?,
                _ = tokio::time::sleep_until(login_deadline), if logging_in => {
                    return Err(ConnectionError::LoginTimeout);
                }
            };
            self.handle_frame(frame.as_slice()).await?;
        }
    }

    /// Decodes one plaintext frame and walks the state machine.
    async fn handle_frame(&mut self, frame: &[u8]) -> Result<(), ConnectionError> {
        let mut r = PacketReader::new(frame);
        let id = r.read_varint()?;

        let descriptor = registry::lookup(self.state, Direction::Serverbound, id);
        let packet = match registry::decode_serverbound(self.state, id, &mut r) {
            Ok(Some(packet)) => packet,
            Ok(None) => {
                // Unknown id, or an id valid only in some other state:
                // non-fatal, skip the frame.
                trace!(
                    id = self.shared.id,
                    state = %self.state,
                    packet_id = %format_args!("{id:#04x}"),
                    "skipping unknown packet"
                );
                return Ok(());
            }
            Err(e) => {
                let name = descriptor.map_or("?", |d| d.name);
                return Err(ConnectionError::ProtocolViolation(format!(
                    "{name} failed to decode: {e}"
                )));
            }
        };
        if let Err(e) = r.expect_empty() {
            let name = descriptor.map_or("?", |d| d.name);
            return Err(ConnectionError::ProtocolViolation(format!("{name}: {e}")));
        }

        // Any well-formed inbound packet refreshes the idle grace.
        self.shared
            .keepalive
            .lock()
            .expect("keepalive lock")
            .last_seen = Instant::now();

        match packet {
            ServerboundPacket::Handshaking(packet) => self.on_handshake(packet),
            ServerboundPacket::Status(packet) => self.on_status(packet).await,
            ServerboundPacket::Login(packet) => self.on_login(packet).await,
            ServerboundPacket::Play(packet) => self.on_play(packet).await,
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        self.shared.set_state(state);
    }

    async fn send(&self, packet: ClientboundPacket) -> Result<(), ConnectionError> {
        self.out
            .send(Outbound::Packet(packet))
            .await
            .map_err(|_| ConnectionError::Closed)
    }

    // ── Handshaking ───────────────────────────────────────────────────────────

    fn on_handshake(&mut self, packet: ServerboundHandshakePacket) -> Result<(), ConnectionError> {
        let ServerboundHandshakePacket::Handshake(Handshake {
            protocol_version,
            server_address,
            server_port,
            next_state,
        }) = packet;
        trace!(
            id = self.shared.id,
            protocol_version,
            address = %server_address,
            port = server_port,
            "handshake"
        );
        self.protocol_version = protocol_version;
        match next_state {
            NEXT_STATE_STATUS => self.set_state(ConnectionState::Status),
            NEXT_STATE_LOGIN => self.set_state(ConnectionState::Login),
            other => {
                return Err(ConnectionError::ProtocolViolation(format!(
                    "handshake requested invalid next state {other}"
                )))
            }
        }
        Ok(())
    }

    // ── Status ────────────────────────────────────────────────────────────────

    async fn on_status(&mut self, packet: ServerboundStatusPacket) -> Result<(), ConnectionError> {
        match packet {
            ServerboundStatusPacket::Request => {
                let online = self.ctx.sessions.player_count().await as u32;
                let info = self.ctx.events.on_status_request(online);
                let sample: Vec<serde_json::Value> = info
                    .sample
                    .iter()
                    .map(|p| serde_json::json!({ "name": p.name, "id": p.uuid }))
                    .collect();
                let json = serde_json::json!({
                    "version": {
                        "name": hearth_core::GAME_VERSION,
                        "protocol": hearth_core::PROTOCOL_VERSION,
                    },
                    "players": {
                        "max": info.max_players,
                        "online": info.online,
                        "sample": sample,
                    },
                    "description": { "text": info.motd },
                })
                .to_string();
                self.send(ClientboundPacket::Status(ClientboundStatusPacket::Response {
                    json,
                }))
                .await
            }
            ServerboundStatusPacket::Ping { payload } => {
                self.send(ClientboundPacket::Status(ClientboundStatusPacket::Pong {
                    payload,
                }))
                .await
                // The close that follows is client-initiated; the reader
                // simply sees EOF on the next frame.
            }
        }
    }

    // ── Login ─────────────────────────────────────────────────────────────────

    async fn on_login(&mut self, packet: ServerboundLoginPacket) -> Result<(), ConnectionError> {
        match packet {
            ServerboundLoginPacket::LoginStart { name } => self.on_login_start(name).await,
            ServerboundLoginPacket::EncryptionResponse {
                shared_secret,
                verify_token,
            } => {
                self.on_encryption_response(&shared_secret, &verify_token)
                    .await
            }
            ServerboundLoginPacket::LoginPluginResponse { message_id, .. } => {
                trace!(id = self.shared.id, message_id, "login plugin response ignored");
                Ok(())
            }
        }
    }

    async fn on_login_start(&mut self, name: String) -> Result<(), ConnectionError> {
        if self.pending_encryption.is_some() {
            return Err(ConnectionError::ProtocolViolation(
                "LoginStart repeated during encryption handshake".to_string(),
            ));
        }
        if self.protocol_version != hearth_core::PROTOCOL_VERSION {
            return Err(ConnectionError::ProtocolViolation(format!(
                "unsupported protocol version {} (need {})",
                self.protocol_version,
                hearth_core::PROTOCOL_VERSION
            )));
        }

        if self.ctx.config.online_mode {
            let verify_token: [u8; 4] = rand::random();
            self.pending_encryption = Some(PendingEncryption {
                username: name,
                verify_token,
            });
            self.send(ClientboundPacket::Login(
                ClientboundLoginPacket::EncryptionRequest {
                    server_id: String::new(),
                    public_key: self.ctx.keys.public_der().to_vec(),
                    verify_token: verify_token.to_vec(),
                },
            ))
            .await
        } else {
            let profile = GameProfile::new(offline_uuid(&name), name);
            self.complete_login(profile).await
        }
    }

    async fn on_encryption_response(
        &mut self,
        shared_secret: &[u8],
        verify_token: &[u8],
    ) -> Result<(), ConnectionError> {
        let pending = self.pending_encryption.take().ok_or_else(|| {
            ConnectionError::ProtocolViolation(
                "EncryptionResponse without EncryptionRequest".to_string(),
            )
        })?;

        let echoed_token = self.ctx.keys.decrypt(verify_token).map_err(|_| {
            ConnectionError::ProtocolViolation("verify token failed RSA decryption".to_string())
        })?;
        if echoed_token != pending.verify_token {
            return Err(ConnectionError::ProtocolViolation(
                "verify token mismatch".to_string(),
            ));
        }

        let secret = self.ctx.keys.decrypt(shared_secret).map_err(|_| {
            ConnectionError::ProtocolViolation("shared secret failed RSA decryption".to_string())
        })?;
        let key: [u8; 16] = secret.as_slice().try_into().map_err(|_| {
            ConnectionError::ProtocolViolation(format!(
                "shared secret must be 16 bytes, got {}",
                secret.len()
            ))
        })?;

        // Every byte after the EncryptionResponse is ciphered, both ways.
        self.frame.enable_encryption(&key)?;
        self.out
            .send(Outbound::EnableEncryption(key))
            .await
            .map_err(|_| ConnectionError::Closed)?;

        let hash = server_id_hash("", &key, self.ctx.keys.public_der());
        let profile = self
            .ctx
            .verifier
            .verify_session(&pending.username, &hash)
            .await?;
        self.complete_login(profile).await
    }

    /// SetCompression, LoginSuccess, the Play transition, and the join
    /// burst. Shared by the offline and online paths.
    async fn complete_login(&mut self, profile: GameProfile) -> Result<(), ConnectionError> {
        match self.ctx.sessions.bind_player(self.shared.id, &profile).await {
            Ok(()) => {}
            Err(crate::net::session::BindError::Capacity) => {
                return Err(ConnectionError::Capacity);
            }
        }

        if let Some(threshold) = self.ctx.config.compression() {
            self.send(ClientboundPacket::Login(
                ClientboundLoginPacket::SetCompression {
                    threshold: threshold as i32,
                },
            ))
            .await?;
            // The very next outbound packet uses compressed framing, and
            // so does the next inbound one.
            self.out
                .send(Outbound::EnableCompression(threshold))
                .await
                .map_err(|_| ConnectionError::Closed)?;
            self.frame.enable_compression()?;
        }

        self.send(ClientboundPacket::Login(ClientboundLoginPacket::LoginSuccess {
            uuid: profile.uuid,
            username: profile.name.clone(),
        }))
        .await?;
        self.set_state(ConnectionState::Play);
        debug!(id = self.shared.id, player = %profile.name, "login complete");

        self.send_join_sequence(&profile).await?;
        self.ctx.events.on_join(&profile).await;
        Ok(())
    }

    async fn send_join_sequence(&self, profile: &GameProfile) -> Result<(), ConnectionError> {
        let dimension = match overworld_dimension_type() {
            NbtTag::Compound(compound) => compound,
            _ => unreachable!("dimension type is a compound"),
        };
        self.send(ClientboundPacket::Play(ClientboundPlayPacket::JoinGame {
            entity_id: self.shared.id as i32,
            is_hardcore: false,
            gamemode: 1,
            previous_gamemode: -1,
            world_names: vec!["minecraft:overworld".to_string()],
            dimension_codec: default_dimension_codec(),
            dimension,
            world_name: "minecraft:overworld".to_string(),
            hashed_seed: 0,
            max_players: self.ctx.config.max_players as i32,
            view_distance: 10,
            reduced_debug_info: false,
            enable_respawn_screen: true,
            is_debug: false,
            is_flat: true,
        }))
        .await?;
        self.send(ClientboundPacket::Play(
            ClientboundPlayPacket::PlayerPositionAndLook {
                position: AbsolutePosition::new(8.5, 65.0, 8.5),
                yaw: 0.0,
                pitch: 0.0,
                flags: 0,
                teleport_id: 1,
            },
        ))
        .await?;
        self.send(ClientboundPacket::Play(ClientboundPlayPacket::SpawnPosition {
            position: BlockPos::new(8, 64, 8),
        }))
        .await?;
        self.send(ClientboundPacket::Play(ClientboundPlayPacket::PlayerInfo {
            action: PlayerInfoAction::AddPlayers(vec![PlayerInfoEntry {
                profile: profile.clone(),
                gamemode: 1,
                ping: 0,
                display_name: None,
            }]),
        }))
        .await
    }

    // ── Play ──────────────────────────────────────────────────────────────────

    async fn on_play(&mut self, packet: ServerboundPlayPacket) -> Result<(), ConnectionError> {
        if let ServerboundPlayPacket::KeepAlive { id } = packet {
            return self.on_keepalive_echo(id);
        }
        self.ctx
            .handler
            .deliver(&self.ctx_arc(), self.shared.id, &packet);
        Ok(())
    }

    fn on_keepalive_echo(&self, echoed: i64) -> Result<(), ConnectionError> {
        let mut ka = self.shared.keepalive.lock().expect("keepalive lock");
        match ka.pending {
            Some((token, _)) if token == echoed => {
                ka.pending = None;
                Ok(())
            }
            Some((token, _)) => {
                debug!(
                    id = self.shared.id,
                    expected = token,
                    got = echoed,
                    "keep-alive echo mismatch"
                );
                Err(ConnectionError::KeepAliveTimeout)
            }
            // An echo nothing is pending for; harmless.
            None => Ok(()),
        }
    }

    fn ctx_arc(&self) -> Arc<ServerContext> {
        Arc::clone(&self.ctx)
    }
}
