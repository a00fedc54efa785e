//! End-to-end session tests over real TCP.
//!
//! Each test binds a server on an ephemeral port and drives it with a
//! minimal client built from the same `hearth-core` frame pipeline and
//! codec the server uses. The client is deliberately dumb: it speaks
//! exactly the bytes a test needs and asserts on the typed packets that
//! come back.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use hearth_core::codec::buffer::{BufferPool, CodecError, PacketReader, PacketWriter};
use hearth_core::frame::{FrameError, FrameReader, FrameWriter};
use hearth_core::protocol::handshake::{Handshake, ServerboundHandshakePacket};
use hearth_core::protocol::login::{ClientboundLoginPacket, ServerboundLoginPacket};
use hearth_core::protocol::play::{ClientboundPlayPacket, ServerboundPlayPacket};
use hearth_core::protocol::status::{ClientboundStatusPacket, ServerboundStatusPacket};
use hearth_core::protocol::types::ConnectionState;
use hearth_core::protocol::{registry, ClientboundPacket};

use hearth_server::bridge::InboundHandler;
use hearth_server::net::{Collaborators, ConnectionId, Server, ServerContext};
use hearth_server::ServerConfig;

/// A test that stalls is a failed test; every await is capped.
const STEP: Duration = Duration::from_secs(5);

fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.port = 0;
    config.motd = "integration".to_string();
    config.max_players = 5;
    config.online_mode = false;
    config.compression_threshold = 64;
    config.keepalive_interval_ms = 10_000;
    config.keepalive_timeout_ms = 10_000;
    config.login_timeout_ms = 5_000;
    config
}

async fn start_server(config: ServerConfig, collaborators: Collaborators) -> SocketAddr {
    let server = Server::bind(config, collaborators)
        .await
        .expect("server bind");
    let addr = server.local_addr();
    tokio::spawn(server.run());
    SocketAddr::new("127.0.0.1".parse().unwrap(), addr.port())
}

// ── Minimal protocol client ───────────────────────────────────────────────────

struct TestClient {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
    state: ConnectionState,
    pool: BufferPool,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = timeout(STEP, TcpStream::connect(addr))
            .await
            .expect("connect timed out")
            .expect("connect");
        stream.set_nodelay(true).unwrap();
        let (read_half, write_half) = stream.into_split();
        let pool = BufferPool::new();
        Self {
            reader: FrameReader::new(read_half, pool.clone()),
            writer: FrameWriter::new(write_half, pool.clone()),
            state: ConnectionState::Handshaking,
            pool,
        }
    }

    async fn send_body(
        &mut self,
        id: i32,
        encode: impl FnOnce(&mut PacketWriter) -> Result<(), CodecError>,
    ) {
        let mut w = PacketWriter::new(&self.pool);
        w.write_varint(id);
        encode(&mut w).expect("encode");
        timeout(STEP, self.writer.write_frame(w.as_slice()))
            .await
            .expect("send timed out")
            .expect("send");
    }

    async fn send_handshake(&mut self, next_state: i32) {
        let packet = ServerboundHandshakePacket::Handshake(Handshake {
            protocol_version: hearth_core::PROTOCOL_VERSION,
            server_address: "localhost".to_string(),
            server_port: 25565,
            next_state,
        });
        self.send_body(packet.id(), |w| packet.encode_body(w)).await;
        self.state = match next_state {
            1 => ConnectionState::Status,
            2 => ConnectionState::Login,
            _ => self.state,
        };
    }

    async fn send_status(&mut self, packet: ServerboundStatusPacket) {
        self.send_body(packet.id(), |w| packet.encode_body(w)).await;
    }

    async fn send_login(&mut self, packet: ServerboundLoginPacket) {
        self.send_body(packet.id(), |w| packet.encode_body(w)).await;
    }

    async fn send_play(&mut self, packet: ServerboundPlayPacket) {
        self.send_body(packet.id(), |w| packet.encode_body(w)).await;
    }

    /// Reads and decodes the next clientbound packet in the current state.
    async fn recv(&mut self) -> Result<ClientboundPacket, FrameError> {
        let frame = timeout(STEP, self.reader.next_frame())
            .await
            .expect("recv timed out")?;
        let mut r = PacketReader::new(frame.as_slice());
        let id = r.read_varint().expect("packet id");
        let packet = registry::decode_clientbound(self.state, id, &mut r)
            .expect("decode")
            .unwrap_or_else(|| panic!("unknown clientbound id {id:#04x} in {}", self.state));
        Ok(packet)
    }

    /// Completes an offline login as `name`, consuming SetCompression and
    /// the join burst, and leaves the connection in Play.
    async fn login(&mut self, name: &str) {
        self.send_handshake(2).await;
        self.send_login(ServerboundLoginPacket::LoginStart {
            name: name.to_string(),
        })
        .await;

        match self.recv().await.expect("login reply") {
            ClientboundPacket::Login(ClientboundLoginPacket::SetCompression { threshold }) => {
                assert!(threshold >= 0);
                self.reader.enable_compression().unwrap();
                self.writer.enable_compression(threshold as usize).unwrap();
            }
            other => panic!("expected SetCompression, got {other:?}"),
        }
        match self.recv().await.expect("login reply") {
            ClientboundPacket::Login(ClientboundLoginPacket::LoginSuccess { username, .. }) => {
                assert_eq!(username, name);
            }
            other => panic!("expected LoginSuccess, got {other:?}"),
        }
        self.state = ConnectionState::Play;

        // Join burst: JoinGame, PlayerPositionAndLook, SpawnPosition,
        // PlayerInfo.
        for _ in 0..4 {
            self.recv().await.expect("join burst");
        }
    }

    /// Reads until the predicate matches or the stream ends; returns the
    /// matching packet.
    async fn recv_until(
        &mut self,
        mut predicate: impl FnMut(&ClientboundPacket) -> bool,
    ) -> Option<ClientboundPacket> {
        loop {
            match self.recv().await {
                Ok(packet) if predicate(&packet) => return Some(packet),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Waits for the server to drop the connection.
    async fn expect_closed(&mut self) {
        loop {
            match timeout(Duration::from_secs(10), self.reader.next_frame()).await {
                Ok(Ok(_)) => continue,
                Ok(Err(_)) => return,
                Err(_) => panic!("server never closed the connection"),
            }
        }
    }
}

/// Captures every packet the handler boundary delivers.
#[derive(Default)]
struct Collector {
    seen: Mutex<Vec<ServerboundPlayPacket>>,
}

impl InboundHandler for Collector {
    fn deliver(
        &self,
        _ctx: &Arc<ServerContext>,
        _connection_id: ConnectionId,
        packet: &ServerboundPlayPacket,
    ) {
        self.seen.lock().unwrap().push(packet.clone());
    }
}

// ── Status ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_status_ping_round_trip() {
    let addr = start_server(test_config(), Collaborators::default()).await;
    let mut client = TestClient::connect(addr).await;

    client.send_handshake(1).await;
    client.send_status(ServerboundStatusPacket::Request).await;

    let json = match client.recv().await.expect("status response") {
        ClientboundPacket::Status(ClientboundStatusPacket::Response { json }) => json,
        other => panic!("expected StatusResponse, got {other:?}"),
    };
    let document: serde_json::Value = serde_json::from_str(&json).expect("status JSON");
    assert_eq!(document["version"]["protocol"], 754);
    assert_eq!(document["version"]["name"], "1.16.5");
    assert_eq!(document["players"]["max"], 5);
    assert_eq!(document["players"]["online"], 0);
    assert_eq!(document["description"]["text"], "integration");

    let token = 0x1122_3344_5566_7788_i64;
    client
        .send_status(ServerboundStatusPacket::Ping { payload: token })
        .await;
    match client.recv().await.expect("pong") {
        ClientboundPacket::Status(ClientboundStatusPacket::Pong { payload }) => {
            assert_eq!(payload, token);
        }
        other => panic!("expected Pong, got {other:?}"),
    }
}

// ── Login ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_offline_login_reaches_play() {
    let addr = start_server(test_config(), Collaborators::default()).await;
    let mut client = TestClient::connect(addr).await;
    client.login("Alice").await;

    // The connection is live in Play: chat comes back as a broadcast.
    client
        .send_play(ServerboundPlayPacket::ChatMessage {
            message: "hello".to_string(),
        })
        .await;
    let packet = client
        .recv_until(|p| {
            matches!(
                p,
                ClientboundPacket::Play(ClientboundPlayPacket::ChatMessage { .. })
            )
        })
        .await
        .expect("chat broadcast");
    match packet {
        ClientboundPacket::Play(ClientboundPlayPacket::ChatMessage { content, .. }) => {
            assert!(content.0.contains("hello"));
            assert!(content.0.contains("Alice"));
        }
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn test_login_success_carries_offline_uuid() {
    let addr = start_server(test_config(), Collaborators::default()).await;
    let mut client = TestClient::connect(addr).await;
    client.send_handshake(2).await;
    client
        .send_login(ServerboundLoginPacket::LoginStart {
            name: "Alice".to_string(),
        })
        .await;

    // Skip SetCompression.
    match client.recv().await.unwrap() {
        ClientboundPacket::Login(ClientboundLoginPacket::SetCompression { threshold }) => {
            client.reader.enable_compression().unwrap();
            client.writer.enable_compression(threshold as usize).unwrap();
        }
        other => panic!("expected SetCompression, got {other:?}"),
    }
    match client.recv().await.unwrap() {
        ClientboundPacket::Login(ClientboundLoginPacket::LoginSuccess { uuid, username }) => {
            assert_eq!(username, "Alice");
            assert_eq!(uuid, hearth_server::auth::offline_uuid("Alice"));
        }
        other => panic!("expected LoginSuccess, got {other:?}"),
    }
}

#[tokio::test]
async fn test_compression_disabled_skips_set_compression() {
    let mut config = test_config();
    config.compression_threshold = -1;
    let addr = start_server(config, Collaborators::default()).await;
    let mut client = TestClient::connect(addr).await;
    client.send_handshake(2).await;
    client
        .send_login(ServerboundLoginPacket::LoginStart {
            name: "Alice".to_string(),
        })
        .await;

    // LoginSuccess arrives directly, in plain framing.
    match client.recv().await.unwrap() {
        ClientboundPacket::Login(ClientboundLoginPacket::LoginSuccess { username, .. }) => {
            assert_eq!(username, "Alice");
        }
        other => panic!("expected LoginSuccess, got {other:?}"),
    }
}

// ── Compression threshold ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_inbound_frames_honour_compression_threshold() {
    let collector = Arc::new(Collector::default());
    let collaborators = Collaborators {
        handler: Some(collector.clone()),
        ..Default::default()
    };
    let mut config = test_config();
    config.compression_threshold = 256;
    let addr = start_server(config, collaborators).await;

    let mut client = TestClient::connect(addr).await;
    client.login("Alice").await;

    // One message under the threshold (pass-through framing) and one
    // over it (deflated framing); the server must decode both.
    let short = "a".repeat(100);
    let long = "b".repeat(1024);
    client
        .send_play(ServerboundPlayPacket::PluginMessage {
            channel: "test:short".to_string(),
            data: short.clone().into_bytes(),
        })
        .await;
    client
        .send_play(ServerboundPlayPacket::PluginMessage {
            channel: "test:long".to_string(),
            data: long.clone().into_bytes(),
        })
        .await;

    // Delivery is asynchronous; poll the collector briefly.
    let deadline = tokio::time::Instant::now() + STEP;
    loop {
        {
            let seen = collector.seen.lock().unwrap();
            if seen.len() >= 2 {
                assert!(matches!(
                    &seen[0],
                    ServerboundPlayPacket::PluginMessage { channel, data }
                        if channel == "test:short" && data.len() == short.len()
                ));
                assert!(matches!(
                    &seen[1],
                    ServerboundPlayPacket::PluginMessage { channel, data }
                        if channel == "test:long" && data.len() == long.len()
                ));
                break;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "plugin messages never reached the handler"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ── Duplicate login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_duplicate_login_evicts_first_connection() {
    let addr = start_server(test_config(), Collaborators::default()).await;

    let mut first = TestClient::connect(addr).await;
    first.login("Alice").await;

    let mut second = TestClient::connect(addr).await;
    second.login("Alice").await;

    // The first connection receives the eviction disconnect and is closed.
    let packet = first
        .recv_until(|p| {
            matches!(
                p,
                ClientboundPacket::Play(ClientboundPlayPacket::Disconnect { .. })
            )
        })
        .await
        .expect("eviction disconnect");
    match packet {
        ClientboundPacket::Play(ClientboundPlayPacket::Disconnect { reason }) => {
            assert!(reason.0.contains("another location"), "reason: {}", reason.0);
        }
        _ => unreachable!(),
    }
    first.expect_closed().await;

    // The second connection stays healthy.
    second
        .send_play(ServerboundPlayPacket::ChatMessage {
            message: "still here".to_string(),
        })
        .await;
    assert!(second
        .recv_until(|p| {
            matches!(
                p,
                ClientboundPacket::Play(ClientboundPlayPacket::ChatMessage { .. })
            )
        })
        .await
        .is_some());
}

// ── Keep-alive ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_keepalive_timeout_disconnects_mute_client() {
    // A timeout that is not a multiple of the interval, so the deadline
    // cannot hide behind tick granularity.
    let mut config = test_config();
    config.keepalive_interval_ms = 100;
    config.keepalive_timeout_ms = 250;
    let addr = start_server(config, Collaborators::default()).await;

    let mut client = TestClient::connect(addr).await;
    client.login("Alice").await;

    // Consume the first KeepAlive and never echo it.
    let packet = client
        .recv_until(|p| {
            matches!(
                p,
                ClientboundPacket::Play(ClientboundPlayPacket::KeepAlive { .. })
            )
        })
        .await;
    assert!(packet.is_some(), "never saw a KeepAlive");

    // The disconnect must land at the echo deadline, not on a later
    // emission tick: timeout plus one interval of scheduling slack plus
    // a little jitter. No Disconnect packet precedes a keep-alive
    // termination.
    let started = tokio::time::Instant::now();
    client.expect_closed().await;
    assert!(
        started.elapsed() < Duration::from_millis(250 + 100 + 150),
        "disconnect took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_keepalive_echo_keeps_connection_alive() {
    let mut config = test_config();
    config.keepalive_interval_ms = 100;
    config.keepalive_timeout_ms = 250;
    let addr = start_server(config, Collaborators::default()).await;

    let mut client = TestClient::connect(addr).await;
    client.login("Alice").await;

    // Echo every KeepAlive for a window several timeouts long.
    let deadline = tokio::time::Instant::now() + Duration::from_millis(900);
    while tokio::time::Instant::now() < deadline {
        match timeout(Duration::from_millis(200), client.reader.next_frame()).await {
            Ok(frame) => {
                let frame = frame.expect("connection dropped despite echoes");
                let mut r = PacketReader::new(frame.as_slice());
                let id = r.read_varint().unwrap();
                if let Some(ClientboundPacket::Play(ClientboundPlayPacket::KeepAlive { id })) =
                    registry::decode_clientbound(ConnectionState::Play, id, &mut r).unwrap()
                {
                    client
                        .send_play(ServerboundPlayPacket::KeepAlive { id })
                        .await;
                }
            }
            Err(_) => continue,
        }
    }

    // Still alive: a chat round-trips.
    client
        .send_play(ServerboundPlayPacket::ChatMessage {
            message: "alive".to_string(),
        })
        .await;
    assert!(client
        .recv_until(|p| {
            matches!(
                p,
                ClientboundPacket::Play(ClientboundPlayPacket::ChatMessage { .. })
            )
        })
        .await
        .is_some());
}

// ── Protocol violations ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_malformed_known_packet_terminates_connection() {
    let addr = start_server(test_config(), Collaborators::default()).await;
    let mut client = TestClient::connect(addr).await;

    client.send_handshake(1).await;
    // Ping declares an i64 payload; send two bytes.
    client.send_body(0x01, |w| {
        w.write_u8(0xDE);
        w.write_u8(0xAD);
        Ok(())
    })
    .await;
    client.expect_closed().await;
}

#[tokio::test]
async fn test_invalid_handshake_next_state_terminates_connection() {
    let addr = start_server(test_config(), Collaborators::default()).await;
    let mut client = TestClient::connect(addr).await;
    client.send_handshake(7).await;
    client.expect_closed().await;
}

#[tokio::test]
async fn test_unknown_packet_id_is_skipped_not_fatal() {
    let addr = start_server(test_config(), Collaborators::default()).await;
    let mut client = TestClient::connect(addr).await;
    client.login("Alice").await;

    // 0x7C is not a 754 serverbound play id; the frame must be skipped.
    client.send_body(0x7C, |w| {
        w.write_bytes(&[1, 2, 3]);
        Ok(())
    })
    .await;

    // The connection survives: chat still round-trips.
    client
        .send_play(ServerboundPlayPacket::ChatMessage {
            message: "survived".to_string(),
        })
        .await;
    assert!(client
        .recv_until(|p| {
            matches!(
                p,
                ClientboundPacket::Play(ClientboundPlayPacket::ChatMessage { .. })
            )
        })
        .await
        .is_some());
}

#[tokio::test]
async fn test_wrong_protocol_version_is_refused_at_login() {
    let addr = start_server(test_config(), Collaborators::default()).await;
    let mut client = TestClient::connect(addr).await;

    let packet = ServerboundHandshakePacket::Handshake(Handshake {
        protocol_version: 47,
        server_address: "localhost".to_string(),
        server_port: 25565,
        next_state: 2,
    });
    client.send_body(packet.id(), |w| packet.encode_body(w)).await;
    client.state = ConnectionState::Login;
    client
        .send_login(ServerboundLoginPacket::LoginStart {
            name: "Alice".to_string(),
        })
        .await;

    match client.recv().await.expect("refusal") {
        ClientboundPacket::Login(ClientboundLoginPacket::Disconnect { .. }) => {}
        other => panic!("expected login Disconnect, got {other:?}"),
    }
    client.expect_closed().await;
}

#[tokio::test]
async fn test_login_deadline_closes_stalled_connection() {
    let mut config = test_config();
    config.login_timeout_ms = 200;
    let addr = start_server(config, Collaborators::default()).await;

    let mut client = TestClient::connect(addr).await;
    client.send_handshake(2).await;
    // Never send LoginStart.
    let started = tokio::time::Instant::now();
    client.expect_closed().await;
    assert!(started.elapsed() < Duration::from_secs(5));
}

// ── Online mode ───────────────────────────────────────────────────────────────

/// A verifier that records the digest it was handed and accepts.
#[derive(Default)]
struct RecordingVerifier {
    hash: Mutex<Option<String>>,
}

#[async_trait::async_trait]
impl hearth_server::auth::SessionVerifier for RecordingVerifier {
    async fn verify_session(
        &self,
        username: &str,
        server_id_hash: &str,
    ) -> Result<hearth_core::protocol::types::GameProfile, hearth_server::auth::AuthError> {
        *self.hash.lock().unwrap() = Some(server_id_hash.to_string());
        Ok(hearth_core::protocol::types::GameProfile::new(
            uuid::Uuid::from_u128(0xA11CE),
            username,
        ))
    }
}

#[tokio::test]
async fn test_online_mode_login_runs_the_encryption_handshake() {
    use rsa::pkcs8::DecodePublicKey;
    use rsa::{Pkcs1v15Encrypt, RsaPublicKey};

    let verifier = Arc::new(RecordingVerifier::default());
    let collaborators = Collaborators {
        verifier: Some(verifier.clone()),
        ..Default::default()
    };
    let mut config = test_config();
    config.online_mode = true;
    let addr = start_server(config, collaborators).await;

    let mut client = TestClient::connect(addr).await;
    client.send_handshake(2).await;
    client
        .send_login(ServerboundLoginPacket::LoginStart {
            name: "Alice".to_string(),
        })
        .await;

    // EncryptionRequest: empty server id, DER key, 4-byte token.
    let (public_key, verify_token) = match client.recv().await.expect("encryption request") {
        ClientboundPacket::Login(ClientboundLoginPacket::EncryptionRequest {
            server_id,
            public_key,
            verify_token,
        }) => {
            assert!(server_id.is_empty());
            assert_eq!(verify_token.len(), 4);
            (public_key, verify_token)
        }
        other => panic!("expected EncryptionRequest, got {other:?}"),
    };

    // Encrypt a fresh shared secret and the echoed token with the
    // server's public key, exactly as a vanilla client does.
    let rsa_key = RsaPublicKey::from_public_key_der(&public_key).expect("SPKI DER");
    let mut rng = rand::thread_rng();
    let secret: [u8; 16] = rand::random();
    let encrypted_secret = rsa_key
        .encrypt(&mut rng, Pkcs1v15Encrypt, &secret)
        .expect("encrypt secret");
    let encrypted_token = rsa_key
        .encrypt(&mut rng, Pkcs1v15Encrypt, &verify_token)
        .expect("encrypt token");
    client
        .send_login(ServerboundLoginPacket::EncryptionResponse {
            shared_secret: encrypted_secret,
            verify_token: encrypted_token,
        })
        .await;

    // Everything from here on is AES/CFB8 in both directions.
    client.writer.enable_encryption(&secret).unwrap();
    client.reader.enable_encryption(&secret).unwrap();

    match client.recv().await.expect("set compression") {
        ClientboundPacket::Login(ClientboundLoginPacket::SetCompression { threshold }) => {
            client.reader.enable_compression().unwrap();
            client.writer.enable_compression(threshold as usize).unwrap();
        }
        other => panic!("expected SetCompression, got {other:?}"),
    }
    match client.recv().await.expect("login success") {
        ClientboundPacket::Login(ClientboundLoginPacket::LoginSuccess { uuid, username }) => {
            assert_eq!(username, "Alice");
            assert_eq!(uuid, uuid::Uuid::from_u128(0xA11CE));
        }
        other => panic!("expected LoginSuccess, got {other:?}"),
    }
    client.state = ConnectionState::Play;

    // The verifier saw the digest both sides derive from the secret.
    let expected = hearth_server::auth::server_id_hash("", &secret, &public_key);
    assert_eq!(verifier.hash.lock().unwrap().as_deref(), Some(expected.as_str()));

    // The encrypted, compressed session is fully usable.
    for _ in 0..4 {
        client.recv().await.expect("join burst");
    }
    client
        .send_play(ServerboundPlayPacket::ChatMessage {
            message: "over cfb8".to_string(),
        })
        .await;
    assert!(client
        .recv_until(|p| {
            matches!(
                p,
                ClientboundPacket::Play(ClientboundPlayPacket::ChatMessage { .. })
            )
        })
        .await
        .is_some());
}

#[tokio::test]
async fn test_tampered_verify_token_is_a_protocol_violation() {
    use rsa::pkcs8::DecodePublicKey;
    use rsa::{Pkcs1v15Encrypt, RsaPublicKey};

    let mut config = test_config();
    config.online_mode = true;
    let addr = start_server(config, Collaborators::default()).await;

    let mut client = TestClient::connect(addr).await;
    client.send_handshake(2).await;
    client
        .send_login(ServerboundLoginPacket::LoginStart {
            name: "Alice".to_string(),
        })
        .await;

    let public_key = match client.recv().await.expect("encryption request") {
        ClientboundPacket::Login(ClientboundLoginPacket::EncryptionRequest {
            public_key, ..
        }) => public_key,
        other => panic!("expected EncryptionRequest, got {other:?}"),
    };

    let rsa_key = RsaPublicKey::from_public_key_der(&public_key).expect("SPKI DER");
    let mut rng = rand::thread_rng();
    let secret: [u8; 16] = rand::random();
    let encrypted_secret = rsa_key
        .encrypt(&mut rng, Pkcs1v15Encrypt, &secret)
        .expect("encrypt secret");
    // Echo the wrong token bytes.
    let encrypted_token = rsa_key
        .encrypt(&mut rng, Pkcs1v15Encrypt, &[9, 9, 9, 9])
        .expect("encrypt token");
    client
        .send_login(ServerboundLoginPacket::EncryptionResponse {
            shared_secret: encrypted_secret,
            verify_token: encrypted_token,
        })
        .await;

    // The refusal arrives before encryption was ever enabled.
    match client.recv().await.expect("refusal") {
        ClientboundPacket::Login(ClientboundLoginPacket::Disconnect { .. }) => {}
        other => panic!("expected login Disconnect, got {other:?}"),
    }
    client.expect_closed().await;
}

// ── Capacity ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_capacity_refuses_login_over_cap() {
    let mut config = test_config();
    config.max_players = 1;
    let addr = start_server(config, Collaborators::default()).await;

    let mut first = TestClient::connect(addr).await;
    first.login("Alice").await;

    let mut second = TestClient::connect(addr).await;
    second.send_handshake(2).await;
    second
        .send_login(ServerboundLoginPacket::LoginStart {
            name: "Bob".to_string(),
        })
        .await;

    // Refusal may come before or after SetCompression depending on where
    // the cap check lands; this server refuses before.
    match second.recv().await.expect("refusal") {
        ClientboundPacket::Login(ClientboundLoginPacket::Disconnect { reason }) => {
            assert!(reason.0.to_lowercase().contains("full"), "reason: {}", reason.0);
        }
        other => panic!("expected login Disconnect, got {other:?}"),
    }
    second.expect_closed().await;
}
