//! The packet registry: `(state, direction, id)` → descriptor.
//!
//! The table is the single source of truth for which ids the engine
//! understands, populated to match the protocol 754 reference for every
//! packet the engine encodes or decodes. Ids are local to a
//! `(state, direction)` pair.
//!
//! A well-formed frame whose id has no entry here is **non-fatal**: the
//! caller logs it and skips the frame. The same applies to an id that is
//! only valid in some other state. A frame whose id *is* registered but
//! whose body fails to decode (or leaves trailing bytes) is a protocol
//! violation and terminates the connection; that decision lives in the
//! connection layer.

use crate::codec::buffer::{CodecError, PacketReader};
use crate::protocol::types::{ConnectionState, Direction};
use crate::protocol::{handshake, login, play, status, ClientboundPacket, ServerboundPacket};

/// One registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketDescriptor {
    pub state: ConnectionState,
    pub direction: Direction,
    pub id: i32,
    pub name: &'static str,
}

const fn entry(
    state: ConnectionState,
    direction: Direction,
    id: i32,
    name: &'static str,
) -> PacketDescriptor {
    PacketDescriptor {
        state,
        direction,
        id,
        name,
    }
}

use ConnectionState::{Handshaking, Login, Play, Status};
use Direction::{Clientbound, Serverbound};

/// Every packet the engine speaks, in `(state, direction, id)` order.
pub static REGISTRY: &[PacketDescriptor] = &[
    // Handshaking
    entry(Handshaking, Serverbound, 0x00, "Handshake"),
    // Status
    entry(Status, Serverbound, 0x00, "StatusRequest"),
    entry(Status, Serverbound, 0x01, "Ping"),
    entry(Status, Clientbound, 0x00, "StatusResponse"),
    entry(Status, Clientbound, 0x01, "Pong"),
    // Login
    entry(Login, Serverbound, 0x00, "LoginStart"),
    entry(Login, Serverbound, 0x01, "EncryptionResponse"),
    entry(Login, Serverbound, 0x02, "LoginPluginResponse"),
    entry(Login, Clientbound, 0x00, "LoginDisconnect"),
    entry(Login, Clientbound, 0x01, "EncryptionRequest"),
    entry(Login, Clientbound, 0x02, "LoginSuccess"),
    entry(Login, Clientbound, 0x03, "SetCompression"),
    // Play, serverbound
    entry(Play, Serverbound, 0x00, "TeleportConfirm"),
    entry(Play, Serverbound, 0x03, "ChatMessage"),
    entry(Play, Serverbound, 0x04, "ClientStatus"),
    entry(Play, Serverbound, 0x05, "ClientSettings"),
    entry(Play, Serverbound, 0x0B, "PluginMessage"),
    entry(Play, Serverbound, 0x10, "KeepAlive"),
    entry(Play, Serverbound, 0x12, "PlayerPosition"),
    entry(Play, Serverbound, 0x13, "PlayerPositionAndRotation"),
    entry(Play, Serverbound, 0x14, "PlayerRotation"),
    entry(Play, Serverbound, 0x15, "PlayerMovement"),
    entry(Play, Serverbound, 0x1A, "PlayerAbilities"),
    entry(Play, Serverbound, 0x1B, "PlayerDigging"),
    entry(Play, Serverbound, 0x1C, "EntityAction"),
    entry(Play, Serverbound, 0x25, "HeldItemChange"),
    entry(Play, Serverbound, 0x28, "CreativeInventoryAction"),
    entry(Play, Serverbound, 0x2C, "Animation"),
    entry(Play, Serverbound, 0x2E, "PlayerBlockPlacement"),
    entry(Play, Serverbound, 0x2F, "UseItem"),
    // Play, clientbound
    entry(Play, Clientbound, 0x04, "SpawnPlayer"),
    entry(Play, Clientbound, 0x0B, "BlockChange"),
    entry(Play, Clientbound, 0x0C, "BossBar"),
    entry(Play, Clientbound, 0x0D, "ServerDifficulty"),
    entry(Play, Clientbound, 0x0E, "ChatMessage"),
    entry(Play, Clientbound, 0x10, "DeclareCommands"),
    entry(Play, Clientbound, 0x15, "SetSlot"),
    entry(Play, Clientbound, 0x17, "PluginMessage"),
    entry(Play, Clientbound, 0x19, "Disconnect"),
    entry(Play, Clientbound, 0x1F, "KeepAlive"),
    entry(Play, Clientbound, 0x22, "Particle"),
    entry(Play, Clientbound, 0x24, "JoinGame"),
    entry(Play, Clientbound, 0x27, "EntityPosition"),
    entry(Play, Clientbound, 0x30, "PlayerAbilities"),
    entry(Play, Clientbound, 0x32, "PlayerInfo"),
    entry(Play, Clientbound, 0x34, "PlayerPositionAndLook"),
    entry(Play, Clientbound, 0x36, "DestroyEntities"),
    entry(Play, Clientbound, 0x3F, "HeldItemChange"),
    entry(Play, Clientbound, 0x42, "SpawnPosition"),
    entry(Play, Clientbound, 0x44, "EntityMetadata"),
    entry(Play, Clientbound, 0x46, "EntityVelocity"),
    entry(Play, Clientbound, 0x4E, "TimeUpdate"),
    entry(Play, Clientbound, 0x56, "EntityTeleport"),
    entry(Play, Clientbound, 0x5A, "DeclareRecipes"),
];

/// Looks up the descriptor for `(state, direction, id)`, if registered.
pub fn lookup(
    state: ConnectionState,
    direction: Direction,
    id: i32,
) -> Option<&'static PacketDescriptor> {
    REGISTRY
        .iter()
        .find(|d| d.state == state && d.direction == direction && d.id == id)
}

/// Decodes a serverbound packet body for the given state and id.
///
/// `Ok(None)` means the id has no entry for this state: the caller skips
/// the frame. `Err` means the id was understood but the body was not.
pub fn decode_serverbound(
    state: ConnectionState,
    id: i32,
    r: &mut PacketReader<'_>,
) -> Result<Option<ServerboundPacket>, CodecError> {
    Ok(match state {
        ConnectionState::Handshaking => {
            handshake::ServerboundHandshakePacket::decode_body(id, r)?
                .map(ServerboundPacket::Handshaking)
        }
        ConnectionState::Status => {
            status::ServerboundStatusPacket::decode_body(id, r)?.map(ServerboundPacket::Status)
        }
        ConnectionState::Login => {
            login::ServerboundLoginPacket::decode_body(id, r)?.map(ServerboundPacket::Login)
        }
        ConnectionState::Play => {
            play::ServerboundPlayPacket::decode_body(id, r)?.map(ServerboundPacket::Play)
        }
    })
}

/// Decodes a clientbound packet body for the given state and id.
///
/// The server never consumes this path; it exists for the test harness and
/// for tools that replay captures.
pub fn decode_clientbound(
    state: ConnectionState,
    id: i32,
    r: &mut PacketReader<'_>,
) -> Result<Option<ClientboundPacket>, CodecError> {
    Ok(match state {
        ConnectionState::Handshaking => None,
        ConnectionState::Status => {
            status::ClientboundStatusPacket::decode_body(id, r)?.map(ClientboundPacket::Status)
        }
        ConnectionState::Login => {
            login::ClientboundLoginPacket::decode_body(id, r)?.map(ClientboundPacket::Login)
        }
        ConnectionState::Play => {
            play::ClientboundPlayPacket::decode_body(id, r)?.map(ClientboundPacket::Play)
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::buffer::{BufferPool, PacketWriter};

    #[test]
    fn test_registry_has_no_duplicate_keys() {
        for (i, a) in REGISTRY.iter().enumerate() {
            for b in &REGISTRY[i + 1..] {
                assert!(
                    !(a.state == b.state && a.direction == b.direction && a.id == b.id),
                    "duplicate entry for ({:?}, {:?}, {:#04x})",
                    a.state,
                    a.direction,
                    a.id
                );
            }
        }
    }

    #[test]
    fn test_registry_matches_reference_serverbound_play_ids() {
        // The 754 serverbound play ids this engine decodes. Every other id
        // in 0x00..=0x2F is deliberately absent and handled by the
        // unknown-id skip path.
        let expected = [
            0x00, 0x03, 0x04, 0x05, 0x0B, 0x10, 0x12, 0x13, 0x14, 0x15, 0x1A, 0x1B, 0x1C, 0x25,
            0x28, 0x2C, 0x2E, 0x2F,
        ];
        for id in 0x00..=0x2F {
            let registered = lookup(Play, Serverbound, id).is_some();
            assert_eq!(
                registered,
                expected.contains(&id),
                "serverbound play id {id:#04x}"
            );
        }
    }

    #[test]
    fn test_every_registered_serverbound_id_decodes_or_short_reads() {
        // An empty body must never panic: it either decodes (empty-body
        // packets) or reports a codec error.
        for descriptor in REGISTRY.iter().filter(|d| d.direction == Serverbound) {
            let mut r = PacketReader::new(&[]);
            match decode_serverbound(descriptor.state, descriptor.id, &mut r) {
                Ok(Some(_)) | Err(_) => {}
                Ok(None) => panic!(
                    "registered id {:#04x} in {:?} did not dispatch",
                    descriptor.id, descriptor.state
                ),
            }
        }
    }

    #[test]
    fn test_ids_are_state_scoped() {
        // 0x10 is KeepAlive serverbound in Play but nothing in Status.
        assert!(lookup(Play, Serverbound, 0x10).is_some());
        assert!(lookup(Status, Serverbound, 0x10).is_none());
        // 0x00 resolves to a different packet in every state.
        assert_eq!(lookup(Handshaking, Serverbound, 0x00).unwrap().name, "Handshake");
        assert_eq!(lookup(Status, Serverbound, 0x00).unwrap().name, "StatusRequest");
        assert_eq!(lookup(Login, Serverbound, 0x00).unwrap().name, "LoginStart");
        assert_eq!(lookup(Play, Serverbound, 0x00).unwrap().name, "TeleportConfirm");
    }

    #[test]
    fn test_clientbound_encode_ids_match_registry() {
        use crate::protocol::play::ClientboundPlayPacket;
        use crate::protocol::types::Chat;

        let packets = [
            ClientboundPacket::Status(status::ClientboundStatusPacket::Pong { payload: 0 }),
            ClientboundPacket::Login(login::ClientboundLoginPacket::SetCompression {
                threshold: 256,
            }),
            ClientboundPacket::Play(ClientboundPlayPacket::KeepAlive { id: 1 }),
            ClientboundPacket::Play(ClientboundPlayPacket::Disconnect {
                reason: Chat::text("bye"),
            }),
        ];
        for packet in packets {
            let descriptor = lookup(packet.state(), Clientbound, packet.id())
                .unwrap_or_else(|| panic!("missing registry entry for {packet:?}"));
            assert_eq!(descriptor.direction, Clientbound);

            // The pure encode path works without a connection.
            let mut w = PacketWriter::new(&BufferPool::new());
            packet.encode(&mut w).unwrap();
            let mut r = PacketReader::new(w.as_slice());
            assert_eq!(r.read_varint().unwrap(), packet.id());
        }
    }

    #[test]
    fn test_unknown_id_yields_none_not_error() {
        let mut r = PacketReader::new(&[0x01, 0x02]);
        assert_eq!(decode_serverbound(Play, 0x7C, &mut r).unwrap(), None);
        // A login-only id presented in the wrong state is equally unknown.
        let mut r = PacketReader::new(&[]);
        assert_eq!(
            decode_serverbound(
                Status,
                login::serverbound_ids::LOGIN_PLUGIN_RESPONSE,
                &mut r
            )
            .unwrap(),
            None
        );
    }
}
