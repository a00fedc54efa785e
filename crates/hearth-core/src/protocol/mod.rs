//! Protocol 754 model: value shapes, packets, and the registry.
//!
//! Sub-modules:
//!
//! - **`types`** – The composite value shapes shared across packets
//!   (packed positions, chat, item stacks, entity metadata, recipes, boss
//!   bar actions, particles, command-tree nodes) plus the connection-state
//!   and direction enums.
//! - **`handshake` / `status` / `login` / `play`** – One file per
//!   connection state, each holding that state's packet structs and the
//!   per-direction tagged enums.
//! - **`registry`** – The static `(state, direction, id)` table and the
//!   serverbound decode dispatch.

pub mod handshake;
pub mod login;
pub mod play;
pub mod registry;
pub mod status;
pub mod types;

use crate::codec::buffer::{CodecError, PacketWriter};
use types::ConnectionState;

/// Any packet the engine decodes off the wire, tagged by the state it is
/// valid in.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerboundPacket {
    Handshaking(handshake::ServerboundHandshakePacket),
    Status(status::ServerboundStatusPacket),
    Login(login::ServerboundLoginPacket),
    Play(play::ServerboundPlayPacket),
}

impl ServerboundPacket {
    /// The state this packet is scoped to.
    pub fn state(&self) -> ConnectionState {
        match self {
            ServerboundPacket::Handshaking(_) => ConnectionState::Handshaking,
            ServerboundPacket::Status(_) => ConnectionState::Status,
            ServerboundPacket::Login(_) => ConnectionState::Login,
            ServerboundPacket::Play(_) => ConnectionState::Play,
        }
    }
}

/// Any packet the engine can serialise for a client, tagged by state.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientboundPacket {
    Status(status::ClientboundStatusPacket),
    Login(login::ClientboundLoginPacket),
    Play(play::ClientboundPlayPacket),
}

impl ClientboundPacket {
    /// The state this packet is scoped to.
    pub fn state(&self) -> ConnectionState {
        match self {
            ClientboundPacket::Status(_) => ConnectionState::Status,
            ClientboundPacket::Login(_) => ConnectionState::Login,
            ClientboundPacket::Play(_) => ConnectionState::Play,
        }
    }

    /// The packet id, scoped to `(state, clientbound)`.
    pub fn id(&self) -> i32 {
        match self {
            ClientboundPacket::Status(p) => p.id(),
            ClientboundPacket::Login(p) => p.id(),
            ClientboundPacket::Play(p) => p.id(),
        }
    }

    /// Serialises the full packet body: VarInt id, then fields.
    ///
    /// This is the pure encode path; it needs no connection and no frame
    /// pipeline, so tests and tools can serialise packets directly.
    pub fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.write_varint(self.id());
        match self {
            ClientboundPacket::Status(p) => p.encode_body(w),
            ClientboundPacket::Login(p) => p.encode_body(w),
            ClientboundPacket::Play(p) => p.encode_body(w),
        }
    }
}
