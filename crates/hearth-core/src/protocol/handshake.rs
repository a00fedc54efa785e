//! Handshaking-state packets.
//!
//! The handshake is the only packet valid in the initial state. Its
//! `next_state` field selects whether the connection proceeds to the
//! status query or to login.

use crate::codec::buffer::{CodecError, PacketReader, PacketWriter};

pub mod ids {
    pub const HANDSHAKE: i32 = 0x00;
}

/// `next_state` discriminant requesting the status state.
pub const NEXT_STATE_STATUS: i32 = 1;
/// `next_state` discriminant requesting the login state.
pub const NEXT_STATE_LOGIN: i32 = 2;

/// Handshake (0x00): protocol version, the address the client dialled, and
/// the requested next state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub protocol_version: i32,
    pub server_address: String,
    pub server_port: u16,
    pub next_state: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerboundHandshakePacket {
    Handshake(Handshake),
}

impl ServerboundHandshakePacket {
    pub fn id(&self) -> i32 {
        ids::HANDSHAKE
    }

    pub fn encode_body(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        let ServerboundHandshakePacket::Handshake(p) = self;
        w.write_varint(p.protocol_version);
        w.write_string(&p.server_address)?;
        w.write_u16(p.server_port);
        w.write_varint(p.next_state);
        Ok(())
    }

    /// Decodes the body for `id`, or `None` for an id this state does not
    /// define.
    pub fn decode_body(id: i32, r: &mut PacketReader<'_>) -> Result<Option<Self>, CodecError> {
        match id {
            ids::HANDSHAKE => Ok(Some(ServerboundHandshakePacket::Handshake(Handshake {
                protocol_version: r.read_varint()?,
                server_address: r.read_string()?,
                server_port: r.read_u16()?,
                next_state: r.read_varint()?,
            }))),
            _ => Ok(None),
        }
    }
}
