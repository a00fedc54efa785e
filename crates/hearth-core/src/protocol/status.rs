//! Status-state packets: the server-list query and its latency probe.

use crate::codec::buffer::{CodecError, PacketReader, PacketWriter};

pub mod serverbound_ids {
    pub const REQUEST: i32 = 0x00;
    pub const PING: i32 = 0x01;
}

pub mod clientbound_ids {
    pub const RESPONSE: i32 = 0x00;
    pub const PONG: i32 = 0x01;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerboundStatusPacket {
    /// Request (0x00): no fields; asks for the status JSON.
    Request,
    /// Ping (0x01): an opaque token the client expects echoed.
    Ping { payload: i64 },
}

impl ServerboundStatusPacket {
    pub fn id(&self) -> i32 {
        match self {
            ServerboundStatusPacket::Request => serverbound_ids::REQUEST,
            ServerboundStatusPacket::Ping { .. } => serverbound_ids::PING,
        }
    }

    pub fn encode_body(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        match self {
            ServerboundStatusPacket::Request => {}
            ServerboundStatusPacket::Ping { payload } => w.write_i64(*payload),
        }
        Ok(())
    }

    pub fn decode_body(id: i32, r: &mut PacketReader<'_>) -> Result<Option<Self>, CodecError> {
        match id {
            serverbound_ids::REQUEST => Ok(Some(ServerboundStatusPacket::Request)),
            serverbound_ids::PING => Ok(Some(ServerboundStatusPacket::Ping {
                payload: r.read_i64()?,
            })),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientboundStatusPacket {
    /// Response (0x00): the status document as a JSON string.
    Response { json: String },
    /// Pong (0x01): the Ping token, unchanged.
    Pong { payload: i64 },
}

impl ClientboundStatusPacket {
    pub fn id(&self) -> i32 {
        match self {
            ClientboundStatusPacket::Response { .. } => clientbound_ids::RESPONSE,
            ClientboundStatusPacket::Pong { .. } => clientbound_ids::PONG,
        }
    }

    pub fn encode_body(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        match self {
            ClientboundStatusPacket::Response { json } => w.write_string(json)?,
            ClientboundStatusPacket::Pong { payload } => w.write_i64(*payload),
        }
        Ok(())
    }

    pub fn decode_body(id: i32, r: &mut PacketReader<'_>) -> Result<Option<Self>, CodecError> {
        match id {
            clientbound_ids::RESPONSE => Ok(Some(ClientboundStatusPacket::Response {
                json: r.read_string()?,
            })),
            clientbound_ids::PONG => Ok(Some(ClientboundStatusPacket::Pong {
                payload: r.read_i64()?,
            })),
            _ => Ok(None),
        }
    }
}
