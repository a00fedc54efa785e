//! Login-state packets: authentication, encryption setup, compression
//! negotiation.

use uuid::Uuid;

use crate::codec::buffer::{CodecError, PacketReader, PacketWriter};
use crate::protocol::types::Chat;

pub mod serverbound_ids {
    pub const LOGIN_START: i32 = 0x00;
    pub const ENCRYPTION_RESPONSE: i32 = 0x01;
    pub const LOGIN_PLUGIN_RESPONSE: i32 = 0x02;
}

pub mod clientbound_ids {
    pub const DISCONNECT: i32 = 0x00;
    pub const ENCRYPTION_REQUEST: i32 = 0x01;
    pub const LOGIN_SUCCESS: i32 = 0x02;
    pub const SET_COMPRESSION: i32 = 0x03;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerboundLoginPacket {
    /// LoginStart (0x00): the client-claimed username.
    LoginStart { name: String },
    /// EncryptionResponse (0x01): both fields RSA-encrypted against the
    /// server's public key.
    EncryptionResponse {
        shared_secret: Vec<u8>,
        verify_token: Vec<u8>,
    },
    /// LoginPluginResponse (0x02): reply to a login-plugin channel probe.
    LoginPluginResponse {
        message_id: i32,
        successful: bool,
        data: Vec<u8>,
    },
}

impl ServerboundLoginPacket {
    pub fn id(&self) -> i32 {
        match self {
            ServerboundLoginPacket::LoginStart { .. } => serverbound_ids::LOGIN_START,
            ServerboundLoginPacket::EncryptionResponse { .. } => {
                serverbound_ids::ENCRYPTION_RESPONSE
            }
            ServerboundLoginPacket::LoginPluginResponse { .. } => {
                serverbound_ids::LOGIN_PLUGIN_RESPONSE
            }
        }
    }

    pub fn encode_body(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        match self {
            ServerboundLoginPacket::LoginStart { name } => w.write_string(name)?,
            ServerboundLoginPacket::EncryptionResponse {
                shared_secret,
                verify_token,
            } => {
                w.write_byte_array(shared_secret);
                w.write_byte_array(verify_token);
            }
            ServerboundLoginPacket::LoginPluginResponse {
                message_id,
                successful,
                data,
            } => {
                w.write_varint(*message_id);
                w.write_bool(*successful);
                w.write_bytes(data);
            }
        }
        Ok(())
    }

    pub fn decode_body(id: i32, r: &mut PacketReader<'_>) -> Result<Option<Self>, CodecError> {
        match id {
            serverbound_ids::LOGIN_START => Ok(Some(ServerboundLoginPacket::LoginStart {
                name: r.read_string()?,
            })),
            serverbound_ids::ENCRYPTION_RESPONSE => {
                Ok(Some(ServerboundLoginPacket::EncryptionResponse {
                    shared_secret: r.read_byte_array()?,
                    verify_token: r.read_byte_array()?,
                }))
            }
            serverbound_ids::LOGIN_PLUGIN_RESPONSE => {
                Ok(Some(ServerboundLoginPacket::LoginPluginResponse {
                    message_id: r.read_varint()?,
                    successful: r.read_bool()?,
                    data: r.take_remaining().to_vec(),
                }))
            }
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientboundLoginPacket {
    /// Disconnect (0x00): refuse the login with a chat-component reason.
    Disconnect { reason: Chat },
    /// EncryptionRequest (0x01): the server id (empty since 1.7), the
    /// DER-encoded RSA public key, and a 4-byte verify token.
    EncryptionRequest {
        server_id: String,
        public_key: Vec<u8>,
        verify_token: Vec<u8>,
    },
    /// LoginSuccess (0x02): the bound profile; moves the connection to Play.
    LoginSuccess { uuid: Uuid, username: String },
    /// SetCompression (0x03): every following frame uses compressed framing.
    SetCompression { threshold: i32 },
}

impl ClientboundLoginPacket {
    pub fn id(&self) -> i32 {
        match self {
            ClientboundLoginPacket::Disconnect { .. } => clientbound_ids::DISCONNECT,
            ClientboundLoginPacket::EncryptionRequest { .. } => clientbound_ids::ENCRYPTION_REQUEST,
            ClientboundLoginPacket::LoginSuccess { .. } => clientbound_ids::LOGIN_SUCCESS,
            ClientboundLoginPacket::SetCompression { .. } => clientbound_ids::SET_COMPRESSION,
        }
    }

    pub fn encode_body(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        match self {
            ClientboundLoginPacket::Disconnect { reason } => reason.encode(w)?,
            ClientboundLoginPacket::EncryptionRequest {
                server_id,
                public_key,
                verify_token,
            } => {
                w.write_string(server_id)?;
                w.write_byte_array(public_key);
                w.write_byte_array(verify_token);
            }
            ClientboundLoginPacket::LoginSuccess { uuid, username } => {
                w.write_uuid(*uuid);
                w.write_string(username)?;
            }
            ClientboundLoginPacket::SetCompression { threshold } => w.write_varint(*threshold),
        }
        Ok(())
    }

    pub fn decode_body(id: i32, r: &mut PacketReader<'_>) -> Result<Option<Self>, CodecError> {
        match id {
            clientbound_ids::DISCONNECT => Ok(Some(ClientboundLoginPacket::Disconnect {
                reason: Chat::decode(r)?,
            })),
            clientbound_ids::ENCRYPTION_REQUEST => {
                Ok(Some(ClientboundLoginPacket::EncryptionRequest {
                    server_id: r.read_string()?,
                    public_key: r.read_byte_array()?,
                    verify_token: r.read_byte_array()?,
                }))
            }
            clientbound_ids::LOGIN_SUCCESS => Ok(Some(ClientboundLoginPacket::LoginSuccess {
                uuid: r.read_uuid()?,
                username: r.read_string()?,
            })),
            clientbound_ids::SET_COMPRESSION => Ok(Some(ClientboundLoginPacket::SetCompression {
                threshold: r.read_varint()?,
            })),
            _ => Ok(None),
        }
    }
}
