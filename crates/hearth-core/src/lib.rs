//! # hearth-core
//!
//! Wire-protocol engine for Minecraft Java Edition, pinned to protocol
//! version 754 (game version 1.16.5).
//!
//! This crate contains everything needed to speak the protocol and nothing
//! that decides what to say: no sockets are owned here beyond the generic
//! frame pipeline, no gameplay state lives here, and the server crate
//! consumes this one through plain typed values.
//!
//! - **`codec`** – Pooled read/write byte buffers with typed accessors for
//!   the protocol's primitive field shapes (varints, big-endian scalars,
//!   length-prefixed strings, UUIDs) and the NBT sub-codec.
//!
//! - **`protocol`** – The value shapes (packed positions, item stacks,
//!   entity metadata, recipes, ...), every packet the engine understands as
//!   a plain struct, the per-state tagged packet enums, and the registry
//!   mapping `(state, direction, id)` to a descriptor.
//!
//! - **`frame`** – The stream transformations between a socket and the
//!   codec: varint length framing, optional zlib compression with a size
//!   threshold, optional AES/CFB8 encryption.

pub mod codec;
pub mod frame;
pub mod protocol;

pub use codec::buffer::{BufferPool, CodecError, PacketReader, PacketWriter, PooledBuffer};
pub use frame::{FrameError, FrameReader, FrameWriter};
pub use protocol::registry;
pub use protocol::types::{ConnectionState, Direction, GAME_VERSION, PROTOCOL_VERSION};
pub use protocol::{ClientboundPacket, ServerboundPacket};
