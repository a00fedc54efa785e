//! In-memory byte codec for the protocol's field shapes.
//!
//! Two halves:
//!
//! - **`buffer`** – [`PacketWriter`](buffer::PacketWriter) appends typed
//!   values to an owned, pooled byte buffer; [`PacketReader`](buffer::PacketReader)
//!   is a cursor over one received frame. All multi-byte scalars are
//!   big-endian, converted with `to_be_bytes`/`from_be_bytes` rather than
//!   in-place swaps.
//!
//! - **`nbt`** – The Named Binary Tag sub-codec, driven directly over the
//!   same buffers so item-stack bodies and dimension codecs are written
//!   without an intermediate allocation.
//!
//! Codec failures are never fatal by themselves; the connection layer
//! decides what a [`CodecError`](buffer::CodecError) means for the session.

pub mod buffer;
pub mod nbt;

pub use buffer::{BufferPool, CodecError, PacketReader, PacketWriter, PooledBuffer};
pub use nbt::{NbtCompound, NbtTag};
