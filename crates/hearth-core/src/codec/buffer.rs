//! Pooled packet buffers and typed read/write accessors.
//!
//! Wire conventions (protocol 754):
//!
//! - All fixed-width scalars are **big-endian**.
//! - VarInt/VarLong encode the *unsigned bit pattern* of a two's-complement
//!   integer, 7 data bits per byte, least-significant group first, with the
//!   high bit of each byte set while more groups follow. A VarInt longer
//!   than 5 bytes (VarLong: 10) is malformed.
//! - Strings are a VarInt byte-length prefix followed by UTF-8, capped at
//!   32767 characters.
//! - UUIDs are the 16 big-endian bytes of the canonical 128-bit value.
//!
//! Buffers are checked out of a [`BufferPool`] and return to it when the
//! [`PooledBuffer`] guard drops. The guard owns the backing allocation and
//! surrenders it exactly once, so a double return is not expressible.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use uuid::Uuid;

/// Minimum capacity of a freshly acquired write buffer. `Vec` doubles from
/// here as a packet grows.
const BUFFER_FLOOR: usize = 128;

/// Maximum number of idle buffers the pool retains.
const POOL_CAP: usize = 256;

/// Maximum string length in characters, per the protocol reference.
pub const MAX_STRING_CHARS: usize = 32767;

/// Errors produced while reading or writing protocol fields.
///
/// None of these are fatal at codec level; the connection state machine
/// decides whether a failed decode terminates the session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Fewer bytes remained in the frame than the field required.
    #[error("short read: need {needed} more byte(s), {available} remaining")]
    ShortRead { needed: usize, available: usize },

    /// The bytes were present but do not form a valid value.
    #[error("malformed field: {0}")]
    Malformed(String),

    /// A value does not fit its declared wire representation.
    #[error("value out of range: {0}")]
    OutOfRange(String),
}

// ── Buffer pool ───────────────────────────────────────────────────────────────

/// A shared pool of byte buffers.
///
/// Acquiring hands out a cleared `Vec<u8>` with at least [`BUFFER_FLOOR`]
/// capacity; dropping the returned [`PooledBuffer`] puts the allocation
/// back. The pool is bounded, so a burst of large frames does not pin
/// memory forever. The lock is only held to push or pop a `Vec`, never
/// across an await point.
#[derive(Clone, Default)]
pub struct BufferPool {
    idle: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks a cleared buffer out of the pool, allocating if none is idle.
    pub fn acquire(&self) -> PooledBuffer {
        let bytes = self
            .idle
            .lock()
            .expect("buffer pool poisoned")
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(BUFFER_FLOOR));
        PooledBuffer {
            bytes: Some(bytes),
            pool: Arc::clone(&self.idle),
        }
    }

    #[cfg(test)]
    fn idle_count(&self) -> usize {
        self.idle.lock().expect("buffer pool poisoned").len()
    }
}

/// An owned byte buffer that returns to its [`BufferPool`] on drop.
pub struct PooledBuffer {
    // `Some` until the drop guard surrenders the allocation.
    bytes: Option<Vec<u8>>,
    pool: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl PooledBuffer {
    pub fn as_slice(&self) -> &[u8] {
        self.bytes.as_deref().expect("buffer already returned")
    }
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        self.bytes.as_ref().expect("buffer already returned")
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        self.bytes.as_mut().expect("buffer already returned")
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(mut bytes) = self.bytes.take() {
            bytes.clear();
            let mut idle = match self.pool.lock() {
                Ok(guard) => guard,
                // A poisoned pool just stops recycling; dropping the Vec is fine.
                Err(_) => return,
            };
            if idle.len() < POOL_CAP {
                idle.push(bytes);
            }
        }
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.as_slice().len())
            .finish()
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Typed write sink for one outgoing packet body.
pub struct PacketWriter {
    buf: PooledBuffer,
}

impl PacketWriter {
    pub fn new(pool: &BufferPool) -> Self {
        Self {
            buf: pool.acquire(),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_slice()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consumes the writer, yielding the finished body.
    pub fn into_inner(self) -> PooledBuffer {
        self.buf
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buf.push(value as u8);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Appends raw bytes with no prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_varint(&mut self, value: i32) {
        let mut rest = value as u32;
        loop {
            let byte = (rest & 0x7F) as u8;
            rest >>= 7;
            if rest == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    pub fn write_varlong(&mut self, value: i64) {
        let mut rest = value as u64;
        loop {
            let byte = (rest & 0x7F) as u8;
            rest >>= 7;
            if rest == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    /// Writes a VarInt byte-length prefix followed by the UTF-8 payload.
    ///
    /// # Errors
    ///
    /// [`CodecError::OutOfRange`] if the string exceeds the protocol's
    /// 32767-character cap.
    pub fn write_string(&mut self, value: &str) -> Result<(), CodecError> {
        let chars = value.chars().count();
        if chars > MAX_STRING_CHARS {
            return Err(CodecError::OutOfRange(format!(
                "string of {chars} characters exceeds the {MAX_STRING_CHARS} cap"
            )));
        }
        self.write_varint(value.len() as i32);
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    /// Writes a VarInt count prefix followed by the raw bytes.
    pub fn write_byte_array(&mut self, bytes: &[u8]) {
        self.write_varint(bytes.len() as i32);
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_uuid(&mut self, value: Uuid) {
        self.buf.extend_from_slice(value.as_bytes());
    }
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// Cursor over one received, fully decoded frame.
pub struct PacketReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Fails unless the cursor sits exactly at the end of the frame.
    ///
    /// Used after decoding a known packet: trailing bytes mean the declared
    /// layout and the actual bytes disagree.
    pub fn expect_empty(&self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::Malformed(format!(
                "{n} trailing byte(s) after packet body"
            ))),
        }
    }

    /// Consumes and returns the rest of the frame.
    pub fn take_remaining(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.pos..];
        self.pos = self.buf.len();
        rest
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::ShortRead {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, CodecError> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.take(1)?[0] != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_i16(&mut self) -> Result<i16, CodecError> {
        Ok(i16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn read_varint(&mut self) -> Result<i32, CodecError> {
        let mut value: u32 = 0;
        for group in 0..5 {
            let byte = self.read_u8()?;
            value |= u32::from(byte & 0x7F) << (7 * group);
            if byte & 0x80 == 0 {
                return Ok(value as i32);
            }
        }
        Err(CodecError::Malformed("VarInt exceeds 5 bytes".to_string()))
    }

    pub fn read_varlong(&mut self) -> Result<i64, CodecError> {
        let mut value: u64 = 0;
        for group in 0..10 {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7F) << (7 * group);
            if byte & 0x80 == 0 {
                return Ok(value as i64);
            }
        }
        Err(CodecError::Malformed("VarLong exceeds 10 bytes".to_string()))
    }

    /// Reads a VarInt-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// [`CodecError::Malformed`] for a negative declared length, a declared
    /// length past the frame end, invalid UTF-8, or a decoded string over
    /// the 32767-character cap.
    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let declared = self.read_varint()?;
        if declared < 0 {
            return Err(CodecError::Malformed(format!(
                "negative string length {declared}"
            )));
        }
        let declared = declared as usize;
        if declared > self.remaining() {
            return Err(CodecError::Malformed(format!(
                "string length {declared} exceeds the {} byte(s) left in the frame",
                self.remaining()
            )));
        }
        let raw = self.take(declared)?;
        let text = std::str::from_utf8(raw)
            .map_err(|e| CodecError::Malformed(format!("invalid UTF-8 in string: {e}")))?;
        if text.chars().count() > MAX_STRING_CHARS {
            return Err(CodecError::Malformed(format!(
                "string exceeds the {MAX_STRING_CHARS} character cap"
            )));
        }
        Ok(text.to_string())
    }

    /// Reads a VarInt-prefixed byte array.
    pub fn read_byte_array(&mut self) -> Result<Vec<u8>, CodecError> {
        let declared = self.read_varint()?;
        if declared < 0 {
            return Err(CodecError::Malformed(format!(
                "negative byte array length {declared}"
            )));
        }
        Ok(self.take(declared as usize)?.to_vec())
    }

    pub fn read_uuid(&mut self) -> Result<Uuid, CodecError> {
        let raw: [u8; 16] = self.take(16)?.try_into().unwrap();
        Ok(Uuid::from_bytes(raw))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn writer() -> PacketWriter {
        PacketWriter::new(&BufferPool::new())
    }

    // ── VarInt / VarLong ──────────────────────────────────────────────────────

    #[test]
    fn test_varint_known_vectors() {
        // Reference vectors from the protocol documentation.
        let vectors: &[(i32, &[u8])] = &[
            (0, &[0x00]),
            (1, &[0x01]),
            (2, &[0x02]),
            (127, &[0x7F]),
            (128, &[0x80, 0x01]),
            (255, &[0xFF, 0x01]),
            (25565, &[0xDD, 0xC7, 0x01]),
            (2097151, &[0xFF, 0xFF, 0x7F]),
            (2147483647, &[0xFF, 0xFF, 0xFF, 0xFF, 0x07]),
            (-1, &[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]),
            (-2147483648, &[0x80, 0x80, 0x80, 0x80, 0x08]),
        ];
        for (value, bytes) in vectors {
            let mut w = writer();
            w.write_varint(*value);
            assert_eq!(w.as_slice(), *bytes, "encode {value}");

            let mut r = PacketReader::new(bytes);
            assert_eq!(r.read_varint().unwrap(), *value, "decode {value}");
            assert_eq!(r.remaining(), 0);
        }
    }

    #[test]
    fn test_varint_round_trip_across_ranges() {
        let samples = [
            i32::MIN,
            i32::MIN + 1,
            -300,
            -1,
            0,
            1,
            127,
            128,
            16383,
            16384,
            2097151,
            2097152,
            i32::MAX - 1,
            i32::MAX,
        ];
        for value in samples {
            let mut w = writer();
            w.write_varint(value);
            assert!((1..=5).contains(&w.len()), "length for {value}");
            if (0..=127).contains(&value) {
                assert_eq!(w.len(), 1);
            }
            let mut r = PacketReader::new(w.as_slice());
            assert_eq!(r.read_varint().unwrap(), value);
        }
    }

    #[test]
    fn test_varint_rejects_six_bytes() {
        // Five continuation bytes followed by a terminator: one too many.
        let bytes = [0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        let mut r = PacketReader::new(&bytes);
        assert!(matches!(r.read_varint(), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_varint_truncated_is_short_read() {
        let bytes = [0x80, 0x80];
        let mut r = PacketReader::new(&bytes);
        assert!(matches!(r.read_varint(), Err(CodecError::ShortRead { .. })));
    }

    #[test]
    fn test_varlong_round_trip_across_ranges() {
        let samples = [
            i64::MIN,
            i64::from(i32::MIN),
            -1,
            0,
            1,
            127,
            128,
            i64::from(i32::MAX),
            i64::MAX - 1,
            i64::MAX,
        ];
        for value in samples {
            let mut w = writer();
            w.write_varlong(value);
            assert!((1..=10).contains(&w.len()), "length for {value}");
            let mut r = PacketReader::new(w.as_slice());
            assert_eq!(r.read_varlong().unwrap(), value);
        }
    }

    #[test]
    fn test_varlong_negative_takes_ten_bytes() {
        let mut w = writer();
        w.write_varlong(-1);
        assert_eq!(w.len(), 10);
    }

    #[test]
    fn test_varlong_rejects_eleven_bytes() {
        let bytes = [0x80; 11];
        let mut r = PacketReader::new(&bytes);
        assert!(matches!(r.read_varlong(), Err(CodecError::Malformed(_))));
    }

    // ── Fixed scalars ─────────────────────────────────────────────────────────

    #[test]
    fn test_scalars_are_big_endian() {
        let mut w = writer();
        w.write_u16(0x1234);
        w.write_i32(-2);
        w.write_i64(0x0102_0304_0506_0708);
        w.write_f32(1.5);
        w.write_f64(-2.25);

        let mut expected = Vec::new();
        expected.extend_from_slice(&0x1234u16.to_be_bytes());
        expected.extend_from_slice(&(-2i32).to_be_bytes());
        expected.extend_from_slice(&0x0102_0304_0506_0708i64.to_be_bytes());
        expected.extend_from_slice(&1.5f32.to_be_bytes());
        expected.extend_from_slice(&(-2.25f64).to_be_bytes());
        assert_eq!(w.as_slice(), &expected[..]);

        let mut r = PacketReader::new(w.as_slice());
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_i32().unwrap(), -2);
        assert_eq!(r.read_i64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(r.read_f32().unwrap(), 1.5);
        assert_eq!(r.read_f64().unwrap(), -2.25);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_bool_and_signed_bytes_round_trip() {
        let mut w = writer();
        w.write_bool(true);
        w.write_bool(false);
        w.write_i8(-100);
        w.write_u8(200);

        let mut r = PacketReader::new(w.as_slice());
        assert!(r.read_bool().unwrap());
        assert!(!r.read_bool().unwrap());
        assert_eq!(r.read_i8().unwrap(), -100);
        assert_eq!(r.read_u8().unwrap(), 200);
    }

    // ── Strings and arrays ────────────────────────────────────────────────────

    #[test]
    fn test_string_round_trip() {
        for text in ["", "localhost", "Alice", "땅끝마을", "emoji \u{1F5FA}"] {
            let mut w = writer();
            w.write_string(text).unwrap();
            let mut r = PacketReader::new(w.as_slice());
            assert_eq!(r.read_string().unwrap(), text);
            assert_eq!(r.remaining(), 0);
        }
    }

    #[test]
    fn test_string_rejects_negative_length() {
        let mut w = writer();
        w.write_varint(-1);
        let mut r = PacketReader::new(w.as_slice());
        assert!(matches!(r.read_string(), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_string_rejects_length_past_frame_end() {
        let mut w = writer();
        w.write_varint(100);
        w.write_bytes(b"short");
        let mut r = PacketReader::new(w.as_slice());
        assert!(matches!(r.read_string(), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_string_rejects_invalid_utf8() {
        let mut w = writer();
        w.write_varint(2);
        w.write_bytes(&[0xC3, 0x28]);
        let mut r = PacketReader::new(w.as_slice());
        assert!(matches!(r.read_string(), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_write_string_rejects_over_cap() {
        let long = "a".repeat(MAX_STRING_CHARS + 1);
        let mut w = writer();
        assert!(matches!(
            w.write_string(&long),
            Err(CodecError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_byte_array_round_trip() {
        let payload: Vec<u8> = (0..=255).collect();
        let mut w = writer();
        w.write_byte_array(&payload);
        let mut r = PacketReader::new(w.as_slice());
        assert_eq!(r.read_byte_array().unwrap(), payload);
    }

    // ── UUID ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_uuid_is_sixteen_big_endian_bytes() {
        // Known vector: the hyphen-stripped canonical form is the wire form.
        let id = Uuid::parse_str("f84c6a79-0a4e-45e0-879b-cd49ebd4c4e2").unwrap();
        let mut w = writer();
        w.write_uuid(id);
        assert_eq!(
            w.as_slice(),
            &[
                0xF8, 0x4C, 0x6A, 0x79, 0x0A, 0x4E, 0x45, 0xE0, 0x87, 0x9B, 0xCD, 0x49, 0xEB,
                0xD4, 0xC4, 0xE2
            ]
        );

        let mut r = PacketReader::new(w.as_slice());
        assert_eq!(r.read_uuid().unwrap(), id);
    }

    // ── Cursor behaviour ──────────────────────────────────────────────────────

    #[test]
    fn test_short_read_reports_counts() {
        let mut r = PacketReader::new(&[0x01, 0x02]);
        let err = r.read_i32().unwrap_err();
        assert_eq!(
            err,
            CodecError::ShortRead {
                needed: 4,
                available: 2
            }
        );
    }

    #[test]
    fn test_expect_empty_flags_trailing_bytes() {
        let mut r = PacketReader::new(&[0x01, 0x02]);
        r.read_u8().unwrap();
        assert!(matches!(r.expect_empty(), Err(CodecError::Malformed(_))));
        r.read_u8().unwrap();
        assert!(r.expect_empty().is_ok());
    }

    #[test]
    fn test_take_remaining_consumes_everything() {
        let mut r = PacketReader::new(&[1, 2, 3, 4]);
        r.read_u8().unwrap();
        assert_eq!(r.take_remaining(), &[2, 3, 4]);
        assert_eq!(r.remaining(), 0);
    }

    // ── Pool ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_pool_recycles_buffers() {
        let pool = BufferPool::new();
        assert_eq!(pool.idle_count(), 0);

        let mut buf = pool.acquire();
        buf.extend_from_slice(b"scratch");
        drop(buf);
        assert_eq!(pool.idle_count(), 1);

        // The recycled buffer comes back cleared.
        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_writer_returns_buffer_to_pool_via_drop() {
        let pool = BufferPool::new();
        let mut w = PacketWriter::new(&pool);
        w.write_i64(7);
        drop(w.into_inner());
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_acquired_buffer_has_floor_capacity() {
        let pool = BufferPool::new();
        let buf = pool.acquire();
        assert!(buf.capacity() >= 128);
    }
}
