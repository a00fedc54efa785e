//! The frame pipeline: stream transforms between a socket and the codec.
//!
//! A frame on the wire is `len:VarInt, body`. With compression enabled the
//! body becomes `data_length:VarInt, payload` where `data_length == 0`
//! marks a pass-through payload and `data_length > 0` a zlib-deflated one
//! expanding to exactly that many bytes. With encryption enabled, every
//! socket byte in both directions (the outer length prefix included) runs
//! through AES/CFB8 with the 16-byte shared secret doubling as the IV.
//!
//! The transform order is fixed: compression framing sits inside the
//! length prefix, encryption wraps everything. Each transform is enabled
//! exactly once per direction and can never be disabled.
//!
//! The reader keeps a small buffer between the socket and the byte-at-a-
//! time length parse, so individual field reads do not each cross a
//! suspension point; suspension stays at frame boundaries.

use std::io::{Read, Write};

use aes::cipher::{generic_array::GenericArray, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes128;
use bytes::{Buf, BytesMut};
use cfb8::{Decryptor, Encryptor};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::codec::buffer::{BufferPool, PooledBuffer};

/// Hard cap on a single frame, matching the reference client's limit.
pub const MAX_FRAME_LEN: usize = 2 * 1024 * 1024;

/// Errors crossing the frame pipeline.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Socket-level failure. Fatal to the connection.
    #[error("I/O failure on the framed stream: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream between frames.
    #[error("peer closed the connection")]
    ConnectionClosed,

    /// The frame structure itself was invalid. Fatal to the connection.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The declared frame length exceeds [`MAX_FRAME_LEN`].
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte cap")]
    FrameTooLarge(usize),

    /// Encryption and compression are one-shot; a second enable (and any
    /// disable) is rejected.
    #[error("{0} is already enabled on this stream")]
    TransformAlreadyEnabled(&'static str),
}

fn encrypt_in_place(cipher: &mut Encryptor<Aes128>, data: &mut [u8]) {
    // CFB8 operates one byte at a time.
    for chunk in data.chunks_mut(1) {
        cipher.encrypt_block_mut(GenericArray::from_mut_slice(chunk));
    }
}

fn decrypt_in_place(cipher: &mut Decryptor<Aes128>, data: &mut [u8]) {
    for chunk in data.chunks_mut(1) {
        cipher.decrypt_block_mut(GenericArray::from_mut_slice(chunk));
    }
}

fn write_varint_to(out: &mut Vec<u8>, value: i32) {
    let mut rest = value as u32;
    loop {
        let byte = (rest & 0x7F) as u8;
        rest >>= 7;
        if rest == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Parses a varint from the front of `bytes`, returning the value and how
/// many bytes it occupied.
fn parse_varint(bytes: &[u8]) -> Result<(i32, usize), FrameError> {
    let mut value: u32 = 0;
    for (index, byte) in bytes.iter().enumerate().take(5) {
        value |= u32::from(byte & 0x7F) << (7 * index);
        if byte & 0x80 == 0 {
            return Ok((value as i32, index + 1));
        }
    }
    Err(FrameError::Malformed(
        "inner length VarInt is truncated or over-long".to_string(),
    ))
}

// ── Read side ─────────────────────────────────────────────────────────────────

/// Decodes inbound frames from an async byte stream.
pub struct FrameReader<R> {
    io: R,
    /// Bytes received and (when encryption is on) already decrypted, not
    /// yet consumed by the frame parser.
    buf: BytesMut,
    decryptor: Option<Decryptor<Aes128>>,
    compressed: bool,
    pool: BufferPool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(io: R, pool: BufferPool) -> Self {
        Self {
            io,
            buf: BytesMut::with_capacity(4096),
            decryptor: None,
            compressed: false,
            pool,
        }
    }

    /// Switches the inbound stream to AES/CFB8. One-shot.
    ///
    /// Bytes already buffered but not yet parsed arrived after the peer
    /// turned its cipher on, so they are decrypted here as part of the
    /// switch.
    pub fn enable_encryption(&mut self, key: &[u8; 16]) -> Result<(), FrameError> {
        if self.decryptor.is_some() {
            return Err(FrameError::TransformAlreadyEnabled("encryption"));
        }
        let mut decryptor = Decryptor::<Aes128>::new_from_slices(key, key)
            .map_err(|_| FrameError::Malformed("invalid AES key length".to_string()))?;
        decrypt_in_place(&mut decryptor, &mut self.buf);
        self.decryptor = Some(decryptor);
        debug!(buffered = self.buf.len(), "inbound encryption enabled");
        Ok(())
    }

    /// Switches inbound framing to the compressed layout. One-shot.
    pub fn enable_compression(&mut self) -> Result<(), FrameError> {
        if self.compressed {
            return Err(FrameError::TransformAlreadyEnabled("compression"));
        }
        self.compressed = true;
        Ok(())
    }

    async fn fill(&mut self) -> Result<(), FrameError> {
        let start = self.buf.len();
        let n = self.io.read_buf(&mut self.buf).await?;
        if n == 0 {
            return Err(FrameError::ConnectionClosed);
        }
        if let Some(cipher) = &mut self.decryptor {
            decrypt_in_place(cipher, &mut self.buf[start..]);
        }
        Ok(())
    }

    async fn read_u8(&mut self) -> Result<u8, FrameError> {
        while self.buf.is_empty() {
            self.fill().await?;
        }
        Ok(self.buf.get_u8())
    }

    async fn read_exact_into(&mut self, n: usize, out: &mut Vec<u8>) -> Result<(), FrameError> {
        while self.buf.len() < n {
            self.fill().await?;
        }
        out.extend_from_slice(&self.buf[..n]);
        self.buf.advance(n);
        Ok(())
    }

    /// Reads the outer length prefix one byte at a time.
    async fn read_frame_len(&mut self) -> Result<usize, FrameError> {
        let mut value: u32 = 0;
        for group in 0..5 {
            let byte = self.read_u8().await?;
            value |= u32::from(byte & 0x7F) << (7 * group);
            if byte & 0x80 == 0 {
                let len = value as i32;
                if len <= 0 {
                    return Err(FrameError::Malformed(format!(
                        "non-positive frame length {len}"
                    )));
                }
                let len = len as usize;
                if len > MAX_FRAME_LEN {
                    return Err(FrameError::FrameTooLarge(len));
                }
                return Ok(len);
            }
        }
        Err(FrameError::Malformed(
            "frame length VarInt exceeds 5 bytes".to_string(),
        ))
    }

    /// Reads one frame and yields its plaintext body (packet id + fields).
    pub async fn next_frame(&mut self) -> Result<PooledBuffer, FrameError> {
        let len = self.read_frame_len().await?;
        let mut raw = self.pool.acquire();
        self.read_exact_into(len, &mut raw).await?;

        if !self.compressed {
            return Ok(raw);
        }

        let (data_length, header_len) = parse_varint(raw.as_slice())?;
        if data_length < 0 {
            return Err(FrameError::Malformed(format!(
                "negative uncompressed length {data_length}"
            )));
        }
        if data_length == 0 {
            raw.drain(..header_len);
            return Ok(raw);
        }
        let data_length = data_length as usize;
        if data_length > MAX_FRAME_LEN {
            return Err(FrameError::FrameTooLarge(data_length));
        }

        let mut inflated = self.pool.acquire();
        let mut decoder = ZlibDecoder::new(&raw.as_slice()[header_len..]);
        decoder
            .read_to_end(&mut inflated)
            .map_err(|e| FrameError::Malformed(format!("zlib inflate failed: {e}")))?;
        if inflated.len() != data_length {
            return Err(FrameError::Malformed(format!(
                "frame declared {data_length} uncompressed bytes but inflated to {}",
                inflated.len()
            )));
        }
        Ok(inflated)
    }
}

// ── Write side ────────────────────────────────────────────────────────────────

/// Encodes outbound frames onto an async byte stream.
pub struct FrameWriter<W> {
    io: W,
    encryptor: Option<Encryptor<Aes128>>,
    /// Payload-size threshold at or above which bodies are deflated.
    compression: Option<usize>,
    pool: BufferPool,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(io: W, pool: BufferPool) -> Self {
        Self {
            io,
            encryptor: None,
            compression: None,
            pool,
        }
    }

    /// Switches the outbound stream to AES/CFB8. One-shot; takes effect
    /// with the next frame written.
    pub fn enable_encryption(&mut self, key: &[u8; 16]) -> Result<(), FrameError> {
        if self.encryptor.is_some() {
            return Err(FrameError::TransformAlreadyEnabled("encryption"));
        }
        self.encryptor = Some(
            Encryptor::<Aes128>::new_from_slices(key, key)
                .map_err(|_| FrameError::Malformed("invalid AES key length".to_string()))?,
        );
        Ok(())
    }

    /// Switches outbound framing to the compressed layout. One-shot; the
    /// next frame written is the first to carry the inner length.
    pub fn enable_compression(&mut self, threshold: usize) -> Result<(), FrameError> {
        if self.compression.is_some() {
            return Err(FrameError::TransformAlreadyEnabled("compression"));
        }
        self.compression = Some(threshold);
        debug!(threshold, "outbound compression enabled");
        Ok(())
    }

    /// Frames, transforms, and sends one packet body.
    pub async fn write_frame(&mut self, body: &[u8]) -> Result<(), FrameError> {
        if body.len() > MAX_FRAME_LEN {
            return Err(FrameError::FrameTooLarge(body.len()));
        }

        let mut wire = self.pool.acquire();
        match self.compression {
            None => {
                write_varint_to(&mut wire, body.len() as i32);
                wire.extend_from_slice(body);
            }
            Some(threshold) => {
                let mut inner = self.pool.acquire();
                if body.len() >= threshold {
                    write_varint_to(&mut inner, body.len() as i32);
                    let mut encoder = ZlibEncoder::new(&mut *inner, Compression::default());
                    encoder.write_all(body)?;
                    encoder.finish()?;
                } else {
                    write_varint_to(&mut inner, 0);
                    inner.extend_from_slice(body);
                }
                write_varint_to(&mut wire, inner.len() as i32);
                wire.extend_from_slice(&inner);
            }
        }

        if let Some(cipher) = &mut self.encryptor {
            encrypt_in_place(cipher, &mut wire);
        }
        self.io.write_all(&wire).await?;
        self.io.flush().await?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
