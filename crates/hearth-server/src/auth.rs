//! Session verification and the login-phase cryptography helpers.
//!
//! The server never talks to the Mojang session service itself; it
//! computes the server-id digest and hands it to a [`SessionVerifier`].
//! The crate ships [`OfflineVerifier`], which trusts the client-claimed
//! username and derives the vanilla offline UUID for it; an online-mode
//! deployment plugs in a verifier backed by the real session server.

use async_trait::async_trait;
use md5::Md5;
use num_bigint::BigInt;
use rsa::pkcs8::EncodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use thiserror::Error;
use uuid::Uuid;

use hearth_core::protocol::types::GameProfile;

/// Errors surfaced by session verification.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The session server rejected the join (invalid or expired session).
    #[error("session rejected for {username}")]
    Rejected { username: String },

    /// The session server could not be reached.
    #[error("session service unavailable: {0}")]
    Unavailable(String),
}

/// Verifies that a joining client owns the account it claims.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    /// Resolves `username` against `server_id_hash` (the digest both sides
    /// computed from the shared secret) into an authenticated profile.
    async fn verify_session(
        &self,
        username: &str,
        server_id_hash: &str,
    ) -> Result<GameProfile, AuthError>;
}

/// Offline-mode verification: trusts the claimed name and derives the
/// deterministic offline UUID for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineVerifier;

#[async_trait]
impl SessionVerifier for OfflineVerifier {
    async fn verify_session(
        &self,
        username: &str,
        _server_id_hash: &str,
    ) -> Result<GameProfile, AuthError> {
        Ok(GameProfile::new(offline_uuid(username), username))
    }
}

/// The vanilla offline UUID: a name-based (version 3) UUID over the MD5 of
/// `OfflinePlayer:<name>`, with no namespace prefix.
pub fn offline_uuid(username: &str) -> Uuid {
    let digest = Md5::new()
        .chain_update(b"OfflinePlayer:")
        .chain_update(username.as_bytes())
        .finalize();
    let mut bytes: [u8; 16] = digest.into();
    bytes[6] = (bytes[6] & 0x0F) | 0x30; // version 3
    bytes[8] = (bytes[8] & 0x3F) | 0x80; // RFC 4122 variant
    Uuid::from_bytes(bytes)
}

/// The Mojang login digest: SHA-1 over server id, shared secret, and the
/// DER public key, rendered as a **signed** hexadecimal number. Negative
/// digests carry a leading minus sign rather than a two's-complement
/// rendering, which is why this is not a plain hex dump.
pub fn server_id_hash(server_id: &str, shared_secret: &[u8], public_key_der: &[u8]) -> String {
    let digest = Sha1::new()
        .chain_update(server_id.as_bytes())
        .chain_update(shared_secret)
        .chain_update(public_key_der)
        .finalize();
    BigInt::from_signed_bytes_be(&digest).to_str_radix(16)
}

// ── Server keypair ────────────────────────────────────────────────────────────

/// Bit length of the per-process RSA keypair, per the vanilla server.
const RSA_BITS: usize = 1024;

/// Startup failures while preparing the login keypair.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("RSA key generation failed: {0}")]
    Generate(#[from] rsa::Error),
    #[error("public key DER encoding failed: {0}")]
    Der(#[from] rsa::pkcs8::spki::Error),
}

/// The RSA keypair generated at startup for the encryption handshake.
pub struct ServerKeyPair {
    private: RsaPrivateKey,
    /// SubjectPublicKeyInfo DER, the exact bytes EncryptionRequest carries.
    public_der: Vec<u8>,
}

impl ServerKeyPair {
    /// Generates a fresh keypair.
    ///
    /// # Errors
    ///
    /// Key generation or DER encoding failures, both of which are fatal at
    /// startup.
    pub fn generate() -> Result<Self, KeyError> {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, RSA_BITS)?;
        let public_der = RsaPublicKey::from(&private)
            .to_public_key_der()?
            .as_bytes()
            .to_vec();
        Ok(Self {
            private,
            public_der,
        })
    }

    pub fn public_der(&self) -> &[u8] {
        &self.public_der
    }

    /// PKCS#1 v1.5 decryption of an EncryptionResponse field.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, rsa::Error> {
        self.private.decrypt(Pkcs1v15Encrypt, ciphertext)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
