//! # hearth-server
//!
//! The session layer over [`hearth_core`]: it owns the sockets, drives one
//! reader task and one writer task per connection through the protocol
//! state machine, and hands decoded gameplay packets across a narrow
//! boundary to collaborators.
//!
//! - **`config`** – JSON configuration loaded from a caller-supplied path.
//! - **`auth`** – Session verification: the Mojang server-id digest, the
//!   offline-mode UUID derivation, and the [`SessionVerifier`](auth::SessionVerifier)
//!   seam the real session-server client plugs into.
//! - **`bridge`** – The other collaborator seams: world access, event
//!   dispatch, and the inbound gameplay handler.
//! - **`net`** – Acceptor, session manager, per-connection tasks, login
//!   handshake, keep-alive.

pub mod auth;
pub mod bridge;
pub mod config;
pub mod net;

pub use config::ServerConfig;
pub use net::{ConnectionId, Server};
