//! Collaborator seams: the narrow interfaces gameplay logic plugs into.
//!
//! The protocol engine consumes these traits and implements none of the
//! game behind them. The defaults shipped here are deliberately small: a
//! flat world of overridable blocks, an event sink that answers status
//! queries from config and logs the rest, and an inbound handler that
//! wires chat and block edits through the other two.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info};

use hearth_core::protocol::play::ServerboundPlayPacket;
use hearth_core::protocol::types::{BlockPos, Chat, GameProfile};
use hearth_core::protocol::ClientboundPacket;

use crate::net::{ConnectionId, ServerContext};

// ── Status ────────────────────────────────────────────────────────────────────

/// The data behind a status response; the connection layer renders it into
/// the JSON document the client expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusInfo {
    pub motd: String,
    pub max_players: u32,
    pub online: u32,
    /// Profiles shown in the hover sample.
    pub sample: Vec<GameProfile>,
}

// ── World source ──────────────────────────────────────────────────────────────

/// An opaque chunk snapshot handed across the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSnapshot {
    pub x: i32,
    pub z: i32,
    /// Non-air block overrides within the chunk.
    pub blocks: Vec<(BlockPos, i32)>,
}

/// Read/write access to world blocks and chunks.
pub trait WorldSource: Send + Sync {
    /// The block state id at `pos`.
    fn get_block(&self, pos: BlockPos) -> i32;

    /// Replaces the block state at `pos`.
    fn set_block(&self, pos: BlockPos, block: i32);

    /// A snapshot of the chunk at chunk coordinates `(x, z)`.
    fn get_chunk(&self, x: i32, z: i32) -> Option<ChunkSnapshot>;
}

/// A flat world: bedrock plane at y = 0, air above, plus explicit
/// overrides.
#[derive(Debug, Default)]
pub struct FlatWorld {
    overrides: Mutex<HashMap<BlockPos, i32>>,
}

/// Block state id of bedrock in the 754 palette.
const BEDROCK: i32 = 33;
const AIR: i32 = 0;

impl WorldSource for FlatWorld {
    fn get_block(&self, pos: BlockPos) -> i32 {
        if let Some(block) = self.overrides.lock().expect("world lock").get(&pos) {
            return *block;
        }
        if pos.y == 0 {
            BEDROCK
        } else {
            AIR
        }
    }

    fn set_block(&self, pos: BlockPos, block: i32) {
        self.overrides.lock().expect("world lock").insert(pos, block);
    }

    fn get_chunk(&self, x: i32, z: i32) -> Option<ChunkSnapshot> {
        let overrides = self.overrides.lock().expect("world lock");
        let blocks = overrides
            .iter()
            .filter(|(pos, _)| pos.x >> 4 == x && pos.z >> 4 == z)
            .map(|(pos, block)| (*pos, *block))
            .collect();
        Some(ChunkSnapshot { x, z, blocks })
    }
}

// ── Event sink ────────────────────────────────────────────────────────────────

/// Gameplay-side event dispatch.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn on_join(&self, profile: &GameProfile);
    async fn on_leave(&self, profile: &GameProfile);
    async fn on_chat(&self, profile: &GameProfile, message: &str);

    /// Builds the data for a status response; `online` is the live count
    /// of bound players.
    fn on_status_request(&self, online: u32) -> StatusInfo;
}

/// Answers status from configuration and logs everything else.
#[derive(Debug, Clone)]
pub struct DefaultEventSink {
    pub motd: String,
    pub max_players: u32,
}

#[async_trait]
impl EventSink for DefaultEventSink {
    async fn on_join(&self, profile: &GameProfile) {
        info!(player = %profile.name, uuid = %profile.uuid, "player joined");
    }

    async fn on_leave(&self, profile: &GameProfile) {
        info!(player = %profile.name, "player left");
    }

    async fn on_chat(&self, profile: &GameProfile, message: &str) {
        info!(player = %profile.name, message, "chat");
    }

    fn on_status_request(&self, online: u32) -> StatusInfo {
        StatusInfo {
            motd: self.motd.clone(),
            max_players: self.max_players,
            online,
            sample: Vec::new(),
        }
    }
}

// ── Inbound handler ───────────────────────────────────────────────────────────

/// Receives every decoded Play-state packet that the connection layer does
/// not consume itself (keep-alives stay internal).
///
/// `deliver` runs on the connection's reader task: it must return in
/// microseconds and must not retain `packet` past the call. Anything
/// slower belongs in a spawned task.
pub trait InboundHandler: Send + Sync {
    fn deliver(&self, ctx: &Arc<ServerContext>, connection_id: ConnectionId, packet: &ServerboundPlayPacket);
}

/// Default gameplay wiring: chat fans out to everyone, block edits hit the
/// world source, the rest is logged at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHandler;

impl InboundHandler for DefaultHandler {
    fn deliver(
        &self,
        ctx: &Arc<ServerContext>,
        connection_id: ConnectionId,
        packet: &ServerboundPlayPacket,
    ) {
        match packet {
            ServerboundPlayPacket::ChatMessage { message } => {
                let Some(profile) = ctx.sessions.profile_of(connection_id) else {
                    return;
                };
                let message = message.clone();
                let ctx = Arc::clone(ctx);
                // Fan-out awaits queue capacity; keep it off the reader.
                tokio::spawn(async move {
                    ctx.events.on_chat(&profile, &message).await;
                    let packet = ClientboundPacket::Play(
                        hearth_core::protocol::play::ClientboundPlayPacket::ChatMessage {
                            content: Chat::text(format!("<{}> {}", profile.name, message)),
                            position: 0,
                            sender: profile.uuid,
                        },
                    );
                    ctx.sessions.broadcast(|_| true, packet).await;
                });
            }
            ServerboundPlayPacket::PlayerDigging {
                status, position, ..
            } => {
                // Status 0 is "started digging"; creative clients break
                // the block immediately.
                if *status == 0 {
                    ctx.world.set_block(*position, AIR);
                }
            }
            ServerboundPlayPacket::PlayerBlockPlacement { position, .. } => {
                let above = BlockPos::new(position.x, position.y + 1, position.z);
                ctx.world.set_block(above, BEDROCK);
            }
            other => {
                debug!(connection_id, packet = ?std::mem::discriminant(other), "unhandled play packet");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
