//! Play-state packets.
//!
//! This is the subset of the 754 play id space the engine speaks: session
//! upkeep (keep-alive, disconnect), chat, the join sequence, movement and
//! entity streaming, inventory slots, and the declarative dumps (recipes,
//! commands). Ids not listed here fall through the registry's unknown-id
//! path: logged and skipped, never fatal.

use uuid::Uuid;

use crate::codec::buffer::{CodecError, PacketReader, PacketWriter};
use crate::codec::nbt::{self, NbtCompound};
use crate::protocol::types::{
    AbsolutePosition, Angle, BlockPos, BossBarAction, Chat, CommandNode, EntityMetadata,
    GameProfile, ItemStack, ParticleData, ProfileProperty, Recipe, Velocity,
};

pub mod serverbound_ids {
    pub const TELEPORT_CONFIRM: i32 = 0x00;
    pub const CHAT_MESSAGE: i32 = 0x03;
    pub const CLIENT_STATUS: i32 = 0x04;
    pub const CLIENT_SETTINGS: i32 = 0x05;
    pub const PLUGIN_MESSAGE: i32 = 0x0B;
    pub const KEEP_ALIVE: i32 = 0x10;
    pub const PLAYER_POSITION: i32 = 0x12;
    pub const PLAYER_POSITION_AND_ROTATION: i32 = 0x13;
    pub const PLAYER_ROTATION: i32 = 0x14;
    pub const PLAYER_MOVEMENT: i32 = 0x15;
    pub const PLAYER_ABILITIES: i32 = 0x1A;
    pub const PLAYER_DIGGING: i32 = 0x1B;
    pub const ENTITY_ACTION: i32 = 0x1C;
    pub const HELD_ITEM_CHANGE: i32 = 0x25;
    pub const CREATIVE_INVENTORY_ACTION: i32 = 0x28;
    pub const ANIMATION: i32 = 0x2C;
    pub const PLAYER_BLOCK_PLACEMENT: i32 = 0x2E;
    pub const USE_ITEM: i32 = 0x2F;
}

pub mod clientbound_ids {
    pub const SPAWN_PLAYER: i32 = 0x04;
    pub const BLOCK_CHANGE: i32 = 0x0B;
    pub const BOSS_BAR: i32 = 0x0C;
    pub const SERVER_DIFFICULTY: i32 = 0x0D;
    pub const CHAT_MESSAGE: i32 = 0x0E;
    pub const DECLARE_COMMANDS: i32 = 0x10;
    pub const SET_SLOT: i32 = 0x15;
    pub const PLUGIN_MESSAGE: i32 = 0x17;
    pub const DISCONNECT: i32 = 0x19;
    pub const KEEP_ALIVE: i32 = 0x1F;
    pub const PARTICLE: i32 = 0x22;
    pub const JOIN_GAME: i32 = 0x24;
    pub const ENTITY_POSITION: i32 = 0x27;
    pub const PLAYER_ABILITIES: i32 = 0x30;
    pub const PLAYER_INFO: i32 = 0x32;
    pub const PLAYER_POSITION_AND_LOOK: i32 = 0x34;
    pub const DESTROY_ENTITIES: i32 = 0x36;
    pub const HELD_ITEM_CHANGE: i32 = 0x3F;
    pub const SPAWN_POSITION: i32 = 0x42;
    pub const ENTITY_METADATA: i32 = 0x44;
    pub const ENTITY_VELOCITY: i32 = 0x46;
    pub const TIME_UPDATE: i32 = 0x4E;
    pub const ENTITY_TELEPORT: i32 = 0x56;
    pub const DECLARE_RECIPES: i32 = 0x5A;
}

// ── Serverbound ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ServerboundPlayPacket {
    TeleportConfirm {
        teleport_id: i32,
    },
    ChatMessage {
        message: String,
    },
    ClientStatus {
        action: i32,
    },
    ClientSettings {
        locale: String,
        view_distance: i8,
        chat_mode: i32,
        chat_colors: bool,
        displayed_skin_parts: u8,
        main_hand: i32,
    },
    PluginMessage {
        channel: String,
        data: Vec<u8>,
    },
    KeepAlive {
        id: i64,
    },
    PlayerPosition {
        position: AbsolutePosition,
        on_ground: bool,
    },
    PlayerPositionAndRotation {
        position: AbsolutePosition,
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    },
    PlayerRotation {
        yaw: f32,
        pitch: f32,
        on_ground: bool,
    },
    PlayerMovement {
        on_ground: bool,
    },
    PlayerAbilities {
        flags: u8,
    },
    PlayerDigging {
        status: i32,
        position: BlockPos,
        face: i8,
    },
    EntityAction {
        entity_id: i32,
        action: i32,
        jump_boost: i32,
    },
    HeldItemChange {
        slot: i16,
    },
    CreativeInventoryAction {
        slot: i16,
        clicked_item: Option<ItemStack>,
    },
    Animation {
        hand: i32,
    },
    PlayerBlockPlacement {
        hand: i32,
        position: BlockPos,
        face: i32,
        cursor_x: f32,
        cursor_y: f32,
        cursor_z: f32,
        inside_block: bool,
    },
    UseItem {
        hand: i32,
    },
}

impl ServerboundPlayPacket {
    pub fn id(&self) -> i32 {
        use serverbound_ids::*;
        match self {
            ServerboundPlayPacket::TeleportConfirm { .. } => TELEPORT_CONFIRM,
            ServerboundPlayPacket::ChatMessage { .. } => CHAT_MESSAGE,
            ServerboundPlayPacket::ClientStatus { .. } => CLIENT_STATUS,
            ServerboundPlayPacket::ClientSettings { .. } => CLIENT_SETTINGS,
            ServerboundPlayPacket::PluginMessage { .. } => PLUGIN_MESSAGE,
            ServerboundPlayPacket::KeepAlive { .. } => KEEP_ALIVE,
            ServerboundPlayPacket::PlayerPosition { .. } => PLAYER_POSITION,
            ServerboundPlayPacket::PlayerPositionAndRotation { .. } => {
                PLAYER_POSITION_AND_ROTATION
            }
            ServerboundPlayPacket::PlayerRotation { .. } => PLAYER_ROTATION,
            ServerboundPlayPacket::PlayerMovement { .. } => PLAYER_MOVEMENT,
            ServerboundPlayPacket::PlayerAbilities { .. } => PLAYER_ABILITIES,
            ServerboundPlayPacket::PlayerDigging { .. } => PLAYER_DIGGING,
            ServerboundPlayPacket::EntityAction { .. } => ENTITY_ACTION,
            ServerboundPlayPacket::HeldItemChange { .. } => HELD_ITEM_CHANGE,
            ServerboundPlayPacket::CreativeInventoryAction { .. } => CREATIVE_INVENTORY_ACTION,
            ServerboundPlayPacket::Animation { .. } => ANIMATION,
            ServerboundPlayPacket::PlayerBlockPlacement { .. } => PLAYER_BLOCK_PLACEMENT,
            ServerboundPlayPacket::UseItem { .. } => USE_ITEM,
        }
    }

    pub fn encode_body(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        match self {
            ServerboundPlayPacket::TeleportConfirm { teleport_id } => w.write_varint(*teleport_id),
            ServerboundPlayPacket::ChatMessage { message } => w.write_string(message)?,
            ServerboundPlayPacket::ClientStatus { action } => w.write_varint(*action),
            ServerboundPlayPacket::ClientSettings {
                locale,
                view_distance,
                chat_mode,
                chat_colors,
                displayed_skin_parts,
                main_hand,
            } => {
                w.write_string(locale)?;
                w.write_i8(*view_distance);
                w.write_varint(*chat_mode);
                w.write_bool(*chat_colors);
                w.write_u8(*displayed_skin_parts);
                w.write_varint(*main_hand);
            }
            ServerboundPlayPacket::PluginMessage { channel, data } => {
                w.write_string(channel)?;
                w.write_bytes(data);
            }
            ServerboundPlayPacket::KeepAlive { id } => w.write_i64(*id),
            ServerboundPlayPacket::PlayerPosition {
                position,
                on_ground,
            } => {
                position.encode(w);
                w.write_bool(*on_ground);
            }
            ServerboundPlayPacket::PlayerPositionAndRotation {
                position,
                yaw,
                pitch,
                on_ground,
            } => {
                position.encode(w);
                w.write_f32(*yaw);
                w.write_f32(*pitch);
                w.write_bool(*on_ground);
            }
            ServerboundPlayPacket::PlayerRotation {
                yaw,
                pitch,
                on_ground,
            } => {
                w.write_f32(*yaw);
                w.write_f32(*pitch);
                w.write_bool(*on_ground);
            }
            ServerboundPlayPacket::PlayerMovement { on_ground } => w.write_bool(*on_ground),
            ServerboundPlayPacket::PlayerAbilities { flags } => w.write_u8(*flags),
            ServerboundPlayPacket::PlayerDigging {
                status,
                position,
                face,
            } => {
                w.write_varint(*status);
                position.encode(w);
                w.write_i8(*face);
            }
            ServerboundPlayPacket::EntityAction {
                entity_id,
                action,
                jump_boost,
            } => {
                w.write_varint(*entity_id);
                w.write_varint(*action);
                w.write_varint(*jump_boost);
            }
            ServerboundPlayPacket::HeldItemChange { slot } => w.write_i16(*slot),
            ServerboundPlayPacket::CreativeInventoryAction { slot, clicked_item } => {
                w.write_i16(*slot);
                ItemStack::encode(clicked_item.as_ref(), w)?;
            }
            ServerboundPlayPacket::Animation { hand } => w.write_varint(*hand),
            ServerboundPlayPacket::PlayerBlockPlacement {
                hand,
                position,
                face,
                cursor_x,
                cursor_y,
                cursor_z,
                inside_block,
            } => {
                w.write_varint(*hand);
                position.encode(w);
                w.write_varint(*face);
                w.write_f32(*cursor_x);
                w.write_f32(*cursor_y);
                w.write_f32(*cursor_z);
                w.write_bool(*inside_block);
            }
            ServerboundPlayPacket::UseItem { hand } => w.write_varint(*hand),
        }
        Ok(())
    }

    pub fn decode_body(id: i32, r: &mut PacketReader<'_>) -> Result<Option<Self>, CodecError> {
        use serverbound_ids::*;
        let packet = match id {
            TELEPORT_CONFIRM => ServerboundPlayPacket::TeleportConfirm {
                teleport_id: r.read_varint()?,
            },
            CHAT_MESSAGE => ServerboundPlayPacket::ChatMessage {
                message: r.read_string()?,
            },
            CLIENT_STATUS => ServerboundPlayPacket::ClientStatus {
                action: r.read_varint()?,
            },
            CLIENT_SETTINGS => ServerboundPlayPacket::ClientSettings {
                locale: r.read_string()?,
                view_distance: r.read_i8()?,
                chat_mode: r.read_varint()?,
                chat_colors: r.read_bool()?,
                displayed_skin_parts: r.read_u8()?,
                main_hand: r.read_varint()?,
            },
            PLUGIN_MESSAGE => ServerboundPlayPacket::PluginMessage {
                channel: r.read_string()?,
                data: r.take_remaining().to_vec(),
            },
            KEEP_ALIVE => ServerboundPlayPacket::KeepAlive { id: r.read_i64()? },
            PLAYER_POSITION => ServerboundPlayPacket::PlayerPosition {
                position: AbsolutePosition::decode(r)?,
                on_ground: r.read_bool()?,
            },
            PLAYER_POSITION_AND_ROTATION => ServerboundPlayPacket::PlayerPositionAndRotation {
                position: AbsolutePosition::decode(r)?,
                yaw: r.read_f32()?,
                pitch: r.read_f32()?,
                on_ground: r.read_bool()?,
            },
            PLAYER_ROTATION => ServerboundPlayPacket::PlayerRotation {
                yaw: r.read_f32()?,
                pitch: r.read_f32()?,
                on_ground: r.read_bool()?,
            },
            PLAYER_MOVEMENT => ServerboundPlayPacket::PlayerMovement {
                on_ground: r.read_bool()?,
            },
            PLAYER_ABILITIES => ServerboundPlayPacket::PlayerAbilities {
                flags: r.read_u8()?,
            },
            PLAYER_DIGGING => ServerboundPlayPacket::PlayerDigging {
                status: r.read_varint()?,
                position: BlockPos::decode(r)?,
                face: r.read_i8()?,
            },
            ENTITY_ACTION => ServerboundPlayPacket::EntityAction {
                entity_id: r.read_varint()?,
                action: r.read_varint()?,
                jump_boost: r.read_varint()?,
            },
            HELD_ITEM_CHANGE => ServerboundPlayPacket::HeldItemChange {
                slot: r.read_i16()?,
            },
            CREATIVE_INVENTORY_ACTION => ServerboundPlayPacket::CreativeInventoryAction {
                slot: r.read_i16()?,
                clicked_item: ItemStack::decode(r)?,
            },
            ANIMATION => ServerboundPlayPacket::Animation {
                hand: r.read_varint()?,
            },
            PLAYER_BLOCK_PLACEMENT => ServerboundPlayPacket::PlayerBlockPlacement {
                hand: r.read_varint()?,
                position: BlockPos::decode(r)?,
                face: r.read_varint()?,
                cursor_x: r.read_f32()?,
                cursor_y: r.read_f32()?,
                cursor_z: r.read_f32()?,
                inside_block: r.read_bool()?,
            },
            USE_ITEM => ServerboundPlayPacket::UseItem {
                hand: r.read_varint()?,
            },
            _ => return Ok(None),
        };
        Ok(Some(packet))
    }
}

// ── Clientbound ───────────────────────────────────────────────────────────────

/// One batch of PlayerInfo (0x32) updates; all entries share the action.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerInfoAction {
    AddPlayers(Vec<PlayerInfoEntry>),
    UpdateGamemode(Vec<(Uuid, i32)>),
    UpdateLatency(Vec<(Uuid, i32)>),
    UpdateDisplayName(Vec<(Uuid, Option<Chat>)>),
    RemovePlayers(Vec<Uuid>),
}

/// One added tab-list entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerInfoEntry {
    pub profile: GameProfile,
    pub gamemode: i32,
    pub ping: i32,
    pub display_name: Option<Chat>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientboundPlayPacket {
    SpawnPlayer {
        entity_id: i32,
        uuid: Uuid,
        position: AbsolutePosition,
        yaw: Angle,
        pitch: Angle,
    },
    BlockChange {
        position: BlockPos,
        block_state: i32,
    },
    BossBar {
        uuid: Uuid,
        action: BossBarAction,
    },
    ServerDifficulty {
        difficulty: u8,
        locked: bool,
    },
    ChatMessage {
        content: Chat,
        position: i8,
        sender: Uuid,
    },
    DeclareCommands {
        nodes: Vec<CommandNode>,
        root_index: i32,
    },
    SetSlot {
        window_id: i8,
        slot: i16,
        data: Option<ItemStack>,
    },
    PluginMessage {
        channel: String,
        data: Vec<u8>,
    },
    Disconnect {
        reason: Chat,
    },
    KeepAlive {
        id: i64,
    },
    Particle {
        particle_id: i32,
        long_distance: bool,
        position: AbsolutePosition,
        offset_x: f32,
        offset_y: f32,
        offset_z: f32,
        max_speed: f32,
        count: i32,
        data: ParticleData,
    },
    JoinGame {
        entity_id: i32,
        is_hardcore: bool,
        gamemode: u8,
        previous_gamemode: i8,
        world_names: Vec<String>,
        dimension_codec: NbtCompound,
        dimension: NbtCompound,
        world_name: String,
        hashed_seed: i64,
        max_players: i32,
        view_distance: i32,
        reduced_debug_info: bool,
        enable_respawn_screen: bool,
        is_debug: bool,
        is_flat: bool,
    },
    EntityPosition {
        entity_id: i32,
        delta_x: i16,
        delta_y: i16,
        delta_z: i16,
        on_ground: bool,
    },
    PlayerAbilities {
        flags: u8,
        flying_speed: f32,
        fov_modifier: f32,
    },
    PlayerInfo {
        action: PlayerInfoAction,
    },
    PlayerPositionAndLook {
        position: AbsolutePosition,
        yaw: f32,
        pitch: f32,
        flags: u8,
        teleport_id: i32,
    },
    DestroyEntities {
        entity_ids: Vec<i32>,
    },
    HeldItemChange {
        slot: i8,
    },
    SpawnPosition {
        position: BlockPos,
    },
    EntityMetadata {
        entity_id: i32,
        metadata: EntityMetadata,
    },
    EntityVelocity {
        entity_id: i32,
        velocity: Velocity,
    },
    TimeUpdate {
        world_age: i64,
        time_of_day: i64,
    },
    EntityTeleport {
        entity_id: i32,
        position: AbsolutePosition,
        yaw: Angle,
        pitch: Angle,
        on_ground: bool,
    },
    DeclareRecipes {
        recipes: Vec<Recipe>,
    },
}

impl ClientboundPlayPacket {
    pub fn id(&self) -> i32 {
        use clientbound_ids::*;
        match self {
            ClientboundPlayPacket::SpawnPlayer { .. } => SPAWN_PLAYER,
            ClientboundPlayPacket::BlockChange { .. } => BLOCK_CHANGE,
            ClientboundPlayPacket::BossBar { .. } => BOSS_BAR,
            ClientboundPlayPacket::ServerDifficulty { .. } => SERVER_DIFFICULTY,
            ClientboundPlayPacket::ChatMessage { .. } => CHAT_MESSAGE,
            ClientboundPlayPacket::DeclareCommands { .. } => DECLARE_COMMANDS,
            ClientboundPlayPacket::SetSlot { .. } => SET_SLOT,
            ClientboundPlayPacket::PluginMessage { .. } => PLUGIN_MESSAGE,
            ClientboundPlayPacket::Disconnect { .. } => DISCONNECT,
            ClientboundPlayPacket::KeepAlive { .. } => KEEP_ALIVE,
            ClientboundPlayPacket::Particle { .. } => PARTICLE,
            ClientboundPlayPacket::JoinGame { .. } => JOIN_GAME,
            ClientboundPlayPacket::EntityPosition { .. } => ENTITY_POSITION,
            ClientboundPlayPacket::PlayerAbilities { .. } => PLAYER_ABILITIES,
            ClientboundPlayPacket::PlayerInfo { .. } => PLAYER_INFO,
            ClientboundPlayPacket::PlayerPositionAndLook { .. } => PLAYER_POSITION_AND_LOOK,
            ClientboundPlayPacket::DestroyEntities { .. } => DESTROY_ENTITIES,
            ClientboundPlayPacket::HeldItemChange { .. } => HELD_ITEM_CHANGE,
            ClientboundPlayPacket::SpawnPosition { .. } => SPAWN_POSITION,
            ClientboundPlayPacket::EntityMetadata { .. } => ENTITY_METADATA,
            ClientboundPlayPacket::EntityVelocity { .. } => ENTITY_VELOCITY,
            ClientboundPlayPacket::TimeUpdate { .. } => TIME_UPDATE,
            ClientboundPlayPacket::EntityTeleport { .. } => ENTITY_TELEPORT,
            ClientboundPlayPacket::DeclareRecipes { .. } => DECLARE_RECIPES,
        }
    }

    pub fn encode_body(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        match self {
            ClientboundPlayPacket::SpawnPlayer {
                entity_id,
                uuid,
                position,
                yaw,
                pitch,
            } => {
                w.write_varint(*entity_id);
                w.write_uuid(*uuid);
                position.encode(w);
                yaw.encode(w);
                pitch.encode(w);
            }
            ClientboundPlayPacket::BlockChange {
                position,
                block_state,
            } => {
                position.encode(w);
                w.write_varint(*block_state);
            }
            ClientboundPlayPacket::BossBar { uuid, action } => {
                w.write_uuid(*uuid);
                action.encode(w)?;
            }
            ClientboundPlayPacket::ServerDifficulty { difficulty, locked } => {
                w.write_u8(*difficulty);
                w.write_bool(*locked);
            }
            ClientboundPlayPacket::ChatMessage {
                content,
                position,
                sender,
            } => {
                content.encode(w)?;
                w.write_i8(*position);
                w.write_uuid(*sender);
            }
            ClientboundPlayPacket::DeclareCommands { nodes, root_index } => {
                w.write_varint(nodes.len() as i32);
                for node in nodes {
                    node.encode(w)?;
                }
                w.write_varint(*root_index);
            }
            ClientboundPlayPacket::SetSlot {
                window_id,
                slot,
                data,
            } => {
                w.write_i8(*window_id);
                w.write_i16(*slot);
                ItemStack::encode(data.as_ref(), w)?;
            }
            ClientboundPlayPacket::PluginMessage { channel, data } => {
                w.write_string(channel)?;
                w.write_bytes(data);
            }
            ClientboundPlayPacket::Disconnect { reason } => reason.encode(w)?,
            ClientboundPlayPacket::KeepAlive { id } => w.write_i64(*id),
            ClientboundPlayPacket::Particle {
                particle_id,
                long_distance,
                position,
                offset_x,
                offset_y,
                offset_z,
                max_speed,
                count,
                data,
            } => {
                w.write_i32(*particle_id);
                w.write_bool(*long_distance);
                position.encode(w);
                w.write_f32(*offset_x);
                w.write_f32(*offset_y);
                w.write_f32(*offset_z);
                w.write_f32(*max_speed);
                w.write_i32(*count);
                data.encode(w)?;
            }
            ClientboundPlayPacket::JoinGame {
                entity_id,
                is_hardcore,
                gamemode,
                previous_gamemode,
                world_names,
                dimension_codec,
                dimension,
                world_name,
                hashed_seed,
                max_players,
                view_distance,
                reduced_debug_info,
                enable_respawn_screen,
                is_debug,
                is_flat,
            } => {
                w.write_i32(*entity_id);
                w.write_bool(*is_hardcore);
                w.write_u8(*gamemode);
                w.write_i8(*previous_gamemode);
                w.write_varint(world_names.len() as i32);
                for name in world_names {
                    w.write_string(name)?;
                }
                nbt::write_root(w, "", dimension_codec)?;
                nbt::write_root(w, "", dimension)?;
                w.write_string(world_name)?;
                w.write_i64(*hashed_seed);
                w.write_varint(*max_players);
                w.write_varint(*view_distance);
                w.write_bool(*reduced_debug_info);
                w.write_bool(*enable_respawn_screen);
                w.write_bool(*is_debug);
                w.write_bool(*is_flat);
            }
            ClientboundPlayPacket::EntityPosition {
                entity_id,
                delta_x,
                delta_y,
                delta_z,
                on_ground,
            } => {
                w.write_varint(*entity_id);
                w.write_i16(*delta_x);
                w.write_i16(*delta_y);
                w.write_i16(*delta_z);
                w.write_bool(*on_ground);
            }
            ClientboundPlayPacket::PlayerAbilities {
                flags,
                flying_speed,
                fov_modifier,
            } => {
                w.write_u8(*flags);
                w.write_f32(*flying_speed);
                w.write_f32(*fov_modifier);
            }
            ClientboundPlayPacket::PlayerInfo { action } => encode_player_info(action, w)?,
            ClientboundPlayPacket::PlayerPositionAndLook {
                position,
                yaw,
                pitch,
                flags,
                teleport_id,
            } => {
                position.encode(w);
                w.write_f32(*yaw);
                w.write_f32(*pitch);
                w.write_u8(*flags);
                w.write_varint(*teleport_id);
            }
            ClientboundPlayPacket::DestroyEntities { entity_ids } => {
                w.write_varint(entity_ids.len() as i32);
                for id in entity_ids {
                    w.write_varint(*id);
                }
            }
            ClientboundPlayPacket::HeldItemChange { slot } => w.write_i8(*slot),
            ClientboundPlayPacket::SpawnPosition { position } => position.encode(w),
            ClientboundPlayPacket::EntityMetadata {
                entity_id,
                metadata,
            } => {
                w.write_varint(*entity_id);
                metadata.encode(w)?;
            }
            ClientboundPlayPacket::EntityVelocity {
                entity_id,
                velocity,
            } => {
                w.write_varint(*entity_id);
                velocity.encode(w);
            }
            ClientboundPlayPacket::TimeUpdate {
                world_age,
                time_of_day,
            } => {
                w.write_i64(*world_age);
                w.write_i64(*time_of_day);
            }
            ClientboundPlayPacket::EntityTeleport {
                entity_id,
                position,
                yaw,
                pitch,
                on_ground,
            } => {
                w.write_varint(*entity_id);
                position.encode(w);
                yaw.encode(w);
                pitch.encode(w);
                w.write_bool(*on_ground);
            }
            ClientboundPlayPacket::DeclareRecipes { recipes } => {
                w.write_varint(recipes.len() as i32);
                for recipe in recipes {
                    recipe.encode(w)?;
                }
            }
        }
        Ok(())
    }

    pub fn decode_body(id: i32, r: &mut PacketReader<'_>) -> Result<Option<Self>, CodecError> {
        use clientbound_ids::*;
        let packet = match id {
            SPAWN_PLAYER => ClientboundPlayPacket::SpawnPlayer {
                entity_id: r.read_varint()?,
                uuid: r.read_uuid()?,
                position: AbsolutePosition::decode(r)?,
                yaw: Angle::decode(r)?,
                pitch: Angle::decode(r)?,
            },
            BLOCK_CHANGE => ClientboundPlayPacket::BlockChange {
                position: BlockPos::decode(r)?,
                block_state: r.read_varint()?,
            },
            BOSS_BAR => ClientboundPlayPacket::BossBar {
                uuid: r.read_uuid()?,
                action: BossBarAction::decode(r)?,
            },
            SERVER_DIFFICULTY => ClientboundPlayPacket::ServerDifficulty {
                difficulty: r.read_u8()?,
                locked: r.read_bool()?,
            },
            CHAT_MESSAGE => ClientboundPlayPacket::ChatMessage {
                content: Chat::decode(r)?,
                position: r.read_i8()?,
                sender: r.read_uuid()?,
            },
            DECLARE_COMMANDS => {
                let count = r.read_varint()?;
                if count < 0 {
                    return Err(CodecError::Malformed(format!(
                        "negative command node count {count}"
                    )));
                }
                let mut nodes = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    nodes.push(CommandNode::decode(r)?);
                }
                ClientboundPlayPacket::DeclareCommands {
                    nodes,
                    root_index: r.read_varint()?,
                }
            }
            SET_SLOT => ClientboundPlayPacket::SetSlot {
                window_id: r.read_i8()?,
                slot: r.read_i16()?,
                data: ItemStack::decode(r)?,
            },
            PLUGIN_MESSAGE => ClientboundPlayPacket::PluginMessage {
                channel: r.read_string()?,
                data: r.take_remaining().to_vec(),
            },
            DISCONNECT => ClientboundPlayPacket::Disconnect {
                reason: Chat::decode(r)?,
            },
            KEEP_ALIVE => ClientboundPlayPacket::KeepAlive { id: r.read_i64()? },
            PARTICLE => {
                let particle_id = r.read_i32()?;
                ClientboundPlayPacket::Particle {
                    particle_id,
                    long_distance: r.read_bool()?,
                    position: AbsolutePosition::decode(r)?,
                    offset_x: r.read_f32()?,
                    offset_y: r.read_f32()?,
                    offset_z: r.read_f32()?,
                    max_speed: r.read_f32()?,
                    count: r.read_i32()?,
                    data: ParticleData::decode(particle_id, r)?,
                }
            }
            JOIN_GAME => {
                let entity_id = r.read_i32()?;
                let is_hardcore = r.read_bool()?;
                let gamemode = r.read_u8()?;
                let previous_gamemode = r.read_i8()?;
                let world_count = r.read_varint()?;
                if world_count < 0 {
                    return Err(CodecError::Malformed(format!(
                        "negative world count {world_count}"
                    )));
                }
                let mut world_names = Vec::with_capacity(world_count as usize);
                for _ in 0..world_count {
                    world_names.push(r.read_string()?);
                }
                let (_, dimension_codec) = nbt::read_root(r)?;
                let (_, dimension) = nbt::read_root(r)?;
                ClientboundPlayPacket::JoinGame {
                    entity_id,
                    is_hardcore,
                    gamemode,
                    previous_gamemode,
                    world_names,
                    dimension_codec,
                    dimension,
                    world_name: r.read_string()?,
                    hashed_seed: r.read_i64()?,
                    max_players: r.read_varint()?,
                    view_distance: r.read_varint()?,
                    reduced_debug_info: r.read_bool()?,
                    enable_respawn_screen: r.read_bool()?,
                    is_debug: r.read_bool()?,
                    is_flat: r.read_bool()?,
                }
            }
            ENTITY_POSITION => ClientboundPlayPacket::EntityPosition {
                entity_id: r.read_varint()?,
                delta_x: r.read_i16()?,
                delta_y: r.read_i16()?,
                delta_z: r.read_i16()?,
                on_ground: r.read_bool()?,
            },
            PLAYER_ABILITIES => ClientboundPlayPacket::PlayerAbilities {
                flags: r.read_u8()?,
                flying_speed: r.read_f32()?,
                fov_modifier: r.read_f32()?,
            },
            PLAYER_INFO => ClientboundPlayPacket::PlayerInfo {
                action: decode_player_info(r)?,
            },
            PLAYER_POSITION_AND_LOOK => ClientboundPlayPacket::PlayerPositionAndLook {
                position: AbsolutePosition::decode(r)?,
                yaw: r.read_f32()?,
                pitch: r.read_f32()?,
                flags: r.read_u8()?,
                teleport_id: r.read_varint()?,
            },
            DESTROY_ENTITIES => {
                let count = r.read_varint()?;
                if count < 0 {
                    return Err(CodecError::Malformed(format!(
                        "negative entity count {count}"
                    )));
                }
                let mut entity_ids = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    entity_ids.push(r.read_varint()?);
                }
                ClientboundPlayPacket::DestroyEntities { entity_ids }
            }
            HELD_ITEM_CHANGE => ClientboundPlayPacket::HeldItemChange { slot: r.read_i8()? },
            SPAWN_POSITION => ClientboundPlayPacket::SpawnPosition {
                position: BlockPos::decode(r)?,
            },
            ENTITY_METADATA => ClientboundPlayPacket::EntityMetadata {
                entity_id: r.read_varint()?,
                metadata: EntityMetadata::decode(r)?,
            },
            ENTITY_VELOCITY => ClientboundPlayPacket::EntityVelocity {
                entity_id: r.read_varint()?,
                velocity: Velocity::decode(r)?,
            },
            TIME_UPDATE => ClientboundPlayPacket::TimeUpdate {
                world_age: r.read_i64()?,
                time_of_day: r.read_i64()?,
            },
            ENTITY_TELEPORT => ClientboundPlayPacket::EntityTeleport {
                entity_id: r.read_varint()?,
                position: AbsolutePosition::decode(r)?,
                yaw: Angle::decode(r)?,
                pitch: Angle::decode(r)?,
                on_ground: r.read_bool()?,
            },
            DECLARE_RECIPES => {
                let count = r.read_varint()?;
                if count < 0 {
                    return Err(CodecError::Malformed(format!(
                        "negative recipe count {count}"
                    )));
                }
                let mut recipes = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    recipes.push(Recipe::decode(r)?);
                }
                ClientboundPlayPacket::DeclareRecipes { recipes }
            }
            _ => return Ok(None),
        };
        Ok(Some(packet))
    }
}

fn encode_player_info(action: &PlayerInfoAction, w: &mut PacketWriter) -> Result<(), CodecError> {
    match action {
        PlayerInfoAction::AddPlayers(entries) => {
            w.write_varint(0);
            w.write_varint(entries.len() as i32);
            for entry in entries {
                w.write_uuid(entry.profile.uuid);
                w.write_string(&entry.profile.name)?;
                w.write_varint(entry.profile.properties.len() as i32);
                for property in &entry.profile.properties {
                    w.write_string(&property.name)?;
                    w.write_string(&property.value)?;
                    w.write_bool(property.signature.is_some());
                    if let Some(signature) = &property.signature {
                        w.write_string(signature)?;
                    }
                }
                w.write_varint(entry.gamemode);
                w.write_varint(entry.ping);
                w.write_bool(entry.display_name.is_some());
                if let Some(display_name) = &entry.display_name {
                    display_name.encode(w)?;
                }
            }
        }
        PlayerInfoAction::UpdateGamemode(entries) => {
            w.write_varint(1);
            w.write_varint(entries.len() as i32);
            for (uuid, gamemode) in entries {
                w.write_uuid(*uuid);
                w.write_varint(*gamemode);
            }
        }
        PlayerInfoAction::UpdateLatency(entries) => {
            w.write_varint(2);
            w.write_varint(entries.len() as i32);
            for (uuid, ping) in entries {
                w.write_uuid(*uuid);
                w.write_varint(*ping);
            }
        }
        PlayerInfoAction::UpdateDisplayName(entries) => {
            w.write_varint(3);
            w.write_varint(entries.len() as i32);
            for (uuid, display_name) in entries {
                w.write_uuid(*uuid);
                w.write_bool(display_name.is_some());
                if let Some(display_name) = display_name {
                    display_name.encode(w)?;
                }
            }
        }
        PlayerInfoAction::RemovePlayers(uuids) => {
            w.write_varint(4);
            w.write_varint(uuids.len() as i32);
            for uuid in uuids {
                w.write_uuid(*uuid);
            }
        }
    }
    Ok(())
}

fn decode_player_info(r: &mut PacketReader<'_>) -> Result<PlayerInfoAction, CodecError> {
    let action = r.read_varint()?;
    let count = r.read_varint()?;
    if count < 0 {
        return Err(CodecError::Malformed(format!(
            "negative player info count {count}"
        )));
    }
    let count = count as usize;
    Ok(match action {
        0 => {
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                let uuid = r.read_uuid()?;
                let name = r.read_string()?;
                let property_count = r.read_varint()?;
                if property_count < 0 {
                    return Err(CodecError::Malformed(format!(
                        "negative property count {property_count}"
                    )));
                }
                let mut properties = Vec::with_capacity(property_count as usize);
                for _ in 0..property_count {
                    let name = r.read_string()?;
                    let value = r.read_string()?;
                    let signature = if r.read_bool()? {
                        Some(r.read_string()?)
                    } else {
                        None
                    };
                    properties.push(ProfileProperty {
                        name,
                        value,
                        signature,
                    });
                }
                let gamemode = r.read_varint()?;
                let ping = r.read_varint()?;
                let display_name = if r.read_bool()? {
                    Some(Chat::decode(r)?)
                } else {
                    None
                };
                entries.push(PlayerInfoEntry {
                    profile: GameProfile {
                        uuid,
                        name,
                        properties,
                    },
                    gamemode,
                    ping,
                    display_name,
                });
            }
            PlayerInfoAction::AddPlayers(entries)
        }
        1 => {
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                entries.push((r.read_uuid()?, r.read_varint()?));
            }
            PlayerInfoAction::UpdateGamemode(entries)
        }
        2 => {
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                entries.push((r.read_uuid()?, r.read_varint()?));
            }
            PlayerInfoAction::UpdateLatency(entries)
        }
        3 => {
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                let uuid = r.read_uuid()?;
                let display_name = if r.read_bool()? {
                    Some(Chat::decode(r)?)
                } else {
                    None
                };
                entries.push((uuid, display_name));
            }
            PlayerInfoAction::UpdateDisplayName(entries)
        }
        4 => {
            let mut uuids = Vec::with_capacity(count);
            for _ in 0..count {
                uuids.push(r.read_uuid()?);
            }
            PlayerInfoAction::RemovePlayers(uuids)
        }
        other => {
            return Err(CodecError::Malformed(format!(
                "unknown player info action {other}"
            )))
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
