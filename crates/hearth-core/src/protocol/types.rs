//! Value shapes shared across packets.
//!
//! Everything here is a plain owned value with an `encode`/`decode` pair
//! over the byte codec. Decoding produces an owned value; encoding borrows
//! one. Nothing in this module touches a socket.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::buffer::{CodecError, PacketReader, PacketWriter};
use crate::codec::nbt::{self, NbtCompound, NbtTag};

/// The pinned wire protocol version.
pub const PROTOCOL_VERSION: i32 = 754;

/// The game version matching [`PROTOCOL_VERSION`], shown in status responses.
pub const GAME_VERSION: &str = "1.16.5";

// ── Connection state and direction ────────────────────────────────────────────

/// Which subset of packet ids is currently valid for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Initial state; only the handshake packet is valid.
    Handshaking,
    /// Server-list query: status request/response and ping/pong.
    Status,
    /// Authentication and session setup.
    Login,
    /// The gameplay state.
    Play,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Handshaking => "handshaking",
            ConnectionState::Status => "status",
            ConnectionState::Login => "login",
            ConnectionState::Play => "play",
        };
        f.write_str(name)
    }
}

/// Which peer a packet travels towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Serverbound,
    Clientbound,
}

// ── Positions, angles, velocities ─────────────────────────────────────────────

/// A block position, carried on the wire as one packed 64-bit word:
/// `X:26 | Z:26 | Y:12`, each field signed two's-complement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Packs into the wire word, masking each field to its width.
    pub fn to_packed(self) -> i64 {
        ((self.x as i64 & 0x3FF_FFFF) << 38)
            | ((self.z as i64 & 0x3FF_FFFF) << 12)
            | (self.y as i64 & 0xFFF)
    }

    /// Unpacks a wire word, sign-extending each field.
    pub fn from_packed(word: i64) -> Self {
        let mut x = (word >> 38) & 0x3FF_FFFF;
        let mut z = (word >> 12) & 0x3FF_FFFF;
        let mut y = word & 0xFFF;
        if x >= 1 << 25 {
            x -= 1 << 26;
        }
        if z >= 1 << 25 {
            z -= 1 << 26;
        }
        if y >= 1 << 11 {
            y -= 1 << 12;
        }
        Self {
            x: x as i32,
            y: y as i32,
            z: z as i32,
        }
    }

    pub fn encode(self, w: &mut PacketWriter) {
        w.write_i64(self.to_packed());
    }

    pub fn decode(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self::from_packed(r.read_i64()?))
    }
}

/// An angle in steps of 1/256 of a full turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Angle(pub u8);

impl Angle {
    pub fn from_degrees(degrees: f32) -> Self {
        Angle((degrees.rem_euclid(360.0) / 360.0 * 256.0) as u8)
    }

    pub fn to_degrees(self) -> f32 {
        f32::from(self.0) * 360.0 / 256.0
    }

    pub fn encode(self, w: &mut PacketWriter) {
        w.write_u8(self.0);
    }

    pub fn decode(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Angle(r.read_u8()?))
    }
}

/// An entity velocity: three big-endian i16 components in 1/8000 block
/// per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Velocity {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl Velocity {
    pub fn encode(self, w: &mut PacketWriter) {
        w.write_i16(self.x);
        w.write_i16(self.y);
        w.write_i16(self.z);
    }

    pub fn decode(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            x: r.read_i16()?,
            y: r.read_i16()?,
            z: r.read_i16()?,
        })
    }
}

/// An absolute entity position: three consecutive big-endian f64.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AbsolutePosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AbsolutePosition {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn encode(self, w: &mut PacketWriter) {
        w.write_f64(self.x);
        w.write_f64(self.y);
        w.write_f64(self.z);
    }

    pub fn decode(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            x: r.read_f64()?,
            y: r.read_f64()?,
            z: r.read_f64()?,
        })
    }
}

// ── Chat ──────────────────────────────────────────────────────────────────────

/// A chat component: a String field carrying a JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat(pub String);

impl Chat {
    /// A plain-text component, JSON-escaped through serde.
    pub fn text(message: impl AsRef<str>) -> Self {
        Chat(serde_json::json!({ "text": message.as_ref() }).to_string())
    }

    pub fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.write_string(&self.0)
    }

    pub fn decode(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Chat(r.read_string()?))
    }
}

// ── Profiles ──────────────────────────────────────────────────────────────────

/// One signed property of a game profile (in practice: `textures`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileProperty {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub signature: Option<String>,
}

/// The authenticated (or offline-derived) identity of a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameProfile {
    #[serde(rename = "id")]
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub properties: Vec<ProfileProperty>,
}

impl GameProfile {
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
            properties: Vec::new(),
        }
    }
}

// ── Item stacks ───────────────────────────────────────────────────────────────

/// A present item stack. Absence is modelled by `Option<ItemStack>`; the
/// wire form leads with a presence bool either way.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemStack {
    pub item_id: i32,
    pub count: i8,
    /// `None` encodes as a single `TAG_End` byte.
    pub nbt: Option<NbtCompound>,
}

impl ItemStack {
    pub fn new(item_id: i32, count: i8) -> Self {
        Self {
            item_id,
            count,
            nbt: None,
        }
    }

    pub fn encode(slot: Option<&ItemStack>, w: &mut PacketWriter) -> Result<(), CodecError> {
        match slot {
            None => w.write_bool(false),
            Some(stack) => {
                w.write_bool(true);
                w.write_varint(stack.item_id);
                w.write_i8(stack.count);
                nbt::write_optional(w, stack.nbt.as_ref())?;
            }
        }
        Ok(())
    }

    pub fn decode(r: &mut PacketReader<'_>) -> Result<Option<ItemStack>, CodecError> {
        if !r.read_bool()? {
            return Ok(None);
        }
        Ok(Some(ItemStack {
            item_id: r.read_varint()?,
            count: r.read_i8()?,
            nbt: nbt::read_optional(r)?,
        }))
    }
}

// ── Particles ─────────────────────────────────────────────────────────────────

/// Particle type ids (754) whose payload carries extra data.
pub mod particle_ids {
    pub const BLOCK: i32 = 3;
    pub const DUST: i32 = 14;
    pub const FALLING_DUST: i32 = 23;
    pub const ITEM: i32 = 32;
}

/// The data payload trailing a particle id. Most particles carry none.
#[derive(Debug, Clone, PartialEq)]
pub enum ParticleData {
    /// `minecraft:block` / `minecraft:falling_dust`: a block state id.
    BlockState(i32),
    /// `minecraft:dust`: RGB in `[0, 1]` plus a scale.
    Dust { red: f32, green: f32, blue: f32, scale: f32 },
    /// `minecraft:item`: the displayed stack.
    Item(Option<ItemStack>),
    /// Everything else.
    None,
}

impl ParticleData {
    /// Whether `particle_id` carries a payload, and which shape.
    pub fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        match self {
            ParticleData::BlockState(state) => w.write_varint(*state),
            ParticleData::Dust {
                red,
                green,
                blue,
                scale,
            } => {
                w.write_f32(*red);
                w.write_f32(*green);
                w.write_f32(*blue);
                w.write_f32(*scale);
            }
            ParticleData::Item(slot) => ItemStack::encode(slot.as_ref(), w)?,
            ParticleData::None => {}
        }
        Ok(())
    }

    pub fn decode(particle_id: i32, r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(match particle_id {
            particle_ids::BLOCK | particle_ids::FALLING_DUST => {
                ParticleData::BlockState(r.read_varint()?)
            }
            particle_ids::DUST => ParticleData::Dust {
                red: r.read_f32()?,
                green: r.read_f32()?,
                blue: r.read_f32()?,
                scale: r.read_f32()?,
            },
            particle_ids::ITEM => ParticleData::Item(ItemStack::decode(r)?),
            _ => ParticleData::None,
        })
    }
}

// ── Entity metadata ───────────────────────────────────────────────────────────

/// One typed metadata value (754 type table).
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Byte(i8),
    VarInt(i32),
    Float(f32),
    String(String),
    Chat(Chat),
    OptChat(Option<Chat>),
    Slot(Option<ItemStack>),
    Boolean(bool),
    Rotation(f32, f32, f32),
    Position(BlockPos),
    OptPosition(Option<BlockPos>),
    Direction(i32),
    OptUuid(Option<Uuid>),
    OptBlockId(i32),
    Nbt(NbtCompound),
    Particle { particle_id: i32, data: ParticleData },
    VillagerData(i32, i32, i32),
    /// `0` on the wire means absent; present values are shifted up by one.
    OptVarInt(Option<i32>),
    Pose(i32),
}

impl MetadataValue {
    fn type_id(&self) -> i32 {
        match self {
            MetadataValue::Byte(_) => 0,
            MetadataValue::VarInt(_) => 1,
            MetadataValue::Float(_) => 2,
            MetadataValue::String(_) => 3,
            MetadataValue::Chat(_) => 4,
            MetadataValue::OptChat(_) => 5,
            MetadataValue::Slot(_) => 6,
            MetadataValue::Boolean(_) => 7,
            MetadataValue::Rotation(..) => 8,
            MetadataValue::Position(_) => 9,
            MetadataValue::OptPosition(_) => 10,
            MetadataValue::Direction(_) => 11,
            MetadataValue::OptUuid(_) => 12,
            MetadataValue::OptBlockId(_) => 13,
            MetadataValue::Nbt(_) => 14,
            MetadataValue::Particle { .. } => 15,
            MetadataValue::VillagerData(..) => 16,
            MetadataValue::OptVarInt(_) => 17,
            MetadataValue::Pose(_) => 18,
        }
    }

    fn encode_value(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        match self {
            MetadataValue::Byte(v) => w.write_i8(*v),
            MetadataValue::VarInt(v) => w.write_varint(*v),
            MetadataValue::Float(v) => w.write_f32(*v),
            MetadataValue::String(v) => w.write_string(v)?,
            MetadataValue::Chat(v) => v.encode(w)?,
            MetadataValue::OptChat(v) => {
                w.write_bool(v.is_some());
                if let Some(chat) = v {
                    chat.encode(w)?;
                }
            }
            MetadataValue::Slot(v) => ItemStack::encode(v.as_ref(), w)?,
            MetadataValue::Boolean(v) => w.write_bool(*v),
            MetadataValue::Rotation(x, y, z) => {
                w.write_f32(*x);
                w.write_f32(*y);
                w.write_f32(*z);
            }
            MetadataValue::Position(v) => v.encode(w),
            MetadataValue::OptPosition(v) => {
                w.write_bool(v.is_some());
                if let Some(pos) = v {
                    pos.encode(w);
                }
            }
            MetadataValue::Direction(v) => w.write_varint(*v),
            MetadataValue::OptUuid(v) => {
                w.write_bool(v.is_some());
                if let Some(id) = v {
                    w.write_uuid(*id);
                }
            }
            MetadataValue::OptBlockId(v) => w.write_varint(*v),
            MetadataValue::Nbt(v) => nbt::write_root(w, "", v)?,
            MetadataValue::Particle { particle_id, data } => {
                w.write_varint(*particle_id);
                data.encode(w)?;
            }
            MetadataValue::VillagerData(kind, profession, level) => {
                w.write_varint(*kind);
                w.write_varint(*profession);
                w.write_varint(*level);
            }
            MetadataValue::OptVarInt(v) => w.write_varint(v.map_or(0, |n| n + 1)),
            MetadataValue::Pose(v) => w.write_varint(*v),
        }
        Ok(())
    }

    fn decode_value(type_id: i32, r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(match type_id {
            0 => MetadataValue::Byte(r.read_i8()?),
            1 => MetadataValue::VarInt(r.read_varint()?),
            2 => MetadataValue::Float(r.read_f32()?),
            3 => MetadataValue::String(r.read_string()?),
            4 => MetadataValue::Chat(Chat::decode(r)?),
            5 => {
                let present = r.read_bool()?;
                MetadataValue::OptChat(if present { Some(Chat::decode(r)?) } else { None })
            }
            6 => MetadataValue::Slot(ItemStack::decode(r)?),
            7 => MetadataValue::Boolean(r.read_bool()?),
            8 => MetadataValue::Rotation(r.read_f32()?, r.read_f32()?, r.read_f32()?),
            9 => MetadataValue::Position(BlockPos::decode(r)?),
            10 => {
                let present = r.read_bool()?;
                MetadataValue::OptPosition(if present {
                    Some(BlockPos::decode(r)?)
                } else {
                    None
                })
            }
            11 => MetadataValue::Direction(r.read_varint()?),
            12 => {
                let present = r.read_bool()?;
                MetadataValue::OptUuid(if present { Some(r.read_uuid()?) } else { None })
            }
            13 => MetadataValue::OptBlockId(r.read_varint()?),
            14 => {
                let (_, compound) = nbt::read_root(r)?;
                MetadataValue::Nbt(compound)
            }
            15 => {
                let particle_id = r.read_varint()?;
                MetadataValue::Particle {
                    particle_id,
                    data: ParticleData::decode(particle_id, r)?,
                }
            }
            16 => MetadataValue::VillagerData(r.read_varint()?, r.read_varint()?, r.read_varint()?),
            17 => {
                let raw = r.read_varint()?;
                MetadataValue::OptVarInt(if raw == 0 { None } else { Some(raw - 1) })
            }
            18 => MetadataValue::Pose(r.read_varint()?),
            other => {
                return Err(CodecError::Malformed(format!(
                    "unknown entity metadata type {other}"
                )))
            }
        })
    }
}

/// One metadata entry: a field index plus its typed value.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataEntry {
    pub index: u8,
    pub value: MetadataValue,
}

/// An entity metadata sequence, terminated on the wire by index `0xFF`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityMetadata {
    pub entries: Vec<MetadataEntry>,
}

impl EntityMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, index: u8, value: MetadataValue) -> Self {
        self.entries.push(MetadataEntry { index, value });
        self
    }

    /// Writes all entries followed by the terminator. The terminator
    /// belongs to the outer packet encoder, which is this method's caller
    /// chain; entry indices of `0xFF` are therefore unencodable and
    /// rejected.
    pub fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        for entry in &self.entries {
            if entry.index == 0xFF {
                return Err(CodecError::OutOfRange(
                    "0xFF is the metadata terminator, not a valid index".to_string(),
                ));
            }
            w.write_u8(entry.index);
            w.write_varint(entry.value.type_id());
            entry.value.encode_value(w)?;
        }
        w.write_u8(0xFF);
        Ok(())
    }

    pub fn decode(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let mut entries = Vec::new();
        loop {
            let index = r.read_u8()?;
            if index == 0xFF {
                return Ok(Self { entries });
            }
            let type_id = r.read_varint()?;
            entries.push(MetadataEntry {
                index,
                value: MetadataValue::decode_value(type_id, r)?,
            });
        }
    }
}

// ── Recipes ───────────────────────────────────────────────────────────────────

/// A set of interchangeable item stacks for one crafting slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ingredient {
    pub options: Vec<Option<ItemStack>>,
}

impl Ingredient {
    pub fn of(stack: ItemStack) -> Self {
        Self {
            options: vec![Some(stack)],
        }
    }

    fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.write_varint(self.options.len() as i32);
        for option in &self.options {
            ItemStack::encode(option.as_ref(), w)?;
        }
        Ok(())
    }

    fn decode(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let count = r.read_varint()?;
        if count < 0 {
            return Err(CodecError::Malformed(format!(
                "negative ingredient count {count}"
            )));
        }
        let mut options = Vec::with_capacity(count as usize);
        for _ in 0..count {
            options.push(ItemStack::decode(r)?);
        }
        Ok(Self { options })
    }
}

/// The body of a declared recipe; the shape is selected by the serializer
/// identifier that precedes it on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeBody {
    Shapeless {
        group: String,
        ingredients: Vec<Ingredient>,
        result: Option<ItemStack>,
    },
    Shaped {
        width: i32,
        height: i32,
        group: String,
        /// `width * height` entries, row-major.
        ingredients: Vec<Ingredient>,
        result: Option<ItemStack>,
    },
    /// Shared by smelting, blasting, smoking and campfire cooking.
    Cooking {
        group: String,
        ingredient: Ingredient,
        result: Option<ItemStack>,
        experience: f32,
        cooking_time: i32,
    },
    Stonecutting {
        group: String,
        ingredient: Ingredient,
        result: Option<ItemStack>,
    },
    Smithing {
        base: Ingredient,
        addition: Ingredient,
        result: Option<ItemStack>,
    },
    /// The `crafting_special_*` family carries no body.
    Special,
}

/// One declared recipe: serializer identifier, recipe identifier, body.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    /// Serializer identifier, e.g. `minecraft:crafting_shaped`.
    pub kind: String,
    /// Recipe identifier, e.g. `minecraft:oak_planks`.
    pub id: String,
    pub body: RecipeBody,
}

impl Recipe {
    pub fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.write_string(&self.kind)?;
        w.write_string(&self.id)?;
        match &self.body {
            RecipeBody::Shapeless {
                group,
                ingredients,
                result,
            } => {
                w.write_string(group)?;
                w.write_varint(ingredients.len() as i32);
                for ingredient in ingredients {
                    ingredient.encode(w)?;
                }
                ItemStack::encode(result.as_ref(), w)?;
            }
            RecipeBody::Shaped {
                width,
                height,
                group,
                ingredients,
                result,
            } => {
                if ingredients.len() as i64 != i64::from(*width) * i64::from(*height) {
                    return Err(CodecError::OutOfRange(format!(
                        "shaped recipe {} declares {}x{} but carries {} ingredients",
                        self.id,
                        width,
                        height,
                        ingredients.len()
                    )));
                }
                w.write_varint(*width);
                w.write_varint(*height);
                w.write_string(group)?;
                for ingredient in ingredients {
                    ingredient.encode(w)?;
                }
                ItemStack::encode(result.as_ref(), w)?;
            }
            RecipeBody::Cooking {
                group,
                ingredient,
                result,
                experience,
                cooking_time,
            } => {
                w.write_string(group)?;
                ingredient.encode(w)?;
                ItemStack::encode(result.as_ref(), w)?;
                w.write_f32(*experience);
                w.write_varint(*cooking_time);
            }
            RecipeBody::Stonecutting {
                group,
                ingredient,
                result,
            } => {
                w.write_string(group)?;
                ingredient.encode(w)?;
                ItemStack::encode(result.as_ref(), w)?;
            }
            RecipeBody::Smithing {
                base,
                addition,
                result,
            } => {
                base.encode(w)?;
                addition.encode(w)?;
                ItemStack::encode(result.as_ref(), w)?;
            }
            RecipeBody::Special => {}
        }
        Ok(())
    }

    pub fn decode(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let kind = r.read_string()?;
        let id = r.read_string()?;
        let body = match kind.as_str() {
            "minecraft:crafting_shapeless" => {
                let group = r.read_string()?;
                let count = r.read_varint()?;
                if count < 0 {
                    return Err(CodecError::Malformed(format!(
                        "negative ingredient count {count}"
                    )));
                }
                let mut ingredients = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    ingredients.push(Ingredient::decode(r)?);
                }
                RecipeBody::Shapeless {
                    group,
                    ingredients,
                    result: ItemStack::decode(r)?,
                }
            }
            "minecraft:crafting_shaped" => {
                let width = r.read_varint()?;
                let height = r.read_varint()?;
                let group = r.read_string()?;
                let count = i64::from(width) * i64::from(height);
                if width < 0 || height < 0 || count > 9 * 9 {
                    return Err(CodecError::Malformed(format!(
                        "implausible shaped recipe dimensions {width}x{height}"
                    )));
                }
                let mut ingredients = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    ingredients.push(Ingredient::decode(r)?);
                }
                RecipeBody::Shaped {
                    width,
                    height,
                    group,
                    ingredients,
                    result: ItemStack::decode(r)?,
                }
            }
            "minecraft:smelting"
            | "minecraft:blasting"
            | "minecraft:smoking"
            | "minecraft:campfire_cooking" => RecipeBody::Cooking {
                group: r.read_string()?,
                ingredient: Ingredient::decode(r)?,
                result: ItemStack::decode(r)?,
                experience: r.read_f32()?,
                cooking_time: r.read_varint()?,
            },
            "minecraft:stonecutting" => RecipeBody::Stonecutting {
                group: r.read_string()?,
                ingredient: Ingredient::decode(r)?,
                result: ItemStack::decode(r)?,
            },
            "minecraft:smithing" => RecipeBody::Smithing {
                base: Ingredient::decode(r)?,
                addition: Ingredient::decode(r)?,
                result: ItemStack::decode(r)?,
            },
            special if special.starts_with("minecraft:crafting_special_") => RecipeBody::Special,
            other => {
                return Err(CodecError::Malformed(format!(
                    "unknown recipe serializer {other}"
                )))
            }
        };
        Ok(Self { kind, id, body })
    }
}

// ── Boss bars ─────────────────────────────────────────────────────────────────

/// Boss bar colour discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum BossBarColor {
    Pink = 0,
    Blue = 1,
    Red = 2,
    Green = 3,
    Yellow = 4,
    Purple = 5,
    White = 6,
}

impl TryFrom<i32> for BossBarColor {
    type Error = ();

    fn try_from(value: i32) -> Result<Self, ()> {
        Ok(match value {
            0 => BossBarColor::Pink,
            1 => BossBarColor::Blue,
            2 => BossBarColor::Red,
            3 => BossBarColor::Green,
            4 => BossBarColor::Yellow,
            5 => BossBarColor::Purple,
            6 => BossBarColor::White,
            _ => return Err(()),
        })
    }
}

/// Boss bar notch-division discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum BossBarDivision {
    None = 0,
    Six = 1,
    Ten = 2,
    Twelve = 3,
    Twenty = 4,
}

impl TryFrom<i32> for BossBarDivision {
    type Error = ();

    fn try_from(value: i32) -> Result<Self, ()> {
        Ok(match value {
            0 => BossBarDivision::None,
            1 => BossBarDivision::Six,
            2 => BossBarDivision::Ten,
            3 => BossBarDivision::Twelve,
            4 => BossBarDivision::Twenty,
            _ => return Err(()),
        })
    }
}

/// One boss bar mutation, tagged by a VarInt action id.
#[derive(Debug, Clone, PartialEq)]
pub enum BossBarAction {
    Add {
        title: Chat,
        health: f32,
        color: BossBarColor,
        division: BossBarDivision,
        flags: u8,
    },
    Remove,
    UpdateHealth(f32),
    UpdateTitle(Chat),
    UpdateStyle {
        color: BossBarColor,
        division: BossBarDivision,
    },
    UpdateFlags(u8),
}

impl BossBarAction {
    pub fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        match self {
            BossBarAction::Add {
                title,
                health,
                color,
                division,
                flags,
            } => {
                w.write_varint(0);
                title.encode(w)?;
                w.write_f32(*health);
                w.write_varint(*color as i32);
                w.write_varint(*division as i32);
                w.write_u8(*flags);
            }
            BossBarAction::Remove => w.write_varint(1),
            BossBarAction::UpdateHealth(health) => {
                w.write_varint(2);
                w.write_f32(*health);
            }
            BossBarAction::UpdateTitle(title) => {
                w.write_varint(3);
                title.encode(w)?;
            }
            BossBarAction::UpdateStyle { color, division } => {
                w.write_varint(4);
                w.write_varint(*color as i32);
                w.write_varint(*division as i32);
            }
            BossBarAction::UpdateFlags(flags) => {
                w.write_varint(5);
                w.write_u8(*flags);
            }
        }
        Ok(())
    }

    pub fn decode(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let read_color = |r: &mut PacketReader<'_>| -> Result<BossBarColor, CodecError> {
            let raw = r.read_varint()?;
            BossBarColor::try_from(raw)
                .map_err(|_| CodecError::Malformed(format!("unknown boss bar color {raw}")))
        };
        let read_division = |r: &mut PacketReader<'_>| -> Result<BossBarDivision, CodecError> {
            let raw = r.read_varint()?;
            BossBarDivision::try_from(raw)
                .map_err(|_| CodecError::Malformed(format!("unknown boss bar division {raw}")))
        };

        let action = r.read_varint()?;
        Ok(match action {
            0 => BossBarAction::Add {
                title: Chat::decode(r)?,
                health: r.read_f32()?,
                color: read_color(r)?,
                division: read_division(r)?,
                flags: r.read_u8()?,
            },
            1 => BossBarAction::Remove,
            2 => BossBarAction::UpdateHealth(r.read_f32()?),
            3 => BossBarAction::UpdateTitle(Chat::decode(r)?),
            4 => BossBarAction::UpdateStyle {
                color: read_color(r)?,
                division: read_division(r)?,
            },
            5 => BossBarAction::UpdateFlags(r.read_u8()?),
            other => {
                return Err(CodecError::Malformed(format!(
                    "unknown boss bar action {other}"
                )))
            }
        })
    }
}

// ── Command trees ─────────────────────────────────────────────────────────────

/// Argument parser binding for a command-tree argument node.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentParser {
    Bool,
    Float { min: Option<f32>, max: Option<f32> },
    Double { min: Option<f64>, max: Option<f64> },
    Integer { min: Option<i32>, max: Option<i32> },
    /// `brigadier:string` flavour: 0 word, 1 quotable phrase, 2 greedy.
    String(i32),
    /// `minecraft:entity` selector restrictions.
    Entity { flags: u8 },
    /// Any parser whose properties are empty, kept by identifier.
    Bare(String),
}

impl ArgumentParser {
    fn identifier(&self) -> &str {
        match self {
            ArgumentParser::Bool => "brigadier:bool",
            ArgumentParser::Float { .. } => "brigadier:float",
            ArgumentParser::Double { .. } => "brigadier:double",
            ArgumentParser::Integer { .. } => "brigadier:integer",
            ArgumentParser::String(_) => "brigadier:string",
            ArgumentParser::Entity { .. } => "minecraft:entity",
            ArgumentParser::Bare(id) => id,
        }
    }

    fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        w.write_string(self.identifier())?;
        match self {
            ArgumentParser::Bool | ArgumentParser::Bare(_) => {}
            ArgumentParser::Float { min, max } => {
                w.write_u8(range_flags(min.is_some(), max.is_some()));
                if let Some(min) = min {
                    w.write_f32(*min);
                }
                if let Some(max) = max {
                    w.write_f32(*max);
                }
            }
            ArgumentParser::Double { min, max } => {
                w.write_u8(range_flags(min.is_some(), max.is_some()));
                if let Some(min) = min {
                    w.write_f64(*min);
                }
                if let Some(max) = max {
                    w.write_f64(*max);
                }
            }
            ArgumentParser::Integer { min, max } => {
                w.write_u8(range_flags(min.is_some(), max.is_some()));
                if let Some(min) = min {
                    w.write_i32(*min);
                }
                if let Some(max) = max {
                    w.write_i32(*max);
                }
            }
            ArgumentParser::String(flavor) => w.write_varint(*flavor),
            ArgumentParser::Entity { flags } => w.write_u8(*flags),
        }
        Ok(())
    }

    fn decode(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let identifier = r.read_string()?;
        Ok(match identifier.as_str() {
            "brigadier:bool" => ArgumentParser::Bool,
            "brigadier:float" => {
                let flags = r.read_u8()?;
                ArgumentParser::Float {
                    min: (flags & 0x01 != 0).then(|| r.read_f32()).transpose()?,
                    max: (flags & 0x02 != 0).then(|| r.read_f32()).transpose()?,
                }
            }
            "brigadier:double" => {
                let flags = r.read_u8()?;
                ArgumentParser::Double {
                    min: (flags & 0x01 != 0).then(|| r.read_f64()).transpose()?,
                    max: (flags & 0x02 != 0).then(|| r.read_f64()).transpose()?,
                }
            }
            "brigadier:integer" => {
                let flags = r.read_u8()?;
                ArgumentParser::Integer {
                    min: (flags & 0x01 != 0).then(|| r.read_i32()).transpose()?,
                    max: (flags & 0x02 != 0).then(|| r.read_i32()).transpose()?,
                }
            }
            "brigadier:string" => ArgumentParser::String(r.read_varint()?),
            "minecraft:entity" => ArgumentParser::Entity {
                flags: r.read_u8()?,
            },
            _ => ArgumentParser::Bare(identifier),
        })
    }
}

fn range_flags(has_min: bool, has_max: bool) -> u8 {
    u8::from(has_min) | (u8::from(has_max) << 1)
}

/// The role of a command-tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandNodeKind {
    Root,
    Literal {
        name: String,
    },
    Argument {
        name: String,
        parser: ArgumentParser,
        suggestions: Option<String>,
    },
}

/// One node of the declared command tree. Children and redirects are
/// indices into the packet's node list.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandNode {
    pub kind: CommandNodeKind,
    pub executable: bool,
    pub children: Vec<i32>,
    pub redirect: Option<i32>,
}

const NODE_TYPE_MASK: u8 = 0x03;
const NODE_EXECUTABLE: u8 = 0x04;
const NODE_HAS_REDIRECT: u8 = 0x08;
const NODE_HAS_SUGGESTIONS: u8 = 0x10;

impl CommandNode {
    pub fn root(children: Vec<i32>) -> Self {
        Self {
            kind: CommandNodeKind::Root,
            executable: false,
            children,
            redirect: None,
        }
    }

    pub fn literal(name: impl Into<String>, executable: bool, children: Vec<i32>) -> Self {
        Self {
            kind: CommandNodeKind::Literal { name: name.into() },
            executable,
            children,
            redirect: None,
        }
    }

    pub fn encode(&self, w: &mut PacketWriter) -> Result<(), CodecError> {
        let mut flags = match &self.kind {
            CommandNodeKind::Root => 0,
            CommandNodeKind::Literal { .. } => 1,
            CommandNodeKind::Argument { suggestions, .. } => {
                2 | if suggestions.is_some() {
                    NODE_HAS_SUGGESTIONS
                } else {
                    0
                }
            }
        };
        if self.executable {
            flags |= NODE_EXECUTABLE;
        }
        if self.redirect.is_some() {
            flags |= NODE_HAS_REDIRECT;
        }
        w.write_u8(flags);

        w.write_varint(self.children.len() as i32);
        for child in &self.children {
            w.write_varint(*child);
        }
        if let Some(redirect) = self.redirect {
            w.write_varint(redirect);
        }
        match &self.kind {
            CommandNodeKind::Root => {}
            CommandNodeKind::Literal { name } => w.write_string(name)?,
            CommandNodeKind::Argument {
                name,
                parser,
                suggestions,
            } => {
                w.write_string(name)?;
                parser.encode(w)?;
                if let Some(suggestions) = suggestions {
                    w.write_string(suggestions)?;
                }
            }
        }
        Ok(())
    }

    pub fn decode(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let flags = r.read_u8()?;
        let child_count = r.read_varint()?;
        if child_count < 0 {
            return Err(CodecError::Malformed(format!(
                "negative child count {child_count}"
            )));
        }
        let mut children = Vec::with_capacity(child_count as usize);
        for _ in 0..child_count {
            children.push(r.read_varint()?);
        }
        let redirect = if flags & NODE_HAS_REDIRECT != 0 {
            Some(r.read_varint()?)
        } else {
            None
        };
        let kind = match flags & NODE_TYPE_MASK {
            0 => CommandNodeKind::Root,
            1 => CommandNodeKind::Literal {
                name: r.read_string()?,
            },
            2 => {
                let name = r.read_string()?;
                let parser = ArgumentParser::decode(r)?;
                let suggestions = if flags & NODE_HAS_SUGGESTIONS != 0 {
                    Some(r.read_string()?)
                } else {
                    None
                };
                CommandNodeKind::Argument {
                    name,
                    parser,
                    suggestions,
                }
            }
            other => {
                return Err(CodecError::Malformed(format!(
                    "invalid command node type {other}"
                )))
            }
        };
        Ok(Self {
            kind,
            executable: flags & NODE_EXECUTABLE != 0,
            children,
            redirect,
        })
    }
}

// ── Dimension codec ───────────────────────────────────────────────────────────

/// The registry document JoinGame embeds: dimension types and biomes.
///
/// This is the minimal document a 754 client accepts, built from the
/// reference values for the overworld and the plains biome.
pub fn default_dimension_codec() -> NbtCompound {
    let overworld_entry = NbtCompound::new()
        .with("name", NbtTag::String("minecraft:overworld".to_string()))
        .with("id", NbtTag::Int(0))
        .with("element", overworld_dimension_type());

    let dimension_registry = NbtCompound::new()
        .with(
            "type",
            NbtTag::String("minecraft:dimension_type".to_string()),
        )
        .with("value", NbtTag::List(vec![NbtTag::Compound(overworld_entry)]));

    let plains_effects = NbtCompound::new()
        .with("sky_color", NbtTag::Int(7907327))
        .with("water_fog_color", NbtTag::Int(329011))
        .with("fog_color", NbtTag::Int(12638463))
        .with("water_color", NbtTag::Int(4159204))
        .with(
            "mood_sound",
            NbtTag::Compound(
                NbtCompound::new()
                    .with("tick_delay", NbtTag::Int(6000))
                    .with("offset", NbtTag::Double(2.0))
                    .with(
                        "sound",
                        NbtTag::String("minecraft:ambient.cave".to_string()),
                    )
                    .with("block_search_extent", NbtTag::Int(8)),
            ),
        );

    let plains_element = NbtCompound::new()
        .with("precipitation", NbtTag::String("rain".to_string()))
        .with("effects", NbtTag::Compound(plains_effects))
        .with("depth", NbtTag::Float(0.125))
        .with("temperature", NbtTag::Float(0.8))
        .with("scale", NbtTag::Float(0.05))
        .with("downfall", NbtTag::Float(0.4))
        .with("category", NbtTag::String("plains".to_string()));

    let plains_entry = NbtCompound::new()
        .with("name", NbtTag::String("minecraft:plains".to_string()))
        .with("id", NbtTag::Int(1))
        .with("element", NbtTag::Compound(plains_element));

    let biome_registry = NbtCompound::new()
        .with(
            "type",
            NbtTag::String("minecraft:worldgen/biome".to_string()),
        )
        .with("value", NbtTag::List(vec![NbtTag::Compound(plains_entry)]));

    NbtCompound::new()
        .with(
            "minecraft:dimension_type",
            NbtTag::Compound(dimension_registry),
        )
        .with("minecraft:worldgen/biome", NbtTag::Compound(biome_registry))
}

/// The dimension-type element JoinGame sends for the joined world.
pub fn overworld_dimension_type() -> NbtTag {
    NbtTag::Compound(
        NbtCompound::new()
            .with("piglin_safe", NbtTag::Byte(0))
            .with("natural", NbtTag::Byte(1))
            .with("ambient_light", NbtTag::Float(0.0))
            .with(
                "infiniburn",
                NbtTag::String("minecraft:infiniburn_overworld".to_string()),
            )
            .with("respawn_anchor_works", NbtTag::Byte(0))
            .with("has_skylight", NbtTag::Byte(1))
            .with("bed_works", NbtTag::Byte(1))
            .with(
                "effects",
                NbtTag::String("minecraft:overworld".to_string()),
            )
            .with("has_raids", NbtTag::Byte(1))
            .with("logical_height", NbtTag::Int(256))
            .with("coordinate_scale", NbtTag::Double(1.0))
            .with("ultrawarm", NbtTag::Byte(0))
            .with("has_ceiling", NbtTag::Byte(0)),
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
