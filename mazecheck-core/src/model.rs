//! In-memory level model.
//!
//! [`Maze`] is the plain parsed tree as a loader produces it. [`MapModel`]
//! wraps it with the indices every later stage relies on and is immutable
//! once built: a "fixed" level is a new `MapModel`, never an edited one.

use crate::error::MalformedModelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ─── Scalar aliases ───────────────────────────────────────────

/// Globally unique block identifier (`blockid`).
pub type BlockId = i64;

/// Room identifier (`roomnumber`).
pub type RoomNumber = u32;

// ─── Geometry ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: i64,
    pub height: i64,
}

impl Size {
    pub fn new(width: i64, height: i64) -> Self {
        Self { width, height }
    }
}

/// Wind direction as one of eight compass points, `0..=7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CompassDirection(u8);

impl CompassDirection {
    pub const MAX: u8 = 7;

    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for CompassDirection {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("compass direction {value} is outside 0..=7"))
    }
}

impl From<CompassDirection> for u8 {
    fn from(dir: CompassDirection) -> Self {
        dir.0
    }
}

// ─── Blocks ───────────────────────────────────────────────────

/// Patrol waypoint owned by an [`BlockKind::EnemyBot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub position: Position,
}

/// The closed set of block variants. Consumers match exhaustively so a new
/// variant forces every check to be revisited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum BlockKind {
    Wall {
        size: Size,
    },
    Ladder {
        size: Size,
    },
    DeadlyBlock {
        size: Size,
    },
    Door {
        /// Destination room; kept signed so dangling values survive loading.
        destination: i64,
        locked: bool,
    },
    Key {
        /// Door block ids this key unlocks, in declaration order.
        unlocks: Vec<BlockId>,
    },
    EnemyBot {
        markers: Vec<Marker>,
    },
    WindArea {
        size: Size,
        direction: CompassDirection,
        strength: i64,
        visible: bool,
    },
    Checkpoint,
}

impl BlockKind {
    /// Element name as used in level files.
    pub fn name(&self) -> &'static str {
        match self {
            BlockKind::Wall { .. } => "Wall",
            BlockKind::Ladder { .. } => "Ladder",
            BlockKind::DeadlyBlock { .. } => "DeadlyBlock",
            BlockKind::Door { .. } => "Door",
            BlockKind::Key { .. } => "Key",
            BlockKind::EnemyBot { .. } => "EnemyBot",
            BlockKind::WindArea { .. } => "WindArea",
            BlockKind::Checkpoint => "Checkpoint",
        }
    }

    /// Declared extent, for the variants that carry one.
    pub fn size(&self) -> Option<Size> {
        match self {
            BlockKind::Wall { size }
            | BlockKind::Ladder { size }
            | BlockKind::DeadlyBlock { size }
            | BlockKind::WindArea { size, .. } => Some(*size),
            BlockKind::Door { .. }
            | BlockKind::Key { .. }
            | BlockKind::EnemyBot { .. }
            | BlockKind::Checkpoint => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub position: Position,
    #[serde(flatten)]
    pub kind: BlockKind,
}

impl Block {
    pub fn new(id: BlockId, position: Position, kind: BlockKind) -> Self {
        Self { id, position, kind }
    }

    pub fn wall(id: BlockId, position: Position, size: Size) -> Self {
        Self::new(id, position, BlockKind::Wall { size })
    }

    pub fn door(id: BlockId, position: Position, destination: i64, locked: bool) -> Self {
        Self::new(
            id,
            position,
            BlockKind::Door {
                destination,
                locked,
            },
        )
    }

    pub fn key(id: BlockId, position: Position, unlocks: Vec<BlockId>) -> Self {
        Self::new(id, position, BlockKind::Key { unlocks })
    }

    pub fn enemy_bot(id: BlockId, position: Position, markers: Vec<Position>) -> Self {
        let markers = markers
            .into_iter()
            .map(|position| Marker { position })
            .collect();
        Self::new(id, position, BlockKind::EnemyBot { markers })
    }
}

// ─── Rooms, character, maze ───────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub number: RoomNumber,
    pub blocks: Vec<Block>,
}

impl Room {
    pub fn new(number: RoomNumber, blocks: Vec<Block>) -> Self {
        Self { number, blocks }
    }
}

/// The player. Only `initial_room` matters to verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub initial_room: i64,
    #[serde(default)]
    pub block_id: Option<BlockId>,
    #[serde(default)]
    pub position: Option<Position>,
}

impl Character {
    pub fn starting_in(room: i64) -> Self {
        Self {
            initial_room: room,
            block_id: None,
            position: None,
        }
    }
}

/// A parsed level before indexing. Characters are a list so a loader can hand
/// over what it saw and let [`MapModel::new`] reject the wrong cardinality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maze {
    pub total_rooms: u32,
    pub rooms: Vec<Room>,
    pub characters: Vec<Character>,
}

// ─── MapModel ─────────────────────────────────────────────────

/// Where a block lives inside [`MapModel::rooms`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLocation {
    pub room_index: usize,
    pub slot: usize,
}

/// A block together with the number of the room that declares it.
#[derive(Debug, Clone, Copy)]
pub struct PlacedBlock<'a> {
    pub room: RoomNumber,
    pub block: &'a Block,
}

/// Indexed, read-only view of a level.
///
/// Both indices keep the first declaration of a room number or block id; the
/// structural validator reports every later duplicate.
#[derive(Debug, Clone)]
pub struct MapModel {
    total_rooms: u32,
    rooms: Vec<Room>,
    character: Character,
    start_room: RoomNumber,
    room_index: BTreeMap<RoomNumber, usize>,
    block_index: BTreeMap<BlockId, BlockLocation>,
}

impl MapModel {
    /// Index a parsed maze in one pass over rooms and blocks.
    pub fn new(maze: Maze) -> Result<Self, MalformedModelError> {
        let Maze {
            total_rooms,
            rooms,
            mut characters,
        } = maze;

        let character = match characters.len() {
            0 => return Err(MalformedModelError::MissingCharacter),
            1 => characters.remove(0),
            n => return Err(MalformedModelError::MultipleCharacters(n)),
        };
        if rooms.is_empty() {
            return Err(MalformedModelError::NoRooms);
        }

        let mut room_index = BTreeMap::new();
        let mut block_index = BTreeMap::new();
        for (room_idx, room) in rooms.iter().enumerate() {
            room_index.entry(room.number).or_insert(room_idx);
            for (slot, block) in room.blocks.iter().enumerate() {
                block_index.entry(block.id).or_insert(BlockLocation {
                    room_index: room_idx,
                    slot,
                });
            }
        }

        let start_room = RoomNumber::try_from(character.initial_room)
            .ok()
            .filter(|n| room_index.contains_key(n))
            .ok_or(MalformedModelError::UnknownInitialRoom(
                character.initial_room,
            ))?;

        Ok(Self {
            total_rooms,
            rooms,
            character,
            start_room,
            room_index,
            block_index,
        })
    }

    /// The declared `totalroom`. Untrusted; compare with [`Self::rooms`].
    pub fn total_rooms(&self) -> u32 {
        self.total_rooms
    }

    /// Rooms in declaration order, duplicates included.
    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    /// First room declared with this number.
    pub fn room(&self, number: RoomNumber) -> Option<&Room> {
        self.room_index.get(&number).map(|&idx| &self.rooms[idx])
    }

    /// Look up a room by a signed reference such as `Door.destination`.
    pub fn resolve_room(&self, reference: i64) -> Option<RoomNumber> {
        RoomNumber::try_from(reference)
            .ok()
            .filter(|n| self.room_index.contains_key(n))
    }

    /// Number of distinct room numbers.
    pub fn indexed_room_count(&self) -> usize {
        self.room_index.len()
    }

    pub fn room_numbers(&self) -> impl Iterator<Item = RoomNumber> + '_ {
        self.room_index.keys().copied()
    }

    /// First block declared with this id.
    pub fn block(&self, id: BlockId) -> Option<PlacedBlock<'_>> {
        self.block_location(id).map(|loc| {
            let room = &self.rooms[loc.room_index];
            PlacedBlock {
                room: room.number,
                block: &room.blocks[loc.slot],
            }
        })
    }

    pub fn block_location(&self, id: BlockId) -> Option<BlockLocation> {
        self.block_index.get(&id).copied()
    }

    /// Whether `location` is the authoritative (first) declaration of its id.
    pub fn is_authoritative(&self, id: BlockId, location: BlockLocation) -> bool {
        self.block_location(id) == Some(location)
    }

    /// Every block with its room, in declaration order, duplicates included.
    pub fn placed_blocks(&self) -> impl Iterator<Item = (BlockLocation, PlacedBlock<'_>)> {
        self.rooms
            .iter()
            .enumerate()
            .flat_map(|(room_index, room)| {
                room.blocks.iter().enumerate().map(move |(slot, block)| {
                    (
                        BlockLocation { room_index, slot },
                        PlacedBlock {
                            room: room.number,
                            block,
                        },
                    )
                })
            })
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    pub fn start_room(&self) -> RoomNumber {
        self.start_room
    }
}
