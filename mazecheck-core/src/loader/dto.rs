use super::pattern::{compass_direction, parse_key_ids};
use crate::error::LoadError;
use crate::model::{Block, BlockKind, Character, Marker, Maze, Position, Room, Size};
use serde::{Deserialize, Serialize};

// ── Top-level DTO ──

/// Serialized form of a level. Field names follow the `map-schema` attribute
/// names so YAML, JSON and XML levels read the same.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MazeDto {
    pub totalroom: u32,
    #[serde(default)]
    pub rooms: Vec<RoomDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<CharacterDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDto {
    pub roomnumber: u32,
    #[serde(default)]
    pub blocks: Vec<BlockDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterDto {
    pub initialroom: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockid: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerDto {
    pub x: i64,
    pub y: i64,
}

/// `keyid` as written: the schema form is a `;`-separated string, but a
/// single bare number is accepted from YAML/JSON too.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyIdDto {
    Number(u64),
    Text(String),
}

// ── Block (tagged enum) ──

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum BlockDto {
    Wall {
        blockid: i64,
        x: i64,
        y: i64,
        width: i64,
        height: i64,
    },
    Ladder {
        blockid: i64,
        x: i64,
        y: i64,
        width: i64,
        height: i64,
    },
    DeadlyBlock {
        blockid: i64,
        x: i64,
        y: i64,
        width: i64,
        height: i64,
    },
    Door {
        blockid: i64,
        x: i64,
        y: i64,
        destination: i64,
        #[serde(default)]
        locked: bool,
    },
    Key {
        blockid: i64,
        x: i64,
        y: i64,
        keyid: KeyIdDto,
    },
    EnemyBot {
        blockid: i64,
        x: i64,
        y: i64,
        #[serde(default)]
        markers: Vec<MarkerDto>,
    },
    WindArea {
        blockid: i64,
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        #[serde(rename = "compass-direction")]
        compass_direction: i64,
        strength: i64,
        #[serde(default)]
        visible: bool,
    },
    Checkpoint {
        blockid: i64,
        x: i64,
        y: i64,
    },
}

impl BlockDto {
    /// Check pattern-constrained fields and convert to a model block.
    pub fn into_block(self) -> Result<Block, LoadError> {
        let block = match self {
            BlockDto::Wall {
                blockid,
                x,
                y,
                width,
                height,
            } => Block::new(
                blockid,
                Position::new(x, y),
                BlockKind::Wall {
                    size: Size::new(width, height),
                },
            ),
            BlockDto::Ladder {
                blockid,
                x,
                y,
                width,
                height,
            } => Block::new(
                blockid,
                Position::new(x, y),
                BlockKind::Ladder {
                    size: Size::new(width, height),
                },
            ),
            BlockDto::DeadlyBlock {
                blockid,
                x,
                y,
                width,
                height,
            } => Block::new(
                blockid,
                Position::new(x, y),
                BlockKind::DeadlyBlock {
                    size: Size::new(width, height),
                },
            ),
            BlockDto::Door {
                blockid,
                x,
                y,
                destination,
                locked,
            } => Block::door(blockid, Position::new(x, y), destination, locked),
            BlockDto::Key {
                blockid,
                x,
                y,
                keyid,
            } => {
                let unlocks = match keyid {
                    KeyIdDto::Number(n) => parse_key_ids(blockid, &n.to_string())?,
                    KeyIdDto::Text(text) => parse_key_ids(blockid, &text)?,
                };
                Block::key(blockid, Position::new(x, y), unlocks)
            }
            BlockDto::EnemyBot {
                blockid,
                x,
                y,
                markers,
            } => Block::new(
                blockid,
                Position::new(x, y),
                BlockKind::EnemyBot {
                    markers: markers
                        .into_iter()
                        .map(|m| Marker {
                            position: Position::new(m.x, m.y),
                        })
                        .collect(),
                },
            ),
            BlockDto::WindArea {
                blockid,
                x,
                y,
                width,
                height,
                compass_direction: raw_direction,
                strength,
                visible,
            } => Block::new(
                blockid,
                Position::new(x, y),
                BlockKind::WindArea {
                    size: Size::new(width, height),
                    direction: compass_direction(blockid, raw_direction)?,
                    strength,
                    visible,
                },
            ),
            BlockDto::Checkpoint { blockid, x, y } => {
                Block::new(blockid, Position::new(x, y), BlockKind::Checkpoint)
            }
        };
        Ok(block)
    }
}

impl MazeDto {
    /// Convert to the plain model tree. Pattern violations reject the whole
    /// level; referential problems are left for the validator.
    pub fn into_maze(self) -> Result<Maze, LoadError> {
        let rooms = self
            .rooms
            .into_iter()
            .map(|room| {
                let blocks = room
                    .blocks
                    .into_iter()
                    .map(BlockDto::into_block)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Room::new(room.roomnumber, blocks))
            })
            .collect::<Result<Vec<_>, LoadError>>()?;

        let characters = self
            .character
            .into_iter()
            .map(|c| Character {
                initial_room: c.initialroom,
                block_id: c.blockid,
                position: c.x.zip(c.y).map(|(x, y)| Position::new(x, y)),
            })
            .collect();

        Ok(Maze {
            total_rooms: self.totalroom,
            rooms,
            characters,
        })
    }
}
