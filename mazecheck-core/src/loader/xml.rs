//! Reader for the original XML level format (`map-schema` namespace).
//!
//! ```xml
//! <Maze totalroom="2" xmlns="map-schema">
//!   <Room roomnumber="0">
//!     <Door blockid="1" x="10" y="10" destination="1" locked="false"/>
//!   </Room>
//!   <Room roomnumber="1"/>
//!   <Character blockid="0" x="50" y="50" initialroom="0"/>
//! </Maze>
//! ```
//!
//! Namespaces are ignored; element and attribute names are matched by local
//! name.

use super::dto::{BlockDto, CharacterDto, KeyIdDto, MarkerDto, MazeDto, RoomDto};
use crate::error::{LoadError, MalformedModelError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::str::FromStr;

/// Parse an XML level into a [`MazeDto`].
///
/// More than one `<Character>` is a shape error and is reported as
/// [`MalformedModelError::MultipleCharacters`].
pub fn parse_maze_xml(xml: &str) -> Result<MazeDto, LoadError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut builder = TreeBuilder::default();
    loop {
        match reader.read_event()? {
            Event::Start(e) => builder.open(&e)?,
            Event::Empty(e) => {
                builder.open(&e)?;
                builder.close();
            }
            Event::End(_) => builder.close(),
            Event::Eof => break,
            _ => {}
        }
    }
    builder.finish()
}

/// Elements that may appear directly inside a `<Room>`.
const BLOCK_ELEMENTS: &[&str] = &[
    "Wall",
    "Ladder",
    "DeadlyBlock",
    "Door",
    "Key",
    "EnemyBot",
    "WindArea",
    "Checkpoint",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Maze,
    Room,
    Bot,
    Leaf,
}

impl Frame {
    fn element(self) -> &'static str {
        match self {
            Frame::Maze => "Maze",
            Frame::Room => "Room",
            Frame::Bot => "EnemyBot",
            Frame::Leaf => "leaf element",
        }
    }
}

#[derive(Default)]
struct TreeBuilder {
    total_rooms: Option<u32>,
    rooms: Vec<RoomDto>,
    characters: Vec<CharacterDto>,
    stack: Vec<Frame>,
}

impl TreeBuilder {
    fn open(&mut self, start: &BytesStart<'_>) -> Result<(), LoadError> {
        let attrs = Attrs::read(start)?;
        let parent = self.stack.last().copied();

        let frame = match (parent, attrs.element.as_str()) {
            (None, "Maze") if self.total_rooms.is_none() => {
                self.total_rooms = Some(attrs.int("totalroom")?);
                Frame::Maze
            }
            (Some(Frame::Maze), "Room") => {
                self.rooms.push(RoomDto {
                    roomnumber: attrs.int("roomnumber")?,
                    blocks: Vec::new(),
                });
                Frame::Room
            }
            (Some(Frame::Maze), "Character") => {
                self.characters.push(CharacterDto {
                    initialroom: attrs.int("initialroom")?,
                    blockid: attrs.optional_int("blockid")?,
                    x: attrs.optional_int("x")?,
                    y: attrs.optional_int("y")?,
                });
                Frame::Leaf
            }
            (Some(Frame::Room), element) if BLOCK_ELEMENTS.contains(&element) => {
                let block = read_block(&attrs)?;
                let frame = if matches!(block, BlockDto::EnemyBot { .. }) {
                    Frame::Bot
                } else {
                    Frame::Leaf
                };
                if let Some(room) = self.rooms.last_mut() {
                    room.blocks.push(block);
                }
                frame
            }
            (Some(Frame::Bot), "Marker") => {
                let marker = MarkerDto {
                    x: attrs.int("x")?,
                    y: attrs.int("y")?,
                };
                let bot = self
                    .rooms
                    .last_mut()
                    .and_then(|room| room.blocks.last_mut());
                if let Some(BlockDto::EnemyBot { markers, .. }) = bot {
                    markers.push(marker);
                }
                Frame::Leaf
            }
            (parent, element) => {
                return Err(LoadError::UnexpectedElement {
                    element: element.to_string(),
                    parent: parent.map_or("document", Frame::element).to_string(),
                })
            }
        };

        self.stack.push(frame);
        Ok(())
    }

    fn close(&mut self) {
        self.stack.pop();
    }

    fn finish(mut self) -> Result<MazeDto, LoadError> {
        let totalroom = self.total_rooms.ok_or(LoadError::MissingElement("Maze"))?;
        if self.characters.len() > 1 {
            return Err(MalformedModelError::MultipleCharacters(self.characters.len()).into());
        }
        Ok(MazeDto {
            totalroom,
            rooms: self.rooms,
            character: self.characters.pop(),
        })
    }
}

fn read_block(attrs: &Attrs) -> Result<BlockDto, LoadError> {
    let blockid = attrs.int("blockid")?;
    let x = attrs.int("x")?;
    let y = attrs.int("y")?;

    let block = match attrs.element.as_str() {
        "Wall" => BlockDto::Wall {
            blockid,
            x,
            y,
            width: attrs.int("width")?,
            height: attrs.int("height")?,
        },
        "Ladder" => BlockDto::Ladder {
            blockid,
            x,
            y,
            width: attrs.int("width")?,
            height: attrs.int("height")?,
        },
        "DeadlyBlock" => BlockDto::DeadlyBlock {
            blockid,
            x,
            y,
            width: attrs.int("width")?,
            height: attrs.int("height")?,
        },
        "Door" => BlockDto::Door {
            blockid,
            x,
            y,
            destination: attrs.int("destination")?,
            locked: attrs.boolean("locked")?,
        },
        "Key" => BlockDto::Key {
            blockid,
            x,
            y,
            keyid: KeyIdDto::Text(attrs.text("keyid")?.to_string()),
        },
        "EnemyBot" => BlockDto::EnemyBot {
            blockid,
            x,
            y,
            markers: Vec::new(),
        },
        "WindArea" => BlockDto::WindArea {
            blockid,
            x,
            y,
            width: attrs.int("width")?,
            height: attrs.int("height")?,
            compass_direction: attrs.int("compass-direction")?,
            strength: attrs.int("strength")?,
            visible: attrs.boolean("visible")?,
        },
        "Checkpoint" => BlockDto::Checkpoint { blockid, x, y },
        other => {
            return Err(LoadError::UnexpectedElement {
                element: other.to_string(),
                parent: "Room".to_string(),
            })
        }
    };
    Ok(block)
}

/// Attributes of one element, keyed by local name.
struct Attrs {
    element: String,
    values: HashMap<String, String>,
}

impl Attrs {
    fn read(start: &BytesStart<'_>) -> Result<Self, LoadError> {
        let element = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut values = HashMap::new();
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            values.insert(key, value);
        }
        Ok(Self { element, values })
    }

    fn text(&self, name: &'static str) -> Result<&str, LoadError> {
        self.values
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| LoadError::MissingAttribute {
                element: self.element.clone(),
                attribute: name,
            })
    }

    fn int<T: FromStr>(&self, name: &'static str) -> Result<T, LoadError> {
        let raw = self.text(name)?;
        raw.trim().parse().map_err(|_| self.invalid(name, raw))
    }

    fn optional_int<T: FromStr>(&self, name: &'static str) -> Result<Option<T>, LoadError> {
        match self.values.contains_key(name) {
            true => self.int(name).map(Some),
            false => Ok(None),
        }
    }

    /// `xs:boolean` lexical forms.
    fn boolean(&self, name: &'static str) -> Result<bool, LoadError> {
        match self.text(name)?.trim() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(self.invalid(name, other)),
        }
    }

    fn invalid(&self, name: &'static str, value: &str) -> LoadError {
        LoadError::InvalidAttribute {
            element: self.element.clone(),
            attribute: name,
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_ROOMS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Maze totalroom="2" xmlns="map-schema">
  <Room roomnumber="0">
    <Wall blockid="1" x="0" y="0" width="100" height="10"/>
    <Door blockid="2" x="40" y="20" destination="1" locked="true"/>
    <Key blockid="3" x="60" y="20" keyid="2"/>
    <EnemyBot blockid="4" x="10" y="30">
      <Marker x="10" y="30"/>
      <Marker x="90" y="30"/>
    </EnemyBot>
  </Room>
  <Room roomnumber="1">
    <WindArea blockid="5" x="0" y="0" width="20" height="20" compass-direction="3" strength="2" visible="false"/>
    <Checkpoint blockid="6" x="5" y="5"/>
  </Room>
  <Character blockid="0" x="50" y="50" initialroom="0"/>
</Maze>
"#;

    #[test]
    fn test_basic_xml_parse() {
        let dto = parse_maze_xml(TWO_ROOMS).unwrap();
        assert_eq!(dto.totalroom, 2);
        assert_eq!(dto.rooms.len(), 2);
        assert_eq!(dto.rooms[0].blocks.len(), 4);
        assert_eq!(dto.rooms[1].blocks.len(), 2);
        let character = dto.character.as_ref().unwrap();
        assert_eq!(character.initialroom, 0);
        assert_eq!(character.x, Some(50));
    }

    #[test]
    fn test_markers_attach_to_bot() {
        let dto = parse_maze_xml(TWO_ROOMS).unwrap();
        match &dto.rooms[0].blocks[3] {
            BlockDto::EnemyBot {
                blockid, markers, ..
            } => {
                assert_eq!(*blockid, 4);
                assert_eq!(markers.len(), 2);
                assert_eq!(markers[1].x, 90);
            }
            other => panic!("Expected EnemyBot, got {:?}", other),
        }
    }

    #[test]
    fn test_door_attributes() {
        let dto = parse_maze_xml(TWO_ROOMS).unwrap();
        match &dto.rooms[0].blocks[1] {
            BlockDto::Door {
                destination,
                locked,
                ..
            } => {
                assert_eq!(*destination, 1);
                assert!(*locked);
            }
            other => panic!("Expected Door, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_attribute_fails() {
        let xml = r#"<Maze totalroom="1"><Room roomnumber="0"><Door blockid="1" x="0" y="0" locked="false"/></Room></Maze>"#;
        let err = parse_maze_xml(xml).unwrap_err();
        assert!(
            matches!(
                err,
                LoadError::MissingAttribute {
                    attribute: "destination",
                    ..
                }
            ),
            "got {:?}",
            err
        );
    }

    #[test]
    fn test_unknown_block_fails() {
        let xml = r#"<Maze totalroom="1"><Room roomnumber="0"><Lava blockid="1" x="0" y="0"/></Room></Maze>"#;
        assert!(matches!(
            parse_maze_xml(xml),
            Err(LoadError::UnexpectedElement { .. })
        ));
    }

    #[test]
    fn test_marker_outside_bot_fails() {
        let xml = r#"<Maze totalroom="1"><Room roomnumber="0"><Marker x="0" y="0"/></Room></Maze>"#;
        match parse_maze_xml(xml) {
            Err(LoadError::UnexpectedElement { element, parent }) => {
                assert_eq!(element, "Marker");
                assert_eq!(parent, "Room");
            }
            other => panic!("Expected UnexpectedElement, got {:?}", other),
        }
    }

    #[test]
    fn test_structural_elements_inside_room_fail() {
        for inner in [r#"<Character initialroom="0"/>"#, r#"<Room roomnumber="1"/>"#] {
            let xml = format!(
                r#"<Maze totalroom="1"><Room roomnumber="0">{}</Room></Maze>"#,
                inner
            );
            assert!(
                matches!(
                    parse_maze_xml(&xml),
                    Err(LoadError::UnexpectedElement { ref parent, .. }) if parent == "Room"
                ),
                "accepted {}",
                inner
            );
        }
    }

    #[test]
    fn test_second_maze_fails() {
        let xml = r#"<Maze totalroom="1"/><Maze totalroom="5"/>"#;
        match parse_maze_xml(xml) {
            Err(LoadError::UnexpectedElement { element, parent }) => {
                assert_eq!(element, "Maze");
                assert_eq!(parent, "document");
            }
            other => panic!("Expected UnexpectedElement, got {:?}", other),
        }
    }

    #[test]
    fn test_non_integer_attribute_fails() {
        let xml = r#"<Maze totalroom="two"/>"#;
        assert!(matches!(
            parse_maze_xml(xml),
            Err(LoadError::InvalidAttribute {
                attribute: "totalroom",
                ..
            })
        ));
    }

    #[test]
    fn test_two_characters_fail() {
        let xml = r#"<Maze totalroom="1"><Room roomnumber="0"/>
            <Character initialroom="0"/><Character initialroom="0"/></Maze>"#;
        assert!(matches!(
            parse_maze_xml(xml),
            Err(LoadError::Model(MalformedModelError::MultipleCharacters(2)))
        ));
    }

    #[test]
    fn test_empty_document_fails() {
        assert!(matches!(
            parse_maze_xml(""),
            Err(LoadError::MissingElement("Maze"))
        ));
    }
}
