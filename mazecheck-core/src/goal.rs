//! Goal predicates.
//!
//! The level schema has no exit marker, so the caller decides what counts as
//! solved. Any `Fn(RoomNumber) -> bool` works; [`GoalSpec`] is the
//! serializable form used by configuration files and the CLI.

use crate::model::{MapModel, RoomNumber};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Decides whether reaching `room` solves the level.
pub trait GoalPredicate {
    fn is_goal(&self, room: RoomNumber) -> bool;
}

impl<F> GoalPredicate for F
where
    F: Fn(RoomNumber) -> bool,
{
    fn is_goal(&self, room: RoomNumber) -> bool {
        self(room)
    }
}

/// Declarative goal, resolved against a model before use.
///
/// Written as `room: 3`, `any_of: [3, 4]` or `highest_room`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "GoalSpecDto", into = "GoalSpecDto")]
pub enum GoalSpec {
    /// Reach this room.
    Room(RoomNumber),
    /// Reach any of these rooms.
    AnyOf(BTreeSet<RoomNumber>),
    /// Reach the highest-numbered room of the level. Explicit opt-in only.
    HighestRoom,
}

/// Map-shaped serialized form of [`GoalSpec`]. serde_yaml expects `!tag`
/// syntax for externally tagged enums, so the variants are spelled out as
/// single-key maps and a bare name.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum GoalSpecDto {
    Named(GoalName),
    Room { room: RoomNumber },
    AnyOf { any_of: BTreeSet<RoomNumber> },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum GoalName {
    HighestRoom,
}

impl From<GoalSpecDto> for GoalSpec {
    fn from(dto: GoalSpecDto) -> Self {
        match dto {
            GoalSpecDto::Named(GoalName::HighestRoom) => GoalSpec::HighestRoom,
            GoalSpecDto::Room { room } => GoalSpec::Room(room),
            GoalSpecDto::AnyOf { any_of } => GoalSpec::AnyOf(any_of),
        }
    }
}

impl From<GoalSpec> for GoalSpecDto {
    fn from(goal: GoalSpec) -> Self {
        match goal {
            GoalSpec::HighestRoom => GoalSpecDto::Named(GoalName::HighestRoom),
            GoalSpec::Room(room) => GoalSpecDto::Room { room },
            GoalSpec::AnyOf(any_of) => GoalSpecDto::AnyOf { any_of },
        }
    }
}

impl GoalSpec {
    pub fn resolve(&self, model: &MapModel) -> GoalRooms {
        let rooms = match self {
            GoalSpec::Room(room) => BTreeSet::from([*room]),
            GoalSpec::AnyOf(rooms) => rooms.clone(),
            GoalSpec::HighestRoom => model.room_numbers().max().into_iter().collect(),
        };
        GoalRooms(rooms)
    }
}

impl fmt::Display for GoalSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalSpec::Room(room) => write!(f, "room {}", room),
            GoalSpec::AnyOf(rooms) => write!(f, "any of rooms {:?}", rooms),
            GoalSpec::HighestRoom => write!(f, "highest room"),
        }
    }
}

/// A resolved set of goal rooms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalRooms(pub BTreeSet<RoomNumber>);

impl GoalPredicate for GoalRooms {
    fn is_goal(&self, room: RoomNumber) -> bool {
        self.0.contains(&room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Character, Maze, Room};

    fn model_with_rooms(numbers: &[RoomNumber]) -> MapModel {
        MapModel::new(Maze {
            total_rooms: numbers.len() as u32,
            rooms: numbers.iter().map(|&n| Room::new(n, vec![])).collect(),
            characters: vec![Character::starting_in(numbers[0] as i64)],
        })
        .unwrap()
    }

    #[test]
    fn closures_are_predicates() {
        let goal = |room: RoomNumber| room == 3;
        assert!(goal.is_goal(3));
        assert!(!goal.is_goal(2));
    }

    #[test]
    fn highest_room_resolves_against_model() {
        let model = model_with_rooms(&[0, 4, 2]);
        let goal = GoalSpec::HighestRoom.resolve(&model);
        assert!(goal.is_goal(4));
        assert!(!goal.is_goal(2));
    }

    #[test]
    fn any_of_resolves_verbatim() {
        let model = model_with_rooms(&[0, 1]);
        let goal = GoalSpec::AnyOf(BTreeSet::from([1, 7])).resolve(&model);
        assert!(goal.is_goal(7));
        assert!(goal.is_goal(1));
        assert!(!goal.is_goal(0));
    }

    #[test]
    fn goal_spec_yaml_forms() {
        let spec: GoalSpec = serde_yaml::from_str("room: 3").unwrap();
        assert_eq!(spec, GoalSpec::Room(3));
        let spec: GoalSpec = serde_yaml::from_str("any_of: [1, 2]").unwrap();
        assert_eq!(spec, GoalSpec::AnyOf(BTreeSet::from([1, 2])));
        let spec: GoalSpec = serde_yaml::from_str("highest_room").unwrap();
        assert_eq!(spec, GoalSpec::HighestRoom);
        let spec: GoalSpec = serde_yaml::from_str("{ any_of: [3, 4] }").unwrap();
        assert_eq!(spec, GoalSpec::AnyOf(BTreeSet::from([3, 4])));
    }

    #[test]
    fn goal_spec_rejects_unknown_forms() {
        assert!(serde_yaml::from_str::<GoalSpec>("exit: 1").is_err());
        assert!(serde_yaml::from_str::<GoalSpec>("lowest_room").is_err());
    }

    #[test]
    fn goal_spec_writes_map_forms() {
        let yaml = serde_yaml::to_string(&GoalSpec::Room(3)).unwrap();
        assert_eq!(yaml.trim(), "room: 3");
        let json = serde_json::to_string(&GoalSpec::AnyOf(BTreeSet::from([1, 2]))).unwrap();
        assert_eq!(json, r#"{"any_of":[1,2]}"#);
        let json = serde_json::to_string(&GoalSpec::HighestRoom).unwrap();
        assert_eq!(json, r#""highest_room""#);
    }
}
