//! Property tests over randomly generated levels.

use mazecheck_core::model::{Block, Character, Maze, Position, Room};
use mazecheck_core::{validate, IssueKind, MapModel, RoomNumber};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// A block before it is placed: `(room, id, is_door, destination, locked, key_targets)`.
type RawBlock = (u32, i64, bool, i64, bool, Vec<i64>);

fn arb_block(rooms: u32) -> impl Strategy<Value = RawBlock> {
    (
        0..rooms,
        0i64..24,
        any::<bool>(),
        // One past the last room so some doors dangle.
        0i64..=rooms as i64,
        any::<bool>(),
        prop::collection::vec(0i64..24, 0..3),
    )
}

fn arb_level() -> impl Strategy<Value = (u32, Vec<RawBlock>)> {
    (1u32..6).prop_flat_map(|rooms| {
        (
            Just(rooms),
            prop::collection::vec(arb_block(rooms), 0..16),
        )
    })
}

fn build(rooms: u32, blocks: &[RawBlock]) -> MapModel {
    let mut by_room: BTreeMap<u32, Vec<Block>> = (0..rooms).map(|n| (n, Vec::new())).collect();
    for (room, id, is_door, destination, locked, targets) in blocks {
        let at = Position::new(*id * 10, 0);
        let block = if *is_door {
            Block::door(*id, at, *destination, *locked)
        } else {
            Block::key(*id, at, targets.clone())
        };
        by_room.entry(*room).or_default().push(block);
    }
    MapModel::new(Maze {
        total_rooms: rooms,
        rooms: by_room
            .into_iter()
            .map(|(number, blocks)| Room::new(number, blocks))
            .collect(),
        characters: vec![Character::starting_in(0)],
    })
    .expect("generated level has a start room")
}

fn last_room(rooms: u32) -> impl Fn(RoomNumber) -> bool {
    move |room| room + 1 == rooms
}

proptest! {
    /// Rooms and held ids only grow, and every pass adds something new
    /// except the last one.
    #[test]
    fn propagation_is_monotonic((rooms, blocks) in arb_level()) {
        let model = build(rooms, &blocks);
        let report = validate(&model, &last_room(rooms)).unwrap();

        let mut reached = BTreeSet::from([model.start_room()]);
        let mut held = BTreeSet::new();
        for pass in &report.passes {
            for room in &pass.rooms_reached {
                prop_assert!(reached.insert(*room), "room {} reached twice", room);
            }
            for id in &pass.newly_held {
                prop_assert!(held.insert(*id), "door {} held twice", id);
            }
        }
        prop_assert_eq!(&reached, &report.reachable_rooms);
        prop_assert_eq!(&held, &report.held_door_ids);

        let (last, earlier) = report.passes.split_last().unwrap();
        prop_assert!(last.rooms_reached.is_empty() && last.newly_held.is_empty());
        for pass in earlier {
            prop_assert!(!pass.rooms_reached.is_empty() || !pass.newly_held.is_empty());
        }
        prop_assert!(report.passes.len() <= rooms as usize + 1);
    }

    /// A locked door is never crossed before a pass in which its id is held.
    #[test]
    fn keys_precede_locked_doors((rooms, blocks) in arb_level()) {
        let model = build(rooms, &blocks);
        let report = validate(&model, &last_room(rooms)).unwrap();

        let mut held_in: BTreeMap<i64, usize> = BTreeMap::new();
        for pass in &report.passes {
            for id in &pass.newly_held {
                held_in.insert(*id, pass.pass);
            }
        }
        for pass in &report.passes {
            for id in &pass.doors_traversed {
                let placed = model.block(*id).unwrap();
                let locked = matches!(
                    placed.block.kind,
                    mazecheck_core::BlockKind::Door { locked: true, .. }
                );
                if locked {
                    let held = held_in.get(id).copied();
                    prop_assert!(held.is_some_and(|p| p <= pass.pass));
                }
            }
        }
    }

    /// Verifying the same model twice gives the same report.
    #[test]
    fn verification_is_idempotent((rooms, blocks) in arb_level()) {
        let model = build(rooms, &blocks);
        let first = validate(&model, &last_room(rooms)).unwrap();
        let second = validate(&model, &last_room(rooms)).unwrap();
        prop_assert_eq!(first.fingerprint(), second.fingerprint());
        prop_assert_eq!(first, second);
    }

    /// Every repeated block id is flagged once per extra declaration, so the
    /// unflagged blocks have pairwise distinct ids.
    #[test]
    fn duplicate_ids_are_flagged((rooms, blocks) in arb_level()) {
        let model = build(rooms, &blocks);
        let report = validate(&model, &last_room(rooms)).unwrap();

        let distinct: BTreeSet<i64> = blocks.iter().map(|b| b.1).collect();
        let flagged = report
            .issues
            .iter()
            .filter(|i| i.kind == IssueKind::DuplicateBlockId)
            .count();
        prop_assert_eq!(flagged, blocks.len() - distinct.len());

        let statused: BTreeSet<i64> = report
            .door_status
            .keys()
            .chain(report.key_status.keys())
            .copied()
            .collect();
        prop_assert_eq!(
            statused.len(),
            report.door_status.len() + report.key_status.len()
        );
    }

    /// Generated levels always cover `0..totalroom`.
    #[test]
    fn generated_rooms_are_contiguous((rooms, blocks) in arb_level()) {
        let model = build(rooms, &blocks);
        let numbers: Vec<RoomNumber> = model.room_numbers().collect();
        prop_assert_eq!(numbers, (0..rooms).collect::<Vec<_>>());
        let report = validate(&model, &last_room(rooms)).unwrap();
        prop_assert!(!report.issues.iter().any(|i| matches!(
            i.kind,
            IssueKind::MissingRoomNumber | IssueKind::TotalRoomMismatch
        )));
    }
}
