//! Reachability analysis by fixed-point propagation.
//!
//! Starting from the character's room, each pass first collects every key
//! lying in a reachable room, then crosses every door of a reachable room
//! that is unlocked or whose id is held. Passes repeat until one adds neither
//! a room nor a held door id.
//!
//! Doors are directed: a door only leads from the room that declares it to
//! its destination. Hazards play no part; the question answered is whether a
//! room can be entered at all, not whether it can be survived.

use crate::error::VerifyError;
use crate::goal::GoalPredicate;
use crate::model::{BlockId, RoomNumber};
use crate::validate::{DoorEdge, KeyNode, LevelGraph};
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DoorStatus {
    /// In a reachable room and unlocked, or unlocked by a collected key.
    Open,
    /// In a reachable room but locked, and its key is never collected.
    GatedUnreachable,
    /// Its room is never reached.
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyStatus {
    Collected,
    Unreachable,
    /// Collected, but opens no existing door.
    Unused,
}

/// Why a room is never reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnreachableCause {
    /// A door path from the start exists, but a lock on it never opens.
    Gated,
    /// No door path from the start exists even with every lock open.
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreachableRoom {
    pub room: RoomNumber,
    pub cause: UnreachableCause,
}

/// A key stranded outside the reachable area that would open a locked door
/// on its frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockCycle {
    pub door: BlockId,
    pub door_room: RoomNumber,
    pub key: BlockId,
    pub key_room: RoomNumber,
}

/// What one propagation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassRecord {
    pub pass: usize,
    pub keys_collected: Vec<BlockId>,
    pub newly_held: Vec<BlockId>,
    pub doors_traversed: Vec<BlockId>,
    pub rooms_reached: Vec<RoomNumber>,
}

impl PassRecord {
    fn productive(&self) -> bool {
        !self.rooms_reached.is_empty() || !self.newly_held.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachabilityAnalysis {
    pub reachable_rooms: BTreeSet<RoomNumber>,
    /// Door ids unlocked by collected keys.
    pub held: BTreeSet<BlockId>,
    pub collected_keys: BTreeSet<BlockId>,
    pub door_status: BTreeMap<BlockId, DoorStatus>,
    pub key_status: BTreeMap<BlockId, KeyStatus>,
    pub unreachable_rooms: Vec<UnreachableRoom>,
    pub lock_cycles: Vec<LockCycle>,
    pub goal_satisfied: bool,
    /// One record per pass, the last being the pass that changed nothing.
    pub passes: Vec<PassRecord>,
}

impl ReachabilityAnalysis {
    pub fn doors_with(&self, status: DoorStatus) -> Vec<BlockId> {
        self.door_status
            .iter()
            .filter(|(_, s)| **s == status)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn keys_with(&self, status: KeyStatus) -> Vec<BlockId> {
        self.key_status
            .iter()
            .filter(|(_, s)| **s == status)
            .map(|(id, _)| *id)
            .collect()
    }
}

/// Propagate reachability over `graph` and classify every door, key and room.
///
/// Fails only if the fixed point is not reached within
/// [`LevelGraph::pass_cap`] passes, which indicates a defect in the analyzer.
pub fn analyze<G>(graph: &LevelGraph, goal: &G) -> Result<ReachabilityAnalysis, VerifyError>
where
    G: GoalPredicate + ?Sized,
{
    propagate(graph, goal, graph.pass_cap())
}

fn propagate<G>(
    graph: &LevelGraph,
    goal: &G,
    cap: usize,
) -> Result<ReachabilityAnalysis, VerifyError>
where
    G: GoalPredicate + ?Sized,
{
    let mut doors_by_room: BTreeMap<RoomNumber, Vec<&DoorEdge>> = BTreeMap::new();
    for door in graph.doors() {
        doors_by_room.entry(door.room).or_default().push(door);
    }
    let mut keys_by_room: BTreeMap<RoomNumber, Vec<&KeyNode>> = BTreeMap::new();
    for key in graph.keys() {
        keys_by_room.entry(key.room).or_default().push(key);
    }

    let mut reachable = BTreeSet::from([graph.start()]);
    let mut held = BTreeSet::new();
    let mut collected = BTreeSet::new();
    let mut traversed = BTreeSet::new();
    let mut passes = Vec::new();
    let mut stable = false;

    for pass in 1..=cap {
        let mut record = PassRecord {
            pass,
            ..Default::default()
        };

        // (a) pick up keys
        for room in &reachable {
            for key in keys_by_room.get(room).into_iter().flatten() {
                if !collected.insert(key.id) {
                    continue;
                }
                record.keys_collected.push(key.id);
                for &door in &key.unlocks {
                    if held.insert(door) {
                        record.newly_held.push(door);
                    }
                }
            }
        }

        // (b) cross doors of rooms reachable at the start of this step
        let frontier: Vec<RoomNumber> = reachable.iter().copied().collect();
        for room in frontier {
            for door in doors_by_room.get(&room).into_iter().flatten() {
                let Some(destination) = door.destination else {
                    continue;
                };
                if door.locked && !held.contains(&door.id) {
                    continue;
                }
                if traversed.insert(door.id) {
                    record.doors_traversed.push(door.id);
                }
                if reachable.insert(destination) {
                    record.rooms_reached.push(destination);
                }
            }
        }

        debug!(
            pass,
            keys = record.keys_collected.len(),
            held = record.newly_held.len(),
            rooms = record.rooms_reached.len(),
            "propagation pass"
        );

        let productive = record.productive();
        passes.push(record);
        if !productive {
            stable = true;
            break;
        }
    }

    if !stable {
        warn!(cap, "reachability did not reach a fixed point");
        return Err(VerifyError::InternalInvariant { cap });
    }

    let door_status = graph
        .doors()
        .map(|door| {
            let status = if !reachable.contains(&door.room) {
                DoorStatus::Unreachable
            } else if !door.locked || held.contains(&door.id) {
                DoorStatus::Open
            } else {
                DoorStatus::GatedUnreachable
            };
            (door.id, status)
        })
        .collect();

    let key_status = graph
        .keys()
        .map(|key| {
            let status = if !collected.contains(&key.id) {
                KeyStatus::Unreachable
            } else if key.unlocks.is_empty() {
                KeyStatus::Unused
            } else {
                KeyStatus::Collected
            };
            (key.id, status)
        })
        .collect();

    let unreachable_rooms = classify_unreachable(graph, &reachable);
    let lock_cycles = find_lock_cycles(graph, &reachable, &held);
    let goal_satisfied = reachable.iter().any(|&room| goal.is_goal(room));

    Ok(ReachabilityAnalysis {
        reachable_rooms: reachable,
        held,
        collected_keys: collected,
        door_status,
        key_status,
        unreachable_rooms,
        lock_cycles,
        goal_satisfied,
        passes,
    })
}

/// Split unreachable rooms into those cut off by a lock and those with no
/// door path at all.
fn classify_unreachable(
    graph: &LevelGraph,
    reachable: &BTreeSet<RoomNumber>,
) -> Vec<UnreachableRoom> {
    let mut topology: DiGraphMap<RoomNumber, ()> = DiGraphMap::new();
    for &room in graph.rooms() {
        topology.add_node(room);
    }
    for door in graph.doors() {
        if let Some(destination) = door.destination {
            topology.add_edge(door.room, destination, ());
        }
    }

    let mut connected = BTreeSet::new();
    let mut dfs = Dfs::new(&topology, graph.start());
    while let Some(room) = dfs.next(&topology) {
        connected.insert(room);
    }

    graph
        .rooms()
        .iter()
        .filter(|room| !reachable.contains(room))
        .map(|&room| UnreachableRoom {
            room,
            cause: if connected.contains(&room) {
                UnreachableCause::Gated
            } else {
                UnreachableCause::Disconnected
            },
        })
        .collect()
}

/// Keys in unreachable rooms that target a locked, unheld door of a
/// reachable room.
fn find_lock_cycles(
    graph: &LevelGraph,
    reachable: &BTreeSet<RoomNumber>,
    held: &BTreeSet<BlockId>,
) -> Vec<LockCycle> {
    let mut cycles = Vec::new();
    for key in graph.keys().filter(|k| !reachable.contains(&k.room)) {
        for door in key.unlocks.iter().filter_map(|&id| graph.door(id)) {
            let on_frontier = reachable.contains(&door.room)
                && door.locked
                && !held.contains(&door.id)
                && door.destination.is_some();
            if on_frontier {
                cycles.push(LockCycle {
                    door: door.id,
                    door_room: door.room,
                    key: key.id,
                    key_room: key.room,
                });
            }
        }
    }
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LintConfig;
    use crate::model::{Block, Character, MapModel, Maze, Position, Room};
    use crate::validate::validate_structure;

    fn at() -> Position {
        Position::new(0, 0)
    }

    fn graph(total_rooms: u32, rooms: Vec<Room>) -> LevelGraph {
        let model = MapModel::new(Maze {
            total_rooms,
            rooms,
            characters: vec![Character::starting_in(0)],
        })
        .unwrap();
        validate_structure(&model, &LintConfig::default()).graph
    }

    fn never(_: RoomNumber) -> bool {
        false
    }

    #[test]
    fn open_door_reaches_next_room() {
        let g = graph(
            2,
            vec![
                Room::new(0, vec![Block::door(1, at(), 1, false)]),
                Room::new(1, vec![]),
            ],
        );
        let result = analyze(&g, &|room: RoomNumber| room == 1).unwrap();
        assert_eq!(result.reachable_rooms, BTreeSet::from([0, 1]));
        assert!(result.goal_satisfied);
        assert_eq!(result.door_status[&1], DoorStatus::Open);
        assert!(result.unreachable_rooms.is_empty());
    }

    #[test]
    fn key_opens_door_in_same_pass() {
        let g = graph(
            2,
            vec![
                Room::new(
                    0,
                    vec![
                        Block::door(1, at(), 1, true),
                        Block::key(2, at(), vec![1]),
                    ],
                ),
                Room::new(1, vec![]),
            ],
        );
        let result = analyze(&g, &never).unwrap();
        assert_eq!(result.reachable_rooms, BTreeSet::from([0, 1]));
        assert_eq!(result.passes[0].keys_collected, vec![2]);
        assert_eq!(result.passes[0].rooms_reached, vec![1]);
        assert_eq!(result.key_status[&2], KeyStatus::Collected);
        assert!(!result.goal_satisfied);
    }

    #[test]
    fn chained_keys_take_several_passes() {
        // 0 -(open)-> 1 holds key for door 20 in 0 -> 2 holds key for door 30 in 1 -> 3
        let g = graph(
            4,
            vec![
                Room::new(
                    0,
                    vec![
                        Block::door(10, at(), 1, false),
                        Block::door(20, at(), 2, true),
                    ],
                ),
                Room::new(
                    1,
                    vec![
                        Block::key(11, at(), vec![20]),
                        Block::door(30, at(), 3, true),
                    ],
                ),
                Room::new(2, vec![Block::key(21, at(), vec![30])]),
                Room::new(3, vec![]),
            ],
        );
        let result = analyze(&g, &|room: RoomNumber| room == 3).unwrap();
        assert_eq!(result.reachable_rooms, BTreeSet::from([0, 1, 2, 3]));
        assert!(result.goal_satisfied);
        assert_eq!(result.held, BTreeSet::from([20, 30]));
        assert!(result.passes.len() <= g.pass_cap());
        assert!(!result.passes.last().unwrap().productive());
    }

    #[test]
    fn lock_cycle_detected() {
        let g = graph(
            2,
            vec![
                Room::new(0, vec![Block::door(1, at(), 1, true)]),
                Room::new(1, vec![Block::key(2, at(), vec![1])]),
            ],
        );
        let result = analyze(&g, &never).unwrap();
        assert_eq!(result.reachable_rooms, BTreeSet::from([0]));
        assert_eq!(result.door_status[&1], DoorStatus::GatedUnreachable);
        assert_eq!(result.key_status[&2], KeyStatus::Unreachable);
        assert_eq!(
            result.lock_cycles,
            vec![LockCycle {
                door: 1,
                door_room: 0,
                key: 2,
                key_room: 1
            }]
        );
        assert_eq!(
            result.unreachable_rooms,
            vec![UnreachableRoom {
                room: 1,
                cause: UnreachableCause::Gated
            }]
        );
    }

    #[test]
    fn doors_are_one_way() {
        // Door only from 1 back to 0; nothing leads into 1.
        let g = graph(
            2,
            vec![
                Room::new(0, vec![]),
                Room::new(1, vec![Block::door(5, at(), 0, false)]),
            ],
        );
        let result = analyze(&g, &never).unwrap();
        assert_eq!(result.reachable_rooms, BTreeSet::from([0]));
        assert_eq!(result.door_status[&5], DoorStatus::Unreachable);
        assert_eq!(
            result.unreachable_rooms[0].cause,
            UnreachableCause::Disconnected
        );
    }

    #[test]
    fn key_with_only_dangling_targets_is_unused() {
        let g = graph(1, vec![Room::new(0, vec![Block::key(3, at(), vec![99])])]);
        let result = analyze(&g, &never).unwrap();
        assert_eq!(result.key_status[&3], KeyStatus::Unused);
        assert_eq!(result.keys_with(KeyStatus::Unused), vec![3]);
    }

    #[test]
    fn dangling_door_contributes_no_edge() {
        let g = graph(
            2,
            vec![
                Room::new(0, vec![Block::door(1, at(), 99, false)]),
                Room::new(1, vec![]),
            ],
        );
        let result = analyze(&g, &never).unwrap();
        assert_eq!(result.reachable_rooms, BTreeSet::from([0]));
        assert!(result.passes[0].doors_traversed.is_empty());
    }

    #[test]
    fn exceeding_pass_cap_is_internal_error() {
        let g = graph(
            3,
            vec![
                Room::new(0, vec![Block::door(1, at(), 1, false)]),
                Room::new(1, vec![Block::door(2, at(), 2, false)]),
                Room::new(2, vec![]),
            ],
        );
        let err = propagate(&g, &never, 1).unwrap_err();
        assert_eq!(err, VerifyError::InternalInvariant { cap: 1 });
        assert!(propagate(&g, &never, g.pass_cap()).is_ok());
    }
}
