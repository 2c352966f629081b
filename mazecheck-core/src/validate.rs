//! Structural validation.
//!
//! Checks referential and cardinality invariants over a [`MapModel`] and
//! builds the cleaned [`LevelGraph`] the reachability analyzer runs on.
//! Every check runs; one violation never hides another.

use crate::config::LintConfig;
use crate::model::{Block, BlockId, BlockKind, MapModel, Position, RoomNumber, Size};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Missing room numbers are listed one by one up to this many; the
/// `TotalRoomMismatch` issue still covers the rest.
pub const MAX_MISSING_ROOM_ISSUES: usize = 256;

/// Minimum markers for a patrol path.
pub const MIN_PATROL_MARKERS: usize = 2;

// ─── Issues ───────────────────────────────────────────────────

/// Severity level for issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Advisory; fails the verdict only in strict mode.
    Warning,
    /// Structural error; always fails the verdict.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IssueKind {
    DuplicateBlockId,
    DuplicateRoomNumber,
    RoomNumberOutOfRange,
    MissingRoomNumber,
    TotalRoomMismatch,
    DanglingDoorReference,
    DanglingKeyReference,
    KeyTargetNotDoor,
    InsufficientPatrolMarkers,
    KeyTargetsUnlockedDoor,
    LockedDoorWithoutKey,
    SelfLoopDoor,
    OverlappingBlocks,
}

impl IssueKind {
    pub fn severity(self) -> Severity {
        match self {
            IssueKind::DuplicateBlockId
            | IssueKind::DuplicateRoomNumber
            | IssueKind::RoomNumberOutOfRange
            | IssueKind::MissingRoomNumber
            | IssueKind::TotalRoomMismatch
            | IssueKind::DanglingDoorReference
            | IssueKind::DanglingKeyReference
            | IssueKind::KeyTargetNotDoor
            | IssueKind::InsufficientPatrolMarkers => Severity::Error,
            IssueKind::KeyTargetsUnlockedDoor
            | IssueKind::LockedDoorWithoutKey
            | IssueKind::SelfLoopDoor
            | IssueKind::OverlappingBlocks => Severity::Warning,
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One structural finding. `subject_id` is a block id or a room number,
/// depending on `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub subject_id: i64,
    pub message: String,
}

impl Issue {
    pub fn new(kind: IssueKind, subject_id: i64, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            subject_id,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {}",
            self.kind, self.severity, self.subject_id, self.message
        )
    }
}

// ─── Cleaned graph ────────────────────────────────────────────

/// A door as it participates in reachability. `destination` is `None` when
/// the declared room does not exist; such a door has no outgoing edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorEdge {
    pub id: BlockId,
    pub room: RoomNumber,
    pub destination: Option<RoomNumber>,
    pub locked: bool,
}

/// A key with its unlock set reduced to door ids that exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyNode {
    pub id: BlockId,
    pub room: RoomNumber,
    pub unlocks: BTreeSet<BlockId>,
}

/// Patrol route of a bot with enough markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatrolPath {
    pub bot: BlockId,
    pub room: RoomNumber,
    pub waypoints: Vec<Position>,
}

/// Door/key/room graph with duplicates and dangling references removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelGraph {
    start: RoomNumber,
    total_rooms: u32,
    rooms: BTreeSet<RoomNumber>,
    doors: BTreeMap<BlockId, DoorEdge>,
    keys: BTreeMap<BlockId, KeyNode>,
}

impl LevelGraph {
    pub fn start(&self) -> RoomNumber {
        self.start
    }

    pub fn rooms(&self) -> &BTreeSet<RoomNumber> {
        &self.rooms
    }

    pub fn doors(&self) -> impl Iterator<Item = &DoorEdge> {
        self.doors.values()
    }

    pub fn door(&self, id: BlockId) -> Option<&DoorEdge> {
        self.doors.get(&id)
    }

    pub fn keys(&self) -> impl Iterator<Item = &KeyNode> {
        self.keys.values()
    }

    pub fn key(&self, id: BlockId) -> Option<&KeyNode> {
        self.keys.get(&id)
    }

    /// Upper bound on propagation passes for this graph.
    pub fn pass_cap(&self) -> usize {
        (self.total_rooms as usize).max(self.rooms.len()) + 1
    }
}

/// Output of [`validate_structure`].
#[derive(Debug, Clone)]
pub struct StructuralAnalysis {
    /// Sorted by `subject_id`, then `kind`.
    pub issues: Vec<Issue>,
    pub graph: LevelGraph,
    pub patrols: Vec<PatrolPath>,
}

/// Run every structural check over `model`.
pub fn validate_structure(model: &MapModel, lints: &LintConfig) -> StructuralAnalysis {
    let mut issues = Vec::new();

    let blocks = check_block_ids(model, &mut issues);
    check_room_coverage(model, &mut issues);

    let mut doors = BTreeMap::new();
    let mut keys = BTreeMap::new();
    let mut patrols = Vec::new();
    let mut sized: BTreeMap<RoomNumber, Vec<(BlockId, Position, Size)>> = BTreeMap::new();

    for &(room, block) in &blocks {
        match &block.kind {
            BlockKind::Door {
                destination,
                locked,
            } => {
                let resolved = model.resolve_room(*destination);
                if resolved.is_none() {
                    let message = if *destination < 0 {
                        format!(
                            "Door {} in room {} has negative destination {}; exit doors are not rooms and need a goal room instead",
                            block.id, room, destination
                        )
                    } else {
                        format!(
                            "Door {} in room {} leads to room {}, which does not exist",
                            block.id, room, destination
                        )
                    };
                    issues.push(Issue::new(IssueKind::DanglingDoorReference, block.id, message));
                }
                if lints.self_loop_door && resolved == Some(room) {
                    issues.push(Issue::new(
                        IssueKind::SelfLoopDoor,
                        block.id,
                        format!("Door {} leads back into its own room {}", block.id, room),
                    ));
                }
                doors.insert(
                    block.id,
                    DoorEdge {
                        id: block.id,
                        room,
                        destination: resolved,
                        locked: *locked,
                    },
                );
            }
            BlockKind::Key { unlocks } => {
                let unlocks = check_key_targets(model, block.id, unlocks, lints, &mut issues);
                keys.insert(
                    block.id,
                    KeyNode {
                        id: block.id,
                        room,
                        unlocks,
                    },
                );
            }
            BlockKind::EnemyBot { markers } => {
                if markers.len() < MIN_PATROL_MARKERS {
                    issues.push(Issue::new(
                        IssueKind::InsufficientPatrolMarkers,
                        block.id,
                        format!(
                            "EnemyBot {} has {} marker(s), a patrol needs at least {}",
                            block.id,
                            markers.len(),
                            MIN_PATROL_MARKERS
                        ),
                    ));
                } else {
                    patrols.push(PatrolPath {
                        bot: block.id,
                        room,
                        waypoints: markers.iter().map(|m| m.position).collect(),
                    });
                }
            }
            BlockKind::Wall { size }
            | BlockKind::Ladder { size }
            | BlockKind::DeadlyBlock { size }
            | BlockKind::WindArea { size, .. } => {
                sized
                    .entry(room)
                    .or_default()
                    .push((block.id, block.position, *size));
            }
            BlockKind::Checkpoint => {}
        }
    }

    if lints.locked_door_without_key {
        let keyed: BTreeSet<BlockId> = keys.values().flat_map(|k| k.unlocks.iter().copied()).collect();
        for door in doors.values().filter(|d| d.locked && !keyed.contains(&d.id)) {
            issues.push(Issue::new(
                IssueKind::LockedDoorWithoutKey,
                door.id,
                format!("Door {} is locked but no key opens it", door.id),
            ));
        }
    }

    if lints.overlapping_blocks {
        for (room, rects) in &sized {
            check_overlaps(*room, rects, &mut issues);
        }
    }

    issues.sort_by(|a, b| a.subject_id.cmp(&b.subject_id).then(a.kind.cmp(&b.kind)));

    let graph = LevelGraph {
        start: model.start_room(),
        total_rooms: model.total_rooms(),
        rooms: model.room_numbers().collect(),
        doors,
        keys,
    };

    debug!(
        issues = issues.len(),
        doors = graph.doors.len(),
        keys = graph.keys.len(),
        "structural validation complete"
    );

    StructuralAnalysis {
        issues,
        graph,
        patrols,
    }
}

/// Report every non-first declaration of a block id and return the
/// authoritative blocks with their room numbers, in declaration order.
fn check_block_ids<'m>(
    model: &'m MapModel,
    issues: &mut Vec<Issue>,
) -> Vec<(RoomNumber, &'m Block)> {
    let mut authoritative = Vec::new();
    for (location, placed) in model.placed_blocks() {
        let id = placed.block.id;
        if model.is_authoritative(id, location) {
            authoritative.push((placed.room, placed.block));
            continue;
        }
        let first = model.block(id);
        let (first_kind, first_room) = first
            .map(|p| (p.block.kind.name(), p.room))
            .unwrap_or(("?", placed.room));
        issues.push(Issue::new(
            IssueKind::DuplicateBlockId,
            id,
            format!(
                "Duplicate blockid {}: {} in room {} repeats the {} in room {}; the later one is ignored",
                id,
                placed.block.kind.name(),
                placed.room,
                first_kind,
                first_room
            ),
        ));
    }
    authoritative
}

fn check_room_coverage(model: &MapModel, issues: &mut Vec<Issue>) {
    let total = model.total_rooms();

    let mut counts: BTreeMap<RoomNumber, usize> = BTreeMap::new();
    for room in model.rooms() {
        *counts.entry(room.number).or_default() += 1;
    }

    for (&number, &count) in &counts {
        for _ in 1..count {
            issues.push(Issue::new(
                IssueKind::DuplicateRoomNumber,
                number.into(),
                format!("Room number {} is declared more than once", number),
            ));
        }
        if number >= total {
            issues.push(Issue::new(
                IssueKind::RoomNumberOutOfRange,
                number.into(),
                format!(
                    "Room number {} is outside the declared range 0..{}",
                    number, total
                ),
            ));
        }
    }

    let missing = (0..total).filter(|n| !counts.contains_key(n));
    for number in missing.take(MAX_MISSING_ROOM_ISSUES) {
        issues.push(Issue::new(
            IssueKind::MissingRoomNumber,
            number.into(),
            format!("Room number {} is declared by totalroom but missing", number),
        ));
    }

    if counts.len() != total as usize {
        issues.push(Issue::new(
            IssueKind::TotalRoomMismatch,
            total.into(),
            format!(
                "totalroom declares {} rooms but {} distinct room numbers exist",
                total,
                counts.len()
            ),
        ));
    }
}

/// Resolve a key's targets to existing door ids, reporting the rest.
fn check_key_targets(
    model: &MapModel,
    key_id: BlockId,
    targets: &[BlockId],
    lints: &LintConfig,
    issues: &mut Vec<Issue>,
) -> BTreeSet<BlockId> {
    let mut unlocks = BTreeSet::new();
    for &target in targets {
        match model.block(target).map(|p| &p.block.kind) {
            None => issues.push(Issue::new(
                IssueKind::DanglingKeyReference,
                key_id,
                format!("Key {} refers to door {}, which does not exist", key_id, target),
            )),
            Some(BlockKind::Door { locked, .. }) => {
                if lints.key_targets_unlocked_door && !locked {
                    issues.push(Issue::new(
                        IssueKind::KeyTargetsUnlockedDoor,
                        key_id,
                        format!("Key {} refers to door {}, which is not locked", key_id, target),
                    ));
                }
                unlocks.insert(target);
            }
            Some(other) => issues.push(Issue::new(
                IssueKind::KeyTargetNotDoor,
                key_id,
                format!(
                    "Key {} refers to block {}, which is a {} rather than a Door",
                    key_id,
                    target,
                    other.name()
                ),
            )),
        }
    }
    unlocks
}

fn check_overlaps(room: RoomNumber, rects: &[(BlockId, Position, Size)], issues: &mut Vec<Issue>) {
    for (i, &(a_id, a_pos, a_size)) in rects.iter().enumerate() {
        for &(b_id, b_pos, b_size) in &rects[i + 1..] {
            if intersects(a_pos, a_size, b_pos, b_size) {
                issues.push(Issue::new(
                    IssueKind::OverlappingBlocks,
                    b_id,
                    format!("Block {} overlaps block {} in room {}", b_id, a_id, room),
                ));
            }
        }
    }
}

/// Strict rectangle intersection; shared edges do not count. Computed in
/// `i128` so extreme extents cannot overflow.
fn intersects(a_pos: Position, a_size: Size, b_pos: Position, b_size: Size) -> bool {
    let span = |start: i64, len: i64| (i128::from(start), i128::from(start) + i128::from(len));
    let (ax0, ax1) = span(a_pos.x, a_size.width);
    let (bx0, bx1) = span(b_pos.x, b_size.width);
    let (ay0, ay1) = span(a_pos.y, a_size.height);
    let (by0, by1) = span(b_pos.y, b_size.height);
    ax0 < bx1 && bx0 < ax1 && ay0 < by1 && by0 < ay1
}
