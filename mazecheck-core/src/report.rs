//! Report aggregation.
//!
//! Merges structural issues and reachability results into one [`Report`]
//! with a single [`Verdict`].

use crate::model::{BlockId, RoomNumber};
use crate::reachability::{
    DoorStatus, KeyStatus, LockCycle, PassRecord, ReachabilityAnalysis, UnreachableCause,
    UnreachableRoom,
};
use crate::validate::{Issue, PatrolPath, Severity, StructuralAnalysis};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Pass,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// Reachability finding category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FindingKind {
    GoalUnreachable,
    LockCycle,
    UnreachableRoom,
    UnreachableKey,
    UnusedKey,
    GatedDoor,
    UnreachableDoor,
}

impl FindingKind {
    /// Whether a finding of this kind fails the verdict on its own.
    pub fn is_fatal(self) -> bool {
        matches!(self, FindingKind::GoalUnreachable | FindingKind::LockCycle)
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One reachability result worth a human's attention. `subject_id` is a block
/// id or a room number, depending on `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub subject_id: i64,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.subject_id, self.message)
    }
}

/// Verification outcome for one level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub verdict: Verdict,
    pub goal_satisfied: bool,
    /// Warnings were counted against the verdict.
    pub strict: bool,
    pub issues: Vec<Issue>,
    pub findings: Vec<Finding>,
    pub reachable_rooms: BTreeSet<RoomNumber>,
    pub held_door_ids: BTreeSet<BlockId>,
    pub unreachable_rooms: Vec<UnreachableRoom>,
    pub unreachable_keys: Vec<BlockId>,
    pub unused_keys: Vec<BlockId>,
    pub gated_doors: Vec<BlockId>,
    pub lock_cycles: Vec<LockCycle>,
    pub door_status: BTreeMap<BlockId, DoorStatus>,
    pub key_status: BTreeMap<BlockId, KeyStatus>,
    pub patrols: Vec<PatrolPath>,
    pub passes: Vec<PassRecord>,
}

impl Report {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    pub fn error_count(&self) -> usize {
        self.issues.iter().filter(|i| i.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    /// Human-readable reasons for a `Fail` verdict; empty on `Pass`.
    pub fn failure_reasons(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        let errors = self.error_count();
        if errors > 0 {
            reasons.push(format!("{} structural error(s)", errors));
        }
        if self.strict {
            let warnings = self.warning_count();
            if warnings > 0 {
                reasons.push(format!("{} warning(s) in strict mode", warnings));
            }
        }
        if !self.goal_satisfied {
            reasons.push("goal room is not reachable".to_string());
        }
        for cycle in &self.lock_cycles {
            reasons.push(format!(
                "door {} in room {} is opened only by key {} behind it in room {}",
                cycle.door, cycle.door_room, cycle.key, cycle.key_room
            ));
        }
        reasons
    }

    /// SHA-256 hex digest of the report's JSON rendering.
    ///
    /// Every collection in a report is ordered, so equal reports always
    /// produce equal fingerprints.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).expect("report fields always serialize to JSON");
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }
}

/// Combine the validator and analyzer outputs into a report.
pub fn aggregate(
    structure: StructuralAnalysis,
    reach: ReachabilityAnalysis,
    strict: bool,
) -> Report {
    let findings = collect_findings(&reach);

    let structural_failure = structure
        .issues
        .iter()
        .any(|issue| issue.is_error() || (strict && issue.severity == Severity::Warning));
    let fatal_finding = findings.iter().any(|f| f.kind.is_fatal());
    let verdict = if structural_failure || fatal_finding {
        Verdict::Fail
    } else {
        Verdict::Pass
    };

    let report = Report {
        verdict,
        goal_satisfied: reach.goal_satisfied,
        strict,
        issues: structure.issues,
        findings,
        unreachable_keys: reach.keys_with(KeyStatus::Unreachable),
        unused_keys: reach.keys_with(KeyStatus::Unused),
        gated_doors: reach.doors_with(DoorStatus::GatedUnreachable),
        reachable_rooms: reach.reachable_rooms,
        held_door_ids: reach.held,
        unreachable_rooms: reach.unreachable_rooms,
        lock_cycles: reach.lock_cycles,
        door_status: reach.door_status,
        key_status: reach.key_status,
        patrols: structure.patrols,
        passes: reach.passes,
    };

    info!(
        verdict = %report.verdict,
        errors = report.error_count(),
        warnings = report.warning_count(),
        reachable = report.reachable_rooms.len(),
        "verification complete"
    );
    report
}

fn collect_findings(reach: &ReachabilityAnalysis) -> Vec<Finding> {
    let mut findings = Vec::new();

    if !reach.goal_satisfied {
        findings.push(Finding {
            kind: FindingKind::GoalUnreachable,
            subject_id: -1,
            message: format!(
                "no goal room among {} reachable room(s)",
                reach.reachable_rooms.len()
            ),
        });
    }

    for cycle in &reach.lock_cycles {
        findings.push(Finding {
            kind: FindingKind::LockCycle,
            subject_id: cycle.door,
            message: format!(
                "only key {} opens this door and it lies in unreachable room {}",
                cycle.key, cycle.key_room
            ),
        });
    }

    for room in &reach.unreachable_rooms {
        let message = match room.cause {
            UnreachableCause::Gated => "behind a door that never unlocks",
            UnreachableCause::Disconnected => "no door leads here from the start room",
        };
        findings.push(Finding {
            kind: FindingKind::UnreachableRoom,
            subject_id: room.room as i64,
            message: message.to_string(),
        });
    }

    for (&id, status) in &reach.key_status {
        let (kind, message) = match status {
            KeyStatus::Collected => continue,
            KeyStatus::Unreachable => (FindingKind::UnreachableKey, "key is never collected"),
            KeyStatus::Unused => (FindingKind::UnusedKey, "key opens no existing door"),
        };
        findings.push(Finding {
            kind,
            subject_id: id,
            message: message.to_string(),
        });
    }

    for (&id, status) in &reach.door_status {
        let (kind, message) = match status {
            DoorStatus::Open => continue,
            DoorStatus::GatedUnreachable => {
                (FindingKind::GatedDoor, "locked door whose key is never collected")
            }
            DoorStatus::Unreachable => (FindingKind::UnreachableDoor, "door is in an unreachable room"),
        };
        findings.push(Finding {
            kind,
            subject_id: id,
            message: message.to_string(),
        });
    }

    findings
}
