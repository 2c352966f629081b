//! Maze level integrity and solvability verifier.
//!
//! Checks that a level is internally consistent and that the goal can be
//! reached from the character's starting room, taking locked doors and the
//! keys that open them into account.
//!
//! # Architecture
//!
//! ```text
//! level file (.xml / .yaml / .json)
//!       │
//!       ▼
//! ┌─────────────────────────────────────────┐
//! │  loader                                 │
//! │  syntax + keyid / compass patterns      │
//! │  → MapModel (indexed, read-only)        │
//! └─────────────────────────────────────────┘
//!       │
//!       ▼
//! ┌─────────────────────────────────────────┐
//! │  validate                               │
//! │  duplicate ids, room coverage,          │
//! │  dangling refs, patrols, lints          │
//! │  → Issues + cleaned LevelGraph          │
//! └─────────────────────────────────────────┘
//!       │
//!       ▼
//! ┌─────────────────────────────────────────┐
//! │  reachability                           │
//! │  fixed point over keys and doors        │
//! │  → statuses, lock cycles, goal          │
//! └─────────────────────────────────────────┘
//!       │
//!       ▼
//! ┌─────────────────────────────────────────┐
//! │  report                                 │
//! │  → Report { verdict, ... }              │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Verification is pure: once a [`MapModel`] exists, nothing here touches the
//! filesystem.

pub mod config;
pub mod error;
pub mod goal;
pub mod loader;
pub mod model;
pub mod reachability;
pub mod report;
pub mod validate;

pub use config::{LintConfig, VerifierConfig};
pub use error::{ConfigError, LoadError, MalformedModelError, VerifyError};
pub use goal::{GoalPredicate, GoalRooms, GoalSpec};
pub use loader::{load_path, load_str, LevelFormat};
pub use model::{Block, BlockId, BlockKind, MapModel, Maze, RoomNumber};
pub use reachability::{DoorStatus, KeyStatus, LockCycle, UnreachableCause, UnreachableRoom};
pub use report::{Finding, FindingKind, Report, Verdict};
pub use validate::{Issue, IssueKind, Severity};

/// Verify `model` against `goal` with the default configuration.
pub fn validate<G>(model: &MapModel, goal: &G) -> Result<Report, VerifyError>
where
    G: GoalPredicate + ?Sized,
{
    validate_with_config(model, goal, &VerifierConfig::default())
}

/// Verify `model` against `goal`.
///
/// `config.goal` is not consulted here; callers that want it resolve it with
/// [`GoalSpec::resolve`] and pass the result as `goal`.
pub fn validate_with_config<G>(
    model: &MapModel,
    goal: &G,
    config: &VerifierConfig,
) -> Result<Report, VerifyError>
where
    G: GoalPredicate + ?Sized,
{
    let structure = validate::validate_structure(model, &config.lints);
    let reach = reachability::analyze(&structure.graph, goal)?;
    Ok(report::aggregate(structure, reach, config.strict))
}
