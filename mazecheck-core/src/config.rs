//! Verifier configuration.

use crate::error::ConfigError;
use crate::goal::GoalSpec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for one verification run.
///
/// ```yaml
/// goal:
///   any_of: [3, 4]
/// strict: false
/// lints:
///   overlapping_blocks: false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Goal used when the caller supplies none.
    pub goal: Option<GoalSpec>,
    /// Treat warning-severity issues as verdict failures.
    pub strict: bool,
    /// Advisory structural checks.
    pub lints: LintConfig,
}

/// Toggles for the warning-severity structural checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    pub key_targets_unlocked_door: bool,
    pub locked_door_without_key: bool,
    pub self_loop_door: bool,
    pub overlapping_blocks: bool,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            key_targets_unlocked_door: true,
            locked_door_without_key: true,
            self_loop_door: true,
            overlapping_blocks: true,
        }
    }
}

impl LintConfig {
    /// Every advisory check disabled.
    pub fn none() -> Self {
        Self {
            key_targets_unlocked_door: false,
            locked_door_without_key: false,
            self_loop_door: false,
            overlapping_blocks: false,
        }
    }
}

impl VerifierConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Builder: set the default goal.
    pub fn with_goal(mut self, goal: GoalSpec) -> Self {
        self.goal = Some(goal);
        self
    }

    /// Builder: fail on warnings too.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::io::Write;

    #[test]
    fn default_config() {
        let config = VerifierConfig::default();
        assert!(config.goal.is_none());
        assert!(!config.strict);
        assert!(config.lints.overlapping_blocks);
        assert!(config.lints.locked_door_without_key);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = VerifierConfig::from_yaml_str(
            r#"
goal:
  any_of: [3, 4]
lints:
  overlapping_blocks: false
"#,
        )
        .unwrap();
        assert_eq!(config.goal, Some(GoalSpec::AnyOf(BTreeSet::from([3, 4]))));
        assert!(!config.lints.overlapping_blocks);
        assert!(config.lints.self_loop_door);
        assert!(!config.strict);
    }

    #[test]
    fn empty_yaml_is_default() {
        let config = VerifierConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, VerifierConfig::default());
    }

    #[test]
    fn unknown_goal_form_rejected() {
        assert!(VerifierConfig::from_yaml_str("goal: { exit: 1 }").is_err());
    }

    #[test]
    fn from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "strict: true").unwrap();
        let config = VerifierConfig::from_path(file.path()).unwrap();
        assert!(config.strict);

        let err = VerifierConfig::from_path(Path::new("/nonexistent/mazecheck.yaml"));
        assert!(matches!(err, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn builders() {
        let config = VerifierConfig::default()
            .with_goal(GoalSpec::Room(2))
            .strict(true);
        assert_eq!(config.goal, Some(GoalSpec::Room(2)));
        assert!(config.strict);
        assert!(!LintConfig::none().self_loop_door);
    }
}
