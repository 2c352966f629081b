//! Pattern-constrained attribute checks.
//!
//! The verifier trusts these fields, so a violation rejects the level before
//! a model exists.

use crate::error::LoadError;
use crate::model::{BlockId, CompassDirection};
use regex::Regex;
use std::sync::LazyLock;

static KEY_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(;[0-9]+)*$").expect("static keyid pattern"));

/// Parse a `keyid` value (`\d+(;\d+)*`) into door ids. Repeated ids keep their
/// first position.
pub fn parse_key_ids(block_id: BlockId, raw: &str) -> Result<Vec<BlockId>, LoadError> {
    let invalid = || LoadError::InvalidKeyId {
        block_id,
        value: raw.to_string(),
    };
    if !KEY_ID_RE.is_match(raw) {
        return Err(invalid());
    }

    let mut ids: Vec<BlockId> = Vec::new();
    for part in raw.split(';') {
        let id: BlockId = part.parse().map_err(|_| invalid())?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Validate `compass-direction` against `[0, 7]`.
pub fn compass_direction(block_id: BlockId, raw: i64) -> Result<CompassDirection, LoadError> {
    u8::try_from(raw)
        .ok()
        .and_then(CompassDirection::new)
        .ok_or(LoadError::CompassOutOfRange {
            block_id,
            value: raw,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_and_multiple_ids() {
        assert_eq!(parse_key_ids(1, "7").unwrap(), vec![7]);
        assert_eq!(parse_key_ids(1, "7;3;12").unwrap(), vec![7, 3, 12]);
    }

    #[test]
    fn repeated_ids_collapse() {
        assert_eq!(parse_key_ids(1, "4;4;2;4").unwrap(), vec![4, 2]);
    }

    #[test]
    fn malformed_keyid_rejected() {
        for raw in ["", ";", "1;", ";1", "1;;2", "-1", "1,2", " 1", "a"] {
            assert!(
                parse_key_ids(1, raw).is_err(),
                "expected '{}' to be rejected",
                raw
            );
        }
    }

    #[test]
    fn oversized_id_rejected() {
        assert!(parse_key_ids(1, "99999999999999999999999").is_err());
    }

    #[test]
    fn compass_bounds() {
        assert_eq!(compass_direction(1, 0).unwrap().value(), 0);
        assert_eq!(compass_direction(1, 7).unwrap().value(), 7);
        assert!(compass_direction(1, 8).is_err());
        assert!(compass_direction(1, -1).is_err());
    }
}
