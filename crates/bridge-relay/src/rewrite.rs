//! Arbitration ID rewrite table
//!
//! An immutable mapping from original to replacement arbitration IDs, built
//! once before a run. Lookups are pure and total: an absent ID means
//! passthrough, never an error. The table is applied in the same way to both
//! relay directions.

use std::collections::HashMap;

use crate::error::RuleParseError;
use crate::frame::CanFrame;

/// Immutable arbitration ID rewrite rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteTable {
    rules: HashMap<u32, u32>,
}

impl RewriteTable {
    /// Empty table: every frame passes through unchanged
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from `(original, replacement)` ID pairs.
    /// Later pairs win when an original ID repeats.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, u32)>) -> Self {
        Self {
            rules: pairs.into_iter().collect(),
        }
    }

    /// Parse a table from `(original_hex, replacement_hex)` string pairs.
    ///
    /// Rows where both cells are blank are skipped, so a partially filled
    /// rule editor round-trips cleanly. Any other non-hexadecimal cell fails
    /// with the 1-based row number of the offending entry.
    pub fn parse<S: AsRef<str>>(rows: &[(S, S)]) -> Result<Self, RuleParseError> {
        let mut rules = HashMap::new();
        for (i, (original, replacement)) in rows.iter().enumerate() {
            let original = original.as_ref().trim();
            let replacement = replacement.as_ref().trim();
            if original.is_empty() && replacement.is_empty() {
                continue;
            }

            let original_id = parse_hex_id(original).ok_or(RuleParseError { row: i + 1 })?;
            let replacement_id = parse_hex_id(replacement).ok_or(RuleParseError { row: i + 1 })?;
            rules.insert(original_id, replacement_id);
        }
        Ok(Self { rules })
    }

    /// Replacement ID for `id`, if a rule exists
    pub fn lookup(&self, id: u32) -> Option<u32> {
        self.rules.get(&id).copied()
    }

    /// Produce the frame to relay for `frame`: rewritten when a rule matches,
    /// an identical passthrough copy otherwise. Either way the result carries
    /// a fresh timestamp.
    pub fn apply(&self, frame: &CanFrame) -> CanFrame {
        match self.lookup(frame.arbitration_id()) {
            Some(new_id) => frame.rewritten(new_id),
            None => frame.reborn(),
        }
    }

    /// Number of rules in the table
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table holds no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Parse a hex arbitration ID, tolerating an optional `0x` prefix
fn parse_hex_id(text: &str) -> Option<u32> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_lookup_present_and_absent() {
        let table = RewriteTable::from_pairs([(0x100, 0x200)]);
        assert_eq!(table.lookup(0x100), Some(0x200));
        assert_eq!(table.lookup(0x101), None);
    }

    #[test]
    fn test_apply_rewrites_matching_frame() {
        let table = RewriteTable::from_pairs([(0x100, 0x200)]);
        let frame = CanFrame::new(0x100, &[1, 2, 3]).unwrap();
        let relayed = table.apply(&frame);
        assert_eq!(relayed.arbitration_id(), 0x200);
        assert_eq!(relayed.data(), &[1, 2, 3]);
        assert_eq!(relayed.dlc(), 3);
    }

    #[test]
    fn test_apply_passthrough_refreshes_timestamp_only() {
        let table = RewriteTable::empty();
        let frame = CanFrame::new(0x300, &[9]).unwrap();
        let relayed = table.apply(&frame);
        assert_eq!(relayed.arbitration_id(), 0x300);
        assert_eq!(relayed.data(), frame.data());
        assert!(relayed.timestamp() >= frame.timestamp());
    }

    #[test]
    fn test_parse_valid_rows() {
        let rows = [("100", "200"), ("0x7FF", "0x123")];
        let table = RewriteTable::parse(&rows).unwrap();
        assert_eq!(table.lookup(0x100), Some(0x200));
        assert_eq!(table.lookup(0x7FF), Some(0x123));
    }

    #[test]
    fn test_parse_skips_blank_rows() {
        let rows = [("100", "200"), ("", ""), ("  ", ""), ("300", "400")];
        let table = RewriteTable::parse(&rows).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_parse_reports_offending_row() {
        let rows = [("100", "200"), ("GHI", "300")];
        let err = RewriteTable::parse(&rows).unwrap_err();
        assert_eq!(err.row, 2);

        // A blank cell paired with a filled one is invalid, not skippable
        let rows = [("100", "")];
        assert_eq!(RewriteTable::parse(&rows).unwrap_err().row, 1);
    }

    proptest! {
        #[test]
        fn prop_apply_preserves_payload(id in 0u32..=0x7FF, payload in proptest::collection::vec(any::<u8>(), 0..=8)) {
            let table = RewriteTable::from_pairs([(0x100, 0x200)]);
            let frame = CanFrame::new(id, &payload).unwrap();
            let relayed = table.apply(&frame);
            prop_assert_eq!(relayed.data(), frame.data());
            prop_assert_eq!(relayed.dlc(), frame.dlc());
            prop_assert_eq!(relayed.is_extended(), frame.is_extended());
            if id == 0x100 {
                prop_assert_eq!(relayed.arbitration_id(), 0x200);
            } else {
                prop_assert_eq!(relayed.arbitration_id(), id);
            }
        }
    }
}
