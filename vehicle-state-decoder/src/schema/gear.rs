//! Raw gear code to gear label table

use crate::signals::SignalDatabase;
use crate::types::{DecoderError, GearShifter, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `code = label` row of a gear table as written in a schema file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GearEntry {
    pub code: i64,
    pub label: String,
}

impl GearEntry {
    pub fn new(code: i64, label: impl Into<String>) -> Self {
        Self {
            code,
            label: label.into(),
        }
    }
}

/// Mapping from raw transmission gear code to gear label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GearTable {
    labels: BTreeMap<i64, String>,
}

impl GearTable {
    pub fn new(labels: BTreeMap<i64, String>) -> Self {
        Self { labels }
    }

    pub fn from_entries(entries: &[GearEntry]) -> Self {
        Self {
            labels: entries
                .iter()
                .map(|entry| (entry.code, entry.label.clone()))
                .collect(),
        }
    }

    /// Build a table from a DBC value description, e.g. `Transmission.Gear`
    pub fn from_database(db: &SignalDatabase, message: &str, signal: &str) -> Result<Self> {
        db.value_table(message, signal)
            .cloned()
            .map(Self::new)
            .ok_or_else(|| {
                DecoderError::SignalNotFound(format!(
                    "{}.{} has no value descriptions",
                    message, signal
                ))
            })
    }

    /// Label for a raw code, if the table has one
    pub fn label(&self, code: i64) -> Option<&str> {
        self.labels.get(&code).map(String::as_str)
    }

    /// Resolve a raw code; unknown codes map to [`GearShifter::Unknown`]
    pub fn lookup(&self, code: i64) -> GearShifter {
        GearShifter::from_label(self.label(code))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn entries(&self) -> Vec<GearEntry> {
        self.labels
            .iter()
            .map(|(code, label)| GearEntry::new(*code, label.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::dbc::{parse_dbc_str, tests::TEST_DBC};

    fn table() -> GearTable {
        GearTable::from_entries(&[
            GearEntry::new(0, "N"),
            GearEntry::new(1, "D"),
            GearEntry::new(14, "R"),
            GearEntry::new(15, "P"),
        ])
    }

    #[test]
    fn test_known_codes() {
        let gears = table();
        assert_eq!(gears.lookup(0), GearShifter::Neutral);
        assert_eq!(gears.lookup(1), GearShifter::Drive);
        assert_eq!(gears.lookup(14), GearShifter::Reverse);
        assert_eq!(gears.lookup(15), GearShifter::Park);
    }

    #[test]
    fn test_unknown_codes_degrade() {
        let gears = table();
        assert_eq!(gears.lookup(7), GearShifter::Unknown);
        assert_eq!(gears.lookup(-1), GearShifter::Unknown);
        assert_eq!(GearTable::default().lookup(0), GearShifter::Unknown);
    }

    #[test]
    fn test_unmapped_label_degrades() {
        let gears = GearTable::from_entries(&[GearEntry::new(3, "Limp")]);
        assert_eq!(gears.label(3), Some("Limp"));
        assert_eq!(gears.lookup(3), GearShifter::Unknown);
    }

    #[test]
    fn test_from_database() {
        let db = parse_dbc_str(TEST_DBC, "test.dbc").unwrap();
        let gears = GearTable::from_database(&db, "Transmission", "Gear").unwrap();
        assert_eq!(gears.len(), 9);
        assert_eq!(gears.lookup(15), GearShifter::Park);

        assert!(GearTable::from_database(&db, "Brake_Pedal", "Brake_Pedal").is_err());
    }

    #[test]
    fn test_entries_round_trip() {
        let gears = table();
        assert_eq!(GearTable::from_entries(&gears.entries()), gears);
    }
}
