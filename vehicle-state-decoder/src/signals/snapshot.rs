//! Read-only view of one bus's latest signal values

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All signal values of one message, keyed by signal name
pub type RawMessage = BTreeMap<String, f64>;

/// Source of decoded signal values for one bus
///
/// Implementors pre-populate defaults for the signals they carry; `value`
/// reads anything else as `0.0` rather than failing.
pub trait SignalSource {
    /// Latest value of `message.signal`, `None` if this source does not carry it
    fn get(&self, message: &str, signal: &str) -> Option<f64>;

    /// Latest value of `message.signal`, zero if not carried
    fn value(&self, message: &str, signal: &str) -> f64 {
        self.get(message, signal).unwrap_or(0.0)
    }

    /// Latest values of every signal in `message`, if the message is known
    fn message(&self, message: &str) -> Option<RawMessage>;
}

/// Owned `(message, signal) -> value` mapping for one bus and one cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalSnapshot {
    messages: BTreeMap<String, RawMessage>,
}

impl SignalSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single signal value
    pub fn set(&mut self, message: &str, signal: &str, value: f64) {
        self.messages
            .entry(message.to_string())
            .or_default()
            .insert(signal.to_string(), value);
    }

    /// Builder method: set a single signal value
    pub fn with(mut self, message: &str, signal: &str, value: f64) -> Self {
        self.set(message, signal, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Names of all messages present in the snapshot
    pub fn message_names(&self) -> impl Iterator<Item = &str> {
        self.messages.keys().map(String::as_str)
    }
}

impl SignalSource for SignalSnapshot {
    fn get(&self, message: &str, signal: &str) -> Option<f64> {
        self.messages
            .get(message)
            .and_then(|signals| signals.get(signal))
            .copied()
    }

    fn message(&self, message: &str) -> Option<RawMessage> {
        self.messages.get(message).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_values_default_to_zero() {
        let snapshot = SignalSnapshot::new().with("Brake_Pedal", "Brake_Pedal", 12.0);

        assert_eq!(snapshot.value("Brake_Pedal", "Brake_Pedal"), 12.0);
        assert_eq!(snapshot.value("Brake_Pedal", "Counter"), 0.0);
        assert_eq!(snapshot.value("Unknown", "Signal"), 0.0);
        assert_eq!(snapshot.get("Brake_Pedal", "Counter"), None);
        assert!(snapshot.message("Unknown").is_none());
    }

    #[test]
    fn test_message_copy() {
        let snapshot = SignalSnapshot::new()
            .with("ES_LKAS_State", "LKAS_ACTIVE", 1.0)
            .with("ES_LKAS_State", "Counter", 3.0);

        let msg = snapshot.message("ES_LKAS_State").unwrap();
        assert_eq!(msg.len(), 2);
        assert_eq!(msg.get("Counter"), Some(&3.0));
        assert_eq!(snapshot.message_names().collect::<Vec<_>>(), vec!["ES_LKAS_State"]);
    }

    #[test]
    fn test_json_shape() {
        let snapshot: SignalSnapshot =
            serde_json::from_str(r#"{"Dash_State": {"Units": 7}}"#).unwrap();
        assert_eq!(snapshot.value("Dash_State", "Units"), 7.0);
    }
}
