//! Signal database
//!
//! Holds the message and signal definitions loaded from a DBC file and
//! answers lookups by address or by message name.

use std::collections::{BTreeMap, HashMap};

/// A complete CAN message definition
#[derive(Debug, Clone)]
pub struct MessageDefinition {
    /// CAN message address
    pub address: u32,
    /// Message name
    pub name: String,
    /// Message size in bytes
    pub size: usize,
    /// All signals in this message
    pub signals: Vec<SignalDefinition>,
    /// Source file (DBC filename)
    pub source: String,
}

impl MessageDefinition {
    /// Find a signal of this message by name
    pub fn signal(&self, name: &str) -> Option<&SignalDefinition> {
        self.signals.iter().find(|s| s.name == name)
    }
}

/// A CAN signal definition
#[derive(Debug, Clone)]
pub struct SignalDefinition {
    /// Signal name
    pub name: String,
    /// Start bit in the CAN frame (DBC numbering)
    pub start_bit: u16,
    /// Length in bits
    pub length: u16,
    pub byte_order: ByteOrder,
    pub value_type: ValueType,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
    pub min: f64,
    pub max: f64,
    /// Engineering unit (e.g., "kph", "deg")
    pub unit: Option<String>,
    /// Value descriptions (raw value -> label), from `VAL_` entries
    pub value_table: Option<BTreeMap<i64, String>>,
}

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Signed,
    Unsigned,
}

/// Message definitions indexed by address and by name
#[derive(Debug, Clone, Default)]
pub struct SignalDatabase {
    messages: HashMap<u32, MessageDefinition>,

    /// Key: message name, Value: address
    name_lookup: HashMap<String, u32>,
}

impl SignalDatabase {
    /// Create a new empty signal database
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message definition, replacing any earlier one at the same address
    pub fn add_message(&mut self, message: MessageDefinition) {
        if let Some(previous) = self.messages.get(&message.address) {
            log::warn!(
                "Message 0x{:X} ({}) redefined by {}, replacing definition from {}",
                message.address,
                message.name,
                message.source,
                previous.source
            );
            self.name_lookup.remove(&previous.name);
        }

        self.name_lookup.insert(message.name.clone(), message.address);
        self.messages.insert(message.address, message);
    }

    pub fn get_message(&self, address: u32) -> Option<&MessageDefinition> {
        self.messages.get(&address)
    }

    pub fn get_message_by_name(&self, name: &str) -> Option<&MessageDefinition> {
        self.name_lookup
            .get(name)
            .and_then(|address| self.messages.get(address))
    }

    /// Value descriptions of `message.signal`, if the signal has any
    pub fn value_table(&self, message: &str, signal: &str) -> Option<&BTreeMap<i64, String>> {
        self.get_message_by_name(message)
            .and_then(|msg| msg.signal(signal))
            .and_then(|sig| sig.value_table.as_ref())
    }

    /// Get database statistics
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            num_messages: self.messages.len(),
            num_signals: self.messages.values().map(|m| m.signals.len()).sum(),
        }
    }
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    pub num_messages: usize,
    pub num_signals: usize,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn signal(name: &str, start_bit: u16, length: u16) -> SignalDefinition {
        SignalDefinition {
            name: name.to_string(),
            start_bit,
            length,
            byte_order: ByteOrder::LittleEndian,
            value_type: ValueType::Unsigned,
            factor: 1.0,
            offset: 0.0,
            min: 0.0,
            max: 0.0,
            unit: None,
            value_table: None,
        }
    }

    #[test]
    fn test_empty_database() {
        let db = SignalDatabase::new();
        let stats = db.stats();
        assert_eq!(stats.num_messages, 0);
        assert_eq!(stats.num_signals, 0);
    }

    #[test]
    fn test_add_message() {
        let mut db = SignalDatabase::new();

        let mut gear = signal("Gear", 24, 8);
        gear.value_table = Some(BTreeMap::from([(0, "N".to_string()), (15, "P".to_string())]));

        db.add_message(MessageDefinition {
            address: 0x48,
            name: "Transmission".to_string(),
            size: 8,
            signals: vec![gear],
            source: "test.dbc".to_string(),
        });

        let stats = db.stats();
        assert_eq!(stats.num_messages, 1);
        assert_eq!(stats.num_signals, 1);

        assert_eq!(db.get_message(0x48).unwrap().name, "Transmission");
        assert_eq!(db.get_message_by_name("Transmission").unwrap().address, 0x48);

        let table = db.value_table("Transmission", "Gear").unwrap();
        assert_eq!(table.get(&15).map(String::as_str), Some("P"));
        assert!(db.value_table("Transmission", "Missing").is_none());
    }

    #[test]
    fn test_redefinition_replaces_name_lookup() {
        let mut db = SignalDatabase::new();
        for name in ["Old_Name", "New_Name"] {
            db.add_message(MessageDefinition {
                address: 0x100,
                name: name.to_string(),
                size: 8,
                signals: vec![],
                source: "test.dbc".to_string(),
            });
        }

        assert_eq!(db.stats().num_messages, 1);
        assert!(db.get_message_by_name("Old_Name").is_none());
        assert!(db.get_message_by_name("New_Name").is_some());
    }
}
