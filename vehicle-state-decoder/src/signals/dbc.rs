//! DBC file parser
//!
//! Parses Vector DBC files into the internal signal database format,
//! including `VAL_` value descriptions (used for gear tables).

use crate::signals::database::{
    ByteOrder, MessageDefinition, SignalDatabase, SignalDefinition, ValueType,
};
use crate::types::{DecoderError, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Extended-frame flag carried in DBC message IDs
const DBC_EXTENDED_ID_FLAG: u32 = 0x8000_0000;

/// Parse a DBC file into a signal database
pub fn parse_dbc_file(path: &Path) -> Result<SignalDatabase> {
    log::info!("Parsing DBC file: {:?}", path);

    let bytes = std::fs::read(path).map_err(|e| {
        DecoderError::DbcParseError(format!("Failed to read file {:?}: {}", path, e))
    })?;

    // DBC files in the wild are frequently Windows-1252; fall back to Latin-1
    let content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("DBC file is not UTF-8, trying Latin-1 encoding");
            e.into_bytes().iter().map(|&b| b as char).collect()
        }
    };

    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.dbc");

    parse_dbc_str(&content, source)
}

/// Parse DBC text into a signal database
///
/// `source` is recorded on every message for diagnostics.
pub fn parse_dbc_str(content: &str, source: &str) -> Result<SignalDatabase> {
    let dbc = can_dbc::DBC::from_slice(content.as_bytes()).map_err(|e| {
        DecoderError::DbcParseError(format!("Failed to parse DBC {}: {:?}", source, e))
    })?;

    let mut db = SignalDatabase::new();
    for dbc_msg in dbc.messages() {
        db.add_message(convert_message(&dbc, dbc_msg, source)?);
    }

    let stats = db.stats();
    log::info!(
        "Parsed {} messages ({} signals) from {}",
        stats.num_messages,
        stats.num_signals,
        source
    );

    Ok(db)
}

/// Convert a can-dbc message to our MessageDefinition
fn convert_message(
    dbc: &can_dbc::DBC,
    dbc_msg: &can_dbc::Message,
    source: &str,
) -> Result<MessageDefinition> {
    let signals = dbc_msg
        .signals()
        .iter()
        .map(|dbc_sig| convert_signal(dbc, dbc_msg.message_id(), dbc_sig))
        .collect::<Result<Vec<_>>>()?;

    Ok(MessageDefinition {
        address: dbc_msg.message_id().0 & !DBC_EXTENDED_ID_FLAG,
        name: dbc_msg.message_name().to_string(),
        size: *dbc_msg.message_size() as usize,
        signals,
        source: source.to_string(),
    })
}

/// Convert a can-dbc signal to our SignalDefinition
fn convert_signal(
    dbc: &can_dbc::DBC,
    message_id: &can_dbc::MessageId,
    dbc_sig: &can_dbc::Signal,
) -> Result<SignalDefinition> {
    let length = *dbc_sig.signal_size();
    if length == 0 || length > 64 {
        return Err(DecoderError::InvalidSignalDefinition(format!(
            "Signal '{}' has unsupported length {}",
            dbc_sig.name(),
            length
        )));
    }

    let byte_order = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
        can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
    };

    let value_type = match *dbc_sig.value_type() {
        can_dbc::ValueType::Signed => ValueType::Signed,
        can_dbc::ValueType::Unsigned => ValueType::Unsigned,
    };

    let value_table = dbc
        .value_descriptions_for_signal(message_id.clone(), dbc_sig.name())
        .map(|descriptions| {
            descriptions
                .iter()
                .map(|d| (*d.a() as i64, d.b().to_string()))
                .collect::<BTreeMap<_, _>>()
        })
        .filter(|table| !table.is_empty());

    Ok(SignalDefinition {
        name: dbc_sig.name().to_string(),
        start_bit: *dbc_sig.start_bit() as u16,
        length: length as u16,
        byte_order,
        value_type,
        factor: *dbc_sig.factor(),
        offset: *dbc_sig.offset(),
        min: *dbc_sig.min(),
        max: *dbc_sig.max(),
        unit: if dbc_sig.unit().is_empty() {
            None
        } else {
            Some(dbc_sig.unit().to_string())
        },
        value_table,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Global-platform DBC subset shared with the integration tests
    pub(crate) const TEST_DBC: &str = include_str!("../../tests/fixtures/global.dbc");

    #[test]
    fn test_parse_dbc_str() {
        let db = parse_dbc_str(TEST_DBC, "test.dbc").unwrap();

        let wheels = db.get_message_by_name("Wheel_Speeds").unwrap();
        assert_eq!(wheels.address, 314);
        assert_eq!(wheels.size, 8);
        assert_eq!(wheels.signals.len(), 4);

        let fl = wheels.signal("FL").unwrap();
        assert_eq!(fl.start_bit, 51);
        assert_eq!(fl.length, 13);
        assert_eq!(fl.byte_order, ByteOrder::LittleEndian);
        assert_eq!(fl.value_type, ValueType::Unsigned);
        assert!((fl.factor - 0.057).abs() < 1e-12);
        assert_eq!(fl.unit, Some("kph".to_string()));

        let torque = db
            .get_message_by_name("Steering_Torque")
            .and_then(|m| m.signal("Steer_Torque_Sensor"))
            .unwrap();
        assert_eq!(torque.value_type, ValueType::Signed);

        let motorola = db
            .get_message_by_name("Big_Endian_Test")
            .and_then(|m| m.signal("Motorola_Word"))
            .unwrap();
        assert_eq!(motorola.byte_order, ByteOrder::BigEndian);
    }

    #[test]
    fn test_value_descriptions() {
        let db = parse_dbc_str(TEST_DBC, "test.dbc").unwrap();

        let gears = db.value_table("Transmission", "Gear").unwrap();
        assert_eq!(gears.len(), 9);
        assert_eq!(gears.get(&15).map(String::as_str), Some("P"));
        assert_eq!(gears.get(&14).map(String::as_str), Some("R"));
        assert!(db.value_table("Brake_Pedal", "Brake_Pedal").is_none());
    }

    #[test]
    fn test_parse_dbc_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(TEST_DBC.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let db = parse_dbc_file(temp_file.path()).unwrap();
        let msg = db.get_message(0x48).unwrap();
        assert_eq!(msg.name, "Transmission");
        assert!(!msg.source.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let result = parse_dbc_file(Path::new("/nonexistent/path/vehicle.dbc"));
        assert!(matches!(result, Err(DecoderError::DbcParseError(_))));
    }
}
