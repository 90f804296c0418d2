//! Message Decoding Engine
//!
//! Extracts signal values from raw CAN frame data based on signal
//! definitions from the signal database. Handles bit extraction, endianness,
//! sign extension and physical value conversion.

use crate::signals::database::{ByteOrder, MessageDefinition, SignalDefinition, ValueType};
use std::collections::BTreeMap;

/// Message decoder - extracts signals from CAN frame payloads
pub struct MessageDecoder;

impl MessageDecoder {
    /// Decode every signal of `message_def` from `data`
    ///
    /// Signals that do not fit into the payload are skipped (and logged).
    pub fn decode_message(data: &[u8], message_def: &MessageDefinition) -> BTreeMap<String, f64> {
        message_def
            .signals
            .iter()
            .filter_map(|signal| {
                Self::decode_signal(data, signal).map(|value| (signal.name.clone(), value))
            })
            .collect()
    }

    /// Decode a single signal to its physical value (`offset + factor * raw`)
    pub fn decode_signal(data: &[u8], signal: &SignalDefinition) -> Option<f64> {
        let raw_value = Self::extract_signal_value(data, signal)?;
        Some(signal.offset + signal.factor * (raw_value as f64))
    }

    /// Extract raw signal value from CAN frame data
    ///
    /// Handles bit extraction with proper endianness support.
    fn extract_signal_value(data: &[u8], signal: &SignalDefinition) -> Option<i64> {
        let start_bit = signal.start_bit as usize;
        let length = signal.length as usize;

        let last_byte = match signal.byte_order {
            ByteOrder::LittleEndian => (start_bit + length - 1) / 8,
            ByteOrder::BigEndian => Self::motorola_last_byte(start_bit, length),
        };
        if last_byte >= data.len() {
            log::warn!(
                "Signal '{}' requires {} bytes but frame only has {} bytes",
                signal.name,
                last_byte + 1,
                data.len()
            );
            return None;
        }

        let raw_value = match signal.byte_order {
            ByteOrder::LittleEndian => Self::extract_little_endian(data, start_bit, length),
            ByteOrder::BigEndian => Self::extract_big_endian(data, start_bit, length),
        };

        let value = match signal.value_type {
            ValueType::Unsigned => raw_value as i64,
            ValueType::Signed => Self::sign_extend(raw_value, length),
        };

        Some(value)
    }

    /// Extract signal with little-endian (Intel) byte order
    ///
    /// Start bit points to the LSB; bits are numbered LSB to MSB within each
    /// byte, continuing into the next byte.
    fn extract_little_endian(data: &[u8], start_bit: usize, length: usize) -> u64 {
        let mut result: u64 = 0;

        for i in 0..length {
            let bit_pos = start_bit + i;
            let bit_value = (data[bit_pos / 8] >> (bit_pos % 8)) & 0x01;
            result |= (bit_value as u64) << i;
        }

        result
    }

    /// Extract signal with big-endian (Motorola) byte order
    ///
    /// DBC sawtooth numbering: the start bit is the MSB of the signal, bits
    /// are read downward within a byte and continue at bit 7 of the next byte.
    fn extract_big_endian(data: &[u8], start_bit: usize, length: usize) -> u64 {
        let mut result: u64 = 0;
        let mut bit_pos = start_bit;

        for _ in 0..length {
            let bit_value = (data[bit_pos / 8] >> (bit_pos % 8)) & 0x01;
            result = (result << 1) | bit_value as u64;
            bit_pos = Self::next_motorola_bit(bit_pos);
        }

        result
    }

    fn next_motorola_bit(bit_pos: usize) -> usize {
        if bit_pos % 8 == 0 {
            bit_pos + 15
        } else {
            bit_pos - 1
        }
    }

    fn motorola_last_byte(start_bit: usize, length: usize) -> usize {
        let mut bit_pos = start_bit;
        for _ in 1..length {
            bit_pos = Self::next_motorola_bit(bit_pos);
        }
        bit_pos / 8
    }

    /// Sign-extend a value from N bits to 64 bits
    fn sign_extend(value: u64, bit_length: usize) -> i64 {
        if bit_length >= 64 {
            return value as i64;
        }

        let sign_bit = 1u64 << (bit_length - 1);
        if (value & sign_bit) != 0 {
            let mask = !0u64 << bit_length;
            (value | mask) as i64
        } else {
            value as i64
        }
    }
}
