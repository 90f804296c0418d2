//! Signal database, DBC parser and frame-level signal parser
//!
//! This module contains everything between raw CAN frames and named signal
//! values: the DBC loader, the signal database, bit extraction, and the
//! per-bus `CanParser` that the state decoder reads through `SignalSource`.

pub mod database;
pub mod dbc;
pub mod parser;
pub mod snapshot;

mod message_decoder;

// Re-export key types for convenience
pub use database::{
    ByteOrder, DatabaseStats, MessageDefinition, SignalDatabase, SignalDefinition, ValueType,
};
pub use parser::{CanParser, FrequencyCheck, ParserSpec, SignalSpec, STALE_PERIODS};
pub use snapshot::{RawMessage, SignalSnapshot, SignalSource};
