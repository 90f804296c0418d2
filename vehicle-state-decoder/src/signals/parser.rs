//! Frame-level signal parser
//!
//! A `CanParser` subscribes to a fixed set of `(message, signal)` pairs on one
//! bus, keeps the latest decoded value of each, and monitors how recently each
//! checked message was received. Values are pre-populated with their defaults
//! so consumers can always read every subscribed signal.

use crate::signals::database::{MessageDefinition, SignalDatabase};
use crate::signals::message_decoder::MessageDecoder;
use crate::signals::snapshot::{RawMessage, SignalSnapshot, SignalSource};
use crate::types::{CanFrame, DecoderError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A message counts as stale once this many expected periods pass without it
pub const STALE_PERIODS: u64 = 10;

/// One subscribed signal and its value before the first frame arrives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSpec {
    pub message: String,
    pub signal: String,
    #[serde(default)]
    pub default: f64,
}

impl SignalSpec {
    pub fn new(message: impl Into<String>, signal: impl Into<String>, default: f64) -> Self {
        Self {
            message: message.into(),
            signal: signal.into(),
            default,
        }
    }
}

/// Expected receive frequency of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyCheck {
    pub message: String,
    pub frequency_hz: u32,
}

impl FrequencyCheck {
    pub fn new(message: impl Into<String>, frequency_hz: u32) -> Self {
        Self {
            message: message.into(),
            frequency_hz,
        }
    }
}

/// Everything a parser needs to know about one bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserSpec {
    pub bus: u8,
    pub signals: Vec<SignalSpec>,
    #[serde(default)]
    pub checks: Vec<FrequencyCheck>,
}

/// Per-message bookkeeping inside the parser
#[derive(Debug, Clone)]
struct MessageState {
    definition: MessageDefinition,
    /// Latest value of every subscribed signal in this message
    values: RawMessage,
    /// Maximum age before the message is considered stale (0 = unchecked)
    timeout_ns: u64,
    last_seen_ns: Option<u64>,
}

/// Decodes frames of a single bus into named signal values
#[derive(Debug, Clone)]
pub struct CanParser {
    bus: u8,
    /// Keyed by message address
    messages: HashMap<u32, MessageState>,
    /// Message name -> address
    names: HashMap<String, u32>,
    frames_seen: u64,
}

impl CanParser {
    /// Build a parser for `spec` against the given signal database
    ///
    /// Every subscribed message and signal (and every checked message) must
    /// exist in the database.
    pub fn new(db: &SignalDatabase, spec: &ParserSpec) -> Result<Self> {
        let mut parser = Self {
            bus: spec.bus,
            messages: HashMap::new(),
            names: HashMap::new(),
            frames_seen: 0,
        };

        for sub in &spec.signals {
            let definition = db
                .get_message_by_name(&sub.message)
                .ok_or_else(|| DecoderError::MessageNotFound(sub.message.clone()))?;

            if definition.signal(&sub.signal).is_none() {
                return Err(DecoderError::SignalNotFound(format!(
                    "{}.{}",
                    sub.message, sub.signal
                )));
            }

            let state = parser.state_entry(definition);
            state.values.insert(sub.signal.clone(), sub.default);
        }

        for check in &spec.checks {
            if check.frequency_hz == 0 {
                return Err(DecoderError::ConfigurationError(format!(
                    "Frequency check for {} must be non-zero",
                    check.message
                )));
            }

            let definition = db
                .get_message_by_name(&check.message)
                .ok_or_else(|| DecoderError::MessageNotFound(check.message.clone()))?;

            let state = parser.state_entry(definition);
            state.timeout_ns = STALE_PERIODS * 1_000_000_000 / check.frequency_hz as u64;
        }

        log::debug!(
            "Created parser for bus {} with {} messages ({} checked)",
            parser.bus,
            parser.messages.len(),
            parser.messages.values().filter(|m| m.timeout_ns > 0).count()
        );

        Ok(parser)
    }

    fn state_entry(&mut self, definition: &MessageDefinition) -> &mut MessageState {
        self.names.insert(definition.name.clone(), definition.address);
        self.messages
            .entry(definition.address)
            .or_insert_with(|| MessageState {
                definition: definition.clone(),
                values: RawMessage::new(),
                timeout_ns: 0,
                last_seen_ns: None,
            })
    }

    pub fn bus(&self) -> u8 {
        self.bus
    }

    /// Total number of frames accepted so far
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Feed a batch of frames; frames for other buses or unsubscribed
    /// addresses are ignored.
    pub fn update<'a, I>(&mut self, frames: I)
    where
        I: IntoIterator<Item = &'a CanFrame>,
    {
        for frame in frames {
            if frame.bus != self.bus {
                continue;
            }

            let Some(state) = self.messages.get_mut(&frame.address) else {
                log::trace!("Bus {}: ignoring address 0x{:X}", self.bus, frame.address);
                continue;
            };

            let decoded = MessageDecoder::decode_message(&frame.data, &state.definition);
            for (name, value) in state.values.iter_mut() {
                if let Some(new_value) = decoded.get(name) {
                    *value = *new_value;
                }
            }

            state.last_seen_ns = Some(frame.timestamp_ns);
            self.frames_seen += 1;
        }
    }

    /// Names of checked messages that are missing or older than their timeout
    pub fn stale_messages(&self, now_ns: u64) -> Vec<&str> {
        let mut stale: Vec<&str> = self
            .messages
            .values()
            .filter(|state| state.timeout_ns > 0)
            .filter(|state| match state.last_seen_ns {
                Some(seen) => now_ns.saturating_sub(seen) > state.timeout_ns,
                None => true,
            })
            .map(|state| state.definition.name.as_str())
            .collect();
        stale.sort_unstable();
        stale
    }

    /// Copy the latest values into an owned snapshot
    pub fn snapshot(&self) -> SignalSnapshot {
        let mut snapshot = SignalSnapshot::new();
        for state in self.messages.values() {
            for (signal, value) in &state.values {
                snapshot.set(&state.definition.name, signal, *value);
            }
        }
        snapshot
    }

    /// True when every checked message arrived recently enough
    pub fn can_valid(&self, now_ns: u64) -> bool {
        let stale = self.stale_messages(now_ns);
        if !stale.is_empty() {
            log::debug!("Bus {}: stale messages {:?}", self.bus, stale);
        }
        stale.is_empty()
    }
}

impl SignalSource for CanParser {
    fn get(&self, message: &str, signal: &str) -> Option<f64> {
        self.names
            .get(message)
            .and_then(|address| self.messages.get(address))
            .and_then(|state| state.values.get(signal))
            .copied()
    }

    fn message(&self, message: &str) -> Option<RawMessage> {
        self.names
            .get(message)
            .and_then(|address| self.messages.get(address))
            .map(|state| state.values.clone())
    }
}
