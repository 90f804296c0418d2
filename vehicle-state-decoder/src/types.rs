//! Core types for the vehicle state decoder library
//!
//! This module defines the raw frame type consumed by the signal parser, the
//! error taxonomy, and the normalized snapshot the decoder emits once per
//! control cycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// km/h to m/s
pub const KPH_TO_MS: f64 = 1.0 / 3.6;
/// mph to km/h
pub const MPH_TO_KPH: f64 = 1.609344;

/// Raw CAN frame as received on one of the vehicle buses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanFrame {
    /// Bus index (0 = primary, 1 = powertrain, 2 = camera)
    pub bus: u8,
    /// CAN message address (11-bit or 29-bit)
    pub address: u32,
    /// Frame data bytes
    pub data: Vec<u8>,
    /// Receive timestamp in nanoseconds (monotonic)
    pub timestamp_ns: u64,
}

impl CanFrame {
    pub fn new(bus: u8, address: u32, data: Vec<u8>, timestamp_ns: u64) -> Self {
        Self {
            bus,
            address,
            data,
            timestamp_ns,
        }
    }
}

/// Errors that can occur while configuring the decoder or its collaborators
///
/// Nothing in here is raised by [`StateDecoder::update`](crate::StateDecoder::update);
/// degraded inputs resolve to defaults instead.
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Failed to parse vehicle schema: {0}")]
    SchemaParseError(String),

    #[error("Failed to parse DBC file: {0}")]
    DbcParseError(String),

    #[error("Signal not found: {0}")]
    SignalNotFound(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Invalid signal definition: {0}")]
    InvalidSignalDefinition(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Gear selector position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GearShifter {
    #[default]
    Unknown,
    Park,
    Drive,
    Neutral,
    Reverse,
    Sport,
    Low,
    Brake,
    Eco,
    Manumatic,
}

impl GearShifter {
    /// Map a gear label (as found in value tables) to a shifter position.
    ///
    /// Missing or unrecognized labels resolve to [`GearShifter::Unknown`].
    pub fn from_label(label: Option<&str>) -> Self {
        let Some(label) = label else {
            return GearShifter::Unknown;
        };

        match label.trim().to_ascii_uppercase().as_str() {
            "P" | "PARK" => GearShifter::Park,
            "D" | "DRIVE" => GearShifter::Drive,
            "N" | "NEUTRAL" => GearShifter::Neutral,
            "R" | "REVERSE" => GearShifter::Reverse,
            "S" | "SPORT" => GearShifter::Sport,
            "L" | "LOW" => GearShifter::Low,
            "B" | "BRAKE" => GearShifter::Brake,
            "E" | "ECO" => GearShifter::Eco,
            "M" | "MANUMATIC" => GearShifter::Manumatic,
            _ => GearShifter::Unknown,
        }
    }
}

impl fmt::Display for GearShifter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GearShifter::Unknown => "unknown",
            GearShifter::Park => "park",
            GearShifter::Drive => "drive",
            GearShifter::Neutral => "neutral",
            GearShifter::Reverse => "reverse",
            GearShifter::Sport => "sport",
            GearShifter::Low => "low",
            GearShifter::Brake => "brake",
            GearShifter::Eco => "eco",
            GearShifter::Manumatic => "manumatic",
        };
        write!(f, "{}", name)
    }
}

/// Individual wheel speeds in m/s
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelSpeeds {
    pub fl: f64,
    pub fr: f64,
    pub rl: f64,
    pub rr: f64,
}

impl WheelSpeeds {
    /// Arithmetic mean of the four wheels
    pub fn mean(&self) -> f64 {
        (self.fl + self.fr + self.rl + self.rr) / 4.0
    }
}

/// Cruise control status as reported by the camera
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CruiseState {
    pub enabled: bool,
    pub available: bool,
    /// Set speed in m/s
    pub speed: f64,
    /// Conventional (non-adaptive) cruise selected
    pub non_adaptive: bool,
}

/// Normalized vehicle state, produced fresh every control cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleStateSnapshot {
    /// Throttle pedal position, 0.0 to 1.0
    pub gas: f64,
    pub gas_pressed: bool,
    pub brake_pressed: bool,
    pub brake_lights: bool,

    pub wheel_speeds: WheelSpeeds,
    /// Mean wheel speed in m/s, unfiltered
    pub v_ego_raw: f64,
    /// Filtered speed in m/s
    pub v_ego: f64,
    /// Filtered acceleration in m/s²
    pub a_ego: f64,
    pub standstill: bool,

    pub left_blinker: bool,
    pub right_blinker: bool,
    pub left_blindspot: bool,
    pub right_blindspot: bool,

    pub gear_shifter: GearShifter,

    /// Steering wheel angle in degrees, sign as reported by the vehicle
    pub steering_angle: f64,
    /// Driver torque sensor reading, sign as reported by the vehicle
    pub steering_torque: f64,
    pub steering_pressed: bool,
    pub steer_error: bool,
    pub steer_warning: bool,

    pub cruise_state: CruiseState,

    pub seatbelt_unlatched: bool,
    pub door_open: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gear_labels() {
        assert_eq!(GearShifter::from_label(Some("P")), GearShifter::Park);
        assert_eq!(GearShifter::from_label(Some("d")), GearShifter::Drive);
        assert_eq!(GearShifter::from_label(Some("Reverse")), GearShifter::Reverse);
        assert_eq!(GearShifter::from_label(Some(" N ")), GearShifter::Neutral);
        assert_eq!(GearShifter::from_label(Some("X")), GearShifter::Unknown);
        assert_eq!(GearShifter::from_label(None), GearShifter::Unknown);
    }

    #[test]
    fn test_gear_display() {
        assert_eq!(format!("{}", GearShifter::Park), "park");
        assert_eq!(format!("{}", GearShifter::Unknown), "unknown");
    }

    #[test]
    fn test_wheel_speed_mean() {
        let speeds = WheelSpeeds {
            fl: 1.0,
            fr: 2.0,
            rl: 3.0,
            rr: 4.0,
        };
        assert!((speeds.mean() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_snapshot_serializes_gear_lowercase() {
        let snapshot = VehicleStateSnapshot {
            gear_shifter: GearShifter::Drive,
            ..Default::default()
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["gear_shifter"], "drive");
        assert_eq!(json["cruise_state"]["enabled"], false);
    }
}
