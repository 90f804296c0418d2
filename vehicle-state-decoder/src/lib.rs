//! Vehicle State Decoder Library
//!
//! Turns the signal values of three vehicle buses (primary chassis bus,
//! camera bus and an optional powertrain bus) into one normalized
//! [`VehicleStateSnapshot`] per control cycle.
//!
//! # Architecture
//!
//! - [`signals`]: DBC loading, the signal database, and the frame-level
//!   [`CanParser`] that keeps the latest value of every subscribed signal
//! - [`schema`]: per-variant decoding rules (gear table, steering threshold,
//!   powertrain bus presence, cluster unit codes) and per-bus subscriptions
//! - [`StateDecoder`]: the per-cycle decoder, owning the blinker counters and
//!   the speed filter
//!
//! The library does NOT:
//! - Talk to CAN hardware
//! - Detect the vehicle model
//! - Act on the decoded state
//!
//! # Example Usage
//!
//! ```
//! use vehicle_state_decoder::{SignalSnapshot, StateDecoder, VehicleSchema, VehicleVariant};
//!
//! let schema = VehicleSchema::builtin();
//! let mut decoder = StateDecoder::new(VehicleVariant::Impreza, &schema).unwrap();
//!
//! let primary = SignalSnapshot::new()
//!     .with("Wheel_Speeds", "FL", 36.0)
//!     .with("Wheel_Speeds", "FR", 36.0)
//!     .with("Wheel_Speeds", "RL", 36.0)
//!     .with("Wheel_Speeds", "RR", 36.0);
//! let camera = SignalSnapshot::new();
//!
//! let state = decoder.update(&primary, &camera, None::<&SignalSnapshot>);
//! assert!((state.v_ego_raw - 10.0).abs() < 1e-9);
//! assert!(!state.standstill);
//! ```

// Public modules
pub mod config;
pub mod decoder;
pub mod filter;
pub mod schema;
pub mod signals;
pub mod types;

// Re-export main types for convenience
pub use config::DecoderConfig;
pub use decoder::{BlinkCounter, DecoderState, StateDecoder};
pub use filter::SpeedFilter;
pub use schema::{
    GearEntry, GearTable, SignalBus, ThrottleSource, VariantConfig, VehicleSchema, VehicleVariant,
};
pub use signals::{CanParser, ParserSpec, RawMessage, SignalDatabase, SignalSnapshot, SignalSource};
pub use types::{
    CanFrame, CruiseState, DecoderError, GearShifter, Result, VehicleStateSnapshot, WheelSpeeds,
    KPH_TO_MS, MPH_TO_KPH,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: every built-in variant yields a decoder
        let schema = VehicleSchema::builtin();
        for variant in VehicleVariant::ALL {
            let decoder = StateDecoder::new(variant, &schema).unwrap();
            assert_eq!(decoder.variant(), variant);
            assert!(!decoder.gear_table().is_empty());
        }
    }
}
