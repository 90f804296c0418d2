//! Decoder configuration types
//!
//! Tunables of the state decoder that are shared by every vehicle variant.
//! Variant-specific rules live in the [`VehicleSchema`](crate::VehicleSchema).

use serde::{Deserialize, Serialize};

/// Configuration for the state decoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Control cycle period in seconds
    #[serde(default = "default_dt")]
    pub dt: f64,

    /// Cycles a blinker stays asserted after the last raw blink
    #[serde(default = "default_blink_persist")]
    pub blink_persist: u32,

    /// Raw mean wheel speed (m/s) below which the vehicle is at standstill
    #[serde(default = "default_standstill_threshold")]
    pub standstill_threshold: f64,

    /// Pedal values above this count as pressed
    #[serde(default = "default_pressed_epsilon")]
    pub pressed_epsilon: f64,

    /// Steady-state gains of the speed filter (position, velocity)
    #[serde(default = "default_speed_kf_gains")]
    pub speed_kf_gains: [f64; 2],

    /// Speed jump (m/s) that re-seeds the filter instead of smoothing it
    #[serde(default = "default_speed_kf_reset_threshold")]
    pub speed_kf_reset_threshold: f64,
}

fn default_dt() -> f64 {
    0.01
}

fn default_blink_persist() -> u32 {
    50
}

fn default_standstill_threshold() -> f64 {
    0.01
}

fn default_pressed_epsilon() -> f64 {
    1e-5
}

fn default_speed_kf_gains() -> [f64; 2] {
    [0.12287673, 0.29666309]
}

fn default_speed_kf_reset_threshold() -> f64 {
    2.0
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            blink_persist: default_blink_persist(),
            standstill_threshold: default_standstill_threshold(),
            pressed_epsilon: default_pressed_epsilon(),
            speed_kf_gains: default_speed_kf_gains(),
            speed_kf_reset_threshold: default_speed_kf_reset_threshold(),
        }
    }
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the control cycle period
    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    /// Builder method: set the blinker persistence in cycles
    pub fn with_blink_persist(mut self, cycles: u32) -> Self {
        self.blink_persist = cycles;
        self
    }

    /// Builder method: set the standstill threshold
    pub fn with_standstill_threshold(mut self, threshold: f64) -> Self {
        self.standstill_threshold = threshold;
        self
    }

    /// Builder method: set the pedal-pressed epsilon
    pub fn with_pressed_epsilon(mut self, epsilon: f64) -> Self {
        self.pressed_epsilon = epsilon;
        self
    }

    /// Builder method: set the speed filter gains
    pub fn with_speed_kf_gains(mut self, gains: [f64; 2]) -> Self {
        self.speed_kf_gains = gains;
        self
    }

    /// Builder method: set the speed filter reset threshold
    pub fn with_speed_kf_reset_threshold(mut self, threshold: f64) -> Self {
        self.speed_kf_reset_threshold = threshold;
        self
    }
}
