//! Signal subscriptions per bus
//!
//! Which `(message, signal)` pairs the decoder reads from each bus, their
//! values before the first frame arrives, and the expected message rates.

use super::{SignalBus, VariantConfig};
use crate::signals::{FrequencyCheck, ParserSpec, SignalSpec};

pub const PRIMARY_BUS: u8 = 0;
pub const POWERTRAIN_BUS: u8 = 1;
pub const CAMERA_BUS: u8 = 2;

fn subscriptions(entries: &[(&str, &str, f64)]) -> Vec<SignalSpec> {
    entries
        .iter()
        .map(|(message, signal, default)| SignalSpec::new(*message, *signal, *default))
        .collect()
}

fn checks(entries: &[(&str, u32)]) -> Vec<FrequencyCheck> {
    entries
        .iter()
        .map(|(message, hz)| FrequencyCheck::new(*message, *hz))
        .collect()
}

/// Throttle subscription when the variant reads the pedal on `bus`
fn throttle_subscription(variant: &VariantConfig, bus: SignalBus) -> Option<SignalSpec> {
    let throttle = variant.throttle_source();
    (throttle.bus == bus).then(|| SignalSpec::new(throttle.message, throttle.signal, 0.0))
}

/// Chassis bus: steering, pedals, wheel speeds, body and dash signals
pub fn primary_bus_spec(variant: &VariantConfig) -> ParserSpec {
    let mut signals = subscriptions(&[
        ("Steering_Torque", "Steer_Torque_Sensor", 0.0),
        ("Steering_Torque", "Steering_Angle", 0.0),
        ("Steering_Torque", "Steer_Error_1", 0.0),
        ("Steering_Torque", "Steer_Warning", 0.0),
        ("Brake_Pedal", "Brake_Pedal", 0.0),
        ("Dashlights", "LEFT_BLINKER", 0.0),
        ("Dashlights", "RIGHT_BLINKER", 0.0),
        ("Dashlights", "SEATBELT_FL", 0.0),
        ("Wheel_Speeds", "FL", 0.0),
        ("Wheel_Speeds", "FR", 0.0),
        ("Wheel_Speeds", "RL", 0.0),
        ("Wheel_Speeds", "RR", 0.0),
        // Doors read open until BodyInfo arrives
        ("BodyInfo", "DOOR_OPEN_FR", 1.0),
        ("BodyInfo", "DOOR_OPEN_FL", 1.0),
        ("BodyInfo", "DOOR_OPEN_RR", 1.0),
        ("BodyInfo", "DOOR_OPEN_RL", 1.0),
        ("Dash_State", "Units", 1.0),
        ("BSD_RCTA", "L_ADJACENT", 0.0),
        ("BSD_RCTA", "R_ADJACENT", 0.0),
    ]);
    signals.extend(throttle_subscription(variant, SignalBus::Primary));

    ParserSpec {
        bus: PRIMARY_BUS,
        signals,
        checks: checks(&[
            ("Dashlights", 10),
            ("Wheel_Speeds", 50),
            ("Steering_Torque", 50),
            ("BodyInfo", 10),
        ]),
    }
}

/// Camera bus: cruise status and lane-keep state
pub fn camera_bus_spec() -> ParserSpec {
    ParserSpec {
        bus: CAMERA_BUS,
        signals: subscriptions(&[
            ("ES_DashStatus", "Cruise_Set_Speed", 0.0),
            ("ES_DashStatus", "Conventional_Cruise", 0.0),
            ("ES_DashStatus", "Cruise_Activated", 0.0),
            ("ES_DashStatus", "Cruise_On", 0.0),
            ("ES_LKAS_State", "Counter", 0.0),
            ("ES_LKAS_State", "Keep_Hands_On_Wheel", 0.0),
            ("ES_LKAS_State", "Empty_Box", 0.0),
            ("ES_LKAS_State", "Signal1", 0.0),
            ("ES_LKAS_State", "LKAS_ACTIVE", 0.0),
            ("ES_LKAS_State", "Signal2", 0.0),
            ("ES_LKAS_State", "Backward_Speed_Limit_Menu", 0.0),
            ("ES_LKAS_State", "LKAS_ENABLE_3", 0.0),
            ("ES_LKAS_State", "LKAS_Left_Line_Light_Blink", 0.0),
            ("ES_LKAS_State", "LKAS_ENABLE_2", 0.0),
            ("ES_LKAS_State", "LKAS_Right_Line_Light_Blink", 0.0),
            ("ES_LKAS_State", "LKAS_Left_Line_Visible", 0.0),
            ("ES_LKAS_State", "LKAS_Left_Line_Green", 0.0),
            ("ES_LKAS_State", "LKAS_Right_Line_Visible", 0.0),
            ("ES_LKAS_State", "LKAS_Right_Line_Green", 0.0),
            ("ES_LKAS_State", "LKAS_Alert", 0.0),
            ("ES_LKAS_State", "Signal3", 0.0),
        ]),
        checks: checks(&[("ES_DashStatus", 10), ("ES_LKAS_State", 10)]),
    }
}

/// Powertrain bus, only present on variants that expose it
pub fn powertrain_bus_spec(variant: &VariantConfig) -> Option<ParserSpec> {
    if !variant.has_powertrain_bus {
        return None;
    }

    let mut signals = subscriptions(&[("Transmission", "Gear", 0.0)]);
    let mut checked = Vec::new();
    if let Some(throttle) = throttle_subscription(variant, SignalBus::Powertrain) {
        checked.push(FrequencyCheck::new(throttle.message.clone(), 50));
        signals.push(throttle);
    }

    Some(ParserSpec {
        bus: POWERTRAIN_BUS,
        signals,
        checks: checked,
    })
}
