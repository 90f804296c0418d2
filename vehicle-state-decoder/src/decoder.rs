//! Vehicle state decoder
//!
//! The `StateDecoder` turns the latest signal values of the primary, camera
//! and (optional) powertrain buses into one [`VehicleStateSnapshot`] per
//! control cycle. All variant-specific rules are resolved from the
//! [`VehicleSchema`] at construction; `update` itself never fails.

use crate::config::DecoderConfig;
use crate::filter::SpeedFilter;
use crate::schema::{
    GearTable, SignalBus, ThrottleSource, VariantConfig, VehicleSchema, VehicleVariant,
};
use crate::signals::{RawMessage, SignalSource};
use crate::types::{
    CruiseState, GearShifter, Result, VehicleStateSnapshot, WheelSpeeds, KPH_TO_MS, MPH_TO_KPH,
};

/// Countdown that keeps a blinker asserted after the raw signal drops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlinkCounter {
    count: u32,
}

impl BlinkCounter {
    /// Reload to `persist` while active, otherwise count down to zero
    pub fn update(&mut self, active: bool, persist: u32) -> bool {
        self.count = if active {
            persist
        } else {
            self.count.saturating_sub(1)
        };
        self.count > 0
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Mutable state carried from one cycle to the next
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderState {
    pub left_blinker: BlinkCounter,
    pub right_blinker: BlinkCounter,
    pub speed_filter: SpeedFilter,
    /// Last seen raw `Brake_Pedal` message (primary bus)
    pub brake_msg: Option<RawMessage>,
    /// Last seen raw `ES_LKAS_State` message (camera bus)
    pub es_lkas_msg: Option<RawMessage>,
}

impl DecoderState {
    fn new(config: &DecoderConfig) -> Self {
        Self {
            left_blinker: BlinkCounter::default(),
            right_blinker: BlinkCounter::default(),
            speed_filter: SpeedFilter::new(
                config.dt,
                config.speed_kf_gains,
                config.speed_kf_reset_threshold,
            ),
            brake_msg: None,
            es_lkas_msg: None,
        }
    }
}

/// Per-cycle decoder for one vehicle
pub struct StateDecoder {
    variant: VehicleVariant,
    rules: VariantConfig,
    gear_table: GearTable,
    throttle: ThrottleSource,
    config: DecoderConfig,
    state: DecoderState,
}

impl StateDecoder {
    /// Create a decoder for `variant` with the default configuration
    ///
    /// Fails with a configuration error if the schema has no entry for the
    /// variant.
    pub fn new(variant: VehicleVariant, schema: &VehicleSchema) -> Result<Self> {
        Self::with_config(variant, schema, DecoderConfig::default())
    }

    /// Create a decoder for `variant` with an explicit configuration
    pub fn with_config(
        variant: VehicleVariant,
        schema: &VehicleSchema,
        config: DecoderConfig,
    ) -> Result<Self> {
        let rules = schema.variant(variant)?.clone();
        let gear_table = rules.gear_table();
        let throttle = rules.throttle_source();

        log::info!(
            "State decoder for {}: {} gear codes, steer threshold {}, powertrain bus {}, throttle {}.{}",
            variant,
            gear_table.len(),
            rules.steer_threshold,
            if rules.has_powertrain_bus { "present" } else { "absent" },
            throttle.message,
            throttle.signal
        );

        Ok(Self {
            variant,
            state: DecoderState::new(&config),
            rules,
            gear_table,
            throttle,
            config,
        })
    }

    /// Decode one control cycle
    ///
    /// `powertrain` is `None` for variants without a powertrain bus; the gear
    /// is then unknown and the throttle is read wherever the variant's schema
    /// places it. The gear is also unknown when the powertrain source does not
    /// carry `Transmission.Gear`.
    pub fn update<P, C, T>(
        &mut self,
        primary: &P,
        camera: &C,
        powertrain: Option<&T>,
    ) -> VehicleStateSnapshot
    where
        P: SignalSource + ?Sized,
        C: SignalSource + ?Sized,
        T: SignalSource + ?Sized,
    {
        let cp = primary;
        let eps = self.config.pressed_epsilon;

        // Pedals
        let throttle = &self.throttle;
        let raw_throttle = match throttle.bus {
            SignalBus::Primary => cp.value(&throttle.message, &throttle.signal),
            SignalBus::Powertrain => powertrain
                .map(|ept| ept.value(&throttle.message, &throttle.signal))
                .unwrap_or(0.0),
        };
        let gas = raw_throttle / 255.0;
        let brake_pressed = cp.value("Brake_Pedal", "Brake_Pedal") > eps;

        // Wheel speeds and speed estimate
        let wheel_speed = |name: &str| cp.value("Wheel_Speeds", name).max(0.0) * KPH_TO_MS;
        let wheel_speeds = WheelSpeeds {
            fl: wheel_speed("FL"),
            fr: wheel_speed("FR"),
            rl: wheel_speed("RL"),
            rr: wheel_speed("RR"),
        };
        let v_ego_raw = wheel_speeds.mean();
        let (v_ego, a_ego) = self.state.speed_filter.update(v_ego_raw);

        // Blinkers, persisted for assisted lane change
        let persist = self.config.blink_persist;
        let left_blinker = self
            .state
            .left_blinker
            .update(cp.value("Dashlights", "LEFT_BLINKER") != 0.0, persist);
        let right_blinker = self
            .state
            .right_blinker
            .update(cp.value("Dashlights", "RIGHT_BLINKER") != 0.0, persist);

        let gear_shifter = powertrain
            .and_then(|ept| ept.get("Transmission", "Gear"))
            .map(|code| self.gear_table.lookup(code as i64))
            .unwrap_or(GearShifter::Unknown);

        // Steering
        let steering_angle = cp.value("Steering_Torque", "Steering_Angle");
        let steering_torque = cp.value("Steering_Torque", "Steer_Torque_Sensor");

        let cruise_state = self.cruise_state(cp, camera);

        let door_open = ["DOOR_OPEN_RR", "DOOR_OPEN_RL", "DOOR_OPEN_FR", "DOOR_OPEN_FL"]
            .iter()
            .any(|door| cp.value("BodyInfo", door) != 0.0);

        // Pass-through cache of raw sub-messages, last seen wins
        if let Some(msg) = cp.message("Brake_Pedal") {
            self.state.brake_msg = Some(msg);
        }
        if let Some(msg) = camera.message("ES_LKAS_State") {
            self.state.es_lkas_msg = Some(msg);
        }

        let snapshot = VehicleStateSnapshot {
            gas,
            gas_pressed: gas > eps,
            brake_pressed,
            brake_lights: brake_pressed,
            wheel_speeds,
            v_ego_raw,
            v_ego: v_ego.max(0.0),
            a_ego,
            standstill: v_ego_raw < self.config.standstill_threshold,
            left_blinker,
            right_blinker,
            left_blindspot: cp.value("BSD_RCTA", "L_ADJACENT") == 1.0,
            right_blindspot: cp.value("BSD_RCTA", "R_ADJACENT") == 1.0,
            gear_shifter,
            steering_angle,
            steering_torque,
            steering_pressed: steering_torque.abs() > self.rules.steer_threshold,
            steer_error: cp.value("Steering_Torque", "Steer_Error_1") == 1.0,
            steer_warning: cp.value("Steering_Torque", "Steer_Warning") == 1.0,
            cruise_state,
            seatbelt_unlatched: cp.value("Dashlights", "SEATBELT_FL") == 1.0,
            door_open,
        };

        log::trace!(
            "{}: v_ego_raw={:.3} v_ego={:.3} a_ego={:.3} gear={}",
            self.variant,
            snapshot.v_ego_raw,
            snapshot.v_ego,
            snapshot.a_ego,
            snapshot.gear_shifter
        );

        snapshot
    }

    /// Cruise status from the camera, with the cluster unit correction
    ///
    /// The set-speed signal follows the cluster's display unit: when the dash
    /// reports an imperial unit code, the value is in mph.
    fn cruise_state<P, C>(&self, cp: &P, cp_cam: &C) -> CruiseState
    where
        P: SignalSource + ?Sized,
        C: SignalSource + ?Sized,
    {
        let mut speed = cp_cam.value("ES_DashStatus", "Cruise_Set_Speed") * KPH_TO_MS;
        let units = cp.value("Dash_State", "Units");
        if units.fract() == 0.0 && self.rules.is_imperial_unit_code(units as i64) {
            speed *= MPH_TO_KPH;
        }

        CruiseState {
            enabled: cp_cam.value("ES_DashStatus", "Cruise_Activated") != 0.0,
            available: cp_cam.value("ES_DashStatus", "Cruise_On") != 0.0,
            speed,
            non_adaptive: cp_cam.value("ES_DashStatus", "Conventional_Cruise") == 1.0,
        }
    }

    /// Restore the cross-cycle state to neutral
    pub fn reset(&mut self) {
        log::debug!("{}: decoder state reset", self.variant);
        self.state = DecoderState::new(&self.config);
    }

    pub fn variant(&self) -> VehicleVariant {
        self.variant
    }

    pub fn gear_table(&self) -> &GearTable {
        &self.gear_table
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn state(&self) -> &DecoderState {
        &self.state
    }

    /// Latest raw `Brake_Pedal` message, for re-transmission
    pub fn brake_msg(&self) -> Option<&RawMessage> {
        self.state.brake_msg.as_ref()
    }

    /// Latest raw `ES_LKAS_State` message, for re-transmission
    pub fn es_lkas_msg(&self) -> Option<&RawMessage> {
        self.state.es_lkas_msg.as_ref()
    }
}
