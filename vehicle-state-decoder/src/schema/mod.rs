//! Vehicle schema
//!
//! Per-variant decoding rules: gear table, steering-press threshold, whether
//! the variant exposes a powertrain bus, where the throttle pedal is read, and
//! which dash `Units` codes mean the cluster displays imperial units. The schema is plain data; it is consulted
//! once when a decoder is constructed.
//!
//! Schemas can be loaded from TOML:
//!
//! ```toml
//! [variants.crosstrek_2020_hybrid]
//! steer_threshold = 80.0
//! has_powertrain_bus = true
//! imperial_unit_codes = [1, 2, 7]
//! gears = [{ code = 0, label = "N" }, { code = 15, label = "P" }]
//! throttle = { bus = "powertrain", message = "Throttle_Hybrid", signal = "Throttle_Pedal" }
//! ```
//!
//! Without `throttle`, the pedal is read from the powertrain bus when the
//! variant has one and from the primary bus otherwise.

pub mod bus_specs;
pub mod gear;

pub use bus_specs::{camera_bus_spec, powertrain_bus_spec, primary_bus_spec};
pub use gear::{GearEntry, GearTable};

use crate::signals::SignalDatabase;
use crate::types::{DecoderError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Supported vehicle models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleVariant {
    Ascent,
    Impreza,
    Forester,
    #[serde(rename = "crosstrek_2020_hybrid")]
    Crosstrek2020Hybrid,
}

impl VehicleVariant {
    pub const ALL: [VehicleVariant; 4] = [
        VehicleVariant::Ascent,
        VehicleVariant::Impreza,
        VehicleVariant::Forester,
        VehicleVariant::Crosstrek2020Hybrid,
    ];

    /// Identifier used as the schema table key
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleVariant::Ascent => "ascent",
            VehicleVariant::Impreza => "impreza",
            VehicleVariant::Forester => "forester",
            VehicleVariant::Crosstrek2020Hybrid => "crosstrek_2020_hybrid",
        }
    }
}

impl fmt::Display for VehicleVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VehicleVariant {
    type Err = DecoderError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|variant| variant.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DecoderError::ConfigurationError(format!("Unknown vehicle variant: {}", s)))
    }
}

/// Bus a per-variant signal is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalBus {
    Primary,
    Powertrain,
}

/// Location of the raw accelerator pedal signal (0..=255)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottleSource {
    pub bus: SignalBus,
    pub message: String,
    pub signal: String,
}

impl ThrottleSource {
    /// `Throttle.Throttle_Pedal` on the primary bus
    pub fn primary() -> Self {
        Self {
            bus: SignalBus::Primary,
            message: "Throttle".to_string(),
            signal: "Throttle_Pedal".to_string(),
        }
    }

    /// `Throttle_Hybrid.Throttle_Pedal` on the powertrain bus
    pub fn powertrain() -> Self {
        Self {
            bus: SignalBus::Powertrain,
            message: "Throttle_Hybrid".to_string(),
            signal: "Throttle_Pedal".to_string(),
        }
    }
}

/// Decoding rules for one variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantConfig {
    /// Driver torque magnitude above which the wheel counts as pressed
    pub steer_threshold: f64,

    /// Whether the variant exposes the powertrain (hybrid) bus
    #[serde(default)]
    pub has_powertrain_bus: bool,

    /// `Dash_State.Units` values meaning the cluster displays mph
    #[serde(default)]
    pub imperial_unit_codes: Vec<i64>,

    #[serde(default)]
    pub gears: Vec<GearEntry>,

    /// Explicit throttle location; see [`VariantConfig::throttle_source`]
    #[serde(default)]
    pub throttle: Option<ThrottleSource>,
}

impl VariantConfig {
    pub fn gear_table(&self) -> GearTable {
        GearTable::from_entries(&self.gears)
    }

    pub fn is_imperial_unit_code(&self, code: i64) -> bool {
        self.imperial_unit_codes.contains(&code)
    }

    /// Where the throttle pedal is read for this variant
    pub fn throttle_source(&self) -> ThrottleSource {
        match &self.throttle {
            Some(source) => source.clone(),
            None if self.has_powertrain_bus => ThrottleSource::powertrain(),
            None => ThrottleSource::primary(),
        }
    }
}

/// Per-variant decoding rules, keyed by variant identifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleSchema {
    #[serde(default)]
    pub variants: BTreeMap<String, VariantConfig>,
}

/// Shared transmission value table of the global platform
fn default_gears() -> Vec<GearEntry> {
    let mut gears = vec![GearEntry::new(0, "N")];
    gears.extend((1..=6).map(|code| GearEntry::new(code, "D")));
    gears.push(GearEntry::new(14, "R"));
    gears.push(GearEntry::new(15, "P"));
    gears
}

/// Cluster unit codes observed to mean mph:
/// EDM Crosstrek 2019 reports 1 and 2, UDM Crosstrek 2020 Hybrid and UDM
/// Forester 2019 report 7.
const IMPERIAL_UNIT_CODES: [i64; 3] = [1, 2, 7];

const STEER_THRESHOLD: f64 = 80.0;

impl VehicleSchema {
    /// The built-in schema covering every [`VehicleVariant`]
    pub fn builtin() -> Self {
        let variants = VehicleVariant::ALL
            .into_iter()
            .map(|variant| {
                let has_powertrain_bus = variant == VehicleVariant::Crosstrek2020Hybrid;
                let throttle = if has_powertrain_bus {
                    ThrottleSource::powertrain()
                } else {
                    ThrottleSource::primary()
                };
                let config = VariantConfig {
                    steer_threshold: STEER_THRESHOLD,
                    has_powertrain_bus,
                    imperial_unit_codes: IMPERIAL_UNIT_CODES.to_vec(),
                    gears: default_gears(),
                    throttle: Some(throttle),
                };
                (variant.as_str().to_string(), config)
            })
            .collect();

        Self { variants }
    }

    /// Parse a schema from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let schema: Self =
            toml::from_str(content).map_err(|e| DecoderError::SchemaParseError(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Load a schema from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        log::info!("Loading vehicle schema: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<()> {
        for (name, config) in &self.variants {
            if !config.steer_threshold.is_finite() || config.steer_threshold < 0.0 {
                return Err(DecoderError::SchemaParseError(format!(
                    "Variant {}: steer_threshold must be a non-negative number",
                    name
                )));
            }
            if !config.has_powertrain_bus
                && config.throttle_source().bus == SignalBus::Powertrain
            {
                return Err(DecoderError::SchemaParseError(format!(
                    "Variant {}: throttle is on the powertrain bus but the variant has none",
                    name
                )));
            }
            if name.parse::<VehicleVariant>().is_err() {
                log::warn!("Schema entry '{}' does not name a supported variant", name);
            }
        }
        Ok(())
    }

    /// Decoding rules for `variant`
    pub fn variant(&self, variant: VehicleVariant) -> Result<&VariantConfig> {
        self.variants.get(variant.as_str()).ok_or_else(|| {
            DecoderError::ConfigurationError(format!(
                "Vehicle schema has no entry for variant {}",
                variant
            ))
        })
    }

    /// Add or replace the rules of one variant
    pub fn insert(&mut self, variant: VehicleVariant, config: VariantConfig) {
        self.variants.insert(variant.as_str().to_string(), config);
    }

    /// Replace a variant's gear table with the `Transmission.Gear` value
    /// descriptions of a DBC database
    pub fn with_dbc_gear_table(mut self, variant: VehicleVariant, db: &SignalDatabase) -> Result<Self> {
        let gears = GearTable::from_database(db, "Transmission", "Gear")?;
        let config = self.variants.get_mut(variant.as_str()).ok_or_else(|| {
            DecoderError::ConfigurationError(format!(
                "Vehicle schema has no entry for variant {}",
                variant
            ))
        })?;

        log::debug!("Using {} gear codes from DBC for {}", gears.len(), variant);
        config.gears = gears.entries();
        Ok(self)
    }
}
