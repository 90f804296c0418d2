//! Configuration loading and parsing

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use vehicle_state_decoder::{DecoderConfig, VehicleVariant};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub vehicle: VehicleConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    /// Recorded cycles, one JSON record per line
    #[serde(default)]
    pub recordings: Vec<PathBuf>,
    pub dbc: Option<PathBuf>,
    /// Vehicle schema TOML; the built-in schema is used when absent
    pub schema: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VehicleConfig {
    pub variant: Option<String>,
    /// Take the gear table from the DBC `Transmission.Gear` value descriptions
    #[serde(default)]
    pub gears_from_dbc: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// One `<recording>.jsonl` per input; stdout when absent
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplayConfig {
    /// Cycle gap that resets the decoder state
    #[serde(default = "default_reset_gap_ms")]
    pub reset_gap_ms: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            reset_gap_ms: default_reset_gap_ms(),
        }
    }
}

fn default_reset_gap_ms() -> u64 {
    1000
}

/// Command line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub recordings: Vec<PathBuf>,
    pub dbc: Option<PathBuf>,
    pub schema: Option<PathBuf>,
    pub variant: Option<String>,
    pub output_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn apply_overrides(mut self, overrides: Overrides) -> Self {
        if !overrides.recordings.is_empty() {
            self.input.recordings = overrides.recordings;
        }
        if overrides.dbc.is_some() {
            self.input.dbc = overrides.dbc;
        }
        if overrides.schema.is_some() {
            self.input.schema = overrides.schema;
        }
        if overrides.variant.is_some() {
            self.vehicle.variant = overrides.variant;
        }
        if overrides.output_dir.is_some() {
            self.output.dir = overrides.output_dir;
        }
        self
    }

    pub fn variant(&self) -> Result<VehicleVariant> {
        let name = self
            .vehicle
            .variant
            .as_deref()
            .ok_or_else(|| anyhow!("No vehicle variant given (use --variant or [vehicle] variant)"))?;
        name.parse::<VehicleVariant>()
            .with_context(|| format!("Invalid vehicle variant '{}'", name))
    }

    pub fn dbc(&self) -> Result<&Path> {
        self.input
            .dbc
            .as_deref()
            .ok_or_else(|| anyhow!("No DBC file given (use --dbc or [input] dbc)"))
    }

    pub fn reset_gap_ns(&self) -> u64 {
        self.replay.reset_gap_ms.saturating_mul(1_000_000)
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [input]
            recordings = ["drive_01.jsonl", "drive_02.jsonl"]
            dbc = "subaru_global.dbc"

            [vehicle]
            variant = "forester"
            gears_from_dbc = true

            [output]
            dir = "out"

            [decoder]
            blink_persist = 30
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.input.recordings.len(), 2);
        assert_eq!(config.dbc().unwrap(), Path::new("subaru_global.dbc"));
        assert_eq!(config.variant().unwrap(), VehicleVariant::Forester);
        assert!(config.vehicle.gears_from_dbc);
        assert_eq!(config.output.dir, Some(PathBuf::from("out")));
        assert_eq!(config.decoder.blink_persist, 30);
        assert_eq!(config.decoder.dt, 0.01);
        assert_eq!(config.reset_gap_ns(), 1_000_000_000);
    }

    #[test]
    fn test_overrides_win() {
        let config: AppConfig = toml::from_str(
            r#"
            [input]
            recordings = ["a.jsonl"]
            dbc = "a.dbc"

            [vehicle]
            variant = "ascent"
            "#,
        )
        .unwrap();

        let config = config.apply_overrides(Overrides {
            variant: Some("crosstrek_2020_hybrid".to_string()),
            output_dir: Some(PathBuf::from("replayed")),
            ..Overrides::default()
        });

        assert_eq!(config.input.recordings, vec![PathBuf::from("a.jsonl")]);
        assert_eq!(config.variant().unwrap(), VehicleVariant::Crosstrek2020Hybrid);
        assert_eq!(config.output.dir, Some(PathBuf::from("replayed")));
    }

    #[test]
    fn test_missing_required_values() {
        let config = AppConfig::default();
        assert!(config.variant().is_err());
        assert!(config.dbc().is_err());

        let config = config.apply_overrides(Overrides {
            variant: Some("beetle".to_string()),
            ..Overrides::default()
        });
        assert!(config.variant().is_err());
    }

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[replay]\nreset_gap_ms = 250").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.reset_gap_ns(), 250_000_000);
        assert!(config.input.recordings.is_empty());

        assert!(load_config(Path::new("/nonexistent/config.toml")).is_err());
    }
}
