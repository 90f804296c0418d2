//! Recording replay
//!
//! A recording is a JSON-lines file with one control cycle per line:
//!
//! ```text
//! {"timestamp_ns": 10000000, "frames": [{"bus": 0, "address": 314, "data": [...], "timestamp_ns": 9800000}]}
//! ```
//!
//! Each cycle's frames go through one `CanParser` per bus, then through the
//! `StateDecoder`. One output line per cycle carries the decoded state and
//! whether every checked message was fresh.

use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use thiserror::Error;
use vehicle_state_decoder::schema::{camera_bus_spec, powertrain_bus_spec, primary_bus_spec};
use vehicle_state_decoder::{
    CanFrame, CanParser, DecoderConfig, DecoderError, SignalDatabase, StateDecoder,
    VehicleSchema, VehicleStateSnapshot, VehicleVariant,
};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("line {line}: invalid cycle record: {source}")]
    InvalidRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: timestamp {timestamp_ns} is earlier than the previous cycle")]
    TimeWentBackwards { line: usize, timestamp_ns: u64 },

    #[error("Decoder setup failed: {0}")]
    Setup(#[from] DecoderError),

    #[error("Failed to write output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One recorded control cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleRecord {
    pub timestamp_ns: u64,
    #[serde(default)]
    pub frames: Vec<CanFrame>,
}

/// One output line
#[derive(Debug, Serialize)]
struct CycleOutput<'a> {
    timestamp_ns: u64,
    can_valid: bool,
    state: &'a VehicleStateSnapshot,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub cycles: u64,
    pub frames: u64,
    /// Cycles where at least one checked message was stale
    pub invalid_cycles: u64,
    pub resets: u64,
}

/// Parsers and decoder for one vehicle
pub struct Replay {
    primary: CanParser,
    camera: CanParser,
    powertrain: Option<CanParser>,
    decoder: StateDecoder,
    reset_gap_ns: u64,
    /// Freshness of the previous cycle, for logging transitions only
    was_valid: bool,
}

impl Replay {
    pub fn new(
        db: &SignalDatabase,
        schema: &VehicleSchema,
        variant: VehicleVariant,
        config: DecoderConfig,
        reset_gap_ns: u64,
    ) -> Result<Self, ReplayError> {
        let rules = schema.variant(variant)?;
        let powertrain = match powertrain_bus_spec(rules) {
            Some(spec) => Some(CanParser::new(db, &spec)?),
            None => None,
        };

        Ok(Self {
            primary: CanParser::new(db, &primary_bus_spec(rules))?,
            camera: CanParser::new(db, &camera_bus_spec())?,
            powertrain,
            decoder: StateDecoder::with_config(variant, schema, config)?,
            reset_gap_ns,
            was_valid: true,
        })
    }

    /// Feed one cycle; returns the freshness flag and the decoded state
    pub fn step(&mut self, record: &CycleRecord) -> (bool, VehicleStateSnapshot) {
        self.primary.update(&record.frames);
        self.camera.update(&record.frames);
        if let Some(pt) = self.powertrain.as_mut() {
            pt.update(&record.frames);
        }

        let now = record.timestamp_ns;
        let can_valid = self.primary.can_valid(now)
            && self.camera.can_valid(now)
            && self.powertrain.as_ref().map_or(true, |pt| pt.can_valid(now));
        if self.was_valid && !can_valid {
            log::warn!("t={}: checked messages went stale", now);
        } else if !self.was_valid && can_valid {
            log::info!("t={}: all checked messages fresh", now);
        }
        self.was_valid = can_valid;

        let state = self
            .decoder
            .update(&self.primary, &self.camera, self.powertrain.as_ref());
        (can_valid, state)
    }

    /// Replay every cycle of `input`, writing one JSON line per cycle
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        input: R,
        mut output: W,
    ) -> Result<ReplaySummary, ReplayError> {
        let mut summary = ReplaySummary::default();
        let mut last_timestamp: Option<u64> = None;

        for (index, line) in input.lines().enumerate() {
            let line = line?;
            let line_no = index + 1;
            if line.trim().is_empty() {
                continue;
            }

            let record: CycleRecord = serde_json::from_str(&line)
                .map_err(|source| ReplayError::InvalidRecord { line: line_no, source })?;

            if let Some(previous) = last_timestamp {
                if record.timestamp_ns < previous {
                    return Err(ReplayError::TimeWentBackwards {
                        line: line_no,
                        timestamp_ns: record.timestamp_ns,
                    });
                }
                if record.timestamp_ns - previous > self.reset_gap_ns {
                    log::info!(
                        "line {}: {} ms gap, resetting decoder",
                        line_no,
                        (record.timestamp_ns - previous) / 1_000_000
                    );
                    self.decoder.reset();
                    summary.resets += 1;
                }
            }
            last_timestamp = Some(record.timestamp_ns);

            let (can_valid, state) = self.step(&record);

            summary.cycles += 1;
            summary.frames += record.frames.len() as u64;
            if !can_valid {
                summary.invalid_cycles += 1;
            }

            serde_json::to_writer(
                &mut output,
                &CycleOutput {
                    timestamp_ns: record.timestamp_ns,
                    can_valid,
                    state: &state,
                },
            )?;
            output.write_all(b"\n")?;
        }

        output.flush()?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vehicle_state_decoder::signals::dbc::parse_dbc_str;
    use vehicle_state_decoder::GearShifter;

    const DBC: &str = include_str!("../../vehicle-state-decoder/tests/fixtures/global.dbc");

    fn replay(variant: VehicleVariant) -> Replay {
        let db = parse_dbc_str(DBC, "global.dbc").unwrap();
        Replay::new(
            &db,
            &VehicleSchema::builtin(),
            variant,
            DecoderConfig::default(),
            1_000_000_000,
        )
        .unwrap()
    }

    fn record(timestamp_ns: u64, frames: Vec<CanFrame>) -> String {
        serde_json::to_string(&CycleRecord {
            timestamp_ns,
            frames,
        })
        .unwrap()
    }

    fn output_lines(output: &[u8]) -> Vec<serde_json::Value> {
        String::from_utf8(output.to_vec())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_replay_hybrid_cycle() {
        let mut replay = replay(VehicleVariant::Crosstrek2020Hybrid);

        // Throttle_Pedal at bit 8, Gear at bit 24
        let input = [
            record(0, vec![CanFrame::new(1, 320, vec![0, 51, 0, 0, 0, 0, 0, 0], 0)]),
            record(
                10_000_000,
                vec![CanFrame::new(1, 72, vec![0, 0, 0, 15, 0, 0, 0, 0], 10_000_000)],
            ),
        ]
        .join("\n");

        let mut output = Vec::new();
        let summary = replay.run(input.as_bytes(), &mut output).unwrap();
        assert_eq!(summary.cycles, 2);
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.resets, 0);
        // No primary frames at all: never valid
        assert_eq!(summary.invalid_cycles, 2);

        let lines = output_lines(&output);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["can_valid"], false);
        assert!((lines[1]["state"]["gas"].as_f64().unwrap() - 0.2).abs() < 1e-9);
        assert_eq!(lines[1]["state"]["gear_shifter"], "park");
        assert_eq!(lines[1]["timestamp_ns"], 10_000_000);
    }

    #[test]
    fn test_step_without_powertrain() {
        let mut replay = replay(VehicleVariant::Impreza);
        let (can_valid, state) = replay.step(&CycleRecord {
            timestamp_ns: 0,
            frames: Vec::new(),
        });
        assert!(!can_valid);
        assert_eq!(state.gear_shifter, GearShifter::Unknown);
        assert!(state.door_open);
    }

    #[test]
    fn test_step_validity_follows_checked_messages() {
        let mut replay = replay(VehicleVariant::Impreza);

        // Every checked message on the primary and camera buses
        let frames = |t: u64| {
            [(0, 2), (0, 314), (0, 326), (0, 1745), (2, 801), (2, 802)]
                .into_iter()
                .map(|(bus, address)| CanFrame::new(bus, address, vec![0; 8], t))
                .collect::<Vec<_>>()
        };

        let (can_valid, _) = replay.step(&CycleRecord {
            timestamp_ns: 0,
            frames: frames(0),
        });
        assert!(can_valid);

        // 50 Hz messages time out after 200 ms
        let (can_valid, _) = replay.step(&CycleRecord {
            timestamp_ns: 300_000_000,
            frames: Vec::new(),
        });
        assert!(!can_valid);

        let (can_valid, _) = replay.step(&CycleRecord {
            timestamp_ns: 310_000_000,
            frames: frames(310_000_000),
        });
        assert!(can_valid);
    }

    #[test]
    fn test_gap_resets_decoder() {
        let mut replay = replay(VehicleVariant::Impreza);

        // LEFT_BLINKER is bit 44
        let blink_on = CanFrame::new(0, 326, vec![0, 0, 0, 0, 0, 0x10, 0, 0], 0);
        let blink_off = CanFrame::new(0, 326, vec![0; 8], 10_000_000);
        let input = [
            record(0, vec![blink_on]),
            record(10_000_000, vec![blink_off]),
            record(3_000_000_000, Vec::new()),
        ]
        .join("\n");

        let mut output = Vec::new();
        let summary = replay.run(input.as_bytes(), &mut output).unwrap();
        assert_eq!(summary.resets, 1);

        let lines = output_lines(&output);
        assert_eq!(lines[0]["state"]["left_blinker"], true);
        assert_eq!(lines[1]["state"]["left_blinker"], true);
        // Without the reset the counter would still hold 48 cycles
        assert_eq!(lines[2]["state"]["left_blinker"], false);
    }

    #[test]
    fn test_blank_lines_skipped() {
        let mut replay = replay(VehicleVariant::Ascent);
        let input = format!("\n{}\n\n", record(0, Vec::new()));

        let mut output = Vec::new();
        let summary = replay.run(input.as_bytes(), &mut output).unwrap();
        assert_eq!(summary.cycles, 1);
    }

    #[test]
    fn test_invalid_record() {
        let mut replay = replay(VehicleVariant::Ascent);
        let input = format!("{}\nnot json\n", record(0, Vec::new()));

        let result = replay.run(input.as_bytes(), Vec::new());
        assert!(matches!(result, Err(ReplayError::InvalidRecord { line: 2, .. })));
    }

    #[test]
    fn test_time_going_backwards() {
        let mut replay = replay(VehicleVariant::Ascent);
        let input = [record(50, Vec::new()), record(40, Vec::new())].join("\n");

        let result = replay.run(input.as_bytes(), Vec::new());
        assert!(matches!(
            result,
            Err(ReplayError::TimeWentBackwards {
                line: 2,
                timestamp_ns: 40
            })
        ));
    }

    #[test]
    fn test_missing_message_in_dbc() {
        let result = Replay::new(
            &SignalDatabase::new(),
            &VehicleSchema::builtin(),
            VehicleVariant::Ascent,
            DecoderConfig::default(),
            0,
        );
        assert!(matches!(result, Err(ReplayError::Setup(_))));
    }
}
