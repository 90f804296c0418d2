//! Vehicle State Replay CLI
//!
//! Command-line front end for the vehicle-state-decoder library. It replays
//! recorded CAN cycles through the per-bus parsers and the state decoder and
//! writes one JSON snapshot per cycle.

use anyhow::{bail, Context, Result};
use clap::Parser;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use vehicle_state_decoder::signals::dbc::parse_dbc_file;
use vehicle_state_decoder::{SignalDatabase, VehicleSchema, VehicleVariant};

mod config;
mod replay;

use config::{AppConfig, Overrides};
use replay::{Replay, ReplaySummary};

/// Vehicle State Replay - Decode recorded CAN cycles into vehicle state
#[derive(Parser, Debug)]
#[command(name = "vehicle-state-cli")]
#[command(about = "Replay recorded CAN cycles through the vehicle state decoder", long_about = None)]
#[command(version)]
struct Args {
    /// Recordings to replay (JSON lines, one cycle per line)
    #[arg(value_name = "FILE")]
    recordings: Vec<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Path to the DBC file describing all three buses
    #[arg(long, value_name = "FILE")]
    dbc: Option<PathBuf>,

    /// Path to a vehicle schema TOML (default: built-in schema)
    #[arg(long, value_name = "FILE")]
    schema: Option<PathBuf>,

    /// Vehicle variant (ascent, impreza, forester, crosstrek_2020_hybrid)
    #[arg(long, value_name = "NAME")]
    variant: Option<String>,

    /// Output directory for decoded snapshots (default: stdout)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Print the known vehicle variants and exit
    #[arg(long)]
    list_variants: bool,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("Vehicle State CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", vehicle_state_decoder::VERSION);

    if args.list_variants {
        for variant in VehicleVariant::ALL {
            println!("{}", variant);
        }
        return Ok(());
    }

    let file_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    let config = file_config.apply_overrides(Overrides {
        recordings: args.recordings,
        dbc: args.dbc,
        schema: args.schema,
        variant: args.variant,
        output_dir: args.output,
    });

    run(&config)
}

/// Load the signal database and schema, then replay every recording
fn run(config: &AppConfig) -> Result<()> {
    let variant = config.variant()?;

    if config.input.recordings.is_empty() {
        bail!("No recordings given (pass files or set [input] recordings)");
    }

    let dbc_path = config.dbc()?;
    let db = parse_dbc_file(dbc_path)
        .with_context(|| format!("Failed to load DBC: {:?}", dbc_path))?;

    let mut schema = match &config.input.schema {
        Some(path) => VehicleSchema::from_file(path)
            .with_context(|| format!("Failed to load vehicle schema: {:?}", path))?,
        None => VehicleSchema::builtin(),
    };
    if config.vehicle.gears_from_dbc {
        schema = schema
            .with_dbc_gear_table(variant, &db)
            .context("Failed to take gear table from DBC")?;
    }

    let summaries: Vec<(PathBuf, ReplaySummary)> = match &config.output.dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {:?}", dir))?;

            // Recordings are independent: one decoder per recording
            config
                .input
                .recordings
                .par_iter()
                .map(|recording| -> Result<(PathBuf, ReplaySummary)> {
                    let out_path = output_path(dir, recording);
                    let out = File::create(&out_path)
                        .with_context(|| format!("Failed to create {:?}", out_path))?;
                    let summary = replay_recording(config, &db, &schema, variant, recording, out)?;
                    Ok((recording.clone(), summary))
                })
                .collect::<Result<_>>()?
        }
        None => {
            let mut summaries = Vec::new();
            for recording in &config.input.recordings {
                let stdout = io::stdout();
                let summary =
                    replay_recording(config, &db, &schema, variant, recording, stdout.lock())?;
                summaries.push((recording.clone(), summary));
            }
            summaries
        }
    };

    for (recording, summary) in &summaries {
        log::info!(
            "{:?}: {} cycles, {} frames, {} with stale messages, {} resets",
            recording,
            summary.cycles,
            summary.frames,
            summary.invalid_cycles,
            summary.resets
        );
    }

    Ok(())
}

fn replay_recording<W: Write>(
    config: &AppConfig,
    db: &SignalDatabase,
    schema: &VehicleSchema,
    variant: VehicleVariant,
    recording: &Path,
    output: W,
) -> Result<ReplaySummary> {
    log::info!("Replaying {:?} as {}", recording, variant);

    let input = File::open(recording)
        .with_context(|| format!("Failed to open recording: {:?}", recording))?;

    let mut replay = Replay::new(
        db,
        schema,
        variant,
        config.decoder.clone(),
        config.reset_gap_ns(),
    )?;

    let summary = replay
        .run(BufReader::new(input), BufWriter::new(output))
        .with_context(|| format!("Failed to replay {:?}", recording))?;

    Ok(summary)
}

/// `<dir>/<recording stem>.jsonl`
fn output_path(dir: &Path, recording: &Path) -> PathBuf {
    let stem = recording
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("recording");
    dir.join(format!("{}.jsonl", stem))
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path(Path::new("out"), Path::new("logs/drive_01.jsonl")),
            PathBuf::from("out/drive_01.jsonl")
        );
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "vehicle-state-cli",
            "--dbc",
            "global.dbc",
            "--variant",
            "impreza",
            "-vv",
            "a.jsonl",
            "b.jsonl",
        ]);
        assert_eq!(args.recordings.len(), 2);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.variant.as_deref(), Some("impreza"));
        assert!(args.output.is_none());
    }

    #[test]
    fn test_run_writes_one_file_per_recording() {
        let dir = tempfile::tempdir().unwrap();
        let recording = dir.path().join("drive.jsonl");
        fs::write(
            &recording,
            "{\"timestamp_ns\": 0, \"frames\": []}\n{\"timestamp_ns\": 10000000}\n",
        )
        .unwrap();

        let out_dir = dir.path().join("out");
        let config = AppConfig::default().apply_overrides(Overrides {
            recordings: vec![recording],
            dbc: Some(
                Path::new(env!("CARGO_MANIFEST_DIR"))
                    .join("../vehicle-state-decoder/tests/fixtures/global.dbc"),
            ),
            schema: None,
            variant: Some("forester".to_string()),
            output_dir: Some(out_dir.clone()),
        });

        run(&config).unwrap();

        let written = fs::read_to_string(out_dir.join("drive.jsonl")).unwrap();
        assert_eq!(written.lines().count(), 2);
    }

    #[test]
    fn test_run_requires_recordings() {
        let config = AppConfig::default().apply_overrides(Overrides {
            variant: Some("ascent".to_string()),
            ..Overrides::default()
        });
        assert!(run(&config).is_err());
    }
}
