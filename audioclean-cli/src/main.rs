//! `audioclean`: batch driver for audioclean-core.
//!
//! Reads the input files, resolves a `PipelineConfig` from the settings file
//! plus command-line overrides, runs the batch, and writes every artifact
//! under `--out-dir` together with a `report.json`.

mod output;
mod settings;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use audioclean_core::{
    AudioCodec, AudioFormat, FfmpegCodec, ItemState, ItemStatusEvent, NativeCodec, Pipeline,
    UploadedAudio,
};
use clap::{Parser, ValueEnum};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

use output::{merge_in_input_order, unreadable_entry, RunReport};
use settings::{default_settings_path, load_settings, save_settings, CliSettings};

fn main() -> ExitCode {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("audioclean=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            warn!(failed, "some items failed");
            ExitCode::from(2)
        }
        Err(err) => {
            eprintln!("audioclean error: {err:?}");
            ExitCode::from(1)
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "audioclean",
    version,
    about = "Normalize, trim silence, denoise and split audio recordings"
)]
struct Cli {
    /// Audio files to process (wav, mp3, flac).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Directory receiving one subdirectory of artifacts per input.
    #[arg(short, long, default_value = "audioclean-out")]
    out_dir: PathBuf,
    /// Settings file (JSON). Defaults to the user data directory.
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Shortest silence to remove, in milliseconds (300-3000).
    #[arg(long)]
    min_silence_ms: Option<u64>,
    /// Level below which audio counts as silence, in dBFS (-70 to -10).
    #[arg(long, allow_negative_numbers = true)]
    silence_threshold_db: Option<f32>,
    /// Length of the leading noise sample, in seconds (1-5).
    #[arg(long)]
    noise_sample_secs: Option<f32>,
    /// Segment length in minutes (1-10).
    #[arg(long)]
    segment_minutes: Option<u32>,
    /// Output format for cleaned audio and segments.
    #[arg(long, value_enum)]
    format: Option<FormatArg>,
    /// Do not split into segments or build the zip archive.
    #[arg(long)]
    no_segmentation: bool,
    /// Skip noise reduction.
    #[arg(long)]
    no_noise_reduction: bool,
    /// Do not export the whole cleaned recording.
    #[arg(long)]
    no_cleaned: bool,
    /// Number of files processed in parallel.
    #[arg(short, long)]
    jobs: Option<usize>,
    /// ffmpeg executable used for mp3/flac output.
    #[arg(long)]
    ffmpeg: Option<PathBuf>,
    /// Write the resolved settings back to the settings file.
    #[arg(long)]
    save_settings: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum FormatArg {
    Wav,
    Mp3,
    Flac,
}

impl From<FormatArg> for AudioFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Wav => AudioFormat::Wav,
            FormatArg::Mp3 => AudioFormat::Mp3,
            FormatArg::Flac => AudioFormat::Flac,
        }
    }
}

impl Cli {
    fn apply_overrides(&self, settings: &mut CliSettings) {
        if let Some(v) = self.min_silence_ms {
            settings.min_silence_ms = v;
        }
        if let Some(v) = self.silence_threshold_db {
            settings.silence_threshold_db = v;
        }
        if let Some(v) = self.noise_sample_secs {
            settings.noise_sample_secs = v;
        }
        if let Some(v) = self.segment_minutes {
            settings.segment_duration_min = v;
        }
        if let Some(format) = self.format {
            settings.output_format = AudioFormat::from(format).extension().into();
        }
        if self.no_segmentation {
            settings.segmentation_enabled = false;
        }
        if self.no_noise_reduction {
            settings.noise_reduction_enabled = false;
        }
        if self.no_cleaned {
            settings.export_cleaned = false;
        }
        if let Some(jobs) = self.jobs {
            settings.jobs = jobs;
        }
        if let Some(path) = &self.ffmpeg {
            settings.ffmpeg_path = Some(path.display().to_string());
        }
    }
}

/// Returns the number of failed items.
fn run(cli: Cli) -> Result<usize> {
    let settings_path = cli.settings.clone().unwrap_or_else(default_settings_path);
    let settings = resolve_settings(&cli, &settings_path)?;
    debug!(path = %settings_path.display(), ?settings, "settings resolved");

    if cli.save_settings {
        save_settings(&settings_path, &settings)
            .with_context(|| format!("failed to save {}", settings_path.display()))?;
        info!(path = %settings_path.display(), "settings saved");
    }

    let config = settings.pipeline_config();
    let codec = select_codec(&settings)?;
    let pipeline = Pipeline::new(config)?
        .with_codec(codec)
        .with_workers(settings.jobs);

    let mut unreadable = Vec::new();
    let mut items = Vec::with_capacity(cli.inputs.len());
    for (position, path) in cli.inputs.iter().enumerate() {
        match UploadedAudio::from_path(path) {
            Ok(item) => items.push(item),
            Err(e) => {
                error!(path = %path.display(), "cannot read input: {e}");
                unreadable.push((position, unreadable_entry(path, &e)));
            }
        }
    }

    let progress = {
        let rx = pipeline.subscribe();
        std::thread::spawn(move || log_progress(rx))
    };
    let batch = pipeline.run_batch(&items);
    drop(pipeline);
    let _ = progress.join();
    let batch = batch?;

    let entries = output::write_batch(&cli.out_dir, &batch)?;
    let report = RunReport {
        items: merge_in_input_order(entries, unreadable),
        diagnostics: batch.diagnostics,
    };
    let report_path = output::write_report(&cli.out_dir, &report)?;

    for entry in &report.items {
        println!("{}", output::summary_line(entry));
    }
    info!(report = %report_path.display(), "done");

    Ok(report.failed())
}

/// Settings file plus flag overrides. Out-of-range flag values are
/// rejected; values from the file are clamped when it is loaded.
fn resolve_settings(cli: &Cli, settings_path: &Path) -> Result<CliSettings> {
    let mut settings = load_settings(settings_path);
    cli.apply_overrides(&mut settings);
    settings
        .pipeline_config()
        .validate()
        .context("invalid command-line option")?;
    settings.normalize();
    Ok(settings)
}

fn select_codec(settings: &CliSettings) -> Result<Arc<dyn AudioCodec>> {
    if let Some(path) = &settings.ffmpeg_path {
        return Ok(Arc::new(FfmpegCodec::new(path)));
    }
    match settings.output_format() {
        AudioFormat::Wav => Ok(Arc::new(NativeCodec::new())),
        format => match FfmpegCodec::locate() {
            Some(codec) => {
                info!(ffmpeg = %codec.executable().display(), "using ffmpeg for {format} output");
                Ok(Arc::new(codec))
            }
            None => bail!("{format} output needs ffmpeg: install it or pass --ffmpeg <PATH>"),
        },
    }
}

fn log_progress(mut rx: broadcast::Receiver<ItemStatusEvent>) {
    loop {
        match rx.blocking_recv() {
            Ok(event) => match event.state {
                ItemState::Failed(stage) => {
                    debug!(item = %event.item, %stage, "failed");
                }
                state => {
                    debug!(
                        item = %event.item,
                        ?state,
                        detail = event.detail.as_deref().unwrap_or(""),
                        "progress"
                    );
                }
            },
            Err(RecvError::Lagged(n)) => debug!(skipped = n, "progress events dropped"),
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audioclean_core::AudioCleanError;

    #[test]
    fn overrides_win_over_file_settings() {
        let cli = Cli::parse_from([
            "audioclean",
            "--silence-threshold-db",
            "-55",
            "--segment-minutes",
            "2",
            "--format",
            "flac",
            "--no-noise-reduction",
            "-j",
            "4",
            "in.wav",
        ]);
        let mut settings = CliSettings::default();
        cli.apply_overrides(&mut settings);
        settings.normalize();

        let config = settings.pipeline_config();
        assert_eq!(config.silence_threshold_db, -55.0);
        assert_eq!(config.segment_duration_min, 2);
        assert_eq!(config.output_format, AudioFormat::Flac);
        assert!(!config.noise_reduction_enabled);
        assert!(config.segmentation_enabled);
        assert_eq!(settings.jobs, 4);
        assert_eq!(cli.inputs, vec![PathBuf::from("in.wav")]);
    }

    #[test]
    fn out_of_range_flags_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let cli = Cli::parse_from(["audioclean", "--min-silence-ms", "50", "in.wav"]);
        let err = resolve_settings(&cli, &path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AudioCleanError>(),
            Some(AudioCleanError::InvalidConfig(_))
        ));

        let cli = Cli::parse_from(["audioclean", "--silence-threshold-db", "-90", "in.wav"]);
        assert!(resolve_settings(&cli, &path).is_err());
    }

    #[test]
    fn out_of_range_file_values_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"minSilenceMs": 50, "segmentDurationMin": 40}"#).unwrap();
        let cli = Cli::parse_from(["audioclean", "-j", "0", "in.wav"]);
        let settings = resolve_settings(&cli, &path).unwrap();
        assert_eq!(settings.min_silence_ms, 300);
        assert_eq!(settings.segment_duration_min, 10);
        assert_eq!(settings.jobs, 1);
    }

    #[test]
    fn inputs_are_required() {
        assert!(Cli::try_parse_from(["audioclean"]).is_err());
    }

    #[test]
    fn explicit_ffmpeg_path_is_used() {
        let settings = CliSettings {
            ffmpeg_path: Some("/opt/ffmpeg/bin/ffmpeg".into()),
            output_format: "mp3".into(),
            ..CliSettings::default()
        };
        assert!(select_codec(&settings).is_ok());
    }

    #[test]
    fn wav_output_needs_no_ffmpeg() {
        assert!(select_codec(&CliSettings::default()).is_ok());
    }
}
