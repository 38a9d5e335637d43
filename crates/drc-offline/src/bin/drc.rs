//! drc - dynamic range compression and spike limiting for WAV files
//!
//! Usage:
//!   drc in.wav out.wav                         - default compressor + limiter
//!   drc in.wav out.wav --config drc.json       - parameters from a JSON file
//!   drc in.wav out.wav --mono-parts "3-8|20-25"
//!   drc --dump-config in.wav out.wav           - print the effective configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};

use drc_dsp::{MonoPart, SmoothingMode};
use drc_offline::{OutputFormat, RenderConfig, render_file};

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Block RMS with minimum and Gaussian smoothing
    Cascade,
    /// Per-sample peak with attack/release
    Exponential,
}

impl From<Mode> for SmoothingMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Cascade => SmoothingMode::Cascade,
            Mode::Exponential => SmoothingMode::Exponential,
        }
    }
}

#[derive(Parser)]
#[command(name = "drc", version, about = "Dynamic range compression and spike limiting for WAV files")]
struct Cli {
    /// Input WAV file
    input: PathBuf,

    /// Output WAV file
    output: PathBuf,

    /// JSON render configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Threshold in dB
    #[arg(long, allow_negative_numbers = true)]
    threshold: Option<f64>,

    /// Compression ratio
    #[arg(long)]
    ratio: Option<f64>,

    /// Knee width in dB
    #[arg(long)]
    knee: Option<f64>,

    /// Analysis block length in ms
    #[arg(long)]
    frame_ms: Option<f64>,

    /// Gaussian filter length in blocks (odd)
    #[arg(long)]
    filter_size: Option<usize>,

    /// Minimum filter length in blocks (odd)
    #[arg(long)]
    min_size: Option<usize>,

    /// Extra lookahead in ms
    #[arg(long)]
    lookahead: Option<f64>,

    /// Attack time in ms (exponential mode)
    #[arg(long)]
    attack: Option<f64>,

    /// Release time in ms (exponential mode)
    #[arg(long)]
    release: Option<f64>,

    /// Gain smoothing mode
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Spike limiter threshold (linear)
    #[arg(long)]
    limit: Option<f64>,

    /// Skip the compressor
    #[arg(long)]
    no_compressor: bool,

    /// Skip the spike limiter
    #[arg(long)]
    no_limiter: bool,

    /// Block ranges folded to mono, e.g. "3-8|20-25"
    #[arg(long)]
    mono_parts: Option<String>,

    /// Write one byte of applied gain per 10 ms to this file
    #[arg(long)]
    gain_trace: Option<PathBuf>,

    /// Output bits per sample (16, 24 or 32 float)
    #[arg(long)]
    bits: Option<u16>,

    /// Print the effective configuration as JSON before rendering
    #[arg(long)]
    dump_config: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn render_config(&self) -> Result<RenderConfig> {
        let mut config = match &self.config {
            Some(path) => RenderConfig::load(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => RenderConfig::default(),
        };

        let drc = &mut config.drc;
        if let Some(v) = self.threshold {
            drc.threshold_db = v;
        }
        if let Some(v) = self.ratio {
            drc.ratio = v;
        }
        if let Some(v) = self.knee {
            drc.knee_db = v;
        }
        if let Some(v) = self.frame_ms {
            drc.frame_ms = v;
        }
        if let Some(v) = self.filter_size {
            drc.filter_size = v;
        }
        if let Some(v) = self.min_size {
            drc.min_size = v;
        }
        if let Some(v) = self.lookahead {
            drc.lookahead_ms = v;
        }
        if let Some(v) = self.attack {
            drc.attack_ms = v;
        }
        if let Some(v) = self.release {
            drc.release_ms = v;
        }
        if let Some(mode) = self.mode {
            drc.mode = mode.into();
        }
        if let Some(v) = self.limit {
            drc.limiter_threshold = v;
        }

        if self.no_compressor {
            config.compressor = false;
        }
        if self.no_limiter {
            config.limiter = false;
        }
        if let Some(parts) = &self.mono_parts {
            config.mono_parts =
                MonoPart::parse_list(parts).with_context(|| format!("parsing --mono-parts '{}'", parts))?;
        }
        if let Some(path) = &self.gain_trace {
            config.gain_trace = Some(path.clone());
        }
        if let Some(bits) = self.bits {
            config.output_format = OutputFormat::from_bits(bits)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = cli.render_config()?;
    if cli.dump_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
    }

    let stats = render_file(&cli.input, &cli.output, &config)
        .with_context(|| format!("rendering {} -> {}", cli.input.display(), cli.output.display()))?;

    log::info!(
        "{}: {} frames, peak {:.4} -> {:.4}",
        cli.output.display(),
        stats.frames,
        stats.input_peak,
        stats.output_peak
    );
    Ok(())
}
