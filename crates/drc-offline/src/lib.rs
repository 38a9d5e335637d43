//! drc-offline: File rendering for the QADRC engine
//!
//! Decodes WAV files, streams them through the compressor / spike limiter /
//! mono-section chain in nominal-length blocks and writes the result.
//!
//! ## Usage
//! ```ignore
//! use drc_offline::{RenderConfig, render_file};
//!
//! let config = RenderConfig::load("drc.json")?;
//! let stats = render_file("in.wav", "out.wav", &config)?;
//! println!("peak {:.3} -> {:.3}", stats.input_peak, stats.output_peak);
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod wav;

pub use config::{OutputFormat, RenderConfig};
pub use error::{OfflineError, OfflineResult};
pub use pipeline::{RenderStats, build_chain, render, render_file};
pub use wav::{WavAudio, read_wav, write_wav};
