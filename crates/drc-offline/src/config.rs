//! Render configuration (JSON)

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use drc_dsp::monoparts::validate_parts;
use drc_dsp::{DrcConfig, MonoPart};

use crate::error::{OfflineError, OfflineResult};

/// Sample encoding of the rendered WAV file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// 32-bit IEEE float
    #[default]
    Float32,
    /// 16-bit PCM
    Int16,
    /// 24-bit PCM
    Int24,
}

impl OutputFormat {
    pub fn from_bits(bits: u16) -> OfflineResult<Self> {
        match bits {
            16 => Ok(Self::Int16),
            24 => Ok(Self::Int24),
            32 => Ok(Self::Float32),
            other => Err(OfflineError::UnsupportedFormat(format!(
                "{} bits per sample (use 16, 24 or 32)",
                other
            ))),
        }
    }

    pub fn bits_per_sample(&self) -> u16 {
        match self {
            Self::Int16 => 16,
            Self::Int24 => 24,
            Self::Float32 => 32,
        }
    }
}

/// Everything needed to render one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Compressor and limiter parameters. Channel count and sample rate are
    /// taken from the input file.
    pub drc: DrcConfig,

    /// Run the compressor stage
    pub compressor: bool,

    /// Run the spike limiter after the compressor
    pub limiter: bool,

    /// Block ranges folded to mono (stereo input only)
    pub mono_parts: Vec<MonoPart>,

    /// Output sample encoding
    pub output_format: OutputFormat,

    /// Write the applied gain trace to this file
    pub gain_trace: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            drc: DrcConfig::default(),
            compressor: true,
            limiter: true,
            mono_parts: Vec::new(),
            output_format: OutputFormat::Float32,
            gain_trace: None,
        }
    }
}

impl RenderConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> OfflineResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| OfflineError::ConfigError(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)?;
        log::debug!("RenderConfig: loaded {}", path.display());
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> OfflineResult<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Checks that do not depend on the input file
    pub fn validate(&self) -> OfflineResult<()> {
        if !self.mono_parts.is_empty() {
            validate_parts(&self.mono_parts)?;
        }
        if !self.compressor && !self.limiter && self.mono_parts.is_empty() && self.gain_trace.is_none() {
            log::warn!("RenderConfig: every stage is disabled, output will equal input");
        }
        if self.gain_trace.is_some() && !self.compressor {
            return Err(OfflineError::ConfigError(
                "a gain trace needs the compressor stage".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_drc(mut self, drc: DrcConfig) -> Self {
        self.drc = drc;
        self
    }

    pub fn with_limiter(mut self, enabled: bool) -> Self {
        self.limiter = enabled;
        self
    }

    pub fn with_compressor(mut self, enabled: bool) -> Self {
        self.compressor = enabled;
        self
    }

    pub fn with_mono_parts(mut self, parts: Vec<MonoPart>) -> Self {
        self.mono_parts = parts;
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_gain_trace(mut self, path: impl Into<PathBuf>) -> Self {
        self.gain_trace = Some(path.into());
        self
    }
}
