pub mod audio;
pub mod analysis;
pub mod markers;
pub mod chopper;
pub mod silence;
pub mod level;
pub mod resample;
pub mod naming;
pub mod catalog;
pub mod pipeline;
pub mod session;
pub mod preview;
pub mod export;
pub mod worker;
pub mod error;

pub use error::{ChopError, Result};

/// Where an affix lands relative to a file or folder name.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum AffixPosition {
    #[default]
    Prefix,
    Suffix,
}

impl std::str::FromStr for AffixPosition {
    type Err = ChopError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prefix" => Ok(AffixPosition::Prefix),
            "suffix" => Ok(AffixPosition::Suffix),
            other => Err(ChopError::InvalidUserInput(format!(
                "expected 'prefix' or 'suffix', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OnsetSettings {
    pub min_gap: f64, // Seconds between two kept onsets
    pub max_gap: f64, // Accepted for parity with the UI slider, never enforced
    pub threshold: f32, // Relative to the envelope maximum, 0..1
}

impl Default for OnsetSettings {
    fn default() -> Self {
        Self {
            min_gap: 0.3,
            max_gap: 0.5,
            threshold: 0.1,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SilenceSettings {
    pub threshold_db: f32, // Below the loudest frame, <= 0
    pub fade_in: f64, // Seconds
    pub fade_out: f64, // Seconds
    pub buffer_seconds: f64, // Kept around the detected sound on each side
}

impl Default for SilenceSettings {
    fn default() -> Self {
        Self {
            threshold_db: -40.0,
            fade_in: 0.0,
            fade_out: 0.0,
            buffer_seconds: 0.5,
        }
    }
}

/// Audio transforms applied to every sample during a save.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub crop_silence: bool,
    pub silence: SilenceSettings,
    pub normalize: bool,
    pub target_db: f32, // RMS level in dBFS
    pub target_sample_rate: u32, // Always applied
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            crop_silence: false,
            silence: SilenceSettings::default(),
            normalize: false,
            target_db: -3.0,
            target_sample_rate: 44100,
        }
    }
}

/// Naming and placement toggles, captured once per save.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NamingDirective {
    pub pack_name: Option<String>,
    pub pack_name_position: AffixPosition,
    pub create_pack_folder: bool,
    pub affix_pack_name: bool, // Put the pack name on every sample
    pub signature: Option<String>,
    pub signature_position: AffixPosition,
    pub sign_pack: bool,
    pub sign_samples: bool,
    pub route_by_tag: bool,
}

/// Parses a sample rate typed by the user.
pub fn parse_sample_rate(text: &str) -> Result<u32> {
    let rate: i64 = text
        .trim()
        .parse()
        .map_err(|_| ChopError::InvalidUserInput(format!("invalid sample rate '{}'", text.trim())))?;
    if rate <= 0 || rate > u32::MAX as i64 {
        return Err(ChopError::InvalidUserInput(format!(
            "sample rate must be a positive integer, got {}",
            rate
        )));
    }
    Ok(rate as u32)
}
