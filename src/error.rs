use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChopError {
    #[error("no audio loaded for chopping")]
    NoAudioLoaded,

    #[error("can't chop without markers or onset detection")]
    EmptyMarkerSet,

    #[error("invalid sample rate {0}, must be greater than zero")]
    InvalidSampleRate(u32),

    #[error("{0} is entirely silent, its level can't be normalized")]
    SilentInput(String),

    #[error("sample file {} not found", .0.display())]
    MissingSampleFile(PathBuf),

    #[error("failed to rename folder {} to {}: {reason}", .from.display(), .to.display())]
    FolderRenameFailed {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("invalid input: {0}")]
    InvalidUserInput(String),

    #[error("failed to decode {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("resampling {from}Hz -> {to}Hz failed: {reason}")]
    Resample { from: u32, to: u32, reason: String },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("tag table error: {0}")]
    TagTable(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChopError>;
