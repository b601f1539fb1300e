use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::{ChopError, Result};

fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut buffer = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut buffer, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(buffer.into_inner())
}

/// Writes mono 32-bit float WAV.
pub fn write_wav<P: AsRef<Path>>(path: P, samples: &[f32], sample_rate: u32) -> Result<()> {
    if sample_rate == 0 {
        return Err(ChopError::InvalidSampleRate(sample_rate));
    }
    let wav_data = encode_wav(samples, sample_rate)?;
    std::fs::write(path.as_ref(), wav_data)?;
    debug!("Wrote {} samples to {}", samples.len(), path.as_ref().display());
    Ok(())
}

/// Like `write_wav`, but stages the data next to `path` and renames it into
/// place, so a failure never leaves a truncated file behind.
pub fn write_wav_atomic<P: AsRef<Path>>(path: P, samples: &[f32], sample_rate: u32) -> Result<()> {
    if sample_rate == 0 {
        return Err(ChopError::InvalidSampleRate(sample_rate));
    }
    let path = path.as_ref();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let wav_data = encode_wav(samples, sample_rate)?;

    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(&wav_data)?;
    staged.flush()?;
    staged.persist(path).map_err(|e| ChopError::Io(e.error))?;
    debug!("Wrote {} samples to {}", samples.len(), path.display());
    Ok(())
}

/// `dir/name`, or `dir/stem_2.ext`, `dir/stem_3.ext`… if that is taken.
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = split_name(name);
    (2..)
        .map(|n| dir.join(format!("{}_{}{}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Swaps the extension for `.wav`, keeping names that already end in it.
pub fn with_wav_extension(name: &str) -> String {
    let (stem, ext) = split_name(name);
    if ext.eq_ignore_ascii_case(".wav") {
        name.to_string()
    } else {
        format!("{}.wav", stem)
    }
}

/// Splits `name` into stem and extension (with its dot). A leading dot is
/// part of the stem, so `.hidden` has no extension.
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && name[..idx].chars().any(|c| c != '.') => name.split_at(idx),
        _ => (name, ""),
    }
}
