use log::{debug, info};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use std::fs::File;
use std::path::Path;

use crate::{ChopError, Result};

/// Mono samples plus their rate. Immutable once loaded; all time math
/// downstream is in seconds.
#[derive(Clone, Debug)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    duration: f64,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(ChopError::InvalidSampleRate(sample_rate));
        }
        let duration = samples.len() as f64 / sample_rate as f64;
        Ok(Self {
            samples,
            sample_rate,
            duration,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample index for a time, `round(time * rate)` clamped to the buffer.
    pub fn index_at(&self, time: f64) -> usize {
        time_to_index(time, self.sample_rate).min(self.samples.len())
    }
}

pub fn time_to_index(time: f64, sample_rate: u32) -> usize {
    (time.max(0.0) * sample_rate as f64).round() as usize
}

/// Averages interleaved frames down to one channel.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

// Core decoding over any MediaSource; `origin` only labels errors.
pub fn load_audio_from_source(
    source: Box<dyn MediaSource>,
    hint: &Hint,
    origin: &Path,
) -> Result<AudioBuffer> {
    let decode_err = |reason: String| ChopError::Decode {
        path: origin.to_path_buf(),
        reason,
    };

    let mss = MediaSourceStream::new(source, Default::default());
    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| decode_err(format!("unsupported format: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| decode_err("no supported audio track".to_string()))?;

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &dec_opts)
        .map_err(|e| decode_err(format!("unsupported codec: {}", e)))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = 0usize;
    let mut interleaved: Vec<f32> = Vec::new();
    let mut scratch: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // End of stream surfaces as an unexpected-EOF IO error.
            Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(Error::ResetRequired) => break,
            Err(e) => return Err(decode_err(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                if channels == 0 {
                    sample_rate = spec.rate;
                    channels = spec.channels.count();
                }
                let needed = decoded.capacity() as u64;
                let too_small = scratch.as_ref().map_or(true, |buf| {
                    (buf.capacity() as u64) < needed * spec.channels.count() as u64
                });
                if too_small {
                    scratch = Some(SampleBuffer::new(needed, spec));
                }
                if let Some(buf) = scratch.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    interleaved.extend_from_slice(buf.samples());
                }
            }
            Err(Error::DecodeError(e)) => debug!("skipping undecodable packet in {}: {}", origin.display(), e),
            Err(e) => return Err(decode_err(e.to_string())),
        }
    }

    if sample_rate == 0 || channels == 0 {
        return Err(decode_err("no decodable audio frames".to_string()));
    }

    let mono = downmix(&interleaved, channels);
    info!(
        "Decoded {}: {} Hz, {} channel(s), {:.2}s",
        origin.display(),
        sample_rate,
        channels,
        mono.len() as f64 / sample_rate as f64
    );
    AudioBuffer::new(mono, sample_rate)
}

pub fn load_audio_file<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ChopError::MissingSampleFile(path.to_path_buf()));
    }
    let src = File::open(path)?;

    let mut hint = Hint::new();
    if let Some(ext_str) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext_str);
    }

    load_audio_from_source(Box::new(src), &hint, path)
}
