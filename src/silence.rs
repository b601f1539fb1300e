use log::{debug, info};

use crate::chopper::Segment;
use crate::SilenceSettings;

const FRAME_SIZE: usize = 2048;
const HOP_SIZE: usize = 512;
const POWER_FLOOR: f64 = 1e-10;

/// Crops leading/trailing silence and applies linear fades.
#[derive(Clone, Debug, Default)]
pub struct SilenceTrimmer {
    settings: SilenceSettings,
}

impl SilenceTrimmer {
    pub fn new(settings: SilenceSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SilenceSettings {
        &self.settings
    }

    /// Crops to the sounding region plus the safety buffer, then fades.
    /// A segment with no sound above the threshold comes back untouched.
    pub fn trim(&self, segment: Segment) -> Segment {
        match crop_silence(segment, self.settings.threshold_db, self.settings.buffer_seconds) {
            Ok(mut cropped) => {
                apply_fades(
                    &mut cropped.samples,
                    cropped.sample_rate,
                    self.settings.fade_in,
                    self.settings.fade_out,
                );
                cropped
            }
            Err(untouched) => untouched,
        }
    }
}

/// Crops `segment` to its non-silent span widened by `buffer_seconds` on
/// each side. Gives the segment back as `Err` when it is entirely silent.
pub fn crop_silence(
    mut segment: Segment,
    threshold_db: f32,
    buffer_seconds: f64,
) -> std::result::Result<Segment, Segment> {
    let intervals = non_silent_intervals(&segment.samples, threshold_db.abs());
    let (first, last) = match (intervals.first(), intervals.last()) {
        (Some(first), Some(last)) => (first.0, last.1),
        _ => {
            info!("Segment is entirely silent, leaving it as is");
            return Err(segment);
        }
    };

    let rate = segment.sample_rate as f64;
    let pad = (buffer_seconds.max(0.0) * rate) as usize;
    let start = first.saturating_sub(pad);
    let end = (last + pad).min(segment.samples.len());

    info!("Cropping from {:.2}s to {:.2}s", start as f64 / rate, end as f64 / rate);
    segment.samples.truncate(end);
    segment.samples.drain(..start);
    segment.start_time += start as f64 / rate;
    segment.end_time = segment.start_time + segment.samples.len() as f64 / rate;
    Ok(segment)
}

/// Sample ranges whose frame RMS is within `top_db` of the loudest frame.
/// Empty when the input has no energy at all.
pub fn non_silent_intervals(samples: &[f32], top_db: f32) -> Vec<(usize, usize)> {
    if samples.is_empty() {
        return Vec::new();
    }

    let powers = frame_powers(samples);
    let reference = powers.iter().copied().fold(0.0f64, f64::max);
    if reference < POWER_FLOOR {
        return Vec::new();
    }

    let loud: Vec<bool> = powers
        .iter()
        .map(|&p| 10.0 * (p.max(POWER_FLOOR) / reference).log10() > -(top_db as f64))
        .collect();

    let mut intervals = Vec::new();
    let mut open: Option<usize> = None;
    for (frame, &is_loud) in loud.iter().enumerate() {
        match (is_loud, open) {
            (true, None) => open = Some(frame),
            (false, Some(start)) => {
                intervals.push(frame_span(start, frame, samples.len()));
                open = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        intervals.push(frame_span(start, loud.len(), samples.len()));
    }

    debug!("{} non-silent interval(s) at {} dB", intervals.len(), top_db);
    intervals
}

fn frame_span(start_frame: usize, end_frame: usize, len: usize) -> (usize, usize) {
    ((start_frame * HOP_SIZE).min(len), (end_frame * HOP_SIZE).min(len))
}

// Mean-square energy of frames centred on `frame * HOP_SIZE`, zero padded.
fn frame_powers(samples: &[f32]) -> Vec<f64> {
    let n_frames = 1 + samples.len() / HOP_SIZE;
    (0..n_frames)
        .map(|frame| {
            let center = frame * HOP_SIZE;
            let lo = center.saturating_sub(FRAME_SIZE / 2);
            let hi = (center + FRAME_SIZE / 2).min(samples.len());
            let energy: f64 = samples[lo..hi].iter().map(|&s| (s as f64) * (s as f64)).sum();
            energy / FRAME_SIZE as f64
        })
        .collect()
}

/// Multiplies the head by a 0→1 ramp and the tail by a 1→0 ramp. Ramps
/// longer than the audio are clamped to its length.
pub fn apply_fades(samples: &mut [f32], sample_rate: u32, fade_in: f64, fade_out: f64) {
    let len = samples.len();
    let fade_in_samples = ((fade_in.max(0.0) * sample_rate as f64) as usize).min(len);
    let fade_out_samples = ((fade_out.max(0.0) * sample_rate as f64) as usize).min(len);

    if fade_in_samples > 0 {
        for (i, sample) in samples[..fade_in_samples].iter_mut().enumerate() {
            *sample *= ramp(i, fade_in_samples);
        }
    }
    if fade_out_samples > 0 {
        let tail = len - fade_out_samples;
        for (i, sample) in samples[tail..].iter_mut().enumerate() {
            *sample *= 1.0 - ramp(i, fade_out_samples);
        }
    }
}

// Evenly spaced 0..=1 over `n` points.
fn ramp(i: usize, n: usize) -> f32 {
    if n <= 1 {
        0.0
    } else {
        i as f32 / (n - 1) as f32
    }
}
