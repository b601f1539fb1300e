use log::{debug, info};
use num_complex::Complex32;
use realfft::RealFftPlanner;

use crate::audio::AudioBuffer;
use crate::OnsetSettings;

pub const FRAME_SIZE: usize = 2048;
pub const HOP_SIZE: usize = 512;

/// Every detected onset is moved this far back so the chop keeps the attack.
pub const PRE_ROLL: f64 = 0.025;

// Peak picking windows, in seconds.
const PRE_MAX: f64 = 0.03;
const PRE_AVG: f64 = 0.10;
const POST_AVG: f64 = 0.10;
const WAIT: f64 = 0.03;
const DELTA: f32 = 0.07;

// Floor for the log spectrum, -100 dB.
const POWER_FLOOR: f32 = 1e-10;

/// Detects onsets in `buffer` and returns them as marker times in seconds.
///
/// `settings.max_gap` is carried for parity with the editor controls but does
/// not bound the spacing of the result; only `min_gap` is enforced.
pub fn detect_onsets(buffer: &AudioBuffer, settings: &OnsetSettings) -> Vec<f64> {
    let envelope = onset_strength(buffer.samples());
    let onsets = pick_onsets(
        &envelope,
        buffer.sample_rate(),
        HOP_SIZE,
        settings.min_gap,
        settings.threshold,
    );
    info!(
        "Detected {} onset(s) over {:.2}s (min gap {:.2}s, threshold {:.2})",
        onsets.len(),
        buffer.duration(),
        settings.min_gap,
        settings.threshold
    );
    onsets
}

/// Spectral flux of the log-power STFT: for each frame, the mean over bins of
/// the positive change from the previous frame. Frames are centred on
/// `frame * HOP_SIZE`.
pub fn onset_strength(samples: &[f32]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FRAME_SIZE);
    let mut input = fft.make_input_vec();
    let mut spectrum: Vec<Complex32> = fft.make_output_vec();
    let window = hann_window(FRAME_SIZE);

    let n_frames = 1 + samples.len() / HOP_SIZE;
    let bins = spectrum.len();
    let mut previous: Option<Vec<f32>> = None;
    let mut current = vec![0.0f32; bins];
    let mut envelope = Vec::with_capacity(n_frames);

    for frame in 0..n_frames {
        let center = frame * HOP_SIZE;
        for (i, slot) in input.iter_mut().enumerate() {
            let idx = (center + i).checked_sub(FRAME_SIZE / 2);
            let sample = idx.and_then(|idx| samples.get(idx)).copied().unwrap_or(0.0);
            *slot = sample * window[i];
        }
        // Buffers come from the same plan, so the lengths always match.
        if fft.process(&mut input, &mut spectrum).is_err() {
            envelope.push(0.0);
            continue;
        }

        for (db, bin) in current.iter_mut().zip(spectrum.iter()) {
            *db = 10.0 * bin.norm_sqr().max(POWER_FLOOR).log10();
        }

        let flux = match &previous {
            Some(prev) => {
                current
                    .iter()
                    .zip(prev.iter())
                    .map(|(c, p)| (c - p).max(0.0))
                    .sum::<f32>()
                    / bins as f32
            }
            None => 0.0,
        };
        envelope.push(flux);

        match previous.as_mut() {
            Some(prev) => prev.copy_from_slice(&current),
            None => previous = Some(current.clone()),
        }
    }

    envelope
}

/// Turns an onset-strength envelope into marker times: relative threshold,
/// peak picking, greedy minimum spacing, then the pre-roll shift.
pub fn pick_onsets(
    envelope: &[f32],
    sample_rate: u32,
    hop: usize,
    min_gap: f64,
    threshold: f32,
) -> Vec<f64> {
    let gated = apply_threshold(envelope, threshold);
    let frames = peak_frames(&gated, sample_rate, hop);
    let times: Vec<f64> = frames
        .iter()
        .map(|&f| frame_to_time(f, sample_rate, hop))
        .collect();
    let spaced = enforce_min_gap(&times, min_gap);
    debug!(
        "{} peak(s), {} after min-gap filter",
        times.len(),
        spaced.len()
    );
    apply_pre_roll(&spaced)
}

/// Zeroes every value that doesn't exceed `threshold * max(envelope)`.
pub fn apply_threshold(envelope: &[f32], threshold: f32) -> Vec<f32> {
    let max = envelope.iter().copied().fold(0.0f32, f32::max);
    let cutoff = threshold * max;
    envelope
        .iter()
        .map(|&v| if v > cutoff { v } else { 0.0 })
        .collect()
}

/// Standard onset peak picking on the envelope rescaled to 0..1: a frame is
/// a peak when it is the local maximum of the preceding window, rises `DELTA`
/// above the surrounding mean, and comes more than `WAIT` after the last peak.
pub fn peak_frames(envelope: &[f32], sample_rate: u32, hop: usize) -> Vec<usize> {
    if envelope.is_empty() || hop == 0 {
        return Vec::new();
    }

    let min = envelope.iter().copied().fold(f32::INFINITY, f32::min);
    let shifted: Vec<f32> = envelope.iter().map(|v| v - min).collect();
    let max = shifted.iter().copied().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return Vec::new();
    }
    let x: Vec<f32> = shifted.iter().map(|v| v / max).collect();

    let frames_per_sec = sample_rate as f64 / hop as f64;
    let to_frames = |secs: f64| (secs * frames_per_sec) as usize;
    let pre_max = to_frames(PRE_MAX);
    let post_max = 1;
    let pre_avg = to_frames(PRE_AVG);
    let post_avg = to_frames(POST_AVG) + 1;
    let wait = to_frames(WAIT);

    let len = x.len();
    let mut peaks = Vec::new();
    let mut last: Option<usize> = None;

    for n in 0..len {
        if let Some(prev) = last {
            if n <= prev + wait {
                continue;
            }
        }

        let max_window = &x[n.saturating_sub(pre_max)..(n + post_max).min(len)];
        let local_max = max_window.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if x[n] < local_max {
            continue;
        }

        let avg_window = &x[n.saturating_sub(pre_avg)..(n + post_avg).min(len)];
        let mean = avg_window.iter().sum::<f32>() / avg_window.len() as f32;
        if x[n] >= mean + DELTA {
            peaks.push(n);
            last = Some(n);
        }
    }

    peaks
}

pub fn frame_to_time(frame: usize, sample_rate: u32, hop: usize) -> f64 {
    (frame * hop) as f64 / sample_rate as f64
}

/// Keeps the first onset, then each one at least `min_gap` after the last kept.
pub fn enforce_min_gap(times: &[f64], min_gap: f64) -> Vec<f64> {
    let mut kept: Vec<f64> = Vec::with_capacity(times.len());
    for &t in times {
        match kept.last() {
            Some(&last) if t - last < min_gap => {}
            _ => kept.push(t),
        }
    }
    kept
}

pub fn apply_pre_roll(times: &[f64]) -> Vec<f64> {
    times.iter().map(|t| (t - PRE_ROLL).max(0.0)).collect()
}

fn hann_window(size: usize) -> Vec<f32> {
    // Periodic Hann, as used for STFT analysis.
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            0.5 - 0.5 * phase.cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope_with_peaks(len: usize, peaks: &[(usize, f32)]) -> Vec<f32> {
        let mut env = vec![0.0; len];
        for &(at, height) in peaks {
            env[at] = height;
        }
        env
    }

    #[test]
    fn threshold_is_relative_to_the_maximum() {
        let env = envelope_with_peaks(200, &[(50, 0.9), (150, 0.3)]);
        let gated = apply_threshold(&env, 0.5);
        assert_eq!(gated[50], 0.9);
        assert_eq!(gated[150], 0.0);

        let onsets = pick_onsets(&env, 22050, 512, 0.0, 0.5);
        assert_eq!(onsets.len(), 1);
        let expected = frame_to_time(50, 22050, 512) - PRE_ROLL;
        assert!((onsets[0] - expected).abs() < 1e-9);
    }

    #[test]
    fn both_peaks_survive_a_low_threshold() {
        let env = envelope_with_peaks(200, &[(50, 0.9), (150, 0.3)]);
        let onsets = pick_onsets(&env, 22050, 512, 0.0, 0.1);
        assert_eq!(onsets.len(), 2);
    }

    #[test]
    fn flat_envelope_yields_nothing() {
        assert!(pick_onsets(&[0.0; 64], 44100, 512, 0.3, 0.1).is_empty());
        assert!(pick_onsets(&[], 44100, 512, 0.3, 0.1).is_empty());
    }

    #[test]
    fn min_gap_filter_is_greedy_from_the_last_kept() {
        let kept = enforce_min_gap(&[0.0, 0.1, 0.25, 0.35, 0.9], 0.3);
        assert_eq!(kept, vec![0.0, 0.35, 0.9]);
    }

    #[test]
    fn pre_roll_clamps_at_zero() {
        let shifted = apply_pre_roll(&[0.01, 1.0]);
        assert_eq!(shifted[0], 0.0);
        assert!((shifted[1] - 0.975).abs() < 1e-12);
    }

    #[test]
    fn detects_clicks_in_a_synthetic_signal() {
        let rate = 22050;
        let mut samples = vec![0.0f32; rate * 3];
        for &hit in &[0.5f64, 1.5, 2.5] {
            let start = (hit * rate as f64) as usize;
            for i in 0..2000 {
                let decay = (-(i as f32) / 300.0).exp();
                samples[start + i] = (i as f32 * 0.3).sin() * decay;
            }
        }
        let buffer = AudioBuffer::new(samples, rate as u32).unwrap();
        let onsets = detect_onsets(&buffer, &OnsetSettings::default());

        assert_eq!(onsets.len(), 3, "onsets: {:?}", onsets);
        for (found, hit) in onsets.iter().zip([0.5f64, 1.5, 2.5]) {
            assert!((found - (hit - PRE_ROLL)).abs() < 0.06, "{} vs {}", found, hit);
        }
    }
}
