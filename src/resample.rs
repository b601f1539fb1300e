use log::info;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::chopper::Segment;
use crate::{ChopError, Result};

const INPUT_BLOCK_SIZE: usize = 1024;

/// Converts the segment to `target_rate`, keeping its duration. The output is
/// `round(len * target / source)` samples long.
pub fn resample(segment: Segment, target_rate: u32) -> Result<Segment> {
    if target_rate == 0 {
        return Err(ChopError::InvalidSampleRate(target_rate));
    }
    if segment.sample_rate == 0 {
        return Err(ChopError::InvalidSampleRate(segment.sample_rate));
    }
    if segment.sample_rate == target_rate {
        return Ok(segment);
    }

    let from = segment.sample_rate;
    let samples = convert(&segment.samples, from, target_rate)?;
    info!(
        "Resampled {} -> {} samples ({}Hz -> {}Hz)",
        segment.samples.len(),
        samples.len(),
        from,
        target_rate
    );
    Ok(Segment {
        samples,
        sample_rate: target_rate,
        ..segment
    })
}

fn convert(input: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    let failed = |reason: String| ChopError::Resample { from, to, reason };

    let ratio = to as f64 / from as f64;
    let expected = (input.len() as f64 * ratio).round() as usize;
    if input.is_empty() {
        return Ok(Vec::new());
    }

    let sinc_params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, sinc_params, INPUT_BLOCK_SIZE, 1)
        .map_err(|e| failed(e.to_string()))?;

    // Output from SincFixedIn is already aligned with the input: sample `i`
    // lands at `round(i * ratio)`, so only the tail needs flushing.
    let mut output: Vec<f32> = Vec::with_capacity(expected + INPUT_BLOCK_SIZE);
    let mut pos = 0;

    while input.len() - pos >= resampler.input_frames_next() {
        let needed = resampler.input_frames_next();
        let wave_in = [&input[pos..pos + needed]];
        let block = resampler
            .process(&wave_in[..], None)
            .map_err(|e| failed(e.to_string()))?;
        output.extend_from_slice(&block[0]);
        pos += needed;
    }
    if pos < input.len() {
        let wave_in = [&input[pos..]];
        let block = resampler
            .process_partial(Some(&wave_in[..]), None)
            .map_err(|e| failed(e.to_string()))?;
        output.extend_from_slice(&block[0]);
    }
    while output.len() < expected {
        let block = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| failed(e.to_string()))?;
        if block[0].is_empty() {
            break;
        }
        output.extend_from_slice(&block[0]);
    }

    output.resize(expected, 0.0);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(rate: u32, seconds: f64, freq: f32) -> Segment {
        let n = (rate as f64 * seconds) as usize;
        Segment {
            source_marker_index: 0,
            start_time: 0.0,
            end_time: seconds,
            samples: (0..n)
                .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * 0.5)
                .collect(),
            sample_rate: rate,
        }
    }

    #[test]
    fn rejects_zero_rate() {
        let err = resample(tone(8000, 0.1, 440.0), 0).unwrap_err();
        assert!(matches!(err, ChopError::InvalidSampleRate(0)));
    }

    #[test]
    fn same_rate_passes_through() {
        let input = tone(44100, 0.1, 440.0);
        let out = resample(input.clone(), 44100).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn keeps_duration_when_upsampling() {
        let out = resample(tone(22050, 0.5, 440.0), 44100).unwrap();
        assert_eq!(out.sample_rate, 44100);
        assert_eq!(out.samples.len(), 22050);
        assert!((out.duration() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn preserves_a_tone_when_downsampling() {
        let out = resample(tone(48000, 0.5, 440.0), 16000).unwrap();
        assert_eq!(out.samples.len(), 8000);

        // Away from the edges the signal should still be the same sine.
        let reference = tone(16000, 0.5, 440.0);
        let err: f32 = out.samples[1000..7000]
            .iter()
            .zip(&reference.samples[1000..7000])
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max);
        assert!(err < 0.05, "max error {}", err);
    }

    fn impulse(rate: u32, len: usize, at: usize) -> Segment {
        let mut samples = vec![0.0f32; len];
        samples[at] = 1.0;
        Segment {
            source_marker_index: 0,
            start_time: 0.0,
            end_time: len as f64 / rate as f64,
            samples,
            sample_rate: rate,
        }
    }

    fn peak_index(samples: &[f32]) -> usize {
        samples
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn impulses_stay_in_place() {
        for (from, to) in [(44100u32, 48000u32), (48000, 44100), (48000, 16000), (22050, 44100)] {
            for at in [100usize, 1000] {
                let out = resample(impulse(from, 4000, at), to).unwrap();
                let expected = (at as f64 * to as f64 / from as f64).round() as i64;
                let found = peak_index(&out.samples) as i64;
                assert!(
                    (found - expected).abs() <= 1,
                    "{}Hz -> {}Hz: impulse at {} landed at {}, expected {}",
                    from,
                    to,
                    at,
                    found,
                    expected
                );
            }
        }
    }

    #[test]
    fn empty_segment_just_changes_rate() {
        let mut input = tone(8000, 0.0, 440.0);
        input.samples.clear();
        let out = resample(input, 16000).unwrap();
        assert!(out.samples.is_empty());
        assert_eq!(out.sample_rate, 16000);
    }
}
