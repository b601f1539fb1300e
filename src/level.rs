use log::info;

use crate::chopper::Segment;
use crate::{ChopError, Result};

pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&x| (x as f64) * (x as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

/// RMS level in dBFS, `None` when there is no signal.
pub fn rms_db(samples: &[f32]) -> Option<f64> {
    let level = rms(samples);
    if level > 0.0 && level.is_finite() {
        Some(20.0 * level.log10())
    } else {
        None
    }
}

/// Linear gain that brings `samples` to `target_db` RMS.
pub fn gain_for(samples: &[f32], target_db: f32) -> Option<f64> {
    let current_db = rms_db(samples)?;
    Some(10f64.powf((target_db as f64 - current_db) / 20.0))
}

/// Scales the segment so its RMS level equals `target_db`. `label` names the
/// sample in the error when it has no signal to scale.
pub fn normalize(mut segment: Segment, target_db: f32, label: &str) -> Result<Segment> {
    let gain = gain_for(&segment.samples, target_db)
        .ok_or_else(|| ChopError::SilentInput(label.to_string()))?;
    for sample in segment.samples.iter_mut() {
        *sample = (*sample as f64 * gain) as f32;
    }
    info!("Normalized {} to {} dB (gain {:.3})", label, target_db, gain);
    Ok(segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(samples: Vec<f32>) -> Segment {
        Segment {
            source_marker_index: 0,
            start_time: 0.0,
            end_time: 1.0,
            samples,
            sample_rate: 1000,
        }
    }

    fn sine(n: usize, amp: f32) -> Vec<f32> {
        (0..n).map(|i| (i as f32 * 0.05).sin() * amp).collect()
    }

    #[test]
    fn reaches_the_target_level() {
        let out = normalize(segment(sine(1000, 0.1)), -6.0, "tone").unwrap();
        let level = rms_db(&out.samples).unwrap();
        assert!((level + 6.0).abs() < 1e-3, "level {}", level);
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let once = normalize(segment(sine(1000, 0.3)), -12.0, "tone").unwrap();
        let gain = gain_for(&once.samples, -12.0).unwrap();
        assert!((gain - 1.0).abs() < 1e-4, "gain {}", gain);
    }

    #[test]
    fn silence_is_refused() {
        let err = normalize(segment(vec![0.0; 100]), -3.0, "blank.wav").unwrap_err();
        assert!(matches!(err, ChopError::SilentInput(ref name) if name == "blank.wav"));
        assert!(normalize(segment(Vec::new()), -3.0, "empty").is_err());
    }

    #[test]
    fn square_wave_rms_is_its_amplitude() {
        let level = rms_db(&[0.5, -0.5, 0.5, -0.5]).unwrap();
        assert!((level - 20.0 * 0.5f64.log10()).abs() < 1e-9);
    }
}
