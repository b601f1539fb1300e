use anyhow::{bail, Result};
use sample_chopper::{analysis, audio, OnsetSettings};
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::init();
    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        bail!("usage: debug_onsets <audio file>");
    };

    if !path.exists() {
        println!("File not found: {:?}", path);
        return Ok(());
    }

    println!("Loading file: {:?}", path);
    let buffer = audio::load_audio_file(&path)?;
    println!(
        "Loaded. Sample Rate: {}, Samples: {}, Duration: {:.2}s",
        buffer.sample_rate(),
        buffer.len(),
        buffer.duration()
    );

    let settings = OnsetSettings::default();
    let rate = buffer.sample_rate();
    let hop = analysis::HOP_SIZE;

    // 1. Envelope
    let envelope = analysis::onset_strength(buffer.samples());
    let max = envelope.iter().copied().fold(0.0f32, f32::max);
    let mean = if envelope.is_empty() {
        0.0
    } else {
        envelope.iter().sum::<f32>() / envelope.len() as f32
    };
    println!(
        "Envelope: {} frames (hop {}), max {:.4}, mean {:.4}",
        envelope.len(),
        hop,
        max,
        mean
    );

    // 2. Threshold
    let gated = analysis::apply_threshold(&envelope, settings.threshold);
    let surviving = gated.iter().filter(|&&v| v > 0.0).count();
    println!(
        "Threshold {:.2} (cutoff {:.4}): {} frame(s) survive",
        settings.threshold,
        settings.threshold * max,
        surviving
    );

    // 3. Peaks
    let frames = analysis::peak_frames(&gated, rate, hop);
    let times: Vec<f64> = frames
        .iter()
        .map(|&f| analysis::frame_to_time(f, rate, hop))
        .collect();
    println!("--- {} peak(s) ---", times.len());
    for (frame, t) in frames.iter().zip(&times) {
        println!("frame {:6} -> {:.3}s (strength {:.4})", frame, t, envelope[*frame]);
    }

    // 4. Min gap
    let spaced = analysis::enforce_min_gap(&times, settings.min_gap);
    println!(
        "Min gap {:.2}s: kept {} of {}",
        settings.min_gap,
        spaced.len(),
        times.len()
    );

    // 5. Pre-roll
    let markers = analysis::apply_pre_roll(&spaced);
    println!("--- Final markers (pre-roll {:.3}s) ---", analysis::PRE_ROLL);
    for (i, t) in markers.iter().enumerate() {
        println!("{}. {:.3}s", i + 1, t);
    }

    Ok(())
}
