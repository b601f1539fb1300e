use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::audio::{time_to_index, AudioBuffer};
use crate::export;
use crate::markers::MarkerSet;
use crate::{ChopError, Result};

/// A slice of audio travelling through the transform pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub source_marker_index: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Segment {
    /// A whole buffer as one segment, for samples that were never chopped.
    pub fn from_buffer(buffer: &AudioBuffer) -> Self {
        Self {
            source_marker_index: 0,
            start_time: 0.0,
            end_time: buffer.duration(),
            samples: buffer.samples().to_vec(),
            sample_rate: buffer.sample_rate(),
        }
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Lazily slices a buffer at sorted markers, one segment per marker.
pub struct Segments<'a> {
    buffer: &'a AudioBuffer,
    markers: Vec<f64>,
    next: usize,
}

impl Iterator for Segments<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        let i = self.next;
        let start_time = *self.markers.get(i)?;
        self.next += 1;

        let rate = self.buffer.sample_rate();
        let (end_time, end_idx) = match self.markers.get(i + 1) {
            Some(&end) => (end, self.buffer.index_at(end)),
            None => (self.buffer.duration(), self.buffer.len()),
        };
        let start_idx = time_to_index(start_time, rate).min(end_idx);

        Some(Segment {
            source_marker_index: i,
            start_time,
            end_time,
            samples: self.buffer.samples()[start_idx..end_idx].to_vec(),
            sample_rate: rate,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.markers.len() - self.next;
        (left, Some(left))
    }
}

/// Validates the inputs and returns a segment iterator over the sorted,
/// in-range markers.
pub fn segments<'a>(buffer: Option<&'a AudioBuffer>, markers: &MarkerSet) -> Result<Segments<'a>> {
    let buffer = buffer.ok_or(ChopError::NoAudioLoaded)?;
    if markers.is_empty() {
        return Err(ChopError::EmptyMarkerSet);
    }
    let mut deduped = markers.clone();
    deduped.sort();
    let sorted = deduped.sorted_within(buffer.duration());
    if sorted.len() < deduped.count() {
        warn!(
            "Ignoring {} marker(s) outside 0..{:.2}s",
            deduped.count() - sorted.len(),
            buffer.duration()
        );
    }
    if sorted.is_empty() {
        return Err(ChopError::EmptyMarkerSet);
    }
    Ok(Segments {
        buffer,
        markers: sorted,
        next: 0,
    })
}

/// Slices `buffer` at every marker: `[m[i], m[i+1])`, the last one running
/// to the end of the buffer.
pub fn chop(buffer: Option<&AudioBuffer>, markers: &MarkerSet) -> Result<Vec<Segment>> {
    Ok(segments(buffer, markers)?.collect())
}

/// Chops and writes each segment to `dir` as soon as it is cut, as
/// `{stem}_chop_{n}.wav` with `n` starting at 1. Existing files are never
/// overwritten.
pub fn chop_to_dir(
    buffer: Option<&AudioBuffer>,
    markers: &MarkerSet,
    dir: &Path,
    stem: &str,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for segment in segments(buffer, markers)? {
        let name = format!("{}_chop_{}.wav", stem, segment.source_marker_index + 1);
        let path = export::unique_path(dir, &name);
        export::write_wav(&path, &segment.samples, segment.sample_rate)?;
        written.push(path);
    }
    info!("Chopped into {} segment(s) in {}", written.len(), dir.display());
    Ok(written)
}
