use std::path::{Path, PathBuf};

use log::info;

use crate::analysis;
use crate::audio::{self, AudioBuffer};
use crate::catalog::{SampleCatalog, SampleId};
use crate::chopper;
use crate::markers::{MarkerSet, MarkerToggle, CLICK_TOLERANCE};
use crate::pipeline::{self, SaveReport};
use crate::preview;
use crate::{ChopError, NamingDirective, OnsetSettings, PipelineConfig, Result};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SessionState {
    Empty,
    Loaded,
    Chopped,
    Saving,
    Idle,
}

struct ChopSource {
    stem: String,
    buffer: AudioBuffer,
}

/// One editing session: a private working directory, the sample list, and
/// the recording being chopped. Every mutating call takes `&mut self`, so
/// chops and saves on the same catalog can never overlap.
pub struct Session {
    catalog: SampleCatalog,
    source: Option<ChopSource>,
    markers: MarkerSet,
    state: SessionState,
    // Dropped last; removes the working directory.
    workdir: tempfile::TempDir,
}

impl Session {
    pub fn new() -> Result<Self> {
        let workdir = tempfile::Builder::new().prefix("sample-chopper-").tempdir()?;
        let catalog = SampleCatalog::new(workdir.path().join("samples"))?;
        info!("Session working directory: {}", workdir.path().display());
        Ok(Self {
            catalog,
            source: None,
            markers: MarkerSet::new(),
            state: SessionState::Empty,
            workdir,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    pub fn catalog(&self) -> &SampleCatalog {
        &self.catalog
    }

    /// Copies samples into the session. Results are per path, in order.
    pub fn load_samples<P: AsRef<Path>>(&mut self, paths: &[P]) -> Vec<Result<SampleId>> {
        let results = self.catalog.load_files(paths);
        if results.iter().any(|r| r.is_ok()) {
            self.mark_loaded();
        }
        results
    }

    /// Decodes the recording to chop. Markers from a previous source are
    /// discarded.
    pub fn open_source<P: AsRef<Path>>(&mut self, path: P) -> Result<&AudioBuffer> {
        let path = path.as_ref();
        let buffer = audio::load_audio_file(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "source".to_string());
        self.markers.clear();
        self.mark_loaded();
        let source = self.source.insert(ChopSource { stem, buffer });
        Ok(&source.buffer)
    }

    pub fn source(&self) -> Option<&AudioBuffer> {
        self.source.as_ref().map(|s| &s.buffer)
    }

    pub fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    /// Replaces the markers with detected onsets. Finding none is not an
    /// error; the returned slice is simply empty.
    pub fn detect_onsets(&mut self, settings: &OnsetSettings) -> Result<&[f64]> {
        let source = self.source.as_ref().ok_or(ChopError::NoAudioLoaded)?;
        let onsets = analysis::detect_onsets(&source.buffer, settings);
        self.markers.replace(onsets);
        Ok(self.markers.times())
    }

    /// A click on the waveform at `time`: removes a marker within
    /// `CLICK_TOLERANCE`, otherwise adds one.
    pub fn toggle_marker(&mut self, time: f64) -> Result<MarkerToggle> {
        let source = self.source.as_ref().ok_or(ChopError::NoAudioLoaded)?;
        if !(0.0..source.buffer.duration()).contains(&time) {
            return Err(ChopError::InvalidUserInput(format!(
                "marker at {:.3}s is outside the recording (0..{:.3}s)",
                time,
                source.buffer.duration()
            )));
        }
        Ok(self.markers.toggle(time, CLICK_TOLERANCE))
    }

    pub fn set_markers(&mut self, times: impl IntoIterator<Item = f64>) -> Result<()> {
        if self.source.is_none() {
            return Err(ChopError::NoAudioLoaded);
        }
        self.markers.replace(times);
        Ok(())
    }

    /// Chops the source at the current markers into the working directory
    /// and appends the pieces to the sample list.
    pub fn chop(&mut self) -> Result<Vec<SampleId>> {
        let source = self.source.as_ref().ok_or(ChopError::NoAudioLoaded)?;
        self.markers.sort();
        let paths: Vec<PathBuf> = chopper::chop_to_dir(
            Some(&source.buffer),
            &self.markers,
            self.catalog.workdir(),
            &source.stem,
        )?;
        let ids = self.catalog.add_produced(&paths)?;
        self.state = SessionState::Chopped;
        Ok(ids)
    }

    pub fn rename(&mut self, id: SampleId, new_stem: &str) -> Result<()> {
        self.catalog.rename(id, new_stem)
    }

    pub fn set_tag(&mut self, id: SampleId, tag: &str) -> Result<()> {
        self.catalog.set_tag(id, tag)
    }

    /// Runs every sample through the pipeline into `dest`. The configuration
    /// and naming are fixed for the whole batch.
    pub fn save(
        &mut self,
        dest: &Path,
        config: &PipelineConfig,
        directive: &NamingDirective,
    ) -> Result<SaveReport> {
        self.state = SessionState::Saving;
        let result = pipeline::save_batch(self.catalog.records(), dest, config, directive);
        self.state = SessionState::Idle;
        result
    }

    /// Audio to audition from `time` in the source.
    pub fn preview_from(&self, time: f64) -> Result<&[f32]> {
        let source = self.source.as_ref().ok_or(ChopError::NoAudioLoaded)?;
        Ok(preview::preview_window(&source.buffer, time))
    }

    /// Forgets every sample, the source and its markers.
    pub fn clear(&mut self) -> Result<()> {
        self.catalog.clear()?;
        self.source = None;
        self.markers.clear();
        self.state = SessionState::Empty;
        Ok(())
    }

    fn mark_loaded(&mut self) {
        if self.state == SessionState::Empty {
            self.state = SessionState::Loaded;
        }
    }
}
