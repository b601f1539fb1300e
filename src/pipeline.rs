use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::audio;
use crate::catalog::{SampleId, SampleRecord};
use crate::chopper::Segment;
use crate::export::{unique_path, with_wav_extension, write_wav_atomic};
use crate::level;
use crate::naming::{self, ResolvedNaming};
use crate::resample;
use crate::silence::SilenceTrimmer;
use crate::{ChopError, NamingDirective, PipelineConfig, Result};

#[derive(Debug)]
pub struct SaveOutcome {
    pub id: SampleId,
    pub name: String, // Name in the sample list when the save started
    pub result: Result<PathBuf>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Default)]
pub struct SaveReport {
    pub pack_folder: Option<PathBuf>,
    pub outcomes: Vec<SaveOutcome>,
    pub warnings: Vec<String>,
}

impl SaveReport {
    pub fn saved(&self) -> impl Iterator<Item = &PathBuf> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&SaveOutcome, &ChopError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o, e)))
    }

    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Renders every record into `dest`, in catalog order. Per record:
/// pack-name affix, signature affix, silence trim, normalization, resampling,
/// tag routing, then the write. A failing record is reported in its outcome
/// and the rest of the batch carries on; only problems that make the whole
/// save meaningless return `Err`.
pub fn save_batch(
    records: &[SampleRecord],
    dest: &Path,
    config: &PipelineConfig,
    directive: &NamingDirective,
) -> Result<SaveReport> {
    if config.target_sample_rate == 0 {
        return Err(ChopError::InvalidSampleRate(config.target_sample_rate));
    }
    let naming = directive.resolve()?;
    std::fs::create_dir_all(dest)?;

    let mut report = SaveReport {
        warnings: naming.warnings.clone(),
        ..SaveReport::default()
    };
    let base_dir = prepare_pack_folder(dest, &naming, &mut report)?;
    let trimmer = SilenceTrimmer::new(config.silence.clone());
    let mut written: HashSet<PathBuf> = HashSet::new();

    for record in records {
        let mut warnings = Vec::new();
        let result = render_record(record, &naming, &base_dir, config, &trimmer, &mut written, &mut warnings);
        match &result {
            Ok(path) => info!("Saved {} to {}", record.renamed_name, path.display()),
            Err(e) => error!("Failed to save {}: {}", record.renamed_name, e),
        }
        report.outcomes.push(SaveOutcome {
            id: record.id,
            name: record.renamed_name.clone(),
            result,
            warnings,
        });
    }

    info!(
        "Saved {} of {} sample(s) to {}",
        report.saved().count(),
        records.len(),
        base_dir.display()
    );
    Ok(report)
}

// The folder samples land in: `dest`, or the (possibly signed) pack folder.
fn prepare_pack_folder(dest: &Path, naming: &ResolvedNaming, report: &mut SaveReport) -> Result<PathBuf> {
    let Some(pack) = &naming.pack_folder else {
        return Ok(dest.to_path_buf());
    };
    let mut folder = dest.join(pack);
    std::fs::create_dir_all(&folder)?;

    if let Some((signature, position)) = &naming.folder_signature {
        let signed = naming::sign_folder(&folder, signature, *position);
        if let Some(e) = signed.error {
            report.warnings.push(e.to_string());
        }
        folder = signed.path;
    }
    report.pack_folder = Some(folder.clone());
    Ok(folder)
}

fn render_record(
    record: &SampleRecord,
    naming: &ResolvedNaming,
    base_dir: &Path,
    config: &PipelineConfig,
    trimmer: &SilenceTrimmer,
    written: &mut HashSet<PathBuf>,
    warnings: &mut Vec<String>,
) -> Result<PathBuf> {
    let final_name = with_wav_extension(&naming.sample_name(&record.renamed_name));

    if !record.current_path.is_file() {
        return Err(ChopError::MissingSampleFile(record.current_path.clone()));
    }
    let buffer = audio::load_audio_file(&record.current_path)?;
    let mut segment = Segment::from_buffer(&buffer);

    if config.crop_silence {
        segment = trimmer.trim(segment);
    }

    if config.normalize {
        if level::rms_db(&segment.samples).is_some() {
            segment = level::normalize(segment, config.target_db, &record.renamed_name)?;
        } else {
            let e = ChopError::SilentInput(record.renamed_name.clone());
            warn!("{}, saving without gain change", e);
            warnings.push(e.to_string());
        }
    }

    segment = resample::resample(segment, config.target_sample_rate)?;

    let mut dir = base_dir.to_path_buf();
    if naming.route_by_tag {
        if let Some(folder) = naming::path_component(&record.tag) {
            dir.push(folder);
        }
    }
    std::fs::create_dir_all(&dir)?;

    let mut path = dir.join(&final_name);
    if written.contains(&path) {
        path = unique_path(&dir, &final_name);
        warnings.push(format!(
            "{} was already written in this save, using {}",
            final_name,
            path.display()
        ));
    }
    write_wav_atomic(&path, &segment.samples, segment.sample_rate)?;
    written.insert(path.clone());
    Ok(path)
}
