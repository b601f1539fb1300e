use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::export::{split_name, unique_path};
use crate::{ChopError, Result};

pub const TAG_TABLE: &str = "sample_tags.txt";

/// Stable identity of a sample for the whole session, unaffected by renames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleId(u64);

impl std::fmt::Display for SampleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SampleRecord {
    pub id: SampleId,
    pub original_name: String, // As loaded or produced
    pub renamed_name: String, // Current file name in the working directory
    pub current_path: PathBuf,
    pub tag: String,
}

/// The working set of samples, backed by copies in a working directory and
/// a `sample_name,tag` table kept next to them.
#[derive(Debug)]
pub struct SampleCatalog {
    workdir: PathBuf,
    records: Vec<SampleRecord>,
    next_id: u64,
}

impl SampleCatalog {
    pub fn new<P: Into<PathBuf>>(workdir: P) -> Result<Self> {
        let catalog = Self {
            workdir: workdir.into(),
            records: Vec::new(),
            next_id: 0,
        };
        std::fs::create_dir_all(&catalog.workdir)?;
        catalog.write_tag_table()?;
        Ok(catalog)
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn tag_table_path(&self) -> PathBuf {
        self.workdir.join(TAG_TABLE)
    }

    /// Copies each file into the working directory and records it. Files
    /// that can't be copied are reported and skipped.
    pub fn load_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Vec<Result<SampleId>> {
        let results: Vec<Result<SampleId>> = paths.iter().map(|p| self.load_file(p.as_ref())).collect();
        if let Err(e) = self.write_tag_table() {
            warn!("Failed to update tag table: {}", e);
        }
        results
    }

    fn load_file(&mut self, source: &Path) -> Result<SampleId> {
        if !source.is_file() {
            warn!("Error copying {}: file not found", source.display());
            return Err(ChopError::MissingSampleFile(source.to_path_buf()));
        }
        let name = file_name(source)?;
        let dest = self.free_path(&name);
        std::fs::copy(source, &dest)?;
        info!("Loaded {} as {}", source.display(), dest.display());
        Ok(self.push(name, dest))
    }

    /// Records files that already live in the working directory, such as
    /// freshly chopped segments.
    pub fn add_produced(&mut self, paths: &[PathBuf]) -> Result<Vec<SampleId>> {
        let mut ids = Vec::with_capacity(paths.len());
        for path in paths {
            let name = file_name(path)?;
            ids.push(self.push(name, path.clone()));
        }
        self.write_tag_table()?;
        Ok(ids)
    }

    fn push(&mut self, original_name: String, path: PathBuf) -> SampleId {
        let id = SampleId(self.next_id);
        self.next_id += 1;
        let renamed_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| original_name.clone());
        self.records.push(SampleRecord {
            id,
            original_name,
            renamed_name,
            current_path: path,
            tag: String::new(),
        });
        id
    }

    /// Renames a sample's working copy. `new_stem` excludes the extension,
    /// which is carried over from the current name.
    pub fn rename(&mut self, id: SampleId, new_stem: &str) -> Result<()> {
        let new_stem = new_stem.trim();
        if new_stem.is_empty() || new_stem.contains(['/', '\\']) {
            return Err(ChopError::InvalidUserInput(format!(
                "'{}' is not a valid sample name",
                new_stem
            )));
        }

        let record = self.get(id)?;
        let (_, ext) = split_name(&record.renamed_name);
        let new_name = format!("{}{}", new_stem, ext);
        if new_name == record.renamed_name {
            return Ok(());
        }
        if !record.current_path.exists() {
            return Err(ChopError::MissingSampleFile(record.current_path.clone()));
        }
        let new_path = self.workdir.join(&new_name);
        if new_name == TAG_TABLE || new_path.exists() || self.find_by_name(&new_name).is_some() {
            return Err(ChopError::InvalidUserInput(format!(
                "a sample named {} already exists",
                new_name
            )));
        }

        std::fs::rename(&record.current_path, &new_path)?;
        info!("Renamed {} to {}", record.renamed_name, new_name);
        let record = self.get_mut(id)?;
        record.renamed_name = new_name;
        record.current_path = new_path;
        self.write_tag_table()
    }

    pub fn set_tag(&mut self, id: SampleId, tag: &str) -> Result<()> {
        self.get_mut(id)?.tag = tag.trim().to_string();
        self.write_tag_table()
    }

    /// Drops every record and empties the working directory.
    pub fn clear(&mut self) -> Result<()> {
        self.records.clear();
        if self.workdir.exists() {
            std::fs::remove_dir_all(&self.workdir)?;
        }
        std::fs::create_dir_all(&self.workdir)?;
        info!("Cleared sample list");
        self.write_tag_table()
    }

    pub fn get(&self, id: SampleId) -> Result<&SampleRecord> {
        self.records
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| ChopError::InvalidUserInput(format!("unknown sample {}", id)))
    }

    fn get_mut(&mut self, id: SampleId) -> Result<&mut SampleRecord> {
        self.records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ChopError::InvalidUserInput(format!("unknown sample {}", id)))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&SampleRecord> {
        self.records.iter().find(|r| r.renamed_name == name)
    }

    /// Records in the order they were added.
    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn free_path(&self, name: &str) -> PathBuf {
        if name == TAG_TABLE {
            return unique_path(&self.workdir, &format!("sample_{}", name));
        }
        unique_path(&self.workdir, name)
    }

    fn write_tag_table(&self) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(self.tag_table_path())?;
        for record in &self.records {
            writer.write_record([record.renamed_name.as_str(), record.tag.as_str()])?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ChopError::InvalidUserInput(format!("{} is not a file", path.display())))
}
