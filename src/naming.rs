use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::export::split_name;
use crate::{AffixPosition, ChopError, NamingDirective, Result};

/// `{affix}_{stem}{ext}` or `{stem}_{affix}{ext}`. The extension is never
/// affixed; an empty affix leaves the name alone.
pub fn apply_affix(base_name: &str, affix: &str, position: AffixPosition) -> String {
    if affix.is_empty() {
        return base_name.to_string();
    }
    let (stem, ext) = split_name(base_name);
    match position {
        AffixPosition::Prefix => format!("{}_{}{}", affix, stem, ext),
        AffixPosition::Suffix => format!("{}_{}{}", stem, affix, ext),
    }
}

/// Spaces become underscores, as in pack names and signatures.
pub fn sanitize(text: &str) -> String {
    text.trim().replace(' ', "_")
}

/// Text that ends up as a single path component: tags, pack names and
/// signatures. Separators become underscores; empty or dot-only text is
/// refused.
pub fn path_component(text: &str) -> Option<String> {
    let cleaned: String = sanitize(text)
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        None
    } else {
        Some(cleaned)
    }
}

/// Outcome of signing a folder: the path to use from now on, and the
/// rename error when the folder kept its old name.
#[derive(Debug)]
pub struct SignedFolder {
    pub path: PathBuf,
    pub error: Option<ChopError>,
}

/// Renames `folder` by the affix rule. On failure the original path comes
/// back together with the reason.
pub fn sign_folder(folder: &Path, signature: &str, position: AffixPosition) -> SignedFolder {
    let unchanged = |error: ChopError| {
        warn!("{}", error);
        SignedFolder {
            path: folder.to_path_buf(),
            error: Some(error),
        }
    };

    let Some(name) = folder.file_name().and_then(|n| n.to_str()) else {
        return unchanged(ChopError::InvalidUserInput(format!(
            "{} has no folder name to sign",
            folder.display()
        )));
    };
    let signed_name = match position {
        AffixPosition::Prefix => format!("{}_{}", signature, name),
        AffixPosition::Suffix => format!("{}_{}", name, signature),
    };
    let target = folder.with_file_name(signed_name);

    let failed = |reason: String| ChopError::FolderRenameFailed {
        from: folder.to_path_buf(),
        to: target.clone(),
        reason,
    };
    if target.exists() {
        return unchanged(failed("destination already exists".to_string()));
    }
    match std::fs::rename(folder, &target) {
        Ok(()) => {
            info!("Pack folder renamed to: {}", target.display());
            SignedFolder {
                path: target.clone(),
                error: None,
            }
        }
        Err(e) => unchanged(failed(e.to_string())),
    }
}

/// A `NamingDirective` reduced to concrete decisions for one save.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedNaming {
    pub pack_folder: Option<String>,
    pub folder_signature: Option<(String, AffixPosition)>,
    pub sample_pack_affix: Option<(String, AffixPosition)>,
    pub sample_signature: Option<(String, AffixPosition)>,
    pub route_by_tag: bool,
    pub warnings: Vec<String>,
}

impl ResolvedNaming {
    /// The final file name for a sample: pack-name affix, then signature.
    pub fn sample_name(&self, base_name: &str) -> String {
        let mut name = base_name.to_string();
        if let Some((pack, position)) = &self.sample_pack_affix {
            name = apply_affix(&name, pack, *position);
        }
        if let Some((signature, position)) = &self.sample_signature {
            name = apply_affix(&name, signature, *position);
        }
        name
    }
}

impl NamingDirective {
    /// Resolves the toggles once, before any file is touched. Fails only when
    /// a pack folder is requested without a pack name.
    pub fn resolve(&self) -> Result<ResolvedNaming> {
        let pack = self.pack_name.as_deref().and_then(path_component);
        let signature = self.signature.as_deref().and_then(path_component);
        let mut resolved = ResolvedNaming {
            route_by_tag: self.route_by_tag,
            ..ResolvedNaming::default()
        };

        if self.create_pack_folder {
            let Some(pack) = pack.clone() else {
                return Err(ChopError::InvalidUserInput(
                    "please provide a pack name".to_string(),
                ));
            };
            resolved.pack_folder = Some(pack);
            if self.sign_pack {
                match &signature {
                    Some(sig) => resolved.folder_signature = Some((sig.clone(), self.signature_position)),
                    None => resolved
                        .warnings
                        .push("no signature provided for folder, skipping".to_string()),
                }
            }
        } else if self.sign_pack {
            resolved
                .warnings
                .push("no pack folder to sign, skipping folder signing".to_string());
        }

        if self.affix_pack_name {
            match pack {
                Some(pack) => resolved.sample_pack_affix = Some((pack, self.pack_name_position)),
                None => resolved
                    .warnings
                    .push("no pack name to add to samples, skipping".to_string()),
            }
        }

        if self.sign_samples {
            match signature {
                Some(sig) => resolved.sample_signature = Some((sig, self.signature_position)),
                None => resolved
                    .warnings
                    .push("no signature provided for samples, skipping".to_string()),
            }
        }

        for warning in &resolved.warnings {
            warn!("{}", warning);
        }
        Ok(resolved)
    }
}
