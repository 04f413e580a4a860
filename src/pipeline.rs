use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::flac;
use crate::tag::{AdditionalField, TagData, TagType};
use crate::vorbis::{self, ReadOptions, VorbisTag};

/// Supported audio extensions.
const AUDIO_EXTENSIONS: &[&str] = &["flac"];

/// What to do with each file.
#[derive(Debug, Clone)]
pub enum Action {
    /// Merge these edits into the existing tag.
    Update(TagData),
    /// Remove every field and picture, keeping the vendor string.
    Clear,
}

/// The result of processing a single file.
///
/// # Example
///
/// ```rust,no_run
/// use vorbis_tag::config::Config;
/// use vorbis_tag::pipeline::{Action, process_file};
/// use vorbis_tag::tag::{Field, TagData};
/// use std::path::Path;
///
/// let mut edits = TagData::new();
/// edits.set(Field::Genre, "IDM");
///
/// let result = process_file(Path::new("track.flac"), &Action::Update(edits), &Config::default());
/// if result.error.is_none() {
///     println!("Wrote: {}", result.fields_written.join(", "));
/// }
/// ```
#[derive(Debug)]
pub struct ProcessResult {
    pub path: PathBuf,
    /// Tag found in the file before any change.
    pub existing: Option<TagData>,
    /// Native keys set or removed by the action.
    pub fields_written: Vec<String>,
    pub backup_path: Option<PathBuf>,
    pub error: Option<String>,
}

/// Collect supported audio files from the given paths.
///
/// Accepts a mix of file paths and directory paths. Directories are walked
/// recursively (following symlinks).
pub fn collect_audio_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_supported_audio(path) {
                files.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file() && is_supported_audio(p) {
                    files.push(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    files
}

/// Check if a file has a supported audio extension.
fn is_supported_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Create a backup of the original file.
fn backup_file(path: &Path) -> Result<PathBuf> {
    let backup_path = path.with_extension(format!(
        "{}.bak",
        path.extension().unwrap_or_default().to_string_lossy()
    ));

    if !backup_path.exists() {
        std::fs::copy(path, &backup_path).context("Failed to create backup")?;
        log::debug!("Backup created: {}", backup_path.display());
    }

    Ok(backup_path)
}

/// Build edits from `KEY=VALUE` assignments and keys to remove.
///
/// Keys are matched case-insensitively against the canonical mapping;
/// anything else becomes a native additional field.
pub fn build_edits(assignments: &[String], removals: &[String]) -> Result<TagData> {
    let mut edits = TagData::new();

    for assignment in assignments {
        let (key, value) = assignment
            .split_once('=')
            .with_context(|| format!("Expected KEY=VALUE, got '{assignment}'"))?;
        let key = key.trim().to_uppercase();
        if key.is_empty() {
            anyhow::bail!("Empty key in '{assignment}'");
        }
        match vorbis::field_for_key(&key) {
            Some(field) => edits.set(field, value),
            None => edits.add_additional(AdditionalField::new(TagType::Native, key, value)),
        }
    }

    for key in removals {
        let key = key.trim().to_uppercase();
        match vorbis::field_for_key(&key) {
            Some(field) => edits.set(field, ""),
            None => edits.add_additional(AdditionalField {
                marked_for_deletion: true,
                ..AdditionalField::new(TagType::Native, key, "")
            }),
        }
    }

    Ok(edits)
}

/// Native keys touched by `edits`, in write order.
fn touched_keys(edits: &TagData) -> Vec<String> {
    let mapped = vorbis::FIELD_MAPPING
        .iter()
        .filter(|(_, field)| edits.fields.contains_key(field))
        .map(|(key, _)| key.to_string());
    let additional = edits
        .additional_fields
        .iter()
        .map(|f| f.native_key.clone());
    mapped.chain(additional).collect()
}

/// Read a file's tag, apply `action` and write the result back.
///
/// Failures are reported in [`ProcessResult::error`]; the file is left as is.
pub fn process_file(path: &Path, action: &Action, config: &Config) -> ProcessResult {
    let mut result = ProcessResult {
        path: path.to_path_buf(),
        existing: None,
        fields_written: Vec::new(),
        backup_path: None,
        error: None,
    };

    // Clearing has to see unmapped keys to mark them deleted
    let read_options = match action {
        Action::Update(_) => ReadOptions::from(config),
        Action::Clear => ReadOptions {
            read_all_fields: true,
            ..ReadOptions::from(config)
        },
    };

    let current = match flac::read_flac(path, &read_options) {
        Ok(tag) => tag,
        Err(e) => {
            result.error = Some(format!("{e:#}"));
            return result;
        }
    };

    let edits = match action {
        Action::Update(edits) => edits.clone(),
        Action::Clear => VorbisTag::deletion_tag(&current.tag),
    };
    result.fields_written = touched_keys(&edits);
    result.existing = Some(current.tag);

    if config.output.dry_run {
        log::info!("  Dry run: {} left untouched", path.display());
        return result;
    }

    if config.output.backup_originals {
        match backup_file(path) {
            Ok(backup) => result.backup_path = Some(backup),
            Err(e) => log::warn!("Failed to backup {}: {e}", path.display()),
        }
    }

    if let Err(e) = flac::write_flac(path, &edits, config) {
        result.error = Some(format!("Failed to write tag: {e:#}"));
    }

    result
}
