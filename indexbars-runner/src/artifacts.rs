//! Artifact rendering and persistence.
//!
//! Rendering happens fully in memory; persistence writes `<file>.tmp` and
//! renames it into place, so a reader never sees a half-written output.

use indexbars_core::data::{PriceRecord, TimeSeriesDocument};
use std::fs;
use std::path::{Path, PathBuf};

use crate::pipeline::RunError;

/// A rendered output file that has not been written yet.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// BLAKE3 hex digest of the rendered bytes.
    pub fn content_hash(&self) -> String {
        blake3::hash(&self.bytes).to_hex().to_string()
    }
}

/// Render the merged rows as CSV with the provider's column names as header.
///
/// Missing values are empty fields.
pub fn render_prices_csv(rows: &[PriceRecord], path: PathBuf) -> Result<Artifact, RunError> {
    let persist = |reason: String| RunError::Persist {
        path: path.clone(),
        reason,
    };

    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row)
            .map_err(|e| persist(format!("CSV serialization failed: {e}")))?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| persist(format!("CSV flush failed: {e}")))?;

    Ok(Artifact { path, bytes })
}

/// Render the index document as 4-space indented JSON.
pub fn render_index_json(doc: &TimeSeriesDocument, path: PathBuf) -> Result<Artifact, RunError> {
    let bytes = doc.to_json_pretty().map_err(|e| RunError::Persist {
        path: path.clone(),
        reason: format!("JSON serialization failed: {e}"),
    })?;
    Ok(Artifact { path, bytes })
}

/// Write an artifact atomically, creating its directory first.
pub fn persist(artifact: &Artifact) -> Result<(), RunError> {
    persist_all(&[artifact])
}

/// Write every artifact or none of them.
///
/// All temp files are written before any target is replaced. An existing
/// target is moved to `<file>.bak` until the whole set is in place; if any
/// rename fails, targets already replaced are removed and their backups
/// restored.
pub fn persist_all(artifacts: &[&Artifact]) -> Result<(), RunError> {
    let mut staged: Vec<Staged<'_>> = Vec::with_capacity(artifacts.len());
    for &artifact in artifacts {
        match stage(artifact) {
            Ok(tmp) => staged.push(Staged {
                artifact,
                tmp,
                backup: None,
            }),
            Err(e) => {
                discard(&staged);
                return Err(e);
            }
        }
    }

    for i in 0..staged.len() {
        if let Err(e) = commit(&mut staged[i]) {
            rollback(&staged[..i]);
            discard(&staged[i + 1..]);
            return Err(e);
        }
    }

    for s in &staged {
        if let Some(backup) = &s.backup {
            let _ = fs::remove_file(backup);
        }
        tracing::info!(
            path = %s.artifact.path.display(),
            bytes = s.artifact.bytes.len(),
            "wrote artifact"
        );
    }
    Ok(())
}

/// An artifact whose bytes sit in a temp file next to the target.
struct Staged<'a> {
    artifact: &'a Artifact,
    tmp: PathBuf,
    backup: Option<PathBuf>,
}

fn persist_error(path: &Path, what: &str, e: std::io::Error) -> RunError {
    RunError::Persist {
        path: path.to_path_buf(),
        reason: format!("{what}: {e}"),
    }
}

fn stage(artifact: &Artifact) -> Result<PathBuf, RunError> {
    let path = &artifact.path;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .map_err(|e| persist_error(path, "failed to create output dir", e))?;
    }

    let tmp = sibling(path, ".tmp");
    fs::write(&tmp, &artifact.bytes).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        persist_error(path, "failed to write temp file", e)
    })?;
    Ok(tmp)
}

/// Move the temp file onto the target, keeping any previous file as a backup.
fn commit(s: &mut Staged<'_>) -> Result<(), RunError> {
    let artifact = s.artifact;
    let path = &artifact.path;

    if path.is_file() {
        let backup = sibling(path, ".bak");
        if let Err(e) = fs::rename(path, &backup) {
            let _ = fs::remove_file(&s.tmp);
            return Err(persist_error(path, "failed to back up previous output", e));
        }
        s.backup = Some(backup);
    }

    if let Err(e) = fs::rename(&s.tmp, path) {
        let _ = fs::remove_file(&s.tmp);
        if let Some(backup) = &s.backup {
            let _ = fs::rename(backup, path);
        }
        return Err(persist_error(path, "atomic rename failed", e));
    }
    Ok(())
}

/// Undo committed artifacts: drop the new file, put the backup back.
fn rollback(committed: &[Staged<'_>]) {
    for s in committed {
        let path = &s.artifact.path;
        let _ = fs::remove_file(path);
        if let Some(backup) = &s.backup {
            let _ = fs::rename(backup, path);
        }
        tracing::warn!(path = %path.display(), "rolled back artifact");
    }
}

fn discard(staged: &[Staged<'_>]) {
    for s in staged {
        let _ = fs::remove_file(&s.tmp);
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}
