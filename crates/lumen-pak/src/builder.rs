//! Package builder

use crate::entry::PakEntry;
use lumen_core::{AssetHandle, Result};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// What went into a freshly built package
#[derive(Debug, Clone, Default)]
pub struct PakSummary {
    /// Directory entries in the order their payloads were written
    pub entries: Vec<PakEntry>,
    /// Files left out because their name is not a handle (or repeats one)
    pub skipped: Vec<PathBuf>,
    /// Total size of the payload region in bytes
    pub payload_bytes: u64,
}

/// Build a package from every cooked asset in `source_dir`.
///
/// Cooked assets are regular files named after their decimal handle. Anything
/// else in the directory is skipped, not treated as an error. Files are
/// appended in file-name order so identical inputs produce identical packages.
pub fn build_package<P: AsRef<Path>, Q: AsRef<Path>>(
    source_dir: P,
    output: Q,
) -> Result<PakSummary> {
    let source_dir = source_dir.as_ref();
    let output = output.as_ref();

    let mut files = Vec::new();
    for entry in fs::read_dir(source_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(output)?);

    let mut summary = PakSummary::default();
    let mut seen = HashSet::new();
    for path in files {
        // The output may live inside the source directory
        if path == output {
            continue;
        }

        let id = match path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(AssetHandle::from_file_name)
        {
            Some(id) => id,
            None => {
                log::debug!("Skipping non-asset file {}", path.display());
                summary.skipped.push(path);
                continue;
            }
        };

        if !seen.insert(id) {
            log::warn!("Skipping {}: handle {} already packed", path.display(), id);
            summary.skipped.push(path);
            continue;
        }

        let mut input = File::open(&path)?;
        let size = io::copy(&mut input, &mut writer)?;
        summary.entries.push(PakEntry {
            id,
            offset: summary.payload_bytes,
            size,
        });
        summary.payload_bytes += size;
    }

    for entry in &summary.entries {
        writer.write_all(&entry.to_bytes())?;
    }
    writer.write_all(&(summary.entries.len() as u64).to_ne_bytes())?;
    writer.flush()?;

    log::info!(
        "Packed {} assets ({} bytes) into {}",
        summary.entries.len(),
        summary.payload_bytes,
        output.display()
    );
    Ok(summary)
}
