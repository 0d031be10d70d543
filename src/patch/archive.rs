use std::fs::File;
use std::path::Path;

use tracing::debug;

use crate::patch::error::PipelineError;

/// Unpack a zip archive into `dest`, replacing anything already there
///
/// Returns the number of archive entries. Entry names that would escape
/// `dest` are rejected by the zip reader.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> Result<usize, PipelineError> {
    if dest.exists() {
        std::fs::remove_dir_all(dest).map_err(PipelineError::io(dest))?;
    }
    std::fs::create_dir_all(dest).map_err(PipelineError::io(dest))?;

    let file = File::open(archive_path).map_err(PipelineError::io(archive_path))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|source| PipelineError::Extract {
        path: archive_path.to_path_buf(),
        source,
    })?;

    let entries = archive.len();
    archive.extract(dest).map_err(|source| PipelineError::Extract {
        path: archive_path.to_path_buf(),
        source,
    })?;

    debug!("Extracted {} entries from {:?} into {:?}", entries, archive_path, dest);
    Ok(entries)
}
