//! Student photos are plain copies kept in the photo directory; the student
//! row stores the copy's path. Image content is never inspected.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::info;

/// Copy `source` into `photos_dir` under its own file name and return the
/// destination. Files already in the photo directory are left in place.
pub fn import_photo(photos_dir: &Path, source: &Path) -> Result<PathBuf> {
    if !source.is_file() {
        return Err(anyhow!("Photo introuvable : {}", source.display()));
    }
    let file_name = source
        .file_name()
        .ok_or_else(|| anyhow!("Chemin de photo invalide : {}", source.display()))?;

    fs::create_dir_all(photos_dir).context("failed to create photos directory")?;
    let dest = photos_dir.join(file_name);

    if is_same_file(source, &dest) {
        return Ok(dest);
    }

    fs::copy(source, &dest)
        .with_context(|| format!("failed to copy photo to {}", dest.display()))?;
    info!(from = %source.display(), to = %dest.display(), "imported photo");
    Ok(dest)
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
