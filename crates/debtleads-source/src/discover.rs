use std::path::{Path, PathBuf};

use tracing::info;

use crate::SourceError;

/// Files in `dir` whose name starts with `prefix` and ends in `.extension`,
/// both compared case-insensitively. Sorted by path.
pub fn discover_plan_files(
    dir: &Path,
    prefix: &str,
    extension: &str,
) -> Result<Vec<PathBuf>, SourceError> {
    let entries = std::fs::read_dir(dir).map_err(|e| SourceError::io(dir, e))?;
    let prefix = prefix.to_lowercase();

    let mut found = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| SourceError::io(dir, e))?.path();
        if !path.is_file() {
            continue;
        }
        let name_matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.to_lowercase().starts_with(&prefix));
        let ext_matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if name_matches && ext_matches {
            found.push(path);
        }
    }

    if found.is_empty() {
        return Err(SourceError::NoFiles {
            dir: dir.to_path_buf(),
            pattern: format!("{prefix}*.{extension}"),
        });
    }
    found.sort();
    info!(dir = %dir.display(), count = found.len(), "discovered plan files");
    Ok(found)
}
