use std::{fs, path::{Path, PathBuf}, sync::LazyLock};

use anyhow::{Context, Result};
use regex::Regex;
use walkdir::WalkDir;

use crate::error::ConfigError;

static NON_DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\D").expect("valid regex"));

/// Create the directory if it doesn’t exist; error if a non-directory exists there.
pub(crate) fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("Path exists but is not a directory: {}", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Error unless the directory already exists.
pub(crate) fn require_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Directory does not exist: {}", path.display());
    }
    if !path.is_dir() {
        anyhow::bail!("Path exists but is not a directory: {}", path.display());
    }
    Ok(())
}

/// List the `.shp` files directly inside `dir`, sorted by file name.
pub fn find_shapefiles(dir: &Path) -> Result<Vec<PathBuf>> {
    require_dir_exists(dir)?;

    let mut paths = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to list directory {}", dir.display()))?
        .into_iter()
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("shp")))
        .collect::<Vec<_>>();

    paths.sort();
    Ok(paths)
}

/// Derive a revision year from a file label by stripping every non-digit character.
pub fn revision_year(label: &str) -> Result<String, ConfigError> {
    let digits = NON_DIGIT.replace_all(label, "");
    if digits.is_empty() {
        return Err(ConfigError::InvalidRevisionLabel(label.to_string()));
    }
    Ok(digits.into_owned())
}
