use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

/// Finds `name` in the first data directory that holds it. A name pointing
/// at an existing file by itself is only used when no directory matches.
pub fn locate_file(name: impl AsRef<Path>, dirs: &[PathBuf]) -> Result<PathBuf> {
    let name = name.as_ref();
    for dir in dirs {
        let candidate = dir.join(name);
        debug!("Looking for {:?}", candidate);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    if name.is_file() {
        return Ok(name.to_path_buf());
    }
    bail!("Could not find {:?} in data directories {:?}", name, dirs)
}
