use std::fs;
use std::path::Path;

use tar::Archive;

use crate::error::SpireError;

/// Unpacks a tar archive into `target_dir`, refusing entries that would land
/// outside it.
pub fn extract_tar(tar_path: &Path, target_dir: &Path) -> Result<usize, SpireError> {
    let file = fs::File::open(tar_path)
        .map_err(|err| SpireError::Filesystem(format!("open tar {}: {err}", tar_path.display())))?;
    fs::create_dir_all(target_dir).map_err(|err| SpireError::Filesystem(err.to_string()))?;

    let mut archive = Archive::new(file);
    let entries = archive
        .entries()
        .map_err(|err| SpireError::Filesystem(err.to_string()))?;
    let mut unpacked = 0usize;
    for entry in entries {
        let mut entry = entry.map_err(|err| SpireError::Filesystem(err.to_string()))?;
        let inside = entry
            .unpack_in(target_dir)
            .map_err(|err| SpireError::Filesystem(err.to_string()))?;
        if !inside {
            return Err(SpireError::Filesystem(
                "tar entry path traversal detected".to_string(),
            ));
        }
        unpacked += 1;
    }
    Ok(unpacked)
}
