//! Upload directory layout and stored file naming.

use rand::prelude::RngExt;
use rand::rng;
use std::{io, path::Path};

/// Permissions applied to the upload directory: owner rwx, group and other rx.
#[cfg(unix)]
const UPLOAD_DIR_MODE: u32 = 0o755;

/// Create the upload directory tree if it is missing and apply the upload directory mode.
///
/// Idempotent: calling it on an existing directory only re-applies the permissions. Fails if
/// the path exists and is not a directory, or if the process cannot create or chmod it.
pub fn ensure_directory(path: &Path) -> io::Result<()> {
    std::fs::create_dir_all(path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(UPLOAD_DIR_MODE))?;
    }

    Ok(())
}

/// The final `.suffix` of the last path component of `filename`, including the dot.
///
/// Returns an empty string when there is no suffix. Dotfiles such as `.bashrc` and names
/// ending in a bare dot have no suffix.
pub fn original_extension(filename: &str) -> &str {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match name.rfind('.') {
        Some(0) | None => "",
        Some(idx) if idx == name.len() - 1 => "",
        Some(idx) => &name[idx..],
    }
}

/// Generate a stored file name: 32 lowercase hex characters followed by the original extension.
pub fn unique_name(original_filename: &str) -> String {
    let mut token = [0u8; 16];
    rng().fill(&mut token);
    format!("{:032x}{}", u128::from_be_bytes(token), original_extension(original_filename))
}
