//! File permission handling for extracted entries.

use std::path::Path;

use crate::Result;
use crate::tar::header::MODE_MASK;

/// Sets the permission bits of an extracted file to exactly `mode`.
///
/// Files are created subject to the process umask; this call applies the
/// stored mode afterwards with `chmod`, which the umask does not affect.
/// Only the low twelve permission bits are used.
///
/// On non-Unix platforms only the read-only flag is derived from `mode`.
///
/// # Errors
///
/// Returns an error if the permissions cannot be changed.
pub fn apply_mode(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & MODE_MASK))?;
    }

    #[cfg(not(unix))]
    {
        let mut permissions = std::fs::metadata(path)?.permissions();
        permissions.set_readonly(mode & MODE_MASK & 0o222 == 0);
        std::fs::set_permissions(path, permissions)?;
    }

    Ok(())
}
