//! Install location resolution.
//!
//! Entry names come from untrusted archives. Before anything is written they
//! are resolved against the destination root and rejected if the result is
//! not the root itself or inside it.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use crate::PackageError;
use crate::Result;

/// Resolves `name` against `destination` and rejects escapes.
///
/// The resolution is purely lexical: `.` segments are dropped, `..` segments
/// remove the preceding component, and a name that is itself absolute
/// replaces the destination entirely. The filesystem is never consulted, so
/// this can be applied to paths that do not exist yet. A relative
/// `destination` is made absolute against the current working directory.
///
/// # Errors
///
/// Returns [`PackageError::Path`] carrying the resolved path and the
/// normalized destination when the resolved path lies outside the
/// destination. Fails with [`PackageError::Io`] only if the current working
/// directory is needed and cannot be determined.
///
/// # Examples
///
/// ```
/// use gempack_core::security::install_location;
/// use std::path::Path;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let target = install_location("lib/./code.rb", Path::new("/srv/gems/a"))?;
/// assert_eq!(target, Path::new("/srv/gems/a/lib/code.rb"));
///
/// let err = install_location("../other.rb", Path::new("/srv/gems/a")).unwrap_err();
/// assert_eq!(
///     err.to_string(),
///     "installing into parent path /srv/gems/other.rb of /srv/gems/a is not allowed"
/// );
/// # Ok(())
/// # }
/// ```
pub fn install_location(name: impl AsRef<Path>, destination: impl AsRef<Path>) -> Result<PathBuf> {
    let root = normalize(&std::path::absolute(destination.as_ref())?);
    let resolved = normalize(&root.join(name.as_ref()));

    if !resolved.starts_with(&root) {
        return Err(PackageError::Path {
            path: resolved,
            root,
        });
    }
    Ok(resolved)
}

/// Lexically normalizes an absolute path.
///
/// `..` at the root stays at the root, matching how the kernel resolves it.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => {
                normalized = PathBuf::from(prefix.as_os_str());
            }
            Component::RootDir => normalized.push(Component::RootDir),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_install_location_relative_file() {
        let temp = TempDir::new().expect("failed to create temp dir");
        let dest = temp.path().join("extract");
        let location = install_location("file.rb", &dest).unwrap();
        assert_eq!(location, dest.join("file.rb"));
        assert!(!dest.exists(), "resolution must not touch the filesystem");
    }

    #[test]
    #[cfg(unix)]
    fn test_install_location_absolute() {
        let err = install_location("/absolute.rb", "/tmp/extract").unwrap_err();
        assert_eq!(
            err.to_string(),
            "installing into parent path /absolute.rb of /tmp/extract is not allowed"
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_install_location_parent() {
        let err = install_location("../relative.rb", "/tmp/extract").unwrap_err();
        match err {
            PackageError::Path { path, root } => {
                assert_eq!(path, Path::new("/tmp/relative.rb"));
                assert_eq!(root, Path::new("/tmp/extract"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_install_location_climb_after_descent() {
        let cases = [
            "lib/../../escape.rb",
            "a/b/../../../escape.rb",
            "./../escape.rb",
            "lib/../../extract-sibling/x.rb",
        ];
        for name in cases {
            assert!(
                matches!(
                    install_location(name, "/tmp/extract"),
                    Err(PackageError::Path { .. })
                ),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_sibling_with_common_prefix_rejected() {
        // "/tmp/extract-evil" shares a string prefix with "/tmp/extract".
        let err = install_location("../extract-evil/a.rb", "/tmp/extract").unwrap_err();
        assert!(matches!(err, PackageError::Path { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn test_install_location_inner_parent_allowed() {
        let location = install_location("lib/sub/../code.rb", "/tmp/extract").unwrap();
        assert_eq!(location, Path::new("/tmp/extract/lib/code.rb"));
    }

    #[test]
    #[cfg(unix)]
    fn test_install_location_root_itself() {
        let location = install_location("lib/..", "/tmp/extract").unwrap();
        assert_eq!(location, Path::new("/tmp/extract"));
    }

    #[test]
    #[cfg(unix)]
    fn test_destination_is_normalized() {
        let location = install_location("a.rb", "/tmp/./x/../extract/").unwrap();
        assert_eq!(location, Path::new("/tmp/extract/a.rb"));
    }

    #[test]
    #[cfg(unix)]
    fn test_backslash_is_not_a_separator_on_unix() {
        let location = install_location("..\\escape.rb", "/tmp/extract").unwrap();
        assert_eq!(location, Path::new("/tmp/extract/..\\escape.rb"));
    }

    #[test]
    fn test_relative_destination_is_made_absolute() {
        let location = install_location("a.rb", "extract").unwrap();
        assert!(location.is_absolute());
        assert!(location.ends_with("extract/a.rb"));
    }

    #[test]
    #[cfg(unix)]
    fn test_parent_at_root_stays_at_root() {
        assert_eq!(normalize(Path::new("/../../etc")), Path::new("/etc"));
    }
}
