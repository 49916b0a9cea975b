//! Filesystem utilities.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern, PatternError};
use thiserror::Error;
use walkdir::WalkDir;

/// Pattern used when a copy names none.
pub const ALL_FILES: &str = "*";

/// Error from [`copy`].
#[derive(Debug, Error)]
pub enum CopyError {
    #[error("copy source does not exist: {}", path.display())]
    SourceMissing { path: PathBuf },

    #[error("invalid file pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: PatternError,
    },

    #[error("failed to walk {}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to copy {} to {}", from.display(), to.display())]
    Io {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Recursively copy files whose name matches `pattern` from `source` to
/// `destination`, preserving their paths relative to `source`.
///
/// Directories are created as needed. A source with no matching files is
/// not an error. `pattern` defaults to [`ALL_FILES`]. Returns the number of
/// files copied.
pub fn copy(source: &Path, destination: &Path, pattern: Option<&str>) -> Result<usize, CopyError> {
    if !source.exists() {
        return Err(CopyError::SourceMissing {
            path: source.to_path_buf(),
        });
    }

    let pattern_str = pattern.unwrap_or(ALL_FILES);
    let pattern = Pattern::new(pattern_str).map_err(|source| CopyError::InvalidPattern {
        pattern: pattern_str.to_string(),
        source,
    })?;
    let options = MatchOptions {
        case_sensitive: !cfg!(windows),
        ..MatchOptions::default()
    };

    // A single file source copies into the destination directory.
    if source.is_file() {
        let matches = source
            .file_name()
            .map(|name| pattern.matches_with(&name.to_string_lossy(), options))
            .unwrap_or(false);
        if !matches {
            return Ok(0);
        }
        let name = source.file_name().unwrap_or(source.as_os_str());
        copy_file(source, &destination.join(name))?;
        return Ok(1);
    }

    // Compare resolved paths so output nested in the source is never re-read.
    let root = absolute(source);
    let output = absolute(destination);

    let mut copied = 0;
    let walk = WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !entry.path().starts_with(&output));
    for entry in walk {
        let entry = entry.map_err(|e| CopyError::Walk {
            path: source.to_path_buf(),
            source: e,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if !pattern.matches_with(&entry.file_name().to_string_lossy(), options) {
            continue;
        }

        let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
        copy_file(entry.path(), &destination.join(relative))?;
        copied += 1;
    }

    tracing::debug!(
        "copied {} file(s) matching `{}` from {} to {}",
        copied,
        pattern_str,
        source.display(),
        destination.display()
    );
    Ok(copied)
}

/// `path` with its longest existing prefix canonicalized.
fn absolute(path: &Path) -> PathBuf {
    for existing in path.ancestors() {
        let dir = if existing.as_os_str().is_empty() {
            Path::new(".")
        } else {
            existing
        };
        if let Ok(resolved) = dir.canonicalize() {
            let rest = path.strip_prefix(existing).unwrap_or(Path::new(""));
            return resolved.join(rest);
        }
    }
    path.to_path_buf()
}

fn copy_file(from: &Path, to: &Path) -> Result<(), CopyError> {
    let io_err = |source| CopyError::Io {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::copy(from, to).map_err(io_err)?;
    Ok(())
}

/// Find the nearest file called `name` in `start` or one of its ancestors.
pub fn find_upwards(start: &Path, name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn populate(root: &Path) {
        fs::create_dir_all(root.join("shaders/post")).unwrap();
        fs::write(root.join("main.cs"), "class Main {}").unwrap();
        fs::write(root.join("shaders/basic.hlsl"), "float4 main()").unwrap();
        fs::write(root.join("shaders/post/bloom.hlsl"), "float4 bloom()").unwrap();
        fs::write(root.join("shaders/readme.txt"), "notes").unwrap();
    }

    #[test]
    fn test_copy_with_pattern_preserves_relative_paths() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("bin");
        populate(&src);

        let copied = copy(&src, &dst, Some("*.hlsl")).unwrap();

        assert_eq!(copied, 2);
        assert!(dst.join("shaders/basic.hlsl").exists());
        assert!(dst.join("shaders/post/bloom.hlsl").exists());
        assert!(!dst.join("main.cs").exists());
        assert!(!dst.join("shaders/readme.txt").exists());
    }

    #[test]
    fn test_copy_all_by_default() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("out");
        populate(&src);

        assert_eq!(copy(&src, &dst, None).unwrap(), 4);
        assert_eq!(
            fs::read_to_string(dst.join("main.cs")).unwrap(),
            "class Main {}"
        );
    }

    #[test]
    fn test_copy_missing_source() {
        let tmp = TempDir::new().unwrap();
        let err = copy(&tmp.path().join("nope"), &tmp.path().join("out"), None).unwrap_err();
        assert!(matches!(err, CopyError::SourceMissing { .. }));
    }

    #[test]
    fn test_copy_no_matches_is_noop() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("out");
        populate(&src);

        assert_eq!(copy(&src, &dst, Some("*.dll")).unwrap(), 0);
        assert!(!dst.exists());
    }

    #[test]
    fn test_copy_into_own_subdirectory_is_stable() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.dll"), "").unwrap();
        let dst = tmp.path().join("bin");

        assert_eq!(copy(tmp.path(), &dst, Some("*.dll")).unwrap(), 1);
        assert_eq!(copy(tmp.path(), &dst, Some("*.dll")).unwrap(), 1);
        assert!(dst.join("a.dll").exists());
        assert!(!dst.join("bin").exists());
    }

    #[test]
    fn test_copy_single_file() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("out");
        populate(&src);

        assert_eq!(copy(&src.join("main.cs"), &dst, None).unwrap(), 1);
        assert!(dst.join("main.cs").exists());
    }

    #[test]
    fn test_invalid_pattern() {
        let tmp = TempDir::new().unwrap();
        let err = copy(tmp.path(), &tmp.path().join("out"), Some("[")).unwrap_err();
        assert!(matches!(err, CopyError::InvalidPattern { .. }));
    }

    #[test]
    fn test_find_upwards() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(tmp.path().join("Kiln.toml"), "").unwrap();

        assert_eq!(
            find_upwards(&nested, "Kiln.toml"),
            Some(tmp.path().join("Kiln.toml"))
        );
        assert_eq!(find_upwards(&nested, "Missing.toml"), None);
    }
}
