//! Path validation: filesystem sandboxing to the projects root.
//!
//! Every path argument the model supplies is resolved relative to the
//! configured projects root and rejected if resolution would leave that
//! root. The check holds under `..` segments, absolute paths, and symlinks
//! pointing outside the root: the candidate's nearest existing ancestor is
//! canonicalized and prefix-checked against the canonicalized root.

use std::path::{Component, Path, PathBuf};

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path '{path}' escapes the projects root")]
    Escape { path: String },

    #[error("Projects root '{root}' is not accessible: {reason}")]
    RootUnavailable { root: String, reason: String },
}

/// Resolve `candidate` under `root`, rejecting anything that would land
/// outside it.
///
/// `root` must exist (the tool catalog creates it at construction time).
/// `candidate` is interpreted as relative to `root`; a leading component
/// equal to `root`'s directory name is stripped, so "calculator_app/x.html"
/// and "ai_projects/calculator_app/x.html" resolve to the same file.
///
/// Returns the absolute path on success. Never touches the candidate path
/// itself on disk.
pub fn resolve_under_root(root: &Path, candidate: &str) -> Result<PathBuf, PathValidationError> {
    let canonical_root = root
        .canonicalize()
        .map_err(|e| PathValidationError::RootUnavailable {
            root: root.display().to_string(),
            reason: e.to_string(),
        })?;

    let normalized = candidate.replace('\\', "/");
    let relative = normalized.trim_start_matches('/');

    // Reject traversal before looking at the filesystem at all.
    let rel_path = Path::new(relative);
    let mut clean = PathBuf::new();
    for component in rel_path.components() {
        match component {
            Component::Normal(seg) => clean.push(seg),
            Component::CurDir => {}
            _ => {
                return Err(PathValidationError::Escape {
                    path: candidate.into(),
                });
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(PathValidationError::Escape {
            path: candidate.into(),
        });
    }

    // Tolerate the model echoing the root folder name back.
    let clean = match (root.file_name(), clean.components().next()) {
        (Some(root_name), Some(Component::Normal(first))) if first == root_name => {
            clean.components().skip(1).collect::<PathBuf>()
        }
        _ => clean,
    };
    if clean.as_os_str().is_empty() {
        return Err(PathValidationError::Escape {
            path: candidate.into(),
        });
    }

    let resolved = canonical_root.join(&clean);

    // Symlink check: canonicalize the nearest existing ancestor and make
    // sure it is still inside the root.
    let mut existing = resolved.as_path();
    while !existing.exists() {
        existing = match existing.parent() {
            Some(parent) => parent,
            None => break,
        };
    }
    if existing.exists() {
        let canonical_existing =
            existing
                .canonicalize()
                .map_err(|e| PathValidationError::RootUnavailable {
                    root: root.display().to_string(),
                    reason: e.to_string(),
                })?;
        if !canonical_existing.starts_with(&canonical_root) {
            return Err(PathValidationError::Escape {
                path: candidate.into(),
            });
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_root() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("ai_projects");
        std::fs::create_dir_all(&root).unwrap();
        (dir, root)
    }

    #[test]
    fn relative_path_resolves_under_root() {
        let (_guard, root) = setup_root();
        let resolved = resolve_under_root(&root, "calculator_app/index.html").unwrap();
        assert!(resolved.starts_with(root.canonicalize().unwrap()));
        assert!(resolved.ends_with("calculator_app/index.html"));
    }

    #[test]
    fn traversal_rejected() {
        let (_guard, root) = setup_root();
        let err = resolve_under_root(&root, "../../etc/passwd").unwrap_err();
        assert!(matches!(err, PathValidationError::Escape { .. }));
    }

    #[test]
    fn mid_path_traversal_rejected() {
        let (_guard, root) = setup_root();
        let err = resolve_under_root(&root, "app/../../../etc/passwd").unwrap_err();
        assert!(matches!(err, PathValidationError::Escape { .. }));
    }

    #[test]
    fn absolute_path_is_treated_as_relative() {
        let (_guard, root) = setup_root();
        // A leading slash is stripped rather than honored
        let resolved = resolve_under_root(&root, "/app/main.py").unwrap();
        assert!(resolved.starts_with(root.canonicalize().unwrap()));
    }

    #[test]
    fn empty_path_rejected() {
        let (_guard, root) = setup_root();
        assert!(resolve_under_root(&root, "").is_err());
        assert!(resolve_under_root(&root, ".").is_err());
        assert!(resolve_under_root(&root, "/").is_err());
    }

    #[test]
    fn root_prefix_is_stripped() {
        let (_guard, root) = setup_root();
        let a = resolve_under_root(&root, "ai_projects/todo_app/index.html").unwrap();
        let b = resolve_under_root(&root, "todo_app/index.html").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_root_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("never_created");
        let err = resolve_under_root(&root, "file.txt").unwrap_err();
        assert!(matches!(err, PathValidationError::RootUnavailable { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_rejected() {
        let (guard, root) = setup_root();
        let outside = guard.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("leak")).unwrap();

        let err = resolve_under_root(&root, "leak/secret.txt").unwrap_err();
        assert!(matches!(err, PathValidationError::Escape { .. }));
    }

    #[test]
    fn backslashes_are_normalized() {
        let (_guard, root) = setup_root();
        let err = resolve_under_root(&root, "..\\..\\etc\\passwd").unwrap_err();
        assert!(matches!(err, PathValidationError::Escape { .. }));
    }
}
