//! Path safety for evidence writes
//!
//! Session ids arrive from clients and end up as directory names under the
//! evidence root. Every id is checked before it touches the filesystem:
//! 1. Single, non-empty path component (no separators, no NUL)
//! 2. Not "." / ".." and not hidden
//! 3. The resolved directory stays inside the evidence root

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PathValidationError {
    #[error("Absolute path not allowed: {path}")]
    AbsolutePathNotAllowed { path: String },

    #[error("Path traversal detected in: {path}")]
    PathTraversalDetected { path: String },

    #[error("Path escapes evidence root: {path} (root: {root})")]
    EscapesEvidenceRoot { path: String, root: String },

    #[error("Cannot canonicalize path: {path} ({reason})")]
    CanonicalizeError { path: String, reason: String },

    #[error("Invalid path component: {component}")]
    InvalidComponent { component: String },
}

/// Validate that a string is usable as exactly one path component
pub fn validate_path_component(component: &str) -> Result<(), PathValidationError> {
    if component.is_empty() {
        return Err(PathValidationError::InvalidComponent {
            component: "<empty>".to_string(),
        });
    }

    if component.contains('\0') {
        return Err(PathValidationError::InvalidComponent {
            component: component.to_string(),
        });
    }

    if component.contains('/') || component.contains('\\') {
        return Err(PathValidationError::PathTraversalDetected {
            path: component.to_string(),
        });
    }

    if component == "." || component == ".." {
        return Err(PathValidationError::PathTraversalDetected {
            path: component.to_string(),
        });
    }

    // Drive-letter prefix (C:)
    if component.len() >= 2 && component.chars().nth(1) == Some(':') {
        return Err(PathValidationError::AbsolutePathNotAllowed {
            path: component.to_string(),
        });
    }

    Ok(())
}

/// Session ids: safe component, restricted charset, not hidden
pub fn validate_session_id(session_id: &str) -> Result<(), PathValidationError> {
    validate_path_component(session_id)?;

    if session_id.starts_with('.')
        || !session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(PathValidationError::InvalidComponent {
            component: session_id.to_string(),
        });
    }

    Ok(())
}

/// Join a validated component onto a base directory
pub fn safe_join(base: &Path, component: &str) -> Result<PathBuf, PathValidationError> {
    validate_path_component(component)?;
    Ok(base.join(component))
}

/// Confirm an existing directory resolves inside `root` (symlinks included)
pub fn ensure_within_root(root: &Path, dir: &Path) -> Result<PathBuf, PathValidationError> {
    let canonicalize = |p: &Path| {
        p.canonicalize()
            .map_err(|e| PathValidationError::CanonicalizeError {
                path: p.display().to_string(),
                reason: e.to_string(),
            })
    };

    let canonical_root = canonicalize(root)?;
    let canonical_dir = canonicalize(dir)?;

    if !canonical_dir.starts_with(&canonical_root) {
        return Err(PathValidationError::EscapesEvidenceRoot {
            path: canonical_dir.display().to_string(),
            root: canonical_root.display().to_string(),
        });
    }

    Ok(canonical_dir)
}
