use crate::error::{DeppyError, Result};
use std::path::{Component, Path, PathBuf};

/// Provides safe path validation helpers to avoid traversal and host intrusion.
pub struct PathValidator;

impl PathValidator {
    /// Validates and canonicalises a working tree root.
    pub fn validate_project_path(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        let canonical = path.canonicalize().map_err(|e| {
            DeppyError::PathValidation(format!("Invalid path '{}': {e}", path.display()))
        })?;

        if !canonical.is_dir() {
            return Err(DeppyError::PathValidation(format!(
                "Path '{}' is not a directory",
                canonical.display()
            )));
        }

        const FORBIDDEN: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

        for forbidden in FORBIDDEN {
            let forbidden_path = Path::new(forbidden);
            let canonical_forbidden = forbidden_path
                .canonicalize()
                .unwrap_or_else(|_| forbidden_path.to_path_buf());

            if canonical.starts_with(forbidden_path) || canonical.starts_with(&canonical_forbidden)
            {
                return Err(DeppyError::PathValidation(format!(
                    "Access to system directory '{}' is not allowed",
                    forbidden
                )));
            }
        }

        Ok(canonical)
    }

    /// Accepts only plain relative paths (`frontend/package.json`), rejecting
    /// absolute paths and any parent-directory component.
    pub fn validate_relative_path(path: &str) -> Result<PathBuf> {
        if path.trim().is_empty() {
            return Err(DeppyError::PathValidation("Empty path".to_string()));
        }

        let candidate = Path::new(path);
        for component in candidate.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(DeppyError::PathValidation(format!(
                        "Path '{path}' must stay inside the working tree"
                    )));
                }
            }
        }

        Ok(candidate.to_path_buf())
    }

    /// Ensures an existing file resolves (after symlinks) inside the base directory.
    pub fn validate_file_path(
        file_path: impl AsRef<Path>,
        base_dir: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let file_path = file_path.as_ref();
        let base_dir = base_dir.as_ref();

        let canonical_file = file_path.canonicalize().map_err(|e| {
            DeppyError::PathValidation(format!(
                "Invalid file path '{}': {e}",
                file_path.display()
            ))
        })?;

        let canonical_base = base_dir.canonicalize().map_err(|e| {
            DeppyError::PathValidation(format!(
                "Invalid base directory '{}': {e}",
                base_dir.display()
            ))
        })?;

        if !canonical_file.starts_with(&canonical_base) {
            return Err(DeppyError::PathValidation(
                "File path is outside the allowed directory".to_string(),
            ));
        }

        Ok(canonical_file)
    }
}
