//! Package registry model: a named, versioned manifest of downloadable files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single file belonging to a Package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageFile {
    pub destination_path: String,
    /// Octal file mode string, e.g. `"755"`.
    pub file_mode: String,
    pub download_url: Option<String>,
    /// Either a reference into the blob store or an external URL -- at least one
    /// of `download_url` / `blob_ref` must be set (enforced by `PackageFile::validate`).
    pub blob_ref: Option<String>,
}

impl PackageFile {
    pub fn validate(&self) -> Result<(), PackageError> {
        if self.download_url.is_none() && self.blob_ref.is_none() {
            return Err(PackageError::MissingFileSource(self.destination_path.clone()));
        }
        if !self.file_mode.chars().all(|c| c.is_ascii_digit()) || self.file_mode.is_empty() {
            return Err(PackageError::InvalidFileMode(self.file_mode.clone()));
        }
        Ok(())
    }
}

/// A named, versioned collection of installable files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: i64,
    pub created_by: Option<String>,
    pub created_time: DateTime<Utc>,
    pub modified_time: DateTime<Utc>,
    pub files: Vec<PackageFile>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PackageError {
    #[error("package name must be alphabetic: '{0}'")]
    InvalidName(String),
    #[error("package version must be a positive integer: {0}")]
    InvalidVersion(i64),
    #[error("package file '{0}' has neither a download_url nor a blob_ref")]
    MissingFileSource(String),
    #[error("invalid octal file_mode: '{0}'")]
    InvalidFileMode(String),
    #[error("package already exists: {0}.{1}")]
    AlreadyExists(String, i64),
    #[error("package not found: {0}.{1}")]
    NotFound(String, i64),
}

/// Validates a package name (`[A-Za-z]+`) and a positive version.
pub fn validate_package_identity(name: &str, version: i64) -> Result<(), PackageError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(PackageError::InvalidName(name.to_string()));
    }
    if version <= 0 {
        return Err(PackageError::InvalidVersion(version));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_alphabetic_name() {
        assert_eq!(
            validate_package_identity("xcode-tools", 1),
            Err(PackageError::InvalidName("xcode-tools".to_string()))
        );
    }

    #[test]
    fn rejects_non_positive_version() {
        assert_eq!(
            validate_package_identity("xcodetools", 0),
            Err(PackageError::InvalidVersion(0))
        );
    }

    #[test]
    fn accepts_valid_identity() {
        assert!(validate_package_identity("xcodetools", 4).is_ok());
    }

    #[test]
    fn file_requires_a_source() {
        let file = PackageFile {
            destination_path: "bin/tool".to_string(),
            file_mode: "755".to_string(),
            download_url: None,
            blob_ref: None,
        };
        assert_eq!(
            file.validate(),
            Err(PackageError::MissingFileSource("bin/tool".to_string()))
        );
    }

    #[test]
    fn file_with_external_url_is_valid() {
        let file = PackageFile {
            destination_path: "bin/tool".to_string(),
            file_mode: "755".to_string(),
            download_url: Some("https://example.com/tool".to_string()),
            blob_ref: None,
        };
        assert!(file.validate().is_ok());
    }
}
