//! Data types shared across operations.

use russh_sftp::protocol::FileAttributes;
use serde::{Deserialize, Serialize};

/// A single entry produced by list and walk operations. Read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not the full path)
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Whether the entry is a directory
    pub is_dir: bool,
    /// Last modified time (Unix timestamp)
    pub modified: i64,
    /// Permissions as an octal string, e.g. "755"
    pub permissions: String,
}

impl DirEntry {
    pub(crate) fn from_attrs(name: String, attrs: &FileAttributes) -> Self {
        let permissions = attrs
            .permissions
            .map(|p| format!("{:o}", p & 0o777))
            .unwrap_or_else(|| "000".to_string());

        Self {
            name,
            size: attrs.size.unwrap_or(0),
            is_dir: attrs.is_dir(),
            modified: attrs.mtime.map(|t| t as i64).unwrap_or(0),
            permissions,
        }
    }
}

/// Transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Upload,
    Download,
}

/// Cumulative progress emitted after each copied chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferProgress {
    /// Transfer direction
    pub direction: TransferDirection,
    /// Bytes counted toward completion so far. Uploads count newly written
    /// bytes only; downloads include the pre-existing local prefix.
    pub transferred: u64,
    /// Total bytes of the source file
    pub total: u64,
}

impl TransferProgress {
    pub(crate) fn new(direction: TransferDirection, transferred: u64, total: u64) -> Self {
        Self {
            direction,
            transferred,
            total,
        }
    }

    /// Completion percentage in `[0, 100]`. Zero-length sources report 100
    /// immediately instead of dividing by zero.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.transferred as f64 / self.total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        let p = TransferProgress::new(TransferDirection::Download, 512, 1024);
        assert!((p.percent() - 50.0).abs() < f64::EPSILON);

        let p = TransferProgress::new(TransferDirection::Upload, 1024, 1024);
        assert!((p.percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_percent_zero_length_source() {
        let p = TransferProgress::new(TransferDirection::Upload, 0, 0);
        assert!((p.percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_dir_entry_from_attrs() {
        let attrs = FileAttributes {
            size: Some(42),
            mtime: Some(1_700_000_000),
            permissions: Some(0o644),
            ..Default::default()
        };
        let entry = DirEntry::from_attrs("notes.txt".to_string(), &attrs);
        assert_eq!(entry.name, "notes.txt");
        assert_eq!(entry.size, 42);
        assert_eq!(entry.modified, 1_700_000_000);
        assert_eq!(entry.permissions, "644");
        assert!(!entry.is_dir);
    }

    #[test]
    fn test_dir_entry_missing_attrs() {
        let attrs = FileAttributes::default();
        let entry = DirEntry::from_attrs("x".to_string(), &attrs);
        assert_eq!(entry.size, 0);
        assert_eq!(entry.modified, 0);
        assert_eq!(entry.permissions, "000");
    }
}
