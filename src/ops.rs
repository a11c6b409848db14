//! Remote filesystem operations.
//!
//! Thin pass-throughs to the SFTP session. Each failure is wrapped with the
//! attempted operation and path. None of these check liveness first; a dead
//! session surfaces as a remote error (or [`Error::NotConnected`] once the
//! client has been closed).

use tracing::{debug, info};

use crate::client::SftpClient;
use crate::error::{Error, Result};
use crate::path;
use crate::types::DirEntry;

impl SftpClient {
    /// Remove a remote file.
    pub async fn remove_file(&self, remote_path: &str) -> Result<()> {
        self.sftp()?
            .remove_file(remote_path)
            .await
            .map_err(|e| Error::remote("remove", remote_path, e))
    }

    /// Remove a remote directory. The directory must be empty.
    pub async fn remove_dir(&self, remote_path: &str) -> Result<()> {
        self.sftp()?
            .remove_dir(remote_path)
            .await
            .map_err(|e| Error::remote("rmdir", remote_path, e))
    }

    /// Rename a remote file or directory.
    pub async fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        debug!("Renaming {} to {}", old_path, new_path);
        self.sftp()?
            .rename(old_path, new_path)
            .await
            .map_err(|e| Error::remote("rename", format!("{} -> {}", old_path, new_path), e))
    }

    /// Move a remote file. Alias of [`rename`](Self::rename).
    pub async fn move_file(&self, old_path: &str, new_path: &str) -> Result<()> {
        self.rename(old_path, new_path).await
    }

    /// Move a remote directory. Alias of [`rename`](Self::rename).
    pub async fn move_dir(&self, old_path: &str, new_path: &str) -> Result<()> {
        self.rename(old_path, new_path).await
    }

    /// List a remote directory. `.` and `..` are skipped.
    pub async fn list(&self, remote_path: &str) -> Result<Vec<DirEntry>> {
        debug!("Listing directory: {}", remote_path);

        let read_dir = self
            .sftp()?
            .read_dir(remote_path)
            .await
            .map_err(|e| Error::remote("list", remote_path, e))?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            let metadata = entry.metadata();
            entries.push(DirEntry::from_attrs(name, &metadata));
        }

        Ok(entries)
    }

    /// List only the plain entries (non-directories) of a remote directory.
    pub async fn list_files(&self, remote_path: &str) -> Result<Vec<DirEntry>> {
        let mut entries = self.list(remote_path).await?;
        entries.retain(|e| !e.is_dir);
        Ok(entries)
    }

    /// List only the subdirectories of a remote directory.
    pub async fn list_dirs(&self, remote_path: &str) -> Result<Vec<DirEntry>> {
        let mut entries = self.list(remote_path).await?;
        entries.retain(|e| e.is_dir);
        Ok(entries)
    }

    /// List files and directories together. Alias of [`list`](Self::list),
    /// kept for symmetry with [`list_files`](Self::list_files) and
    /// [`list_dirs`](Self::list_dirs).
    pub async fn list_files_and_dirs(&self, remote_path: &str) -> Result<Vec<DirEntry>> {
        self.list(remote_path).await
    }

    /// Create a single remote directory. The parent must exist.
    pub async fn make_dir(&self, remote_path: &str) -> Result<()> {
        self.sftp()?
            .create_dir(remote_path)
            .await
            .map_err(|e| Error::remote("mkdir", remote_path, e))
    }

    /// Stat a remote path.
    pub async fn stat(&self, remote_path: &str) -> Result<DirEntry> {
        let attrs = self
            .sftp()?
            .metadata(remote_path)
            .await
            .map_err(|e| Error::remote("stat", remote_path, e))?;

        let name = std::path::Path::new(remote_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(DirEntry::from_attrs(name, &attrs))
    }

    /// Richer existence check: `Ok(Some)` when the path resolves, `Ok(None)`
    /// when it does not exist, `Err` for any other failure.
    ///
    /// [`file_exists`](Self::file_exists) and
    /// [`folder_exists`](Self::folder_exists) collapse all three outcomes
    /// into a bool; use this when "absent" and "inaccessible" must be told
    /// apart.
    pub async fn try_stat(&self, remote_path: &str) -> Result<Option<DirEntry>> {
        match self.stat(remote_path).await {
            Ok(entry) => Ok(Some(entry)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Whether a remote file exists.
    ///
    /// Any stat failure — including permission denied — reports `false`.
    pub async fn file_exists(&self, remote_path: &str) -> bool {
        self.stat(remote_path).await.is_ok()
    }

    /// Whether a remote directory exists.
    ///
    /// Same narrowing as [`file_exists`](Self::file_exists): every stat
    /// failure reports `false`, and the entry type is not inspected.
    pub async fn folder_exists(&self, remote_path: &str) -> bool {
        self.stat(remote_path).await.is_ok()
    }

    /// Create a remote directory and all missing parents.
    ///
    /// Each accumulated prefix of the path is checked left to right and
    /// created when absent, the final leaf included. Already-existing
    /// prefixes are skipped, so the call is a no-op on a fully existing
    /// path.
    pub async fn create_dir_recursive(&self, remote_path: &str) -> Result<()> {
        for prefix in path::prefixes(remote_path) {
            if self.folder_exists(&prefix).await {
                debug!("Directory already exists: {}", prefix);
            } else {
                self.make_dir(&prefix).await?;
                info!("Created remote directory: {}", prefix);
            }
        }
        Ok(())
    }
}
