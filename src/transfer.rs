//! Resumable upload and download.
//!
//! The resume point is never stored anywhere: for an upload it is the size
//! of the remote file, for a download the size of the local file. Size
//! equality is the sole completion signal; no checksums are kept for the
//! already-transferred range.

use std::io::SeekFrom;
use std::path::Path;
use std::time::Duration;

use russh_sftp::protocol::OpenFlags;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::client::SftpClient;
use crate::error::{Error, Result};
use crate::types::{DirEntry, TransferDirection, TransferProgress};

/// Copy buffer size (32 KiB).
pub const COPY_BUFFER_SIZE: usize = 32 * 1024;

/// Copy attempts for a download before giving up.
const DOWNLOAD_COPY_ATTEMPTS: u32 = 3;

/// Sleep between failed download copy attempts.
const COPY_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Liveness retries granted to the download path.
const DOWNLOAD_LIVENESS_RETRIES: u32 = 3;

impl SftpClient {
    /// Upload a local file, resuming after the bytes already present
    /// remotely.
    ///
    /// The remote file size is taken as the number of bytes already
    /// transferred: the local file is read from that offset on, and the
    /// remote file is opened truncating and rewritten with the remaining
    /// bytes. The local prefix below that offset is assumed byte-identical
    /// to what the remote side held; the engine does not verify this, so a
    /// locally modified prefix goes undetected.
    ///
    /// A liveness failure or a mid-copy error aborts immediately — unlike
    /// [`download`](Self::download), upload is never retried.
    pub async fn upload(&mut self, local_path: impl AsRef<Path>, remote_path: &str) -> Result<()> {
        self.upload_inner(local_path.as_ref(), remote_path, &mut |_| {})
            .await
    }

    /// [`upload`](Self::upload) with a cumulative progress callback invoked
    /// after each copied chunk. Upload progress counts newly written bytes
    /// only, so a resumed upload tops out below 100%.
    pub async fn upload_with_progress<F>(
        &mut self,
        local_path: impl AsRef<Path>,
        remote_path: &str,
        mut on_progress: F,
    ) -> Result<()>
    where
        F: FnMut(TransferProgress),
    {
        self.upload_inner(local_path.as_ref(), remote_path, &mut on_progress)
            .await
    }

    /// Download a remote file, resuming after the bytes already present
    /// locally.
    ///
    /// Permission denied on the remote stat is an informational skip: the
    /// call returns success without touching the local filesystem, so a
    /// batch job can continue past unreadable files. Matching sizes make
    /// the call an idempotent no-op. A failed copy is retried up to three
    /// times, reconnecting and re-seeking to the current local size in
    /// between.
    pub async fn download(&mut self, remote_path: &str, local_path: impl AsRef<Path>) -> Result<()> {
        self.download_inner(remote_path, local_path.as_ref(), &mut |_| {})
            .await
    }

    /// [`download`](Self::download) with a cumulative progress callback.
    /// Download progress counts the pre-existing local bytes toward
    /// completion, so a resumed download starts above 0%.
    pub async fn download_with_progress<F>(
        &mut self,
        remote_path: &str,
        local_path: impl AsRef<Path>,
        mut on_progress: F,
    ) -> Result<()>
    where
        F: FnMut(TransferProgress),
    {
        self.download_inner(remote_path, local_path.as_ref(), &mut on_progress)
            .await
    }

    async fn upload_inner(
        &mut self,
        local_path: &Path,
        remote_path: &str,
        on_progress: &mut dyn FnMut(TransferProgress),
    ) -> Result<()> {
        // Single liveness attempt; the upload path does not retry.
        self.ensure_connected().await?;

        let local_display = local_path.display().to_string();

        let metadata = tokio::fs::metadata(local_path)
            .await
            .map_err(|e| Error::local("stat", local_display.clone(), e))?;
        let local_size = metadata.len();

        // Absent remote file means nothing transferred yet.
        let remote_size = match self.try_stat(remote_path).await? {
            Some(entry) => entry.size,
            None => 0,
        };

        let mut local_file = tokio::fs::File::open(local_path)
            .await
            .map_err(|e| Error::local("open", local_display.clone(), e))?;
        local_file
            .seek(SeekFrom::Start(remote_size))
            .await
            .map_err(|e| Error::local("seek", local_display.clone(), e))?;

        let mut remote_file = self
            .sftp()?
            .open_with_flags(
                remote_path,
                OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
            )
            .await
            .map_err(|e| Error::remote("open", remote_path, e))?;

        if local_size == 0 {
            on_progress(TransferProgress::new(TransferDirection::Upload, 0, 0));
        }

        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut written: u64 = 0;

        loop {
            let n = local_file
                .read(&mut buffer)
                .await
                .map_err(|e| Error::local("read", local_display.clone(), e))?;
            if n == 0 {
                break;
            }

            remote_file
                .write_all(&buffer[..n])
                .await
                .map_err(|e| Error::remote_io("write", remote_path, e))?;

            written += n as u64;
            on_progress(TransferProgress::new(
                TransferDirection::Upload,
                written,
                local_size,
            ));
        }

        remote_file
            .flush()
            .await
            .map_err(|e| Error::remote_io("flush", remote_path, e))?;
        // Remote handle is closed when dropped.

        info!(
            "Uploaded {} to {} ({} new bytes from offset {})",
            local_display, remote_path, written, remote_size
        );
        Ok(())
    }

    async fn download_inner(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        on_progress: &mut dyn FnMut(TransferProgress),
    ) -> Result<()> {
        self.ensure_connected_with_retries(DOWNLOAD_LIVENESS_RETRIES)
            .await?;

        let remote_size = match remote_size_for_download(self.stat(remote_path).await)? {
            Some(size) => size,
            None => {
                info!("Permission denied for file, skipping: {}", remote_path);
                return Ok(());
            }
        };

        let local_display = local_path.display().to_string();

        let local_size = match tokio::fs::metadata(local_path).await {
            Ok(md) => Some(md.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(Error::local("stat", local_display, e)),
        };

        let resume_from = match plan_download(remote_size, local_size) {
            DownloadAction::AlreadyComplete => {
                info!("File already fully downloaded: {}", local_display);
                return Ok(());
            }
            DownloadAction::Copy { resume_from } => resume_from,
        };

        let mut local_file = if resume_from > 0 {
            OpenOptions::new()
                .append(true)
                .open(local_path)
                .await
                .map_err(|e| Error::local("open", local_display.clone(), e))?
        } else {
            tokio::fs::File::create(local_path)
                .await
                .map_err(|e| Error::local("create", local_display.clone(), e))?
        };

        if remote_size == 0 {
            on_progress(TransferProgress::new(TransferDirection::Download, 0, 0));
        }

        let mut offset = resume_from;
        let mut attempt = 1u32;

        loop {
            let result = self
                .copy_remote_to_local(
                    remote_path,
                    &mut local_file,
                    &mut offset,
                    remote_size,
                    &local_display,
                    on_progress,
                )
                .await;

            match result {
                Ok(()) => break,
                Err(e) => {
                    if attempt >= DOWNLOAD_COPY_ATTEMPTS {
                        return Err(Error::TransferExhausted {
                            path: remote_path.to_string(),
                            attempts: attempt,
                            source: Box::new(e),
                        });
                    }
                    warn!(
                        "Download of {} failed on attempt {}/{}, retrying: {}",
                        remote_path, attempt, DOWNLOAD_COPY_ATTEMPTS, e
                    );
                    sleep(COPY_RETRY_DELAY).await;
                    self.ensure_connected_with_retries(DOWNLOAD_LIVENESS_RETRIES)
                        .await?;
                    // The failed attempt may have partially written its last
                    // buffer, leaving more bytes on disk than the counter
                    // saw. The resume point is the file size, not the
                    // counter.
                    offset = resume_offset(&mut local_file, &local_display).await?;
                    attempt += 1;
                }
            }
        }

        local_file
            .flush()
            .await
            .map_err(|e| Error::local("flush", local_display.clone(), e))?;

        info!(
            "Downloaded {} to {} (resumed at offset {})",
            remote_path, local_display, resume_from
        );
        Ok(())
    }

    /// One copy attempt: open the remote file, seek to the current offset,
    /// and stream the remaining range into the local file. A retry after
    /// reconnect re-runs this whole remaining copy, not just a chunk.
    async fn copy_remote_to_local(
        &self,
        remote_path: &str,
        local_file: &mut tokio::fs::File,
        offset: &mut u64,
        remote_size: u64,
        local_display: &str,
        on_progress: &mut dyn FnMut(TransferProgress),
    ) -> Result<()> {
        let mut remote_file = self
            .sftp()?
            .open(remote_path)
            .await
            .map_err(|e| Error::remote("open", remote_path, e))?;

        if *offset > 0 {
            remote_file
                .seek(SeekFrom::Start(*offset))
                .await
                .map_err(|e| Error::remote_io("seek", remote_path, e))?;
        }

        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];

        loop {
            let n = remote_file
                .read(&mut buffer)
                .await
                .map_err(|e| Error::remote_io("read", remote_path, e))?;
            if n == 0 {
                break;
            }

            local_file
                .write_all(&buffer[..n])
                .await
                .map_err(|e| Error::local("write", local_display.to_string(), e))?;

            *offset += n as u64;
            on_progress(TransferProgress::new(
                TransferDirection::Download,
                *offset,
                remote_size,
            ));
        }

        Ok(())
    }
}

/// What a download does once the remote and local sizes are known.
#[derive(Debug, PartialEq, Eq)]
enum DownloadAction {
    AlreadyComplete,
    Copy { resume_from: u64 },
}

/// Size equality is the sole completion signal; an absent local file starts
/// from zero, a partial one resumes at its current length.
fn plan_download(remote_size: u64, local_size: Option<u64>) -> DownloadAction {
    match local_size {
        Some(size) if size == remote_size => DownloadAction::AlreadyComplete,
        Some(size) => DownloadAction::Copy { resume_from: size },
        None => DownloadAction::Copy { resume_from: 0 },
    }
}

/// Collapse the remote stat outcome for a download: `Ok(None)` marks an
/// unreadable file, which is skipped rather than failed.
fn remote_size_for_download(stat: Result<DirEntry>) -> Result<Option<u64>> {
    match stat {
        Ok(entry) => Ok(Some(entry.size)),
        Err(e) if e.is_permission_denied() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Re-derive the resume point from the bytes actually on disk. A failed
/// attempt may have partially written its last buffer, so the in-memory
/// counter can lag the file.
async fn resume_offset(file: &mut tokio::fs::File, path: &str) -> Result<u64> {
    file.flush()
        .await
        .map_err(|e| Error::local("flush", path.to_string(), e))?;
    file.seek(SeekFrom::End(0))
        .await
        .map_err(|e| Error::local("seek", path.to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(size: u64) -> DirEntry {
        DirEntry {
            name: "report.csv".to_string(),
            size,
            is_dir: false,
            modified: 0,
            permissions: "644".to_string(),
        }
    }

    #[test]
    fn test_equal_sizes_complete_the_download() {
        assert_eq!(plan_download(1024, Some(1024)), DownloadAction::AlreadyComplete);
        assert_eq!(plan_download(0, Some(0)), DownloadAction::AlreadyComplete);
    }

    #[test]
    fn test_partial_local_file_sets_resume_point() {
        assert_eq!(
            plan_download(1024, Some(300)),
            DownloadAction::Copy { resume_from: 300 }
        );
    }

    #[test]
    fn test_absent_local_file_starts_fresh() {
        assert_eq!(
            plan_download(1024, None),
            DownloadAction::Copy { resume_from: 0 }
        );
    }

    #[test]
    fn test_unreadable_remote_file_is_skipped() {
        let denied = Error::local(
            "stat",
            "secret.log",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(remote_size_for_download(Err(denied)).unwrap(), None);
        assert_eq!(remote_size_for_download(Ok(entry(7))).unwrap(), Some(7));
    }

    #[test]
    fn test_missing_remote_file_fails_the_download() {
        let missing = Error::local(
            "stat",
            "gone.log",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert!(remote_size_for_download(Err(missing)).is_err());
    }

    #[tokio::test]
    async fn test_resume_offset_follows_bytes_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.bin");
        let mut file = tokio::fs::File::create(&path).await.unwrap();

        // Whatever counter a copy loop kept, the file length decides where
        // the next attempt resumes.
        file.write_all(&[7u8; 300]).await.unwrap();
        assert_eq!(resume_offset(&mut file, "partial.bin").await.unwrap(), 300);

        file.write_all(&[7u8; 100]).await.unwrap();
        assert_eq!(resume_offset(&mut file, "partial.bin").await.unwrap(), 400);
    }
}
