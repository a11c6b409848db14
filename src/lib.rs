//! Resumable SFTP client.
//!
//! Moves files between the local filesystem and an SFTP server, tolerating
//! transient network failure: interrupted transfers resume from the size of
//! the partially written destination file instead of restarting, and
//! operations re-establish the session when it has gone dead.
//!
//! One client owns one logical session and is meant for exclusive,
//! sequential use — wrap it in a mutex to share it across tasks.
//!
//! ```no_run
//! use sftpc::{ClientConfig, SftpClient};
//!
//! # async fn demo() -> sftpc::Result<()> {
//! let config = ClientConfig::new("example.com", "alice").with_password("secret");
//! let mut client = SftpClient::connect(config).await?;
//!
//! client.upload("./build.tar.gz", "releases/build.tar.gz").await?;
//! client
//!     .download_with_progress("logs/app.log", "./app.log", |p| {
//!         println!("{:.1}%", p.percent());
//!     })
//!     .await?;
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod ops;
pub mod path;
pub mod transfer;
pub mod types;
pub mod walk;

pub use client::SftpClient;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use transfer::COPY_BUFFER_SIZE;
pub use types::{DirEntry, TransferDirection, TransferProgress};
