//! Session lifecycle: connect, liveness, reconnect, close.
//!
//! A client owns exactly one logical session: the SSH transport handle and
//! the SFTP session running on top of it. The pair is kept in lockstep —
//! either both are live or both are gone. Reconnection closes the old pair
//! before installing a new one, and any failure while establishing leaves
//! the client fully disconnected, never half-open.
//!
//! The client is built for exclusive, sequential use. Callers sharing one
//! client across tasks must add their own synchronization.

use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;

use russh::client;
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::PublicKey;
use russh_sftp::client::SftpSession;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Dial timeout for the initial connect.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(120);

/// Dial timeout when reconnecting.
pub const RECONNECT_TIMEOUT: Duration = Duration::from_secs(180);

/// Fixed delay between liveness retry attempts. This is a flat backoff;
/// callers needing an adaptive policy must wrap
/// [`SftpClient::ensure_connected_with_retries`] themselves.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// SFTP client holding one transport + protocol session pair.
pub struct SftpClient {
    config: ClientConfig,
    ssh: Option<client::Handle<ClientHandler>>,
    sftp: Option<SftpSession>,
}

impl SftpClient {
    /// Connect to the server described by `config` and open the SFTP
    /// subsystem.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let (ssh, sftp) = establish(&config, CONNECT_TIMEOUT).await?;
        Ok(Self {
            config,
            ssh: Some(ssh),
            sftp: Some(sftp),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Mutable access to the connection parameters. Reconnection re-reads
    /// current values, so changes here take effect on the next reconnect.
    pub fn config_mut(&mut self) -> &mut ClientConfig {
        &mut self.config
    }

    /// Probe whether the session is still usable.
    ///
    /// Issues a cheap `read_dir(".")` round trip; any error counts as dead.
    /// This is a heuristic, not a protocol keepalive, and costs one round
    /// trip per call.
    pub async fn is_alive(&self) -> bool {
        match &self.sftp {
            Some(sftp) if self.ssh.is_some() => sftp.read_dir(".").await.is_ok(),
            _ => false,
        }
    }

    /// Reconnect in place if the session is not alive.
    pub async fn ensure_connected(&mut self) -> Result<()> {
        if self.is_alive().await {
            return Ok(());
        }
        self.reconnect().await
    }

    /// Call [`ensure_connected`](Self::ensure_connected) up to `attempts`
    /// times with a fixed delay in between, returning the last error when
    /// every attempt fails.
    pub async fn ensure_connected_with_retries(&mut self, attempts: u32) -> Result<()> {
        let mut last = Error::NotConnected;
        for attempt in 1..=attempts {
            match self.ensure_connected().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("Reconnection attempt {}/{} failed: {}", attempt, attempts, e);
                    last = e;
                }
            }
            if attempt < attempts {
                sleep(RETRY_DELAY).await;
            }
        }
        Err(Error::ReconnectExhausted {
            attempts,
            source: Box::new(last),
        })
    }

    /// Tear down the current pair and dial a fresh session.
    ///
    /// On failure the client is left with both handles gone, so every remote
    /// operation reports [`Error::NotConnected`] until a later reconnect
    /// succeeds.
    pub async fn reconnect(&mut self) -> Result<()> {
        self.close().await;
        let (ssh, sftp) = establish(&self.config, RECONNECT_TIMEOUT).await?;
        self.ssh = Some(ssh);
        self.sftp = Some(sftp);
        info!("Reconnected to {}", self.config.address());
        Ok(())
    }

    /// Close both handles. Calling this on an already-closed client is a
    /// no-op.
    pub async fn close(&mut self) {
        // Protocol session first, then the transport underneath it.
        self.sftp.take();
        if let Some(ssh) = self.ssh.take() {
            let _ = ssh
                .disconnect(russh::Disconnect::ByApplication, "Session closed", "en")
                .await;
        }
    }

    pub(crate) fn sftp(&self) -> Result<&SftpSession> {
        self.sftp.as_ref().ok_or(Error::NotConnected)
    }
}

/// Dial the transport, authenticate, and open the SFTP subsystem.
///
/// Every partially-created handle is closed on failure so the caller either
/// gets a complete pair or nothing.
async fn establish(
    config: &ClientConfig,
    dial_timeout: Duration,
) -> Result<(client::Handle<ClientHandler>, SftpSession)> {
    config.validate()?;

    let addr = config.address();
    info!("Connecting to SSH server at {}", addr);

    let socket_addr = addr
        .to_socket_addrs()
        .map_err(|e| Error::ConnectionFailed(format!("failed to resolve address: {}", e)))?
        .next()
        .ok_or_else(|| Error::ConnectionFailed(format!("no address found for {}", addr)))?;

    let ssh_config = Arc::new(client::Config::default());

    let mut handle = tokio::time::timeout(
        dial_timeout,
        client::connect(ssh_config, socket_addr, ClientHandler),
    )
    .await
    .map_err(|_| Error::Timeout(format!("connection to {} timed out", addr)))?
    .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

    debug!("SSH handshake completed");

    authenticate(&mut handle, config).await?;

    info!("SSH authentication successful for {}@{}", config.username, config.host);

    match open_sftp(&handle).await {
        Ok(sftp) => Ok((handle, sftp)),
        Err(e) => {
            let _ = handle
                .disconnect(russh::Disconnect::ByApplication, "Session closed", "en")
                .await;
            Err(e)
        }
    }
}

/// Authenticate against the server using the configured credentials.
///
/// A configured private key is tried first (the path source wins over inline
/// material), with the password doubling as the key passphrase. Password
/// authentication runs as a fallback, or alone when no key is configured.
/// With no credentials at all the client offers "none" authentication and
/// lets the server decide.
async fn authenticate(
    handle: &mut client::Handle<ClientHandler>,
    config: &ClientConfig,
) -> Result<()> {
    let passphrase = config.password.as_deref();

    let key = if let Some(path) = &config.private_key_path {
        Some(
            russh::keys::load_secret_key(path, passphrase)
                .map_err(|e| Error::KeyError(format!("failed to load private key: {}", e)))?,
        )
    } else if let Some(data) = &config.private_key_data {
        Some(
            russh::keys::decode_secret_key(data, passphrase)
                .map_err(|e| Error::KeyError(format!("failed to parse private key: {}", e)))?,
        )
    } else {
        None
    };

    let has_key = key.is_some();

    if let Some(key) = key {
        let key_with_hash = PrivateKeyWithHashAlg::new(Arc::new(key), None);
        let result = handle
            .authenticate_publickey(&config.username, key_with_hash)
            .await
            .map_err(|e| Error::AuthenticationFailed(e.to_string()))?;
        if result.success() {
            return Ok(());
        }
        debug!("public key authentication rejected, trying password");
    }

    if let Some(password) = &config.password {
        let result = handle
            .authenticate_password(&config.username, password)
            .await
            .map_err(|e| Error::AuthenticationFailed(e.to_string()))?;
        if result.success() {
            return Ok(());
        }
    } else if !has_key {
        let result = handle
            .authenticate_none(&config.username)
            .await
            .map_err(|e| Error::AuthenticationFailed(e.to_string()))?;
        if result.success() {
            return Ok(());
        }
    }

    Err(Error::AuthenticationFailed(
        "rejected by server".to_string(),
    ))
}

async fn open_sftp(handle: &client::Handle<ClientHandler>) -> Result<SftpSession> {
    let channel = handle
        .channel_open_session()
        .await
        .map_err(|e| Error::ConnectionFailed(format!("failed to open channel: {}", e)))?;

    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(|e| Error::Protocol(format!("failed to request SFTP subsystem: {}", e)))?;

    SftpSession::new(channel.into_stream())
        .await
        .map_err(|e| Error::Protocol(format!("failed to start SFTP session: {}", e)))
}

/// russh callback handler.
pub struct ClientHandler;

impl client::Handler for ClientHandler {
    type Error = Error;

    /// SECURITY: every server key is accepted without verification. This
    /// client performs no known_hosts checking; deployments that need MITM
    /// protection must verify the host through other means.
    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}
