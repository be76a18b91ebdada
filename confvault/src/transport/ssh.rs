//! SSH transport implementation using russh.
//!
//! Every [`Transport::write`] opens a fresh session channel, requests a PTY
//! and runs the written bytes as one remote command. Reads drain that
//! channel's stdout and stderr until the command ends, at which point the
//! transport reports EOF. EOF is therefore the normal end of each command.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use log::{debug, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;
use tokio::time::Instant;

use super::config::{HostKeyVerification, SshConfig, TransportKind};
use super::{Deadline, Transport};
use crate::error::TransportError;

/// SSH transport wrapping russh client.
pub struct SshTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// Channel running the most recently written command.
    channel: Option<Channel<Msg>>,

    /// Output received but not yet handed to the reader.
    pending: BytesMut,

    /// Set once the current command's channel has ended.
    finished: bool,

    deadline: Deadline,

    /// Configuration used for this connection.
    config: SshConfig,
}

impl SshTransport {
    /// Connect to the SSH server and authenticate with the login password.
    pub async fn connect(config: SshConfig) -> Result<Self, TransportError> {
        let ssh_config = Arc::new(client::Config::default());

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        let mut session = tokio::time::timeout(
            config.timeout,
            client::connect(ssh_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|e| {
            // Prefer the detailed host key error over russh's generic one
            match host_key_error.lock().ok().and_then(|mut slot| slot.take()) {
                Some(hk_err) => hk_err,
                None => TransportError::Ssh(e),
            }
        })?;

        let authenticated = tokio::time::timeout(
            config.timeout,
            session.authenticate_password(&config.username, config.password.expose_secret()),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))??
        .success();

        if !authenticated {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            });
        }

        debug!("ssh: {} authenticated as {}", config.socket_addr(), config.username);

        Ok(Self {
            session,
            channel: None,
            pending: BytesMut::new(),
            finished: false,
            deadline: Deadline::default(),
            config,
        })
    }

    /// Open a session channel with a PTY and start `command` on it.
    async fn exec(&self, command: &str) -> Result<Channel<Msg>, TransportError> {
        let channel = self.session.channel_open_session().await?;

        channel
            .request_pty(
                true,
                "xterm",
                self.config.terminal_width,
                self.config.terminal_height,
                0,
                0,
                &[],
            )
            .await?;

        channel.exec(true, command.as_bytes()).await?;

        Ok(channel)
    }

    fn drain_pending(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        n
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if !self.pending.is_empty() {
            return Ok(self.drain_pending(buf));
        }
        if self.finished {
            return Ok(0);
        }

        let channel = self.channel.as_mut().ok_or(TransportError::NoSession)?;
        loop {
            let msg = self
                .deadline
                .run(async { Ok::<_, TransportError>(channel.wait().await) })
                .await?;
            match msg {
                Some(ChannelMsg::Data { data }) | Some(ChannelMsg::ExtendedData { data, .. }) => {
                    if data.is_empty() {
                        continue;
                    }
                    self.pending.extend_from_slice(&data);
                    break;
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    self.finished = true;
                    return Ok(0);
                }
                Some(ChannelMsg::ExitStatus { exit_status }) if exit_status != 0 => {
                    debug!("ssh: {} command exited with {}", self.config.socket_addr(), exit_status);
                }
                Some(_) => {}
            }
        }

        Ok(self.drain_pending(buf))
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        if let Some(previous) = self.channel.take() {
            if let Err(e) = previous.close().await {
                debug!("ssh: closing previous channel: {}", e);
            }
        }
        self.pending.clear();
        self.finished = false;

        let command = String::from_utf8_lossy(data);
        let channel = self.deadline.run(self.exec(&command)).await?;
        self.channel = Some(channel);

        Ok(data.len())
    }

    fn set_deadline(&mut self, deadline: Instant) {
        self.deadline.set(deadline);
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(channel) = self.channel.take() {
            if let Err(e) = channel.close().await {
                debug!("ssh: closing channel: {}", e);
            }
        }
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }

    fn eof_is_error(&self) -> bool {
        false
    }

    fn needs_line_ending(&self) -> bool {
        false
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Ssh
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so connect() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found,
    /// `Err(TransportError::HostKeyChanged)` if key changed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> Result<bool, TransportError> {
        let result = match self.known_hosts_path {
            Some(ref path) => {
                russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
            }
            None => russh::keys::check_known_hosts(&self.host, self.port, pubkey),
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> Result<(), TransportError> {
        let result = match self.known_hosts_path {
            Some(ref path) => russh::keys::known_hosts::learn_known_hosts_path(
                &self.host, self.port, pubkey, path,
            ),
            None => russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey),
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, err: TransportError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(err);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let accepted = match self.host_key_verification {
            HostKeyVerification::Disabled => true,

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("ssh: failed to save host key for {}: {}", self.host, e);
                    }
                    true
                }
                Err(e) => self.reject(e),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                }),
                Err(e) => self.reject(e),
            },
        };
        Ok(accepted)
    }
}
