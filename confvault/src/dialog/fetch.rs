//! One complete fetch: connect, converse, commit.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use super::capture::Capture;
use super::engine::Dialog;
use crate::device::Device;
use crate::error::{FetchErrorCode, StoreError};
use crate::store::save_new_config;
use crate::transport::{ConnectOptions, Target, open_transport};

/// Where and how a fetch commits its capture.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub repository: PathBuf,

    /// Versions kept per device; `0` keeps all.
    pub max_files: usize,

    /// Skip the commit when the capture equals the previous version.
    pub changes_only: bool,

    pub connect: ConnectOptions,
}

impl FetchOptions {
    pub fn new(repository: impl Into<PathBuf>) -> Self {
        Self {
            repository: repository.into(),
            max_files: 0,
            changes_only: false,
            connect: ConnectOptions::default(),
        }
    }
}

/// Outcome of one device fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub model: String,
    pub device_id: String,
    pub host_port: String,

    /// Transport that connected, empty if none did.
    pub transport: String,

    pub code: FetchErrorCode,
    pub message: String,

    /// When the attempt started (after the start delay).
    pub begin: DateTime<Utc>,

    /// Version file holding the capture, on success.
    pub path: Option<PathBuf>,
}

impl FetchResult {
    pub(crate) fn new(
        device: &Device,
        transport: &str,
        code: FetchErrorCode,
        message: impl Into<String>,
        begin: DateTime<Utc>,
    ) -> Self {
        Self {
            model: device.model().to_string(),
            device_id: device.id().to_string(),
            host_port: device.host_port().to_string(),
            transport: transport.to_string(),
            code,
            message: message.into(),
            begin,
            path: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }
}

impl Device {
    /// Wait `delay`, then retrieve this device's configuration and commit it.
    ///
    /// Never fails: every outcome is reported through the returned
    /// [`FetchResult`]. A failure anywhere before the commit leaves the
    /// repository untouched.
    pub async fn fetch(&self, delay: Duration, options: &FetchOptions) -> FetchResult {
        let label = self.label();
        debug!("fetch: {}: delay {:?}", label, delay);
        tokio::time::sleep(delay).await;

        let begin = Utc::now();
        let credentials = self.credentials();
        let target = Target {
            label: &label,
            host_port: self.host_port(),
            transports: self.transports(),
            user: &credentials.login_user,
            password: &credentials.login_password,
        };

        let mut opened = match open_transport(target, &options.connect).await {
            Ok(opened) => opened,
            Err(e) => {
                return FetchResult::new(
                    self,
                    "",
                    FetchErrorCode::Transport,
                    format!("fetch transport: {e}"),
                    begin,
                );
            }
        };
        info!("fetch: {}: transport {} open", label, opened.name);

        let outcome = Dialog::new(&mut *opened.transport, &self.attributes, credentials, &label)
            .run(opened.authenticated)
            .await;

        if let Err(e) = opened.transport.close().await {
            debug!("fetch: {}: close: {}", label, e);
        }

        let capture = match outcome {
            Ok(capture) => capture,
            Err(e) => {
                // Unattributed errors can only come from the command phase.
                let code = e.phase().map_or(FetchErrorCode::Commands, FetchErrorCode::from);
                return FetchResult::new(self, &opened.name, code, format!("fetch {e}"), begin);
            }
        };

        match self.commit(capture, options).await {
            Ok(path) => FetchResult {
                path: Some(path),
                ..FetchResult::new(self, &opened.name, FetchErrorCode::None, "", begin)
            },
            Err(e) => {
                warn!("fetch: {}: save: {}", label, e);
                FetchResult::new(
                    self,
                    &opened.name,
                    FetchErrorCode::Save,
                    format!("fetch save: {e}"),
                    begin,
                )
            }
        }
    }

    async fn commit(&self, capture: Capture, options: &FetchOptions) -> Result<PathBuf, StoreError> {
        let prefix = self.version_prefix(&options.repository);
        let dir = prefix.dir().to_path_buf();
        let (max_files, changes_only) = (options.max_files, options.changes_only);

        tokio::task::spawn_blocking(move || {
            save_new_config(&prefix, max_files, changes_only, |w| capture.write_to(w))
        })
        .await
        .map_err(|e| StoreError::io("commit", dir, io::Error::other(e)))?
    }
}
