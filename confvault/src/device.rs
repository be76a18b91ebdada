//! Managed devices.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;

use crate::model::Attributes;
use crate::store::VersionPrefix;

/// Login and enable secrets for one device.
#[derive(Debug)]
pub struct Credentials {
    pub login_user: String,
    pub login_password: SecretString,
    pub enable_password: SecretString,
}

impl Credentials {
    pub fn new(
        login_user: impl Into<String>,
        login_password: impl Into<String>,
        enable_password: impl Into<String>,
    ) -> Self {
        Self {
            login_user: login_user.into(),
            login_password: SecretString::from(login_password.into()),
            enable_password: SecretString::from(enable_password.into()),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("", "", "")
    }
}

/// Outcome of the most recent fetches. Written only by the scan scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStatus {
    /// Whether the last attempt succeeded.
    pub last_ok: bool,
    pub last_try: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
}

/// One managed endpoint.
///
/// Identity fields are fixed at creation. `attributes` start as a copy of
/// the model's defaults and may be tuned per device.
#[derive(Debug, Clone)]
pub struct Device {
    model: String,
    id: String,
    host_port: String,
    transports: String,
    credentials: Arc<Credentials>,

    /// Dialog parameters for this device.
    pub attributes: Attributes,

    status: DeviceStatus,
}

impl Device {
    pub fn new(
        model: impl Into<String>,
        id: impl Into<String>,
        host_port: impl Into<String>,
        transports: impl Into<String>,
        credentials: Credentials,
        attributes: Attributes,
    ) -> Self {
        Self {
            model: model.into(),
            id: id.into(),
            host_port: host_port.into(),
            transports: transports.into(),
            credentials: Arc::new(credentials),
            attributes,
            status: DeviceStatus::default(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host_port(&self) -> &str {
        &self.host_port
    }

    /// Comma-separated transport preference list.
    pub fn transports(&self) -> &str {
        &self.transports
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn status(&self) -> &DeviceStatus {
        &self.status
    }

    /// "model id host", used to label log lines.
    pub fn label(&self) -> String {
        format!("{} {} {}", self.model, self.id, self.host_port)
    }

    /// Time left before the device may be fetched again, if any.
    ///
    /// `None` means the holdtime has expired (or the device never
    /// succeeded) and the device is eligible now.
    pub fn holdtime_remaining(&self, now: DateTime<Utc>, holdtime: Duration) -> Option<Duration> {
        let last_success = self.status.last_success?;
        let hold = TimeDelta::from_std(holdtime).unwrap_or(TimeDelta::MAX);
        let remaining = hold - (now - last_success);
        remaining.to_std().ok().filter(|d| !d.is_zero())
    }

    /// Where this device's versions live under `repository`.
    pub fn version_prefix(&self, repository: &Path) -> VersionPrefix {
        VersionPrefix::for_device(repository, &self.id)
    }

    pub(crate) fn record_fetch(&mut self, good: bool, at: DateTime<Utc>) {
        self.status.last_try = Some(at);
        self.status.last_ok = good;
        if good {
            self.status.last_success = Some(at);
        }
    }

    pub(crate) fn set_last_success(&mut self, at: DateTime<Utc>) {
        self.status.last_success = Some(at);
    }
}
