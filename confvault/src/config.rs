//! TOML configuration.
//!
//! ```toml
//! [scan]
//! repository = "/var/lib/confvault"
//! max_concurrency = 20
//! delay_max = "500ms"
//! holdtime = "12h"
//!
//! [[models]]
//! name = "cisco-nxos"
//! base = "cisco-ios"
//! [models.attributes]
//! command_list = ["show running-config"]
//!
//! [[devices]]
//! model = "cisco-ios"
//! id = "r1"
//! host = "10.0.0.1"
//! transports = "ssh,telnet"
//! user = "backup"
//! password = "secret"
//! enable_password = "secret"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::device::{Credentials, Device};
use crate::dialog::FetchOptions;
use crate::error::{ConfigError, ModelError, Result};
use crate::model::{Attributes, Model, ModelRegistry};
use crate::scan::ScanOptions;
use crate::transport::{ConnectOptions, HostKeyVerification};

/// Whole configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaultConfig {
    pub scan: ScanSection,
    pub models: Vec<ModelSpec>,
    pub devices: Vec<DeviceEntry>,
}

/// `[scan]`: scheduler and repository settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanSection {
    pub repository: PathBuf,
    pub max_concurrency: usize,
    #[serde(with = "humantime_serde")]
    pub delay_min: Duration,
    #[serde(with = "humantime_serde")]
    pub delay_max: Duration,
    pub max_files: usize,
    #[serde(with = "humantime_serde")]
    pub holdtime: Duration,
    pub changes_only: bool,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    pub host_key_verification: HostKeyVerification,
    pub known_hosts_path: Option<PathBuf>,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            repository: PathBuf::from("repository"),
            max_concurrency: 20,
            delay_min: Duration::from_millis(50),
            delay_max: Duration::from_millis(500),
            max_files: 120,
            holdtime: Duration::from_secs(12 * 3600),
            changes_only: true,
            connect_timeout: crate::transport::config::CONNECT_TIMEOUT,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }
}

impl ScanSection {
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            max_concurrency: self.max_concurrency,
            delay_min: self.delay_min,
            delay_max: self.delay_max,
            holdtime: self.holdtime,
            fetch: FetchOptions {
                repository: self.repository.clone(),
                max_files: self.max_files,
                changes_only: self.changes_only,
                connect: ConnectOptions {
                    connect_timeout: self.connect_timeout,
                    host_key_verification: self.host_key_verification.clone(),
                    known_hosts_path: self.known_hosts_path.clone(),
                    ..ConnectOptions::default()
                },
            },
        }
    }
}

/// `[[models]]`: a model derived from a registered one.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSpec {
    pub name: String,
    /// Model whose attributes are inherited; plain defaults when absent.
    pub base: Option<String>,
    /// Attribute overrides, same keys as [`Attributes`].
    #[serde(default)]
    pub attributes: toml::Table,
}

impl ModelSpec {
    pub fn build(&self, registry: &ModelRegistry) -> Result<Model> {
        let base = match &self.base {
            Some(name) => registry
                .get(name)
                .map(|m| m.attributes().clone())
                .ok_or_else(|| ModelError::UnknownModel { name: name.clone() })?,
            None => Attributes::default(),
        };
        Ok(Model::new(&self.name, overlay(&base, &self.attributes)?))
    }
}

/// `[[devices]]`: one managed device.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceEntry {
    pub model: String,
    pub id: String,
    pub host: String,
    #[serde(default = "default_transports")]
    pub transports: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub enable_password: String,
    /// Per-device attribute overrides on top of the model's.
    #[serde(default)]
    pub attributes: toml::Table,
}

fn default_transports() -> String {
    "ssh,telnet".to_string()
}

impl VaultConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("config: loaded {}", path.display());
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Built-in models plus every `[[models]]` entry, in file order.
    ///
    /// A model may use any built-in or earlier entry as its base.
    pub fn build_registry(&self) -> Result<ModelRegistry> {
        let mut registry = ModelRegistry::with_builtin_models();
        for spec in &self.models {
            let model = spec.build(&registry)?;
            registry.register(model)?;
        }
        Ok(registry)
    }

    /// Create every `[[devices]]` entry from `registry`.
    pub fn build_devices(&self, registry: &ModelRegistry) -> Result<Vec<Device>> {
        self.devices
            .iter()
            .map(|entry| -> Result<Device> {
                let mut device = registry.create_device(
                    &entry.model,
                    &entry.id,
                    &entry.host,
                    &entry.transports,
                    Credentials::new(&entry.user, &entry.password, &entry.enable_password),
                )?;
                device.attributes = overlay(&device.attributes, &entry.attributes)?;
                Ok(device)
            })
            .collect()
    }
}

/// Apply a table of overrides to `base`, field by field.
fn overlay(base: &Attributes, overrides: &toml::Table) -> Result<Attributes> {
    if overrides.is_empty() {
        return Ok(base.clone());
    }

    let mut table = match toml::Value::try_from(base).map_err(ConfigError::from)? {
        toml::Value::Table(table) => table,
        _ => toml::Table::new(),
    };
    for (key, value) in overrides {
        table.insert(key.clone(), value.clone());
    }
    let attrs: Attributes = toml::Value::Table(table)
        .try_into()
        .map_err(ConfigError::from)?;
    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [scan]
        repository = "/tmp/vault"
        max_concurrency = 2
        delay_max = "0s"
        holdtime = "30m"
        host_key_verification = "disabled"

        [[models]]
        name = "cisco-nxos"
        base = "cisco-ios"
        [models.attributes]
        command_list = ["show running-config"]
        command_match_timeout = "1m"

        [[devices]]
        model = "cisco-nxos"
        id = "n1"
        host = "10.0.0.9"
        user = "backup"
        password = "pw"

        [[devices]]
        model = "linux"
        id = "l1"
        host = "10.0.0.10:2222"
        transports = "ssh"
        [devices.attributes]
        command_list = ["cat /etc/hosts"]
    "#;

    #[test]
    fn test_defaults() {
        let config = VaultConfig::from_toml("").unwrap();
        assert_eq!(config.scan.max_concurrency, 20);
        assert_eq!(config.scan.holdtime, Duration::from_secs(12 * 3600));
        assert!(config.scan.changes_only);
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_sample() {
        let config = VaultConfig::from_toml(SAMPLE).unwrap();
        let options = config.scan.scan_options();
        assert_eq!(options.max_concurrency, 2);
        assert_eq!(options.delay_max, Duration::ZERO);
        assert_eq!(options.holdtime, Duration::from_secs(1800));
        assert_eq!(options.fetch.repository, PathBuf::from("/tmp/vault"));
        assert_eq!(
            options.fetch.connect.host_key_verification,
            HostKeyVerification::Disabled
        );

        let registry = config.build_registry().unwrap();
        let nxos = registry.get("cisco-nxos").unwrap().attributes();
        let ios = registry.get("cisco-ios").unwrap().attributes();
        assert_eq!(nxos.command_list, vec!["show running-config"]);
        assert_eq!(nxos.command_match_timeout, Duration::from_secs(60));
        assert_eq!(nxos.enabled_prompt_pattern, ios.enabled_prompt_pattern);

        let devices = config.build_devices(&registry).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].model(), "cisco-nxos");
        assert_eq!(devices[0].transports(), "ssh,telnet");
        assert_eq!(devices[1].attributes.command_list, vec!["cat /etc/hosts"]);
        assert_eq!(devices[1].host_port(), "10.0.0.10:2222");
    }

    #[test]
    fn test_unknown_base_model() {
        let config = VaultConfig::from_toml(
            r#"
            [[models]]
            name = "x"
            base = "nope"
            "#,
        )
        .unwrap();
        let err = config.build_registry().unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Model(ModelError::UnknownModel { .. })
        ));
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let config = VaultConfig::from_toml(
            r#"
            [[devices]]
            model = "linux"
            id = "l1"
            host = "h"
            [devices.attributes]
            comand_list = ["typo"]
            "#,
        )
        .unwrap();
        let registry = config.build_registry().unwrap();
        assert!(config.build_devices(&registry).is_err());
    }

    #[test]
    fn test_unknown_device_model() {
        let config = VaultConfig::from_toml(
            r#"
            [[devices]]
            model = "ios-xr"
            id = "x1"
            host = "h"
            "#,
        )
        .unwrap();
        let registry = config.build_registry().unwrap();
        assert!(config.build_devices(&registry).is_err());
    }
}
