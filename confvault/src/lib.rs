//! # Confvault
//!
//! Configuration backup for network devices.
//!
//! Confvault logs into routers, switches and hosts over SSH, Telnet or raw
//! TCP, drives a scripted CLI dialog to capture their configuration, and
//! commits each capture as a new version in an on-disk repository.
//!
//! ## Features
//!
//! - Async transports: SSH via russh, Telnet with option refusal, raw TCP
//! - Prompt matching on the last line of output with ordered patterns
//! - Login / enable / pager-off / command phases driven by model attributes
//! - Concurrent scans with a concurrency ceiling, start jitter and holdtime
//! - Atomic version commits with pruning and unchanged-content detection
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use confvault::{Credentials, FetchOptions, ModelRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), confvault::Error> {
//!     let registry = ModelRegistry::with_builtin_models();
//!     let device = registry.create_device(
//!         "cisco-ios",
//!         "r1",
//!         "192.168.1.1",
//!         "ssh,telnet",
//!         Credentials::new("backup", "secret", "secret"),
//!     )?;
//!
//!     let options = FetchOptions::new("/var/lib/confvault");
//!     let result = device.fetch(std::time::Duration::ZERO, &options).await;
//!     println!("{}: {} {:?}", result.device_id, result.code, result.path);
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod device;
pub mod dialog;
pub mod error;
pub mod model;
pub mod scan;
pub mod store;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use config::VaultConfig;
pub use device::{Credentials, Device, DeviceStatus};
pub use dialog::{Capture, Dialog, FetchOptions, FetchResult};
pub use error::{Error, FetchErrorCode, Result};
pub use model::{Attributes, Model, ModelRegistry};
pub use scan::{ScanOptions, ScanSummary, scan_devices, update_last_success};
pub use store::{VersionPrefix, find_last_config, save_new_config};
pub use transport::{ConnectOptions, Transport};
