//! Connection configuration.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

/// Fixed dial timeout for every transport candidate.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport variant selected by a candidate name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Multiplexed SSH, one remote command per write.
    Ssh,

    /// Telnet stream with option negotiation refused.
    Telnet,

    /// Raw TCP stream, bytes passed through untouched.
    Tcp,
}

impl TransportKind {
    /// Map a candidate name to a transport. Unrecognized names fall back to telnet.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "ssh" => TransportKind::Ssh,
            "tcp" => TransportKind::Tcp,
            _ => TransportKind::Telnet,
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            TransportKind::Ssh => 22,
            TransportKind::Telnet | TransportKind::Tcp => 23,
        }
    }
}

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. For lab use only.
    Disabled,
}

/// Settings shared by every connection attempt.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Dial timeout per candidate.
    pub connect_timeout: Duration,

    /// PTY size requested for every SSH command.
    pub terminal_width: u32,
    pub terminal_height: u32,

    pub host_key_verification: HostKeyVerification,

    /// known_hosts override (default: ~/.ssh/known_hosts).
    pub known_hosts_path: Option<PathBuf>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            terminal_width: 80,
            terminal_height: 40,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }
}

/// SSH connection configuration.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// SSH port.
    pub port: u16,

    /// Login user, authenticated during connection.
    pub username: String,

    pub password: SecretString,

    /// Connection timeout.
    pub timeout: Duration,

    /// Terminal width for PTY.
    pub terminal_width: u32,

    /// Terminal height for PTY.
    pub terminal_height: u32,

    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file.
    pub known_hosts_path: Option<PathBuf>,
}

impl SshConfig {
    pub fn new(
        host: &str,
        port: u16,
        username: &str,
        password: SecretString,
        options: &ConnectOptions,
    ) -> Self {
        Self {
            host: host.to_string(),
            port,
            username: username.to_string(),
            password,
            timeout: options.connect_timeout,
            terminal_width: options.terminal_width,
            terminal_height: options.terminal_height,
            host_key_verification: options.host_key_verification.clone(),
            known_hosts_path: options.known_hosts_path.clone(),
        }
    }

    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse() {
        assert_eq!(TransportKind::parse("ssh"), TransportKind::Ssh);
        assert_eq!(TransportKind::parse(" SSH "), TransportKind::Ssh);
        assert_eq!(TransportKind::parse("tcp"), TransportKind::Tcp);
        assert_eq!(TransportKind::parse("telnet"), TransportKind::Telnet);
        assert_eq!(TransportKind::parse("whatever"), TransportKind::Telnet);
        assert_eq!(TransportKind::Ssh.default_port(), 22);
        assert_eq!(TransportKind::Tcp.default_port(), 23);
    }
}
