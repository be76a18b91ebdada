//! Byte-level connections to devices.
//!
//! Two variants sit behind the [`Transport`] trait: a stream transport
//! (telnet / raw TCP) that keeps one socket open for the whole dialog, and an
//! SSH transport that runs every write as its own remote command. The dialog
//! engine only ever sees the trait.

pub mod config;
mod ssh;
mod telnet;

pub use config::{ConnectOptions, HostKeyVerification, SshConfig, TransportKind};
pub use ssh::SshTransport;
pub use telnet::TelnetTransport;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use secrecy::SecretString;
use tokio::time::Instant;

use crate::error::TransportError;

/// Read/write/deadline contract shared by every transport.
#[async_trait]
pub trait Transport: Send {
    /// Read available bytes into `buf`. `Ok(0)` means end of stream.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write `data` to the device.
    async fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Bound every subsequent read and write by `deadline`.
    fn set_deadline(&mut self, deadline: Instant);

    /// Close the connection.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Whether end of stream in mid-session is abnormal.
    fn eof_is_error(&self) -> bool;

    /// Whether sent lines need the model's line terminator appended.
    fn needs_line_ending(&self) -> bool;

    fn kind(&self) -> TransportKind;
}

/// A connected transport and how it was reached.
pub struct OpenedTransport {
    pub transport: Box<dyn Transport>,

    /// Name of the candidate that connected (e.g. "ssh").
    pub name: String,

    pub kind: TransportKind,

    /// Whether the transport already authenticated the login user.
    pub authenticated: bool,
}

/// What to connect to and as whom.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    /// Log label, usually "model id host".
    pub label: &'a str,
    pub host_port: &'a str,
    /// Comma-separated ordered candidate list.
    pub transports: &'a str,
    pub user: &'a str,
    pub password: &'a SecretString,
}

/// Try each candidate transport in order and return the first that connects.
pub async fn open_transport(
    target: Target<'_>,
    options: &ConnectOptions,
) -> Result<OpenedTransport, TransportError> {
    let candidates = parse_transport_list(target.transports);
    if candidates.is_empty() {
        return Err(TransportError::NoTransports {
            list: target.transports.to_string(),
        });
    }

    for name in candidates {
        let kind = TransportKind::parse(name);
        let (host, port) = match resolve_host_port(target.host_port, kind.default_port()) {
            Ok(hp) => hp,
            Err(e) => {
                warn!("open transport: {} {}: {}", target.label, name, e);
                continue;
            }
        };

        debug!("open transport: {} trying {} {}:{}", target.label, name, host, port);

        let opened: Result<(Box<dyn Transport>, bool), TransportError> = match kind {
            TransportKind::Ssh => {
                let config = SshConfig::new(&host, port, target.user, target.password.clone(), options);
                SshTransport::connect(config)
                    .await
                    .map(|t| (Box::new(t) as Box<dyn Transport>, true))
            }
            TransportKind::Telnet | TransportKind::Tcp => {
                TelnetTransport::connect(&host, port, kind, options.connect_timeout)
                    .await
                    .map(|t| (Box::new(t) as Box<dyn Transport>, false))
            }
        };

        match opened {
            Ok((transport, authenticated)) => {
                return Ok(OpenedTransport {
                    transport,
                    name: name.to_string(),
                    kind,
                    authenticated,
                });
            }
            Err(e) => warn!("open transport: {} {} {}:{}: {}", target.label, name, host, port, e),
        }
    }

    Err(TransportError::Exhausted {
        host: target.host_port.to_string(),
        list: target.transports.to_string(),
    })
}

/// Split a comma-separated transport list, dropping blanks.
pub fn parse_transport_list(list: &str) -> Vec<&str> {
    list.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Split "host[:port]" into host and port, filling in `default_port`.
///
/// Bracketed IPv6 (`[::1]:22`) and bare IPv6 (`::1`) are both accepted.
pub fn resolve_host_port(
    host_port: &str,
    default_port: u16,
) -> Result<(String, u16), TransportError> {
    let invalid = || TransportError::ConnectionFailed {
        addr: host_port.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "bad host:port"),
    };

    if let Some(rest) = host_port.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        let port = match tail.strip_prefix(':') {
            Some(p) => p.parse().map_err(|_| invalid())?,
            None if tail.is_empty() => default_port,
            None => return Err(invalid()),
        };
        return Ok((host.to_string(), port));
    }

    match host_port.matches(':').count() {
        0 => Ok((host_port.to_string(), default_port)),
        1 => {
            let (host, port) = host_port.split_once(':').ok_or_else(invalid)?;
            if host.is_empty() {
                return Err(invalid());
            }
            Ok((host.to_string(), port.parse().map_err(|_| invalid())?))
        }
        _ => Ok((host_port.to_string(), default_port)),
    }
}

/// Deadline shared by a transport's reads and writes.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Deadline {
    at: Option<Instant>,
    window: Duration,
}

impl Deadline {
    pub(crate) fn set(&mut self, at: Instant) {
        self.window = at.saturating_duration_since(Instant::now());
        self.at = Some(at);
    }

    /// Run `fut`, failing with `Timeout` once the deadline passes.
    pub(crate) async fn run<T, F>(&self, fut: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        match self.at {
            Some(at) => tokio::time::timeout_at(at, fut)
                .await
                .map_err(|_| TransportError::Timeout(self.window))?,
            None => fut.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(
            resolve_host_port("10.0.0.1", 22).unwrap(),
            ("10.0.0.1".to_string(), 22)
        );
        assert_eq!(
            resolve_host_port("10.0.0.1:2001", 23).unwrap(),
            ("10.0.0.1".to_string(), 2001)
        );
        assert_eq!(
            resolve_host_port("[fe80::1]:830", 22).unwrap(),
            ("fe80::1".to_string(), 830)
        );
        assert_eq!(
            resolve_host_port("[fe80::1]", 23).unwrap(),
            ("fe80::1".to_string(), 23)
        );
        assert_eq!(
            resolve_host_port("fe80::1", 22).unwrap(),
            ("fe80::1".to_string(), 22)
        );
    }

    #[test]
    fn test_bad_port() {
        assert!(resolve_host_port("router:telnet", 23).is_err());
        assert!(resolve_host_port(":23", 23).is_err());
        assert!(resolve_host_port("[::1]x", 23).is_err());
    }

    #[test]
    fn test_transport_list() {
        assert_eq!(parse_transport_list("ssh,telnet"), vec!["ssh", "telnet"]);
        assert_eq!(parse_transport_list(" ssh , ,tcp"), vec!["ssh", "tcp"]);
        assert!(parse_transport_list("").is_empty());
    }

    #[tokio::test]
    async fn test_empty_list_is_transport_error() {
        let password = SecretString::from("x".to_string());
        let target = Target {
            label: "linux lab1 localhost",
            host_port: "localhost",
            transports: " , ",
            user: "u",
            password: &password,
        };
        let err = open_transport(target, &ConnectOptions::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::NoTransports { .. }));
    }

    #[tokio::test]
    async fn test_connect_then_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _conn = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        // A freshly released port refuses connections.
        let dead = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_port = dead.local_addr().unwrap().port();
        drop(dead);

        let password = SecretString::from("x".to_string());
        let host_port = format!("127.0.0.1:{port}");
        let target = Target {
            label: "http web1",
            host_port: &host_port,
            transports: "tcp",
            user: "",
            password: &password,
        };
        let opened = open_transport(target, &ConnectOptions::default()).await.unwrap();
        assert_eq!(opened.name, "tcp");
        assert!(!opened.authenticated);
        assert!(opened.transport.eof_is_error());

        let host_port = format!("127.0.0.1:{dead_port}");
        let target = Target {
            host_port: &host_port,
            ..target
        };
        let err = open_transport(target, &ConnectOptions::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::Exhausted { .. }));
    }

    #[tokio::test]
    async fn test_falls_back_to_next_candidate() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        // The first connection is dropped at once, so the SSH handshake
        // fails; later connections stay open.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((conn, _)) = listener.accept().await {
                if counter.fetch_add(1, Ordering::SeqCst) > 0 {
                    held.push(conn);
                }
            }
        });

        let password = SecretString::from("x".to_string());
        let host_port = format!("127.0.0.1:{port}");
        let options = ConnectOptions {
            connect_timeout: Duration::from_secs(2),
            host_key_verification: HostKeyVerification::Disabled,
            ..ConnectOptions::default()
        };
        let target = Target {
            label: "cisco-ios r1",
            host_port: &host_port,
            transports: "ssh,tcp",
            user: "admin",
            password: &password,
        };
        let opened = open_transport(target, &options).await.unwrap();
        assert_eq!(opened.name, "tcp");
        assert_eq!(opened.kind, TransportKind::Tcp);
        assert_eq!(opened.transport.kind(), TransportKind::Tcp);
        assert!(!opened.authenticated);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(accepted.load(Ordering::SeqCst), 2);

        // A working first candidate ends the search.
        let target = Target {
            transports: "tcp,ssh",
            ..target
        };
        let opened = open_transport(target, &options).await.unwrap();
        assert_eq!(opened.name, "tcp");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(accepted.load(Ordering::SeqCst), 3);
    }
}
