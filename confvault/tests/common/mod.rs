//! A scripted Cisco-like device listening on 127.0.0.1.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use confvault::{Credentials, Device, ModelRegistry};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
pub struct FakeRouter {
    pub hostname: String,
    pub password: String,
    pub enable_password: String,
    /// Drop the connection when this command arrives.
    pub hang_up_on: Option<String>,
}

impl FakeRouter {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            password: "secret".to_string(),
            enable_password: "enable".to_string(),
            hang_up_on: None,
        }
    }

    pub fn hang_up_on(mut self, command: &str) -> Self {
        self.hang_up_on = Some(command.to_string());
        self
    }

    /// What `show running-config` prints, without the trailing prompt.
    pub fn running_config(&self) -> String {
        format!("hostname {}\r\n!\r\nend\r\n", self.hostname)
    }

    /// Accept connections forever in the background.
    pub async fn spawn(self) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = Arc::new(self);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let router = Arc::clone(&router);
                tokio::spawn(async move {
                    let _ = serve(stream, &router).await;
                });
            }
        });
        addr
    }
}

async fn serve(stream: TcpStream, router: &FakeRouter) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let host = &router.hostname;

    writer
        .write_all(b"\r\nUser Access Verification\r\n\r\nUsername: ")
        .await?;
    if lines.next_line().await?.is_none() {
        return Ok(());
    }
    writer.write_all(b"Password: ").await?;
    let Some(password) = lines.next_line().await? else {
        return Ok(());
    };
    if password.trim() != router.password {
        writer.write_all(b"\r\n% Authentication failed\r\n").await?;
        return Ok(());
    }
    writer.write_all(format!("\r\n{host}>").as_bytes()).await?;

    let mut enabled = false;
    while let Some(line) = lines.next_line().await? {
        let command = line.trim();
        if router.hang_up_on.as_deref() == Some(command) {
            return Ok(());
        }
        let reply = match command {
            "enable" => {
                writer.write_all(b"Password: ").await?;
                let Some(secret) = lines.next_line().await? else {
                    return Ok(());
                };
                if secret.trim() == router.enable_password {
                    enabled = true;
                    "\r\n".to_string()
                } else {
                    "\r\n% Access denied\r\n".to_string()
                }
            }
            "terminal length 0" => "\r\n".to_string(),
            "show version" => "Cisco IOS Software, Version 15.2(4)M\r\n".to_string(),
            "show running-config" => router.running_config(),
            "show clock" => "*12:00:00.000 UTC Mon Jan 1 2024\r\n".to_string(),
            _ => "% Invalid input detected\r\n".to_string(),
        };
        let prompt = if enabled { '#' } else { '>' };
        writer
            .write_all(format!("{reply}{host}{prompt}").as_bytes())
            .await?;
    }
    Ok(())
}

/// A `cisco-ios` device reached over telnet at `addr`.
pub fn cisco_device(id: &str, addr: SocketAddr) -> Device {
    ModelRegistry::with_builtin_models()
        .create_device(
            "cisco-ios",
            id,
            addr.to_string(),
            "telnet",
            Credentials::new("admin", "secret", "enable"),
        )
        .unwrap()
}

/// An address nothing listens on.
pub async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
