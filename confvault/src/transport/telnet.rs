//! Stream transport over a single TCP connection (telnet or raw TCP).

use async_trait::async_trait;
use log::trace;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Duration, Instant};

use super::config::TransportKind;
use super::{Deadline, Transport};
use crate::error::TransportError;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

/// Long-lived stream connection. EOF is always an error here.
pub struct TelnetTransport {
    stream: TcpStream,
    deadline: Deadline,
    kind: TransportKind,
    /// `None` for raw TCP, where bytes pass through untouched.
    negotiation: Option<Negotiation>,
}

impl TelnetTransport {
    /// Dial `host:port` within `timeout`.
    pub async fn connect(
        host: &str,
        port: u16,
        kind: TransportKind,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let addr = format!("{host}:{port}");
        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
            .map_err(|source| TransportError::ConnectionFailed { addr, source })?;

        let negotiation = match kind {
            TransportKind::Tcp => None,
            _ => Some(Negotiation::default()),
        };

        Ok(Self {
            stream,
            deadline: Deadline::default(),
            kind,
            negotiation,
        })
    }
}

#[async_trait]
impl Transport for TelnetTransport {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        loop {
            let stream = &mut self.stream;
            let n = self
                .deadline
                .run(async { stream.read(&mut *buf).await.map_err(TransportError::from) })
                .await?;
            if n == 0 {
                return Ok(0);
            }

            let Some(negotiation) = self.negotiation.as_mut() else {
                return Ok(n);
            };

            let mut replies = Vec::new();
            let kept = negotiation.filter(&mut buf[..n], &mut replies);
            if !replies.is_empty() {
                trace!("telnet: refusing {} option bytes", replies.len());
                let stream = &mut self.stream;
                self.deadline
                    .run(async { stream.write_all(&replies).await.map_err(TransportError::from) })
                    .await?;
            }
            if kept > 0 {
                return Ok(kept);
            }
            // Pure negotiation; keep reading.
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let escaped;
        let out = if self.negotiation.is_some() && memchr::memchr(IAC, data).is_some() {
            escaped = escape_iac(data);
            &escaped[..]
        } else {
            data
        };
        let stream = &mut self.stream;
        self.deadline
            .run(async {
                stream.write_all(out).await.map_err(TransportError::from)?;
                stream.flush().await.map_err(TransportError::from)
            })
            .await?;
        Ok(data.len())
    }

    fn set_deadline(&mut self, deadline: Instant) {
        self.deadline.set(deadline);
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await?;
        Ok(())
    }

    fn eof_is_error(&self) -> bool {
        true
    }

    fn needs_line_ending(&self) -> bool {
        true
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }
}

fn escape_iac(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 8);
    for &b in data {
        if b == IAC {
            out.push(IAC);
        }
        out.push(b);
    }
    out
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum State {
    #[default]
    Data,
    Iac,
    Verb(u8),
    Sub,
    SubIac,
}

/// Telnet option negotiation stripper. Refuses everything the peer offers.
#[derive(Debug, Default)]
struct Negotiation {
    state: State,
}

impl Negotiation {
    /// Remove protocol bytes from `buf` in place, queueing refusals into
    /// `replies`. Returns the number of data bytes kept at the front of `buf`.
    /// State carries across calls, so sequences split over reads are handled.
    fn filter(&mut self, buf: &mut [u8], replies: &mut Vec<u8>) -> usize {
        let mut kept = 0;
        for i in 0..buf.len() {
            let b = buf[i];
            self.state = match self.state {
                State::Data if b == IAC => State::Iac,
                State::Data => {
                    buf[kept] = b;
                    kept += 1;
                    State::Data
                }
                State::Iac => match b {
                    IAC => {
                        buf[kept] = IAC;
                        kept += 1;
                        State::Data
                    }
                    WILL | WONT | DO | DONT => State::Verb(b),
                    SB => State::Sub,
                    _ => State::Data,
                },
                State::Verb(verb) => {
                    match verb {
                        WILL => replies.extend_from_slice(&[IAC, DONT, b]),
                        DO => replies.extend_from_slice(&[IAC, WONT, b]),
                        _ => {}
                    }
                    State::Data
                }
                State::Sub if b == IAC => State::SubIac,
                State::Sub => State::Sub,
                State::SubIac if b == SE => State::Data,
                State::SubIac => State::Sub,
            };
        }
        kept
    }
}
