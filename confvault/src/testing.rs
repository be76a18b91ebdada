//! In-memory transport that replays a scripted device.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::TransportError;
use crate::transport::{Deadline, Transport, TransportKind};

#[derive(Debug)]
pub(crate) enum Step {
    /// Device output available immediately.
    Read(Vec<u8>),
    /// Device output after a pause.
    Delayed(Duration, Vec<u8>),
    /// The next write must be exactly these bytes.
    Expect(Vec<u8>),
    /// Device closes the stream.
    Eof,
    /// Device goes silent, on read or write.
    Stall,
}

pub(crate) struct ScriptedTransport {
    steps: VecDeque<Step>,
    deadline: Deadline,
    stream: bool,
}

impl ScriptedTransport {
    /// Behaves like a telnet/tcp stream.
    pub(crate) fn stream(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            deadline: Deadline::default(),
            stream: true,
        }
    }

    /// Behaves like an SSH command session.
    pub(crate) fn session(steps: Vec<Step>) -> Self {
        Self {
            stream: false,
            ..Self::stream(steps)
        }
    }

    pub(crate) fn assert_done(&self) {
        assert!(self.steps.is_empty(), "unconsumed steps: {:?}", self.steps);
    }

    fn deliver(&mut self, data: Vec<u8>, buf: &mut [u8]) -> usize {
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        if n < data.len() {
            self.steps.push_front(Step::Read(data[n..].to_vec()));
        }
        n
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.steps.pop_front() {
            Some(Step::Read(data)) => Ok(self.deliver(data, buf)),
            Some(Step::Delayed(pause, data)) => {
                self.deadline
                    .run(async move {
                        tokio::time::sleep(pause).await;
                        Ok::<_, TransportError>(())
                    })
                    .await?;
                Ok(self.deliver(data, buf))
            }
            Some(Step::Eof) => Ok(0),
            Some(Step::Stall) | None => {
                self.deadline
                    .run(std::future::pending::<Result<usize, TransportError>>())
                    .await
            }
            Some(Step::Expect(want)) => panic!(
                "read while the device waits for {:?}",
                String::from_utf8_lossy(&want)
            ),
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        match self.steps.pop_front() {
            Some(Step::Expect(want)) => {
                assert_eq!(
                    String::from_utf8_lossy(data),
                    String::from_utf8_lossy(&want),
                    "unexpected write"
                );
                Ok(data.len())
            }
            Some(Step::Stall) => {
                self.deadline
                    .run(std::future::pending::<Result<usize, TransportError>>())
                    .await
            }
            other => panic!(
                "unexpected write {:?}, next step {:?}",
                String::from_utf8_lossy(data),
                other
            ),
        }
    }

    fn set_deadline(&mut self, deadline: Instant) {
        self.deadline.set(deadline);
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn eof_is_error(&self) -> bool {
        self.stream
    }

    fn needs_line_ending(&self) -> bool {
        self.stream
    }

    fn kind(&self) -> TransportKind {
        if self.stream {
            TransportKind::Telnet
        } else {
            TransportKind::Ssh
        }
    }
}
