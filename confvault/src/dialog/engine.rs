//! Prompt-driven dialog over a [`Transport`].

use std::time::Duration;

use log::{debug, trace};
use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;

use super::capture::Capture;
use crate::channel::{MatchBuffer, PatternSet};
use crate::device::Credentials;
use crate::error::{DialogError, Phase, TransportError};
use crate::model::Attributes;
use crate::transport::Transport;

/// Size of one transport read.
const READ_CHUNK: usize = 64 * 1024;

/// Result of a successful [`Dialog::expect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matched {
    /// Index of the matching pattern, or `None` when the stream ended
    /// and EOF was what the caller asked for.
    pub index: Option<usize>,

    /// Everything read during this match, prompt included.
    pub output: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct Timeouts {
    read: Duration,
    whole: Duration,
}

/// Drives one device conversation: prompt matching, sending lines, and
/// the login / enable / pager / commands phases.
pub struct Dialog<'a> {
    transport: &'a mut dyn Transport,
    attrs: &'a Attributes,
    credentials: &'a Credentials,
    label: &'a str,
    timeouts: Timeouts,
    read_buf: Vec<u8>,
}

impl<'a> Dialog<'a> {
    pub fn new(
        transport: &'a mut dyn Transport,
        attrs: &'a Attributes,
        credentials: &'a Credentials,
        label: &'a str,
    ) -> Self {
        Self {
            transport,
            attrs,
            credentials,
            label,
            timeouts: Timeouts {
                read: attrs.read_timeout,
                whole: attrs.match_timeout,
            },
            read_buf: vec![0; READ_CHUNK],
        }
    }

    /// Run every phase the attributes ask for and capture command output.
    ///
    /// `authenticated` is true when the transport already logged in, in
    /// which case the login chat is skipped.
    pub async fn run(&mut self, authenticated: bool) -> Result<Capture, DialogError> {
        let mut privileged = false;

        if self.attrs.need_login_chat && !authenticated {
            privileged = self.login().await?;
        }

        if self.attrs.need_enabled_mode && !privileged {
            self.enable().await?;
        }

        if self.attrs.need_paging_off {
            self.pager_off().await?;
        }

        self.run_commands().await
    }

    /// Read until the last line matches one of `patterns`.
    ///
    /// Patterns are tried in list order; the first match wins. An empty
    /// first pattern means "wait for end of stream".
    pub async fn expect<S: AsRef<str>>(&mut self, patterns: &[S]) -> Result<Matched, DialogError> {
        let set = PatternSet::compile(patterns)?;
        self.expect_set(&set).await
    }

    async fn expect_set(&mut self, set: &PatternSet) -> Result<Matched, DialogError> {
        let Timeouts { read, whole } = self.timeouts;
        let begin = Instant::now();
        let match_deadline = begin + whole;
        let mut buffer = MatchBuffer::new();

        loop {
            let now = Instant::now();
            if now.duration_since(begin) > whole {
                return Err(DialogError::MatchTimeout(whole));
            }

            let read_deadline = now + read;
            let deadline = read_deadline.min(match_deadline);
            self.transport.set_deadline(deadline);

            let n = match self.transport.read(&mut self.read_buf).await {
                Ok(n) => n,
                Err(TransportError::Timeout(_)) if deadline < read_deadline => {
                    return Err(DialogError::MatchTimeout(whole));
                }
                Err(TransportError::Timeout(_)) => return Err(DialogError::ReadTimeout(read)),
                Err(e) => return Err(e.into()),
            };

            if n == 0 {
                if set.expects_eof() {
                    debug!("dialog: {}: found wanted EOF", self.label);
                    return Ok(Matched {
                        index: None,
                        output: buffer.take(),
                    });
                }
                let buffer = buffer.as_str_lossy().into_owned();
                return Err(if self.transport.eof_is_error() {
                    DialogError::ConnectionClosed { buffer }
                } else {
                    DialogError::UnexpectedEof { buffer }
                });
            }

            buffer.extend(&self.read_buf[..n]);
            trace!("dialog: {}: read {} bytes, buffered {}", self.label, n, buffer.len());

            if let Some(index) = set.first_match(buffer.last_line()) {
                return Ok(Matched {
                    index: Some(index),
                    output: buffer.take(),
                });
            }
        }
    }

    /// Send one line, appending the model's line ending where the transport
    /// wants it.
    pub async fn send(&mut self, line: &str) -> Result<(), DialogError> {
        debug!("dialog: {}: send '{}'", self.label, line);
        self.write_line(line.as_bytes()).await
    }

    /// Like [`send`](Self::send) but never logs the content.
    async fn send_secret(&mut self, secret: &SecretString) -> Result<(), DialogError> {
        self.write_line(secret.expose_secret().as_bytes()).await
    }

    async fn write_line(&mut self, line: &[u8]) -> Result<(), DialogError> {
        let mut data = Vec::with_capacity(line.len() + self.attrs.line_ending.len());
        data.extend_from_slice(line);
        if self.transport.needs_line_ending() {
            data.extend_from_slice(self.attrs.line_ending.as_bytes());
        }

        let timeout = self.attrs.send_timeout;
        self.transport.set_deadline(Instant::now() + timeout);
        match self.transport.write(&data).await {
            Ok(_) => Ok(()),
            Err(TransportError::Timeout(_)) => Err(DialogError::SendTimeout(timeout)),
            Err(e) => Err(e.into()),
        }
    }

    /// Username / password chat. Returns whether the device landed
    /// directly in privileged mode.
    pub async fn login(&mut self) -> Result<bool, DialogError> {
        let attrs = self.attrs;
        let credentials = self.credentials;
        let phase = |step: &'static str| move |e: DialogError| e.in_phase(Phase::Login, step);

        let first = self
            .expect(&[&attrs.username_prompt_pattern, &attrs.password_prompt_pattern])
            .await
            .map_err(phase("could not find username prompt"))?;

        if first.index == Some(0) {
            debug!("dialog: {}: found username prompt", self.label);
            self.send(&credentials.login_user)
                .await
                .map_err(phase("could not send username"))?;
            self.expect(&[&attrs.password_prompt_pattern])
                .await
                .map_err(phase("could not find password prompt"))?;
        } else {
            debug!("dialog: {}: found password prompt", self.label);
        }

        self.send_secret(&credentials.login_password)
            .await
            .map_err(phase("could not send password"))?;

        let prompt = self
            .expect(&[&attrs.disabled_prompt_pattern, &attrs.enabled_prompt_pattern])
            .await
            .map_err(phase("could not find command prompt"))?;

        let privileged = prompt.index == Some(1);
        debug!(
            "dialog: {}: found {} command prompt",
            self.label,
            if privileged { "enabled" } else { "disabled" }
        );
        Ok(privileged)
    }

    /// Enter privileged mode, answering the enable password prompt if one
    /// appears.
    pub async fn enable(&mut self) -> Result<(), DialogError> {
        let attrs = self.attrs;
        let credentials = self.credentials;
        let phase = |step: String| move |e: DialogError| e.in_phase(Phase::Enable, step);

        self.send(&attrs.enable_command).await.map_err(phase(format!(
            "could not send enable command '{}'",
            attrs.enable_command
        )))?;

        let after = self
            .expect(&[&attrs.enable_password_prompt_pattern, &attrs.enabled_prompt_pattern])
            .await
            .map_err(phase("could not match after-enable prompt".into()))?;

        if after.index == Some(1) {
            return Ok(());
        }

        self.send_secret(&credentials.enable_password)
            .await
            .map_err(phase("could not send enable password".into()))?;

        self.expect(&[&attrs.enabled_prompt_pattern])
            .await
            .map_err(phase("could not find enabled command prompt".into()))?;

        Ok(())
    }

    /// Send the pager-disabling command and wait for the prompt.
    pub async fn pager_off(&mut self) -> Result<(), DialogError> {
        let attrs = self.attrs;
        self.send(&attrs.disable_pager_command).await.map_err(|e| {
            e.in_phase(
                Phase::Pager,
                format!(
                    "could not send pager disabling command '{}'",
                    attrs.disable_pager_command
                ),
            )
        })?;

        self.expect(&[&attrs.enabled_prompt_pattern])
            .await
            .map_err(|e| e.in_phase(Phase::Pager, "could not match command prompt"))?;

        Ok(())
    }

    /// Run the command list under the command timeouts and capture every
    /// output. The previous timeouts are restored on every exit path.
    pub async fn run_commands(&mut self) -> Result<Capture, DialogError> {
        let saved = self.timeouts;
        self.timeouts = Timeouts {
            read: self.attrs.command_read_timeout,
            whole: self.attrs.command_match_timeout,
        };
        let result = self.run_commands_inner().await;
        self.timeouts = saved;
        result
    }

    async fn run_commands_inner(&mut self) -> Result<Capture, DialogError> {
        let attrs = self.attrs;
        let prompt = PatternSet::compile(std::slice::from_ref(&attrs.enabled_prompt_pattern))
            .map_err(|e| e.in_phase(Phase::Commands, "bad command prompt"))?;

        let mut capture = Capture::new();
        for (i, command) in attrs.command_list.iter().enumerate() {
            self.send(command).await.map_err(|e| {
                e.in_phase(
                    Phase::Commands,
                    format!("could not send command [{i}] '{command}'"),
                )
            })?;

            let matched = self.expect_set(&prompt).await.map_err(|e| {
                e.in_phase(
                    Phase::Commands,
                    format!("could not match command prompt after [{i}] '{command}'"),
                )
            })?;

            capture.record(command, matched.output);
        }
        Ok(capture)
    }
}
