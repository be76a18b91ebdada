//! Captured command output awaiting commit.

use std::io::{self, Write};

/// One command and everything the device printed in response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEntry {
    pub command: String,
    pub output: Vec<u8>,
}

/// Ordered command outputs from one fetch.
///
/// Nothing touches the repository until the whole command list has run;
/// dropping a `Capture` is the rollback.
#[derive(Debug, Default, Clone)]
pub struct Capture {
    entries: Vec<CaptureEntry>,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, command: impl Into<String>, output: Vec<u8>) {
        self.entries.push(CaptureEntry {
            command: command.into(),
            output,
        });
    }

    pub fn entries(&self) -> &[CaptureEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize as the version file body: each command, a newline, then
    /// its raw output.
    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        for entry in &self.entries {
            w.write_all(entry.command.as_bytes())?;
            w.write_all(b"\n")?;
            w.write_all(&entry.output)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_to() {
        let mut capture = Capture::new();
        capture.record("show version", b"IOS\r\nr1#".to_vec());
        capture.record("show run", b"hostname r1\r\nr1#".to_vec());

        let mut out = Vec::new();
        capture.write_to(&mut out).unwrap();
        assert_eq!(out, b"show version\nIOS\r\nr1#show run\nhostname r1\r\nr1#");
    }

    #[test]
    fn test_empty_capture_writes_nothing() {
        let mut out = Vec::new();
        Capture::new().write_to(&mut out).unwrap();
        assert!(out.is_empty());
    }
}
