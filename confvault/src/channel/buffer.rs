//! Match buffer with last-line isolation.

use bytes::BytesMut;

/// Buffer for accumulating output of one `match` call.
///
/// Only the last line is ever tested against prompt patterns, which keeps
/// matching cheap regardless of how large a command's output grows.
#[derive(Debug, Default)]
pub struct MatchBuffer {
    /// The accumulated output buffer.
    buffer: BytesMut,
}

impl MatchBuffer {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Append newly read bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// The line a prompt would sit on.
    pub fn last_line(&self) -> &[u8] {
        last_line(&self.buffer)
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        self.buffer.split().to_vec()
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Isolate the last line of `buf`.
///
/// One trailing LF (and a CR before it) is dropped first, so a prompt
/// followed by a newline still counts as the last line. The result is
/// everything after the last remaining CR or LF.
pub fn last_line(buf: &[u8]) -> &[u8] {
    let mut end = buf.len();
    if end > 0 && buf[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && buf[end - 1] == b'\r' {
            end -= 1;
        }
    }
    let line = &buf[..end];
    match memchr::memrchr2(b'\r', b'\n', line) {
        Some(eol) => &line[eol + 1..],
        None => line,
    }
}
