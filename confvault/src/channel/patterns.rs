//! Ordered prompt pattern lists.

use regex::bytes::Regex;

use crate::error::DialogError;

/// Compiled, ordered list of prompt patterns.
///
/// A list whose first pattern is empty is the "expect stream close" sentinel:
/// nothing is matched and the caller waits for EOF instead.
#[derive(Debug, Clone)]
pub enum PatternSet {
    /// Wait for the transport to end the stream.
    Eof,

    /// Match the last line against each regex in order.
    Ordered(Vec<Regex>),
}

impl PatternSet {
    /// Compile `patterns`, keeping their order.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self, DialogError> {
        match patterns.first() {
            None => Ok(PatternSet::Eof),
            Some(first) if first.as_ref().is_empty() => Ok(PatternSet::Eof),
            Some(_) => patterns
                .iter()
                .map(|p| {
                    Regex::new(p.as_ref()).map_err(|source| DialogError::InvalidPattern {
                        pattern: p.as_ref().to_string(),
                        source,
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(PatternSet::Ordered),
        }
    }

    pub fn expects_eof(&self) -> bool {
        matches!(self, PatternSet::Eof)
    }

    /// Index of the first pattern, in list order, matching `line`.
    pub fn first_match(&self, line: &[u8]) -> Option<usize> {
        match self {
            PatternSet::Eof => None,
            PatternSet::Ordered(list) => list.iter().position(|re| re.is_match(line)),
        }
    }
}
