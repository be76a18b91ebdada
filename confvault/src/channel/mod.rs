//! Byte accumulation and prompt pattern matching.
//!
//! Prompts always appear as the terminal line of interactive output, so
//! matching is done against the most recent line of the buffer rather than
//! the whole capture.

mod buffer;
mod patterns;

pub use buffer::{MatchBuffer, last_line};
pub use patterns::PatternSet;
