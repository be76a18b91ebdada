//! Device conversations.
//!
//! A fetch opens a transport, walks the phases its model asks for
//! (login, enable, pager off) and runs the command list, matching prompts
//! on the last line of output. Command outputs are held in a [`Capture`]
//! and only reach the repository once every command has completed.

mod capture;
mod engine;
mod fetch;

pub use capture::{Capture, CaptureEntry};
pub use engine::{Dialog, Matched};
pub use fetch::{FetchOptions, FetchResult};
