//! Error types for confvault.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for confvault operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Device dialog errors
    #[error("Dialog error: {0}")]
    Dialog(#[from] DialogError),

    /// Versioned repository errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Model registry errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Configuration file errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Transport layer errors (connect, authentication, byte I/O).
#[derive(Error, Debug)]
pub enum TransportError {
    /// The device has no transport candidates configured
    #[error("No transports configured: [{list}]")]
    NoTransports { list: String },

    /// Every candidate transport failed to connect
    #[error("Unable to open any transport [{list}] to {host}")]
    Exhausted { host: String, list: String },

    /// Failed to connect to host
    #[error("Connection failed to {addr}: {source}")]
    ConnectionFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Server presented a key that differs from known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Server key not present in known_hosts under strict checking
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Read issued on an SSH transport before any command was written
    #[error("No remote command session is open")]
    NoSession,

    /// Operation did not complete before the deadline
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Dialog phase in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Login,
    Enable,
    Pager,
    Commands,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Login => "login",
            Phase::Enable => "enable",
            Phase::Pager => "pager off",
            Phase::Commands => "commands",
        };
        f.write_str(name)
    }
}

/// Dialog engine errors (prompt matching, timeouts, phase failures).
#[derive(Error, Debug)]
pub enum DialogError {
    /// A model pattern failed to compile
    #[error("Bad pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A single read produced nothing within the read timeout
    #[error("Read timed out ({0:?})")]
    ReadTimeout(Duration),

    /// The whole match exceeded its ceiling
    #[error("Match timed out ({0:?})")]
    MatchTimeout(Duration),

    /// Sending a line did not complete within the send timeout
    #[error("Send timed out ({0:?})")]
    SendTimeout(Duration),

    /// Stream ended while a prompt was still expected
    #[error("EOF before prompt matched: buf=[{buffer}]")]
    UnexpectedEof { buffer: String },

    /// Stream transport closed mid-session
    #[error("Connection closed before prompt matched: buf=[{buffer}]")]
    ConnectionClosed { buffer: String },

    /// Underlying transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A failure attributed to one dialog phase
    #[error("{phase}: {step}: {source}")]
    Phase {
        phase: Phase,
        step: String,
        #[source]
        source: Box<DialogError>,
    },
}

impl DialogError {
    /// Attribute this error to a dialog phase.
    pub fn in_phase(self, phase: Phase, step: impl Into<String>) -> Self {
        DialogError::Phase {
            phase,
            step: step.into(),
            source: Box::new(self),
        }
    }

    /// The phase this error was attributed to, if any.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            DialogError::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

/// Versioned config repository errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A previous commit left (or is writing) the temp file
    #[error("Temp file exists: {path}")]
    TempExists { path: PathBuf },

    /// The commit id about to be allocated is already on disk
    #[error("New version file already exists: {path}")]
    VersionExists { path: PathBuf },

    /// Two directory entries parse to the same commit id
    #[error("Duplicate commit id {id}: '{first}' and '{second}'")]
    DuplicateCommitId {
        id: u64,
        first: String,
        second: String,
    },

    /// A version file name carries an unparsable commit id
    #[error("Bad commit id in '{name}'")]
    InvalidCommitId { name: String },

    /// The capture writer failed while filling the temp file
    #[error("Writing {path} failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Filesystem operation failed
    #[error("{op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Model registry errors.
#[derive(Error, Debug)]
pub enum ModelError {
    /// No model registered under this name
    #[error("Unknown model: '{name}'")]
    UnknownModel { name: String },

    /// Model name registered twice
    #[error("Model already registered: '{name}'")]
    AlreadyRegistered { name: String },
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Config file is not valid TOML for the expected schema
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Attributes could not be turned into a table for overriding
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Outcome code carried by every fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorCode {
    None,
    Transport,
    Login,
    Enable,
    Pager,
    Commands,
    Save,
}

impl FetchErrorCode {
    /// Stable numeric code (0 = success).
    pub fn code(self) -> u8 {
        match self {
            FetchErrorCode::None => 0,
            FetchErrorCode::Transport => 1,
            FetchErrorCode::Login => 2,
            FetchErrorCode::Enable => 3,
            FetchErrorCode::Pager => 4,
            FetchErrorCode::Commands => 5,
            FetchErrorCode::Save => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FetchErrorCode::None => "none",
            FetchErrorCode::Transport => "transport",
            FetchErrorCode::Login => "login",
            FetchErrorCode::Enable => "enable",
            FetchErrorCode::Pager => "pager",
            FetchErrorCode::Commands => "commands",
            FetchErrorCode::Save => "save",
        }
    }

    pub fn is_success(self) -> bool {
        self == FetchErrorCode::None
    }
}

impl From<Phase> for FetchErrorCode {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Login => FetchErrorCode::Login,
            Phase::Enable => FetchErrorCode::Enable,
            Phase::Pager => FetchErrorCode::Pager,
            Phase::Commands => FetchErrorCode::Commands,
        }
    }
}

impl fmt::Display for FetchErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type alias using confvault's Error.
pub type Result<T> = std::result::Result<T, Error>;
