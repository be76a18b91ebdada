//! Behavioral parameters of a device class.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Everything the dialog engine needs to know about a device class.
///
/// Serde-compatible so models can be supplied as data; every field has a
/// default, so a partial table only overrides what it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Attributes {
    /// Run the username/password chat after connecting.
    pub need_login_chat: bool,

    /// Enter privileged mode before running commands.
    pub need_enabled_mode: bool,

    /// Disable the pager before running commands.
    pub need_paging_off: bool,

    /// e.g. `enable`
    pub enable_command: String,

    /// e.g. `Username:\s*$`
    pub username_prompt_pattern: String,

    /// e.g. `Password:\s*$`
    pub password_prompt_pattern: String,

    pub enable_password_prompt_pattern: String,

    /// Unprivileged prompt, e.g. `\S+>\s*$`
    pub disabled_prompt_pattern: String,

    /// Privileged prompt, e.g. `\S+#\s*$`. Empty means "wait for EOF".
    pub enabled_prompt_pattern: String,

    /// Commands whose output is captured, in order.
    pub command_list: Vec<String>,

    /// e.g. `terminal length 0`
    pub disable_pager_command: String,

    /// Appended to every line sent over a stream transport.
    pub line_ending: String,

    /// Per-read inactivity limit.
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,

    /// Ceiling for one whole prompt match (slow sender protection).
    #[serde(with = "humantime_serde")]
    pub match_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub send_timeout: Duration,

    /// Read limit while capturing command output.
    #[serde(with = "humantime_serde")]
    pub command_read_timeout: Duration,

    /// Match ceiling while capturing command output.
    #[serde(with = "humantime_serde")]
    pub command_match_timeout: Duration,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            need_login_chat: false,
            need_enabled_mode: false,
            need_paging_off: false,
            enable_command: String::new(),
            username_prompt_pattern: String::new(),
            password_prompt_pattern: String::new(),
            enable_password_prompt_pattern: String::new(),
            disabled_prompt_pattern: String::new(),
            enabled_prompt_pattern: String::new(),
            command_list: vec![],
            disable_pager_command: String::new(),
            line_ending: "\n".to_string(),
            read_timeout: Duration::from_secs(5),
            match_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(5),
            command_read_timeout: Duration::from_secs(10),
            command_match_timeout: Duration::from_secs(10),
        }
    }
}
