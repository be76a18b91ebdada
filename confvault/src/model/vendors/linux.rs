//! Linux / Unix host model.
//!
//! Plain login chat over telnet, `$` prompt, no privileged mode.

use std::time::Duration;

use crate::model::{Attributes, Model};

/// Every command is non-empty: over SSH an empty exec starts an
/// interactive shell that never reaches EOF.
pub fn model() -> Model {
    Model::new(
        "linux",
        Attributes {
            need_login_chat: true,
            username_prompt_pattern: r"(?i)(username|login):\s*$".to_string(),
            password_prompt_pattern: r"Password:\s*$".to_string(),
            disabled_prompt_pattern: r"\$\s*$".to_string(),
            enabled_prompt_pattern: r"\$\s*$".to_string(),
            command_list: vec![
                "/bin/uname -a".to_string(),
                "/usr/bin/uptime".to_string(),
                "/bin/ls".to_string(),
            ],
            read_timeout: Duration::from_secs(5),
            match_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(5),
            command_read_timeout: Duration::from_secs(10),
            command_match_timeout: Duration::from_secs(10),
            ..Attributes::default()
        },
    )
}
