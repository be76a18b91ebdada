//! Cisco IOS / IOS-XE model.
//!
//! ```text
//! Username: admin
//! Password:
//! router>enable
//! Password:
//! router#terminal length 0
//! router#show running-config
//! ```

use std::time::Duration;

use crate::model::{Attributes, Model};

pub fn model() -> Model {
    Model::new(
        "cisco-ios",
        Attributes {
            need_login_chat: true,
            need_enabled_mode: true,
            need_paging_off: true,
            enable_command: "enable".to_string(),
            username_prompt_pattern: r"Username:\s*$".to_string(),
            password_prompt_pattern: r"Password:\s*$".to_string(),
            enable_password_prompt_pattern: r"Password:\s*$".to_string(),
            disabled_prompt_pattern: r"\S+>\s*$".to_string(),
            enabled_prompt_pattern: r"\S+#\s*$".to_string(),
            command_list: vec![
                "show version".to_string(),
                "show running-config".to_string(),
            ],
            disable_pager_command: "terminal length 0".to_string(),
            line_ending: "\r\n".to_string(),
            read_timeout: Duration::from_secs(10),
            match_timeout: Duration::from_secs(20),
            send_timeout: Duration::from_secs(5),
            // 'show running-config' can stall for a while on big boxes
            command_read_timeout: Duration::from_secs(20),
            command_match_timeout: Duration::from_secs(60),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_prompts() {
        let model = model();
        let attrs = model.attributes();
        let disabled = Regex::new(&attrs.disabled_prompt_pattern).unwrap();
        let enabled = Regex::new(&attrs.enabled_prompt_pattern).unwrap();

        assert!(disabled.is_match("router>"));
        assert!(!disabled.is_match("router#"));
        assert!(enabled.is_match("router# "));
        assert!(!enabled.is_match("router>"));
        assert!(Regex::new(&attrs.username_prompt_pattern).unwrap().is_match("Username: "));
    }

    #[test]
    fn test_needs_every_phase() {
        let model = model();
        let attrs = model.attributes();
        assert!(attrs.need_login_chat && attrs.need_enabled_mode && attrs.need_paging_off);
        assert!(attrs.command_match_timeout >= attrs.match_timeout);
    }
}
