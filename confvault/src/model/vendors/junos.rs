//! Juniper JUNOS model.
//!
//! Operational mode only; the pager is bypassed per command with
//! `| no-more` instead of a separate pager-off step.
//!
//! ```text
//! login: admin
//! Password:
//! {master:0}
//! admin@router>
//! ```

use std::time::Duration;

use crate::model::{Attributes, Model};

pub fn model() -> Model {
    Model::new(
        "junos",
        Attributes {
            need_login_chat: true,
            username_prompt_pattern: r"login:\s*$".to_string(),
            password_prompt_pattern: r"Password:\s*$".to_string(),
            disabled_prompt_pattern: r"\S+@\S+>\s*$".to_string(),
            enabled_prompt_pattern: r"\S+@\S+>\s*$".to_string(),
            command_list: vec![
                "show version | no-more".to_string(),
                "show configuration | display set | no-more".to_string(),
            ],
            line_ending: "\r\n".to_string(),
            read_timeout: Duration::from_secs(10),
            match_timeout: Duration::from_secs(20),
            send_timeout: Duration::from_secs(5),
            command_read_timeout: Duration::from_secs(20),
            command_match_timeout: Duration::from_secs(60),
            ..Attributes::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_exec_prompt() {
        let model = model();
        let prompt = Regex::new(&model.attributes().enabled_prompt_pattern).unwrap();
        assert!(prompt.is_match("admin@router> "));
        assert!(!prompt.is_match("{master:0}"));
        assert!(!prompt.is_match("admin@router# "));
    }

    #[test]
    fn test_no_separate_pager_step() {
        let model = model();
        assert!(!model.attributes().need_paging_off);
        assert!(
            model
                .attributes()
                .command_list
                .iter()
                .all(|c| c.ends_with("| no-more"))
        );
    }
}
