//! HTTP "device": sends one request and captures the response.
//!
//! Used over the raw `tcp` transport. There is no prompt; the server
//! closing the connection ends the capture.

use std::time::Duration;

use crate::model::{Attributes, Model};

pub fn model() -> Model {
    Model::new(
        "http",
        Attributes {
            // Empty prompt: the command phase waits for EOF
            enabled_prompt_pattern: String::new(),
            disabled_prompt_pattern: r"\S+>\s*$".to_string(),
            command_list: vec!["GET / HTTP/1.0\r\n\r\n".to_string()],
            line_ending: String::new(),
            read_timeout: Duration::from_secs(5),
            match_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(5),
            command_read_timeout: Duration::from_secs(5),
            command_match_timeout: Duration::from_secs(10),
            ..Attributes::default()
        },
    )
}
