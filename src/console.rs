// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Operator console: line-oriented stdin commands (§6.6). Parsing is pure and
//! synchronous; dispatch (owned by [`crate::supervisor::Supervisor`]) decides
//! whether a command runs inline (`list`, `quit`) or as a worker-pool task
//! (`set`, `get`).

use crate::registry::ControllerSnapshot;

const MAX_CONTROLLER_LEN: usize = 8;
const MAX_DEVICE_LEN: usize = 7;
const MAX_VALUE_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Set {
        controller: String,
        device: String,
        value: String,
    },
    Get {
        controller: String,
        device: String,
    },
    Quit,
    /// A recognized command whose arguments violate a length limit. Carries
    /// the warning message to log; never dispatched.
    Invalid(String),
    /// Blank or unrecognized input.
    Usage,
}

/// Parses one whitespace-collapsed command line.
pub fn parse(line: &str) -> Command {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        ["list"] => Command::List,
        ["quit"] => Command::Quit,
        ["set", controller, device, value] => {
            if controller.len() > MAX_CONTROLLER_LEN {
                Command::Invalid("Controller name exceeds maximum length. (8)".to_string())
            } else if device.len() > MAX_DEVICE_LEN {
                Command::Invalid("Device name exceeds maximum length. (7)".to_string())
            } else if value.len() > MAX_VALUE_LEN {
                Command::Invalid("Value exceeds maximum length. (6)".to_string())
            } else {
                Command::Set {
                    controller: controller.to_string(),
                    device: device.to_string(),
                    value: value.to_string(),
                }
            }
        }
        ["get", controller, device] => {
            if controller.len() > MAX_CONTROLLER_LEN {
                Command::Invalid("Controller name exceeds maximum length. (8)".to_string())
            } else if device.len() > MAX_DEVICE_LEN {
                Command::Invalid("Device name exceeds maximum length. (7)".to_string())
            } else {
                Command::Get {
                    controller: controller.to_string(),
                    device: device.to_string(),
                }
            }
        }
        _ => Command::Usage,
    }
}

/// Renders the `list` command's table: one header row plus one row per
/// controller, blanks where a session field is unset.
pub fn format_list(snapshot: &[ControllerSnapshot]) -> String {
    let mut out = String::new();
    out.push_str(
        "NAME     IP              MAC          RAND     STATUS       SITUATION    DEVICES\n",
    );
    for entry in snapshot {
        let devices = entry.session.devices.join(" ");
        out.push_str(&format!(
            "{:<8} {:<15} {:<12} {:<8} {:<12} {:<12} {}\n",
            entry.name,
            entry.session.ip,
            entry.mac,
            entry.session.rand,
            entry.session.status.to_string(),
            entry.session.situation,
            devices,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_and_quit() {
        assert_eq!(parse("list"), Command::List);
        assert_eq!(parse("  quit  "), Command::Quit);
    }

    #[test]
    fn parses_set_with_value() {
        assert_eq!(
            parse("set CTRL-A01 temp1 21.3"),
            Command::Set {
                controller: "CTRL-A01".to_string(),
                device: "temp1".to_string(),
                value: "21.3".to_string(),
            }
        );
    }

    #[test]
    fn parses_get_without_value() {
        assert_eq!(
            parse("get CTRL-A01 temp1"),
            Command::Get {
                controller: "CTRL-A01".to_string(),
                device: "temp1".to_string(),
            }
        );
    }

    #[test]
    fn set_value_over_six_chars_is_rejected_pre_dispatch() {
        assert_eq!(
            parse("set CTRL-A01 temp1 1234567"),
            Command::Invalid("Value exceeds maximum length. (6)".to_string())
        );
    }

    #[test]
    fn set_value_of_exactly_six_chars_succeeds() {
        assert!(matches!(parse("set CTRL-A01 temp1 123456"), Command::Set { .. }));
    }

    #[test]
    fn controller_name_over_eight_chars_is_rejected() {
        assert_eq!(
            parse("get TOO-LONG-NAME temp1"),
            Command::Invalid("Controller name exceeds maximum length. (8)".to_string())
        );
    }

    #[test]
    fn unrecognized_input_prints_usage() {
        assert_eq!(parse("frobnicate everything"), Command::Usage);
        assert_eq!(parse(""), Command::Usage);
    }
}
