//! Logging commands embedded in step output.
//!
//! A line containing `##vso[area.event key=value;key=value]data` is a
//! command, not output. Property values and data escape `;`, `\r`, `\n`
//! and `]` as `%3B`, `%0D`, `%0A` and `%5D`, and `%` itself as `%25`.
//!
//! Only the `task` area is understood:
//!
//! | Command | Effect |
//! |---|---|
//! | `task.setsecret` | masks `data` from now on |
//! | `task.logissue type=error` | records an error issue with message `data` |
//! | `task.logissue type=warning` | records a warning issue with message `data` |
//! | `task.complete result=<result>` | sets the step result (default `Succeeded`) |
//! | `task.setprogress value=<0-100>` | reports progress, `data` is the current operation |
//!
//! # Example
//!
//! ```
//! use hauler::steps::LoggingCommand;
//!
//! let command = LoggingCommand::parse("##vso[task.logissue type=warning]disk 90%25 full").unwrap();
//! assert_eq!(command.area, "task");
//! assert_eq!(command.event, "logissue");
//! assert_eq!(command.property("type"), Some("warning"));
//! assert_eq!(command.data, "disk 90% full");
//! ```

use std::fmt;

use indexmap::IndexMap;

use super::context::ExecutionContext;
use super::result::TaskResult;
use crate::error::{HaulerError, Result};

/// Marks a line as a logging command.
pub const COMMAND_KEYWORD: &str = "##vso";

const TASK_AREA: &str = "task";

/// A parsed `##vso[...]` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingCommand {
    pub area: String,
    pub event: String,
    /// Keys are lowercased; values are unescaped.
    pub properties: IndexMap<String, String>,
    pub data: String,
}

impl LoggingCommand {
    /// Parse the first command in `line`.
    ///
    /// Returns `None` if the line has no well-formed `##vso[area.event ...]`
    /// header.
    pub fn parse(line: &str) -> Option<Self> {
        let start = line.find(COMMAND_KEYWORD)?;
        let rest = line[start + COMMAND_KEYWORD.len()..].strip_prefix('[')?;
        let (header, data) = rest.split_once(']')?;

        let (name, props) = header.split_once(' ').unwrap_or((header, ""));
        let (area, event) = name.split_once('.')?;
        if area.is_empty() || event.is_empty() || event.contains('.') {
            return None;
        }

        let mut properties = IndexMap::new();
        for pair in props.split(';') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if !key.is_empty() {
                properties.insert(key.to_ascii_lowercase(), unescape(value));
            }
        }

        Some(Self {
            area: area.to_string(),
            event: event.to_string(),
            properties,
            data: unescape(data),
        })
    }

    /// Look up a property by lowercase name.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// Renders the header only; data may be secret.
impl fmt::Display for LoggingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}.{}]", COMMAND_KEYWORD, self.area, self.event)
    }
}

fn unescape(value: &str) -> String {
    value
        .replace("%3B", ";")
        .replace("%0D", "\r")
        .replace("%0A", "\n")
        .replace("%5D", "]")
        .replace("%25", "%")
}

/// Handle `line` if it is a logging command.
///
/// Returns `true` when the line was consumed as a command and must not be
/// written as output. A line that mentions the keyword but does not parse
/// gets a warning and is still written. An unknown area records an error;
/// a command that fails records errors and fails the step.
pub fn process(context: &mut ExecutionContext, line: &str) -> bool {
    if !line.contains(COMMAND_KEYWORD) {
        return false;
    }
    let Some(command) = LoggingCommand::parse(line) else {
        context.warning(&format!(
            "'{}' contains logging command keyword '{}' but is not a valid command.",
            line, COMMAND_KEYWORD
        ));
        return false;
    };

    tracing::debug!(area = %command.area, event = %command.event, "processing logging command");
    if !command.area.eq_ignore_ascii_case(TASK_AREA) {
        context.error(&format!("Unknown logging command area '{}'.", command.area));
        return true;
    }

    if let Err(err) = run_task_command(context, &command) {
        context.error(&err.to_string());
        context.error(&format!("Unable to process command {} successfully.", command));
        context.set_result(TaskResult::Failed);
    }
    true
}

fn run_task_command(context: &mut ExecutionContext, command: &LoggingCommand) -> Result<()> {
    match command.event.to_ascii_lowercase().as_str() {
        "setsecret" => {
            if command.data.is_empty() {
                return Err(HaulerError::invalid_argument("data", "secret value must not be empty"));
            }
            context.masker().add_value(command.data.as_str());
        }
        "logissue" => match command.property("type") {
            Some(kind) if kind.eq_ignore_ascii_case("error") => context.error(&command.data),
            Some(kind) if kind.eq_ignore_ascii_case("warning") => context.warning(&command.data),
            other => {
                return Err(HaulerError::invalid_argument(
                    "type",
                    format!("unknown issue type '{}'", other.unwrap_or_default()),
                ))
            }
        },
        "complete" => {
            let result = match command.property("result") {
                Some(value) => value.parse()?,
                None => TaskResult::Succeeded,
            };
            context.set_result(result);
        }
        "setprogress" => {
            let value = command.property("value").unwrap_or_default();
            let percent = value
                .trim()
                .parse::<u8>()
                .ok()
                .filter(|p| *p <= 100)
                .ok_or_else(|| {
                    HaulerError::invalid_argument("value", format!("'{}' is not a percentage", value))
                })?;
            let operation = (!command.data.is_empty()).then_some(command.data.as_str());
            context.set_progress(percent, operation);
        }
        other => {
            return Err(HaulerError::invalid_argument(
                "event",
                format!("unknown task command '{}'", other),
            ))
        }
    }
    Ok(())
}
