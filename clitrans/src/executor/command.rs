//! Literal command batches.

use std::fmt;

use crate::error::TemplateError;
use crate::template::{self, Context};

/// Literal text sent to a device as one batch.
///
/// Lines are sent verbatim and in order, blank ones included. Only the
/// line terminators are replaced by the session's own. A batch with no
/// content is an empty command: sending it presses enter once and waits for
/// the prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    content: String,
}

impl Command {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// The no-op command.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Render `template` against `ctx`.
    pub fn render(template: &str, ctx: &Context) -> Result<Self, TemplateError> {
        template::render(template, ctx).map(Self::new)
    }

    /// Content as given.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Lines that will be sent, in order, without their `\n` or `\r\n`
    /// terminators. A final terminator does not start another line.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.content.lines()
    }

    /// Whether nothing but a line terminator would be sent.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}

impl From<String> for Command {
    fn from(content: String) -> Self {
        Command::new(content)
    }
}

impl From<&str> for Command {
    fn from(content: &str) -> Self {
        Command::new(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_are_verbatim() {
        let command = Command::new("description uplink  \r\n\n mtu 1500\nexit\n");
        assert_eq!(
            command.lines().collect::<Vec<_>>(),
            vec!["description uplink  ", "", " mtu 1500", "exit"]
        );
    }

    #[test]
    fn test_only_final_terminator_dropped() {
        assert_eq!(Command::new("exit\n\n").lines().collect::<Vec<_>>(), vec!["exit", ""]);
        assert_eq!(Command::new("\n").lines().collect::<Vec<_>>(), vec![""]);
    }

    #[test]
    fn test_empty_command_presses_enter() {
        let command = Command::empty();
        assert!(command.is_empty());
        assert_eq!(command.lines().count(), 0);
        assert!(!Command::new("\n").is_empty());
    }

    #[test]
    fn test_render_command() {
        let ctx = Context::new().insert("mode", "mef-ce2");
        let command = Command::render("l2-cft set mode {$mode}\nconfiguration save", &ctx).unwrap();
        assert_eq!(command.content(), "l2-cft set mode mef-ce2\nconfiguration save");
    }
}
