//! Prompt resolution.
//!
//! A device's prompt is discovered by pressing enter and looking for the
//! same line printed twice in a row. Vendors differ only in which output
//! lines are noise (Junos prints `[edit ...]` above every prompt in
//! configuration mode), so the ignore pattern is the one knob.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace, warn};
use regex::Regex;

use crate::channel::Session;
use crate::error::PromptError;

/// Discovers the current CLI prompt of a session.
#[async_trait]
pub trait PromptResolver: Send + Sync {
    /// Press enter on the device and return its prompt. On success the session is
    /// switched to match against the returned prompt.
    async fn resolve_prompt(&self, session: &mut Session) -> Result<String, PromptError>;
}

/// Write terminators, read for a growing window, and accept the prompt once
/// exactly two identical non-noise lines come back.
///
/// The window starts at one time unit and grows by one unit per attempt;
/// attempts stop when it reaches `max_wait` units.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use clitrans::prompt::EnterAndRead;
///
/// let resolver = EnterAndRead::new().with_time_unit(Duration::from_millis(500));
/// let junos = EnterAndRead::junos();
/// # drop((resolver, junos));
/// ```
#[derive(Debug, Clone)]
pub struct EnterAndRead {
    ignore: Option<Regex>,
    time_unit: Duration,
    initial_wait: u32,
    max_wait: u32,
}

impl EnterAndRead {
    /// One second time unit, waits of 1 to 9 units.
    pub fn new() -> Self {
        Self {
            ignore: None,
            time_unit: Duration::from_secs(1),
            initial_wait: 1,
            max_wait: 10,
        }
    }

    /// Junos: skip `[edit ...]` guidance lines.
    pub fn junos() -> Self {
        Self::new().with_ignore(Regex::new(r"^\[edit.*\]$").expect("junos guidance pattern"))
    }

    /// Lines matching `pattern` (after trimming) are not prompt candidates.
    pub fn with_ignore(mut self, pattern: Regex) -> Self {
        self.ignore = Some(pattern);
        self
    }

    /// Length of one wait unit.
    pub fn with_time_unit(mut self, unit: Duration) -> Self {
        self.time_unit = unit;
        self
    }

    /// Window size (in units) at which resolution gives up.
    pub fn with_max_wait(mut self, max_wait: u32) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// The prompt, if `output` holds exactly two identical candidate lines.
    fn find_prompt(&self, output: &str) -> Option<String> {
        let lines: Vec<&str> = output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| !self.ignore.as_ref().is_some_and(|re| re.is_match(line)))
            .collect();

        match lines.as_slice() {
            [first, second] if first == second => Some(first.to_string()),
            _ => None,
        }
    }
}

impl Default for EnterAndRead {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PromptResolver for EnterAndRead {
    async fn resolve_prompt(&self, session: &mut Session) -> Result<String, PromptError> {
        let enters = session.newline().repeat(2);
        let mut wait = self.initial_wait;
        let mut attempts = 0;
        let mut last_output = String::new();

        while wait < self.max_wait {
            session.write(&enters).await?;
            last_output = session.read_until_timeout(self.time_unit * wait).await?;
            attempts += 1;
            trace!("{}: prompt attempt {} read {:?}", session.id(), attempts, last_output);

            if let Some(prompt) = self.find_prompt(&last_output) {
                debug!("{}: resolved prompt {:?} after {} attempts", session.id(), prompt, attempts);
                session.set_prompt(prompt.as_str())?;
                return Ok(prompt);
            }

            wait += 1;
        }

        warn!("{}: unable to resolve prompt in {} attempts", session.id(), attempts);
        Err(PromptError::ResolutionFailed {
            attempts,
            last_output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SessionOptions;
    use crate::transport::ScriptedTransport;

    fn session(transport: ScriptedTransport) -> Session {
        Session::new("test", Box::new(transport), SessionOptions::default())
    }

    fn fast() -> EnterAndRead {
        EnterAndRead::new().with_time_unit(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_resolves_echoed_prompt() {
        let mut session = session(ScriptedTransport::new().with_prompt("R1>"));

        let prompt = fast().resolve_prompt(&mut session).await.unwrap();

        assert_eq!(prompt, "R1>");
        assert_eq!(session.prompt(), Some("R1>"));
    }

    #[tokio::test]
    async fn test_resolves_after_noisy_attempts() {
        let transport = ScriptedTransport::new()
            .reply("\n\n", "Last login: today\r\nR1#")
            .reply("\n\n", "\r\n% banner\r\nR1#\r\n")
            .reply("\n\n", "\r\nR1#\r\nR1#");
        let log = transport.log();
        let mut session = session(transport);

        let prompt = fast().resolve_prompt(&mut session).await.unwrap();

        assert_eq!(prompt, "R1#");
        assert_eq!(log.count("\n\n"), 3);
    }

    #[tokio::test]
    async fn test_fails_at_wait_cap() {
        let transport = ScriptedTransport::new().reply("\n\n", "\r\nR1#");
        let log = transport.log();
        let mut session = session(transport);

        let err = fast().resolve_prompt(&mut session).await.unwrap_err();

        match err {
            PromptError::ResolutionFailed {
                attempts,
                last_output,
            } => {
                assert_eq!(attempts, 9);
                assert_eq!(last_output, "\r\nR1#");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(log.count("\n\n"), 9);
    }

    #[tokio::test]
    async fn test_junos_ignores_guidance() {
        let transport = ScriptedTransport::new()
            .reply("\n\n", "\r\n[edit]\r\nadmin@vsrx#\r\n[edit]\r\nadmin@vsrx#");
        let mut session = session(transport);

        let resolver = EnterAndRead::junos().with_time_unit(Duration::from_millis(5));
        let prompt = resolver.resolve_prompt(&mut session).await.unwrap();

        assert_eq!(prompt, "admin@vsrx#");
    }

    #[test]
    fn test_three_identical_lines_rejected() {
        assert_eq!(fast().find_prompt("R1#\r\nR1#\r\nR1#"), None);
        assert_eq!(fast().find_prompt("R1#\r\nR2#"), None);
        assert_eq!(fast().find_prompt("\r\n R1# \r\n\r\nR1#"), Some("R1#".into()));
    }
}
