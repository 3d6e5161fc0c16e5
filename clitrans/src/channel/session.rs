//! Interactive CLI session over a [`Transport`].

use std::time::Duration;

use log::{debug, trace};
use regex::bytes::Regex;
use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;

use super::buffer::PatternBuffer;
use super::patterns::{GENERIC_PROMPT, prompt_pattern_for};
use crate::error::SessionError;
use crate::transport::Transport;

/// Session tuning.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Default wait for prompt-terminated reads.
    pub timeout: Duration,

    /// How far back an incremental search re-examines already-scanned output.
    pub search_depth: usize,

    /// Line terminator sent after commands.
    pub newline: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            search_depth: 1000,
            newline: "\n".to_string(),
        }
    }
}

/// An open interactive shell on one device.
///
/// Output is read into a buffer that only holds what no read has consumed
/// yet. A pattern read consumes through the end of the first match; a
/// timed-out read consumes nothing. Methods take `&mut self`, so only one
/// command can be in flight.
pub struct Session {
    id: String,
    transport: Box<dyn Transport>,
    buffer: PatternBuffer,
    options: SessionOptions,
    prompt: Option<String>,
    prompt_pattern: Regex,
}

impl Session {
    /// Wrap an open transport.
    pub fn new(id: impl Into<String>, transport: Box<dyn Transport>, options: SessionOptions) -> Self {
        Self {
            id: id.into(),
            transport,
            buffer: PatternBuffer::new(options.search_depth),
            options,
            prompt: None,
            prompt_pattern: Regex::clone(&GENERIC_PROMPT),
        }
    }

    /// Device identifier used in logs.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Line terminator.
    pub fn newline(&self) -> &str {
        &self.options.newline
    }

    /// The resolved prompt, if any.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Record the device prompt and match later reads against it.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) -> Result<(), SessionError> {
        let prompt = prompt.into();
        self.prompt_pattern = prompt_pattern_for(&prompt)?;
        debug!("{}: prompt set to {:?}", self.id, prompt);
        self.prompt = Some(prompt);
        Ok(())
    }

    /// Replace the derived prompt matcher, for devices whose prompts do not
    /// follow the `host(mode)#` shape.
    pub fn set_prompt_pattern(&mut self, pattern: Regex) {
        self.prompt_pattern = pattern;
    }

    pub fn prompt_pattern(&self) -> &Regex {
        &self.prompt_pattern
    }

    /// Bytes received but not consumed yet.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Write raw text.
    pub async fn write(&mut self, text: &str) -> Result<(), SessionError> {
        trace!("{}: write {:?}", self.id, text);
        self.transport.write(text.as_bytes()).await?;
        Ok(())
    }

    /// Write text followed by the line terminator.
    pub async fn write_line(&mut self, text: &str) -> Result<(), SessionError> {
        let line = format!("{}{}", text, self.options.newline);
        self.write(&line).await
    }

    /// Write a secret followed by the line terminator. The secret is never
    /// logged.
    pub async fn write_secret(&mut self, secret: &SecretString) -> Result<(), SessionError> {
        trace!("{}: write <secret>", self.id);
        let line = format!("{}{}", secret.expose_secret(), self.options.newline);
        self.transport.write(line.as_bytes()).await?;
        Ok(())
    }

    /// Read until `pattern` matches, returning everything up to and
    /// including the match.
    ///
    /// On timeout nothing is consumed and [`SessionError::Timeout`] is
    /// returned.
    pub async fn read_until_pattern(
        &mut self,
        pattern: &Regex,
        timeout: Duration,
    ) -> Result<String, SessionError> {
        self.read_until_match(pattern, timeout).await.map(|(output, _)| output)
    }

    /// Read until the current prompt appears. The returned text ends with
    /// the prompt line; the prompt is updated to the line actually seen.
    pub async fn read_until_prompt(&mut self) -> Result<String, SessionError> {
        let pattern = self.prompt_pattern.clone();
        let (output, matched) = self.read_until_match(&pattern, self.options.timeout).await?;
        let seen = matched.trim();
        if self.prompt.as_deref() != Some(seen) {
            trace!("{}: prompt now {:?}", self.id, seen);
            self.prompt = Some(seen.to_string());
        }
        Ok(output)
    }

    /// Read until the literal `expected` appears.
    pub async fn read_until_output(
        &mut self,
        expected: &str,
        timeout: Duration,
    ) -> Result<String, SessionError> {
        let deadline = Instant::now() + timeout;
        let mut scanned = 0;

        loop {
            if let Some(end) = self.buffer.find_literal(expected.as_bytes(), scanned) {
                return Ok(lossy(self.buffer.split_to(end)));
            }
            scanned = self.buffer.len();

            if !self.fill(deadline).await? {
                return Err(SessionError::Timeout {
                    pattern: expected.to_string(),
                    waited: timeout,
                });
            }
        }
    }

    /// Collect everything the device sends during `wait` and consume it all.
    ///
    /// Used where there is no reliable terminator (prompt probing, draining
    /// after fire-and-forget commands).
    pub async fn read_until_timeout(&mut self, wait: Duration) -> Result<String, SessionError> {
        let deadline = Instant::now() + wait;
        loop {
            match self.fill(deadline).await {
                Ok(true) => continue,
                Ok(false) => break,
                Err(SessionError::Closed) if !self.buffer.is_empty() => break,
                Err(e) => return Err(e),
            }
        }
        Ok(lossy(self.buffer.take()))
    }

    /// Close the underlying transport.
    pub async fn close(&mut self) -> Result<(), SessionError> {
        debug!("{}: closing session", self.id);
        self.transport.close().await?;
        Ok(())
    }

    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }

    async fn read_until_match(
        &mut self,
        pattern: &Regex,
        timeout: Duration,
    ) -> Result<(String, String), SessionError> {
        let deadline = Instant::now() + timeout;
        let mut scanned = 0;

        loop {
            if let Some((start, end)) = self.buffer.search_from(pattern, scanned) {
                let matched =
                    String::from_utf8_lossy(&self.buffer.as_slice()[start..end]).into_owned();
                let output = lossy(self.buffer.split_to(end));
                return Ok((output, matched));
            }
            scanned = self.buffer.len();

            if !self.fill(deadline).await? {
                debug!(
                    "{}: pattern {:?} not seen within {:?}, {} bytes buffered",
                    self.id,
                    pattern.as_str(),
                    timeout,
                    self.buffer.len()
                );
                return Err(SessionError::Timeout {
                    pattern: pattern.as_str().to_string(),
                    waited: timeout,
                });
            }
        }
    }

    /// Append the next transport chunk. `Ok(false)` once `deadline` passes.
    async fn fill(&mut self, deadline: Instant) -> Result<bool, SessionError> {
        match tokio::time::timeout_at(deadline, self.transport.read()).await {
            Err(_) => Ok(false),
            Ok(Ok(Some(chunk))) => {
                trace!("{}: read {:?}", self.id, String::from_utf8_lossy(&chunk));
                self.buffer.extend(&chunk);
                Ok(true)
            }
            Ok(Ok(None)) => Err(SessionError::Closed),
            Ok(Err(e)) => Err(e.into()),
        }
    }
}

fn lossy(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ScriptedTransport;

    fn session(transport: ScriptedTransport) -> Session {
        Session::new("test", Box::new(transport), SessionOptions::default())
    }

    #[tokio::test]
    async fn test_read_until_prompt_keeps_remainder() {
        let transport = ScriptedTransport::new().with_banner("line one\r\nR1#trailing");
        let mut session = session(transport);
        session.set_prompt("R1#").unwrap();

        let output = session
            .read_until_pattern(&Regex::new("R1#").unwrap(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(output, "line one\r\nR1#");
        assert_eq!(session.buffered(), "trailing".len());
    }

    #[tokio::test]
    async fn test_prompt_tracks_mode_changes() {
        let transport = ScriptedTransport::new()
            .with_banner("R1#")
            .reply("configure terminal\n", "configure terminal\r\nR1(config)#");
        let mut session = session(transport);
        session.set_prompt("R1#").unwrap();
        session.read_until_prompt().await.unwrap();

        session.write_line("configure terminal").await.unwrap();
        let output = session.read_until_prompt().await.unwrap();

        assert!(output.ends_with("R1(config)#"));
        assert_eq!(session.prompt(), Some("R1(config)#"));
    }

    #[tokio::test]
    async fn test_timeout_leaves_buffer_intact() {
        let transport = ScriptedTransport::new().with_banner("partial output");
        let mut session = session(transport);

        let err = session
            .read_until_pattern(&Regex::new("never").unwrap(), Duration::from_millis(20))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(session.buffered(), "partial output".len());

        let rest = session.read_until_timeout(Duration::from_millis(10)).await.unwrap();
        assert_eq!(rest, "partial output");
    }

    #[tokio::test]
    async fn test_read_until_output_literal() {
        let transport = ScriptedTransport::new().reply("enable\n", "enable\r\nPassword: ");
        let mut session = session(transport);

        session.write_line("enable").await.unwrap();
        let output = session
            .read_until_output("Password:", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(output, "enable\r\nPassword:");
    }

    #[tokio::test]
    async fn test_closed_session() {
        let mut transport = ScriptedTransport::new();
        transport.close().await.unwrap();
        let mut session = session(transport);

        let err = session.read_until_prompt().await.unwrap_err();
        assert!(matches!(err, SessionError::Closed));
    }
}
