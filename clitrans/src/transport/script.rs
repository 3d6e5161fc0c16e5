//! In-memory scripted device.
//!
//! `ScriptedTransport` replies to writes from a script and records every
//! write, so sessions, initializers, and vendor writers can be exercised
//! without a device.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log::trace;
use tokio::sync::mpsc;

use super::Transport;
use crate::error::TransportError;

/// Shared record of everything written to a [`ScriptedTransport`], and
/// of whether it was closed.
#[derive(Debug, Clone, Default)]
pub struct TranscriptLog {
    writes: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl TranscriptLog {
    /// Individual writes, in order.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// All writes concatenated.
    pub fn transcript(&self) -> String {
        self.writes().concat()
    }

    /// Number of writes that equal `text`.
    pub fn count(&self, text: &str) -> usize {
        self.writes().iter().filter(|w| w.as_str() == text).count()
    }

    /// Forget recorded writes.
    pub fn clear(&self) {
        if let Ok(mut writes) = self.writes.lock() {
            writes.clear();
        }
    }

    /// Whether the transport has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn push(&self, text: String) {
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(text);
        }
    }
}

/// Part of a reply, sent `delay` after the write that triggered it.
#[derive(Debug, Clone)]
struct Chunk {
    delay: Duration,
    output: String,
}

/// Replies queued for one exact input. The last reply repeats.
#[derive(Debug)]
struct Rule {
    input: String,
    replies: VecDeque<Vec<Chunk>>,
}

/// A scripted device shell.
///
/// Writes are matched exactly against scripted inputs; each match pops the
/// next reply (the last one repeats forever). A reply can carry late parts
/// that arrive some time after the write. Unmatched writes are answered
/// line by line with an echo followed by the current prompt, the way a
/// shell would.
///
/// # Example
///
/// ```rust
/// use clitrans::transport::ScriptedTransport;
///
/// let transport = ScriptedTransport::new()
///     .with_banner("Welcome\r\nR1>")
///     .with_prompt("R1>")
///     .reply("enable\n", "enable\r\nPassword: ")
///     .reply("secret\n", "\r\nR1#");
/// let log = transport.log();
/// # drop((transport, log));
/// ```
pub struct ScriptedTransport {
    rules: Vec<Rule>,
    /// Rule the last `reply` call added to.
    last_rule: usize,
    prompt: Option<String>,
    newline: String,
    inbox: mpsc::UnboundedReceiver<Vec<u8>>,
    outbox: mpsc::UnboundedSender<Vec<u8>>,
    log: TranscriptLog,
}

impl ScriptedTransport {
    /// A device that says nothing until scripted.
    pub fn new() -> Self {
        let (outbox, inbox) = mpsc::unbounded_channel();
        Self {
            rules: Vec::new(),
            last_rule: 0,
            prompt: None,
            newline: "\n".to_string(),
            inbox,
            outbox,
            log: TranscriptLog::default(),
        }
    }

    /// Output available immediately after connect.
    pub fn with_banner(self, banner: impl Into<String>) -> Self {
        let _ = self.outbox.send(banner.into().into_bytes());
        self
    }

    /// Echo unmatched writes, each line followed by this prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Line terminator the client uses (default `\n`).
    pub fn with_newline(mut self, newline: impl Into<String>) -> Self {
        self.newline = newline.into();
        self
    }

    /// Queue `output` as the reply to the next write of exactly `input`.
    pub fn reply(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        let input = input.into();
        let reply = vec![Chunk {
            delay: Duration::ZERO,
            output: output.into(),
        }];
        match self.rules.iter().position(|r| r.input == input) {
            Some(index) => {
                self.rules[index].replies.push_back(reply);
                self.last_rule = index;
            }
            None => {
                self.rules.push(Rule {
                    input,
                    replies: VecDeque::from([reply]),
                });
                self.last_rule = self.rules.len() - 1;
            }
        }
        self
    }

    /// Extend the most recently scripted reply with `output`, sent `delay`
    /// after the write it answers. No-op before any [`reply`](Self::reply).
    pub fn then_after(mut self, delay: Duration, output: impl Into<String>) -> Self {
        let rule = self.rules.get_mut(self.last_rule);
        if let Some(reply) = rule.and_then(|r| r.replies.back_mut()) {
            reply.push(Chunk {
                delay,
                output: output.into(),
            });
        }
        self
    }

    /// Handle on the write log; stays valid after the transport is moved.
    pub fn log(&self) -> TranscriptLog {
        self.log.clone()
    }

    fn respond(&mut self, text: &str) -> Option<Vec<Chunk>> {
        if let Some(rule) = self.rules.iter_mut().find(|r| r.input == text) {
            let reply = if rule.replies.len() > 1 {
                rule.replies.pop_front()
            } else {
                rule.replies.front().cloned()
            };
            return reply;
        }

        let prompt = self.prompt.as_ref()?;
        let body = text.strip_suffix(self.newline.as_str())?;
        // Real devices switch prompts on mode changes; scripts override
        // those lines explicitly.
        Some(vec![Chunk {
            delay: Duration::ZERO,
            output: body
                .split(self.newline.as_str())
                .map(|line| format!("{}\r\n{}", line, prompt))
                .collect(),
        }])
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.log.is_closed() {
            return Err(TransportError::Disconnected);
        }
        let text = String::from_utf8_lossy(data).into_owned();
        trace!("scripted device received {:?}", text);
        for chunk in self.respond(&text).unwrap_or_default() {
            if chunk.delay.is_zero() {
                let _ = self.outbox.send(chunk.output.into_bytes());
                continue;
            }
            let outbox = self.outbox.clone();
            tokio::spawn(async move {
                tokio::time::sleep(chunk.delay).await;
                let _ = outbox.send(chunk.output.into_bytes());
            });
        }
        self.log.push(text);
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.log.is_closed() {
            return Ok(None);
        }
        // The transport owns a sender, so recv only completes with data.
        Ok(self.inbox.recv().await)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.log.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        !self.log.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_reply_and_log() {
        let mut transport = ScriptedTransport::new().reply("show clock\n", "12:00\r\nR1#");
        let log = transport.log();

        transport.write(b"show clock\n").await.unwrap();
        let chunk = transport.read().await.unwrap().unwrap();

        assert_eq!(chunk, b"12:00\r\nR1#");
        assert_eq!(log.writes(), vec!["show clock\n".to_string()]);
    }

    #[tokio::test]
    async fn test_last_reply_repeats() {
        let mut transport = ScriptedTransport::new()
            .reply("\n", "first")
            .reply("\n", "second");

        for expected in ["first", "second", "second"] {
            transport.write(b"\n").await.unwrap();
            let chunk = transport.read().await.unwrap().unwrap();
            assert_eq!(chunk, expected.as_bytes());
        }
    }

    #[tokio::test]
    async fn test_late_output_follows_reply() {
        let mut transport = ScriptedTransport::new()
            .reply("show log\n", "show log\r\n")
            .then_after(Duration::from_millis(20), "%LINK-3-UPDOWN\r\nR1#");

        transport.write(b"show log\n").await.unwrap();
        assert_eq!(transport.read().await.unwrap().unwrap(), b"show log\r\n");

        let start = tokio::time::Instant::now();
        assert_eq!(transport.read().await.unwrap().unwrap(), b"%LINK-3-UPDOWN\r\nR1#");
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[tokio::test]
    async fn test_echo_with_prompt() {
        let mut transport = ScriptedTransport::new().with_prompt("R1(config)#");
        transport.write(b"mtu 1500\n").await.unwrap();
        let chunk = transport.read().await.unwrap().unwrap();
        assert_eq!(chunk, b"mtu 1500\r\nR1(config)#");
    }

    #[tokio::test]
    async fn test_echo_double_enter() {
        let mut transport = ScriptedTransport::new().with_prompt("R1#");
        transport.write(b"\n\n").await.unwrap();
        let chunk = transport.read().await.unwrap().unwrap();
        assert_eq!(chunk, b"\r\nR1#\r\nR1#");
    }

    #[tokio::test]
    async fn test_closed_transport_rejects_writes() {
        let mut transport = ScriptedTransport::new();
        let log = transport.log();
        transport.close().await.unwrap();
        assert!(transport.write(b"x").await.is_err());
        assert!(transport.read().await.unwrap().is_none());
        assert!(log.is_closed());
    }
}
