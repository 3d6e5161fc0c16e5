//! Session initialization.
//!
//! An initializer runs once on a freshly opened session, before any reader
//! or writer touches it. Failures are fatal for the session and never
//! retried here.

mod privileged;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};

use crate::channel::Session;
use crate::error::{InitError, SessionError};
use crate::prompt::{EnterAndRead, PromptResolver};

pub use privileged::{InitState, PrivilegedModeInitializer};

/// Drives a connected session into a usable state.
#[async_trait]
pub trait SessionInitializer: Send + Sync {
    async fn initialize(&self, session: &mut Session) -> Result<(), InitError>;
}

/// Leaves the session as connected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInitializer;

#[async_trait]
impl SessionInitializer for NoopInitializer {
    async fn initialize(&self, session: &mut Session) -> Result<(), InitError> {
        debug!("{}: no session initialization", session.id());
        Ok(())
    }
}

/// Sends terminal setup commands and resolves the prompt. For devices that
/// land in an operational shell and need no privilege escalation.
pub struct TerminalSetupInitializer {
    device: String,
    commands: Vec<String>,
    read_timeout: Duration,
    prompt_resolver: Arc<dyn PromptResolver>,
}

impl TerminalSetupInitializer {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            commands: Vec::new(),
            read_timeout: Duration::from_secs(1),
            prompt_resolver: Arc::new(EnterAndRead::new()),
        }
    }

    /// Add a fire-and-forget setup command.
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    /// How long to drain output after the setup commands.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn prompt_resolver(mut self, resolver: Arc<dyn PromptResolver>) -> Self {
        self.prompt_resolver = resolver;
        self
    }
}

/// Write each command and drain whatever comes back; responses are not
/// validated.
pub(crate) async fn send_terminal_setup(
    device: &str,
    session: &mut Session,
    commands: &[String],
    drain: Duration,
) -> Result<(), InitError> {
    let session_error = |source: SessionError| InitError::Session {
        device: device.to_string(),
        source,
    };

    for command in commands {
        debug!("{}: terminal setup: {}", device, command);
        session.write_line(command).await.map_err(session_error)?;
    }
    let output = session
        .read_until_timeout(drain)
        .await
        .map_err(session_error)?;
    debug!("{}: terminal setup output: {:?}", device, output);
    Ok(())
}

#[async_trait]
impl SessionInitializer for TerminalSetupInitializer {
    async fn initialize(&self, session: &mut Session) -> Result<(), InitError> {
        send_terminal_setup(&self.device, session, &self.commands, self.read_timeout).await?;

        let prompt = self
            .prompt_resolver
            .resolve_prompt(session)
            .await
            .map_err(|source| InitError::Prompt {
                device: self.device.clone(),
                source,
            })?;

        info!("{}: cli session initialized, prompt {:?}", self.device, prompt);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SessionOptions;
    use crate::transport::ScriptedTransport;

    #[tokio::test]
    async fn test_terminal_setup_then_prompt() {
        let transport = ScriptedTransport::new().with_prompt("admin@vsrx>");
        let log = transport.log();
        let mut session = Session::new("vsrx", Box::new(transport), SessionOptions::default());

        let init = TerminalSetupInitializer::new("vsrx")
            .command("set cli screen-length 0")
            .command("set cli screen-width 0")
            .read_timeout(Duration::from_millis(10))
            .prompt_resolver(Arc::new(
                EnterAndRead::junos().with_time_unit(Duration::from_millis(5)),
            ));
        init.initialize(&mut session).await.unwrap();

        assert_eq!(
            log.writes(),
            vec![
                "set cli screen-length 0\n".to_string(),
                "set cli screen-width 0\n".to_string(),
                "\n\n".to_string(),
            ]
        );
        assert_eq!(session.prompt(), Some("admin@vsrx>"));
    }

    #[tokio::test]
    async fn test_noop_sends_nothing() {
        let transport = ScriptedTransport::new();
        let log = transport.log();
        let mut session = Session::new("x", Box::new(transport), SessionOptions::default());

        NoopInitializer.initialize(&mut session).await.unwrap();
        assert!(log.writes().is_empty());
    }
}
