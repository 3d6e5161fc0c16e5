//! Privileged-mode ("enable") initializer.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, trace, warn};
use secrecy::{ExposeSecret, SecretString};

use super::{SessionInitializer, send_terminal_setup};
use crate::channel::Session;
use crate::error::{InitError, PromptError, SessionError};
use crate::prompt::{EnterAndRead, PromptResolver};

/// States of [`PrivilegedModeInitializer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitState {
    /// Transport is open, nothing sent yet.
    Connected,
    /// Sending pagination/width commands.
    SettingTerminalOptions,
    /// Probing for the initial prompt, then draining output up to its next
    /// appearance.
    ResolvingPrompt,
    /// Initial prompt already carries the privileged marker.
    AlreadyPrivileged,
    /// Sending the enable command and credentials.
    EnteringPrivilegedMode,
    /// Re-resolving the prompt after enable.
    VerifyingPrivilegedMode,
    /// Session is usable.
    Ready,
    /// Privileged mode was not reached; carries the prompt seen.
    Failed(String),
}

impl InitState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InitState::Ready | InitState::Failed(_))
    }
}

/// Brings a session into privileged mode.
///
/// Sequence: optional terminal setup, prompt resolution, and if the prompt
/// lacks the privileged suffix, `enable` plus password. A wrong enable
/// secret falls back to the login password; when no candidate is left the
/// initializer presses enter until the device stops asking for a password,
/// then checks the prompt one last time.
///
/// # Example
///
/// ```rust
/// use clitrans::init::PrivilegedModeInitializer;
///
/// let init = PrivilegedModeInitializer::new("R1")
///     .terminal_setup("terminal length 0")
///     .terminal_setup("terminal width 0")
///     .secret("enable-secret")
///     .login_password("login-password");
/// # drop(init);
/// ```
pub struct PrivilegedModeInitializer {
    device: String,
    terminal_setup: Vec<String>,
    privileged_suffix: String,
    enable_command: String,
    password_prompt: String,
    secret: Option<SecretString>,
    login_password: Option<SecretString>,
    read_timeout: Duration,
    max_password_retries: usize,
    prompt_resolver: Arc<dyn PromptResolver>,
}

impl PrivilegedModeInitializer {
    /// IOS-style defaults: `#` suffix, `enable`, `Password:`, 1s reads.
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            terminal_setup: Vec::new(),
            privileged_suffix: "#".to_string(),
            enable_command: "enable".to_string(),
            password_prompt: "Password:".to_string(),
            secret: None,
            login_password: None,
            read_timeout: Duration::from_secs(1),
            max_password_retries: 5,
            prompt_resolver: Arc::new(EnterAndRead::new()),
        }
    }

    /// Add a fire-and-forget terminal setup command.
    pub fn terminal_setup(mut self, command: impl Into<String>) -> Self {
        self.terminal_setup.push(command.into());
        self
    }

    pub fn privileged_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.privileged_suffix = suffix.into();
        self
    }

    pub fn enable_command(mut self, command: impl Into<String>) -> Self {
        self.enable_command = command.into();
        self
    }

    pub fn password_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.password_prompt = prompt.into();
        self
    }

    /// Dedicated enable secret.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(SecretString::from(secret.into()));
        self
    }

    /// Login password, used when no secret is set or the secret is rejected.
    pub fn login_password(mut self, password: impl Into<String>) -> Self {
        self.login_password = Some(SecretString::from(password.into()));
        self
    }

    /// Set both credentials at once, keeping them boxed.
    pub fn credentials(
        mut self,
        secret: Option<SecretString>,
        login_password: Option<SecretString>,
    ) -> Self {
        self.secret = secret;
        self.login_password = login_password;
        self
    }

    /// Wait used for each read during privilege escalation.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Upper bound on blank lines sent to get past repeated password prompts.
    pub fn max_password_retries(mut self, retries: usize) -> Self {
        self.max_password_retries = retries;
        self
    }

    pub fn prompt_resolver(mut self, resolver: Arc<dyn PromptResolver>) -> Self {
        self.prompt_resolver = resolver;
        self
    }

    /// Run one state transition.
    pub async fn step(&self, state: InitState, session: &mut Session) -> Result<InitState, InitError> {
        let next = match state {
            InitState::Connected if self.terminal_setup.is_empty() => InitState::ResolvingPrompt,
            InitState::Connected => InitState::SettingTerminalOptions,

            InitState::SettingTerminalOptions => {
                send_terminal_setup(&self.device, session, &self.terminal_setup, self.read_timeout)
                    .await?;
                InitState::ResolvingPrompt
            }

            InitState::ResolvingPrompt => {
                let prompt = self.resolve_prompt(session).await?;
                self.drain_until_prompt(session, &prompt).await?;
                if self.is_privileged(&prompt) {
                    InitState::AlreadyPrivileged
                } else {
                    InitState::EnteringPrivilegedMode
                }
            }

            InitState::AlreadyPrivileged => InitState::Ready,

            InitState::EnteringPrivilegedMode => {
                self.enter_privileged_mode(session).await?;
                InitState::VerifyingPrivilegedMode
            }

            InitState::VerifyingPrivilegedMode => {
                let prompt = self.resolve_prompt(session).await?;
                if self.is_privileged(&prompt) {
                    InitState::Ready
                } else {
                    InitState::Failed(prompt)
                }
            }

            terminal @ (InitState::Ready | InitState::Failed(_)) => terminal,
        };
        Ok(next)
    }

    fn is_privileged(&self, prompt: &str) -> bool {
        prompt.trim().ends_with(&self.privileged_suffix)
    }

    async fn resolve_prompt(&self, session: &mut Session) -> Result<String, InitError> {
        self.prompt_resolver
            .resolve_prompt(session)
            .await
            .map(|prompt| prompt.trim().to_string())
            .map_err(|source| self.prompt_error(source))
    }

    /// Consume output that arrives late after prompt resolution, through
    /// the next occurrence of `prompt`. Nothing arriving in time is fine.
    async fn drain_until_prompt(&self, session: &mut Session, prompt: &str) -> Result<(), InitError> {
        match session.read_until_output(prompt, self.read_timeout).await {
            Ok(output) => {
                debug!("{}: cli session initialized output: {:?}", self.device, output);
                Ok(())
            }
            Err(e) if e.is_timeout() => {
                trace!("{}: no output after prompt resolution", self.device);
                Ok(())
            }
            Err(e) => Err(self.session_error(e)),
        }
    }

    async fn enter_privileged_mode(&self, session: &mut Session) -> Result<(), InitError> {
        session
            .write_line(&self.enable_command)
            .await
            .map_err(|e| self.session_error(e))?;
        let output = self.read(session).await?;

        if !output.ends_with(&self.password_prompt) {
            debug!(
                "{}: enable command did not result in password prompt, output: {:?}",
                self.device, output
            );
            return Ok(());
        }

        let mut output = output;
        for (attempt, password) in self.passwords()?.into_iter().enumerate() {
            if attempt > 0 {
                debug!("{}: retrying enable with login password", self.device);
            }
            session
                .write_secret(password)
                .await
                .map_err(|e| self.session_error(e))?;
            output = self.read(session).await?;

            if !output.ends_with(&self.password_prompt) {
                debug!("{}: entering enable password resulted in output: {:?}", self.device, output);
                return Ok(());
            }
            warn!("{}: specified enable password is not correct", self.device);
        }

        // Skip repeated password prompts
        let newline = session.newline().to_string();
        let mut retries = 0;
        while output.ends_with(&self.password_prompt) && retries < self.max_password_retries {
            session
                .write(&newline)
                .await
                .map_err(|e| self.session_error(e))?;
            output = self.read(session).await?;
            retries += 1;
        }
        Ok(())
    }

    /// Enable secret first, then the login password if different.
    fn passwords(&self) -> Result<Vec<&SecretString>, InitError> {
        let mut candidates: Vec<&SecretString> = Vec::new();
        if let Some(secret) = &self.secret {
            candidates.push(secret);
        }
        if let Some(password) = &self.login_password {
            let duplicate = candidates
                .iter()
                .any(|c| c.expose_secret() == password.expose_secret());
            if !duplicate {
                if candidates.is_empty() {
                    debug!("{}: secret not set, using session password as enable password", self.device);
                }
                candidates.push(password);
            }
        }

        if candidates.is_empty() {
            return Err(InitError::Credentials {
                device: self.device.clone(),
                message: "device asked for an enable password but neither a secret nor a login password is configured"
                    .to_string(),
            });
        }
        Ok(candidates)
    }

    async fn read(&self, session: &mut Session) -> Result<String, InitError> {
        session
            .read_until_timeout(self.read_timeout)
            .await
            .map(|output| output.trim().to_string())
            .map_err(|e| self.session_error(e))
    }

    fn session_error(&self, source: SessionError) -> InitError {
        InitError::Session {
            device: self.device.clone(),
            source,
        }
    }

    fn prompt_error(&self, source: PromptError) -> InitError {
        InitError::Prompt {
            device: self.device.clone(),
            source,
        }
    }
}

impl fmt::Debug for PrivilegedModeInitializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivilegedModeInitializer")
            .field("device", &self.device)
            .field("terminal_setup", &self.terminal_setup)
            .field("privileged_suffix", &self.privileged_suffix)
            .field("enable_command", &self.enable_command)
            .field("secret", &self.secret.as_ref().map(|_| "<hidden>"))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SessionInitializer for PrivilegedModeInitializer {
    async fn initialize(&self, session: &mut Session) -> Result<(), InitError> {
        let mut state = InitState::Connected;

        while !state.is_terminal() {
            debug!("{}: initializer state {:?}", self.device, state);
            state = self.step(state, session).await?;
        }

        match state {
            InitState::Failed(prompt) => {
                warn!("{}: failed to enter privileged mode, prompt {:?}", self.device, prompt);
                Err(InitError::PrivilegedModeNotReached {
                    device: self.device.clone(),
                    prompt,
                })
            }
            _ => {
                info!("{}: cli session initialized successfully", self.device);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SessionOptions;
    use crate::transport::ScriptedTransport;

    fn session(transport: ScriptedTransport) -> Session {
        Session::new("R1", Box::new(transport), SessionOptions::default())
    }

    fn initializer() -> PrivilegedModeInitializer {
        PrivilegedModeInitializer::new("R1")
            .read_timeout(Duration::from_millis(10))
            .prompt_resolver(Arc::new(
                EnterAndRead::new().with_time_unit(Duration::from_millis(5)),
            ))
    }

    #[tokio::test]
    async fn test_already_privileged_skips_enable() {
        let _ = env_logger::builder().is_test(true).try_init();
        let transport = ScriptedTransport::new()
            .with_prompt("R1#")
            .reply("\n\n", "\r\nR1#\r\nR1#");
        let log = transport.log();
        let mut session = session(transport);

        initializer()
            .terminal_setup("terminal length 0")
            .terminal_setup("terminal width 0")
            .initialize(&mut session)
            .await
            .unwrap();

        assert_eq!(log.count("enable\n"), 0);
        assert_eq!(
            log.writes(),
            vec!["terminal length 0\n", "terminal width 0\n", "\n\n"]
        );
    }

    #[tokio::test]
    async fn test_enable_with_secret() {
        let transport = ScriptedTransport::new()
            .reply("\n\n", "\r\nR1>\r\nR1>")
            .reply("\n\n", "\r\nR1#\r\nR1#")
            .reply("enable\n", "enable\r\nPassword: ")
            .reply("s3cret\n", "\r\nR1#");
        let log = transport.log();
        let mut session = session(transport);

        initializer().secret("s3cret").initialize(&mut session).await.unwrap();

        assert_eq!(log.writes(), vec!["\n\n", "enable\n", "s3cret\n", "\n\n"]);
        assert_eq!(session.prompt(), Some("R1#"));
    }

    #[tokio::test]
    async fn test_wrong_secret_then_login_password() {
        let transport = ScriptedTransport::new()
            .reply("\n\n", "\r\nR1>\r\nR1>")
            .reply("\n\n", "\r\nR1#\r\nR1#")
            .reply("enable\n", "enable\r\nPassword: ")
            .reply("wrong\n", "\r\nPassword: ")
            .reply("cisco\n", "\r\nR1#");
        let log = transport.log();
        let mut session = session(transport);

        initializer()
            .secret("wrong")
            .login_password("cisco")
            .initialize(&mut session)
            .await
            .unwrap();

        assert_eq!(
            log.writes(),
            vec!["\n\n", "enable\n", "wrong\n", "cisco\n", "\n\n"]
        );
        assert!(session.prompt().unwrap().ends_with('#'));
    }

    #[tokio::test]
    async fn test_drains_password_prompts_then_fails() {
        let transport = ScriptedTransport::new()
            .reply("\n\n", "\r\nR1>\r\nR1>")
            .reply("enable\n", "enable\r\nPassword: ")
            .reply("bad\n", "\r\nPassword: ")
            .reply("\n", "\r\nPassword: ")
            .reply("\n", "\r\n% Bad secrets\r\n\r\nR1>");
        let log = transport.log();
        let mut session = session(transport);

        let err = initializer()
            .secret("bad")
            .initialize(&mut session)
            .await
            .unwrap_err();

        assert_eq!(log.count("\n"), 2);
        match err {
            InitError::PrivilegedModeNotReached { device, prompt } => {
                assert_eq!(device, "R1");
                assert_eq!(prompt, "R1>");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let message = InitError::PrivilegedModeNotReached {
            device: "R1".into(),
            prompt: "R1>".into(),
        }
        .to_string();
        assert!(message.contains("R1") && message.contains("Current prompt: R1>"));
    }

    #[tokio::test]
    async fn test_reprompt_drained_then_privileged() {
        let transport = ScriptedTransport::new()
            .reply("\n\n", "\r\nR1>\r\nR1>")
            .reply("\n\n", "\r\nR1#\r\nR1#")
            .reply("enable\n", "enable\r\nPassword: ")
            .reply("wrong\n", "\r\nPassword: ")
            .reply("\n", "\r\nR1#");
        let log = transport.log();
        let mut session = session(transport);

        initializer().secret("wrong").initialize(&mut session).await.unwrap();

        assert_eq!(log.writes(), vec!["\n\n", "enable\n", "wrong\n", "\n", "\n\n"]);
        assert_eq!(session.prompt(), Some("R1#"));
    }

    #[tokio::test]
    async fn test_late_output_drained_before_enable() {
        let transport = ScriptedTransport::new()
            .reply("\n\n", "\r\nR1>\r\nR1>")
            .then_after(Duration::from_millis(50), "\r\n%SYS-5-CONFIG_I: Configured\r\nR1>")
            .reply("\n\n", "\r\nR1#\r\nR1#")
            .reply("enable\n", "enable\r\nPassword: ")
            .reply("s3cret\n", "\r\nR1#");
        let log = transport.log();
        let mut session = session(transport);

        PrivilegedModeInitializer::new("R1")
            .read_timeout(Duration::from_millis(200))
            .prompt_resolver(Arc::new(
                EnterAndRead::new().with_time_unit(Duration::from_millis(5)),
            ))
            .secret("s3cret")
            .initialize(&mut session)
            .await
            .unwrap();

        // The late line would otherwise land after the password prompt
        assert_eq!(log.writes(), vec!["\n\n", "enable\n", "s3cret\n", "\n\n"]);
        assert_eq!(session.prompt(), Some("R1#"));
    }

    #[tokio::test]
    async fn test_password_requested_without_credentials() {
        let transport = ScriptedTransport::new()
            .reply("\n\n", "\r\nR1>\r\nR1>")
            .reply("enable\n", "enable\r\nPassword: ");
        let mut session = session(transport);

        let err = initializer().initialize(&mut session).await.unwrap_err();
        assert!(matches!(err, InitError::Credentials { .. }));
    }

    #[tokio::test]
    async fn test_step_sequence() {
        let transport = ScriptedTransport::new().reply("\n\n", "\r\nR1#\r\nR1#");
        let mut session = session(transport);
        let init = initializer();

        let mut states = vec![InitState::Connected];
        while !states.last().unwrap().is_terminal() {
            let next = init
                .step(states.last().unwrap().clone(), &mut session)
                .await
                .unwrap();
            states.push(next);
        }

        assert_eq!(
            states,
            vec![
                InitState::Connected,
                InitState::ResolvingPrompt,
                InitState::AlreadyPrivileged,
                InitState::Ready,
            ]
        );
    }
}
