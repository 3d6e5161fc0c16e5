//! Blocking command execution over a shared session.
//!
//! [`Cli`] is what readers and writers talk to. Every call sends one
//! [`Command`] batch line by line, waiting for the device prompt after each
//! line, and holds the session for the whole batch so concurrent callers
//! never interleave.

mod command;
mod response;

use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

pub use command::Command;
pub use response::Response;

use crate::channel::{ErrorPatternSet, Session};
use crate::error::{CommandError, Error, Result, SessionError, WriteCause, WriteFailed, WriteKind};
use crate::translate::{Path, ReadContext};
use response::normalize_output;

struct Inner {
    id: String,
    session: Mutex<Session>,
    error_patterns: ErrorPatternSet,
}

/// Handle to an initialized device session.
///
/// Cloning is cheap; all clones share the session. Batches are serialized:
/// a call holds the session from its first write until the prompt after its
/// last line.
///
/// # Example
///
/// ```rust,no_run
/// # use clitrans::channel::{ErrorPatternSet, Session};
/// # use clitrans::executor::Cli;
/// # async fn example(session: Session) -> Result<(), clitrans::Error> {
/// let cli = Cli::new(session, ErrorPatternSet::from_patterns([r"% Invalid input.*"]).unwrap());
/// let version = cli.blocking_read("show version").await?;
/// println!("{}", version);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Cli {
    inner: Arc<Inner>,
    read_retries: u32,
}

impl Cli {
    /// Wrap an initialized session together with the device's error patterns.
    pub fn new(session: Session, error_patterns: ErrorPatternSet) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: session.id().to_string(),
                session: Mutex::new(session),
                error_patterns,
            }),
            read_retries: 0,
        }
    }

    /// Keep waiting this many more timeout periods for a prompt before
    /// giving up. Output is never resent; the wait simply resumes on the
    /// same buffer.
    pub fn with_read_retries(mut self, retries: u32) -> Self {
        self.read_retries = retries;
        self
    }

    /// Device identifier.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn error_patterns(&self) -> &ErrorPatternSet {
        &self.inner.error_patterns
    }

    /// Exclusive access to the session, for multi-step exchanges that do
    /// not fit the command model.
    pub async fn session(&self) -> MutexGuard<'_, Session> {
        self.inner.session.lock().await
    }

    /// Send a batch and collect the transcript.
    ///
    /// Error patterns are checked against the whole transcript once the
    /// last prompt has been seen; a match is reported in
    /// [`Response::failure`], not as an error.
    pub async fn execute(&self, command: &Command) -> std::result::Result<Response, SessionError> {
        let mut session = self.inner.session.lock().await;
        let start = Instant::now();

        debug!("{}: executing {:?}", self.inner.id, command.content());

        // One line at a time: typed-ahead input shares lines with prompts,
        // which would hide them from a line-anchored prompt pattern.
        let mut raw = String::new();
        if command.is_empty() {
            let newline = session.newline().to_string();
            session.write(&newline).await?;
            raw.push_str(&self.read_prompt(&mut session).await?);
        } else {
            for line in command.lines() {
                session.write_line(line).await?;
                raw.push_str(&self.read_prompt(&mut session).await?);
            }
        }

        let failure = self.inner.error_patterns.find(&raw);
        if let Some(hit) = &failure {
            warn!(
                "{}: device rejected {:?}: matched '{}' ({:?})",
                self.inner.id,
                command.content(),
                hit.pattern,
                hit.text
            );
        }

        Ok(Response {
            command: command.content().to_string(),
            result: normalize_output(&raw, command.lines().next()),
            prompt: session.prompt().unwrap_or_default().to_string(),
            raw_result: raw,
            elapsed: start.elapsed(),
            failure,
        })
    }

    /// Send a read command and return its output, without the command
    /// echo and trailing prompt.
    pub async fn blocking_read(&self, command: &str) -> Result<String> {
        let response = self.execute(&Command::new(command)).await?;
        match response.failure {
            Some(hit) => Err(Error::Command(CommandError {
                command: response.command,
                pattern: hit.pattern,
                output: response.raw_result,
            })),
            None => Ok(response.result),
        }
    }

    /// Like [`Cli::blocking_read`], but reuses output already read with the
    /// same command text within `ctx`.
    pub async fn blocking_read_cached(&self, command: &str, ctx: &ReadContext) -> Result<String> {
        if let Some(output) = ctx.cached(command) {
            debug!("{}: using cached output for {:?}", self.inner.id, command);
            return Ok(output);
        }
        let output = self.blocking_read(command).await?;
        ctx.store(command, &output);
        Ok(output)
    }

    /// Send a creating batch for `path`.
    pub async fn blocking_write_and_read<D>(
        &self,
        command: &Command,
        path: &Path,
        after: &D,
    ) -> std::result::Result<(), WriteFailed>
    where
        D: Serialize + ?Sized,
    {
        self.run_batch(command)
            .await
            .map_err(|cause| WriteKind::Create.failed(path, None, to_json(after), cause))
    }

    /// Send an updating batch for `path`.
    pub async fn blocking_update_and_read<D>(
        &self,
        command: &Command,
        path: &Path,
        before: &D,
        after: &D,
    ) -> std::result::Result<(), WriteFailed>
    where
        D: Serialize + ?Sized,
    {
        self.run_batch(command).await.map_err(|cause| {
            WriteKind::Update.failed(path, to_json(before), to_json(after), cause)
        })
    }

    /// Send a deleting batch for `path`.
    pub async fn blocking_delete_and_read<D>(
        &self,
        command: &Command,
        path: &Path,
        before: &D,
    ) -> std::result::Result<(), WriteFailed>
    where
        D: Serialize + ?Sized,
    {
        self.run_batch(command)
            .await
            .map_err(|cause| WriteKind::Delete.failed(path, to_json(before), None, cause))
    }

    /// Close the session. Other clones fail on their next call.
    pub async fn close(&self) -> std::result::Result<(), SessionError> {
        self.inner.session.lock().await.close().await
    }

    pub async fn is_alive(&self) -> bool {
        self.inner.session.lock().await.is_alive()
    }

    async fn run_batch(&self, command: &Command) -> std::result::Result<(), WriteCause> {
        let response = self.execute(command).await?;
        match response.failure {
            Some(hit) => Err(WriteCause::Rejected {
                command: response.command,
                pattern: hit.pattern,
                output: response.raw_result,
            }),
            None => Ok(()),
        }
    }

    async fn read_prompt(&self, session: &mut Session) -> std::result::Result<String, SessionError> {
        let mut attempt = 0;
        loop {
            match session.read_until_prompt().await {
                Err(e) if e.is_timeout() && attempt < self.read_retries => {
                    attempt += 1;
                    warn!(
                        "{}: no prompt yet, waiting again ({}/{})",
                        self.inner.id, attempt, self.read_retries
                    );
                }
                result => return result,
            }
        }
    }
}

impl std::fmt::Debug for Cli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cli")
            .field("id", &self.inner.id)
            .field("error_patterns", &self.inner.error_patterns.len())
            .field("read_retries", &self.read_retries)
            .finish()
    }
}

fn to_json<D: Serialize + ?Sized>(data: &D) -> Option<serde_json::Value> {
    serde_json::to_value(data).ok()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::channel::SessionOptions;
    use crate::transport::{ScriptedTransport, TranscriptLog};

    const IOS_ERRORS: [&str; 2] = [r"(?m)^\s+\^.*", r"% (?i)invalid input(?-i).*"];

    fn cli(transport: ScriptedTransport) -> (Cli, TranscriptLog) {
        let log = transport.log();
        let options = SessionOptions {
            timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let session = Session::new("R1", Box::new(transport), options);
        let patterns = ErrorPatternSet::from_patterns(IOS_ERRORS).unwrap();
        (Cli::new(session, patterns), log)
    }

    #[tokio::test]
    async fn test_blocking_read_strips_echo_and_prompt() {
        let (cli, log) = cli(ScriptedTransport::new().reply(
            "show ip interface brief\n",
            "show ip interface brief\r\nGi0/0  10.0.0.1  up\r\nGi0/1  unassigned  down\r\nR1#",
        ));

        let output = cli.blocking_read("show ip interface brief").await.unwrap();
        assert_eq!(output, "Gi0/0  10.0.0.1  up\r\nGi0/1  unassigned  down");
        assert_eq!(log.writes(), vec!["show ip interface brief\n"]);
    }

    #[tokio::test]
    async fn test_blocking_read_reports_device_error() {
        let (cli, _) = cli(ScriptedTransport::new().reply(
            "show bogus\n",
            "show bogus\r\n      ^\r\n% Invalid input detected at '^' marker.\r\nR1#",
        ));

        let err = cli.blocking_read("show bogus").await.unwrap_err();
        match err {
            Error::Command(err) => {
                assert_eq!(err.command, "show bogus");
                assert!(err.output.contains("Invalid input"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_batch_sent_once_in_order() {
        let (cli, log) = cli(ScriptedTransport::new().with_prompt("R1(config-if)#"));
        let path = Path::parse("/interfaces/interface[eth0]/config").unwrap();
        let command = Command::new("interface eth0\n\nmtu 1500\nshutdown\n");

        cli.blocking_write_and_read(&command, &path, &serde_json::json!({"mtu": 1500}))
            .await
            .unwrap();

        assert_eq!(
            log.writes(),
            vec!["interface eth0\n", "\n", "mtu 1500\n", "shutdown\n"]
        );
        assert_eq!(log.transcript(), "interface eth0\n\nmtu 1500\nshutdown\n");
    }

    #[tokio::test]
    async fn test_trailing_whitespace_reaches_device() {
        let (cli, log) = cli(ScriptedTransport::new().with_prompt("R1(config-if)#"));
        let path = Path::parse("/interfaces/interface[eth0]/config").unwrap();
        let command = Command::new("interface eth0\r\ndescription uplink  \r\n");

        cli.blocking_write_and_read(&command, &path, "uplink  ")
            .await
            .unwrap();

        assert_eq!(log.writes(), vec!["interface eth0\n", "description uplink  \n"]);
    }

    #[tokio::test]
    async fn test_write_rejection_keeps_command_and_output() {
        let (cli, log) = cli(ScriptedTransport::new().with_prompt("R1(config-if)#").reply(
            "mtu 99999\n",
            "mtu 99999\r\n                ^\r\n% Invalid input detected at '^' marker.\r\nR1(config-if)#",
        ));
        let path = Path::parse("/interfaces/interface[eth0]/config").unwrap();
        let command = Command::new("interface eth0\nmtu 99999\n");

        let err = cli
            .blocking_update_and_read(&command, &path, &1500, &99999)
            .await
            .unwrap_err();

        assert!(matches!(err, WriteFailed::Update { .. }));
        assert_eq!(err.path(), &path);
        let (sent, output) = err.rejection().unwrap();
        assert_eq!(sent, "interface eth0\nmtu 99999\n");
        assert!(output.contains("% Invalid input detected"));
        assert_eq!(log.writes(), vec!["interface eth0\n", "mtu 99999\n"]);
    }

    #[tokio::test]
    async fn test_empty_command_presses_enter_once() {
        let (cli, log) = cli(ScriptedTransport::new().with_prompt("saos#"));
        let path = Path::parse("/l2-cft").unwrap();

        cli.blocking_update_and_read(&Command::empty(), &path, "same", "same")
            .await
            .unwrap();

        assert_eq!(log.writes(), vec!["\n"]);
    }

    #[tokio::test]
    async fn test_cached_read_hits_device_once() {
        let (cli, log) = cli(ScriptedTransport::new().reply(
            "show running-config\n",
            "show running-config\r\nhostname R1\r\nR1#",
        ));
        let ctx = ReadContext::new();

        let first = cli.blocking_read_cached("show running-config", &ctx).await.unwrap();
        let second = cli.blocking_read_cached("show running-config", &ctx).await.unwrap();

        assert_eq!(first, "hostname R1");
        assert_eq!(first, second);
        assert_eq!(log.count("show running-config\n"), 1);
    }

    #[tokio::test]
    async fn test_timeout_then_retry_read() {
        let transport = ScriptedTransport::new().reply("show slow\n", "show slow\r\nworking");
        let (cli, _) = cli(transport);

        let err = cli.blocking_read("show slow").await.unwrap_err();
        assert!(matches!(err, Error::Session(ref e) if e.is_timeout()));

        // Partial output stays buffered for the next read.
        assert!(cli.session().await.buffered() > 0);
    }

    #[tokio::test]
    async fn test_read_retries_extend_the_wait() {
        let transport = ScriptedTransport::new().reply("show slow\n", "show slow\r\nworking");
        let (cli, _) = cli(transport);
        let cli = cli.with_read_retries(2);

        let start = std::time::Instant::now();
        let err = cli.blocking_read("show slow").await.unwrap_err();

        assert!(matches!(err, Error::Session(ref e) if e.is_timeout()));
        assert!(start.elapsed() >= Duration::from_millis(600));
    }

    #[tokio::test]
    async fn test_concurrent_batches_do_not_interleave() {
        let (cli, log) = cli(ScriptedTransport::new().with_prompt("R1(config)#"));
        let path = Path::parse("/vlans").unwrap();

        let first = cli.clone();
        let second = cli.clone();
        let a = tokio::spawn({
            let path = path.clone();
            async move {
                first
                    .blocking_write_and_read(&Command::new("vlan 10\nname ten\n"), &path, &10)
                    .await
            }
        });
        let b = tokio::spawn(async move {
            second
                .blocking_write_and_read(&Command::new("vlan 20\nname twenty\n"), &path, &20)
                .await
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let writes = log.writes();
        assert!(
            writes == ["vlan 10\n", "name ten\n", "vlan 20\n", "name twenty\n"]
                || writes == ["vlan 20\n", "name twenty\n", "vlan 10\n", "name ten\n"],
            "batches interleaved: {writes:?}"
        );
    }
}
