//! Error types for clitrans.
//!
//! Errors are layered the same way the engine is: transport, session,
//! prompt resolution, initialization, templating, device command execution,
//! and registry wiring. Every layer folds into [`Error`].

use std::fmt;
use std::io;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::translate::Path;

/// Main error type for clitrans operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Session read/write errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Prompt could not be resolved
    #[error("Prompt resolution failed: {0}")]
    Prompt(#[from] PromptError),

    /// Session initialization failed; the session is unusable
    #[error("Session initialization failed: {0}")]
    Initialization(#[from] InitError),

    /// Command template could not be rendered
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Device rejected a read command
    #[error(transparent)]
    Command(#[from] CommandError),

    /// A reader failed
    #[error(transparent)]
    Read(#[from] ReadFailed),

    /// A writer failed
    #[error(transparent)]
    Write(Box<WriteFailed>),

    /// Handler or module registration errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl From<WriteFailed> for Error {
    fn from(err: WriteFailed) -> Self {
        Error::Write(Box::new(err))
    }
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Host is not in known_hosts and strict checking is enabled
    #[error("Host {host}:{port} is not in known_hosts")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Session errors. Fatal to the session except [`SessionError::Timeout`],
/// which leaves unread output buffered so the caller may read again.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Underlying transport failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Remote side closed the channel
    #[error("Session closed by device")]
    Closed,

    /// Expected output did not arrive in time
    #[error("Pattern '{pattern}' not seen within {waited:?}")]
    Timeout { pattern: String, waited: Duration },

    /// Prompt text could not be turned into a matcher
    #[error("Invalid prompt pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl SessionError {
    /// Whether the failed operation may be retried on the same session.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SessionError::Timeout { .. })
    }
}

/// Prompt resolution errors.
#[derive(Error, Debug)]
pub enum PromptError {
    /// No two identical prompt lines were seen within the wait window
    #[error("Unable to parse prompt in {attempts} attempts, last output from device: {last_output:?}")]
    ResolutionFailed { attempts: u32, last_output: String },

    /// Session failed while probing
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Session initialization errors. Never retried by the initializer.
#[derive(Error, Debug)]
pub enum InitError {
    /// Session failed during initialization
    #[error("{device}: Unable to initialize device: {source}")]
    Session {
        device: String,
        #[source]
        source: SessionError,
    },

    /// Prompt could not be resolved during initialization
    #[error("{device}: Unable to initialize device: {source}")]
    Prompt {
        device: String,
        #[source]
        source: PromptError,
    },

    /// Privileged mode was not reached
    #[error("{device}: cli session initialization failed to enter privileged mode. Current prompt: {prompt}")]
    PrivilegedModeNotReached { device: String, prompt: String },

    /// No usable credentials for privileged mode
    #[error("{device}: {message}")]
    Credentials { device: String, message: String },
}

/// Template parsing and rendering errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    /// Placeholder refers to a name that is not bound in the context
    #[error("Unresolved variable '${name}' at offset {offset}")]
    UnresolvedVariable { name: String, offset: usize },

    /// Substitution of a null value would emit incomplete command text
    #[error("Variable '${name}' at offset {offset} is null and cannot be substituted")]
    NullSubstitution { name: String, offset: usize },

    /// Field access on something that is not a map
    #[error("Cannot access field '{field}' of non-map value '${name}' at offset {offset}")]
    NotAMap {
        name: String,
        field: String,
        offset: usize,
    },

    /// Loop source is a scalar
    #[error("Variable '${name}' at offset {offset} is not iterable")]
    NotIterable { name: String, offset: usize },

    /// Unknown filter name
    #[error("Unknown filter '{filter}' at offset {offset}")]
    UnknownFilter { filter: String, offset: usize },

    /// Malformed directive or placeholder
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { message: String, offset: usize },

    /// Directive opened without its closing counterpart, or vice versa
    #[error("Unbalanced directive '{directive}' at offset {offset}")]
    Unbalanced { directive: String, offset: usize },

    /// Regex in a `=~` condition does not compile
    #[error("Invalid regex /{pattern}/: {message}")]
    InvalidRegex { pattern: String, message: String },
}

/// A read command whose output matched a device error pattern.
#[derive(Error, Debug)]
#[error("Command '{command}' failed on device (matched '{pattern}'): {output}")]
pub struct CommandError {
    /// The literal command sent
    pub command: String,
    /// The error pattern that matched
    pub pattern: String,
    /// Device output containing the rejection
    pub output: String,
}

/// A reader failure, carrying the path being read.
#[derive(Error, Debug)]
#[error("Read of {path} failed: {source}")]
pub struct ReadFailed {
    pub path: Path,
    #[source]
    pub source: Box<Error>,
}

impl ReadFailed {
    /// Wrap an error as a read failure for `path`.
    pub fn new(path: &Path, source: impl Into<Error>) -> Self {
        Self {
            path: path.clone(),
            source: Box::new(source.into()),
        }
    }

    /// A read failure caused by unparseable or unexpected device output.
    pub fn invalid(path: &Path, message: impl Into<String>) -> Self {
        Self::new(
            path,
            RegistryError::InvalidData {
                path: path.to_string(),
                message: message.into(),
            },
        )
    }
}

/// Why a write failed.
#[derive(Error, Debug)]
pub enum WriteCause {
    /// Device output matched an error pattern
    #[error("device rejected command:\n{command}\nmatched '{pattern}' in output:\n{output}")]
    Rejected {
        command: String,
        pattern: String,
        output: String,
    },

    /// Session failed mid-transaction
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Command could not be rendered
    #[error("{0}")]
    Template(#[from] TemplateError),

    /// Data is not acceptable for this writer
    #[error("{0}")]
    Invalid(String),

    /// A nested write failed (e.g. the delete half of delete+write)
    #[error("{0}")]
    Nested(Box<WriteFailed>),
}

/// Writer failure. Keeps the path and before/after data for diagnostics.
///
/// No rollback is performed: whatever the device applied before
/// rejecting a line of a multi-line batch stays applied.
#[derive(Error, Debug)]
pub enum WriteFailed {
    #[error("Create of {path} failed: {cause}")]
    Create {
        path: Path,
        after: Option<Value>,
        cause: WriteCause,
    },

    #[error("Update of {path} failed: {cause}")]
    Update {
        path: Path,
        before: Option<Value>,
        after: Option<Value>,
        cause: WriteCause,
    },

    #[error("Delete of {path} failed: {cause}")]
    Delete {
        path: Path,
        before: Option<Value>,
        cause: WriteCause,
    },
}

impl WriteFailed {
    /// Path of the node that failed.
    pub fn path(&self) -> &Path {
        match self {
            WriteFailed::Create { path, .. }
            | WriteFailed::Update { path, .. }
            | WriteFailed::Delete { path, .. } => path,
        }
    }

    /// The underlying cause.
    pub fn cause(&self) -> &WriteCause {
        match self {
            WriteFailed::Create { cause, .. }
            | WriteFailed::Update { cause, .. }
            | WriteFailed::Delete { cause, .. } => cause,
        }
    }

    /// The rendered command and device text, if the device rejected it.
    pub fn rejection(&self) -> Option<(&str, &str)> {
        match self.cause() {
            WriteCause::Rejected {
                command, output, ..
            } => Some((command, output)),
            WriteCause::Nested(inner) => inner.rejection(),
            _ => None,
        }
    }

    /// Re-label this failure as part of an update of `path`.
    pub fn into_update(self, before: Option<Value>, after: Option<Value>) -> Self {
        if matches!(self, WriteFailed::Update { .. }) {
            return self;
        }
        WriteFailed::Update {
            path: self.path().clone(),
            before,
            after,
            cause: WriteCause::Nested(Box::new(self)),
        }
    }
}

/// Which kind of write an operation is. Used to build the matching
/// [`WriteFailed`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Update,
    Delete,
}

impl WriteKind {
    /// Build the failure variant for this kind.
    pub fn failed(
        self,
        path: &Path,
        before: Option<Value>,
        after: Option<Value>,
        cause: WriteCause,
    ) -> WriteFailed {
        let path = path.clone();
        match self {
            WriteKind::Create => WriteFailed::Create { path, after, cause },
            WriteKind::Update => WriteFailed::Update {
                path,
                before,
                after,
                cause,
            },
            WriteKind::Delete => WriteFailed::Delete {
                path,
                before,
                cause,
            },
        }
    }
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteKind::Create => f.write_str("create"),
            WriteKind::Update => f.write_str("update"),
            WriteKind::Delete => f.write_str("delete"),
        }
    }
}

/// Registration and dispatch errors.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Two handlers registered for the same schema path
    #[error("Handler already registered for {path}")]
    DuplicateHandler { path: String },

    /// Writer ordered after a path that has no writer
    #[error("Writer for {path} is ordered after {dependency}, which has no writer")]
    UnknownDependency { path: String, dependency: String },

    /// Writer ordering constraints form a cycle
    #[error("Writer ordering cycle involving {paths:?}")]
    OrderingCycle { paths: Vec<String> },

    /// No reader registered for the path
    #[error("No reader registered for {path}")]
    NoReader { path: String },

    /// No writer registered for the path
    #[error("No writer registered for {path}")]
    NoWriter { path: String },

    /// Reader at the path is not a list reader
    #[error("Reader for {path} cannot list keys")]
    NotAList { path: String },

    /// Module with an identical identity already registered
    #[error("Module already registered for device {identity}")]
    DuplicateModule { identity: String },

    /// No module handles the device identity
    #[error("No module registered for device {identity}")]
    NoModule { identity: String },

    /// More than one module handles the device identity
    #[error("Device {identity} matched by several modules: {modules:?}")]
    AmbiguousDevice {
        identity: String,
        modules: Vec<String>,
    },

    /// Node data could not be converted to or from the handler type
    #[error("Invalid data at {path}: {message}")]
    InvalidData { path: String, message: String },

    /// Builder was not given everything it needs
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Result type alias using clitrans's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_failed_keeps_rejection() {
        let path = Path::parse("/interfaces/interface[eth0]/config").unwrap();
        let failed = WriteKind::Create.failed(
            &path,
            None,
            Some(serde_json::json!({"name": "eth0"})),
            WriteCause::Rejected {
                command: "interface eth0\nmtu 99999".to_string(),
                pattern: "% Invalid input".to_string(),
                output: "mtu 99999\n% Invalid input detected".to_string(),
            },
        );

        let (command, output) = failed.rejection().unwrap();
        assert_eq!(command, "interface eth0\nmtu 99999");
        assert!(output.contains("% Invalid input"));
        assert!(failed.to_string().contains("mtu 99999"));
    }

    #[test]
    fn test_into_update_wraps_delete() {
        let path = Path::parse("/bgp/neighbor[10.0.0.1]").unwrap();
        let delete = WriteKind::Delete.failed(
            &path,
            Some(serde_json::json!(1)),
            None,
            WriteCause::Invalid("nope".into()),
        );
        let update = delete.into_update(Some(serde_json::json!(1)), Some(serde_json::json!(2)));

        assert!(matches!(update, WriteFailed::Update { .. }));
        assert!(matches!(update.cause(), WriteCause::Nested(_)));
        assert_eq!(update.path(), &path);
    }

    #[test]
    fn test_session_timeout_is_retryable() {
        let err = SessionError::Timeout {
            pattern: "#".into(),
            waited: Duration::from_secs(1),
        };
        assert!(err.is_timeout());
        assert!(!SessionError::Closed.is_timeout());
    }
}
