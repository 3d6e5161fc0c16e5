//! Device connection settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

use crate::error::RegistryError;
use crate::unit::DeviceIdentity;

fn default_port() -> u16 {
    22
}

fn default_command_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_prompt_time_unit() -> u64 {
    1000
}

fn deserialize_secret<'de, D: Deserializer<'de>>(d: D) -> Result<Option<SecretString>, D::Error> {
    Option::<String>::deserialize(d).map(|s| s.map(SecretString::from))
}

/// How the SSH server's host key is checked against known_hosts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyVerification {
    /// Unknown and changed keys both fail the connection.
    Strict,
    /// Unknown keys are learned; changed keys fail the connection.
    #[default]
    AcceptNew,
    /// Any key is accepted.
    Disabled,
}

/// Credentials a device is logged in with.
#[derive(Debug, Clone, Copy)]
pub enum Login<'a> {
    None,
    Password(&'a SecretString),
    Key {
        path: &'a Path,
        passphrase: Option<&'a SecretString>,
    },
}

/// Copy a secret without exposing it anywhere but the new box.
pub(crate) fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_string())
}

/// One CLI-managed device.
///
/// ```rust
/// use clitrans::device::CliNodeConfig;
///
/// let config = CliNodeConfig::from_json(r#"{
///     "host": "192.0.2.1",
///     "username": "admin",
///     "password": "cisco",
///     "secret": "enable-secret",
///     "device-type": "ios",
///     "device-version": "15.2"
/// }"#).unwrap();
///
/// assert_eq!(config.port, 22);
/// assert_eq!(config.identity().device_type(), "ios");
/// ```
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CliNodeConfig {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub username: String,

    /// Login password. Also used for privileged mode when no secret is set.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,

    /// Privileged mode (enable) secret.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub secret: Option<SecretString>,

    /// Private key for public key authentication.
    #[serde(default)]
    pub private_key: Option<PathBuf>,

    #[serde(default, deserialize_with = "deserialize_secret")]
    pub private_key_passphrase: Option<SecretString>,

    pub device_type: String,

    pub device_version: String,

    /// Wait for a prompt after each command line, in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Base wait of prompt resolution, in milliseconds.
    #[serde(default = "default_prompt_time_unit")]
    pub prompt_time_unit_ms: u64,

    /// Line terminator; the unit's default if unset.
    #[serde(default)]
    pub newline: Option<String>,

    #[serde(default)]
    pub host_key_verification: HostKeyVerification,

    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,
}

impl CliNodeConfig {
    /// Minimal settings for `host`; everything else at defaults.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        identity: &DeviceIdentity,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            username: username.into(),
            password: None,
            secret: None,
            private_key: None,
            private_key_passphrase: None,
            device_type: identity.device_type().to_string(),
            device_version: identity.version().to_string(),
            command_timeout_secs: default_command_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            prompt_time_unit_ms: default_prompt_time_unit(),
            newline: None,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }

    /// Parse settings from JSON.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        serde_json::from_str(json).map_err(|e| RegistryError::InvalidConfig {
            message: e.to_string(),
        })
    }

    /// Identifier used in logs: `host:port`.
    pub fn name(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(&self.device_type, &self.device_version)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn prompt_time_unit(&self) -> Duration {
        Duration::from_millis(self.prompt_time_unit_ms)
    }

    /// Login credentials. A private key wins over the password; the
    /// password then only serves privileged mode.
    pub fn login(&self) -> Login<'_> {
        match (&self.private_key, &self.password) {
            (Some(path), _) => Login::Key {
                path,
                passphrase: self.private_key_passphrase.as_ref(),
            },
            (None, Some(password)) => Login::Password(password),
            (None, None) => Login::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_defaults() {
        let config = CliNodeConfig::from_json(
            r#"{
                "host": "10.0.0.5",
                "username": "admin",
                "password": "admin",
                "device-type": "saos",
                "device-version": "6.16",
                "host-key-verification": "disabled"
            }"#,
        )
        .unwrap();

        assert_eq!(config.name(), "10.0.0.5:22");
        assert_eq!(config.command_timeout(), Duration::from_secs(30));
        assert_eq!(config.prompt_time_unit(), Duration::from_secs(1));
        assert!(config.secret.is_none());
        assert_eq!(config.host_key_verification, HostKeyVerification::Disabled);
        assert!(matches!(config.login(), Login::Password(_)));
    }

    #[test]
    fn test_secrets_not_in_debug_output() {
        let config = CliNodeConfig::from_json(
            r#"{"host": "r1", "username": "u", "password": "hunter2", "secret": "s3cr3t",
                "device-type": "ios", "device-version": "15.2"}"#,
        )
        .unwrap();

        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("s3cr3t"));
    }

    #[test]
    fn test_missing_field_is_invalid_config() {
        let err = CliNodeConfig::from_json(r#"{"host": "r1"}"#).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidConfig { .. }));
    }

    #[test]
    fn test_private_key_wins() {
        let mut config = CliNodeConfig::new("r1", "admin", &DeviceIdentity::new("junos", "18.1"));
        config.password = Some(SecretString::from("pw".to_string()));
        config.private_key = Some(PathBuf::from("/home/admin/.ssh/id_ed25519"));
        assert!(matches!(config.login(), Login::Key { passphrase: None, .. }));
    }

    #[test]
    fn test_no_credentials_logs_in_without_auth() {
        let config = CliNodeConfig::new("r1", "admin", &DeviceIdentity::new("saos", "6.16"));
        assert!(matches!(config.login(), Login::None));
        assert_eq!(config.host_key_verification, HostKeyVerification::AcceptNew);
    }
}
