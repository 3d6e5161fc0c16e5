//! Builder for device connections.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use super::{CliNodeConfig, Device, HostKeyVerification};
use crate::error::{RegistryError, Result};
use crate::unit::{DeviceIdentity, UnitRegistry};

/// Builder for [`CliNodeConfig`] and [`Device`] connections.
///
/// # Example
///
/// ```rust,no_run
/// use clitrans::device::DeviceBuilder;
/// use clitrans::vendors;
///
/// # async fn example() -> Result<(), clitrans::Error> {
/// let units = vendors::registry()?;
/// let device = DeviceBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("admin")
///     .secret("enable-secret")
///     .device("ios", "15.2")
///     .connect(&units)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct DeviceBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<SecretString>,
    secret: Option<SecretString>,
    private_key: Option<(PathBuf, Option<SecretString>)>,
    identity: Option<DeviceIdentity>,
    command_timeout: Duration,
    connect_timeout: Duration,
    prompt_time_unit: Duration,
    newline: Option<String>,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
}

impl DeviceBuilder {
    /// Create a new builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: None,
            password: None,
            secret: None,
            private_key: None,
            identity: None,
            command_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(30),
            prompt_time_unit: Duration::from_secs(1),
            newline: None,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the login password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Set the privileged mode secret.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(SecretString::from(secret.into()));
        self
    }

    /// Set private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.private_key = Some((key_path.into(), None));
        self
    }

    /// Set private key authentication with passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.private_key = Some((key_path.into(), Some(SecretString::from(passphrase.into()))));
        self
    }

    /// Set the device type and version used to pick the translation unit.
    pub fn device(mut self, device_type: impl Into<String>, version: impl Into<String>) -> Self {
        self.identity = Some(DeviceIdentity::new(device_type, version));
        self
    }

    /// Set the wait for a prompt after each command line.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the base wait of prompt resolution.
    pub fn prompt_time_unit(mut self, unit: Duration) -> Self {
        self.prompt_time_unit = unit;
        self
    }

    /// Override the unit's line terminator.
    pub fn newline(mut self, newline: impl Into<String>) -> Self {
        self.newline = Some(newline.into());
        self
    }

    /// Set host key verification mode.
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Set a custom known_hosts file path.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Build the settings without connecting.
    pub fn build(self) -> std::result::Result<CliNodeConfig, RegistryError> {
        let username = self.username.ok_or_else(|| RegistryError::InvalidConfig {
            message: "Username is required".to_string(),
        })?;
        let identity = self.identity.ok_or_else(|| RegistryError::InvalidConfig {
            message: "Device type and version must be specified".to_string(),
        })?;

        let mut config = CliNodeConfig::new(self.host, username, &identity);
        config.port = self.port;
        config.password = self.password;
        config.secret = self.secret;
        if let Some((path, passphrase)) = self.private_key {
            config.private_key = Some(path);
            config.private_key_passphrase = passphrase;
        }
        config.command_timeout_secs = self.command_timeout.as_secs().max(1);
        config.connect_timeout_secs = self.connect_timeout.as_secs().max(1);
        config.prompt_time_unit_ms = u64::try_from(self.prompt_time_unit.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        config.newline = self.newline;
        config.host_key_verification = self.host_key_verification;
        config.known_hosts_path = self.known_hosts_path;
        Ok(config)
    }

    /// Build the settings and connect over SSH.
    pub async fn connect(self, units: &UnitRegistry) -> Result<Device> {
        let config = self.build()?;
        Device::connect(config, units).await
    }
}
