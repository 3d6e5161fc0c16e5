//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, trace, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;

use super::Transport;
use crate::device::{CliNodeConfig, HostKeyVerification, Login};
use crate::error::TransportError;

/// Wide enough that devices do not wrap long configuration lines.
const TERMINAL_WIDTH: u32 = 511;
const TERMINAL_HEIGHT: u32 = 24;

/// SSH transport wrapping a russh client session and one interactive
/// PTY shell channel.
pub struct SshTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// Interactive shell channel.
    channel: Channel<Msg>,

    /// `host:port`, for logs.
    name: String,

    /// Set once the remote closed the channel.
    eof: bool,
}

impl SshTransport {
    /// Connect to the device in `config`, log in, and open a PTY shell.
    pub async fn connect(config: &CliNodeConfig) -> Result<Self, TransportError> {
        let name = config.name();
        let timeout = config.connect_timeout();
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: Some(timeout),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification,
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("{}: connecting", name);

        let mut session = tokio::time::timeout(
            timeout,
            client::connect(ssh_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(timeout))?
        .map_err(|e| {
            // If check_server_key stored a detailed error, use that instead
            // of the generic russh::Error::UnknownKey
            let stored = host_key_error.lock().ok().and_then(|mut slot| slot.take());
            stored.unwrap_or(TransportError::Ssh(e))
        })?;

        Self::authenticate(&mut session, &config.username, config.login()).await?;

        let channel = Self::open_shell(&session).await?;

        debug!("{}: shell channel open", name);

        Ok(Self {
            session,
            channel,
            name,
            eof: false,
        })
    }

    /// Open a PTY channel and request a shell.
    async fn open_shell(session: &Handle<SshHandler>) -> Result<Channel<Msg>, TransportError> {
        let channel = session.channel_open_session().await?;

        channel
            .request_pty(true, "xterm", TERMINAL_WIDTH, TERMINAL_HEIGHT, 0, 0, &[])
            .await?;

        channel.request_shell(true).await?;

        Ok(channel)
    }

    async fn authenticate(
        session: &mut Handle<SshHandler>,
        username: &str,
        login: Login<'_>,
    ) -> Result<(), TransportError> {
        let success = match login {
            Login::None => session.authenticate_none(username).await?.success(),
            Login::Password(password) => session
                .authenticate_password(username, password.expose_secret())
                .await?
                .success(),
            Login::Key { path, passphrase } => {
                let key = load_secret_key(path, passphrase.map(|p| p.expose_secret()))
                    .map_err(|e| TransportError::Key(e.to_string()))?;

                // Get the best RSA hash algorithm supported by the server
                let hash_alg = session.best_supported_rsa_hash().await?.flatten();

                session
                    .authenticate_publickey(
                        username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await?
                    .success()
            }
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: username.to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.eof {
            return Err(TransportError::Disconnected);
        }
        self.channel.data(data).await?;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.eof {
            return Ok(None);
        }

        // Channel::wait pulls from an mpsc receiver, so dropping this
        // future on timeout never loses a message.
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Data { data }) => return Ok(Some(data.to_vec())),
                Some(ChannelMsg::ExtendedData { data, .. }) => return Ok(Some(data.to_vec())),
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    debug!("{}: channel closed by remote", self.name);
                    self.eof = true;
                    return Ok(None);
                }
                Some(other) => {
                    trace!("{}: ignoring channel message {:?}", self.name, other);
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.eof {
            if let Err(e) = self.channel.close().await {
                warn!("{}: closing channel failed: {}", self.name, e);
            }
            self.eof = true;
        }
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }

    fn is_alive(&self) -> bool {
        !self.eof && !self.session.is_closed()
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so connect() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found,
    /// `Err(TransportError::HostKeyChanged)` if key changed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, err: TransportError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(err);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        match self.host_key_verification {
            HostKeyVerification::Disabled => Ok(true),

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    // Unknown host: learn the key
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key: {}", e);
                    }
                    Ok(true)
                }
                Err(e) => Ok(self.reject(e)),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => Ok(self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                })),
                Err(e) => Ok(self.reject(e)),
            },
        }
    }
}
