//! Device sessions: connect, initialize, bind handlers.
//!
//! A [`Device`] owns one initialized session and the reader/writer
//! registries its translation unit bound to it. Devices are independent;
//! many can be driven in parallel.

mod builder;
mod config;

pub use builder::DeviceBuilder;
pub use config::{CliNodeConfig, HostKeyVerification, Login};
pub(crate) use config::copy_secret;

use std::sync::Arc;

use log::{info, warn};
use serde_json::Value;

use crate::channel::{Session, SessionOptions};
use crate::error::Result;
use crate::executor::Cli;
use crate::transport::{SshTransport, Transport};
use crate::translate::{
    Modification, Path, ReadContext, ReaderRegistry, ReaderRegistryBuilder, WriterRegistry,
    WriterRegistryBuilder,
};
use crate::unit::{DeviceIdentity, TranslateUnit, UnitRegistry};

/// An initialized device session with its handlers.
pub struct Device {
    name: String,
    identity: DeviceIdentity,
    unit: Arc<dyn TranslateUnit>,
    cli: Cli,
    readers: ReaderRegistry,
    writers: WriterRegistry,
}

impl Device {
    /// Connect over SSH, then [`open_with`](Self::open_with).
    pub async fn connect(config: CliNodeConfig, units: &UnitRegistry) -> Result<Device> {
        // Fail on unknown devices before dialing
        units.find(&config.identity())?;
        let transport = SshTransport::connect(&config).await?;
        Self::open_with(&config, Box::new(transport), units).await
    }

    /// Initialize a session over an open `transport` and bind the handlers
    /// of the unit matching `config`'s identity.
    pub async fn open_with(
        config: &CliNodeConfig,
        transport: Box<dyn Transport>,
        units: &UnitRegistry,
    ) -> Result<Device> {
        let identity = config.identity();
        let unit = units.find(&identity)?;
        let name = config.name();

        let options = SessionOptions {
            timeout: config.command_timeout(),
            newline: config
                .newline
                .clone()
                .unwrap_or_else(|| unit.newline().to_string()),
            ..Default::default()
        };
        let mut session = Session::new(name.clone(), transport, options);
        if let Err(e) = unit.initializer(config).initialize(&mut session).await {
            if let Err(close_err) = session.close().await {
                warn!("{}: failed to close session: {}", name, close_err);
            }
            return Err(e.into());
        }

        let cli = Cli::new(session, unit.error_patterns());
        let (readers, writers) = match Self::bind_handlers(unit.as_ref(), &cli) {
            Ok(handlers) => handlers,
            Err(e) => {
                if let Err(close_err) = cli.close().await {
                    warn!("{}: failed to close session: {}", name, close_err);
                }
                return Err(e);
            }
        };

        info!(
            "{}: ready as {} ({} readers, {} writers)",
            name,
            unit.name(),
            readers.len(),
            writers.len()
        );
        Ok(Device {
            name,
            identity,
            unit,
            cli,
            readers,
            writers,
        })
    }

    fn bind_handlers(
        unit: &dyn TranslateUnit,
        cli: &Cli,
    ) -> Result<(ReaderRegistry, WriterRegistry)> {
        let mut readers = ReaderRegistryBuilder::new();
        let mut writers = WriterRegistryBuilder::new();
        unit.provide_handlers(cli, &mut readers, &mut writers)?;
        Ok((readers.build(), writers.build()?))
    }

    /// `host:port` of the device.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Name of the translation unit handling the device.
    pub fn unit_name(&self) -> &str {
        self.unit.name()
    }

    /// The shared command executor.
    pub fn cli(&self) -> &Cli {
        &self.cli
    }

    pub fn readers(&self) -> &ReaderRegistry {
        &self.readers
    }

    pub fn writers(&self) -> &WriterRegistry {
        &self.writers
    }

    /// Read one node.
    pub async fn read(&self, path: &Path) -> Result<Option<Value>> {
        self.readers.read(path, &ReadContext::new()).await
    }

    /// Read one node within `ctx`, sharing its command cache.
    pub async fn read_with(&self, path: &Path, ctx: &ReadContext) -> Result<Option<Value>> {
        self.readers.read(path, ctx).await
    }

    /// Keys of the list at `path`.
    pub async fn list_ids(&self, path: &Path) -> Result<Vec<String>> {
        self.readers.list_ids(path, &ReadContext::new()).await
    }

    /// Read every item of the list at `path`.
    pub async fn read_all(&self, path: &Path) -> Result<Vec<(Path, Value)>> {
        self.readers.read_all(path, &ReadContext::new()).await
    }

    /// Apply node changes in writer order.
    pub async fn apply(&self, modifications: Vec<Modification>) -> Result<Vec<Path>> {
        self.writers.apply(modifications).await
    }

    /// Close the session.
    pub async fn close(self) -> Result<()> {
        info!("{}: closing", self.name);
        self.cli.close().await?;
        Ok(())
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("identity", &self.identity)
            .field("unit", &self.unit.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::error::{Error, InitError};
    use crate::transport::ScriptedTransport;
    use crate::vendors;

    fn config(device_type: &str, version: &str) -> CliNodeConfig {
        DeviceBuilder::new("10.0.0.1")
            .username("admin")
            .password("admin")
            .device(device_type, version)
            .prompt_time_unit(Duration::from_millis(5))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_and_apply_cubro_interface() {
        let units = vendors::registry().unwrap();
        let transport = ScriptedTransport::new()
            .with_banner("Welcome\r\ncubro#")
            .with_prompt("cubro#");
        let log = transport.log();

        let device = Device::open_with(&config("cubro", "3.1"), Box::new(transport), &units)
            .await
            .unwrap();
        assert_eq!(device.unit_name(), "cubro");
        assert!(device.writers().len() >= 2);

        let interface = Path::parse("/interfaces/interface[eth0]").unwrap();
        let written = device
            .apply(vec![
                Modification::create(
                    interface.clone().child("config"),
                    json!({"name": "eth0", "mtu": 1500, "enabled": false}),
                ),
                Modification::create(interface.clone(), json!({"name": "eth0"})),
            ])
            .await
            .unwrap();
        assert_eq!(written.len(), 2);

        let writes = log.writes();
        let enters = writes
            .iter()
            .rposition(|w| w == "\n\n")
            .expect("prompt detection");
        assert_eq!(
            &writes[enters + 1..],
            &["interface eth0\n", "mtu 1500\n", "shutdown\n"]
        );

        device.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_all_junos_network_instances() {
        let units = vendors::registry().unwrap();
        let transport = ScriptedTransport::new()
            .with_prompt("admin@vmx>")
            .reply(
                "show configuration routing-instances | display set\n",
                "show configuration routing-instances | display set\r\n\
                 set routing-instances CUST-A instance-type virtual-router\r\n\
                 set routing-instances L2 instance-type virtual-switch\r\n\
                 admin@vmx> ",
            );
        let log = transport.log();

        let device = Device::open_with(&config("junos", "17.3"), Box::new(transport), &units)
            .await
            .unwrap();
        assert!(log.count("set cli screen-length 0\n") == 1);

        let instances = device
            .read_all(&Path::parse("/network-instances/network-instance").unwrap())
            .await
            .unwrap();
        let keys: Vec<_> = instances
            .iter()
            .filter_map(|(path, _)| path.first_key_of("network-instance"))
            .collect();
        assert_eq!(keys, vec!["default", "CUST-A"]);

        let vrf = device
            .read(&Path::parse("/network-instances/network-instance[CUST-A]/config").unwrap())
            .await
            .unwrap();
        assert_eq!(vrf, Some(json!({"name": "CUST-A", "type": "L3VRF"})));
    }

    #[tokio::test]
    async fn test_failed_init_closes_session() {
        let units = vendors::registry().unwrap();
        let transport = ScriptedTransport::new()
            .reply("\n\n", "\r\nR1>\r\nR1>")
            .reply("enable\n", "enable\r\n% Access denied\r\nR1>");
        let log = transport.log();

        let err = Device::open_with(&config("ios", "15.2"), Box::new(transport), &units)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Initialization(InitError::PrivilegedModeNotReached { .. })
        ));
        assert_eq!(log.count("enable\n"), 1);
        assert!(log.is_closed());
    }

    #[tokio::test]
    async fn test_unknown_device_is_rejected() {
        let units = vendors::registry().unwrap();
        let transport = ScriptedTransport::new().with_prompt("sw#");
        let log = transport.log();

        let err = Device::open_with(&config("nxos", "9.3"), Box::new(transport), &units)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Registry(_)));
        assert!(log.writes().is_empty());
    }
}
