//! Juniper Junos.
//!
//! Everything is read from `show configuration ... | display set`, one
//! `set` statement per line.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{InterfaceConfig, interface_name, render};
use crate::channel::ErrorPatternSet;
use crate::device::CliNodeConfig;
use crate::error::{ReadFailed, RegistryError, WriteFailed, WriteKind};
use crate::executor::Cli;
use crate::init::{SessionInitializer, TerminalSetupInitializer};
use crate::prompt::EnterAndRead;
use crate::template::{Context, Value};
use crate::translate::parsing::{parse_field_with, parse_fields};
use crate::translate::{
    CompositeMode, CompositeReader, ListReader, NoopWriter, Path, ReadContext, Reader, ReaderAdapter,
    ReaderRegistryBuilder, Writer, WriterRegistryBuilder,
};
use crate::unit::{DeviceIdentity, TranslateUnit};

static ERROR_PATTERNS: LazyLock<ErrorPatternSet> = LazyLock::new(|| {
    ErrorPatternSet::from_patterns([
        r"(?m)^\s*syntax error.*",
        r"(?m)^\s*error:.*",
        r"(?m)^\s*unknown command.*",
        r"(?m)^\s*missing argument.*",
    ])
    .expect("junos error patterns")
});

pub const SHOW_INTERFACES: &str = "show configuration interfaces | display set";

const SHOW_ROUTING_INSTANCES: &str = "show configuration routing-instances | display set";

static INTERFACE_ID_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^set interfaces (\S+)").expect("interface id pattern"));

static SUBINTERFACE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^set interfaces (?P<ifc>\S+) unit (?P<unit>\d+)").expect("subinterface pattern")
});

static INET_ADDRESS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"family inet address (?P<ip>\d+\.\d+\.\d+\.\d+)/(?P<prefix>\d+)").expect("inet address pattern")
});

static INSTANCE_TYPE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^set routing-instances (?P<name>\S+) instance-type (?P<type>\S+)").expect("instance type pattern")
});

/// Interface ids from `show configuration interfaces | display set`.
pub fn parse_interface_ids(output: &str) -> Vec<String> {
    parse_fields(output, &INTERFACE_ID_LINE)
}

/// Unit numbers of `ifc`, in configuration order.
pub fn parse_subinterface_ids(output: &str, ifc: &str) -> Vec<u32> {
    let mut ids: Vec<u32> = Vec::new();
    for line in output.lines().map(str::trim) {
        let Some(caps) = SUBINTERFACE_LINE.captures(line) else {
            continue;
        };
        if &caps["ifc"] != ifc {
            continue;
        }
        if let Ok(unit) = caps["unit"].parse() {
            if !ids.contains(&unit) {
                ids.push(unit);
            }
        }
    }
    ids
}

/// Key of an interface list item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceKey {
    pub name: String,
}

/// Lists `/interfaces/interface`.
pub struct InterfaceReader {
    cli: Cli,
}

impl InterfaceReader {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl Reader for InterfaceReader {
    type Data = InterfaceKey;

    async fn read_current_attributes(
        &self,
        path: &Path,
        ctx: &ReadContext,
    ) -> Result<Option<InterfaceKey>, ReadFailed> {
        let name = interface_name(path);
        let ids = self.get_all_ids(path, ctx).await?;
        Ok(ids.iter().any(|id| id == name).then(|| InterfaceKey {
            name: name.to_string(),
        }))
    }
}

#[async_trait]
impl ListReader for InterfaceReader {
    async fn get_all_ids(&self, path: &Path, ctx: &ReadContext) -> Result<Vec<String>, ReadFailed> {
        let output = self
            .cli
            .blocking_read_cached(SHOW_INTERFACES, ctx)
            .await
            .map_err(|e| ReadFailed::new(path, e))?;
        Ok(parse_interface_ids(&output))
    }
}

/// Key of a subinterface list item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubinterfaceKey {
    pub index: u32,
}

/// Lists `/interfaces/interface/subinterfaces/subinterface`: the units
/// configured under the parent interface.
pub struct SubinterfaceReader {
    cli: Cli,
}

impl SubinterfaceReader {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl Reader for SubinterfaceReader {
    type Data = SubinterfaceKey;

    async fn read_current_attributes(
        &self,
        path: &Path,
        _ctx: &ReadContext,
    ) -> Result<Option<SubinterfaceKey>, ReadFailed> {
        let index = path
            .first_key_of("subinterface")
            .and_then(|key| key.parse().ok())
            .ok_or_else(|| ReadFailed::invalid(path, "subinterface key is not a unit number"))?;
        Ok(Some(SubinterfaceKey { index }))
    }
}

#[async_trait]
impl ListReader for SubinterfaceReader {
    async fn get_all_ids(&self, path: &Path, ctx: &ReadContext) -> Result<Vec<String>, ReadFailed> {
        let output = self
            .cli
            .blocking_read_cached(SHOW_INTERFACES, ctx)
            .await
            .map_err(|e| ReadFailed::new(path, e))?;
        Ok(parse_subinterface_ids(&output, interface_name(path))
            .into_iter()
            .map(|unit| unit.to_string())
            .collect())
    }
}

/// IPv4 address of a subinterface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Ipv4Config {
    pub ip: String,
    pub prefix_length: u8,
}

/// Reads `/interfaces/interface/subinterfaces/subinterface/ipv4/config`.
pub struct Ipv4ConfigReader {
    cli: Cli,
}

impl Ipv4ConfigReader {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    fn parse(output: &str) -> Option<Ipv4Config> {
        parse_field_with(output, &INET_ADDRESS_LINE, |caps| {
            Some(Ipv4Config {
                ip: caps["ip"].to_string(),
                prefix_length: caps["prefix"].parse().ok()?,
            })
        })
    }
}

#[async_trait]
impl Reader for Ipv4ConfigReader {
    type Data = Ipv4Config;

    async fn read_current_attributes(
        &self,
        path: &Path,
        ctx: &ReadContext,
    ) -> Result<Option<Ipv4Config>, ReadFailed> {
        let command = format!(
            "show configuration interfaces {} unit {} family inet | display set",
            interface_name(path),
            path.first_key_of("subinterface").unwrap_or_default()
        );
        let output = self
            .cli
            .blocking_read_cached(&command, ctx)
            .await
            .map_err(|e| ReadFailed::new(path, e))?;
        Ok(Self::parse(&output))
    }
}

/// Network instance type and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInstanceConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub instance_type: String,
}

fn instance_name(path: &Path) -> &str {
    path.first_key_of("network-instance").unwrap_or_default()
}

/// The `default` instance always exists; nothing to ask the device.
pub struct DefaultConfigReader;

#[async_trait]
impl Reader for DefaultConfigReader {
    type Data = NetworkInstanceConfig;

    fn applies_to(&self, path: &Path) -> bool {
        instance_name(path) == "default"
    }

    async fn read_current_attributes(
        &self,
        _path: &Path,
        _ctx: &ReadContext,
    ) -> Result<Option<NetworkInstanceConfig>, ReadFailed> {
        Ok(Some(NetworkInstanceConfig {
            name: "default".to_string(),
            instance_type: "DEFAULT_INSTANCE".to_string(),
        }))
    }
}

/// Routing instances of type `virtual-router` or `vrf`.
pub struct L3VrfConfigReader {
    cli: Cli,
}

impl L3VrfConfigReader {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// `(name, instance-type)` of every routing instance.
    fn parse(output: &str) -> Vec<(String, String)> {
        output
            .lines()
            .map(str::trim)
            .filter_map(|line| INSTANCE_TYPE_LINE.captures(line))
            .map(|caps| (caps["name"].to_string(), caps["type"].to_string()))
            .collect()
    }

    async fn instances(&self, path: &Path, ctx: &ReadContext) -> Result<Vec<(String, String)>, ReadFailed> {
        let output = self
            .cli
            .blocking_read_cached(SHOW_ROUTING_INSTANCES, ctx)
            .await
            .map_err(|e| ReadFailed::new(path, e))?;
        Ok(Self::parse(&output))
    }
}

fn is_l3vrf(instance_type: &str) -> bool {
    matches!(instance_type, "virtual-router" | "vrf")
}

#[async_trait]
impl Reader for L3VrfConfigReader {
    type Data = NetworkInstanceConfig;

    fn applies_to(&self, path: &Path) -> bool {
        let name = instance_name(path);
        !name.is_empty() && name != "default"
    }

    async fn read_current_attributes(
        &self,
        path: &Path,
        ctx: &ReadContext,
    ) -> Result<Option<NetworkInstanceConfig>, ReadFailed> {
        let name = instance_name(path);
        let found = self
            .instances(path, ctx)
            .await?
            .into_iter()
            .any(|(instance, kind)| instance == name && is_l3vrf(&kind));
        Ok(found.then(|| NetworkInstanceConfig {
            name: name.to_string(),
            instance_type: "L3VRF".to_string(),
        }))
    }
}

/// Key of a network instance list item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInstanceKey {
    pub name: String,
}

/// Lists `/network-instances/network-instance`: `default` plus every L3
/// routing instance.
pub struct NetworkInstanceReader {
    vrfs: L3VrfConfigReader,
}

impl NetworkInstanceReader {
    pub fn new(cli: Cli) -> Self {
        Self {
            vrfs: L3VrfConfigReader::new(cli),
        }
    }
}

#[async_trait]
impl Reader for NetworkInstanceReader {
    type Data = NetworkInstanceKey;

    async fn read_current_attributes(
        &self,
        path: &Path,
        ctx: &ReadContext,
    ) -> Result<Option<NetworkInstanceKey>, ReadFailed> {
        let name = instance_name(path);
        let ids = self.get_all_ids(path, ctx).await?;
        Ok(ids.iter().any(|id| id == name).then(|| NetworkInstanceKey {
            name: name.to_string(),
        }))
    }
}

#[async_trait]
impl ListReader for NetworkInstanceReader {
    async fn get_all_ids(&self, path: &Path, ctx: &ReadContext) -> Result<Vec<String>, ReadFailed> {
        let mut ids = vec!["default".to_string()];
        ids.extend(
            self.vrfs
                .instances(path, ctx)
                .await?
                .into_iter()
                .filter(|(_, kind)| is_l3vrf(kind))
                .map(|(name, _)| name),
        );
        Ok(ids)
    }
}

/// Config reader for `/network-instances/network-instance/config`.
pub fn network_instance_config_reader(cli: &Cli) -> CompositeReader {
    CompositeReader::new(CompositeMode::FirstApplicable)
        .with(ReaderAdapter(DefaultConfigReader))
        .with(ReaderAdapter(L3VrfConfigReader::new(cli.clone())))
}

const INTERFACE_WRITE: &str = "configure\n\
    {% if ($desc) %}set interfaces {$name} description \"{$desc}\"\n{% elseIf ($before_desc) %}delete interfaces {$name} description\n{% endif %}\
    {% if ($mtu) %}set interfaces {$name} mtu {$mtu}\n{% elseIf ($before_mtu) %}delete interfaces {$name} mtu\n{% endif %}\
    {% if ($shutdown) %}set interfaces {$name} disable\n{% elseIf ($before_shutdown) %}delete interfaces {$name} disable\n{% endif %}\
    commit\n\
    exit";

const INTERFACE_DELETE: &str = "configure\n\
    delete interfaces {$name}\n\
    commit\n\
    exit";

/// Writes `/interfaces/interface/config` in configuration mode, committing
/// each change.
pub struct InterfaceConfigWriter {
    cli: Cli,
}

impl InterfaceConfigWriter {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    fn context(after: &InterfaceConfig, before: Option<&InterfaceConfig>) -> Context {
        Context::new()
            .insert("name", &after.name)
            .insert("desc", after.description.as_ref())
            .insert("mtu", after.mtu)
            .insert("shutdown", Value::flag(after.is_shutdown()))
            .insert("before_desc", before.and_then(|b| b.description.as_ref()))
            .insert("before_mtu", before.and_then(|b| b.mtu))
            .insert("before_shutdown", Value::flag(before.is_some_and(InterfaceConfig::is_shutdown)))
    }
}

#[async_trait]
impl Writer for InterfaceConfigWriter {
    type Data = InterfaceConfig;

    async fn write_current_attributes(&self, path: &Path, after: &InterfaceConfig) -> Result<(), WriteFailed> {
        let command = render(WriteKind::Create, path, INTERFACE_WRITE, &Self::context(after, None))?;
        self.cli.blocking_write_and_read(&command, path, after).await
    }

    async fn update_current_attributes(
        &self,
        path: &Path,
        before: &InterfaceConfig,
        after: &InterfaceConfig,
    ) -> Result<(), WriteFailed> {
        let command = render(
            WriteKind::Update,
            path,
            INTERFACE_WRITE,
            &Self::context(after, Some(before)),
        )?;
        self.cli.blocking_update_and_read(&command, path, before, after).await
    }

    async fn delete_current_attributes(&self, path: &Path, before: &InterfaceConfig) -> Result<(), WriteFailed> {
        let ctx = Context::new().insert("name", &before.name);
        let command = render(WriteKind::Delete, path, INTERFACE_DELETE, &ctx)?;
        self.cli.blocking_delete_and_read(&command, path, before).await
    }
}

/// Junos, any version.
#[derive(Debug, Clone, Copy, Default)]
pub struct JunosUnit;

impl TranslateUnit for JunosUnit {
    fn name(&self) -> &str {
        "junos"
    }

    fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new("junos", "*")
    }

    fn initializer(&self, config: &CliNodeConfig) -> Box<dyn SessionInitializer> {
        Box::new(
            TerminalSetupInitializer::new(config.name())
                .read_timeout(config.prompt_time_unit())
                .command("set cli screen-length 0")
                .command("set cli screen-width 0")
                .prompt_resolver(Arc::new(
                    EnterAndRead::junos().with_time_unit(config.prompt_time_unit()),
                )),
        )
    }

    fn error_patterns(&self) -> ErrorPatternSet {
        ERROR_PATTERNS.clone()
    }

    fn provide_handlers(
        &self,
        cli: &Cli,
        readers: &mut ReaderRegistryBuilder,
        writers: &mut WriterRegistryBuilder,
    ) -> Result<(), RegistryError> {
        readers
            .add_list("/interfaces/interface", InterfaceReader::new(cli.clone()))?
            .add_list(
                "/interfaces/interface/subinterfaces/subinterface",
                SubinterfaceReader::new(cli.clone()),
            )?
            .add(
                "/interfaces/interface/subinterfaces/subinterface/ipv4/config",
                Ipv4ConfigReader::new(cli.clone()),
            )?
            .add_list("/network-instances/network-instance", NetworkInstanceReader::new(cli.clone()))?
            .add_node(
                "/network-instances/network-instance/config",
                network_instance_config_reader(cli),
            )?;

        writers
            .add_node("/interfaces/interface", NoopWriter)?
            .add("/interfaces/interface/config", InterfaceConfigWriter::new(cli.clone()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::transport::{ScriptedTransport, TranscriptLog};
    use crate::translate::{ListReaderAdapter, NodeReader, NodeWriter, WriterAdapter};
    use crate::vendors::testing;

    const SHOW_INTERFACES_OUTPUT: &str = "\
set interfaces ge-0/0/3 description \"to core\"
set interfaces ge-0/0/3 unit 0 family inet address 10.11.12.13/16
set interfaces ge-0/0/3 unit 5 vlan-id 5
set interfaces ge-0/0/4 disable
set interfaces ge-0/0/4 unit 0 family inet
set interfaces ge-0/0/30 unit 7 vlan-id 7
";

    const ROUTING_INSTANCES: &str = "\
set routing-instances CUST-A instance-type virtual-router
set routing-instances CUST-A interface ge-0/0/3.5
set routing-instances MGMT instance-type virtual-router
set routing-instances L2-ONLY instance-type virtual-switch
";

    fn reply(command: &str, output: &str) -> ScriptedTransport {
        ScriptedTransport::new().with_prompt("admin@vmx>").reply(
            format!("{}\n", command),
            format!("{}\r\n{}admin@vmx> ", command, output.replace('\n', "\r\n")),
        )
    }

    fn cli(transport: ScriptedTransport) -> (Cli, TranscriptLog) {
        testing::cli(transport, JunosUnit.error_patterns())
    }

    #[test]
    fn test_parse_ids() {
        assert_eq!(
            parse_interface_ids(SHOW_INTERFACES_OUTPUT),
            vec!["ge-0/0/3", "ge-0/0/4", "ge-0/0/30"]
        );
        assert_eq!(parse_subinterface_ids(SHOW_INTERFACES_OUTPUT, "ge-0/0/3"), vec![0, 5]);
        assert_eq!(parse_subinterface_ids(SHOW_INTERFACES_OUTPUT, "ge-0/0/30"), vec![7]);
        assert!(parse_subinterface_ids(SHOW_INTERFACES_OUTPUT, "ge-0/0/9").is_empty());
    }

    #[test]
    fn test_parse_ipv4() {
        assert_eq!(
            Ipv4ConfigReader::parse(
                "set interfaces ge-0/0/3 unit 0 family inet address 10.11.12.13/16"
            ),
            Some(Ipv4Config {
                ip: "10.11.12.13".into(),
                prefix_length: 16
            })
        );
        assert_eq!(Ipv4ConfigReader::parse("set interfaces ge-0/0/4 unit 0 family inet"), None);
    }

    #[tokio::test]
    async fn test_subinterface_ids_share_interface_listing() {
        let (cli, log) = cli(reply(SHOW_INTERFACES, SHOW_INTERFACES_OUTPUT));
        let interfaces = ListReaderAdapter(InterfaceReader::new(cli.clone()));
        let subinterfaces = ListReaderAdapter(SubinterfaceReader::new(cli));
        let ctx = ReadContext::new();

        let ids = interfaces
            .list_ids(&Path::parse("/interfaces/interface").unwrap(), &ctx)
            .await
            .unwrap();
        assert_eq!(ids.map(|ids| ids.len()), Some(3));

        let units = subinterfaces
            .list_ids(
                &Path::parse("/interfaces/interface[ge-0/0/3]/subinterfaces/subinterface").unwrap(),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(units, Some(vec!["0".to_string(), "5".to_string()]));

        assert_eq!(log.count(&format!("{}\n", SHOW_INTERFACES)), 1);
    }

    #[tokio::test]
    async fn test_network_instance_config_composite() {
        let (cli, log) = cli(reply(SHOW_ROUTING_INSTANCES, ROUTING_INSTANCES));
        let reader = network_instance_config_reader(&cli);
        let ctx = ReadContext::new();

        let default = reader
            .read(&Path::parse("/network-instances/network-instance[default]/config").unwrap(), &ctx)
            .await
            .unwrap();
        assert_eq!(default, Some(json!({"name": "default", "type": "DEFAULT_INSTANCE"})));
        assert!(log.writes().is_empty());

        let vrf = reader
            .read(&Path::parse("/network-instances/network-instance[CUST-A]/config").unwrap(), &ctx)
            .await
            .unwrap();
        assert_eq!(vrf, Some(json!({"name": "CUST-A", "type": "L3VRF"})));

        let switch = reader
            .read(&Path::parse("/network-instances/network-instance[L2-ONLY]/config").unwrap(), &ctx)
            .await
            .unwrap();
        assert_eq!(switch, None);

        let instances = ListReaderAdapter(NetworkInstanceReader::new(cli))
            .list_ids(&Path::parse("/network-instances/network-instance").unwrap(), &ctx)
            .await
            .unwrap();
        assert_eq!(
            instances,
            Some(vec!["default".to_string(), "CUST-A".to_string(), "MGMT".to_string()])
        );
        assert_eq!(log.count(&format!("{}\n", SHOW_ROUTING_INSTANCES)), 1);
    }

    #[tokio::test]
    async fn test_update_interface_commits_changes() {
        let (cli, log) = cli(ScriptedTransport::new().with_prompt("admin@vmx#"));
        let writer = WriterAdapter(InterfaceConfigWriter::new(cli));
        let path = Path::parse("/interfaces/interface[ge-0/0/4]/config").unwrap();

        writer
            .update(
                &path,
                &json!({"name": "ge-0/0/4", "mtu": 9192, "enabled": false}),
                &json!({"name": "ge-0/0/4", "description": "spare"}),
            )
            .await
            .unwrap();

        assert_eq!(
            log.writes(),
            vec![
                "configure\n",
                "set interfaces ge-0/0/4 description \"spare\"\n",
                "delete interfaces ge-0/0/4 mtu\n",
                "delete interfaces ge-0/0/4 disable\n",
                "commit\n",
                "exit\n"
            ]
        );
    }

    #[tokio::test]
    async fn test_syntax_error_rejects_write() {
        let transport = ScriptedTransport::new().with_prompt("admin@vmx#").reply(
            "set interfaces ge-0/0/4 mtu 10000\n",
            "set interfaces ge-0/0/4 mtu 10000\r\nerror: Value 10000 is not within range (256..9216)\r\nadmin@vmx#",
        );
        let (cli, log) = cli(transport);
        let writer = WriterAdapter(InterfaceConfigWriter::new(cli));
        let path = Path::parse("/interfaces/interface[ge-0/0/4]/config").unwrap();

        let err = writer
            .write(&path, &json!({"name": "ge-0/0/4", "mtu": 10000}))
            .await
            .unwrap_err();

        assert!(matches!(err, WriteFailed::Create { .. }));
        assert!(err.rejection().unwrap().1.contains("not within range"));
        assert_eq!(log.count("commit\n"), 1);
    }
}
