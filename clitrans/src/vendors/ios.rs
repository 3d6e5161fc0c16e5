//! Cisco IOS.
//!
//! Sessions are escalated to privileged mode with `enable`. Interface
//! config and state are scraped from `show running-config interface` and
//! `show interface`; the BGP neighbor writer renders a whole neighbor
//! subtree, including per address-family settings, in one batch.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use indexmap::IndexMap;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{InterfaceConfig, interface_name, render};
use crate::channel::ErrorPatternSet;
use crate::device::{CliNodeConfig, copy_secret};
use crate::error::{ReadFailed, RegistryError, WriteCause, WriteFailed, WriteKind};
use crate::executor::{Cli, Command};
use crate::init::{PrivilegedModeInitializer, SessionInitializer};
use crate::prompt::EnterAndRead;
use crate::template::{Context, Value};
use crate::translate::parsing::{parse_field, parse_field_with, parse_fields};
use crate::translate::{
    ListReader, NoopWriter, Path, ReadContext, ReadKind, Reader, ReaderRegistryBuilder, Writer,
    WriterRegistryBuilder, check_unsupported,
};
use crate::unit::{DeviceIdentity, TranslateUnit};

static ERROR_PATTERNS: LazyLock<ErrorPatternSet> = LazyLock::new(|| {
    ErrorPatternSet::from_patterns([
        r"(?m)^\s+\^.*",
        r"% (?i)invalid input(?-i).*",
        r"% (?i)Incomplete command(?-i).*",
        r"% (?i)Ambiguous command(?-i).*",
    ])
    .expect("ios error patterns")
});

const SH_INTERFACES: &str = "show ip interface brief";

static INTERFACE_ID_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)\s+(?:\d+\.\d+\.\d+\.\d+|unassigned)\s+\S+\s+\S+").expect("interface id pattern")
});

static DESCRIPTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^description (.*)").expect("description pattern"));

static MTU_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^mtu (\d+)").expect("mtu pattern"));

static SHUTDOWN_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(shutdown)$").expect("shutdown pattern"));

static INTERFACE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^interface (\S+)").expect("interface pattern"));

static STATUS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\S+ is (?P<admin>[^,]+), line protocol is (?P<oper>\S+)").expect("status pattern")
});

static STATE_DESCRIPTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Description: (.*)").expect("state description pattern"));

static STATE_MTU_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^MTU (\d+) bytes").expect("state mtu pattern"));

/// Key of an interface list item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceKey {
    pub name: String,
}

/// Lists interfaces from `show ip interface brief`.
pub struct InterfaceReader {
    cli: Cli,
}

impl InterfaceReader {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    fn parse_ids(output: &str) -> Vec<String> {
        parse_fields(output, &INTERFACE_ID_LINE)
    }

    async fn ids(&self, path: &Path, ctx: &ReadContext) -> Result<Vec<String>, ReadFailed> {
        let output = self
            .cli
            .blocking_read_cached(SH_INTERFACES, ctx)
            .await
            .map_err(|e| ReadFailed::new(path, e))?;
        Ok(Self::parse_ids(&output))
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
        let exists = self.ids(path, ctx).await?.iter().any(|id| id == name);
        Ok(exists.then(|| InterfaceKey {
            name: name.to_string(),
        }))
    }
}

#[async_trait]
impl ListReader for InterfaceReader {
    async fn get_all_ids(&self, path: &Path, ctx: &ReadContext) -> Result<Vec<String>, ReadFailed> {
        self.ids(path, ctx).await
    }
}

/// Reads `/interfaces/interface/config` from the interface's running
/// configuration.
pub struct InterfaceConfigReader {
    cli: Cli,
}

impl InterfaceConfigReader {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    fn parse(output: &str, name: &str) -> Option<InterfaceConfig> {
        parse_field(output, &INTERFACE_LINE)?;
        Some(InterfaceConfig {
            name: name.to_string(),
            description: parse_field(output, &DESCRIPTION_LINE),
            mtu: parse_field_with(output, &MTU_LINE, |caps| caps[1].parse().ok()),
            enabled: Some(parse_field(output, &SHUTDOWN_LINE).is_none()),
        })
    }
}

#[async_trait]
impl Reader for InterfaceConfigReader {
    type Data = InterfaceConfig;

    async fn read_current_attributes(
        &self,
        path: &Path,
        ctx: &ReadContext,
    ) -> Result<Option<InterfaceConfig>, ReadFailed> {
        let name = interface_name(path);
        let output = self
            .cli
            .blocking_read_cached(&format!("show running-config interface {}", name), ctx)
            .await
            .map_err(|e| ReadFailed::new(path, e))?;
        Ok(Self::parse(&output, name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperStatus {
    Up,
    Down,
    Unknown,
}

/// Operational state of an interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceState {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u16>,

    pub enabled: bool,
    pub admin_status: AdminStatus,
    pub oper_status: OperStatus,
}

/// Reads `/interfaces/interface/state` from `show interface`.
pub struct InterfaceStateReader {
    cli: Cli,
}

impl InterfaceStateReader {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    fn parse(output: &str, name: &str) -> Option<InterfaceState> {
        let (admin, oper) = parse_field_with(output, &STATUS_LINE, |caps| {
            Some((caps["admin"].to_string(), caps["oper"].to_string()))
        })?;

        // Anything but plain "up" (administratively down, down, or an
        // unexpected word) means the port is not enabled.
        let admin_status = if admin == "up" {
            AdminStatus::Up
        } else {
            AdminStatus::Down
        };
        let oper_status = match oper.as_str() {
            "up" => OperStatus::Up,
            "down" => OperStatus::Down,
            _ => OperStatus::Unknown,
        };

        Some(InterfaceState {
            name: name.to_string(),
            description: parse_field(output, &STATE_DESCRIPTION_LINE),
            mtu: parse_field_with(output, &STATE_MTU_LINE, |caps| caps[1].parse().ok()),
            enabled: admin_status == AdminStatus::Up,
            admin_status,
            oper_status,
        })
    }
}

#[async_trait]
impl Reader for InterfaceStateReader {
    type Data = InterfaceState;

    fn kind(&self) -> ReadKind {
        ReadKind::Operational
    }

    async fn read_current_attributes(
        &self,
        path: &Path,
        ctx: &ReadContext,
    ) -> Result<Option<InterfaceState>, ReadFailed> {
        let name = interface_name(path);
        let output = self
            .cli
            .blocking_read_cached(&format!("show interface {}", name), ctx)
            .await
            .map_err(|e| ReadFailed::new(path, e))?;
        Ok(Self::parse(&output, name))
    }
}

const INTERFACE_WRITE: &str = "configure terminal\n\
    interface {$name}\n\
    {% if ($desc) %}description {$desc}\n{% endif %}\
    {% if ($mtu) %}mtu {$mtu}\n{% endif %}\
    {% if ($shutdown) %}shutdown\n{% else %}no shutdown\n{% endif %}\
    end";

const INTERFACE_UPDATE: &str = "configure terminal\n\
    interface {$name}\n\
    {% if ($desc) %}description {$desc}\n{% elseIf ($before_desc) %}no description\n{% endif %}\
    {% if ($mtu) %}mtu {$mtu}\n{% elseIf ($before_mtu) %}no mtu\n{% endif %}\
    {% if ($shutdown) %}shutdown\n{% else %}no shutdown\n{% endif %}\
    end";

const INTERFACE_DELETE: &str = "configure terminal\n\
    no interface {$name}\n\
    end";

/// Interfaces that exist in hardware and cannot be removed.
fn is_physical(name: &str) -> bool {
    const LOGICAL: [&str; 5] = ["Loopback", "Tunnel", "Vlan", "Port-channel", "BDI"];
    !name.contains('.') && !LOGICAL.iter().any(|prefix| name.starts_with(prefix))
}

/// Writes `/interfaces/interface/config`. Updates are applied in place,
/// removing attributes that were dropped.
pub struct InterfaceConfigWriter {
    cli: Cli,
}

impl InterfaceConfigWriter {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    fn context(data: &InterfaceConfig) -> Context {
        Context::new()
            .insert("name", &data.name)
            .insert("desc", data.description.as_ref())
            .insert("mtu", data.mtu)
            .insert("shutdown", Value::flag(data.is_shutdown()))
    }
}

#[async_trait]
impl Writer for InterfaceConfigWriter {
    type Data = InterfaceConfig;

    async fn write_current_attributes(&self, path: &Path, after: &InterfaceConfig) -> Result<(), WriteFailed> {
        let command = render(WriteKind::Create, path, INTERFACE_WRITE, &Self::context(after))?;
        self.cli.blocking_write_and_read(&command, path, after).await
    }

    async fn update_current_attributes(
        &self,
        path: &Path,
        before: &InterfaceConfig,
        after: &InterfaceConfig,
    ) -> Result<(), WriteFailed> {
        let ctx = Self::context(after)
            .insert("before_desc", before.description.as_ref())
            .insert("before_mtu", before.mtu);
        let command = render(WriteKind::Update, path, INTERFACE_UPDATE, &ctx)?;
        self.cli.blocking_update_and_read(&command, path, before, after).await
    }

    async fn delete_current_attributes(&self, path: &Path, before: &InterfaceConfig) -> Result<(), WriteFailed> {
        check_unsupported(
            is_physical(&before.name),
            WriteKind::Delete,
            path,
            format!("Physical interface {} cannot be deleted", before.name),
        )?;
        let command = render(WriteKind::Delete, path, INTERFACE_DELETE, &Self::context(before))?;
        self.cli.blocking_delete_and_read(&command, path, before).await
    }
}

macro_rules! neighbor_essential {
    () => {
        "{% if ($neighbor.config.peer_as) %}neighbor {$neighbor_id} remote-as {$neighbor.config.peer_as}\n\
         {% elseIf ($before.config.peer_as) %}no neighbor {$neighbor_id} remote-as\n{% endif %}\
         {% if ($neighbor.config.peer_group) %}neighbor {$neighbor_id} peer-group {$neighbor.config.peer_group}\n\
         {% elseIf ($before.config.peer_group) %}no neighbor {$neighbor_id} peer-group\n{% endif %}"
    };
}

macro_rules! neighbor_common {
    () => {
        "{% if ($neighbor.config.description) %}neighbor {$neighbor_id} description {$neighbor.config.description}\n\
         {% elseIf ($before.config.description) %}no neighbor {$neighbor_id} description\n{% endif %}\
         {% if ($neighbor.config.auth_password) %}neighbor {$neighbor_id} password {$neighbor.config.auth_password}\n\
         {% elseIf ($before.config.auth_password) %}no neighbor {$neighbor_id} password\n{% endif %}"
    };
}

macro_rules! neighbor_transport {
    () => {
        "{% if ($neighbor.transport.local_address) %}neighbor {$neighbor_id} update-source {$neighbor.transport.local_address}\n\
         {% elseIf ($before.transport.local_address) %}no neighbor {$neighbor_id} update-source {$before.transport.local_address}\n{% endif %}\
         {% if ($neighbor.transport.passive_mode) %}neighbor {$neighbor_id} transport connection-mode passive\n\
         {% elseIf ($before.transport.passive_mode) %}no neighbor {$neighbor_id} transport connection-mode passive\n{% endif %}"
    };
}

macro_rules! neighbor_policies {
    ($source:literal) => {
        concat!(
            "{% loop in $",
            $source,
            ".apply_policy.import_policy as $policy %}neighbor {$neighbor_id} route-map {$policy} in\n{% endloop %}",
            "{% loop in $",
            $source,
            ".apply_policy.export_policy as $policy %}neighbor {$neighbor_id} route-map {$policy} out\n{% endloop %}"
        )
    };
}

macro_rules! neighbor_send_community {
    () => {
        "{% if ($neighbor.config.send_community) %}neighbor {$neighbor_id} send-community {$neighbor.config.send_community|lc}\n\
         {% elseIf ($before.config.send_community) %}no neighbor {$neighbor_id} send-community\n{% endif %}"
    };
}

macro_rules! neighbor_rr {
    () => {
        "{% if ($route_reflect_client) %}neighbor {$neighbor_id} route-reflector-client\n\
         {% elseIf ($before_route_reflect_client) %}no neighbor {$neighbor_id} route-reflector-client\n{% endif %}"
    };
}

macro_rules! neighbor_enable {
    () => {
        "{% if ($enabled) %}neighbor {$neighbor_id} activate\n\
         {% elseIf ($before_enabled) %}no neighbor {$neighbor_id} activate\n{% endif %}"
    };
}

macro_rules! neighbor_delete {
    () => {
        "{% if ($neighbor.config.peer_group) %}no neighbor {$neighbor_id} peer-group {$neighbor.config.peer_group}\n{% endif %}\
         {% if ($neighbor.config.peer_as) %}no neighbor {$neighbor_id} remote-as {$neighbor.config.peer_as}\n{% endif %}"
    };
}

const NEIGHBOR_GLOBAL: &str = concat!(
    "configure terminal\n",
    "router bgp {$as}\n",
    neighbor_essential!(),
    neighbor_common!(),
    neighbor_transport!(),
    neighbor_policies!("neighbor"),
    "{% loop in $afis as $af_name:af %}\n",
    "address-family {$af_name}\n",
    neighbor_send_community!(),
    neighbor_rr!(),
    neighbor_policies!("af"),
    neighbor_enable!(),
    "exit\n",
    "{% onEmpty %}",
    neighbor_send_community!(),
    neighbor_rr!(),
    neighbor_enable!(),
    "{% endloop %}",
    "end"
);

const NEIGHBOR_VRF: &str = concat!(
    "configure terminal\n",
    "router bgp {$as}\n",
    "{% loop in $afis as $af_name:af %}\n",
    "address-family {$af_name} vrf {$vrf}\n",
    neighbor_essential!(),
    neighbor_common!(),
    neighbor_transport!(),
    neighbor_send_community!(),
    neighbor_rr!(),
    neighbor_policies!("neighbor"),
    neighbor_policies!("af"),
    neighbor_enable!(),
    "exit\n",
    "{% endloop %}",
    "end"
);

const NEIGHBOR_GLOBAL_DELETE: &str = concat!(
    "configure terminal\n",
    "router bgp {$as}\n",
    neighbor_delete!(),
    "end"
);

const NEIGHBOR_GLOBAL_DELETE_AFI: &str = concat!(
    "configure terminal\n",
    "router bgp {$as}\n",
    "{% loop in $afis as $af_name:af %}\n",
    "address-family {$af_name}\n",
    "no neighbor {$neighbor_id} activate\n",
    "exit\n",
    "{% endloop %}",
    "end"
);

const NEIGHBOR_VRF_DELETE: &str = concat!(
    "configure terminal\n",
    "router bgp {$as}\n",
    "{% loop in $afis as $af_name:af %}\n",
    "address-family {$af_name} vrf {$vrf}\n",
    neighbor_delete!(),
    "exit\n",
    "{% endloop %}",
    "end"
);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_as: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_password: Option<String>,

    /// `STANDARD`, `EXTENDED` or `BOTH`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_community: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborTransport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_address: Option<String>,

    #[serde(default)]
    pub passive_mode: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyPolicy {
    #[serde(default)]
    pub import_policy: Vec<String>,

    #[serde(default)]
    pub export_policy: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AfiSafi {
    /// Neutral name, e.g. `IPV4_UNICAST`.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_policy: Option<ApplyPolicy>,
}

/// A BGP neighbor subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpNeighbor {
    /// AS of the local BGP instance the neighbor belongs to.
    pub local_as: u32,

    #[serde(default)]
    pub config: NeighborConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<NeighborTransport>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_reflector_client: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_policy: Option<ApplyPolicy>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub afi_safis: Vec<AfiSafi>,
}

/// IOS keyword for a neutral address family name.
pub fn device_address_family(name: &str) -> String {
    match name {
        "IPV4_UNICAST" => "ipv4".to_string(),
        "IPV6_UNICAST" => "ipv6".to_string(),
        "L3VPN_IPV4_UNICAST" => "vpnv4".to_string(),
        "L3VPN_IPV6_UNICAST" => "vpnv6".to_string(),
        other => other.to_lowercase().replace('_', " "),
    }
}

/// Writes `/network-instances/network-instance/protocols/protocol/bgp/neighbors/neighbor`.
///
/// Neighbors of the `default` instance are configured globally; neighbors
/// of a VRF under each of their address families, of which there must be
/// at least one.
pub struct NeighborWriter {
    cli: Cli,
}

impl NeighborWriter {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    fn afis(neighbor: &BgpNeighbor) -> IndexMap<String, Value> {
        neighbor
            .afi_safis
            .iter()
            .map(|afi| {
                let value = serde_json::to_value(afi).map(Value::from).unwrap_or_default();
                (device_address_family(&afi.name), value)
            })
            .collect()
    }

    fn tree(kind: WriteKind, path: &Path, neighbor: &BgpNeighbor) -> Result<Value, WriteFailed> {
        serde_json::to_value(neighbor)
            .map(Value::from)
            .map_err(|e| kind.failed(path, None, None, WriteCause::Invalid(e.to_string())))
    }

    /// Render the create/update batch, picking the global or VRF template.
    fn render_neighbor(
        kind: WriteKind,
        path: &Path,
        neighbor: &BgpNeighbor,
        before: Option<&BgpNeighbor>,
    ) -> Result<Command, WriteFailed> {
        let neighbor_id = path.first_key_of("neighbor").unwrap_or_default();
        let afis = Self::afis(neighbor);
        let before_tree = match before {
            Some(before) => Self::tree(kind, path, before)?,
            None => Value::Null,
        };

        let ctx = Context::new()
            .insert("as", neighbor.local_as)
            .insert("neighbor_id", neighbor_id)
            .insert("neighbor", Self::tree(kind, path, neighbor)?)
            .insert("before", before_tree)
            .insert("route_reflect_client", neighbor.route_reflector_client)
            .insert("before_route_reflect_client", before.and_then(|b| b.route_reflector_client))
            .insert("enabled", neighbor.config.enabled)
            .insert("before_enabled", before.and_then(|b| b.config.enabled));

        match path.first_key_of("network-instance") {
            Some("default") | None => render(kind, path, NEIGHBOR_GLOBAL, &ctx.insert("afis", afis)),
            Some(vrf) => {
                check_unsupported(
                    afis.is_empty(),
                    kind,
                    path,
                    format!("No afi safi defined for neighbor: {} in VRF: {}", neighbor_id, vrf),
                )?;
                render(kind, path, NEIGHBOR_VRF, &ctx.insert("afis", afis).insert("vrf", vrf))
            }
        }
    }
}

#[async_trait]
impl Writer for NeighborWriter {
    type Data = BgpNeighbor;

    async fn write_current_attributes(&self, path: &Path, after: &BgpNeighbor) -> Result<(), WriteFailed> {
        let command = Self::render_neighbor(WriteKind::Create, path, after, None)?;
        self.cli.blocking_write_and_read(&command, path, after).await
    }

    async fn update_current_attributes(
        &self,
        path: &Path,
        before: &BgpNeighbor,
        after: &BgpNeighbor,
    ) -> Result<(), WriteFailed> {
        // The writer owns the whole subtree, so address families dropped
        // from the neighbor are deactivated here first.
        let remaining = Self::afis(after);
        let removed: IndexMap<String, Value> = Self::afis(before)
            .into_iter()
            .filter(|(name, _)| !remaining.contains_key(name))
            .collect();

        if !removed.is_empty() {
            debug!("{}: removing address families {:?}", path, removed.keys().collect::<Vec<_>>());
            let neighbor_id = path.first_key_of("neighbor").unwrap_or_default();
            let ctx = Context::new()
                .insert("as", after.local_as)
                .insert("neighbor_id", neighbor_id)
                .insert("neighbor", Self::tree(WriteKind::Update, path, before)?)
                .insert("afis", removed);
            let (template, ctx) = match path.first_key_of("network-instance") {
                Some("default") | None => (NEIGHBOR_GLOBAL_DELETE_AFI, ctx),
                Some(vrf) => (NEIGHBOR_VRF_DELETE, ctx.insert("vrf", vrf)),
            };
            let command = render(WriteKind::Update, path, template, &ctx)?;
            self.cli.blocking_update_and_read(&command, path, before, after).await?;
        }

        let command = Self::render_neighbor(WriteKind::Update, path, after, Some(before))?;
        self.cli.blocking_update_and_read(&command, path, before, after).await
    }

    async fn delete_current_attributes(&self, path: &Path, before: &BgpNeighbor) -> Result<(), WriteFailed> {
        let neighbor_id = path.first_key_of("neighbor").unwrap_or_default();
        let ctx = Context::new()
            .insert("as", before.local_as)
            .insert("neighbor_id", neighbor_id)
            .insert("neighbor", Self::tree(WriteKind::Delete, path, before)?)
            .insert("afis", Self::afis(before));
        let command = match path.first_key_of("network-instance") {
            Some("default") | None => render(WriteKind::Delete, path, NEIGHBOR_GLOBAL_DELETE, &ctx)?,
            Some(vrf) => render(WriteKind::Delete, path, NEIGHBOR_VRF_DELETE, &ctx.insert("vrf", vrf))?,
        };
        self.cli.blocking_delete_and_read(&command, path, before).await
    }
}

/// Cisco IOS, any version.
#[derive(Debug, Clone, Copy, Default)]
pub struct IosUnit;

impl TranslateUnit for IosUnit {
    fn name(&self) -> &str {
        "ios"
    }

    fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new("ios", "*")
    }

    fn initializer(&self, config: &CliNodeConfig) -> Box<dyn SessionInitializer> {
        Box::new(
            PrivilegedModeInitializer::new(config.name())
                .terminal_setup("terminal length 0")
                .terminal_setup("terminal width 0")
                .read_timeout(config.prompt_time_unit())
                .credentials(
                    config.secret.as_ref().map(copy_secret),
                    config.password.as_ref().map(copy_secret),
                )
                .prompt_resolver(Arc::new(
                    EnterAndRead::new().with_time_unit(config.prompt_time_unit()),
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
            .add("/interfaces/interface/config", InterfaceConfigReader::new(cli.clone()))?
            .add("/interfaces/interface/state", InterfaceStateReader::new(cli.clone()))?;

        writers
            .add_node("/interfaces/interface", NoopWriter)?
            .add("/interfaces/interface/config", InterfaceConfigWriter::new(cli.clone()))?
            .add_after(
                "/network-instances/network-instance/protocols/protocol/bgp/neighbors/neighbor",
                NeighborWriter::new(cli.clone()),
                ["/interfaces/interface/config"],
            )?;
        Ok(())
    }
}
