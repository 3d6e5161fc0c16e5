//! Ciena SAOS 6.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::render;
use crate::channel::ErrorPatternSet;
use crate::device::CliNodeConfig;
use crate::error::{ReadFailed, RegistryError, WriteFailed, WriteKind};
use crate::executor::{Cli, Command};
use crate::init::{SessionInitializer, TerminalSetupInitializer};
use crate::prompt::EnterAndRead;
use crate::template::Context;
use crate::translate::parsing::parse_field;
use crate::translate::{
    CompositeMode, CompositeWriter, NoopWriter, Path, ReadContext, Reader, ReaderRegistryBuilder,
    Writer, WriterAdapter, WriterRegistryBuilder,
};
use crate::unit::{DeviceIdentity, TranslateUnit};

static ERROR_PATTERNS: LazyLock<ErrorPatternSet> = LazyLock::new(|| {
    ErrorPatternSet::from_patterns([
        r"(?m)^SHELL PARSER FAILURE.*",
        r"(?m)^SHELL COMMAND FAILURE.*",
        r"(?mi)^\s*error:.*",
    ])
    .expect("saos error patterns")
});

static L2CFT_MODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^l2-cft set mode (\S+)").expect("l2-cft mode pattern"));

const SHOW_L2CFT: &str = "configuration search running-config string \"l2-cft set mode\"";

const L2CFT_TEMPLATE: &str = "{% if ($mode) %}l2-cft set mode {$mode}\nconfiguration save{% endif %}";

/// Mode a device falls back to when the L2-CFT config is removed.
const L2CFT_DEFAULT_MODE: &str = "mef-ce1";

const DEFAULT_VLAN_WRITE: &str = "vlan create vlan {$id}{% if ($name) %} name {$name}{% endif %}\n\
    configuration save";

/// Without a name the device falls back to `VLAN#<id>`.
const DEFAULT_VLAN_RENAME: &str = "{% if ($name) %}vlan rename vlan {$id} name {$name}\nconfiguration save\
    {% elseIf ($before_name) %}vlan rename vlan {$id} name VLAN#{$id}\nconfiguration save{% endif %}";

const DEFAULT_VLAN_DELETE: &str = "vlan delete vlan {$id}\nconfiguration save";

const VC_VLAN_WRITE: &str = "virtual-circuit ethernet create vc {$vc} vlan {$id}\n\
    configuration save";

const VC_VLAN_DELETE: &str = "virtual-circuit ethernet delete vc {$vc}\nconfiguration save";

/// Layer 2 control frame tunnelling profile mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct L2CftConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// Reads `/l2-cft/config` from the running configuration.
pub struct L2CftConfigReader {
    cli: Cli,
}

impl L2CftConfigReader {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    fn parse(output: &str) -> Option<L2CftConfig> {
        parse_field(output, &L2CFT_MODE).map(|mode| L2CftConfig { mode: Some(mode) })
    }
}

#[async_trait]
impl Reader for L2CftConfigReader {
    type Data = L2CftConfig;

    async fn read_current_attributes(
        &self,
        path: &Path,
        ctx: &ReadContext,
    ) -> Result<Option<L2CftConfig>, ReadFailed> {
        let output = self
            .cli
            .blocking_read_cached(SHOW_L2CFT, ctx)
            .await
            .map_err(|e| ReadFailed::new(path, e))?;
        Ok(Self::parse(&output))
    }
}

/// Writes `/l2-cft/config`. Removing the config restores the default mode.
pub struct L2CftConfigWriter {
    cli: Cli,
}

impl L2CftConfigWriter {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    fn command(kind: WriteKind, path: &Path, mode: Option<&str>) -> Result<Command, WriteFailed> {
        render(kind, path, L2CFT_TEMPLATE, &Context::new().insert("mode", mode))
    }
}

#[async_trait]
impl Writer for L2CftConfigWriter {
    type Data = L2CftConfig;

    async fn write_current_attributes(&self, path: &Path, after: &L2CftConfig) -> Result<(), WriteFailed> {
        if after.mode.is_none() {
            return Ok(());
        }
        let command = Self::command(WriteKind::Create, path, after.mode.as_deref())?;
        self.cli.blocking_write_and_read(&command, path, after).await
    }

    async fn update_current_attributes(
        &self,
        path: &Path,
        before: &L2CftConfig,
        after: &L2CftConfig,
    ) -> Result<(), WriteFailed> {
        let mode = after.mode.as_deref().filter(|_| after.mode != before.mode);
        let command = Self::command(WriteKind::Update, path, mode)?;
        self.cli.blocking_update_and_read(&command, path, before, after).await
    }

    async fn delete_current_attributes(&self, path: &Path, before: &L2CftConfig) -> Result<(), WriteFailed> {
        let command = Self::command(WriteKind::Delete, path, Some(L2CFT_DEFAULT_MODE))?;
        self.cli.blocking_delete_and_read(&command, path, before).await
    }
}

/// VLAN configuration under a network instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VlanConfig {
    pub vlan_id: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

fn network_instance(path: &Path) -> &str {
    path.first_key_of("network-instance").unwrap_or_default()
}

/// VLANs of the `default` network instance: plain switch VLANs.
pub struct DefaultVlanConfigWriter {
    cli: Cli,
}

impl DefaultVlanConfigWriter {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    fn context(data: &VlanConfig) -> Context {
        Context::new()
            .insert("id", data.vlan_id)
            .insert("name", data.name.as_ref())
    }
}

#[async_trait]
impl Writer for DefaultVlanConfigWriter {
    type Data = VlanConfig;

    fn applies_to(&self, path: &Path) -> bool {
        network_instance(path) == "default"
    }

    async fn write_current_attributes(&self, path: &Path, after: &VlanConfig) -> Result<(), WriteFailed> {
        let command = render(WriteKind::Create, path, DEFAULT_VLAN_WRITE, &Self::context(after))?;
        self.cli.blocking_write_and_read(&command, path, after).await
    }

    async fn update_current_attributes(
        &self,
        path: &Path,
        before: &VlanConfig,
        after: &VlanConfig,
    ) -> Result<(), WriteFailed> {
        let ctx = Context::new()
            .insert("id", after.vlan_id)
            .insert("name", after.name.as_ref().filter(|_| after.name != before.name))
            .insert("before_name", before.name.as_ref().filter(|_| after.name.is_none()));
        let command = render(WriteKind::Update, path, DEFAULT_VLAN_RENAME, &ctx)?;
        self.cli.blocking_update_and_read(&command, path, before, after).await
    }

    async fn delete_current_attributes(&self, path: &Path, before: &VlanConfig) -> Result<(), WriteFailed> {
        let command = render(WriteKind::Delete, path, DEFAULT_VLAN_DELETE, &Self::context(before))?;
        self.cli.blocking_delete_and_read(&command, path, before).await
    }
}

/// VLANs of any other network instance: the VLAN an L2 virtual circuit
/// named after the instance rides on.
pub struct L2vsicpVlanConfigWriter {
    cli: Cli,
}

impl L2vsicpVlanConfigWriter {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    fn context(path: &Path, data: &VlanConfig) -> Context {
        Context::new()
            .insert("vc", network_instance(path))
            .insert("id", data.vlan_id)
    }
}

#[async_trait]
impl Writer for L2vsicpVlanConfigWriter {
    type Data = VlanConfig;

    fn applies_to(&self, path: &Path) -> bool {
        let instance = network_instance(path);
        !instance.is_empty() && instance != "default"
    }

    async fn write_current_attributes(&self, path: &Path, after: &VlanConfig) -> Result<(), WriteFailed> {
        let command = render(WriteKind::Create, path, VC_VLAN_WRITE, &Self::context(path, after))?;
        self.cli.blocking_write_and_read(&command, path, after).await
    }

    async fn delete_current_attributes(&self, path: &Path, before: &VlanConfig) -> Result<(), WriteFailed> {
        let command = render(WriteKind::Delete, path, VC_VLAN_DELETE, &Self::context(path, before))?;
        self.cli.blocking_delete_and_read(&command, path, before).await
    }
}

/// VLAN writer dispatching on the owning network instance.
pub fn vlan_config_writer(cli: &Cli) -> CompositeWriter {
    CompositeWriter::new(CompositeMode::FirstApplicable)
        .with(WriterAdapter(DefaultVlanConfigWriter::new(cli.clone())))
        .with(WriterAdapter(L2vsicpVlanConfigWriter::new(cli.clone())))
}

/// SAOS 6.x.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaosUnit;

impl TranslateUnit for SaosUnit {
    fn name(&self) -> &str {
        "saos-6"
    }

    fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new("saos", "6*")
    }

    fn initializer(&self, config: &CliNodeConfig) -> Box<dyn SessionInitializer> {
        Box::new(
            TerminalSetupInitializer::new(config.name())
                .read_timeout(config.prompt_time_unit())
                .command("system shell set more off")
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
        readers.add("/l2-cft/config", L2CftConfigReader::new(cli.clone()))?;

        writers
            .add("/l2-cft/config", L2CftConfigWriter::new(cli.clone()))?
            .add_node("/network-instances/network-instance/vlans/vlan", NoopWriter)?
            .add_node(
                "/network-instances/network-instance/vlans/vlan/config",
                vlan_config_writer(cli),
            )?;
        Ok(())
    }
}
