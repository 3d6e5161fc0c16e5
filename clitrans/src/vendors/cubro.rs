//! Cubro packet brokers.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{InterfaceConfig, render};
use crate::channel::ErrorPatternSet;
use crate::device::CliNodeConfig;
use crate::error::{RegistryError, WriteFailed, WriteKind};
use crate::executor::Cli;
use crate::init::{SessionInitializer, TerminalSetupInitializer};
use crate::prompt::EnterAndRead;
use crate::template::{Context, Value};
use crate::translate::{NoopWriter, Path, ReaderRegistryBuilder, Writer, WriterRegistryBuilder, check_unsupported};
use crate::unit::{DeviceIdentity, TranslateUnit};

static ERROR_PATTERNS: LazyLock<ErrorPatternSet> = LazyLock::new(|| {
    ErrorPatternSet::from_patterns([r"(?mi)^\s*%\s*(?:invalid|unknown|incomplete|error).*"])
        .expect("cubro error patterns")
});

const WRITE_TEMPLATE: &str = "interface {$name}\n\
    {% if ($desc) %}interface comment {$desc}\n{% endif %}\
    {% if ($mtu) %}mtu {$mtu}\n{% endif %}\
    {% if ($rx) %}rx on\n{% endif %}\
    {% if ($speed) %}speed {$speed}\n{% endif %}\
    {% if ($innerhash) %}innerhash enable\n{% endif %}\
    {% if ($inneracl) %}inneracl enable\n{% endif %}\
    {% if ($vxlanterminated) %}vxlanterminated enable\n{% endif %}\
    {% loop in $elag as $group %}elag {$group}\n{% endloop %}\
    {% if ($shutdown) %}shutdown\n{% else %}no shutdown\n{% endif %}";

const DELETE_TEMPLATE: &str = "interface {$name}\n\
    shutdown\n\
    mtu 1500\n\
    rx off\n\
    no speed\n\
    no innerhash enable\n\
    no inneracl enable\n\
    no vxlanterminated\n\
    {% loop in $elag as $group %}no elag {$group}\n{% endloop %}";

/// Cubro interface configuration: the common attributes plus the
/// broker-specific ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CubroInterfaceConfig {
    #[serde(flatten)]
    pub base: InterfaceConfig,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub interface_type: Option<String>,

    #[serde(default)]
    pub rx: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,

    #[serde(default)]
    pub innerhash: bool,

    #[serde(default)]
    pub inneracl: bool,

    #[serde(default)]
    pub vxlanterminated: bool,

    /// Link aggregation groups the port belongs to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elag: Vec<u16>,
}

/// Writes `/interfaces/interface/config`. Cubro allows creating and
/// deleting physical ports, and re-applies the full port config on update.
pub struct InterfaceConfigWriter {
    cli: Cli,
}

impl InterfaceConfigWriter {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    fn context(data: &CubroInterfaceConfig) -> Context {
        Context::new()
            .insert("name", &data.base.name)
            .insert("desc", data.base.description.as_ref())
            .insert("mtu", data.base.mtu)
            .insert("shutdown", Value::flag(data.base.is_shutdown()))
            .insert("rx", Value::flag(data.rx))
            .insert("speed", data.speed.as_ref())
            .insert("innerhash", Value::flag(data.innerhash))
            .insert("inneracl", Value::flag(data.inneracl))
            .insert("vxlanterminated", Value::flag(data.vxlanterminated))
            .insert("elag", data.elag.clone())
    }
}

#[async_trait]
impl Writer for InterfaceConfigWriter {
    type Data = CubroInterfaceConfig;

    async fn write_current_attributes(
        &self,
        path: &Path,
        after: &CubroInterfaceConfig,
    ) -> Result<(), WriteFailed> {
        let command = render(WriteKind::Create, path, WRITE_TEMPLATE, &Self::context(after))?;
        self.cli.blocking_write_and_read(&command, path, after).await
    }

    async fn update_current_attributes(
        &self,
        path: &Path,
        before: &CubroInterfaceConfig,
        after: &CubroInterfaceConfig,
    ) -> Result<(), WriteFailed> {
        check_unsupported(
            before.interface_type != after.interface_type,
            WriteKind::Update,
            path,
            format!(
                "Changing interface type is not permitted. Before: {:?}, After: {:?}",
                before.interface_type, after.interface_type
            ),
        )?;
        let command = render(WriteKind::Update, path, WRITE_TEMPLATE, &Self::context(after))?;
        self.cli.blocking_update_and_read(&command, path, before, after).await
    }

    async fn delete_current_attributes(
        &self,
        path: &Path,
        before: &CubroInterfaceConfig,
    ) -> Result<(), WriteFailed> {
        let ctx = Context::new()
            .insert("name", &before.base.name)
            .insert("elag", before.elag.clone());
        let command = render(WriteKind::Delete, path, DELETE_TEMPLATE, &ctx)?;
        self.cli.blocking_delete_and_read(&command, path, before).await
    }
}

/// Cubro EXA packet brokers, any version.
#[derive(Debug, Clone, Copy, Default)]
pub struct CubroUnit;

impl TranslateUnit for CubroUnit {
    fn name(&self) -> &str {
        "cubro"
    }

    fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new("cubro", "*")
    }

    fn initializer(&self, config: &CliNodeConfig) -> Box<dyn SessionInitializer> {
        Box::new(
            TerminalSetupInitializer::new(config.name())
                .read_timeout(config.prompt_time_unit())
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
        _readers: &mut ReaderRegistryBuilder,
        writers: &mut WriterRegistryBuilder,
    ) -> Result<(), RegistryError> {
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
    use crate::error::WriteCause;
    use crate::transport::ScriptedTransport;
    use crate::translate::{NodeWriter, WriterAdapter};
    use crate::vendors::testing;

    fn path() -> Path {
        Path::parse("/interfaces/interface[eth0]/config").unwrap()
    }

    fn writer() -> (WriterAdapter<InterfaceConfigWriter>, crate::transport::TranscriptLog) {
        let (cli, log) = testing::cli(
            ScriptedTransport::new().with_prompt("cubro(config-if)#"),
            CubroUnit.error_patterns(),
        );
        (WriterAdapter(InterfaceConfigWriter::new(cli)), log)
    }

    #[tokio::test]
    async fn test_create_disabled_interface() {
        let (writer, log) = writer();

        writer
            .write(&path(), &json!({"name": "eth0", "mtu": 1500, "enabled": false}))
            .await
            .unwrap();

        let transcript = log.transcript();
        assert_eq!(transcript, "interface eth0\nmtu 1500\nshutdown\n");
        assert!(transcript.trim_end().ends_with("shutdown"));
        assert_eq!(log.count("mtu 1500\n"), 1);
    }

    #[tokio::test]
    async fn test_create_with_broker_attributes() {
        let (writer, log) = writer();

        writer
            .write(
                &path(),
                &json!({
                    "name": "eth0",
                    "description": "tap A",
                    "rx": true,
                    "speed": "10G",
                    "elag": [1, 2]
                }),
            )
            .await
            .unwrap();

        assert_eq!(
            log.transcript(),
            "interface eth0\ninterface comment tap A\nrx on\nspeed 10G\nelag 1\nelag 2\nno shutdown\n"
        );
    }

    #[tokio::test]
    async fn test_delete_resets_port() {
        let (writer, log) = writer();

        writer
            .delete(&path(), &json!({"name": "eth0", "elag": [7]}))
            .await
            .unwrap();

        assert_eq!(
            log.transcript(),
            "interface eth0\nshutdown\nmtu 1500\nrx off\nno speed\nno innerhash enable\n\
             no inneracl enable\nno vxlanterminated\nno elag 7\n"
        );
    }

    #[tokio::test]
    async fn test_type_change_rejected_without_sending() {
        let (writer, log) = writer();

        let err = writer
            .update(
                &path(),
                &json!({"name": "eth0", "type": "ethernetCsmacd"}),
                &json!({"name": "eth0", "type": "ieee8023adLag"}),
            )
            .await
            .unwrap_err();

        assert!(matches!(err.cause(), WriteCause::Invalid(_)));
        assert!(log.writes().is_empty());
    }
}
