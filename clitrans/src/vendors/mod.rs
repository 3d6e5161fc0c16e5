//! Vendor translation units.
//!
//! | Unit    | Device type | Highlights |
//! |---------|-------------|------------|
//! | [`ios`]   | `ios`   | enable-mode initializer, interface readers/writer, BGP neighbor writer with in-place update |
//! | [`junos`] | `junos` | `[edit]`-aware prompt resolution, subinterface and IPv4 readers |
//! | [`cubro`] | `cubro` | interface writer |
//! | [`saos`]  | `saos`  | L2-CFT mode writer, composite VLAN writer |

pub mod cubro;
pub mod ios;
pub mod junos;
pub mod saos;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, WriteCause, WriteFailed, WriteKind};
use crate::executor::Command;
use crate::template::Context;
use crate::translate::Path;
use crate::unit::UnitRegistry;

/// Interface configuration, shared by the interface handlers of all units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl InterfaceConfig {
    /// Explicitly disabled. Interfaces without an `enabled` flag are up.
    pub fn is_shutdown(&self) -> bool {
        self.enabled == Some(false)
    }
}

/// Key of the `interface` list item in `path`, or an empty string.
pub(crate) fn interface_name(path: &Path) -> &str {
    path.first_key_of("interface").unwrap_or_default()
}

/// Render a writer template into a command batch. Lines left blank by
/// untaken branches are dropped; every other line is kept as rendered.
pub(crate) fn render(
    kind: WriteKind,
    path: &Path,
    template: &str,
    ctx: &Context,
) -> Result<Command, WriteFailed> {
    let command = Command::render(template, ctx)
        .map_err(|e| kind.failed(path, None, None, WriteCause::Template(e)))?;
    let lines: Vec<&str> = command
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    Ok(Command::new(lines.join("\n")))
}

/// All units shipped with the crate.
pub fn registry() -> Result<UnitRegistry, RegistryError> {
    let mut units = UnitRegistry::new();
    units.register(ios::IosUnit)?;
    units.register(junos::JunosUnit)?;
    units.register(cubro::CubroUnit)?;
    units.register(saos::SaosUnit)?;
    Ok(units)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for vendor tests.

    use std::time::Duration;

    use crate::channel::{ErrorPatternSet, Session, SessionOptions};
    use crate::executor::Cli;
    use crate::transport::{ScriptedTransport, TranscriptLog};

    /// A `Cli` over `transport`, with short timeouts.
    pub fn cli(transport: ScriptedTransport, patterns: ErrorPatternSet) -> (Cli, TranscriptLog) {
        let log = transport.log();
        let options = SessionOptions {
            timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let session = Session::new("test", Box::new(transport), options);
        (Cli::new(session, patterns), log)
    }
}
