//! # Clitrans
//!
//! Multi-vendor CLI translation engine for network device automation.
//!
//! Clitrans turns vendor-neutral configuration trees into the command
//! sequences a device's CLI expects, and parses that CLI's output back into
//! the neutral model. Each supported platform ships as a translation unit:
//! a session initializer, error patterns, and the readers and writers it
//! binds to model paths.
//!
//! ## Features
//!
//! - Async SSH sessions via russh, with scripted transports for tests
//! - Prompt discovery by enter-and-read, tolerant of vendor noise lines
//! - Privileged-mode session setup with password retries
//! - Small command template language for writers
//! - Reader and writer registries with composite handlers and write ordering
//! - Units for Cisco IOS, Juniper Junos, Cubro and Ciena SAOS 6
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clitrans::{DeviceBuilder, Modification, Path, vendors};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), clitrans::Error> {
//!     let units = vendors::registry()?;
//!     let device = DeviceBuilder::new("192.168.1.1")
//!         .username("admin")
//!         .password("secret")
//!         .device("ios", "15.2")
//!         .connect(&units)
//!         .await?;
//!
//!     let path = Path::parse("/interfaces/interface[Loopback0]/config")?;
//!     if let Some(config) = device.read(&path).await? {
//!         println!("{}", config);
//!     }
//!
//!     device
//!         .apply(vec![Modification::create(
//!             path,
//!             json!({"name": "Loopback0", "description": "router id"}),
//!         )])
//!         .await?;
//!
//!     device.close().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod device;
pub mod error;
pub mod executor;
pub mod init;
pub mod prompt;
pub mod template;
pub mod translate;
pub mod transport;
pub mod unit;
pub mod vendors;

// Re-export main types for convenience
pub use device::{CliNodeConfig, Device, DeviceBuilder, HostKeyVerification};
pub use error::{Error, Result};
pub use executor::{Cli, Command, Response};
pub use translate::{Modification, Path};
pub use unit::{DeviceIdentity, TranslateUnit, UnitRegistry};
