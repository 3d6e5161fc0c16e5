//! Device identities and translation unit registration.
//!
//! A [`TranslateUnit`] is everything the engine needs to drive one family
//! of devices: how to initialize a session, which output means the device
//! rejected a command, and which readers and writers handle which paths.

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::channel::ErrorPatternSet;
use crate::device::CliNodeConfig;
use crate::error::RegistryError;
use crate::executor::Cli;
use crate::init::SessionInitializer;
use crate::translate::{ReaderRegistryBuilder, WriterRegistryBuilder};

/// Device type plus version.
///
/// As declared by a unit, the version is a glob (`*`, `15.*`,
/// `15.2(4)*`); as reported for a connection it is a concrete version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    device_type: String,
    version: String,
}

impl DeviceIdentity {
    pub fn new(device_type: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            device_type: device_type.into(),
            version: version.into(),
        }
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether this (declared) identity covers the `device` identity.
    /// Types compare case-insensitively; the version is a glob.
    pub fn matches(&self, device: &DeviceIdentity) -> bool {
        self.device_type.eq_ignore_ascii_case(&device.device_type)
            && glob_match(&self.version, &device.version)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.device_type, self.version)
    }
}

/// `*` matches any run of characters; everything else is literal.
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return text.is_empty();
    };
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };

    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        // No '*' at all
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

/// Translation unit for one device family.
pub trait TranslateUnit: Send + Sync {
    /// Unit name, used in logs and errors.
    fn name(&self) -> &str;

    /// Devices this unit handles.
    fn identity(&self) -> DeviceIdentity;

    /// Line terminator the device expects.
    fn newline(&self) -> &str {
        "\n"
    }

    /// Initializer for a freshly connected session to `config`'s device.
    fn initializer(&self, config: &CliNodeConfig) -> Box<dyn SessionInitializer>;

    /// Output patterns that mean the device rejected a command.
    fn error_patterns(&self) -> ErrorPatternSet;

    /// Bind readers and writers, all sharing `cli`.
    fn provide_handlers(
        &self,
        cli: &Cli,
        readers: &mut ReaderRegistryBuilder,
        writers: &mut WriterRegistryBuilder,
    ) -> Result<(), RegistryError>;
}

/// Registered translation units.
#[derive(Default, Clone)]
pub struct UnitRegistry {
    units: Vec<Arc<dyn TranslateUnit>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit. Fails if a unit with an identical identity exists.
    pub fn register(&mut self, unit: impl TranslateUnit + 'static) -> Result<(), RegistryError> {
        let identity = unit.identity();
        if self.units.iter().any(|u| u.identity() == identity) {
            return Err(RegistryError::DuplicateModule {
                identity: identity.to_string(),
            });
        }
        debug!("registered unit {} for {}", unit.name(), identity);
        self.units.push(Arc::new(unit));
        Ok(())
    }

    /// The single unit handling `device`.
    pub fn find(&self, device: &DeviceIdentity) -> Result<Arc<dyn TranslateUnit>, RegistryError> {
        let mut matching = self.units.iter().filter(|u| u.identity().matches(device));
        let Some(found) = matching.next() else {
            return Err(RegistryError::NoModule {
                identity: device.to_string(),
            });
        };
        let others: Vec<&Arc<dyn TranslateUnit>> = matching.collect();
        if !others.is_empty() {
            return Err(RegistryError::AmbiguousDevice {
                identity: device.to_string(),
                modules: std::iter::once(found)
                    .chain(others)
                    .map(|u| u.name().to_string())
                    .collect(),
            });
        }
        Ok(Arc::clone(found))
    }

    /// Identities of all registered units.
    pub fn identities(&self) -> Vec<DeviceIdentity> {
        self.units.iter().map(|u| u.identity()).collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl fmt::Debug for UnitRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.units.iter().map(|u| u.name().to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::NoopInitializer;

    struct Unit(&'static str, DeviceIdentity);

    impl TranslateUnit for Unit {
        fn name(&self) -> &str {
            self.0
        }

        fn identity(&self) -> DeviceIdentity {
            self.1.clone()
        }

        fn initializer(&self, _config: &CliNodeConfig) -> Box<dyn SessionInitializer> {
            Box::new(NoopInitializer)
        }

        fn error_patterns(&self) -> ErrorPatternSet {
            ErrorPatternSet::new()
        }

        fn provide_handlers(
            &self,
            _cli: &Cli,
            _readers: &mut ReaderRegistryBuilder,
            _writers: &mut WriterRegistryBuilder,
        ) -> Result<(), RegistryError> {
            Ok(())
        }
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*", ""));
        assert!(glob_match("*", "15.2"));
        assert!(glob_match("15.*", "15.2(4)M"));
        assert!(!glob_match("15.*", "16.1"));
        assert!(glob_match("15.2(4)*", "15.2(4)M3"));
        assert!(glob_match("6.16", "6.16"));
        assert!(!glob_match("6.16", "6.16.1"));
        assert!(glob_match("1*.*", "16.9"));
        assert!(!glob_match("a*b*c", "ac"));
    }

    #[test]
    fn test_register_and_find() {
        let mut units = UnitRegistry::new();
        units.register(Unit("ios", DeviceIdentity::new("ios", "*"))).unwrap();
        units.register(Unit("junos", DeviceIdentity::new("junos", "1*"))).unwrap();

        let found = units.find(&DeviceIdentity::new("IOS", "15.2")).unwrap();
        assert_eq!(found.name(), "ios");

        assert!(matches!(
            units.find(&DeviceIdentity::new("saos", "6.16")),
            Err(RegistryError::NoModule { .. })
        ));
    }

    #[test]
    fn test_identical_identity_rejected() {
        let mut units = UnitRegistry::new();
        units.register(Unit("a", DeviceIdentity::new("ios", "15.*"))).unwrap();
        assert!(matches!(
            units.register(Unit("b", DeviceIdentity::new("ios", "15.*"))),
            Err(RegistryError::DuplicateModule { .. })
        ));
    }

    #[test]
    fn test_overlapping_identities_are_ambiguous() {
        let mut units = UnitRegistry::new();
        units.register(Unit("any", DeviceIdentity::new("ios", "*"))).unwrap();
        units.register(Unit("fifteen", DeviceIdentity::new("ios", "15.*"))).unwrap();

        match units.find(&DeviceIdentity::new("ios", "15.2")) {
            Err(RegistryError::AmbiguousDevice { modules, .. }) => {
                assert_eq!(modules, vec!["any", "fifteen"])
            }
            other => panic!("unexpected: {:?}", other.map(|u| u.name().to_string())),
        }
        assert_eq!(units.find(&DeviceIdentity::new("ios", "12.4")).unwrap().name(), "any");
    }
}
