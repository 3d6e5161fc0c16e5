//! Applying a set of node changes in writer order.

use log::{debug, info, warn};
use serde_json::Value;

use super::registry::WriterRegistry;
use super::Path;
use crate::error::{RegistryError, Result, WriteKind};

/// One node change: the before/after pair of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Modification {
    Create { path: Path, after: Value },
    Update { path: Path, before: Value, after: Value },
    Delete { path: Path, before: Value },
}

impl Modification {
    pub fn create(path: Path, after: Value) -> Self {
        Modification::Create { path, after }
    }

    pub fn update(path: Path, before: Value, after: Value) -> Self {
        Modification::Update {
            path,
            before,
            after,
        }
    }

    pub fn delete(path: Path, before: Value) -> Self {
        Modification::Delete { path, before }
    }

    /// Classify a snapshot pair: absent before is a create, absent after a
    /// delete. `None` when both are absent.
    pub fn from_pair(path: Path, before: Option<Value>, after: Option<Value>) -> Option<Self> {
        match (before, after) {
            (None, Some(after)) => Some(Self::create(path, after)),
            (Some(before), Some(after)) => Some(Self::update(path, before, after)),
            (Some(before), None) => Some(Self::delete(path, before)),
            (None, None) => None,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Modification::Create { path, .. }
            | Modification::Update { path, .. }
            | Modification::Delete { path, .. } => path,
        }
    }

    pub fn kind(&self) -> WriteKind {
        match self {
            Modification::Create { .. } => WriteKind::Create,
            Modification::Update { .. } => WriteKind::Update,
            Modification::Delete { .. } => WriteKind::Delete,
        }
    }

    /// An update whose before and after data are equal.
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Modification::Update { before, after, .. } if before == after)
    }
}

impl WriterRegistry {
    /// Apply `modifications` and return the paths written, in the order
    /// they were applied.
    ///
    /// Deletes run first, in reverse writer order, so dependents are removed
    /// before what they depend on. Creates and updates follow in writer
    /// order. Changes to the same writer keep their submission order.
    /// Updates whose before and after data are equal still reach their
    /// writer, which decides what, if anything, the device needs.
    ///
    /// Stops at the first failure. Nothing already applied is undone.
    pub async fn apply(&self, modifications: Vec<Modification>) -> Result<Vec<Path>> {
        let mut deletes = Vec::new();
        let mut writes = Vec::new();

        for modification in modifications {
            let schema = modification.path().schema();
            let position = self
                .position(&schema)
                .ok_or_else(|| RegistryError::NoWriter {
                    path: modification.path().to_string(),
                })?;
            match modification.kind() {
                WriteKind::Delete => deletes.push((position, modification)),
                _ => writes.push((position, modification)),
            }
        }

        deletes.sort_by(|a, b| b.0.cmp(&a.0));
        writes.sort_by_key(|(position, _)| *position);

        let mut applied = Vec::with_capacity(deletes.len() + writes.len());
        for (position, modification) in deletes.into_iter().chain(writes) {
            let writer = self.writer_at(position);
            let path = modification.path().clone();
            if modification.is_unchanged() {
                debug!("{} {} (unchanged)", modification.kind(), path);
            } else {
                debug!("{} {}", modification.kind(), path);
            }

            let result = match &modification {
                Modification::Create { path, after } => writer.write(path, after).await,
                Modification::Update {
                    path,
                    before,
                    after,
                } => writer.update(path, before, after).await,
                Modification::Delete { path, before } => writer.delete(path, before).await,
            };
            if let Err(err) = result {
                warn!(
                    "{} of {} failed after {} applied change(s); applied changes are kept",
                    modification.kind(),
                    path,
                    applied.len()
                );
                return Err(err.into());
            }
            applied.push(path);
        }

        info!("applied {} change(s)", applied.len());
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::error::{Error, WriteCause, WriteFailed};
    use crate::translate::{NodeWriter, WriterRegistryBuilder};

    struct Logged {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_on: Option<&'static str>,
    }

    impl Logged {
        fn record(&self, op: &str, path: &Path) -> std::result::Result<(), WriteFailed> {
            let key = path.last().and_then(|s| s.key.clone()).unwrap_or_default();
            if self.fail_on == Some(key.as_str()) {
                return Err(WriteKind::Create.failed(path, None, None, WriteCause::Invalid("rejected".into())));
            }
            self.log.lock().unwrap().push(format!("{} {} {}", op, self.name, key));
            Ok(())
        }
    }

    #[async_trait]
    impl NodeWriter for Logged {
        fn applies_to(&self, _path: &Path) -> bool {
            true
        }

        async fn write(&self, path: &Path, _after: &Value) -> std::result::Result<(), WriteFailed> {
            self.record("write", path)
        }

        async fn update(&self, path: &Path, _before: &Value, _after: &Value) -> std::result::Result<(), WriteFailed> {
            self.record("update", path)
        }

        async fn delete(&self, path: &Path, _before: &Value) -> std::result::Result<(), WriteFailed> {
            self.record("delete", path)
        }
    }

    fn registry(log: &Arc<Mutex<Vec<String>>>, fail_on: Option<&'static str>) -> WriterRegistry {
        let logged = |name| Logged { name, log: log.clone(), fail_on };
        let mut builder = WriterRegistryBuilder::new();
        builder
            .add_node_after("/ni", logged("ni"), ["/if"])
            .unwrap()
            .add_node("/if", logged("if"))
            .unwrap();
        builder.build().unwrap()
    }

    #[tokio::test]
    async fn test_deletes_reverse_then_writes_forward() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(&log, None);

        let applied = registry
            .apply(vec![
                Modification::create(Path::parse("/ni[vrf1]").unwrap(), json!({})),
                Modification::delete(Path::parse("/if[eth9]").unwrap(), json!({})),
                Modification::create(Path::parse("/if[eth0]").unwrap(), json!({})),
                Modification::delete(Path::parse("/ni[vrf9]").unwrap(), json!({})),
                Modification::update(Path::parse("/if[eth1]").unwrap(), json!({"mtu": 1}), json!({"mtu": 2})),
                Modification::update(Path::parse("/if[eth2]").unwrap(), json!({"mtu": 1}), json!({"mtu": 1})),
            ])
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "delete ni vrf9",
                "delete if eth9",
                "write if eth0",
                "update if eth1",
                "update if eth2",
                "write ni vrf1",
            ]
        );
        assert_eq!(applied.len(), 6);
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(&log, Some("eth1"));

        let err = registry
            .apply(vec![
                Modification::create(Path::parse("/if[eth0]").unwrap(), json!({})),
                Modification::create(Path::parse("/if[eth1]").unwrap(), json!({})),
                Modification::create(Path::parse("/ni[vrf1]").unwrap(), json!({})),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Write(_)));
        assert_eq!(*log.lock().unwrap(), vec!["write if eth0"]);
    }

    #[tokio::test]
    async fn test_unknown_path_rejected_before_anything_runs() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(&log, None);

        let err = registry
            .apply(vec![
                Modification::create(Path::parse("/if[eth0]").unwrap(), json!({})),
                Modification::create(Path::parse("/vlans[10]").unwrap(), json!({})),
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Registry(RegistryError::NoWriter { .. })));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_from_pair() {
        let path = Path::parse("/if[eth0]").unwrap();
        assert_eq!(Modification::from_pair(path.clone(), None, None), None);
        assert_eq!(
            Modification::from_pair(path.clone(), None, Some(json!(1))).map(|m| m.kind()),
            Some(WriteKind::Create)
        );
        assert_eq!(
            Modification::from_pair(path, Some(json!(1)), None).map(|m| m.kind()),
            Some(WriteKind::Delete)
        );
        let path = Path::parse("/if[eth0]").unwrap();
        assert!(Modification::update(path.clone(), json!(1), json!(1)).is_unchanged());
        assert!(!Modification::update(path, json!(1), json!(2)).is_unchanged());
    }
}
