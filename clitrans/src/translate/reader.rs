//! Reader contracts.
//!
//! Vendor readers implement [`Reader`] (and [`ListReader`] for list nodes)
//! against their own data types. The registry stores them type-erased as
//! [`NodeReader`], exchanging node data as JSON.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use log::trace;
use serde::Serialize;
use serde_json::Value;

use super::Path;
use crate::error::ReadFailed;

/// Whether a reader produces configuration or operational state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReadKind {
    #[default]
    Config,
    Operational,
}

/// Per-read-operation scratch space.
///
/// Readers that parse the same device output (one `show running-config`
/// feeding many nodes) share it through the command cache, so a whole-tree
/// read sends each command once.
#[derive(Debug, Default)]
pub struct ReadContext {
    kind: Option<ReadKind>,
    cache: Mutex<HashMap<String, String>>,
}

impl ReadContext {
    /// A context reading every kind of node.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that only reads nodes of `kind`.
    pub fn of_kind(kind: ReadKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Whether readers of `kind` take part in this read.
    pub fn includes(&self, kind: ReadKind) -> bool {
        self.kind.is_none_or(|k| k == kind)
    }

    /// Output previously stored for `command`.
    pub fn cached(&self, command: &str) -> Option<String> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(command).cloned())
    }

    pub fn store(&self, command: &str, output: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            trace!("caching output of {:?}", command);
            cache.insert(command.to_string(), output.to_string());
        }
    }

    /// Drop all cached output.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

/// Reads the current attributes of one node.
#[async_trait]
pub trait Reader: Send + Sync {
    /// Node data produced by this reader.
    type Data: Serialize + Send;

    fn kind(&self) -> ReadKind {
        ReadKind::Config
    }

    /// Whether this reader handles `path`. Used by composite readers.
    fn applies_to(&self, _path: &Path) -> bool {
        true
    }

    /// Read the node at `path`. `Ok(None)` means the node does not exist
    /// on the device.
    async fn read_current_attributes(
        &self,
        path: &Path,
        ctx: &ReadContext,
    ) -> Result<Option<Self::Data>, ReadFailed>;
}

/// Reader for a list node: can also enumerate the keys of its items.
#[async_trait]
pub trait ListReader: Reader {
    /// Keys of all items of the list at `path` (the list path, without a
    /// key), in device order.
    async fn get_all_ids(&self, path: &Path, ctx: &ReadContext) -> Result<Vec<String>, ReadFailed>;
}

/// Type-erased reader, as stored in the registry.
#[async_trait]
pub trait NodeReader: Send + Sync {
    fn kind(&self) -> ReadKind;

    fn applies_to(&self, path: &Path) -> bool;

    async fn read(&self, path: &Path, ctx: &ReadContext) -> Result<Option<Value>, ReadFailed>;

    /// List item keys, or `None` for readers of non-list nodes.
    async fn list_ids(
        &self,
        path: &Path,
        ctx: &ReadContext,
    ) -> Result<Option<Vec<String>>, ReadFailed>;
}

fn to_node<T: Serialize>(path: &Path, data: Option<T>) -> Result<Option<Value>, ReadFailed> {
    data.map(|data| serde_json::to_value(data).map_err(|e| ReadFailed::invalid(path, e.to_string())))
        .transpose()
}

/// Adapter exposing a [`Reader`] as a [`NodeReader`].
pub struct ReaderAdapter<R>(pub R);

#[async_trait]
impl<R: Reader> NodeReader for ReaderAdapter<R> {
    fn kind(&self) -> ReadKind {
        self.0.kind()
    }

    fn applies_to(&self, path: &Path) -> bool {
        self.0.applies_to(path)
    }

    async fn read(&self, path: &Path, ctx: &ReadContext) -> Result<Option<Value>, ReadFailed> {
        let data = self.0.read_current_attributes(path, ctx).await?;
        to_node(path, data)
    }

    async fn list_ids(&self, _path: &Path, _ctx: &ReadContext) -> Result<Option<Vec<String>>, ReadFailed> {
        Ok(None)
    }
}

/// Adapter exposing a [`ListReader`] as a [`NodeReader`].
pub struct ListReaderAdapter<R>(pub R);

#[async_trait]
impl<R: ListReader> NodeReader for ListReaderAdapter<R> {
    fn kind(&self) -> ReadKind {
        self.0.kind()
    }

    fn applies_to(&self, path: &Path) -> bool {
        self.0.applies_to(path)
    }

    async fn read(&self, path: &Path, ctx: &ReadContext) -> Result<Option<Value>, ReadFailed> {
        let data = self.0.read_current_attributes(path, ctx).await?;
        to_node(path, data)
    }

    async fn list_ids(&self, path: &Path, ctx: &ReadContext) -> Result<Option<Vec<String>>, ReadFailed> {
        self.0.get_all_ids(path, ctx).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_context_cache() {
        let ctx = ReadContext::new();
        assert_eq!(ctx.cached("show run"), None);

        ctx.store("show run", "hostname R1");
        assert_eq!(ctx.cached("show run").as_deref(), Some("hostname R1"));

        ctx.clear();
        assert_eq!(ctx.cached("show run"), None);
    }

    #[test]
    fn test_read_context_kind_filter() {
        assert!(ReadContext::new().includes(ReadKind::Operational));
        let config = ReadContext::of_kind(ReadKind::Config);
        assert!(config.includes(ReadKind::Config));
        assert!(!config.includes(ReadKind::Operational));
    }
}
