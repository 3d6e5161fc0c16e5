//! Writer contracts.
//!
//! Vendor writers implement [`Writer`] against their own data types and are
//! invoked with the before/after data of a node. [`NodeWriter`] is the
//! type-erased form the registry drives.

use async_trait::async_trait;
use log::{trace, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::Path;
use crate::error::{WriteCause, WriteFailed, WriteKind};

/// Applies changes of one node to the device.
#[async_trait]
pub trait Writer: Send + Sync {
    /// Node data consumed by this writer.
    type Data: DeserializeOwned + Serialize + Send + Sync;

    /// Whether this writer handles `path`. Used by composite writers.
    fn applies_to(&self, _path: &Path) -> bool {
        true
    }

    /// Create the node at `path`.
    async fn write_current_attributes(&self, path: &Path, after: &Self::Data) -> Result<(), WriteFailed>;

    /// Change the node at `path` from `before` to `after`.
    ///
    /// Deletes `before` and writes `after`. Devices do not apply that pair
    /// atomically and briefly run without the node, so writers whose nodes
    /// carry sessions or traffic (BGP neighbors, address families) should
    /// override this with an in-place diff.
    async fn update_current_attributes(
        &self,
        path: &Path,
        before: &Self::Data,
        after: &Self::Data,
    ) -> Result<(), WriteFailed> {
        warn!("{}: updating by delete then write", path);
        let relabel = |err: WriteFailed| err.into_update(to_json(before), to_json(after));
        self.delete_current_attributes(path, before).await.map_err(relabel)?;
        self.write_current_attributes(path, after).await.map_err(relabel)
    }

    /// Remove the node at `path`.
    async fn delete_current_attributes(&self, path: &Path, before: &Self::Data) -> Result<(), WriteFailed>;
}

/// Type-erased writer, as stored in the registry.
#[async_trait]
pub trait NodeWriter: Send + Sync {
    fn applies_to(&self, path: &Path) -> bool;

    async fn write(&self, path: &Path, after: &Value) -> Result<(), WriteFailed>;

    async fn update(&self, path: &Path, before: &Value, after: &Value) -> Result<(), WriteFailed>;

    async fn delete(&self, path: &Path, before: &Value) -> Result<(), WriteFailed>;
}

/// Adapter exposing a [`Writer`] as a [`NodeWriter`].
pub struct WriterAdapter<W>(pub W);

impl<W: Writer> WriterAdapter<W> {
    fn decode(
        kind: WriteKind,
        path: &Path,
        before: Option<&Value>,
        after: Option<&Value>,
        data: &Value,
    ) -> Result<W::Data, WriteFailed> {
        serde_json::from_value(data.clone()).map_err(|e| {
            kind.failed(
                path,
                before.cloned(),
                after.cloned(),
                WriteCause::Invalid(e.to_string()),
            )
        })
    }
}

#[async_trait]
impl<W: Writer> NodeWriter for WriterAdapter<W> {
    fn applies_to(&self, path: &Path) -> bool {
        self.0.applies_to(path)
    }

    async fn write(&self, path: &Path, after: &Value) -> Result<(), WriteFailed> {
        let data = Self::decode(WriteKind::Create, path, None, Some(after), after)?;
        self.0.write_current_attributes(path, &data).await
    }

    async fn update(&self, path: &Path, before: &Value, after: &Value) -> Result<(), WriteFailed> {
        let old = Self::decode(WriteKind::Update, path, Some(before), Some(after), before)?;
        let new = Self::decode(WriteKind::Update, path, Some(before), Some(after), after)?;
        self.0.update_current_attributes(path, &old, &new).await
    }

    async fn delete(&self, path: &Path, before: &Value) -> Result<(), WriteFailed> {
        let data = Self::decode(WriteKind::Delete, path, Some(before), None, before)?;
        self.0.delete_current_attributes(path, &data).await
    }
}

/// Writer for structural containers that have no device commands of
/// their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopWriter;

#[async_trait]
impl NodeWriter for NoopWriter {
    fn applies_to(&self, _path: &Path) -> bool {
        true
    }

    async fn write(&self, path: &Path, _after: &Value) -> Result<(), WriteFailed> {
        trace!("{}: nothing to write", path);
        Ok(())
    }

    async fn update(&self, path: &Path, _before: &Value, _after: &Value) -> Result<(), WriteFailed> {
        trace!("{}: nothing to update", path);
        Ok(())
    }

    async fn delete(&self, path: &Path, _before: &Value) -> Result<(), WriteFailed> {
        trace!("{}: nothing to delete", path);
        Ok(())
    }
}

/// Fail a write when `unsupported` holds. Writers use this to refuse data
/// the device cannot express before any command is sent.
pub fn check_unsupported(
    unsupported: bool,
    kind: WriteKind,
    path: &Path,
    message: impl Into<String>,
) -> Result<(), WriteFailed> {
    if unsupported {
        return Err(kind.failed(path, None, None, WriteCause::Invalid(message.into())));
    }
    Ok(())
}

pub(crate) fn to_json<D: Serialize + ?Sized>(data: &D) -> Option<Value> {
    serde_json::to_value(data).ok()
}
