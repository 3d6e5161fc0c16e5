//! Reader and writer registries.
//!
//! Built once per device session from the module's handler bindings and
//! immutable afterwards. Writer ordering is resolved at build time.

use std::collections::HashMap;

use indexmap::IndexMap;
use log::{debug, trace};
use serde_json::Value;

use super::reader::{self, ListReader, NodeReader, ReadContext, Reader};
use super::writer::{self, NodeWriter, Writer};
use super::{Path, SchemaPath};
use crate::error::{RegistryError, Result};

/// Collects readers before a [`ReaderRegistry`] is built.
#[derive(Default)]
pub struct ReaderRegistryBuilder {
    readers: IndexMap<SchemaPath, Box<dyn NodeReader>>,
}

impl ReaderRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reader for a container or leaf node.
    pub fn add<R: Reader + 'static>(
        &mut self,
        path: impl Into<SchemaPath>,
        reader: R,
    ) -> std::result::Result<&mut Self, RegistryError> {
        self.add_node(path, reader::ReaderAdapter(reader))
    }

    /// Register a reader for a list node.
    pub fn add_list<R: ListReader + 'static>(
        &mut self,
        path: impl Into<SchemaPath>,
        reader: R,
    ) -> std::result::Result<&mut Self, RegistryError> {
        self.add_node(path, reader::ListReaderAdapter(reader))
    }

    /// Register an already type-erased reader, such as a composite.
    pub fn add_node(
        &mut self,
        path: impl Into<SchemaPath>,
        reader: impl NodeReader + 'static,
    ) -> std::result::Result<&mut Self, RegistryError> {
        let path = path.into();
        if self.readers.contains_key(&path) {
            return Err(RegistryError::DuplicateHandler {
                path: path.to_string(),
            });
        }
        trace!("registering reader for {}", path);
        self.readers.insert(path, Box::new(reader));
        Ok(self)
    }

    pub fn build(self) -> ReaderRegistry {
        ReaderRegistry {
            readers: self.readers,
        }
    }
}

/// Readers by schema path.
#[derive(Default)]
pub struct ReaderRegistry {
    readers: IndexMap<SchemaPath, Box<dyn NodeReader>>,
}

impl ReaderRegistry {
    fn reader(&self, path: &Path) -> std::result::Result<&dyn NodeReader, RegistryError> {
        self.readers
            .get(&path.schema())
            .map(|r| r.as_ref())
            .ok_or_else(|| RegistryError::NoReader {
                path: path.to_string(),
            })
    }

    /// Read the node at `path`. `Ok(None)` when the node is absent on the
    /// device, its reader does not apply to `path`, or the reader's kind is
    /// excluded by `ctx`.
    pub async fn read(&self, path: &Path, ctx: &ReadContext) -> Result<Option<Value>> {
        let reader = self.reader(path)?;
        if !ctx.includes(reader.kind()) || !reader.applies_to(path) {
            return Ok(None);
        }
        debug!("reading {}", path);
        Ok(reader.read(path, ctx).await?)
    }

    /// Keys of the items of the list at `path`.
    pub async fn list_ids(&self, path: &Path, ctx: &ReadContext) -> Result<Vec<String>> {
        let reader = self.reader(path)?;
        if !ctx.includes(reader.kind()) {
            return Ok(Vec::new());
        }
        match reader.list_ids(path, ctx).await? {
            Some(ids) => Ok(ids),
            None => Err(RegistryError::NotAList {
                path: path.to_string(),
            }
            .into()),
        }
    }

    /// Read every item of the list at `path`, in list order.
    pub async fn read_all(&self, path: &Path, ctx: &ReadContext) -> Result<Vec<(Path, Value)>> {
        let mut items = Vec::new();
        for id in self.list_ids(path, ctx).await? {
            let item = path.clone().with_key(id);
            if let Some(value) = self.read(&item, ctx).await? {
                items.push((item, value));
            }
        }
        Ok(items)
    }

    pub fn contains(&self, path: &SchemaPath) -> bool {
        self.readers.contains_key(path)
    }

    /// Registered paths, in registration order.
    pub fn paths(&self) -> impl Iterator<Item = &SchemaPath> {
        self.readers.keys()
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

struct Entry {
    writer: Box<dyn NodeWriter>,
    after: Vec<SchemaPath>,
}

/// Collects writers and their ordering constraints before a
/// [`WriterRegistry`] is built.
#[derive(Default)]
pub struct WriterRegistryBuilder {
    writers: IndexMap<SchemaPath, Entry>,
}

impl WriterRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a writer with no ordering constraint.
    pub fn add<W: Writer + 'static>(
        &mut self,
        path: impl Into<SchemaPath>,
        writer: W,
    ) -> std::result::Result<&mut Self, RegistryError> {
        self.add_node_after(path, writer::WriterAdapter(writer), Vec::<SchemaPath>::new())
    }

    /// Register a writer that must run after the writers of `dependencies`.
    pub fn add_after<W, I, P>(
        &mut self,
        path: impl Into<SchemaPath>,
        writer: W,
        dependencies: I,
    ) -> std::result::Result<&mut Self, RegistryError>
    where
        W: Writer + 'static,
        I: IntoIterator<Item = P>,
        P: Into<SchemaPath>,
    {
        self.add_node_after(path, writer::WriterAdapter(writer), dependencies)
    }

    /// Register an already type-erased writer, such as a composite or
    /// [`NoopWriter`](super::NoopWriter).
    pub fn add_node(
        &mut self,
        path: impl Into<SchemaPath>,
        writer: impl NodeWriter + 'static,
    ) -> std::result::Result<&mut Self, RegistryError> {
        self.add_node_after(path, writer, Vec::<SchemaPath>::new())
    }

    /// Type-erased form of [`add_after`](Self::add_after).
    pub fn add_node_after<I, P>(
        &mut self,
        path: impl Into<SchemaPath>,
        writer: impl NodeWriter + 'static,
        dependencies: I,
    ) -> std::result::Result<&mut Self, RegistryError>
    where
        I: IntoIterator<Item = P>,
        P: Into<SchemaPath>,
    {
        let path = path.into();
        if self.writers.contains_key(&path) {
            return Err(RegistryError::DuplicateHandler {
                path: path.to_string(),
            });
        }
        let after: Vec<SchemaPath> = dependencies.into_iter().map(Into::into).collect();
        trace!("registering writer for {} after {:?}", path, after);
        self.writers.insert(
            path,
            Entry {
                writer: Box::new(writer),
                after,
            },
        );
        Ok(self)
    }

    /// Resolve the ordering constraints into one execution order.
    ///
    /// The order is a topological sort that keeps registration order
    /// wherever the constraints allow it.
    pub fn build(self) -> std::result::Result<WriterRegistry, RegistryError> {
        for (path, entry) in &self.writers {
            if let Some(missing) = entry.after.iter().find(|dep| !self.writers.contains_key(*dep)) {
                return Err(RegistryError::UnknownDependency {
                    path: path.to_string(),
                    dependency: missing.to_string(),
                });
            }
        }

        let mut pending: Vec<(SchemaPath, Entry)> = self.writers.into_iter().collect();
        let mut ordered: Vec<(SchemaPath, Box<dyn NodeWriter>)> = Vec::with_capacity(pending.len());

        while !pending.is_empty() {
            let ready = pending.iter().position(|(_, entry)| {
                entry
                    .after
                    .iter()
                    .all(|dep| ordered.iter().any(|(done, _)| done == dep))
            });
            match ready {
                Some(i) => {
                    let (path, entry) = pending.remove(i);
                    ordered.push((path, entry.writer));
                }
                None => {
                    return Err(RegistryError::OrderingCycle {
                        paths: pending.iter().map(|(path, _)| path.to_string()).collect(),
                    });
                }
            }
        }

        let index = ordered
            .iter()
            .enumerate()
            .map(|(i, (path, _))| (path.clone(), i))
            .collect();
        debug!(
            "writer order: {:?}",
            ordered.iter().map(|(path, _)| path.to_string()).collect::<Vec<_>>()
        );
        Ok(WriterRegistry {
            writers: ordered,
            index,
        })
    }
}

/// Writers in execution order.
#[derive(Default)]
pub struct WriterRegistry {
    writers: Vec<(SchemaPath, Box<dyn NodeWriter>)>,
    index: HashMap<SchemaPath, usize>,
}

impl WriterRegistry {
    /// Registered paths in execution order.
    pub fn order(&self) -> impl Iterator<Item = &SchemaPath> {
        self.writers.iter().map(|(path, _)| path)
    }

    /// Position of `path` in the execution order.
    pub fn position(&self, path: &SchemaPath) -> Option<usize> {
        self.index.get(path).copied()
    }

    pub(crate) fn writer_at(&self, position: usize) -> &dyn NodeWriter {
        self.writers[position].1.as_ref()
    }

    pub fn contains(&self, path: &SchemaPath) -> bool {
        self.index.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}
