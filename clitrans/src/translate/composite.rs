//! Several handlers registered for one path.
//!
//! Each child decides on its own whether it applies to a path (typically
//! by interface name prefix). The composite either hands the call to the
//! first applicable child or to all of them.

use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use super::reader::{NodeReader, ReadContext, ReadKind};
use super::writer::NodeWriter;
use super::Path;
use crate::error::{ReadFailed, WriteCause, WriteFailed, WriteKind};

/// How a composite picks children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompositeMode {
    /// Only the first applicable child runs.
    #[default]
    FirstApplicable,
    /// Every applicable child runs, in registration order. Reader results
    /// are merged field by field, later children winning.
    MergeAll,
}

/// Readers sharing one path.
pub struct CompositeReader {
    mode: CompositeMode,
    children: Vec<Box<dyn NodeReader>>,
}

impl CompositeReader {
    pub fn new(mode: CompositeMode) -> Self {
        Self {
            mode,
            children: Vec::new(),
        }
    }

    /// Append a child.
    pub fn with(mut self, reader: impl NodeReader + 'static) -> Self {
        self.children.push(Box::new(reader));
        self
    }

    fn applicable<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = &'a dyn NodeReader> + 'a {
        let take = match self.mode {
            CompositeMode::FirstApplicable => 1,
            CompositeMode::MergeAll => usize::MAX,
        };
        self.children
            .iter()
            .map(|child| child.as_ref())
            .filter(move |child| child.applies_to(path))
            .take(take)
    }
}

#[async_trait]
impl NodeReader for CompositeReader {
    fn kind(&self) -> ReadKind {
        self.children
            .first()
            .map(|child| child.kind())
            .unwrap_or_default()
    }

    fn applies_to(&self, path: &Path) -> bool {
        self.children.iter().any(|child| child.applies_to(path))
    }

    async fn read(&self, path: &Path, ctx: &ReadContext) -> Result<Option<Value>, ReadFailed> {
        let mut merged: Option<Value> = None;
        for child in self.applicable(path) {
            if let Some(value) = child.read(path, ctx).await? {
                merged = Some(match merged {
                    Some(current) => merge(current, value),
                    None => value,
                });
            }
        }
        Ok(merged)
    }

    async fn list_ids(&self, path: &Path, ctx: &ReadContext) -> Result<Option<Vec<String>>, ReadFailed> {
        let mut ids: Option<Vec<String>> = None;
        for child in self.applicable(path) {
            if let Some(found) = child.list_ids(path, ctx).await? {
                let all = ids.get_or_insert_with(Vec::new);
                for id in found {
                    if !all.contains(&id) {
                        all.push(id);
                    }
                }
            }
        }
        Ok(ids)
    }
}

/// Writers sharing one path.
pub struct CompositeWriter {
    mode: CompositeMode,
    children: Vec<Box<dyn NodeWriter>>,
}

impl CompositeWriter {
    pub fn new(mode: CompositeMode) -> Self {
        Self {
            mode,
            children: Vec::new(),
        }
    }

    /// Append a child.
    pub fn with(mut self, writer: impl NodeWriter + 'static) -> Self {
        self.children.push(Box::new(writer));
        self
    }

    /// Applicable children, or a failure naming the path when there are
    /// none.
    fn select(
        &self,
        kind: WriteKind,
        path: &Path,
        before: Option<&Value>,
        after: Option<&Value>,
    ) -> Result<Vec<&dyn NodeWriter>, WriteFailed> {
        let applicable: Vec<&dyn NodeWriter> = self
            .children
            .iter()
            .map(|child| child.as_ref())
            .filter(|child| child.applies_to(path))
            .collect();

        if applicable.is_empty() {
            debug!("{}: no composite child applies", path);
            return Err(kind.failed(
                path,
                before.cloned(),
                after.cloned(),
                WriteCause::Invalid(format!("no writer applies to {}", path)),
            ));
        }
        Ok(match self.mode {
            CompositeMode::FirstApplicable => applicable.into_iter().take(1).collect(),
            CompositeMode::MergeAll => applicable,
        })
    }
}

#[async_trait]
impl NodeWriter for CompositeWriter {
    fn applies_to(&self, path: &Path) -> bool {
        self.children.iter().any(|child| child.applies_to(path))
    }

    async fn write(&self, path: &Path, after: &Value) -> Result<(), WriteFailed> {
        for child in self.select(WriteKind::Create, path, None, Some(after))? {
            child.write(path, after).await?;
        }
        Ok(())
    }

    async fn update(&self, path: &Path, before: &Value, after: &Value) -> Result<(), WriteFailed> {
        for child in self.select(WriteKind::Update, path, Some(before), Some(after))? {
            child.update(path, before, after).await?;
        }
        Ok(())
    }

    async fn delete(&self, path: &Path, before: &Value) -> Result<(), WriteFailed> {
        for child in self.select(WriteKind::Delete, path, Some(before), None)? {
            child.delete(path, before).await?;
        }
        Ok(())
    }
}

/// Shallow merge of two objects; for anything else `overlay` wins.
fn merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                if !value.is_null() {
                    base.insert(key, value);
                }
            }
            Value::Object(base)
        }
        (_, overlay) => overlay,
    }
}
