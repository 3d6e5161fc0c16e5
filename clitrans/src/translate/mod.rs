//! Translation between the neutral configuration tree and device CLIs.
//!
//! Vendor modules bind [`Reader`]s and [`Writer`]s to schema paths. The
//! registries dispatch instance [`Path`]s to them; writers run in an order
//! fixed once, at registry build time, from their `add_after` constraints.

mod composite;
pub mod parsing;
mod path;
mod reader;
mod registry;
mod transaction;
mod writer;

pub use composite::{CompositeMode, CompositeReader, CompositeWriter};
pub use path::{Path, PathSegment, SchemaPath};
pub use reader::{
    ListReader, ListReaderAdapter, NodeReader, ReadContext, ReadKind, Reader, ReaderAdapter,
};
pub use registry::{ReaderRegistry, ReaderRegistryBuilder, WriterRegistry, WriterRegistryBuilder};
pub use transaction::Modification;
pub use writer::{NodeWriter, NoopWriter, Writer, WriterAdapter, check_unsupported};
