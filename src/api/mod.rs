//! Purpose: Define the public Rust API boundary for rowfeed.
//! Exports: Projection specs, cursors, pull sources, cells, errors, client boundary, bulk load.
//! Role: Public, additive-only surface; hides internal engine modules.
//! Invariants: This module is the only public path to engine types.
//! Invariants: Internal modules remain private and are not directly exposed.

mod bulk;
mod reader;

pub use crate::core::cell::{Cell, CellKind, ColumnType, FromCell, IntoCell};
pub use crate::core::cursor::{CursorState, RecordCursor, RowSource};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::projection::{ColumnRule, CompiledProjection, ProjectionSpec};
pub use crate::core::raw::RawRowReader;
pub use crate::core::schema::{ColumnDescriptor, SchemaDescriptor, UNKNOWN_SIZE};
pub use crate::core::source::{PullSource, SequenceAdapter, StreamSource, TryStreamSource};
pub use bulk::{
    BulkLoadOptions, BulkLoadOutcome, CollectSink, DEFAULT_BATCH_SIZE, JsonlSink, RowSink,
    bulk_load, bulk_load_async,
};
pub use reader::{ApiResult, ClientReader, Rows, TableValuedParameter};
pub use tokio_util::sync::CancellationToken;
