//! Purpose: Collect per-column extraction rules and compile them into one row populate step.
//! Exports: `ColumnRule`, `ProjectionSpec`, `CompiledProjection`.
//! Role: Entry point for typed record sequences; opens cursors over iterators and streams.
//! Invariants: Rules are append-only and frozen by the first publish of projection or schema.
//! Invariants: Projection and schema are built at most once and shared read-only.
//! Notes: Compilation interprets the frozen rule list (one indirect call per cell) instead of
//! generating code for each projection.

use std::borrow::Borrow;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio_stream::Stream;
use tracing::debug;

use crate::core::cell::{Cell, CellKind, ColumnType, IntoCell};
use crate::core::cursor::RecordCursor;
use crate::core::error::{Error, ErrorKind};
use crate::core::schema::SchemaDescriptor;
use crate::core::source::{PullSource, SequenceAdapter, StreamSource};

type SelectFn<R, C> = dyn Fn(&R, &C) -> Cell + Send + Sync;

/// One column: how to extract it from a record and what type it declares.
pub struct ColumnRule<R, C = ()> {
    select: Arc<SelectFn<R, C>>,
    kind: CellKind,
    nullable: bool,
}

impl<R: 'static, C: 'static> ColumnRule<R, C> {
    /// Rule over the record alone.
    pub fn new<T, F>(select: F) -> Self
    where
        T: ColumnType + IntoCell,
        F: Fn(&R) -> T + Send + Sync + 'static,
    {
        Self::with_context(move |record: &R, _: &C| select(record))
    }

    /// Rule that also reads the out-of-band context passed when a cursor is opened.
    pub fn with_context<T, F>(select: F) -> Self
    where
        T: ColumnType + IntoCell,
        F: Fn(&R, &C) -> T + Send + Sync + 'static,
    {
        Self {
            select: Arc::new(move |record: &R, context: &C| select(record, context).into_cell()),
            kind: T::KIND,
            nullable: T::NULLABLE,
        }
    }

    /// Rule producing cells directly, with an explicitly declared type.
    pub fn from_cells<F>(kind: CellKind, nullable: bool, select: F) -> Self
    where
        F: Fn(&R, &C) -> Cell + Send + Sync + 'static,
    {
        Self {
            select: Arc::new(select),
            kind,
            nullable,
        }
    }
}

impl<R, C> ColumnRule<R, C> {
    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }
}

impl<R, C> Clone for ColumnRule<R, C> {
    fn clone(&self) -> Self {
        Self {
            select: Arc::clone(&self.select),
            kind: self.kind,
            nullable: self.nullable,
        }
    }
}

impl<R, C> fmt::Debug for ColumnRule<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnRule")
            .field("kind", &self.kind)
            .field("nullable", &self.nullable)
            .finish_non_exhaustive()
    }
}

/// Frozen batch function writing every column of one record into a row buffer.
pub struct CompiledProjection<R, C = ()> {
    rules: Arc<[ColumnRule<R, C>]>,
}

impl<R, C> CompiledProjection<R, C> {
    fn compile(rules: &[ColumnRule<R, C>]) -> Self {
        debug!(columns = rules.len(), "compiled row projection");
        Self {
            rules: rules.iter().cloned().collect(),
        }
    }

    pub fn field_count(&self) -> usize {
        self.rules.len()
    }

    /// Overwrite `row` in place with the columns of `record`.
    pub fn populate(&self, row: &mut [Cell], record: &R, context: &C) {
        debug_assert_eq!(row.len(), self.rules.len());
        for (slot, rule) in row.iter_mut().zip(self.rules.iter()) {
            *slot = (rule.select)(record, context);
        }
    }
}

impl<R, C> fmt::Debug for CompiledProjection<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledProjection")
            .field("columns", &self.rules.len())
            .finish()
    }
}

/// Ordered column rules over records of type `R`, optionally reading a context `C`.
pub struct ProjectionSpec<R, C = ()> {
    rules: Vec<ColumnRule<R, C>>,
    projection: OnceLock<Arc<CompiledProjection<R, C>>>,
    schema: OnceLock<Arc<SchemaDescriptor>>,
}

impl<R, C> ProjectionSpec<R, C> {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            projection: OnceLock::new(),
            schema: OnceLock::new(),
        }
    }

    /// Append a column extracted from the record.
    pub fn add<T, F>(&mut self, select: F) -> Result<&mut Self, Error>
    where
        R: 'static,
        C: 'static,
        T: ColumnType + IntoCell,
        F: Fn(&R) -> T + Send + Sync + 'static,
    {
        self.add_rule(ColumnRule::new(select))
    }

    /// Append a column extracted from the record and the cursor's context.
    pub fn add_with_context<T, F>(&mut self, select: F) -> Result<&mut Self, Error>
    where
        R: 'static,
        C: 'static,
        T: ColumnType + IntoCell,
        F: Fn(&R, &C) -> T + Send + Sync + 'static,
    {
        self.add_rule(ColumnRule::with_context(select))
    }

    pub fn add_rule(&mut self, rule: ColumnRule<R, C>) -> Result<&mut Self, Error> {
        if self.is_published() {
            return Err(Error::new(ErrorKind::InvalidState)
                .with_message("a row source has already been created from this projection"));
        }
        self.rules.push(rule);
        Ok(self)
    }

    pub fn field_count(&self) -> usize {
        self.rules.len()
    }

    pub fn is_published(&self) -> bool {
        self.projection.get().is_some() || self.schema.get().is_some()
    }

    /// Compiled projection, built on first use.
    pub fn projection(&self) -> Arc<CompiledProjection<R, C>> {
        Arc::clone(
            self.projection
                .get_or_init(|| Arc::new(CompiledProjection::compile(&self.rules))),
        )
    }

    /// Schema descriptor, built on first use.
    pub fn schema(&self) -> Arc<SchemaDescriptor> {
        Arc::clone(self.schema.get_or_init(|| {
            Arc::new(SchemaDescriptor::from_columns(
                self.rules.iter().map(|rule| (rule.kind, rule.nullable)),
            ))
        }))
    }

    /// Open a cursor over any pull source whose items borrow as `R`.
    pub fn open<S>(&self, source: S, context: C) -> RecordCursor<S, R, C>
    where
        S: PullSource,
        S::Item: Borrow<R>,
    {
        RecordCursor::new(source, self.projection(), self.schema(), context)
    }

    /// Open a cursor over a synchronous sequence.
    pub fn open_iter<I>(
        &self,
        items: I,
        context: C,
    ) -> RecordCursor<SequenceAdapter<I::IntoIter>, R, C>
    where
        I: IntoIterator,
        I::IntoIter: Send,
        I::Item: Borrow<R> + Send,
    {
        self.open(SequenceAdapter::new(items), context)
    }

    /// Open a cursor over an asynchronous stream.
    pub fn open_stream<S>(&self, stream: S, context: C) -> RecordCursor<StreamSource<S>, R, C>
    where
        S: Stream + Unpin + Send,
        S::Item: Borrow<R> + Send,
    {
        self.open(StreamSource::new(stream), context)
    }
}

impl<R, C> Default for ProjectionSpec<R, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, C> fmt::Debug for ProjectionSpec<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionSpec")
            .field("rules", &self.rules)
            .field("published", &self.is_published())
            .finish()
    }
}
