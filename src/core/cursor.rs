//! Purpose: Forward-only tabular cursor over a pull source and a compiled projection.
//! Exports: `CursorState`, `RowSource`, `RecordCursor`.
//! Role: The object database clients drive for table-valued parameters and bulk loads.
//! Invariants: `NotStarted -> Open -> Closed`; Closed is terminal and close is idempotent.
//! Invariants: The source is released exactly once, on exhaustion, on close, or when a pull fails.
//! Invariants: Column access is valid only while Open and reflects the last successful read.

use std::borrow::Borrow;
use std::future::{self, Future};
use std::sync::Arc;

use rust_decimal::Decimal;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::cell::{self, Cell, CellKind, FromCell};
use crate::core::error::{Error, ErrorKind};
use crate::core::projection::CompiledProjection;
use crate::core::schema::{SchemaDescriptor, column_name, parse_column_name};
use crate::core::source::PullSource;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CursorState {
    NotStarted,
    Open,
    Closed,
}

/// Narrow forward-only row source contract shared by every cursor flavor.
pub trait RowSource {
    /// Number of columns. May pull a lookahead row for sources without a fixed shape.
    fn field_count(&mut self) -> Result<usize, Error>;

    /// Async form of [`RowSource::field_count`].
    fn field_count_async<'a>(
        &'a mut self,
        cancel: &'a CancellationToken,
    ) -> impl Future<Output = Result<usize, Error>> + Send + 'a;

    /// Advance to the next row; `Ok(false)` once exhausted and on every later call.
    fn read(&mut self) -> Result<bool, Error>;

    /// Async form of [`RowSource::read`]; `cancel` is forwarded to the upstream pull.
    fn read_async<'a>(
        &'a mut self,
        cancel: &'a CancellationToken,
    ) -> impl Future<Output = Result<bool, Error>> + Send + 'a;

    fn state(&self) -> CursorState;

    /// Current row buffer; `ContractViolation` unless Open.
    fn row(&self) -> Result<&[Cell], Error>;

    fn schema(&self) -> Result<Arc<SchemaDescriptor>, Error>;

    fn close(&mut self);

    fn is_closed(&self) -> bool {
        self.state() == CursorState::Closed
    }

    fn value(&self, ordinal: usize) -> Result<&Cell, Error> {
        let row = self.row().map_err(|err| err.with_ordinal(ordinal))?;
        row.get(ordinal)
            .ok_or_else(|| Error::out_of_range(ordinal, row.len()))
    }

    /// Copy as many leading cells as fit into `out`; returns the count copied.
    fn values(&self, out: &mut [Cell]) -> Result<usize, Error> {
        let row = self.row()?;
        let count = out.len().min(row.len());
        out[..count].clone_from_slice(&row[..count]);
        Ok(count)
    }

    fn is_null(&self, ordinal: usize) -> Result<bool, Error> {
        Ok(self.value(ordinal)?.is_null())
    }

    fn get<'a, T: FromCell<'a>>(&'a self, ordinal: usize) -> Result<T, Error> {
        self.value(ordinal)?
            .get()
            .map_err(|err| err.with_ordinal(ordinal))
    }

    fn get_bool(&self, ordinal: usize) -> Result<bool, Error> {
        self.get(ordinal)
    }

    fn get_u8(&self, ordinal: usize) -> Result<u8, Error> {
        self.get(ordinal)
    }

    fn get_char(&self, ordinal: usize) -> Result<char, Error> {
        self.get(ordinal)
    }

    fn get_i16(&self, ordinal: usize) -> Result<i16, Error> {
        self.get(ordinal)
    }

    fn get_i32(&self, ordinal: usize) -> Result<i32, Error> {
        self.get(ordinal)
    }

    fn get_i64(&self, ordinal: usize) -> Result<i64, Error> {
        self.get(ordinal)
    }

    fn get_f32(&self, ordinal: usize) -> Result<f32, Error> {
        self.get(ordinal)
    }

    fn get_f64(&self, ordinal: usize) -> Result<f64, Error> {
        self.get(ordinal)
    }

    fn get_decimal(&self, ordinal: usize) -> Result<Decimal, Error> {
        self.get(ordinal)
    }

    fn get_datetime(&self, ordinal: usize) -> Result<OffsetDateTime, Error> {
        self.get(ordinal)
    }

    fn get_guid(&self, ordinal: usize) -> Result<Uuid, Error> {
        self.get(ordinal)
    }

    fn get_str(&self, ordinal: usize) -> Result<&str, Error> {
        self.get(ordinal)
    }

    fn get_json(&self, ordinal: usize) -> Result<&serde_json::Value, Error> {
        self.get(ordinal)
    }

    /// Windowed copy from a byte column starting at `offset`.
    fn get_bytes(
        &self,
        ordinal: usize,
        offset: usize,
        buf: &mut [u8],
        buf_offset: usize,
        len: usize,
    ) -> Result<usize, Error> {
        let bytes: &[u8] = self.get(ordinal)?;
        cell::copy_window(bytes, offset, buf, buf_offset, len)
            .map_err(|err| err.with_ordinal(ordinal))
    }

    /// Windowed copy from a text column, counted in chars.
    fn get_chars(
        &self,
        ordinal: usize,
        offset: usize,
        buf: &mut [char],
        buf_offset: usize,
        len: usize,
    ) -> Result<usize, Error> {
        let text: &str = self.get(ordinal)?;
        cell::copy_char_window(text, offset, buf, buf_offset, len)
            .map_err(|err| err.with_ordinal(ordinal))
    }

    fn name(&self, ordinal: usize) -> Option<String> {
        let schema = self.schema().ok()?;
        (ordinal < schema.len()).then(|| column_name(ordinal))
    }

    fn ordinal(&self, name: &str) -> Option<usize> {
        let schema = self.schema().ok()?;
        parse_column_name(name, schema.len())
    }

    /// Kind of the current value, or the declared kind when it is null or no row is current.
    fn field_type(&self, ordinal: usize) -> Result<CellKind, Error> {
        if let Ok(Some(kind)) = self.value(ordinal).map(Cell::kind) {
            return Ok(kind);
        }
        let schema = self.schema()?;
        schema
            .column(ordinal)
            .map(|column| column.data_type)
            .ok_or_else(|| Error::out_of_range(ordinal, schema.len()))
    }

    fn data_type_name(&self, ordinal: usize) -> Result<&'static str, Error> {
        self.field_type(ordinal).map(CellKind::type_name)
    }
}

/// Cursor projecting each pulled record through a shared compiled projection.
pub struct RecordCursor<S, R, C = ()> {
    source: S,
    projection: Arc<CompiledProjection<R, C>>,
    schema: Arc<SchemaDescriptor>,
    context: C,
    row: Vec<Cell>,
    state: CursorState,
    rows_read: u64,
}

impl<S, R, C> RecordCursor<S, R, C>
where
    S: PullSource,
    S::Item: Borrow<R>,
{
    pub(crate) fn new(
        source: S,
        projection: Arc<CompiledProjection<R, C>>,
        schema: Arc<SchemaDescriptor>,
        context: C,
    ) -> Self {
        let row = vec![Cell::Null; projection.field_count()];
        Self {
            source,
            projection,
            schema,
            context,
            row,
            state: CursorState::NotStarted,
            rows_read: 0,
        }
    }

    /// Fixed by the projection; valid in every state.
    pub fn field_count(&self) -> usize {
        self.row.len()
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn read(&mut self) -> Result<bool, Error> {
        if self.state == CursorState::Closed {
            return Ok(false);
        }
        let pulled = self.source.advance_blocking();
        self.settle(pulled)
    }

    pub async fn read_async(&mut self, cancel: &CancellationToken) -> Result<bool, Error> {
        if self.state == CursorState::Closed {
            return Ok(false);
        }
        let pulled = self.source.advance(cancel).await;
        self.settle(pulled)
    }

    pub fn close(&mut self) {
        if self.state == CursorState::Closed {
            return;
        }
        self.source.release();
        self.state = CursorState::Closed;
        debug!(rows = self.rows_read, "record cursor closed");
    }

    fn settle(&mut self, pulled: Result<bool, Error>) -> Result<bool, Error> {
        match pulled {
            Ok(true) => {
                let Some(item) = self.source.current() else {
                    self.close();
                    return Err(Error::new(ErrorKind::Internal)
                        .with_message("source advanced without a current item"));
                };
                self.projection
                    .populate(&mut self.row, item.borrow(), &self.context);
                self.state = CursorState::Open;
                self.rows_read += 1;
                Ok(true)
            }
            Ok(false) => {
                self.close();
                Ok(false)
            }
            Err(err) => {
                warn!(error = %err, rows = self.rows_read, "row pull failed; closing cursor");
                self.close();
                Err(err)
            }
        }
    }
}

impl<S, R, C> RowSource for RecordCursor<S, R, C>
where
    S: PullSource,
    S::Item: Borrow<R>,
    C: Send,
{
    fn field_count(&mut self) -> Result<usize, Error> {
        Ok(self.row.len())
    }

    fn field_count_async<'a>(
        &'a mut self,
        _cancel: &'a CancellationToken,
    ) -> impl Future<Output = Result<usize, Error>> + Send + 'a {
        future::ready(Ok(self.row.len()))
    }

    fn read(&mut self) -> Result<bool, Error> {
        RecordCursor::read(self)
    }

    fn read_async<'a>(
        &'a mut self,
        cancel: &'a CancellationToken,
    ) -> impl Future<Output = Result<bool, Error>> + Send + 'a {
        RecordCursor::read_async(self, cancel)
    }

    fn state(&self) -> CursorState {
        self.state
    }

    fn row(&self) -> Result<&[Cell], Error> {
        match self.state {
            CursorState::Open => Ok(&self.row),
            _ => Err(Error::no_current_row()),
        }
    }

    fn schema(&self) -> Result<Arc<SchemaDescriptor>, Error> {
        Ok(Arc::clone(&self.schema))
    }

    fn close(&mut self) {
        RecordCursor::close(self)
    }
}
