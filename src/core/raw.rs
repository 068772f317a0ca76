//! Purpose: Row source over pre-shaped rows, skipping projection entirely.
//! Exports: `RawRowReader`.
//! Role: Alternate entry point for callers that already hold `Vec<Cell>` rows.
//! Invariants: Field count is answerable before the first read by pulling one row ahead.
//! Invariants: The lookahead row is handed out by the first read, never skipped or repeated.
//! Invariants: Never holds more than that single lookahead row.

use std::future::Future;
use std::sync::Arc;

use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::cell::{Cell, CellKind};
use crate::core::cursor::{CursorState, RowSource};
use crate::core::error::{Error, ErrorKind};
use crate::core::schema::SchemaDescriptor;
use crate::core::source::{PullSource, SequenceAdapter, StreamSource};

pub struct RawRowReader<S> {
    source: S,
    state: CursorState,
    /// Result of a lookahead pull not yet handed out by `read`.
    lookahead: Option<bool>,
    schema: Option<Arc<SchemaDescriptor>>,
    rows_read: u64,
}

impl<I> RawRowReader<SequenceAdapter<I>>
where
    I: Iterator<Item = Vec<Cell>> + Send,
{
    pub fn from_rows(rows: impl IntoIterator<IntoIter = I>) -> Self {
        Self::new(SequenceAdapter::new(rows))
    }
}

impl<S> RawRowReader<StreamSource<S>>
where
    S: Stream<Item = Vec<Cell>> + Unpin + Send,
{
    pub fn from_stream(stream: S) -> Self {
        Self::new(StreamSource::new(stream))
    }
}

impl<S> RawRowReader<S>
where
    S: PullSource<Item = Vec<Cell>>,
{
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: CursorState::NotStarted,
            lookahead: None,
            schema: None,
            rows_read: 0,
        }
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Column count, pulling the first row if nothing has been read yet.
    pub fn field_count(&mut self) -> Result<usize, Error> {
        if self.needs_lookahead() {
            let pulled = self.source.advance_blocking();
            self.prime(pulled)?;
        }
        Ok(self.known_field_count())
    }

    pub async fn field_count_async(&mut self, cancel: &CancellationToken) -> Result<usize, Error> {
        if self.needs_lookahead() {
            let pulled = self.source.advance(cancel).await;
            self.prime(pulled)?;
        }
        Ok(self.known_field_count())
    }

    pub fn read(&mut self) -> Result<bool, Error> {
        if let Some(available) = self.take_lookahead() {
            return Ok(available);
        }
        if self.state == CursorState::Closed {
            return Ok(false);
        }
        let pulled = self.source.advance_blocking();
        let available = self.accept(pulled)?;
        if available {
            self.open_row();
        }
        Ok(available)
    }

    pub async fn read_async(&mut self, cancel: &CancellationToken) -> Result<bool, Error> {
        if let Some(available) = self.take_lookahead() {
            return Ok(available);
        }
        if self.state == CursorState::Closed {
            return Ok(false);
        }
        let pulled = self.source.advance(cancel).await;
        let available = self.accept(pulled)?;
        if available {
            self.open_row();
        }
        Ok(available)
    }

    pub fn close(&mut self) {
        if self.state == CursorState::Closed {
            return;
        }
        self.lookahead = None;
        self.source.release();
        self.state = CursorState::Closed;
        debug!(rows = self.rows_read, "raw row reader closed");
    }

    fn needs_lookahead(&self) -> bool {
        self.state == CursorState::NotStarted && self.lookahead.is_none()
    }

    fn known_field_count(&self) -> usize {
        match (self.state, self.source.current()) {
            (CursorState::Open, Some(row)) => row.len(),
            _ => self.schema.as_ref().map_or(0, |schema| schema.len()),
        }
    }

    fn prime(&mut self, pulled: Result<bool, Error>) -> Result<(), Error> {
        self.lookahead = Some(self.accept(pulled)?);
        Ok(())
    }

    fn take_lookahead(&mut self) -> Option<bool> {
        let available = self.lookahead.take()?;
        if available {
            self.open_row();
        }
        Some(available)
    }

    fn open_row(&mut self) {
        self.state = CursorState::Open;
        self.rows_read += 1;
    }

    /// Record the outcome of a pull; closes the reader on exhaustion or failure.
    fn accept(&mut self, pulled: Result<bool, Error>) -> Result<bool, Error> {
        match pulled {
            Ok(true) => {
                if self.schema.is_none() {
                    self.schema = self.source.current().map(|row| Arc::new(describe(row)));
                }
                Ok(true)
            }
            Ok(false) => {
                self.close();
                Ok(false)
            }
            Err(err) => {
                warn!(error = %err, rows = self.rows_read, "raw row pull failed; closing reader");
                self.close();
                Err(err)
            }
        }
    }
}

/// Schema inferred from the first row; a null first cell is described as `Json`.
fn describe(row: &[Cell]) -> SchemaDescriptor {
    SchemaDescriptor::from_columns(
        row.iter()
            .map(|cell| (cell.kind().unwrap_or(CellKind::Json), true)),
    )
}

impl<S> RowSource for RawRowReader<S>
where
    S: PullSource<Item = Vec<Cell>>,
{
    fn field_count(&mut self) -> Result<usize, Error> {
        RawRowReader::field_count(self)
    }

    fn field_count_async<'a>(
        &'a mut self,
        cancel: &'a CancellationToken,
    ) -> impl Future<Output = Result<usize, Error>> + Send + 'a {
        RawRowReader::field_count_async(self, cancel)
    }

    fn read(&mut self) -> Result<bool, Error> {
        RawRowReader::read(self)
    }

    fn read_async<'a>(
        &'a mut self,
        cancel: &'a CancellationToken,
    ) -> impl Future<Output = Result<bool, Error>> + Send + 'a {
        RawRowReader::read_async(self, cancel)
    }

    fn state(&self) -> CursorState {
        self.state
    }

    fn row(&self) -> Result<&[Cell], Error> {
        match (self.state, self.source.current()) {
            (CursorState::Open, Some(row)) => Ok(row),
            _ => Err(Error::no_current_row()),
        }
    }

    fn schema(&self) -> Result<Arc<SchemaDescriptor>, Error> {
        match &self.schema {
            Some(schema) => Ok(Arc::clone(schema)),
            None if self.state == CursorState::Closed => Ok(Arc::new(SchemaDescriptor::default())),
            None => Err(Error::new(ErrorKind::ContractViolation)
                .with_message("schema is unknown until field_count() or read() has pulled a row")),
        }
    }

    fn close(&mut self) {
        RawRowReader::close(self)
    }
}
