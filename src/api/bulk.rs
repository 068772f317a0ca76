//! Purpose: Drain a row source into a batched sink, the way a client bulk-load path consumes it.
//! Exports: `BulkLoadOptions`, `BulkLoadOutcome`, `RowSink`, `CollectSink`, `JsonlSink`,
//! `bulk_load`, `bulk_load_async`.
//! Role: Reference consumer of the row-source contract; sinks stand in for the wire layer.
//! Invariants: At most `batch_size` rows are buffered; the reader is closed on every exit path.
//! Invariants: Rows reach the sink in source order; no retries.
#![allow(clippy::result_large_err)]

use std::io::{self, Write};

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::core::cell::Cell;
use crate::core::cursor::RowSource;
use crate::core::error::{Error, ErrorKind};
use crate::core::schema::SchemaDescriptor;

pub const DEFAULT_BATCH_SIZE: usize = 1_000;

#[derive(Clone, Debug)]
pub struct BulkLoadOptions {
    pub batch_size: usize,
    pub max_rows: Option<u64>,
}

impl BulkLoadOptions {
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_rows: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_rows(mut self, max_rows: u64) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    fn validate(&self) -> Result<(), Error> {
        if self.batch_size == 0 {
            return Err(
                Error::new(ErrorKind::InvalidArgument).with_message("batch size must be positive")
            );
        }
        Ok(())
    }
}

impl Default for BulkLoadOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BulkLoadOutcome {
    pub rows: u64,
    pub batches: u64,
}

/// Destination of a bulk load.
pub trait RowSink {
    fn begin(&mut self, _schema: &SchemaDescriptor) -> Result<(), Error> {
        Ok(())
    }

    fn write_batch(&mut self, rows: &[Vec<Cell>]) -> Result<(), Error>;

    fn finish(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// Keeps every row in memory; mostly useful for tests and small loads.
#[derive(Debug, Default)]
pub struct CollectSink {
    pub schema: Option<SchemaDescriptor>,
    pub rows: Vec<Vec<Cell>>,
    pub batch_sizes: Vec<usize>,
    pub finished: bool,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RowSink for CollectSink {
    fn begin(&mut self, schema: &SchemaDescriptor) -> Result<(), Error> {
        self.schema = Some(schema.clone());
        Ok(())
    }

    fn write_batch(&mut self, rows: &[Vec<Cell>]) -> Result<(), Error> {
        self.batch_sizes.push(rows.len());
        self.rows.extend_from_slice(rows);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Error> {
        self.finished = true;
        Ok(())
    }
}

/// Writes one JSON array per row, optionally preceded by the schema.
#[derive(Debug)]
pub struct JsonlSink<W: Write> {
    writer: W,
    header: bool,
}

impl<W: Write> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            header: false,
        }
    }

    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line<T: serde::Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        serde_json::to_writer(&mut self.writer, value).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to encode row")
                .with_source(err)
        })?;
        self.writer
            .write_all(b"\n")
            .map_err(|err| io_error(err, "failed to write row"))
    }
}

impl<W: Write> RowSink for JsonlSink<W> {
    fn begin(&mut self, schema: &SchemaDescriptor) -> Result<(), Error> {
        if self.header {
            self.write_line(schema)?;
        }
        Ok(())
    }

    fn write_batch(&mut self, rows: &[Vec<Cell>]) -> Result<(), Error> {
        for row in rows {
            self.write_line(row)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Error> {
        self.writer
            .flush()
            .map_err(|err| io_error(err, "failed to flush rows"))
    }
}

fn io_error(err: io::Error, message: &str) -> Error {
    Error::new(ErrorKind::Io)
        .with_message(message)
        .with_source(err)
}

/// Batches rows between the reader and the sink.
struct Loader<'a, K: RowSink + ?Sized> {
    sink: &'a mut K,
    options: &'a BulkLoadOptions,
    batch: Vec<Vec<Cell>>,
    outcome: BulkLoadOutcome,
}

impl<'a, K: RowSink + ?Sized> Loader<'a, K> {
    fn new(sink: &'a mut K, options: &'a BulkLoadOptions) -> Self {
        Self {
            sink,
            options,
            batch: Vec::with_capacity(options.batch_size),
            outcome: BulkLoadOutcome::default(),
        }
    }

    fn wants_more(&self) -> bool {
        self.options
            .max_rows
            .is_none_or(|max| self.outcome.rows < max)
    }

    fn push(&mut self, row: &[Cell]) -> Result<(), Error> {
        self.batch.push(row.to_vec());
        self.outcome.rows += 1;
        if self.batch.len() >= self.options.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        if self.batch.is_empty() {
            return Ok(());
        }
        self.sink.write_batch(&self.batch)?;
        self.outcome.batches += 1;
        trace!(rows = self.batch.len(), batch = self.outcome.batches, "bulk batch written");
        self.batch.clear();
        Ok(())
    }

    fn finish(mut self) -> Result<BulkLoadOutcome, Error> {
        self.flush()?;
        self.sink.finish()?;
        debug!(rows = self.outcome.rows, batches = self.outcome.batches, "bulk load complete");
        Ok(self.outcome)
    }
}

/// Drain `reader` into `sink` in batches; the reader is closed whatever the outcome.
pub fn bulk_load<R, K>(
    reader: &mut R,
    sink: &mut K,
    options: &BulkLoadOptions,
) -> Result<BulkLoadOutcome, Error>
where
    R: RowSource,
    K: RowSink + ?Sized,
{
    let result = drain(reader, sink, options);
    reader.close();
    result
}

fn drain<R, K>(
    reader: &mut R,
    sink: &mut K,
    options: &BulkLoadOptions,
) -> Result<BulkLoadOutcome, Error>
where
    R: RowSource,
    K: RowSink + ?Sized,
{
    options.validate()?;
    reader.field_count()?;
    let schema = reader.schema()?;
    sink.begin(&schema)?;
    let mut loader = Loader::new(sink, options);
    while loader.wants_more() && reader.read()? {
        loader.push(reader.row()?)?;
    }
    loader.finish()
}

/// Async form of [`bulk_load`]; `cancel` is forwarded to every row pull.
pub async fn bulk_load_async<R, K>(
    reader: &mut R,
    sink: &mut K,
    options: &BulkLoadOptions,
    cancel: &CancellationToken,
) -> Result<BulkLoadOutcome, Error>
where
    R: RowSource,
    K: RowSink + ?Sized,
{
    let result = drain_async(reader, sink, options, cancel).await;
    reader.close();
    result
}

async fn drain_async<R, K>(
    reader: &mut R,
    sink: &mut K,
    options: &BulkLoadOptions,
    cancel: &CancellationToken,
) -> Result<BulkLoadOutcome, Error>
where
    R: RowSource,
    K: RowSink + ?Sized,
{
    options.validate()?;
    reader.field_count_async(cancel).await?;
    let schema = reader.schema()?;
    sink.begin(&schema)?;
    let mut loader = Loader::new(sink, options);
    while loader.wants_more() && reader.read_async(cancel).await? {
        loader.push(reader.row()?)?;
    }
    loader.finish()
}

#[cfg(test)]
mod tests {
    use super::{BulkLoadOptions, CollectSink, JsonlSink, bulk_load, bulk_load_async};
    use crate::core::cell::Cell;
    use crate::core::cursor::RowSource;
    use crate::core::error::ErrorKind;
    use crate::core::projection::ProjectionSpec;

    fn spec() -> ProjectionSpec<i32> {
        let mut spec = ProjectionSpec::new();
        spec.add(|x: &i32| *x).expect("c0");
        spec
    }

    #[test]
    fn batches_respect_batch_size() {
        let spec = spec();
        let mut cursor = spec.open_iter(1..=7, ());
        let mut sink = CollectSink::new();
        let outcome = bulk_load(&mut cursor, &mut sink, &BulkLoadOptions::new().with_batch_size(3))
            .expect("load");
        assert_eq!(outcome.rows, 7);
        assert_eq!(outcome.batches, 3);
        assert_eq!(sink.batch_sizes, vec![3, 3, 1]);
        assert!(sink.finished);
        assert_eq!(sink.schema.expect("schema").len(), 1);
        assert!(cursor.is_closed());
    }

    #[test]
    fn empty_load_still_describes_columns() {
        let spec = spec();
        let mut cursor = spec.open_iter(Vec::<i32>::new(), ());
        let mut sink = CollectSink::new();
        let outcome = bulk_load(&mut cursor, &mut sink, &BulkLoadOptions::new()).expect("load");
        assert_eq!(outcome.rows, 0);
        assert_eq!(outcome.batches, 0);
        let schema = sink.schema.expect("schema");
        assert_eq!(schema.column(0).expect("c0").name, "c0");
        assert!(sink.finished);
    }

    #[tokio::test]
    async fn async_load_describes_columns_before_rows() {
        let spec = spec();
        let cancel = tokio_util::sync::CancellationToken::new();
        let mut cursor = spec.open_stream(tokio_stream::iter(vec![1, 2, 3]), ());
        let mut sink = CollectSink::new();
        let outcome = bulk_load_async(&mut cursor, &mut sink, &BulkLoadOptions::new(), &cancel)
            .await
            .expect("load");
        assert_eq!(outcome.rows, 3);
        assert_eq!(sink.schema.expect("schema").len(), 1);
        assert_eq!(sink.rows.len(), 3);
    }

    #[test]
    fn max_rows_stops_early_and_closes() {
        let spec = spec();
        let mut cursor = spec.open_iter(1..=100, ());
        let mut sink = CollectSink::new();
        let options = BulkLoadOptions::new().with_max_rows(5);
        let outcome = bulk_load(&mut cursor, &mut sink, &options).expect("load");
        assert_eq!(outcome.rows, 5);
        assert_eq!(sink.rows.last(), Some(&vec![Cell::I32(5)]));
        assert!(cursor.is_closed());
    }

    #[test]
    fn zero_batch_size_is_rejected_and_reader_closed() {
        let spec = spec();
        let mut cursor = spec.open_iter(1..=2, ());
        let mut sink = CollectSink::new();
        let err = bulk_load(&mut cursor, &mut sink, &BulkLoadOptions::new().with_batch_size(0))
            .expect_err("invalid");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(cursor.is_closed());
    }

    #[test]
    fn jsonl_sink_writes_header_and_rows() {
        let spec = spec();
        let mut cursor = spec.open_iter([4, 5], ());
        let mut sink = JsonlSink::new(Vec::new()).with_header(true);
        bulk_load(&mut cursor, &mut sink, &BulkLoadOptions::default()).expect("load");
        let text = String::from_utf8(sink.into_inner()).expect("utf8");
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("\"name\":\"c0\""));
        assert_eq!(&lines[1..], ["[4]", "[5]"]);
    }
}
