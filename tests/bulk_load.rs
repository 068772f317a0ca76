// Bulk loads driven end to end: batching, JSONL output, async streams, cancellation.
use std::fs::{self, File};
use std::io::BufWriter;
use std::time::Duration;

use rowfeed::api::{
    BulkLoadOptions, CancellationToken, Cell, CollectSink, DEFAULT_BATCH_SIZE, ErrorKind,
    JsonlSink, ProjectionSpec, RawRowReader, RowSource, TableValuedParameter, bulk_load,
    bulk_load_async,
};
use serde_json::Value;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Reading {
    sensor: u8,
    value: f64,
    label: Option<String>,
}

fn reading_spec() -> ProjectionSpec<Reading> {
    let mut spec = ProjectionSpec::new();
    spec.add(|r: &Reading| r.sensor)
        .expect("sensor")
        .add(|r: &Reading| r.value)
        .expect("value")
        .add(|r: &Reading| r.label.clone())
        .expect("label");
    spec
}

fn readings(count: usize) -> impl Iterator<Item = Reading> + Send {
    (0..count).map(|i| Reading {
        sensor: (i % 4) as u8,
        value: i as f64 / 2.0,
        label: (i % 2 == 0).then(|| format!("r{i}")),
    })
}

#[test]
fn default_batches_hold_a_thousand_rows() {
    init_tracing();
    let spec = reading_spec();
    let mut cursor = spec.open_iter(readings(2_500), ());
    let mut sink = CollectSink::new();
    let outcome = bulk_load(&mut cursor, &mut sink, &BulkLoadOptions::default()).expect("load");

    assert_eq!(DEFAULT_BATCH_SIZE, 1_000);
    assert_eq!(outcome.rows, 2_500);
    assert_eq!(sink.batch_sizes, vec![1_000, 1_000, 500]);
    assert_eq!(sink.rows[3], vec![Cell::U8(3), Cell::F64(1.5), Cell::Null]);
    assert!(cursor.is_closed());
}

#[test]
fn jsonl_file_carries_schema_then_rows() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("readings.jsonl");
    let spec = reading_spec();
    let mut cursor = spec.open_iter(readings(3), ());

    let file = File::create(&path).expect("create");
    let mut sink = JsonlSink::new(BufWriter::new(file)).with_header(true);
    let options = BulkLoadOptions::new().with_batch_size(2);
    let outcome = bulk_load(&mut cursor, &mut sink, &options).expect("load");
    assert_eq!(outcome.batches, 2);
    drop(sink);

    let text = fs::read_to_string(&path).expect("read back");
    let lines: Vec<Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0][2]["name"], "c2");
    assert_eq!(lines[0][2]["data_type"], "Text");
    assert_eq!(lines[1], serde_json::json!([0, 0.0, "r0"]));
    assert_eq!(lines[2], serde_json::json!([1, 0.5, null]));
}

#[test]
fn tvp_reader_feeds_a_bulk_load() {
    let rows = vec![vec![Cell::I64(1)], vec![Cell::I64(2)], vec![Cell::I64(3)]];
    let mut tvp = TableValuedParameter::new("@ids", "dbo.IdList", RawRowReader::from_rows(rows));
    let mut sink = CollectSink::new();
    let outcome = bulk_load(&mut **tvp.reader_mut(), &mut sink, &BulkLoadOptions::default())
        .expect("load");
    assert_eq!(outcome.rows, 3);
    assert_eq!(sink.schema.expect("schema").len(), 1);
    assert_eq!(tvp.columns().expect("columns").len(), 1);
}

#[tokio::test]
async fn async_load_over_a_stream() {
    init_tracing();
    let spec = reading_spec();
    let cancel = CancellationToken::new();
    let mut cursor = spec.open_stream(tokio_stream::iter(readings(5)), ());
    let mut sink = CollectSink::new();
    let options = BulkLoadOptions::new().with_batch_size(2).with_max_rows(4);
    let outcome = bulk_load_async(&mut cursor, &mut sink, &options, &cancel)
        .await
        .expect("load");
    assert_eq!(outcome.rows, 4);
    assert_eq!(sink.batch_sizes, vec![2, 2]);
    assert!(sink.finished);
    assert!(cursor.is_closed());
}

#[tokio::test]
async fn cancelled_load_stops_and_closes() {
    let spec = reading_spec();
    let cancel = CancellationToken::new();
    let (tx, rx) = tokio::sync::mpsc::channel(4);
    let stream = tokio_stream::wrappers::ReceiverStream::new(rx);
    let mut cursor = spec.open_stream(stream, ());

    tx.send(Reading {
        sensor: 1,
        value: 1.0,
        label: None,
    })
    .await
    .expect("send");

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let mut sink = CollectSink::new();
    let err = bulk_load_async(&mut cursor, &mut sink, &BulkLoadOptions::default(), &cancel)
        .await
        .expect_err("cancelled");
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(cursor.is_closed());
    assert!(!sink.finished);
    drop(tx);
}
