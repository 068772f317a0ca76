// Pre-shaped rows through the raw reader and the client-facing boundary.
use rowfeed::api::{Cell, CellKind, ClientReader, ErrorKind, RawRowReader, RowSource};
use tokio_util::sync::CancellationToken;

fn grid() -> Vec<Vec<Cell>> {
    vec![
        vec![Cell::I32(1), Cell::I32(2)],
        vec![Cell::I32(3), Cell::I32(4)],
    ]
}

#[test]
fn field_count_first_does_not_lose_a_row() {
    let mut reader = RawRowReader::from_rows(grid());
    assert_eq!(RowSource::field_count(&mut reader).expect("count"), 2);

    let mut seen = Vec::new();
    while reader.read().expect("read") {
        seen.push((reader.get_i32(0).expect("c0"), reader.get_i32(1).expect("c1")));
    }
    assert_eq!(seen, vec![(1, 2), (3, 4)]);
    assert_eq!(reader.rows_read(), 2);
}

#[test]
fn schema_is_inferred_from_the_first_row() {
    let rows = vec![
        vec![Cell::Text("a".to_string()), Cell::Null, Cell::Bool(true)],
        vec![Cell::Text("b".to_string()), Cell::I64(7), Cell::Bool(false)],
    ];
    let mut reader = RawRowReader::from_rows(rows);
    assert!(reader.read().expect("read"));
    let schema = reader.schema().expect("schema");
    let kinds: Vec<_> = schema.iter().map(|column| column.data_type).collect();
    assert_eq!(kinds, vec![CellKind::Text, CellKind::Json, CellKind::Bool]);
    assert!(schema.iter().all(|column| column.nullable));
    assert_eq!(reader.name(2).as_deref(), Some("c2"));
}

#[test]
fn client_reader_wraps_raw_rows() {
    let mut reader = ClientReader::new(RawRowReader::from_rows(grid()));
    assert!(reader.has_rows());
    assert!(reader.read().expect("read"));
    assert_eq!(reader.value_by_name("c1").expect("c1"), Some(&Cell::I32(2)));
    assert_eq!(
        reader.next_result().expect_err("single result").kind(),
        ErrorKind::NotSupported
    );

    let rest: Vec<_> = reader
        .into_rows()
        .collect::<Result<_, _>>()
        .expect("rows");
    assert_eq!(rest, vec![vec![Cell::I32(3), Cell::I32(4)]]);
}

#[tokio::test]
async fn stream_rows_are_pulled_lazily() {
    let cancel = CancellationToken::new();
    let mut reader = RawRowReader::from_stream(tokio_stream::iter(grid()));
    assert_eq!(reader.state(), rowfeed::api::CursorState::NotStarted);
    assert!(reader.read_async(&cancel).await.expect("first"));
    assert_eq!(reader.field_count_async(&cancel).await.expect("count"), 2);
    assert!(reader.read_async(&cancel).await.expect("second"));
    assert_eq!(reader.get_i32(0).expect("c0"), 3);
    assert!(!reader.read_async(&cancel).await.expect("end"));
    assert!(reader.is_closed());
}
