//! End-to-end checks of the insert body against a minimal RowBinary reader.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use clickhouse_bulk::{
    BigIntWidth, BulkCopy, ColumnMeta, DateTimePrecision, Decimal, DynValue, DynamicBulkCopy,
    DynamicRow, Record, SchemaKey, SerializerCache, Shape, WriterConfig, compile,
};
use futures::{StreamExt, stream};
use num_bigint::BigInt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ═══════════════════════════════════════════════════════════════════════════
// Reference reader
// ═══════════════════════════════════════════════════════════════════════════

struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn take(&mut self, n: usize) -> &'a [u8] {
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        head
    }

    fn array<const N: usize>(&mut self) -> [u8; N] {
        self.take(N).try_into().unwrap()
    }

    fn header(&mut self) -> &'a str {
        let end = self.bytes.iter().position(|&b| b == b'\n').unwrap();
        let line = std::str::from_utf8(self.take(end + 1)).unwrap();
        line.trim_end_matches('\n')
    }

    fn u8(&mut self) -> u8 {
        self.take(1)[0]
    }

    fn bool(&mut self) -> bool {
        self.u8() != 0
    }

    fn i16(&mut self) -> i16 {
        i16::from_le_bytes(self.array())
    }

    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.array())
    }

    fn i64(&mut self) -> i64 {
        i64::from_le_bytes(self.array())
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.array())
    }

    fn i128(&mut self) -> i128 {
        i128::from_le_bytes(self.array())
    }

    fn f64(&mut self) -> f64 {
        f64::from_le_bytes(self.array())
    }

    fn int256(&mut self) -> BigInt {
        BigInt::from_signed_bytes_le(self.take(32))
    }

    fn varint(&mut self) -> u64 {
        let mut value = 0_u64;
        let mut shift = 0;
        loop {
            let byte = self.u8();
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return value;
            }
            shift += 7;
        }
    }

    fn string(&mut self) -> &'a str {
        let len = self.varint() as usize;
        std::str::from_utf8(self.take(len)).unwrap()
    }

    fn ipv4(&mut self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from_le_bytes(self.array()))
    }

    fn ipv6(&mut self) -> Ipv6Addr {
        Ipv6Addr::from(self.array::<16>())
    }

    fn uuid(&mut self) -> Uuid {
        let high = self.u64();
        let low = self.u64();
        Uuid::from_u64_pair(high, low)
    }

    fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Fixtures
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct Item {
    id: i32,
    name: String,
}

impl Record for Item {
    fn shape() -> Shape<Self> {
        Shape::new()
            .field("id", |r: &Self| &r.id)
            .field("name", |r: &Self| &r.name)
    }
}

#[derive(Debug, Clone)]
struct Wide {
    active: bool,
    small: i16,
    count: i64,
    ratio: f64,
    big: i128,
    huge: BigInt,
    price: Decimal,
    label: String,
    at: DateTime<Utc>,
    v4: Ipv4Addr,
    v6: Ipv6Addr,
    trace: Uuid,
    maybe: Option<i32>,
    tags: Vec<String>,
    attrs: BTreeMap<String, i64>,
    point: (f64, f64),
}

impl Record for Wide {
    fn shape() -> Shape<Self> {
        Shape::new()
            .field("active", |r: &Self| &r.active)
            .field("small", |r: &Self| &r.small)
            .field("count", |r: &Self| &r.count)
            .field("ratio", |r: &Self| &r.ratio)
            .field("big", |r: &Self| &r.big)
            .field_with(
                "huge",
                ColumnMeta::new().with_big_int_width(BigIntWidth::Bits256),
                |r: &Self| &r.huge,
            )
            .field_with("price", ColumnMeta::new().with_decimal(18, 6), |r: &Self| {
                &r.price
            })
            .field("label", |r: &Self| &r.label)
            .field_with(
                "at",
                ColumnMeta::new().with_datetime_precision(DateTimePrecision::Millisecond),
                |r: &Self| &r.at,
            )
            .field("v4", |r: &Self| &r.v4)
            .field("v6", |r: &Self| &r.v6)
            .field("trace", |r: &Self| &r.trace)
            .field("maybe", |r: &Self| &r.maybe)
            .field("tags", |r: &Self| &r.tags)
            .field("attrs", |r: &Self| &r.attrs)
            .field("point", |r: &Self| &r.point)
    }
}

const WIDE_COLUMNS: [&str; 16] = [
    "active", "small", "count", "ratio", "big", "huge", "price", "label", "at", "v4", "v6",
    "trace", "maybe", "tags", "attrs", "point",
];

fn wide(seed: i64) -> Wide {
    Wide {
        active: seed % 2 == 0,
        small: -1234,
        count: seed * 1_000_003,
        ratio: 0.25 * seed as f64,
        big: -(i128::from(seed) << 80),
        huge: "-12345678901234567890123456789012345678901234567890"
            .parse()
            .unwrap(),
        price: "1234.567891".parse().unwrap(),
        label: format!("row-{seed}-ünïcødé"),
        at: Utc.timestamp_millis_opt(1_700_000_000_123 + seed).unwrap(),
        v4: Ipv4Addr::new(192, 168, 1, seed as u8),
        v6: Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, seed as u16),
        trace: Uuid::from_u128(0x0011_2233_4455_6677_8899_aabb_ccdd_eeff + seed as u128),
        maybe: (seed % 3 != 0).then_some(seed as i32),
        tags: vec!["a".to_string(), "bc".to_string()],
        attrs: BTreeMap::from([("k1".to_string(), seed), ("k2".to_string(), -seed)]),
        point: (1.5, -2.5),
    }
}

fn read_wide(r: &mut Reader<'_>, expected: &Wide) {
    assert_eq!(r.bool(), expected.active);
    assert_eq!(r.i16(), expected.small);
    assert_eq!(r.i64(), expected.count);
    assert_eq!(r.f64(), expected.ratio);
    assert_eq!(r.i128(), expected.big);
    assert_eq!(r.int256(), expected.huge);
    assert_eq!(Decimal::new(BigInt::from(r.i64()), 6), expected.price);
    assert_eq!(r.string(), expected.label);
    assert_eq!(r.i64(), expected.at.timestamp_millis());
    assert_eq!(r.ipv4(), expected.v4);
    assert_eq!(r.ipv6(), expected.v6);
    assert_eq!(r.uuid(), expected.trace);
    let maybe = if r.u8() == 1 { None } else { Some(r.i32()) };
    assert_eq!(maybe, expected.maybe);
    let tags: Vec<&str> = (0..r.varint()).map(|_| r.string()).collect();
    assert_eq!(tags, expected.tags);
    let attrs: BTreeMap<String, i64> = (0..r.varint())
        .map(|_| (r.string().to_string(), r.i64()))
        .collect();
    assert_eq!(attrs, expected.attrs);
    assert_eq!((r.f64(), r.f64()), expected.point);
}

async fn copy_to_vec<R: Record>(copy: &BulkCopy<R>, rows: &[R]) -> Vec<u8> {
    let mut sink = Vec::new();
    copy.write(&mut sink, rows, &CancellationToken::new())
        .await
        .unwrap();
    sink
}

// ═══════════════════════════════════════════════════════════════════════════
// Round trips
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_wide_row_round_trip() {
    let copy = BulkCopy::<Wide>::with_cache(&SerializerCache::new(), "wide", WIDE_COLUMNS).unwrap();
    let rows: Vec<Wide> = (0..50).map(wide).collect();
    let body = copy_to_vec(&copy, &rows).await;

    let mut reader = Reader::new(&body);
    assert_eq!(
        reader.header(),
        format!(
            "INSERT INTO wide ({}) FORMAT RowBinary",
            WIDE_COLUMNS.map(|c| format!("`{c}`")).join(", ")
        )
    );
    for row in &rows {
        read_wide(&mut reader, row);
    }
    assert!(reader.is_empty());
}

#[tokio::test]
async fn test_output_is_deterministic() {
    let rows: Vec<Wide> = (0..20).map(wide).collect();
    let first = BulkCopy::<Wide>::with_cache(&SerializerCache::new(), "wide", WIDE_COLUMNS).unwrap();
    let second = BulkCopy::<Wide>::with_cache(&SerializerCache::new(), "wide", WIDE_COLUMNS)
        .unwrap()
        .with_config(WriterConfig::small());
    assert_eq!(
        copy_to_vec(&first, &rows).await,
        copy_to_vec(&second, &rows).await
    );
}

#[tokio::test]
async fn test_buffer_transparency() {
    let rows: Vec<Wide> = (0..300).map(wide).collect();
    let cache = SerializerCache::new();
    let tiny = BulkCopy::<Wide>::with_cache(&cache, "wide", WIDE_COLUMNS)
        .unwrap()
        .with_config(WriterConfig::default().with_flush_threshold(16).with_buffer_size(64));
    let huge = BulkCopy::<Wide>::with_cache(&cache, "wide", WIDE_COLUMNS)
        .unwrap()
        .with_config(WriterConfig::default().with_buffer_size(16 << 20));

    let a = copy_to_vec(&tiny, &rows).await;
    let b = copy_to_vec(&huge, &rows).await;
    assert!(a.len() > 64);
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_column_order_swaps_fields() {
    let cache = SerializerCache::new();
    let forward = BulkCopy::<Item>::with_cache(&cache, "items", ["id", "name"]).unwrap();
    let reverse = BulkCopy::<Item>::with_cache(&cache, "items", ["name", "id"]).unwrap();
    assert!(!Arc::ptr_eq(forward.schema(), reverse.schema()));

    let rows = [Item {
        id: 7,
        name: "seven".to_string(),
    }];
    let a = copy_to_vec(&forward, &rows).await;
    let b = copy_to_vec(&reverse, &rows).await;

    let mut ra = Reader::new(&a);
    let mut rb = Reader::new(&b);
    assert_eq!(ra.header(), "INSERT INTO items (`id`, `name`) FORMAT RowBinary");
    assert_eq!(rb.header(), "INSERT INTO items (`name`, `id`) FORMAT RowBinary");
    assert_eq!((ra.i32(), ra.string()), (7, "seven"));
    assert_eq!((rb.string(), rb.i32()), ("seven", 7));
}

// ═══════════════════════════════════════════════════════════════════════════
// Scenarios
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_scenario_record_bytes() {
    let copy = BulkCopy::<Item>::with_cache(&SerializerCache::new(), "t", ["id", "name"]).unwrap();
    let body = copy_to_vec(
        &copy,
        &[Item {
            id: 42,
            name: "hi".to_string(),
        }],
    )
    .await;
    let rows = &body[copy.header().len()..];
    assert_eq!(rows, [0x2A, 0x00, 0x00, 0x00, 0x02, 0x68, 0x69]);
}

#[test]
fn test_scenario_decimal_bytes() {
    struct Price {
        value: Decimal,
    }
    let shape = Shape::<Price>::new().field_with(
        "value",
        ColumnMeta::new().with_decimal(18, 6),
        |r: &Price| &r.value,
    );
    let schema = compile(&SchemaKey::new("t", ["value"]).unwrap(), &shape).unwrap();
    let mut buf = Vec::new();
    schema
        .encode_row(
            &Price {
                value: "3.5".parse().unwrap(),
            },
            &mut buf,
        )
        .unwrap();
    // mantissa 3_500_000
    assert_eq!(buf, [0xE0, 0x67, 0x35, 0x00, 0x00, 0x00, 0x00, 0x00]);
    assert_eq!(buf, 3_500_000_i64.to_le_bytes());
}

#[tokio::test]
async fn test_scenario_empty_source() {
    let copy = BulkCopy::<Item>::with_cache(&SerializerCache::new(), "t", ["id"]).unwrap();
    let summary = copy
        .write(Vec::new(), Vec::<Item>::new(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.rows, 0);
    assert_eq!(summary.bytes, copy.header().len() as u64);
}

#[test]
fn test_scenario_unsupported_field_fails_before_rows() {
    struct Opaque;

    impl clickhouse_bulk::RowBinaryValue for Opaque {
        fn type_tag(
            _meta: &ColumnMeta,
        ) -> Result<clickhouse_bulk::TypeTag, clickhouse_bulk::TypeError> {
            Err(clickhouse_bulk::TypeError::unsupported(
                "no encoder for opaque payloads",
            ))
        }

        fn to_value(&self) -> clickhouse_bulk::Value<'_> {
            clickhouse_bulk::Value::Null
        }
    }

    struct Blob {
        payload: Opaque,
    }

    impl Record for Blob {
        fn shape() -> Shape<Self> {
            Shape::new().field("payload", |r: &Self| &r.payload)
        }
    }

    let err = BulkCopy::<Blob>::with_cache(&SerializerCache::new(), "t", ["payload"]).unwrap_err();
    assert!(err.is_unsupported_type());
    assert!(err.is_configuration());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scenario_concurrent_writers_share_schema() {
    let tasks: Vec<_> = (0..2)
        .map(|i| {
            tokio::spawn(async move {
                let copy = BulkCopy::<Item>::new("concurrent_items", ["id", "name"]).unwrap();
                let rows = vec![Item {
                    id: i,
                    name: format!("n{i}"),
                }];
                let summary = copy
                    .write(Vec::new(), &rows, &CancellationToken::new())
                    .await
                    .unwrap();
                (Arc::clone(copy.schema()), summary)
            })
        })
        .collect();

    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap());
    }
    assert!(Arc::ptr_eq(&results[0].0, &results[1].0));
    assert!(results.iter().all(|(_, summary)| summary.rows == 1));
}

#[tokio::test]
async fn test_scenario_long_string() {
    struct Doc {
        text: String,
    }
    impl Record for Doc {
        fn shape() -> Shape<Self> {
            Shape::new().field("text", |r: &Self| &r.text)
        }
    }

    let copy = BulkCopy::<Doc>::with_cache(&SerializerCache::new(), "docs", ["text"]).unwrap();
    let body = copy_to_vec(
        &copy,
        &[Doc {
            text: "a".repeat(5000),
        }],
    )
    .await;
    let rows = &body[copy.header().len()..];
    assert_eq!(&rows[..2], [0x88, 0x27]);
    assert_eq!(rows.len(), 5002);
    assert!(rows[2..].iter().all(|&b| b == b'a'));
}

// ═══════════════════════════════════════════════════════════════════════════
// Streaming
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_body_stream_ends_with_error() {
    let copy = BulkCopy::<Item>::with_cache(&SerializerCache::new(), "t", ["id", "name"]).unwrap();
    let rows = stream::iter(vec![
        Ok(Item {
            id: 1,
            name: "ok".to_string(),
        }),
        Err("source went away"),
    ]);
    let items: Vec<_> = copy.into_body(rows, CancellationToken::new()).collect().await;

    let (last, chunks) = items.split_last().unwrap();
    let err = last.as_ref().unwrap_err();
    assert!(err.is_source());
    assert!(chunks.iter().all(Result::is_ok));
}

#[tokio::test]
async fn test_dynamic_rows() {
    let copy = DynamicBulkCopy::new("events", ["id", "payload", "seen"]).unwrap();
    let rows = (0..3_i32).map(|id| {
        DynamicRow::new()
            .with("id", id as u64)
            .with("payload", DynValue::Array(vec![DynValue::from(id), DynValue::from(id + 1)]))
            .with("seen", Utc.timestamp_opt(1_700_000_000, 0).unwrap())
    });
    let items: Vec<_> = copy
        .into_body(stream::iter(rows.map(Ok::<_, Infallible>)), CancellationToken::new())
        .collect()
        .await;
    let body: Vec<u8> = items
        .into_iter()
        .flat_map(|chunk| chunk.unwrap().to_vec())
        .collect();

    let mut reader = Reader::new(&body);
    assert_eq!(
        reader.header(),
        "INSERT INTO events (`id`, `payload`, `seen`) FORMAT RowBinary"
    );
    for id in 0..3_i32 {
        assert_eq!(reader.u64(), id as u64);
        assert_eq!(reader.varint(), 2);
        assert_eq!((reader.i32(), reader.i32()), (id, id + 1));
        assert_eq!(reader.i64(), 1_700_000_000);
    }
    assert!(reader.is_empty());
}

#[tokio::test]
async fn test_dynamic_empty_source() {
    let copy = DynamicBulkCopy::new("events", ["id"]).unwrap();
    let items: Vec<_> = copy
        .into_body(
            stream::iter(Vec::<Result<DynamicRow, Infallible>>::new()),
            CancellationToken::new(),
        )
        .collect()
        .await;
    let body: Vec<u8> = items
        .into_iter()
        .flat_map(|chunk| chunk.unwrap().to_vec())
        .collect();
    assert_eq!(body, b"INSERT INTO events (`id`) FORMAT RowBinary\n");
}

#[tokio::test]
async fn test_cancellation_is_distinct() {
    let copy = BulkCopy::<Item>::with_cache(&SerializerCache::new(), "t", ["id"]).unwrap();
    let token = CancellationToken::new();
    token.cancel();
    let err = copy
        .write(Vec::new(), Vec::<Item>::new(), &token)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(!err.is_encoding());
}

#[tokio::test]
async fn test_encoding_error_keeps_whole_rows_only() {
    struct Reading {
        id: i32,
        level: i32,
    }

    impl Record for Reading {
        fn shape() -> Shape<Self> {
            Shape::new()
                .field("id", |r: &Self| &r.id)
                .field_typed("level", "UInt8", |r: &Self| {
                    clickhouse_bulk::Value::Int32(r.level)
                })
        }
    }

    let copy =
        BulkCopy::<Reading>::with_cache(&SerializerCache::new(), "t", ["id", "level"]).unwrap();
    let rows = [
        Reading { id: 1, level: 1 },
        Reading {
            id: 0x0A0B_0C0D,
            level: 999,
        },
    ];
    let mut sink = Vec::new();
    let err = copy
        .write(&mut sink, &rows, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_overflow());
    assert!(err.to_string().contains("level"));
    assert_eq!(&sink[copy.header().len()..], [0x01, 0x00, 0x00, 0x00, 0x01]);
}

#[test]
fn test_datetime_and_datetime64_widths() {
    struct Stamp {
        at: DateTime<Utc>,
    }

    let at = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
    for (type_name, expected) in [
        ("DateTime", 1_600_000_000_u32.to_le_bytes().to_vec()),
        ("DateTime64(0)", 1_600_000_000_i64.to_le_bytes().to_vec()),
    ] {
        let shape = Shape::<Stamp>::new().field_typed("at", type_name, |s: &Stamp| {
            clickhouse_bulk::Value::DateTime(s.at)
        });
        let schema = compile(&SchemaKey::new("t", ["at"]).unwrap(), &shape).unwrap();
        let mut buf = Vec::new();
        schema.encode_row(&Stamp { at }, &mut buf).unwrap();
        assert_eq!(buf, expected, "{type_name}");
    }
}
