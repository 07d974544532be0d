// Copyright 2023 Greptime Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod common;

use std::sync::Barrier;

use auto_column::{
    AutoTypeColumnSchema, BitmapCodec, ColumnAndIndexSupplier, DictionaryMerger, FormatOptions,
    FormatVersion, IndexCapability, IndexPolicy, LogicalType, MergeInput,
};
use common_error::ext::ErrorExt;
use common_error::status_code::StatusCode;
use serde_json::json;

use crate::common::{schema, values, write_rows};

/// Byte offsets of a little endian long column without strings.
const LONG_COUNT_OFFSET: usize = 7 + 4 + 4;
const LONGS_OFFSET: usize = LONG_COUNT_OFFSET + 4;

fn long_column(rows: serde_json::Value) -> Vec<u8> {
    write_rows(&schema(1), &values(rows), FormatOptions::default()).bytes
}

fn read_error(bytes: &[u8], logical_type: LogicalType) -> StatusCode {
    let options = auto_column::ColumnReadOptions {
        logical_type,
        byte_order: Default::default(),
        bitmap_codec: Default::default(),
        index_policy: IndexPolicy::default(),
    };
    let supplier = ColumnAndIndexSupplier::read(bytes, options);
    let err = supplier.get().unwrap_err();
    assert!(!supplier.is_ready());
    err.status_code()
}

#[test]
fn test_reject_invalid_versions() {
    for version in [0, 3, -1, 256] {
        let err = AutoTypeColumnSchema::new("c", None, Some(version)).unwrap_err();
        assert_eq!(StatusCode::InvalidArguments, err.status_code());
        assert!(err.to_string().contains("Invalid version"), "{err}");

        let json = format!(r#"{{"type": "auto", "name": "c", "version": {version}}}"#);
        let err = AutoTypeColumnSchema::from_json(&json).unwrap_err();
        assert_eq!(StatusCode::InvalidArguments, err.status_code());
    }
    assert_eq!(
        FormatVersion::V1,
        AutoTypeColumnSchema::from_json(r#"{"type": "auto", "name": "c"}"#)
            .unwrap()
            .version()
    );
}

#[test]
fn test_reject_mixed_version_merge() {
    let v1 = schema(1).make_indexer().sorted_lookups().unwrap();
    let v2 = schema(2).make_indexer().sorted_lookups().unwrap();
    let err = DictionaryMerger::merge(
        FormatVersion::V2,
        &[v2.as_merge_input(), v1.as_merge_input()],
    )
    .unwrap_err();
    assert_eq!(StatusCode::InvalidArguments, err.status_code());

    let err = DictionaryMerger::merge(FormatVersion::V1, &[]).unwrap_err();
    assert_eq!(StatusCode::InvalidArguments, err.status_code());
}

#[test]
fn test_corrupt_header() {
    common_telemetry::init_default_ut_logging();
    let bytes = long_column(json!([1, 2, null]));
    assert!(ColumnAndIndexSupplier::read(
        &bytes,
        auto_column::ColumnReadOptions::new(LogicalType::Long, &Default::default())
    )
    .get()
    .is_ok());

    let mut bad_version = bytes.clone();
    bad_version[0] = 3;
    assert_eq!(StatusCode::StorageCorrupted, read_error(&bad_version, LogicalType::Long));

    let mut bad_flags = bytes.clone();
    bad_flags[1] |= 0x10;
    assert_eq!(StatusCode::StorageCorrupted, read_error(&bad_flags, LogicalType::Long));

    let mut bad_tag = bytes.clone();
    bad_tag[2] = 42;
    assert_eq!(StatusCode::StorageCorrupted, read_error(&bad_tag, LogicalType::Long));

    // Declared and stored types differ.
    assert_eq!(StatusCode::StorageCorrupted, read_error(&bytes, LogicalType::Double));
}

#[test]
fn test_corrupt_sections() {
    common_telemetry::init_default_ut_logging();
    let bytes = long_column(json!([1, 2, null]));
    let count = u32::from_le_bytes(bytes[LONG_COUNT_OFFSET..LONGS_OFFSET].try_into().unwrap());
    assert_eq!(2, count);

    let mut unsorted = bytes.clone();
    unsorted[LONGS_OFFSET..LONGS_OFFSET + 8].copy_from_slice(&5i64.to_le_bytes());
    assert_eq!(StatusCode::StorageCorrupted, read_error(&unsorted, LogicalType::Long));

    // Row ids follow the empty double and array dictionaries.
    let ids_offset = LONGS_OFFSET + 16 + 4 + 4 + 4;
    let mut bad_id = bytes.clone();
    bad_id[ids_offset..ids_offset + 4].copy_from_slice(&99u32.to_le_bytes());
    assert_eq!(StatusCode::StorageCorrupted, read_error(&bad_id, LogicalType::Long));

    let mut trailing = bytes.clone();
    trailing.extend_from_slice(&[0, 0]);
    assert_eq!(StatusCode::StorageCorrupted, read_error(&trailing, LogicalType::Long));
}

#[test]
fn test_truncated_columns() {
    common_telemetry::init_default_ut_logging();
    for version in [1, 2] {
        let written = write_rows(
            &schema(version),
            &values(json!([{"a": [1, "x"]}, null, {"b": {"c": 2.5}}])),
            FormatOptions::default(),
        );
        assert_eq!(LogicalType::Nested, written.logical_type());
        for len in 0..written.bytes.len() {
            assert_eq!(
                StatusCode::StorageCorrupted,
                read_error(&written.bytes[..len], LogicalType::Nested),
                "version {version}, prefix of {len} bytes"
            );
        }
    }
}

#[test]
fn test_metadata_mismatch() {
    let written = write_rows(&schema(1), &values(json!(["a"])), FormatOptions::default());
    let mut options = written.read_options(FormatOptions::default(), IndexPolicy::default());
    options.bitmap_codec = BitmapCodec::BitVec;
    let err = ColumnAndIndexSupplier::read(&written.bytes, options)
        .get()
        .unwrap_err();
    assert_eq!(StatusCode::StorageCorrupted, err.status_code());
    assert!(err.to_string().contains("bitmap codec"), "{err}");
}

#[test]
fn test_failures_are_isolated() {
    common_telemetry::init_default_ut_logging();
    let format = FormatOptions::default();
    let written = write_rows(&schema(2), &values(json!(["a", "b", null])), format);
    let truncated = &written.bytes[..written.bytes.len() - 3];
    let options = written.read_options(format, IndexPolicy::default());
    let broken = ColumnAndIndexSupplier::read(truncated, options);
    let healthy = ColumnAndIndexSupplier::read(&written.bytes, options);
    let threads = 8;
    let barrier = Barrier::new(threads);

    std::thread::scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|| {
                barrier.wait();
                for _ in 0..500 {
                    // Every call retries the build and fails again.
                    assert!(broken.get().is_err());
                    assert!(broken.as_index(IndexCapability::NullValue).is_err());
                    let column = healthy.get().unwrap();
                    assert_eq!(3, column.row_count());
                }
            });
        }
    });

    assert!(!broken.is_ready());
    assert!(healthy.is_ready());
}

#[test]
fn test_reject_too_deep_structured_row() {
    common_telemetry::init_default_ut_logging();
    let format = FormatOptions::default();
    let payload = "x".repeat(1000);
    let written = write_rows(&schema(1), &values(json!([{"a": payload.clone()}, null])), format);
    assert_eq!(LogicalType::Nested, written.logical_type());

    // Object with one field "a" holding a 1000 byte string.
    let mut row = vec![5, 1, 0, 0, 0, 1, 0, 0, 0, b'a', 1];
    row.extend_from_slice(&1000u32.to_le_bytes());
    let start = written
        .bytes
        .windows(row.len())
        .position(|w| w == row.as_slice())
        .unwrap();
    let len = row.len() + payload.len();
    assert_eq!(0, len % 5);

    // Same length, but arrays of one element nested all the way down.
    let mut corrupted = written.bytes.clone();
    corrupted[start..start + len].copy_from_slice(&[4, 1, 0, 0, 0].repeat(len / 5));

    let options = written.read_options(format, IndexPolicy::default());
    let broken = ColumnAndIndexSupplier::read(&corrupted, options);
    let healthy = ColumnAndIndexSupplier::read(&written.bytes, options);
    let err = broken.get().unwrap_err();
    assert_eq!(StatusCode::StorageCorrupted, err.status_code(), "{err}");
    assert!(!broken.is_ready());

    let column = healthy.get().unwrap();
    assert_eq!(2, column.row_count());
    assert_eq!(written.rows[0], column.row_value(0).unwrap());
}

#[test]
fn test_unsupported_merge_input() {
    let dictionary = auto_column::dictionary::SortedValueDictionary::empty();
    let field_types: auto_column::FieldTypeInfo =
        [("$", auto_column::TypeSet::from_bits(1 << 12))].into_iter().collect();
    let err = DictionaryMerger::merge(
        FormatVersion::V1,
        &[MergeInput {
            version: FormatVersion::V1,
            dictionary: &dictionary,
            field_types: &field_types,
        }],
    )
    .unwrap_err();
    assert_eq!(StatusCode::Unsupported, err.status_code());
}
