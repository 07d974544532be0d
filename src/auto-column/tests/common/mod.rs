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

//! Helpers shared by the integration tests.

#![allow(dead_code)]

use auto_column::{
    AutoColumnOptions, AutoTypeColumnSchema, AutoTypeColumnSerializer, ColumnReadOptions,
    DictionaryMerger, FormatOptions, IndexPolicy, LogicalType, MergedDictionary,
    OnHeapWriteOutMedium, SettableValueSelector, Value,
};

/// A column written to memory.
pub struct WrittenColumn {
    pub bytes: Vec<u8>,
    pub merged: MergedDictionary,
    /// Row values as stored, after casting.
    pub rows: Vec<Value>,
}

impl WrittenColumn {
    pub fn logical_type(&self) -> LogicalType {
        self.merged.logical_type
    }

    pub fn read_options(&self, format: FormatOptions, index_policy: IndexPolicy) -> ColumnReadOptions {
        ColumnReadOptions {
            logical_type: self.logical_type(),
            byte_order: format.byte_order,
            bitmap_codec: format.bitmap_codec,
            index_policy,
        }
    }

    pub fn default_read_options(&self) -> ColumnReadOptions {
        ColumnReadOptions::new(self.logical_type(), &AutoColumnOptions::default())
    }
}

/// Indexes every partition separately, merges them and writes the rows of
/// all partitions in order.
pub fn write_partitions(
    schema: &AutoTypeColumnSchema,
    partitions: &[Vec<Value>],
    format: FormatOptions,
) -> WrittenColumn {
    let mut rows = Vec::new();
    let mut lookups = Vec::with_capacity(partitions.len());
    for partition in partitions {
        let mut indexer = schema.make_indexer();
        for value in partition {
            rows.push(indexer.process_row_value(value.clone()).unwrap().into_value());
        }
        lookups.push(indexer.sorted_lookups().unwrap());
    }
    let inputs = lookups.iter().map(|l| l.as_merge_input()).collect::<Vec<_>>();
    let merged = DictionaryMerger::merge(schema.version(), &inputs).unwrap();

    let mut serializer = AutoTypeColumnSerializer::new(
        schema.name(),
        schema.version(),
        merged.logical_type,
        format,
        &OnHeapWriteOutMedium,
    )
    .unwrap();
    serializer.serialize_dictionaries(&merged).unwrap();
    let mut selector = SettableValueSelector::default();
    for row in &rows {
        selector.set_object(row.clone());
        serializer.serialize(&selector).unwrap();
    }
    let size = serializer.serialized_size().unwrap();
    let mut bytes = Vec::new();
    let written = serializer.write_to(&mut bytes).unwrap();
    assert_eq!(size, written);
    assert_eq!(size as usize, bytes.len());

    WrittenColumn {
        bytes,
        merged,
        rows,
    }
}

pub fn write_rows(schema: &AutoTypeColumnSchema, rows: &[Value], format: FormatOptions) -> WrittenColumn {
    write_partitions(schema, &[rows.to_vec()], format)
}

pub fn schema(version: i64) -> AutoTypeColumnSchema {
    AutoTypeColumnSchema::new("attrs", None, Some(version)).unwrap()
}

/// Values parsed from json literals.
pub fn values(json: serde_json::Value) -> Vec<Value> {
    match json {
        serde_json::Value::Array(rows) => rows.into_iter().map(Value::from).collect(),
        other => vec![Value::from(other)],
    }
}

pub fn all_formats() -> Vec<FormatOptions> {
    use auto_column::{BitmapCodec, ByteOrder};

    let mut formats = Vec::new();
    for byte_order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
        for bitmap_codec in [BitmapCodec::Roaring, BitmapCodec::BitVec] {
            formats.push(FormatOptions {
                bitmap_codec,
                byte_order,
            });
        }
    }
    formats
}
