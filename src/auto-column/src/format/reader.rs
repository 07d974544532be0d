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

//! Parses and validates persisted columns without copying their bytes.

use std::cmp::Ordering;

use itertools::Itertools;
use ordered_float::OrderedFloat;
use snafu::{ensure, OptionExt, ResultExt};

use crate::bitmap::{Bitmap, BitmapCodec};
use crate::config::ByteOrder;
use crate::dictionary::{DictionaryId, IdSpace, NULL_ID};
use crate::error::{
    InvalidFormatSnafu, MetadataMismatchSnafu, Result, RowOutOfRangeSnafu, Utf8Snafu,
};
use crate::format::{
    binary_search_by, structured, ByteReader, FixedSeq, FIELD_PATH_ARRAY, FIELD_PATH_INLINE,
    FLAG_BIG_ENDIAN, FLAG_BITVEC_CODEC, FLAG_FIELDS, FLAG_VALUE_BITMAPS, KNOWN_FLAGS,
};
use crate::path::{parse_json_path, path_from_tokens};
use crate::schema::FormatVersion;
use crate::supplier::ColumnReadOptions;
use crate::types::{FieldTypeInfo, LogicalType, TypeSet};
use crate::value::{ScalarValue, Value};

#[derive(Debug, Clone, Copy)]
struct StringDictView<'a> {
    offsets: FixedSeq<'a, u32>,
    data: &'a str,
}

impl<'a> StringDictView<'a> {
    fn get(&self, index: usize) -> &'a str {
        let data = self.data;
        &data[self.offsets.get(index) as usize..self.offsets.get(index + 1) as usize]
    }
}

#[derive(Debug, Clone, Copy)]
struct ArrayDictView<'a> {
    offsets: FixedSeq<'a, u32>,
    elements: FixedSeq<'a, u32>,
}

impl ArrayDictView<'_> {
    fn get(&self, index: usize) -> impl Iterator<Item = u32> + '_ {
        let start = self.offsets.get(index) as usize;
        let end = self.offsets.get(index + 1) as usize;
        (start..end).map(|i| self.elements.get(i))
    }
}

#[derive(Debug, Clone, Copy)]
enum EncodedValues<'a> {
    Ids(FixedSeq<'a, u32>),
    Structured {
        offsets: FixedSeq<'a, u32>,
        data: &'a [u8],
    },
}

#[derive(Debug, Clone, Copy)]
struct BitmapTable<'a> {
    /// Number of value bitmaps, the null bitmap follows them.
    count: usize,
    offsets: FixedSeq<'a, u32>,
    data: &'a [u8],
}

impl<'a> BitmapTable<'a> {
    fn bytes(&self, index: usize) -> &'a [u8] {
        let data = self.data;
        &data[self.offsets.get(index) as usize..self.offsets.get(index + 1) as usize]
    }
}

/// Validated structure of a persisted column, borrowing its bytes.
#[derive(Debug)]
pub(crate) struct ColumnParts<'a> {
    version: FormatVersion,
    logical_type: LogicalType,
    row_count: usize,
    order: ByteOrder,
    codec: BitmapCodec,
    space: IdSpace,
    strings: StringDictView<'a>,
    longs: FixedSeq<'a, i64>,
    doubles: FixedSeq<'a, f64>,
    arrays: ArrayDictView<'a>,
    values: EncodedValues<'a>,
    bitmaps: BitmapTable<'a>,
    field_types: FieldTypeInfo,
}

impl<'a> ColumnParts<'a> {
    pub(crate) fn version(&self) -> FormatVersion {
        self.version
    }

    pub(crate) fn logical_type(&self) -> LogicalType {
        self.logical_type
    }

    pub(crate) fn row_count(&self) -> usize {
        self.row_count
    }

    pub(crate) fn codec(&self) -> BitmapCodec {
        self.codec
    }

    pub(crate) fn field_types(&self) -> &FieldTypeInfo {
        &self.field_types
    }

    /// Number of ids, including null.
    pub(crate) fn cardinality(&self) -> usize {
        self.space.cardinality() as usize
    }

    /// Number of null and scalar ids. Scalar ids are `1..scalar_cardinality`.
    pub(crate) fn scalar_cardinality(&self) -> u32 {
        self.space.scalar_cardinality()
    }

    pub(crate) fn scalar(&self, id: u32) -> Option<ScalarValue> {
        match self.space.classify(id)? {
            DictionaryId::String(i) => Some(ScalarValue::String(self.strings.get(i).to_string())),
            DictionaryId::Long(i) => Some(ScalarValue::Long(self.longs.get(i))),
            DictionaryId::Double(i) => Some(ScalarValue::Double(OrderedFloat(self.doubles.get(i)))),
            DictionaryId::Null | DictionaryId::Array(_) => None,
        }
    }

    /// Decodes the dictionary value of `id`, `None` if out of range.
    pub(crate) fn dictionary_value(&self, id: u32) -> Option<Value> {
        match self.space.classify(id)? {
            DictionaryId::Null => Some(Value::Null),
            DictionaryId::Array(i) => Some(Value::Array(
                self.arrays
                    .get(i)
                    .map(|element| self.scalar(element).map(Value::from).unwrap_or_default())
                    .collect(),
            )),
            _ => self.scalar(id).map(Value::from),
        }
    }

    pub(crate) fn lookup_scalar(&self, value: &ScalarValue) -> Option<u32> {
        match value {
            ScalarValue::String(s) => binary_search_by(self.space.strings as usize, |i| {
                self.strings.get(i).cmp(s.as_str())
            })
            .map(|i| self.space.string_id(i)),
            ScalarValue::Long(v) => {
                binary_search_by(self.longs.len(), |i| self.longs.get(i).cmp(v))
                    .map(|i| self.space.long_id(i))
            }
            ScalarValue::Double(v) => binary_search_by(self.doubles.len(), |i| {
                OrderedFloat(self.doubles.get(i)).cmp(v)
            })
            .map(|i| self.space.double_id(i)),
        }
    }

    /// First scalar id whose value does not satisfy `pred`, given scalars
    /// satisfying it all sort first.
    pub(crate) fn scalar_partition_point(&self, pred: impl Fn(&ScalarValue) -> bool) -> u32 {
        let (mut lo, mut hi) = (1, self.scalar_cardinality());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.scalar(mid) {
                Some(value) if pred(&value) => lo = mid + 1,
                _ => hi = mid,
            }
        }
        lo
    }

    pub(crate) fn row_id(&self, row: usize) -> Option<u32> {
        match self.values {
            EncodedValues::Ids(ids) if row < self.row_count => Some(ids.get(row)),
            _ => None,
        }
    }

    pub(crate) fn row_value(&self, row: usize) -> Result<Value> {
        ensure!(
            row < self.row_count,
            RowOutOfRangeSnafu {
                row,
                row_count: self.row_count,
            }
        );
        match self.values {
            EncodedValues::Ids(ids) => Ok(self.dictionary_value(ids.get(row)).unwrap_or_default()),
            EncodedValues::Structured { offsets, data } => {
                let start = offsets.get(row) as usize;
                let end = offsets.get(row + 1) as usize;
                structured::decode(&data[start..end], self.order)
            }
        }
    }

    /// Row bitmap of `id`. Unknown ids have empty bitmaps.
    pub(crate) fn bitmap(&self, id: u32) -> Result<Bitmap> {
        if id == NULL_ID {
            return self.null_bitmap();
        }
        let index = id as usize - 1;
        if index >= self.bitmaps.count {
            return Ok(Bitmap::empty(self.codec));
        }
        Bitmap::deserialize(self.bitmaps.bytes(index), self.codec)
    }

    pub(crate) fn null_bitmap(&self) -> Result<Bitmap> {
        Bitmap::deserialize(self.bitmaps.bytes(self.bitmaps.count), self.codec)
    }
}

fn invalid(reason: impl Into<String>) -> crate::error::Error {
    InvalidFormatSnafu {
        reason: reason.into(),
    }
    .build()
}

/// Reads `count + 1` offsets, returning them with the final offset.
fn read_offsets<'a>(
    reader: &mut ByteReader<'a>,
    count: usize,
    section: &'static str,
) -> Result<(FixedSeq<'a, u32>, usize)> {
    let len = count
        .checked_add(1)
        .context(InvalidFormatSnafu {
            reason: format!("too many entries in {section}"),
        })?;
    let offsets = reader.read_seq::<u32>(len, section)?;
    ensure!(
        offsets.get(0) == 0,
        InvalidFormatSnafu {
            reason: format!("first offset of {section} is not zero"),
        }
    );
    if let Some((position, _)) = offsets
        .iter()
        .tuple_windows()
        .find_position(|(start, end)| start > end)
    {
        return InvalidFormatSnafu {
            reason: format!("offsets of {section} decrease at {position}"),
        }
        .fail();
    }
    Ok((offsets, offsets.get(count) as usize))
}

fn ensure_increasing<T: PartialOrd>(
    section: &'static str,
    values: impl Iterator<Item = T>,
) -> Result<()> {
    let mut prev: Option<T> = None;
    for (position, value) in values.enumerate() {
        if let Some(prev) = &prev {
            ensure!(
                *prev < value,
                InvalidFormatSnafu {
                    reason: format!("{section} is not strictly increasing at {position}"),
                }
            );
        }
        prev = Some(value);
    }
    Ok(())
}

fn ensure_metadata<T: PartialEq + std::fmt::Debug>(
    field: &'static str,
    expected: T,
    actual: T,
) -> Result<()> {
    ensure!(
        expected == actual,
        MetadataMismatchSnafu {
            field,
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    );
    Ok(())
}

/// Parses and validates `bytes` as a column described by `options`.
pub(crate) fn parse_column<'a>(
    bytes: &'a [u8],
    options: &ColumnReadOptions,
) -> Result<ColumnParts<'a>> {
    // The first three bytes are order independent.
    let mut reader = ByteReader::new(bytes, ByteOrder::LittleEndian);
    let version = match reader.read_u8("header")? {
        1 => FormatVersion::V1,
        2 => FormatVersion::V2,
        v => return Err(invalid(format!("unknown format version {v}"))),
    };
    let flags = reader.read_u8("header")?;
    ensure!(
        flags & !KNOWN_FLAGS == 0,
        InvalidFormatSnafu {
            reason: format!("unknown flags {flags:#04x}"),
        }
    );
    let tag = reader.read_u8("header")?;
    let logical_type = LogicalType::from_tag(tag)
        .with_context(|| InvalidFormatSnafu {
            reason: format!("unknown logical type tag {tag}"),
        })?;

    let order = if flags & FLAG_BIG_ENDIAN != 0 {
        ByteOrder::BigEndian
    } else {
        ByteOrder::LittleEndian
    };
    let codec = if flags & FLAG_BITVEC_CODEC != 0 {
        BitmapCodec::BitVec
    } else {
        BitmapCodec::Roaring
    };
    ensure_metadata("logical type", options.logical_type, logical_type)?;
    ensure_metadata("byte order", options.byte_order, order)?;
    ensure_metadata("bitmap codec", options.bitmap_codec, codec)?;
    ensure!(
        flags & FLAG_VALUE_BITMAPS != 0,
        InvalidFormatSnafu {
            reason: "value bitmaps are missing",
        }
    );

    let mut reader = ByteReader::new(&bytes[3..], order);
    let row_count = reader.read_u32("header")? as usize;

    // Dictionaries.
    let section = "string dictionary";
    let string_count = reader.read_u32(section)? as usize;
    let (offsets, total) = read_offsets(&mut reader, string_count, section)?;
    let data = std::str::from_utf8(reader.read_bytes(total, section)?)
        .context(Utf8Snafu { section })?;
    ensure!(
        offsets.iter().all(|offset| data.is_char_boundary(offset as usize)),
        InvalidFormatSnafu {
            reason: "string offset splits a character",
        }
    );
    let strings = StringDictView { offsets, data };
    ensure_increasing(section, (0..string_count).map(|i| strings.get(i)))?;

    let section = "long dictionary";
    let count = reader.read_u32(section)? as usize;
    let longs = reader.read_seq::<i64>(count, section)?;
    ensure_increasing(section, longs.iter())?;

    let section = "double dictionary";
    let count = reader.read_u32(section)? as usize;
    let doubles = reader.read_seq::<f64>(count, section)?;
    ensure_increasing(section, doubles.iter().map(OrderedFloat))?;

    let section = "array dictionary";
    let array_count = reader.read_u32(section)? as usize;
    let (offsets, total) = read_offsets(&mut reader, array_count, section)?;
    let elements = reader.read_seq::<u32>(total, section)?;
    let space = IdSpace::try_new(string_count, longs.len(), doubles.len(), array_count)?;
    ensure!(
        elements.iter().all(|id| id < space.scalar_cardinality()),
        InvalidFormatSnafu {
            reason: "array element is not a scalar id",
        }
    );
    let arrays = ArrayDictView { offsets, elements };
    for i in 1..array_count {
        ensure!(
            arrays.get(i - 1).cmp(arrays.get(i)) == Ordering::Less,
            InvalidFormatSnafu {
                reason: format!("{section} is not strictly increasing at {i}"),
            }
        );
    }

    // Row values.
    let values = if logical_type == LogicalType::Nested {
        let section = "structured values";
        let (offsets, total) = read_offsets(&mut reader, row_count, section)?;
        let data = reader.read_bytes(total, section)?;
        for row in 0..row_count {
            let start = offsets.get(row) as usize;
            let end = offsets.get(row + 1) as usize;
            structured::decode(&data[start..end], order)?;
        }
        EncodedValues::Structured { offsets, data }
    } else {
        let ids = reader.read_seq::<u32>(row_count, "encoded values")?;
        ensure!(
            ids.iter().all(|id| id < space.cardinality()),
            InvalidFormatSnafu {
                reason: "encoded value id out of range",
            }
        );
        EncodedValues::Ids(ids)
    };

    // Bitmaps.
    let section = "bitmaps";
    let count = reader.read_u32(section)? as usize;
    ensure!(
        count + 1 == space.cardinality() as usize,
        InvalidFormatSnafu {
            reason: format!(
                "expect {} value bitmaps, found {count}",
                space.cardinality() - 1
            ),
        }
    );
    let (offsets, total) = read_offsets(&mut reader, count + 1, section)?;
    let data = reader.read_bytes(total, section)?;
    let bitmaps = BitmapTable {
        count,
        offsets,
        data,
    };
    Bitmap::deserialize(bitmaps.bytes(count), codec)?;

    let mut parts = ColumnParts {
        version,
        logical_type,
        row_count,
        order,
        codec,
        space,
        strings,
        longs,
        doubles,
        arrays,
        values,
        bitmaps,
        field_types: FieldTypeInfo::new(),
    };

    // Fields.
    if flags & FLAG_FIELDS != 0 {
        let section = "fields";
        let count = reader.read_u32(section)?;
        for _ in 0..count {
            let path = match reader.read_u8(section)? {
                FIELD_PATH_INLINE => {
                    let len = reader.read_u32(section)? as usize;
                    let path = std::str::from_utf8(reader.read_bytes(len, section)?)
                        .context(Utf8Snafu { section })?;
                    parse_json_path(path).map_err(|e| invalid(e.to_string()))?;
                    path.to_string()
                }
                FIELD_PATH_ARRAY if version == FormatVersion::V2 => {
                    let id = reader.read_u32(section)?;
                    parts.path_of_array(id)?
                }
                kind => return Err(invalid(format!("unexpected field path kind {kind}"))),
            };
            let types = TypeSet::from_bits(reader.read_u16(section)?);
            types.validate(&path)?;
            parts.field_types.insert(path, types);
        }
        ensure_metadata(
            "field types",
            logical_type,
            parts.field_types.resolve_logical_type(),
        )?;
    }
    ensure!(
        reader.remaining() == 0,
        InvalidFormatSnafu {
            reason: format!("{} trailing bytes", reader.remaining()),
        }
    );

    Ok(parts)
}

impl ColumnParts<'_> {
    /// Json path rebuilt from the path array `id`.
    fn path_of_array(&self, id: u32) -> Result<String> {
        let Some(DictionaryId::Array(index)) = self.space.classify(id) else {
            return Err(invalid(format!("field path id {id} is not an array")));
        };
        let tokens = self
            .arrays
            .get(index)
            .map(|element| match self.space.classify(element) {
                Some(DictionaryId::String(i)) => Ok(self.strings.get(i)),
                _ => Err(invalid(format!("field path array {id} holds a non string"))),
            })
            .collect::<Result<Vec<_>>>()?;
        path_from_tokens(&tokens).map_err(|e| invalid(e.to_string()))
    }
}
