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

//! Serializer of auto typed columns.

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use common_telemetry::{debug, warn};
use snafu::{ensure, ResultExt};

use crate::bitmap::{Bitmap, BitmapCodec};
use crate::column::ColumnValueSelector;
use crate::config::{ByteOrder, FormatOptions};
use crate::dictionary::{SortedValueDictionary, NULL_ID};
use crate::error::{
    CreateWriteOutSnafu, Error, IllegalSerializerStateSnafu, InvalidFormatSnafu,
    LogicalTypeMismatchSnafu, Result, UnsupportedValueSnafu, ValueNotInDictionarySnafu,
    VersionMismatchSnafu, WriteColumnSnafu,
};
use crate::format::{
    put_f64, put_i64, put_u16, put_u32, structured, FIELD_PATH_ARRAY, FIELD_PATH_INLINE,
    FLAG_BIG_ENDIAN, FLAG_BITVEC_CODEC, FLAG_FIELDS, FLAG_VALUE_BITMAPS, HEADER_SIZE,
};
use crate::merge::MergedDictionary;
use crate::metrics::SERIALIZED_BYTES_TOTAL;
use crate::schema::FormatVersion;
use crate::types::LogicalType;
use crate::value::Value;

/// Destination of serialized columns.
pub trait ByteSink: Write {
    /// Total bytes written to this sink so far.
    fn bytes_written(&self) -> u64;
}

impl ByteSink for Vec<u8> {
    fn bytes_written(&self) -> u64 {
        self.len() as u64
    }
}

/// Wraps a writer and counts the bytes written through it.
#[derive(Debug)]
pub struct CountingSink<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingSink<W> {
    pub fn new(inner: W) -> Self {
        CountingSink { inner, written: 0 }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> ByteSink for CountingSink<W> {
    fn bytes_written(&self) -> u64 {
        self.written
    }
}

/// Intermediate buffer holding one section until the column is written.
pub trait WriteOutBytes: Write + Send {
    fn size(&self) -> u64;

    /// Copies all bytes written so far to `sink`.
    fn write_to(&mut self, sink: &mut dyn ByteSink) -> io::Result<u64>;
}

/// Factory of intermediate buffers.
pub trait WriteOutMedium: Send + Sync {
    fn make_write_out_bytes(&self) -> Result<Box<dyn WriteOutBytes>>;
}

/// Keeps intermediate sections in memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct OnHeapWriteOutMedium;

impl WriteOutMedium for OnHeapWriteOutMedium {
    fn make_write_out_bytes(&self) -> Result<Box<dyn WriteOutBytes>> {
        Ok(Box::<HeapWriteOutBytes>::default())
    }
}

#[derive(Default)]
struct HeapWriteOutBytes(Vec<u8>);

impl Write for HeapWriteOutBytes {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl WriteOutBytes for HeapWriteOutBytes {
    fn size(&self) -> u64 {
        self.0.len() as u64
    }

    fn write_to(&mut self, sink: &mut dyn ByteSink) -> io::Result<u64> {
        sink.write_all(&self.0)?;
        Ok(self.0.len() as u64)
    }
}

/// Spills intermediate sections to anonymous temp files under `dir`.
#[derive(Debug, Clone)]
pub struct TmpFileWriteOutMedium {
    dir: PathBuf,
}

impl TmpFileWriteOutMedium {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        TmpFileWriteOutMedium { dir: dir.into() }
    }
}

impl WriteOutMedium for TmpFileWriteOutMedium {
    fn make_write_out_bytes(&self) -> Result<Box<dyn WriteOutBytes>> {
        let file = tempfile::tempfile_in(&self.dir).context(CreateWriteOutSnafu)?;
        Ok(Box::new(FileWriteOutBytes {
            file: BufWriter::new(file),
            size: 0,
        }))
    }
}

struct FileWriteOutBytes {
    file: BufWriter<File>,
    size: u64,
}

impl Write for FileWriteOutBytes {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.size += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl WriteOutBytes for FileWriteOutBytes {
    fn size(&self) -> u64 {
        self.size
    }

    fn write_to(&mut self, sink: &mut dyn ByteSink) -> io::Result<u64> {
        self.file.flush()?;
        let file = self.file.get_mut();
        file.seek(SeekFrom::Start(0))?;
        let copied = io::copy(&mut Read::take(&mut *file, self.size), sink)?;
        file.seek(SeekFrom::End(0))?;
        Ok(copied)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SerializerState {
    Created,
    DictionariesWritten,
    /// Bitmaps are encoded, no more rows are accepted.
    Sealed,
    Failed,
}

impl SerializerState {
    fn name(&self) -> &'static str {
        match self {
            SerializerState::Created => "CREATED",
            SerializerState::DictionariesWritten => "DICTIONARIES_WRITTEN",
            SerializerState::Sealed => "SEALED",
            SerializerState::Failed => "FAILED",
        }
    }
}

/// Writes one auto typed column.
///
/// Dictionaries must be serialized before any row. Any error poisons the
/// serializer and every later call fails.
pub struct AutoTypeColumnSerializer {
    name: String,
    version: FormatVersion,
    logical_type: LogicalType,
    options: FormatOptions,
    state: SerializerState,
    dictionary: SortedValueDictionary,
    dictionary_out: Box<dyn WriteOutBytes>,
    /// Row offsets of structured values, nested columns only.
    offsets_out: Box<dyn WriteOutBytes>,
    values_out: Box<dyn WriteOutBytes>,
    fields_section: Vec<u8>,
    has_fields: bool,
    /// Row bitmap of every id, the null bitmap at id 0.
    bitmaps: Vec<Bitmap>,
    bitmap_section: Vec<u8>,
    row_count: u32,
    structured_end: u32,
    scratch: Vec<u8>,
}

impl AutoTypeColumnSerializer {
    pub fn new(
        name: impl Into<String>,
        version: FormatVersion,
        logical_type: LogicalType,
        options: FormatOptions,
        medium: &dyn WriteOutMedium,
    ) -> Result<Self> {
        Ok(AutoTypeColumnSerializer {
            name: name.into(),
            version,
            logical_type,
            options,
            state: SerializerState::Created,
            dictionary: SortedValueDictionary::empty(),
            dictionary_out: medium.make_write_out_bytes()?,
            offsets_out: medium.make_write_out_bytes()?,
            values_out: medium.make_write_out_bytes()?,
            fields_section: Vec::new(),
            has_fields: false,
            bitmaps: Vec::new(),
            bitmap_section: Vec::new(),
            row_count: 0,
            structured_end: 0,
            scratch: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn row_count(&self) -> usize {
        self.row_count as usize
    }

    fn ensure_state(&self, expected: SerializerState) -> Result<()> {
        ensure!(
            self.state == expected,
            IllegalSerializerStateSnafu {
                column: &self.name,
                expected: expected.name(),
                actual: self.state.name(),
            }
        );
        Ok(())
    }

    /// Runs `f`, poisoning the serializer if it fails.
    fn poison_on_error<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = f(self);
        if let Err(e) = &result {
            warn!("Failed to serialize column {}, err: {}", self.name, e);
            self.state = SerializerState::Failed;
        }
        result
    }

    /// Writes the dictionaries and the field section of `merged`.
    pub fn serialize_dictionaries(&mut self, merged: &MergedDictionary) -> Result<()> {
        self.ensure_state(SerializerState::Created)?;
        self.poison_on_error(|this| this.write_dictionaries(merged))?;
        self.state = SerializerState::DictionariesWritten;
        Ok(())
    }

    fn write_dictionaries(&mut self, merged: &MergedDictionary) -> Result<()> {
        ensure!(
            merged.version == self.version,
            VersionMismatchSnafu {
                expected: self.version.as_u8(),
                actual: merged.version.as_u8(),
            }
        );
        ensure!(
            merged.logical_type == self.logical_type,
            LogicalTypeMismatchSnafu {
                column: &self.name,
                expected: self.logical_type,
                actual: merged.logical_type,
            }
        );
        let order = self.options.byte_order;
        let dictionary = &merged.dictionary;
        let cardinality = dictionary.id_space()?.cardinality();

        let mut buf = Vec::new();
        put_u32(&mut buf, dictionary.strings().len() as u32, order);
        put_offsets(
            &mut buf,
            dictionary.strings().iter().map(|s| s.len()),
            order,
        )?;
        for s in dictionary.strings() {
            buf.extend_from_slice(s.as_bytes());
        }

        put_u32(&mut buf, dictionary.longs().len() as u32, order);
        for v in dictionary.longs() {
            put_i64(&mut buf, *v, order);
        }

        put_u32(&mut buf, dictionary.doubles().len() as u32, order);
        for v in dictionary.doubles() {
            put_f64(&mut buf, v.0, order);
        }

        put_u32(&mut buf, dictionary.arrays().len() as u32, order);
        put_offsets(&mut buf, dictionary.arrays().iter().map(Vec::len), order)?;
        for id in dictionary.arrays().iter().flatten() {
            put_u32(&mut buf, *id, order);
        }
        let name = &self.name;
        self.dictionary_out
            .write_all(&buf)
            .context(WriteColumnSnafu { column: name })?;

        self.fields_section.clear();
        put_u32(&mut self.fields_section, merged.fields.len() as u32, order);
        for field in &merged.fields {
            field.types.validate(&field.path)?;
            match field.path_array_id {
                Some(id) => {
                    self.fields_section.push(FIELD_PATH_ARRAY);
                    put_u32(&mut self.fields_section, id, order);
                }
                None => {
                    self.fields_section.push(FIELD_PATH_INLINE);
                    put_u32(&mut self.fields_section, field.path.len() as u32, order);
                    self.fields_section.extend_from_slice(field.path.as_bytes());
                }
            }
            put_u16(&mut self.fields_section, field.types.bits(), order);
        }
        self.has_fields = !merged.fields.is_empty();

        if self.logical_type == LogicalType::Nested {
            let mut offset = Vec::with_capacity(4);
            put_u32(&mut offset, 0, order);
            self.offsets_out
                .write_all(&offset)
                .context(WriteColumnSnafu { column: name })?;
        }
        self.bitmaps = (0..cardinality)
            .map(|_| Bitmap::empty(self.options.bitmap_codec))
            .collect();
        self.dictionary = dictionary.clone();

        debug!(
            "Serialized dictionaries of column {}, type: {}, cardinality: {}, fields: {}",
            self.name,
            self.logical_type,
            cardinality,
            merged.fields.len()
        );
        Ok(())
    }

    /// Serializes the current row of `selector`.
    pub fn serialize(&mut self, selector: &dyn ColumnValueSelector) -> Result<()> {
        self.ensure_state(SerializerState::DictionariesWritten)?;
        let value = selector.get_object();
        self.poison_on_error(|this| this.write_row(&value))?;
        self.row_count += 1;
        Ok(())
    }

    fn write_row(&mut self, value: &Value) -> Result<()> {
        let row = self.row_count;
        let order = self.options.byte_order;
        let name = &self.name;
        if self.logical_type == LogicalType::Nested {
            if value.exceeds_max_depth() {
                return Err(self.unsupported(value));
            }
            let mut ids = Vec::new();
            self.collect_literal_ids(value, &mut ids)?;
            if value.is_null() {
                ids.push(NULL_ID);
            }
            ids.sort_unstable();
            ids.dedup();

            self.scratch.clear();
            structured::encode(value, order, &mut self.scratch);
            let end = u32::try_from(self.scratch.len())
                .ok()
                .and_then(|len| self.structured_end.checked_add(len))
                .ok_or_else(|| {
                    InvalidFormatSnafu {
                        reason: format!("structured values of column {name} exceed 4GiB"),
                    }
                    .build()
                })?;
            let mut offset = Vec::with_capacity(4);
            put_u32(&mut offset, end, order);
            self.values_out
                .write_all(&self.scratch)
                .context(WriteColumnSnafu { column: name })?;
            self.offsets_out
                .write_all(&offset)
                .context(WriteColumnSnafu { column: name })?;
            self.structured_end = end;
            for id in ids {
                self.bitmaps[id as usize].insert(row);
            }
        } else {
            let id = self.lookup_id(value)?;
            let mut buf = Vec::with_capacity(4);
            put_u32(&mut buf, id, order);
            self.values_out
                .write_all(&buf)
                .context(WriteColumnSnafu { column: name })?;
            self.bitmaps[id as usize].insert(row);
        }
        Ok(())
    }

    fn unsupported(&self, value: &Value) -> Error {
        UnsupportedValueSnafu {
            column: &self.name,
            logical_type: self.logical_type,
            kind: value.kind_name(),
        }
        .build()
    }

    fn not_in_dictionary(&self, value: &Value) -> Error {
        ValueNotInDictionarySnafu {
            column: &self.name,
            value: value.to_string(),
        }
        .build()
    }

    /// Id of a row value of a scalar, array or variant column.
    fn lookup_id(&self, value: &Value) -> Result<u32> {
        let logical_type = self.logical_type;
        match value {
            Value::Null => Ok(NULL_ID),
            Value::String(_) | Value::Long(_) | Value::Double(_) => {
                let Some(scalar) = value.as_scalar() else {
                    return Err(self.unsupported(value));
                };
                if logical_type != LogicalType::Variant && logical_type != scalar.logical_type() {
                    return Err(self.unsupported(value));
                }
                self.dictionary
                    .lookup_scalar(&scalar)
                    .ok_or_else(|| self.not_in_dictionary(value))
            }
            Value::Array(elements) => {
                let element_type = match logical_type {
                    LogicalType::Variant => None,
                    t if t.is_array() => t.element_type(),
                    _ => return Err(self.unsupported(value)),
                };
                for element in elements {
                    let supported = match (element.as_scalar(), element_type) {
                        _ if element.is_null() => true,
                        (Some(scalar), Some(t)) => scalar.logical_type() == t,
                        (Some(_), None) => true,
                        (None, _) => false,
                    };
                    if !supported {
                        return Err(self.unsupported(element));
                    }
                }
                self.dictionary
                    .lookup_literal_array(elements)
                    .ok_or_else(|| self.not_in_dictionary(value))
            }
            Value::Object(_) => Err(self.unsupported(value)),
        }
    }

    /// Collects the id of every scalar and literal array in a nested row.
    fn collect_literal_ids(&self, value: &Value, ids: &mut Vec<u32>) -> Result<()> {
        match value {
            Value::Null => {}
            Value::String(_) | Value::Long(_) | Value::Double(_) => {
                let id = value
                    .as_scalar()
                    .and_then(|scalar| self.dictionary.lookup_scalar(&scalar))
                    .ok_or_else(|| self.not_in_dictionary(value))?;
                ids.push(id);
            }
            Value::Array(elements) => {
                if value.literal_elements().is_some() {
                    let id = self
                        .dictionary
                        .lookup_literal_array(elements)
                        .ok_or_else(|| self.not_in_dictionary(value))?;
                    ids.push(id);
                } else {
                    for element in elements {
                        self.collect_literal_ids(element, ids)?;
                    }
                }
            }
            Value::Object(fields) => {
                for field in fields.values() {
                    self.collect_literal_ids(field, ids)?;
                }
            }
        }
        Ok(())
    }

    /// Encodes the bitmap section, after which no more rows are accepted.
    fn seal(&mut self) -> Result<()> {
        if self.state == SerializerState::Sealed {
            return Ok(());
        }
        self.ensure_state(SerializerState::DictionariesWritten)?;
        self.poison_on_error(|this| this.encode_bitmaps())?;
        self.state = SerializerState::Sealed;
        Ok(())
    }

    fn encode_bitmaps(&mut self) -> Result<()> {
        let order = self.options.byte_order;
        let mut data = Vec::new();
        let mut ends = Vec::with_capacity(self.bitmaps.len());
        let (null_bitmap, value_bitmaps) = self
            .bitmaps
            .split_first()
            .map(|(null, values)| (Some(null), values))
            .unwrap_or((None, &[]));
        for bitmap in value_bitmaps.iter().chain(null_bitmap) {
            bitmap.serialize_into(&mut data)?;
            ends.push(data.len());
        }
        ensure!(
            data.len() <= u32::MAX as usize,
            InvalidFormatSnafu {
                reason: format!("bitmaps of column {} exceed 4GiB", self.name),
            }
        );

        let mut section = Vec::with_capacity(8 + 4 * ends.len() + data.len());
        put_u32(&mut section, value_bitmaps.len() as u32, order);
        put_u32(&mut section, 0, order);
        for end in ends {
            put_u32(&mut section, end as u32, order);
        }
        section.extend_from_slice(&data);
        self.bitmap_section = section;
        self.bitmaps = Vec::new();
        Ok(())
    }

    fn flags(&self) -> u8 {
        let mut flags = FLAG_VALUE_BITMAPS;
        if self.has_fields {
            flags |= FLAG_FIELDS;
        }
        if self.options.byte_order == ByteOrder::BigEndian {
            flags |= FLAG_BIG_ENDIAN;
        }
        if self.options.bitmap_codec == BitmapCodec::BitVec {
            flags |= FLAG_BITVEC_CODEC;
        }
        flags
    }

    /// Exact number of bytes [AutoTypeColumnSerializer::write_to] writes.
    /// No more rows are accepted afterwards.
    pub fn serialized_size(&mut self) -> Result<u64> {
        self.seal()?;
        Ok(HEADER_SIZE as u64
            + self.dictionary_out.size()
            + self.offsets_out.size()
            + self.values_out.size()
            + self.bitmap_section.len() as u64
            + self.fields_section.len() as u64)
    }

    /// Writes the whole column to `sink`, returning the bytes written.
    pub fn write_to(&mut self, sink: &mut dyn ByteSink) -> Result<u64> {
        self.seal()?;
        let result = self.poison_on_error(|this| this.write_sections(sink));
        let written = result?;
        SERIALIZED_BYTES_TOTAL.inc_by(written);
        debug!(
            "Wrote column {}, type: {}, rows: {}, bytes: {}",
            self.name, self.logical_type, self.row_count, written
        );
        Ok(written)
    }

    fn write_sections(&mut self, sink: &mut dyn ByteSink) -> Result<u64> {
        let start = sink.bytes_written();
        let order = self.options.byte_order;
        let mut header = Vec::with_capacity(HEADER_SIZE);
        header.push(self.version.as_u8());
        header.push(self.flags());
        header.push(self.logical_type.tag());
        put_u32(&mut header, self.row_count, order);

        let name = &self.name;
        sink.write_all(&header)
            .context(WriteColumnSnafu { column: name })?;
        self.dictionary_out
            .write_to(sink)
            .context(WriteColumnSnafu { column: name })?;
        self.offsets_out
            .write_to(sink)
            .context(WriteColumnSnafu { column: name })?;
        self.values_out
            .write_to(sink)
            .context(WriteColumnSnafu { column: name })?;
        sink.write_all(&self.bitmap_section)
            .context(WriteColumnSnafu { column: name })?;
        sink.write_all(&self.fields_section)
            .context(WriteColumnSnafu { column: name })?;
        sink.flush().context(WriteColumnSnafu { column: name })?;
        Ok(sink.bytes_written() - start)
    }
}

/// Writes `(n + 1)` offsets of `n` consecutive lengths.
fn put_offsets(
    buf: &mut Vec<u8>,
    lengths: impl Iterator<Item = usize>,
    order: ByteOrder,
) -> Result<()> {
    let mut end = 0usize;
    put_u32(buf, 0, order);
    for len in lengths {
        end += len;
        ensure!(
            end <= u32::MAX as usize,
            InvalidFormatSnafu {
                reason: "dictionary section exceeds 4GiB",
            }
        );
        put_u32(buf, end as u32, order);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use common_error::ext::ErrorExt;
    use common_error::status_code::StatusCode;

    use super::*;
    use crate::column::SettableValueSelector;
    use crate::merge::{DictionaryMerger, MergeInput};
    use crate::types::{FieldTypeInfo, TypeSet};

    fn long_column() -> MergedDictionary {
        let dictionary = SortedValueDictionary::new(vec![], vec![1, 2], vec![], vec![]).unwrap();
        let types: FieldTypeInfo = [("$", TypeSet::new().with(LogicalType::Long))]
            .into_iter()
            .collect();
        DictionaryMerger::merge(
            FormatVersion::V1,
            &[MergeInput {
                version: FormatVersion::V1,
                dictionary: &dictionary,
                field_types: &types,
            }],
        )
        .unwrap()
    }

    fn serializer(medium: &dyn WriteOutMedium) -> AutoTypeColumnSerializer {
        AutoTypeColumnSerializer::new(
            "c",
            FormatVersion::V1,
            LogicalType::Long,
            FormatOptions::default(),
            medium,
        )
        .unwrap()
    }

    #[test]
    fn test_rows_before_dictionaries() {
        let mut serializer = serializer(&OnHeapWriteOutMedium);
        let selector = SettableValueSelector::new(Value::Long(1));
        let err = serializer.serialize(&selector).unwrap_err();
        assert_eq!(StatusCode::IllegalState, err.status_code());
    }

    #[test]
    fn test_unsupported_value_poisons() {
        let mut serializer = serializer(&OnHeapWriteOutMedium);
        serializer.serialize_dictionaries(&long_column()).unwrap();
        let mut selector = SettableValueSelector::new(Value::Long(1));
        serializer.serialize(&selector).unwrap();

        selector.set_object(Value::from("a"));
        let err = serializer.serialize(&selector).unwrap_err();
        assert_eq!(StatusCode::Unsupported, err.status_code());

        selector.set_object(Value::Long(2));
        let err = serializer.serialize(&selector).unwrap_err();
        assert_eq!(StatusCode::IllegalState, err.status_code());
        assert!(serializer.write_to(&mut Vec::new()).is_err());
    }

    #[test]
    fn test_value_not_in_dictionary() {
        let mut serializer = serializer(&OnHeapWriteOutMedium);
        serializer.serialize_dictionaries(&long_column()).unwrap();
        let selector = SettableValueSelector::new(Value::Long(3));
        let err = serializer.serialize(&selector).unwrap_err();
        assert!(matches!(err, Error::ValueNotInDictionary { .. }), "{err}");
    }

    #[test]
    fn test_type_mismatch() {
        let mut serializer = AutoTypeColumnSerializer::new(
            "c",
            FormatVersion::V1,
            LogicalType::String,
            FormatOptions::default(),
            &OnHeapWriteOutMedium,
        )
        .unwrap();
        assert!(serializer.serialize_dictionaries(&long_column()).is_err());
        let selector = SettableValueSelector::new(Value::Null);
        assert!(serializer.serialize(&selector).is_err());
    }

    #[test]
    fn test_reject_too_deep_row() {
        let dictionary = SortedValueDictionary::new(vec![], vec![1], vec![], vec![]).unwrap();
        let types: FieldTypeInfo = [("$", TypeSet::new().with(LogicalType::Nested))]
            .into_iter()
            .collect();
        let merged = DictionaryMerger::merge(
            FormatVersion::V1,
            &[MergeInput {
                version: FormatVersion::V1,
                dictionary: &dictionary,
                field_types: &types,
            }],
        )
        .unwrap();
        let mut serializer = AutoTypeColumnSerializer::new(
            "c",
            FormatVersion::V1,
            LogicalType::Nested,
            FormatOptions::default(),
            &OnHeapWriteOutMedium,
        )
        .unwrap();
        serializer.serialize_dictionaries(&merged).unwrap();

        let mut value = Value::Long(1);
        for _ in 0..crate::value::MAX_NESTING_DEPTH {
            value = Value::Array(vec![value]);
        }
        let err = serializer
            .serialize(&SettableValueSelector::new(value))
            .unwrap_err();
        assert_eq!(StatusCode::Unsupported, err.status_code());
    }

    #[test]
    fn test_exact_size() {
        let dir = tempfile::tempdir().unwrap();
        let tmp_medium = TmpFileWriteOutMedium::new(dir.path());
        let mediums: [&dyn WriteOutMedium; 2] = [&OnHeapWriteOutMedium, &tmp_medium];
        let mut outputs = Vec::new();
        for medium in mediums {
            let mut serializer = serializer(medium);
            serializer.serialize_dictionaries(&long_column()).unwrap();
            let mut selector = SettableValueSelector::new(Value::Null);
            for value in [Value::Long(2), Value::Null, Value::Long(1)] {
                selector.set_object(value);
                serializer.serialize(&selector).unwrap();
            }
            let size = serializer.serialized_size().unwrap();
            assert!(serializer.serialize(&selector).is_err());

            let mut sink = CountingSink::new(Vec::new());
            assert_eq!(size, serializer.write_to(&mut sink).unwrap());
            assert_eq!(size, sink.bytes_written());
            assert_eq!(size as usize, sink.get_ref().len());
            outputs.push(sink.into_inner());
        }
        assert_eq!(outputs[0], outputs[1]);
    }
}
