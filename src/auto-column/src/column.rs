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

//! Read side of a persisted column and the selectors over it.

use std::cell::Cell;
use std::sync::Arc;

use common_telemetry::warn;
use once_cell::unsync::OnceCell;

use crate::bitmap::Bitmap;
use crate::error::Result;
use crate::format::reader::ColumnParts;
use crate::path::{parse_json_path, PathPart};
use crate::schema::FormatVersion;
use crate::types::{FieldTypeInfo, LogicalType};
use crate::value::Value;

/// Current row of a scan.
pub trait ReadableOffset {
    fn get_offset(&self) -> usize;
}

/// Offset walking rows `0..row_count` in order.
#[derive(Debug)]
pub struct SimpleAscendingOffset {
    offset: Cell<usize>,
    row_count: usize,
}

impl SimpleAscendingOffset {
    pub fn new(row_count: usize) -> Self {
        SimpleAscendingOffset {
            offset: Cell::new(0),
            row_count,
        }
    }

    pub fn increment(&self) {
        self.offset.set(self.offset.get() + 1);
    }

    pub fn within_bounds(&self) -> bool {
        self.offset.get() < self.row_count
    }

    pub fn reset(&self) {
        self.offset.set(0);
    }
}

impl ReadableOffset for SimpleAscendingOffset {
    fn get_offset(&self) -> usize {
        self.offset.get()
    }
}

/// Yields the value of the current row.
pub trait ColumnValueSelector {
    fn get_object(&self) -> Value;
}

/// Selector holding a value set by the caller, used to feed serializers.
#[derive(Debug, Default, Clone)]
pub struct SettableValueSelector {
    value: Value,
}

impl SettableValueSelector {
    pub fn new(value: Value) -> Self {
        SettableValueSelector { value }
    }

    pub fn set_object(&mut self, value: Value) {
        self.value = value;
    }
}

impl ColumnValueSelector for SettableValueSelector {
    fn get_object(&self) -> Value {
        self.value.clone()
    }
}

/// A readable auto typed column.
///
/// Columns share the parsed parts of their supplier, so creating one is
/// cheap.
pub struct Column<'a> {
    parts: Arc<ColumnParts<'a>>,
    null_bitmap: OnceCell<Bitmap>,
}

impl<'a> Column<'a> {
    pub(crate) fn new(parts: Arc<ColumnParts<'a>>) -> Self {
        Column {
            parts,
            null_bitmap: OnceCell::new(),
        }
    }

    pub fn logical_type(&self) -> LogicalType {
        self.parts.logical_type()
    }

    pub fn version(&self) -> FormatVersion {
        self.parts.version()
    }

    pub fn row_count(&self) -> usize {
        self.parts.row_count()
    }

    pub fn field_type_info(&self) -> &FieldTypeInfo {
        self.parts.field_types()
    }

    /// Number of dictionary ids, including null.
    pub fn cardinality(&self) -> usize {
        self.parts.cardinality()
    }

    pub fn row_value(&self, row: usize) -> Result<Value> {
        self.parts.row_value(row)
    }

    /// Dictionary id of `row`. Nested columns store no ids.
    pub fn row_id(&self, row: usize) -> Option<u32> {
        self.parts.row_id(row)
    }

    /// Value of dictionary `id`, `None` if the id is unknown.
    pub fn dictionary_value(&self, id: u32) -> Option<Value> {
        self.parts.dictionary_value(id)
    }

    /// Rows whose value is null.
    pub fn null_bitmap(&self) -> Result<&Bitmap> {
        self.null_bitmap.get_or_try_init(|| self.parts.null_bitmap())
    }

    pub fn make_column_value_selector<'c>(
        &'c self,
        offset: &'c dyn ReadableOffset,
    ) -> RowValueSelector<'c, 'a> {
        RowValueSelector {
            column: self,
            offset,
        }
    }

    /// Selector of the value at json `path` inside each row.
    pub fn make_path_selector<'c>(
        &'c self,
        path: &str,
        offset: &'c dyn ReadableOffset,
    ) -> Result<PathValueSelector<'c, 'a>> {
        Ok(PathValueSelector {
            row: self.make_column_value_selector(offset),
            parts: parse_json_path(path)?,
        })
    }

    /// Releases the column. Its supplier keeps the parsed parts.
    pub fn close(self) {}
}

impl std::fmt::Debug for Column<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("logical_type", &self.logical_type())
            .field("row_count", &self.row_count())
            .field("cardinality", &self.cardinality())
            .finish()
    }
}

/// Selector of whole row values.
pub struct RowValueSelector<'c, 'a> {
    column: &'c Column<'a>,
    offset: &'c dyn ReadableOffset,
}

impl RowValueSelector<'_, '_> {
    pub fn try_get_object(&self) -> Result<Value> {
        self.column.row_value(self.offset.get_offset())
    }
}

impl ColumnValueSelector for RowValueSelector<'_, '_> {
    fn get_object(&self) -> Value {
        match self.try_get_object() {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "Failed to read row {}, err: {}",
                    self.offset.get_offset(),
                    e
                );
                Value::Null
            }
        }
    }
}

/// Selector of the value at a json path inside each row.
pub struct PathValueSelector<'c, 'a> {
    row: RowValueSelector<'c, 'a>,
    parts: Vec<PathPart>,
}

impl ColumnValueSelector for PathValueSelector<'_, '_> {
    fn get_object(&self) -> Value {
        let row = self.row.get_object();
        row.get_path(&self.parts).cloned().unwrap_or_default()
    }
}
