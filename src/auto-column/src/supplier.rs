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

use std::sync::Arc;

use common_telemetry::{debug, info, warn};
use once_cell::sync::OnceCell;

use crate::bitmap::BitmapCodec;
use crate::column::Column;
use crate::config::{AutoColumnOptions, ByteOrder, IndexPolicy};
use crate::error::Result;
use crate::format::reader::{parse_column, ColumnParts};
use crate::index::{ColumnIndex, IndexCapability};
use crate::metrics::{COLUMN_BUILD_ELAPSED, COLUMN_BUILD_TOTAL};
use crate::types::LogicalType;

/// What a reader expects of the column bytes it is handed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnReadOptions {
    /// Logical type the column was declared with.
    pub logical_type: LogicalType,
    pub byte_order: ByteOrder,
    pub bitmap_codec: BitmapCodec,
    pub index_policy: IndexPolicy,
}

impl ColumnReadOptions {
    pub fn new(logical_type: LogicalType, options: &AutoColumnOptions) -> Self {
        ColumnReadOptions {
            logical_type,
            byte_order: options.format.byte_order,
            bitmap_codec: options.format.bitmap_codec,
            index_policy: options.index,
        }
    }
}

/// Lazily builds columns and indexes from a shared byte region.
///
/// The bytes are parsed and validated once, on first use, by whichever
/// caller gets there first. Other callers block until it finishes. A failed
/// build is not cached and the next call parses again.
pub struct ColumnAndIndexSupplier<'a> {
    bytes: &'a [u8],
    options: ColumnReadOptions,
    parts: OnceCell<Arc<ColumnParts<'a>>>,
}

impl<'a> ColumnAndIndexSupplier<'a> {
    /// Creates a supplier over `bytes` without reading them.
    pub fn read(bytes: &'a [u8], options: ColumnReadOptions) -> Self {
        ColumnAndIndexSupplier {
            bytes,
            options,
            parts: OnceCell::new(),
        }
    }

    pub fn options(&self) -> &ColumnReadOptions {
        &self.options
    }

    pub fn logical_type(&self) -> LogicalType {
        self.options.logical_type
    }

    /// Returns true once the column has been built.
    pub fn is_ready(&self) -> bool {
        self.parts.get().is_some()
    }

    fn parts(&self) -> Result<&Arc<ColumnParts<'a>>> {
        self.parts.get_or_try_init(|| {
            let _timer = COLUMN_BUILD_ELAPSED.start_timer();
            match parse_column(self.bytes, &self.options) {
                Ok(parts) => {
                    COLUMN_BUILD_TOTAL.with_label_values(&["ok"]).inc();
                    info!(
                        "Built column, type: {}, version: {}, rows: {}, cardinality: {}, bytes: {}",
                        parts.logical_type(),
                        parts.version(),
                        parts.row_count(),
                        parts.cardinality(),
                        self.bytes.len()
                    );
                    Ok(Arc::new(parts))
                }
                Err(e) => {
                    COLUMN_BUILD_TOTAL.with_label_values(&["error"]).inc();
                    warn!(
                        "Failed to build column of type {}, bytes: {}, err: {}",
                        self.options.logical_type,
                        self.bytes.len(),
                        e
                    );
                    Err(e)
                }
            }
        })
    }

    /// Returns a new column over the shared, parsed bytes.
    pub fn get(&self) -> Result<Column<'a>> {
        Ok(Column::new(self.parts()?.clone()))
    }

    /// Whether the declared type of the column can offer `capability`.
    pub fn supports(&self, capability: IndexCapability) -> bool {
        capability.supported_by(self.options.logical_type)
    }

    /// Returns the index offering `capability`, or `None` if this column
    /// doesn't offer it.
    pub fn as_index(&self, capability: IndexCapability) -> Result<Option<ColumnIndex<'a>>> {
        if !self.supports(capability) {
            return Ok(None);
        }
        let parts = self.parts()?;
        if capability.is_predicate_based()
            && !self
                .options
                .index_policy
                .allows_predicate_index(parts.cardinality(), parts.row_count())
        {
            debug!(
                "Skip {:?} index, cardinality: {}, rows: {}",
                capability,
                parts.cardinality(),
                parts.row_count()
            );
            return Ok(None);
        }
        Ok(Some(ColumnIndex::new(capability, parts.clone())))
    }
}
