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

//! Capability typed bitmap indexes over a persisted column.

use std::ops::Bound;
use std::sync::Arc;

use crate::bitmap::Bitmap;
use crate::error::Result;
use crate::format::reader::ColumnParts;
use crate::types::LogicalType;
use crate::value::ScalarValue;

/// Kinds of index a column may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexCapability {
    NullValue,
    ValueSet,
    Predicate,
    ValueRange,
}

impl IndexCapability {
    pub const ALL: [IndexCapability; 4] = [
        IndexCapability::NullValue,
        IndexCapability::ValueSet,
        IndexCapability::Predicate,
        IndexCapability::ValueRange,
    ];

    /// Whether a column of `logical_type` can offer this capability at all.
    /// Only scalar columns index their values.
    pub fn supported_by(&self, logical_type: LogicalType) -> bool {
        match self {
            IndexCapability::NullValue => true,
            IndexCapability::ValueSet | IndexCapability::Predicate | IndexCapability::ValueRange => {
                logical_type.is_scalar()
            }
        }
    }

    /// Whether the index policy may withhold this capability.
    pub(crate) fn is_predicate_based(&self) -> bool {
        matches!(
            self,
            IndexCapability::Predicate | IndexCapability::ValueRange
        )
    }
}

/// An index handed out by a supplier.
pub enum ColumnIndex<'a> {
    NullValue(NullValueIndex<'a>),
    ValueSet(ValueSetIndex<'a>),
    Predicate(PredicateIndex<'a>),
    ValueRange(ValueRangeIndex<'a>),
}

impl<'a> ColumnIndex<'a> {
    pub(crate) fn new(capability: IndexCapability, parts: Arc<ColumnParts<'a>>) -> Self {
        match capability {
            IndexCapability::NullValue => ColumnIndex::NullValue(NullValueIndex { parts }),
            IndexCapability::ValueSet => ColumnIndex::ValueSet(ValueSetIndex { parts }),
            IndexCapability::Predicate => ColumnIndex::Predicate(PredicateIndex { parts }),
            IndexCapability::ValueRange => ColumnIndex::ValueRange(ValueRangeIndex { parts }),
        }
    }

    pub fn capability(&self) -> IndexCapability {
        match self {
            ColumnIndex::NullValue(_) => IndexCapability::NullValue,
            ColumnIndex::ValueSet(_) => IndexCapability::ValueSet,
            ColumnIndex::Predicate(_) => IndexCapability::Predicate,
            ColumnIndex::ValueRange(_) => IndexCapability::ValueRange,
        }
    }

    pub fn into_null_value(self) -> Option<NullValueIndex<'a>> {
        match self {
            ColumnIndex::NullValue(index) => Some(index),
            _ => None,
        }
    }

    pub fn into_value_set(self) -> Option<ValueSetIndex<'a>> {
        match self {
            ColumnIndex::ValueSet(index) => Some(index),
            _ => None,
        }
    }

    pub fn into_predicate(self) -> Option<PredicateIndex<'a>> {
        match self {
            ColumnIndex::Predicate(index) => Some(index),
            _ => None,
        }
    }

    pub fn into_value_range(self) -> Option<ValueRangeIndex<'a>> {
        match self {
            ColumnIndex::ValueRange(index) => Some(index),
            _ => None,
        }
    }
}

/// Unions the bitmaps of `ids`.
fn union_of(parts: &ColumnParts<'_>, ids: impl Iterator<Item = u32>) -> Result<Bitmap> {
    let mut result = Bitmap::empty(parts.codec());
    for id in ids {
        result.union(parts.bitmap(id)?);
    }
    Ok(result)
}

pub struct NullValueIndex<'a> {
    parts: Arc<ColumnParts<'a>>,
}

impl NullValueIndex<'_> {
    /// Rows whose value is null.
    pub fn for_null(&self) -> Result<Bitmap> {
        self.parts.null_bitmap()
    }
}

pub struct ValueSetIndex<'a> {
    parts: Arc<ColumnParts<'a>>,
}

impl ValueSetIndex<'_> {
    /// Rows equal to `value`. Values missing from the dictionary match no row.
    pub fn for_value(&self, value: &ScalarValue) -> Result<Bitmap> {
        match self.parts.lookup_scalar(value) {
            Some(id) => self.parts.bitmap(id),
            None => Ok(Bitmap::empty(self.parts.codec())),
        }
    }

    /// Rows equal to any of `values`.
    pub fn for_values<'v>(&self, values: impl IntoIterator<Item = &'v ScalarValue>) -> Result<Bitmap> {
        let ids = values
            .into_iter()
            .filter_map(|value| self.parts.lookup_scalar(value))
            .collect::<Vec<_>>();
        union_of(&self.parts, ids.into_iter())
    }
}

pub struct PredicateIndex<'a> {
    parts: Arc<ColumnParts<'a>>,
}

impl PredicateIndex<'_> {
    /// Rows whose value matches `predicate`. Null rows never match.
    pub fn for_predicate(&self, predicate: impl Fn(&ScalarValue) -> bool) -> Result<Bitmap> {
        let ids = (1..self.parts.scalar_cardinality())
            .filter(|id| {
                self.parts
                    .scalar(*id)
                    .is_some_and(|value| predicate(&value))
            })
            .collect::<Vec<_>>();
        union_of(&self.parts, ids.into_iter())
    }
}

pub struct ValueRangeIndex<'a> {
    parts: Arc<ColumnParts<'a>>,
}

impl ValueRangeIndex<'_> {
    /// Rows whose value lies within the bounds. Values of another type than
    /// the bounds order by type: strings, then longs, then doubles.
    pub fn for_range(
        &self,
        lower: Bound<&ScalarValue>,
        upper: Bound<&ScalarValue>,
    ) -> Result<Bitmap> {
        let parts = &self.parts;
        let start = match lower {
            Bound::Included(bound) => parts.scalar_partition_point(|v| v < bound),
            Bound::Excluded(bound) => parts.scalar_partition_point(|v| v <= bound),
            Bound::Unbounded => 1,
        };
        let end = match upper {
            Bound::Included(bound) => parts.scalar_partition_point(|v| v <= bound),
            Bound::Excluded(bound) => parts.scalar_partition_point(|v| v < bound),
            Bound::Unbounded => parts.scalar_cardinality(),
        };
        if start >= end {
            return Ok(Bitmap::empty(parts.codec()));
        }
        union_of(parts, start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_capabilities() {
        for capability in IndexCapability::ALL {
            assert!(capability.supported_by(LogicalType::Long));
            assert!(capability.supported_by(LogicalType::String));
            assert_eq!(
                capability == IndexCapability::NullValue,
                capability.supported_by(LogicalType::LongArray)
            );
            assert_eq!(
                capability == IndexCapability::NullValue,
                capability.supported_by(LogicalType::Variant)
            );
            assert_eq!(
                capability == IndexCapability::NullValue,
                capability.supported_by(LogicalType::Nested)
            );
        }
        assert!(IndexCapability::ValueRange.is_predicate_based());
        assert!(!IndexCapability::ValueSet.is_predicate_based());
    }
}
