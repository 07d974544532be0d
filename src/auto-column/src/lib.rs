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

//! Auto typed columns.
//!
//! An auto typed column accepts arbitrary json like values, infers the
//! logical type of the column from them and stores them dictionary encoded
//! with bitmap indexes. Writing a column goes through three stages:
//!
//! 1. [AutoTypeColumnIndexer] observes raw rows and builds a per segment
//!    dictionary along with the types seen at every path.
//! 2. [DictionaryMerger] merges the sorted dictionaries of many segments into
//!    one global id space.
//! 3. [AutoTypeColumnSerializer] writes the dictionaries, the rows and one
//!    bitmap per value.
//!
//! [ColumnAndIndexSupplier] reads the bytes back, lazily and from any number
//! of threads.

pub mod bitmap;
pub mod column;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod format;
pub mod index;
pub mod indexer;
pub mod merge;
pub mod metrics;
pub mod path;
pub mod schema;
pub mod segment;
pub mod supplier;
pub mod types;
pub mod value;

pub use bitmap::{Bitmap, BitmapCodec};
pub use column::{
    Column, ColumnValueSelector, ReadableOffset, SettableValueSelector, SimpleAscendingOffset,
};
pub use config::{AutoColumnOptions, ByteOrder, FormatOptions, IndexPolicy};
pub use format::writer::{
    AutoTypeColumnSerializer, OnHeapWriteOutMedium, TmpFileWriteOutMedium, WriteOutMedium,
};
pub use index::{ColumnIndex, IndexCapability};
pub use indexer::{AutoTypeColumnIndexer, EncodedKeyComponent, SortedLookups};
pub use merge::{DictionaryMerger, MergeInput, MergedDictionary};
pub use schema::{AutoTypeColumnSchema, FormatVersion};
pub use segment::MappedSegment;
pub use supplier::{ColumnAndIndexSupplier, ColumnReadOptions};
pub use types::{FieldTypeInfo, LogicalType, TypeSet};
pub use value::{ScalarValue, Value};
