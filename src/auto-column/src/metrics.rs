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

use lazy_static::lazy_static;
use prometheus::*;

/// Value type label.
pub const TYPE_LABEL: &str = "type";
/// Outcome label.
pub const OUTCOME_LABEL: &str = "outcome";

lazy_static! {
    /// Counter of rows observed by indexers.
    pub static ref INDEXER_ROWS_TOTAL: IntCounter = register_int_counter!(
        "auto_column_indexer_rows_total",
        "auto column indexer rows total"
    )
    .unwrap();

    /// Timer of dictionary merges.
    pub static ref MERGE_ELAPSED: Histogram = register_histogram!(
        "auto_column_merge_elapsed",
        "auto column dictionary merge elapsed",
        vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    )
    .unwrap();
    /// Counter of distinct values produced by merges.
    pub static ref MERGED_VALUES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "auto_column_merged_values_total",
        "auto column merged dictionary values total",
        &[TYPE_LABEL]
    )
    .unwrap();

    /// Counter of bytes written by column serializers.
    pub static ref SERIALIZED_BYTES_TOTAL: IntCounter = register_int_counter!(
        "auto_column_serialized_bytes_total",
        "auto column serialized bytes total"
    )
    .unwrap();

    /// Counter of column constructions by outcome.
    pub static ref COLUMN_BUILD_TOTAL: IntCounterVec = register_int_counter_vec!(
        "auto_column_build_total",
        "auto column supplier constructions total",
        &[OUTCOME_LABEL]
    )
    .unwrap();
    /// Timer of column constructions.
    pub static ref COLUMN_BUILD_ELAPSED: Histogram = register_histogram!(
        "auto_column_build_elapsed",
        "auto column supplier construction elapsed",
    )
    .unwrap();
}
