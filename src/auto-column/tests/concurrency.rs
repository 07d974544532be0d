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

use auto_column::metrics::COLUMN_BUILD_TOTAL;
use auto_column::{
    ColumnAndIndexSupplier, ColumnValueSelector, FormatOptions, IndexCapability, IndexPolicy,
    ScalarValue, SimpleAscendingOffset,
};
use serde_json::json;

use crate::common::{schema, values, write_rows};

const THREADS: usize = 8;
const ITERATIONS: usize = 2000;

#[test]
fn test_concurrent_readers_build_once() {
    common_telemetry::init_default_ut_logging();
    let rows = values(json!([3, null, 1, 3, 2, null, 1]));
    let format = FormatOptions::default();
    let written = write_rows(&schema(1), &rows, format);
    let supplier = ColumnAndIndexSupplier::read(
        &written.bytes,
        written.read_options(format, IndexPolicy::ALWAYS_USE_INDEXES),
    );
    let builds_before = COLUMN_BUILD_TOTAL.with_label_values(&["ok"]).get();
    let barrier = Barrier::new(THREADS);

    std::thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                barrier.wait();
                for i in 0..ITERATIONS {
                    let column = supplier.get().unwrap();
                    let row = i % rows.len();
                    assert_eq!(rows[row], column.row_value(row).unwrap());

                    let offset = SimpleAscendingOffset::new(column.row_count());
                    let selector = column.make_column_value_selector(&offset);
                    assert_eq!(rows[0], selector.get_object());

                    let nulls = column.null_bitmap().unwrap();
                    assert_eq!(vec![1, 5], nulls.iter_ones().collect::<Vec<_>>());

                    let value_set = supplier
                        .as_index(IndexCapability::ValueSet)
                        .unwrap()
                        .unwrap()
                        .into_value_set()
                        .unwrap();
                    let threes = value_set.for_value(&ScalarValue::Long(3)).unwrap();
                    assert_eq!(vec![0, 3], threes.iter_ones().collect::<Vec<_>>());
                    column.close();
                }
            });
        }
    });

    assert!(supplier.is_ready());
    let builds_after = COLUMN_BUILD_TOTAL.with_label_values(&["ok"]).get();
    assert_eq!(1, builds_after - builds_before);
}
