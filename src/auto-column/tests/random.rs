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

use std::collections::BTreeMap;
use std::ops::Bound;

use auto_column::{
    ColumnAndIndexSupplier, IndexCapability, IndexPolicy, LogicalType, ScalarValue, Value,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common::{all_formats, schema, write_partitions};

fn random_scalar(rng: &mut StdRng, kind: u8) -> Value {
    match kind {
        0 => Value::String(format!("v{}", rng.gen_range(0..40))),
        1 => Value::Long(rng.gen_range(-50..50)),
        _ => Value::Double(rng.gen_range(-100..100) as f64 / 4.0),
    }
}

fn random_value(rng: &mut StdRng, kind: u8, depth: usize) -> Value {
    if rng.gen_bool(0.1) {
        return Value::Null;
    }
    match rng.gen_range(0..if depth == 0 { 2 } else { 4 }) {
        0 => random_scalar(rng, kind),
        1 => Value::Array(
            (0..rng.gen_range(0..4))
                .map(|_| {
                    if rng.gen_bool(0.2) {
                        Value::Null
                    } else {
                        random_scalar(rng, kind)
                    }
                })
                .collect(),
        ),
        2 => Value::Object(
            (0..rng.gen_range(0..3))
                .map(|i| (format!("f{i}"), random_value(rng, kind, depth - 1)))
                .collect::<BTreeMap<_, _>>(),
        ),
        _ => Value::Array(
            (0..rng.gen_range(1..3))
                .map(|_| random_value(rng, kind, depth - 1))
                .collect(),
        ),
    }
}

#[test]
fn test_random_nested_round_trip() {
    common_telemetry::init_default_ut_logging();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for round in 0..20 {
        let version = if round % 2 == 0 { 1 } else { 2 };
        let partitions = (0..rng.gen_range(1..4))
            .map(|_| {
                (0..rng.gen_range(0..30))
                    .map(|_| {
                        let kind = rng.gen_range(0..3);
                        random_value(&mut rng, kind, 2)
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        let format = all_formats()[round % 4];
        let written = write_partitions(&schema(version), &partitions, format);
        let supplier = ColumnAndIndexSupplier::read(
            &written.bytes,
            written.read_options(format, IndexPolicy::default()),
        );
        let column = supplier.get().unwrap();
        assert_eq!(written.rows.len(), column.row_count());
        for (row, expected) in written.rows.iter().enumerate() {
            assert_eq!(*expected, column.row_value(row).unwrap(), "round {round}");
        }
        let nulls = written
            .rows
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_null())
            .map(|(i, _)| i as u32)
            .collect::<Vec<_>>();
        assert_eq!(
            nulls,
            column.null_bitmap().unwrap().iter_ones().collect::<Vec<_>>()
        );
    }
}

/// Flat rows of one scalar type mixed with arrays holding no non-null element.
fn random_flat_value(rng: &mut StdRng, kind: u8) -> Value {
    match rng.gen_range(0..4) {
        0 => Value::Null,
        1 => Value::Array(vec![Value::Null; rng.gen_range(0..3)]),
        _ => random_scalar(rng, kind),
    }
}

#[test]
fn test_random_flat_round_trip() {
    common_telemetry::init_default_ut_logging();
    let mut rng = StdRng::seed_from_u64(0xf1a7);
    for round in 0..30 {
        let kind = rng.gen_range(0..3);
        let rows = (0..rng.gen_range(0..12))
            .map(|_| random_flat_value(&mut rng, kind))
            .collect::<Vec<_>>();
        let has_scalar = rows.iter().any(|v| v.as_scalar().is_some());
        let has_array = rows.iter().any(|v| matches!(v, Value::Array(_)));
        let expected = match (has_scalar, has_array) {
            (true, true) => LogicalType::Variant,
            (true, false) => rows.iter().find_map(Value::as_scalar).unwrap().logical_type(),
            (false, true) => LogicalType::LongArray,
            (false, false) => LogicalType::String,
        };

        let version = if round % 2 == 0 { 1 } else { 2 };
        let format = all_formats()[round % 4];
        let written = write_partitions(&schema(version), &[rows.clone()], format);
        assert_eq!(expected, written.logical_type(), "round {round}: {rows:?}");
        let supplier = ColumnAndIndexSupplier::read(
            &written.bytes,
            written.read_options(format, IndexPolicy::default()),
        );
        let column = supplier.get().unwrap();
        for (row, value) in rows.iter().enumerate() {
            assert_eq!(*value, column.row_value(row).unwrap(), "round {round}");
        }
    }
}

#[test]
fn test_random_scalar_indexes() {
    common_telemetry::init_default_ut_logging();
    let mut rng = StdRng::seed_from_u64(42);
    for kind in 0..3 {
        let rows = (0..500)
            .map(|_| {
                if rng.gen_bool(0.15) {
                    Value::Null
                } else {
                    random_scalar(&mut rng, kind)
                }
            })
            .collect::<Vec<_>>();
        let format = all_formats()[kind as usize];
        let written = write_partitions(&schema(1), &[rows.clone()], format);
        assert!(written.logical_type().is_scalar());
        let supplier = ColumnAndIndexSupplier::read(
            &written.bytes,
            written.read_options(format, IndexPolicy::ALWAYS_USE_INDEXES),
        );
        let scalars = rows.iter().map(Value::as_scalar).collect::<Vec<_>>();
        let rows_where = |f: &dyn Fn(&ScalarValue) -> bool| {
            scalars
                .iter()
                .enumerate()
                .filter(|(_, v)| matches!(v, Some(scalar) if f(scalar)))
                .map(|(i, _)| i as u32)
                .collect::<Vec<_>>()
        };

        let value_set = supplier
            .as_index(IndexCapability::ValueSet)
            .unwrap()
            .unwrap()
            .into_value_set()
            .unwrap();
        let range = supplier
            .as_index(IndexCapability::ValueRange)
            .unwrap()
            .unwrap()
            .into_value_range()
            .unwrap();
        let predicate = supplier
            .as_index(IndexCapability::Predicate)
            .unwrap()
            .unwrap()
            .into_predicate()
            .unwrap();

        for _ in 0..20 {
            let probe = match random_scalar(&mut rng, kind).as_scalar() {
                Some(probe) => probe,
                None => continue,
            };
            let other = random_scalar(&mut rng, kind).as_scalar().unwrap_or(probe.clone());
            let (low, high) = if probe <= other {
                (probe.clone(), other)
            } else {
                (other, probe.clone())
            };

            let equal = value_set.for_value(&probe).unwrap();
            assert_eq!(
                rows_where(&|v| *v == probe),
                equal.iter_ones().collect::<Vec<_>>()
            );

            let in_range = range
                .for_range(Bound::Included(&low), Bound::Excluded(&high))
                .unwrap();
            assert_eq!(
                rows_where(&|v| low <= *v && *v < high),
                in_range.iter_ones().collect::<Vec<_>>()
            );

            let above = range.for_range(Bound::Excluded(&low), Bound::Unbounded).unwrap();
            assert_eq!(
                rows_where(&|v| *v > low),
                above.iter_ones().collect::<Vec<_>>()
            );

            let matched = predicate.for_predicate(|v| *v >= high).unwrap();
            assert_eq!(
                rows_where(&|v| *v >= high),
                matched.iter_ones().collect::<Vec<_>>()
            );
        }

        assert_eq!(
            match kind {
                0 => LogicalType::String,
                1 => LogicalType::Long,
                _ => LogicalType::Double,
            },
            written.logical_type()
        );
    }
}
