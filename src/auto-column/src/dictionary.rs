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

//! Value dictionaries and the global id space.
//!
//! Ids are assigned in one space per column: `0` is null, strings follow,
//! then longs, doubles and finally arrays. Every section is sorted, so the
//! order of ids equals the order of the values they stand for.

use std::collections::BTreeMap;

use itertools::Itertools;
use ordered_float::OrderedFloat;
use snafu::ensure;

use crate::error::{DictionaryOverflowSnafu, InvalidArrayElementSnafu, Result, UnsortedDictionarySnafu};
use crate::value::{ScalarValue, Value};

/// Id of null in every dictionary.
pub const NULL_ID: u32 = 0;

/// Sizes of the sections of a global id space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdSpace {
    pub strings: u32,
    pub longs: u32,
    pub doubles: u32,
    pub arrays: u32,
}

/// A global id classified by section, with the position inside the section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictionaryId {
    Null,
    String(usize),
    Long(usize),
    Double(usize),
    Array(usize),
}

impl IdSpace {
    /// Creates an id space, failing if the ids do not fit in `u32`.
    pub fn try_new(strings: usize, longs: usize, doubles: usize, arrays: usize) -> Result<IdSpace> {
        let count = strings + longs + doubles + arrays;
        ensure!(
            count < u32::MAX as usize,
            DictionaryOverflowSnafu { count }
        );
        Ok(IdSpace {
            strings: strings as u32,
            longs: longs as u32,
            doubles: doubles as u32,
            arrays: arrays as u32,
        })
    }

    /// Number of ids including null.
    pub fn cardinality(&self) -> u32 {
        self.scalar_cardinality() + self.arrays
    }

    /// Number of null and scalar ids.
    pub fn scalar_cardinality(&self) -> u32 {
        1 + self.strings + self.longs + self.doubles
    }

    pub fn string_id(&self, index: usize) -> u32 {
        1 + index as u32
    }

    pub fn long_id(&self, index: usize) -> u32 {
        1 + self.strings + index as u32
    }

    pub fn double_id(&self, index: usize) -> u32 {
        1 + self.strings + self.longs + index as u32
    }

    pub fn array_id(&self, index: usize) -> u32 {
        self.scalar_cardinality() + index as u32
    }

    pub fn classify(&self, id: u32) -> Option<DictionaryId> {
        if id == NULL_ID {
            return Some(DictionaryId::Null);
        }
        let mut offset = id - 1;
        for (len, section) in [
            (self.strings, DictionaryId::String as fn(usize) -> DictionaryId),
            (self.longs, DictionaryId::Long),
            (self.doubles, DictionaryId::Double),
            (self.arrays, DictionaryId::Array),
        ] {
            if offset < len {
                return Some(section(offset as usize));
            }
            offset -= len;
        }
        None
    }
}

/// Sorted, deduplicated values of one column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortedValueDictionary {
    strings: Vec<String>,
    longs: Vec<i64>,
    doubles: Vec<OrderedFloat<f64>>,
    /// Arrays of global ids, sorted lexicographically.
    arrays: Vec<Vec<u32>>,
}

impl SortedValueDictionary {
    pub fn empty() -> SortedValueDictionary {
        SortedValueDictionary::default()
    }

    /// Creates a dictionary from sorted sections, validating their order and
    /// the element ids of every array.
    pub fn new(
        strings: Vec<String>,
        longs: Vec<i64>,
        doubles: Vec<f64>,
        arrays: Vec<Vec<u32>>,
    ) -> Result<SortedValueDictionary> {
        let dictionary = SortedValueDictionary {
            strings,
            longs,
            doubles: doubles.into_iter().map(OrderedFloat).collect(),
            arrays,
        };
        dictionary.validate()?;
        Ok(dictionary)
    }

    /// Creates a dictionary from sections the caller already knows to be
    /// valid.
    pub(crate) fn from_sorted_parts(
        strings: Vec<String>,
        longs: Vec<i64>,
        doubles: Vec<OrderedFloat<f64>>,
        arrays: Vec<Vec<u32>>,
    ) -> SortedValueDictionary {
        debug_assert!(strings.iter().tuple_windows().all(|(a, b)| a < b));
        SortedValueDictionary {
            strings,
            longs,
            doubles,
            arrays,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_strictly_increasing("strings", &self.strings)?;
        check_strictly_increasing("longs", &self.longs)?;
        check_strictly_increasing("doubles", &self.doubles)?;
        check_strictly_increasing("arrays", &self.arrays)?;
        let space = self.id_space()?;
        let scalar_cardinality = space.scalar_cardinality();
        for (index, array) in self.arrays.iter().enumerate() {
            if let Some(id) = array.iter().find(|id| **id >= scalar_cardinality) {
                return InvalidArrayElementSnafu { index, id: *id }.fail();
            }
        }
        Ok(())
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    pub fn longs(&self) -> &[i64] {
        &self.longs
    }

    pub fn doubles(&self) -> &[OrderedFloat<f64>] {
        &self.doubles
    }

    pub fn arrays(&self) -> &[Vec<u32>] {
        &self.arrays
    }

    pub fn id_space(&self) -> Result<IdSpace> {
        IdSpace::try_new(
            self.strings.len(),
            self.longs.len(),
            self.doubles.len(),
            self.arrays.len(),
        )
    }

    /// Number of ids, including null.
    pub fn cardinality(&self) -> usize {
        1 + self.strings.len() + self.longs.len() + self.doubles.len() + self.arrays.len()
    }

    fn space(&self) -> IdSpace {
        IdSpace {
            strings: self.strings.len() as u32,
            longs: self.longs.len() as u32,
            doubles: self.doubles.len() as u32,
            arrays: self.arrays.len() as u32,
        }
    }

    pub fn lookup_string(&self, value: &str) -> Option<u32> {
        self.strings
            .binary_search_by(|s| s.as_str().cmp(value))
            .ok()
            .map(|index| self.space().string_id(index))
    }

    pub fn lookup_long(&self, value: i64) -> Option<u32> {
        self.longs
            .binary_search(&value)
            .ok()
            .map(|index| self.space().long_id(index))
    }

    pub fn lookup_double(&self, value: f64) -> Option<u32> {
        self.doubles
            .binary_search(&OrderedFloat(value))
            .ok()
            .map(|index| self.space().double_id(index))
    }

    pub fn lookup_scalar(&self, value: &ScalarValue) -> Option<u32> {
        match value {
            ScalarValue::String(s) => self.lookup_string(s),
            ScalarValue::Long(v) => self.lookup_long(*v),
            ScalarValue::Double(v) => self.lookup_double(v.0),
        }
    }

    pub fn lookup_array(&self, ids: &[u32]) -> Option<u32> {
        self.arrays
            .binary_search_by(|array| array.as_slice().cmp(ids))
            .ok()
            .map(|index| self.space().array_id(index))
    }

    /// Looks up a literal array. Returns `None` if any element is unknown
    /// or not a scalar.
    pub fn lookup_literal_array(&self, elements: &[Value]) -> Option<u32> {
        let ids = elements
            .iter()
            .map(|element| match element {
                Value::Null => Some(NULL_ID),
                other => self.lookup_scalar(&other.as_scalar()?),
            })
            .collect::<Option<Vec<_>>>()?;
        self.lookup_array(&ids)
    }

    pub fn scalar_of(&self, id: u32) -> Option<ScalarValue> {
        match self.space().classify(id)? {
            DictionaryId::String(i) => Some(ScalarValue::String(self.strings[i].clone())),
            DictionaryId::Long(i) => Some(ScalarValue::Long(self.longs[i])),
            DictionaryId::Double(i) => Some(ScalarValue::Double(self.doubles[i])),
            DictionaryId::Null | DictionaryId::Array(_) => None,
        }
    }

    /// Decodes the value of `id`, `None` if the id is out of range.
    pub fn value_of(&self, id: u32) -> Option<Value> {
        match self.space().classify(id)? {
            DictionaryId::Null => Some(Value::Null),
            DictionaryId::Array(i) => Some(Value::Array(
                self.arrays[i]
                    .iter()
                    .map(|element| self.value_of(*element).unwrap_or_default())
                    .collect(),
            )),
            _ => self.scalar_of(id).map(Value::from),
        }
    }
}

pub(crate) fn check_strictly_increasing<T: Ord>(section: &'static str, values: &[T]) -> Result<()> {
    if let Some((position, _)) = values
        .iter()
        .tuple_windows()
        .find_position(|(prev, next)| prev >= next)
    {
        return UnsortedDictionarySnafu {
            section,
            position: position + 1,
        }
        .fail();
    }
    Ok(())
}

/// Reference to a dictionary entry handed out during ingestion. Ids are
/// insertion ids, stable while the partition is being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodedRef {
    Null,
    String(u32),
    Long(u32),
    Double(u32),
    Array(u32),
}

/// Dictionary of one in-memory partition, filled incrementally.
#[derive(Debug, Default)]
pub struct ValueDictionaryBuilder {
    strings: BTreeMap<String, u32>,
    longs: BTreeMap<i64, u32>,
    doubles: BTreeMap<OrderedFloat<f64>, u32>,
    arrays: BTreeMap<Vec<Option<ScalarValue>>, u32>,
    size_bytes: usize,
}

fn insert_with_id<K: Ord>(map: &mut BTreeMap<K, u32>, key: K) -> (u32, bool) {
    let next_id = map.len() as u32;
    let mut inserted = false;
    let id = *map.entry(key).or_insert_with(|| {
        inserted = true;
        next_id
    });
    (id, inserted)
}

impl ValueDictionaryBuilder {
    pub fn new() -> ValueDictionaryBuilder {
        ValueDictionaryBuilder::default()
    }

    pub fn add_string(&mut self, value: &str) -> u32 {
        if let Some(id) = self.strings.get(value) {
            return *id;
        }
        let (id, _) = insert_with_id(&mut self.strings, value.to_string());
        self.size_bytes += value.len() + std::mem::size_of::<String>();
        id
    }

    pub fn add_long(&mut self, value: i64) -> u32 {
        let (id, inserted) = insert_with_id(&mut self.longs, value);
        if inserted {
            self.size_bytes += std::mem::size_of::<i64>();
        }
        id
    }

    pub fn add_double(&mut self, value: f64) -> u32 {
        let (id, inserted) = insert_with_id(&mut self.doubles, OrderedFloat(value));
        if inserted {
            self.size_bytes += std::mem::size_of::<f64>();
        }
        id
    }

    pub fn add_scalar(&mut self, value: &ScalarValue) -> EncodedRef {
        match value {
            ScalarValue::String(s) => EncodedRef::String(self.add_string(s)),
            ScalarValue::Long(v) => EncodedRef::Long(self.add_long(*v)),
            ScalarValue::Double(v) => EncodedRef::Double(self.add_double(v.0)),
        }
    }

    /// Adds a literal array and each of its elements.
    pub fn add_array(&mut self, elements: Vec<Option<ScalarValue>>) -> u32 {
        for element in elements.iter().flatten() {
            self.add_scalar(element);
        }
        let size = elements.len() * std::mem::size_of::<u32>();
        let (id, inserted) = insert_with_id(&mut self.arrays, elements);
        if inserted {
            self.size_bytes += size;
        }
        id
    }

    /// Adds an array of strings, used for the path arrays of fields.
    pub fn add_string_array<S: AsRef<str>>(&mut self, values: &[S]) -> u32 {
        self.add_array(
            values
                .iter()
                .map(|s| Some(ScalarValue::String(s.as_ref().to_string())))
                .collect(),
        )
    }

    /// Number of ids, including null.
    pub fn cardinality(&self) -> usize {
        1 + self.strings.len() + self.longs.len() + self.doubles.len() + self.arrays.len()
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Sorts the dictionary, returning it with the mapping from insertion ids
    /// to sorted global ids.
    pub fn build(&self) -> Result<(SortedValueDictionary, InsertionIdMapping)> {
        let space = IdSpace::try_new(
            self.strings.len(),
            self.longs.len(),
            self.doubles.len(),
            self.arrays.len(),
        )?;
        let mut mapping = InsertionIdMapping {
            strings: vec![0; self.strings.len()],
            longs: vec![0; self.longs.len()],
            doubles: vec![0; self.doubles.len()],
            arrays: vec![0; self.arrays.len()],
        };

        let strings = sorted_keys(&self.strings, &mut mapping.strings, |i| space.string_id(i));
        let longs = sorted_keys(&self.longs, &mut mapping.longs, |i| space.long_id(i));
        let doubles = sorted_keys(&self.doubles, &mut mapping.doubles, |i| space.double_id(i));
        let scalars = SortedValueDictionary::from_sorted_parts(strings, longs, doubles, vec![]);

        let mut arrays = Vec::with_capacity(self.arrays.len());
        for (index, (elements, insertion_id)) in self.arrays.iter().enumerate() {
            let ids = elements
                .iter()
                .map(|element| match element {
                    None => NULL_ID,
                    Some(scalar) => scalars.lookup_scalar(scalar).unwrap_or(NULL_ID),
                })
                .collect();
            arrays.push(ids);
            mapping.arrays[*insertion_id as usize] = space.array_id(index);
        }

        let SortedValueDictionary {
            strings,
            longs,
            doubles,
            ..
        } = scalars;
        Ok((
            SortedValueDictionary::from_sorted_parts(strings, longs, doubles, arrays),
            mapping,
        ))
    }
}

fn sorted_keys<K: Clone>(
    map: &BTreeMap<K, u32>,
    mapping: &mut [u32],
    to_global: impl Fn(usize) -> u32,
) -> Vec<K> {
    map.iter()
        .enumerate()
        .map(|(index, (key, insertion_id))| {
            mapping[*insertion_id as usize] = to_global(index);
            key.clone()
        })
        .collect()
}

/// Maps insertion ids of a partition dictionary to sorted global ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertionIdMapping {
    strings: Vec<u32>,
    longs: Vec<u32>,
    doubles: Vec<u32>,
    arrays: Vec<u32>,
}

impl InsertionIdMapping {
    pub fn resolve(&self, encoded: &EncodedRef) -> Option<u32> {
        match encoded {
            EncodedRef::Null => Some(NULL_ID),
            EncodedRef::String(id) => self.strings.get(*id as usize).copied(),
            EncodedRef::Long(id) => self.longs.get(*id as usize).copied(),
            EncodedRef::Double(id) => self.doubles.get(*id as usize).copied(),
            EncodedRef::Array(id) => self.arrays.get(*id as usize).copied(),
        }
    }
}
