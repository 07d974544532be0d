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

//! Merges the sorted dictionaries of several partitions into the dictionary
//! of one persisted column.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

use common_telemetry::info;
use snafu::{ensure, OptionExt};

use crate::dictionary::{DictionaryId, IdSpace, SortedValueDictionary, NULL_ID};
use crate::error::{
    DictionaryOverflowSnafu, EmptyMergeInputSnafu, InvalidArrayElementSnafu,
    MissingPathArraySnafu, Result, UnsortedDictionarySnafu, VersionMismatchSnafu,
};
use crate::metrics::{MERGED_VALUES_TOTAL, MERGE_ELAPSED};
use crate::path::{parse_json_path, to_path_tokens, ROOT_PATH};
use crate::schema::FormatVersion;
use crate::types::{FieldTypeInfo, LogicalType, TypeSet};

/// Sorted dictionary and type observations of one partition.
#[derive(Debug, Clone, Copy)]
pub struct MergeInput<'a> {
    pub version: FormatVersion,
    pub dictionary: &'a SortedValueDictionary,
    pub field_types: &'a FieldTypeInfo,
}

/// Maps the ids of one input partition to ids of the merged dictionary.
///
/// Every table is indexed by local id; entry 0 maps null to null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryRemap {
    local_space: IdSpace,
    strings: Vec<u32>,
    longs: Vec<u32>,
    doubles: Vec<u32>,
    arrays: Vec<u32>,
}

impl DictionaryRemap {
    pub fn strings(&self) -> &[u32] {
        &self.strings
    }

    pub fn longs(&self) -> &[u32] {
        &self.longs
    }

    pub fn doubles(&self) -> &[u32] {
        &self.doubles
    }

    pub fn arrays(&self) -> &[u32] {
        &self.arrays
    }

    /// Translates a global id of the input dictionary.
    pub fn to_global(&self, local_id: u32) -> Option<u32> {
        match self.local_space.classify(local_id)? {
            DictionaryId::Null => Some(NULL_ID),
            DictionaryId::String(i) => self.strings.get(i + 1).copied(),
            DictionaryId::Long(i) => self.longs.get(i + 1).copied(),
            DictionaryId::Double(i) => self.doubles.get(i + 1).copied(),
            DictionaryId::Array(i) => self.arrays.get(i + 1).copied(),
        }
    }

    /// Returns true if every id maps to itself.
    pub fn is_identity(&self) -> bool {
        (0..self.local_space.cardinality()).all(|id| self.to_global(id) == Some(id))
    }
}

/// A persisted field of the merged column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedField {
    pub path: String,
    pub types: TypeSet,
    /// Id of the path array of the field in the merged dictionary. Only set
    /// for literal fields of version 2 columns.
    pub path_array_id: Option<u32>,
}

/// Output of [DictionaryMerger::merge].
#[derive(Debug, Clone, PartialEq)]
pub struct MergedDictionary {
    pub version: FormatVersion,
    pub dictionary: SortedValueDictionary,
    pub field_types: FieldTypeInfo,
    pub logical_type: LogicalType,
    pub fields: Vec<MergedField>,
    /// One remap per input, in input order.
    pub remaps: Vec<DictionaryRemap>,
}

pub struct DictionaryMerger;

impl DictionaryMerger {
    /// Merges `inputs` into one dictionary of `version`.
    pub fn merge(version: FormatVersion, inputs: &[MergeInput<'_>]) -> Result<MergedDictionary> {
        ensure!(!inputs.is_empty(), EmptyMergeInputSnafu);
        let start = Instant::now();
        let _timer = MERGE_ELAPSED.start_timer();

        let mut field_types = FieldTypeInfo::new();
        let mut local_spaces = Vec::with_capacity(inputs.len());
        for input in inputs {
            ensure!(
                input.version == version,
                VersionMismatchSnafu {
                    expected: version.as_u8(),
                    actual: input.version.as_u8(),
                }
            );
            input.field_types.validate()?;
            field_types.merge(input.field_types);
            local_spaces.push(input.dictionary.id_space()?);
        }

        let (strings, string_ranks) =
            merge_sorted("strings", &sections(inputs, |d| d.strings()))?;
        let (longs, long_ranks) = merge_sorted("longs", &sections(inputs, |d| d.longs()))?;
        let (doubles, double_ranks) =
            merge_sorted("doubles", &sections(inputs, |d| d.doubles()))?;
        // Arrays are placed after scalars, so their section size does not
        // change any scalar id.
        let scalar_space = IdSpace::try_new(strings.len(), longs.len(), doubles.len(), 0)?;

        let mut remaps = Vec::with_capacity(inputs.len());
        for (i, local_space) in local_spaces.iter().enumerate() {
            remaps.push(DictionaryRemap {
                local_space: *local_space,
                strings: ranks_to_ids(&string_ranks[i], |r| scalar_space.string_id(r)),
                longs: ranks_to_ids(&long_ranks[i], |r| scalar_space.long_id(r)),
                doubles: ranks_to_ids(&double_ranks[i], |r| scalar_space.double_id(r)),
                arrays: vec![NULL_ID],
            });
        }

        // Scalar remaps are monotone, so translated arrays stay sorted.
        let mut translated = Vec::with_capacity(inputs.len());
        for (input, remap) in inputs.iter().zip(&remaps) {
            let arrays = input
                .dictionary
                .arrays()
                .iter()
                .enumerate()
                .map(|(index, array)| {
                    array
                        .iter()
                        .map(|id| {
                            remap
                                .to_global(*id)
                                .context(InvalidArrayElementSnafu { index, id: *id })
                        })
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<Vec<_>>>()?;
            translated.push(arrays);
        }
        let (arrays, array_ranks) = merge_sorted(
            "arrays",
            &translated.iter().map(Vec::as_slice).collect::<Vec<_>>(),
        )?;
        let space = IdSpace::try_new(strings.len(), longs.len(), doubles.len(), arrays.len())?;
        for (remap, ranks) in remaps.iter_mut().zip(&array_ranks) {
            remap.arrays = ranks_to_ids(ranks, |r| space.array_id(r));
        }

        MERGED_VALUES_TOTAL
            .with_label_values(&["string"])
            .inc_by(strings.len() as u64);
        MERGED_VALUES_TOTAL
            .with_label_values(&["long"])
            .inc_by(longs.len() as u64);
        MERGED_VALUES_TOTAL
            .with_label_values(&["double"])
            .inc_by(doubles.len() as u64);
        MERGED_VALUES_TOTAL
            .with_label_values(&["array"])
            .inc_by(arrays.len() as u64);

        let dictionary = SortedValueDictionary::from_sorted_parts(strings, longs, doubles, arrays);
        let fields = merged_fields(version, &dictionary, &field_types)?;
        let logical_type = field_types.resolve_logical_type();

        info!(
            "Merged {} dictionaries of version {}, type: {}, strings: {}, longs: {}, doubles: {}, arrays: {}, cost: {:?}",
            inputs.len(),
            version,
            logical_type,
            space.strings,
            space.longs,
            space.doubles,
            space.arrays,
            start.elapsed()
        );

        Ok(MergedDictionary {
            version,
            dictionary,
            field_types,
            logical_type,
            fields,
            remaps,
        })
    }
}

fn sections<'a, T>(
    inputs: &[MergeInput<'a>],
    section: impl Fn(&'a SortedValueDictionary) -> &'a [T],
) -> Vec<&'a [T]> {
    inputs.iter().map(|input| section(input.dictionary)).collect()
}

fn ranks_to_ids(ranks: &[u32], to_id: impl Fn(usize) -> u32) -> Vec<u32> {
    std::iter::once(NULL_ID)
        .chain(ranks.iter().map(|rank| to_id(*rank as usize)))
        .collect()
}

fn merged_fields(
    version: FormatVersion,
    dictionary: &SortedValueDictionary,
    field_types: &FieldTypeInfo,
) -> Result<Vec<MergedField>> {
    field_types
        .iter()
        .map(|(path, types)| -> Result<MergedField> {
            let path_array_id = match version {
                FormatVersion::V1 => None,
                FormatVersion::V2 if path != ROOT_PATH && types.has_literal_types() => {
                    let tokens = to_path_tokens(&parse_json_path(path)?);
                    let ids = tokens
                        .iter()
                        .map(|token| dictionary.lookup_string(token))
                        .collect::<Option<Vec<_>>>();
                    let id = ids.and_then(|ids| dictionary.lookup_array(&ids));
                    Some(id.context(MissingPathArraySnafu { path })?)
                }
                FormatVersion::V2 => None,
            };
            Ok(MergedField {
                path: path.to_string(),
                types,
                path_array_id,
            })
        })
        .collect()
}

/// Cursor over one sorted input.
struct Node<'a, T> {
    values: &'a [T],
    pos: usize,
    input: usize,
}

impl<T: Ord> Node<'_, T> {
    fn current(&self) -> &T {
        &self.values[self.pos]
    }
}

impl<T: Ord> PartialEq for Node<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Ord> Eq for Node<'_, T> {}

impl<T: Ord> PartialOrd for Node<'_, T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord> Ord for Node<'_, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // The std binary heap is a max heap, compares in reverse order to pop
        // the smallest value first.
        other
            .current()
            .cmp(self.current())
            .then_with(|| other.input.cmp(&self.input))
    }
}

/// K-way merges strictly increasing `inputs`, dropping duplicates. Returns the
/// merged values and, per input, the merged rank of each of its values.
fn merge_sorted<T: Ord + Clone>(
    section: &'static str,
    inputs: &[&[T]],
) -> Result<(Vec<T>, Vec<Vec<u32>>)> {
    let mut heap = BinaryHeap::with_capacity(inputs.len());
    let mut ranks = Vec::with_capacity(inputs.len());
    for (input, values) in inputs.iter().enumerate() {
        ranks.push(Vec::with_capacity(values.len()));
        if !values.is_empty() {
            heap.push(Node {
                values,
                pos: 0,
                input,
            });
        }
    }

    let mut merged: Vec<T> = Vec::new();
    while let Some(mut node) = heap.pop() {
        let value = node.current();
        if merged.last() != Some(value) {
            ensure!(
                merged.len() < u32::MAX as usize,
                DictionaryOverflowSnafu {
                    count: merged.len()
                }
            );
            merged.push(value.clone());
        }
        ranks[node.input].push((merged.len() - 1) as u32);

        node.pos += 1;
        if node.pos < node.values.len() {
            ensure!(
                node.values[node.pos - 1] < node.values[node.pos],
                UnsortedDictionarySnafu {
                    section,
                    position: node.pos,
                }
            );
            heap.push(node);
        }
    }
    Ok((merged, ranks))
}

#[cfg(test)]
mod tests {
    use common_error::ext::ErrorExt;
    use common_error::status_code::StatusCode;

    use super::*;

    fn long_types() -> FieldTypeInfo {
        [("$", TypeSet::new().with(LogicalType::Long))]
            .into_iter()
            .collect()
    }

    fn input<'a>(dictionary: &'a SortedValueDictionary, types: &'a FieldTypeInfo) -> MergeInput<'a> {
        MergeInput {
            version: FormatVersion::V1,
            dictionary,
            field_types: types,
        }
    }

    #[test]
    fn test_merge_sorted() {
        let left = [1, 3, 5];
        let right = [2, 3, 6];
        let (merged, ranks) = merge_sorted("longs", &[&left[..], &right[..], &[][..]]).unwrap();
        assert_eq!(vec![1, 2, 3, 5, 6], merged);
        assert_eq!(vec![vec![0, 2, 3], vec![1, 2, 4], vec![]], ranks);

        let err = merge_sorted("longs", &[&[3, 1][..]]).unwrap_err();
        assert!(matches!(err, crate::error::Error::UnsortedDictionary { section: "longs", .. }));
    }

    #[test]
    fn test_merge_scalars_and_arrays() {
        let types: FieldTypeInfo = [(
            "$",
            TypeSet::new()
                .with(LogicalType::Long)
                .with(LogicalType::LongArray),
        )]
        .into_iter()
        .collect();
        // ids: 1 -> 1, 4 -> 2, [4, 1] -> 3
        let left = SortedValueDictionary::new(vec![], vec![1, 4], vec![], vec![vec![2, 1]]).unwrap();
        // ids: "x" -> 1, 2 -> 2, 4 -> 3, [2] -> 4
        let right =
            SortedValueDictionary::new(vec!["x".to_string()], vec![2, 4], vec![], vec![vec![2]])
                .unwrap();

        let merged =
            DictionaryMerger::merge(FormatVersion::V1, &[input(&left, &types), input(&right, &types)])
                .unwrap();
        // merged: "x" 1, 1 2, 2 3, 4 4, [2] 5, [4, 1] 6
        let dict = &merged.dictionary;
        assert_eq!(&["x".to_string()], dict.strings());
        assert_eq!(&[1, 2, 4], dict.longs());
        assert_eq!(&[vec![3], vec![4, 2]], dict.arrays());
        assert_eq!(LogicalType::Variant, merged.logical_type);

        assert_eq!(&[0, 2, 4], merged.remaps[0].longs());
        assert_eq!(&[0, 6], merged.remaps[0].arrays());
        assert_eq!(Some(6), merged.remaps[0].to_global(3));
        assert_eq!(&[0, 1], merged.remaps[1].strings());
        assert_eq!(Some(5), merged.remaps[1].to_global(4));
        assert_eq!(None, merged.remaps[1].to_global(5));
    }

    #[test]
    fn test_merge_idempotent() {
        let types = long_types();
        let dict = SortedValueDictionary::new(
            vec!["a".to_string()],
            vec![-1, 7],
            vec![0.5],
            vec![vec![0, 2], vec![3]],
        )
        .unwrap();
        let merged =
            DictionaryMerger::merge(FormatVersion::V1, &[input(&dict, &types), input(&dict, &types)])
                .unwrap();
        assert_eq!(dict, merged.dictionary);
        assert!(merged.remaps.iter().all(DictionaryRemap::is_identity));
    }

    #[test]
    fn test_merge_rejects() {
        let err = DictionaryMerger::merge(FormatVersion::V1, &[]).unwrap_err();
        assert_eq!(StatusCode::InvalidArguments, err.status_code());

        let dict = SortedValueDictionary::empty();
        let bad_types: FieldTypeInfo = [("$", TypeSet::from_bits(0x100))].into_iter().collect();
        let err = DictionaryMerger::merge(FormatVersion::V1, &[input(&dict, &bad_types)]).unwrap_err();
        assert_eq!(StatusCode::Unsupported, err.status_code());

        let types = long_types();
        let err = DictionaryMerger::merge(FormatVersion::V2, &[input(&dict, &types)]).unwrap_err();
        assert!(matches!(err, crate::error::Error::VersionMismatch { .. }));
    }

    #[test]
    fn test_v2_requires_path_arrays() {
        let types: FieldTypeInfo = [
            ("$", TypeSet::new().with(LogicalType::Nested)),
            ("$.a", TypeSet::new().with(LogicalType::Long)),
        ]
        .into_iter()
        .collect();
        let without_path = SortedValueDictionary::new(vec![], vec![1], vec![], vec![]).unwrap();
        let inputs = [MergeInput {
            version: FormatVersion::V2,
            dictionary: &without_path,
            field_types: &types,
        }];
        let err = DictionaryMerger::merge(FormatVersion::V2, &inputs).unwrap_err();
        assert!(matches!(err, crate::error::Error::MissingPathArray { .. }));

        // ".a" 1, 1 2, [".a"] 3
        let with_path =
            SortedValueDictionary::new(vec![".a".to_string()], vec![1], vec![], vec![vec![1]])
                .unwrap();
        let inputs = [MergeInput {
            version: FormatVersion::V2,
            dictionary: &with_path,
            field_types: &types,
        }];
        let merged = DictionaryMerger::merge(FormatVersion::V2, &inputs).unwrap();
        assert_eq!(LogicalType::Nested, merged.logical_type);
        assert_eq!(
            vec![None, Some(3)],
            merged
                .fields
                .iter()
                .map(|f| f.path_array_id)
                .collect::<Vec<_>>()
        );
    }
}
