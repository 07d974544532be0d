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

//! Type inferring indexer of one in-memory partition.

use common_telemetry::debug;
use snafu::ensure;

use crate::dictionary::{
    EncodedRef, InsertionIdMapping, SortedValueDictionary, ValueDictionaryBuilder,
};
use crate::error::{Result, ValueTooDeepSnafu};
use crate::merge::MergeInput;
use crate::metrics::INDEXER_ROWS_TOTAL;
use crate::path::{parse_json_path, to_json_path, to_path_tokens, PathPart, ROOT_PATH};
use crate::schema::{AutoTypeColumnSchema, FormatVersion};
use crate::types::{FieldTypeInfo, LogicalType};
use crate::value::{Value, MAX_NESTING_DEPTH};

/// Output of the indexer for one observed value.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedKeyComponent {
    value: Value,
    refs: Vec<(String, EncodedRef)>,
    effective_size_bytes: usize,
}

impl EncodedKeyComponent {
    /// The value after casting.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Dictionary references of every literal found in the value, keyed by
    /// json path.
    pub fn refs(&self) -> &[(String, EncodedRef)] {
        &self.refs
    }

    pub fn refs_at<'a>(&'a self, path: &'a str) -> impl Iterator<Item = EncodedRef> + 'a {
        self.refs
            .iter()
            .filter(move |(p, _)| p == path)
            .map(|(_, r)| *r)
    }

    pub fn effective_size_bytes(&self) -> usize {
        self.effective_size_bytes
    }
}

#[derive(Default)]
struct ProcessResults {
    has_objects: bool,
    literal_paths: Vec<Vec<PathPart>>,
    refs: Vec<(String, EncodedRef)>,
    size: usize,
}

/// Observes the values of one column in row order, inferring their types
/// and building the partition dictionary.
#[derive(Debug)]
pub struct AutoTypeColumnIndexer {
    name: String,
    cast_to_type: Option<LogicalType>,
    version: FormatVersion,
    field_types: FieldTypeInfo,
    dictionary: ValueDictionaryBuilder,
    row_count: usize,
}

impl AutoTypeColumnIndexer {
    pub fn new(schema: &AutoTypeColumnSchema) -> AutoTypeColumnIndexer {
        AutoTypeColumnIndexer {
            name: schema.name().to_string(),
            cast_to_type: schema.cast_to_type(),
            version: schema.version(),
            field_types: FieldTypeInfo::new(),
            dictionary: ValueDictionaryBuilder::new(),
            row_count: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> FormatVersion {
        self.version
    }

    /// Observes `value` living at the json `path` of the current row. Only
    /// observations of the root path count as rows.
    pub fn observe(&mut self, path: &str, value: Value) -> Result<EncodedKeyComponent> {
        let mut parts = parse_json_path(path)?;
        ensure!(
            !value.exceeds_max_depth(),
            ValueTooDeepSnafu {
                max_depth: MAX_NESTING_DEPTH,
            }
        );
        let is_row = parts.is_empty();
        let value = match self.cast_to_type {
            Some(target) => value.cast_to(target),
            None => value,
        };

        let mut results = ProcessResults {
            has_objects: !parts.is_empty(),
            ..Default::default()
        };
        self.process_value(&mut parts, &value, &mut results);

        let value = match self.version {
            FormatVersion::V1 => process_raw_value_v1(&results, value),
            FormatVersion::V2 => process_raw_value_v2(&results, value, &mut self.dictionary),
        };
        if is_row {
            self.row_count += 1;
            INDEXER_ROWS_TOTAL.inc();
        }

        Ok(EncodedKeyComponent {
            value,
            refs: results.refs,
            effective_size_bytes: results.size,
        })
    }

    /// Observes the whole value of the current row.
    pub fn process_row_value(&mut self, value: Value) -> Result<EncodedKeyComponent> {
        self.observe(ROOT_PATH, value)
    }

    fn process_value(
        &mut self,
        parts: &mut Vec<PathPart>,
        value: &Value,
        results: &mut ProcessResults,
    ) {
        let path = to_json_path(parts);
        match value {
            Value::Null => {
                results.refs.push((path, EncodedRef::Null));
            }
            Value::String(_) | Value::Long(_) | Value::Double(_) => {
                let Some(scalar) = value.as_scalar() else {
                    return;
                };
                self.field_types.entry(path.clone()).add(scalar.logical_type());
                let encoded = self.dictionary.add_scalar(&scalar);
                results.size += value.estimated_size();
                results.refs.push((path, encoded));
                results.literal_paths.push(parts.clone());
            }
            Value::Array(elements) => {
                if let Some(literals) = value.literal_elements() {
                    let types = self.field_types.entry(path.clone());
                    let mut has_element = false;
                    for element in literals.iter().flatten() {
                        has_element = true;
                        if let Some(array_type) = LogicalType::array_of(element.logical_type()) {
                            types.add(array_type);
                        }
                    }
                    if !has_element {
                        types.add_empty_array();
                    }
                    let id = self.dictionary.add_array(literals);
                    results.size += value.estimated_size();
                    results.refs.push((path, EncodedRef::Array(id)));
                    results.literal_paths.push(parts.clone());
                } else {
                    self.field_types.entry(path).add_nested();
                    results.has_objects = true;
                    for (index, element) in elements.iter().enumerate() {
                        parts.push(PathPart::ArrayElement(index));
                        self.process_value(parts, element, results);
                        parts.pop();
                    }
                }
            }
            Value::Object(fields) => {
                self.field_types.entry(path).add_nested();
                results.has_objects = true;
                for (name, field) in fields {
                    parts.push(PathPart::Field(name.clone()));
                    self.process_value(parts, field, results);
                    parts.pop();
                }
            }
        }
    }

    pub fn field_type_info(&self) -> &FieldTypeInfo {
        &self.field_types
    }

    /// Logical type resolved from the types observed so far.
    pub fn logical_type(&self) -> LogicalType {
        self.field_types.resolve_logical_type()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn cardinality(&self) -> usize {
        self.dictionary.cardinality()
    }

    pub fn estimated_size_bytes(&self) -> usize {
        self.dictionary.size_bytes()
    }

    /// Sorts the partition dictionary for persisting.
    pub fn sorted_lookups(&self) -> Result<SortedLookups> {
        let (dictionary, mapping) = self.dictionary.build()?;
        debug!(
            "Sorted dictionary of column {}, rows: {}, cardinality: {}",
            self.name,
            self.row_count,
            dictionary.cardinality()
        );
        Ok(SortedLookups {
            version: self.version,
            dictionary,
            field_types: self.field_types.clone(),
            mapping,
        })
    }
}

fn process_raw_value_v1(_results: &ProcessResults, value: Value) -> Value {
    value
}

/// Registers the path array of every literal field of a structured row.
fn process_raw_value_v2(
    results: &ProcessResults,
    value: Value,
    dictionary: &mut ValueDictionaryBuilder,
) -> Value {
    if results.has_objects {
        for parts in results.literal_paths.iter().filter(|p| !p.is_empty()) {
            dictionary.add_string_array(&to_path_tokens(parts));
        }
    }
    value
}

/// Sorted dictionary and type observations of a partition.
#[derive(Debug, Clone)]
pub struct SortedLookups {
    version: FormatVersion,
    dictionary: SortedValueDictionary,
    field_types: FieldTypeInfo,
    mapping: InsertionIdMapping,
}

impl SortedLookups {
    pub fn version(&self) -> FormatVersion {
        self.version
    }

    pub fn dictionary(&self) -> &SortedValueDictionary {
        &self.dictionary
    }

    pub fn field_types(&self) -> &FieldTypeInfo {
        &self.field_types
    }

    /// Sorted global id of an insertion reference.
    pub fn resolve(&self, encoded: &EncodedRef) -> Option<u32> {
        self.mapping.resolve(encoded)
    }

    pub fn as_merge_input(&self) -> MergeInput<'_> {
        MergeInput {
            version: self.version,
            dictionary: &self.dictionary,
            field_types: &self.field_types,
        }
    }
}
