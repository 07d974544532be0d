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

//! Logical types of auto typed columns and the type observations they are
//! resolved from.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::ensure;

use crate::error::{Error, Result, UnknownTypeNameSnafu, UnsupportedTypeSnafu};
use crate::path::ROOT_PATH;

/// Logical type of a column, or of the values found at one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalType {
    String,
    Long,
    Double,
    StringArray,
    LongArray,
    DoubleArray,
    /// Mixed scalars and literal arrays at the root.
    Variant,
    /// Objects or arrays of structures.
    Nested,
}

impl LogicalType {
    /// All logical types in tag order.
    pub const ALL: [LogicalType; 8] = [
        LogicalType::String,
        LogicalType::Long,
        LogicalType::Double,
        LogicalType::StringArray,
        LogicalType::LongArray,
        LogicalType::DoubleArray,
        LogicalType::Variant,
        LogicalType::Nested,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LogicalType::String => "STRING",
            LogicalType::Long => "LONG",
            LogicalType::Double => "DOUBLE",
            LogicalType::StringArray => "ARRAY<STRING>",
            LogicalType::LongArray => "ARRAY<LONG>",
            LogicalType::DoubleArray => "ARRAY<DOUBLE>",
            LogicalType::Variant => "VARIANT",
            LogicalType::Nested => "NESTED",
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            LogicalType::String | LogicalType::Long | LogicalType::Double
        )
    }

    pub fn is_array(&self) -> bool {
        self.element_type().is_some()
    }

    /// Element type of an array type.
    pub fn element_type(&self) -> Option<LogicalType> {
        match self {
            LogicalType::StringArray => Some(LogicalType::String),
            LogicalType::LongArray => Some(LogicalType::Long),
            LogicalType::DoubleArray => Some(LogicalType::Double),
            _ => None,
        }
    }

    /// Array type whose elements are `scalar`.
    pub fn array_of(scalar: LogicalType) -> Option<LogicalType> {
        match scalar {
            LogicalType::String => Some(LogicalType::StringArray),
            LogicalType::Long => Some(LogicalType::LongArray),
            LogicalType::Double => Some(LogicalType::DoubleArray),
            _ => None,
        }
    }

    /// On-disk tag.
    pub(crate) fn tag(&self) -> u8 {
        match self {
            LogicalType::String => 0,
            LogicalType::Long => 1,
            LogicalType::Double => 2,
            LogicalType::StringArray => 3,
            LogicalType::LongArray => 4,
            LogicalType::DoubleArray => 5,
            LogicalType::Variant => 6,
            LogicalType::Nested => 7,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<LogicalType> {
        LogicalType::ALL.get(tag as usize).copied()
    }

    fn type_bit(&self) -> Option<u16> {
        match self {
            LogicalType::String => Some(TypeSet::STRING),
            LogicalType::Long => Some(TypeSet::LONG),
            LogicalType::Double => Some(TypeSet::DOUBLE),
            LogicalType::StringArray => Some(TypeSet::STRING_ARRAY),
            LogicalType::LongArray => Some(TypeSet::LONG_ARRAY),
            LogicalType::DoubleArray => Some(TypeSet::DOUBLE_ARRAY),
            LogicalType::Variant => None,
            LogicalType::Nested => Some(TypeSet::NESTED),
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogicalType {
    type Err = Error;

    /// Parses a type name case-insensitively. `FLOAT` is widened to `DOUBLE`.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();
        let logical_type = match normalized.as_str() {
            "STRING" => LogicalType::String,
            "LONG" => LogicalType::Long,
            "DOUBLE" | "FLOAT" => LogicalType::Double,
            "ARRAY<STRING>" => LogicalType::StringArray,
            "ARRAY<LONG>" => LogicalType::LongArray,
            "ARRAY<DOUBLE>" | "ARRAY<FLOAT>" => LogicalType::DoubleArray,
            "VARIANT" => LogicalType::Variant,
            "NESTED" | "COMPLEX<JSON>" => LogicalType::Nested,
            _ => return UnknownTypeNameSnafu { name: s }.fail(),
        };
        Ok(logical_type)
    }
}

impl Serialize for LogicalType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for LogicalType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Set of types observed at one path.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TypeSet(u16);

impl TypeSet {
    pub const STRING: u16 = 1;
    pub const LONG: u16 = 1 << 1;
    pub const DOUBLE: u16 = 1 << 2;
    pub const STRING_ARRAY: u16 = 1 << 3;
    pub const LONG_ARRAY: u16 = 1 << 4;
    pub const DOUBLE_ARRAY: u16 = 1 << 5;
    /// An array without any non-null element.
    pub const EMPTY_ARRAY: u16 = 1 << 6;
    /// An object, or an array holding arrays or objects.
    pub const NESTED: u16 = 1 << 7;

    const CONCRETE_BITS: u16 = 0x3F;
    const KNOWN_BITS: u16 = 0xFF;
    const CONCRETE_TYPES: [LogicalType; 6] = [
        LogicalType::String,
        LogicalType::Long,
        LogicalType::Double,
        LogicalType::StringArray,
        LogicalType::LongArray,
        LogicalType::DoubleArray,
    ];

    pub fn new() -> TypeSet {
        TypeSet(0)
    }

    /// Creates a set from raw bits. Unknown bits are kept and reported by
    /// [TypeSet::validate].
    pub fn from_bits(bits: u16) -> TypeSet {
        TypeSet(bits)
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn with(mut self, logical_type: LogicalType) -> TypeSet {
        self.add(logical_type);
        self
    }

    /// Records an observation of `logical_type`. `VARIANT` is a resolution
    /// rather than an observation and is ignored.
    pub fn add(&mut self, logical_type: LogicalType) {
        if let Some(bit) = logical_type.type_bit() {
            self.0 |= bit;
        }
    }

    pub fn add_empty_array(&mut self) {
        self.0 |= Self::EMPTY_ARRAY;
    }

    pub fn add_nested(&mut self) {
        self.0 |= Self::NESTED;
    }

    pub fn merge(&mut self, other: TypeSet) {
        self.0 |= other.0;
    }

    pub fn contains(&self, logical_type: LogicalType) -> bool {
        logical_type
            .type_bit()
            .map(|bit| self.0 & bit != 0)
            .unwrap_or(false)
    }

    pub fn has_empty_array(&self) -> bool {
        self.0 & Self::EMPTY_ARRAY != 0
    }

    pub fn has_nested(&self) -> bool {
        self.0 & Self::NESTED != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn is_known(&self) -> bool {
        self.0 & !Self::KNOWN_BITS == 0
    }

    /// Returns true if a scalar or a literal array was seen.
    pub fn has_literal_types(&self) -> bool {
        self.0 & (Self::CONCRETE_BITS | Self::EMPTY_ARRAY) != 0
    }

    /// Concrete scalar and array types, in tag order.
    pub fn concrete_types(&self) -> impl Iterator<Item = LogicalType> + '_ {
        Self::CONCRETE_TYPES
            .into_iter()
            .filter(move |t| self.contains(*t))
    }

    /// The only concrete type of this set. A set holding nothing but empty
    /// arrays is an `ARRAY<LONG>`. Empty arrays next to a scalar type make
    /// the set mixed.
    pub fn single_type(&self) -> Option<LogicalType> {
        if self.has_nested() {
            return None;
        }
        let mut types = self.concrete_types();
        match (types.next(), types.next()) {
            (Some(only), None) if only.is_scalar() && self.has_empty_array() => None,
            (Some(only), None) => Some(only),
            (None, _) if self.has_empty_array() => Some(LogicalType::LongArray),
            _ => None,
        }
    }

    pub fn validate(&self, path: &str) -> Result<()> {
        ensure!(
            self.is_known(),
            UnsupportedTypeSnafu {
                bits: self.0,
                path,
            }
        );
        Ok(())
    }
}

impl fmt::Debug for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for t in self.concrete_types() {
            set.entry(&t.name());
        }
        if self.has_empty_array() {
            set.entry(&"EMPTY_ARRAY");
        }
        if self.has_nested() {
            set.entry(&"NESTED");
        }
        if !self.is_known() {
            set.entry(&format_args!("{:#06x}", self.0 & !Self::KNOWN_BITS));
        }
        set.finish()
    }
}

/// Type observations keyed by json path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTypeInfo {
    fields: BTreeMap<String, TypeSet>,
}

impl FieldTypeInfo {
    pub fn new() -> FieldTypeInfo {
        FieldTypeInfo::default()
    }

    pub fn get(&self, path: &str) -> Option<TypeSet> {
        self.fields.get(path).copied()
    }

    pub fn entry(&mut self, path: String) -> &mut TypeSet {
        self.fields.entry(path).or_default()
    }

    pub fn insert(&mut self, path: impl Into<String>, types: TypeSet) {
        self.entry(path.into()).merge(types);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, TypeSet)> {
        self.fields.iter().map(|(path, types)| (path.as_str(), *types))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Unions `other` into this info path-wise.
    pub fn merge(&mut self, other: &FieldTypeInfo) {
        for (path, types) in other.iter() {
            self.insert(path, types);
        }
    }

    /// Fails on the first type set carrying unknown bits.
    pub fn validate(&self) -> Result<()> {
        self.iter().try_for_each(|(path, types)| types.validate(path))
    }

    /// Resolves the logical type of a column holding these observations.
    pub fn resolve_logical_type(&self) -> LogicalType {
        let has_non_root = self.fields.keys().any(|path| path != ROOT_PATH);
        if has_non_root || self.fields.values().any(TypeSet::has_nested) {
            return LogicalType::Nested;
        }
        let Some(root) = self.fields.get(ROOT_PATH) else {
            return LogicalType::String;
        };
        let mut types = root.concrete_types();
        match (types.next(), types.next()) {
            (None, _) if root.has_empty_array() => LogicalType::LongArray,
            (None, _) => LogicalType::String,
            (Some(only), None) if only.is_scalar() && root.has_empty_array() => {
                LogicalType::Variant
            }
            (Some(only), None) => only,
            (Some(_), Some(_)) => LogicalType::Variant,
        }
    }
}

impl<S: Into<String>> FromIterator<(S, TypeSet)> for FieldTypeInfo {
    fn from_iter<T: IntoIterator<Item = (S, TypeSet)>>(iter: T) -> Self {
        let mut info = FieldTypeInfo::new();
        for (path, types) in iter {
            info.insert(path, types);
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name_parse() {
        for t in LogicalType::ALL {
            assert_eq!(t, t.name().parse().unwrap());
            assert_eq!(Some(t), LogicalType::from_tag(t.tag()));
        }
        assert_eq!(LogicalType::Double, "float".parse().unwrap());
        assert_eq!(
            LogicalType::DoubleArray,
            "ARRAY<FLOAT>".parse::<LogicalType>().unwrap()
        );
        assert_eq!(
            LogicalType::StringArray,
            "array< string >".parse::<LogicalType>().unwrap()
        );
        assert!("MAP<STRING>".parse::<LogicalType>().is_err());
        assert_eq!(None, LogicalType::from_tag(8));
    }

    #[test]
    fn test_single_type() {
        assert_eq!(
            Some(LogicalType::Long),
            TypeSet::new().with(LogicalType::Long).single_type()
        );

        let mut empty_only = TypeSet::new();
        empty_only.add_empty_array();
        assert_eq!(Some(LogicalType::LongArray), empty_only.single_type());

        let mut empty_and_strings = empty_only.with(LogicalType::StringArray);
        assert_eq!(Some(LogicalType::StringArray), empty_and_strings.single_type());
        empty_and_strings.add(LogicalType::String);
        assert_eq!(None, empty_and_strings.single_type());

        for scalar in [LogicalType::String, LogicalType::Long, LogicalType::Double] {
            assert_eq!(None, empty_only.with(scalar).single_type());
        }

        assert_eq!(None, TypeSet::new().single_type());
        assert_eq!(
            None,
            TypeSet::new()
                .with(LogicalType::Long)
                .with(LogicalType::Nested)
                .single_type()
        );
    }

    #[test]
    fn test_unknown_bits() {
        let types = TypeSet::from_bits(TypeSet::LONG | 0x400);
        assert!(!types.is_known());
        assert!(types.validate("$").is_err());
        assert!(TypeSet::from_bits(0xFF).validate("$").is_ok());
    }

    #[test]
    fn test_resolve_logical_type() {
        assert_eq!(
            LogicalType::String,
            FieldTypeInfo::new().resolve_logical_type()
        );

        let info: FieldTypeInfo = [("$", TypeSet::new().with(LogicalType::Double))]
            .into_iter()
            .collect();
        assert_eq!(LogicalType::Double, info.resolve_logical_type());

        let info: FieldTypeInfo = [
            ("$", TypeSet::new().with(LogicalType::Double)),
            ("$", TypeSet::new().with(LogicalType::LongArray)),
        ]
        .into_iter()
        .collect();
        assert_eq!(LogicalType::Variant, info.resolve_logical_type());

        let info: FieldTypeInfo = [("$.a", TypeSet::new().with(LogicalType::Long))]
            .into_iter()
            .collect();
        assert_eq!(LogicalType::Nested, info.resolve_logical_type());

        let mut root = TypeSet::new();
        root.add_empty_array();
        let info: FieldTypeInfo = [("$", root)].into_iter().collect();
        assert_eq!(LogicalType::LongArray, info.resolve_logical_type());

        let info: FieldTypeInfo = [("$", TypeSet::new())].into_iter().collect();
        assert_eq!(LogicalType::String, info.resolve_logical_type());

        let info: FieldTypeInfo = [("$", root.with(LogicalType::Long))].into_iter().collect();
        assert_eq!(LogicalType::Variant, info.resolve_logical_type());
        let info: FieldTypeInfo = [("$", root.with(LogicalType::DoubleArray))]
            .into_iter()
            .collect();
        assert_eq!(LogicalType::DoubleArray, info.resolve_logical_type());
    }

    #[test]
    fn test_merge_field_types() {
        let mut left: FieldTypeInfo = [("$", TypeSet::new().with(LogicalType::Long))]
            .into_iter()
            .collect();
        let right: FieldTypeInfo = [("$", TypeSet::new().with(LogicalType::String))]
            .into_iter()
            .collect();
        left.merge(&right);
        assert_eq!(
            vec![LogicalType::String, LogicalType::Long],
            left.get("$").unwrap().concrete_types().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_serde_name() {
        let json = serde_json::to_string(&LogicalType::LongArray).unwrap();
        assert_eq!("\"ARRAY<LONG>\"", json);
        let t: LogicalType = serde_json::from_str("\"FLOAT\"").unwrap();
        assert_eq!(LogicalType::Double, t);
    }
}
