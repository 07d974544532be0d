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

//! Schema of an auto typed column.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::{ensure, ResultExt};

use crate::error::{
    DeserializeSchemaSnafu, Error, InvalidCastTypeSnafu, InvalidVersionSnafu, Result,
    SerializeSchemaSnafu, UnknownSchemaTypeSnafu,
};
use crate::indexer::AutoTypeColumnIndexer;
use crate::types::LogicalType;

/// Type name of auto typed columns in schema json.
pub const AUTO_TYPE_NAME: &str = "auto";

/// Format version of a column. Fixed per indexer, merge and serializer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormatVersion {
    /// Field paths are stored inline.
    #[default]
    V1,
    /// Field paths are stored as string arrays in the value dictionary.
    V2,
}

impl FormatVersion {
    pub fn as_u8(&self) -> u8 {
        match self {
            FormatVersion::V1 => 1,
            FormatVersion::V2 => 2,
        }
    }

    pub fn try_from_i64(version: i64) -> Result<FormatVersion> {
        match version {
            1 => Ok(FormatVersion::V1),
            2 => Ok(FormatVersion::V2),
            _ => InvalidVersionSnafu { version }.fail(),
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

impl Serialize for FormatVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for FormatVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let version = i64::deserialize(deserializer)?;
        FormatVersion::try_from_i64(version).map_err(serde::de::Error::custom)
    }
}

/// Describes an auto typed column: its name, an optional type every value
/// is coerced to, and the format version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "SchemaJson", into = "SchemaJson")]
pub struct AutoTypeColumnSchema {
    name: String,
    cast_to_type: Option<LogicalType>,
    version: FormatVersion,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaJson {
    #[serde(rename = "type", default = "default_type_name")]
    type_name: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cast_to_type: Option<LogicalType>,
    #[serde(default)]
    version: Option<i64>,
}

fn default_type_name() -> String {
    AUTO_TYPE_NAME.to_string()
}

impl TryFrom<SchemaJson> for AutoTypeColumnSchema {
    type Error = Error;

    fn try_from(json: SchemaJson) -> Result<Self> {
        ensure!(
            json.type_name == AUTO_TYPE_NAME,
            UnknownSchemaTypeSnafu {
                type_name: json.type_name,
            }
        );
        AutoTypeColumnSchema::new(json.name, json.cast_to_type, json.version)
    }
}

impl From<AutoTypeColumnSchema> for SchemaJson {
    fn from(schema: AutoTypeColumnSchema) -> Self {
        SchemaJson {
            type_name: AUTO_TYPE_NAME.to_string(),
            name: schema.name,
            cast_to_type: schema.cast_to_type,
            version: Some(schema.version.as_u8() as i64),
        }
    }
}

impl AutoTypeColumnSchema {
    /// Creates a schema. `version` defaults to 1; any version other than 1
    /// or 2 is rejected, as is a cast to `VARIANT` or `NESTED`.
    pub fn new(
        name: impl Into<String>,
        cast_to_type: Option<LogicalType>,
        version: Option<i64>,
    ) -> Result<Self> {
        let version = match version {
            Some(v) => FormatVersion::try_from_i64(v)?,
            None => FormatVersion::default(),
        };
        if let Some(cast_to) = cast_to_type {
            ensure!(
                cast_to.is_scalar() || cast_to.is_array(),
                InvalidCastTypeSnafu { cast_to }
            );
        }
        Ok(Self {
            name: name.into(),
            cast_to_type,
            version,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let json: SchemaJson = serde_json::from_str(json).context(DeserializeSchemaSnafu)?;
        AutoTypeColumnSchema::try_from(json)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context(SerializeSchemaSnafu)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &'static str {
        AUTO_TYPE_NAME
    }

    pub fn cast_to_type(&self) -> Option<LogicalType> {
        self.cast_to_type
    }

    pub fn version(&self) -> FormatVersion {
        self.version
    }

    /// Declared column type, `NESTED` unless a cast target is set.
    pub fn column_type(&self) -> LogicalType {
        self.cast_to_type.unwrap_or(LogicalType::Nested)
    }

    pub fn make_indexer(&self) -> AutoTypeColumnIndexer {
        AutoTypeColumnIndexer::new(self)
    }
}

#[cfg(test)]
mod tests {
    use common_error::ext::ErrorExt;
    use common_error::status_code::StatusCode;

    use super::*;

    #[test]
    fn test_default_version() {
        let schema = AutoTypeColumnSchema::new("c", None, None).unwrap();
        assert_eq!(FormatVersion::V1, schema.version());
        assert_eq!(LogicalType::Nested, schema.column_type());
        assert_eq!("auto", schema.type_name());
    }

    #[test]
    fn test_invalid_version() {
        for version in [0, 3, -1, i64::MAX] {
            let err = AutoTypeColumnSchema::new("c", None, Some(version)).unwrap_err();
            assert_eq!(StatusCode::InvalidArguments, err.status_code());
            assert_eq!(format!("Invalid version: [{version}]"), err.to_string());
        }
    }

    #[test]
    fn test_invalid_cast() {
        assert!(AutoTypeColumnSchema::new("c", Some(LogicalType::Variant), None).is_err());
        assert!(AutoTypeColumnSchema::new("c", Some(LogicalType::Nested), None).is_err());
        let schema =
            AutoTypeColumnSchema::new("c", Some(LogicalType::LongArray), Some(2)).unwrap();
        assert_eq!(LogicalType::LongArray, schema.column_type());
    }

    #[test]
    fn test_json_round_trip() {
        let schema = AutoTypeColumnSchema::from_json(
            r#"{"type": "auto", "name": "attrs", "castToType": "FLOAT", "version": 2}"#,
        )
        .unwrap();
        assert_eq!("attrs", schema.name());
        assert_eq!(Some(LogicalType::Double), schema.cast_to_type());
        assert_eq!(FormatVersion::V2, schema.version());

        let json = schema.to_json().unwrap();
        assert_eq!(
            r#"{"type":"auto","name":"attrs","castToType":"DOUBLE","version":2}"#,
            json
        );
        assert_eq!(schema, AutoTypeColumnSchema::from_json(&json).unwrap());

        let schema = AutoTypeColumnSchema::from_json(r#"{"name": "x"}"#).unwrap();
        assert_eq!(FormatVersion::V1, schema.version());
    }

    #[test]
    fn test_json_rejects() {
        let err = AutoTypeColumnSchema::from_json(r#"{"name": "x", "version": 9}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidVersion { version: 9, .. }));
        assert!(AutoTypeColumnSchema::from_json(r#"{"type": "json", "name": "x"}"#).is_err());
        assert!(AutoTypeColumnSchema::from_json(r#"{"type": "auto"}"#).is_err());
    }
}
