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

//! Raw values handed to the indexer and returned by column selectors.

use std::collections::BTreeMap;
use std::fmt;

use ordered_float::OrderedFloat;
use serde_json::{Map, Number, Value as Json};

use crate::path::PathPart;
use crate::types::LogicalType;

/// Max nesting depth of a value. The root value is at depth 0.
pub const MAX_NESTING_DEPTH: usize = 128;

/// A raw, possibly structured value of one row.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    String(String),
    Long(i64),
    Double(f64),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the value kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn as_scalar(&self) -> Option<ScalarValue> {
        match self {
            Value::String(s) => Some(ScalarValue::String(s.clone())),
            Value::Long(v) => Some(ScalarValue::Long(*v)),
            Value::Double(v) => Some(ScalarValue::Double(OrderedFloat(*v))),
            _ => None,
        }
    }

    /// Elements of a literal array, an array whose elements are all scalars
    /// or nulls. Returns `None` for anything else.
    pub fn literal_elements(&self) -> Option<Vec<Option<ScalarValue>>> {
        let Value::Array(elements) = self else {
            return None;
        };
        elements
            .iter()
            .map(|element| match element {
                Value::Null => Some(None),
                other => other.as_scalar().map(Some),
            })
            .collect()
    }

    /// Returns the value found by following `parts`.
    pub fn get_path(&self, parts: &[PathPart]) -> Option<&Value> {
        parts.iter().try_fold(self, |current, part| match (current, part) {
            (Value::Object(fields), PathPart::Field(name)) => fields.get(name),
            (Value::Array(elements), PathPart::ArrayElement(index)) => elements.get(*index),
            _ => None,
        })
    }

    /// Coerces this value to `target`. Values that cannot be represented
    /// become null.
    pub fn cast_to(self, target: LogicalType) -> Value {
        match target {
            LogicalType::String | LogicalType::Long | LogicalType::Double => match self {
                Value::Array(mut elements) if elements.len() == 1 => {
                    elements.swap_remove(0).cast_to(target)
                }
                Value::Array(_) | Value::Object(_) | Value::Null => Value::Null,
                scalar => cast_scalar(scalar, target),
            },
            LogicalType::StringArray | LogicalType::LongArray | LogicalType::DoubleArray => {
                let Some(element_type) = target.element_type() else {
                    return Value::Null;
                };
                match self {
                    Value::Null | Value::Object(_) => Value::Null,
                    Value::Array(elements) => Value::Array(
                        elements
                            .into_iter()
                            .map(|element| match element {
                                Value::Array(_) | Value::Object(_) => Value::Null,
                                scalar => cast_scalar(scalar, element_type),
                            })
                            .collect(),
                    ),
                    scalar => Value::Array(vec![cast_scalar(scalar, element_type)]),
                }
            }
            LogicalType::Variant | LogicalType::Nested => self,
        }
    }

    /// Returns true if some element of this value lies at
    /// [MAX_NESTING_DEPTH] or deeper.
    pub fn exceeds_max_depth(&self) -> bool {
        self.exceeds_depth_from(0)
    }

    fn exceeds_depth_from(&self, depth: usize) -> bool {
        if depth >= MAX_NESTING_DEPTH {
            return true;
        }
        match self {
            Value::Array(elements) => elements.iter().any(|e| e.exceeds_depth_from(depth + 1)),
            Value::Object(fields) => fields.values().any(|v| v.exceeds_depth_from(depth + 1)),
            _ => false,
        }
    }

    /// Rough in-memory footprint of this value.
    pub fn estimated_size(&self) -> usize {
        let payload = match self {
            Value::Null | Value::Long(_) | Value::Double(_) => 0,
            Value::String(s) => s.len(),
            Value::Array(elements) => elements.iter().map(Value::estimated_size).sum(),
            Value::Object(fields) => fields
                .iter()
                .map(|(k, v)| k.len() + v.estimated_size())
                .sum(),
        };
        std::mem::size_of::<Value>() + payload
    }
}

fn cast_scalar(value: Value, target: LogicalType) -> Value {
    match (value, target) {
        (Value::String(s), LogicalType::String) => Value::String(s),
        (Value::String(s), LogicalType::Long) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(v) => Value::Long(v),
                Err(_) => match s.parse::<f64>() {
                    Ok(v) if v.is_finite() => Value::Long(v as i64),
                    _ => Value::Null,
                },
            }
        }
        (Value::String(s), LogicalType::Double) => match s.trim().parse::<f64>() {
            Ok(v) => Value::Double(v),
            Err(_) => Value::Null,
        },
        (Value::Long(v), LogicalType::String) => Value::String(v.to_string()),
        (Value::Long(v), LogicalType::Long) => Value::Long(v),
        (Value::Long(v), LogicalType::Double) => Value::Double(v as f64),
        (Value::Double(v), LogicalType::String) => Value::String(v.to_string()),
        (Value::Double(v), LogicalType::Long) if v.is_finite() => Value::Long(v as i64),
        (Value::Double(v), LogicalType::Double) => Value::Double(v),
        _ => Value::Null,
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Long(b as i64),
            Json::Number(n) => match n.as_i64() {
                Some(v) => Value::Long(v),
                None => n.as_f64().map(Value::Double).unwrap_or(Value::Null),
            },
            Json::String(s) => Value::String(s),
            Json::Array(elements) => Value::Array(elements.into_iter().map(Value::from).collect()),
            Json::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for Json {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Json::Null,
            Value::String(s) => Json::String(s),
            Value::Long(v) => Json::Number(v.into()),
            Value::Double(v) => Number::from_f64(v).map(Json::Number).unwrap_or(Json::Null),
            Value::Array(elements) => Json::Array(elements.into_iter().map(Json::from).collect()),
            Value::Object(fields) => Json::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Json::from(v)))
                    .collect::<Map<_, _>>(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Json::from(self.clone()))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(elements: Vec<T>) -> Self {
        Value::Array(elements.into_iter().map(Into::into).collect())
    }
}

impl From<ScalarValue> for Value {
    fn from(v: ScalarValue) -> Self {
        match v {
            ScalarValue::String(s) => Value::String(s),
            ScalarValue::Long(v) => Value::Long(v),
            ScalarValue::Double(v) => Value::Double(v.0),
        }
    }
}

/// A non-null scalar. Strings sort before longs, longs before doubles.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScalarValue {
    String(String),
    Long(i64),
    Double(OrderedFloat<f64>),
}

impl ScalarValue {
    pub fn logical_type(&self) -> LogicalType {
        match self {
            ScalarValue::String(_) => LogicalType::String,
            ScalarValue::Long(_) => LogicalType::Long,
            ScalarValue::Double(_) => LogicalType::Double,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::String(s) => write!(f, "{s:?}"),
            ScalarValue::Long(v) => write!(f, "{v}"),
            ScalarValue::Double(v) => write!(f, "{}", v.0),
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::String(s.to_string())
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Long(v)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Double(OrderedFloat(v))
    }
}
