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

//! Self describing encoding of structured rows.

use std::collections::BTreeMap;

use snafu::{ensure, ResultExt};

use crate::config::ByteOrder;
use crate::error::{InvalidFormatSnafu, Result, Utf8Snafu};
use crate::format::{put_f64, put_i64, put_u32, ByteReader};
use crate::value::{Value, MAX_NESTING_DEPTH};

const TAG_NULL: u8 = 0;
const TAG_STRING: u8 = 1;
const TAG_LONG: u8 = 2;
const TAG_DOUBLE: u8 = 3;
const TAG_ARRAY: u8 = 4;
const TAG_OBJECT: u8 = 5;


const SECTION: &str = "structured value";

/// Appends the encoding of `value` to `buf`.
pub(crate) fn encode(value: &Value, order: ByteOrder, buf: &mut Vec<u8>) {
    match value {
        Value::Null => buf.push(TAG_NULL),
        Value::String(s) => {
            buf.push(TAG_STRING);
            put_str(s, order, buf);
        }
        Value::Long(v) => {
            buf.push(TAG_LONG);
            put_i64(buf, *v, order);
        }
        Value::Double(v) => {
            buf.push(TAG_DOUBLE);
            put_f64(buf, *v, order);
        }
        Value::Array(elements) => {
            buf.push(TAG_ARRAY);
            put_u32(buf, elements.len() as u32, order);
            for element in elements {
                encode(element, order, buf);
            }
        }
        Value::Object(fields) => {
            buf.push(TAG_OBJECT);
            put_u32(buf, fields.len() as u32, order);
            for (name, field) in fields {
                put_str(name, order, buf);
                encode(field, order, buf);
            }
        }
    }
}

fn put_str(s: &str, order: ByteOrder, buf: &mut Vec<u8>) {
    put_u32(buf, s.len() as u32, order);
    buf.extend_from_slice(s.as_bytes());
}

/// Decodes one value that must span all of `bytes`.
pub(crate) fn decode(bytes: &[u8], order: ByteOrder) -> Result<Value> {
    let mut reader = ByteReader::new(bytes, order);
    let value = decode_value(&mut reader, 0)?;
    ensure!(
        reader.remaining() == 0,
        InvalidFormatSnafu {
            reason: format!(
                "{} trailing bytes after structured value",
                reader.remaining()
            ),
        }
    );
    Ok(value)
}

fn decode_value(reader: &mut ByteReader<'_>, depth: usize) -> Result<Value> {
    ensure!(
        depth < MAX_NESTING_DEPTH,
        InvalidFormatSnafu {
            reason: "structured value nests too deep",
        }
    );
    let value = match reader.read_u8(SECTION)? {
        TAG_NULL => Value::Null,
        TAG_STRING => Value::String(read_str(reader)?),
        TAG_LONG => Value::Long(reader.read_i64(SECTION)?),
        TAG_DOUBLE => Value::Double(reader.read_f64(SECTION)?),
        TAG_ARRAY => {
            let count = reader.read_u32(SECTION)? as usize;
            // Every element takes at least one byte.
            let mut elements = Vec::with_capacity(count.min(reader.remaining()));
            for _ in 0..count {
                elements.push(decode_value(reader, depth + 1)?);
            }
            Value::Array(elements)
        }
        TAG_OBJECT => {
            let count = reader.read_u32(SECTION)?;
            let mut fields = BTreeMap::new();
            for _ in 0..count {
                let name = read_str(reader)?;
                let field = decode_value(reader, depth + 1)?;
                fields.insert(name, field);
            }
            Value::Object(fields)
        }
        tag => {
            return InvalidFormatSnafu {
                reason: format!("unknown structured value tag {tag}"),
            }
            .fail()
        }
    };
    Ok(value)
}

fn read_str(reader: &mut ByteReader<'_>) -> Result<String> {
    let len = reader.read_u32(SECTION)? as usize;
    let bytes = reader.read_bytes(len, SECTION)?;
    let s = std::str::from_utf8(bytes).context(Utf8Snafu { section: SECTION })?;
    Ok(s.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_encode_decode() {
        let value = Value::from(json!({
            "a": [1, null, "x", 2.5, {"b": []}],
            "c": {},
            "d": null,
        }));
        for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            let mut buf = Vec::new();
            encode(&value, order, &mut buf);
            assert_eq!(value, decode(&buf, order).unwrap());
        }
    }

    #[test]
    fn test_decode_invalid() {
        assert!(decode(&[], ByteOrder::LittleEndian).is_err());
        assert!(decode(&[9], ByteOrder::LittleEndian).is_err());
        assert!(decode(&[TAG_NULL, TAG_NULL], ByteOrder::LittleEndian).is_err());
        // An array claiming more elements than there are bytes.
        assert!(decode(&[TAG_ARRAY, 0xFF, 0xFF, 0xFF, 0xFF], ByteOrder::LittleEndian).is_err());
        assert!(decode(&[TAG_STRING, 1, 0, 0, 0, 0xFF], ByteOrder::LittleEndian).is_err());

    }

    #[test]
    fn test_decode_depth_limit() {
        let mut deepest = vec![TAG_ARRAY, 1, 0, 0, 0].repeat(MAX_NESTING_DEPTH - 1);
        deepest.push(TAG_NULL);
        assert!(decode(&deepest, ByteOrder::LittleEndian).is_ok());

        let mut too_deep = vec![TAG_ARRAY, 1, 0, 0, 0].repeat(MAX_NESTING_DEPTH);
        too_deep.push(TAG_NULL);
        let err = decode(&too_deep, ByteOrder::LittleEndian).unwrap_err();
        assert!(err.to_string().contains("nests too deep"), "{err}");

        // A long run of nested arrays fails on depth before running out of bytes.
        let crafted = vec![TAG_ARRAY, 1, 0, 0, 0].repeat(100_000);
        assert!(decode(&crafted, ByteOrder::LittleEndian).is_err());
    }
}
