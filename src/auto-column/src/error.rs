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

use std::any::Any;

use common_error::ext::ErrorExt;
use common_error::status_code::StatusCode;
use snafu::{Location, Snafu};

use crate::types::LogicalType;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Invalid version: [{}]", version))]
    InvalidVersion {
        version: i64,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Auto typed columns cannot be cast to {}", cast_to))]
    InvalidCastType {
        cast_to: LogicalType,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Unknown column type name: {}", name))]
    UnknownTypeName {
        name: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Unknown dimension schema type: {}, expect auto", type_name))]
    UnknownSchemaType {
        type_name: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to deserialize column schema"))]
    DeserializeSchema {
        #[snafu(source)]
        error: serde_json::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to serialize column schema"))]
    SerializeSchema {
        #[snafu(source)]
        error: serde_json::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Invalid json path {}, reason: {}", path, reason))]
    InvalidPath {
        path: String,
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Value nests deeper than {} levels", max_depth))]
    ValueTooDeep {
        max_depth: usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to parse options"))]
    ParseOptions {
        #[snafu(source)]
        error: toml::de::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to serialize options to toml"))]
    SerializeOptions {
        #[snafu(source)]
        error: toml::ser::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to read options file {}", path))]
    ReadOptions {
        path: String,
        #[snafu(source)]
        error: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Invalid options, reason: {}", reason))]
    InvalidOptions {
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Unsupported type bits {:#06x} at path {}", bits, path))]
    UnsupportedType {
        bits: u16,
        path: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "Unsupported {} value for column {} of type {}",
        kind,
        column,
        logical_type
    ))]
    UnsupportedValue {
        column: String,
        logical_type: LogicalType,
        kind: &'static str,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Value {} is not present in the dictionary of column {}", value, column))]
    ValueNotInDictionary {
        column: String,
        value: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "Dictionary section {} is not strictly increasing at position {}",
        section,
        position
    ))]
    UnsortedDictionary {
        section: &'static str,
        position: usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Array dictionary entry {} references invalid id {}", index, id))]
    InvalidArrayElement {
        index: usize,
        id: u32,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Dictionary with {} values exceeds the id space", count))]
    DictionaryOverflow {
        count: usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("No dictionaries to merge"))]
    EmptyMergeInput {
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Format version mismatch, expected: {}, actual: {}", expected, actual))]
    VersionMismatch {
        expected: u8,
        actual: u8,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Path array of field {} is missing from the merged dictionary", path))]
    MissingPathArray {
        path: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "Column {} expects logical type {}, but the dictionary was merged as {}",
        column,
        expected,
        actual
    ))]
    LogicalTypeMismatch {
        column: String,
        expected: LogicalType,
        actual: LogicalType,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "Serializer of column {} is in state {}, expected {}",
        column,
        actual,
        expected
    ))]
    IllegalSerializerState {
        column: String,
        expected: &'static str,
        actual: &'static str,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to write column {}", column))]
    WriteColumn {
        column: String,
        #[snafu(source)]
        error: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to create write-out buffer"))]
    CreateWriteOut {
        #[snafu(source)]
        error: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "Column bytes are truncated in section {}, need {} bytes, {} remaining",
        section,
        needed,
        remaining
    ))]
    Truncated {
        section: &'static str,
        needed: usize,
        remaining: usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Invalid column format, reason: {}", reason))]
    InvalidFormat {
        reason: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "Column metadata mismatch on {}, expected: {}, stored: {}",
        field,
        expected,
        actual
    ))]
    MetadataMismatch {
        field: &'static str,
        expected: String,
        actual: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to decode bitmap"))]
    DecodeBitmap {
        #[snafu(source)]
        error: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to encode bitmap"))]
    EncodeBitmap {
        #[snafu(source)]
        error: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Invalid utf-8 bytes in section {}", section))]
    Utf8 {
        section: &'static str,
        #[snafu(source)]
        error: std::str::Utf8Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Row {} is out of range, row count: {}", row, row_count))]
    RowOutOfRange {
        row: usize,
        row_count: usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("Failed to map file {}", path))]
    MapFile {
        path: String,
        #[snafu(source)]
        error: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display(
        "Region at offset {} with length {} is out of bounds, mapped length: {}",
        offset,
        len,
        mapped_len
    ))]
    RegionOutOfBounds {
        offset: usize,
        len: usize,
        mapped_len: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl ErrorExt for Error {
    fn status_code(&self) -> StatusCode {
        use Error::*;

        match self {
            InvalidVersion { .. }
            | InvalidCastType { .. }
            | UnknownTypeName { .. }
            | UnknownSchemaType { .. }
            | DeserializeSchema { .. }
            | InvalidPath { .. }
            | ValueTooDeep { .. }
            | ParseOptions { .. }
            | InvalidOptions { .. }
            | EmptyMergeInput { .. }
            | VersionMismatch { .. }
            | LogicalTypeMismatch { .. }
            | RowOutOfRange { .. }
            | RegionOutOfBounds { .. } => StatusCode::InvalidArguments,

            UnsupportedType { .. } | UnsupportedValue { .. } => StatusCode::Unsupported,

            ValueNotInDictionary { .. }
            | UnsortedDictionary { .. }
            | InvalidArrayElement { .. }
            | MissingPathArray { .. } => StatusCode::Unexpected,

            IllegalSerializerState { .. } => StatusCode::IllegalState,

            Truncated { .. }
            | InvalidFormat { .. }
            | MetadataMismatch { .. }
            | DecodeBitmap { .. }
            | Utf8 { .. } => StatusCode::StorageCorrupted,

            ReadOptions { .. }
            | WriteColumn { .. }
            | CreateWriteOut { .. }
            | MapFile { .. } => StatusCode::StorageUnavailable,

            SerializeSchema { .. }
            | SerializeOptions { .. }
            | EncodeBitmap { .. }
            | DictionaryOverflow { .. } => StatusCode::Internal,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
