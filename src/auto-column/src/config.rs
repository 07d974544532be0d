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

//! Options of auto typed columns.

use std::path::Path;

use common_telemetry::LoggingOptions;
use serde::{Deserialize, Serialize};
use snafu::{ensure, ResultExt};

use crate::bitmap::BitmapCodec;
use crate::error::{
    InvalidOptionsSnafu, ParseOptionsSnafu, ReadOptionsSnafu, Result, SerializeOptionsSnafu,
};

/// Default ratio of dictionary cardinality to rows above which predicate and
/// range indexes are not handed out.
pub const DEFAULT_SKIP_PREDICATE_INDEX_SCALE: f64 = 0.08;

/// Byte order of fixed width integers and floats in a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

/// Options that shape the bytes written by the serializer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    pub bitmap_codec: BitmapCodec,
    pub byte_order: ByteOrder,
}

/// Policy deciding which optional indexes a supplier hands out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexPolicy {
    /// Always hand out predicate and range indexes, regardless of cardinality.
    pub always_use_indexes: bool,
    pub skip_predicate_index_scale: f64,
}

impl Default for IndexPolicy {
    fn default() -> Self {
        Self {
            always_use_indexes: false,
            skip_predicate_index_scale: DEFAULT_SKIP_PREDICATE_INDEX_SCALE,
        }
    }
}

impl IndexPolicy {
    pub const ALWAYS_USE_INDEXES: IndexPolicy = IndexPolicy {
        always_use_indexes: true,
        skip_predicate_index_scale: DEFAULT_SKIP_PREDICATE_INDEX_SCALE,
    };

    /// Returns true if predicate and range indexes over a dictionary of
    /// `cardinality` values are worth using for `row_count` rows.
    pub fn allows_predicate_index(&self, cardinality: usize, row_count: usize) -> bool {
        self.always_use_indexes
            || (cardinality as f64) <= self.skip_predicate_index_scale * row_count as f64
    }
}

/// Top level options, usually loaded from a toml file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoColumnOptions {
    pub format: FormatOptions,
    pub index: IndexPolicy,
    pub logging: LoggingOptions,
}

impl AutoColumnOptions {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut opts: AutoColumnOptions = toml::from_str(s).context(ParseOptionsSnafu)?;
        opts.validate_sanitize()?;
        Ok(opts)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).context(ReadOptionsSnafu {
            path: path.display().to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate (and possibly sanitize) the options.
    pub fn validate_sanitize(&mut self) -> Result<()> {
        let scale = self.index.skip_predicate_index_scale;
        ensure!(
            scale.is_finite() && scale > 0.0,
            InvalidOptionsSnafu {
                reason: format!("skip_predicate_index_scale must be positive, got {scale}"),
            }
        );
        if self.logging.level.as_deref() == Some("") {
            self.logging.level = None;
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).context(SerializeOptionsSnafu)
    }
}
