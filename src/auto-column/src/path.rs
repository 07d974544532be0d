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

//! JSONPath style paths into structured values.
//!
//! A path is a sequence of [PathPart]s rendered as `$`, followed by `.name`
//! for plain identifier fields, `['name']` for any other field and `[i]` for
//! array elements.

use std::fmt::Write;

use snafu::{ensure, OptionExt};

use crate::error::{InvalidPathSnafu, Result};

/// Path of the whole row.
pub const ROOT_PATH: &str = "$";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathPart {
    Field(String),
    ArrayElement(usize),
}

impl PathPart {
    /// Standalone rendering of this part, such as `.a`, `['a b']` or `[0]`.
    pub fn token(&self) -> String {
        let mut token = String::new();
        self.write_token(&mut token);
        token
    }

    /// Parses a single token produced by [PathPart::token].
    pub fn parse_token(token: &str) -> Result<PathPart> {
        let mut parts = parse_json_path(&format!("{ROOT_PATH}{token}"))?;
        ensure!(
            parts.len() == 1,
            InvalidPathSnafu {
                path: token,
                reason: "expect exactly one path part",
            }
        );
        parts.pop().context(InvalidPathSnafu {
            path: token,
            reason: "empty token",
        })
    }

    fn write_token(&self, out: &mut String) {
        match self {
            PathPart::Field(name) if is_plain_identifier(name) => {
                out.push('.');
                out.push_str(name);
            }
            PathPart::Field(name) => {
                out.push_str("['");
                for c in name.chars() {
                    if c == '\'' || c == '\\' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push_str("']");
            }
            PathPart::ArrayElement(index) => {
                // Writing to a String never fails.
                let _ = write!(out, "[{index}]");
            }
        }
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Renders `parts` as a json path.
pub fn to_json_path(parts: &[PathPart]) -> String {
    let mut path = String::from(ROOT_PATH);
    for part in parts {
        part.write_token(&mut path);
    }
    path
}

/// Tokens of every part in `parts`, the path array of a field.
pub fn to_path_tokens(parts: &[PathPart]) -> Vec<String> {
    parts.iter().map(PathPart::token).collect()
}

/// Rebuilds a json path from its path array.
pub fn path_from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<String> {
    let mut parts = Vec::with_capacity(tokens.len());
    for token in tokens {
        parts.push(PathPart::parse_token(token.as_ref())?);
    }
    Ok(to_json_path(&parts))
}

/// Parses a json path into its parts.
pub fn parse_json_path(path: &str) -> Result<Vec<PathPart>> {
    let rest = path.strip_prefix(ROOT_PATH).context(InvalidPathSnafu {
        path,
        reason: "path must start with $",
    })?;
    let invalid = |reason: &str| {
        InvalidPathSnafu {
            path,
            reason: reason.to_string(),
        }
        .build()
    };

    let chars: Vec<char> = rest.chars().collect();
    let mut parts = Vec::new();
    let mut pos = 0;
    while pos < chars.len() {
        match chars[pos] {
            '.' => {
                pos += 1;
                let start = pos;
                while pos < chars.len() && chars[pos] != '.' && chars[pos] != '[' {
                    pos += 1;
                }
                if start == pos {
                    return Err(invalid("empty field name"));
                }
                parts.push(PathPart::Field(chars[start..pos].iter().collect()));
            }
            '[' if chars.get(pos + 1) == Some(&'\'') => {
                pos += 2;
                let mut name = String::new();
                loop {
                    match chars.get(pos) {
                        None => return Err(invalid("unterminated quoted field")),
                        Some('\\') => {
                            let escaped = chars
                                .get(pos + 1)
                                .ok_or_else(|| invalid("dangling escape"))?;
                            name.push(*escaped);
                            pos += 2;
                        }
                        Some('\'') => {
                            pos += 1;
                            break;
                        }
                        Some(c) => {
                            name.push(*c);
                            pos += 1;
                        }
                    }
                }
                if chars.get(pos) != Some(&']') {
                    return Err(invalid("expect ] after quoted field"));
                }
                pos += 1;
                parts.push(PathPart::Field(name));
            }
            '[' => {
                pos += 1;
                let start = pos;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
                if start == pos || chars.get(pos) != Some(&']') {
                    return Err(invalid("expect array index"));
                }
                let index = chars[start..pos]
                    .iter()
                    .collect::<String>()
                    .parse::<usize>()
                    .map_err(|_| invalid("array index overflow"))?;
                pos += 1;
                parts.push(PathPart::ArrayElement(index));
            }
            _ => return Err(invalid("expect . or [")),
        }
    }
    Ok(parts)
}
