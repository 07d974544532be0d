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

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use snafu::{ensure, ResultExt};

use crate::error::{MapFileSnafu, RegionOutOfBoundsSnafu, Result};

/// A read only, memory mapped segment file.
///
/// Columns read from a segment borrow its bytes, so they cannot outlive it.
/// Dropping the segment unmaps the file.
#[derive(Debug)]
pub struct MappedSegment {
    path: PathBuf,
    mmap: Mmap,
}

impl MappedSegment {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let file = File::open(path).context(MapFileSnafu { path: &display })?;
        // Safety: the segment is immutable once written and the mapping is
        // read only.
        let mmap = unsafe { Mmap::map(&file) }.context(MapFileSnafu { path: &display })?;
        Ok(MappedSegment {
            path: path.to_path_buf(),
            mmap,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Bytes `offset..offset + len` of the segment.
    pub fn region(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset.checked_add(len);
        ensure!(
            end.is_some_and(|end| end <= self.mmap.len()),
            RegionOutOfBoundsSnafu {
                offset,
                len,
                mapped_len: self.mmap.len(),
            }
        );
        Ok(&self.mmap[offset..offset + len])
    }
}
