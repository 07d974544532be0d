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

//! Row bitmaps backing the column indexes.

use std::io;

use bitvec::prelude::{BitVec as RawBitVec, Lsb0};
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{DecodeBitmapSnafu, EncodeBitmapSnafu, Result};

pub type BitVec = RawBitVec<u8, Lsb0>;

/// Serialized representation of bitmaps in a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitmapCodec {
    #[default]
    Roaring,
    /// Plain bit vector, one bit per row.
    BitVec,
}

/// A set of row numbers.
#[derive(Debug, Clone)]
pub enum Bitmap {
    Roaring(RoaringBitmap),
    BitVec(BitVec),
}

impl Bitmap {
    pub fn new_roaring() -> Self {
        Bitmap::Roaring(RoaringBitmap::new())
    }

    pub fn new_bitvec() -> Self {
        Bitmap::BitVec(BitVec::EMPTY)
    }

    pub fn empty(codec: BitmapCodec) -> Self {
        match codec {
            BitmapCodec::Roaring => Self::new_roaring(),
            BitmapCodec::BitVec => Self::new_bitvec(),
        }
    }

    pub fn from_rows(rows: impl IntoIterator<Item = u32>, codec: BitmapCodec) -> Self {
        let mut bitmap = Self::empty(codec);
        for row in rows {
            bitmap.insert(row);
        }
        bitmap
    }

    pub fn codec(&self) -> BitmapCodec {
        match self {
            Bitmap::Roaring(_) => BitmapCodec::Roaring,
            Bitmap::BitVec(_) => BitmapCodec::BitVec,
        }
    }

    pub fn insert(&mut self, row: u32) {
        match self {
            Bitmap::Roaring(bitmap) => {
                bitmap.insert(row);
            }
            Bitmap::BitVec(bits) => {
                let row = row as usize;
                if bits.len() <= row {
                    bits.resize(row + 1, false);
                }
                bits.set(row, true);
            }
        }
    }

    pub fn contains(&self, row: u32) -> bool {
        match self {
            Bitmap::Roaring(bitmap) => bitmap.contains(row),
            Bitmap::BitVec(bits) => bits.get(row as usize).map(|b| *b).unwrap_or(false),
        }
    }

    pub fn count_ones(&self) -> usize {
        match self {
            Bitmap::Roaring(bitmap) => bitmap.len() as usize,
            Bitmap::BitVec(bits) => bits.count_ones(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count_ones() == 0
    }

    /// Iterates the rows of this bitmap in ascending order.
    pub fn iter_ones(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            Bitmap::Roaring(bitmap) => Box::new(bitmap.iter()),
            Bitmap::BitVec(bits) => Box::new(bits.iter_ones().map(|i| i as u32)),
        }
    }

    /// Adds every row of `other` to this bitmap.
    pub fn union(&mut self, other: Bitmap) {
        match (self, other) {
            (Bitmap::Roaring(this), Bitmap::Roaring(other)) => *this |= other,
            (this, other) => {
                for row in other.iter_ones() {
                    this.insert(row);
                }
            }
        }
    }

    /// Keeps only the rows also in `other`.
    pub fn intersect(&mut self, other: Bitmap) {
        match (self, other) {
            (Bitmap::Roaring(this), Bitmap::Roaring(other)) => *this &= other,
            (Bitmap::BitVec(this), other) => {
                for row in this.iter_ones().collect::<Vec<_>>() {
                    if !other.contains(row as u32) {
                        this.set(row, false);
                    }
                }
            }
            (Bitmap::Roaring(this), other) => {
                let missing = this
                    .iter()
                    .filter(|row| !other.contains(*row))
                    .collect::<Vec<_>>();
                for row in missing {
                    this.remove(row);
                }
            }
        }
    }

    /// Rows in `0..row_count` not in this bitmap.
    pub fn complement(&self, row_count: u32) -> Bitmap {
        match self {
            Bitmap::Roaring(bitmap) => {
                let mut all = RoaringBitmap::new();
                all.insert_range(0..row_count);
                all -= bitmap;
                Bitmap::Roaring(all)
            }
            Bitmap::BitVec(bits) => {
                let mut complement = BitVec::repeat(true, row_count as usize);
                for row in bits.iter_ones().take_while(|row| *row < row_count as usize) {
                    complement.set(row, false);
                }
                Bitmap::BitVec(complement)
            }
        }
    }

    pub fn serialized_size(&self) -> usize {
        match self {
            Bitmap::Roaring(bitmap) => bitmap.serialized_size(),
            Bitmap::BitVec(bits) => bits.as_raw_slice().len(),
        }
    }

    pub fn serialize_into(&self, buf: &mut Vec<u8>) -> Result<()> {
        match self {
            Bitmap::Roaring(bitmap) => bitmap.serialize_into(buf).context(EncodeBitmapSnafu)?,
            Bitmap::BitVec(bits) => buf.extend_from_slice(bits.as_raw_slice()),
        }
        Ok(())
    }

    pub fn deserialize(bytes: &[u8], codec: BitmapCodec) -> Result<Bitmap> {
        match codec {
            BitmapCodec::Roaring => {
                let bitmap = RoaringBitmap::deserialize_from(io::Cursor::new(bytes))
                    .context(DecodeBitmapSnafu)?;
                Ok(Bitmap::Roaring(bitmap))
            }
            BitmapCodec::BitVec => Ok(Bitmap::BitVec(BitVec::from_slice(bytes))),
        }
    }
}

impl PartialEq for Bitmap {
    fn eq(&self, other: &Self) -> bool {
        self.count_ones() == other.count_ones() && self.iter_ones().eq(other.iter_ones())
    }
}

impl Eq for Bitmap {}
