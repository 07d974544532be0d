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

//! Binary layout of a persisted column.
//!
//! ```text
//! header       : u8 version, u8 flags, u8 logical type tag, u32 row count
//! string dict  : u32 count, (count + 1) u32 offsets, utf8 bytes
//! long dict    : u32 count, count i64
//! double dict  : u32 count, count f64
//! array dict   : u32 count, (count + 1) u32 offsets, u32 element ids
//! values       : u32 id per row, or (rows + 1) u32 offsets and structured rows
//! bitmaps      : u32 count, (count + 2) u32 offsets, bitmaps of ids 1..=count, null bitmap
//! fields       : u32 count, per field a path (inline or path array id) and u16 type bits
//! ```

pub(crate) mod reader;
pub(crate) mod structured;
pub mod writer;

use std::cmp::Ordering;
use std::marker::PhantomData;

use bytes::{Buf, BufMut};
use snafu::ensure;

use crate::config::ByteOrder;
use crate::error::{Result, TruncatedSnafu};

pub(crate) const FLAG_VALUE_BITMAPS: u8 = 0x01;
pub(crate) const FLAG_FIELDS: u8 = 0x02;
pub(crate) const FLAG_BIG_ENDIAN: u8 = 0x04;
pub(crate) const FLAG_BITVEC_CODEC: u8 = 0x08;
pub(crate) const KNOWN_FLAGS: u8 = 0x0F;

pub(crate) const HEADER_SIZE: usize = 7;

/// Field path stored as utf8.
pub(crate) const FIELD_PATH_INLINE: u8 = 0;
/// Field path stored as the id of its path array.
pub(crate) const FIELD_PATH_ARRAY: u8 = 1;

pub(crate) fn put_u16(buf: &mut Vec<u8>, value: u16, order: ByteOrder) {
    match order {
        ByteOrder::LittleEndian => buf.put_u16_le(value),
        ByteOrder::BigEndian => buf.put_u16(value),
    }
}

pub(crate) fn put_u32(buf: &mut Vec<u8>, value: u32, order: ByteOrder) {
    match order {
        ByteOrder::LittleEndian => buf.put_u32_le(value),
        ByteOrder::BigEndian => buf.put_u32(value),
    }
}

pub(crate) fn put_i64(buf: &mut Vec<u8>, value: i64, order: ByteOrder) {
    match order {
        ByteOrder::LittleEndian => buf.put_i64_le(value),
        ByteOrder::BigEndian => buf.put_i64(value),
    }
}

pub(crate) fn put_f64(buf: &mut Vec<u8>, value: f64, order: ByteOrder) {
    match order {
        ByteOrder::LittleEndian => buf.put_f64_le(value),
        ByteOrder::BigEndian => buf.put_f64(value),
    }
}

/// Fixed width values readable from column bytes.
pub(crate) trait FixedWidth: Copy {
    const WIDTH: usize;

    fn read(bytes: &[u8], order: ByteOrder) -> Self;
}

impl FixedWidth for u32 {
    const WIDTH: usize = 4;

    fn read(mut bytes: &[u8], order: ByteOrder) -> Self {
        match order {
            ByteOrder::LittleEndian => bytes.get_u32_le(),
            ByteOrder::BigEndian => bytes.get_u32(),
        }
    }
}

impl FixedWidth for i64 {
    const WIDTH: usize = 8;

    fn read(mut bytes: &[u8], order: ByteOrder) -> Self {
        match order {
            ByteOrder::LittleEndian => bytes.get_i64_le(),
            ByteOrder::BigEndian => bytes.get_i64(),
        }
    }
}

impl FixedWidth for f64 {
    const WIDTH: usize = 8;

    fn read(mut bytes: &[u8], order: ByteOrder) -> Self {
        match order {
            ByteOrder::LittleEndian => bytes.get_f64_le(),
            ByteOrder::BigEndian => bytes.get_f64(),
        }
    }
}

/// Zero copy view of a sequence of fixed width values.
#[derive(Debug)]
pub(crate) struct FixedSeq<'a, T> {
    bytes: &'a [u8],
    order: ByteOrder,
    _phantom: PhantomData<T>,
}

impl<T> Clone for FixedSeq<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FixedSeq<'_, T> {}

impl<'a, T: FixedWidth> FixedSeq<'a, T> {
    pub(crate) fn len(&self) -> usize {
        self.bytes.len() / T::WIDTH
    }

    /// Value at `index`. The index must be in bounds.
    pub(crate) fn get(&self, index: usize) -> T {
        let start = index * T::WIDTH;
        T::read(&self.bytes[start..start + T::WIDTH], self.order)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = T> + 'a {
        let order = self.order;
        self.bytes
            .chunks_exact(T::WIDTH)
            .map(move |chunk| T::read(chunk, order))
    }
}

/// Sequential reader over column bytes.
pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8], order: ByteOrder) -> Self {
        ByteReader { buf, pos: 0, order }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn read_bytes(&mut self, len: usize, section: &'static str) -> Result<&'a [u8]> {
        ensure!(
            len <= self.remaining(),
            TruncatedSnafu {
                section,
                needed: len,
                remaining: self.remaining(),
            }
        );
        let buf = self.buf;
        let bytes = &buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub(crate) fn read_u8(&mut self, section: &'static str) -> Result<u8> {
        Ok(self.read_bytes(1, section)?[0])
    }

    pub(crate) fn read_u16(&mut self, section: &'static str) -> Result<u16> {
        let mut bytes = self.read_bytes(2, section)?;
        Ok(match self.order {
            ByteOrder::LittleEndian => bytes.get_u16_le(),
            ByteOrder::BigEndian => bytes.get_u16(),
        })
    }

    pub(crate) fn read_u32(&mut self, section: &'static str) -> Result<u32> {
        let bytes = self.read_bytes(4, section)?;
        Ok(u32::read(bytes, self.order))
    }

    pub(crate) fn read_i64(&mut self, section: &'static str) -> Result<i64> {
        let bytes = self.read_bytes(8, section)?;
        Ok(i64::read(bytes, self.order))
    }

    pub(crate) fn read_f64(&mut self, section: &'static str) -> Result<f64> {
        let bytes = self.read_bytes(8, section)?;
        Ok(f64::read(bytes, self.order))
    }

    pub(crate) fn read_seq<T: FixedWidth>(
        &mut self,
        count: usize,
        section: &'static str,
    ) -> Result<FixedSeq<'a, T>> {
        let len = count.checked_mul(T::WIDTH).unwrap_or(usize::MAX);
        let bytes = self.read_bytes(len, section)?;
        Ok(FixedSeq {
            bytes,
            order: self.order,
            _phantom: PhantomData,
        })
    }
}

/// Binary search over `len` sorted positions, `f` compares the value at a
/// position with the target.
pub(crate) fn binary_search_by(len: usize, mut f: impl FnMut(usize) -> Ordering) -> Option<usize> {
    let (mut lo, mut hi) = (0, len);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match f(mid) {
            Ordering::Less => lo = mid + 1,
            Ordering::Greater => hi = mid,
            Ordering::Equal => return Some(mid),
        }
    }
    None
}
