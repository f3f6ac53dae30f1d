//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Zirun.
//! The Zirun project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ZiError};

/// Integer type of the sample pool.
pub type ZiSample = i16;

/// Size of one record in the wire format.
pub const RECORD_WIRE_SIZE: usize = 60;

const BUNDLE_MAGIC: &[u8; 4] = b"ZIRB";
const BUNDLE_FORMAT_VERSION: u16 = 1;
const BUNDLE_HEADER_SIZE: usize = 4 + 2 + 8 + 8;

/// One fixed-width row of the event index.
///
/// Field order matches the wire format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZiRecord {
    /// Picoseconds.
    pub timestamp: i64,
    pub partition: i32,
    pub channel: i16,
    pub baseline: f64,
    /// Equal to the row's position in its bundle.
    pub event_id: i64,
    /// Nanoseconds.
    pub sample_interval: i32,
    pub trigger_type: i16,
    pub flags: u32,
    /// Start of this record's waveform in the sample pool.
    pub offset: i64,
    pub sample_count: i32,
    /// Nanoseconds.
    pub system_time: i64,
}

impl ZiRecord {
    /// Ordering key of the event index.
    pub fn sort_key(&self) -> (i64, i32, i16) {
        (self.timestamp, self.partition, self.channel)
    }

    pub fn write_le(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.partition.to_le_bytes());
        out.extend_from_slice(&self.channel.to_le_bytes());
        out.extend_from_slice(&self.baseline.to_le_bytes());
        out.extend_from_slice(&self.event_id.to_le_bytes());
        out.extend_from_slice(&self.sample_interval.to_le_bytes());
        out.extend_from_slice(&self.trigger_type.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.sample_count.to_le_bytes());
        out.extend_from_slice(&self.system_time.to_le_bytes());
    }

    pub fn read_le(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < RECORD_WIRE_SIZE {
            return Err(ZiError::validation(format!(
                "record needs {RECORD_WIRE_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let mut reader = ZiLeReader::new(bytes);
        Ok(ZiRecord {
            timestamp: i64::from_le_bytes(reader.take()?),
            partition: i32::from_le_bytes(reader.take()?),
            channel: i16::from_le_bytes(reader.take()?),
            baseline: f64::from_le_bytes(reader.take()?),
            event_id: i64::from_le_bytes(reader.take()?),
            sample_interval: i32::from_le_bytes(reader.take()?),
            trigger_type: i16::from_le_bytes(reader.take()?),
            flags: u32::from_le_bytes(reader.take()?),
            offset: i64::from_le_bytes(reader.take()?),
            sample_count: i32::from_le_bytes(reader.take()?),
            system_time: i64::from_le_bytes(reader.take()?),
        })
    }
}

/// Cursor over a little-endian payload.
pub(crate) struct ZiLeReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> ZiLeReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        ZiLeReader { bytes, cursor: 0 }
    }

    pub(crate) fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.cursor + N;
        let slice = self
            .bytes
            .get(self.cursor..end)
            .ok_or_else(|| ZiError::validation("unexpected end of payload"))?;
        self.cursor = end;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub(crate) fn take_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .cursor
            .checked_add(len)
            .ok_or_else(|| ZiError::validation("payload length overflows"))?;
        let slice = self
            .bytes
            .get(self.cursor..end)
            .ok_or_else(|| ZiError::validation("unexpected end of payload"))?;
        self.cursor = end;
        Ok(slice)
    }

    pub(crate) fn finish(&self) -> Result<()> {
        if self.cursor != self.bytes.len() {
            return Err(ZiError::validation(format!(
                "{} trailing bytes after payload",
                self.bytes.len() - self.cursor
            )));
        }
        Ok(())
    }
}

/// Flat buffer holding every waveform of a bundle back to back.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZiSamplePool {
    samples: Vec<ZiSample>,
}

impl ZiSamplePool {
    pub fn with_capacity(capacity: usize) -> Self {
        ZiSamplePool {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Appends `values`, clamping each to the sample range, and returns the
    /// offset they were written at.
    pub fn push_saturating(&mut self, values: &[i64]) -> i64 {
        let offset = self.samples.len() as i64;
        self.samples.extend(
            values
                .iter()
                .map(|v| (*v).clamp(ZiSample::MIN as i64, ZiSample::MAX as i64) as ZiSample),
        );
        offset
    }

    /// Appends samples that are already in range.
    pub fn push_slice(&mut self, values: &[ZiSample]) -> i64 {
        let offset = self.samples.len() as i64;
        self.samples.extend_from_slice(values);
        offset
    }

    pub fn slice(&self, offset: i64, count: i32) -> Option<&[ZiSample]> {
        let start = usize::try_from(offset).ok()?;
        let len = usize::try_from(count).ok()?;
        self.samples.get(start..start.checked_add(len)?)
    }

    pub fn as_slice(&self) -> &[ZiSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Event index plus the sample pool it points into.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZiRecordsBundle {
    records: Vec<ZiRecord>,
    pool: ZiSamplePool,
}

impl ZiRecordsBundle {
    /// Assembles a bundle, checking that every record points inside the pool.
    pub fn new(records: Vec<ZiRecord>, pool: ZiSamplePool) -> Result<Self> {
        for (index, record) in records.iter().enumerate() {
            if pool.slice(record.offset, record.sample_count).is_none() {
                return Err(ZiError::validation(format!(
                    "record {index} points outside the sample pool (offset={}, count={}, pool={})",
                    record.offset,
                    record.sample_count,
                    pool.len()
                )));
            }
        }
        Ok(ZiRecordsBundle { records, pool })
    }

    pub(crate) fn from_parts_unchecked(records: Vec<ZiRecord>, pool: ZiSamplePool) -> Self {
        ZiRecordsBundle { records, pool }
    }

    pub fn records(&self) -> &[ZiRecord] {
        &self.records
    }

    pub fn pool(&self) -> &ZiSamplePool {
        &self.pool
    }

    /// Waveform of the record at `index`.
    pub fn waveform(&self, index: usize) -> Option<&[ZiSample]> {
        let record = self.records.get(index)?;
        self.pool.slice(record.offset, record.sample_count)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.records.len() * RECORD_WIRE_SIZE + self.pool.len() * std::mem::size_of::<ZiSample>()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BUNDLE_HEADER_SIZE + self.size_bytes());
        out.extend_from_slice(BUNDLE_MAGIC);
        out.extend_from_slice(&BUNDLE_FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.records.len() as u64).to_le_bytes());
        out.extend_from_slice(&(self.pool.len() as u64).to_le_bytes());
        for record in &self.records {
            record.write_le(&mut out);
        }
        for sample in self.pool.as_slice() {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = ZiLeReader::new(bytes);
        if &reader.take::<4>()? != BUNDLE_MAGIC {
            return Err(ZiError::validation("records payload has a bad magic header"));
        }
        let format = u16::from_le_bytes(reader.take()?);
        if format != BUNDLE_FORMAT_VERSION {
            return Err(ZiError::validation(format!(
                "unsupported records format version {format}"
            )));
        }
        let record_count = u64::from_le_bytes(reader.take()?) as usize;
        let sample_count = u64::from_le_bytes(reader.take()?) as usize;

        let expected = record_count
            .checked_mul(RECORD_WIRE_SIZE)
            .and_then(|r| sample_count.checked_mul(2).and_then(|s| r.checked_add(s)))
            .and_then(|body| body.checked_add(BUNDLE_HEADER_SIZE))
            .ok_or_else(|| ZiError::validation("records payload sizes overflow"))?;
        if bytes.len() != expected {
            return Err(ZiError::validation(format!(
                "records payload is {} bytes, header implies {expected}",
                bytes.len()
            )));
        }

        let body = &bytes[BUNDLE_HEADER_SIZE..];
        let (record_bytes, sample_bytes) = body.split_at(record_count * RECORD_WIRE_SIZE);
        let records = record_bytes
            .chunks_exact(RECORD_WIRE_SIZE)
            .map(ZiRecord::read_le)
            .collect::<Result<Vec<_>>>()?;
        let samples = sample_bytes
            .chunks_exact(2)
            .map(|pair| ZiSample::from_le_bytes([pair[0], pair[1]]))
            .collect();

        ZiRecordsBundle::new(records, ZiSamplePool { samples })
    }
}
