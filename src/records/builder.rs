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

//! Construction of records bundles from per-channel acquisitions.
//!
//! A build concatenates every channel's rows, fills each field from the
//! explicit value or its fallback, sorts rows by
//! `(timestamp, partition, channel)` with the input position as final
//! tie-break, numbers them, and copies their waveforms into one pool.
//!
//! Fallbacks when a field is not supplied:
//!
//! | field | fallback |
//! |---|---|
//! | partition | `0` |
//! | baseline | `0.0` |
//! | sample interval | channel default, then builder default |
//! | trigger type | `0` |
//! | flags | `0` |
//! | sample count | waveform length |
//! | system time | timestamp converted from ps to ns |
//!
//! Large inputs can be built in shards of bounded size and merged; the
//! result is identical to a single-pass build.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::errors::{Result, ZiError};
use crate::records::merge::merge_bundles;
use crate::records::record::{ZiRecord, ZiRecordsBundle, ZiSamplePool};

/// One acquired event before it enters the index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ZiRawEvent {
    /// Picoseconds.
    pub timestamp: i64,
    pub partition: Option<i32>,
    pub baseline: Option<f64>,
    pub sample_interval: Option<i32>,
    pub trigger_type: Option<i16>,
    pub flags: Option<u32>,
    /// Explicit waveform length; must not exceed `samples.len()`.
    pub sample_count: Option<i32>,
    pub system_time: Option<i64>,
    pub samples: Vec<i64>,
}

impl ZiRawEvent {
    pub fn new(timestamp: i64, samples: Vec<i64>) -> Self {
        ZiRawEvent {
            timestamp,
            samples,
            ..ZiRawEvent::default()
        }
    }
}

/// Rows acquired on one channel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ZiChannelInput {
    pub channel: i16,
    pub sample_interval: Option<i32>,
    pub events: Vec<ZiRawEvent>,
}

impl ZiChannelInput {
    pub fn new(channel: i16, events: Vec<ZiRawEvent>) -> Self {
        ZiChannelInput {
            channel,
            sample_interval: None,
            events,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ZiRecordsBuilder {
    default_sample_interval: i32,
    part_size: Option<usize>,
}

impl Default for ZiRecordsBuilder {
    fn default() -> Self {
        ZiRecordsBuilder {
            default_sample_interval: 1,
            part_size: None,
        }
    }
}

impl ZiRecordsBuilder {
    pub fn new() -> Self {
        ZiRecordsBuilder::default()
    }

    pub fn sample_interval(mut self, interval_ns: i32) -> Self {
        self.default_sample_interval = interval_ns;
        self
    }

    /// Maximum rows per shard; inputs with larger channels are sharded.
    pub fn part_size(mut self, rows: usize) -> Self {
        self.part_size = Some(rows);
        self
    }

    pub fn build(&self, channels: &[ZiChannelInput]) -> Result<ZiRecordsBundle> {
        match self.part_size {
            Some(part_size) if channels.iter().any(|c| c.events.len() > part_size) => {
                self.build_sharded(channels, part_size)
            }
            _ => self.build_single(channels),
        }
    }

    /// Builds the whole input in one pass.
    pub fn build_single(&self, channels: &[ZiChannelInput]) -> Result<ZiRecordsBundle> {
        let mut rows = Vec::with_capacity(channels.iter().map(|c| c.events.len()).sum());
        for channel in channels {
            for event in &channel.events {
                rows.push((self.fill(channel, event)?, event.samples.as_slice()));
            }
        }

        let mut order: Vec<usize> = (0..rows.len()).collect();
        order.sort_by_key(|&index| (rows[index].0.sort_key(), index));

        let total_samples: usize = rows.iter().map(|(r, _)| r.sample_count as usize).sum();
        let mut pool = ZiSamplePool::with_capacity(total_samples);
        let mut records = Vec::with_capacity(rows.len());
        for (event_id, index) in order.into_iter().enumerate() {
            let (mut record, samples) = rows[index];
            record.event_id = event_id as i64;
            record.offset = pool.push_saturating(&samples[..record.sample_count as usize]);
            records.push(record);
        }

        log::debug!(
            "records.build: bundle built - records={}, samples={}",
            records.len(),
            pool.len()
        );
        Ok(ZiRecordsBundle::from_parts_unchecked(records, pool))
    }

    /// Builds bounded shards independently and merges them.
    pub fn build_sharded(
        &self,
        channels: &[ZiChannelInput],
        part_size: usize,
    ) -> Result<ZiRecordsBundle> {
        if part_size == 0 {
            return Err(ZiError::validation("part size must be at least one row"));
        }
        let shards = split_shards(channels, part_size);

        #[cfg(feature = "parallel")]
        let built = shards
            .par_iter()
            .map(|shard| self.build_single(std::slice::from_ref(shard)))
            .collect::<Result<Vec<_>>>()?;
        #[cfg(not(feature = "parallel"))]
        let built = shards
            .iter()
            .map(|shard| self.build_single(std::slice::from_ref(shard)))
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "records.build: shards built - shards={}, part_size={}",
            built.len(),
            part_size
        );
        Ok(merge_bundles(built))
    }

    fn fill(&self, channel: &ZiChannelInput, event: &ZiRawEvent) -> Result<ZiRecord> {
        let available = event.samples.len();
        let sample_count = match event.sample_count {
            Some(count) if count < 0 => {
                return Err(ZiError::validation(format!(
                    "channel {} event at {} has negative sample count {count}",
                    channel.channel, event.timestamp
                )))
            }
            Some(count) if count as usize > available => {
                return Err(ZiError::validation(format!(
                    "channel {} event at {} declares {count} samples but carries {available}",
                    channel.channel, event.timestamp
                )))
            }
            Some(count) => count,
            None => i32::try_from(available).map_err(|_| {
                ZiError::validation(format!(
                    "channel {} event at {} has too many samples",
                    channel.channel, event.timestamp
                ))
            })?,
        };

        Ok(ZiRecord {
            timestamp: event.timestamp,
            partition: event.partition.unwrap_or(0),
            channel: channel.channel,
            baseline: event.baseline.unwrap_or(0.0),
            event_id: 0,
            sample_interval: event
                .sample_interval
                .or(channel.sample_interval)
                .unwrap_or(self.default_sample_interval),
            trigger_type: event.trigger_type.unwrap_or(0),
            flags: event.flags.unwrap_or(0),
            offset: 0,
            sample_count,
            system_time: event.system_time.unwrap_or(event.timestamp / 1000),
        })
    }
}

/// Splits each channel into consecutive chunks of at most `part_size` rows,
/// channel by channel, preserving input order across shard indices.
fn split_shards(channels: &[ZiChannelInput], part_size: usize) -> Vec<ZiChannelInput> {
    let mut shards = Vec::new();
    for channel in channels {
        for chunk in channel.events.chunks(part_size) {
            shards.push(ZiChannelInput {
                channel: channel.channel,
                sample_interval: channel.sample_interval,
                events: chunk.to_vec(),
            });
        }
    }
    shards
}
