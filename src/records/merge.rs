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

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::records::record::{ZiRecordsBundle, ZiSamplePool};

/// Heap entry: sort key, then shard and row for a total, stable order.
type ZiMergeKey = Reverse<(i64, i32, i16, usize, usize)>;

/// K-way merge of individually sorted bundles.
///
/// Offsets are re-based into one destination pool and event ids are
/// reassigned contiguously. Shards must each be sorted already.
pub fn merge_bundles(shards: Vec<ZiRecordsBundle>) -> ZiRecordsBundle {
    let total_records: usize = shards.iter().map(ZiRecordsBundle::len).sum();
    let total_samples: usize = shards.iter().map(|s| s.pool().len()).sum();

    let mut heap: BinaryHeap<ZiMergeKey> = BinaryHeap::with_capacity(shards.len());
    for (shard_index, shard) in shards.iter().enumerate() {
        if let Some(first) = shard.records().first() {
            let (ts, partition, channel) = first.sort_key();
            heap.push(Reverse((ts, partition, channel, shard_index, 0)));
        }
    }

    let mut records = Vec::with_capacity(total_records);
    let mut pool = ZiSamplePool::with_capacity(total_samples);
    while let Some(Reverse((_, _, _, shard_index, row))) = heap.pop() {
        let shard = &shards[shard_index];
        let mut record = shard.records()[row];
        let waveform = shard.waveform(row).unwrap_or(&[]);
        record.offset = pool.push_slice(waveform);
        record.event_id = records.len() as i64;
        records.push(record);

        if let Some(next) = shard.records().get(row + 1) {
            let (ts, partition, channel) = next.sort_key();
            heap.push(Reverse((ts, partition, channel, shard_index, row + 1)));
        }
    }

    log::debug!(
        "records.merge: shards merged - shards={}, records={}, samples={}",
        shards.len(),
        records.len(),
        pool.len()
    );
    ZiRecordsBundle::from_parts_unchecked(records, pool)
}
