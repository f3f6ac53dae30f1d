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

use proptest::prelude::*;
use zirun::records::{merge_bundles, RECORD_WIRE_SIZE};
use zirun::{ZiChannelInput, ZiRawEvent, ZiRecord, ZiRecordsBuilder, ZiRecordsBundle};

fn event(timestamp: i64, partition: i32, samples: Vec<i64>) -> ZiRawEvent {
    let mut event = ZiRawEvent::new(timestamp, samples);
    event.partition = Some(partition);
    event
}

#[test]
fn test_records_are_globally_ordered() {
    let channels = vec![
        ZiChannelInput::new(1, vec![event(30, 0, vec![1]), event(10, 0, vec![2, 2])]),
        ZiChannelInput::new(0, vec![event(10, 0, vec![3]), event(20, 1, vec![])]),
        ZiChannelInput::new(2, vec![event(10, 0, vec![4, 4, 4]), event(20, 0, vec![5])]),
    ];
    let bundle = ZiRecordsBuilder::new().build(&channels).unwrap();

    let keys: Vec<(i64, i32, i16)> = bundle.records().iter().map(ZiRecord::sort_key).collect();
    assert_eq!(
        keys,
        vec![(10, 0, 0), (10, 0, 1), (10, 0, 2), (20, 0, 2), (20, 1, 0), (30, 0, 1)]
    );
    for (index, record) in bundle.records().iter().enumerate() {
        assert_eq!(record.event_id, index as i64);
    }
}

#[test]
fn test_pool_reconstructs_every_waveform() {
    let channels = vec![
        ZiChannelInput::new(0, vec![event(5, 0, vec![7, 8, 9]), event(1, 0, vec![1])]),
        ZiChannelInput::new(1, vec![event(3, 0, vec![4, 5])]),
    ];
    let bundle = ZiRecordsBuilder::new().build(&channels).unwrap();

    assert_eq!(bundle.pool().len(), 6);
    assert_eq!(bundle.pool().as_slice(), &[1, 4, 5, 7, 8, 9]);
    assert_eq!(bundle.waveform(0), Some(&[1i16][..]));
    assert_eq!(bundle.waveform(1), Some(&[4i16, 5][..]));
    assert_eq!(bundle.waveform(2), Some(&[7i16, 8, 9][..]));
    assert_eq!(bundle.records()[2].offset, 3);
    assert_eq!(bundle.waveform(3), None);
}

#[test]
fn test_samples_saturate_to_pool_range() {
    let bundle = ZiRecordsBuilder::new()
        .build(&[ZiChannelInput::new(0, vec![event(0, 0, vec![40_000, -40_000, 12])])])
        .unwrap();
    assert_eq!(bundle.waveform(0), Some(&[i16::MAX, i16::MIN, 12][..]));
}

#[test]
fn test_sample_interval_fallbacks() {
    let mut explicit = event(2, 0, vec![1]);
    explicit.sample_interval = Some(2);
    let mut channel = ZiChannelInput::new(0, vec![event(1, 0, vec![1]), explicit]);
    channel.sample_interval = Some(4);
    let other = ZiChannelInput::new(1, vec![event(3, 0, vec![1])]);

    let bundle = ZiRecordsBuilder::new()
        .sample_interval(10)
        .build(&[channel, other])
        .unwrap();
    let intervals: Vec<i32> = bundle.records().iter().map(|r| r.sample_interval).collect();
    assert_eq!(intervals, vec![4, 2, 10]);
}

#[test]
fn test_empty_input_builds_empty_bundle() {
    let bundle = ZiRecordsBuilder::new().build(&[]).unwrap();
    assert!(bundle.is_empty());
    assert!(bundle.pool().is_empty());
    assert_eq!(ZiRecordsBundle::from_bytes(&bundle.to_bytes()).unwrap(), bundle);
}

#[test]
fn test_wire_format_is_fixed_width() {
    let bundle = ZiRecordsBuilder::new()
        .build(&[ZiChannelInput::new(0, vec![event(1, 0, vec![1, 2]), event(2, 0, vec![3])])])
        .unwrap();
    let bytes = bundle.to_bytes();
    assert_eq!(bytes.len(), 22 + 2 * RECORD_WIRE_SIZE + 3 * 2);
    assert_eq!(ZiRecordsBundle::from_bytes(&bytes).unwrap(), bundle);
    assert!(ZiRecordsBundle::from_bytes(&bytes[..bytes.len() - 1]).is_err());
}

#[test]
fn test_bundle_rejects_dangling_offsets() {
    let record = ZiRecord {
        offset: 2,
        sample_count: 3,
        ..ZiRecord::default()
    };
    let mut pool = zirun::ZiSamplePool::default();
    pool.push_slice(&[1, 2, 3, 4]);
    assert!(ZiRecordsBundle::new(vec![record], pool).is_err());
}

#[test]
fn test_merge_of_single_shard_is_identity() {
    let bundle = ZiRecordsBuilder::new()
        .build(&[ZiChannelInput::new(0, vec![event(2, 0, vec![1]), event(1, 0, vec![2, 3])])])
        .unwrap();
    assert_eq!(merge_bundles(vec![bundle.clone()]), bundle);
}

fn raw_event() -> impl Strategy<Value = ZiRawEvent> {
    (
        0i64..40,
        0i32..2,
        prop::collection::vec(-40_000i64..40_000, 0..5),
    )
        .prop_map(|(timestamp, partition, samples)| event(timestamp, partition, samples))
}

fn channels() -> impl Strategy<Value = Vec<ZiChannelInput>> {
    prop::collection::vec(
        (0i16..4, prop::collection::vec(raw_event(), 0..24)),
        1..4,
    )
    .prop_map(|channels| {
        channels
            .into_iter()
            .map(|(channel, events)| ZiChannelInput::new(channel, events))
            .collect()
    })
}

proptest! {
    #[test]
    fn test_sharded_build_matches_single_pass(channels in channels()) {
        let builder = ZiRecordsBuilder::new();
        let expected = builder.build_single(&channels).unwrap();
        let rows = channels.iter().map(|c| c.events.len()).max().unwrap_or(0);

        for part_size in [1, rows / 4, rows / 2, rows + 1] {
            let sharded = builder.build_sharded(&channels, part_size.max(1)).unwrap();
            prop_assert_eq!(&sharded, &expected);
        }
    }
}
