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

//! # Zirun Records Module
//!
//! Fixed-width event index plus contiguous sample pool.
//!
//! - [`record`]: row layout, sample pool, bundle and its wire format
//! - [`builder`]: single-pass and sharded construction from channel input
//! - [`merge`]: order-preserving k-way merge of sorted bundles

pub mod builder;
pub mod merge;
pub mod record;

pub use builder::{ZiChannelInput, ZiRawEvent, ZiRecordsBuilder};
pub use merge::merge_bundles;
pub use record::{ZiRecord, ZiRecordsBundle, ZiSample, ZiSamplePool, RECORD_WIRE_SIZE};
