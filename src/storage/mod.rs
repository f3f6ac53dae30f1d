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

//! # Zirun Storage Module
//!
//! - [`key`]: lineage keys (40 lowercase hex characters)
//! - [`backend`]: byte-level [`ZiStorage`] backends (files, memory)
//! - [`codec`]: part envelopes and payload encodings
//! - [`watch`]: file fingerprints that invalidate stale artifacts
//! - [`artifact`]: commit-marker based artifact persistence

pub mod artifact;
pub mod backend;
pub mod codec;
pub mod key;
pub mod watch;

pub use artifact::{ZiArtifactHeader, ZiArtifactLayout, ZiArtifactMeta, ZiArtifactStore};
pub use backend::{ZiFileStorage, ZiMemoryStorage, ZiStorage};
pub use key::{lineage_key, ZiLineageKey, KEY_HEX_LEN};
pub use watch::{ZiWatchSignature, ZiWatchedFile};
