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

//! # Zirun Config Module
//!
//! Plugin configuration moves through three stages:
//!
//! 1. **Explicit input** ([`store::ZiConfigStore`]): untyped JSON set by the
//!    caller as global keys, dotted `plugin.option` keys or nested
//!    per-plugin namespaces.
//! 2. **Canonicalisation** ([`compat::ZiCompatRegistry`]): deprecated option
//!    aliases are mapped to their canonical names, or rejected once the
//!    engine version reaches their removal version.
//! 3. **Resolution** ([`resolver::ZiConfigResolver`]): every declared
//!    [`option::ZiOption`] receives a typed [`value::ZiConfigValue`] tagged
//!    with where it came from.
//!
//! Only tracked values that were supplied explicitly or inferred from the
//! instrument adapter take part in lineage hashing.

pub mod compat;
pub mod option;
pub mod resolver;
pub mod store;
pub mod value;

pub use compat::{ZiAlias, ZiCompatRegistry};
pub use option::{ZiOption, ZiOptionType};
pub use resolver::{ZiConfigResolver, ZiProvenance, ZiResolvedConfig, ZiResolvedEntry};
pub use store::ZiConfigStore;
pub use value::ZiConfigValue;
