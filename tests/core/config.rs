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

use serde_json::json;
use zirun::config::{ZiConfigResolver, ZiConfigStore};
use zirun::{
    ZiAlias, ZiCompatRegistry, ZiConfigValue, ZiError, ZiOption, ZiOptionType, ZiProvenance,
    ZiVersion, ZiVersionReq,
};

fn resolve(store: &ZiConfigStore, options: &[ZiOption]) -> zirun::Result<zirun::ZiResolvedConfig> {
    let compat = ZiCompatRegistry::new();
    let version = ZiVersion::new(1, 0, 0);
    ZiConfigResolver::new(store, &compat, &version).resolve("peaks", options)
}

#[test]
fn test_option_coercion() {
    let threshold = ZiOption::new("threshold", 1.5);
    assert_eq!(
        threshold.validate("peaks", &ZiConfigValue::Int(2)).unwrap(),
        ZiConfigValue::Float(2.0)
    );

    let count = ZiOption::new("count", 3i64);
    assert_eq!(
        count.validate("peaks", &ZiConfigValue::from(" 7 ")).unwrap(),
        ZiConfigValue::Int(7)
    );
    assert_eq!(
        count.validate("peaks", &ZiConfigValue::Float(4.0)).unwrap(),
        ZiConfigValue::Int(4)
    );
    assert!(count.validate("peaks", &ZiConfigValue::Float(4.5)).is_err());

    let enabled = ZiOption::new("enabled", false);
    assert_eq!(
        enabled.validate("peaks", &ZiConfigValue::from("yes")).unwrap(),
        ZiConfigValue::Bool(true)
    );
    assert!(enabled.validate("peaks", &ZiConfigValue::from("maybe")).is_err());
}

#[test]
fn test_option_validator_rejects_values() {
    let window = ZiOption::new("window", 10i64).validator("must be positive", |value| {
        value.as_i64().map_or(false, |v| v > 0)
    });
    assert!(window.validate("peaks", &ZiConfigValue::Int(5)).is_ok());

    let err = window.validate("peaks", &ZiConfigValue::Int(-1)).unwrap_err();
    match err {
        ZiError::ConfigValidation { plugin, option, message } => {
            assert_eq!(plugin, "peaks");
            assert_eq!(option, "window");
            assert!(message.contains("must be positive"));
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn test_malformed_option_declarations() {
    assert!(ZiOption::new("threshold", 1i64).check_well_formed("peaks").is_ok());
    assert!(ZiOption::new("", 1i64).check_well_formed("peaks").is_err());
    assert!(ZiOption::new("bad name", 1i64).check_well_formed("peaks").is_err());
}

#[test]
fn test_required_option_needs_a_value() {
    let options = vec![ZiOption::required("gain", ZiOptionType::Float)];
    let store = ZiConfigStore::new();
    assert!(matches!(
        resolve(&store, &options),
        Err(ZiError::ConfigValidation { .. })
    ));

    let mut store = ZiConfigStore::new();
    store.apply(&json!({"peaks.gain": 2})).unwrap();
    let config = resolve(&store, &options).unwrap();
    assert_eq!(config.get_f64("gain").unwrap(), 2.0);
    assert_eq!(config.provenance("gain"), Some(ZiProvenance::Explicit));
}

#[test]
fn test_precedence_and_provenance() {
    let options = vec![
        ZiOption::new("threshold", 10i64),
        ZiOption::new("window", 4i64),
        ZiOption::new("label", "peaks").untracked(),
    ];
    let mut store = ZiConfigStore::new();
    store
        .apply(&json!({
            "threshold": 1,
            "window": 8,
            "label": "global",
            "peaks.threshold": 2,
            "hits": {"threshold": 99},
        }))
        .unwrap();

    let config = resolve(&store, &options).unwrap();
    assert_eq!(config.get_i64("threshold").unwrap(), 2);
    assert_eq!(config.get_i64("window").unwrap(), 8);
    assert_eq!(config.get_str("label").unwrap(), "global");

    let lineage = config.lineage_values();
    assert_eq!(lineage.len(), 2);
    assert!(!lineage.contains_key("label"));

    store.apply(&json!({"peaks": {"threshold": 3}})).unwrap();
    assert_eq!(resolve(&store, &options).unwrap().get_i64("threshold").unwrap(), 3);
}

#[test]
fn test_defaults_do_not_feed_lineage() {
    let options = vec![ZiOption::new("threshold", 10i64)];
    let config = resolve(&ZiConfigStore::new(), &options).unwrap();
    assert_eq!(config.get_i64("threshold").unwrap(), 10);
    assert_eq!(config.provenance("threshold"), Some(ZiProvenance::PluginDefault));
    assert!(config.lineage_values().is_empty());
    assert!(config.get("missing").is_err());
}

#[test]
fn test_alias_lifecycle() {
    let mut compat = ZiCompatRegistry::new();
    compat
        .register_global(
            ZiAlias::new("thresh", "threshold")
                .deprecated_in("1.1")
                .removed_in("3.0"),
        )
        .unwrap();

    let before = ZiVersion::parse("2.9.9").unwrap();
    assert_eq!(compat.canonicalize("peaks", "thresh", &before).unwrap(), "threshold");

    let after = ZiVersion::parse("3.0").unwrap();
    match compat.canonicalize("peaks", "thresh", &after) {
        Err(ZiError::DeprecationRejected { alias, canonical, removed_in }) => {
            assert_eq!(alias, "thresh");
            assert_eq!(canonical, "threshold");
            assert_eq!(removed_in, "3.0");
        }
        other => panic!("expected rejection, got {other:?}"),
    }

    assert!(compat
        .register_global(ZiAlias::new("broken", "threshold").removed_in("soon"))
        .is_err());
}

#[test]
fn test_alias_resolves_through_resolver() {
    let options = vec![ZiOption::new("threshold", 10i64)];
    let mut store = ZiConfigStore::new();
    store.apply(&json!({"peaks": {"thresh": 6}})).unwrap();
    let mut compat = ZiCompatRegistry::new();
    compat
        .register_for_plugin("peaks", ZiAlias::new("thresh", "threshold"))
        .unwrap();
    let version = ZiVersion::new(1, 0, 0);

    let config = ZiConfigResolver::new(&store, &compat, &version)
        .resolve("peaks", &options)
        .unwrap();
    assert_eq!(config.get_i64("threshold").unwrap(), 6);
    assert_eq!(config.provenance("threshold"), Some(ZiProvenance::Explicit));
}

#[test]
fn test_nested_values_are_rejected() {
    let mut store = ZiConfigStore::new();
    assert!(store.apply(&json!({"peaks": {"window": {"size": 3}}})).is_err());
    assert!(store.set("peaks.", &json!(1)).is_err());
}

#[test]
fn test_version_requirements() {
    let version = ZiVersion::parse("1.4.2").unwrap();
    assert!(ZiVersionReq::parse(">=1.2").unwrap().matches(&version));
    assert!(!ZiVersionReq::parse("<1.4").unwrap().matches(&version));
    assert!(ZiVersionReq::parse("*").unwrap().matches(&version));
    assert!(ZiVersion::parse("1.x").is_err());
    assert!(ZiVersion::parse("2.0").unwrap() > version);
}
