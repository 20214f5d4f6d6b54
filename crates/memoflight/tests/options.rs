// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(feature = "serde")]

//! Tests for loading `CacheOptions` from configuration.

use std::time::Duration;

use memoflight::{Cache, CacheOptions, DEFAULT_COLLECTION_INTERVAL};
use tick::Clock;

#[test]
fn defaults_apply_to_missing_fields() {
    let options: CacheOptions = serde_json::from_str("{}").expect("valid json");

    assert_eq!(options, CacheOptions::default());
    assert_eq!(options.ttl, Duration::ZERO);
    assert_eq!(options.grace, Duration::ZERO);
    assert_eq!(options.collection_interval, DEFAULT_COLLECTION_INTERVAL);
}

#[test]
fn fractional_seconds_are_supported() {
    let options: CacheOptions =
        serde_json::from_str(r#"{ "ttl": 1.5, "grace": 2, "collection_interval": 0.25 }"#).expect("valid json");

    assert_eq!(options.ttl, Duration::from_millis(1500));
    assert_eq!(options.grace, Duration::from_secs(2));
    assert_eq!(options.collection_interval, Duration::from_millis(250));
}

#[test]
fn negative_durations_are_rejected() {
    let result = serde_json::from_str::<CacheOptions>(r#"{ "ttl": -1 }"#);

    assert!(result.is_err());
}

#[test]
fn serializes_as_seconds() {
    let options = CacheOptions::new()
        .with_ttl(Duration::from_secs(30))
        .with_grace(Duration::from_millis(500));

    let value = serde_json::to_value(options).expect("serializable");

    assert_eq!(value["ttl"], 30.0);
    assert_eq!(value["grace"], 0.5);
    assert_eq!(value["collection_interval"], 60.0);
}

#[test]
fn loaded_options_configure_cache() {
    let options: CacheOptions = serde_json::from_str(r#"{ "ttl": 60, "grace": 30 }"#).expect("valid json");

    let cache = Cache::builder::<String, String>(Clock::new_frozen()).options(options).build();

    assert_eq!(*cache.options(), options);
}
