//! Tests for `ReceiveConfig` validation.

use std::time::Duration;

use rstest::rstest;

use crate::{
    error::ConfigError,
    recv::{QueuePolicy, ReceiveConfig, ReceiveConfigBuilder, config},
};

#[test]
fn builder_defaults_match_the_default_config() {
    let built = ReceiveConfig::builder().build().expect("defaults are valid");
    assert_eq!(built, ReceiveConfig::default());
    assert_eq!(built.queue_capacity(), config::DEFAULT_QUEUE_CAPACITY);
    assert_eq!(built.queue_policy(), QueuePolicy::Block);
    assert_eq!(built.heap_timeout(), config::DEFAULT_HEAP_TIMEOUT);
}

#[rstest]
#[case::queue(ReceiveConfig::builder().queue_capacity(0), "queue capacity")]
#[case::heap_size(ReceiveConfig::builder().max_heap_size(0), "max heap size")]
#[case::in_flight(ReceiveConfig::builder().max_in_flight_bytes(0), "max in-flight bytes")]
#[case::live(ReceiveConfig::builder().max_live_heaps(0), "max live heaps")]
#[case::gap(ReceiveConfig::builder().max_packet_gap(0), "max packet gap")]
#[case::packet(ReceiveConfig::builder().max_packet_size(0), "max packet size")]
#[case::timeout(ReceiveConfig::builder().heap_timeout(Duration::ZERO), "heap timeout")]
fn zero_limits_are_rejected(#[case] builder: ReceiveConfigBuilder, #[case] name: &'static str) {
    assert_eq!(builder.build(), Err(ConfigError::Zero(name)));
}

#[test]
fn config_converts_back_into_a_builder() {
    let config = ReceiveConfig::builder()
        .queue_policy(QueuePolicy::DropNewest)
        .max_live_heaps(3)
        .build()
        .expect("valid configuration");
    let rebuilt = ReceiveConfigBuilder::from(config.clone())
        .build()
        .expect("round trip stays valid");
    assert_eq!(rebuilt, config);
}
