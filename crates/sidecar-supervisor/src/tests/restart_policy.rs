use crate::{RestartDecision, RestartPolicy};

use std::time::Duration;

use googletest::assert_that;
use googletest::prelude::eq;
use sidecar_config::{BackoffStrategy, ResilienceConfig};

const DELAY: Duration = Duration::from_millis(1000);

#[test]
fn given_count_within_budget_when_decide_then_retry_with_fixed_delay() {
    let policy = RestartPolicy::new(3, DELAY);

    for count in 1..=3 {
        assert_that!(policy.decide(count), eq(RestartDecision::Retry { delay: DELAY }));
    }
}

#[test]
fn given_third_failure_of_three_when_decide_then_retry() {
    // restartCount was 2, crash makes it 3, max is 3: one more spawn
    let policy = RestartPolicy::new(3, DELAY);

    assert_that!(policy.decide(3), eq(RestartDecision::Retry { delay: DELAY }));
}

#[test]
fn given_count_past_ceiling_when_decide_then_give_up() {
    // restartCount was already 3, crash makes it 4
    let policy = RestartPolicy::new(3, DELAY);

    assert_that!(policy.decide(4), eq(RestartDecision::GiveUp));
    assert_that!(policy.decide(u32::MAX), eq(RestartDecision::GiveUp));
}

#[test]
fn given_zero_max_restarts_when_first_failure_then_give_up() {
    let policy = RestartPolicy::new(0, DELAY);

    assert_that!(policy.decide(1), eq(RestartDecision::GiveUp));
}

#[test]
fn given_exponential_backoff_when_delay_for_then_doubles_until_cap() {
    let policy = RestartPolicy::new(10, Duration::from_millis(100))
        .with_exponential_backoff(Duration::from_millis(500));

    assert_that!(policy.delay_for(1), eq(Duration::from_millis(100)));
    assert_that!(policy.delay_for(2), eq(Duration::from_millis(200)));
    assert_that!(policy.delay_for(3), eq(Duration::from_millis(400)));
    assert_that!(policy.delay_for(4), eq(Duration::from_millis(500)));
    assert_that!(policy.delay_for(64), eq(Duration::from_millis(500)));
}

#[test]
fn given_resilience_config_when_from_config_then_fields_applied() {
    let config = ResilienceConfig {
        max_restarts: 2,
        restart_delay_ms: 250,
        backoff: BackoffStrategy::Exponential,
        max_backoff_ms: 1000,
        ..ResilienceConfig::default()
    };

    let policy = RestartPolicy::from_config(&config);

    assert_that!(policy.max_restarts(), eq(2));
    assert_that!(policy.delay_for(3), eq(Duration::from_millis(1000)));
    assert_that!(policy.decide(3), eq(RestartDecision::GiveUp));
}
