// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade, so recording is a no-op until a recorder
//! (see [`PrometheusAdapter`](crate::PrometheusAdapter)) is installed.

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};

/// Register all Nudge metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "nudge_transitions_total",
        "Applied engagement state transitions"
    );
    describe_counter!(
        "nudge_transition_noops_total",
        "Transitions skipped because the user was no longer in the expected state"
    );
    describe_counter!(
        "nudge_messages_queued_total",
        "Messages newly inserted into the outbound queue"
    );
    describe_counter!(
        "nudge_messages_total",
        "Outbound delivery attempts by outcome"
    );
    describe_histogram!(
        "nudge_job_duration_seconds",
        Unit::Seconds,
        "Wall-clock duration of scheduled job runs"
    );
    describe_counter!("nudge_job_errors_total", "Errors collected by job runs");
    describe_gauge!(
        "nudge_memory_heap_bytes",
        Unit::Bytes,
        "Bytes allocated by the application heap"
    );
    describe_gauge!(
        "nudge_memory_resident_bytes",
        Unit::Bytes,
        "Bytes in physically resident allocator pages"
    );
}

/// Record an applied transition.
pub fn record_transition(trigger: &str, from: &str, to: &str) {
    metrics::counter!(
        "nudge_transitions_total",
        "trigger" => trigger.to_string(),
        "from" => from.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

/// Record a transition that resolved to a no-op.
pub fn record_transition_noop(trigger: &str) {
    metrics::counter!("nudge_transition_noops_total", "trigger" => trigger.to_string())
        .increment(1);
}

/// Record a newly queued message.
pub fn record_message_queued(message_type: &str) {
    metrics::counter!("nudge_messages_queued_total", "type" => message_type.to_string())
        .increment(1);
}

/// Record a delivery attempt. `outcome` is `sent`, `retry` or `failed`.
pub fn record_delivery(message_type: &str, outcome: &'static str) {
    metrics::counter!(
        "nudge_messages_total",
        "type" => message_type.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a finished job run.
pub fn record_job(job: &'static str, seconds: f64, errors: usize) {
    metrics::histogram!("nudge_job_duration_seconds", "job" => job).record(seconds);
    if errors > 0 {
        metrics::counter!("nudge_job_errors_total", "job" => job).increment(errors as u64);
    }
}

/// Set the allocator heap gauge.
pub fn set_memory_heap(bytes: f64) {
    metrics::gauge!("nudge_memory_heap_bytes").set(bytes);
}

/// Set the allocator resident gauge.
pub fn set_memory_resident(bytes: f64) {
    metrics::gauge!("nudge_memory_resident_bytes").set(bytes);
}
