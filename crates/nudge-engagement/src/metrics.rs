// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric hooks. Compiled to no-ops without the `prometheus` feature.

#![cfg_attr(not(feature = "prometheus"), allow(unused_variables))]

use nudge_core::types::{LifecycleState, MessageType, Trigger};

pub(crate) fn transition(trigger: Trigger, from: LifecycleState, to: LifecycleState) {
    #[cfg(feature = "prometheus")]
    nudge_prometheus::record_transition(trigger.as_ref(), from.as_ref(), to.as_ref());
}

pub(crate) fn transition_noop(trigger: Trigger) {
    #[cfg(feature = "prometheus")]
    nudge_prometheus::record_transition_noop(trigger.as_ref());
}

pub(crate) fn message_queued(message_type: MessageType) {
    #[cfg(feature = "prometheus")]
    nudge_prometheus::record_message_queued(message_type.as_ref());
}

pub(crate) fn delivery(message_type: MessageType, outcome: &'static str) {
    #[cfg(feature = "prometheus")]
    nudge_prometheus::record_delivery(message_type.as_ref(), outcome);
}

pub(crate) fn job(job: &'static str, seconds: f64, errors: usize) {
    #[cfg(feature = "prometheus")]
    nudge_prometheus::record_job(job, seconds, errors);
}
