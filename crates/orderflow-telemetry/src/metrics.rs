//! Prometheus metrics for the orderflow simulation.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means two
//! collectors share a name, which is a programming error caught on first
//! use during startup, never mid-run.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_int_counter, register_int_gauge, CounterVec, Encoder,
    IntCounter, IntGauge, TextEncoder,
};

use crate::error::TelemetryResult;

/// Orders accepted by `place`.
pub static ORDERS_PLACED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "orderflow_orders_placed_total",
        "Orders accepted into the pending buffer"
    )
    .unwrap()
});

/// Orders rejected by `place`.
/// Labels: reason (amount/rate)
pub static ORDERS_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "orderflow_orders_rejected_total",
        "Orders rejected for invalid input",
        &["reason"]
    )
    .unwrap()
});

/// Lifecycle transitions.
pub static TRANSITIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "orderflow_transitions_total",
        "Order lifecycle transitions",
        &["from", "to"]
    )
    .unwrap()
});

/// Operations that targeted an id no longer in the expected buffer.
pub static STALE_REFERENCES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "orderflow_stale_references_total",
        "Transitions ignored because the order was absent",
        &["operation"]
    )
    .unwrap()
});

/// Records dropped from any bounded buffer by capacity.
pub static EVICTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "orderflow_evictions_total",
        "Records evicted from bounded buffers",
        &["buffer"]
    )
    .unwrap()
});

/// Synthetic feed ticks.
pub static FEED_TICKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "orderflow_feed_ticks_total",
        "Synthetic feed refresh ticks",
        &["feed"]
    )
    .unwrap()
});

/// Timers currently scheduled and not yet finished or cancelled.
pub static LIVE_TIMERS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("orderflow_live_timers", "Scheduled timers not yet finished").unwrap()
});

/// Demo choreography activations.
pub static DEMO_RUNS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "orderflow_demo_runs_total",
        "Demo choreography activations",
        &["screen"]
    )
    .unwrap()
});

/// Active snapshot subscribers.
pub static SUBSCRIBERS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("orderflow_subscribers", "Active snapshot subscribers").unwrap()
});

/// Facade over the metric statics.
pub struct Metrics;

impl Metrics {
    pub fn order_placed() {
        ORDERS_PLACED_TOTAL.inc();
    }

    pub fn order_rejected(reason: &str) {
        ORDERS_REJECTED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn transition(from: &str, to: &str) {
        TRANSITIONS_TOTAL.with_label_values(&[from, to]).inc();
    }

    pub fn stale_reference(operation: &str) {
        STALE_REFERENCES_TOTAL
            .with_label_values(&[operation])
            .inc();
    }

    pub fn evicted(buffer: &str) {
        EVICTIONS_TOTAL.with_label_values(&[buffer]).inc();
    }

    pub fn feed_tick(feed: &str) {
        FEED_TICKS_TOTAL.with_label_values(&[feed]).inc();
    }

    pub fn timer_started() {
        LIVE_TIMERS.inc();
    }

    pub fn timer_finished() {
        LIVE_TIMERS.dec();
    }

    pub fn demo_run(screen: &str) {
        DEMO_RUNS_TOTAL.with_label_values(&[screen]).inc();
    }

    pub fn subscribers_set(count: usize) {
        SUBSCRIBERS.set(count as i64);
    }

    /// Render every registered metric in the text exposition format.
    pub fn gather_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_show_up_in_text_output() {
        Metrics::order_placed();
        Metrics::transition("pending", "escrowed");
        Metrics::feed_tick("market_rate");

        let text = Metrics::gather_text().unwrap();
        assert!(text.contains("orderflow_orders_placed_total"));
        assert!(text.contains("orderflow_transitions_total{from=\"pending\",to=\"escrowed\"}"));
        assert!(text.contains("orderflow_feed_ticks_total{feed=\"market_rate\"}"));
    }

    #[test]
    fn test_timer_gauge_balances() {
        let before = LIVE_TIMERS.get();
        Metrics::timer_started();
        Metrics::timer_started();
        Metrics::timer_finished();
        Metrics::timer_finished();
        assert_eq!(LIVE_TIMERS.get(), before);
    }
}
