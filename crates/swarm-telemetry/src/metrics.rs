//! Prometheus metrics for the peer supervisor.
//!
//! All metrics follow the naming convention: `swarm_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., authorizations_total)
//! - **Gauge**: Value that can go up or down (e.g., members_active)

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Active peer connections across all resources
    pub static ref MEMBERS_ACTIVE: Gauge = Gauge::new(
        "swarm_members_active",
        "Number of authorized peer connections currently in the roster"
    ).expect("metric creation failed");

    /// Authorization outcomes
    pub static ref AUTHORIZATIONS: CounterVec = CounterVec::new(
        Opts::new("swarm_authorizations_total", "Completed writer authorizations"),
        &["outcome"]  // granted / already_authorized
    ).expect("metric creation failed");

    /// Connections whose establishment failed
    pub static ref CONNECTIONS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("swarm_connections_rejected_total", "Connections that failed to establish"),
        &["reason"]  // missing_identity / malformed_identity / invalid_access_key / unknown_resource / access_control
    ).expect("metric creation failed");

    /// Membership events published
    pub static ref MEMBERSHIP_EVENTS: CounterVec = CounterVec::new(
        Opts::new("swarm_membership_events_total", "Join and leave events published"),
        &["kind"]  // join / leave
    ).expect("metric creation failed");
}

/// Handle for the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Registering twice fails with `TelemetryError::MetricsInit`; metric
/// values are still recorded either way.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(MEMBERS_ACTIVE.clone()),
        Box::new(AUTHORIZATIONS.clone()),
        Box::new(CONNECTIONS_REJECTED.clone()),
        Box::new(MEMBERSHIP_EVENTS.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        // May fail if already registered, which is fine
        let _ = register_metrics();
        AUTHORIZATIONS.with_label_values(&["granted"]).inc();
        let text = encode_metrics().unwrap();
        assert!(text.contains("swarm_authorizations_total"));
    }

    #[test]
    fn test_counter_increment() {
        MEMBERSHIP_EVENTS.with_label_values(&["join"]).inc();
        assert!(MEMBERSHIP_EVENTS.with_label_values(&["join"]).get() >= 1.0);
    }

    #[test]
    fn test_gauge_moves_both_ways() {
        let before = MEMBERS_ACTIVE.get();
        MEMBERS_ACTIVE.inc();
        MEMBERS_ACTIVE.dec();
        assert_eq!(MEMBERS_ACTIVE.get(), before);
    }
}
