//! # Swarm Telemetry
//!
//! Logging and metrics for the peer supervisor.
//!
//! ## Components
//!
//! - **Logs**: `tracing` events through a `tracing-subscriber` registry,
//!   pretty for development or JSON for log shippers
//! - **Metrics**: Prometheus counters and gauges for authorizations,
//!   rejections and membership
//!
//! ## Usage
//!
//! ```rust,ignore
//! use swarm_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! // Peer connections are now logged and counted.
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SWARM_SERVICE_NAME` | `auto-swarm` | Service name on every log line |
//! | `SWARM_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `SWARM_JSON_LOGS` | `false` | Emit JSON instead of pretty logs |
//! | `SWARM_CONSOLE_OUTPUT` | `true` | Write logs to stdout at all |

mod config;
mod logging;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, AUTHORIZATIONS, CONNECTIONS_REJECTED,
    MEMBERSHIP_EVENTS, MEMBERS_ACTIVE,
};
pub use tracing_setup::TracingGuard;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics_handle = register_metrics()?;
    let tracing_guard = tracing_setup::init_tracing(&config)?;

    Ok(TelemetryGuard {
        _tracing: tracing_guard,
        _metrics: metrics_handle,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _tracing: TracingGuard,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
