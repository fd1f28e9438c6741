//! Logging and metrics for the Portcullis gateway.
//!
//! - **Logging**: `tracing` events rendered as JSON lines or pretty output,
//!   to stdout or an append-only file
//! - **Metrics**: a Prometheus recorder behind the `metrics` facade, rendered
//!   by the gateway's `/metrics` route
//!
//! # Example
//!
//! ```rust,ignore
//! use portcullis_telemetry::{init_telemetry, LogConfig, MetricsConfig, TelemetryConfig};
//!
//! let config = TelemetryConfig {
//!     logging: LogConfig::production(),
//!     metrics: MetricsConfig::default(),
//! };
//! init_telemetry(&config)?;
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{fields, init_logging, LogConfig, LogFormat};
pub use metrics::{init_metrics, render_metrics, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Combined logging and metrics settings.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Logging settings.
    pub logging: LogConfig,
    /// Metrics settings.
    pub metrics: MetricsConfig,
}

/// Initializes logging first, then metrics.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}
