//! Log and Trace Export
//!
//! `TigerStyle`: Optional OTLP export with graceful fallback. Never panics if
//! `OTel` is unavailable or misconfigured.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use roost_storage::telemetry::{init_logging, TelemetryConfig};
//!
//! // Plain structured logs, filtered by RUST_LOG
//! init_logging(None).expect("logging init");
//!
//! // Or, with the `opentelemetry` feature, export spans too
//! let config = TelemetryConfig::builder()
//!     .service_name("roost-demo")
//!     .endpoint("http://localhost:4317")
//!     .build();
//! # let _ = config;
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG` - Log filter (default: `roost_storage=info,roost_core=info`)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT` - Exporter endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME` - Service name (default: "roost-storage")

#[cfg(feature = "opentelemetry")]
use opentelemetry_otlp::WithExportConfig;
#[cfg(feature = "opentelemetry")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "opentelemetry")]
use tracing_subscriber::util::SubscriberInitExt;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::constants::{
    LOG_FILTER_DEFAULT, TELEMETRY_EXPORT_TIMEOUT_MS, TELEMETRY_SAMPLING_RATE_DEFAULT,
    TELEMETRY_SAMPLING_RATE_MAX, TELEMETRY_SAMPLING_RATE_MIN,
};

/// Telemetry setup errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Subscriber or exporter installation failed
    #[error("telemetry initialization failed: {reason}")]
    InitFailed {
        /// The reason for the failure
        reason: String,
    },

    /// Invalid sampling rate provided
    #[error("invalid sampling rate: {rate} (must be in [0.0, 1.0])")]
    InvalidSamplingRate {
        /// The invalid sampling rate value
        rate: f64,
    },

    /// Invalid endpoint or service name
    #[error("invalid endpoint: {endpoint}")]
    InvalidEndpoint {
        /// The invalid endpoint string
        endpoint: String,
    },

    /// Invalid log filter directive
    #[error("invalid log filter {filter:?}: {reason}")]
    InvalidFilter {
        /// The rejected directive
        filter: String,
        /// Parser message
        reason: String,
    },

    /// OpenTelemetry feature is not enabled
    #[error("opentelemetry feature not enabled")]
    FeatureNotEnabled,
}

/// Result type for telemetry setup
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Build the log filter from `RUST_LOG`, falling back to `fallback`.
fn env_filter(fallback: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(fallback).map_err(|e| TelemetryError::InvalidFilter {
            filter: fallback.to_string(),
            reason: e.to_string(),
        })
    })
}

/// Install a global fmt subscriber filtered by `RUST_LOG`.
///
/// `filter` replaces the default directive when `RUST_LOG` is unset.
///
/// # Errors
/// `InvalidFilter` for a bad directive, `InitFailed` if a global subscriber is
/// already installed.
pub fn init_logging(filter: Option<&str>) -> Result<()> {
    let filter = env_filter(filter.unwrap_or(LOG_FILTER_DEFAULT))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| TelemetryError::InitFailed {
            reason: format!("failed to set global subscriber: {e}"),
        })
}

/// Configuration for OTLP span export
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name recorded on every span
    pub service_name: String,

    /// OTLP exporter endpoint (e.g., "<http://localhost:4317>")
    pub endpoint: String,

    /// Sampling rate (0.0 = no sampling, 1.0 = sample all)
    pub sampling_rate: f64,

    /// Timeout for export operations in milliseconds
    pub export_timeout_ms: u64,

    /// Log filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: std::env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| "roost-storage".to_string()),
            endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            sampling_rate: TELEMETRY_SAMPLING_RATE_DEFAULT,
            export_timeout_ms: TELEMETRY_EXPORT_TIMEOUT_MS,
            log_filter: LOG_FILTER_DEFAULT.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create a new builder for `TelemetryConfig`
    #[must_use]
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::default()
    }

    fn validate(&self) -> Result<()> {
        if !(TELEMETRY_SAMPLING_RATE_MIN..=TELEMETRY_SAMPLING_RATE_MAX).contains(&self.sampling_rate) {
            return Err(TelemetryError::InvalidSamplingRate {
                rate: self.sampling_rate,
            });
        }

        if self.service_name.is_empty() {
            return Err(TelemetryError::InvalidEndpoint {
                endpoint: "service_name cannot be empty".to_string(),
            });
        }

        if self.endpoint.is_empty() {
            return Err(TelemetryError::InvalidEndpoint {
                endpoint: "endpoint cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for `TelemetryConfig`
#[derive(Debug, Default)]
pub struct TelemetryConfigBuilder {
    service_name: Option<String>,
    endpoint: Option<String>,
    sampling_rate: Option<f64>,
    export_timeout_ms: Option<u64>,
    log_filter: Option<String>,
}

impl TelemetryConfigBuilder {
    /// Set the service name
    #[must_use]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Set the OTLP exporter endpoint
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the sampling rate (0.0 to 1.0)
    #[must_use]
    pub fn sampling_rate(mut self, rate: f64) -> Self {
        self.sampling_rate = Some(rate);
        self
    }

    /// Set the export timeout in milliseconds
    #[must_use]
    pub fn export_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.export_timeout_ms = Some(timeout_ms);
        self
    }

    /// Set the fallback log filter
    #[must_use]
    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Build the `TelemetryConfig`
    #[must_use]
    pub fn build(self) -> TelemetryConfig {
        let default = TelemetryConfig::default();
        TelemetryConfig {
            service_name: self.service_name.unwrap_or(default.service_name),
            endpoint: self.endpoint.unwrap_or(default.endpoint),
            sampling_rate: self.sampling_rate.unwrap_or(default.sampling_rate),
            export_timeout_ms: self.export_timeout_ms.unwrap_or(default.export_timeout_ms),
            log_filter: self.log_filter.unwrap_or(default.log_filter),
        }
    }
}

/// Keeps span export alive. Dropping it flushes and shuts down the tracer.
#[cfg(feature = "opentelemetry")]
pub struct TelemetryGuard {
    _tracer: opentelemetry_sdk::trace::Tracer,
}

/// Placeholder guard when the `opentelemetry` feature is disabled.
#[cfg(not(feature = "opentelemetry"))]
#[derive(Debug)]
pub struct TelemetryGuard;

#[cfg(feature = "opentelemetry")]
impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        opentelemetry::global::shutdown_tracer_provider();
        tracing::debug!("tracer provider shut down");
    }
}

/// Install fmt logging plus OTLP span export.
///
/// # Errors
///
/// `FeatureNotEnabled` without the `opentelemetry` feature; `InitFailed` if
/// the pipeline or the global subscriber cannot be installed.
///
/// # Graceful Degradation
///
/// An unreachable collector is not an error: spans are dropped by the batch
/// exporter and logs keep flowing.
#[cfg(feature = "opentelemetry")]
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::Resource;
    use std::time::Duration;

    config.validate()?;
    let filter = env_filter(&config.log_filter)?;

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(&config.endpoint)
        .with_timeout(Duration::from_millis(config.export_timeout_ms));

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            opentelemetry_sdk::trace::config()
                .with_resource(Resource::new(vec![KeyValue::new(
                    "service.name",
                    config.service_name.clone(),
                )]))
                .with_sampler(opentelemetry_sdk::trace::Sampler::TraceIdRatioBased(
                    config.sampling_rate,
                )),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)
        .map_err(|e| TelemetryError::InitFailed {
            reason: format!("failed to install OTLP pipeline: {e}"),
        })?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_opentelemetry::layer().with_tracer(tracer.clone()))
        .try_init()
        .map_err(|e| TelemetryError::InitFailed {
            reason: format!("failed to set global subscriber: {e}"),
        })?;

    tracing::info!(
        service_name = %config.service_name,
        endpoint = %config.endpoint,
        sampling_rate = %config.sampling_rate,
        "OpenTelemetry initialized"
    );

    Ok(TelemetryGuard { _tracer: tracer })
}

/// Without the `opentelemetry` feature span export is unavailable.
///
/// # Errors
/// Always `FeatureNotEnabled`.
#[cfg(not(feature = "opentelemetry"))]
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard> {
    config.validate()?;
    Err(TelemetryError::FeatureNotEnabled)
}
