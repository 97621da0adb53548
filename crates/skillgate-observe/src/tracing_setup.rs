//! Tracing subscriber initialization with structured logging and optional
//! OpenTelemetry trace export.
//!
//! # Usage
//!
//! ```no_run
//! // Human-readable structured logging only
//! skillgate_observe::tracing_setup::init_tracing(false, false).unwrap();
//!
//! // JSON log lines plus OpenTelemetry export to stdout (local development)
//! skillgate_observe::tracing_setup::init_tracing(true, true).unwrap();
//! ```
//!
//! Tests use [`init_test_tracing`], which routes output through the test
//! harness and may be called from every test.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use std::sync::OnceLock;

/// Stores the OTel tracer provider so it can be shut down cleanly on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Initialize the global tracing subscriber.
///
/// - Always installs a structured `fmt` layer with target visibility and span
///   close timing; `json_output` switches it to one JSON object per line for
///   log shippers.
/// - When `enable_otel` is true, additionally bridges tracing spans to
///   OpenTelemetry using a stdout exporter (suitable for local development;
///   swap the exporter for OTLP in production).
/// - Respects `RUST_LOG` via `EnvFilter`, defaulting to `info` when unset.
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set or if
/// the OTel pipeline fails to initialize.
pub fn init_tracing(
    enable_otel: bool,
    json_output: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = env_filter();

    let tracer = if enable_otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("skillgate");

        // Store the provider for shutdown and register it globally.
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);

        Some(tracer)
    } else {
        None
    };

    if json_output {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .with(tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t)))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .with(tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t)))
            .init();
    }

    Ok(())
}

/// Install a subscriber that routes output through the test harness so
/// captured log lines appear with the owning test's output.
///
/// Safe to call from every test: the first call installs the subscriber,
/// later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Flush pending traces and shut down the OpenTelemetry tracer provider.
///
/// Call this before process exit to ensure all buffered spans are exported.
/// Safe to call even when OTel was not enabled (no-op in that case).
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: OTel tracer provider shutdown error: {e}");
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_repeat_safe() {
        init_test_tracing();
        init_test_tracing();
        // Emitting through the installed subscriber must not panic.
        tracing::info!(check = "repeat-safe", "tracing initialized");
    }

    #[test]
    fn shutdown_without_otel_is_a_noop() {
        shutdown_tracing();
    }
}
