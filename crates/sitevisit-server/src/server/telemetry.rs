//! # Telemetry Features
//!
//! Console logging through `tracing_subscriber` is always on. Optional
//! OpenTelemetry export is layered on top of it, to Honeycomb or stdout.
//!
//! ## Feature matrix
//!
//! - `tracing`: Enables OpenTelemetry distributed tracing (via spans).
//! - `metrics`: Enables OpenTelemetry metrics (counters).
//! - `honeycomb`: Enables the Honeycomb OTLP/HTTP exporter.
//! - `stdout`: Enables the stdout exporter.
//!
//! ## Feature constraints
//!
//! - Exporters require using at least one of: `tracing` or `metrics`.
//! - Both `honeycomb` and `stdout` exporters can be enabled at the same time.
//!
//! ## Honeycomb configuration
//!
//! - `HONEYCOMB_API_KEY`, `HONEYCOMB_DATASET`: sent as request headers.
//! - `HONEYCOMB_TRACES_ENDPOINT`, `HONEYCOMB_METRICS_ENDPOINT`: full OTLP/HTTP
//!   URLs, e.g. `https://api.honeycomb.io/v1/traces`.
//!
//! ## Metrics
//!
//! - `site_visits_created`, by `placement` (`database` or `memory`)
//! - `degraded_operations`: requests served from the in-memory buffer
//! - `mirror_failures`: failed or timed-out spreadsheet writes
//! - `customer_ids_issued`, by `source` (`database` or `memory`)
//! - `requests`: API requests handled
//!
//! ## Example usage
//!
//! ```bash
//! cargo run --features tracing,metrics,honeycomb
//! cargo run --features tracing,stdout
//! ```

// Disallow using `honeycomb` without `tracing` or `metrics`
#[cfg(all(
    feature = "honeycomb",
    not(any(feature = "tracing", feature = "metrics"))
))]
compile_error!(
    "The 'honeycomb' feature requires at least one of 'tracing' or 'metrics' to be enabled."
);

// Disallow using `stdout` without `tracing` or `metrics`
#[cfg(all(feature = "stdout", not(any(feature = "tracing", feature = "metrics"))))]
compile_error!(
    "The 'stdout' feature requires at least one of 'tracing' or 'metrics' to be enabled."
);

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// Honeycomb-specific imports
#[cfg(all(feature = "honeycomb", any(feature = "metrics", feature = "tracing")))]
use opentelemetry_otlp::{Protocol, WithExportConfig, WithHttpConfig};
#[cfg(all(feature = "honeycomb", feature = "metrics"))]
use opentelemetry_sdk::metrics::Temporality;
#[cfg(feature = "honeycomb")]
use std::collections::HashMap;

// Metrics-specific imports
#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Meter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

// Either
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "tracing"))]
use opentelemetry_semantic_conventions as semvcns;

// Tracing-specific imports
#[cfg(feature = "tracing")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::propagation::TraceContextPropagator;
#[cfg(feature = "tracing")]
use opentelemetry_sdk::trace as sdktrace;

pub struct TelemetryProviders {
    #[cfg(feature = "tracing")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes and stops every exporter. Errors are reported on stderr since
    /// the subscriber may already be gone.
    pub fn shutdown(self) {
        #[cfg(feature = "tracing")]
        {
            if let Err(err) = self.tracer_provider.force_flush() {
                eprintln!("Error flushing traces: {err:#?}");
            }
            if let Err(err) = self.tracer_provider.shutdown() {
                eprintln!("Error shutting down tracer: {err:#?}");
            }
        }

        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "tracing")]
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    #[cfg(feature = "tracing")]
    let tracer_provider = init_tracer()?;

    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics()?;

    #[cfg(any(feature = "metrics", feature = "tracing"))]
    let scope = InstrumentationScope::builder("sitevisit")
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    // Human-readable console output of spans and events, independent of any
    // OpenTelemetry exporter.
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        );

    #[cfg(feature = "tracing")]
    let registry = {
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope.clone()))
                .with_error_records_to_exceptions(true),
        )
    };

    #[cfg(feature = "metrics")]
    let registry = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let meter = opentelemetry::global::meter_with_scope(scope);
        init_metric_handles(&meter);

        registry.with(tracing_opentelemetry::MetricsLayer::new(
            meter_provider.clone(),
        ))
    };

    registry.init();

    Ok(TelemetryProviders {
        #[cfg(feature = "tracing")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(feature = "honeycomb")]
fn honeycomb_headers() -> anyhow::Result<HashMap<String, String>> {
    use anyhow::Context;

    let api_key = std::env::var("HONEYCOMB_API_KEY").context("missing `HONEYCOMB_API_KEY`")?;
    let dataset = std::env::var("HONEYCOMB_DATASET").context("missing `HONEYCOMB_DATASET`")?;
    Ok(HashMap::from([
        ("x-honeycomb-team".to_owned(), api_key),
        ("x-honeycomb-dataset".to_owned(), dataset),
    ]))
}

#[cfg(any(feature = "metrics", feature = "tracing"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name("sitevisit")
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> anyhow::Result<sdkmetrics::SdkMeterProvider> {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::MetricExporter;
        let exporter = MetricExporter::default();
        let reader = sdkmetrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();

        builder.with_reader(reader)
    };

    #[cfg(feature = "honeycomb")]
    let builder = {
        use anyhow::Context;

        let endpoint = std::env::var("HONEYCOMB_METRICS_ENDPOINT")
            .context("missing `HONEYCOMB_METRICS_ENDPOINT`")?;
        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_http()
            .with_headers(honeycomb_headers()?)
            .with_timeout(std::time::Duration::from_secs(10))
            .with_endpoint(endpoint)
            .with_protocol(Protocol::HttpBinary)
            .with_temporality(Temporality::Delta)
            .build()
            .context("failed to build metrics exporter")?;

        builder.with_periodic_exporter(exporter)
    };

    Ok(builder.build())
}

#[cfg(feature = "tracing")]
fn init_tracer() -> anyhow::Result<sdktrace::SdkTracerProvider> {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::SpanExporter;
        builder.with_span_processor(batch_processor(SpanExporter::default()))
    };

    #[cfg(feature = "honeycomb")]
    let builder = {
        use anyhow::Context;

        let endpoint = std::env::var("HONEYCOMB_TRACES_ENDPOINT")
            .context("missing `HONEYCOMB_TRACES_ENDPOINT`")?;
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_headers(honeycomb_headers()?)
            .with_timeout(std::time::Duration::from_secs(10))
            .with_endpoint(endpoint)
            .with_protocol(Protocol::HttpBinary)
            .build()
            .context("failed to build tracer exporter")?;

        builder.with_span_processor(batch_processor(exporter))
    };

    Ok(builder.build())
}

#[cfg(all(feature = "tracing", any(feature = "stdout", feature = "honeycomb")))]
fn batch_processor<E>(exporter: E) -> sdktrace::BatchSpanProcessor
where
    E: opentelemetry_sdk::trace::SpanExporter + 'static,
{
    sdktrace::BatchSpanProcessor::builder(exporter)
        .with_batch_config(
            sdktrace::BatchConfigBuilder::default()
                .with_scheduled_delay(std::time::Duration::from_secs(5))
                .with_max_queue_size(2048)
                .build(),
        )
        .build()
}

// Metric handles - only compiled when metrics feature is enabled
#[cfg(feature = "metrics")]
static REQUESTS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static SITE_VISITS_CREATED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static DEGRADED_OPERATIONS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static MIRROR_FAILURES: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static CUSTOMER_IDS_ISSUED: OnceLock<Counter<u64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: &Meter) {
    let _ = REQUESTS.set(
        meter
            .u64_counter("requests")
            .with_description("Total API requests")
            .build(),
    );

    let _ = SITE_VISITS_CREATED.set(
        meter
            .u64_counter("site_visits_created")
            .with_description("Site visits created, by where they were stored")
            .build(),
    );

    let _ = DEGRADED_OPERATIONS.set(
        meter
            .u64_counter("degraded_operations")
            .with_description("Requests served from the in-memory buffer")
            .build(),
    );

    let _ = MIRROR_FAILURES.set(
        meter
            .u64_counter("mirror_failures")
            .with_description("Failed or timed-out spreadsheet mirror writes")
            .build(),
    );

    let _ = CUSTOMER_IDS_ISSUED.set(
        meter
            .u64_counter("customer_ids_issued")
            .with_description("Customer IDs issued, by resolution source")
            .build(),
    );
}

// Convenience functions that compile to no-ops when metrics are disabled
#[cfg(feature = "metrics")]
pub fn increment_requests() {
    if let Some(counter) = REQUESTS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_requests() {}

#[cfg(feature = "metrics")]
pub fn increment_site_visits_created(placement: &'static str) {
    if let Some(counter) = SITE_VISITS_CREATED.get() {
        counter.add(1, &[KeyValue::new("placement", placement)]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_site_visits_created(_placement: &'static str) {}

#[cfg(feature = "metrics")]
pub fn increment_degraded_operations() {
    if let Some(counter) = DEGRADED_OPERATIONS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_degraded_operations() {}

#[cfg(feature = "metrics")]
pub fn increment_mirror_failures() {
    if let Some(counter) = MIRROR_FAILURES.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_mirror_failures() {}

#[cfg(feature = "metrics")]
pub fn increment_customer_ids_issued(source: &'static str) {
    if let Some(counter) = CUSTOMER_IDS_ISSUED.get() {
        counter.add(1, &[KeyValue::new("source", source)]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_customer_ids_issued(_source: &'static str) {}
