use std::borrow::Cow;
use std::time::Duration;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{InstrumentationScope, global};
use opentelemetry_otlp::{ExporterBuildError, MetricExporter, SpanExporter};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::SdkTracerProvider;
use snafu::{ResultExt, Snafu};
use tracing::Subscriber;
use tracing_opentelemetry::MetricsLayer;
use tracing_subscriber::{EnvFilter, Layer};
use tracing_subscriber::{prelude::*, registry::LookupSpan};

pub use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter},
};

pub use crate::error_kind::ErrorKind;

mod error_kind;

const OTEL_SDK_DISABLED: &str = "OTEL_SDK_DISABLED";
const METRICS_EXPORT_INTERVAL: Duration = Duration::from_secs(10);

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

#[derive(Debug, Snafu)]
pub enum ObservabilityError {
    #[snafu(display("Failed to build {signal} exporter"))]
    Exporter {
        signal: &'static str,
        source: ExporterBuildError,
    },
}

/// Keeps the trace and metric providers alive until shutdown.
#[derive(Debug)]
pub struct ObservabilityGuard {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

impl ObservabilityGuard {
    /// Flushes pending spans and metrics.
    pub fn shutdown(self) {
        if let Err(err) = self.tracer_provider.shutdown() {
            tracing::warn!(error = %err, "failed to shut down tracer provider");
        }
        if let Err(err) = self.meter_provider.shutdown() {
            tracing::warn!(error = %err, "failed to shut down meter provider");
        }
    }
}

pub fn meter(name: &'static str) -> Meter {
    global::meter(name)
}

/// Installs the global tracing subscriber and meter provider.
///
/// Logs go to stdout, as JSON when `RUST_LOG_FORMAT=json`. Spans and metrics
/// are exported over OTLP only when `OTEL_SDK_DISABLED=false`.
pub fn init_observability(
    package_name: impl Into<Cow<'static, str>>,
    package_version: impl Into<Cow<'static, str>>,
) -> Result<ObservabilityGuard, ObservabilityError> {
    // Exports are off unless explicitly enabled.
    let sdk_disabled = std::env::var(OTEL_SDK_DISABLED)
        .map(|v| v != "false")
        .unwrap_or(true);

    let (otel_layer, guard) = otel(package_name, package_version, !sdk_disabled)?;

    let layers = vec![stdout(), otel_layer];
    tracing_subscriber::registry().with(layers).init();

    Ok(guard)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn stdout<S>() -> BoxedLayer<S>
where
    S: Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    let json_fmt = std::env::var("RUST_LOG_FORMAT")
        .map(|val| val == "json")
        .unwrap_or(false);

    if json_fmt {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .json()
            .with_filter(env_filter())
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(false)
            .compact()
            .with_filter(env_filter())
            .boxed()
    }
}

fn otel<S>(
    package_name: impl Into<Cow<'static, str>>,
    version: impl Into<Cow<'static, str>>,
    sdk_enabled: bool,
) -> Result<(BoxedLayer<S>, ObservabilityGuard), ObservabilityError>
where
    S: Subscriber + Send + Sync,
    for<'a> S: LookupSpan<'a>,
{
    let package_name = package_name.into();
    let resource = Resource::builder()
        .with_service_name(package_name.to_string())
        .build();

    let scope = InstrumentationScope::builder(package_name)
        .with_version(version.into())
        .build();

    let mut tracer_provider = SdkTracerProvider::builder().with_resource(resource.clone());
    let mut meter_provider = SdkMeterProvider::builder().with_resource(resource);

    if sdk_enabled {
        let span_exporter = SpanExporter::builder()
            .with_tonic()
            .build()
            .context(ExporterSnafu { signal: "span" })?;
        tracer_provider = tracer_provider.with_batch_exporter(span_exporter);

        let metric_exporter = MetricExporter::builder()
            .with_tonic()
            .build()
            .context(ExporterSnafu { signal: "metric" })?;
        let reader = PeriodicReader::builder(metric_exporter)
            .with_interval(METRICS_EXPORT_INTERVAL)
            .build();
        meter_provider = meter_provider.with_reader(reader);
    }

    let tracer_provider = tracer_provider.build();
    let meter_provider = meter_provider.build();
    global::set_meter_provider(meter_provider.clone());

    let tracer = tracer_provider.tracer_with_scope(scope);
    let layer = env_filter()
        .and_then(MetricsLayer::new(meter_provider.clone()))
        .and_then(tracing_opentelemetry::layer().with_tracer(tracer))
        .boxed();

    Ok((
        layer,
        ObservabilityGuard {
            tracer_provider,
            meter_provider,
        },
    ))
}
