//! In-process metrics registry rendered in the Prometheus text format.

use axum::{
    extract::{MatchedPath, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::fmt::Write as _;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_ERRORS_TOTAL: &str = "http_errors_total";
pub const HTTP_REQUEST_DURATION: &str = "http_request_duration_seconds";
pub const DB_OPERATIONS_TOTAL: &str = "db_operations_total";
pub const DB_OPERATION_ERRORS_TOTAL: &str = "db_operation_errors_total";
pub const DB_OPERATION_DURATION: &str = "db_operation_duration_seconds";
pub const PRODUCTS_CREATED_TOTAL: &str = "products_created_total";
pub const PRODUCTS_DELETED_TOTAL: &str = "products_deleted_total";
pub const DESCRIPTIONS_UPDATED_TOTAL: &str = "descriptions_updated_total";
pub const DESCRIPTIONS_GENERATED_TOTAL: &str = "descriptions_generated_total";
pub const GENERATION_FAILURES_TOTAL: &str = "generation_failures_total";
pub const GENERATION_DURATION: &str = "generation_duration_seconds";

#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Count and running sum of observed values; the sum is stored as `f64` bits.
#[derive(Debug, Clone, Default)]
pub struct Histogram {
    count: Arc<AtomicU64>,
    sum: Arc<AtomicU64>,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, value: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        let _ = self
            .sum
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
    }

    pub fn observe_duration(&self, duration: Duration) {
        self.observe(duration.as_secs_f64());
    }

    pub fn get_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn get_sum(&self) -> f64 {
        f64::from_bits(self.sum.load(Ordering::Relaxed))
    }
}

/// Registry keyed by metric name plus an optional label set, e.g. `db_operations_total{operation="list_products"}`.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: DashMap<String, Counter>,
    histograms: DashMap<String, Histogram>,
}

fn series_key(name: &str, labels: &[(&str, &str)]) -> String {
    if labels.is_empty() {
        return name.to_string();
    }
    let rendered: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("{}{{{}}}", name, rendered.join(","))
}

fn base_name(series: &str) -> &str {
    series.split('{').next().unwrap_or(series)
}

fn with_suffix(series: &str, suffix: &str) -> String {
    match series.find('{') {
        Some(idx) => format!("{}{}{}", &series[..idx], suffix, &series[idx..]),
        None => format!("{}{}", series, suffix),
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> Counter {
        self.counter_with_labels(name, &[])
    }

    pub fn counter_with_labels(&self, name: &str, labels: &[(&str, &str)]) -> Counter {
        self.counters
            .entry(series_key(name, labels))
            .or_insert_with(Counter::new)
            .clone()
    }

    pub fn histogram(&self, name: &str) -> Histogram {
        self.histogram_with_labels(name, &[])
    }

    pub fn histogram_with_labels(&self, name: &str, labels: &[(&str, &str)]) -> Histogram {
        self.histograms
            .entry(series_key(name, labels))
            .or_insert_with(Histogram::new)
            .clone()
    }

    pub fn increment_counter(&self, name: &str) {
        self.counter(name).inc();
    }

    /// Renders every series in the Prometheus exposition format, sorted by name.
    pub fn render_prometheus(&self) -> String {
        let mut output = String::new();

        let mut counters: Vec<(String, u64)> = self
            .counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().get()))
            .collect();
        counters.sort();

        let mut last_type = String::new();
        for (series, value) in counters {
            let name = base_name(&series);
            if name != last_type {
                let _ = writeln!(output, "# TYPE {} counter", name);
                last_type = name.to_string();
            }
            let _ = writeln!(output, "{} {}", series, value);
        }

        let mut histograms: Vec<(String, u64, f64)> = self
            .histograms
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.value().get_count(),
                    entry.value().get_sum(),
                )
            })
            .collect();
        histograms.sort_by(|a, b| a.0.cmp(&b.0));

        for (series, count, sum) in histograms {
            let name = base_name(&series);
            if name != last_type {
                let _ = writeln!(output, "# TYPE {} summary", name);
                last_type = name.to_string();
            }
            let _ = writeln!(output, "{} {}", with_suffix(&series, "_count"), count);
            let _ = writeln!(output, "{} {}", with_suffix(&series, "_sum"), sum);
        }

        output
    }
}

/// Records request count, error count and latency per matched route.
pub async fn track_http_metrics(
    State(metrics): State<Arc<MetricsRegistry>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    let status = response.status();
    let status_label = status.as_u16().to_string();
    let labels = [
        ("method", method.as_str()),
        ("route", route.as_str()),
        ("status", status_label.as_str()),
    ];
    metrics.counter_with_labels(HTTP_REQUESTS_TOTAL, &labels).inc();
    if status.is_client_error() || status.is_server_error() {
        metrics.counter_with_labels(HTTP_ERRORS_TOTAL, &labels).inc();
    }
    metrics
        .histogram_with_labels(
            HTTP_REQUEST_DURATION,
            &[("method", method.as_str()), ("route", route.as_str())],
        )
        .observe_duration(start.elapsed());

    response
}

/// `GET /metrics`
pub async fn metrics_handler(State(metrics): State<Arc<MetricsRegistry>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics.render_prometheus(),
    )
}
