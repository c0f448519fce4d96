//! Per-call client metrics.
//!
//! Exposes request counters, error counters by class and cumulative latency
//! in Prometheus text exposition format.

use diskplane_core::TaskError;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

/// Receives one sample per top-level client call.
///
/// Recording never fails; a sink that cannot record drops the sample.
pub trait MetricsSink: Send + Sync {
    /// Records a finished call. `error` is `None` on success.
    fn stat_request(&self, name: &str, elapsed: Duration, error: Option<&TaskError>);
}

/// One exported counter sample of a client call.
#[derive(Debug, Clone)]
pub struct Metric {
    /// Exported name, `diskplane_client_*`.
    pub name: String,
    /// `# HELP` line text.
    pub help: String,
    /// `# TYPE` line value; client metrics are all counters.
    pub metric_type: String,
    /// `call` and, for errors, `class` labels.
    pub labels: Vec<(String, String)>,
    /// Sample value.
    pub value: f64,
}

impl Metric {
    /// Builds a counter sample.
    pub fn counter(name: &str, help: &str, labels: Vec<(String, String)>, value: f64) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            metric_type: "counter".to_string(),
            labels,
            value,
        }
    }

    /// Renders the HELP, TYPE and sample lines.
    pub fn format(&self) -> String {
        let labels = if self.labels.is_empty() {
            String::new()
        } else {
            let pairs = self
                .labels
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, v))
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{}}}", pairs)
        };

        format!(
            "# HELP {name} {help}\n# TYPE {name} {kind}\n{name}{labels} {value}\n",
            name = self.name,
            help = self.help,
            kind = self.metric_type,
            labels = labels,
            value = self.sample(),
        )
    }

    fn sample(&self) -> String {
        // whole counts print without a fractional part
        if self.value.fract() == 0.0 && self.value.abs() < 1e15 {
            format!("{}", self.value as i64)
        } else {
            format!("{}", self.value)
        }
    }
}

/// Counters for one call name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestStats {
    /// Calls recorded, successful or not.
    pub requests: u64,
    /// Failed calls by error class.
    pub errors: BTreeMap<&'static str, u64>,
    /// Sum of call latencies.
    pub total_latency: Duration,
}

impl RequestStats {
    /// Failed calls across all classes.
    pub fn error_count(&self) -> u64 {
        self.errors.values().sum()
    }

    /// Mean latency, or zero when nothing was recorded.
    pub fn mean_latency(&self) -> Duration {
        if self.requests == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total_latency.as_nanos() / u128::from(self.requests);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// In-memory [`MetricsSink`] keyed by call name.
#[derive(Debug, Default)]
pub struct ClientMetrics {
    calls: Mutex<BTreeMap<String, RequestStats>>,
}

impl ClientMetrics {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counters recorded for `name`.
    pub fn snapshot(&self, name: &str) -> Option<RequestStats> {
        self.calls.lock().ok()?.get(name).cloned()
    }

    /// Exports every recorded call as counter samples.
    pub fn to_metrics(&self) -> Vec<Metric> {
        let calls = match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(_) => return Vec::new(),
        };

        let mut metrics = Vec::new();
        for (name, stats) in calls {
            let call_labels = vec![("call".to_string(), name.clone())];
            metrics.push(Metric::counter(
                "diskplane_client_requests_total",
                "Total client calls",
                call_labels.clone(),
                stats.requests as f64,
            ));
            metrics.push(Metric::counter(
                "diskplane_client_request_latency_seconds_total",
                "Cumulative client call latency",
                call_labels.clone(),
                stats.total_latency.as_secs_f64(),
            ));
            for (class, count) in &stats.errors {
                let mut labels = call_labels.clone();
                labels.push(("class".to_string(), class.to_string()));
                metrics.push(Metric::counter(
                    "diskplane_client_errors_total",
                    "Failed client calls by error class",
                    labels,
                    *count as f64,
                ));
            }
        }
        metrics
    }

    /// Renders all samples in Prometheus text exposition format.
    pub fn format_prometheus(&self) -> String {
        self.to_metrics()
            .iter()
            .map(|m| m.format())
            .collect::<Vec<_>>()
            .join("")
    }
}

impl MetricsSink for ClientMetrics {
    fn stat_request(&self, name: &str, elapsed: Duration, error: Option<&TaskError>) {
        let Ok(mut calls) = self.calls.lock() else {
            return;
        };
        let stats = calls.entry(name.to_string()).or_default();
        stats.requests += 1;
        stats.total_latency += elapsed;
        if let Some(err) = error {
            *stats.errors.entry(err.class()).or_insert(0) += 1;
        }
    }
}
