use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use rv_config::MetricsConfig;

const DEFAULT_HISTOGRAM_BUCKETS_SECONDS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0,
];

/// Lock-free histogram with fixed buckets.
///
/// Each observation increments exactly one bucket (non-cumulative storage).
struct Histogram {
    upper_bounds_nanos: Vec<u64>,
    bucket_counts: Vec<AtomicU64>,
    sum_nanos: AtomicU64,
}

impl Histogram {
    fn from_seconds_bounds(bounds: &[f64]) -> Self {
        let upper_bounds_nanos = bounds
            .iter()
            .map(|sec| (*sec * 1_000_000_000.0) as u64)
            .collect::<Vec<_>>();
        let bucket_counts = (0..=upper_bounds_nanos.len())
            .map(|_| AtomicU64::new(0))
            .collect::<Vec<_>>();
        Self {
            upper_bounds_nanos,
            bucket_counts,
            sum_nanos: AtomicU64::new(0),
        }
    }

    fn observe_duration(&self, elapsed: Duration) {
        let nanos = elapsed.as_nanos().min(u64::MAX as u128) as u64;
        self.sum_nanos.fetch_add(nanos, Ordering::Relaxed);
        let idx = self
            .upper_bounds_nanos
            .iter()
            .position(|bound| nanos <= *bound)
            .unwrap_or(self.upper_bounds_nanos.len());
        self.bucket_counts[idx].fetch_add(1, Ordering::Relaxed);
    }

    fn count(&self) -> u64 {
        self.bucket_counts
            .iter()
            .map(|v| v.load(Ordering::Relaxed))
            .sum()
    }
}

// ---------------------------------------------------------------------------
// OrgMetrics -- the per-organization label set
// ---------------------------------------------------------------------------

/// Counters and histograms for one organization.
///
/// Supervisors resolve their org's handle once at start-up and update it
/// without touching the registry map again.
pub struct OrgMetrics {
    eval_total: AtomicU64,
    eval_failures_total: AtomicU64,
    eval_exhausted_total: AtomicU64,
    eval_duration_seconds: Histogram,
    process_duration_seconds: Histogram,
    send_duration_seconds: Histogram,
}

impl OrgMetrics {
    fn new() -> Self {
        let hist = || Histogram::from_seconds_bounds(DEFAULT_HISTOGRAM_BUCKETS_SECONDS);
        Self {
            eval_total: AtomicU64::new(0),
            eval_failures_total: AtomicU64::new(0),
            eval_exhausted_total: AtomicU64::new(0),
            eval_duration_seconds: hist(),
            process_duration_seconds: hist(),
            send_duration_seconds: hist(),
        }
    }

    pub fn inc_eval(&self) {
        self.eval_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_eval_failure(&self) {
        self.eval_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    /// A tick used up every attempt and the last one still carried errors.
    pub fn inc_eval_exhausted(&self) {
        self.eval_exhausted_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_eval(&self, elapsed: Duration) {
        self.eval_duration_seconds.observe_duration(elapsed);
    }

    pub fn observe_process(&self, elapsed: Duration) {
        self.process_duration_seconds.observe_duration(elapsed);
    }

    pub fn observe_send(&self, elapsed: Duration) {
        self.send_duration_seconds.observe_duration(elapsed);
    }

    pub fn eval_total(&self) -> u64 {
        self.eval_total.load(Ordering::Relaxed)
    }

    pub fn eval_failures_total(&self) -> u64 {
        self.eval_failures_total.load(Ordering::Relaxed)
    }

    pub fn eval_exhausted_total(&self) -> u64 {
        self.eval_exhausted_total.load(Ordering::Relaxed)
    }

    pub fn process_count(&self) -> u64 {
        self.process_duration_seconds.count()
    }

    pub fn send_count(&self) -> u64 {
        self.send_duration_seconds.count()
    }
}

// ---------------------------------------------------------------------------
// SchedulerMetrics
// ---------------------------------------------------------------------------

/// Shared scheduler metrics store, keyed by organization.
///
/// Unlike rule names, organizations are not known up front, so label sets
/// are created lazily on first use.
pub struct SchedulerMetrics {
    orgs: RwLock<BTreeMap<i64, Arc<OrgMetrics>>>,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        Self {
            orgs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Get or create the label set for `org_id`.
    pub fn for_org(&self, org_id: i64) -> Arc<OrgMetrics> {
        if let Some(m) = self.orgs.read().expect("metrics lock poisoned").get(&org_id) {
            return Arc::clone(m);
        }
        let mut orgs = self.orgs.write().expect("metrics lock poisoned");
        Arc::clone(
            orgs.entry(org_id)
                .or_insert_with(|| Arc::new(OrgMetrics::new())),
        )
    }

    /// Prometheus text exposition of every org's metrics.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::with_capacity(4 * 1024);
        let mut rendered_types = BTreeSet::new();
        let orgs = self.orgs.read().expect("metrics lock poisoned");

        for (org, m) in orgs.iter() {
            let org = org.to_string();
            let labels = [("org", org.as_str())];
            render_counter(
                &mut out,
                &mut rendered_types,
                "rv_eval_total",
                &labels,
                m.eval_total(),
            );
            render_counter(
                &mut out,
                &mut rendered_types,
                "rv_eval_failures_total",
                &labels,
                m.eval_failures_total(),
            );
            render_counter(
                &mut out,
                &mut rendered_types,
                "rv_eval_exhausted_total",
                &labels,
                m.eval_exhausted_total(),
            );
            render_histogram(
                &mut out,
                &mut rendered_types,
                "rv_eval_duration_seconds",
                &labels,
                &m.eval_duration_seconds,
            );
            render_histogram(
                &mut out,
                &mut rendered_types,
                "rv_process_duration_seconds",
                &labels,
                &m.process_duration_seconds,
            );
            render_histogram(
                &mut out,
                &mut rendered_types,
                "rv_send_duration_seconds",
                &labels,
                &m.send_duration_seconds,
            );
        }
        out
    }

    /// One-line summary across all orgs, for periodic log output.
    pub fn summary_line(&self) -> String {
        let orgs = self.orgs.read().expect("metrics lock poisoned");
        let (evals, failures, exhausted) = orgs.values().fold((0, 0, 0), |acc, m| {
            (
                acc.0 + m.eval_total(),
                acc.1 + m.eval_failures_total(),
                acc.2 + m.eval_exhausted_total(),
            )
        });
        format!(
            "orgs={} evals={evals} failures={failures} exhausted={exhausted}",
            orgs.len()
        )
    }
}

impl Default for SchedulerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

pub fn maybe_build_metrics(config: &MetricsConfig) -> Option<Arc<SchedulerMetrics>> {
    if !config.enabled {
        return None;
    }
    Some(Arc::new(SchedulerMetrics::new()))
}

// ---------------------------------------------------------------------------
// Rendering helpers
// ---------------------------------------------------------------------------

fn render_counter(
    out: &mut String,
    rendered_types: &mut BTreeSet<String>,
    name: &str,
    labels: &[(&str, &str)],
    value: u64,
) {
    render_type_once(out, rendered_types, name, "counter");
    let _ = writeln!(out, "{name}{} {value}", format_labels(labels));
}

fn render_histogram(
    out: &mut String,
    rendered_types: &mut BTreeSet<String>,
    name: &str,
    labels: &[(&str, &str)],
    histogram: &Histogram,
) {
    render_type_once(out, rendered_types, name, "histogram");
    let mut cumulative = 0u64;
    for (idx, upper_bound_nanos) in histogram.upper_bounds_nanos.iter().enumerate() {
        cumulative =
            cumulative.saturating_add(histogram.bucket_counts[idx].load(Ordering::Relaxed));
        let le = format!("{:.6}", *upper_bound_nanos as f64 / 1_000_000_000.0);
        let mut all_labels = labels.to_vec();
        all_labels.push(("le", le.as_str()));
        let _ = writeln!(out, "{name}_bucket{} {cumulative}", format_labels(&all_labels));
    }
    let overflow = histogram.upper_bounds_nanos.len();
    cumulative =
        cumulative.saturating_add(histogram.bucket_counts[overflow].load(Ordering::Relaxed));
    let mut all_labels = labels.to_vec();
    all_labels.push(("le", "+Inf"));
    let _ = writeln!(out, "{name}_bucket{} {cumulative}", format_labels(&all_labels));
    let sum_seconds = histogram.sum_nanos.load(Ordering::Relaxed) as f64 / 1_000_000_000.0;
    let _ = writeln!(out, "{name}_sum{} {sum_seconds}", format_labels(labels));
    let _ = writeln!(out, "{name}_count{} {cumulative}", format_labels(labels));
}

fn render_type_once(out: &mut String, rendered_types: &mut BTreeSet<String>, name: &str, kind: &str) {
    if rendered_types.insert(name.to_string()) {
        let _ = writeln!(out, "# TYPE {name} {kind}");
    }
}

fn format_labels(labels: &[(&str, &str)]) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let body = labels
        .iter()
        .map(|(key, value)| {
            let escaped = value
                .replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\n', "\\n");
            format!("{key}=\"{escaped}\"")
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("{{{body}}}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_occurrences(haystack: &str, needle: &str) -> usize {
        haystack.match_indices(needle).count()
    }

    #[test]
    fn for_org_returns_shared_handle() {
        let metrics = SchedulerMetrics::new();
        metrics.for_org(1).inc_eval();
        metrics.for_org(1).inc_eval();
        assert_eq!(metrics.for_org(1).eval_total(), 2);
        assert_eq!(metrics.for_org(2).eval_total(), 0);
    }

    #[test]
    fn renders_type_line_once_per_metric_family() {
        let metrics = SchedulerMetrics::new();
        metrics.for_org(1).inc_eval();
        metrics.for_org(2).inc_eval_failure();
        let text = metrics.render_prometheus();
        assert_eq!(count_occurrences(&text, "# TYPE rv_eval_total counter"), 1);
        assert_eq!(
            count_occurrences(&text, "# TYPE rv_eval_duration_seconds histogram"),
            1
        );
        assert!(text.contains("rv_eval_total{org=\"1\"} 1"));
        assert!(text.contains("rv_eval_failures_total{org=\"2\"} 1"));
    }

    #[test]
    fn histogram_count_matches_inf_bucket() {
        let metrics = SchedulerMetrics::new();
        let org = metrics.for_org(3);
        org.observe_eval(Duration::from_millis(3));
        org.observe_eval(Duration::from_secs(500));
        let text = metrics.render_prometheus();
        assert!(text.contains("rv_eval_duration_seconds_bucket{org=\"3\",le=\"+Inf\"} 2"));
        assert!(text.contains("rv_eval_duration_seconds_count{org=\"3\"} 2"));
    }

    #[test]
    fn summary_line_sums_orgs() {
        let metrics = SchedulerMetrics::new();
        metrics.for_org(1).inc_eval();
        metrics.for_org(2).inc_eval();
        metrics.for_org(2).inc_eval_exhausted();
        assert_eq!(
            metrics.summary_line(),
            "orgs=2 evals=2 failures=0 exhausted=1"
        );
    }

    #[test]
    fn disabled_config_builds_nothing() {
        assert!(maybe_build_metrics(&MetricsConfig::default()).is_none());
        assert!(maybe_build_metrics(&MetricsConfig { enabled: true }).is_some());
    }
}
