//! Prometheus metrics collection.
//!
//! Provides application metrics in Prometheus format.

use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;

/// HTTP request labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: String,
    pub path: String,
    pub status: u16,
}

/// Registry rejection labels, keyed by error code.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RejectionLabels {
    pub reason: String,
}

/// Application metrics.
pub struct Metrics {
    registry: Registry,

    /// HTTP request counter by method/path/status.
    pub http_requests: Family<HttpLabels, Counter>,

    /// HTTP request duration histogram.
    pub http_duration_seconds: Family<HttpLabels, Histogram>,

    /// Plugins created.
    pub plugins_created: Counter,

    /// Dependency edges added after creation.
    pub dependencies_added: Counter,

    /// Plugin writes rejected by the registry, by error code.
    pub registry_rejections: Family<RejectionLabels, Counter>,

    /// Release uploads counter.
    pub release_uploads: Counter,

    /// Release upload bytes counter.
    pub release_upload_bytes: Counter,

    /// Release downloads counter.
    pub release_downloads: Counter,
}

impl Metrics {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let http_requests = Family::<HttpLabels, Counter>::default();
        registry.register(
            "http_requests",
            "Total HTTP requests",
            http_requests.clone(),
        );

        let http_duration_seconds = Family::<HttpLabels, Histogram>::new_with_constructor(|| {
            Histogram::new(exponential_buckets(0.001, 2.0, 12))
        });
        registry.register(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
            http_duration_seconds.clone(),
        );

        let plugins_created = Counter::default();
        registry.register(
            "plugins_created",
            "Plugins created",
            plugins_created.clone(),
        );

        let dependencies_added = Counter::default();
        registry.register(
            "plugin_dependencies_added",
            "Dependency edges added to existing plugins",
            dependencies_added.clone(),
        );

        let registry_rejections = Family::<RejectionLabels, Counter>::default();
        registry.register(
            "plugin_registry_rejections",
            "Plugin writes rejected by the registry",
            registry_rejections.clone(),
        );

        let release_uploads = Counter::default();
        registry.register(
            "release_uploads",
            "Total release uploads",
            release_uploads.clone(),
        );

        let release_upload_bytes = Counter::default();
        registry.register(
            "release_upload_bytes",
            "Total release bytes uploaded",
            release_upload_bytes.clone(),
        );

        let release_downloads = Counter::default();
        registry.register(
            "release_downloads",
            "Total release downloads",
            release_downloads.clone(),
        );

        Self {
            registry,
            http_requests,
            http_duration_seconds,
            plugins_created,
            dependencies_added,
            registry_rejections,
            release_uploads,
            release_upload_bytes,
            release_downloads,
        }
    }

    /// Record an HTTP request.
    pub fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let labels = HttpLabels {
            method: method.to_string(),
            path: normalize_path(path),
            status,
        };

        self.http_requests.get_or_create(&labels).inc();
        self.http_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Record a registry rejection such as `CIRCULAR_DEPENDENCY`.
    pub fn record_rejection(&self, code: &str) {
        self.registry_rejections
            .get_or_create(&RejectionLabels {
                reason: code.to_string(),
            })
            .inc();
    }

    /// Record a release upload.
    pub fn record_upload(&self, bytes: u64) {
        self.release_uploads.inc();
        self.release_upload_bytes.inc_by(bytes);
    }

    /// Encode metrics in Prometheus text format.
    ///
    /// # Panics
    ///
    /// Panics if Prometheus metric encoding to a `String` buffer fails.
    /// The `fmt::Write` impl for `String` is infallible, and all metric
    /// labels use derived `EncodeLabelSet` impls that do not produce
    /// `fmt::Error`.
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        // Prometheus encoding to String buffer is infallible
        #[allow(clippy::expect_used)]
        encode(&mut buffer, &self.registry).expect("encoding metrics");
        buffer
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish()
    }
}

/// Normalize a path for metrics labels.
///
/// Replaces dynamic segments (UUIDs, IDs) with placeholders to limit cardinality.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|s| {
            if uuid::Uuid::parse_str(s).is_ok()
                || (!s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
            {
                "{id}"
            } else {
                s
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
