use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Registry,
    cache_lookups: IntCounterVec,
    cache_invalidations: IntCounter,
    sign_in_attempts: IntCounterVec,
    gate_rejections: IntCounterVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let cache_lookups = IntCounterVec::new(
            Opts::new(
                "recipes_cache_lookups_total",
                "Recipe collection cache lookups grouped by result",
            ),
            &["result"],
        )?;
        registry.register(Box::new(cache_lookups.clone()))?;

        let cache_invalidations = IntCounter::new(
            "recipes_cache_invalidations_total",
            "Recipe collection snapshots dropped after a write",
        )?;
        registry.register(Box::new(cache_invalidations.clone()))?;

        let sign_in_attempts = IntCounterVec::new(
            Opts::new(
                "recipes_sign_in_attempts_total",
                "Sign-in attempts grouped by method and outcome",
            ),
            &["method", "outcome"],
        )?;
        registry.register(Box::new(sign_in_attempts.clone()))?;

        let gate_rejections = IntCounterVec::new(
            Opts::new(
                "recipes_gate_rejections_total",
                "Mutating requests rejected by the authorization gate",
            ),
            &["strategy"],
        )?;
        registry.register(Box::new(gate_rejections.clone()))?;

        Ok(Self {
            registry,
            cache_lookups,
            cache_invalidations,
            sign_in_attempts,
            gate_rejections,
        })
    }

    pub fn cache_hit(&self) {
        self.cache_lookups.with_label_values(&["hit"]).inc();
    }

    pub fn cache_miss(&self) {
        self.cache_lookups.with_label_values(&["miss"]).inc();
    }

    pub fn cache_invalidated(&self) {
        self.cache_invalidations.inc();
    }

    pub fn sign_in(&self, method: &str, outcome: &str) {
        self.sign_in_attempts
            .with_label_values(&[method, outcome])
            .inc();
    }

    pub fn gate_rejected(&self, strategy: &str) {
        self.gate_rejections.with_label_values(&[strategy]).inc();
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_lookups.with_label_values(&["hit"]).get()
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_lookups.with_label_values(&["miss"]).get()
    }

    pub fn cache_invalidations(&self) -> u64 {
        self.cache_invalidations.get()
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
