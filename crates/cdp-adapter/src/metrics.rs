//! Prometheus accounting for the CDP traffic of one adapter.

use std::sync::Arc;
use std::time::Duration;

use prometheus::{histogram_opts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};
use tracing::warn;

const LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

struct Collectors {
    sent: IntCounterVec,
    failed: IntCounterVec,
    latency: HistogramVec,
    events: IntCounter,
}

impl Collectors {
    fn build() -> prometheus::Result<Self> {
        Ok(Self {
            sent: IntCounterVec::new(
                Opts::new("bua_cdp_commands_total", "CDP commands sent"),
                &["method"],
            )?,
            failed: IntCounterVec::new(
                Opts::new("bua_cdp_command_failures_total", "CDP commands that failed"),
                &["method"],
            )?,
            latency: HistogramVec::new(
                histogram_opts!(
                    "bua_cdp_command_latency_seconds",
                    "Round trip of successful CDP commands",
                    LATENCY_BUCKETS.to_vec()
                ),
                &["method"],
            )?,
            events: IntCounter::new("bua_cdp_events_total", "CDP events received")?,
        })
    }
}

/// Cheap to clone; clones share counters. A no-op if the collectors could not be built.
#[derive(Clone)]
pub struct CommandMetrics {
    inner: Option<Arc<Collectors>>,
}

impl Default for CommandMetrics {
    fn default() -> Self {
        let inner = match Collectors::build() {
            Ok(collectors) => Some(Arc::new(collectors)),
            Err(err) => {
                warn!(target: "cdp-adapter", %err, "cdp metrics disabled");
                None
            }
        };
        Self { inner }
    }
}

impl CommandMetrics {
    pub fn record_command(&self, method: &str, elapsed: Duration, succeeded: bool) {
        let Some(c) = &self.inner else { return };
        c.sent.with_label_values(&[method]).inc();
        if succeeded {
            c.latency
                .with_label_values(&[method])
                .observe(elapsed.as_secs_f64());
        } else {
            c.failed.with_label_values(&[method]).inc();
        }
    }

    pub fn record_event(&self) {
        if let Some(c) = &self.inner {
            c.events.inc();
        }
    }

    pub fn sent(&self, method: &str) -> u64 {
        self.inner
            .as_ref()
            .map_or(0, |c| c.sent.with_label_values(&[method]).get())
    }

    pub fn failed(&self, method: &str) -> u64 {
        self.inner
            .as_ref()
            .map_or(0, |c| c.failed.with_label_values(&[method]).get())
    }

    pub fn events(&self) -> u64 {
        self.inner.as_ref().map_or(0, |c| c.events.get())
    }

    /// Exposes the collectors on `registry`, e.g. for a scrape endpoint.
    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        let Some(c) = &self.inner else { return Ok(()) };
        registry.register(Box::new(c.sent.clone()))?;
        registry.register(Box::new(c.failed.clone()))?;
        registry.register(Box::new(c.latency.clone()))?;
        registry.register(Box::new(c.events.clone()))?;
        Ok(())
    }
}
