// src/metrics.rs
//! Run metrics: names, one-time descriptions and the optional Prometheus
//! textfile export. Without an installed recorder every `metrics` macro call
//! is a no-op, so library code emits unconditionally.

use std::path::Path;

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series carry help text).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ranker_raw_articles_total",
            "Raw records returned by source adapters."
        );
        describe_counter!(
            "ranker_malformed_total",
            "Raw records rejected by the normalizer."
        );
        describe_counter!(
            "ranker_source_failures_total",
            "Sources that failed for a run after retries."
        );
        describe_counter!(
            "ranker_merged_total",
            "Articles folded into an existing story."
        );
        describe_counter!("ranker_purged_total", "Articles dropped past retention.");
        describe_gauge!("ranker_store_articles", "Articles held after the last save.");
        describe_histogram!("ranker_fetch_ms", "Per-source fetch time in milliseconds.");
        describe_gauge!("ranker_last_run_ts", "Unix ts when the last run finished.");
    });
}

/// Installed Prometheus recorder.
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global recorder. Fails if one is already installed.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("installing prometheus recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Write the exposition text for a node-exporter style textfile collector.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        std::fs::write(path, self.render())
            .with_context(|| format!("writing metrics textfile {}", path.display()))
    }
}
