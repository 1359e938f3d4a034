//! Tech News Ranker: binary entrypoint.
//! One invocation = one command; no long-running process.

mod cli;

use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tech_news_ranker::analyze::topics::Tagger;
use tech_news_ranker::config::{self, RankerConfig};
use tech_news_ranker::edition::EditionArchive;
use tech_news_ranker::ingest::build_adapters;
use tech_news_ranker::metrics::Metrics;
use tech_news_ranker::pipeline::publish_edition;
use tech_news_ranker::{
    open_store, scorer_from_config, ArticleStore, Pipeline, PipelineError, TimeWindow,
};

use crate::cli::{exit_code_for, Cli, Command};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional; it may carry NEWS_RANKER_CONFIG / RUST_LOG.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let metrics = match &cli.metrics_textfile {
        Some(_) => match Metrics::install() {
            Ok(m) => Some(m),
            Err(e) => {
                error!(error = %format!("{e:#}"), "metrics disabled");
                None
            }
        },
        None => None,
    };

    let result = execute(&cli).await;

    if let (Some(m), Some(path)) = (&metrics, &cli.metrics_textfile) {
        if let Err(e) = m.write_textfile(path) {
            error!(error = %format!("{e:#}"), "metrics textfile not written");
        }
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            error!(error = %format!("{e:#}"), code, "command failed");
            ExitCode::from(code)
        }
    }
}

async fn execute(cli: &Cli) -> Result<()> {
    let cfg = config::load(cli.config.as_deref()).context("loading config")?;
    let now = Utc::now();

    match &cli.command {
        Command::Run { date, no_edition } => {
            let adapters = build_adapters(&cfg)?;
            let mut store = open_store(&cfg).map_err(PipelineError::StoreWriteFailure)?;
            let report = Pipeline::from_config(&cfg)
                .run(&mut store, &adapters, now)
                .await?;
            info!(
                warnings = report.warnings,
                failed = ?report.sources_failed,
                "pipeline complete"
            );

            if !no_edition {
                let archive = EditionArchive::new(&cfg.store.editions_dir);
                let path = publish_edition(
                    &store,
                    &archive,
                    &Tagger::new(&cfg.topics).with_categories(cfg.source_categories()),
                    date.unwrap_or_else(|| now.date_naive()),
                    TimeWindow::new(
                        now - chrono::Duration::hours(cfg.fetch.lookback_hours.max(1)),
                        now + chrono::Duration::seconds(1),
                    ),
                    cfg.store.edition_size,
                    now,
                )?;
                info!(path = %path.display(), "edition published");
            }
            print_json(&report)
        }
        Command::Snapshot { date, days, limit } => {
            let mut store = read_store(&cfg)?;
            store.rescore_at(now);
            let window = match date {
                Some(d) => TimeWindow::day(*d),
                None => TimeWindow::trailing(now, (*days).max(1)),
            };
            let mut ranked = store.snapshot(window);
            if let Some(n) = limit {
                ranked.truncate(*n);
            }
            print_json(&ranked)
        }
        Command::Purge => {
            let mut store = open_store(&cfg).map_err(PipelineError::StoreWriteFailure)?;
            let removed = store.purge(now - cfg.store.retention());
            store.save().map_err(PipelineError::StoreWriteFailure)?;
            info!(removed, remaining = store.len(), "purge complete");
            Ok(())
        }
        Command::Stats => {
            let stats = EditionArchive::new(&cfg.store.editions_dir).statistics()?;
            print_json(&stats)
        }
        Command::Search { query, min_score } => {
            let hits = EditionArchive::new(&cfg.store.editions_dir).search(query, *min_score)?;
            print_json(&hits)
        }
        Command::Summary { date } => {
            let date = date.unwrap_or_else(|| now.date_naive());
            let summary = EditionArchive::new(&cfg.store.editions_dir)
                .summary(date)?
                .with_context(|| format!("no edition for {date}"))?;
            print_json(&summary)
        }
    }
}

/// Read-only view of the store; does not contend for the writer lock.
fn read_store(cfg: &RankerConfig) -> Result<ArticleStore> {
    ArticleStore::load_detached(&cfg.store.path, scorer_from_config(cfg), cfg.dedup.clone())
        .with_context(|| format!("reading store {}", cfg.store.path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{s}");
    Ok(())
}
