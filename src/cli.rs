//! Command-line interface definitions.
//!
//! ```sh
//! # daily run: fetch, rank, persist, write today's edition
//! tech-news-ranker run
//!
//! # ranked JSON for one day, top 10
//! tech-news-ranker snapshot --date 2025-06-10 --limit 10
//!
//! # archive queries
//! tech-news-ranker search "funding" --min-score 40
//! tech-news-ranker stats
//! ```

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use tech_news_ranker::PipelineError;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Config file (TOML or JSON). Falls back to $NEWS_RANKER_CONFIG, then config/ranker.{toml,json}.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "NEWS_RANKER_LOG_JSON")]
    pub log_json: bool,

    /// Write Prometheus exposition text here when the command finishes.
    #[arg(long, global = true, env = "NEWS_RANKER_METRICS_TEXTFILE")]
    pub metrics_textfile: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Fetch all sources, merge into the store and publish the daily edition.
    Run {
        /// Edition date (UTC). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Skip writing the edition file.
        #[arg(long)]
        no_edition: bool,
    },
    /// Print ranked stored articles as JSON.
    Snapshot {
        /// One UTC calendar day. Overrides --days.
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Trailing window in days.
        #[arg(long, default_value_t = 1)]
        days: i64,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Drop articles past the retention horizon.
    Purge,
    /// Archive statistics as JSON.
    Stats,
    /// Search edition titles.
    Search {
        query: String,
        #[arg(long, default_value_t = 0.0)]
        min_score: f64,
    },
    /// Top stories of one edition.
    Summary {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

/// Process exit code for a failed command: 2 when the store could not be
/// written or locked, 1 for anything else.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    if err
        .chain()
        .any(|c| c.downcast_ref::<PipelineError>().is_some())
    {
        2
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use tech_news_ranker::StoreError;

    #[test]
    fn parses_run_with_globals() {
        let cli = Cli::parse_from([
            "tech-news-ranker",
            "run",
            "--date",
            "2025-06-10",
            "--config",
            "cfg.toml",
            "--log-json",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("cfg.toml")));
        assert!(cli.log_json);
        assert_eq!(
            cli.command,
            Command::Run {
                date: NaiveDate::from_ymd_opt(2025, 6, 10),
                no_edition: false
            }
        );
    }

    #[test]
    fn parses_search_and_snapshot_defaults() {
        let cli = Cli::parse_from(["tech-news-ranker", "search", "zepto", "--min-score", "40"]);
        assert_eq!(
            cli.command,
            Command::Search {
                query: "zepto".into(),
                min_score: 40.0
            }
        );
        let cli = Cli::parse_from(["tech-news-ranker", "snapshot"]);
        assert_eq!(
            cli.command,
            Command::Snapshot {
                date: None,
                days: 1,
                limit: None
            }
        );
    }

    #[test]
    fn store_failures_map_to_exit_code_two() {
        let e: anyhow::Error = PipelineError::StoreWriteFailure(StoreError::Locked {
            path: "x.lock".into(),
        })
        .into();
        let e = Err::<(), _>(e).context("running pipeline").unwrap_err();
        assert_eq!(exit_code_for(&e), 2);
        assert_eq!(exit_code_for(&anyhow::anyhow!("bad config")), 1);
    }
}
