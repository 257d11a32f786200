//! Maktaba command line
//!
//! Runs a streaming search over a local library, printing batches as they
//! arrive. Ctrl-C stops the run; already-delivered results stay valid.

use anyhow::{bail, Result};
use clap::Parser;
use maktaba::coordinator::{ChannelEvents, SearchEvent, SearchRequest};
use maktaba::highlight;
use maktaba::normalize::MatchMode;
use maktaba::state::{get_data_dir, AppState};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "maktaba", about = "Search a local reference library")]
struct Args {
    /// Query text (Arabic, diacritic-insensitive)
    query: String,

    /// Library data directory (defaults to the platform data dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Match mode: phrase or contains
    #[arg(long, default_value = "phrase")]
    mode: String,

    /// Stop after this many results
    #[arg(long)]
    limit: Option<usize>,

    /// Search narrator biographies instead of book content
    #[arg(long)]
    narrators: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mode = match args.mode.as_str() {
        "phrase" => MatchMode::Phrase,
        "contains" => MatchMode::Contains,
        other => bail!("unknown mode {other:?} (expected phrase or contains)"),
    };

    let data_dir = args.data_dir.unwrap_or_else(get_data_dir);
    let state = AppState::new(data_dir)?;

    let (domain, coordinator, partitions) = if args.narrators {
        (
            "narrators",
            Arc::clone(&state.narrator_search),
            state.library.narrator_partitions(),
        )
    } else {
        (
            "books",
            Arc::clone(&state.book_search),
            state.library.book_partitions(),
        )
    };

    let request = SearchRequest {
        query: args.query.clone(),
        mode,
        partitions,
        result_limit: args.limit,
    };
    let query_data = serde_json::to_string(&request)?;
    let partition_count = request.partitions.len() as i64;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    coordinator.start(request, Box::new(ChannelEvents::new(tx)))?;

    let mut total = 0usize;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("stopping...");
                coordinator.stop();
            }
            event = rx.recv() => {
                match event {
                    Some(SearchEvent::Initialized { partitions_total }) => {
                        println!("searching {partitions_total} sources");
                    }
                    Some(SearchEvent::TableProgress { completed }) => {
                        tracing::debug!(completed, "source finished");
                    }
                    Some(SearchEvent::RowProgress { .. }) => {}
                    Some(SearchEvent::Batch { results }) => {
                        for result in results {
                            total += 1;
                            println!(
                                "{} (part {}, p.{}): {}",
                                result.title,
                                result.part,
                                result.page,
                                highlight::snippet(&result.highlighted, 40)
                            );
                        }
                    }
                    Some(SearchEvent::PartitionError { partition, message }) => {
                        tracing::warn!(%partition, error = %message, "source skipped");
                    }
                    Some(SearchEvent::Complete { outcome }) => {
                        tracing::debug!(?outcome, "run finished");
                        break;
                    }
                    None => break,
                }
            }
        }
    }
    coordinator.wait_until_idle();

    state
        .history
        .add_to_history(domain, &query_data, &args.query, partition_count)?;

    println!("{total} result(s)");
    Ok(())
}
