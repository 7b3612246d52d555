//! `ctxl ask`: ingest paths, then answer a question over them.

use anyhow::Result;
use std::path::PathBuf;

use crate::config::Config;
use crate::ingest::{build_orchestrator, ingest_all, status_line};
use crate::orchestrator::Answer;
use crate::persist::persist_ledger;
use crate::progress::{CancelFlag, ProgressMode};

/// Ingest `paths` and answer `query`. Without an explicit `progress` mode,
/// stage progress is shown on a TTY unless `json` output was requested.
pub async fn run_ask(
    config: &Config,
    query: &str,
    paths: &[PathBuf],
    json: bool,
    progress: Option<ProgressMode>,
) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let docs = ingest_all(&orchestrator, config, paths).await?;
    if !json {
        for doc in docs.iter().filter(|d| !d.is_ready()) {
            eprintln!("{}", status_line(doc));
        }
    }
    persist_ledger(config, orchestrator.ledger())?;

    let mode = match progress {
        Some(mode) => mode,
        None if json => ProgressMode::Off,
        None => ProgressMode::default_for_tty(),
    };
    let reporter = mode.reporter();

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let answer = orchestrator
        .answer_with_progress(query, reporter.as_ref(), &cancel)
        .await;
    interrupt.abort();

    let Some(answer) = answer else {
        eprintln!("query cancelled");
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print_answer(&answer);
    }
    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("{}\n", answer.text);
    if !answer.sources.is_empty() {
        println!("sources ({} retrieval):", answer.mode);
        for (i, source) in answer.sources.iter().enumerate() {
            println!(
                "  {}. {} [{}] score={:.3}",
                i + 1,
                source.name,
                source.modality,
                source.score
            );
        }
    }
    println!("files checked: {}", answer.files_checked);
    println!("ledger: {}", answer.blockchain_status);
}
