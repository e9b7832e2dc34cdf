//! `trustdiff refresh` - rebuild the catalog cache.

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;
use trustdiff::{CancellationToken, ProgramCatalog, RefreshOutcome, RefreshStatus};

use super::Context;
use crate::output::{print_csv, print_json, OutputFormat};

#[derive(Debug, Serialize)]
struct RefreshSummary {
    certificates: usize,
    status: RefreshStatus,
}

pub async fn execute(ctx: Context) -> Result<()> {
    let catalog = ctx.catalog()?;
    let cancel = CancellationToken::new();

    let progress = progress_bar(ctx.output_format)?;
    let watcher = tokio::spawn(track_progress(catalog.clone(), progress.clone()));
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = catalog.refresh(&cancel).await;
    watcher.abort();
    interrupt.abort();
    progress.finish_and_clear();

    let certificates = match result {
        Ok(RefreshOutcome::Completed { certificates }) => certificates,
        Ok(RefreshOutcome::AlreadyRunning) => anyhow::bail!("A refresh is already running."),
        Err(e) if e.is_cancelled() => anyhow::bail!("Refresh cancelled."),
        Err(e) => return Err(anyhow::Error::new(e).context("catalog refresh failed")),
    };

    let summary = RefreshSummary {
        certificates,
        status: (*catalog.status()).clone(),
    };

    match ctx.output_format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Csv => print_csv(&[SummaryRow::from(&summary)])?,
        OutputFormat::Pretty => {
            println!(
                "{} Cached {} catalog certificates.",
                "Success:".green().bold(),
                certificates.to_string().cyan()
            );
            println!(
                "  {} {}",
                "cache:".bold(),
                ctx.config.cache_dir()?.display().to_string().dimmed()
            );
        }
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct SummaryRow {
    certificates: usize,
    processed: usize,
    total: usize,
    last_success_utc: String,
}

impl From<&RefreshSummary> for SummaryRow {
    fn from(summary: &RefreshSummary) -> Self {
        Self {
            certificates: summary.certificates,
            processed: summary.status.processed_certificates,
            total: summary.status.total_certificates,
            last_success_utc: summary
                .status
                .last_success_utc
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
        }
    }
}

fn progress_bar(format: OutputFormat) -> Result<ProgressBar> {
    if format != OutputFormat::Pretty {
        return Ok(ProgressBar::hidden());
    }

    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    bar.set_message("Fetching inclusion report");
    bar.enable_steady_tick(Duration::from_millis(120));
    Ok(bar)
}

/// Mirror the tracker onto the progress bar until aborted.
async fn track_progress(catalog: ProgramCatalog, bar: ProgressBar) {
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        ticker.tick().await;
        let status = catalog.status();
        if status.total_certificates > 0 {
            bar.set_message("Downloading certificates");
            bar.set_length(status.total_certificates as u64);
            bar.set_position(status.processed_certificates as u64);
        }
    }
}
