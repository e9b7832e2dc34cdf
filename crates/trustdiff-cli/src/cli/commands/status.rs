//! `trustdiff status` - cache state and last refresh outcome.

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use trustdiff::{CertificateCacheStore, CATALOG_CACHE_KEY};

use super::Context;
use crate::output::{print_csv, print_json, OutputFormat};

#[derive(Debug, Serialize)]
struct CacheStatus {
    cache_file: PathBuf,
    last_updated_utc: Option<DateTime<Utc>>,
    cached_certificates: usize,
    stale: bool,
}

pub async fn execute(ctx: Context) -> Result<()> {
    let store = ctx.cache_store()?;
    let last_updated_utc = store.last_updated(CATALOG_CACHE_KEY).await?;
    let cached_certificates = store.get(CATALOG_CACHE_KEY).await?.len();

    let refresh_interval = chrono::Duration::from_std(ctx.config.refresh_interval())?;
    let stale = last_updated_utc.map_or(true, |t| Utc::now() - t > refresh_interval);

    let status = CacheStatus {
        cache_file: store.path_for(CATALOG_CACHE_KEY),
        last_updated_utc,
        cached_certificates,
        stale,
    };

    match ctx.output_format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Csv => print_csv(&[status])?,
        OutputFormat::Pretty => {
            println!("{}", "Catalog Cache:".bold());
            println!();
            println!("  {} {}", "file:".bold(), status.cache_file.display());
            match status.last_updated_utc {
                Some(t) => println!("  {} {}", "last updated:".bold(), t.to_rfc3339().cyan()),
                None => println!("  {} {}", "last updated:".bold(), "never".dimmed()),
            }
            println!(
                "  {} {}",
                "certificates:".bold(),
                status.cached_certificates.to_string().cyan()
            );
            if status.stale {
                println!();
                println!(
                    "{}",
                    "Tip: The cache is older than the refresh interval. Run `trustdiff refresh`."
                        .dimmed()
                );
            }
        }
    }

    Ok(())
}
