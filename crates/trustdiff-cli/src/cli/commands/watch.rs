//! `trustdiff watch` - refresh on an interval until Ctrl-C.

use anyhow::Result;
use colored::Colorize;
use std::sync::Arc;
use trustdiff::{CancellationToken, Scheduler};

use super::Context;
use crate::cli::args::WatchArgs;

pub async fn execute(ctx: Context, args: WatchArgs) -> Result<()> {
    let interval = ctx.config.watch_interval(args.interval_hours);

    let catalog = ctx.catalog()?;
    let scheduler = Scheduler::with_interval(Arc::new(catalog.clone()), interval);
    let cancel = CancellationToken::new();

    eprintln!(
        "{} every {}h into {} (Ctrl-C to stop)",
        "Refreshing".bold(),
        scheduler.interval().as_secs() / 3600,
        ctx.config.cache_dir()?.display().to_string().cyan()
    );

    let stopper = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.cancel();
        }
    });

    scheduler.run(&cancel).await;
    catalog.shutdown();

    Ok(())
}
