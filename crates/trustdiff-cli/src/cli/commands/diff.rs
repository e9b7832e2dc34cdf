//! `trustdiff diff` - catalog certificates the reference store lacks.

use anyhow::Result;
use colored::Colorize;
use tabled::{settings::Style, Table};

use super::Context;
use crate::cli::args::DiffArgs;
use crate::output::{print_csv, print_json, OutputFormat, RecordRow};

pub async fn execute(ctx: Context, args: DiffArgs) -> Result<()> {
    let catalog = ctx.populated_catalog().await?;
    let comparison = ctx.comparison(catalog)?;

    let exclude_known_anchors = !args.include_known_anchors;
    let result = comparison.differences(exclude_known_anchors).await;

    if let Some(message) = &result.error_message {
        if ctx.output_format == OutputFormat::Json {
            print_json(&result)?;
        }
        anyhow::bail!("{message}");
    }

    let rows: Vec<RecordRow> = result.missing_in_reference.iter().map(RecordRow::from).collect();

    match ctx.output_format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Csv => print_csv(&rows)?,
        OutputFormat::Pretty => {
            println!(
                "{} {}",
                "Missing from reference store:".bold(),
                rows.len().to_string().cyan()
            );
            println!(
                "{} {}",
                "Compared at:".bold(),
                result.retrieved_at_utc.to_rfc3339().dimmed()
            );
            println!();

            if rows.is_empty() {
                println!("{}", "Every catalog certificate is in the reference store.".green());
            } else {
                let table = Table::new(&rows).with(Style::rounded()).to_string();
                println!("{table}");
            }

            if exclude_known_anchors {
                println!();
                println!(
                    "{}",
                    "Tip: Known vendor anchors are hidden. Use --include-known-anchors to show them."
                        .dimmed()
                );
            }
        }
    }

    Ok(())
}
