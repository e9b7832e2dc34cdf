//! `trustdiff roots` - anchors from local trust stores.

use anyhow::Result;
use colored::Colorize;
use tabled::{settings::Style, Table};
use trustdiff::CertificateRecord;

use super::Context;
use crate::output::{print_csv, print_json, OutputFormat, RecordRow};

pub async fn execute(ctx: Context) -> Result<()> {
    let aggregator = ctx.config.aggregator();
    let roots = aggregator.aggregate().await;
    let records: Vec<CertificateRecord> = roots
        .iter()
        .map(|root| CertificateRecord::from_certificate(&root.certificate, root.sources.clone()))
        .collect();
    let rows: Vec<RecordRow> = records.iter().map(RecordRow::from).collect();

    match ctx.output_format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Csv => print_csv(&rows)?,
        OutputFormat::Pretty => {
            let names: Vec<&str> = aggregator.source_names().collect();
            println!("{} {}", "Trust roots:".bold(), rows.len().to_string().cyan());
            println!("{} {}", "Sources:".bold(), names.join(", ").dimmed());
            println!();
            if rows.is_empty() {
                println!("{}", "No readable trust stores found.".yellow());
            } else {
                let table = Table::new(&rows).with(Style::rounded()).to_string();
                println!("{table}");
            }
        }
    }

    Ok(())
}
