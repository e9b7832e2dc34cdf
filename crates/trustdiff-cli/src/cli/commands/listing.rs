//! `trustdiff catalog` and `trustdiff reference` - full listings with overlap.

use anyhow::Result;
use colored::Colorize;
use tabled::{settings::Style, Table};
use trustdiff::CertificateListing;

use super::Context;
use crate::output::{print_csv, print_json, ListingRow, OutputFormat};

pub async fn catalog(ctx: Context) -> Result<()> {
    let catalog = ctx.populated_catalog().await?;
    let listing = ctx.comparison(catalog)?.catalog_listing().await?;
    render(&ctx, &listing, "Catalog certificates", "in reference store")
}

pub async fn reference(ctx: Context) -> Result<()> {
    let catalog = ctx.populated_catalog().await?;
    let listing = ctx.comparison(catalog)?.reference_listing().await?;
    render(&ctx, &listing, "Reference certificates", "in catalog")
}

fn render(ctx: &Context, listing: &CertificateListing, title: &str, overlap: &str) -> Result<()> {
    let rows: Vec<ListingRow> = listing.certificates.iter().map(ListingRow::from).collect();

    match ctx.output_format {
        OutputFormat::Json => print_json(listing)?,
        OutputFormat::Csv => print_csv(&rows)?,
        OutputFormat::Pretty => {
            println!(
                "{} {} ({} {})",
                format!("{title}:").bold(),
                rows.len().to_string().cyan(),
                listing.overlap_count.to_string().green(),
                overlap
            );
            println!();
            if !rows.is_empty() {
                let table = Table::new(&rows).with(Style::rounded()).to_string();
                println!("{table}");
            }
        }
    }

    Ok(())
}
