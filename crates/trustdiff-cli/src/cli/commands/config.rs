//! `trustdiff config` - CLI configuration management.

use anyhow::Result;
use colored::Colorize;

use super::Context;
use crate::cli::args::{ConfigArgs, ConfigCommands};
use crate::config::Config;
use crate::output::OutputFormat;

pub async fn execute(ctx: Context, args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => show_config(&ctx),
        ConfigCommands::Path => {
            println!("{}", ctx.config_path.display());
            Ok(())
        }
        ConfigCommands::Init { force } => init_config(&ctx, force),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    let config = &ctx.config;

    match ctx.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Csv | OutputFormat::Pretty => {
            println!("{}", "Current Configuration:".bold());
            println!();
            println!("  {} {}", "report_url:".bold(), config.endpoints.report_url);
            println!(
                "  {} {}",
                "certificate_url_template:".bold(),
                config.endpoints.certificate_url_template
            );
            println!("  {} {}", "reference_url:".bold(), config.endpoints.reference_url);
            println!("  {} {}", "concurrency:".bold(), config.download.concurrency);
            println!("  {} {}", "max_attempts:".bold(), config.download.max_attempts);
            println!(
                "  {} {}h",
                "refresh_interval:".bold(),
                config.refresh_interval_hours
            );
            println!("  {} {}h", "reference_ttl:".bold(), config.reference_ttl_hours);
            println!("  {} {}", "cache_dir:".bold(), config.cache_dir()?.display());

            if config.sources.is_empty() {
                println!("  {} {}", "sources:".bold(), "(system trust stores)".dimmed());
            } else {
                println!("  {}", "sources:".bold());
                for source in &config.sources {
                    println!("    {} {}", source.name.cyan(), source.path.display());
                }
            }
        }
    }

    Ok(())
}

fn init_config(ctx: &Context, force: bool) -> Result<()> {
    let path = &ctx.config_path;
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}\n\
             Use --force to overwrite it.",
            path.display()
        );
    }

    Config::default().save(path)?;
    println!(
        "{} Wrote default configuration to {}.",
        "Success:".green().bold(),
        path.display().to_string().cyan()
    );
    Ok(())
}
