//! Output formatting for different formats.

use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tabled::Tabled;
use trustdiff::{CertificateRecord, StoreCertificateRecord};

/// Available output formats.
#[derive(Debug, Clone, Copy, Default, ValueEnum, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed tables with colors
    #[default]
    Pretty,
    /// JSON output
    Json,
    /// CSV output
    Csv,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "table" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => anyhow::bail!(
                "Unknown output format: {}\n\
                 Valid formats: pretty, json, csv",
                s
            ),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// One certificate as a table or CSV row.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct RecordRow {
    #[tabled(rename = "Subject")]
    pub subject: String,
    #[tabled(rename = "Fingerprint (SHA-256)")]
    pub fingerprint: String,
    #[tabled(rename = "Not After")]
    pub not_after: String,
    #[tabled(rename = "Sources")]
    pub sources: String,
}

impl From<&CertificateRecord> for RecordRow {
    fn from(record: &CertificateRecord) -> Self {
        Self {
            subject: record.subject.clone(),
            fingerprint: record.fingerprint.clone(),
            not_after: record.not_after_utc.format("%Y-%m-%d").to_string(),
            sources: record.sources.iter().collect::<Vec<_>>().join("; "),
        }
    }
}

/// One listing entry, flagged with presence in the other collection.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct ListingRow {
    #[tabled(rename = "Subject")]
    pub subject: String,
    #[tabled(rename = "Fingerprint (SHA-256)")]
    pub fingerprint: String,
    #[tabled(rename = "Not After")]
    pub not_after: String,
    #[tabled(rename = "In Other")]
    pub present_in_other: bool,
}

impl From<&StoreCertificateRecord> for ListingRow {
    fn from(entry: &StoreCertificateRecord) -> Self {
        Self {
            subject: entry.certificate.subject.clone(),
            fingerprint: entry.certificate.fingerprint.clone(),
            not_after: entry.certificate.not_after_utc.format("%Y-%m-%d").to_string(),
            present_in_other: entry.present_in_other,
        }
    }
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Serialize rows as CSV, header included.
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!("{}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Print rows as CSV on stdout.
pub fn print_csv<T: Serialize>(rows: &[T]) -> Result<()> {
    print!("{}", to_csv(rows)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_format_names() {
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Pretty);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Csv.to_string(), "csv");
    }

    #[test]
    fn csv_quotes_embedded_commas() {
        let rows = vec![ListingRow {
            subject: "CN=Root, O=Example".into(),
            fingerprint: "AB".into(),
            not_after: "2040-01-01".into(),
            present_in_other: true,
        }];
        let csv = to_csv(&rows).unwrap();
        assert_eq!(
            csv,
            "subject,fingerprint,not_after,present_in_other\n\"CN=Root, O=Example\",AB,2040-01-01,true\n"
        );
    }
}
