//! Inclusion report parsing.
//!
//! The report is a CSV export with one row per CA certificate. Only the
//! status, fingerprint and validity columns matter here; the rest are
//! carried for humans.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};
use trustdiff_core::{normalize_fingerprint, CatalogEntry, Fingerprint, Result, TrustDiffError};

/// Program status column
pub const STATUS_COLUMN: &str = "Microsoft Status";
/// SHA-256 fingerprint column
pub const SHA256_COLUMN: &str = "SHA-256 Fingerprint";
/// SHA-1 fingerprint column (optional)
pub const SHA1_COLUMN: &str = "SHA-1 Fingerprint";
/// Start of validity column
pub const VALID_FROM_COLUMN: &str = "Valid From [GMT]";
/// End of validity column
pub const VALID_TO_COLUMN: &str = "Valid To [GMT]";

const REQUIRED_COLUMNS: [&str; 4] = [STATUS_COLUMN, SHA256_COLUMN, VALID_FROM_COLUMN, VALID_TO_COLUMN];

const DATE_FORMATS: [&str; 2] = ["%Y %b %d", "%Y-%m-%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y %b %d %H:%M:%S", "%m/%d/%Y %I:%M %p"];
const US_DATE_FORMAT: &str = "%m/%d/%Y";
const FALLBACK_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Column positions resolved from the header row
struct Columns {
    status: usize,
    sha256: usize,
    sha1: Option<usize>,
    valid_from: usize,
    valid_to: usize,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let mut lookup: HashMap<String, usize> = HashMap::new();
        for (index, name) in headers.iter().enumerate() {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            lookup.entry(name.to_lowercase()).or_insert(index);
        }

        let find = |name: &str| lookup.get(&name.to_lowercase()).copied();

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| find(name).is_none())
            .map(|name| (*name).to_string())
            .collect();

        match (
            find(STATUS_COLUMN),
            find(SHA256_COLUMN),
            find(VALID_FROM_COLUMN),
            find(VALID_TO_COLUMN),
        ) {
            (Some(status), Some(sha256), Some(valid_from), Some(valid_to)) => Ok(Self {
                status,
                sha256,
                sha1: find(SHA1_COLUMN),
                valid_from,
                valid_to,
            }),
            _ => Err(TrustDiffError::Schema { missing }),
        }
    }
}

/// Parse the report into the entries that are active at `now`.
///
/// Duplicate rows collapse to their first occurrence. Text without a
/// header row yields no entries; a header row lacking a required column
/// is a [`TrustDiffError::Schema`] error.
pub fn parse_report(text: &str, now: DateTime<Utc>) -> Result<Vec<CatalogEntry>> {
    if text.trim().is_empty() {
        warn!("inclusion report is empty");
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            warn!(error = %e, "unreadable report header row");
            return Err(TrustDiffError::Schema {
                missing: REQUIRED_COLUMNS.iter().map(|c| (*c).to_string()).collect(),
            });
        }
    };
    if headers.iter().all(|h| h.trim().is_empty()) {
        warn!("inclusion report has no header row");
        return Ok(Vec::new());
    }

    let columns = Columns::from_headers(&headers)?;

    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    let mut rows = 0usize;

    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(line = line + 2, error = %e, "skipping malformed report row");
                continue;
            }
        };
        rows += 1;

        let Some(entry) = entry_from_record(&record, &columns) else {
            continue;
        };
        if !entry.is_active(now) {
            continue;
        }
        if seen.insert(entry.clone()) {
            entries.push(entry);
        }
    }

    info!(rows, active = entries.len(), "parsed inclusion report");
    Ok(entries)
}

fn entry_from_record(record: &StringRecord, columns: &Columns) -> Option<CatalogEntry> {
    let field = |index: usize| record.get(index).map_or("", str::trim);

    let sha256 = normalize_fingerprint(field(columns.sha256));
    if sha256.is_empty() {
        return None;
    }

    let sha1 = columns
        .sha1
        .map(|index| normalize_fingerprint(field(index)))
        .filter(|fp| !fp.is_empty());

    Some(CatalogEntry {
        status: field(columns.status).to_string(),
        sha256,
        sha1,
        not_before: parse_report_date(field(columns.valid_from)),
        not_after: parse_report_date(field(columns.valid_to)),
    })
}

/// Parse a report date as UTC. Blank, `N/A` and unrecognised values are `None`.
#[must_use]
pub fn parse_report_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("N/A") {
        return None;
    }

    let parsed = DATE_FORMATS
        .iter()
        .find_map(|fmt| parse_date(text, fmt))
        .or_else(|| parse_datetime(text, DATETIME_FORMATS[0]))
        .or_else(|| parse_date(text, US_DATE_FORMAT))
        .or_else(|| parse_datetime(text, DATETIME_FORMATS[1]))
        .or_else(|| parse_fallback(text));

    if parsed.is_none() {
        debug!(value = text, "unrecognised report date");
    }
    parsed
}

fn parse_date(text: &str, fmt: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(text, fmt)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn parse_datetime(text: &str, fmt: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, fmt)
        .ok()
        .map(|dt| dt.and_utc())
}

fn parse_fallback(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_rfc2822(text))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            FALLBACK_DATETIME_FORMATS
                .iter()
                .find_map(|fmt| parse_datetime(text, fmt))
        })
}

/// Distinct SHA-256 fingerprints in first-seen order.
#[must_use]
pub fn distinct_fingerprints(entries: &[CatalogEntry]) -> Vec<Fingerprint> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|entry| seen.insert(entry.sha256.clone()))
        .map(|entry| entry.sha256.clone())
        .collect()
}
