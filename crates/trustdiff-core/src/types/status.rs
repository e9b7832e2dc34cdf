//! Refresh progress snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress and outcome of the catalog refresh, as last observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshStatus {
    /// A refresh is currently running
    pub is_refreshing: bool,
    /// Distinct certificates the running refresh will fetch
    pub total_certificates: usize,
    /// Certificates resolved so far (fetched or given up on)
    pub processed_certificates: usize,
    /// When the last refresh started
    pub last_attempt_utc: Option<DateTime<Utc>>,
    /// When a refresh last completed successfully
    pub last_success_utc: Option<DateTime<Utc>>,
    /// Why the last refresh failed; cleared when the next one starts
    pub error_message: Option<String>,
}

impl RefreshStatus {
    /// Fraction complete in `[0, 1]`; zero until a total is known.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_fraction(&self) -> f64 {
        if self.total_certificates == 0 {
            return 0.0;
        }
        (self.processed_certificates as f64 / self.total_certificates as f64).clamp(0.0, 1.0)
    }

    /// Whole percent complete in `[0, 100]`, rounded half away from zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn progress_percentage(&self) -> u8 {
        if self.total_certificates == 0 {
            return 0;
        }
        (self.progress_fraction() * 100.0).round().clamp(0.0, 100.0) as u8
    }
}
