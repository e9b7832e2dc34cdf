//! Core data model.

pub mod comparison;
pub mod entry;
pub mod record;
pub mod status;

pub use comparison::{CertificateListing, ComparisonResult};
pub use entry::{is_included_status, CatalogEntry, INCLUDED_STATUS_PREFIX};
pub use record::{
    compare_ignore_case, CertificateRecord, SourceSet, StoreCertificateRecord, TrustedRoot,
    PROGRAM_SOURCE, REFERENCE_SOURCE,
};
pub use status::RefreshStatus;
