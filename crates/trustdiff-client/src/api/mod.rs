//! Upstream endpoints.

mod certificate;
mod reference;
mod report;

pub use certificate::CertificateApi;
pub use reference::{split_pem_certificates, ReferenceStoreApi};
pub use report::ReportApi;
