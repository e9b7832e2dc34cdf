//! # trustdiff-cli
//!
//! Command-line front end for trustdiff.
//!
//! ## Features
//!
//! - **Catalog refresh**: download the inclusion report and every listed
//!   certificate into a local cache, with live progress
//! - **Comparison**: list catalog roots the reference store lacks
//! - **Listings**: either collection flagged with overlap
//! - **Local trust stores**: enumerate system or configured anchors
//! - **Watch mode**: refresh on an interval until interrupted
//! - **Multiple output formats**: Pretty tables, JSON, CSV

pub mod cli;
pub mod config;
pub mod output;

pub use cli::run;
