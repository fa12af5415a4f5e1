//! # FilaMan Tags
//!
//! Matches physical tag readings against the inventory catalog and derives
//! the view models and outbound payloads that depend on catalog spools.
//!
//! - `correlate`: identifier normalization and the matching rules
//! - `catalog`: Spoolman spool types, snapshot, summary and the HTTP client
//! - `view`: tray enrichment for display
//! - `assign`: outbound payload builders from catalog spools

pub mod assign;
pub mod catalog;
pub mod correlate;
pub mod view;

pub use catalog::{CatalogError, CatalogSnapshot, CatalogSource, Spool, SpoolmanClient};
pub use correlate::{
    correlate, correlate_with_rule, normalize, valid_identifier, CatalogRecord, MatchRule,
    TagReading, TaggedRecord,
};
pub use view::{Remaining, TrayView};
