//! Snapshot listing retrieval, parsing and filtering.
//!
//! The archive's CDX index is the ground truth for what gets mirrored. This
//! module turns one bulk listing into the ordered set of captures to fetch:
//!
//! 1. [`SnapshotIndexFetcher`] retrieves the raw listing for a domain
//! 2. [`parse_listing`] turns it into [`SnapshotRecord`]s, repairing or
//!    dropping malformed rows
//! 3. [`SnapshotFilter`] applies date bounds, exclusions and latest-only
//!
//! # Example
//!
//! ```
//! use waybackdl_core::snapshot::{SnapshotFilter, parse_listing};
//!
//! let raw = r#"[["timestamp","original"],
//!               ["20100101000000","http://example.com/"],
//!               ["20200101000000","http://example.com/"]]"#;
//! let records = parse_listing(raw).unwrap();
//! let latest = SnapshotFilter::new().with_latest_only(true).apply(records);
//! assert_eq!(latest.len(), 1);
//! assert_eq!(latest.records()[0].timestamp, "20200101000000");
//! ```

mod error;
mod filter;
mod index;
mod parser;
mod record;

pub use error::ListingError;
pub use filter::{FilterStats, FilteredSnapshotSet, SkipReason, SnapshotFilter};
pub use index::SnapshotIndexFetcher;
pub use parser::{RepairingSanitizer, RowSanitizer, SnapshotListParser, parse_listing};
pub use record::SnapshotRecord;
