//! Report persistence
//!
//! Statement-level access to the `reports`, `report_pairs` and
//! `report_scores` tables. Every function takes a connection so callers can
//! compose them inside one write transaction.

pub mod reports;

pub use reports::*;
