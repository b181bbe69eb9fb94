//! # Capture Common Library
//!
//! Shared code for the capture services:
//! - Error and result types
//! - Bootstrap configuration and root folder resolution
//! - Report database bootstrap
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
