//! Shared vocabulary for the syslog flow analyzer.
//!
//! Holds the data model passed between the parser, the per-file scanner and
//! the aggregator, plus the error type, formatting helpers and CLI settings.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
