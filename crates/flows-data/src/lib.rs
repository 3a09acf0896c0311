//! Scanning and aggregation engine for Junos session-close syslog records.
//!
//! Turns a directory of syslog files into one merged flow table: lines are
//! decoded by [`parser`], files are read by [`scanner`], per-file results are
//! merged by [`aggregator`] and shaped for output by [`report`].

pub mod aggregator;
pub mod parser;
pub mod report;
pub mod scanner;

pub use flows_core as core;
