use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Marker token identifying a Junos session-close event.
pub const SESSION_CLOSE_MARKER: &str = "RT_FLOW_SESSION_CLOSE";

/// Placeholder used for any field that could not be derived from a line.
pub const UNKNOWN: &str = "unknown";

/// Placeholder reported in place of per-occurrence fields dropped on merge.
pub const AGGREGATED: &str = "aggregated";

/// Identity of an aggregated flow.
///
/// Field order is the sort order of the flow table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowKey {
    pub device_id: String,
    pub source_ip: String,
    pub destination_ip: String,
    pub destination_port: String,
    pub protocol: String,
}

impl FlowKey {
    /// Display label `device_source_destination_port_protocol`.
    ///
    /// Only used for output; identity is the struct itself.
    pub fn label(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}",
            self.device_id, self.source_ip, self.destination_ip, self.destination_port, self.protocol
        )
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// One decoded session-close line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFlow {
    pub key: FlowKey,
    /// `"{day}-{month} {hh}:{mm}:{ss}"`, or [`UNKNOWN`].
    pub timestamp: String,
    /// Text following `"session closed"`, or [`UNKNOWN`].
    pub closure_reason: String,
}

/// Why a line carrying the session-close marker could not be keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParseFailure {
    /// The line has fewer than six colon-delimited segments.
    TooFewSegments,
    /// The tag segment is not exactly the session-close marker.
    TagMismatch,
    /// No `addr/port->addr/port` pair in the remainder segment.
    MissingEndpoints,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParseFailure::TooFewSegments => "too few segments",
            ParseFailure::TagMismatch => "tag mismatch",
            ParseFailure::MissingEndpoints => "missing endpoints",
        };
        f.write_str(s)
    }
}

/// Result of feeding one raw line to the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    NotASessionClose,
    Parsed(ParsedFlow),
    Failed(ParseFailure),
}

/// Per-reason counts of session-close lines that could not be keyed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseFailureCounts {
    pub too_few_segments: u64,
    pub tag_mismatch: u64,
    pub missing_endpoints: u64,
}

impl ParseFailureCounts {
    pub fn record(&mut self, failure: ParseFailure) {
        match failure {
            ParseFailure::TooFewSegments => self.too_few_segments += 1,
            ParseFailure::TagMismatch => self.tag_mismatch += 1,
            ParseFailure::MissingEndpoints => self.missing_endpoints += 1,
        }
    }

    pub fn add(&mut self, other: &ParseFailureCounts) {
        self.too_few_segments += other.too_few_segments;
        self.tag_mismatch += other.tag_mismatch;
        self.missing_endpoints += other.missing_endpoints;
    }

    pub fn total(&self) -> u64 {
        self.too_few_segments + self.tag_mismatch + self.missing_endpoints
    }
}

/// Line and byte counters accumulated by a scan.
///
/// `parsed_lines <= session_close_lines <= lines_seen` always holds, and
/// `session_close_lines == parsed_lines + failures.total()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanCounters {
    pub lines_seen: u64,
    pub session_close_lines: u64,
    pub parsed_lines: u64,
    pub bytes: u64,
    pub failures: ParseFailureCounts,
}

impl ScanCounters {
    /// Account for one line's parse outcome.
    pub fn record(&mut self, outcome: &LineOutcome) {
        self.lines_seen += 1;
        match outcome {
            LineOutcome::NotASessionClose => {}
            LineOutcome::Parsed(_) => {
                self.session_close_lines += 1;
                self.parsed_lines += 1;
            }
            LineOutcome::Failed(reason) => {
                self.session_close_lines += 1;
                self.failures.record(*reason);
            }
        }
    }

    pub fn add(&mut self, other: &ScanCounters) {
        self.lines_seen += other.lines_seen;
        self.session_close_lines += other.session_close_lines;
        self.parsed_lines += other.parsed_lines;
        self.bytes += other.bytes;
        self.failures.add(&other.failures);
    }
}

/// Occurrence count per distinct flow.
pub type FlowCounts = BTreeMap<FlowKey, u64>;

/// Add every count in `from` into `into`, creating keys as needed.
pub fn merge_flow_counts(into: &mut FlowCounts, from: FlowCounts) {
    if into.is_empty() {
        *into = from;
        return;
    }
    for (key, count) in from {
        *into.entry(key).or_insert(0) += count;
    }
}

/// Outcome of scanning a single file.
#[derive(Debug, Clone, Default)]
pub struct FilePartialResult {
    pub path: PathBuf,
    pub counters: ScanCounters,
    pub flows: FlowCounts,
}

/// A file that contributed nothing because it could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

/// Everything one run produced, before shaping into a report.
#[derive(Debug, Clone)]
pub struct GlobalResult {
    pub counters: ScanCounters,
    pub flows: FlowCounts,
    pub files_scanned: usize,
    pub failures: Vec<FileFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl GlobalResult {
    /// An empty result stamped with the given start time.
    pub fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            counters: ScanCounters::default(),
            flows: FlowCounts::new(),
            files_scanned: 0,
            failures: Vec::new(),
            started_at,
            finished_at: started_at,
            elapsed: Duration::ZERO,
        }
    }

    /// Sum of every flow count; equals `counters.parsed_lines`.
    pub fn total_flow_count(&self) -> u64 {
        self.flows.values().sum()
    }
}
