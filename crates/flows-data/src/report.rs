//! JSON report shaping and persistence.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use flows_core::error::{FlowError, Result};
use flows_core::formatting::{format_gigabytes, format_percent, per_second, BYTES_PER_GB};
use flows_core::models::{FileFailure, FlowKey, GlobalResult, ParseFailureCounts, AGGREGATED};
use serde::{Deserialize, Serialize};

/// Value of `responseHeader.type`.
pub const REPORT_TYPE: &str = "parsingOnly";

// ── Report model ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowReport {
    pub response_header: ResponseHeader,
    pub flows: Vec<FlowEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseHeader {
    #[serde(rename = "type")]
    pub kind: String,
    pub performance: Performance,
    pub session_stats: SessionStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    /// Unix epoch seconds.
    pub start_time: f64,
    /// Unix epoch seconds.
    pub end_time: f64,
    pub elapsed_time: f64,
    pub total_connections: u64,
    pub total_size_processed: String,
    pub processing_performance: ProcessingPerformance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingPerformance {
    pub connections_per_second: String,
    pub size_per_second: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_connections: u64,
    pub total_session_closures: u64,
    pub session_closure_percent: String,
    pub parsed_session_closure: u64,
    pub parsed_success_rate: String,
    pub flows: usize,
    pub parse_failures: ParseFailureCounts,
    pub files_scanned: usize,
    pub file_failures: Vec<FileFailure>,
}

/// One aggregated flow as it appears in the `flows` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowEntry {
    pub key: String,
    pub timestamp: String,
    pub device_id: String,
    pub session_closure_reason: String,
    #[serde(rename = "sourceIP")]
    pub source_ip: String,
    #[serde(rename = "destinationIP")]
    pub destination_ip: String,
    pub destination_port: String,
    pub protocol: String,
    pub count: u64,
}

impl FlowEntry {
    fn new(key: &FlowKey, count: u64) -> Self {
        Self {
            key: key.label(),
            timestamp: AGGREGATED.to_string(),
            device_id: key.device_id.clone(),
            session_closure_reason: AGGREGATED.to_string(),
            source_ip: key.source_ip.clone(),
            destination_ip: key.destination_ip.clone(),
            destination_port: key.destination_port.clone(),
            protocol: key.protocol.clone(),
            count,
        }
    }
}

// ── Building ──────────────────────────────────────────────────────────────────

/// Shape a finished run into the report document.
///
/// Flows are listed by descending count; equal counts keep flow-key order.
pub fn build_report(result: &GlobalResult) -> FlowReport {
    let counters = &result.counters;

    let mut ranked: Vec<(&FlowKey, u64)> = result.flows.iter().map(|(k, &c)| (k, c)).collect();
    // Stable sort over an already key-ordered map.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    let flows: Vec<FlowEntry> = ranked
        .into_iter()
        .map(|(key, count)| FlowEntry::new(key, count))
        .collect();

    let elapsed = result.elapsed.as_secs_f64();
    let connections_per_second = per_second(counters.lines_seen as f64, elapsed);
    let gigabytes_per_second = per_second(counters.bytes as f64 / BYTES_PER_GB, elapsed);

    let performance = Performance {
        start_time: epoch_seconds(&result.started_at),
        end_time: epoch_seconds(&result.finished_at),
        elapsed_time: elapsed,
        total_connections: counters.lines_seen,
        total_size_processed: format_gigabytes(counters.bytes),
        processing_performance: ProcessingPerformance {
            connections_per_second: format!("{:.2} connections/second", connections_per_second),
            size_per_second: format!("{:.2} GB/second", gigabytes_per_second),
        },
    };

    let session_stats = SessionStats {
        total_connections: counters.lines_seen,
        total_session_closures: counters.session_close_lines,
        session_closure_percent: format_percent(counters.session_close_lines, counters.lines_seen),
        parsed_session_closure: counters.parsed_lines,
        parsed_success_rate: format_percent(counters.parsed_lines, counters.session_close_lines),
        flows: flows.len(),
        parse_failures: counters.failures,
        files_scanned: result.files_scanned,
        file_failures: result.failures.clone(),
    };

    FlowReport {
        response_header: ResponseHeader {
            kind: REPORT_TYPE.to_string(),
            performance,
            session_stats,
        },
        flows,
    }
}

fn epoch_seconds(at: &DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

// ── Serialization ─────────────────────────────────────────────────────────────

/// Serialize with four-space indentation.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(buf).map_err(|e| FlowError::Other(e.into()))
}

// ── Persistence ───────────────────────────────────────────────────────────────

/// `{dir}/v9_output_{YYYYmmdd_HHMMSS}.json` for the given instant.
pub fn output_path(dir: &Path, at: DateTime<Local>) -> PathBuf {
    dir.join(format!("v9_output_{}.json", at.format("%Y%m%d_%H%M%S")))
}

/// Report path stamped with the current local time.
pub fn generate_output_path(dir: &Path) -> PathBuf {
    output_path(dir, Local::now())
}

/// Result of [`write_report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    Succeeded(PathBuf),
    Failed { path: PathBuf, reason: String },
}

impl WriteStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, WriteStatus::Succeeded(_))
    }

    pub fn path(&self) -> &Path {
        match self {
            WriteStatus::Succeeded(path) | WriteStatus::Failed { path, .. } => path,
        }
    }
}

impl fmt::Display for WriteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteStatus::Succeeded(_) => f.write_str("Write op succeeded"),
            WriteStatus::Failed { reason, .. } => write!(f, "Write op failed: {}", reason),
        }
    }
}

/// Persist `report` at `path`, creating parent directories as needed.
///
/// Never fails outright: any error is folded into [`WriteStatus::Failed`].
pub fn write_report(report: &FlowReport, path: &Path) -> WriteStatus {
    match save_json(report, path) {
        Ok(()) => WriteStatus::Succeeded(path.to_path_buf()),
        Err(err) => WriteStatus::Failed {
            path: path.to_path_buf(),
            reason: err.to_string(),
        },
    }
}

fn save_json(report: &FlowReport, path: &Path) -> Result<()> {
    let write_err = |source| FlowError::ReportWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let json = to_pretty_json(report)?;

    // Write to a temp file then rename, so readers never see a partial report.
    let tmp = path.with_extension("json.tmp");
    let persisted = std::fs::write(&tmp, json).and_then(|()| std::fs::rename(&tmp, path));
    if let Err(source) = persisted {
        let _ = std::fs::remove_file(&tmp);
        return Err(write_err(source));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
