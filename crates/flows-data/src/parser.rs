//! Session-close line parser.
//!
//! A Junos `RT_FLOW_SESSION_CLOSE` line is decoded in named steps, each of
//! which either yields a field or a [`ParseFailure`]:
//!
//! 1. marker detection (`RT_FLOW_SESSION_CLOSE` anywhere in the line),
//! 2. colon segmentation into header / device / tag / reason / remainder,
//! 3. device id, timestamp and closure reason (always succeed, fall back to
//!    `"unknown"`),
//! 4. endpoint extraction `src/port->dst/port` (required),
//! 5. protocol (falls back to `"unknown"`).

use flows_core::models::{
    FlowKey, LineOutcome, ParseFailure, ParsedFlow, SESSION_CLOSE_MARKER, UNKNOWN,
};
use regex::Regex;

/// Phrase preceding the closure reason in the reason segment.
const SESSION_CLOSED_PHRASE: &str = "session closed";

/// Segments required before the remainder: header, minutes, device, tag, reason.
const SEGMENT_COUNT: usize = 6;

// ── Segments ──────────────────────────────────────────────────────────────────

/// The colon-delimited pieces of a session-close line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segments<'a> {
    /// Everything before the first colon (`"Oct 12 10"` for a syslog stamp).
    pub timestamp: &'a str,
    /// Third segment, carrying the device name as its second token.
    pub device: &'a str,
    /// Free-text segment holding `"session closed <reason>"`.
    pub reason: &'a str,
    /// Everything after the fifth colon: endpoints, protocol, policy, ...
    pub remainder: &'a str,
}

/// Split `line` on its first five colons and check the tag segment.
pub fn split_segments(line: &str) -> Result<Segments<'_>, ParseFailure> {
    let parts: Vec<&str> = line.splitn(SEGMENT_COUNT, ':').collect();
    if parts.len() < SEGMENT_COUNT {
        return Err(ParseFailure::TooFewSegments);
    }
    if parts[3].trim() != SESSION_CLOSE_MARKER {
        return Err(ParseFailure::TagMismatch);
    }
    Ok(Segments {
        timestamp: parts[0],
        device: parts[2],
        reason: parts[4],
        remainder: parts[5],
    })
}

// ── Field steps ───────────────────────────────────────────────────────────────

/// Second whitespace token of the device segment.
pub fn device_id(segment: &str) -> String {
    segment
        .split_whitespace()
        .nth(1)
        .unwrap_or(UNKNOWN)
        .to_string()
}

/// `"{day}-{month} {hh}:{mm}:{ss}"` from the first five whitespace tokens.
pub fn timestamp(segment: &str) -> String {
    let tokens: Vec<&str> = segment.split_whitespace().collect();
    if tokens.len() < 5 {
        return UNKNOWN.to_string();
    }
    format!(
        "{}-{} {}:{}:{}",
        tokens[1], tokens[0], tokens[2], tokens[3], tokens[4]
    )
}

/// Text between the first and second `"session closed"` in the segment.
pub fn closure_reason(segment: &str) -> String {
    segment
        .split(SESSION_CLOSED_PHRASE)
        .nth(1)
        .map(|reason| reason.trim().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Source address, destination address and destination port of a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub source_ip: String,
    pub destination_ip: String,
    pub destination_port: String,
}

// ── LineParser ────────────────────────────────────────────────────────────────

/// Decodes raw syslog lines into [`LineOutcome`]s.
///
/// Holds the compiled patterns; build one per scan and reuse it for every line.
#[derive(Debug, Clone)]
pub struct LineParser {
    endpoints: Regex,
    protocol: Regex,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    pub fn new() -> Self {
        Self {
            endpoints: Regex::new(r"(.+?)/(\d+)->(.+?)/(\d+)").expect("regex is valid"),
            protocol: Regex::new(r"protocol\s+(\S+)").expect("regex is valid"),
        }
    }

    /// Classify and, for session-close lines, decode one line.
    pub fn parse(&self, line: &str) -> LineOutcome {
        if !line.contains(SESSION_CLOSE_MARKER) {
            return LineOutcome::NotASessionClose;
        }
        match self.parse_session_close(line) {
            Ok(flow) => LineOutcome::Parsed(flow),
            Err(failure) => LineOutcome::Failed(failure),
        }
    }

    /// First `addr/port->addr/port` pair in the remainder segment.
    ///
    /// Addresses are captured non-greedily and trimmed.
    pub fn endpoints(&self, remainder: &str) -> Option<Endpoints> {
        let caps = self.endpoints.captures(remainder.trim())?;
        Some(Endpoints {
            source_ip: caps[1].trim().to_string(),
            destination_ip: caps[3].trim().to_string(),
            destination_port: caps[4].to_string(),
        })
    }

    /// Token following the word `protocol`, or `"unknown"`.
    pub fn protocol(&self, remainder: &str) -> String {
        self.protocol
            .captures(remainder)
            .map(|caps| caps[1].to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    fn parse_session_close(&self, line: &str) -> Result<ParsedFlow, ParseFailure> {
        let segments = split_segments(line)?;
        let endpoints = self
            .endpoints(segments.remainder)
            .ok_or(ParseFailure::MissingEndpoints)?;

        let key = FlowKey {
            device_id: device_id(segments.device),
            source_ip: endpoints.source_ip,
            destination_ip: endpoints.destination_ip,
            destination_port: endpoints.destination_port,
            protocol: self.protocol(segments.remainder),
        };

        Ok(ParsedFlow {
            key,
            timestamp: timestamp(segments.timestamp),
            closure_reason: closure_reason(segments.reason),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
