//! Log file discovery and per-file scanning.
//!
//! Lists the eligible files of a source directory and streams each one line
//! by line through the [`LineParser`], producing a [`FilePartialResult`].

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flows_core::error::{FlowError, Result};
use flows_core::models::{FilePartialResult, FlowCounts, LineOutcome, ScanCounters};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::parser::LineParser;

/// Read buffer per open file.
const READ_BUFFER_BYTES: usize = 256 * 1024;

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Regular, non-hidden files directly under `source_dir`, sorted by path.
///
/// Symlinks are followed, so a link to a file is eligible and a link to a
/// directory is not. A missing or unlistable directory is an error.
pub fn find_log_files(source_dir: &Path) -> Result<Vec<PathBuf>> {
    if !source_dir.is_dir() {
        return Err(FlowError::SourceDirNotFound(source_dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = Vec::new();
    let walker = WalkDir::new(source_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(FlowError::SourceDirUnreadable {
                    path: source_dir.to_path_buf(),
                    source: err.into(),
                });
            }
            Err(err) => {
                warn!("Skipping unreadable entry in {}: {}", source_dir.display(), err);
                continue;
            }
        };

        if !entry.file_type().is_file() || is_hidden(entry.file_name()) {
            continue;
        }
        files.push(entry.into_path());
    }

    files.sort();
    Ok(files)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

// ── Scanning ──────────────────────────────────────────────────────────────────

/// Scan one file into counters and a local flow table.
///
/// The file size is taken once before reading. A line that fails to parse is
/// counted and skipped; only an I/O error aborts the file.
pub fn scan_file(path: &Path) -> Result<FilePartialResult> {
    let file_read = |source| FlowError::FileRead {
        path: path.to_path_buf(),
        source,
    };

    let bytes = std::fs::metadata(path).map_err(file_read)?.len();
    let file = File::open(path).map_err(file_read)?;
    let reader = BufReader::with_capacity(READ_BUFFER_BYTES, file);

    let parser = LineParser::new();
    let (mut counters, flows) = scan_reader(reader, &parser).map_err(file_read)?;
    counters.bytes = bytes;

    debug!(
        "File {}: {} lines, {} session-close, {} parsed, {} flows",
        path.display(),
        counters.lines_seen,
        counters.session_close_lines,
        counters.parsed_lines,
        flows.len(),
    );

    Ok(FilePartialResult {
        path: path.to_path_buf(),
        counters,
        flows,
    })
}

/// Drive `parser` over every line of `reader`.
///
/// Returned counters have `bytes` left at zero. Line breaks follow the
/// universal-newline convention.
pub fn scan_reader<R: BufRead>(
    mut reader: R,
    parser: &LineParser,
) -> std::io::Result<(ScanCounters, FlowCounts)> {
    let mut counters = ScanCounters::default();
    let mut flows = FlowCounts::new();
    let mut buf: Vec<u8> = Vec::with_capacity(1024);

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }

        for line in split_lines(&buf) {
            let outcome = parser.parse(&decode_line(line));
            counters.record(&outcome);
            if let LineOutcome::Parsed(flow) = outcome {
                *flows.entry(flow.key).or_insert(0) += 1;
            }
        }
    }

    Ok((counters, flows))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Lines of one `\n`-terminated chunk, treating `\r\n`, `\n` and a lone
/// `\r` all as line breaks.
fn split_lines(chunk: &[u8]) -> impl Iterator<Item = &[u8]> {
    let chunk = chunk.strip_suffix(b"\n").unwrap_or(chunk);
    let chunk = chunk.strip_suffix(b"\r").unwrap_or(chunk);
    chunk.split(|&b| b == b'\r')
}

/// Decode as UTF-8, dropping invalid byte sequences.
fn decode_line(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use flows_core::models::FlowKey;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn close_line(device: &str, src: &str, dst: &str, port: u16) -> String {
        format!(
            "Oct 12 10:00:00 {device} RT_FLOW: RT_FLOW_SESSION_CLOSE: session closed TCP FIN: \
             {src}/40000->{dst}/{port} junos-https protocol tcp policy allow"
        )
    }

    fn write_log(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    fn key(device: &str, src: &str, dst: &str, port: &str) -> FlowKey {
        FlowKey {
            device_id: device.to_string(),
            source_ip: src.to_string(),
            destination_ip: dst.to_string(),
            destination_port: port.to_string(),
            protocol: "tcp".to_string(),
        }
    }

    // ── find_log_files ────────────────────────────────────────────────────────

    #[test]
    fn test_find_log_files_flat_and_sorted() {
        let dir = TempDir::new().unwrap();
        write_log(dir.path(), "messages.2", &["x"]);
        write_log(dir.path(), "messages.0", &["x"]);
        write_log(dir.path(), "messages.1", &["x"]);

        let files = find_log_files(dir.path()).unwrap();
        let names: Vec<&str> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["messages.0", "messages.1", "messages.2"]);
    }

    #[test]
    fn test_find_log_files_skips_hidden_and_directories() {
        let dir = TempDir::new().unwrap();
        write_log(dir.path(), ".hidden", &["x"]);
        write_log(dir.path(), "messages", &["x"]);
        let sub = dir.path().join("archive");
        std::fs::create_dir_all(&sub).unwrap();
        write_log(&sub, "old.log", &["x"]);

        let files = find_log_files(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("messages")]);
    }

    #[test]
    fn test_find_log_files_empty_directory() {
        let dir = TempDir::new().unwrap();
        assert!(find_log_files(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_find_log_files_missing_directory() {
        let err = find_log_files(Path::new("/tmp/does-not-exist-flows-test-xyz")).unwrap_err();
        assert!(matches!(err, FlowError::SourceDirNotFound(_)));
    }

    #[test]
    fn test_find_log_files_rejects_plain_file() {
        let dir = TempDir::new().unwrap();
        let file = write_log(dir.path(), "messages", &["x"]);
        assert!(matches!(
            find_log_files(&file).unwrap_err(),
            FlowError::SourceDirNotFound(_)
        ));
    }

    // ── scan_file ─────────────────────────────────────────────────────────────

    #[test]
    fn test_scan_file_counts_and_flows() {
        let dir = TempDir::new().unwrap();
        let a = close_line("fw01", "10.0.0.1", "10.0.0.2", 443);
        let b = close_line("fw01", "10.0.0.3", "10.0.0.2", 22);
        let malformed = "Oct 12 10:00:00 fw01 RT_FLOW: RT_FLOW_SESSION_CLOSE: \
                         session closed TCP FIN: garbage-no-slash-arrow";
        let path = write_log(
            dir.path(),
            "messages",
            &[&a, "Oct 12 10:00:01 fw01 sshd[1]: accepted", &a, malformed, &b],
        );

        let result = scan_file(&path).unwrap();

        assert_eq!(result.counters.lines_seen, 5);
        assert_eq!(result.counters.session_close_lines, 4);
        assert_eq!(result.counters.parsed_lines, 3);
        assert_eq!(result.counters.failures.missing_endpoints, 1);
        assert_eq!(result.counters.bytes, std::fs::metadata(&path).unwrap().len());
        assert_eq!(result.flows.len(), 2);
        assert_eq!(result.flows[&key("fw01", "10.0.0.1", "10.0.0.2", "443")], 2);
        assert_eq!(result.flows[&key("fw01", "10.0.0.3", "10.0.0.2", "22")], 1);
        assert_eq!(result.flows.values().sum::<u64>(), result.counters.parsed_lines);
    }

    #[test]
    fn test_scan_file_missing_file_is_file_read_error() {
        let err = scan_file(Path::new("/tmp/does-not-exist-flows-test-xyz/messages")).unwrap_err();
        assert!(matches!(err, FlowError::FileRead { .. }));
    }

    #[test]
    fn test_scan_file_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty");
        File::create(&path).unwrap();

        let result = scan_file(&path).unwrap();
        assert_eq!(result.counters, ScanCounters::default());
        assert!(result.flows.is_empty());
    }

    // ── scan_reader ───────────────────────────────────────────────────────────

    #[test]
    fn test_scan_reader_counts_last_line_without_newline() {
        let text = format!("noise\n{}", close_line("fw02", "1.1.1.1", "2.2.2.2", 53));
        let (counters, flows) = scan_reader(Cursor::new(text), &LineParser::new()).unwrap();
        assert_eq!(counters.lines_seen, 2);
        assert_eq!(counters.parsed_lines, 1);
        assert_eq!(flows.len(), 1);
    }

    #[test]
    fn test_scan_reader_crlf_line_endings() {
        let text = format!("{}\r\n", close_line("fw02", "1.1.1.1", "2.2.2.2", 53));
        let (_, flows) = scan_reader(Cursor::new(text), &LineParser::new()).unwrap();
        let (only, _) = flows.iter().next().unwrap();
        assert_eq!(only.protocol, "tcp");
        assert_eq!(only.destination_port, "53");
    }

    #[test]
    fn test_scan_reader_drops_invalid_utf8() {
        let mut bytes = b"Oct 12 10:00:00 fw\xff01 RT_FLOW: ".to_vec();
        bytes.extend_from_slice(
            b"RT_FLOW_SESSION_CLOSE: session closed TCP FIN: 10.0.0.1/1->10.0.0.2/80 protocol tcp\n",
        );
        bytes.extend_from_slice(b"\xfe\xfe\n");

        let (counters, flows) = scan_reader(Cursor::new(bytes), &LineParser::new()).unwrap();

        assert_eq!(counters.lines_seen, 2);
        assert_eq!(counters.parsed_lines, 1);
        assert!(flows.contains_key(&key("fw01", "10.0.0.1", "10.0.0.2", "80")));
    }

    #[test]
    fn test_scan_reader_lone_carriage_return_breaks_lines() {
        let text = format!(
            "{}\r{}\r\nnoise\r",
            close_line("fw02", "1.1.1.1", "2.2.2.2", 53),
            close_line("fw03", "1.1.1.1", "2.2.2.2", 53),
        );
        let (counters, flows) = scan_reader(Cursor::new(text), &LineParser::new()).unwrap();
        assert_eq!(counters.lines_seen, 3);
        assert_eq!(counters.parsed_lines, 2);
        assert!(flows.contains_key(&key("fw03", "1.1.1.1", "2.2.2.2", "53")));
    }

    // ── split_lines ───────────────────────────────────────────────────────────

    fn lines(chunk: &[u8]) -> Vec<&[u8]> {
        split_lines(chunk).collect()
    }

    #[test]
    fn test_split_lines_endings() {
        assert_eq!(lines(b"a\n"), vec![&b"a"[..]]);
        assert_eq!(lines(b"a\r\n"), vec![&b"a"[..]]);
        assert_eq!(lines(b"a\rb\r\n"), vec![&b"a"[..], &b"b"[..]]);
        assert_eq!(lines(b"\n"), vec![&b""[..]]);
        assert_eq!(lines(b"\r\r\n"), vec![&b""[..], &b""[..]]);
    }

    // ── decode_line ───────────────────────────────────────────────────────────

    #[test]
    fn test_decode_line_valid_is_borrowed() {
        assert!(matches!(decode_line(b"plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn test_decode_line_strips_invalid_bytes() {
        assert_eq!(decode_line(b"ab\xc3cd\xff"), "abcd");
    }
}
