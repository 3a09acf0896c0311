use clap::Parser;
use std::path::PathBuf;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Aggregate Junos RT_FLOW_SESSION_CLOSE syslog records into a flow report
#[derive(Parser, Debug, Clone)]
#[command(
    name = "syslog-flows",
    about = "Aggregate Junos RT_FLOW_SESSION_CLOSE syslog records into a flow report",
    version
)]
pub struct Settings {
    /// Directory holding the syslog files to scan (not recursive)
    #[arg(long, default_value = "syslog")]
    pub source_dir: PathBuf,

    /// Directory the JSON report is written to
    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Maximum number of files scanned concurrently (defaults to CPU count)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=1024))]
    pub workers: Option<u32>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Also write log lines to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Do not print the response header to stdout
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Skip writing the report file
    #[arg(long)]
    pub no_write: bool,
}

impl Settings {
    /// Parse the process arguments and apply the `--debug` override.
    pub fn load() -> Self {
        Self::resolve(Settings::parse())
    }

    /// Same as [`Settings::load`] for an explicit argument list.
    pub fn load_from<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::resolve(Settings::parse_from(args))
    }

    /// Number of workers requested on the command line, if any.
    pub fn worker_limit(&self) -> Option<usize> {
        self.workers.map(|w| w as usize)
    }

    fn resolve(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["syslog-flows"]);

        assert_eq!(settings.source_dir, PathBuf::from("syslog"));
        assert_eq!(settings.output_dir, PathBuf::from("output"));
        assert!(settings.workers.is_none());
        assert_eq!(settings.log_level, "INFO");
        assert!(settings.log_file.is_none());
        assert!(!settings.debug);
        assert!(!settings.quiet);
        assert!(!settings.no_write);
    }

    #[test]
    fn test_settings_cli_directories() {
        let settings = Settings::parse_from([
            "syslog-flows",
            "--source-dir",
            "/var/log/srx",
            "--output-dir",
            "/tmp/reports",
        ]);
        assert_eq!(settings.source_dir, PathBuf::from("/var/log/srx"));
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/reports"));
    }

    #[test]
    fn test_settings_cli_workers() {
        let settings = Settings::parse_from(["syslog-flows", "--workers", "4"]);
        assert_eq!(settings.worker_limit(), Some(4));
    }

    #[test]
    fn test_settings_cli_workers_zero_rejected() {
        let result = Settings::try_parse_from(["syslog-flows", "--workers", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_cli_log_level_rejects_unknown() {
        let result = Settings::try_parse_from(["syslog-flows", "--log-level", "TRACE"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_cli_flags() {
        let settings = Settings::parse_from(["syslog-flows", "-q", "--no-write"]);
        assert!(settings.quiet);
        assert!(settings.no_write);
    }

    #[test]
    fn test_load_from_debug_overrides_log_level() {
        let settings = Settings::load_from(["syslog-flows", "--log-level", "ERROR", "--debug"]);
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_load_from_keeps_log_file() {
        let settings = Settings::load_from(["syslog-flows", "--log-file", "/tmp/flows.log"]);
        assert_eq!(settings.log_file, Some(PathBuf::from("/tmp/flows.log")));
        assert_eq!(settings.log_level, "INFO");
    }
}
