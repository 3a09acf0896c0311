mod bootstrap;

use anyhow::Result;
use flows_core::formatting::format_count;
use flows_core::settings::Settings;
use flows_data::aggregator::{self, ScanOptions};
use flows_data::report::{build_report, generate_output_path, to_pretty_json, write_report};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;

    tracing::info!("syslog-flows v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Source: {}, Output: {}",
        settings.source_dir.display(),
        settings.output_dir.display()
    );

    let options = ScanOptions {
        max_workers: settings.worker_limit(),
    };
    let result = aggregator::run(&settings.source_dir, &options).await?;

    let report = build_report(&result);
    tracing::info!(
        "{} lines, {} session-close, {} parsed, {} flows",
        format_count(result.counters.lines_seen),
        format_count(result.counters.session_close_lines),
        format_count(result.counters.parsed_lines),
        format_count(report.flows.len() as u64),
    );

    if !settings.quiet {
        println!("{}", to_pretty_json(&report.response_header)?);
    }

    if settings.no_write {
        tracing::info!("Report file skipped (--no-write)");
        return Ok(());
    }

    let path = generate_output_path(&settings.output_dir);
    let status = write_report(&report, &path);
    if status.is_success() {
        tracing::info!("{}: {}", status, status.path().display());
    } else {
        tracing::error!("{}", status);
    }

    Ok(())
}
