use super::*;

use std::collections::BTreeMap;

use vscrub_domain::{LogContext, ReasonCode, compute_run_id, log_error, log_info};
use vscrub_engine::{ArchiveWalker, TreeDriver};

pub(super) fn cmd_run(exe: &str, args: &[String]) -> ExitCode {
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_run_help(exe);
        return ExitCode::from(EXIT_OK);
    }

    let parsed = match parse_run_args(args) {
        Ok(p) => p,
        Err(msg) => return exit_usage(exe, &msg, print_run_help),
    };

    if let Err(msg) = validate_run_args(&parsed) {
        return exit_usage(exe, &msg, print_run_help);
    }

    let mut config = match parsed.sources.load_config() {
        Ok(c) => c,
        Err(msg) => return exit_usage(exe, &msg, print_run_help),
    };
    apply_flag_overrides(&mut config, &parsed);

    if let Some(staging_dir) = &config.staging_dir
        && let Err(msg) = ensure_dir_exists(staging_dir, "staging-dir")
    {
        return exit_usage(exe, &msg, print_run_help);
    }
    if let Err(msg) = ensure_report_outside_output(&config.report_path, &parsed.output) {
        return exit_usage(exe, &msg, print_run_help);
    }

    let loaded = match load_index(&parsed.sources, &config) {
        Ok(l) => l,
        Err(msg) => {
            log_error(
                LogContext::unknown(),
                "source_load_failed",
                ReasonCode::SourceError,
                Some(&msg),
            );
            return ExitCode::from(EXIT_FATAL);
        }
    };
    let index = loaded.index;

    let input_root = resolve_path(&parsed.input).unwrap_or_else(|_| parsed.input.clone());
    let output_root = resolve_path(&parsed.output).unwrap_or_else(|_| parsed.output.clone());
    let index_id = index.index_id();
    let run_id = compute_run_id(TOOL_VERSION, &index_id, &input_root, &output_root);

    let index_id_str = index_id.to_string();
    let run_id_str = run_id.to_string();
    let log_ctx = LogContext::new(&run_id_str, &index_id_str);

    let mut run_start_counters = BTreeMap::<&str, u64>::new();
    run_start_counters.insert("pairs", index.len() as u64);
    run_start_counters.insert("pairs_overridden", loaded.overridden);
    run_start_counters.insert("pairs_skipped_empty", loaded.skipped_empty);
    run_start_counters.insert("max_workers", u64::from(config.max_workers));
    run_start_counters.insert("sniff_unknown", u64::from(config.sniff_unknown));
    log_info(log_ctx, "run_started", None, Some(run_start_counters));

    match vscrub_report::write_cross_reference(&index, &config.report_path) {
        Ok(rows) => {
            let mut counters = BTreeMap::<&str, u64>::new();
            counters.insert("rows", rows as u64);
            log_info(log_ctx, "report_written", None, Some(counters));
        }
        Err(e) => {
            log_error(
                log_ctx,
                "report_write_failed",
                ReasonCode::IoError,
                Some(&index.display_name(&e.to_string())),
            );
            return ExitCode::from(EXIT_FATAL);
        }
    }

    let walker = ArchiveWalker::new(&index, &config, log_ctx);
    let driver = TreeDriver::new(walker, config.max_workers, log_ctx);
    let batch = match driver.run(&parsed.input, &parsed.output) {
        Ok(b) => b,
        Err(e) => {
            log_error(
                log_ctx,
                "tree_setup_failed",
                e.reason_code(),
                Some(&index.display_name(&e.to_string())),
            );
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let mut counters = batch.totals().counters();
    counters.insert("files_total", batch.files.len() as u64);
    counters.insert("files_ok", batch.succeeded() as u64);
    counters.insert("files_failed", batch.failed_count() as u64);
    counters.insert("entries_skipped", batch.skipped_entries);
    log_info(log_ctx, "run_finished", None, Some(counters));

    if batch.is_clean() {
        ExitCode::from(EXIT_OK)
    } else {
        ExitCode::from(EXIT_FILES_FAILED)
    }
}

fn apply_flag_overrides(config: &mut ScrubConfig, parsed: &RunArgs) {
    if let Some(max_workers) = parsed.max_workers {
        config.max_workers = max_workers;
    }
    if let Some(staging_dir) = &parsed.staging_dir {
        config.staging_dir = Some(staging_dir.clone());
    }
    if let Some(sniff) = parsed.sniff {
        config.sniff_unknown = sniff;
    }
    if let Some(report) = &parsed.report {
        config.report_path = report.clone();
    }
}

fn ensure_report_outside_output(report: &Path, output: &Path) -> Result<(), String> {
    let report = resolve_path(report)?;
    let output = resolve_path(output)?;
    if report.starts_with(&output) {
        return Err("report path must not be inside the output tree".to_string());
    }
    Ok(())
}
