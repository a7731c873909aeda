use std::path::{Path, PathBuf};
use std::process::ExitCode;

use vscrub_domain::ScrubConfig;

mod config_file;
mod index_command;
mod run_command;

use config_file::load_config;
use index_command::{cmd_index_lint, load_index};
use run_command::cmd_run;

const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

const EXIT_OK: u8 = 0;
const EXIT_FATAL: u8 = 1;
const EXIT_FILES_FAILED: u8 = 2;
const EXIT_USAGE: u8 = 3;

fn main() -> ExitCode {
    let mut args = std::env::args().collect::<Vec<String>>();
    let exe = args.first().cloned().unwrap_or_else(|| "vscrub".to_string());
    if !args.is_empty() {
        args.remove(0);
    }

    if args.is_empty() || args[0] == "-h" || args[0] == "--help" {
        print_root_help(&exe);
        return ExitCode::from(EXIT_OK);
    }

    match args[0].as_str() {
        "run" => cmd_run(&exe, &args[1..]),
        "index" => cmd_index(&exe, &args[1..]),
        _ => {
            eprintln!("error: unknown command: {}", args[0]);
            eprintln!();
            print_root_help(&exe);
            ExitCode::from(EXIT_USAGE)
        }
    }
}

fn cmd_index(exe: &str, args: &[String]) -> ExitCode {
    if args.is_empty() || args[0] == "-h" || args[0] == "--help" {
        print_index_help(exe);
        return ExitCode::from(EXIT_OK);
    }

    match args[0].as_str() {
        "lint" => cmd_index_lint(exe, &args[1..]),
        other => {
            eprintln!("error: unknown index subcommand: {other}");
            eprintln!();
            print_index_help(exe);
            ExitCode::from(EXIT_USAGE)
        }
    }
}

fn exit_usage(exe: &str, message: &str, help: fn(&str)) -> ExitCode {
    eprintln!("error: {message}");
    eprintln!();
    help(exe);
    ExitCode::from(EXIT_USAGE)
}

#[derive(Debug, Default)]
struct SourceArgs {
    custom: Option<PathBuf>,
    inventory: Option<PathBuf>,
    config: Option<PathBuf>,
}

impl SourceArgs {
    /// Consumes a source flag at `args[*i]`, advancing past its value.
    fn accept(&mut self, args: &[String], i: &mut usize) -> Result<bool, String> {
        let (slot, flag) = match args[*i].as_str() {
            "--custom" => (&mut self.custom, "--custom"),
            "--inventory" => (&mut self.inventory, "--inventory"),
            "--config" => (&mut self.config, "--config"),
            _ => return Ok(false),
        };
        *i += 1;
        *slot = Some(require_value(args, *i, flag)?);
        Ok(true)
    }

    fn validate(&self) -> Result<(), String> {
        if self.custom.is_none() && self.inventory.is_none() {
            return Err(
                "at least one substitution source is required: --custom or --inventory"
                    .to_string(),
            );
        }
        if let Some(custom) = &self.custom {
            ensure_file_exists(custom, "custom")?;
        }
        if let Some(inventory) = &self.inventory {
            ensure_file_exists(inventory, "inventory")?;
        }
        if let Some(config) = &self.config {
            ensure_file_exists(config, "config")?;
        }
        Ok(())
    }

    fn load_config(&self) -> Result<ScrubConfig, String> {
        match &self.config {
            Some(path) => load_config(path),
            None => Ok(ScrubConfig::default()),
        }
    }
}

#[derive(Debug)]
struct RunArgs {
    input: PathBuf,
    output: PathBuf,
    sources: SourceArgs,
    report: Option<PathBuf>,
    max_workers: Option<u32>,
    staging_dir: Option<PathBuf>,
    sniff: Option<bool>,
}

fn parse_run_args(args: &[String]) -> Result<RunArgs, String> {
    let mut input = None;
    let mut output = None;
    let mut sources = SourceArgs::default();
    let mut report = None;
    let mut max_workers = None;
    let mut staging_dir = None;
    let mut sniff = None;

    let mut i = 0;
    while i < args.len() {
        if sources.accept(args, &mut i)? {
            i += 1;
            continue;
        }
        let a = args[i].as_str();
        match a {
            "--input" => {
                i += 1;
                input = Some(require_value(args, i, "--input")?);
            }
            "--output" => {
                i += 1;
                output = Some(require_value(args, i, "--output")?);
            }
            "--report" => {
                i += 1;
                report = Some(require_value(args, i, "--report")?);
            }
            "--staging-dir" => {
                i += 1;
                staging_dir = Some(require_value(args, i, "--staging-dir")?);
            }
            "--max-workers" => {
                i += 1;
                let raw = require_str(args, i, "--max-workers")?;
                let parsed: u32 = raw
                    .parse()
                    .map_err(|_| "--max-workers must be a positive integer".to_string())?;
                if parsed == 0 {
                    return Err("--max-workers must be >= 1".to_string());
                }
                max_workers = Some(parsed);
            }
            "--sniff" => {
                i += 1;
                let raw = require_str(args, i, "--sniff")?;
                sniff = Some(parse_bool_flag("--sniff", raw)?);
            }
            unknown if unknown.starts_with("--") => {
                return Err(format!("unknown flag: {unknown}"));
            }
            other => {
                return Err(format!("unexpected argument: {other}"));
            }
        }
        i += 1;
    }

    Ok(RunArgs {
        input: input.ok_or_else(|| "missing required flag: --input".to_string())?,
        output: output.ok_or_else(|| "missing required flag: --output".to_string())?,
        sources,
        report,
        max_workers,
        staging_dir,
        sniff,
    })
}

fn validate_run_args(args: &RunArgs) -> Result<(), String> {
    ensure_dir_exists(&args.input, "input")?;
    args.sources.validate()?;
    ensure_output_safe(&args.input, &args.output)?;
    if let Some(staging_dir) = &args.staging_dir {
        ensure_dir_exists(staging_dir, "staging-dir")?;
    }
    Ok(())
}

#[derive(Debug)]
struct IndexLintArgs {
    sources: SourceArgs,
}

fn parse_index_lint_args(args: &[String]) -> Result<IndexLintArgs, String> {
    let mut sources = SourceArgs::default();

    let mut i = 0;
    while i < args.len() {
        if sources.accept(args, &mut i)? {
            i += 1;
            continue;
        }
        let a = args[i].as_str();
        if a.starts_with("--") {
            return Err(format!("unknown flag: {a}"));
        }
        return Err(format!("unexpected argument: {a}"));
    }

    Ok(IndexLintArgs { sources })
}

fn require_value(args: &[String], i: usize, flag: &'static str) -> Result<PathBuf, String> {
    require_str(args, i, flag).map(PathBuf::from)
}

fn require_str<'a>(args: &'a [String], i: usize, flag: &'static str) -> Result<&'a str, String> {
    let value = args
        .get(i)
        .ok_or_else(|| format!("missing value for {flag}"))?;
    if value.starts_with("--") {
        return Err(format!("missing value for {flag}"));
    }
    Ok(value.as_str())
}

fn parse_bool_flag(flag: &str, value: &str) -> Result<bool, String> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(format!("{flag} must be 'true' or 'false'")),
    }
}

fn ensure_dir_exists(path: &Path, kind: &str) -> Result<(), String> {
    let meta = std::fs::metadata(path)
        .map_err(|_| format!("{kind} path does not exist or is not accessible"))?;
    if !meta.is_dir() {
        return Err(format!("{kind} path must be a directory"));
    }
    Ok(())
}

fn ensure_file_exists(path: &Path, kind: &str) -> Result<(), String> {
    let meta = std::fs::metadata(path)
        .map_err(|_| format!("{kind} path does not exist or is not accessible"))?;
    if !meta.is_file() {
        return Err(format!("{kind} path must be a file"));
    }
    Ok(())
}

fn ensure_output_safe(input: &Path, output: &Path) -> Result<(), String> {
    match std::fs::metadata(output) {
        Ok(meta) => {
            if !meta.is_dir() {
                return Err("output path must be a directory when it exists".to_string());
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(_) => {
            return Err("output path is not accessible".to_string());
        }
    }

    let input = resolve_path(input)?;
    let output = resolve_path(output)?;
    if output.starts_with(&input) {
        return Err("output path must not be the input path or inside it".to_string());
    }
    Ok(())
}

/// Canonicalizes the longest existing prefix of `path` and appends the rest.
fn resolve_path(path: &Path) -> Result<PathBuf, String> {
    let absolute =
        std::path::absolute(path).map_err(|_| "path cannot be resolved".to_string())?;
    let mut missing = Vec::new();
    let mut current = absolute.as_path();
    loop {
        if let Ok(mut resolved) = std::fs::canonicalize(current) {
            for name in missing.iter().rev() {
                resolved.push(name);
            }
            return Ok(resolved);
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                current = parent;
            }
            _ => return Ok(absolute),
        }
    }
}

fn print_root_help(exe: &str) {
    println!("vscrub (support bundle anonymizer)");
    println!();
    println!("USAGE:");
    println!("  {exe} <COMMAND> [FLAGS]");
    println!();
    println!("COMMANDS:");
    println!("  run          Rewrite an input tree with every sensitive token substituted");
    println!("  index lint   Load substitution sources and print the index_id");
    println!();
    println!("Run '{exe} <COMMAND> --help' for command-specific help.");
}

fn print_run_help(exe: &str) {
    println!("USAGE:");
    println!("  {exe} run --input <DIR> --output <DIR> [--custom <FILE>] [--inventory <FILE>] [FLAGS]");
    println!();
    println!("REQUIRED:");
    println!("  --input <DIR>      Input tree root (read-only)");
    println!("  --output <DIR>     Output tree root (outside the input; created if missing)");
    println!("  at least one of --custom <FILE> or --inventory <FILE>");
    println!();
    println!("SOURCES:");
    println!("  --custom <FILE>      JSON array of {{\"readable\", \"anonymized\"}} pairs");
    println!("  --inventory <FILE>   JSON array of {{\"name\", \"reference\"}} inventory records");
    println!();
    println!("OPTIONAL:");
    println!("  --config <FILE>         JSON config (schema_version \"config.v1\")");
    println!("  --report <PATH>         Cross-reference report path (default: index.html)");
    println!("  --max-workers <N>       Files processed concurrently (>= 1, default: 1)");
    println!("  --staging-dir <DIR>     Directory for temporary spill files");
    println!("  --sniff true|false      Sniff content of files without a known extension");
}

fn print_index_help(exe: &str) {
    println!("USAGE:");
    println!("  {exe} index <SUBCOMMAND> [FLAGS]");
    println!();
    println!("SUBCOMMANDS:");
    println!("  lint   Load substitution sources and print pair count and index_id");
}

fn print_index_lint_help(exe: &str) {
    println!("USAGE:");
    println!("  {exe} index lint [--custom <FILE>] [--inventory <FILE>] [--config <FILE>]");
    println!();
    println!("At least one of --custom or --inventory is required.");
}
