use super::*;

use vscrub_domain::{LogContext, ReasonCode, log_error};
use vscrub_index::{
    CustomListFile, IndexBuilder, InventorySnapshotFile, SubstitutionIndex, SubstitutionSource,
};

pub(super) struct LoadedIndex {
    pub(super) index: SubstitutionIndex,
    pub(super) overridden: u64,
    pub(super) skipped_empty: u64,
}

/// Loads the inventory snapshot first and the custom list second, so custom
/// pairs override inventory pairs for the same token.
pub(super) fn load_index(sources: &SourceArgs, config: &ScrubConfig) -> Result<LoadedIndex, String> {
    let mut loaders: Vec<Box<dyn SubstitutionSource>> = Vec::new();
    if let Some(path) = &sources.inventory {
        loaders.push(Box::new(InventorySnapshotFile::new(
            path,
            config.excluded_names.iter().cloned(),
        )));
    }
    if let Some(path) = &sources.custom {
        loaders.push(Box::new(CustomListFile::new(path)));
    }

    let mut builder = IndexBuilder::new();
    for loader in &loaders {
        let pairs = loader
            .load()
            .map_err(|e| format!("{} source failed: {e}", loader.kind()))?;
        builder.extend(pairs);
    }
    let overridden = builder.overridden();
    let skipped_empty = builder.skipped_empty();
    let index = builder.build().map_err(|e| e.to_string())?;

    Ok(LoadedIndex {
        index,
        overridden,
        skipped_empty,
    })
}

pub(super) fn cmd_index_lint(exe: &str, args: &[String]) -> ExitCode {
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_index_lint_help(exe);
        return ExitCode::from(EXIT_OK);
    }

    let parsed = match parse_index_lint_args(args) {
        Ok(p) => p,
        Err(msg) => return exit_usage(exe, &msg, print_index_lint_help),
    };
    if let Err(msg) = parsed.sources.validate() {
        return exit_usage(exe, &msg, print_index_lint_help);
    }
    let config = match parsed.sources.load_config() {
        Ok(c) => c,
        Err(msg) => return exit_usage(exe, &msg, print_index_lint_help),
    };

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

    println!("pairs: {}", loaded.index.len());
    println!("overridden: {}", loaded.overridden);
    println!("skipped_empty: {}", loaded.skipped_empty);
    println!("index_id: {}", loaded.index.index_id());
    ExitCode::from(EXIT_OK)
}
