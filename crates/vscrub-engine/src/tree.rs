use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use rayon::prelude::*;
use vscrub_domain::{LogContext, ReasonCode, log_error, log_info, log_warn};
use walkdir::WalkDir;

use crate::error::{ScrubError, Stage, TreeError};
use crate::walker::{ArchiveWalker, WalkStats};

#[derive(Debug)]
pub struct FileReport {
    /// Output-relative path, already scrubbed.
    pub relative_path: PathBuf,
    pub outcome: Result<WalkStats, ScrubError>,
}

/// One enumerated input file and the output path it maps to.
#[derive(Debug)]
struct PlannedFile {
    source: PathBuf,
    relative_path: PathBuf,
    rejected: Option<&'static str>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    /// Directory entries that could not be read during enumeration.
    pub skipped_entries: u64,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.outcome.is_err())
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    pub fn is_clean(&self) -> bool {
        self.failed_count() == 0 && self.skipped_entries == 0
    }

    pub fn totals(&self) -> WalkStats {
        let mut totals = WalkStats::default();
        for stats in self.files.iter().filter_map(|f| f.outcome.as_ref().ok()) {
            totals.merge(stats);
        }
        totals
    }
}

/// Mirrors an input directory into an output directory, scrubbing every
/// regular file. A failing file is recorded and the run moves on.
pub struct TreeDriver<'a> {
    walker: ArchiveWalker<'a>,
    max_workers: u32,
    log: LogContext<'a>,
}

impl<'a> TreeDriver<'a> {
    pub fn new(walker: ArchiveWalker<'a>, max_workers: u32, log: LogContext<'a>) -> Self {
        Self {
            walker,
            max_workers: max_workers.max(1),
            log,
        }
    }

    pub fn run(&self, input_root: &Path, output_root: &Path) -> Result<BatchReport, TreeError> {
        fs::read_dir(input_root).map_err(|source| TreeError::InputRoot {
            path: input_root.to_path_buf(),
            source,
        })?;
        fs::create_dir_all(output_root).map_err(|source| TreeError::OutputRoot {
            path: output_root.to_path_buf(),
            source,
        })?;

        let (relative_paths, skipped_entries) = self.enumerate(input_root);
        let planned = self.plan(relative_paths);

        let files: Vec<FileReport> = if self.max_workers == 1 {
            planned
                .into_iter()
                .map(|file| self.process(input_root, output_root, file))
                .collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.max_workers as usize)
                .build()?;
            pool.install(|| {
                planned
                    .into_par_iter()
                    .map(|file| self.process(input_root, output_root, file))
                    .collect()
            })
        };

        Ok(BatchReport {
            files,
            skipped_entries,
        })
    }

    fn enumerate(&self, input_root: &Path) -> (Vec<PathBuf>, u64) {
        let mut relative_paths = Vec::new();
        let mut skipped = 0_u64;
        for entry in WalkDir::new(input_root)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    skipped += 1;
                    let detail = err
                        .path()
                        .and_then(|p| p.strip_prefix(input_root).ok())
                        .map(|p| self.walker.index().scrub_path(p).display().to_string())
                        .unwrap_or_default();
                    log_warn(
                        self.log,
                        "entry_skipped",
                        ReasonCode::IoError,
                        Some(&detail),
                    );
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(input_root) {
                relative_paths.push(rel.to_path_buf());
            }
        }
        (relative_paths, skipped)
    }

    /// Maps every input to its scrubbed output path. A mapping that leaves the
    /// output root, or lands on a path an earlier input already claimed, is
    /// rejected; the earlier file keeps the destination.
    fn plan(&self, relative_paths: Vec<PathBuf>) -> Vec<PlannedFile> {
        let mut claimed = HashSet::new();
        relative_paths
            .into_iter()
            .map(|source| {
                let relative_path = self.walker.index().scrub_path(&source);
                let rejected = if !stays_below_root(&relative_path) {
                    Some("scrubbed path leaves the output directory")
                } else if !claimed.insert(relative_path.clone()) {
                    Some("another input file maps to the same output path")
                } else {
                    None
                };
                PlannedFile {
                    source,
                    relative_path,
                    rejected,
                }
            })
            .collect()
    }

    fn process(&self, input_root: &Path, output_root: &Path, file: PlannedFile) -> FileReport {
        let PlannedFile {
            source,
            relative_path,
            rejected,
        } = file;
        let display = relative_path.display().to_string();
        let outcome = match rejected {
            Some(reason) => Err(ScrubError::io(
                Stage::Create,
                &display,
                io::Error::new(io::ErrorKind::InvalidInput, reason),
            )),
            None => self.scrub_file(
                &input_root.join(&source),
                &output_root.join(&relative_path),
                &display,
            ),
        };
        match &outcome {
            Ok(stats) => log_info(
                self.log,
                "file_scrubbed",
                Some(&display),
                Some(stats.counters()),
            ),
            Err(err) => log_error(
                self.log,
                "file_failed",
                err.reason_code(),
                Some(&err.to_string()),
            ),
        }
        FileReport {
            relative_path,
            outcome,
        }
    }

    fn scrub_file(
        &self,
        source: &Path,
        destination: &Path,
        display: &str,
    ) -> Result<WalkStats, ScrubError> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| ScrubError::io(Stage::CreateDir, display, e))?;
        }
        let input = File::open(source).map_err(|e| ScrubError::io(Stage::Open, display, e))?;
        let output =
            File::create(destination).map_err(|e| ScrubError::io(Stage::Create, display, e))?;

        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut reader = BufReader::new(input);
        let mut writer = BufWriter::new(output);
        let stats = self.walker.scrub_stream(&name, &mut reader, &mut writer)?;
        writer
            .flush()
            .map_err(|e: io::Error| ScrubError::io(Stage::Write, display, e))?;
        Ok(stats)
    }
}

/// True when `relative` has at least one component and every component is a
/// plain name, so joining it onto a root cannot escape that root.
fn stays_below_root(relative: &Path) -> bool {
    let mut components = relative.components().peekable();
    components.peek().is_some() && components.all(|c| matches!(c, Component::Normal(_)))
}
