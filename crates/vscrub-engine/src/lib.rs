//! Streaming rewrite of nested archive trees.

pub mod classify;
pub mod error;
pub mod scrub;
pub mod staging;
pub mod tree;
pub mod walker;

pub use classify::{Classifier, SNIFF_LEN, Sniffed, inner_name, sniff_format};
pub use error::{ScrubError, Stage, TreeError};
pub use scrub::{StreamError, copy_verbatim, scrub_lines};
pub use staging::{STAGING_PREFIX, StagingArea, StagingBuffer};
pub use tree::{BatchReport, FileReport, TreeDriver};
pub use walker::{ArchiveWalker, WalkStats};
