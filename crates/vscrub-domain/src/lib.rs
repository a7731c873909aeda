pub mod config;
pub mod format;
pub mod hashing;
pub mod ids;
pub mod log;
pub mod reason;

pub use config::{
    DEFAULT_BINARY_EXTENSIONS, DEFAULT_EXCLUDED_NAMES, DEFAULT_REPORT_PATH, ScrubConfig,
};
pub use format::FormatTag;
pub use hashing::{compute_run_id, update_len_prefixed};
pub use ids::{Digest32, IndexId, RunId};
pub use log::{LogContext, LogLevel, UNKNOWN_LOG_ID, log_error, log_info, log_warn};
pub use reason::ReasonCode;
