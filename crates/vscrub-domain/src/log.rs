use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::ReasonCode;

pub const UNKNOWN_LOG_ID: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LogContext<'a> {
    pub run_id: &'a str,
    pub index_id: &'a str,
}

impl<'a> LogContext<'a> {
    pub const fn new(run_id: &'a str, index_id: &'a str) -> Self {
        Self { run_id, index_id }
    }

    pub const fn unknown() -> LogContext<'static> {
        LogContext {
            run_id: UNKNOWN_LOG_ID,
            index_id: UNKNOWN_LOG_ID,
        }
    }
}

pub fn log_info(
    ctx: LogContext<'_>,
    event: &str,
    detail: Option<&str>,
    counters: Option<BTreeMap<&str, u64>>,
) {
    emit(render_line(LogLevel::Info, ctx, event, None, detail, counters));
}

pub fn log_warn(ctx: LogContext<'_>, event: &str, reason: ReasonCode, detail: Option<&str>) {
    emit(render_line(
        LogLevel::Warn,
        ctx,
        event,
        Some(reason),
        detail,
        None,
    ));
}

pub fn log_error(ctx: LogContext<'_>, event: &str, reason: ReasonCode, detail: Option<&str>) {
    emit(render_line(
        LogLevel::Error,
        ctx,
        event,
        Some(reason),
        detail,
        None,
    ));
}

/// Renders one JSON log object without a trailing newline.
pub fn render_line(
    level: LogLevel,
    ctx: LogContext<'_>,
    event: &str,
    reason: Option<ReasonCode>,
    detail: Option<&str>,
    counters: Option<BTreeMap<&str, u64>>,
) -> String {
    let mut map = Map::new();
    map.insert("level".to_string(), Value::String(level.as_str().to_string()));
    map.insert("event".to_string(), Value::String(event.to_string()));
    map.insert("run_id".to_string(), Value::String(ctx.run_id.to_string()));
    map.insert(
        "index_id".to_string(),
        Value::String(ctx.index_id.to_string()),
    );
    if let Some(reason) = reason {
        map.insert(
            "reason_code".to_string(),
            Value::String(reason.as_str().to_string()),
        );
    }
    if let Some(detail) = detail {
        map.insert("detail".to_string(), Value::String(detail.to_string()));
    }
    if let Some(counters) = counters {
        let mut c = Map::new();
        for (k, v) in counters {
            c.insert(k.to_string(), Value::Number(v.into()));
        }
        map.insert("counters".to_string(), Value::Object(c));
    }
    Value::Object(map).to_string()
}

fn emit(line: String) {
    eprintln!("{line}");
}
