use std::io;
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize tracing subscriber with sensible defaults and stdout writer.
/// - Respects `RUST_LOG` if set
/// - Falls back to `info,tower_http=info,axum=info`
/// - Writes to stdout to improve visibility in environments that hide stderr
pub fn init_logging_default() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,axum=info"));
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_writer(io::stdout)
        .try_init();
}

/// Initialize tracing subscriber with JSON structured output.
/// - Respects `RUST_LOG` if set, defaults to `info`
/// - Emits structured JSON logs for better machine parsing
pub fn init_logging_json() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,server=debug"));
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .json()
        .with_writer(io::stdout)
        .try_init();
}

/// What a route handler records about an inbound request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RouteTrace {
    pub method: String,
    pub params: Value,
    pub query: Value,
    pub body: Value,
}

/// Leveled logging collaborator handed to stores and route binders at
/// construction time.
pub trait Logger: Send + Sync {
    fn msg(&self, message: &str);
    fn err(&self, message: &str);
    fn route(&self, path: &str, trace: &RouteTrace);
}

/// Forwards every line to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn msg(&self, message: &str) {
        info!(target: "crud", "{message}");
    }

    fn err(&self, message: &str) {
        error!(target: "crud", "Error: {message}");
    }

    fn route(&self, path: &str, trace: &RouteTrace) {
        info!(
            target: "crud::route",
            path,
            method = %trace.method,
            params = %trace.params,
            query = %trace.query,
            body = %trace.body,
            "inbound request"
        );
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogLine {
    Msg(String),
    Err(String),
    Route { path: String, trace: RouteTrace },
}

/// Keeps every line in memory; used by tests to assert on what was logged.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    lines: Mutex<Vec<LogLine>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn routes(&self) -> Vec<(String, RouteTrace)> {
        self.lines()
            .into_iter()
            .filter_map(|line| match line {
                LogLine::Route { path, trace } => Some((path, trace)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, line: LogLine) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}

impl Logger for RecordingLogger {
    fn msg(&self, message: &str) {
        self.push(LogLine::Msg(message.to_string()));
    }

    fn err(&self, message: &str) {
        self.push(LogLine::Err(message.to_string()));
    }

    fn route(&self, path: &str, trace: &RouteTrace) {
        self.push(LogLine::Route { path: path.to_string(), trace: trace.clone() });
    }
}
