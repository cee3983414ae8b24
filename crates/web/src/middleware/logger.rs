use crate::context::Context;
use crate::handler::Handler;
use std::collections::HashSet;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct LoggerConfig {
    /// Request paths that are never logged, e.g. health checks.
    pub skip_paths: Vec<String>,
}

/// Emits one `tracing` event per request once the rest of the chain returned:
/// `info` for 1xx-3xx, `warn` for 4xx and `error` for 5xx.
#[derive(Debug, Clone)]
pub struct Logger {
    skip_paths: HashSet<String>,
}

pub fn logger() -> Logger {
    logger_with_config(LoggerConfig::default())
}

pub fn logger_with_config(config: LoggerConfig) -> Logger {
    Logger { skip_paths: config.skip_paths.into_iter().collect() }
}

struct Entry {
    status: u16,
    latency: Duration,
    client_ip: String,
    method: String,
    path: String,
    errors: String,
}

macro_rules! log_entry {
    ($level:ident, $entry:expr) => {
        tracing::$level!(
            status = $entry.status,
            latency = ?$entry.latency,
            client_ip = %$entry.client_ip,
            method = %$entry.method,
            path = %$entry.path,
            errors = %$entry.errors,
            "request served"
        )
    };
}

impl Handler for Logger {
    fn handle(&self, ctx: &mut Context) {
        let start = Instant::now();
        let path = match ctx.uri().query() {
            Some(query) => format!("{}?{query}", ctx.path()),
            None => ctx.path().to_string(),
        };
        let skip = self.skip_paths.contains(ctx.path());

        ctx.next();

        if skip {
            return;
        }

        let entry = Entry {
            status: ctx.response().status().as_u16(),
            latency: start.elapsed(),
            client_ip: ctx.client_ip().unwrap_or_default(),
            method: ctx.method().to_string(),
            path,
            errors: ctx.errors().to_string(),
        };

        match entry.status {
            500.. => log_entry!(error, entry),
            400..500 => log_entry!(warn, entry),
            _ => log_entry!(info, entry),
        }
    }

    fn name(&self) -> &'static str {
        "micro_engine::middleware::logger"
    }
}
