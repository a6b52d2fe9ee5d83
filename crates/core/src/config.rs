//! Global, read-once, immutable process configuration (C9, §9).
//!
//! Every process in this system — runtime, sidecar, CLI — builds exactly one
//! `Config` from the environment at startup and never mutates or re-reads it.
//! Unlike the profiled `{PROFILE}_{KEY}` convention used elsewhere in this
//! workspace, this system runs one role per process, so the variable set is
//! flat: no profile prefix.

use std::env;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::envelope::CallingConvention;

/// Load a `.env` file if present (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

/// The regex a `HANDLER` value must match (§4.3): dotted path, at least one dot,
/// each segment a valid identifier. Rejects path traversal and shell metacharacters
/// by construction — anything not matching this shape is refused outright.
pub const HANDLER_NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)+$";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("HANDLER is required")]
    MissingHandler,
    #[error("HANDLER '{0}' does not match the required dotted-symbol pattern")]
    InvalidHandlerName(String),
    #[error("HANDLER_ARG_TYPE must be 'payload' or 'message', got '{0}'")]
    InvalidArgType(String),
    #[error("SOCKET_CHMOD '{0}' is not a valid octal mode")]
    InvalidChmod(String),
}

use thiserror::Error;

/// Configuration for a runtime process (C4): the handler it loads and the
/// socket it listens on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub handler: String,
    pub calling_convention_raw: String,
    pub socket_path: String,
    pub socket_chmod: Option<u32>,
    pub chunk_size: usize,
    pub enable_validation: bool,
    pub log_level: String,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let handler = env_opt("HANDLER").ok_or(ConfigError::MissingHandler)?;
        validate_handler_name(&handler)?;

        let calling_convention_raw = env_or("HANDLER_ARG_TYPE", "payload");
        // Validated eagerly so a typo fails at startup, not on first request.
        parse_calling_convention(&calling_convention_raw)?;

        let socket_chmod = match env_opt("SOCKET_CHMOD") {
            None => None,
            Some(s) => Some(parse_octal_mode(&s)?),
        };

        Ok(Self {
            handler,
            calling_convention_raw,
            socket_path: env_or("SOCKET_PATH", "/tmp/sockets/app.sock"),
            socket_chmod,
            chunk_size: env_u64("CHUNK_SIZE", 65536) as usize,
            enable_validation: env_bool("ENABLE_VALIDATION", true),
            log_level: env_or("LOG_LEVEL", "info"),
        })
    }

    pub fn calling_convention(&self) -> CallingConvention {
        parse_calling_convention(&self.calling_convention_raw)
            .expect("validated at construction")
    }

    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "handler": self.handler,
            "calling_convention": self.calling_convention_raw,
            "socket_path": self.socket_path,
            "socket_chmod": self.socket_chmod,
            "chunk_size": self.chunk_size,
            "enable_validation": self.enable_validation,
        })
    }
}

fn validate_handler_name(name: &str) -> Result<(), ConfigError> {
    let re = Regex::new(HANDLER_NAME_PATTERN).expect("static pattern is valid");
    if re.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidHandlerName(name.to_string()))
    }
}

fn parse_calling_convention(raw: &str) -> Result<CallingConvention, ConfigError> {
    match raw.to_lowercase().as_str() {
        "payload" => Ok(CallingConvention::Payload),
        "message" => Ok(CallingConvention::Message),
        other => Err(ConfigError::InvalidArgType(other.to_string())),
    }
}

fn parse_octal_mode(s: &str) -> Result<u32, ConfigError> {
    let trimmed = s.trim_start_matches("0o").trim_start_matches("0O");
    u32::from_str_radix(trimmed, 8).map_err(|_| ConfigError::InvalidChmod(s.to_string()))
}

/// Configuration for a sidecar process (C7): broker queues, timeouts, and the
/// gateway/object-storage settings its terminal handlers need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarConfig {
    pub socket_path: String,
    pub queue_name: String,
    pub next_queue: Option<String>,
    pub happy_terminal_queue: String,
    pub error_terminal_queue: String,
    pub dlq_name: String,
    pub request_timeout_secs: u64,
    pub prefetch: u32,
    pub batch_size: u32,
    pub log_level: String,
    pub health_interval_secs: u64,
    pub shutdown_timeout_secs: u64,
    pub metrics_port: Option<u16>,
    pub max_delivery_attempts: u32,
    pub terminal: TerminalConfig,
}

impl SidecarConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            socket_path: env_or("SOCKET_PATH", "/tmp/sockets/app.sock"),
            queue_name: env_or("QUEUE_NAME", "step"),
            next_queue: env_opt("NEXT_QUEUE"),
            happy_terminal_queue: env_or("HAPPY_TERMINAL_QUEUE", "happy-terminal"),
            error_terminal_queue: env_or("ERROR_TERMINAL_QUEUE", "error-terminal"),
            dlq_name: env_or("DLQ_NAME", "dead-letter-queue"),
            request_timeout_secs: env_u64("REQUEST_TIMEOUT_SECS", 30),
            prefetch: env_u32("PREFETCH", 10),
            batch_size: env_u32("BATCH_SIZE", 10),
            log_level: env_or("LOG_LEVEL", "info"),
            health_interval_secs: env_u64("HEALTH_INTERVAL_SECS", 30),
            shutdown_timeout_secs: env_u64("SHUTDOWN_TIMEOUT_SECS", 10),
            metrics_port: env_opt("METRICS_PORT").and_then(|v| v.parse().ok()),
            max_delivery_attempts: env_u32("MAX_DELIVERY_ATTEMPTS", 3),
            terminal: TerminalConfig::from_env(),
        })
    }

    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "socket_path": self.socket_path,
            "queue_name": self.queue_name,
            "next_queue": self.next_queue,
            "happy_terminal_queue": self.happy_terminal_queue,
            "error_terminal_queue": self.error_terminal_queue,
            "dlq_name": self.dlq_name,
            "request_timeout_secs": self.request_timeout_secs,
            "prefetch": self.prefetch,
            "batch_size": self.batch_size,
            "metrics_port": self.metrics_port,
            "terminal": self.terminal.redacted_summary(),
        })
    }
}

/// Configuration for the terminal handlers (C6): gateway + object-storage.
/// Both clients are optional — absence means "this responsibility is a no-op
/// for this deployment", not an error (§10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    pub gateway_url: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    pub s3_region: String,
    pub s3_results_prefix: String,
    pub s3_errors_prefix: String,
}

impl TerminalConfig {
    pub fn from_env() -> Self {
        Self {
            gateway_url: env_opt("GATEWAY_URL"),
            s3_bucket: env_opt("S3_BUCKET"),
            s3_endpoint: env_opt("S3_ENDPOINT"),
            s3_access_key: env_opt("S3_ACCESS_KEY"),
            s3_secret_key: env_opt("S3_SECRET_KEY"),
            s3_region: env_or("S3_REGION", "us-east-1"),
            s3_results_prefix: env_or("S3_RESULTS_PREFIX", "asya-results/"),
            s3_errors_prefix: env_or("S3_ERRORS_PREFIX", "asya-errors/"),
        }
    }

    pub fn object_storage_configured(&self) -> bool {
        self.s3_bucket.is_some()
    }

    pub fn gateway_configured(&self) -> bool {
        self.gateway_url.is_some()
    }

    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "gateway_configured": self.gateway_configured(),
            "object_storage_configured": self.object_storage_configured(),
            "s3_results_prefix": self.s3_results_prefix,
            "s3_errors_prefix": self.s3_errors_prefix,
        })
    }
}
