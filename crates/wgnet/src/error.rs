//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a category exit code.

use miette::Diagnostic;
use thiserror::Error;

use wgnet_config::ConfigError;
use wgnet_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(wgnet::not_found),
        help("Run: wgnet {list_command} to see what exists")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{message}")]
    #[diagnostic(code(wgnet::conflict))]
    Conflict { message: String },

    #[error("No free address left in {subnet}")]
    #[diagnostic(
        code(wgnet::pool_exhausted),
        help("Remove unused devices (wgnet devices list) or widen network.tunnel_cidr.")
    )]
    PoolExhausted { subnet: String },

    // ── Authorization ────────────────────────────────────────────────
    #[error("Unauthorized")]
    #[diagnostic(code(wgnet::unauthorized))]
    Unauthorized,

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(wgnet::validation))]
    Validation { field: String, reason: String },

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(wgnet::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No session secret configured")]
    #[diagnostic(
        code(wgnet::no_secret),
        help(
            "Store one with: wgnet config set-secret\n\
             Or set auth.session_secret_env to the name of an environment variable."
        )
    )]
    NoSecret,

    #[error("Configuration error: {message}")]
    #[diagnostic(code(wgnet::config), help("Config file: {path}"))]
    Config { message: String, path: String },

    // ── Storage ──────────────────────────────────────────────────────
    #[error("Database error: {0}")]
    #[diagnostic(code(wgnet::store), help("Check --db / storage.db_path and file permissions."))]
    Store(String),

    #[error("Unexpected result from {command}")]
    #[diagnostic(code(wgnet::unexpected))]
    Unexpected { command: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } | Self::PoolExhausted { .. } => exit_code::CONFLICT,
            Self::Unauthorized => exit_code::AUTH,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::NoSecret
            | Self::Config { .. }
            | Self::Store(_)
            | Self::Unexpected { .. }
            | Self::Io(_) => exit_code::GENERAL,
        }
    }

    pub fn config(err: ConfigError, path: &std::path::Path) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoSecret => Self::NoSecret,
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config {
                message: other.to_string(),
                path: path.display().to_string(),
            },
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { field, reason } => Self::Validation { field, reason },

            CoreError::NotFound {
                entity_type,
                identifier,
            } => Self::NotFound {
                list_command: list_command(&entity_type),
                resource_type: entity_type,
                identifier,
            },

            CoreError::PoolExhausted { subnet } => Self::PoolExhausted { subnet },

            err @ (CoreError::AlreadyExists { .. }
            | CoreError::ConflictingRecordType { .. }
            | CoreError::KeyAlreadyBound { .. }) => Self::Conflict {
                message: err.to_string(),
            },

            CoreError::Unauthorized { .. } => Self::Unauthorized,

            err @ CoreError::Store { .. } => Self::Store(err.to_string()),
        }
    }
}

fn list_command(entity_type: &str) -> String {
    match entity_type {
        "user" => "users list".into(),
        "device" => "devices list".into(),
        "domain" => "dns list".into(),
        other => format!("{other}s list"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_category_exit_codes() {
        let cases = [
            (CoreError::validation("label", "empty"), exit_code::USAGE),
            (CoreError::not_found("device", "10.0.0.9"), exit_code::NOT_FOUND),
            (CoreError::unauthorized("nope"), exit_code::AUTH),
            (
                CoreError::PoolExhausted {
                    subnet: "10.0.0.0/30".into(),
                },
                exit_code::CONFLICT,
            ),
        ];
        for (core, code) in cases {
            assert_eq!(CliError::from(core).exit_code(), code);
        }
    }

    #[test]
    fn not_found_points_at_list_command() {
        let err = CliError::from(CoreError::not_found("domain", "x.lan"));
        assert!(matches!(
            err,
            CliError::NotFound { ref list_command, .. } if list_command == "dns list"
        ));
    }
}
