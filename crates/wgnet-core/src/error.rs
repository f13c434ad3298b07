// ── Core error types ──
//
// Every failure a component can report. Callers that surface errors to
// remote peers should use `public_message()` so that authorization and
// storage failures never leak resolution details.

use thiserror::Error;

use crate::model::RecordKind;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input errors ─────────────────────────────────────────────────
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    #[error("{entity_type} already exists: {identifier}")]
    AlreadyExists {
        entity_type: String,
        identifier: String,
    },

    #[error("Domain {name} holds {existing} records; remove them before setting {requested}")]
    ConflictingRecordType {
        name: String,
        existing: RecordKind,
        requested: RecordKind,
    },

    #[error("Address pool {subnet} is exhausted")]
    PoolExhausted { subnet: String },

    #[error("Public key is already bound to {address}")]
    KeyAlreadyBound { address: String },

    // ── Authorization ────────────────────────────────────────────────
    /// The reason is kept for logs only; `Display` never shows it.
    #[error("Unauthorized")]
    Unauthorized { reason: String },

    // ── Backing store ────────────────────────────────────────────────
    #[error("Store failure during {context}: {message}")]
    Store { context: String, message: String },
}

/// Coarse failure category, used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unauthorized,
    StoreFailure,
}

impl CoreError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(entity_type: impl Into<String>, identifier: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            identifier: identifier.to_string(),
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. }
            | Self::ConflictingRecordType { .. }
            | Self::PoolExhausted { .. }
            | Self::KeyAlreadyBound { .. } => ErrorKind::Conflict,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Store { .. } => ErrorKind::StoreFailure,
        }
    }

    /// Message safe to hand to an untrusted caller.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Unauthorized => "unauthorized".into(),
            ErrorKind::StoreFailure => "internal error".into(),
            _ => self.to_string(),
        }
    }
}

/// Builds a closure mapping any backend error into [`CoreError::Store`].
pub(crate) fn storage<E: std::fmt::Display>(context: &'static str) -> impl Fn(E) -> CoreError {
    move |err| CoreError::Store {
        context: context.into(),
        message: err.to_string(),
    }
}
