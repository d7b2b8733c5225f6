//! Error types for greentwin.
//!
//! All errors are strongly typed using thiserror. Fatal errors carry the
//! tick stage and the field or path involved, so a failed tick can be
//! diagnosed without a debugger.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::TickStage;

/// Schema errors raised while loading persisted state.
///
/// A schema error means the persisted document is structurally wrong and
/// loading must fail. Out-of-range *values* are never schema errors; they
/// are clamped on write instead.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("State file is not valid JSON: {reason}")]
    MalformedJson {
        reason: String,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Field '{field}' is not a finite number")]
    NonFiniteNumber {
        field: String,
    },

    #[error("Invalid zone id '{raw}': expected B<01-08>-<A|B|C>")]
    InvalidZoneId {
        raw: String,
    },

    #[error("Expected {expected} zones in bed/sub-zone order, found {actual}")]
    WrongZoneCount {
        expected: usize,
        actual: usize,
    },

    #[error("Zone at index {index} is '{actual}', expected '{expected}' (bed 1-8 x A,B,C order)")]
    ZoneOutOfOrder {
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("Unknown zone status '{raw}'")]
    UnknownStatus {
        raw: String,
    },
}

/// Top-level error type for greentwin.
///
/// Recoverable variants (`UnknownTarget`, `ReasoningUnavailable`, `Sync`)
/// are handled within a tick and annotated in the resulting history
/// record. `Schema` and `Persistence` abort the operation that raised
/// them.
#[derive(Debug, Error)]
pub enum TwinError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Recommendation targets unknown actuator or zone '{target}'")]
    UnknownTarget {
        target: String,
    },

    #[error("Reasoning unavailable: {reason}")]
    ReasoningUnavailable {
        reason: String,
    },

    #[error("Overlay sync failed: {reason}")]
    Sync {
        reason: String,
    },

    #[error("Persistence failed at {stage} for {}: {source}", path.display())]
    Persistence {
        stage: TickStage,
        path: PathBuf,
        source: std::io::Error,
    },
}

impl TwinError {
    /// Creates a `ReasoningUnavailable` error.
    #[must_use]
    pub fn reasoning_unavailable(reason: impl Into<String>) -> Self {
        Self::ReasoningUnavailable {
            reason: reason.into(),
        }
    }

    /// Creates a `Sync` error.
    #[must_use]
    pub fn sync(reason: impl Into<String>) -> Self {
        Self::Sync {
            reason: reason.into(),
        }
    }

    /// Creates a `Persistence` error with stage and path context.
    #[must_use]
    pub fn persistence(stage: TickStage, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            stage,
            path: path.into(),
            source,
        }
    }

    /// Returns true if this error is recoverable within a tick.
    ///
    /// Recoverable errors are noted in the tick's history record instead
    /// of aborting it.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnknownTarget { .. } | Self::ReasoningUnavailable { .. } | Self::Sync { .. }
        )
    }

    /// Returns true if this is a reasoning failure that must trigger the
    /// local-rules fallback.
    #[must_use]
    pub const fn is_reasoning_unavailable(&self) -> bool {
        matches!(self, Self::ReasoningUnavailable { .. })
    }

    /// Returns true if this is a schema error.
    #[must_use]
    pub const fn is_schema(&self) -> bool {
        matches!(self, Self::Schema(_))
    }
}

/// Result type alias for greentwin operations.
pub type TwinResult<T> = Result<T, TwinError>;
