// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! Closed error taxonomy for the ingestion pipeline.
//!
//! Every failure raised anywhere in the workspace carries one of these
//! codes. The code is what gets logged, broadcast in [`crate::StatusEvent`]
//! payloads, and classified by the retry policy — never a bare string.

use std::fmt;

/// Broad failure category, independent of the specific code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Input failed a validation schema before any work started.
    Validation,
    /// An external collaborator (db, queue, network) failed in a way that
    /// may succeed on retry.
    Transient,
    /// An external collaborator failed in a way retry cannot fix.
    Fatal,
    /// The data was well-formed but violates a domain rule.
    Business,
    /// Failure in an ambient concern (logging sink, broadcaster) rather
    /// than the job itself.
    System,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Transient => "transient",
            Self::Fatal => "fatal",
            Self::Business => "business",
            Self::System => "system",
        };
        f.write_str(s)
    }
}

/// A closed enumeration of every error this pipeline can raise.
///
/// Codes are stable identifiers (`RCP-<letter><3 digits>`): `V` validation,
/// `T` transient, `F` fatal, `B` business rule, `S` system/ambient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A required field was missing from job data.
    MissingField,
    /// A field value failed a schema constraint (range, format, length).
    InvalidField,
    /// The note content exceeded the maximum accepted size.
    ContentTooLarge,
    /// The note content was empty.
    ContentEmpty,

    /// The persistence layer could not be reached.
    PersistenceUnavailable,
    /// The queue broker could not be reached.
    QueueUnavailable,
    /// An HTML fetch or parse operation timed out.
    ParseTimeout,

    /// The persistence layer rejected the write irrecoverably (constraint
    /// violation, schema mismatch).
    PersistenceRejected,
    /// The HTML payload could not be parsed under any recovery path.
    UnparsableContent,

    /// An ingredient or instruction line referenced a note that is not
    /// known to the pipeline.
    UnknownNote,
    /// A notebook name did not map to any known category.
    UncategorizedNotebook,
    /// A job was routed to a worker that does not handle its action.
    UnsupportedAction,

    /// A failure of unknown shape from an opaque dependency (propagated
    /// from a library error type this crate does not otherwise classify).
    Unknown,
    /// The status broadcaster failed to notify subscribers; the job itself
    /// still completed.
    BroadcastFailed,
    /// The structured logger failed to emit a record.
    LogSinkFailed,
}

impl ErrorCode {
    /// The stable wire/log code, e.g. `"RCP-V001"`.
    pub fn code(self) -> &'static str {
        match self {
            Self::MissingField => "RCP-V001",
            Self::InvalidField => "RCP-V002",
            Self::ContentTooLarge => "RCP-V003",
            Self::ContentEmpty => "RCP-V004",

            Self::PersistenceUnavailable => "RCP-T001",
            Self::QueueUnavailable => "RCP-T002",
            Self::ParseTimeout => "RCP-T003",

            Self::PersistenceRejected => "RCP-F001",
            Self::UnparsableContent => "RCP-F002",

            Self::UnknownNote => "RCP-B001",
            Self::UncategorizedNotebook => "RCP-B002",
            Self::UnsupportedAction => "RCP-B003",

            Self::Unknown => "RCP-S001",
            Self::BroadcastFailed => "RCP-S002",
            Self::LogSinkFailed => "RCP-S003",
        }
    }

    /// The broad category this code belongs to.
    pub fn category(self) -> ErrorCategory {
        match self {
            Self::MissingField | Self::InvalidField | Self::ContentTooLarge | Self::ContentEmpty => {
                ErrorCategory::Validation
            }
            Self::PersistenceUnavailable | Self::QueueUnavailable | Self::ParseTimeout => {
                ErrorCategory::Transient
            }
            Self::PersistenceRejected | Self::UnparsableContent => ErrorCategory::Fatal,
            Self::UnknownNote | Self::UncategorizedNotebook | Self::UnsupportedAction => {
                ErrorCategory::Business
            }
            Self::Unknown | Self::BroadcastFailed | Self::LogSinkFailed => ErrorCategory::System,
        }
    }

    /// A short human-readable description, stable across releases.
    pub fn description(self) -> &'static str {
        match self {
            Self::MissingField => "a required field was missing",
            Self::InvalidField => "a field value failed validation",
            Self::ContentTooLarge => "content exceeded the maximum accepted size",
            Self::ContentEmpty => "content was empty",
            Self::PersistenceUnavailable => "the persistence layer could not be reached",
            Self::QueueUnavailable => "the queue broker could not be reached",
            Self::ParseTimeout => "parsing timed out",
            Self::PersistenceRejected => "the persistence layer rejected the write",
            Self::UnparsableContent => "content could not be parsed",
            Self::UnknownNote => "the referenced note is unknown",
            Self::UncategorizedNotebook => "the notebook did not map to a known category",
            Self::UnsupportedAction => "the action is not supported by this worker",
            Self::Unknown => "an unclassified failure occurred",
            Self::BroadcastFailed => "status broadcast failed",
            Self::LogSinkFailed => "the log sink rejected a record",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code(), self.category(), self.description())
    }
}

/// All codes, for catalog generation and tests that assert every code has
/// a unique wire string.
pub const ALL_CODES: &[ErrorCode] = &[
    ErrorCode::MissingField,
    ErrorCode::InvalidField,
    ErrorCode::ContentTooLarge,
    ErrorCode::ContentEmpty,
    ErrorCode::PersistenceUnavailable,
    ErrorCode::QueueUnavailable,
    ErrorCode::ParseTimeout,
    ErrorCode::PersistenceRejected,
    ErrorCode::UnparsableContent,
    ErrorCode::UnknownNote,
    ErrorCode::UncategorizedNotebook,
    ErrorCode::UnsupportedAction,
    ErrorCode::Unknown,
    ErrorCode::BroadcastFailed,
    ErrorCode::LogSinkFailed,
];

/// The workspace's primary error type: a code plus a message and an
/// optional chained cause.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct RecipeError {
    /// The classified code.
    pub code: ErrorCode,
    /// A human-readable message, not guaranteed stable across releases.
    pub message: String,
    /// The underlying cause, if any.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl RecipeError {
    /// Build an error with no chained cause.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), source: None }
    }

    /// Build an error wrapping an underlying cause.
    pub fn wrap(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self { code, message: message.into(), source: Some(Box::new(source)) }
    }
}
