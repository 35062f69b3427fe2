use crate::backend::TextRange;
use crate::model::CitationGroupId;
use crate::overlap::OverlapReport;

/// Recoverable failures caused by the state of the document or its backend.
///
/// These are caught at the user-action boundary, reported to the user, and the
/// registry is rebuilt from the document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("The document is no longer available")]
    Unavailable,
    #[error("Could not create marker {name}: {reason}")]
    MarkerCreationFailed { name: String, reason: String },
    #[error("Marker {name} is missing from the document")]
    MarkerNotFound { name: String },
    #[error("Range {range} is not valid in this document")]
    InvalidRange { range: TextRange },
    #[error("There is no cursor in the document")]
    NoCursor,
    #[error("{0}")]
    OverlapDetected(OverlapReport),
}

/// Broken invariants. Never caught inside the engine.
#[derive(Debug, thiserror::Error)]
pub enum InvariantError {
    #[error("Malformed marker name {name:?}: {reason}")]
    MalformedMarkerName { name: String, reason: String },
    #[error("Citation group {0} is not registered")]
    UnknownGroup(CitationGroupId),
    #[error("Citation group {group} has no citation at index {index}")]
    UnknownCitation {
        group: CitationGroupId,
        index: usize,
    },
    #[error("Global order requested before it was computed")]
    GlobalOrderNotComputed,
    #[error("Citations of key {key:?} disagree on {field}")]
    InconsistentCitedKey { key: String, field: &'static str },
    #[error("Payload of marker {name} is malformed: {reason}")]
    MalformedPayload { name: String, reason: String },
    #[error("Could not obtain a fill cursor for marker {name}")]
    FillCursorFailed { name: String },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Invariant(#[from] InvariantError),
}

impl Error {
    /// Fatal errors abort the whole user action and must not be handled locally
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Invariant(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
