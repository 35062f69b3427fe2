//! Keeps citation groups, stored as named markers in a rich-text document, in
//! sync with a bibliography: identity through marker names, visual ordering,
//! numbering and rendering.

pub mod backend;
pub mod codec;
pub mod error;
pub mod frontend;
pub mod model;
pub mod ordering;
pub mod overlap;
pub mod registry;
pub mod session;
pub mod storage;
pub mod style;
pub mod sync;
pub mod transform;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use backend::{BulkEdit, ContainerId, DocumentBackend, RopeDocument, TextRange};
pub use error::{DocumentError, Error, InvariantError, Result};
pub use frontend::{CitationEntry, Frontend};
pub use model::*;
pub use registry::CitationGroups;
pub use session::{Action, ActionOutcome, Session};
pub use storage::{MarkStorage, Placeholders};
pub use style::{AuthorYearStyle, CitationStyle, NumericStyle};
pub use sync::{SyncOptions, SyncReport};
