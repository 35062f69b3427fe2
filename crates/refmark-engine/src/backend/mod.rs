/*!
 * # Document Backend
 *
 * The narrow capability the engine needs from a rich-text document:
 *
 * - **Named markers**: create over a range, find by name, list, remove
 * - **Side channel**: one string property per name, independent of marker content
 * - **Text access**: read, insert, replace and delete text by range
 * - **Footnotes**: map a range inside a footnote to the footnote's anchor mark
 * - **Controller lock**: suppress redraw while a long pass runs
 *
 * Offsets are byte offsets into the UTF-8 text of one container and must fall
 * on character boundaries. Ranges are only comparable within one container.
 *
 * All methods take `&self`: backends are handles onto a shared document and are
 * driven from a single control thread.
 */

pub mod commands;
pub mod marks;
pub mod rope;

use std::cmp::Ordering;
use std::fmt;

use crate::error::DocumentError;

pub use commands::Edit;
pub use rope::RopeDocument;

/// One independent text flow of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContainerId {
    Body,
    Footnote(u32),
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerId::Body => write!(f, "body"),
            ContainerId::Footnote(n) => write!(f, "footnote {n}"),
        }
    }
}

/// A byte range `[start, end)` inside one container.
///
/// Also serves as a cursor: a collapsed range is an insertion point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextRange {
    pub container: ContainerId,
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(container: ContainerId, start: usize, end: usize) -> Self {
        Self {
            container,
            start,
            end,
        }
    }

    pub fn collapsed(container: ContainerId, at: usize) -> Self {
        Self::new(container, at, at)
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn collapse_to_start(&self) -> Self {
        Self::collapsed(self.container, self.start)
    }

    pub fn collapse_to_end(&self) -> Self {
        Self::collapsed(self.container, self.end)
    }

    pub fn span(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    /// Compare start positions; `None` for ranges in different containers
    pub fn compare_starts(&self, other: &TextRange) -> Option<Ordering> {
        (self.container == other.container).then(|| self.start.cmp(&other.start))
    }

    /// Compare end positions; `None` for ranges in different containers
    pub fn compare_ends(&self, other: &TextRange) -> Option<Ordering> {
        (self.container == other.container).then(|| self.end.cmp(&other.end))
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}..{}]", self.container, self.start, self.end)
    }
}

pub trait DocumentBackend {
    /// Names of all markers, in arbitrary order
    fn marker_names(&self) -> Result<Vec<String>, DocumentError>;

    fn find_marker(&self, name: &str) -> Result<Option<TextRange>, DocumentError>;

    /// Turn an existing range into a marker. An empty range creates a point marker.
    fn create_marker(&self, name: &str, range: TextRange) -> Result<(), DocumentError>;

    /// Remove the marker only; its text stays in the document
    fn remove_marker(&self, name: &str) -> Result<(), DocumentError>;

    fn side_channel(&self, name: &str) -> Result<Option<String>, DocumentError>;

    fn set_side_channel(&self, name: &str, value: &str) -> Result<(), DocumentError>;

    fn remove_side_channel(&self, name: &str) -> Result<(), DocumentError>;

    /// The user's current cursor, if the document has one
    fn cursor(&self) -> Result<Option<TextRange>, DocumentError>;

    /// The anchor mark in the body for a range inside a footnote
    fn footnote_anchor_of(&self, range: &TextRange) -> Result<Option<TextRange>, DocumentError>;

    fn text(&self, range: &TextRange) -> Result<String, DocumentError>;

    fn container_text(&self, container: ContainerId) -> Result<String, DocumentError>;

    /// Insert at `at.start`, returning the range of the inserted text
    fn insert_text(&self, at: &TextRange, text: &str) -> Result<TextRange, DocumentError>;

    /// Replace the text of `range`, returning the range of the new text
    fn replace_text(&self, range: &TextRange, text: &str) -> Result<TextRange, DocumentError>;

    fn delete_text(&self, range: &TextRange) -> Result<(), DocumentError>;

    fn lock_controllers(&self) -> Result<(), DocumentError>;

    fn unlock_controllers(&self) -> Result<(), DocumentError>;
}

/// Bulk-edit token: controllers stay locked until the guard is dropped.
pub struct BulkEdit<B: DocumentBackend> {
    backend: B,
}

impl<B: DocumentBackend> BulkEdit<B> {
    pub fn begin(backend: B) -> Result<Self, DocumentError> {
        backend.lock_controllers()?;
        Ok(Self { backend })
    }
}

impl<B: DocumentBackend> Drop for BulkEdit<B> {
    fn drop(&mut self) {
        if let Err(e) = self.backend.unlock_controllers() {
            log::warn!("Failed to unlock document controllers: {e}");
        }
    }
}
