use crate::backend::{DocumentBackend, TextRange};
use crate::error::{DocumentError, Result};

use super::Placeholders;

/// Handle onto one named marker in the document.
///
/// Holds only the name: every query goes back to the backend, so a handle
/// never sees a stale position.
#[derive(Debug, Clone)]
pub struct NamedRange<B: DocumentBackend + Clone> {
    pub(super) backend: B,
    pub(super) name: String,
    pub(super) placeholders: Placeholders,
}

impl<B: DocumentBackend + Clone> NamedRange<B> {
    pub(super) fn new(backend: B, name: &str, placeholders: Placeholders) -> Self {
        Self {
            backend,
            name: name.to_string(),
            placeholders,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current position; `None` once the marker has vanished
    pub fn mark_range(&self) -> Result<Option<TextRange>> {
        Ok(self.backend.find_marker(&self.name)?)
    }

    /// Cursor over the stored content, placeholders included
    pub fn raw_cursor(&self) -> Result<Option<TextRange>> {
        self.mark_range()
    }

    pub fn raw_text(&self) -> Result<Option<String>> {
        match self.mark_range()? {
            Some(range) => Ok(Some(self.backend.text(&range)?)),
            None => Ok(None),
        }
    }

    pub(super) fn require_range(&self) -> Result<TextRange> {
        self.mark_range()?.ok_or_else(|| {
            DocumentError::MarkerNotFound {
                name: self.name.clone(),
            }
            .into()
        })
    }

    /// Delete the marker, its text and its side-channel payload.
    ///
    /// A marker that already vanished only loses its payload.
    pub fn remove(&self) -> Result<()> {
        match self.mark_range()? {
            Some(range) => {
                self.backend.remove_marker(&self.name)?;
                self.backend.delete_text(&range)?;
            }
            None => log::debug!("Marker {} already gone", self.name),
        }
        self.backend.remove_side_channel(&self.name)?;
        Ok(())
    }
}
