//! Rewriting marker content without ever letting the marker go empty.
//!
//! Backends drop markers whose content shrinks to nothing, and text typed at a
//! marker's edge may land in a neighbour. So content is always replaced from
//! the inside: the interior is swapped for a placeholder pair first, the old
//! edge characters are deleted next, and new text goes strictly between the
//! placeholders.

use crate::backend::{DocumentBackend, TextRange};
use crate::error::{InvariantError, Result};

use super::NamedRange;

impl<B: DocumentBackend + Clone> NamedRange<B> {
    /// Reduce the marker's content to the placeholder pair and return the
    /// insertion point between the two placeholders.
    pub fn fill_cursor(&self) -> Result<TextRange> {
        let range = self.require_range()?;
        let content = self.backend.text(&range)?;

        let mut chars = content.chars();
        let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
            return self.recreate_with_placeholders(range);
        };

        let both = self.placeholders.both();
        let interior = TextRange::new(
            range.container,
            range.start + first.len_utf8(),
            range.end - last.len_utf8(),
        );
        self.backend.replace_text(&interior, &both)?;

        let first_char = TextRange::new(range.container, range.start, interior.start);
        self.backend.delete_text(&first_char)?;

        let filled = self.require_range()?;
        let last_char = TextRange::new(
            filled.container,
            filled.end - last.len_utf8(),
            filled.end,
        );
        self.backend.delete_text(&last_char)?;

        self.cursor_between_placeholders()
    }

    /// Markers with fewer than two characters cannot be filled from the
    /// inside; replace them by a fresh marker over the placeholder pair.
    fn recreate_with_placeholders(&self, range: TextRange) -> Result<TextRange> {
        log::debug!("Recreating marker {} around placeholders", self.name);
        self.backend.remove_marker(&self.name)?;
        self.backend.delete_text(&range)?;
        let content = self
            .backend
            .insert_text(&range.collapse_to_start(), &self.placeholders.both())?;

        if let Err(first) = self.backend.create_marker(&self.name, content) {
            log::warn!("Recreating marker {} failed, retrying: {first}", self.name);
            self.backend
                .create_marker(&self.name, content)
                .map_err(|_| InvariantError::FillCursorFailed {
                    name: self.name.clone(),
                })?;
        }

        self.cursor_between_placeholders()
    }

    fn cursor_between_placeholders(&self) -> Result<TextRange> {
        let range = self.require_range()?;
        if self.backend.text(&range)? != self.placeholders.both() {
            return Err(InvariantError::FillCursorFailed {
                name: self.name.clone(),
            }
            .into());
        }
        Ok(TextRange::collapsed(
            range.container,
            range.start + self.placeholders.left.len(),
        ))
    }

    /// Strip the placeholders once the caller has written through the fill
    /// cursor.
    ///
    /// With nothing written between them they stay, keeping the marker alive,
    /// unless `force_strip` is set.
    pub fn clean_fill_cursor(&self, force_strip: bool) -> Result<()> {
        let range = self.require_range()?;
        let content = self.backend.text(&range)?;
        let left = self.placeholders.left.as_str();
        let right = self.placeholders.right.as_str();

        let Some(inner) = content
            .strip_prefix(left)
            .and_then(|rest| rest.strip_suffix(right))
        else {
            log::debug!("Marker {} holds no placeholders to strip", self.name);
            return Ok(());
        };
        if inner.is_empty() && !force_strip {
            return Ok(());
        }

        let right_range = TextRange::new(range.container, range.end - right.len(), range.end);
        self.backend.delete_text(&right_range)?;
        let left_range = TextRange::new(range.container, range.start, range.start + left.len());
        self.backend.delete_text(&left_range)?;
        Ok(())
    }

    /// Replace the marker's visible text through the fill protocol
    pub fn rewrite(&self, text: &str, force_strip: bool) -> Result<()> {
        let cursor = self.fill_cursor()?;
        if !text.is_empty() {
            self.backend.insert_text(&cursor, text)?;
        }
        self.clean_fill_cursor(force_strip)
    }
}
