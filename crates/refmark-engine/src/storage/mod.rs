/*!
 * # Range Storage
 *
 * Citation groups live in the document as named markers. This layer creates,
 * finds and removes them, and keeps page info in the side channel keyed by the
 * marker name. Two payload models share one interface:
 *
 * - **Group**: one plain string per group, belonging to the last citation
 * - **Citation**: a JSON array with one optional string per citation
 */

mod bracket_fill;
mod named_range;

use std::collections::HashSet;

use refmark_config::PayloadModel;

use crate::backend::{DocumentBackend, TextRange};
use crate::error::{DocumentError, InvariantError, Result};

pub use named_range::NamedRange;

/// The pair of characters written around marker content while it is rewritten
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholders {
    pub left: String,
    pub right: String,
}

impl Placeholders {
    pub fn zero_width() -> Self {
        Self {
            left: "\u{200b}".to_string(),
            right: "\u{200b}".to_string(),
        }
    }

    pub fn visible() -> Self {
        Self {
            left: "<".to_string(),
            right: ">".to_string(),
        }
    }

    pub fn both(&self) -> String {
        format!("{}{}", self.left, self.right)
    }
}

impl Default for Placeholders {
    fn default() -> Self {
        Self::zero_width()
    }
}

/// A freshly created marker and the insertion point just past everything
/// that was written for it
#[derive(Debug)]
pub struct Created<B: DocumentBackend + Clone> {
    pub range: NamedRange<B>,
    pub after: TextRange,
}

pub struct MarkStorage<B: DocumentBackend + Clone> {
    backend: B,
    payload_model: PayloadModel,
    placeholders: Placeholders,
}

impl<B: DocumentBackend + Clone> MarkStorage<B> {
    pub fn new(backend: B, payload_model: PayloadModel, placeholders: Placeholders) -> Self {
        Self {
            backend,
            payload_model,
            placeholders,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn payload_model(&self) -> PayloadModel {
        self.payload_model
    }

    pub fn placeholders(&self) -> &Placeholders {
        &self.placeholders
    }

    /// Insert a new marker at `at`.
    ///
    /// The marker gets the two placeholders as content unless
    /// `without_placeholders` is set, in which case it is created empty. An
    /// optional space is written after (outside) the marker. If the backend
    /// refuses the marker the inserted text is taken out again.
    pub fn create(
        &self,
        name: &str,
        at: &TextRange,
        insert_trailing_space: bool,
        without_placeholders: bool,
    ) -> Result<Created<B>> {
        if self.backend.find_marker(name)?.is_some() {
            return Err(DocumentError::MarkerCreationFailed {
                name: name.to_string(),
                reason: "name already in use".to_string(),
            }
            .into());
        }

        let at = at.collapse_to_start();
        let content = if without_placeholders {
            at
        } else {
            self.backend.insert_text(&at, &self.placeholders.both())?
        };

        if let Err(e) = self.backend.create_marker(name, content) {
            self.backend.delete_text(&content)?;
            return Err(e.into());
        }

        let after = if insert_trailing_space {
            self.backend
                .insert_text(&content.collapse_to_end(), " ")?
                .collapse_to_end()
        } else {
            content.collapse_to_end()
        };

        log::debug!("Created marker {name} at {content}");
        Ok(Created {
            range: self.named_range(name),
            after,
        })
    }

    /// Look up an existing marker
    pub fn get(&self, name: &str) -> Result<Option<NamedRange<B>>> {
        Ok(self
            .backend
            .find_marker(name)?
            .map(|_| self.named_range(name)))
    }

    /// Handle onto a marker without checking that it exists
    pub fn named_range(&self, name: &str) -> NamedRange<B> {
        NamedRange::new(self.backend.clone(), name, self.placeholders.clone())
    }

    pub fn used_names(&self) -> Result<HashSet<String>> {
        Ok(self.backend.marker_names()?.into_iter().collect())
    }

    /// Page infos of a group with `count` citations, in storage order
    pub fn read_page_infos(&self, name: &str, count: usize) -> Result<Vec<Option<String>>> {
        let mut infos = vec![None; count];
        let Some(raw) = self.backend.side_channel(name)? else {
            return Ok(infos);
        };

        match self.payload_model {
            PayloadModel::Group => {
                if let Some(last) = infos.last_mut() {
                    *last = Some(raw).filter(|s| !s.trim().is_empty());
                }
            }
            PayloadModel::Citation => {
                let stored: Vec<Option<String>> =
                    serde_json::from_str(&raw).map_err(|e| InvariantError::MalformedPayload {
                        name: name.to_string(),
                        reason: e.to_string(),
                    })?;
                if stored.len() != count {
                    return Err(InvariantError::MalformedPayload {
                        name: name.to_string(),
                        reason: format!("{} page infos for {count} citations", stored.len()),
                    }
                    .into());
                }
                infos = stored;
            }
        }
        Ok(infos)
    }

    /// Store page infos of a group. A group without any page info has no
    /// side-channel entry at all.
    pub fn write_page_infos(&self, name: &str, infos: &[Option<String>]) -> Result<()> {
        let present: Vec<&str> = infos
            .iter()
            .flatten()
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
            .collect();
        if present.is_empty() {
            self.backend.remove_side_channel(name)?;
            return Ok(());
        }

        let value = match self.payload_model {
            PayloadModel::Group => {
                let last_only = infos.last().is_some_and(Option::is_some) && present.len() == 1;
                if !last_only {
                    log::warn!("Group {name} keeps only a joined page info: {present:?}");
                }
                join_distinct(&present)
            }
            PayloadModel::Citation => {
                serde_json::to_string(infos).map_err(|e| InvariantError::MalformedPayload {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?
            }
        };
        self.backend.set_side_channel(name, &value)?;
        Ok(())
    }
}

/// Join distinct strings with `"; "`, keeping first-seen order
pub fn join_distinct(infos: &[&str]) -> String {
    let mut seen = HashSet::new();
    infos
        .iter()
        .filter(|info| seen.insert(**info))
        .copied()
        .collect::<Vec<_>>()
        .join("; ")
}
