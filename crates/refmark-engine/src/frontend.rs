//! The document-facing side of the engine: builds the registry from the
//! markers in a document and keeps both in step while groups come and go.

use std::collections::{BTreeMap, BTreeSet};

use refmark_config::PayloadModel;

use crate::backend::{ContainerId, DocumentBackend, TextRange};
use crate::codec;
use crate::error::{InvariantError, Result};
use crate::model::{Citation, CitationGroup, CitationGroupId, CitationPath, VariantTag};
use crate::ordering::{RangeEntry, visual_order};
use crate::overlap::{
    OverlapReport, ProtectedRange, RangeOwner, check_insertion_point, check_overlaps,
};
use crate::registry::CitationGroups;
use crate::storage::{MarkStorage, NamedRange, Placeholders};

/// Characters of surrounding text shown on each side of a citation
const CONTEXT_CHARS: usize = 30;

/// One citation as presented for page-info editing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationEntry {
    pub path: CitationPath,
    pub key: String,
    pub page_info: Option<String>,
    /// Surrounding text with the citation marked as `«key»`
    pub context: String,
}

pub struct Frontend<B: DocumentBackend + Clone> {
    storage: MarkStorage<B>,
    groups: CitationGroups,
}

impl<B: DocumentBackend + Clone> Frontend<B> {
    /// Build the registry from the markers found in the document.
    ///
    /// Markers of other tools are ignored. A marker that carries our prefix but
    /// cannot be decoded is a fatal error.
    pub fn load(
        backend: B,
        payload_model: PayloadModel,
        placeholders: Placeholders,
    ) -> Result<Self> {
        let storage = MarkStorage::new(backend, payload_model, placeholders);
        let mut groups = CitationGroups::new();

        for name in storage.backend().marker_names()? {
            let Some(decoded) = codec::parse(&name)? else {
                continue;
            };
            if storage.get(&name)?.is_none() {
                log::warn!("Marker {name} vanished while loading, skipped");
                continue;
            }

            let infos = storage.read_page_infos(&name, decoded.keys.len())?;
            let citations = decoded
                .keys
                .into_iter()
                .zip(infos)
                .map(|(key, info)| Citation::new(key).with_page_info(info))
                .collect();
            groups.insert(CitationGroup::new(
                CitationGroupId::new(name),
                decoded.variant,
                citations,
            ));
        }

        log::debug!("Loaded {} citation groups", groups.len());
        Ok(Self { storage, groups })
    }

    pub fn backend(&self) -> &B {
        self.storage.backend()
    }

    pub fn storage(&self) -> &MarkStorage<B> {
        &self.storage
    }

    pub fn groups(&self) -> &CitationGroups {
        &self.groups
    }

    pub fn groups_mut(&mut self) -> &mut CitationGroups {
        &mut self.groups
    }

    pub fn named_range(&self, id: &CitationGroupId) -> NamedRange<B> {
        self.storage.named_range(id.as_str())
    }

    pub fn group_range(&self, id: &CitationGroupId) -> Result<Option<TextRange>> {
        self.named_range(id).mark_range()
    }

    /// Create a marker for a new group at `at` and register the group.
    ///
    /// Returns the new id and the insertion point after the marker (and its
    /// trailing space, if any). Missing page infos count as none.
    pub fn create_group(
        &mut self,
        keys: &[String],
        page_infos: &[Option<String>],
        variant: VariantTag,
        at: &TextRange,
        insert_trailing_space: bool,
        without_placeholders: bool,
    ) -> Result<(CitationGroupId, TextRange)> {
        let used = self.storage.used_names()?;
        let name = codec::encode(keys, variant, &used)?;

        let mut infos = page_infos.to_vec();
        infos.resize(keys.len(), None);

        let created = self
            .storage
            .create(&name, at, insert_trailing_space, without_placeholders)?;
        self.storage.write_page_infos(&name, &infos)?;
        let infos = self.storage.read_page_infos(&name, keys.len())?;

        let citations = keys
            .iter()
            .zip(infos)
            .map(|(key, info)| Citation::new(key.as_str()).with_page_info(info))
            .collect();
        let id = self
            .groups
            .insert(CitationGroup::new(CitationGroupId::new(name), variant, citations));
        Ok((id, created.after))
    }

    /// Delete a group's marker, text and payload, and forget the group
    pub fn remove_group(&mut self, id: &CitationGroupId) -> Result<CitationGroup> {
        if !self.groups.contains(id) {
            return Err(InvariantError::UnknownGroup(id.clone()).into());
        }
        self.named_range(id).remove()?;
        self.groups
            .remove(id)
            .ok_or_else(|| InvariantError::UnknownGroup(id.clone()).into())
    }

    pub fn remove_groups(&mut self, ids: &[CitationGroupId]) -> Result<Vec<CitationGroup>> {
        ids.iter().map(|id| self.remove_group(id)).collect()
    }

    /// Forget groups whose markers are gone from the document
    pub fn prune_vanished(&mut self) -> Result<Vec<CitationGroupId>> {
        let mut vanished = Vec::new();
        for id in self.groups.ids() {
            if self.group_range(&id)?.is_none() {
                log::warn!("Marker {id} is gone from the document, dropping its group");
                self.backend().remove_side_channel(id.as_str())?;
                self.groups.remove(&id);
                vanished.push(id);
            }
        }
        Ok(vanished)
    }

    /// Current ranges of all groups in registry order, skipping vanished markers
    pub fn group_ranges(&self) -> Result<Vec<RangeEntry<CitationGroupId>>> {
        let mut entries = Vec::with_capacity(self.groups.len());
        for id in self.groups.ids() {
            match self.group_range(&id)? {
                Some(range) => entries.push(RangeEntry::new(range, id)),
                None => log::warn!("Marker {id} has no range, left out of ordering"),
            }
        }
        Ok(entries)
    }

    fn footnote_anchors(
        &self,
        entries: &[RangeEntry<CitationGroupId>],
    ) -> Result<BTreeMap<ContainerId, TextRange>> {
        let mut anchors = BTreeMap::new();
        for entry in entries {
            let container = entry.range.container;
            if matches!(container, ContainerId::Footnote(_)) && !anchors.contains_key(&container) {
                if let Some(anchor) = self.backend().footnote_anchor_of(&entry.range)? {
                    anchors.insert(container, anchor);
                }
            }
        }
        Ok(anchors)
    }

    /// Compute the visual order of all groups and store it as the global order
    pub fn compute_visual_order(
        &mut self,
        map_footnotes_to_marks: bool,
    ) -> Result<Vec<CitationGroupId>> {
        let entries = self.group_ranges()?;
        let order = if map_footnotes_to_marks {
            let anchors = self.footnote_anchors(&entries)?;
            visual_order(
                entries,
                Some(|range: &TextRange| anchors.get(&range.container).copied()),
            )
        } else {
            visual_order(entries, None::<fn(&TextRange) -> Option<TextRange>>)
        };

        self.groups.set_global_order(order.clone());
        Ok(order)
    }

    /// Check citation markers, and the anchors of footnotes holding them, for
    /// overlaps
    pub fn check_range_overlaps(
        &self,
        require_separation: bool,
        cap: usize,
    ) -> Result<OverlapReport> {
        Ok(check_overlaps(self.protected_ranges()?, require_separation, cap))
    }

    /// Check that a new group inserted at `at` would not land inside a
    /// citation marker or a footnote anchor
    pub fn check_insertion_point(
        &self,
        at: &TextRange,
        require_separation: bool,
        cap: usize,
    ) -> Result<OverlapReport> {
        Ok(check_insertion_point(
            self.protected_ranges()?,
            at,
            require_separation,
            cap,
        ))
    }

    /// Citation marker ranges plus one anchor per footnote holding citations
    fn protected_ranges(&self) -> Result<Vec<RangeEntry<ProtectedRange>>> {
        let entries = self.group_ranges()?;
        let anchors = self.footnote_anchors(&entries)?;

        let mut protected = Vec::with_capacity(entries.len() + anchors.len());
        for entry in entries {
            let description = self.backend().text(&entry.range)?;
            protected.push(RangeEntry::new(
                entry.range,
                ProtectedRange {
                    owner: RangeOwner::Citation(entry.owner),
                    description,
                },
            ));
        }
        for (container, anchor) in anchors {
            protected.push(RangeEntry::new(
                anchor,
                ProtectedRange {
                    owner: RangeOwner::FootnoteAnchor(container),
                    description: container.to_string(),
                },
            ));
        }
        Ok(protected)
    }

    /// Group ids in global order when known, registry order otherwise
    fn ids_for_display(&self) -> Vec<CitationGroupId> {
        match self.groups.sorted_ids() {
            Ok(ids) => ids.to_vec(),
            Err(_) => self.groups.ids(),
        }
    }

    /// Every citation with its page info and surrounding text
    pub fn citation_entries(&self) -> Result<Vec<CitationEntry>> {
        let mut entries = Vec::new();
        for id in self.ids_for_display() {
            let group = self
                .groups
                .get(&id)
                .ok_or_else(|| InvariantError::UnknownGroup(id.clone()))?;
            let Some(range) = self.group_range(&id)? else {
                continue;
            };
            let text = self.backend().container_text(range.container)?;
            let before = tail_chars(&text[..range.start], CONTEXT_CHARS);
            let after = head_chars(&text[range.end..], CONTEXT_CHARS);

            for (index, citation) in group.citations().iter().enumerate() {
                let context = format!("{before}«{}»{after}", citation.key).replace('\n', " ");
                entries.push(CitationEntry {
                    path: CitationPath::new(id.clone(), index),
                    key: citation.key.clone(),
                    page_info: citation.page_info.clone(),
                    context,
                });
            }
        }
        Ok(entries)
    }

    /// Take edited page infos and store them with their groups.
    ///
    /// Each touched group is read back afterwards, so the registry shows what
    /// the payload model could actually keep.
    pub fn apply_citation_entries(&mut self, entries: &[CitationEntry]) -> Result<()> {
        let mut touched = BTreeSet::new();
        for entry in entries {
            self.groups
                .set_page_info(&entry.path, entry.page_info.clone())?;
            touched.insert(entry.path.group.clone());
        }

        for id in touched {
            let group = self
                .groups
                .get(&id)
                .ok_or_else(|| InvariantError::UnknownGroup(id.clone()))?;
            let count = group.len();
            self.storage.write_page_infos(id.as_str(), &group.page_infos())?;

            let stored = self.storage.read_page_infos(id.as_str(), count)?;
            for (index, info) in stored.into_iter().enumerate() {
                self.groups
                    .set_page_info(&CitationPath::new(id.clone(), index), info)?;
            }
        }
        Ok(())
    }
}

fn tail_chars(text: &str, n: usize) -> &str {
    match text.char_indices().rev().nth(n.saturating_sub(1)) {
        Some((i, _)) if n > 0 => &text[i..],
        _ if n == 0 => "",
        _ => text,
    }
}

fn head_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}
