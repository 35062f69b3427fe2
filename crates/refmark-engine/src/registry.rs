use std::cmp::Ordering;

use hashlink::LinkedHashMap;

use crate::error::InvariantError;
use crate::model::citation::normalize_page_info;
use crate::model::{Citation, CitationGroup, CitationGroupId, CitationPath, CitedKeys, Lookup};

/// Owns every citation group of one document, in registration order.
///
/// Groups are addressed by [`CitationGroupId`]; a stale id simply finds
/// nothing. The global order and the bibliography snapshot are derived data:
/// any registration or removal discards them rather than patching them.
#[derive(Debug, Default)]
pub struct CitationGroups {
    groups: LinkedHashMap<CitationGroupId, CitationGroup>,
    global_order: Option<Vec<CitationGroupId>>,
    bibliography: Option<CitedKeys>,
}

impl CitationGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_groups(groups: impl IntoIterator<Item = CitationGroup>) -> Self {
        let mut registry = Self::new();
        for group in groups {
            registry.insert(group);
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, id: &CitationGroupId) -> Option<&CitationGroup> {
        self.groups.get(id)
    }

    pub fn get_mut(&mut self, id: &CitationGroupId) -> Option<&mut CitationGroup> {
        self.groups.get_mut(id)
    }

    pub fn contains(&self, id: &CitationGroupId) -> bool {
        self.groups.contains_key(id)
    }

    /// Group ids in registration order
    pub fn ids(&self) -> Vec<CitationGroupId> {
        self.groups.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CitationGroup> {
        self.groups.values()
    }

    /// Register a group. The global order is invalidated.
    pub fn insert(&mut self, group: CitationGroup) -> CitationGroupId {
        let id = group.id().clone();
        self.groups.insert(id.clone(), group);
        self.global_order = None;
        id
    }

    /// Drop a group. The global order and the bibliography snapshot are invalidated.
    pub fn remove(&mut self, id: &CitationGroupId) -> Option<CitationGroup> {
        let removed = self.groups.remove(id)?;
        self.global_order = None;
        self.bibliography = None;
        Some(removed)
    }

    pub fn set_global_order(&mut self, order: Vec<CitationGroupId>) {
        self.global_order = Some(order);
    }

    pub fn has_global_order(&self) -> bool {
        self.global_order.is_some()
    }

    /// Group ids in document order, as last computed
    pub fn sorted_ids(&self) -> Result<&[CitationGroupId], InvariantError> {
        self.global_order
            .as_deref()
            .ok_or(InvariantError::GlobalOrderNotComputed)
    }

    pub fn bibliography(&self) -> Option<&CitedKeys> {
        self.bibliography.as_ref()
    }

    pub fn set_bibliography(&mut self, bibliography: CitedKeys) {
        self.bibliography = Some(bibliography);
    }

    /// Forget lookups, numbers and letters of every citation
    pub fn clear_derived_data(&mut self) {
        for group in self.groups.values_mut() {
            group.citations_mut().for_each(Citation::clear_derived);
        }
        self.bibliography = None;
    }

    /// Recompute the local order of every group
    pub fn impose_local_order<F>(&mut self, mut compare: F)
    where
        F: FnMut(&Citation, &Citation) -> Ordering,
    {
        for group in self.groups.values_mut() {
            group.impose_local_order(&mut compare);
        }
    }

    pub fn set_lookup_results(
        &mut self,
        paths: &[CitationPath],
        lookup: &Lookup,
    ) -> Result<(), InvariantError> {
        for path in paths {
            self.citation_mut(path)?.lookup = lookup.clone();
        }
        Ok(())
    }

    pub fn set_numbers(
        &mut self,
        paths: &[CitationPath],
        number: Option<usize>,
    ) -> Result<(), InvariantError> {
        for path in paths {
            self.citation_mut(path)?.number = number;
        }
        Ok(())
    }

    pub fn set_unique_letters(
        &mut self,
        paths: &[CitationPath],
        letter: Option<&str>,
    ) -> Result<(), InvariantError> {
        for path in paths {
            self.citation_mut(path)?.unique_letter = letter.map(str::to_string);
        }
        Ok(())
    }

    pub fn set_page_info(
        &mut self,
        path: &CitationPath,
        page_info: Option<String>,
    ) -> Result<(), InvariantError> {
        self.citation_mut(path)?.page_info = normalize_page_info(page_info);
        Ok(())
    }

    pub fn citation(&self, path: &CitationPath) -> Result<&Citation, InvariantError> {
        let group = self
            .groups
            .get(&path.group)
            .ok_or_else(|| InvariantError::UnknownGroup(path.group.clone()))?;
        group
            .citation(path.index)
            .ok_or_else(|| InvariantError::UnknownCitation {
                group: path.group.clone(),
                index: path.index,
            })
    }

    fn citation_mut(&mut self, path: &CitationPath) -> Result<&mut Citation, InvariantError> {
        let group = self
            .groups
            .get_mut(&path.group)
            .ok_or_else(|| InvariantError::UnknownGroup(path.group.clone()))?;
        group
            .citation_mut(path.index)
            .ok_or_else(|| InvariantError::UnknownCitation {
                group: path.group.clone(),
                index: path.index,
            })
    }

    /// Fold citations by key, walking groups in registration order and
    /// citations in storage order
    pub fn aggregate_cited_keys(&self) -> Result<CitedKeys, InvariantError> {
        CitedKeys::from_citations(self.groups.values().flat_map(|group| {
            group
                .citations()
                .iter()
                .enumerate()
                .map(|(index, citation)| (CitationPath::new(group.id().clone(), index), citation))
        }))
    }

    /// Fold citations by key, walking groups in global order and citations in
    /// local order: keys come out in order of first appearance in the document
    pub fn aggregate_cited_keys_in_appearance_order(&self) -> Result<CitedKeys, InvariantError> {
        let order = self.sorted_ids()?;
        let mut citations = Vec::new();
        for id in order {
            let group = self
                .groups
                .get(id)
                .ok_or_else(|| InvariantError::UnknownGroup(id.clone()))?;
            for (index, citation) in group.citations_in_local_order() {
                citations.push((CitationPath::new(id.clone(), index), citation));
            }
        }
        CitedKeys::from_citations(citations)
    }
}
