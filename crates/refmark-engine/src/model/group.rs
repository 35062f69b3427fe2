use std::cmp::Ordering;
use std::fmt;

use super::citation::Citation;

/// Identifies a citation group. Equal to the name of the group's marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CitationGroupId(String);

impl CitationGroupId {
    pub fn new(marker_name: impl Into<String>) -> Self {
        Self(marker_name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CitationGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a citation group is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantTag {
    /// Authors visible in the running text: Smith (2020)
    InText,
    /// (Smith 2020)
    Parenthetical,
    /// Cited for the bibliography only, nothing rendered
    Invisible,
}

impl VariantTag {
    /// Numeric tag used in marker names
    pub fn tag(self) -> u8 {
        match self {
            VariantTag::InText => 0,
            VariantTag::Parenthetical => 1,
            VariantTag::Invisible => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(VariantTag::InText),
            1 => Some(VariantTag::Parenthetical),
            2 => Some(VariantTag::Invisible),
            _ => None,
        }
    }
}

/// A citation decorated with its storage index, built only for sorting
struct IndexedCitation<'a> {
    citation: &'a Citation,
    storage_index: usize,
}

/// The decoded content of one marker: citations sharing one location and variant.
///
/// Citations are kept in storage order (the order encoded in the marker name).
/// `local_order` is a permutation of `0..citations.len()` giving the
/// presentation order; it is recomputed by [`CitationGroup::impose_local_order`],
/// never patched.
#[derive(Debug, Clone, PartialEq)]
pub struct CitationGroup {
    id: CitationGroupId,
    variant: VariantTag,
    citations: Vec<Citation>,
    local_order: Vec<usize>,
}

impl CitationGroup {
    pub fn new(id: CitationGroupId, variant: VariantTag, citations: Vec<Citation>) -> Self {
        let local_order = (0..citations.len()).collect();
        Self {
            id,
            variant,
            citations,
            local_order,
        }
    }

    pub fn id(&self) -> &CitationGroupId {
        &self.id
    }

    pub fn variant(&self) -> VariantTag {
        self.variant
    }

    pub fn len(&self) -> usize {
        self.citations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }

    /// Citations in storage order
    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    pub fn citation(&self, index: usize) -> Option<&Citation> {
        self.citations.get(index)
    }

    pub fn citation_mut(&mut self, index: usize) -> Option<&mut Citation> {
        self.citations.get_mut(index)
    }

    pub fn citations_mut(&mut self) -> impl Iterator<Item = &mut Citation> {
        self.citations.iter_mut()
    }

    pub fn keys(&self) -> Vec<String> {
        self.citations.iter().map(|c| c.key.clone()).collect()
    }

    pub fn page_infos(&self) -> Vec<Option<String>> {
        self.citations.iter().map(|c| c.page_info.clone()).collect()
    }

    pub fn local_order(&self) -> &[usize] {
        &self.local_order
    }

    /// Citations in presentation order, each with its storage index
    pub fn citations_in_local_order(&self) -> impl Iterator<Item = (usize, &Citation)> {
        self.local_order.iter().map(|&i| (i, &self.citations[i]))
    }

    /// Sort citations for presentation. The sort is stable, so ties keep storage order.
    pub fn impose_local_order<F>(&mut self, mut compare: F)
    where
        F: FnMut(&Citation, &Citation) -> Ordering,
    {
        let mut decorated: Vec<IndexedCitation<'_>> = self
            .citations
            .iter()
            .enumerate()
            .map(|(storage_index, citation)| IndexedCitation {
                citation,
                storage_index,
            })
            .collect();
        decorated.sort_by(|a, b| compare(a.citation, b.citation));
        self.local_order = decorated.iter().map(|d| d.storage_index).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn group(keys: &[&str]) -> CitationGroup {
        CitationGroup::new(
            CitationGroupId::new("g"),
            VariantTag::Parenthetical,
            keys.iter().map(|k| Citation::new(*k)).collect(),
        )
    }

    fn is_permutation(order: &[usize], n: usize) -> bool {
        let mut seen = vec![false; n];
        order.len() == n
            && order
                .iter()
                .all(|&i| i < n && !std::mem::replace(&mut seen[i], true))
    }

    #[test]
    fn test_new_group_has_identity_local_order() {
        let g = group(&["c", "a", "b"]);
        assert_eq!(g.local_order(), &[0, 1, 2]);
    }

    #[test]
    fn test_impose_local_order_sorts_by_comparator() {
        let mut g = group(&["c", "a", "b"]);
        g.impose_local_order(|a, b| a.key.cmp(&b.key));
        assert_eq!(g.local_order(), &[1, 2, 0]);

        let keys: Vec<&str> = g
            .citations_in_local_order()
            .map(|(_, c)| c.key.as_str())
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        // Storage order is untouched
        assert_eq!(g.keys(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_ties_keep_storage_order() {
        let mut g = group(&["x", "y", "z"]);
        g.impose_local_order(|_, _| Ordering::Equal);
        assert_eq!(g.local_order(), &[0, 1, 2]);
    }

    #[rstest]
    #[case::always_less(|_: &Citation, _: &Citation| Ordering::Less)]
    #[case::always_greater(|_: &Citation, _: &Citation| Ordering::Greater)]
    #[case::reversed(|a: &Citation, b: &Citation| b.key.cmp(&a.key))]
    #[case::by_length(|a: &Citation, b: &Citation| a.key.len().cmp(&b.key.len()))]
    fn test_local_order_is_always_a_permutation(
        #[case] compare: fn(&Citation, &Citation) -> Ordering,
    ) {
        let mut g = group(&["delta", "a", "ccc", "bb", "a"]);
        g.impose_local_order(compare);
        assert!(is_permutation(g.local_order(), g.len()));
    }

    #[test]
    fn test_empty_group_local_order() {
        let mut g = group(&[]);
        g.impose_local_order(|a, b| a.key.cmp(&b.key));
        assert!(g.local_order().is_empty());
    }

    #[rstest]
    #[case(VariantTag::InText, 0)]
    #[case(VariantTag::Parenthetical, 1)]
    #[case(VariantTag::Invisible, 2)]
    fn test_variant_tags(#[case] variant: VariantTag, #[case] tag: u8) {
        assert_eq!(variant.tag(), tag);
        assert_eq!(VariantTag::from_tag(tag), Some(variant));
    }

    #[test]
    fn test_unknown_variant_tag() {
        assert_eq!(VariantTag::from_tag(3), None);
    }
}
