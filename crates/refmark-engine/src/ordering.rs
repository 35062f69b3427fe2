//! Visual ordering of ranges.
//!
//! Ranges are only comparable inside one text container, so every ordering
//! here first buckets by container. Buckets come out sorted by
//! [`ContainerId`]; only the order inside a bucket carries meaning.

use std::collections::BTreeMap;

use crate::backend::{ContainerId, TextRange};

/// A range together with whatever owns it
#[derive(Debug, Clone, PartialEq)]
pub struct RangeEntry<T> {
    pub range: TextRange,
    pub owner: T,
}

impl<T> RangeEntry<T> {
    pub fn new(range: TextRange, owner: T) -> Self {
        Self { range, owner }
    }
}

/// Entries of one container sorted by start, then end
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket<T> {
    pub container: ContainerId,
    pub entries: Vec<RangeEntry<T>>,
}

impl<T> Bucket<T> {
    /// Entries with their 0-based position inside the bucket
    pub fn indexed(&self) -> impl Iterator<Item = (usize, &RangeEntry<T>)> {
        self.entries.iter().enumerate()
    }
}

/// Split entries by container and sort each bucket. The sort is stable, so
/// entries with identical ranges keep their input order.
pub fn bucket_by_container<T>(entries: impl IntoIterator<Item = RangeEntry<T>>) -> Vec<Bucket<T>> {
    let mut buckets: BTreeMap<ContainerId, Vec<RangeEntry<T>>> = BTreeMap::new();
    for entry in entries {
        buckets.entry(entry.range.container).or_default().push(entry);
    }

    buckets
        .into_iter()
        .map(|(container, mut entries)| {
            entries.sort_by_key(|e| (e.range.start, e.range.end));
            Bucket { container, entries }
        })
        .collect()
}

/// Owners in visual order.
///
/// With `anchor_of` given, a range inside a footnote is ordered as if it stood
/// at the footnote's anchor in the body. Several ranges in one footnote keep
/// their order inside the footnote.
pub fn visual_order<T, F>(entries: Vec<RangeEntry<T>>, anchor_of: Option<F>) -> Vec<T>
where
    F: Fn(&TextRange) -> Option<TextRange>,
{
    let mut entries = entries;
    entries.sort_by_key(|e| (e.range.container, e.range.start, e.range.end));

    let mapped = entries.into_iter().map(|entry| {
        let range = anchor_of
            .as_ref()
            .and_then(|anchor_of| anchor_of(&entry.range))
            .unwrap_or(entry.range);
        RangeEntry::new(range, entry.owner)
    });

    bucket_by_container(mapped)
        .into_iter()
        .flat_map(|bucket| bucket.entries.into_iter().map(|e| e.owner))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn body(start: usize, end: usize) -> TextRange {
        TextRange::new(ContainerId::Body, start, end)
    }

    fn footnote(n: u32, start: usize, end: usize) -> TextRange {
        TextRange::new(ContainerId::Footnote(n), start, end)
    }

    fn no_anchors(_: &TextRange) -> Option<TextRange> {
        None
    }

    #[test]
    fn test_buckets_sort_by_start_then_end() {
        let buckets = bucket_by_container(vec![
            RangeEntry::new(body(10, 12), "c"),
            RangeEntry::new(body(0, 5), "b"),
            RangeEntry::new(body(0, 3), "a"),
        ]);

        assert_eq!(buckets.len(), 1);
        let owners: Vec<_> = buckets[0].entries.iter().map(|e| e.owner).collect();
        assert_eq!(owners, vec!["a", "b", "c"]);
        let indices: Vec<_> = buckets[0].indexed().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_containers_are_kept_apart() {
        // Given entries in the body and two footnotes
        let entries = vec![
            RangeEntry::new(footnote(2, 0, 1), "f2"),
            RangeEntry::new(body(50, 51), "late"),
            RangeEntry::new(footnote(1, 9, 10), "f1"),
            RangeEntry::new(body(1, 2), "early"),
        ];

        // When ordering without footnote mapping
        let order = visual_order(entries, None::<fn(&TextRange) -> Option<TextRange>>);

        // Then body comes first, then footnotes by number
        assert_eq!(order, vec!["early", "late", "f1", "f2"]);
    }

    #[test]
    fn test_footnote_ranges_move_to_their_anchor() {
        // Given a footnote anchored at body offset 20 with two citations
        let anchor = |range: &TextRange| match range.container {
            ContainerId::Footnote(1) => Some(body(20, 23)),
            _ => None,
        };
        let entries = vec![
            RangeEntry::new(body(30, 31), "after"),
            RangeEntry::new(footnote(1, 8, 9), "note-second"),
            RangeEntry::new(body(5, 6), "before"),
            RangeEntry::new(footnote(1, 0, 1), "note-first"),
        ];

        // When ordering with mapping
        let order = visual_order(entries, Some(anchor));

        // Then footnote citations sit between the body citations around the anchor
        assert_eq!(order, vec!["before", "note-first", "note-second", "after"]);
    }

    #[test]
    fn test_unmapped_ranges_are_untouched() {
        let order = visual_order(
            vec![RangeEntry::new(body(4, 5), 2), RangeEntry::new(body(0, 1), 1)],
            Some(no_anchors),
        );
        assert_eq!(order, vec![1, 2]);
    }
}
