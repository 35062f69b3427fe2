use std::cmp::Ordering;
use std::collections::HashMap;

use hashlink::LinkedHashMap;

use super::bib::{BibDatabase, Lookup};
use super::citation::{Citation, CitationPath};
use crate::error::InvariantError;
use crate::registry::CitationGroups;

/// Every citation of one key across the document, with the data they share
#[derive(Debug, Clone, PartialEq)]
pub struct CitedKey {
    pub key: String,
    pub paths: Vec<CitationPath>,
    pub lookup: Lookup,
    pub number: Option<usize>,
    pub unique_letter: Option<String>,
}

impl CitedKey {
    fn new(path: CitationPath, citation: &Citation) -> Self {
        Self {
            key: citation.key.clone(),
            paths: vec![path],
            lookup: citation.lookup.clone(),
            number: citation.number,
            unique_letter: citation.unique_letter.clone(),
        }
    }

    /// Record another citation of this key. All of them must agree on the
    /// shared data; a disagreement means an earlier distribute pass was partial.
    fn add_path(&mut self, path: CitationPath, citation: &Citation) -> Result<(), InvariantError> {
        let field = if citation.lookup != self.lookup {
            Some("lookup result")
        } else if citation.number != self.number {
            Some("number")
        } else if citation.unique_letter != self.unique_letter {
            Some("unique letter")
        } else {
            None
        };
        if let Some(field) = field {
            return Err(InvariantError::InconsistentCitedKey {
                key: self.key.clone(),
                field,
            });
        }
        self.paths.push(path);
        Ok(())
    }
}

/// Cited keys in first-seen order.
///
/// A disposable snapshot: values only reach the citation groups through the
/// explicit `distribute_*` passes.
#[derive(Debug, Clone, Default)]
pub struct CitedKeys {
    keys: LinkedHashMap<String, CitedKey>,
}

impl CitedKeys {
    /// Fold citations sharing a key, keeping the order keys are first seen
    pub fn from_citations<'a, I>(citations: I) -> Result<Self, InvariantError>
    where
        I: IntoIterator<Item = (CitationPath, &'a Citation)>,
    {
        let mut keys: LinkedHashMap<String, CitedKey> = LinkedHashMap::new();
        for (path, citation) in citations {
            match keys.get_mut(&citation.key) {
                Some(cited) => cited.add_path(path, citation)?,
                None => {
                    keys.insert(citation.key.clone(), CitedKey::new(path, citation));
                }
            }
        }
        Ok(Self { keys })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&CitedKey> {
        self.keys.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CitedKey> {
        self.keys.values()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.keys.keys().map(String::as_str).collect()
    }

    /// Reorder the snapshot. The sort is stable.
    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&CitedKey, &CitedKey) -> Ordering,
    {
        let mut entries: Vec<(String, CitedKey)> =
            std::mem::take(&mut self.keys).into_iter().collect();
        entries.sort_by(|(_, a), (_, b)| compare(a, b));
        self.keys = entries.into_iter().collect();
    }

    /// Number keys 1..=N in their current order
    pub fn number_in_current_order(&mut self) {
        for (i, (_, cited)) in self.keys.iter_mut().enumerate() {
            cited.number = Some(i + 1);
        }
    }

    /// Number keys that have a database entry 1..=N in their current order;
    /// the others get no number
    pub fn number_resolved_in_current_order(&mut self) {
        let mut next = 1;
        for (_, cited) in self.keys.iter_mut() {
            cited.number = cited.lookup.entry().map(|_| {
                next += 1;
                next - 1
            });
        }
    }

    pub fn lookup_in_databases(&mut self, databases: &[&dyn BibDatabase]) {
        for (_, cited) in self.keys.iter_mut() {
            cited.lookup = Lookup::resolve(&cited.key, databases);
        }
    }

    /// Set letters by key; keys without an entry lose their letter
    pub fn set_unique_letters(&mut self, letters: &HashMap<String, String>) {
        for (_, cited) in self.keys.iter_mut() {
            cited.unique_letter = letters.get(&cited.key).cloned();
        }
    }

    /// Keys no database could resolve, in snapshot order
    pub fn missing_keys(&self) -> Vec<String> {
        self.iter()
            .filter(|cited| cited.lookup == Lookup::Missing)
            .map(|cited| cited.key.clone())
            .collect()
    }

    pub fn distribute_lookup_results(
        &self,
        groups: &mut CitationGroups,
    ) -> Result<(), InvariantError> {
        for cited in self.iter() {
            groups.set_lookup_results(&cited.paths, &cited.lookup)?;
        }
        Ok(())
    }

    pub fn distribute_numbers(
        &self,
        groups: &mut CitationGroups,
    ) -> Result<(), InvariantError> {
        for cited in self.iter() {
            groups.set_numbers(&cited.paths, cited.number)?;
        }
        Ok(())
    }

    pub fn distribute_unique_letters(
        &self,
        groups: &mut CitationGroups,
    ) -> Result<(), InvariantError> {
        for cited in self.iter() {
            groups.set_unique_letters(&cited.paths, cited.unique_letter.as_deref())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BibEntry, CitationGroupId, InMemoryDatabase};
    use pretty_assertions::assert_eq;

    fn path(group: &str, index: usize) -> CitationPath {
        CitationPath::new(CitationGroupId::new(group), index)
    }

    #[test]
    fn test_fold_preserves_first_seen_order() {
        let a = Citation::new("a");
        let b = Citation::new("b");
        let c = Citation::new("c");

        let cited = CitedKeys::from_citations(vec![
            (path("g1", 0), &a),
            (path("g1", 1), &b),
            (path("g2", 0), &b),
            (path("g2", 1), &c),
        ])
        .unwrap();

        assert_eq!(cited.keys(), vec!["a", "b", "c"]);
        assert_eq!(
            cited.get("b").unwrap().paths,
            vec![path("g1", 1), path("g2", 0)]
        );
    }

    #[test]
    fn test_disagreeing_numbers_are_fatal() {
        let mut first = Citation::new("a");
        first.number = Some(1);
        let mut second = Citation::new("a");
        second.number = Some(2);

        let result =
            CitedKeys::from_citations(vec![(path("g1", 0), &first), (path("g2", 0), &second)]);

        assert!(matches!(
            result,
            Err(InvariantError::InconsistentCitedKey { field: "number", .. })
        ));
    }

    #[test]
    fn test_disagreeing_lookups_are_fatal() {
        let mut first = Citation::new("a");
        first.lookup = Lookup::Missing;
        let second = Citation::new("a");

        let result =
            CitedKeys::from_citations(vec![(path("g1", 0), &first), (path("g2", 0), &second)]);

        assert!(matches!(
            result,
            Err(InvariantError::InconsistentCitedKey {
                field: "lookup result",
                ..
            })
        ));
    }

    #[test]
    fn test_sort_then_number() {
        let (b, a, c) = (Citation::new("b"), Citation::new("a"), Citation::new("c"));
        let mut cited = CitedKeys::from_citations(vec![
            (path("g", 0), &b),
            (path("g", 1), &a),
            (path("g", 2), &c),
        ])
        .unwrap();

        cited.sort_by(|x, y| x.key.cmp(&y.key));
        cited.number_in_current_order();

        let numbers: Vec<(&str, Option<usize>)> = cited
            .iter()
            .map(|k| (k.key.as_str(), k.number))
            .collect();
        assert_eq!(numbers, vec![("a", Some(1)), ("b", Some(2)), ("c", Some(3))]);
    }

    #[test]
    fn test_unresolved_keys_get_no_number() {
        let (a, b, c) = (Citation::new("a"), Citation::new("b"), Citation::new("c"));
        let mut cited = CitedKeys::from_citations(vec![
            (path("g", 0), &a),
            (path("g", 1), &b),
            (path("g", 2), &c),
        ])
        .unwrap();
        let db = InMemoryDatabase::new("db")
            .with_entry(BibEntry::new("a"))
            .with_entry(BibEntry::new("c"));
        cited.lookup_in_databases(&[&db]);

        cited.number_resolved_in_current_order();

        let numbers: Vec<Option<usize>> = cited.iter().map(|k| k.number).collect();
        assert_eq!(numbers, vec![Some(1), None, Some(2)]);
    }

    #[test]
    fn test_missing_keys() {
        let (a, b) = (Citation::new("a"), Citation::new("b"));
        let mut cited =
            CitedKeys::from_citations(vec![(path("g", 0), &a), (path("g", 1), &b)]).unwrap();
        let db = InMemoryDatabase::new("db").with_entry(BibEntry::new("b"));

        cited.lookup_in_databases(&[&db]);

        assert_eq!(cited.missing_keys(), vec!["a".to_string()]);
    }
}
