//! Shared fixtures for unit tests across the crate.

use crate::backend::{ContainerId, DocumentBackend, RopeDocument, TextRange};
use crate::model::{BibEntry, InMemoryDatabase};

pub fn body(start: usize, end: usize) -> TextRange {
    TextRange::new(ContainerId::Body, start, end)
}

/// A document with the given body text and one marker per `(name, start, end)`
pub fn document_with_markers(text: &str, markers: &[(&str, usize, usize)]) -> RopeDocument {
    let doc = RopeDocument::from_text(text);
    for (name, start, end) in markers {
        doc.create_marker(name, body(*start, *end))
            .unwrap_or_else(|e| panic!("fixture marker {name}: {e}"));
    }
    doc
}

/// Two Smith 2020 entries to exercise letters, plus two unrelated ones
pub fn sample_database() -> InMemoryDatabase {
    InMemoryDatabase::new("sample")
        .with_entry(
            BibEntry::new("smith2020")
                .with_field("author", "Smith, John")
                .with_field("year", "2020")
                .with_field("title", "Ropes"),
        )
        .with_entry(
            BibEntry::new("smith2020b")
                .with_field("author", "Smith, Jane and Doe, J.")
                .with_field("year", "2020")
                .with_field("title", "Deltas"),
        )
        .with_entry(
            BibEntry::new("jones2019")
                .with_field("author", "Ann Jones")
                .with_field("year", "2019")
                .with_field("title", "Marks"),
        )
        .with_entry(
            BibEntry::new("doe2001")
                .with_field("author", "Doe, Jane")
                .with_field("year", "2001")
                .with_field("title", "Anchors"),
        )
}

#[test]
fn fixture_markers_cover_requested_text() {
    let doc = document_with_markers("A [x].", &[("m", 2, 5)]);
    assert_eq!(doc.marker_text("m").as_deref(), Some("[x]"));
}
