pub mod bib;
pub mod citation;
pub mod cited_keys;
pub mod group;

pub use bib::{BibDatabase, BibEntry, InMemoryDatabase, Lookup, LookupResult};
pub use citation::{Citation, CitationPath};
pub use cited_keys::{CitedKey, CitedKeys};
pub use group::{CitationGroup, CitationGroupId, VariantTag};
