use super::bib::{BibEntry, Lookup};

/// One cited source inside a citation group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub key: String,
    pub lookup: Lookup,
    /// Assigned by numeric styles
    pub number: Option<usize>,
    /// Disambiguation letter of author-year styles
    pub unique_letter: Option<String>,
    pub page_info: Option<String>,
}

impl Citation {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            lookup: Lookup::Unresolved,
            number: None,
            unique_letter: None,
            page_info: None,
        }
    }

    pub fn with_page_info(mut self, page_info: Option<String>) -> Self {
        self.page_info = normalize_page_info(page_info);
        self
    }

    pub fn entry(&self) -> Option<&BibEntry> {
        self.lookup.entry()
    }

    /// Forget everything computed by lookup, numbering and disambiguation
    pub fn clear_derived(&mut self) {
        self.lookup = Lookup::Unresolved;
        self.number = None;
        self.unique_letter = None;
    }
}

/// Blank page info is the same as none
pub fn normalize_page_info(page_info: Option<String>) -> Option<String> {
    page_info.filter(|info| !info.trim().is_empty())
}

/// Stable address of one citation: its group and index in storage order
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CitationPath {
    pub group: super::CitationGroupId,
    pub index: usize,
}

impl CitationPath {
    pub fn new(group: super::CitationGroupId, index: usize) -> Self {
        Self { group, index }
    }
}
