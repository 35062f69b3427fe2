//! Presentation strategies: how groups and the bibliography are rendered,
//! and how citations are ordered and disambiguated.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::{BibEntry, Citation, CitationGroup, CitedKey, CitedKeys, VariantTag};

/// Placeholder rendered for a key no database knows
pub const UNRESOLVED: &str = "??";

pub trait CitationStyle {
    /// Numeric styles number keys by first appearance
    fn is_numeric(&self) -> bool;

    /// Presentation order inside one group
    fn compare_citations(&self, a: &Citation, b: &Citation) -> Ordering;

    /// Bibliography order of non-numeric styles
    fn compare_cited_keys(&self, a: &CitedKey, b: &CitedKey) -> Ordering;

    /// Disambiguation letters by key, for keys that need one
    fn unique_letters(&self, cited: &CitedKeys) -> HashMap<String, String>;

    fn render_group(&self, group: &CitationGroup) -> String;

    fn render_bibliography(&self, cited: &CitedKeys) -> String;
}

/// Surname of the first author: `"Smith, John and Doe, Jane"` gives `Smith`,
/// `"John Smith"` gives `Smith`
pub fn first_author_surname(entry: &BibEntry) -> Option<&str> {
    let first = entry.field("author")?.split(" and ").next()?.trim();
    match first.split_once(',') {
        Some((surname, _)) => Some(surname.trim()),
        None => first.split_whitespace().last(),
    }
}

fn bibliography_line(entry: &BibEntry) -> String {
    let author = entry.field("author").unwrap_or(&entry.key);
    let mut line = author.to_string();
    if let Some(year) = entry.field("year") {
        line.push_str(&format!(" ({year})"));
    }
    if let Some(title) = entry.field("title") {
        line.push_str(&format!(". {title}"));
    }
    line.push('.');
    line
}

/// `a` to `z`, then `aa`, `ab`, ... for the 0-based `index`
fn disambiguation_letters(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        n -= 1;
        letters.push(b'a' + (n % 26) as u8);
        n /= 26;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}

fn with_page_info(label: String, citation: &Citation) -> String {
    match &citation.page_info {
        Some(info) => format!("{label}, {info}"),
        None => label,
    }
}

/// `[1, 3]` style
#[derive(Debug, Clone, Default)]
pub struct NumericStyle;

impl NumericStyle {
    fn label(citation: &Citation) -> String {
        let label = match (citation.entry(), citation.number) {
            (Some(_), Some(number)) => number.to_string(),
            _ => UNRESOLVED.to_string(),
        };
        with_page_info(label, citation)
    }
}

impl CitationStyle for NumericStyle {
    fn is_numeric(&self) -> bool {
        true
    }

    fn compare_citations(&self, a: &Citation, b: &Citation) -> Ordering {
        // Unnumbered citations go last; before numbering, storage order stands
        match (a.number, b.number) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    fn compare_cited_keys(&self, a: &CitedKey, b: &CitedKey) -> Ordering {
        a.number.cmp(&b.number)
    }

    fn unique_letters(&self, _cited: &CitedKeys) -> HashMap<String, String> {
        HashMap::new()
    }

    fn render_group(&self, group: &CitationGroup) -> String {
        let labels: Vec<String> = group
            .citations_in_local_order()
            .map(|(_, citation)| Self::label(citation))
            .collect();
        match group.variant() {
            VariantTag::Parenthetical => format!("[{}]", labels.join(", ")),
            VariantTag::InText => format!("Ref. [{}]", labels.join(", ")),
            VariantTag::Invisible => String::new(),
        }
    }

    fn render_bibliography(&self, cited: &CitedKeys) -> String {
        cited
            .iter()
            .map(|key| {
                let number = key
                    .number
                    .map_or_else(|| UNRESOLVED.to_string(), |n| n.to_string());
                match key.lookup.entry() {
                    Some(entry) => format!("[{number}] {}", bibliography_line(entry)),
                    None => format!("[{number}] {} (not found)", key.key),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// `(Smith 2020a; Jones 2019)` style
#[derive(Debug, Clone, Default)]
pub struct AuthorYearStyle;

impl AuthorYearStyle {
    fn sort_key<'a>(entry: Option<&'a BibEntry>, key: &'a str) -> (&'a str, &'a str, &'a str) {
        let author = entry.and_then(first_author_surname).unwrap_or(key);
        let year = entry.and_then(|e| e.field("year")).unwrap_or("");
        (author, year, key)
    }

    /// Author and year of a citation, `None` when unresolved
    fn parts(citation: &Citation) -> Option<(String, String)> {
        let entry = citation.entry()?;
        let author = first_author_surname(entry).unwrap_or(&entry.key).to_string();
        let year = entry.field("year").unwrap_or("n.d.");
        let letter = citation.unique_letter.as_deref().unwrap_or("");
        Some((author, format!("{year}{letter}")))
    }
}

impl CitationStyle for AuthorYearStyle {
    fn is_numeric(&self) -> bool {
        false
    }

    fn compare_citations(&self, a: &Citation, b: &Citation) -> Ordering {
        Self::sort_key(a.entry(), &a.key).cmp(&Self::sort_key(b.entry(), &b.key))
    }

    fn compare_cited_keys(&self, a: &CitedKey, b: &CitedKey) -> Ordering {
        Self::sort_key(a.lookup.entry(), &a.key).cmp(&Self::sort_key(b.lookup.entry(), &b.key))
    }

    /// Keys sharing first author and year get `a`, `b`, ... in snapshot order
    fn unique_letters(&self, cited: &CitedKeys) -> HashMap<String, String> {
        let mut clashes: HashMap<(&str, &str), Vec<&str>> = HashMap::new();
        for key in cited.iter() {
            let Some(entry) = key.lookup.entry() else {
                continue;
            };
            let (Some(author), Some(year)) = (first_author_surname(entry), entry.field("year"))
            else {
                continue;
            };
            clashes.entry((author, year)).or_default().push(&key.key);
        }

        let mut letters = HashMap::new();
        for keys in clashes.into_values().filter(|keys| keys.len() > 1) {
            for (index, key) in keys.into_iter().enumerate() {
                letters.insert(key.to_string(), disambiguation_letters(index));
            }
        }
        letters
    }

    fn render_group(&self, group: &CitationGroup) -> String {
        let parts: Vec<(Option<(String, String)>, &Citation)> = group
            .citations_in_local_order()
            .map(|(_, citation)| (Self::parts(citation), citation))
            .collect();

        match group.variant() {
            VariantTag::Parenthetical => {
                let items: Vec<String> = parts
                    .into_iter()
                    .map(|(parts, citation)| {
                        let label = match parts {
                            Some((author, year)) => format!("{author} {year}"),
                            None => UNRESOLVED.to_string(),
                        };
                        with_page_info(label, citation)
                    })
                    .collect();
                format!("({})", items.join("; "))
            }
            VariantTag::InText => parts
                .into_iter()
                .map(|(parts, citation)| match parts {
                    Some((author, year)) => match &citation.page_info {
                        Some(info) => format!("{author} ({year}, {info})"),
                        None => format!("{author} ({year})"),
                    },
                    None => UNRESOLVED.to_string(),
                })
                .collect::<Vec<_>>()
                .join("; "),
            VariantTag::Invisible => String::new(),
        }
    }

    fn render_bibliography(&self, cited: &CitedKeys) -> String {
        cited
            .iter()
            .map(|key| match key.lookup.entry() {
                Some(entry) => {
                    let line = bibliography_line(entry);
                    match (&key.unique_letter, entry.field("year")) {
                        (Some(letter), Some(year)) => {
                            line.replacen(&format!("({year})"), &format!("({year}{letter})"), 1)
                        }
                        _ => line,
                    }
                }
                None => format!("{} (not found)", key.key),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
