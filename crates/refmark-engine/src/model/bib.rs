use std::collections::{BTreeMap, HashMap};

/// A bibliography entry as seen by the engine: its key and raw fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntry {
    pub key: String,
    pub fields: BTreeMap<String, String>,
}

impl BibEntry {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Source of bibliography entries, looked up by citation key
pub trait BibDatabase {
    /// Name used to tell databases apart in lookup results
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Option<&BibEntry>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryDatabase {
    name: String,
    entries: HashMap<String, BibEntry>,
}

impl InMemoryDatabase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, entry: BibEntry) {
        self.entries.insert(entry.key.clone(), entry);
    }

    pub fn with_entry(mut self, entry: BibEntry) -> Self {
        self.insert(entry);
        self
    }
}

impl BibDatabase for InMemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<&BibEntry> {
        self.entries.get(key)
    }
}

/// A resolved entry together with the database it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResult {
    pub entry: BibEntry,
    pub database: String,
}

/// Outcome of looking a citation key up in the databases
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Lookup {
    /// Not looked up yet
    #[default]
    Unresolved,
    /// Looked up, no database has the key
    Missing,
    Found(LookupResult),
}

impl Lookup {
    /// Look `key` up in `databases`; the first database that has it wins
    pub fn resolve(key: &str, databases: &[&dyn BibDatabase]) -> Self {
        databases
            .iter()
            .find_map(|db| {
                db.get(key).map(|entry| {
                    Lookup::Found(LookupResult {
                        entry: entry.clone(),
                        database: db.name().to_string(),
                    })
                })
            })
            .unwrap_or(Lookup::Missing)
    }

    pub fn entry(&self) -> Option<&BibEntry> {
        match self {
            Lookup::Found(result) => Some(&result.entry),
            Lookup::Unresolved | Lookup::Missing => None,
        }
    }
}
