/*!
 * # Resync
 *
 * Recomputes everything derived from the citation groups and writes it back
 * into the document:
 *
 * 1. Drop groups whose markers vanished and refuse overlapping markers
 * 2. Look every cited key up in the databases
 * 3. Compute the global order, then the local order inside each group
 * 4. Number keys by first appearance (numeric styles) or assign
 *    disambiguation letters (author-year styles)
 * 5. Rewrite each marker's text through the fill protocol
 * 6. Rebuild the bibliography
 *
 * Derived data is cleared first and recomputed from scratch every time.
 */

use refmark_config::{Config, PayloadModel};

use crate::backend::{ContainerId, DocumentBackend, TextRange};
use crate::error::{DocumentError, Result};
use crate::frontend::Frontend;
use crate::model::{BibDatabase, CitationGroupId, CitedKeys, VariantTag};
use crate::storage::Placeholders;
use crate::style::CitationStyle;

/// Name of the marker holding the bibliography. Not a citation marker.
pub const BIBLIOGRAPHY_MARKER: &str = "RM_bibliography";

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    pub payload_model: PayloadModel,
    pub map_footnotes_to_marks: bool,
    pub overlap_report_cap: usize,
    pub require_separation: bool,
    pub placeholders: Placeholders,
    pub rebuild_bibliography: bool,
}

impl From<&Config> for SyncOptions {
    fn from(config: &Config) -> Self {
        Self {
            payload_model: config.payload_model,
            map_footnotes_to_marks: config.map_footnotes_to_marks,
            overlap_report_cap: config.overlap_report_cap,
            require_separation: config.require_separation,
            placeholders: if config.visible_placeholders {
                Placeholders::visible()
            } else {
                Placeholders::zero_width()
            },
            rebuild_bibliography: config.rebuild_bibliography,
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// What a resync found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub groups: usize,
    /// Keys no database knows, in order of first appearance
    pub unresolved_keys: Vec<String>,
    pub bibliography_rebuilt: bool,
    /// Groups dropped because their markers were gone
    pub vanished: Vec<CitationGroupId>,
}

pub fn resync<B: DocumentBackend + Clone>(
    frontend: &mut Frontend<B>,
    style: &dyn CitationStyle,
    databases: &[&dyn BibDatabase],
    options: &SyncOptions,
) -> Result<SyncReport> {
    let vanished = frontend.prune_vanished()?;

    let overlaps =
        frontend.check_range_overlaps(options.require_separation, options.overlap_report_cap)?;
    if !overlaps.is_empty() {
        return Err(DocumentError::OverlapDetected(overlaps).into());
    }

    let groups = frontend.groups_mut();
    groups.clear_derived_data();

    let mut cited = groups.aggregate_cited_keys()?;
    cited.lookup_in_databases(databases);
    cited.distribute_lookup_results(groups)?;

    let order = frontend.compute_visual_order(options.map_footnotes_to_marks)?;

    let groups = frontend.groups_mut();
    groups.impose_local_order(|a, b| style.compare_citations(a, b));
    let mut cited = groups.aggregate_cited_keys_in_appearance_order()?;
    let unresolved_keys = cited.missing_keys();

    if style.is_numeric() {
        cited.number_resolved_in_current_order();
        cited.distribute_numbers(groups)?;
    } else {
        cited.sort_by(|a, b| style.compare_cited_keys(a, b));
        let letters = style.unique_letters(&cited);
        cited.set_unique_letters(&letters);
        cited.distribute_unique_letters(groups)?;
    }
    groups.impose_local_order(|a, b| style.compare_citations(a, b));

    for id in &order {
        render_group(frontend, style, id)?;
    }

    let bibliography_rebuilt = options.rebuild_bibliography;
    if bibliography_rebuilt {
        write_bibliography(frontend, style, &cited)?;
    }
    frontend.groups_mut().set_bibliography(cited);

    log::debug!(
        "Resynced {} groups, {} unresolved keys",
        order.len(),
        unresolved_keys.len()
    );
    Ok(SyncReport {
        groups: order.len(),
        unresolved_keys,
        bibliography_rebuilt,
        vanished,
    })
}

fn render_group<B: DocumentBackend + Clone>(
    frontend: &Frontend<B>,
    style: &dyn CitationStyle,
    id: &CitationGroupId,
) -> Result<()> {
    let Some(group) = frontend.groups().get(id) else {
        return Err(crate::error::InvariantError::UnknownGroup(id.clone()).into());
    };
    let text = style.render_group(group);
    frontend.named_range(id).rewrite(&text, false)
}

/// Write the bibliography into its marker, creating the marker on its own
/// line at the end of the body when the document has none
fn write_bibliography<B: DocumentBackend + Clone>(
    frontend: &Frontend<B>,
    style: &dyn CitationStyle,
    cited: &CitedKeys,
) -> Result<()> {
    let storage = frontend.storage();
    let range = match storage.get(BIBLIOGRAPHY_MARKER)? {
        Some(range) => range,
        None => {
            let backend = frontend.backend();
            let body = backend.container_text(ContainerId::Body)?;
            let mut end = TextRange::collapsed(ContainerId::Body, body.len());
            if !body.is_empty() && !body.ends_with('\n') {
                end = backend.insert_text(&end, "\n")?.collapse_to_end();
            }
            storage.create(BIBLIOGRAPHY_MARKER, &end, false, false)?.range
        }
    };
    range.rewrite(&style.render_bibliography(cited), false)
}

/// Insert a new citation group at the document's cursor and resync.
///
/// Invisible groups are created empty with nothing after them; all others get
/// placeholders and a trailing space. A cursor inside an existing citation or
/// footnote anchor is refused before anything is written.
pub fn insert_citation<B: DocumentBackend + Clone>(
    frontend: &mut Frontend<B>,
    keys: &[String],
    page_infos: &[Option<String>],
    variant: VariantTag,
    style: &dyn CitationStyle,
    databases: &[&dyn BibDatabase],
    options: &SyncOptions,
) -> Result<(CitationGroupId, SyncReport)> {
    let cursor = frontend.backend().cursor()?.ok_or(DocumentError::NoCursor)?;
    let conflicts = frontend.check_insertion_point(
        &cursor,
        options.require_separation,
        options.overlap_report_cap,
    )?;
    if !conflicts.is_empty() {
        return Err(DocumentError::OverlapDetected(conflicts).into());
    }
    let invisible = variant == VariantTag::Invisible;

    let (id, _) = frontend.create_group(keys, page_infos, variant, &cursor, !invisible, invisible)?;
    log::debug!("Inserted {id} at {cursor}");

    let report = resync(frontend, style, databases, options)?;
    Ok((id, report))
}
