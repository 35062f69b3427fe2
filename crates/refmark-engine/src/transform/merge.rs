use refmark_config::PayloadModel;

use crate::backend::{DocumentBackend, TextRange};
use crate::error::{InvariantError, Result};
use crate::frontend::Frontend;
use crate::model::{CitationGroupId, VariantTag};
use crate::ordering::{RangeEntry, bucket_by_container};

use super::combine_page_infos;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Number of runs folded into one group each
    pub runs: usize,
    /// Number of groups removed by folding
    pub merged_groups: usize,
    pub created: Vec<CitationGroupId>,
}

/// Runs of two or more adjacent parenthetical groups with nothing but
/// whitespace between them, in document order per container.
///
/// A group joins a run when it has the same variant as the run, starts at or
/// after the end of the previous group, and the text in between is empty or
/// whitespace only.
pub fn find_joinable_runs<B: DocumentBackend + Clone>(
    frontend: &Frontend<B>,
) -> Result<Vec<Vec<RangeEntry<CitationGroupId>>>> {
    let mut runs = Vec::new();

    for bucket in bucket_by_container(frontend.group_ranges()?) {
        let mut current: Vec<RangeEntry<CitationGroupId>> = Vec::new();
        let mut current_variant: Option<VariantTag> = None;

        for entry in bucket.entries {
            let variant = variant_of(frontend, &entry.owner)?;
            let joins = match (current.last(), current_variant) {
                (Some(previous), Some(run_variant)) if run_variant == variant => {
                    is_whitespace_gap(frontend, &previous.range, &entry.range)?
                }
                _ => false,
            };

            if joins {
                current.push(entry);
                continue;
            }

            if current.len() > 1 {
                runs.push(std::mem::take(&mut current));
            }
            current.clear();
            current_variant = None;
            if variant == VariantTag::Parenthetical {
                current.push(entry);
                current_variant = Some(variant);
            }
        }

        if current.len() > 1 {
            runs.push(current);
        }
    }
    Ok(runs)
}

fn variant_of<B: DocumentBackend + Clone>(
    frontend: &Frontend<B>,
    id: &CitationGroupId,
) -> Result<VariantTag> {
    frontend
        .groups()
        .get(id)
        .map(|group| group.variant())
        .ok_or_else(|| InvariantError::UnknownGroup(id.clone()).into())
}

fn is_whitespace_gap<B: DocumentBackend + Clone>(
    frontend: &Frontend<B>,
    previous: &TextRange,
    next: &TextRange,
) -> Result<bool> {
    if next.start < previous.end {
        return Ok(false);
    }
    let gap = TextRange::new(previous.container, previous.end, next.start);
    let text = frontend.backend().text(&gap)?;
    Ok(text.chars().all(char::is_whitespace))
}

/// Fold every joinable run into a single group at the position of the run.
///
/// Runs are rewritten from the end of each container backwards so positions
/// of runs not yet handled stay valid.
pub fn merge_adjacent<B: DocumentBackend + Clone>(
    frontend: &mut Frontend<B>,
) -> Result<MergeSummary> {
    let runs = find_joinable_runs(frontend)?;
    let mut summary = MergeSummary::default();

    for run in runs.into_iter().rev() {
        let id = merge_run(frontend, &run)?;
        summary.runs += 1;
        summary.merged_groups += run.len();
        summary.created.push(id);
    }
    summary.created.reverse();

    log::debug!(
        "Merged {} groups in {} runs",
        summary.merged_groups,
        summary.runs
    );
    Ok(summary)
}

fn merge_run<B: DocumentBackend + Clone>(
    frontend: &mut Frontend<B>,
    run: &[RangeEntry<CitationGroupId>],
) -> Result<CitationGroupId> {
    debug_assert!(run.len() > 1, "a run holds at least two groups");
    let (first, last) = (&run[0], &run[run.len() - 1]);
    let container = first.range.container;
    let start = first.range.start;
    let span = last.range.end - start;

    let mut keys = Vec::new();
    let mut page_infos = Vec::with_capacity(run.len());
    for entry in run {
        let group = frontend
            .groups()
            .get(&entry.owner)
            .ok_or_else(|| InvariantError::UnknownGroup(entry.owner.clone()))?;
        keys.extend(group.keys());
        page_infos.push(group.page_infos());
    }

    let model = frontend.storage().payload_model();
    let combined = combine_page_infos(model, &page_infos);
    let carried_infos = page_infos
        .iter()
        .filter(|infos| infos.iter().any(Option::is_some))
        .count();
    if model == PayloadModel::Group && carried_infos > 1 {
        let ids: Vec<&str> = run.iter().map(|e| e.owner.as_str()).collect();
        log::warn!("Page infos of {ids:?} were joined and cannot be split again");
    }

    let mut removed_len = 0;
    for entry in run {
        removed_len += entry.range.len();
        frontend.remove_group(&entry.owner)?;
    }

    let gap = TextRange::new(container, start, start + (span - removed_len));
    frontend.backend().delete_text(&gap)?;

    let (id, _) = frontend.create_group(
        &keys,
        &combined,
        VariantTag::Parenthetical,
        &TextRange::collapsed(container, start),
        false,
        false,
    )?;
    log::debug!("Merged {} groups into {id}", run.len());
    Ok(id)
}
