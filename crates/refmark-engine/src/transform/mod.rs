//! Structural rewrites of citation groups: merging adjacent groups into one
//! and splitting groups into single citations.
//!
//! Both leave numbering stale; callers resync afterwards.

mod merge;
mod separate;

pub use merge::{MergeSummary, find_joinable_runs, merge_adjacent};
pub use separate::{SeparateSummary, separate_all};

use refmark_config::PayloadModel;

use crate::storage::join_distinct;

/// Page infos of a merged group, from the page infos of the groups in the run.
///
/// With per-citation payload the infos are concatenated unchanged. With the
/// group-level payload each group's info (on its last citation) is joined with
/// the others, and the join goes onto the last citation of the result. That
/// join cannot be undone by separating again.
pub fn combine_page_infos(
    model: PayloadModel,
    groups: &[Vec<Option<String>>],
) -> Vec<Option<String>> {
    match model {
        PayloadModel::Citation => groups.iter().flatten().cloned().collect(),
        PayloadModel::Group => {
            let total: usize = groups.iter().map(Vec::len).sum();
            let infos: Vec<&str> = groups
                .iter()
                .filter_map(|infos| infos.last()?.as_deref())
                .filter(|info| !info.trim().is_empty())
                .collect();

            let mut combined = vec![None; total];
            if !infos.is_empty()
                && let Some(last) = combined.last_mut()
            {
                *last = Some(join_distinct(&infos));
            }
            combined
        }
    }
}
