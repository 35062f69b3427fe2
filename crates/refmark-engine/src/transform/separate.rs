use crate::backend::DocumentBackend;
use crate::error::Result;
use crate::frontend::Frontend;
use crate::model::{CitationGroupId, VariantTag};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeparateSummary {
    /// Groups that were split
    pub split: usize,
    pub created: Vec<CitationGroupId>,
}

/// Split every group with more than one citation into single-citation groups
/// at the same position, in storage order, separated by spaces.
///
/// Page infos travel with their citations. Groups are independent of each
/// other and a group with one citation is left alone.
pub fn separate_all<B: DocumentBackend + Clone>(
    frontend: &mut Frontend<B>,
) -> Result<SeparateSummary> {
    let mut summary = SeparateSummary::default();

    for id in frontend.groups().ids() {
        let Some(group) = frontend.groups().get(&id) else {
            continue;
        };
        if group.len() < 2 {
            continue;
        }
        let Some(range) = frontend.group_range(&id)? else {
            log::warn!("Marker {id} is gone, not splitting it");
            continue;
        };

        let removed = frontend.remove_group(&id)?;
        let variant = removed.variant();
        let count = removed.len();
        let mut at = range.collapse_to_start();

        for (index, citation) in removed.citations().iter().enumerate() {
            let is_last = index + 1 == count;
            let (new_id, after) = frontend.create_group(
                std::slice::from_ref(&citation.key),
                std::slice::from_ref(&citation.page_info),
                variant,
                &at,
                !is_last,
                variant == VariantTag::Invisible,
            )?;
            summary.created.push(new_id);
            at = after;
        }

        log::debug!("Split {id} into {count} groups");
        summary.split += 1;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RopeDocument;
    use crate::storage::Placeholders;
    use crate::tests::document_with_markers;
    use pretty_assertions::assert_eq;
    use refmark_config::PayloadModel;

    #[test]
    fn test_separate_creates_one_group_per_citation() {
        // Given a group of three citations with page info on the second
        let doc = document_with_markers("See [1-3].", &[("RM_cite_1_a,b,c", 4, 9)]);
        doc.set_side_channel("RM_cite_1_a,b,c", r#"[null,"p. 5",null]"#)
            .unwrap();
        let mut frontend =
            Frontend::load(doc.clone(), PayloadModel::Citation, Placeholders::visible()).unwrap();

        // When separating
        let summary = separate_all(&mut frontend).unwrap();

        // Then three singleton groups stand in storage order, space separated
        let names: Vec<&str> = summary.created.iter().map(CitationGroupId::as_str).collect();
        assert_eq!(names, vec!["RM_cite_1_a", "RM_cite_1_b", "RM_cite_1_c"]);
        assert_eq!(doc.body_text(), "See <> <> <>.");
        let b = frontend.groups().get(&summary.created[1]).unwrap();
        assert_eq!(b.page_infos(), vec![Some("p. 5".to_string())]);
    }

    #[test]
    fn test_single_citation_groups_are_untouched() {
        let doc = document_with_markers("[1]", &[("RM_cite_1_a", 0, 3)]);
        let mut frontend =
            Frontend::load(doc.clone(), PayloadModel::Citation, Placeholders::visible()).unwrap();

        let summary = separate_all(&mut frontend).unwrap();

        assert_eq!(summary, SeparateSummary::default());
        assert_eq!(doc.body_text(), "[1]");
    }

    #[test]
    fn test_separating_twice_changes_nothing_more() {
        let doc = document_with_markers("[1,2]", &[("RM_cite_1_a,b", 0, 5)]);
        let mut frontend =
            Frontend::load(doc.clone(), PayloadModel::Citation, Placeholders::visible()).unwrap();
        separate_all(&mut frontend).unwrap();
        let text = doc.body_text();

        let again = separate_all(&mut frontend).unwrap();

        assert_eq!(again.split, 0);
        assert_eq!(doc.body_text(), text);
    }

    #[test]
    fn test_invisible_groups_split_without_placeholders() {
        let doc = RopeDocument::from_text("ab");
        doc.create_marker(
            "RM_cite_2_x,y",
            crate::backend::TextRange::collapsed(crate::backend::ContainerId::Body, 1),
        )
        .unwrap();
        let mut frontend =
            Frontend::load(doc.clone(), PayloadModel::Citation, Placeholders::visible()).unwrap();

        let summary = separate_all(&mut frontend).unwrap();

        assert_eq!(summary.created.len(), 2);
        assert_eq!(doc.body_text(), "a b");
    }
}
