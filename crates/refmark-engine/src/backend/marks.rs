use xi_rope::delta::Transformer;
use xi_rope::{Delta, RopeInfo};

use super::ContainerId;

/// A named range stored in a [`RopeDocument`](super::RopeDocument)
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Mark {
    pub name: String,
    pub container: ContainerId,
    pub range: std::ops::Range<usize>, // byte range in the container's rope
    /// Created empty; stays put instead of vanishing
    pub point: bool,
}

/// Transform ranges of marks in `container` through a delta.
///
/// Insertions at a mark's start push the mark forward and insertions at its end
/// do not extend it, so only text written strictly inside a mark becomes part of
/// it. A non-point mark whose range collapses to nothing is dropped; the names of
/// dropped marks are returned.
pub(crate) fn transform_marks(
    marks: &mut Vec<Mark>,
    container: ContainerId,
    delta: &Delta<RopeInfo>,
    new_len: usize,
) -> Vec<String> {
    let mut transformer = Transformer::new(delta);

    for mark in marks.iter_mut().filter(|m| m.container == container) {
        if mark.point {
            let at = transformer.transform(mark.range.start, false).min(new_len);
            mark.range = at..at;
            continue;
        }

        let new_start = transformer.transform(mark.range.start, true);
        let new_end = transformer.transform(mark.range.end, false);

        // Clamp to valid bounds; an inverted range counts as collapsed
        let clamped_start = new_start.min(new_len);
        let clamped_end = new_end.min(new_len).max(clamped_start);
        mark.range = clamped_start..clamped_end;
    }

    let mut dropped = Vec::new();
    marks.retain(|mark| {
        let keep = mark.container != container || mark.point || mark.range.start != mark.range.end;
        if !keep {
            dropped.push(mark.name.clone());
        }
        keep
    });
    dropped
}

/// Transform a plain range (a footnote anchor, a cursor) the same way as a mark
pub(crate) fn transform_range(
    range: &std::ops::Range<usize>,
    delta: &Delta<RopeInfo>,
) -> std::ops::Range<usize> {
    let mut transformer = Transformer::new(delta);
    if range.start == range.end {
        let at = transformer.transform(range.start, false);
        return at..at;
    }
    let start = transformer.transform(range.start, true);
    let end = transformer.transform(range.end, false).max(start);
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::commands::{Edit, compile_edit};

    fn mark(name: &str, range: std::ops::Range<usize>) -> Mark {
        Mark {
            name: name.to_string(),
            container: ContainerId::Body,
            point: range.start == range.end,
            range,
        }
    }

    fn run(marks: &mut Vec<Mark>, len: usize, edit: Edit) -> Vec<String> {
        let rope = xi_rope::Rope::from("x".repeat(len));
        let delta = compile_edit(len, &edit);
        let new_len = delta.apply(&rope).len();
        transform_marks(marks, ContainerId::Body, &delta, new_len)
    }

    #[test]
    fn test_insert_before_shifts_mark() {
        let mut marks = vec![mark("m", 5..8)];
        run(
            &mut marks,
            10,
            Edit::Insert {
                at: 0,
                text: "ab".to_string(),
            },
        );
        assert_eq!(marks[0].range, 7..10);
    }

    #[test]
    fn test_insert_at_start_does_not_grow_mark() {
        let mut marks = vec![mark("m", 5..8)];
        run(
            &mut marks,
            10,
            Edit::Insert {
                at: 5,
                text: "ab".to_string(),
            },
        );
        assert_eq!(marks[0].range, 7..10);
    }

    #[test]
    fn test_insert_at_end_does_not_grow_mark() {
        let mut marks = vec![mark("m", 5..8)];
        run(
            &mut marks,
            10,
            Edit::Insert {
                at: 8,
                text: "ab".to_string(),
            },
        );
        assert_eq!(marks[0].range, 5..8);
    }

    #[test]
    fn test_insert_inside_grows_mark() {
        let mut marks = vec![mark("m", 5..8)];
        run(
            &mut marks,
            10,
            Edit::Insert {
                at: 6,
                text: "ab".to_string(),
            },
        );
        assert_eq!(marks[0].range, 5..10);
    }

    #[test]
    fn test_replacing_whole_content_drops_mark() {
        let mut marks = vec![mark("m", 5..8)];
        let dropped = run(
            &mut marks,
            10,
            Edit::Replace {
                range: 5..8,
                text: "new".to_string(),
            },
        );
        assert!(marks.is_empty());
        assert_eq!(dropped, vec!["m".to_string()]);
    }

    #[test]
    fn test_point_mark_survives_insert_at_its_position() {
        let mut marks = vec![mark("p", 4..4)];
        let dropped = run(
            &mut marks,
            10,
            Edit::Insert {
                at: 4,
                text: "xyz".to_string(),
            },
        );
        assert!(dropped.is_empty());
        assert_eq!(marks[0].range, 4..4);
    }

    #[test]
    fn test_marks_in_other_containers_untouched() {
        let mut marks = vec![Mark {
            name: "f".to_string(),
            container: ContainerId::Footnote(1),
            range: 0..2,
            point: false,
        }];
        run(&mut marks, 10, Edit::Delete { range: 0..5 });
        assert_eq!(marks[0].range, 0..2);
    }

    #[test]
    fn test_transform_range_collapsed_stays_before_insert() {
        let delta = compile_edit(
            10,
            &Edit::Insert {
                at: 3,
                text: "ab".to_string(),
            },
        );
        assert_eq!(transform_range(&(3..3), &delta), 3..3);
        assert_eq!(transform_range(&(4..4), &delta), 6..6);
    }
}
