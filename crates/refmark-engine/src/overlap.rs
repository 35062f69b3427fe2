use std::fmt;

use crate::backend::{ContainerId, TextRange};
use crate::model::CitationGroupId;
use crate::ordering::{RangeEntry, bucket_by_container};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapKind {
    /// Two or more ranges with identical start and end
    EqualRange,
    /// A range starts before an earlier one ends
    Overlap,
    /// A range starts exactly where an earlier one ends
    Touch,
}

impl fmt::Display for OverlapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlapKind::EqualRange => write!(f, "same range"),
            OverlapKind::Overlap => write!(f, "overlap"),
            OverlapKind::Touch => write!(f, "touch"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeOwner {
    Citation(CitationGroupId),
    /// The anchor of a footnote holding citations
    FootnoteAnchor(ContainerId),
    /// Where new text is about to be inserted
    InsertionPoint,
}

impl fmt::Display for RangeOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeOwner::Citation(id) => write!(f, "citation {id}"),
            RangeOwner::FootnoteAnchor(container) => write!(f, "anchor of {container}"),
            RangeOwner::InsertionPoint => write!(f, "insertion point"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedRange {
    pub owner: RangeOwner,
    /// Text shown to the user to locate the range
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapIncident {
    pub kind: OverlapKind,
    pub ranges: Vec<(TextRange, ProtectedRange)>,
}

/// Every incident found, up to the cap
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OverlapReport {
    pub incidents: Vec<OverlapIncident>,
    /// More incidents exist than were reported
    pub truncated: bool,
}

impl OverlapReport {
    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.incidents.len()
    }
}

impl fmt::Display for OverlapReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Citation ranges must not overlap:")?;
        for incident in &self.incidents {
            write!(f, "\n- {}:", incident.kind)?;
            for (range, protected) in &incident.ranges {
                write!(f, " {} {:?} at {range};", protected.owner, protected.description)?;
            }
        }
        if self.truncated {
            write!(f, "\n(further problems not listed)")?;
        }
        Ok(())
    }
}

/// Check protected ranges for equal, overlapping and (with
/// `require_separation`) touching pairs.
///
/// Stops after `cap` incidents; a cap of `0` reports everything.
pub fn check_overlaps(
    entries: Vec<RangeEntry<ProtectedRange>>,
    require_separation: bool,
    cap: usize,
) -> OverlapReport {
    let mut report = OverlapReport::default();
    let push = |report: &mut OverlapReport, incident: OverlapIncident| -> bool {
        if cap > 0 && report.incidents.len() >= cap {
            report.truncated = true;
            return false;
        }
        report.incidents.push(incident);
        true
    };

    for bucket in bucket_by_container(entries) {
        let entries = bucket.entries;
        // Index of the entry with the largest end seen so far
        let mut furthest: Option<usize> = None;
        let mut i = 0;
        while i < entries.len() {
            let range = entries[i].range;
            let run_end = entries[i..]
                .iter()
                .position(|e| e.range != range)
                .map_or(entries.len(), |offset| i + offset);

            if run_end - i > 1 {
                let incident = OverlapIncident {
                    kind: OverlapKind::EqualRange,
                    ranges: entries[i..run_end]
                        .iter()
                        .map(|e| (e.range, e.owner.clone()))
                        .collect(),
                };
                if !push(&mut report, incident) {
                    return report;
                }
            }

            if let Some(prev) = furthest {
                let earlier = &entries[prev];
                let kind = if range.start < earlier.range.end {
                    Some(OverlapKind::Overlap)
                } else if require_separation && range.start == earlier.range.end {
                    Some(OverlapKind::Touch)
                } else {
                    None
                };
                if let Some(kind) = kind {
                    let incident = OverlapIncident {
                        kind,
                        ranges: vec![
                            (earlier.range, earlier.owner.clone()),
                            (range, entries[i].owner.clone()),
                        ],
                    };
                    if !push(&mut report, incident) {
                        return report;
                    }
                }
            }

            if furthest.is_none_or(|prev| entries[prev].range.end < range.end) {
                furthest = Some(i);
            }
            i = run_end;
        }
    }
    report
}

/// Check whether inserting text at `at` would land inside a protected range.
///
/// A point strictly inside a range is an overlap. With `require_separation`
/// a point on either edge of a range is a touch. Stops after `cap` incidents
/// like [`check_overlaps`].
pub fn check_insertion_point(
    entries: Vec<RangeEntry<ProtectedRange>>,
    at: &TextRange,
    require_separation: bool,
    cap: usize,
) -> OverlapReport {
    let point = at.collapse_to_start();
    let mut report = OverlapReport::default();

    for entry in entries {
        let range = entry.range;
        if range.container != point.container {
            continue;
        }
        let kind = if range.start < point.start && point.start < range.end {
            OverlapKind::Overlap
        } else if require_separation && (point.start == range.start || point.start == range.end)
        {
            OverlapKind::Touch
        } else {
            continue;
        };

        if cap > 0 && report.incidents.len() >= cap {
            report.truncated = true;
            break;
        }
        report.incidents.push(OverlapIncident {
            kind,
            ranges: vec![
                (range, entry.owner),
                (
                    point,
                    ProtectedRange {
                        owner: RangeOwner::InsertionPoint,
                        description: String::new(),
                    },
                ),
            ],
        });
    }
    report
}
