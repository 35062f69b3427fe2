use xi_rope::delta::Builder;
use xi_rope::{Delta, Rope, RopeInfo};

/// Text edits that can be applied to one container of a [`RopeDocument`](super::RopeDocument)
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    Insert {
        at: usize,
        text: String,
    },
    Delete {
        range: std::ops::Range<usize>,
    },
    Replace {
        range: std::ops::Range<usize>,
        text: String,
    },
}

impl Edit {
    /// Byte range of the old text the edit touches
    pub fn target(&self) -> std::ops::Range<usize> {
        match self {
            Edit::Insert { at, .. } => *at..*at,
            Edit::Delete { range } | Edit::Replace { range, .. } => range.clone(),
        }
    }
}

/// Compile an edit into a delta over a buffer of `len` bytes
pub(crate) fn compile_edit(len: usize, edit: &Edit) -> Delta<RopeInfo> {
    let mut builder = Builder::new(len);
    match edit {
        Edit::Insert { at, text } => {
            builder.replace(*at..*at, Rope::from(text.as_str()));
        }
        Edit::Delete { range } => {
            builder.delete(range.clone());
        }
        Edit::Replace { range, text } => {
            builder.replace(range.clone(), Rope::from(text.as_str()));
        }
    }
    builder.build()
}
