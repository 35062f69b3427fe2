use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use xi_rope::Rope;

use super::commands::{Edit, compile_edit};
use super::marks::{Mark, transform_marks, transform_range};
use super::{ContainerId, DocumentBackend, TextRange};
use crate::error::DocumentError;

/// Character inserted into the body where a footnote is anchored
pub const FOOTNOTE_ANCHOR: &str = "\u{FFFC}";

/// Result of applying an edit
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    /// Markers that collapsed to nothing and were dropped
    pub dropped: Vec<String>,
}

struct DocumentState {
    /// One rope per text flow; the body always exists
    containers: BTreeMap<ContainerId, Rope>,
    /// Footnote anchors as byte ranges in the body
    footnotes: BTreeMap<u32, std::ops::Range<usize>>,
    marks: Vec<Mark>,
    properties: HashMap<String, String>,
    cursor: Option<TextRange>,
    lock_depth: u32,
    next_footnote: u32,
    closed: bool,
}

/// In-memory document backed by xi-rope buffers.
///
/// Markers are transformed through every edit the way a word processor moves
/// its reference marks: text typed at a marker's edges stays outside it, and a
/// marker whose text is deleted entirely disappears. Cloning yields another
/// handle onto the same document.
///
/// ```rust
/// # use refmark_engine::backend::{ContainerId, DocumentBackend, RopeDocument, TextRange};
/// let doc = RopeDocument::from_text("See [x] here.");
/// doc.create_marker("m", TextRange::new(ContainerId::Body, 4, 7)).unwrap();
/// doc.insert_text(&TextRange::collapsed(ContainerId::Body, 0), "Please ").unwrap();
/// assert_eq!(doc.marker_text("m").as_deref(), Some("[x]"));
/// ```
#[derive(Clone)]
pub struct RopeDocument {
    state: Rc<RefCell<DocumentState>>,
}

impl RopeDocument {
    pub fn new() -> Self {
        Self::from_text("")
    }

    pub fn from_text(body: &str) -> Self {
        let mut containers = BTreeMap::new();
        containers.insert(ContainerId::Body, Rope::from(body));
        Self {
            state: Rc::new(RefCell::new(DocumentState {
                containers,
                footnotes: BTreeMap::new(),
                marks: Vec::new(),
                properties: HashMap::new(),
                cursor: None,
                lock_depth: 0,
                next_footnote: 1,
                closed: false,
            })),
        }
    }

    /// Insert a footnote anchored at byte `at` of the body
    pub fn add_footnote(&self, at: usize, text: &str) -> Result<ContainerId, DocumentError> {
        let anchor = TextRange::collapsed(ContainerId::Body, at);
        let anchor = self.insert_text(&anchor, FOOTNOTE_ANCHOR)?;

        let mut state = self.state.borrow_mut();
        let number = state.next_footnote;
        state.next_footnote += 1;
        state.footnotes.insert(number, anchor.span());
        let id = ContainerId::Footnote(number);
        state.containers.insert(id, Rope::from(text));
        Ok(id)
    }

    /// Apply an edit to one container, moving every marker, footnote anchor and
    /// the cursor along with the text
    pub fn apply(&self, container: ContainerId, edit: Edit) -> Result<Patch, DocumentError> {
        let mut state = self.state.borrow_mut();
        state.ensure_open()?;

        let target = edit.target();
        let buffer = state.buffer(container)?;
        if !is_valid_span(buffer, &target) {
            return Err(DocumentError::InvalidRange {
                range: TextRange::new(container, target.start, target.end),
            });
        }

        let delta = compile_edit(buffer.len(), &edit);
        let new_buffer = delta.apply(buffer);
        let new_len = new_buffer.len();
        state.containers.insert(container, new_buffer);

        let mut dropped = transform_marks(&mut state.marks, container, &delta, new_len);

        if container == ContainerId::Body {
            dropped.extend(state.transform_footnotes(&delta));
        }

        if let Some(cursor) = state.cursor
            && cursor.container == container
        {
            let moved = transform_range(&cursor.span(), &delta);
            state.cursor = Some(TextRange::new(container, moved.start, moved.end));
        }

        if !dropped.is_empty() {
            log::debug!("Markers dropped by edit: {dropped:?}");
        }

        Ok(Patch { dropped })
    }

    pub fn set_cursor(&self, cursor: Option<TextRange>) {
        self.state.borrow_mut().cursor = cursor;
    }

    /// Text of the body (convenience for callers and tests)
    pub fn body_text(&self) -> String {
        self.state
            .borrow()
            .containers
            .get(&ContainerId::Body)
            .map(|rope| rope.to_string())
            .unwrap_or_default()
    }

    /// Current text of a marker, `None` if it does not exist
    pub fn marker_text(&self, name: &str) -> Option<String> {
        let state = self.state.borrow();
        let mark = state.marks.iter().find(|m| m.name == name)?;
        let buffer = state.containers.get(&mark.container)?;
        Some(buffer.slice_to_cow(mark.range.clone()).into_owned())
    }

    pub fn footnotes(&self) -> Vec<ContainerId> {
        self.state
            .borrow()
            .footnotes
            .keys()
            .map(|n| ContainerId::Footnote(*n))
            .collect()
    }

    pub fn lock_depth(&self) -> u32 {
        self.state.borrow().lock_depth
    }

    /// Simulate losing the connection to the document
    pub fn close(&self) {
        self.state.borrow_mut().closed = true;
    }

    pub fn reopen(&self) {
        self.state.borrow_mut().closed = false;
    }
}

impl std::fmt::Debug for RopeDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("RopeDocument")
            .field("containers", &state.containers.len())
            .field("marks", &state.marks.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl Default for RopeDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentState {
    fn ensure_open(&self) -> Result<(), DocumentError> {
        if self.closed {
            Err(DocumentError::Unavailable)
        } else {
            Ok(())
        }
    }

    fn buffer(&self, container: ContainerId) -> Result<&Rope, DocumentError> {
        self.containers
            .get(&container)
            .ok_or(DocumentError::InvalidRange {
                range: TextRange::collapsed(container, 0),
            })
    }

    fn check_range(&self, range: &TextRange) -> Result<&Rope, DocumentError> {
        let buffer = self.buffer(range.container)?;
        if is_valid_span(buffer, &range.span()) {
            Ok(buffer)
        } else {
            Err(DocumentError::InvalidRange { range: *range })
        }
    }

    /// Move footnote anchors through a body edit. A footnote whose anchor was
    /// deleted disappears together with its text and markers.
    fn transform_footnotes(&mut self, delta: &xi_rope::Delta<xi_rope::RopeInfo>) -> Vec<String> {
        let mut removed = Vec::new();
        for (number, anchor) in self.footnotes.iter_mut() {
            *anchor = transform_range(anchor, delta);
            if anchor.start == anchor.end {
                removed.push(*number);
            }
        }

        let mut dropped = Vec::new();
        for number in removed {
            let id = ContainerId::Footnote(number);
            self.footnotes.remove(&number);
            self.containers.remove(&id);
            self.marks.retain(|mark| {
                let keep = mark.container != id;
                if !keep {
                    dropped.push(mark.name.clone());
                }
                keep
            });
            if self.cursor.is_some_and(|c| c.container == id) {
                self.cursor = None;
            }
        }
        dropped
    }
}

fn is_valid_span(buffer: &Rope, span: &std::ops::Range<usize>) -> bool {
    if span.start > span.end || span.end > buffer.len() {
        return false;
    }
    let text = buffer.to_string();
    text.is_char_boundary(span.start) && text.is_char_boundary(span.end)
}

impl DocumentBackend for RopeDocument {
    fn marker_names(&self) -> Result<Vec<String>, DocumentError> {
        let state = self.state.borrow();
        state.ensure_open()?;
        Ok(state.marks.iter().map(|m| m.name.clone()).collect())
    }

    fn find_marker(&self, name: &str) -> Result<Option<TextRange>, DocumentError> {
        let state = self.state.borrow();
        state.ensure_open()?;
        Ok(state
            .marks
            .iter()
            .find(|m| m.name == name)
            .map(|m| TextRange::new(m.container, m.range.start, m.range.end)))
    }

    fn create_marker(&self, name: &str, range: TextRange) -> Result<(), DocumentError> {
        let mut state = self.state.borrow_mut();
        state.ensure_open()?;

        if state.marks.iter().any(|m| m.name == name) {
            return Err(DocumentError::MarkerCreationFailed {
                name: name.to_string(),
                reason: "name already in use".to_string(),
            });
        }
        if state.check_range(&range).is_err() {
            return Err(DocumentError::MarkerCreationFailed {
                name: name.to_string(),
                reason: format!("range {range} is outside the document"),
            });
        }

        state.marks.push(Mark {
            name: name.to_string(),
            container: range.container,
            range: range.span(),
            point: range.is_empty(),
        });
        Ok(())
    }

    fn remove_marker(&self, name: &str) -> Result<(), DocumentError> {
        let mut state = self.state.borrow_mut();
        state.ensure_open()?;

        let before = state.marks.len();
        state.marks.retain(|m| m.name != name);
        if state.marks.len() == before {
            return Err(DocumentError::MarkerNotFound {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn side_channel(&self, name: &str) -> Result<Option<String>, DocumentError> {
        let state = self.state.borrow();
        state.ensure_open()?;
        Ok(state.properties.get(name).cloned())
    }

    fn set_side_channel(&self, name: &str, value: &str) -> Result<(), DocumentError> {
        let mut state = self.state.borrow_mut();
        state.ensure_open()?;
        state.properties.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove_side_channel(&self, name: &str) -> Result<(), DocumentError> {
        let mut state = self.state.borrow_mut();
        state.ensure_open()?;
        state.properties.remove(name);
        Ok(())
    }

    fn cursor(&self) -> Result<Option<TextRange>, DocumentError> {
        let state = self.state.borrow();
        state.ensure_open()?;
        Ok(state.cursor)
    }

    fn footnote_anchor_of(&self, range: &TextRange) -> Result<Option<TextRange>, DocumentError> {
        let state = self.state.borrow();
        state.ensure_open()?;
        let ContainerId::Footnote(number) = range.container else {
            return Ok(None);
        };
        Ok(state
            .footnotes
            .get(&number)
            .map(|anchor| TextRange::new(ContainerId::Body, anchor.start, anchor.end)))
    }

    fn text(&self, range: &TextRange) -> Result<String, DocumentError> {
        let state = self.state.borrow();
        state.ensure_open()?;
        let buffer = state.check_range(range)?;
        Ok(buffer.slice_to_cow(range.span()).into_owned())
    }

    fn container_text(&self, container: ContainerId) -> Result<String, DocumentError> {
        let state = self.state.borrow();
        state.ensure_open()?;
        Ok(state.buffer(container)?.to_string())
    }

    fn insert_text(&self, at: &TextRange, text: &str) -> Result<TextRange, DocumentError> {
        self.apply(
            at.container,
            Edit::Insert {
                at: at.start,
                text: text.to_string(),
            },
        )?;
        Ok(TextRange::new(at.container, at.start, at.start + text.len()))
    }

    fn replace_text(&self, range: &TextRange, text: &str) -> Result<TextRange, DocumentError> {
        self.apply(
            range.container,
            Edit::Replace {
                range: range.span(),
                text: text.to_string(),
            },
        )?;
        Ok(TextRange::new(
            range.container,
            range.start,
            range.start + text.len(),
        ))
    }

    fn delete_text(&self, range: &TextRange) -> Result<(), DocumentError> {
        if range.is_empty() {
            return Ok(());
        }
        self.apply(range.container, Edit::Delete { range: range.span() })?;
        Ok(())
    }

    fn lock_controllers(&self) -> Result<(), DocumentError> {
        let mut state = self.state.borrow_mut();
        state.ensure_open()?;
        state.lock_depth += 1;
        Ok(())
    }

    fn unlock_controllers(&self) -> Result<(), DocumentError> {
        let mut state = self.state.borrow_mut();
        state.lock_depth = state.lock_depth.saturating_sub(1);
        Ok(())
    }
}
