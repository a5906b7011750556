//! Local editor seam.
//!
//! The binding drives any editor that can describe its edits as positional
//! insert/remove deltas over line-delimited text and can map between flat
//! offsets and (row, column) positions. [`crate::buffer::TextBuffer`] is the
//! in-crate implementation.
//!
//! Offsets and columns are UTF-8 byte counts, matching the shared document.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::observer::ListenerId;

/// Row/column location in the local buffer. Columns count bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

/// Half-open span between two positions, `start <= end`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    /// Build a range from two positions in any order.
    pub fn new(a: Position, b: Position) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Live selection: `anchor` stays put while `lead` follows the caret.
/// The anchor may come after the lead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Position,
    pub lead: Position,
}

impl Selection {
    pub fn collapsed(at: Position) -> Self {
        Self { anchor: at, lead: at }
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.lead
    }

    pub fn range(&self) -> Range {
        Range::new(self.anchor, self.lead)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditAction {
    Insert,
    Remove,
}

/// One local edit: the text inserted at, or removed from, `start..end`.
/// `lines` is the affected text split on `\n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorDelta {
    pub action: EditAction,
    pub start: Position,
    pub end: Position,
    pub lines: Vec<String>,
}

impl EditorDelta {
    /// The affected text, lines joined with `\n`.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Byte length of the affected text.
    pub fn text_len(&self) -> usize {
        self.lines.iter().map(String::len).sum::<usize>() + self.lines.len().saturating_sub(1)
    }

    /// The edit that undoes this one.
    pub fn invert(&self) -> Self {
        Self {
            action: match self.action {
                EditAction::Insert => EditAction::Remove,
                EditAction::Remove => EditAction::Insert,
            },
            ..self.clone()
        }
    }
}

/// Offset/position mapping over the buffer's current line layout.
///
/// The two directions are exact inverses for any location that exists in
/// the current snapshot. Results go stale after any mutation, so callers
/// recompute right before use.
pub trait TextLayout {
    fn position_to_index(&self, position: Position) -> usize;
    fn index_to_position(&self, index: usize) -> Position;
    /// Total length in bytes, newlines included.
    fn text_len(&self) -> usize;
}

pub type ChangeHandler<E> = dyn Fn(&EditorDelta, &E);
pub type SelectionHandler<E> = dyn Fn(&Selection, &E);

/// Editable text surface the binding keeps in sync.
///
/// Change and selection handlers run synchronously, after the edit has been
/// applied, and receive the editor itself so they can consult the layout
/// without borrowing it a second time.
pub trait LocalEditor: TextLayout + Sized + 'static {
    fn value(&self) -> String;

    /// Replace the whole content.
    fn set_value(&mut self, text: &str);

    /// Insert `text` at `position`; returns the end of the inserted text.
    fn insert(&mut self, position: Position, text: &str) -> Position;

    /// Remove `range`; returns the start of the removed span.
    fn remove(&mut self, range: Range) -> Position;

    /// Anchor and lead captured together.
    fn selection(&self) -> Selection;

    fn set_selection(&mut self, anchor: Position, lead: Position);

    /// Collapse the selection onto its lead.
    fn clear_selection(&mut self);

    fn move_cursor_to(&mut self, row: usize, column: usize);

    fn cursor_position(&self) -> Position;

    /// Fails if `position` does not exist in the current buffer.
    fn move_cursor_to_position(&mut self, position: Position) -> Result<()>;

    fn scroll_top(&self) -> usize;

    /// Fails if `row` does not exist in the current buffer.
    fn set_scroll_top(&mut self, row: usize) -> Result<()>;

    fn reset_undo_history(&mut self);

    fn on_change(&mut self, handler: Box<ChangeHandler<Self>>) -> ListenerId;

    fn off_change(&mut self, id: ListenerId) -> bool;

    fn on_selection(&mut self, handler: Box<SelectionHandler<Self>>) -> ListenerId;

    fn off_selection(&mut self, id: ListenerId) -> bool;
}
