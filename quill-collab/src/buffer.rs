//! Line-based text buffer implementing [`LocalEditor`].
//!
//! Stores text as a vector of lines without their `\n` terminators, so an
//! empty buffer is one empty line and a trailing newline is a trailing
//! empty line. Columns are byte offsets into a line and are always snapped
//! to a char boundary.
//!
//! Positions handed in are clipped to the buffer, except by
//! [`LocalEditor::move_cursor_to_position`] and
//! [`LocalEditor::set_scroll_top`], which refuse targets that do not exist.

use std::fmt;

use crate::editor::{
    ChangeHandler, EditAction, EditorDelta, LocalEditor, Position, Range, Selection, SelectionHandler,
    TextLayout,
};
use crate::error::{CollabError, Result};
use crate::observer::{ListenerId, Observers};

pub struct TextBuffer {
    lines: Vec<String>,
    selection: Selection,
    scroll_top: usize,
    undo_stack: Vec<EditorDelta>,
    change_handlers: Observers<ChangeHandler<TextBuffer>>,
    selection_handlers: Observers<SelectionHandler<TextBuffer>>,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::from_text("")
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(String::from).collect(),
            selection: Selection::default(),
            scroll_top: 0,
            undo_stack: Vec::new(),
            change_handlers: Observers::new(),
            selection_handlers: Observers::new(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, row: usize) -> Option<&str> {
        self.lines.get(row).map(String::as_str)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].is_empty()
    }

    /// Position just past the last byte.
    pub fn end_position(&self) -> Position {
        let row = self.lines.len() - 1;
        Position::new(row, self.lines[row].len())
    }

    /// Nearest existing position: rows past the end map to the end of the
    /// document, columns past a line end map to the line end.
    pub fn clip(&self, position: Position) -> Position {
        if position.row >= self.lines.len() {
            return self.end_position();
        }
        let line = &self.lines[position.row];
        let mut column = position.column.min(line.len());
        while !line.is_char_boundary(column) {
            column -= 1;
        }
        Position::new(position.row, column)
    }

    /// Whether `position` names an existing location without clipping.
    pub fn contains(&self, position: Position) -> bool {
        self.lines
            .get(position.row)
            .is_some_and(|line| position.column <= line.len() && line.is_char_boundary(position.column))
    }

    /// Replace the selection with `text`, leaving the caret after it.
    pub fn replace_selection(&mut self, text: &str) -> Position {
        let range = self.selection.range();
        let start = if range.is_empty() {
            range.start
        } else {
            self.remove(range)
        };
        let end = self.insert(start, text);
        self.move_cursor_to(end.row, end.column);
        end
    }

    /// Revert the most recent recorded edit. Returns `false` if there is none.
    pub fn undo(&mut self) -> bool {
        let Some(delta) = self.undo_stack.pop() else {
            return false;
        };
        let inverse = delta.invert();
        let applied = match inverse.action {
            EditAction::Insert => self.insert_text(inverse.start, &inverse.text()),
            EditAction::Remove => self.remove_text(Range::new(inverse.start, inverse.end)),
        };
        if let Some(applied) = applied {
            self.commit(applied, false);
        }
        true
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    fn insert_text(&mut self, position: Position, text: &str) -> Option<EditorDelta> {
        if text.is_empty() {
            return None;
        }
        let start = self.clip(position);
        let inserted: Vec<String> = text.split('\n').map(String::from).collect();

        let line = &mut self.lines[start.row];
        let tail = line.split_off(start.column);
        line.push_str(&inserted[0]);

        let end = if inserted.len() == 1 {
            line.push_str(&tail);
            Position::new(start.row, start.column + inserted[0].len())
        } else {
            let mut rest = inserted[1..].to_vec();
            let last = rest.len() - 1;
            let end = Position::new(start.row + rest.len(), rest[last].len());
            rest[last].push_str(&tail);
            self.lines.splice(start.row + 1..start.row + 1, rest);
            end
        };

        Some(EditorDelta {
            action: EditAction::Insert,
            start,
            end,
            lines: inserted,
        })
    }

    fn remove_text(&mut self, range: Range) -> Option<EditorDelta> {
        let range = Range::new(self.clip(range.start), self.clip(range.end));
        let (start, end) = (range.start, range.end);
        if start == end {
            return None;
        }

        let removed = if start.row == end.row {
            let line = &mut self.lines[start.row];
            let removed = line[start.column..end.column].to_string();
            line.replace_range(start.column..end.column, "");
            vec![removed]
        } else {
            let mut removed = Vec::with_capacity(end.row - start.row + 1);
            removed.push(self.lines[start.row][start.column..].to_string());
            removed.extend(self.lines[start.row + 1..end.row].iter().cloned());
            removed.push(self.lines[end.row][..end.column].to_string());

            let tail = self.lines[end.row][end.column..].to_string();
            let first = &mut self.lines[start.row];
            first.truncate(start.column);
            first.push_str(&tail);
            self.lines.drain(start.row + 1..=end.row);
            removed
        };

        Some(EditorDelta {
            action: EditAction::Remove,
            start,
            end,
            lines: removed,
        })
    }

    /// Shift the selection, record undo, and notify.
    fn commit(&mut self, delta: EditorDelta, record_undo: bool) {
        let before = self.selection;
        self.selection = Selection {
            anchor: shift_point(before.anchor, &delta),
            lead: shift_point(before.lead, &delta),
        };
        if record_undo {
            self.undo_stack.push(delta.clone());
        }

        for handler in self.change_handlers.snapshot() {
            handler(&delta, self);
        }
        if self.selection != before {
            self.emit_selection();
        }
    }

    fn emit_selection(&self) {
        let selection = self.selection;
        for handler in self.selection_handlers.snapshot() {
            handler(&selection, self);
        }
    }
}

/// Where `point` ends up after `delta` has been applied.
fn shift_point(point: Position, delta: &EditorDelta) -> Position {
    let (start, end) = (delta.start, delta.end);
    match delta.action {
        EditAction::Insert => {
            if point < start {
                point
            } else if point.row == start.row {
                Position::new(end.row, end.column + (point.column - start.column))
            } else {
                Position::new(point.row + (end.row - start.row), point.column)
            }
        }
        EditAction::Remove => {
            if point <= start {
                point
            } else if point <= end {
                start
            } else if point.row == end.row {
                Position::new(start.row, start.column + (point.column - end.column))
            } else {
                Position::new(point.row - (end.row - start.row), point.column)
            }
        }
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextBuffer")
            .field("lines", &self.lines)
            .field("selection", &self.selection)
            .field("scroll_top", &self.scroll_top)
            .field("undo_depth", &self.undo_stack.len())
            .finish()
    }
}

impl TextLayout for TextBuffer {
    fn position_to_index(&self, position: Position) -> usize {
        let position = self.clip(position);
        let preceding: usize = self.lines[..position.row].iter().map(|l| l.len() + 1).sum();
        preceding + position.column
    }

    fn index_to_position(&self, index: usize) -> Position {
        let mut remaining = index;
        for (row, line) in self.lines.iter().enumerate() {
            if remaining <= line.len() {
                return self.clip(Position::new(row, remaining));
            }
            remaining -= line.len() + 1;
        }
        self.end_position()
    }

    fn text_len(&self) -> usize {
        self.lines.iter().map(String::len).sum::<usize>() + self.lines.len() - 1
    }
}

impl LocalEditor for TextBuffer {
    fn value(&self) -> String {
        self.lines.join("\n")
    }

    /// Emits a remove of the old content and an insert of the new one,
    /// then selects everything.
    fn set_value(&mut self, text: &str) {
        let everything = Range::new(Position::default(), self.end_position());
        if let Some(removed) = self.remove_text(everything) {
            self.commit(removed, true);
        }
        if let Some(inserted) = self.insert_text(Position::default(), text) {
            self.commit(inserted, true);
        }
        let end = self.end_position();
        self.set_selection(Position::default(), end);
    }

    fn insert(&mut self, position: Position, text: &str) -> Position {
        match self.insert_text(position, text) {
            Some(delta) => {
                let end = delta.end;
                self.commit(delta, true);
                end
            }
            None => self.clip(position),
        }
    }

    fn remove(&mut self, range: Range) -> Position {
        match self.remove_text(range) {
            Some(delta) => {
                let start = delta.start;
                self.commit(delta, true);
                start
            }
            None => self.clip(range.start),
        }
    }

    fn selection(&self) -> Selection {
        self.selection
    }

    fn set_selection(&mut self, anchor: Position, lead: Position) {
        let next = Selection {
            anchor: self.clip(anchor),
            lead: self.clip(lead),
        };
        if next != self.selection {
            self.selection = next;
            self.emit_selection();
        }
    }

    fn clear_selection(&mut self) {
        let lead = self.selection.lead;
        self.set_selection(lead, lead);
    }

    fn move_cursor_to(&mut self, row: usize, column: usize) {
        let at = Position::new(row, column);
        self.set_selection(at, at);
    }

    fn cursor_position(&self) -> Position {
        self.selection.lead
    }

    fn move_cursor_to_position(&mut self, position: Position) -> Result<()> {
        if !self.contains(position) {
            return Err(CollabError::InvalidPosition {
                row: position.row,
                column: position.column,
            });
        }
        self.move_cursor_to(position.row, position.column);
        Ok(())
    }

    fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    fn set_scroll_top(&mut self, row: usize) -> Result<()> {
        if row >= self.lines.len() {
            return Err(CollabError::InvalidScroll(row));
        }
        self.scroll_top = row;
        Ok(())
    }

    fn reset_undo_history(&mut self) {
        self.undo_stack.clear();
    }

    fn on_change(&mut self, handler: Box<ChangeHandler<Self>>) -> ListenerId {
        self.change_handlers.subscribe(handler)
    }

    fn off_change(&mut self, id: ListenerId) -> bool {
        self.change_handlers.unsubscribe(id)
    }

    fn on_selection(&mut self, handler: Box<SelectionHandler<Self>>) -> ListenerId {
        self.selection_handlers.subscribe(handler)
    }

    fn off_selection(&mut self, id: ListenerId) -> bool {
        self.selection_handlers.unsubscribe(id)
    }
}
