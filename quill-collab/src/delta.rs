//! Translation between shared-document deltas and local editor edits.
//!
//! ```text
//!  shared delta                          local editor
//!  [Retain 3, Insert "x", Delete 2] ──►  insert (0,3) "x"; remove (0,4)..(0,6)
//!
//!  local edit                            shared document
//!  Insert (1,2) ["a", "b"]          ──►  insert(index_of((1,2)), "a\nb")
//! ```
//!
//! Row/column positions are recomputed from the editor's layout right
//! before every operation; nothing is cached across mutations.

use crate::awareness::{ClientId, CursorState, UserInfo};
use crate::editor::{EditAction, EditorDelta, LocalEditor, Range, Selection, TextLayout};
use crate::shared::SharedText;

/// One run of a shared-document change, in document order.
/// Lengths are byte counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextDelta {
    Retain(usize),
    Insert(String),
    Delete(usize),
}

impl TextDelta {
    /// How far the run moves the cursor through the resulting document.
    pub fn advance(&self) -> usize {
        match self {
            TextDelta::Retain(n) => *n,
            TextDelta::Insert(text) => text.len(),
            TextDelta::Delete(_) => 0,
        }
    }
}

/// Replay a shared-document delta onto the local editor.
///
/// The caret and scroll row are restored afterwards when they still exist;
/// a failed restore is logged and otherwise ignored.
///
/// # Panics
///
/// If an insert or delete reaches past the end of the editor's text, which
/// means the editor and the shared document have diverged.
pub fn apply_shared_delta<E: LocalEditor>(editor: &mut E, delta: &[TextDelta]) {
    let caret = editor.cursor_position();
    let scroll = editor.scroll_top();
    let mut index = 0;

    for op in delta {
        match op {
            TextDelta::Retain(n) => index += n,
            TextDelta::Insert(text) => {
                let len = editor.text_len();
                assert!(index <= len, "insert at {index} past end of local text ({len})");
                let at = editor.index_to_position(index);
                editor.insert(at, text);
                index += text.len();
            }
            TextDelta::Delete(n) => {
                let len = editor.text_len();
                assert!(index + n <= len, "delete {index}..{} past end of local text ({len})", index + n);
                let start = editor.index_to_position(index);
                let end = editor.index_to_position(index + n);
                editor.remove(Range::new(start, end));
            }
        }
    }

    if let Err(err) = editor.move_cursor_to_position(caret) {
        log::debug!("caret not restored after remote change: {err}");
    }
    if let Err(err) = editor.set_scroll_top(scroll) {
        log::debug!("scroll not restored after remote change: {err}");
    }
}

/// Forward one local edit to the shared document.
///
/// `layout` must already reflect the edit, as it does inside an editor
/// change handler; `delta.start` precedes the edited span either way.
pub fn apply_editor_delta<S, L>(shared: &S, layout: &L, delta: &EditorDelta)
where
    S: SharedText + ?Sized,
    L: TextLayout + ?Sized,
{
    let index = layout.position_to_index(delta.start);
    match delta.action {
        EditAction::Insert => shared.insert(index, &delta.text()),
        EditAction::Remove => shared.delete(index, delta.text_len()),
    }
}

/// Presence cursor for `selection`, both ends converted with one layout.
pub fn cursor_for_selection<L>(layout: &L, selection: &Selection, client_id: ClientId, user: &UserInfo) -> CursorState
where
    L: TextLayout + ?Sized,
{
    let anchor = layout.position_to_index(selection.anchor);
    let lead = layout.position_to_index(selection.lead);
    CursorState::from_offsets(client_id, user, anchor, lead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::TextBuffer;
    use crate::editor::Position;
    use crate::shared::SharedDoc;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_insert_and_delete_runs() {
        let mut buffer = TextBuffer::from_text("hello world");
        apply_shared_delta(
            &mut buffer,
            &[
                TextDelta::Retain(5),
                TextDelta::Insert(",".into()),
                TextDelta::Retain(1),
                TextDelta::Delete(5),
                TextDelta::Insert("there".into()),
            ],
        );
        assert_eq!(buffer.value(), "hello, there");
    }

    #[test]
    fn test_multiline_runs_recompute_layout() {
        let mut buffer = TextBuffer::from_text("ab\ncd");
        apply_shared_delta(
            &mut buffer,
            &[
                TextDelta::Retain(1),
                TextDelta::Insert("1\n2\n".into()),
                TextDelta::Retain(1),
                TextDelta::Delete(2),
            ],
        );
        assert_eq!(buffer.value(), "a1\n2\nbd");
    }

    #[test]
    fn test_caret_and_scroll_restored() {
        let mut buffer = TextBuffer::from_text("one\ntwo\nthree");
        buffer.move_cursor_to(2, 3);
        buffer.set_scroll_top(1).unwrap();

        apply_shared_delta(&mut buffer, &[TextDelta::Insert("zero\n".into())]);
        assert_eq!(buffer.cursor_position(), Position::new(2, 3));
        assert_eq!(buffer.scroll_top(), 1);
    }

    #[test]
    fn test_failed_restore_is_ignored() {
        let mut buffer = TextBuffer::from_text("one\ntwo\nthree");
        buffer.move_cursor_to(2, 5);
        buffer.set_scroll_top(2).unwrap();

        apply_shared_delta(&mut buffer, &[TextDelta::Retain(3), TextDelta::Delete(10)]);
        assert_eq!(buffer.value(), "one");
        assert_eq!(buffer.line_count(), 1);
    }

    #[test]
    #[should_panic(expected = "past end of local text")]
    fn test_out_of_range_delete_panics() {
        let mut buffer = TextBuffer::from_text("abc");
        apply_shared_delta(&mut buffer, &[TextDelta::Retain(2), TextDelta::Delete(5)]);
    }

    #[test]
    fn test_editor_deltas_forwarded_to_shared() {
        let doc = Rc::new(SharedDoc::new(1));
        doc.insert(0, "line1\nline2");
        let mut buffer = TextBuffer::from_text("line1\nline2");
        let target = doc.clone();
        buffer.on_change(Box::new(move |delta, layout| apply_editor_delta(&*target, layout, delta)));

        buffer.insert(Position::new(1, 0), "x\ny");
        assert_eq!(doc.text(), "line1\nx\nyline2");
        buffer.remove(Range::new(Position::new(0, 3), Position::new(1, 1)));
        assert_eq!(doc.text(), "lin\nyline2");
        assert_eq!(doc.text(), buffer.value());
    }

    #[test]
    fn test_round_trip_through_shared_document() {
        let source = Rc::new(SharedDoc::new(1));
        source.insert(0, "abcdef");
        let replica = SharedDoc::new(2);
        replica.apply_update(&source.encode_state_as_update()).unwrap();

        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = received.clone();
        let _sub = replica.observe(Box::new(move |delta| sink.borrow_mut().push(delta.to_vec())));

        let mut local = TextBuffer::from_text("abcdef");
        let target = source.clone();
        local.on_change(Box::new(move |delta, layout| apply_editor_delta(&*target, layout, delta)));
        local.insert(Position::new(0, 3), "hello");
        assert_eq!(source.text(), "abchellodef");

        let diff = source.encode_diff(&replica.state_vector()).unwrap();
        replica.apply_update(&diff).unwrap();

        let mut remote = TextBuffer::from_text("abcdef");
        for delta in received.borrow().iter() {
            apply_shared_delta(&mut remote, delta);
        }
        assert_eq!(received.borrow().len(), 1);
        assert_eq!(remote.value(), "abchellodef");
        assert_eq!(local.value(), remote.value());
    }

    #[test]
    fn test_cursor_for_reversed_selection() {
        let buffer = TextBuffer::from_text("0123456789ab");
        let selection = Selection {
            anchor: Position::new(0, 10),
            lead: Position::new(0, 4),
        };
        let cursor = cursor_for_selection(&buffer, &selection, 1, &UserInfo::new("A", "#000000"));
        assert_eq!((cursor.anchor, cursor.head, cursor.pos, cursor.sel), (4, 10, 10, true));
    }

    #[test]
    fn test_advance() {
        assert_eq!(TextDelta::Retain(4).advance(), 4);
        assert_eq!(TextDelta::Insert("é".into()).advance(), 2);
        assert_eq!(TextDelta::Delete(3).advance(), 0);
    }
}
