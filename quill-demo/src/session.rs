//! One participant's editing session.
//!
//! `Session` owns the whole local stack for a replica: the shared document,
//! the text buffer standing in for an editor widget, the presence store,
//! the remote cursor overlay and the binding tying them together. The demo
//! plays the transport by pulling updates from one session into another.

use std::cell::RefCell;
use std::rc::Rc;

use log::info;
use quill_collab::{
    Awareness, AwarenessConfig, BindingOptions, ClientId, CursorOverlay, LocalEditor, Origin, Position,
    Result, SharedDoc, SharedText, StateField, SystemClock, TextBinding, TextBuffer, UserInfo,
};

pub struct Session {
    pub name: String,
    pub doc: Rc<SharedDoc>,
    pub editor: Rc<RefCell<TextBuffer>>,
    pub awareness: Rc<RefCell<Awareness>>,
    pub overlay: Rc<RefCell<CursorOverlay>>,
    binding: TextBinding<SharedDoc, TextBuffer>,
}

impl Session {
    pub fn new(name: &str, client_id: ClientId, config: AwarenessConfig, options: BindingOptions) -> Self {
        let doc = Rc::new(SharedDoc::new(client_id));
        let editor = Rc::new(RefCell::new(TextBuffer::new()));
        let awareness = Rc::new(RefCell::new(Awareness::with_config(
            client_id,
            config,
            Rc::new(SystemClock),
        )));
        let overlay = Rc::new(RefCell::new(CursorOverlay::new(options.overlay_style())));
        let color = options.client_color(client_id).to_string();

        let binding = TextBinding::new(
            doc.clone(),
            editor.clone(),
            Some(awareness.clone()),
            overlay.clone(),
            options,
        );
        awareness
            .borrow_mut()
            .set_local_state_field(StateField::User(Some(UserInfo::new(name, color))));

        Self {
            name: name.to_string(),
            doc,
            editor,
            awareness,
            overlay,
            binding,
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.doc.client_id()
    }

    pub fn text(&self) -> String {
        self.editor.borrow().value()
    }

    /// Type at the caret, replacing any selection.
    pub fn type_text(&self, text: &str) {
        self.editor.borrow_mut().replace_selection(text);
    }

    pub fn move_to_end(&self) {
        let mut editor = self.editor.borrow_mut();
        let end = editor.end_position();
        editor.move_cursor_to(end.row, end.column);
    }

    pub fn select(&self, anchor: Position, lead: Position) {
        self.editor.borrow_mut().set_selection(anchor, lead);
    }

    /// Receive whatever `from` has that this replica lacks.
    pub fn pull_document(&self, from: &Session) -> Result<()> {
        let diff = from.doc.encode_diff(&self.doc.state_vector())?;
        self.doc.apply_update(&diff)
    }

    pub fn pull_presence(&self, from: &Session) -> Result<()> {
        let bytes = from.awareness.borrow().encode_update(&[from.client_id()])?;
        self.awareness.borrow_mut().apply_update(&bytes, Origin::Remote)?;
        Ok(())
    }

    pub fn log_cursors(&self) {
        let overlay = self.overlay.borrow();
        if overlay.is_empty() {
            info!("[{}] no remote cursors", self.name);
            return;
        }
        let editor = self.editor.borrow();
        for cursor in overlay.cursors() {
            let caret = cursor.caret_position(&*editor);
            info!(
                "[{}] {} ({}, label {}) at {}:{}{}",
                self.name,
                cursor.name,
                cursor.color,
                cursor.label_color,
                caret.row,
                caret.column,
                if cursor.selection.is_some() { " with selection" } else { "" },
            );
        }
    }

    /// Close the editor and tear the document down, which takes this
    /// participant's presence offline.
    pub fn leave(&self) {
        self.binding.destroy();
        self.doc.destroy();
        info!(
            "[{}] left after {} suppressed echo(es)",
            self.name,
            self.binding.guard().suppressed()
        );
    }
}
