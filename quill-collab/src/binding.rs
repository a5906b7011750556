//! Bidirectional binding between a shared text and a local editor.
//!
//! ```text
//!                    ┌──────────── ReentrancyGuard ────────────┐
//!                    │                                          │
//!  SharedText ──observe──► apply_shared_delta ──► LocalEditor ──┤
//!      ▲                                              │ change  │ echo → cursor refresh
//!      └────────── apply_editor_delta ◄───────────────┘         │
//!                    │                                          │
//!                    └──────────────────────────────────────────┘
//!
//!  LocalEditor ──selection──► CursorState ──► Awareness (local field)
//!  Awareness ──change──► CursorRenderer (remote cursors only)
//! ```
//!
//! Both replication directions run inside the same guard, so the echo a
//! write produces on the other side lands in the guard's fallback instead
//! of being sent back. Every local change that is not such an echo is
//! forwarded.
//!
//! Event handlers hold a weak reference to the binding and go inert once it
//! is destroyed, even if the editor or the store could not be borrowed to
//! unregister them at that moment.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::awareness::{Awareness, AwarenessChange, ClientId, StateField, UserInfo};
use crate::cursors::{CursorRenderer, OverlayStyle};
use crate::delta::{apply_editor_delta, apply_shared_delta, cursor_for_selection, TextDelta};
use crate::editor::{EditorDelta, LocalEditor};
use crate::error::{CollabError, Result};
use crate::mutex::ReentrancyGuard;
use crate::observer::ListenerId;
use crate::shared::SharedText;

// ───────────────────────────────────────────────────────────────────
// Options
// ───────────────────────────────────────────────────────────────────

/// Palette for participants that have not chosen a color.
pub const DEFAULT_COLORS: [&str; 11] = [
    "#f44336", // red
    "#ff9800", // orange
    "#ffeb3b", // yellow
    "#4caf50", // green
    "#2196f3", // blue
    "#9c27b0", // purple
    "#e91e63", // pink
    "#00bcd4", // cyan
    "#009688", // teal
    "#795548", // brown
    "#607d8b", // blue grey
];

/// Binding configuration. Missing keys take their defaults when parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BindingOptions {
    /// Keep the editor's undo history instead of resetting it on bind.
    pub preserve_undo_stack: bool,
    pub colors: Vec<String>,
    pub cursor_width: f32,
    pub selection_opacity: f32,
    pub label_enabled: bool,
}

impl Default for BindingOptions {
    fn default() -> Self {
        let style = OverlayStyle::default();
        Self {
            preserve_undo_stack: false,
            colors: DEFAULT_COLORS.iter().map(|c| c.to_string()).collect(),
            cursor_width: style.cursor_width,
            selection_opacity: style.selection_opacity,
            label_enabled: style.label_enabled,
        }
    }
}

impl BindingOptions {
    /// Parse options from JSON, e.g. `{"preserveUndoStack": true}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        if options.colors.is_empty() {
            return Err(CollabError::Config("colors must not be empty".into()));
        }
        Ok(options)
    }

    pub fn overlay_style(&self) -> OverlayStyle {
        OverlayStyle {
            cursor_width: self.cursor_width,
            selection_opacity: self.selection_opacity,
            label_enabled: self.label_enabled,
        }
    }

    /// Stable palette color for a client.
    pub fn client_color(&self, client_id: ClientId) -> &str {
        if self.colors.is_empty() {
            return DEFAULT_COLORS[(client_id % DEFAULT_COLORS.len() as u64) as usize];
        }
        &self.colors[(client_id % self.colors.len() as u64) as usize]
    }

    /// Identity used for the local cursor when the presence record has no user.
    pub fn default_user(&self, client_id: ClientId) -> UserInfo {
        UserInfo::new(format!("User {client_id}"), self.client_color(client_id))
    }
}

// ───────────────────────────────────────────────────────────────────
// Binding
// ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Uninitialized,
    Bound,
    Destroyed,
}

#[derive(Debug, Default)]
struct Registrations {
    editor_change: Option<ListenerId>,
    editor_selection: Option<ListenerId>,
    awareness_change: Option<ListenerId>,
    doc_destroy: Option<ListenerId>,
}

struct Inner<S: SharedText, E> {
    shared: Rc<S>,
    editor: Rc<RefCell<E>>,
    awareness: Option<Rc<RefCell<Awareness>>>,
    renderer: Rc<RefCell<dyn CursorRenderer>>,
    guard: ReentrancyGuard,
    options: BindingOptions,
    state: Cell<BindingState>,
    subscription: RefCell<Option<S::Subscription>>,
    registrations: RefCell<Registrations>,
}

/// Keeps one shared text, one local editor and (optionally) one presence
/// store in sync until destroyed or dropped.
///
/// The binding owns none of them; destroying it leaves their contents as
/// they are.
pub struct TextBinding<S: SharedText + 'static, E: LocalEditor> {
    inner: Rc<Inner<S, E>>,
}

impl<S: SharedText + 'static, E: LocalEditor> TextBinding<S, E> {
    /// Seed the editor from the shared text and start replicating.
    ///
    /// # Panics
    ///
    /// If `editor` is already borrowed.
    pub fn new(
        shared: Rc<S>,
        editor: Rc<RefCell<E>>,
        awareness: Option<Rc<RefCell<Awareness>>>,
        renderer: Rc<RefCell<dyn CursorRenderer>>,
        options: BindingOptions,
    ) -> Self {
        let inner = Rc::new(Inner {
            shared,
            editor,
            awareness,
            renderer,
            guard: ReentrancyGuard::new(),
            options,
            state: Cell::new(BindingState::Uninitialized),
            subscription: RefCell::new(None),
            registrations: RefCell::new(Registrations::default()),
        });

        inner.seed_editor();
        Inner::register(&inner);
        inner.populate_cursors();
        inner.state.set(BindingState::Bound);
        log::debug!("text binding for client {} bound", inner.shared.client_id());

        Self { inner }
    }

    pub fn state(&self) -> BindingState {
        self.inner.state.get()
    }

    /// The guard both directions share; its suppression count shows how
    /// many echoes were swallowed.
    pub fn guard(&self) -> &ReentrancyGuard {
        &self.inner.guard
    }

    pub fn options(&self) -> &BindingOptions {
        &self.inner.options
    }

    pub fn shared(&self) -> &Rc<S> {
        &self.inner.shared
    }

    pub fn editor(&self) -> &Rc<RefCell<E>> {
        &self.inner.editor
    }

    pub fn awareness(&self) -> Option<&Rc<RefCell<Awareness>>> {
        self.inner.awareness.as_ref()
    }

    /// Publish the editor's current selection as the local cursor.
    pub fn refresh_cursor(&self) {
        match self.inner.editor.try_borrow() {
            Ok(editor) => self.inner.refresh_cursor(&editor),
            Err(_) => log::debug!("editor busy, cursor refresh skipped"),
        }
    }

    /// Unregister every handler and clear remote cursor decorations.
    /// Calling it again is a no-op.
    pub fn destroy(&self) {
        self.inner.destroy();
    }
}

impl<S: SharedText + 'static, E: LocalEditor> Drop for TextBinding<S, E> {
    fn drop(&mut self) {
        self.inner.destroy();
    }
}

impl<S: SharedText + 'static, E: LocalEditor> fmt::Debug for TextBinding<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextBinding")
            .field("client_id", &self.inner.shared.client_id())
            .field("state", &self.inner.state.get())
            .field("suppressed", &self.inner.guard.suppressed())
            .finish_non_exhaustive()
    }
}

impl<S: SharedText + 'static, E: LocalEditor> Inner<S, E> {
    fn is_bound(&self) -> bool {
        self.state.get() != BindingState::Destroyed
    }

    fn seed_editor(&self) {
        let content = self.shared.text();
        let mut editor = self.editor.borrow_mut();
        self.guard.run(|| {
            editor.set_value(&content);
            editor.clear_selection();
            editor.move_cursor_to(0, 0);
        });
        if !self.options.preserve_undo_stack {
            editor.reset_undo_history();
        }
    }

    fn register(this: &Rc<Self>) {
        let mut registrations = this.registrations.borrow_mut();

        let weak = Rc::downgrade(this);
        let subscription = this.shared.observe(Box::new(move |delta| {
            if let Some(inner) = weak.upgrade() {
                inner.on_shared_change(delta);
            }
        }));
        *this.subscription.borrow_mut() = Some(subscription);

        {
            let mut editor = this.editor.borrow_mut();
            let weak: Weak<Self> = Rc::downgrade(this);
            registrations.editor_change = Some(editor.on_change(Box::new(move |delta, editor| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_editor_change(delta, editor);
                }
            })));
            let weak: Weak<Self> = Rc::downgrade(this);
            registrations.editor_selection = Some(editor.on_selection(Box::new(move |_, editor| {
                if let Some(inner) = weak.upgrade() {
                    inner.refresh_cursor(editor);
                }
            })));
        }

        if let Some(awareness) = &this.awareness {
            let weak: Weak<Self> = Rc::downgrade(this);
            registrations.awareness_change = Some(awareness.borrow_mut().on_change(Box::new(
                move |change, _, store| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_awareness_change(change, store);
                    }
                },
            )));
            // The store follows the document's lifetime, not the binding's.
            Awareness::follow_document(awareness, &*this.shared);
        }

        let weak: Weak<Self> = Rc::downgrade(this);
        registrations.doc_destroy = Some(this.shared.on_destroy(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.destroy();
            }
        })));
    }

    /// Draw cursors already present in the store.
    fn populate_cursors(&self) {
        let Some(awareness) = &self.awareness else {
            return;
        };
        let local = self.shared.client_id();
        let awareness = awareness.borrow();
        let mut renderer = self.renderer.borrow_mut();
        for (&client_id, state) in awareness.states() {
            if client_id != local && state.cursor.is_some() {
                renderer.update_cursors(Some(state), client_id, false);
            }
        }
        renderer.redraw();
    }

    /// # Panics
    ///
    /// If the editor is borrowed while a remote update is applied. Skipping
    /// the delta would leave the buffer diverged from the shared text.
    fn on_shared_change(&self, delta: &[TextDelta]) {
        if !self.is_bound() {
            return;
        }
        self.guard.run(|| {
            let mut editor = self.editor.borrow_mut();
            apply_shared_delta(&mut *editor, delta);
        });
    }

    fn on_editor_change(&self, delta: &EditorDelta, editor: &E) {
        if !self.is_bound() {
            return;
        }
        self.guard.run_or(
            || apply_editor_delta(&*self.shared, editor, delta),
            || self.refresh_cursor(editor),
        );
    }

    fn refresh_cursor(&self, editor: &E) {
        if !self.is_bound() {
            return;
        }
        let Some(awareness) = &self.awareness else {
            return;
        };
        let Ok(mut awareness) = awareness.try_borrow_mut() else {
            log::trace!("presence store busy, cursor refresh skipped");
            return;
        };

        let client_id = self.shared.client_id();
        let local = awareness.local_state().cloned().unwrap_or_default();
        let user = local
            .user
            .unwrap_or_else(|| self.options.default_user(client_id));
        let cursor = cursor_for_selection(editor, &editor.selection(), client_id, &user);

        if local.cursor.is_some_and(|current| current.same_span(&cursor)) {
            return;
        }
        awareness.set_local_state_field(StateField::Cursor(Some(cursor)));
    }

    fn on_awareness_change(&self, change: &AwarenessChange, awareness: &Awareness) {
        if !self.is_bound() {
            return;
        }
        let Ok(mut renderer) = self.renderer.try_borrow_mut() else {
            log::warn!("cursor renderer busy, presence change not drawn");
            return;
        };
        let local = self.shared.client_id();
        for client_id in change.added.iter().chain(&change.updated).copied() {
            renderer.update_cursors(awareness.state(client_id), client_id, client_id == local);
        }
        for &client_id in &change.removed {
            renderer.remove_user_elements(client_id);
        }
        renderer.redraw();
    }

    fn destroy(&self) {
        if self.state.replace(BindingState::Destroyed) == BindingState::Destroyed {
            return;
        }
        drop(self.subscription.borrow_mut().take());

        let registrations = std::mem::take(&mut *self.registrations.borrow_mut());
        match self.editor.try_borrow_mut() {
            Ok(mut editor) => {
                if let Some(id) = registrations.editor_change {
                    editor.off_change(id);
                }
                if let Some(id) = registrations.editor_selection {
                    editor.off_selection(id);
                }
            }
            Err(_) => log::warn!("editor busy during destroy; its handlers stay registered but inert"),
        }
        if let (Some(awareness), Some(id)) = (&self.awareness, registrations.awareness_change) {
            match awareness.try_borrow_mut() {
                Ok(mut awareness) => {
                    awareness.off_change(id);
                }
                Err(_) => log::warn!("presence store busy during destroy; its handler stays registered but inert"),
            }
        }
        if let Some(id) = registrations.doc_destroy {
            self.shared.off_destroy(id);
        }
        match self.renderer.try_borrow_mut() {
            Ok(mut renderer) => renderer.clear(),
            Err(_) => log::warn!("cursor renderer busy during destroy; decorations not cleared"),
        }
        log::debug!("text binding for client {} destroyed", self.shared.client_id());
    }
}

// ===================================================================
// Tests
// ===================================================================
