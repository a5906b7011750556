//! Remote cursor decorations.
//!
//! [`CursorRenderer`] is what the binding drives when presence changes.
//! [`CursorOverlay`] is a rendering-agnostic implementation: it keeps one
//! [`RemoteCursor`] per remote participant, which a front end can turn into
//! carets, labels and selection highlights however it likes.
//!
//! The local participant never gets a decoration; its own caret is drawn
//! by the editor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::awareness::{ClientId, PresenceState};
use crate::editor::{Position, TextLayout};

/// Receiver of presence-driven cursor updates.
pub trait CursorRenderer {
    /// Show `state`'s cursor for `client_id`, or drop its decorations if
    /// the state has no cursor.
    fn update_cursors(&mut self, state: Option<&PresenceState>, client_id: ClientId, is_local: bool);

    fn remove_user_elements(&mut self, client_id: ClientId);

    fn clear(&mut self);

    fn redraw(&mut self);
}

/// Visual parameters. Carried through untouched; only the front end reads them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayStyle {
    pub cursor_width: f32,
    pub selection_opacity: f32,
    pub label_enabled: bool,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            cursor_width: 2.0,
            selection_opacity: 0.3,
            label_enabled: true,
        }
    }
}

/// One remote participant's decoration, in shared-document byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCursor {
    pub client_id: ClientId,
    pub name: String,
    pub color: String,
    /// Label text color with enough contrast against `color`.
    pub label_color: &'static str,
    pub caret: usize,
    /// Highlighted span, `start < end`.
    pub selection: Option<(usize, usize)>,
}

impl RemoteCursor {
    /// Caret as a row/column in the given layout.
    pub fn caret_position(&self, layout: &(impl TextLayout + ?Sized)) -> Position {
        layout.index_to_position(self.caret)
    }

    pub fn selection_positions(&self, layout: &(impl TextLayout + ?Sized)) -> Option<(Position, Position)> {
        self.selection
            .map(|(start, end)| (layout.index_to_position(start), layout.index_to_position(end)))
    }
}

/// In-memory model of the remote cursor layer.
#[derive(Debug, Default)]
pub struct CursorOverlay {
    style: OverlayStyle,
    cursors: BTreeMap<ClientId, RemoteCursor>,
    redraws: u64,
}

impl CursorOverlay {
    pub fn new(style: OverlayStyle) -> Self {
        Self {
            style,
            cursors: BTreeMap::new(),
            redraws: 0,
        }
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    pub fn cursor(&self, client_id: ClientId) -> Option<&RemoteCursor> {
        self.cursors.get(&client_id)
    }

    /// Decorations ordered by client id.
    pub fn cursors(&self) -> impl Iterator<Item = &RemoteCursor> {
        self.cursors.values()
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// Number of redraw requests received.
    pub fn redraws(&self) -> u64 {
        self.redraws
    }
}

impl CursorRenderer for CursorOverlay {
    fn update_cursors(&mut self, state: Option<&PresenceState>, client_id: ClientId, is_local: bool) {
        let Some(cursor) = state.and_then(|s| s.cursor.as_ref()) else {
            self.remove_user_elements(client_id);
            return;
        };
        if is_local {
            self.cursors.remove(&client_id);
            return;
        }
        let selection = (cursor.sel && cursor.anchor != cursor.head).then_some((cursor.anchor, cursor.head));
        self.cursors.insert(
            client_id,
            RemoteCursor {
                client_id,
                name: cursor.name.clone(),
                color: cursor.color.clone(),
                label_color: contrast_color(&cursor.color),
                caret: cursor.pos,
                selection,
            },
        );
    }

    fn remove_user_elements(&mut self, client_id: ClientId) {
        self.cursors.remove(&client_id);
    }

    fn clear(&mut self) {
        self.cursors.clear();
    }

    fn redraw(&mut self) {
        self.redraws += 1;
    }
}

/// Black or white, whichever reads better on `color`.
///
/// Accepts `#rrggbb` and `rgb(r, g, b)`. Anything unparseable gets black.
pub fn contrast_color(color: &str) -> &'static str {
    let Some((r, g, b)) = parse_color(color) else {
        return "#000000";
    };
    let luminance = (0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)) / 255.0;
    if luminance > 0.5 {
        "#000000"
    } else {
        "#ffffff"
    }
}

fn parse_color(color: &str) -> Option<(u8, u8, u8)> {
    let color = color.trim();
    if let Some(hex) = color.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        return Some((channel(0)?, channel(2)?, channel(4)?));
    }
    let inner = color.strip_prefix("rgb(")?.strip_suffix(')')?;
    let mut channels = inner.split(',').map(|c| c.trim().parse::<u8>().ok());
    let rgb = (channels.next()??, channels.next()??, channels.next()??);
    channels.next().is_none().then_some(rgb)
}
