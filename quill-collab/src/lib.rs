//! # quill-collab — Collaborative text editing glue for Quill
//!
//! Keeps a local editor buffer in sync with a replicated yrs text and
//! shares each participant's presence (name, color, cursor) between
//! sessions.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   yrs updates    ┌──────────────┐
//! │ SharedDoc    │ ◄──────────────► │ SharedDoc    │
//! │ (replica A)  │   (transport)    │ (replica B)  │
//! └──────┬───────┘                  └──────────────┘
//!        │ TextDelta
//!        ▼
//! ┌──────────────┐   EditorDelta    ┌──────────────┐
//! │ TextBinding  │ ◄──────────────► │ LocalEditor  │
//! │ (guarded)    │    selection     │ (TextBuffer) │
//! └──────┬───────┘                  └──────────────┘
//!        │ cursor field
//!        ▼
//! ┌──────────────┐  AwarenessUpdate ┌──────────────┐
//! │ Awareness    │ ◄──────────────► │ Awareness    │
//! │ + expiry     │   (transport)    │ (replica B)  │
//! └──────┬───────┘                  └──────────────┘
//!        │ change
//!        ▼
//!  CursorRenderer (remote cursors)
//! ```
//!
//! Everything runs on one thread. Stores and editors are shared as
//! `Rc<RefCell<_>>`, and the expiry monitor runs on a tokio `LocalSet`.
//!
//! ## Modules
//!
//! - [`awareness`] — presence store with per-client clocks
//! - [`expiry`] — eviction of silent peers and local self-refresh
//! - [`protocol`] — bincode wire format for presence batches
//! - [`mutex`] — reentrancy guard that swallows synchronous echoes
//! - [`editor`] / [`buffer`] — local editor seam and a line-based buffer
//! - [`shared`] — shared text seam and the yrs-backed document
//! - [`delta`] — translation between shared deltas and editor edits
//! - [`cursors`] — remote cursor rendering seam and overlay model
//! - [`binding`] — the bidirectional text binding

pub mod awareness;
pub mod binding;
pub mod buffer;
pub mod clock;
pub mod cursors;
pub mod delta;
pub mod editor;
pub mod error;
pub mod expiry;
pub mod mutex;
pub mod observer;
pub mod protocol;
pub mod shared;

// Re-exports for convenience
pub use awareness::{
    Awareness, AwarenessChange, AwarenessConfig, AwarenessEntry, ClientId, ClientMeta, CursorState,
    Origin, PresenceState, StateField, UserInfo, DEFAULT_OUTDATED_TIMEOUT,
};
pub use binding::{BindingOptions, BindingState, TextBinding, DEFAULT_COLORS};
pub use buffer::TextBuffer;
pub use clock::{Clock, ManualClock, SystemClock};
pub use cursors::{contrast_color, CursorOverlay, CursorRenderer, OverlayStyle, RemoteCursor};
pub use delta::{apply_editor_delta, apply_shared_delta, TextDelta};
pub use editor::{EditAction, EditorDelta, LocalEditor, Position, Range, Selection, TextLayout};
pub use error::{CollabError, Result};
pub use expiry::{check_outdated, ExpiryMonitor};
pub use mutex::ReentrancyGuard;
pub use observer::ListenerId;
pub use protocol::AwarenessUpdate;
pub use shared::{SharedDoc, SharedText};
