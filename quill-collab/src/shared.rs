//! Shared document seam and its yrs implementation.
//!
//! The binding only needs an ordered text it can insert into, delete from
//! and observe. [`SharedDoc`] provides that on top of a `yrs::Doc` holding
//! one text root, plus the state-vector/update exchange a transport needs
//! to keep replicas converged.
//!
//! ```text
//! replica A                           replica B
//! SharedDoc::insert ──► yrs txn       SharedDoc::apply_update(diff)
//!                        │                      │
//!       encode_diff(sv_B) ──── bytes ────►      ▼
//!                                     observe handlers ◄─ [Retain, Insert, Delete]
//! ```
//!
//! The document is created with byte offsets, so every index exchanged with
//! it is a UTF-8 byte offset, the same unit [`crate::editor`] columns use.

use std::cell::{Cell, RefCell};
use std::fmt;

use yrs::types::text::TextEvent;
use yrs::types::Delta;
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{
    Any, Doc, GetString, Observable, OffsetKind, Options, Out, ReadTxn, StateVector, Subscription, Text,
    TextRef, Transact, TransactionMut, Update,
};

use crate::awareness::ClientId;
use crate::delta::TextDelta;
use crate::error::{CollabError, Result};
use crate::observer::{ListenerId, Observers};

/// Name of the text root when none is given.
pub const DEFAULT_TEXT_NAME: &str = "content";

pub type DeltaHandler = dyn Fn(&[TextDelta]);
pub type DocDestroyHandler = dyn Fn();

/// Ordered text replicated between sessions.
///
/// Indices are byte offsets. Handlers passed to [`SharedText::observe`] run
/// synchronously for every committed change, local or remote, and must not
/// read the document back.
pub trait SharedText {
    /// Keeps the observation alive; dropping it unobserves.
    type Subscription;

    fn client_id(&self) -> ClientId;

    fn text(&self) -> String;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, index: usize, text: &str);

    fn delete(&self, index: usize, len: usize);

    fn observe(&self, handler: Box<DeltaHandler>) -> Self::Subscription;

    /// Called once when the document is torn down.
    fn on_destroy(&self, handler: Box<DocDestroyHandler>) -> ListenerId;

    fn off_destroy(&self, id: ListenerId) -> bool;
}

/// A `yrs::Doc` with one text root.
pub struct SharedDoc {
    client_id: ClientId,
    doc: Doc,
    text: TextRef,
    destroy_listeners: RefCell<Observers<DocDestroyHandler>>,
    destroyed: Cell<bool>,
}

impl SharedDoc {
    pub fn new(client_id: ClientId) -> Self {
        Self::with_name(client_id, DEFAULT_TEXT_NAME)
    }

    /// Replicas exchanging updates must use the same `name`.
    pub fn with_name(client_id: ClientId, name: &str) -> Self {
        let doc = Doc::with_options(Options {
            offset_kind: OffsetKind::Bytes,
            ..Options::with_client_id(client_id)
        });
        let text = doc.get_or_insert_text(name);
        Self {
            client_id,
            doc,
            text,
            destroy_listeners: RefCell::new(Observers::new()),
            destroyed: Cell::new(false),
        }
    }

    pub fn doc(&self) -> &Doc {
        &self.doc
    }

    /// Encoded state vector (v1), sent to a peer so it can compute a diff.
    pub fn state_vector(&self) -> Vec<u8> {
        self.doc.transact().state_vector().encode_v1()
    }

    /// Whole document as one update (v1).
    pub fn encode_state_as_update(&self) -> Vec<u8> {
        self.doc
            .transact()
            .encode_state_as_update_v1(&StateVector::default())
    }

    /// Everything this replica has that the peer behind `state_vector` lacks.
    pub fn encode_diff(&self, state_vector: &[u8]) -> Result<Vec<u8>> {
        let sv = StateVector::decode_v1(state_vector)?;
        Ok(self.doc.transact().encode_diff_v1(&sv))
    }

    /// Integrate a remote update. Observers see the resulting delta.
    pub fn apply_update(&self, update: &[u8]) -> Result<()> {
        let update = Update::decode_v1(update)?;
        let mut txn = self.doc.transact_mut();
        txn.apply_update(update)
            .map_err(|e| CollabError::Update(e.to_string()))
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Notify destroy listeners once and drop them.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        let listeners = self.destroy_listeners.borrow().snapshot();
        for listener in listeners {
            listener();
        }
        self.destroy_listeners.borrow_mut().clear();
        log::debug!("shared document for client {} destroyed", self.client_id);
    }
}

/// Convert one yrs text event into byte-offset runs.
fn text_delta(txn: &TransactionMut, event: &TextEvent) -> Vec<TextDelta> {
    event
        .delta(txn)
        .iter()
        .filter_map(|op| match op {
            Delta::Retain(n, _) => Some(TextDelta::Retain(*n as usize)),
            Delta::Deleted(n) => Some(TextDelta::Delete(*n as usize)),
            Delta::Inserted(Out::Any(Any::String(s)), _) => Some(TextDelta::Insert(s.to_string())),
            Delta::Inserted(other, _) => {
                log::warn!("ignoring non-text insert in shared text: {other:?}");
                None
            }
        })
        .collect()
}

impl SharedText for SharedDoc {
    type Subscription = Subscription;

    fn client_id(&self) -> ClientId {
        self.client_id
    }

    fn text(&self) -> String {
        self.text.get_string(&self.doc.transact())
    }

    fn len(&self) -> usize {
        self.text.len(&self.doc.transact()) as usize
    }

    /// # Panics
    ///
    /// If `index` is past the end of the text.
    fn insert(&self, index: usize, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut txn = self.doc.transact_mut();
        let len = self.text.len(&txn) as usize;
        assert!(index <= len, "shared insert at {index} past end ({len})");
        self.text.insert(&mut txn, index as u32, text);
    }

    /// # Panics
    ///
    /// If `index + len` is past the end of the text.
    fn delete(&self, index: usize, len: usize) {
        if len == 0 {
            return;
        }
        let mut txn = self.doc.transact_mut();
        let total = self.text.len(&txn) as usize;
        assert!(index + len <= total, "shared delete {index}..{} past end ({total})", index + len);
        self.text.remove_range(&mut txn, index as u32, len as u32);
    }

    fn observe(&self, handler: Box<DeltaHandler>) -> Subscription {
        self.text.observe(move |txn, event| {
            let delta = text_delta(txn, event);
            if !delta.is_empty() {
                handler(&delta);
            }
        })
    }

    fn on_destroy(&self, handler: Box<DocDestroyHandler>) -> ListenerId {
        self.destroy_listeners.borrow_mut().subscribe(handler)
    }

    fn off_destroy(&self, id: ListenerId) -> bool {
        self.destroy_listeners.borrow_mut().unsubscribe(id)
    }
}

impl fmt::Debug for SharedDoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDoc")
            .field("client_id", &self.client_id)
            .field("destroyed", &self.destroyed.get())
            .finish_non_exhaustive()
    }
}
