//! Presence ("awareness") store for collaborative text sessions.
//!
//! Tracks which participants are online and their ephemeral state: display
//! name, color and text cursor. Every entry carries a per-client clock;
//! remote batches only win when their clock is newer, so replicas converge
//! without synchronized wall clocks.
//!
//! ## Data flow
//!
//! ```text
//! Local selection change
//!       │
//!       ▼
//! Awareness::set_local_state_field(Cursor)   ── clock + 1
//!       │
//!       ├──► on_update listeners (every write, heartbeats included)
//!       └──► on_change listeners (only visible differences)
//!
//! Remote batch (transport)
//!       │
//!       ▼
//! Awareness::apply_remote_states()   ── drop if clock not newer
//!       │
//!       ▼
//! one batched update/change pair
//! ```
//!
//! Stale entries are evicted by [`crate::expiry`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::observer::{ListenerId, Observers};
use crate::shared::SharedText;

/// Replica identity; the same value the shared document uses as its client id.
pub type ClientId = u64;

/// Default window after which a silent peer is considered gone.
pub const DEFAULT_OUTDATED_TIMEOUT: Duration = Duration::from_secs(30);

// ───────────────────────────────────────────────────────────────────
// State schema
// ───────────────────────────────────────────────────────────────────

/// Participant identity shown next to remote cursors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    /// CSS-style color, `#rrggbb` or `rgb(r, g, b)`.
    pub color: String,
}

impl UserInfo {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }
}

/// Text cursor of one participant, in shared-document byte offsets.
///
/// `anchor <= head` always holds; `pos == head`; `sel` is `anchor != head`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorState {
    pub id: ClientId,
    pub name: String,
    pub color: String,
    pub anchor: usize,
    pub head: usize,
    pub pos: usize,
    pub sel: bool,
}

impl CursorState {
    /// Build a cursor from the live anchor/lead offsets of one selection read.
    /// The live anchor may sit after the lead; the pair is ordered here.
    pub fn from_offsets(id: ClientId, user: &UserInfo, anchor: usize, lead: usize) -> Self {
        let (start, end) = if anchor <= lead {
            (anchor, lead)
        } else {
            (lead, anchor)
        };
        Self {
            id,
            name: user.name.clone(),
            color: user.color.clone(),
            anchor: start,
            head: end,
            pos: end,
            sel: start != end,
        }
    }

    /// Same caret and selection span, ignoring identity fields.
    pub fn same_span(&self, other: &CursorState) -> bool {
        self.anchor == other.anchor && self.head == other.head
    }
}

/// One participant's presence record. An empty record means "online, nothing set yet".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceState {
    pub user: Option<UserInfo>,
    pub cursor: Option<CursorState>,
}

/// Single-field write for [`Awareness::set_local_state_field`].
#[derive(Debug, Clone, PartialEq)]
pub enum StateField {
    User(Option<UserInfo>),
    Cursor(Option<CursorState>),
}

/// Freshness bookkeeping for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientMeta {
    /// Strictly increases on every accepted write for this client.
    pub clock: u64,
    /// Local time of the last accepted write. Only used for expiry.
    pub last_updated: Instant,
}

/// One entry of a remote presence batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwarenessEntry {
    pub client_id: ClientId,
    pub clock: u64,
    /// `None` announces that the client went offline.
    pub state: Option<PresenceState>,
}

// ───────────────────────────────────────────────────────────────────
// Events
// ───────────────────────────────────────────────────────────────────

/// Which clients a write touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwarenessChange {
    pub added: Vec<ClientId>,
    pub updated: Vec<ClientId>,
    pub removed: Vec<ClientId>,
}

impl AwarenessChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// All clients in the event, in added/updated/removed order.
    pub fn all(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.added
            .iter()
            .chain(self.updated.iter())
            .chain(self.removed.iter())
            .copied()
    }
}

/// Where a presence write came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
    /// Eviction by the expiry sweep.
    Timeout,
}

pub type ChangeListener = dyn Fn(&AwarenessChange, Origin, &Awareness);
pub type DestroyListener = dyn Fn(&Awareness);

/// Store configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwarenessConfig {
    pub outdated_timeout: Duration,
}

impl AwarenessConfig {
    /// Sweep period of the expiry monitor.
    pub fn check_interval(&self) -> Duration {
        self.outdated_timeout / 10
    }

    /// Age after which the local client re-issues its own state.
    pub fn refresh_after(&self) -> Duration {
        self.outdated_timeout / 2
    }
}

impl Default for AwarenessConfig {
    fn default() -> Self {
        Self {
            outdated_timeout: DEFAULT_OUTDATED_TIMEOUT,
        }
    }
}

// ───────────────────────────────────────────────────────────────────
// Store
// ───────────────────────────────────────────────────────────────────

/// Presence table for one collaborative session.
///
/// Owned by the session; hand out `Rc<RefCell<Awareness>>` to the binding
/// and the expiry monitor. Listeners receive `&Awareness` so they can read
/// other clients' states while an event is being delivered.
pub struct Awareness {
    client_id: ClientId,
    states: HashMap<ClientId, PresenceState>,
    meta: HashMap<ClientId, ClientMeta>,
    config: AwarenessConfig,
    clock: Rc<dyn Clock>,
    change_listeners: Observers<ChangeListener>,
    update_listeners: Observers<ChangeListener>,
    destroy_listeners: Observers<DestroyListener>,
    stale_dropped: u64,
    destroyed: bool,
}

impl Awareness {
    /// Create a store with the default 30 s timeout and the system clock.
    pub fn new(client_id: ClientId) -> Self {
        Self::with_config(client_id, AwarenessConfig::default(), Rc::new(SystemClock))
    }

    /// The local client starts online with an empty record.
    pub fn with_config(client_id: ClientId, config: AwarenessConfig, clock: Rc<dyn Clock>) -> Self {
        let mut awareness = Self {
            client_id,
            states: HashMap::new(),
            meta: HashMap::new(),
            config,
            clock,
            change_listeners: Observers::new(),
            update_listeners: Observers::new(),
            destroy_listeners: Observers::new(),
            stale_dropped: 0,
            destroyed: false,
        };
        awareness.set_local_state(Some(PresenceState::default()));
        awareness
    }

    /// Tie the store's lifetime to `doc`: tearing the document down takes
    /// the local client offline and destroys the store.
    ///
    /// The hook holds only a weak handle. Unregister it with
    /// `doc.off_destroy(id)`.
    pub fn follow_document<S: SharedText + ?Sized>(store: &Rc<RefCell<Self>>, doc: &S) -> ListenerId {
        let store = Rc::downgrade(store);
        doc.on_destroy(Box::new(move || {
            let Some(store) = store.upgrade() else {
                return;
            };
            match store.try_borrow_mut() {
                Ok(mut awareness) => awareness.destroy(),
                Err(_) => log::warn!("presence store busy during document teardown; still online"),
            };
        }))
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn config(&self) -> &AwarenessConfig {
        &self.config
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Local record, or `None` while offline.
    pub fn local_state(&self) -> Option<&PresenceState> {
        self.states.get(&self.client_id)
    }

    /// Read-only view of every online client's record.
    pub fn states(&self) -> &HashMap<ClientId, PresenceState> {
        &self.states
    }

    pub fn state(&self, client_id: ClientId) -> Option<&PresenceState> {
        self.states.get(&client_id)
    }

    /// Online clients, ascending.
    pub fn client_ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.states.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Clock metadata; kept after a client goes offline.
    pub fn meta(&self, client_id: ClientId) -> Option<&ClientMeta> {
        self.meta.get(&client_id)
    }

    pub(crate) fn meta_entries(&self) -> impl Iterator<Item = (&ClientId, &ClientMeta)> {
        self.meta.iter()
    }

    /// Number of remote entries dropped because their clock was not newer.
    pub fn stale_dropped(&self) -> u64 {
        self.stale_dropped
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Replace (or with `None`, delete) the local record.
    ///
    /// Always bumps the local clock and emits `update`; emits `change` only
    /// when the record visibly differs.
    pub fn set_local_state(&mut self, state: Option<PresenceState>) {
        let client_id = self.client_id;
        let clock = self.meta.get(&client_id).map_or(0, |m| m.clock + 1);
        let prev = match &state {
            Some(s) => self.states.insert(client_id, s.clone()),
            None => self.states.remove(&client_id),
        };
        self.meta.insert(
            client_id,
            ClientMeta {
                clock,
                last_updated: self.clock.now(),
            },
        );

        let mut update = AwarenessChange::default();
        let mut change = AwarenessChange::default();
        match (&prev, &state) {
            (None, Some(_)) => {
                update.added.push(client_id);
                change.added.push(client_id);
            }
            (Some(_), None) => {
                update.removed.push(client_id);
                change.removed.push(client_id);
            }
            (Some(old), Some(new)) => {
                update.updated.push(client_id);
                if old != new {
                    change.updated.push(client_id);
                }
            }
            (None, None) => {}
        }

        log::trace!("local presence clock={clock} change={change:?}");
        self.emit(&change, &update, Origin::Local, true);
    }

    /// Merge one field into the local record. No-op while offline.
    pub fn set_local_state_field(&mut self, field: StateField) {
        let Some(current) = self.local_state() else {
            log::debug!("set_local_state_field ignored: client {} is offline", self.client_id);
            return;
        };
        let mut next = current.clone();
        match field {
            StateField::User(user) => next.user = user,
            StateField::Cursor(cursor) => next.cursor = cursor,
        }
        self.set_local_state(Some(next));
    }

    /// Apply a batch of remote entries.
    ///
    /// An entry is accepted when its client is unknown or its clock is newer
    /// than the stored one; an equal clock is accepted only to take an online
    /// client offline. Everything else is dropped silently. Accepted entries
    /// are reported in one batched `update`/`change` pair; the `update`
    /// partition is returned.
    pub fn apply_remote_states(
        &mut self,
        entries: impl IntoIterator<Item = AwarenessEntry>,
        origin: Origin,
    ) -> AwarenessChange {
        let now = self.clock.now();
        let mut update = AwarenessChange::default();
        let mut change = AwarenessChange::default();

        for AwarenessEntry {
            client_id,
            mut clock,
            state,
        } in entries
        {
            if let Some(current) = self.meta.get(&client_id).map(|m| m.clock) {
                let newer = clock > current;
                let equal_offline =
                    clock == current && state.is_none() && self.states.contains_key(&client_id);
                if !newer && !equal_offline {
                    log::trace!("stale presence for {client_id}: clock {clock} <= {current}");
                    self.stale_dropped += 1;
                    continue;
                }
            }

            let prev = match state {
                Some(s) => self.states.insert(client_id, s),
                None if client_id == self.client_id && self.states.contains_key(&client_id) => {
                    // A peer reported us offline while we are still here.
                    // Keep the record and outbid the report.
                    clock += 1;
                    self.states.get(&client_id).cloned()
                }
                None => self.states.remove(&client_id),
            };
            self.meta.insert(
                client_id,
                ClientMeta {
                    clock,
                    last_updated: now,
                },
            );

            match (prev.as_ref(), self.states.get(&client_id)) {
                (None, Some(_)) => {
                    update.added.push(client_id);
                    change.added.push(client_id);
                }
                (Some(_), None) => {
                    update.removed.push(client_id);
                    change.removed.push(client_id);
                }
                (Some(old), Some(new)) => {
                    update.updated.push(client_id);
                    if old != new {
                        change.updated.push(client_id);
                    }
                }
                (None, None) => {}
            }
        }

        self.emit(&change, &update, origin, false);
        update
    }

    /// Remove clients' records as if they had broadcast `None`.
    ///
    /// Each removed client's clock is bumped so that a delayed message
    /// carrying the old clock cannot bring the record back.
    pub fn remove_states(&mut self, clients: &[ClientId], origin: Origin) -> Vec<ClientId> {
        let now = self.clock.now();
        let mut removed = Vec::new();
        for &client_id in clients {
            if self.states.remove(&client_id).is_none() {
                continue;
            }
            let clock = self.meta.get(&client_id).map_or(0, |m| m.clock + 1);
            self.meta.insert(
                client_id,
                ClientMeta {
                    clock,
                    last_updated: now,
                },
            );
            removed.push(client_id);
        }

        if !removed.is_empty() {
            log::debug!("removed presence {removed:?} ({origin:?})");
            let change = AwarenessChange {
                removed: removed.clone(),
                ..AwarenessChange::default()
            };
            self.emit(&change, &change, origin, false);
        }
        removed
    }

    /// Go offline, notify destroy listeners, then drop every listener.
    /// Calling it again is a no-op.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        for listener in self.destroy_listeners.snapshot() {
            listener(self);
        }
        self.set_local_state(None);
        self.change_listeners.clear();
        self.update_listeners.clear();
        self.destroy_listeners.clear();
        self.destroyed = true;
        log::debug!("awareness for client {} destroyed", self.client_id);
    }

    // ── Subscriptions ────────────────────────────────────────────

    /// Visible changes only: added, removed, or updated with a different record.
    pub fn on_change(&mut self, listener: Box<ChangeListener>) -> ListenerId {
        self.change_listeners.subscribe(listener)
    }

    pub fn off_change(&mut self, id: ListenerId) -> bool {
        self.change_listeners.unsubscribe(id)
    }

    /// Every accepted write, including clock-only refreshes.
    pub fn on_update(&mut self, listener: Box<ChangeListener>) -> ListenerId {
        self.update_listeners.subscribe(listener)
    }

    pub fn off_update(&mut self, id: ListenerId) -> bool {
        self.update_listeners.unsubscribe(id)
    }

    pub fn on_destroy(&mut self, listener: Box<DestroyListener>) -> ListenerId {
        self.destroy_listeners.subscribe(listener)
    }

    pub fn off_destroy(&mut self, id: ListenerId) -> bool {
        self.destroy_listeners.unsubscribe(id)
    }

    fn emit(&self, change: &AwarenessChange, update: &AwarenessChange, origin: Origin, always_update: bool) {
        if !change.is_empty() {
            for listener in self.change_listeners.snapshot() {
                listener(change, origin, self);
            }
        }
        if always_update || !update.is_empty() {
            for listener in self.update_listeners.snapshot() {
                listener(update, origin, self);
            }
        }
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::shared::SharedDoc;

    fn user(name: &str) -> UserInfo {
        UserInfo::new(name, "#4caf50")
    }

    fn online(name: &str) -> Option<PresenceState> {
        Some(PresenceState {
            user: Some(user(name)),
            cursor: None,
        })
    }

    fn entry(client_id: ClientId, clock: u64, state: Option<PresenceState>) -> AwarenessEntry {
        AwarenessEntry {
            client_id,
            clock,
            state,
        }
    }

    type Log = Rc<RefCell<Vec<(AwarenessChange, Origin)>>>;

    fn record_changes(awareness: &mut Awareness) -> Log {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        awareness.on_change(Box::new(move |change, origin, _| {
            sink.borrow_mut().push((change.clone(), origin));
        }));
        log
    }

    fn record_updates(awareness: &mut Awareness) -> Log {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        awareness.on_update(Box::new(move |change, origin, _| {
            sink.borrow_mut().push((change.clone(), origin));
        }));
        log
    }

    // ── Local writes ─────────────────────────────────────────────

    #[test]
    fn test_starts_online_with_empty_record() {
        let awareness = Awareness::new(1);
        assert_eq!(awareness.local_state(), Some(&PresenceState::default()));
        assert_eq!(awareness.meta(1).unwrap().clock, 0);
    }

    #[test]
    fn test_local_clock_strictly_increases() {
        let mut awareness = Awareness::new(1);
        let mut last = awareness.meta(1).unwrap().clock;
        for i in 0..10 {
            let state = if i % 3 == 0 { None } else { online("Alice") };
            awareness.set_local_state(state);
            let clock = awareness.meta(1).unwrap().clock;
            assert!(clock > last, "clock went from {last} to {clock}");
            last = clock;
        }
    }

    #[test]
    fn test_identical_write_is_update_but_not_change() {
        let mut awareness = Awareness::new(1);
        awareness.set_local_state(online("Alice"));
        let changes = record_changes(&mut awareness);
        let updates = record_updates(&mut awareness);

        awareness.set_local_state(online("Alice"));

        assert!(changes.borrow().is_empty());
        assert_eq!(updates.borrow().len(), 1);
        assert_eq!(updates.borrow()[0].0.updated, vec![1]);
        assert_eq!(updates.borrow()[0].1, Origin::Local);
    }

    #[test]
    fn test_different_write_is_change() {
        let mut awareness = Awareness::new(1);
        let changes = record_changes(&mut awareness);

        awareness.set_local_state(online("Alice"));
        assert_eq!(changes.borrow().len(), 1);
        assert_eq!(changes.borrow()[0].0.updated, vec![1]);
    }

    #[test]
    fn test_going_offline_reports_removed() {
        let mut awareness = Awareness::new(1);
        let changes = record_changes(&mut awareness);

        awareness.set_local_state(None);
        assert!(awareness.local_state().is_none());
        assert!(!awareness.states().contains_key(&1));
        assert_eq!(changes.borrow()[0].0.removed, vec![1]);

        awareness.set_local_state(online("Alice"));
        assert_eq!(changes.borrow()[1].0.added, vec![1]);
    }

    #[test]
    fn test_set_field_merges() {
        let mut awareness = Awareness::new(1);
        awareness.set_local_state_field(StateField::User(Some(user("Alice"))));
        let cursor = CursorState::from_offsets(1, &user("Alice"), 2, 2);
        awareness.set_local_state_field(StateField::Cursor(Some(cursor.clone())));

        let state = awareness.local_state().unwrap();
        assert_eq!(state.user, Some(user("Alice")));
        assert_eq!(state.cursor, Some(cursor));
    }

    #[test]
    fn test_set_field_offline_is_noop() {
        let mut awareness = Awareness::new(1);
        awareness.set_local_state(None);
        let clock = awareness.meta(1).unwrap().clock;

        awareness.set_local_state_field(StateField::User(Some(user("Alice"))));
        assert!(awareness.local_state().is_none());
        assert_eq!(awareness.meta(1).unwrap().clock, clock);
    }

    // ── Cursor ordering ──────────────────────────────────────────

    #[test]
    fn test_cursor_orders_reversed_selection() {
        let cursor = CursorState::from_offsets(1, &user("Alice"), 10, 4);
        assert_eq!(cursor.anchor, 4);
        assert_eq!(cursor.head, 10);
        assert_eq!(cursor.pos, 10);
        assert!(cursor.sel);
    }

    #[test]
    fn test_cursor_collapsed() {
        let cursor = CursorState::from_offsets(1, &user("Alice"), 7, 7);
        assert_eq!((cursor.anchor, cursor.head, cursor.pos), (7, 7, 7));
        assert!(!cursor.sel);
    }

    // ── Remote batches ───────────────────────────────────────────

    #[test]
    fn test_remote_unknown_client_accepted() {
        let mut awareness = Awareness::new(1);
        let changes = record_changes(&mut awareness);

        let update = awareness.apply_remote_states(vec![entry(2, 0, online("Bob"))], Origin::Remote);
        assert_eq!(update.added, vec![2]);
        assert_eq!(awareness.state(2), online("Bob").as_ref());
        assert_eq!(awareness.client_ids(), vec![1, 2]);
        assert_eq!(changes.borrow()[0].1, Origin::Remote);
    }

    #[test]
    fn test_remote_stale_and_duplicate_dropped() {
        let mut awareness = Awareness::new(1);
        awareness.apply_remote_states(vec![entry(2, 5, online("Bob"))], Origin::Remote);
        let snapshot = awareness.states().clone();

        // Duplicate.
        let update = awareness.apply_remote_states(vec![entry(2, 5, online("Bob"))], Origin::Remote);
        assert!(update.is_empty());
        assert_eq!(awareness.states(), &snapshot);

        // Older.
        awareness.apply_remote_states(vec![entry(2, 3, online("Mallory"))], Origin::Remote);
        assert_eq!(awareness.states(), &snapshot);
        assert_eq!(awareness.meta(2).unwrap().clock, 5);
        assert_eq!(awareness.stale_dropped(), 2);
    }

    #[test]
    fn test_remote_clock_never_regresses() {
        let mut awareness = Awareness::new(1);
        for clock in [4, 2, 9, 9, 1, 12, 3] {
            let before = awareness.meta(2).map_or(0, |m| m.clock);
            awareness.apply_remote_states(vec![entry(2, clock, online("Bob"))], Origin::Remote);
            assert!(awareness.meta(2).unwrap().clock >= before);
        }
        assert_eq!(awareness.meta(2).unwrap().clock, 12);
    }

    #[test]
    fn test_remote_null_with_equal_clock_removes() {
        let mut awareness = Awareness::new(1);
        awareness.apply_remote_states(vec![entry(2, 3, online("Bob"))], Origin::Remote);

        let update = awareness.apply_remote_states(vec![entry(2, 3, None)], Origin::Remote);
        assert_eq!(update.removed, vec![2]);
        assert!(awareness.state(2).is_none());
    }

    #[test]
    fn test_remote_batch_emits_once() {
        let mut awareness = Awareness::new(1);
        awareness.apply_remote_states(vec![entry(3, 0, online("Carol"))], Origin::Remote);
        let changes = record_changes(&mut awareness);
        let updates = record_updates(&mut awareness);

        awareness.apply_remote_states(
            vec![
                entry(2, 0, online("Bob")),
                entry(3, 1, online("Carol")),
                entry(4, 0, None),
            ],
            Origin::Remote,
        );

        assert_eq!(updates.borrow().len(), 1);
        assert_eq!(updates.borrow()[0].0.added, vec![2]);
        assert_eq!(updates.borrow()[0].0.updated, vec![3]);
        // Carol's record did not change, so the change event only has Bob.
        assert_eq!(changes.borrow().len(), 1);
        assert_eq!(changes.borrow()[0].0.added, vec![2]);
        assert!(changes.borrow()[0].0.updated.is_empty());
    }

    #[test]
    fn test_remote_offline_report_for_local_client_is_outbid() {
        let mut awareness = Awareness::new(1);
        awareness.set_local_state(online("Alice"));
        let clock = awareness.meta(1).unwrap().clock;

        awareness.apply_remote_states(vec![entry(1, clock + 1, None)], Origin::Remote);
        assert_eq!(awareness.local_state(), online("Alice").as_ref());
        assert_eq!(awareness.meta(1).unwrap().clock, clock + 2);
    }

    // ── Removal and teardown ─────────────────────────────────────

    #[test]
    fn test_remove_states_bumps_clock() {
        let mut awareness = Awareness::new(1);
        awareness.apply_remote_states(vec![entry(2, 7, online("Bob"))], Origin::Remote);
        let changes = record_changes(&mut awareness);

        let removed = awareness.remove_states(&[2, 99], Origin::Timeout);
        assert_eq!(removed, vec![2]);
        assert_eq!(awareness.meta(2).unwrap().clock, 8);
        assert_eq!(changes.borrow()[0], (AwarenessChange { removed: vec![2], ..Default::default() }, Origin::Timeout));

        // The same message replayed cannot resurrect the client.
        awareness.apply_remote_states(vec![entry(2, 8, online("Bob"))], Origin::Remote);
        assert!(awareness.state(2).is_none());
    }

    #[test]
    fn test_destroy_goes_offline_and_clears_listeners() {
        let clock = Rc::new(ManualClock::new());
        let mut awareness = Awareness::with_config(1, AwarenessConfig::default(), clock);
        let changes = record_changes(&mut awareness);
        let destroyed = Rc::new(RefCell::new(0));
        let counter = destroyed.clone();
        awareness.on_destroy(Box::new(move |_| *counter.borrow_mut() += 1));

        awareness.destroy();
        assert!(awareness.is_destroyed());
        assert!(awareness.local_state().is_none());
        assert_eq!(changes.borrow().last().unwrap().0.removed, vec![1]);
        assert_eq!(*destroyed.borrow(), 1);

        // Listeners are gone and a second destroy does nothing.
        awareness.set_local_state(online("Alice"));
        awareness.destroy();
        assert_eq!(changes.borrow().len(), 1);
        assert_eq!(*destroyed.borrow(), 1);
    }

    #[test]
    fn test_document_teardown_takes_store_offline() {
        let doc = SharedDoc::new(1);
        let store = Rc::new(RefCell::new(Awareness::new(1)));
        Awareness::follow_document(&store, &doc);
        assert!(store.borrow().local_state().is_some());

        doc.destroy();
        assert!(store.borrow().is_destroyed());
        assert!(store.borrow().local_state().is_none());
    }

    #[test]
    fn test_document_teardown_after_store_dropped() {
        let doc = SharedDoc::new(1);
        let store = Rc::new(RefCell::new(Awareness::new(1)));
        let id = Awareness::follow_document(&store, &doc);
        drop(store);

        doc.destroy();
        assert!(!doc.off_destroy(id), "listeners are dropped on teardown");
    }

    #[test]
    fn test_off_change_unsubscribes() {
        let mut awareness = Awareness::new(1);
        let hits = Rc::new(RefCell::new(0));
        let counter = hits.clone();
        let id = awareness.on_change(Box::new(move |_, _, _| *counter.borrow_mut() += 1));

        awareness.set_local_state(online("Alice"));
        assert!(awareness.off_change(id));
        awareness.set_local_state(online("Bob"));
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_listener_reads_store_during_delivery() {
        let mut awareness = Awareness::new(1);
        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        awareness.on_change(Box::new(move |change, _, store| {
            if let Some(&id) = change.added.first() {
                *sink.borrow_mut() = store.state(id).and_then(|s| s.user.clone());
            }
        }));

        awareness.apply_remote_states(vec![entry(2, 0, online("Bob"))], Origin::Remote);
        assert_eq!(*seen.borrow(), Some(user("Bob")));
    }
}
