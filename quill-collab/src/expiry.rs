//! Timeout-based garbage collection of presence entries.
//!
//! Each tick does two things:
//! 1. re-issues the local record once it is half a timeout old, so the
//!    local client never looks stale to its peers (or to itself);
//! 2. evicts every remote client silent for a full timeout, through the
//!    same removal path as an explicit offline broadcast, tagged
//!    [`Origin::Timeout`].
//!
//! Eviction is a local inference; no replica needs to agree with another.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::awareness::{Awareness, ClientId, Origin};

/// Run one sweep against `awareness`. Returns the evicted clients.
pub fn check_outdated(awareness: &mut Awareness) -> Vec<ClientId> {
    let now = awareness.now();
    let config = *awareness.config();
    let local = awareness.client_id();

    let local_stale = awareness
        .meta(local)
        .is_some_and(|m| now.saturating_duration_since(m.last_updated) >= config.refresh_after());
    if local_stale {
        if let Some(state) = awareness.local_state().cloned() {
            log::trace!("refreshing local presence for client {local}");
            awareness.set_local_state(Some(state));
        }
    }

    let outdated: Vec<ClientId> = awareness
        .meta_entries()
        .filter(|(id, meta)| {
            **id != local
                && awareness.states().contains_key(*id)
                && now.saturating_duration_since(meta.last_updated) >= config.outdated_timeout
        })
        .map(|(id, _)| *id)
        .collect();

    if outdated.is_empty() {
        return outdated;
    }
    log::info!("evicting {} outdated peer(s): {outdated:?}", outdated.len());
    awareness.remove_states(&outdated, Origin::Timeout)
}

/// Recurring sweep driver.
///
/// Holds only a weak handle, so the task ends once the store is dropped;
/// it also ends when the store is destroyed.
pub struct ExpiryMonitor;

impl ExpiryMonitor {
    /// Spawn the sweep on the current `LocalSet`, ticking every
    /// `outdated_timeout / 10`.
    ///
    /// Must be called from inside `tokio::task::LocalSet`; the store is
    /// `!Send`. A tick that finds the store already borrowed is skipped.
    pub fn spawn_local(awareness: &Rc<RefCell<Awareness>>) -> JoinHandle<()> {
        let period = awareness.borrow().config().check_interval();
        let store: Weak<RefCell<Awareness>> = Rc::downgrade(awareness);

        tokio::task::spawn_local(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let Ok(mut awareness) = store.try_borrow_mut() else {
                    log::debug!("presence store busy, skipping expiry tick");
                    continue;
                };
                if awareness.is_destroyed() {
                    break;
                }
                check_outdated(&mut awareness);
            }
            log::debug!("expiry monitor stopped");
        })
    }
}
