//! Remote collection cache and loader.
//!
//! A [`Collection`] is the client-held, transient copy of one server-side
//! list resource: an ordered sequence in server response order, replaced
//! wholesale on each successful load and patched in place after mutations.
//!
//! Concurrent loads (a manual refresh racing a poll tick racing a
//! post-mutation reload) are resolved with a monotonic sequence guard: every
//! load takes a ticket at dispatch time, and only the newest dispatched load
//! may install its result. A stale response is dropped instead of silently
//! overwriting newer state.
//!
//! Two further contracts hold unconditionally:
//! - items are cleared on success, never on load start, so a refresh keeps
//!   showing the previous data while in flight;
//! - a failed load leaves the items exactly as they were.
//!
//! A [`CollectionSync`] given a [`Notifier`] reports each failed load as one
//! error [`Notice`]; an expired session is returned to the caller untoasted.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::client::{fetch_list, ApiTransport};
use crate::errors::ApiError;
use crate::notify::{Notice, Notifier};
use crate::telemetry::sanitize_for_log;

/// A record synchronized from the server, identified by a string id.
pub trait Entity: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
}

/// Proof that a load was dispatched; consumed when the result settles.
#[derive(Debug)]
#[must_use = "a dispatched load must be completed or the loading flag never clears"]
pub struct LoadTicket {
    seq: u64,
}

#[derive(Debug)]
pub struct Collection<T> {
    items: Vec<T>,
    loading: bool,
    /// Sequence number of the newest dispatched load.
    dispatched: u64,
    /// Sequence number of the newest successfully applied load.
    applied: u64,
}

impl<T: Entity> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> Collection<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            dispatched: 0,
            applied: 0,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether any load has ever been applied. Distinguishes "empty because
    /// the server said so" from "not loaded yet".
    pub fn has_loaded(&self) -> bool {
        self.applied > 0
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Mark a load as dispatched. The previous items stay visible until the
    /// result arrives.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.dispatched += 1;
        self.loading = true;
        LoadTicket {
            seq: self.dispatched,
        }
    }

    /// Settle a load. Returns `true` if the items were installed.
    ///
    /// A ticket older than the newest dispatched load is stale and is
    /// dropped whatever its result; the loading flag clears only when the
    /// newest load settles.
    pub fn complete_load(&mut self, ticket: LoadTicket, result: Result<Vec<T>, ApiError>) -> bool {
        self.complete_load_with(ticket, result, |_| {})
    }

    /// Like [`Self::complete_load`], applying a derived-field enrichment to
    /// each entity exactly once, at install time rather than per read.
    pub fn complete_load_with(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<T>, ApiError>,
        mut enrich: impl FnMut(&mut T),
    ) -> bool {
        let newest = ticket.seq == self.dispatched;
        if newest {
            self.loading = false;
        }

        match result {
            Ok(mut items) => {
                if !newest {
                    debug!(
                        stale_seq = ticket.seq,
                        newest_seq = self.dispatched,
                        "dropping stale load response"
                    );
                    return false;
                }
                for item in &mut items {
                    enrich(item);
                }
                self.items = items;
                self.applied = ticket.seq;
                true
            }
            Err(e) => {
                // Non-destructive on error: previous items stay.
                warn!(
                    seq = ticket.seq,
                    error = %sanitize_for_log(&e.to_string()),
                    "load failed, keeping cached items"
                );
                false
            }
        }
    }

    /// Insert or replace an entity in place, preserving its position when it
    /// already exists and appending otherwise.
    pub fn upsert(&mut self, entity: T) {
        match self.items.iter_mut().find(|item| item.id() == entity.id()) {
            Some(slot) => *slot = entity,
            None => self.items.push(entity),
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id() != id);
        self.items.len() < before
    }

    /// Remove every entity whose id is in `ids`. Returns how many were
    /// removed.
    pub fn remove_many(&mut self, ids: &BTreeSet<String>) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !ids.contains(item.id()));
        before - self.items.len()
    }
}

type EnrichFn<T> = Box<dyn Fn(&mut T) + Send + Sync>;

/// Ties a [`Collection`] to its resource path on a shared transport.
///
/// Each page owns its own `CollectionSync`; there is no cross-page store.
pub struct CollectionSync<T> {
    transport: Arc<dyn ApiTransport>,
    state: RwLock<Collection<T>>,
    path: String,
    payload_keys: Vec<String>,
    enrich: Option<EnrichFn<T>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl<T: Entity + DeserializeOwned> CollectionSync<T> {
    pub fn new(transport: Arc<dyn ApiTransport>, path: impl Into<String>) -> Self {
        Self {
            transport,
            state: RwLock::new(Collection::new()),
            path: path.into(),
            payload_keys: Vec::new(),
            enrich: None,
            notifier: None,
        }
    }

    /// Accept bespoke payload keys (`roles`, `cases`, ...) in addition to
    /// the standard `data` envelope.
    pub fn with_payload_keys(mut self, keys: &[&str]) -> Self {
        self.payload_keys = keys.iter().map(|k| (*k).to_string()).collect();
        self
    }

    /// Set the per-entity derivation applied once per load (countdowns,
    /// workload levels and the like).
    pub fn with_enrich(mut self, enrich: impl Fn(&mut T) + Send + Sync + 'static) -> Self {
        self.enrich = Some(Box::new(enrich));
        self
    }

    /// Report load failures through the shared notifier. Without one, the
    /// caller owns reporting the returned error.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn transport(&self) -> &Arc<dyn ApiTransport> {
        &self.transport
    }

    /// Fetch the collection and install it under the sequence guard.
    ///
    /// Returns `Ok(true)` when the response was installed, `Ok(false)` when
    /// it was superseded by a newer load, and the error otherwise (items
    /// untouched). A failure other than an expired session produces one
    /// error notice when a notifier is attached.
    pub async fn load(&self) -> Result<bool, ApiError> {
        let ticket = self.state.write().begin_load();

        let keys: Vec<&str> = self.payload_keys.iter().map(String::as_str).collect();
        let result = fetch_list::<T>(self.transport.as_ref(), &self.path, &keys).await;
        let failed = result.as_ref().err().cloned();

        let applied = {
            let mut state = self.state.write();
            match &self.enrich {
                Some(enrich) => state.complete_load_with(ticket, result, |item| enrich(item)),
                None => state.complete_load(ticket, result),
            }
        };

        match failed {
            Some(e) => {
                if e != ApiError::AuthExpired {
                    if let Some(notifier) = &self.notifier {
                        notifier.notify(Notice::error(e.user_message()));
                    }
                }
                Err(e)
            }
            None => Ok(applied),
        }
    }

    /// A point-in-time copy of the cached items.
    pub fn snapshot(&self) -> Vec<T> {
        self.state.read().items().to_vec()
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().is_loading()
    }

    pub fn has_loaded(&self) -> bool {
        self.state.read().has_loaded()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.state.read().get(id).cloned()
    }

    pub fn upsert(&self, entity: T) {
        self.state.write().upsert(entity);
    }

    pub fn remove(&self, id: &str) -> bool {
        self.state.write().remove(id)
    }

    pub fn remove_many(&self, ids: &BTreeSet<String>) -> usize {
        self.state.write().remove_many(ids)
    }
}
