//! Mutation dispatch: create/update/delete/bulk-delete against a collection.
//!
//! Each mutation runs the `Idle → Submitting → Succeeded | Failed` state
//! machine. While one is submitting, further mutations on the same
//! dispatcher are rejected (the "disable the button" contract). Every
//! settled mutation reports exactly one [`Notice`] through the shared
//! [`Notifier`] — the one place user-visible reporting happens, instead of a
//! try/catch/toast block at every call site. The exception is an expired
//! session, which is returned to the caller untoasted so it can tear down
//! polling and navigate away.
//!
//! Failures leave the cache, the selection, and any caller-held form state
//! untouched so the user can correct and retry.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::cache::{CollectionSync, Entity};
use crate::client::Method;
use crate::config::Reconcile;
use crate::envelope;
use crate::errors::ApiError;
use crate::notify::{Notice, Notifier};
use crate::telemetry::sanitize_for_log;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationState {
    #[default]
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// Ids selected for a bulk operation. Ordered so request payloads and test
/// assertions are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: BTreeSet<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>) {
        self.ids.insert(id.into());
    }

    /// Add the id if absent, remove it if present (checkbox semantics).
    pub fn toggle(&mut self, id: &str) {
        if !self.ids.remove(id) {
            self.ids.insert(id.to_string());
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &BTreeSet<String> {
        &self.ids
    }
}

impl<S: Into<String>> FromIterator<S> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

pub struct Dispatcher<T> {
    sync: Arc<CollectionSync<T>>,
    notifier: Arc<dyn Notifier>,
    reconcile: Reconcile,
    state: Mutex<MutationState>,
}

impl<T: Entity + DeserializeOwned> Dispatcher<T> {
    pub fn new(
        sync: Arc<CollectionSync<T>>,
        notifier: Arc<dyn Notifier>,
        reconcile: Reconcile,
    ) -> Self {
        Self {
            sync,
            notifier,
            reconcile,
            state: Mutex::new(MutationState::Idle),
        }
    }

    pub fn state(&self) -> MutationState {
        *self.state.lock()
    }

    /// POST a new entity to the collection endpoint.
    pub async fn create(&self, body: Value) -> Result<(), ApiError> {
        let path = self.sync.path().to_string();
        self.submit_entity(Method::Post, path, body, "Created").await
    }

    /// PUT an update to `<collection>/<id>`.
    pub async fn update(&self, id: &str, body: Value) -> Result<(), ApiError> {
        let path = format!("{}/{}", self.sync.path(), id);
        self.submit_entity(Method::Put, path, body, "Updated").await
    }

    /// DELETE `<collection>/<id>` and drop the entity from the cache.
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.begin()?;
        let path = format!("{}/{}", self.sync.path(), id);
        let result = self
            .sync
            .transport()
            .request(Method::Delete, &path, None)
            .await
            .and_then(|(status, body)| envelope::decode_ack(status, body));

        match result {
            Ok(()) => {
                self.sync.remove(id);
                self.reload_if_configured().await;
                self.settle_ok("Deleted");
                Ok(())
            }
            Err(e) => self.settle_err(e),
        }
    }

    /// Delete every selected entity in one request.
    ///
    /// Atomic from this side: on success all selected ids leave the cache
    /// and the selection is cleared; on failure both are untouched. The
    /// endpoint is treated as all-or-nothing — a per-item partial-success
    /// server would need a different contract.
    pub async fn bulk_delete(&self, selection: &mut SelectionSet) -> Result<(), ApiError> {
        if selection.is_empty() {
            return Ok(());
        }
        self.begin()?;
        let path = format!("{}/bulk-delete", self.sync.path());
        let ids: Vec<&str> = selection.ids().iter().map(String::as_str).collect();
        let body = serde_json::json!({ "ids": ids });

        let result = self
            .sync
            .transport()
            .request(Method::Post, &path, Some(body))
            .await
            .and_then(|(status, body)| envelope::decode_ack(status, body));

        match result {
            Ok(()) => {
                let removed = self.sync.remove_many(selection.ids());
                let count = selection.len();
                selection.clear();
                self.reload_if_configured().await;
                info!(count, removed, "bulk delete applied");
                self.settle_ok(format!("Deleted {} items", count));
                Ok(())
            }
            Err(e) => self.settle_err(e),
        }
    }

    async fn submit_entity(
        &self,
        method: Method,
        path: String,
        body: Value,
        success_message: &str,
    ) -> Result<(), ApiError> {
        self.begin()?;
        let result = self
            .sync
            .transport()
            .request(method, &path, Some(body))
            .await;

        let reconciled = match result {
            Ok((status, response)) => match self.reconcile {
                // The default: the server may have applied side effects
                // beyond the returned entity, so re-fetch the collection.
                Reconcile::Reload => {
                    envelope::decode_ack(status, response).map(|()| None)
                }
                Reconcile::PatchLocal => {
                    envelope::decode_payload::<T>(status, response, &[]).map(Some)
                }
            },
            Err(e) => Err(e),
        };

        match reconciled {
            Ok(patch) => {
                if let Some(entity) = patch {
                    self.sync.upsert(entity);
                } else {
                    self.reload_if_configured().await;
                }
                self.settle_ok(success_message);
                Ok(())
            }
            Err(e) => self.settle_err(e),
        }
    }

    fn begin(&self) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        if *state == MutationState::Submitting {
            // The UI equivalent disabled the button; a second submit while
            // in flight is a caller bug, rejected rather than queued.
            return Err(ApiError::InFlight);
        }
        *state = MutationState::Submitting;
        Ok(())
    }

    fn settle_ok(&self, message: impl Into<String>) {
        *self.state.lock() = MutationState::Succeeded;
        self.notifier.notify(Notice::success(message));
    }

    fn settle_err(&self, e: ApiError) -> Result<(), ApiError> {
        *self.state.lock() = MutationState::Failed;
        if e != ApiError::AuthExpired {
            self.notifier.notify(Notice::error(e.user_message()));
        }
        Err(e)
    }

    async fn reload_if_configured(&self) {
        if self.reconcile == Reconcile::Reload {
            // A failed post-mutation reload keeps the previous snapshot;
            // the next poll tick or manual refresh recovers.
            if let Err(e) = self.sync.load().await {
                warn!(
                    error = %sanitize_for_log(&e.to_string()),
                    path = self.sync.path(),
                    "post-mutation reload failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::MockTransport;
    use crate::notify::testing::RecordingNotifier;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, Deserialize, PartialEq)]
    struct Specialization {
        id: String,
        name: String,
    }

    impl Entity for Specialization {
        fn id(&self) -> &str {
            &self.id
        }
    }

    struct Fixture {
        mock: Arc<MockTransport>,
        sync: Arc<CollectionSync<Specialization>>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Fixture {
        fn new() -> Self {
            let mock = Arc::new(MockTransport::new());
            let sync = Arc::new(CollectionSync::new(mock.clone(), "/admin/specializations"));
            Self {
                mock,
                sync,
                notifier: Arc::new(RecordingNotifier::new()),
            }
        }

        fn dispatcher(&self, reconcile: Reconcile) -> Dispatcher<Specialization> {
            Dispatcher::new(self.sync.clone(), self.notifier.clone(), reconcile)
        }

        async fn seed(&self, items: Value) {
            self.mock.push_ok(json!({"success": true, "data": items}));
            self.sync.load().await.unwrap();
        }
    }

    #[tokio::test]
    async fn create_with_patch_local_upserts_returned_entity() {
        let fx = Fixture::new();
        fx.seed(json!([{"id": "a", "name": "Civil"}])).await;
        let dispatcher = fx.dispatcher(Reconcile::PatchLocal);

        fx.mock
            .push_ok(json!({"success": true, "data": {"id": "b", "name": "Tax"}}));
        dispatcher.create(json!({"name": "Tax"})).await.unwrap();

        assert_eq!(fx.sync.len(), 2);
        assert_eq!(fx.sync.get("b").unwrap().name, "Tax");
        assert_eq!(dispatcher.state(), MutationState::Succeeded);
        assert_eq!(fx.notifier.notices(), vec![Notice::success("Created")]);
    }

    #[tokio::test]
    async fn create_with_reload_refetches_collection() {
        let fx = Fixture::new();
        fx.seed(json!([{"id": "a", "name": "Civil"}])).await;
        let dispatcher = fx.dispatcher(Reconcile::Reload);

        fx.mock.push_ok(json!({"success": true}));
        fx.mock.push_ok(json!({"success": true, "data": [
            {"id": "a", "name": "Civil"},
            {"id": "b", "name": "Tax"}
        ]}));
        dispatcher.create(json!({"name": "Tax"})).await.unwrap();

        assert_eq!(fx.sync.len(), 2);
        // Seed load + create + reload.
        assert_eq!(fx.mock.call_count(), 3);
    }

    #[tokio::test]
    async fn failed_create_reports_server_message_and_keeps_cache() {
        let fx = Fixture::new();
        fx.seed(json!([{"id": "a", "name": "Civil"}])).await;
        let dispatcher = fx.dispatcher(Reconcile::Reload);

        fx.mock
            .push_ok(json!({"success": false, "message": "Name already exists"}));
        let err = dispatcher.create(json!({"name": "Civil"})).await.unwrap_err();

        assert_eq!(err.user_message(), "Name already exists");
        assert_eq!(fx.sync.len(), 1);
        assert_eq!(dispatcher.state(), MutationState::Failed);
        assert_eq!(
            fx.notifier.notices(),
            vec![Notice::error("Name already exists")]
        );
    }

    #[tokio::test]
    async fn update_patches_in_place() {
        let fx = Fixture::new();
        fx.seed(json!([{"id": "a", "name": "Civil"}, {"id": "b", "name": "Tax"}]))
            .await;
        let dispatcher = fx.dispatcher(Reconcile::PatchLocal);

        fx.mock
            .push_ok(json!({"success": true, "data": {"id": "a", "name": "Civil Law"}}));
        dispatcher
            .update("a", json!({"name": "Civil Law"}))
            .await
            .unwrap();

        assert_eq!(fx.sync.get("a").unwrap().name, "Civil Law");
        assert_eq!(fx.sync.len(), 2);
        let call = &fx.mock.calls()[1];
        assert_eq!(call.method, Method::Put);
        assert_eq!(call.path, "/admin/specializations/a");
    }

    #[tokio::test]
    async fn delete_removes_from_cache() {
        let fx = Fixture::new();
        fx.seed(json!([{"id": "a", "name": "Civil"}, {"id": "b", "name": "Tax"}]))
            .await;
        let dispatcher = fx.dispatcher(Reconcile::PatchLocal);

        fx.mock.push_ok(json!({"success": true}));
        dispatcher.delete("a").await.unwrap();

        assert_eq!(fx.sync.len(), 1);
        assert!(fx.sync.get("a").is_none());
    }

    #[tokio::test]
    async fn bulk_delete_is_atomic_on_success() {
        let fx = Fixture::new();
        fx.seed(json!([
            {"id": "a", "name": "A"},
            {"id": "b", "name": "B"},
            {"id": "c", "name": "C"}
        ]))
        .await;
        let dispatcher = fx.dispatcher(Reconcile::PatchLocal);
        let mut selection: SelectionSet = ["a", "c"].into_iter().collect();

        fx.mock.push_ok(json!({"success": true}));
        dispatcher.bulk_delete(&mut selection).await.unwrap();

        assert!(selection.is_empty());
        assert_eq!(fx.sync.len(), 1);
        assert!(fx.sync.get("a").is_none());
        assert!(fx.sync.get("c").is_none());
        let call = &fx.mock.calls()[1];
        assert_eq!(call.path, "/admin/specializations/bulk-delete");
        assert_eq!(call.body, Some(json!({"ids": ["a", "c"]})));
    }

    #[tokio::test]
    async fn bulk_delete_failure_keeps_cache_and_selection() {
        let fx = Fixture::new();
        fx.seed(json!([{"id": "a", "name": "A"}, {"id": "b", "name": "B"}]))
            .await;
        let dispatcher = fx.dispatcher(Reconcile::PatchLocal);
        let mut selection: SelectionSet = ["a", "b"].into_iter().collect();

        fx.mock.push(Err(ApiError::Server {
            status: 500,
            message: "boom".into(),
        }));
        let err = dispatcher.bulk_delete(&mut selection).await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(selection.len(), 2);
        assert_eq!(fx.sync.len(), 2);
    }

    #[tokio::test]
    async fn bulk_delete_with_empty_selection_is_a_no_op() {
        let fx = Fixture::new();
        let dispatcher = fx.dispatcher(Reconcile::PatchLocal);
        let mut selection = SelectionSet::new();

        dispatcher.bulk_delete(&mut selection).await.unwrap();
        assert_eq!(fx.mock.call_count(), 0);
        assert!(fx.notifier.notices().is_empty());
    }

    #[tokio::test]
    async fn auth_expired_is_returned_without_a_notice() {
        let fx = Fixture::new();
        fx.seed(json!([{"id": "a", "name": "A"}])).await;
        let dispatcher = fx.dispatcher(Reconcile::PatchLocal);

        fx.mock.push(Err(ApiError::AuthExpired));
        let err = dispatcher.create(json!({"name": "X"})).await.unwrap_err();

        assert_eq!(err, ApiError::AuthExpired);
        assert!(fx.notifier.notices().is_empty());
    }

    #[test]
    fn second_submit_while_in_flight_is_rejected() {
        let fx = Fixture::new();
        let dispatcher = fx.dispatcher(Reconcile::PatchLocal);

        dispatcher.begin().unwrap();
        let err = dispatcher.begin().unwrap_err();

        assert_eq!(err, ApiError::InFlight);
        assert_eq!(err.user_message(), "A request is already in progress");
        // Client-side rejection: nothing hit the transport, nothing toasted.
        assert_eq!(fx.mock.call_count(), 0);
        assert!(fx.notifier.notices().is_empty());
    }

    #[test]
    fn selection_toggle_and_clear() {
        let mut selection = SelectionSet::new();
        selection.toggle("a");
        selection.toggle("b");
        assert!(selection.contains("a"));
        selection.toggle("a");
        assert!(!selection.contains("a"));
        assert_eq!(selection.len(), 1);
        selection.clear();
        assert!(selection.is_empty());
    }
}
