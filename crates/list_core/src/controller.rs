//! Reconciliation of the local list with the remote order/selection record.
//!
//! Intents lock the state, apply their local transition, release the lock and
//! only then await the network. Responses are checked against the staleness
//! tokens captured at call time (search generation, selection revision, items
//! revision) before they are applied.

use std::{future::Future, sync::Arc};

use shared::domain::ItemId;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    config::ControllerConfig,
    error::GatewayError,
    gateway::{Page, RemoteState, SelectionSet, StateGateway},
    store::{ListSnapshot, ListState, LoadKind, Phase},
};

/// What an intent ended up doing. Intents never return errors; failures are
/// logged and reported here. `Failed` means at least one remote call failed;
/// whatever else succeeded was still applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Ignored,
    Stale,
    Failed(GatewayError),
}

pub struct ListController {
    gateway: Arc<dyn StateGateway>,
    config: ControllerConfig,
    state: Mutex<ListState>,
    snapshots: watch::Sender<ListSnapshot>,
}

impl ListController {
    pub fn new(gateway: Arc<dyn StateGateway>, config: ControllerConfig) -> Arc<Self> {
        let state = ListState::new();
        let (snapshots, _) = watch::channel(state.snapshot());
        Arc::new(Self {
            gateway,
            config,
            state: Mutex::new(state),
            snapshots,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn snapshot(&self) -> ListSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListSnapshot> {
        self.snapshots.subscribe()
    }

    /// Initial load: state and page 1 are requested together and applied once
    /// both settle. The list becomes initialized even if either call fails;
    /// after a failure, mounting again retries the load.
    pub async fn mount(&self) -> Outcome {
        let (generation, selection_revision, term) = {
            let mut state = self.state.lock().await;
            if state.is_mounting() || (state.initialized() && !state.reload_needed()) {
                debug!("mount ignored: list already initialized");
                return Outcome::Ignored;
            }
            state.begin_mount();
            self.publish(&state);
            (
                state.search_generation(),
                state.selection_revision(),
                state.search_term().to_string(),
            )
        };

        let (remote, page) = futures::join!(
            self.timed(self.gateway.fetch_state()),
            self.timed(self.gateway.fetch_page(1, self.config.page_size, &term)),
        );

        let mut state = self.state.lock().await;
        let mut failure = None;
        let mut page_applied = false;

        let order = match remote {
            Ok(remote) => {
                if state.selection_revision() == selection_revision {
                    state.apply_selection(remote.selection);
                }
                Some(remote.order)
            }
            Err(err) => {
                error!(error = %err, "failed to load list state");
                failure = Some(err);
                None
            }
        };

        match page {
            Ok(mut page) if state.search_generation() == generation => {
                settle_page_number(&mut page, 1);
                state.apply_page(page, true);
                if let Some(order) = order.as_deref().filter(|order| !order.is_empty()) {
                    state.apply_order(order);
                }
                page_applied = true;
            }
            Ok(_) => debug!("initial page superseded by a newer search"),
            Err(err) => {
                error!(error = %err, "failed to load first page");
                failure.get_or_insert(err);
            }
        }

        if failure.is_some() {
            state.set_reload_needed(true);
        } else if page_applied {
            state.set_reload_needed(false);
        }
        state.finish_mount();
        info!(
            items = state.items().len(),
            total = state.total_count(),
            selected = state.selection().len(),
            "list initialized"
        );
        self.publish(&state);

        match failure {
            Some(err) => Outcome::Failed(err),
            None => Outcome::Applied,
        }
    }

    /// Reloads page 1 for `term`. Answers for a term that has since been
    /// replaced are discarded, whatever order they arrive in. Repeating the
    /// current term is ignored unless its last load failed.
    pub async fn on_search_term_change(&self, term: &str) -> Outcome {
        let (generation, selection_revision) = {
            let mut state = self.state.lock().await;
            if state.search_term() == term && !state.reload_needed() {
                return Outcome::Ignored;
            }
            let generation = state.reset_for_search(term);
            state.begin_load(LoadKind::Search);
            self.publish(&state);
            (generation, state.selection_revision())
        };

        let page_size = self.config.page_size;
        let (page, remote) = if self.config.resync_state_on_search {
            let (page, remote) = futures::join!(
                self.timed(self.gateway.fetch_page(1, page_size, term)),
                self.timed(self.gateway.fetch_state()),
            );
            (page, Some(remote))
        } else {
            (
                self.timed(self.gateway.fetch_page(1, page_size, term))
                    .await,
                None,
            )
        };

        let mut state = self.state.lock().await;
        state.finish_load(LoadKind::Search);

        if state.search_generation() != generation {
            debug!(term = %term, "discarding results for superseded search term");
            self.publish(&state);
            return Outcome::Stale;
        }

        let mut outcome = match page {
            Ok(mut page) => {
                settle_page_number(&mut page, 1);
                state.apply_page(page, true);
                Outcome::Applied
            }
            Err(err) => {
                error!(term = %term, error = %err, "failed to load search results");
                Outcome::Failed(err)
            }
        };

        match remote {
            Some(Ok(remote)) => {
                if state.selection_revision() == selection_revision {
                    state.apply_selection(remote.selection);
                }
                if !remote.order.is_empty() {
                    state.apply_order(&remote.order);
                }
            }
            Some(Err(err)) => {
                error!(error = %err, "failed to refresh list state for search");
                if outcome == Outcome::Applied {
                    outcome = Outcome::Failed(err);
                }
            }
            None => {}
        }

        state.set_reload_needed(matches!(outcome, Outcome::Failed(_)));
        self.publish(&state);
        outcome
    }

    /// Loads the next page. Ignored unless the list is ready, idle and has
    /// more items on the server; nothing is queued.
    pub async fn on_scroll_near_bottom(&self) -> Outcome {
        let (generation, next_page, term) = {
            let mut state = self.state.lock().await;
            if state.phase() != Phase::Ready || !state.has_more() {
                return Outcome::Ignored;
            }
            state.begin_load(LoadKind::Page);
            self.publish(&state);
            (
                state.search_generation(),
                state.current_page() + 1,
                state.search_term().to_string(),
            )
        };

        let result = self
            .timed(
                self.gateway
                    .fetch_page(next_page, self.config.page_size, &term),
            )
            .await;

        let mut state = self.state.lock().await;
        state.finish_load(LoadKind::Page);

        let outcome = if state.search_generation() != generation {
            debug!(page = next_page, term = %term, "discarding page for superseded search term");
            Outcome::Stale
        } else {
            match result {
                Ok(mut page) => {
                    settle_page_number(&mut page, next_page);
                    state.apply_page(page, false);
                    Outcome::Applied
                }
                Err(err) => {
                    error!(page = next_page, error = %err, "failed to load more items");
                    Outcome::Failed(err)
                }
            }
        };

        self.publish(&state);
        outcome
    }

    /// Flips `id` locally at once, then persists the whole selection.
    pub async fn on_toggle(&self, id: ItemId) -> Outcome {
        let (previous, selected, revision) = {
            let mut state = self.state.lock().await;
            let previous = state.selection().clone();
            let selection = state.toggle(id);
            state.begin_load(LoadKind::Mutation);
            self.publish(&state);
            (
                previous,
                selection.into_iter().collect::<Vec<_>>(),
                state.selection_revision(),
            )
        };

        let result = self.timed(self.gateway.save_selection(&selected)).await;

        let mut state = self.state.lock().await;
        state.finish_load(LoadKind::Mutation);
        let outcome = self.settle_selection(&mut state, revision, result, Some(previous), "toggle");
        self.publish(&state);
        outcome
    }

    pub async fn on_select_all(&self) -> Outcome {
        self.write_selection(true, "select_all").await
    }

    pub async fn on_clear_selection(&self) -> Outcome {
        self.write_selection(false, "clear_selection").await
    }

    /// Moves the dragged item locally at once, then persists the full order.
    /// A drop without destination is ignored.
    pub async fn on_drag_end(&self, source: usize, destination: Option<usize>) -> Outcome {
        let (previous, order, items_revision, selection_revision) = {
            let mut state = self.state.lock().await;
            let previous = state.items().to_vec();
            if !state.reorder(source, destination) {
                debug!(source, ?destination, "drag ended without a valid move");
                return Outcome::Ignored;
            }
            state.begin_load(LoadKind::Mutation);
            self.publish(&state);
            (
                previous,
                state.item_ids(),
                state.items_revision(),
                state.selection_revision(),
            )
        };

        let result = self.timed(self.gateway.save_order(&order)).await;

        let mut state = self.state.lock().await;
        state.finish_load(LoadKind::Mutation);
        let outcome = match result {
            Ok(remote) => {
                if state.selection_revision() == selection_revision {
                    state.apply_selection(remote.selection);
                } else {
                    debug!("order saved; selection answer superseded by a newer change");
                }
                Outcome::Applied
            }
            Err(err) => {
                error!(error = %err, "failed to save order");
                if self.config.rollback_on_failure && state.items_revision() == items_revision {
                    state.restore_items(previous);
                }
                Outcome::Failed(err)
            }
        };
        self.publish(&state);
        outcome
    }

    /// Sends all loaded ids (or none) without touching the local selection
    /// until the service answers.
    async fn write_selection(&self, select_all: bool, operation: &'static str) -> Outcome {
        let (selected, revision) = {
            let mut state = self.state.lock().await;
            let selected = if select_all {
                state.item_ids()
            } else {
                Vec::new()
            };
            let revision = state.bump_selection_revision();
            state.begin_load(LoadKind::Mutation);
            self.publish(&state);
            (selected, revision)
        };

        let result = self.timed(self.gateway.save_selection(&selected)).await;

        let mut state = self.state.lock().await;
        state.finish_load(LoadKind::Mutation);
        let outcome = self.settle_selection(&mut state, revision, result, None, operation);
        self.publish(&state);
        outcome
    }

    fn settle_selection(
        &self,
        state: &mut ListState,
        revision: u64,
        result: Result<RemoteState, GatewayError>,
        rollback: Option<SelectionSet>,
        operation: &'static str,
    ) -> Outcome {
        match result {
            Ok(remote) if state.selection_revision() == revision => {
                state.apply_selection(remote.selection);
                Outcome::Applied
            }
            Ok(_) => {
                debug!(operation, "discarding selection answer superseded by a newer change");
                Outcome::Stale
            }
            Err(err) => {
                error!(operation, error = %err, "failed to save selection");
                if let Some(previous) = rollback {
                    if self.config.rollback_on_failure && state.selection_revision() == revision {
                        state.apply_selection(previous);
                    }
                }
                Outcome::Failed(err)
            }
        }
    }

    async fn timed<T>(
        &self,
        call: impl Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, GatewayError> {
        let limit = self.config.request_timeout();
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(limit)),
        }
    }

    fn publish(&self, state: &ListState) {
        if let Err(err) = state.check_invariants() {
            error!(error = %err, "list state invariant violated");
        }
        self.snapshots.send_replace(state.snapshot());
    }
}

/// The requested page number wins over whatever the service echoes.
fn settle_page_number(page: &mut Page, requested: u32) {
    if page.page_number != requested {
        warn!(
            requested,
            answered = page.page_number,
            "service echoed a different page number"
        );
        page.page_number = requested;
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
