use super::*;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use shared::domain::Item;

use crate::{
    config::ControllerConfig,
    error::GatewayError,
    gateway::{Page, RemoteState, SelectionSet, StateGateway},
    store::Phase,
};

/// Answers immediately from a fixed set of items `1..=count` and echoes saves.
struct EchoGateway {
    count: i64,
    order: StdMutex<Vec<ItemId>>,
    selection: StdMutex<SelectionSet>,
    calls: StdMutex<Vec<&'static str>>,
}

impl EchoGateway {
    fn new(count: i64) -> Arc<Self> {
        Arc::new(Self {
            count,
            order: StdMutex::new(Vec::new()),
            selection: StdMutex::new(SelectionSet::new()),
            calls: StdMutex::new(Vec::new()),
        })
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().expect("calls").push(call);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().expect("calls").clone()
    }

    fn remote(&self) -> RemoteState {
        RemoteState {
            order: self.order.lock().expect("order").clone(),
            selection: self.selection.lock().expect("selection").clone(),
        }
    }
}

#[async_trait]
impl StateGateway for EchoGateway {
    async fn fetch_page(&self, page: u32, limit: u32, term: &str) -> Result<Page, GatewayError> {
        self.record("fetch_page");
        let matching: Vec<Item> = (1..=self.count)
            .map(|id| Item::new(id, id))
            .filter(|item| item.value.to_string().contains(term))
            .collect();
        let start = ((page.max(1) - 1) * limit) as usize;
        Ok(Page {
            items: matching
                .iter()
                .skip(start)
                .take(limit as usize)
                .copied()
                .collect(),
            total: matching.len() as u64,
            page_number: page,
        })
    }

    async fn fetch_state(&self) -> Result<RemoteState, GatewayError> {
        self.record("fetch_state");
        Ok(self.remote())
    }

    async fn save_order(&self, order: &[ItemId]) -> Result<RemoteState, GatewayError> {
        self.record("save_order");
        *self.order.lock().expect("order") = order.to_vec();
        Ok(self.remote())
    }

    async fn save_selection(&self, selected: &[ItemId]) -> Result<RemoteState, GatewayError> {
        self.record("save_selection");
        *self.selection.lock().expect("selection") = selected.iter().copied().collect();
        Ok(self.remote())
    }
}

async fn mounted(count: i64) -> (Arc<EchoGateway>, Arc<ListController>) {
    let gateway = EchoGateway::new(count);
    let controller = ListController::new(gateway.clone(), ControllerConfig::default());
    assert_eq!(controller.mount().await, Outcome::Applied);
    (gateway, controller)
}

fn snapshot(items: Vec<Item>, selected: &[i64], total: u64, loading: bool) -> ListSnapshot {
    ListSnapshot {
        items,
        selection: selected.iter().copied().map(ItemId).collect(),
        current_page: 1,
        total_count: total,
        loading,
        initialized: true,
        search_term: String::new(),
        phase: if loading {
            Phase::Loading(crate::store::LoadKind::Page)
        } else {
            Phase::Ready
        },
    }
}

fn metrics(scroll_top: f64) -> ScrollMetrics {
    ScrollMetrics {
        scroll_top,
        scroll_height: 2_000.0,
        client_height: 500.0,
    }
}

#[test]
fn near_bottom_is_strictly_below_threshold() {
    assert!(metrics(1_450.0).is_near_bottom(100.0));
    assert!(metrics(1_500.0).is_near_bottom(100.0));
    assert!(!metrics(1_400.0).is_near_bottom(100.0));
    assert!(!metrics(0.0).is_near_bottom(100.0));
}

#[test]
fn render_model_labels_rows_and_summarizes() {
    let model = RenderModel::from_snapshot(&snapshot(
        vec![Item::new(1, 10), Item::new(2, 20)],
        &[2],
        42,
        false,
    ));

    assert_eq!(
        model.rows,
        vec![
            RowModel {
                index: 0,
                id: ItemId(1),
                label: "Item #10".into(),
                selected: false,
            },
            RowModel {
                index: 1,
                id: ItemId(2),
                label: "Item #20".into(),
                selected: true,
            },
        ]
    );
    assert_eq!(model.summary, "Showing 2 of 42 items • Selected: 1");
    assert_eq!(model.loading, LoadingIndicator::None);
}

#[test]
fn loading_indicator_depends_on_whether_rows_exist() {
    let empty = RenderModel::from_snapshot(&snapshot(Vec::new(), &[], 0, true));
    assert_eq!(empty.loading, LoadingIndicator::Initial);

    let more = RenderModel::from_snapshot(&snapshot(vec![Item::new(1, 1)], &[], 5, true));
    assert_eq!(more.loading, LoadingIndicator::More);
}

#[test]
fn selection_count_includes_ids_not_loaded() {
    let model = RenderModel::from_snapshot(&snapshot(vec![Item::new(1, 1)], &[1, 99], 5, false));
    assert_eq!(model.summary, "Showing 1 of 5 items • Selected: 2");
}

#[test]
fn text_rendering_lists_rows_with_marks() {
    let mut snap = snapshot(vec![Item::new(1, 10), Item::new(2, 20)], &[2], 42, false);
    snap.search_term = "0".into();
    let text = RenderModel::from_snapshot(&snap).to_text();
    assert_eq!(
        text,
        "Search: 0\nShowing 2 of 42 items • Selected: 1\n   0 [ ] Item #10\n   1 [x] Item #20\n"
    );
}

#[test]
fn text_rendering_shows_loading_states() {
    let initial = RenderModel::from_snapshot(&snapshot(Vec::new(), &[], 0, true)).to_text();
    assert_eq!(initial, "Showing 0 of 0 items • Selected: 0\nLoading...\n");

    let more = RenderModel::from_snapshot(&snapshot(vec![Item::new(7, 7)], &[], 9, true)).to_text();
    assert!(more.ends_with("   0 [ ] Item #7\nLoading more items...\n"));
}

#[tokio::test]
async fn scroll_far_from_bottom_does_not_fetch() {
    let (gateway, controller) = mounted(50).await;
    let before = gateway.calls().len();

    let outcome = handle_event(&controller, ViewEvent::Scrolled(metrics(0.0))).await;

    assert_eq!(outcome, Outcome::Ignored);
    assert_eq!(gateway.calls().len(), before);
    assert_eq!(controller.snapshot().items.len(), 20);
}

#[tokio::test]
async fn scroll_near_bottom_loads_next_page() {
    let (_gateway, controller) = mounted(50).await;

    let outcome = handle_event(&controller, ViewEvent::Scrolled(metrics(1_450.0))).await;

    assert_eq!(outcome, Outcome::Applied);
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.items.len(), 40);
    assert_eq!(snapshot.current_page, 2);
}

#[tokio::test]
async fn search_events_filter_and_clear() {
    let (_gateway, controller) = mounted(50).await;

    let outcome = handle_event(&controller, ViewEvent::SearchChanged("5".into())).await;
    assert_eq!(outcome, Outcome::Applied);
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.search_term, "5");
    assert_eq!(
        snapshot.item_ids(),
        [5, 15, 25, 35, 45, 50].into_iter().map(ItemId).collect::<Vec<_>>()
    );

    let outcome = handle_event(&controller, ViewEvent::SearchCleared).await;
    assert_eq!(outcome, Outcome::Applied);
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.search_term, "");
    assert_eq!(snapshot.items.len(), 20);
    assert_eq!(snapshot.total_count, 50);
}

#[tokio::test]
async fn selection_events_reach_the_service() {
    let (gateway, controller) = mounted(3).await;

    assert_eq!(
        handle_event(&controller, ViewEvent::Toggled(ItemId(2))).await,
        Outcome::Applied
    );
    assert!(controller.snapshot().is_selected(ItemId(2)));

    assert_eq!(
        handle_event(&controller, ViewEvent::SelectAll).await,
        Outcome::Applied
    );
    assert_eq!(controller.snapshot().selection.len(), 3);

    assert_eq!(
        handle_event(&controller, ViewEvent::ClearSelection).await,
        Outcome::Applied
    );
    assert!(controller.snapshot().selection.is_empty());

    let saves = gateway
        .calls()
        .into_iter()
        .filter(|call| *call == "save_selection")
        .count();
    assert_eq!(saves, 3);
}

#[tokio::test]
async fn drag_events_reorder_and_persist() {
    let (gateway, controller) = mounted(3).await;

    let outcome = handle_event(
        &controller,
        ViewEvent::DragEnded {
            source: 2,
            destination: Some(0),
        },
    )
    .await;
    assert_eq!(outcome, Outcome::Applied);
    assert_eq!(
        controller.snapshot().item_ids(),
        vec![ItemId(3), ItemId(1), ItemId(2)]
    );
    assert_eq!(
        *gateway.order.lock().expect("order"),
        vec![ItemId(3), ItemId(1), ItemId(2)]
    );

    let outcome = handle_event(
        &controller,
        ViewEvent::DragEnded {
            source: 0,
            destination: None,
        },
    )
    .await;
    assert_eq!(outcome, Outcome::Ignored);
}

#[tokio::test]
async fn dispatch_runs_event_in_background() {
    let (_gateway, controller) = mounted(3).await;

    let handle = dispatch(&controller, ViewEvent::Toggled(ItemId(1)));
    assert_eq!(handle.await.expect("join"), Outcome::Applied);
    assert!(controller.snapshot().is_selected(ItemId(1)));
}

#[test]
fn event_names_are_stable() {
    assert_eq!(ViewEvent::SearchCleared.name(), "search_cleared");
    assert_eq!(
        ViewEvent::DragEnded {
            source: 0,
            destination: None
        }
        .name(),
        "drag_ended"
    );
}
