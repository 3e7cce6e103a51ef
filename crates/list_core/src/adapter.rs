//! Presentation side: view events in, render model out.

use std::sync::Arc;

use shared::domain::ItemId;
use tokio::task::JoinHandle;

use crate::{
    controller::{ListController, Outcome},
    store::ListSnapshot,
};

/// Scroll position of the list container, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn is_near_bottom(&self, threshold: f64) -> bool {
        self.scroll_height - self.scroll_top - self.client_height < threshold
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    SearchChanged(String),
    SearchCleared,
    Scrolled(ScrollMetrics),
    Toggled(ItemId),
    SelectAll,
    ClearSelection,
    DragEnded {
        source: usize,
        destination: Option<usize>,
    },
}

impl ViewEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ViewEvent::SearchChanged(_) => "search_changed",
            ViewEvent::SearchCleared => "search_cleared",
            ViewEvent::Scrolled(_) => "scrolled",
            ViewEvent::Toggled(_) => "toggled",
            ViewEvent::SelectAll => "select_all",
            ViewEvent::ClearSelection => "clear_selection",
            ViewEvent::DragEnded { .. } => "drag_ended",
        }
    }
}

/// Runs the intent for `event` to completion.
pub async fn handle_event(controller: &ListController, event: ViewEvent) -> Outcome {
    tracing::debug!(event = event.name(), "routing view event");
    match event {
        ViewEvent::SearchChanged(term) => controller.on_search_term_change(&term).await,
        ViewEvent::SearchCleared => controller.on_search_term_change("").await,
        ViewEvent::Scrolled(metrics) => {
            if metrics.is_near_bottom(controller.config().scroll_threshold) {
                controller.on_scroll_near_bottom().await
            } else {
                Outcome::Ignored
            }
        }
        ViewEvent::Toggled(id) => controller.on_toggle(id).await,
        ViewEvent::SelectAll => controller.on_select_all().await,
        ViewEvent::ClearSelection => controller.on_clear_selection().await,
        ViewEvent::DragEnded {
            source,
            destination,
        } => controller.on_drag_end(source, destination).await,
    }
}

/// Fire-and-forget routing for event loops that must not block on the network.
pub fn dispatch(controller: &Arc<ListController>, event: ViewEvent) -> JoinHandle<Outcome> {
    let controller = Arc::clone(controller);
    tokio::spawn(async move { handle_event(&controller, event).await })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowModel {
    pub index: usize,
    pub id: ItemId,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingIndicator {
    None,
    Initial,
    More,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderModel {
    pub rows: Vec<RowModel>,
    pub summary: String,
    pub loading: LoadingIndicator,
    pub search_term: String,
}

impl RenderModel {
    pub fn from_snapshot(snapshot: &ListSnapshot) -> Self {
        let rows = snapshot
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| RowModel {
                index,
                id: item.id,
                label: format!("Item #{}", item.value),
                selected: snapshot.is_selected(item.id),
            })
            .collect();

        let loading = match (snapshot.loading, snapshot.items.is_empty()) {
            (false, _) => LoadingIndicator::None,
            (true, true) => LoadingIndicator::Initial,
            (true, false) => LoadingIndicator::More,
        };

        Self {
            rows,
            summary: format!(
                "Showing {} of {} items • Selected: {}",
                snapshot.items.len(),
                snapshot.total_count,
                snapshot.selection.len()
            ),
            loading,
            search_term: snapshot.search_term.clone(),
        }
    }

    /// Plain-text rendering used by the command-line front end.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        if !self.search_term.is_empty() {
            out.push_str(&format!("Search: {}\n", self.search_term));
        }
        out.push_str(&self.summary);
        out.push('\n');
        match self.loading {
            LoadingIndicator::Initial => out.push_str("Loading...\n"),
            LoadingIndicator::None | LoadingIndicator::More => {
                for row in &self.rows {
                    let mark = if row.selected { "[x]" } else { "[ ]" };
                    out.push_str(&format!("{:>4} {mark} {}\n", row.index, row.label));
                }
            }
        }
        if self.loading == LoadingIndicator::More {
            out.push_str("Loading more items...\n");
        }
        out
    }
}

#[cfg(test)]
#[path = "tests/adapter_tests.rs"]
mod tests;
