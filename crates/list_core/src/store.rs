//! Owned list state and its transitions.
//!
//! Every transition runs to completion on `&mut ListState`; the controller
//! never holds the state across a network await, so no reader can observe a
//! half-applied change.

use std::collections::{HashMap, HashSet};

use shared::domain::{Item, ItemId};

use crate::{
    error::ListError,
    gateway::{Page, SelectionSet},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadKind {
    Initial,
    Page,
    Search,
    Mutation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Loading(LoadKind),
    Ready,
}

/// Read-only copy of the list handed to renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSnapshot {
    pub items: Vec<Item>,
    pub selection: SelectionSet,
    pub current_page: u32,
    pub total_count: u64,
    pub loading: bool,
    pub initialized: bool,
    pub search_term: String,
    pub phase: Phase,
}

impl ListSnapshot {
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id).collect()
    }

    pub fn is_selected(&self, id: ItemId) -> bool {
        self.selection.contains(&id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListState {
    items: Vec<Item>,
    selection: SelectionSet,
    current_page: u32,
    total_count: u64,
    initialized: bool,
    search_term: String,
    pending: Vec<LoadKind>,
    mounting: bool,
    reload_needed: bool,
    search_generation: u64,
    selection_revision: u64,
    items_revision: u64,
}

impl ListState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item_ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id).collect()
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn selected_ids(&self) -> Vec<ItemId> {
        self.selection.iter().copied().collect()
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn loading(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn initialized(&self) -> bool {
        self.initialized
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn search_generation(&self) -> u64 {
        self.search_generation
    }

    pub fn selection_revision(&self) -> u64 {
        self.selection_revision
    }

    pub fn items_revision(&self) -> u64 {
        self.items_revision
    }

    pub fn phase(&self) -> Phase {
        match self.pending.last() {
            Some(kind) => Phase::Loading(*kind),
            None if self.initialized => Phase::Ready,
            None => Phase::Uninitialized,
        }
    }

    /// More items exist on the server than are loaded locally.
    pub fn has_more(&self) -> bool {
        (self.items.len() as u64) < self.total_count
    }

    pub fn is_mounting(&self) -> bool {
        self.mounting
    }

    /// The last mount or search reload failed; repeating it is allowed.
    pub fn reload_needed(&self) -> bool {
        self.reload_needed
    }

    pub fn set_reload_needed(&mut self, needed: bool) {
        self.reload_needed = needed;
    }

    pub fn begin_mount(&mut self) {
        self.mounting = true;
        self.begin_load(LoadKind::Initial);
    }

    pub fn finish_mount(&mut self) {
        self.mounting = false;
        self.initialized = true;
        self.finish_load(LoadKind::Initial);
    }

    pub fn begin_load(&mut self, kind: LoadKind) {
        self.pending.push(kind);
    }

    pub fn finish_load(&mut self, kind: LoadKind) {
        if let Some(position) = self.pending.iter().rposition(|pending| *pending == kind) {
            self.pending.remove(position);
        }
    }

    /// Replaces the loaded items with `page` or appends its unseen ids.
    ///
    /// Ids already present keep their position, and duplicates inside a single
    /// page collapse to their first occurrence.
    pub fn apply_page(&mut self, page: Page, replace: bool) {
        if replace {
            self.items.clear();
        }
        let mut seen: HashSet<ItemId> = self.items.iter().map(|item| item.id).collect();
        self.items
            .extend(page.items.into_iter().filter(|item| seen.insert(item.id)));
        self.total_count = page.total;
        self.current_page = page.page_number;
        self.items_revision += 1;
    }

    /// Stable sort by position in `order`; ids absent from `order` go last in
    /// their current relative order. Ids in `order` that are not loaded are
    /// ignored.
    pub fn apply_order(&mut self, order: &[ItemId]) {
        let mut rank: HashMap<ItemId, usize> = HashMap::with_capacity(order.len());
        for (index, id) in order.iter().enumerate() {
            rank.entry(*id).or_insert(index);
        }
        self.items
            .sort_by_key(|item| rank.get(&item.id).copied().unwrap_or(usize::MAX));
        self.items_revision += 1;
    }

    /// Replaces the selection wholesale. Counts as a selection change, so
    /// answers and rollbacks captured before it are superseded.
    pub fn apply_selection(&mut self, selection: SelectionSet) {
        self.selection = selection;
        self.selection_revision += 1;
    }

    /// Optimistically flips `id` and returns the resulting selection.
    pub fn toggle(&mut self, id: ItemId) -> SelectionSet {
        if !self.selection.remove(&id) {
            self.selection.insert(id);
        }
        self.selection_revision += 1;
        self.selection.clone()
    }

    /// Moves the item at `source` to `destination`, clamped to the list.
    /// Returns `false` without touching anything when the drop had no target
    /// or `source` is out of range.
    pub fn reorder(&mut self, source: usize, destination: Option<usize>) -> bool {
        let Some(destination) = destination else {
            return false;
        };
        if source >= self.items.len() {
            return false;
        }
        let destination = destination.min(self.items.len() - 1);
        let item = self.items.remove(source);
        self.items.insert(destination, item);
        self.items_revision += 1;
        true
    }

    /// Puts back an item sequence captured before a local reorder.
    pub fn restore_items(&mut self, items: Vec<Item>) {
        self.items = items;
        self.items_revision += 1;
    }

    /// Starts a new search. Loaded items of the previous term are dropped at
    /// once so they can never be merged with results for `term`. Returns the
    /// generation the caller must present when applying the response.
    pub fn reset_for_search(&mut self, term: impl Into<String>) -> u64 {
        self.search_term = term.into();
        self.items.clear();
        self.total_count = 0;
        self.current_page = 0;
        self.search_generation += 1;
        self.items_revision += 1;
        self.search_generation
    }

    /// Marks a local or remote selection write. Answers to older writes carry
    /// a stale revision and are discarded.
    pub fn bump_selection_revision(&mut self) -> u64 {
        self.selection_revision += 1;
        self.selection_revision
    }

    pub fn check_invariants(&self) -> Result<(), ListError> {
        let mut seen = HashSet::with_capacity(self.items.len());
        for item in &self.items {
            if !seen.insert(item.id) {
                return Err(ListError::InvariantViolation(format!(
                    "item {} appears more than once",
                    item.id
                )));
            }
        }
        Ok(())
    }

    pub fn snapshot(&self) -> ListSnapshot {
        ListSnapshot {
            items: self.items.clone(),
            selection: self.selection.clone(),
            current_page: self.current_page,
            total_count: self.total_count,
            loading: self.loading(),
            initialized: self.initialized,
            search_term: self.search_term.clone(),
            phase: self.phase(),
        }
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
