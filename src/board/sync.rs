use std::collections::HashMap;

use tracing::trace;

/// Identity of one row animator, unique for the lifetime of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowId(pub(crate) u64);

/// Readiness barrier shared by the rows of a board.
///
/// Rows register on creation and are forgotten on teardown. A row marks
/// itself busy right before it claims the horizontal-scroll phase, so while
/// any registered row is busy every other row holds in its decider state.
#[derive(Debug, Default)]
pub struct Synchroniser {
    ready: HashMap<RowId, bool>,
}

impl Synchroniser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, row: RowId, ready: bool) {
        self.ready.insert(row, ready);
    }

    pub fn forget(&mut self, row: RowId) {
        self.ready.remove(&row);
    }

    pub fn set_ready(&mut self, row: RowId) {
        self.set(row, true);
    }

    pub fn set_busy(&mut self, row: RowId) {
        self.set(row, false);
    }

    pub fn is_ready(&self, row: RowId) -> bool {
        self.ready.get(&row).copied().unwrap_or(false)
    }

    pub fn is_synchronised(&self) -> bool {
        self.ready.values().all(|ready| *ready)
    }

    pub fn len(&self) -> usize {
        self.ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    pub fn busy_count(&self) -> usize {
        self.ready.values().filter(|ready| !**ready).count()
    }

    fn set(&mut self, row: RowId, ready: bool) {
        match self.ready.get_mut(&row) {
            Some(flag) => *flag = ready,
            None => trace!(row = row.0, "readiness update for unregistered row"),
        }
    }
}
