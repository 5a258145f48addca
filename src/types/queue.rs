use super::index::{Order, OrderedIndex};
use super::job::JobId;

/// A named queue: just its ready index (spec §3's Queue record). Created
/// lazily on first reference and destroyed on `remove` or snapshot reload
/// cleanup — see [`crate::engine::Engine::queue_get_or_create`].
pub struct QueueRecord {
    pub ready: OrderedIndex<JobId>,
}

impl QueueRecord {
    pub fn new() -> Self {
        Self {
            ready: OrderedIndex::new(Order::Descending),
        }
    }
}

impl Default for QueueRecord {
    fn default() -> Self {
        Self::new()
    }
}
