use std::collections::HashMap;

use comms::specs::History;
use parking_lot::RwLock;

/// Where the records of terminated jobs are persisted.
pub trait HistoryStore: Send + Sync {
    fn save(&self, history: History);

    fn get(&self, job_id: &str) -> Option<History>;
}

/// A `HistoryStore` living in the process memory.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    histories: RwLock<HashMap<String, History>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.histories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn save(&self, history: History) {
        self.histories.write().insert(history.id.clone(), history);
    }

    fn get(&self, job_id: &str) -> Option<History> {
        self.histories.read().get(job_id).cloned()
    }
}
