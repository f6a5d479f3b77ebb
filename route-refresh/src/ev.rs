//! Latest electric-vehicle parameters attached to refresh requests of EV routes.

use std::collections::HashMap;
use std::sync::Mutex;

/// Key/value EV data (battery charge, consumption curve, ...), as the routing service
/// expects it in request parameters.
#[derive(Debug, Default)]
pub struct EvRefreshDataProvider {
    data: Mutex<HashMap<String, String>>,
}

impl EvRefreshDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial(data: HashMap<String, String>) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }

    /// Applies a partial update. A `None` value removes the key.
    pub fn on_ev_data_updated(&self, update: HashMap<String, Option<String>>) {
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        for (key, value) in update {
            match value {
                Some(value) => {
                    data.insert(key, value);
                }
                None => {
                    data.remove(&key);
                }
            }
        }
    }

    /// Snapshot of the current data.
    pub fn current(&self) -> HashMap<String, String> {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
