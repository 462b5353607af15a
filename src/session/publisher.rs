use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::state::PlaylistState;

struct Shared {
    latest: RwLock<Arc<PlaylistState>>,
    subscribers: Mutex<Vec<Sender<Arc<PlaylistState>>>>,
}

/// Write side of the state channel. Held by the coordinator only.
pub struct StatePublisher {
    shared: Arc<Shared>,
}

/// Read side: the latest snapshot plus change notifications.
#[derive(Clone)]
pub struct StateReader {
    shared: Arc<Shared>,
}

impl StatePublisher {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                latest: RwLock::new(Arc::new(PlaylistState::default())),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn reader(&self) -> StateReader {
        StateReader {
            shared: self.shared.clone(),
        }
    }

    /// Replace the latest snapshot and notify subscribers. Subscribers whose
    /// receiver is gone are dropped.
    pub fn publish(&self, state: &PlaylistState) {
        let snapshot = Arc::new(state.clone());
        *self
            .shared
            .latest
            .write()
            .unwrap_or_else(PoisonError::into_inner) = snapshot.clone();

        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(snapshot.clone()).is_ok());
    }
}

impl Default for StatePublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl StateReader {
    pub fn snapshot(&self) -> Arc<PlaylistState> {
        self.shared
            .latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Receive every snapshot published from now on.
    pub fn subscribe(&self) -> Receiver<Arc<PlaylistState>> {
        let (tx, rx) = mpsc::channel();
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
