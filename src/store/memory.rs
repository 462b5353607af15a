use std::sync::{Arc, Mutex};

use super::model::{PersistedSession, SessionStore, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Write(PersistedSession),
    Clear,
}

#[derive(Debug, Default)]
struct Inner {
    current: Option<PersistedSession>,
    ops: Vec<StoreOp>,
}

/// In-memory store for tests. Clones share the same record and op log.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn with(session: PersistedSession) -> Self {
        let store = Self::default();
        store.inner.lock().unwrap().current = Some(session);
        store
    }

    pub fn current(&self) -> Option<PersistedSession> {
        self.inner.lock().unwrap().current.clone()
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.inner.lock().unwrap().ops.clone()
    }
}

impl SessionStore for MemoryStore {
    fn read(&self) -> Result<Option<PersistedSession>, StoreError> {
        Ok(self.current())
    }

    fn write(&mut self, session: &PersistedSession) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.current = Some(session.clone());
        inner.ops.push(StoreOp::Write(session.clone()));
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.current = None;
        inner.ops.push(StoreOp::Clear);
        Ok(())
    }
}
