use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread::{self, JoinHandle};

use tracing::{trace, warn};

use super::model::{PersistedSession, SessionStore};

/// Pending operations allowed before `write` starts applying backpressure.
const QUEUE_DEPTH: usize = 64;

enum PersistOp {
    Write(PersistedSession),
    Clear,
    Flush(Sender<()>),
}

/// Single writer in front of a [`SessionStore`].
///
/// Operations are applied strictly in the order they were submitted. Store
/// failures are logged and dropped.
pub struct Persister {
    tx: Option<SyncSender<PersistOp>>,
    join: Option<JoinHandle<()>>,
}

impl Persister {
    pub fn spawn<S: SessionStore + 'static>(store: S) -> Self {
        let (tx, rx) = mpsc::sync_channel::<PersistOp>(QUEUE_DEPTH);
        let join = thread::Builder::new()
            .name("foldplay-persist".into())
            .spawn(move || run(store, rx))
            .ok();
        if join.is_none() {
            warn!("could not start the persistence thread; session changes will not be saved");
        }
        Self { tx: Some(tx), join }
    }

    fn submit(&self, op: PersistOp) {
        if let Some(tx) = &self.tx {
            if tx.send(op).is_err() {
                warn!("persistence thread is gone, dropping session update");
            }
        }
    }

    /// Queue a full snapshot write.
    pub fn write(&self, session: PersistedSession) {
        self.submit(PersistOp::Write(session));
    }

    /// Queue removal of the stored session.
    pub fn clear(&self) {
        self.submit(PersistOp::Clear);
    }

    /// Block until everything submitted so far has been applied.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.submit(PersistOp::Flush(ack_tx));
        let _ = ack_rx.recv();
    }

    /// Apply what is queued, then stop the writer thread.
    pub fn shutdown(&mut self) {
        self.tx.take();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for Persister {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<S: SessionStore>(mut store: S, rx: Receiver<PersistOp>) {
    for op in rx {
        match op {
            PersistOp::Write(session) => {
                trace!(?session, "writing session");
                if let Err(err) = store.write(&session) {
                    warn!(error = %err, "failed to save session");
                }
            }
            PersistOp::Clear => {
                trace!("clearing session");
                if let Err(err) = store.clear() {
                    warn!(error = %err, "failed to clear session");
                }
            }
            PersistOp::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}
