use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use tracing::warn;

use super::message::Msg;

/// Posts `Msg::Tick` at a fixed interval until stopped.
///
/// At most one ticker thread runs per `ProgressTicker`; starting again
/// cancels the previous one.
#[derive(Default)]
pub struct ProgressTicker {
    cancel: Option<Sender<()>>,
}

impl ProgressTicker {
    pub fn start(&mut self, interval: Duration, tx: Sender<Msg>) {
        self.stop();
        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let spawned = thread::Builder::new()
            .name("foldplay-progress".into())
            .spawn(move || {
                loop {
                    match cancel_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if tx.send(Msg::Tick).is_err() {
                                break;
                            }
                        }
                        // Cancelled explicitly or the ticker was dropped.
                        _ => break,
                    }
                }
            });
        match spawned {
            Ok(_) => self.cancel = Some(cancel_tx),
            Err(err) => warn!(error = %err, "could not start progress sampling"),
        }
    }

    pub fn stop(&mut self) {
        self.cancel.take();
    }

    pub fn is_running(&self) -> bool {
        self.cancel.is_some()
    }
}
