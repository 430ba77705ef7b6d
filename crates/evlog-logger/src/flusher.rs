//! Periodic background flush

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::logger::EventLogger;

/// Handle to a running flusher task. Dropping it leaves the task running
/// until the logger itself is dropped.
pub struct FlusherHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl FlusherHandle {
    /// Stop the task after one final flush.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
    }
}

impl EventLogger {
    /// Flush every `interval` on the current tokio runtime. The task holds
    /// only a weak reference and exits once the logger is gone.
    pub fn spawn_flusher(self: &Arc<Self>, interval: Duration) -> FlusherHandle {
        let logger: Weak<EventLogger> = Arc::downgrade(self);
        let (tx, mut rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            let mut detached = false;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(logger) = logger.upgrade() else {
                            break;
                        };
                        logger.flush();
                    }
                    signal = &mut rx, if !detached => {
                        if signal.is_err() {
                            // handle dropped without a shutdown
                            detached = true;
                            continue;
                        }
                        if let Some(logger) = logger.upgrade() {
                            logger.flush();
                        }
                        break;
                    }
                }
            }
            debug!("Log flusher stopped");
        });

        FlusherHandle {
            shutdown: Some(tx),
            task,
        }
    }
}
