//! Single-slot async task runner where the newest submission wins.
//!
//! Submitting a new future aborts whatever is still in flight. Finished results are
//! published on a `watch` channel tagged with the generation that produced them, and
//! an older generation can never overwrite a newer one. A task that ends without a
//! result, because it panicked or was aborted, still marks its generation finished.

use std::future::Future;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub generation: u64,
    pub value: T,
}

pub type Slot<T> = Option<Versioned<T>>;

pub struct Supersede<T> {
    generation: u64,
    inflight: Option<JoinHandle<()>>,
    tx: watch::Sender<Slot<T>>,
    finished: watch::Sender<u64>,
}

/// Marks a generation finished when dropped, which also happens while unwinding.
struct FinishGuard {
    generation: u64,
    finished: watch::Sender<u64>,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        let generation = self.generation;
        self.finished.send_if_modified(|done| {
            let newer = *done < generation;
            if newer {
                *done = generation;
            }
            newer
        });
    }
}

impl<T> Supersede<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        let (finished, _rx) = watch::channel(0);
        Self {
            generation: 0,
            inflight: None,
            tx,
            finished,
        }
    }

    /// Cancels the in-flight task, if any, and starts `fut` in its place.
    pub fn spawn<F>(&mut self, fut: F) -> u64
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let tx = self.tx.clone();
        let guard = FinishGuard {
            generation,
            finished: self.finished.clone(),
        };
        self.inflight = Some(tokio::spawn(async move {
            let value = fut.await;
            tx.send_if_modified(move |slot| {
                let newer = match slot {
                    Some(current) => current.generation < generation,
                    None => true,
                };
                if newer {
                    *slot = Some(Versioned { generation, value });
                }
                newer
            });
            drop(guard);
        }));
        generation
    }

    /// Aborts the in-flight task without starting a new one.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.inflight.take() {
            if !handle.is_finished() {
                log::debug!("Superseding in-flight task of generation {}", self.generation);
            }
            handle.abort();
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Slot<T>> {
        self.tx.subscribe()
    }

    /// Latest published result, which may lag behind the latest submission.
    pub fn latest(&self) -> Slot<T> {
        self.tx.borrow().clone()
    }

    /// Waits for the result of the most recent submission.
    ///
    /// Returns `None` when nothing was ever submitted or the last task was cancelled
    /// or panicked.
    pub async fn settled(&self) -> Slot<T> {
        if self.generation == 0 {
            return None;
        }
        let target = self.generation;
        if self.inflight.is_some() {
            let mut done = self.finished.subscribe();
            if done.wait_for(|finished| *finished >= target).await.is_err() {
                return None;
            }
        }
        self.latest().filter(|v| v.generation == target)
    }
}

impl<T> Default for Supersede<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Supersede<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.inflight.take() {
            handle.abort();
        }
    }
}
