use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Instant,
};

use parking_lot::Mutex;
use tokio::{sync::watch, task};
use tracing::{error, info, warn};

use crate::{
    error::ModelLoadError,
    model::{ModelHandle, ModelLoader, ModelMetadata},
};

type LoadOutcome = Result<ModelHandle, ModelLoadError>;

enum Slot {
    Empty,
    Loading(watch::Receiver<Option<LoadOutcome>>),
    Ready(ModelHandle),
}

/// Owns the single classifier instance shared by every request.
///
/// The model is loaded on first use. Callers arriving while a load is in
/// flight wait on that attempt instead of starting their own. A failed
/// attempt is reported to everyone who waited on it and then forgotten, so
/// the next caller retries.
pub struct ModelRegistry {
    loader: Arc<dyn ModelLoader>,
    slot: Arc<Mutex<Slot>>,
    attempts: Arc<AtomicUsize>,
}

impl ModelRegistry {
    pub fn new(loader: impl ModelLoader + 'static) -> Self {
        Self {
            loader: Arc::new(loader),
            slot: Arc::new(Mutex::new(Slot::Empty)),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn get(&self) -> Result<ModelHandle, ModelLoadError> {
        let mut outcome = {
            let mut slot = self.slot.lock();
            match &*slot {
                Slot::Ready(model) => return Ok(model.clone()),
                // A closed sender means the load task died before reporting.
                Slot::Loading(rx) if rx.has_changed().is_ok() => rx.clone(),
                Slot::Loading(_) | Slot::Empty => {
                    if matches!(*slot, Slot::Loading(_)) {
                        warn!("previous classifier load ended without an outcome, retrying");
                    }
                    let (tx, rx) = watch::channel(None);
                    *slot = Slot::Loading(rx.clone());
                    self.spawn_load(tx);
                    rx
                }
            }
        };

        let result = match outcome.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        };
        result.unwrap_or_else(|| {
            Err(ModelLoadError::Task(
                "loader exited without reporting an outcome".into(),
            ))
        })
    }

    /// The cached model, if a load has already succeeded.
    pub fn cached(&self) -> Option<ModelHandle> {
        match &*self.slot.lock() {
            Slot::Ready(model) => Some(model.clone()),
            _ => None,
        }
    }

    pub fn metadata(&self) -> Option<ModelMetadata> {
        self.cached().map(|model| model.metadata())
    }

    /// Number of load attempts started so far.
    pub fn load_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    // Runs detached so a caller giving up does not cancel a load others wait on.
    fn spawn_load(&self, tx: watch::Sender<Option<LoadOutcome>>) {
        let loader = self.loader.clone();
        let slot = self.slot.clone();
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::spawn(async move {
            info!(attempt, "loading classifier");
            let start = Instant::now();

            let outcome = match task::spawn_blocking(move || loader.load()).await {
                Ok(outcome) => outcome,
                Err(err) => Err(ModelLoadError::Task(err.to_string())),
            };

            match &outcome {
                Ok(model) => {
                    let metadata = model.metadata();
                    info!(
                        attempt,
                        model = %metadata.name,
                        backend = metadata.backend,
                        size_bytes = metadata.size_bytes,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "classifier loaded"
                    );
                    *slot.lock() = Slot::Ready(model.clone());
                }
                Err(err) => {
                    error!(attempt, error = %err, "classifier load failed, will retry on next request");
                    *slot.lock() = Slot::Empty;
                }
            }

            tx.send_replace(Some(outcome));
        });
    }
}
