use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::manifest::{Manifest, ManifestProvider};

pub type UpdateCallback = Box<dyn Fn(Manifest) + Send + Sync>;

/// Receives the manifest path whenever a check cannot load it.
pub type ErrorCallback = Box<dyn Fn(&str) + Send + Sync>;

struct Inner {
    provider: ManifestProvider,
    on_update: UpdateCallback,
    on_error: Mutex<Option<ErrorCallback>>,
    last_seen: Mutex<Option<String>>,
    checking: Mutex<()>,
}

struct Worker {
    stop: Sender<()>,
    handle: thread::JoinHandle<()>,
}

/// Polls the manifest and reports when its `lastUpdated` stamp changes.
pub struct RefreshController {
    inner: Arc<Inner>,
    interval: Duration,
    worker: Mutex<Option<Worker>>,
}

impl RefreshController {
    pub fn new<F>(provider: ManifestProvider, interval: Duration, on_update: F) -> Self
    where
        F: Fn(Manifest) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                provider,
                on_update: Box::new(on_update),
                on_error: Mutex::new(None),
                last_seen: Mutex::new(None),
                checking: Mutex::new(()),
            }),
            interval,
            worker: Mutex::new(None),
        }
    }

    /// Seeds the last seen stamp, e.g. from a manifest loaded before polling began.
    pub fn with_last_seen(self, stamp: impl Into<String>) -> Self {
        *self.inner.last_seen.lock() = Some(stamp.into());
        self
    }

    pub fn with_error_hook<F>(self, on_error: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.inner.on_error.lock() = Some(Box::new(on_error));
        self
    }

    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let inner = self.inner.clone();
        let interval = self.interval;
        let handle = thread::spawn(move || loop {
            inner.check();
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        info!(interval = ?self.interval, "refresh: polling started");
        *worker = Some(Worker {
            stop: stop_tx,
            handle,
        });
    }

    pub fn stop(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.stop.send(());
            match worker.handle.join() {
                Ok(()) => info!("refresh: polling stopped"),
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|reason| reason.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".into());
                    warn!("refresh: polling thread panicked: {reason}");
                }
            }
        }
    }

    /// Runs one check on the calling thread; true when the callback fired.
    pub fn force_check(&self) -> bool {
        self.inner.check()
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    pub fn last_seen(&self) -> Option<String> {
        self.inner.last_seen.lock().clone()
    }
}

impl Drop for RefreshController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn check(&self) -> bool {
        let _guard = self.checking.lock();
        let Some(manifest) = self.provider.load(true) else {
            if let Some(on_error) = self.on_error.lock().as_ref() {
                on_error(self.provider.path());
            }
            return false;
        };

        {
            let mut last_seen = self.last_seen.lock();
            if last_seen.as_deref() == Some(manifest.last_updated.as_str()) {
                debug!("refresh: manifest unchanged");
                return false;
            }
            *last_seen = Some(manifest.last_updated.clone());
        }

        info!(last_updated = %manifest.last_updated, "refresh: manifest updated");
        (self.on_update)(manifest);
        true
    }
}
