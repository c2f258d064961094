//! Observer callback registry for asynchronous instruments.
//!
//! Registration and collection only share the callback list. The list lock
//! is held for add, remove and snapshot; callbacks always run unlocked so
//! they may register or remove callbacks themselves.

use crate::core::{CallbackFailure, InstrumentDescriptor, MetricsError, Result};
use crate::metrics::observer::ObserverResult;
use crate::metrics::storage::multi::panic_message;
use crate::metrics::storage::AsyncWritableMetricStorage;
use parking_lot::Mutex;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::{Instant, SystemTime};

/// User callback invoked once per collection cycle.
///
/// Any per-callback state lives in the closure itself.
pub type ObservableCallback = Arc<dyn Fn(&mut ObserverResult) -> anyhow::Result<()> + Send + Sync>;

/// Wrap a closure as an [`ObservableCallback`].
pub fn callback<F>(f: F) -> ObservableCallback
where
    F: Fn(&mut ObserverResult) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// One `add_callback` registration.
#[derive(Clone)]
pub struct ObservableCallbackRecord {
    callback: ObservableCallback,
    instrument: Weak<ObservableInstrument>,
}

impl ObservableCallbackRecord {
    fn matches(&self, callback: &ObservableCallback, instrument: &Arc<ObservableInstrument>) -> bool {
        Arc::ptr_eq(&self.callback, callback) && std::ptr::eq(self.instrument.as_ptr(), Arc::as_ptr(instrument))
    }
}

impl fmt::Debug for ObservableCallbackRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let instrument = self.instrument.upgrade();
        f.debug_struct("ObservableCallbackRecord")
            .field("instrument", &instrument.as_ref().map(|i| i.descriptor.name.as_str()))
            .finish_non_exhaustive()
    }
}

/// Ordered list of callback registrations.
#[derive(Debug, Default)]
pub struct ObservableRegistry {
    records: Mutex<Vec<ObservableCallbackRecord>>,
}

impl ObservableRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `instrument`.
    ///
    /// Registering the same callback twice yields two entries, and both fire.
    pub fn add_callback(&self, callback: ObservableCallback, instrument: &Arc<ObservableInstrument>) {
        self.records.lock().push(ObservableCallbackRecord {
            callback,
            instrument: Arc::downgrade(instrument),
        });
        tracing::debug!("Registered observer callback for {}", instrument.descriptor.name);
    }

    /// Remove every registration of `callback` for `instrument`, returning
    /// how many were removed. Unknown pairs are ignored.
    pub fn remove_callback(&self, callback: &ObservableCallback, instrument: &Arc<ObservableInstrument>) -> usize {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|record| !record.matches(callback, instrument));
        let removed = before - records.len();
        if removed > 0 {
            tracing::debug!("Removed {} observer callback(s) for {}", removed, instrument.descriptor.name);
        }
        removed
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every registered callback once, in registration order, and commit
    /// each callback's measurements to its instrument stamped with
    /// `collection_ts`.
    ///
    /// A callback that errors or panics has its measurements discarded; the
    /// remaining callbacks still run and the failures are returned together
    /// as [`MetricsError::CallbackFailed`].
    pub fn observe(&self, collection_ts: SystemTime) -> Result<()> {
        let snapshot = self.snapshot();
        let started = Instant::now();
        let mut failures = Vec::new();

        for (callback, instrument) in &snapshot {
            let mut result = ObserverResult::new(&instrument.descriptor);
            let outcome = catch_unwind(AssertUnwindSafe(|| callback(&mut result)));

            let reason = match outcome {
                Ok(Ok(())) => {
                    result.commit(instrument.storage.as_ref(), collection_ts);
                    continue;
                },
                Ok(Err(error)) => format!("{error:#}"),
                Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
            };

            tracing::warn!("Observer callback for {} failed: {}", instrument.descriptor.name, reason);
            failures.push(CallbackFailure {
                instrument: instrument.descriptor.name.clone(),
                reason,
            });
        }

        tracing::debug!(
            "Observed {} callback(s) in {:?}, {} failed",
            snapshot.len(),
            started.elapsed(),
            failures.len()
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(MetricsError::CallbackFailed { failures })
        }
    }

    /// Copy the live registrations, pruning those whose instrument is gone.
    fn snapshot(&self) -> Vec<(ObservableCallback, Arc<ObservableInstrument>)> {
        let mut records = self.records.lock();
        records.retain(|record| record.instrument.strong_count() > 0);
        records
            .iter()
            .filter_map(|record| {
                record
                    .instrument
                    .upgrade()
                    .map(|instrument| (Arc::clone(&record.callback), instrument))
            })
            .collect()
    }
}

/// An asynchronous instrument: descriptor, the storage its callbacks feed
/// and the registry they are registered with.
pub struct ObservableInstrument {
    descriptor: InstrumentDescriptor,
    storage: Arc<dyn AsyncWritableMetricStorage>,
    registry: Arc<ObservableRegistry>,
}

impl ObservableInstrument {
    /// Bind `descriptor` to `storage`; callbacks go through `registry`.
    pub fn new(
        descriptor: InstrumentDescriptor,
        storage: Arc<dyn AsyncWritableMetricStorage>,
        registry: Arc<ObservableRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            descriptor,
            storage,
            registry,
        })
    }

    /// Register `callback` on this instrument.
    pub fn add_callback(self: &Arc<Self>, callback: ObservableCallback) {
        self.registry.add_callback(callback, self);
    }

    /// Remove every registration of `callback` on this instrument.
    pub fn remove_callback(self: &Arc<Self>, callback: &ObservableCallback) -> usize {
        self.registry.remove_callback(callback, self)
    }

    /// Instrument descriptor.
    pub fn descriptor(&self) -> &InstrumentDescriptor {
        &self.descriptor
    }

    /// Storage receiving observed batches.
    pub fn storage(&self) -> &Arc<dyn AsyncWritableMetricStorage> {
        &self.storage
    }
}

impl fmt::Debug for ObservableInstrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableInstrument")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
