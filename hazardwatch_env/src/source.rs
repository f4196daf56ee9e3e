//! Position source abstraction for HazardWatch engines.

use crate::error::SourceError;
use crate::types::{PositionFix, SubscriptionId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;
use tracing::debug;

/// Callback invoked for every fix the source produces.
pub type FixCallback = Box<dyn FnMut(PositionFix) + Send + 'static>;

/// Callback invoked when the source fails.
pub type ErrorCallback = Box<dyn FnMut(SourceError) + Send + 'static>;

/// Sampling options requested when opening a subscription.
///
/// These only affect how the source samples. They never change how the
/// engine interprets the fixes it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceOptions {
    /// Ask the sensor for its best accuracy (more power, less noise)
    pub high_accuracy: bool,

    /// Maximum age of a cached fix the source may hand out on subscribe.
    /// Zero means "always acquire a fresh fix".
    pub max_fix_age: Duration,

    /// How long the source waits for a fix before reporting
    /// [`SourceError::Timeout`]. Zero disables the timeout.
    pub acquisition_timeout: Duration,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            max_fix_age: Duration::ZERO,
            acquisition_timeout: Duration::from_secs(5),
        }
    }
}

/// Abstraction for anything that emits position fixes.
///
/// # Implementations
///
/// - **Production**: [`ChannelSource`](crate::ChannelSource) - Tokio channel fed by a sensor bridge
/// - **Simulation**: [`ManualSource`](crate::ManualSource) - synchronous, caller-driven
///
/// # Delivery contract
///
/// ```text
/// Source                         Subscriber
///   |-- on_fix(fix) ---------------->|   one at a time, never overlapping
///   |-- on_error(err) -------------->|   fix stream may continue afterwards
///   |                                |
///   |<------------- cancel() --------|   no callback runs after cancel returns
/// ```
///
/// `cancel` blocks while a callback for the same subscription is running on
/// another thread. Called from inside one of its own callbacks it returns at
/// once, and that callback is the last one delivered.
pub trait PositionSource: Send + Sync {
    /// Opens a subscription.
    ///
    /// # Returns
    /// * `Ok(Subscription)` - Callbacks are registered; cancel to stop delivery
    /// * `Err(SourceError)` - The source refused immediately (e.g. permission denied)
    fn subscribe(
        &self,
        options: SourceOptions,
        on_fix: FixCallback,
        on_error: ErrorCallback,
    ) -> Result<Subscription, SourceError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct FlagState {
    cancelled: AtomicBool,
    /// Held for the duration of every callback
    delivery: Mutex<()>,
    /// Thread currently inside a callback, if any
    deliverer: Mutex<Option<ThreadId>>,
}

/// Shared cancellation flag between a [`Subscription`] and its source.
///
/// Sources hand every callback invocation to [`deliver`](Self::deliver),
/// which serializes it against cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<FlagState>);

impl CancelFlag {
    /// Creates a new, un-cancelled flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once the owning subscription was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::Acquire)
    }

    /// Runs `callback` unless the subscription is cancelled.
    ///
    /// Returns false, without calling it, once cancelled. A cancel issued
    /// from another thread while `callback` runs waits for it to return.
    pub fn deliver(&self, callback: impl FnOnce()) -> bool {
        let _gate = lock(&self.0.delivery);
        if self.is_cancelled() {
            return false;
        }
        *lock(&self.0.deliverer) = Some(thread::current().id());
        callback();
        *lock(&self.0.deliverer) = None;
        true
    }

    /// Sets the flag. Returns true only for the call that flipped it.
    fn trip(&self) -> bool {
        !self.0.cancelled.swap(true, Ordering::AcqRel)
    }

    /// Blocks until no callback is running, unless the caller is that callback.
    fn wait_for_delivery(&self) {
        if *lock(&self.0.deliverer) == Some(thread::current().id()) {
            return;
        }
        drop(lock(&self.0.delivery));
    }
}

type CancelHook = Box<dyn FnOnce() + Send + 'static>;

/// Handle to an open subscription.
///
/// Cancelling is idempotent and safe from several threads at once: exactly
/// one caller wins and runs the source's teardown hook. Dropping the handle
/// cancels it.
pub struct Subscription {
    id: SubscriptionId,
    flag: CancelFlag,
    hook: Mutex<Option<CancelHook>>,
}

impl Subscription {
    /// Creates a subscription bound to `flag`.
    pub fn new(id: SubscriptionId, flag: CancelFlag) -> Self {
        Self {
            id,
            flag,
            hook: Mutex::new(None),
        }
    }

    /// Registers a hook that runs once, on the first cancel.
    pub fn with_hook(self, hook: impl FnOnce() + Send + 'static) -> Self {
        *lock(&self.hook) = Some(Box::new(hook));
        self
    }

    /// Returns the subscription ID.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stops delivery. Once this returns no callback is running or will run,
    /// except when called from inside the subscription's own callback.
    ///
    /// Returns true if this call performed the cancellation, false if the
    /// subscription was already cancelled.
    pub fn cancel(&self) -> bool {
        let won = self.flag.trip();
        if won {
            let hook = lock(&self.hook).take();
            if let Some(hook) = hook {
                hook();
            }
            debug!(subscription = %self.id, "subscription cancelled");
        }
        self.flag.wait_for_delivery();
        won
    }

    /// Returns true once cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.flag.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
