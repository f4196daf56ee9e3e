//! Tokio channel-backed position source.
//!
//! Whatever owns the real sensor (a GNSS daemon reader, a platform bridge,
//! a replay file) pushes fixes through a [`FixSender`]. A background task
//! forwards them to the single active subscriber and enforces the
//! acquisition timeout.

use crate::error::SourceError;
use crate::source::{CancelFlag, ErrorCallback, FixCallback, PositionSource, SourceOptions, Subscription};
use crate::types::{PositionFix, SubscriptionId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

/// A message travelling from the producer to the source task.
#[derive(Debug, Clone)]
enum SourceSignal {
    Fix(PositionFix),
    Error(SourceError),
}

/// Producer half of a [`ChannelSource`].
#[derive(Debug, Clone)]
pub struct FixSender {
    tx: mpsc::UnboundedSender<SourceSignal>,
}

impl FixSender {
    /// Queues a fix for delivery.
    ///
    /// # Returns
    /// * `Err(SourceError::Closed)` - The source was dropped
    pub fn send_fix(&self, fix: PositionFix) -> Result<(), SourceError> {
        self.tx
            .send(SourceSignal::Fix(fix))
            .map_err(|_| SourceError::Closed)
    }

    /// Queues a failure for delivery (e.g. the sensor reported an error).
    pub fn send_error(&self, error: SourceError) -> Result<(), SourceError> {
        self.tx
            .send(SourceSignal::Error(error))
            .map_err(|_| SourceError::Closed)
    }
}

type CachedFix = Option<(PositionFix, Instant)>;

/// Position source fed through an unbounded Tokio channel.
///
/// Only one subscription can be active at a time. After it is cancelled the
/// receiver returns to the source and a new subscription may be opened.
/// Must be subscribed from within a Tokio runtime.
pub struct ChannelSource {
    rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<SourceSignal>>>>,
    last_fix: Arc<Mutex<CachedFix>>,
}

impl ChannelSource {
    /// Creates a source and the sender that feeds it.
    pub fn new() -> (Self, FixSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Self {
            rx: Arc::new(Mutex::new(Some(rx))),
            last_fix: Arc::new(Mutex::new(None)),
        };
        (source, FixSender { tx })
    }

    fn cached_fix(&self, max_age: Duration) -> Option<PositionFix> {
        if max_age.is_zero() {
            return None;
        }
        let cache = *lock(&self.last_fix);
        cache
            .filter(|(_, seen)| seen.elapsed() <= max_age)
            .map(|(fix, _)| fix)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PositionSource for ChannelSource {
    fn subscribe(
        &self,
        options: SourceOptions,
        mut on_fix: FixCallback,
        mut on_error: ErrorCallback,
    ) -> Result<Subscription, SourceError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| SourceError::unavailable("channel source requires a Tokio runtime"))?;

        let mut rx = lock(&self.rx)
            .take()
            .ok_or_else(|| SourceError::unavailable("channel source already has a subscriber"))?;

        let id = SubscriptionId::new();
        let flag = CancelFlag::new();
        let stop = Arc::new(Notify::new());
        let replay = self.cached_fix(options.max_fix_age);

        let task_flag = flag.clone();
        let task_stop = stop.clone();
        let slot = self.rx.clone();
        let cache = self.last_fix.clone();
        let timeout = options.acquisition_timeout;

        runtime.spawn(async move {
            if let Some(fix) = replay {
                debug!(subscription = %id, "replaying cached fix");
                task_flag.deliver(|| on_fix(fix));
            }

            loop {
                let next = async {
                    if timeout.is_zero() {
                        Ok(rx.recv().await)
                    } else {
                        tokio::time::timeout(timeout, rx.recv()).await
                    }
                };

                tokio::select! {
                    _ = task_stop.notified() => break,
                    received = next => {
                        // Every callback goes through the flag so cancel can wait it out
                        let delivered = match received {
                            Ok(Some(SourceSignal::Fix(fix))) => {
                                *lock(&cache) = Some((fix, Instant::now()));
                                task_flag.deliver(|| on_fix(fix))
                            }
                            Ok(Some(SourceSignal::Error(err))) => task_flag.deliver(|| on_error(err)),
                            Ok(None) => {
                                warn!(subscription = %id, "producer dropped, closing source");
                                task_flag.deliver(|| on_error(SourceError::Closed));
                                break;
                            }
                            Err(_) => task_flag.deliver(|| on_error(SourceError::Timeout(timeout))),
                        };
                        if !delivered {
                            break;
                        }
                    }
                }
            }

            *lock(&slot) = Some(rx);
            debug!(subscription = %id, "channel source task finished");
        });

        Ok(Subscription::new(id, flag).with_hook(move || stop.notify_one()))
    }
}
