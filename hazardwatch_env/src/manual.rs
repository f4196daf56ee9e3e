//! Caller-driven position source for tests and deterministic simulation.

use crate::error::SourceError;
use crate::source::{CancelFlag, ErrorCallback, FixCallback, PositionSource, SourceOptions, Subscription};
use crate::types::{PositionFix, SubscriptionId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct Subscriber {
    flag: CancelFlag,
    options: SourceOptions,
    on_fix: FixCallback,
    on_error: ErrorCallback,
}

#[derive(Default)]
struct ManualInner {
    subscribers: Vec<Subscriber>,
    refusal: Option<SourceError>,
    next_seed: u64,
}

/// A position source that delivers exactly what the caller tells it to.
///
/// Delivery is synchronous: [`emit`](Self::emit) returns after every live
/// subscriber has processed the fix. Subscription IDs are derived from a
/// counter so runs are reproducible.
///
/// Callbacks run without the internal lock held, so a callback may cancel
/// its own subscription or subscribe again.
#[derive(Clone, Default)]
pub struct ManualSource {
    inner: Arc<Mutex<ManualInner>>,
}

impl ManualSource {
    /// Creates a source with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ManualInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every future `subscribe` fail with `error` (`None` to allow again).
    pub fn refuse_subscriptions(&self, error: Option<SourceError>) {
        self.lock().refusal = error;
    }

    /// Delivers a fix to every live subscriber. Returns the delivery count.
    pub fn emit(&self, fix: PositionFix) -> usize {
        self.deliver(|sub| (sub.on_fix)(fix))
    }

    /// Reports a failure to every live subscriber. Returns the delivery count.
    pub fn fail(&self, error: SourceError) -> usize {
        self.deliver(|sub| (sub.on_error)(error.clone()))
    }

    /// Number of subscribers that have not been cancelled.
    pub fn subscriber_count(&self) -> usize {
        self.lock()
            .subscribers
            .iter()
            .filter(|s| !s.flag.is_cancelled())
            .count()
    }

    /// Options requested by the most recent live subscriber.
    pub fn last_options(&self) -> Option<SourceOptions> {
        self.lock()
            .subscribers
            .iter()
            .rev()
            .find(|s| !s.flag.is_cancelled())
            .map(|s| s.options)
    }

    fn deliver(&self, mut f: impl FnMut(&mut Subscriber)) -> usize {
        let mut batch = std::mem::take(&mut self.lock().subscribers);
        batch.retain(|s| !s.flag.is_cancelled());

        let mut delivered = 0;
        for sub in batch.iter_mut() {
            // A previous callback in this batch may have cancelled this one
            let flag = sub.flag.clone();
            if flag.deliver(|| f(sub)) {
                delivered += 1;
            }
        }

        let mut inner = self.lock();
        let added = std::mem::take(&mut inner.subscribers);
        batch.extend(added);
        batch.retain(|s| !s.flag.is_cancelled());
        inner.subscribers = batch;
        delivered
    }
}

impl PositionSource for ManualSource {
    fn subscribe(
        &self,
        options: SourceOptions,
        on_fix: FixCallback,
        on_error: ErrorCallback,
    ) -> Result<Subscription, SourceError> {
        let mut inner = self.lock();
        if let Some(err) = &inner.refusal {
            return Err(err.clone());
        }

        let id = SubscriptionId::from_seed(inner.next_seed);
        inner.next_seed += 1;

        let flag = CancelFlag::new();
        inner.subscribers.push(Subscriber {
            flag: flag.clone(),
            options,
            on_fix,
            on_error,
        });

        Ok(Subscription::new(id, flag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording_subscription(
        source: &ManualSource,
    ) -> (Subscription, Arc<Mutex<Vec<PositionFix>>>, Arc<Mutex<Vec<SourceError>>>) {
        let fixes = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let (f, e) = (fixes.clone(), errors.clone());
        let sub = source
            .subscribe(
                SourceOptions::default(),
                Box::new(move |fix| f.lock().unwrap().push(fix)),
                Box::new(move |err| e.lock().unwrap().push(err)),
            )
            .unwrap();
        (sub, fixes, errors)
    }

    #[test]
    fn test_emit_reaches_subscriber_in_order() {
        let source = ManualSource::new();
        let (_sub, fixes, _) = recording_subscription(&source);

        source.emit(PositionFix::new(1.0, 2.0, 10));
        source.emit(PositionFix::new(3.0, 4.0, 20));

        let got = fixes.lock().unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].timestamp_ms, 10);
        assert_eq!(got[1].timestamp_ms, 20);
    }

    #[test]
    fn test_cancelled_subscription_receives_nothing() {
        let source = ManualSource::new();
        let (sub, fixes, errors) = recording_subscription(&source);

        sub.cancel();
        assert_eq!(source.emit(PositionFix::new(1.0, 2.0, 10)), 0);
        assert_eq!(source.fail(SourceError::Closed), 0);

        assert!(fixes.lock().unwrap().is_empty());
        assert!(errors.lock().unwrap().is_empty());
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn test_fail_reaches_error_callback() {
        let source = ManualSource::new();
        let (_sub, _, errors) = recording_subscription(&source);

        source.fail(SourceError::PermissionDenied);
        assert_eq!(*errors.lock().unwrap(), vec![SourceError::PermissionDenied]);
    }

    #[test]
    fn test_refusal() {
        let source = ManualSource::new();
        source.refuse_subscriptions(Some(SourceError::PermissionDenied));

        let result = source.subscribe(SourceOptions::default(), Box::new(|_| {}), Box::new(|_| {}));
        assert_eq!(result.unwrap_err(), SourceError::PermissionDenied);

        source.refuse_subscriptions(None);
        let result = source.subscribe(SourceOptions::default(), Box::new(|_| {}), Box::new(|_| {}));
        assert!(result.is_ok());
    }

    #[test]
    fn test_callback_may_cancel_itself() {
        let source = ManualSource::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let inner_slot = slot.clone();

        let sub = source
            .subscribe(
                SourceOptions::default(),
                Box::new(move |_| {
                    if let Some(sub) = inner_slot.lock().unwrap().as_ref() {
                        sub.cancel();
                    }
                }),
                Box::new(|_| {}),
            )
            .unwrap();
        *slot.lock().unwrap() = Some(sub);

        assert_eq!(source.emit(PositionFix::new(0.0, 0.0, 0)), 1);
        assert_eq!(source.emit(PositionFix::new(0.0, 0.0, 1)), 0);
    }
}
