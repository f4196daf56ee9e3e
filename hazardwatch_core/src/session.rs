//! Binds a [`TrackingEngine`] to a live [`PositionSource`].
//!
//! The session owns the engine and the subscription. Source callbacks hold
//! only a weak reference to the engine plus a shared "detached" flag, so once
//! [`TrackingSession::teardown`] returns (or the session is dropped) no late
//! delivery can touch the engine again.
//!
//! ```text
//! PositionSource ──on_fix──► engine.on_fix ──► watch<TrackSummary>  (latest state)
//!        │                        │
//!        └──on_error──┐           └─ rejected / transition ─┐
//!                     ▼                                      ▼
//!                 SessionEvent::SourceFailed          SessionEvent::*  (mpsc)
//! ```

use crate::error::{FixRejected, SessionError};
use crate::tracking::{TrackState, TrackSummary, TrackingEngine, ZoneTransition};
use crate::zones::Severity;
use hazardwatch_env::{PositionFix, PositionSource, SourceError, SourceOptions, Subscription};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use uuid::Uuid;

/// Diagnostics published by a session.
///
/// Accepted fixes are not published here; their effect is visible through
/// the summary watch channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A fix was dropped; state unchanged
    FixRejected { fix: PositionFix, reason: FixRejected },

    /// The position moved into at least one zone
    ZoneEntered {
        fix: PositionFix,
        severity: Option<Severity>,
    },

    /// The position left the last containing zone
    ZoneExited {
        fix: PositionFix,
        distance_meters: Option<f64>,
    },

    /// The source reported a failure; state unchanged
    SourceFailed(SourceError),

    /// The session was torn down; no further events follow
    Detached,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A tracking engine driven by a position source.
pub struct TrackingSession {
    id: Uuid,
    engine: Arc<Mutex<TrackingEngine>>,
    subscription: Mutex<Option<Subscription>>,
    detached: Arc<AtomicBool>,
    last_source_error: Arc<Mutex<Option<SourceError>>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    summary: Arc<watch::Sender<TrackSummary>>,
}

impl TrackingSession {
    /// Wraps an engine. Returns the session and its event stream.
    ///
    /// The event channel is unbounded. A source that keeps timing out queues
    /// one `SourceFailed` per acquisition timeout, so a caller that is not
    /// interested in events must drop the receiver rather than hold it
    /// undrained. Once the receiver is gone events are discarded and the
    /// session keeps tracking.
    pub fn new(engine: TrackingEngine) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (summary, _) = watch::channel(engine.summary());

        let session = Self {
            id: Uuid::new_v4(),
            engine: Arc::new(Mutex::new(engine)),
            subscription: Mutex::new(None),
            detached: Arc::new(AtomicBool::new(false)),
            last_source_error: Arc::new(Mutex::new(None)),
            events,
            summary: Arc::new(summary),
        };
        (session, events_rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Subscribes to `source`.
    ///
    /// # Errors
    /// * `AlreadyAttached` - a subscription is already open
    /// * `TornDown` - the session was torn down
    /// * `Source` - the source refused; also recorded as `last_source_error`
    pub fn attach(&self, source: &dyn PositionSource, options: SourceOptions) -> Result<(), SessionError> {
        let mut slot = lock(&self.subscription);
        if self.detached.load(Ordering::Acquire) {
            return Err(SessionError::TornDown);
        }
        if slot.is_some() {
            return Err(SessionError::AlreadyAttached);
        }

        let fix_handler = FixHandler {
            engine: Arc::downgrade(&self.engine),
            detached: self.detached.clone(),
            events: self.events.clone(),
            summary: self.summary.clone(),
        };
        let error_handler = ErrorHandler {
            detached: self.detached.clone(),
            last_error: self.last_source_error.clone(),
            events: self.events.clone(),
        };

        let subscription = source
            .subscribe(
                options,
                Box::new(move |fix| fix_handler.handle(fix)),
                Box::new(move |err| error_handler.handle(err)),
            )
            .map_err(|err| {
                error!(session = %self.id, %err, "source refused subscription");
                *lock(&self.last_source_error) = Some(err.clone());
                SessionError::Source(err)
            })?;

        info!(session = %self.id, subscription = %subscription.id(), "session attached");
        *slot = Some(subscription);
        Ok(())
    }

    /// Unsubscribes from the source. Safe to call repeatedly or from several
    /// threads; only the first call does anything and returns true.
    pub fn teardown(&self) -> bool {
        if self.detached.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some(subscription) = lock(&self.subscription).take() {
            subscription.cancel();
        }
        // Wait out a fix handler that passed the detached check before the swap
        drop(lock(&self.engine));
        let _ = self.events.send(SessionEvent::Detached);
        info!(session = %self.id, "session torn down");
        true
    }

    pub fn is_attached(&self) -> bool {
        !self.detached.load(Ordering::Acquire) && lock(&self.subscription).is_some()
    }

    /// Latest summary.
    pub fn summary(&self) -> TrackSummary {
        self.summary.borrow().clone()
    }

    /// Receiver that observes every summary change.
    pub fn watch_summary(&self) -> watch::Receiver<TrackSummary> {
        self.summary.subscribe()
    }

    /// Owned copy of the full state, trail included.
    pub fn snapshot(&self) -> TrackState {
        lock(&self.engine).snapshot()
    }

    /// Runs `f` with read-only access to the engine.
    pub fn with_engine<R>(&self, f: impl FnOnce(&TrackingEngine) -> R) -> R {
        f(&lock(&self.engine))
    }

    /// Clears track state (e.g. when a new tracking run starts).
    pub fn reset(&self) {
        let mut engine = lock(&self.engine);
        engine.reset();
        self.summary.send_replace(engine.summary());
    }

    /// The most recent source failure, if any.
    pub fn last_source_error(&self) -> Option<SourceError> {
        lock(&self.last_source_error).clone()
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// State captured by the fix callback.
struct FixHandler {
    engine: Weak<Mutex<TrackingEngine>>,
    detached: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<SessionEvent>,
    summary: Arc<watch::Sender<TrackSummary>>,
}

impl FixHandler {
    fn handle(&self, fix: PositionFix) {
        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        let mut engine = lock(&engine);
        // Checked under the engine lock so teardown cannot race a late fix
        if self.detached.load(Ordering::Acquire) {
            return;
        }

        match engine.on_fix(fix) {
            Ok(outcome) => {
                self.summary.send_replace(engine.summary());
                let event = match outcome.transition {
                    Some(ZoneTransition::Entered) => Some(SessionEvent::ZoneEntered {
                        fix,
                        severity: outcome.containment.active_severity,
                    }),
                    Some(ZoneTransition::Exited) => Some(SessionEvent::ZoneExited {
                        fix,
                        distance_meters: outcome.containment.nearest_boundary_distance_meters(),
                    }),
                    None => None,
                };
                if let Some(event) = event {
                    let _ = self.events.send(event);
                }
            }
            Err(reason) => {
                self.summary.send_replace(engine.summary());
                let _ = self.events.send(SessionEvent::FixRejected { fix, reason });
            }
        }
    }
}

/// State captured by the error callback.
struct ErrorHandler {
    detached: Arc<AtomicBool>,
    last_error: Arc<Mutex<Option<SourceError>>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl ErrorHandler {
    fn handle(&self, err: SourceError) {
        if self.detached.load(Ordering::Acquire) {
            return;
        }
        error!(%err, transient = err.is_transient(), "position source failed");
        *lock(&self.last_error) = Some(err.clone());
        let _ = self.events.send(SessionEvent::SourceFailed(err));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{destination_point, Coordinate};
    use crate::zones::ZoneCatalog;
    use hazardwatch_env::{ChannelSource, ManualSource};
    use std::thread;
    use std::time::Duration;

    const CORE: Coordinate = Coordinate {
        latitude: 19.0493847,
        longitude: 72.8941718,
    };

    fn session() -> (TrackingSession, mpsc::UnboundedReceiver<SessionEvent>) {
        TrackingSession::new(TrackingEngine::new(ZoneCatalog::builtin()))
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[test]
    fn test_fixes_flow_into_engine() {
        let source = ManualSource::new();
        let (session, mut events) = session();
        session.attach(&source, SourceOptions::default()).unwrap();

        source.emit(PositionFix::new(CORE.latitude, CORE.longitude, 1));

        let summary = session.summary();
        assert!(summary.inside_any_zone);
        assert_eq!(summary.trail_len, 1);
        assert!(matches!(
            drain(&mut events).as_slice(),
            [SessionEvent::ZoneEntered { severity: Some(Severity::VeryHigh), .. }]
        ));
    }

    #[test]
    fn test_rejected_fix_is_reported_not_applied() {
        let source = ManualSource::new();
        let (session, mut events) = session();
        session.attach(&source, SourceOptions::default()).unwrap();

        source.emit(PositionFix::new(CORE.latitude, CORE.longitude, 1));
        drain(&mut events);
        source.emit(PositionFix::new(200.0, 0.0, 2));

        let summary = session.summary();
        assert!(summary.inside_any_zone);
        assert_eq!(summary.trail_len, 1);
        assert_eq!(summary.rejected_count, 1);
        assert!(matches!(
            drain(&mut events).as_slice(),
            [SessionEvent::FixRejected { reason: FixRejected::LatitudeOutOfRange(_), .. }]
        ));
    }

    #[test]
    fn test_source_error_leaves_state_untouched() {
        let source = ManualSource::new();
        let (session, mut events) = session();
        session.attach(&source, SourceOptions::default()).unwrap();
        source.emit(PositionFix::new(CORE.latitude, CORE.longitude, 1));
        drain(&mut events);
        let before = session.snapshot();

        source.fail(SourceError::unavailable("gnss offline"));

        assert_eq!(session.snapshot(), before);
        assert_eq!(session.last_source_error(), Some(SourceError::unavailable("gnss offline")));
        assert_eq!(
            drain(&mut events),
            vec![SessionEvent::SourceFailed(SourceError::unavailable("gnss offline"))]
        );
    }

    #[test]
    fn test_refused_subscription_surfaces_error() {
        let source = ManualSource::new();
        source.refuse_subscriptions(Some(SourceError::PermissionDenied));
        let (session, _events) = session();

        let err = session.attach(&source, SourceOptions::default()).unwrap_err();
        assert!(matches!(err, SessionError::Source(SourceError::PermissionDenied)));
        assert_eq!(session.last_source_error(), Some(SourceError::PermissionDenied));
        assert!(!session.is_attached());
    }

    #[test]
    fn test_double_attach_rejected() {
        let source = ManualSource::new();
        let (session, _events) = session();
        session.attach(&source, SourceOptions::default()).unwrap();
        assert!(matches!(
            session.attach(&source, SourceOptions::default()),
            Err(SessionError::AlreadyAttached)
        ));
    }

    #[test]
    fn test_teardown_is_exactly_once_and_stops_delivery() {
        let source = ManualSource::new();
        let (session, mut events) = session();
        session.attach(&source, SourceOptions::default()).unwrap();
        let session = Arc::new(session);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = session.clone();
                thread::spawn(move || session.teardown())
            })
            .collect();
        let wins = handles.into_iter().map(|h| h.join().unwrap()).filter(|w| *w).count();
        assert_eq!(wins, 1);

        assert_eq!(source.subscriber_count(), 0);
        assert_eq!(source.emit(PositionFix::new(CORE.latitude, CORE.longitude, 1)), 0);
        assert_eq!(session.summary().trail_len, 0);
        assert_eq!(drain(&mut events), vec![SessionEvent::Detached]);
        assert!(matches!(
            session.attach(&source, SourceOptions::default()),
            Err(SessionError::TornDown)
        ));
    }

    #[test]
    fn test_dropped_session_releases_subscription() {
        let source = ManualSource::new();
        {
            let (session, _events) = session();
            session.attach(&source, SourceOptions::default()).unwrap();
            assert_eq!(source.subscriber_count(), 1);
        }
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn test_tracking_continues_after_event_receiver_dropped() {
        let source = ManualSource::new();
        let (session, events) = session();
        session.attach(&source, SourceOptions::default()).unwrap();
        drop(events);

        for _ in 0..100 {
            source.fail(SourceError::Timeout(Duration::from_millis(5)));
        }
        source.emit(PositionFix::new(CORE.latitude, CORE.longitude, 1));

        let summary = session.summary();
        assert!(summary.inside_any_zone);
        assert_eq!(summary.trail_len, 1);
        assert_eq!(session.last_source_error(), Some(SourceError::Timeout(Duration::from_millis(5))));
    }

    #[test]
    fn test_reset_publishes_empty_summary() {
        let source = ManualSource::new();
        let (session, _events) = session();
        session.attach(&source, SourceOptions::default()).unwrap();
        source.emit(PositionFix::new(CORE.latitude, CORE.longitude, 1));

        session.reset();
        assert_eq!(session.summary(), TrackSummary::default());
        assert_eq!(session.snapshot().trail.len(), 0);
    }

    #[tokio::test]
    async fn test_channel_source_end_to_end() {
        let (source, sender) = ChannelSource::new();
        let (session, mut events) = session();
        let mut summaries = session.watch_summary();
        session.attach(&source, SourceOptions::default()).unwrap();

        let outside = destination_point(&CORE, 180.0, 2_000.0);
        sender.send_fix(PositionFix::new(CORE.latitude, CORE.longitude, 1)).unwrap();
        sender.send_fix(PositionFix::new(outside.latitude, outside.longitude, 2)).unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                summaries.changed().await.unwrap();
                if summaries.borrow().trail_len == 2 {
                    break;
                }
            }
        })
        .await
        .unwrap();

        assert!(!session.summary().inside_any_zone);
        let first = events.recv().await.unwrap();
        let second = events.recv().await.unwrap();
        assert!(matches!(first, SessionEvent::ZoneEntered { .. }));
        assert!(matches!(second, SessionEvent::ZoneExited { .. }));

        assert!(session.teardown());
        assert!(!session.teardown());
    }
}
