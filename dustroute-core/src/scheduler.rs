//! Cooperative scheduling of refresh cycles.
//!
//! At most one cycle is in flight. A periodic tick arriving while a cycle runs
//! is skipped; a manual trigger aborts the running cycle and starts a new one.
//! Each cycle is tagged with a generation number, and only the outcome of the
//! latest generation is ever handed back to the caller.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::service::{DustrouteService, RefreshError, RefreshReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What asked for a refresh.
pub enum Trigger {
    /// User action; supersedes a running cycle.
    Manual,
    /// Timer tick; skipped while a cycle runs.
    Periodic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What the scheduler did with a trigger.
pub enum TriggerDecision {
    /// A new cycle was started.
    Started(u64),
    /// The running cycle was aborted in favour of a new one.
    Superseded {
        /// Generation that was aborted.
        cancelled: u64,
        /// Generation that was started.
        started: u64,
    },
    /// A cycle is already running; nothing was started.
    Skipped,
}

#[derive(Debug)]
/// Result of a finished cycle, tagged with its generation.
pub struct CycleOutcome {
    /// Generation that produced this outcome.
    pub generation: u64,
    /// What started the cycle.
    pub trigger: Trigger,
    /// Report or error of the cycle.
    pub result: Result<RefreshReport, RefreshError>,
}

/// Spawned cycle whose outcome has not been accepted yet.
struct RunningCycle {
    handle: JoinHandle<()>,
    delivered: Arc<AtomicBool>,
}

impl RunningCycle {
    /// The task ended without sending an outcome, e.g. after a panic.
    fn is_lost(&self) -> bool {
        self.handle.is_finished() && !self.delivered.load(Ordering::SeqCst)
    }
}

/// Spawns refresh cycles and filters out results of superseded ones.
pub struct RefreshScheduler {
    service: Arc<DustrouteService>,
    outcomes: UnboundedSender<CycleOutcome>,
    generation: u64,
    in_flight: Option<RunningCycle>,
}

impl RefreshScheduler {
    /// Create a scheduler and the receiving end of its outcome channel.
    #[must_use]
    pub fn new(service: Arc<DustrouteService>) -> (Self, UnboundedReceiver<CycleOutcome>) {
        let (outcomes, receiver) = unbounded_channel();
        let scheduler = Self {
            service,
            outcomes,
            generation: 0,
            in_flight: None,
        };
        (scheduler, receiver)
    }

    /// Generation of the most recently started cycle.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a cycle has been started and its outcome not yet accepted.
    ///
    /// A cycle whose task died without an outcome no longer counts.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.as_ref().is_some_and(|cycle| !cycle.is_lost())
    }

    /// Handle a refresh request.
    pub fn trigger(&mut self, trigger: Trigger) -> TriggerDecision {
        match (self.in_flight.take(), trigger) {
            (None, _) => TriggerDecision::Started(self.spawn(trigger)),
            (Some(cycle), Trigger::Periodic) if cycle.is_lost() => {
                warn!(generation = self.generation, "cycle ended without an outcome, restarting");
                TriggerDecision::Started(self.spawn(trigger))
            }
            (Some(cycle), Trigger::Periodic) => {
                debug!(generation = self.generation, "cycle in flight, skipping tick");
                self.in_flight = Some(cycle);
                TriggerDecision::Skipped
            }
            (Some(cycle), Trigger::Manual) => {
                let cancelled = self.generation;
                cycle.handle.abort();
                info!(generation = cancelled, "superseding in-flight cycle");
                let started = self.spawn(trigger);
                TriggerDecision::Superseded { cancelled, started }
            }
        }
    }

    /// Take a finished cycle's outcome.
    ///
    /// Returns `None` for outcomes of superseded generations, which must be
    /// dropped by the caller.
    pub fn accept(&mut self, outcome: CycleOutcome) -> Option<Result<RefreshReport, RefreshError>> {
        if outcome.generation != self.generation {
            debug!(
                stale = outcome.generation,
                current = self.generation,
                "discarding superseded cycle outcome"
            );
            return None;
        }
        self.in_flight = None;
        Some(outcome.result)
    }

    /// Abort the running cycle, if any.
    pub fn cancel(&mut self) {
        if let Some(cycle) = self.in_flight.take() {
            cycle.handle.abort();
        }
    }

    /// Run cycles on a fixed period until `shutdown` resolves.
    ///
    /// The first cycle starts immediately. Every accepted outcome is passed to
    /// `on_outcome`.
    pub async fn run_periodic<S, F>(
        &mut self,
        receiver: &mut UnboundedReceiver<CycleOutcome>,
        period: Duration,
        shutdown: S,
        mut on_outcome: F,
    ) where
        S: Future<Output = ()>,
        F: FnMut(Result<RefreshReport, RefreshError>),
    {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.trigger(Trigger::Periodic);
                }
                Some(outcome) = receiver.recv() => {
                    if let Some(result) = self.accept(outcome) {
                        on_outcome(result);
                    }
                }
            }
        }

        self.cancel();
    }

    fn spawn(&mut self, trigger: Trigger) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        let service = Arc::clone(&self.service);
        let outcomes = self.outcomes.clone();
        let delivered = Arc::new(AtomicBool::new(false));
        let sent = Arc::clone(&delivered);

        debug!(generation, ?trigger, "starting refresh cycle");
        let handle = tokio::spawn(async move {
            let result = service.refresh().await;
            let outcome = CycleOutcome {
                generation,
                trigger,
                result,
            };
            sent.store(true, Ordering::SeqCst);
            if outcomes.send(outcome).is_err() {
                debug!(generation, "outcome receiver dropped");
            }
        });
        self.in_flight = Some(RunningCycle { handle, delivered });

        generation
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::model::{FillLevel, GeoPoint, RouteLeg};
    use crate::ports::{PortError, RoutePort};
    use crate::service::RouteSettings;
    use crate::testing::{StaticBins, point, reading};

    /// Router that blocks every leg until a permit is released.
    struct GatedRoutes {
        gate: Semaphore,
        started: AtomicUsize,
    }

    #[async_trait]
    impl RoutePort for GatedRoutes {
        async fn leg(&self, _start: GeoPoint, _end: GeoPoint) -> RouteLeg {
            self.started.fetch_add(1, Ordering::SeqCst);
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
            RouteLeg::Unavailable
        }
    }

    fn gated_service() -> (Arc<DustrouteService>, Arc<GatedRoutes>) {
        let routes = Arc::new(GatedRoutes {
            gate: Semaphore::new(0),
            started: AtomicUsize::new(0),
        });
        let bins = StaticBins::new(vec![reading("hot", 16.70, 74.24, 95)]);
        let settings = RouteSettings {
            base: point(16.705, 74.243),
            threshold: FillLevel::default(),
        };
        let service = DustrouteService::new(Arc::new(bins), Arc::<GatedRoutes>::clone(&routes), settings);
        (Arc::new(service), routes)
    }

    #[tokio::test]
    async fn periodic_tick_is_skipped_while_in_flight() {
        let (service, routes) = gated_service();
        let (mut scheduler, mut receiver) = RefreshScheduler::new(service);

        assert_eq!(scheduler.trigger(Trigger::Manual), TriggerDecision::Started(1));
        assert_eq!(scheduler.trigger(Trigger::Periodic), TriggerDecision::Skipped);

        routes.gate.add_permits(1);
        let outcome = receiver.recv().await.expect("cycle finishes");
        assert_eq!(outcome.generation, 1);
        let report = scheduler
            .accept(outcome)
            .expect("current generation accepted")
            .expect("refresh succeeds");
        assert_eq!(report.path().map(|path| path.fallback_legs()), Some(1));
        assert!(!scheduler.is_in_flight(), "cycle still marked in flight");

        assert_eq!(scheduler.trigger(Trigger::Periodic), TriggerDecision::Started(2));
        scheduler.cancel();
    }

    #[tokio::test]
    async fn manual_trigger_supersedes_running_cycle() {
        let (service, routes) = gated_service();
        let (mut scheduler, mut receiver) = RefreshScheduler::new(service);

        scheduler.trigger(Trigger::Periodic);
        while routes.started.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            scheduler.trigger(Trigger::Manual),
            TriggerDecision::Superseded {
                cancelled: 1,
                started: 2
            }
        );

        routes.gate.add_permits(2);
        let outcome = receiver.recv().await.expect("cycle finishes");
        assert_eq!(outcome.generation, 2, "aborted cycle delivered an outcome");
        assert_eq!(outcome.trigger, Trigger::Manual);
        assert!(scheduler.accept(outcome).is_some(), "latest outcome dropped");
    }

    #[tokio::test]
    async fn stale_outcomes_are_discarded() {
        let (service, routes) = gated_service();
        let (mut scheduler, _receiver) = RefreshScheduler::new(service);
        scheduler.trigger(Trigger::Manual);
        scheduler.trigger(Trigger::Manual);

        let stale = CycleOutcome {
            generation: 1,
            trigger: Trigger::Manual,
            result: Err(RefreshError::Source(PortError::NoRoute)),
        };

        assert!(scheduler.accept(stale).is_none(), "stale outcome accepted");
        assert!(scheduler.is_in_flight(), "current cycle forgotten");
        routes.gate.add_permits(1);
    }

    /// Router whose cycle task dies mid-flight when no answer is scripted.
    struct CrashingRoutes {
        answer: Option<RouteLeg>,
    }

    #[async_trait]
    impl RoutePort for CrashingRoutes {
        async fn leg(&self, _start: GeoPoint, _end: GeoPoint) -> RouteLeg {
            self.answer.clone().expect("router crashed")
        }
    }

    #[tokio::test]
    async fn periodic_tick_restarts_after_lost_cycle() {
        let bins = StaticBins::new(vec![reading("hot", 16.70, 74.24, 95)]);
        let settings = RouteSettings {
            base: point(16.705, 74.243),
            threshold: FillLevel::default(),
        };
        let routes = Arc::new(CrashingRoutes { answer: None });
        let service = DustrouteService::new(Arc::new(bins), routes, settings);
        let (mut scheduler, _receiver) = RefreshScheduler::new(Arc::new(service));

        assert_eq!(scheduler.trigger(Trigger::Periodic), TriggerDecision::Started(1));
        while scheduler
            .in_flight
            .as_ref()
            .is_some_and(|cycle| !cycle.handle.is_finished())
        {
            tokio::task::yield_now().await;
        }

        assert!(!scheduler.is_in_flight(), "dead cycle still in flight");
        assert_eq!(scheduler.trigger(Trigger::Periodic), TriggerDecision::Started(2));
        scheduler.cancel();
    }
}
