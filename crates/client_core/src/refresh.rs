//! Polling refresh of the held vehicle list.
//!
//! The controller owns the canonical list the dashboard renders. A fetch
//! runs on every poll tick, on manual refresh and after each successful row
//! mutation, but never more than one at a time.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};
use shared::domain::{Vehicle, VehicleId};
use tokio::{
    sync::{broadcast, Notify},
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{client::FleetApi, error::ClientError, DashboardEvent};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const FALLBACK_REFRESH_ERROR: &str = "Failed to refresh vehicles";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Refreshing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Timer,
    Manual,
    Mutation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated { count: usize },
    Failed(String),
    /// A fetch was already in flight; nothing was started.
    Skipped,
    /// A fetch was already in flight. The caller waited until a follow-up
    /// fetch covering its mutation had run or started.
    Queued,
}

/// Point-in-time copy of the controller state for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshSnapshot {
    pub vehicles: Vec<Vehicle>,
    pub error: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub phase: RefreshPhase,
}

struct RefreshState {
    vehicles: Vec<Vehicle>,
    error: Option<String>,
    last_updated: DateTime<Utc>,
    phase: RefreshPhase,
    rerun_requested: bool,
}

pub struct RefreshController {
    api: Arc<dyn FleetApi>,
    poll_interval: Duration,
    state: Mutex<RefreshState>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    idle: Notify,
    events: broadcast::Sender<DashboardEvent>,
}

impl RefreshController {
    /// Seeds the controller with a list fetched elsewhere so the first render
    /// needs no round trip.
    pub fn new(api: Arc<dyn FleetApi>, initial_vehicles: Vec<Vehicle>) -> Arc<Self> {
        Self::with_poll_interval(api, initial_vehicles, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(
        api: Arc<dyn FleetApi>,
        initial_vehicles: Vec<Vehicle>,
        poll_interval: Duration,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            api,
            poll_interval,
            state: Mutex::new(RefreshState {
                vehicles: initial_vehicles,
                error: None,
                last_updated: Utc::now(),
                phase: RefreshPhase::Idle,
                rerun_requested: false,
            }),
            poll_task: Mutex::new(None),
            idle: Notify::new(),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<DashboardEvent> {
        self.events.clone()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Starts the repeating poll task. A running task is replaced, so calling
    /// this twice never doubles the poll rate.
    pub fn start(self: &Arc<Self>) {
        let controller = Arc::downgrade(self);
        let period = self.poll_interval;
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                controller.refresh(RefreshTrigger::Timer).await;
            }
        });

        if let Some(previous) = self.lock_poll_task().replace(task) {
            previous.abort();
        }
        info!(
            interval_ms = period.as_millis() as u64,
            "refresh: polling started"
        );
    }

    pub fn stop(&self) {
        if let Some(task) = self.lock_poll_task().take() {
            task.abort();
            info!("refresh: polling stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.lock_poll_task()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Fetches the vehicle list unless a fetch is already in flight.
    ///
    /// On failure the previously held list stays in place and the error
    /// message is kept until the next successful fetch.
    ///
    /// A `Mutation` trigger arriving mid-fetch queues one follow-up on the
    /// running refresh and waits for it. If that refresh is aborted before
    /// the follow-up runs, the waiting caller runs the fetch itself.
    pub async fn refresh(&self, trigger: RefreshTrigger) -> RefreshOutcome {
        loop {
            let idle = {
                let mut state = self.lock_state();
                if state.phase == RefreshPhase::Idle {
                    state.phase = RefreshPhase::Refreshing;
                    state.rerun_requested = false;
                    break;
                }
                if trigger != RefreshTrigger::Mutation {
                    debug!(?trigger, "refresh: in flight, trigger ignored");
                    return RefreshOutcome::Skipped;
                }
                state.rerun_requested = true;
                debug!(?trigger, "refresh: in flight, follow-up fetch queued");
                self.idle.notified()
            };

            idle.await;
            if !self.lock_state().rerun_requested {
                return RefreshOutcome::Queued;
            }
            debug!("refresh: queued follow-up was dropped, fetching from caller");
        }

        self.run_fetches().await
    }

    async fn run_fetches(&self) -> RefreshOutcome {
        let _ = self
            .events
            .send(DashboardEvent::RefreshPhaseChanged(RefreshPhase::Refreshing));
        let _in_flight = InFlight { controller: self };

        loop {
            let result = self.api.fetch_vehicles().await;
            let outcome = self.apply(result);
            let rerun = std::mem::take(&mut self.lock_state().rerun_requested);
            if !rerun {
                return outcome;
            }
            debug!("refresh: running queued follow-up fetch");
        }
    }

    fn apply(&self, result: Result<Vec<Vehicle>, ClientError>) -> RefreshOutcome {
        match result {
            Ok(vehicles) => {
                let count = vehicles.len();
                let at = Utc::now();
                {
                    let mut state = self.lock_state();
                    state.vehicles = vehicles;
                    state.error = None;
                    state.last_updated = at;
                }
                info!(count, "refresh: vehicle list updated");
                let _ = self.events.send(DashboardEvent::VehiclesUpdated { count, at });
                RefreshOutcome::Updated { count }
            }
            Err(err) => {
                let mut message = err.to_string();
                if message.trim().is_empty() {
                    message = FALLBACK_REFRESH_ERROR.to_string();
                }
                warn!(
                    error = %message,
                    path = err.path(),
                    "refresh: fetch failed, keeping previous list"
                );
                self.lock_state().error = Some(message.clone());
                let _ = self
                    .events
                    .send(DashboardEvent::RefreshFailed(message.clone()));
                RefreshOutcome::Failed(message)
            }
        }
    }

    pub fn vehicles(&self) -> Vec<Vehicle> {
        self.lock_state().vehicles.clone()
    }

    pub fn vehicle(&self, vehicle_id: &VehicleId) -> Option<Vehicle> {
        self.lock_state()
            .vehicles
            .iter()
            .find(|vehicle| &vehicle.id == vehicle_id)
            .cloned()
    }

    pub fn error(&self) -> Option<String> {
        self.lock_state().error.clone()
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.lock_state().last_updated
    }

    pub fn phase(&self) -> RefreshPhase {
        self.lock_state().phase
    }

    pub fn snapshot(&self) -> RefreshSnapshot {
        let state = self.lock_state();
        RefreshSnapshot {
            vehicles: state.vehicles.clone(),
            error: state.error.clone(),
            last_updated: state.last_updated,
            phase: state.phase,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_poll_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.poll_task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RefreshController {
    fn drop(&mut self) {
        let task = self
            .poll_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

/// Returns the controller to `Idle` when a refresh ends, including when the
/// refreshing task is aborted mid-fetch, and wakes queued mutation callers.
/// A follow-up still pending at that point is left flagged for them.
struct InFlight<'a> {
    controller: &'a RefreshController,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.controller.lock_state();
            state.phase = RefreshPhase::Idle;
        }
        self.controller.idle.notify_waiters();
        let _ = self
            .controller
            .events
            .send(DashboardEvent::RefreshPhaseChanged(RefreshPhase::Idle));
    }
}

#[cfg(test)]
#[path = "tests/refresh_tests.rs"]
mod tests;
