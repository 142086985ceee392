use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::board::FetchTrigger;
use crate::events::{FetchUpdate, Outage, OutageKind};
use crate::feed::probe::{self, ProbeTarget};
use crate::feed::{FeedClient, TripFilter, build_services};
use crate::service::DisplayTimeFormatter;
use crate::slot::UpdateSlot;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub stops: Vec<String>,
    /// Minimum spacing between fetch starts.
    pub request_interval: Duration,
    /// Upper bound for one feed round-trip.
    pub timeout: Duration,
    pub probe: Option<ProbeTarget>,
    pub filter: TripFilter,
    pub formatter: DisplayTimeFormatter,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            stops: Vec::new(),
            request_interval: Duration::from_secs(15),
            timeout: Duration::from_secs(10),
            probe: None,
            filter: TripFilter::default(),
            formatter: DisplayTimeFormatter::default(),
        }
    }
}

#[derive(Debug, Default)]
struct FetchState {
    in_flight: bool,
    last_started: Option<Instant>,
    periodic_paused: bool,
}

struct Inner<C> {
    client: C,
    options: FetchOptions,
    state: Mutex<FetchState>,
    slot: UpdateSlot<FetchUpdate>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl<C> Inner<C> {
    fn state(&self) -> MutexGuard<'_, FetchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight flag however the fetch ends, cancellation included.
struct InFlight<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Drop for InFlight<C> {
    fn drop(&mut self) {
        self.inner.state().in_flight = false;
    }
}

/// Background fetcher publishing into the board's update slot.
///
/// At most one fetch runs at a time; callers that lose the race get `false`
/// back and nothing else happens.
pub struct FetchPipeline<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for FetchPipeline<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: FeedClient + 'static> FetchPipeline<C> {
    pub fn new(
        client: C,
        options: FetchOptions,
        slot: UpdateSlot<FetchUpdate>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                options,
                state: Mutex::new(FetchState::default()),
                slot,
                tracker: TaskTracker::new(),
                cancel,
            }),
        }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.inner.options
    }

    pub fn is_in_flight(&self) -> bool {
        self.inner.state().in_flight
    }

    /// No fetch running and the request interval has passed since the last start.
    pub fn is_due(&self) -> bool {
        let state = self.inner.state();
        !state.in_flight
            && state
                .last_started
                .is_none_or(|started| started.elapsed() >= self.inner.options.request_interval)
    }

    /// Hold periodic fetches while `paused`; `schedule` and `fetch_now` still run.
    pub fn pause_periodic(&self, paused: bool) {
        let mut state = self.inner.state();
        if state.periodic_paused != paused {
            state.periodic_paused = paused;
            debug!(paused, "periodic fetching toggled");
        }
    }

    pub fn is_periodic_paused(&self) -> bool {
        self.inner.state().periodic_paused
    }

    fn begin(&self) -> Option<InFlight<C>> {
        if self.inner.cancel.is_cancelled() {
            return None;
        }
        let mut state = self.inner.state();
        if state.in_flight {
            return None;
        }
        state.in_flight = true;
        state.last_started = Some(Instant::now());
        Some(InFlight {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Start a fetch in the background. Returns `false` if one is already running.
    pub fn schedule(&self) -> bool {
        let Some(guard) = self.begin() else {
            return false;
        };
        let pipeline = self.clone();
        self.inner.tracker.spawn(async move {
            let _guard = guard;
            tokio::select! {
                _ = pipeline.inner.cancel.cancelled() => {
                    debug!("in-flight fetch cancelled");
                }
                update = pipeline.fetch_update() => pipeline.publish(update),
            }
        });
        true
    }

    /// Run one fetch on the caller's task and publish it.
    pub async fn fetch_now(&self) -> bool {
        let Some(_guard) = self.begin() else {
            return false;
        };
        let update = self.fetch_update().await;
        self.publish(update);
        true
    }

    /// One round-trip, classified, without touching the slot.
    pub async fn fetch_update(&self) -> FetchUpdate {
        let options = &self.inner.options;
        if let Some(target) = &options.probe {
            if let Err(err) = probe::check(target).await {
                return FetchUpdate::Outage(Outage::new(err.outage_kind(), err.to_string()));
            }
        }

        match timeout(options.timeout, self.inner.client.fetch(&options.stops)).await {
            Ok(Ok(trips)) => {
                let fetched = trips.len();
                let services = build_services(trips, &options.filter, &options.formatter, Utc::now());
                info!(fetched, kept = services.len(), "fetched departures");
                FetchUpdate::Services(services)
            }
            Ok(Err(err)) => {
                warn!(error = %err, kind = %err.outage_kind(), "fetch failed");
                FetchUpdate::Outage(Outage::new(err.outage_kind(), err.to_string()))
            }
            Err(_) => {
                warn!(timeout = ?options.timeout, "fetch timed out");
                FetchUpdate::Outage(Outage::new(
                    OutageKind::UpstreamError,
                    format!(
                        "feed did not answer within {}",
                        humantime::format_duration(options.timeout)
                    ),
                ))
            }
        }
    }

    fn publish(&self, update: FetchUpdate) {
        if let Some(dropped) = self.inner.slot.publish(update) {
            debug!(dropped = %dropped.describe(), "replaced unconsumed update");
        }
    }

    /// Schedule a fetch every request interval until shutdown, starting one interval from now.
    pub fn spawn_periodic(&self) {
        let pipeline = self.clone();
        self.inner.tracker.spawn(async move {
            let period = pipeline.inner.options.request_interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = pipeline.inner.cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if pipeline.is_periodic_paused() {
                            trace!("periodic fetch held");
                        } else if !pipeline.schedule() {
                            debug!("periodic fetch skipped; one is already running");
                        }
                    }
                }
            }
        });
    }

    /// Cancel background work and wait for it to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        debug!("fetch pipeline stopped");
    }
}

impl<C: FeedClient + 'static> FetchTrigger for FetchPipeline<C> {
    fn fetch_due(&self) -> bool {
        self.is_due()
    }

    fn request_fetch(&self) -> bool {
        self.schedule()
    }

    fn pause_periodic(&self, paused: bool) {
        FetchPipeline::pause_periodic(self, paused);
    }
}
