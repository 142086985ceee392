use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use departure_board::board::FetchTrigger;
use departure_board::error::FeedError;
use departure_board::events::{FetchUpdate, OutageKind};
use departure_board::feed::probe::ProbeTarget;
use departure_board::feed::{FeedClient, RawTrip};
use departure_board::slot::UpdateSlot;
use departure_board::tasks::fetch::{FetchOptions, FetchPipeline};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy)]
enum Behaviour {
    /// Return one trip per call made so far, in reverse arrival order.
    Trips,
    Fail(fn() -> FeedError),
    /// Block until the gate is notified, then return one trip.
    Gated,
    Hang,
}

#[derive(Clone)]
struct ScriptedFeed {
    behaviour: Behaviour,
    calls: Arc<AtomicUsize>,
    gate: Arc<Notify>,
}

impl ScriptedFeed {
    fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            calls: Arc::new(AtomicUsize::new(0)),
            gate: Arc::new(Notify::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn trip(line: &str, minutes: i64) -> RawTrip {
    RawTrip {
        journey_ref: Some(format!("journey-{line}")),
        line: line.to_string(),
        destination: format!("Terminus {line}"),
        scheduled: Utc::now() + chrono::Duration::minutes(minutes),
        estimated: None,
        cancelled: false,
        current_stop: None,
        forward_stops: Vec::new(),
    }
}

impl FeedClient for ScriptedFeed {
    async fn fetch(&self, _stops: &[String]) -> Result<Vec<RawTrip>, FeedError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.behaviour {
            Behaviour::Trips => Ok((1..=call)
                .rev()
                .map(|n| trip(&n.to_string(), n as i64 * 3))
                .collect()),
            Behaviour::Fail(make) => Err(make()),
            Behaviour::Gated => {
                self.gate.notified().await;
                Ok(vec![trip("1", 5)])
            }
            Behaviour::Hang => {
                std::future::pending::<()>().await;
                Ok(Vec::new())
            }
        }
    }
}

fn pipeline(
    feed: ScriptedFeed,
    options: FetchOptions,
) -> (FetchPipeline<ScriptedFeed>, UpdateSlot<FetchUpdate>) {
    let slot = UpdateSlot::new();
    let pipeline = FetchPipeline::new(feed, options, slot.clone(), CancellationToken::new());
    (pipeline, slot)
}

async fn wait_for_update(slot: &UpdateSlot<FetchUpdate>) -> FetchUpdate {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Some(update) = slot.take() {
                return update;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("update published")
}

fn outage_kind(update: &FetchUpdate) -> Option<OutageKind> {
    match update {
        FetchUpdate::Outage(outage) => Some(outage.kind),
        FetchUpdate::Services(_) => None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn only_one_fetch_runs_at_a_time() {
    let feed = ScriptedFeed::new(Behaviour::Gated);
    let (pipeline, slot) = pipeline(feed.clone(), FetchOptions::default());

    assert!(pipeline.request_fetch());
    assert!(pipeline.is_in_flight());
    assert!(!pipeline.request_fetch());
    assert!(!pipeline.fetch_due());
    assert!(!pipeline.fetch_now().await);

    feed.gate.notify_one();
    let update = wait_for_update(&slot).await;
    assert!(matches!(update, FetchUpdate::Services(ref services) if services.len() == 1));
    tokio::time::timeout(Duration::from_secs(2), async {
        while pipeline.is_in_flight() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("in-flight flag cleared");
    assert_eq!(feed.calls(), 1);
    pipeline.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slot_keeps_only_the_newest_update() {
    let feed = ScriptedFeed::new(Behaviour::Trips);
    let (pipeline, slot) = pipeline(feed.clone(), FetchOptions::default());

    assert!(pipeline.fetch_now().await);
    assert!(pipeline.fetch_now().await);
    assert_eq!(feed.calls(), 2);

    match slot.take() {
        Some(FetchUpdate::Services(services)) => {
            assert_eq!(services.len(), 2);
            let lines: Vec<&str> = services.iter().map(|service| service.line()).collect();
            assert_eq!(lines, vec!["1", "2"], "services are sorted by arrival");
        }
        other => panic!("unexpected slot content: {other:?}"),
    }
    assert!(slot.take().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failures_are_classified_into_outages() {
    let cases: [(fn() -> FeedError, OutageKind); 3] = [
        (
            || FeedError::Connectivity("refused".into()),
            OutageKind::NetworkUnreachable,
        ),
        (|| FeedError::Upstream("HTTP 500".into()), OutageKind::UpstreamError),
        (|| FeedError::Other("disk".into()), OutageKind::UnknownError),
    ];
    for (make, expected) in cases {
        let (pipeline, _slot) = pipeline(
            ScriptedFeed::new(Behaviour::Fail(make)),
            FetchOptions::default(),
        );
        let update = pipeline.fetch_update().await;
        assert_eq!(outage_kind(&update), Some(expected));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_feed_times_out_as_upstream_error() {
    let options = FetchOptions {
        timeout: Duration::from_millis(50),
        ..FetchOptions::default()
    };
    let (pipeline, _slot) = pipeline(ScriptedFeed::new(Behaviour::Hang), options);
    let update = tokio::time::timeout(Duration::from_secs(2), pipeline.fetch_update())
        .await
        .expect("fetch bounded by its timeout");
    assert_eq!(outage_kind(&update), Some(OutageKind::UpstreamError));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_probe_skips_the_feed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let feed = ScriptedFeed::new(Behaviour::Trips);
    let options = FetchOptions {
        probe: Some(ProbeTarget {
            host: "127.0.0.1".to_string(),
            port,
            timeout: Duration::from_millis(500),
        }),
        ..FetchOptions::default()
    };
    let (pipeline, _slot) = pipeline(feed.clone(), options);
    let update = pipeline.fetch_update().await;
    assert_eq!(outage_kind(&update), Some(OutageKind::NetworkUnreachable));
    assert_eq!(feed.calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn request_interval_gates_due_fetches() {
    let options = FetchOptions {
        request_interval: Duration::from_secs(3600),
        ..FetchOptions::default()
    };
    let (pipeline, _slot) = pipeline(ScriptedFeed::new(Behaviour::Trips), options);
    assert!(pipeline.fetch_due());
    assert!(pipeline.fetch_now().await);
    assert!(!pipeline.fetch_due());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_cancels_in_flight_fetch() {
    let feed = ScriptedFeed::new(Behaviour::Hang);
    let (pipeline, slot) = pipeline(feed.clone(), FetchOptions::default());

    assert!(pipeline.request_fetch());
    tokio::time::timeout(Duration::from_secs(2), async {
        while feed.calls() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("fetch started");

    tokio::time::timeout(Duration::from_secs(2), pipeline.shutdown())
        .await
        .expect("shutdown completes");
    assert!(!pipeline.is_in_flight());
    assert!(slot.take().is_none());
    assert!(!pipeline.request_fetch(), "no fetch starts after shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn periodic_fetches_publish_until_shutdown() {
    let feed = ScriptedFeed::new(Behaviour::Trips);
    let options = FetchOptions {
        request_interval: Duration::from_millis(30),
        ..FetchOptions::default()
    };
    let (pipeline, slot) = pipeline(feed.clone(), options);
    pipeline.spawn_periodic();

    tokio::time::timeout(Duration::from_secs(2), async {
        while feed.calls() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("periodic fetches ran");
    assert!(matches!(wait_for_update(&slot).await, FetchUpdate::Services(_)));

    tokio::time::timeout(Duration::from_secs(2), pipeline.shutdown())
        .await
        .expect("shutdown completes");
    let calls = feed.calls();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(feed.calls(), calls);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn paused_periodic_fetching_still_serves_requests() {
    let feed = ScriptedFeed::new(Behaviour::Trips);
    let options = FetchOptions {
        request_interval: Duration::from_millis(30),
        ..FetchOptions::default()
    };
    let (pipeline, slot) = pipeline(feed.clone(), options);
    pipeline.pause_periodic(true);
    pipeline.spawn_periodic();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(feed.calls(), 0, "held periodic fetcher stays quiet");

    assert!(pipeline.request_fetch());
    assert!(matches!(wait_for_update(&slot).await, FetchUpdate::Services(_)));
    assert_eq!(feed.calls(), 1);

    pipeline.pause_periodic(false);
    tokio::time::timeout(Duration::from_secs(2), async {
        while feed.calls() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("periodic fetches resume");

    tokio::time::timeout(Duration::from_secs(2), pipeline.shutdown())
        .await
        .expect("shutdown completes");
}
