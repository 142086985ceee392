use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::FeedError;

use super::{FeedClient, RawTrip};

/// Replays trips from a YAML file (JSON when the extension is `.json`), re-read on every fetch.
///
/// Times are either absolute (`at`) or relative to the fetch (`due-in`), so a
/// static file keeps producing a live-looking board.
#[derive(Debug, Clone)]
pub struct FileFeed {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ReplayTrip {
    #[serde(default)]
    journey_ref: Option<String>,
    line: String,
    destination: String,
    /// Only trips listing one of the requested stops are returned; empty matches all.
    #[serde(default)]
    stop: Option<String>,
    #[serde(default)]
    at: Option<DateTime<Utc>>,
    #[serde(default, with = "humantime_serde")]
    due_in: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    delay: Option<Duration>,
    #[serde(default)]
    cancelled: bool,
    #[serde(default)]
    current_stop: Option<String>,
    #[serde(default)]
    via: Vec<String>,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn to_raw(trip: ReplayTrip, now: DateTime<Utc>) -> Result<RawTrip, FeedError> {
    let scheduled = match (trip.at, trip.due_in) {
        (Some(at), _) => at,
        (None, Some(due_in)) => now + offset(due_in)?,
        (None, None) => {
            return Err(FeedError::Upstream(format!(
                "trip {} to {} has neither `at` nor `due-in`",
                trip.line, trip.destination
            )));
        }
    };
    let estimated = match trip.delay {
        Some(delay) => Some(scheduled + offset(delay)?),
        None => None,
    };
    Ok(RawTrip {
        journey_ref: trip.journey_ref,
        line: trip.line,
        destination: trip.destination,
        scheduled,
        estimated,
        cancelled: trip.cancelled,
        current_stop: trip.current_stop,
        forward_stops: trip.via,
    })
}

fn offset(duration: Duration) -> Result<chrono::Duration, FeedError> {
    chrono::Duration::from_std(duration)
        .map_err(|err| FeedError::Upstream(format!("duration out of range: {err}")))
}

impl FeedClient for FileFeed {
    async fn fetch(&self, stops: &[String]) -> Result<Vec<RawTrip>, FeedError> {
        let path = self.path.clone();
        let text = tokio::task::spawn_blocking(move || std::fs::read_to_string(path))
            .await
            .map_err(|err| FeedError::Other(format!("replay reader failed: {err}")))??;
        let is_json = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed: Result<Vec<ReplayTrip>, String> = if is_json {
            serde_json::from_str(&text).map_err(|err| err.to_string())
        } else {
            serde_yaml::from_str(&text).map_err(|err| err.to_string())
        };
        let replay = parsed.map_err(|err| {
            FeedError::Upstream(format!("malformed replay file {}: {err}", self.path.display()))
        })?;

        let now = Utc::now();
        let trips = replay
            .into_iter()
            .filter(|trip| match &trip.stop {
                Some(stop) => stops.is_empty() || stops.iter().any(|wanted| wanted == stop),
                None => true,
            })
            .map(|trip| to_raw(trip, now))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(path = %self.path.display(), trips = trips.len(), "replayed trips");
        Ok(trips)
    }
}
