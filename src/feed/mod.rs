//! Transit feed adapters and the trip-to-service conversion.

mod file;
mod http;
pub mod probe;

pub use file::FileFeed;
pub use http::HttpFeed;

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::trace;

use crate::error::FeedError;
use crate::service::{DisplayTimeFormatter, ServiceRecord};

/// One trip as delivered by a feed client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawTrip {
    #[serde(default)]
    pub journey_ref: Option<String>,
    pub line: String,
    pub destination: String,
    pub scheduled: DateTime<Utc>,
    #[serde(default)]
    pub estimated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled: bool,
    /// Stop the trip is currently at or approaching.
    #[serde(default)]
    pub current_stop: Option<String>,
    /// Stops after the configured one, in travel order.
    #[serde(default)]
    pub forward_stops: Vec<String>,
}

pub trait FeedClient: Send + Sync {
    fn fetch(
        &self,
        stops: &[String],
    ) -> impl Future<Output = Result<Vec<RawTrip>, FeedError>> + Send;
}

/// The configured feed backend.
#[derive(Debug, Clone)]
pub enum Feed {
    Http(HttpFeed),
    File(FileFeed),
}

impl FeedClient for Feed {
    async fn fetch(&self, stops: &[String]) -> Result<Vec<RawTrip>, FeedError> {
        match self {
            Self::Http(feed) => feed.fetch(stops).await,
            Self::File(feed) => feed.fetch(stops).await,
        }
    }
}

/// Trip selection and via-text options applied after every fetch.
#[derive(Debug, Clone, Default)]
pub struct TripFilter {
    /// Keep only trips calling at a stop whose name contains this text.
    pub station: Option<String>,
    /// Removed from the start of every forward-stop name.
    pub via_strip_prefix: Option<String>,
    pub max_services: Option<usize>,
}

impl TripFilter {
    fn matches_station(&self, trip: &RawTrip) -> bool {
        let Some(station) = self.station.as_deref() else {
            return true;
        };
        let needle = station.to_lowercase();
        trip.current_stop
            .iter()
            .chain(trip.forward_stops.iter())
            .any(|stop| stop.to_lowercase().contains(&needle))
    }

    fn via_text(&self, stops: &[String]) -> String {
        stops
            .iter()
            .map(|stop| {
                let name = match self.via_strip_prefix.as_deref() {
                    Some(prefix) => stop.strip_prefix(prefix).unwrap_or(stop),
                    None => stop.as_str(),
                };
                name.trim()
            })
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Convert raw trips into display-ready services sorted by arrival.
pub fn build_services(
    trips: Vec<RawTrip>,
    filter: &TripFilter,
    formatter: &DisplayTimeFormatter,
    now: DateTime<Utc>,
) -> Vec<ServiceRecord> {
    let mut services: Vec<ServiceRecord> = trips
        .into_iter()
        .filter(|trip| {
            if trip.cancelled {
                trace!(line = %trip.line, destination = %trip.destination, "skipping cancelled trip");
                return false;
            }
            filter.matches_station(trip)
        })
        .map(|trip| {
            let via = filter.via_text(&trip.forward_stops);
            ServiceRecord::new(
                trip.journey_ref.unwrap_or_default(),
                trip.line,
                trip.destination,
                via,
                trip.scheduled,
                trip.estimated,
            )
            .with_display(formatter, now)
        })
        .collect();

    services.sort_by_key(ServiceRecord::arrival);
    if let Some(max) = filter.max_services {
        services.truncate(max);
    }
    services
        .into_iter()
        .enumerate()
        .map(|(index, service)| service.with_position(index + 1))
        .collect()
}
