use std::fmt;

use crate::service::ServiceRecord;

/// Why the feed is currently unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutageKind {
    NetworkUnreachable,
    UpstreamError,
    UnknownError,
}

impl OutageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkUnreachable => "network-unreachable",
            Self::UpstreamError => "upstream-error",
            Self::UnknownError => "unknown-error",
        }
    }

    /// Headline shown on the overlay for this kind.
    pub fn headline(&self) -> &'static str {
        match self {
            Self::NetworkUnreachable => "No network connection",
            Self::UpstreamError => "Departure data unavailable",
            Self::UnknownError => "Something went wrong",
        }
    }
}

impl fmt::Display for OutageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outage {
    pub kind: OutageKind,
    pub detail: Option<String>,
}

impl Outage {
    pub fn new(kind: OutageKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: Some(detail.into()),
        }
    }
}

/// Outcome of one fetch, as published to the board.
#[derive(Debug, Clone)]
pub enum FetchUpdate {
    /// Services sorted by arrival, possibly empty.
    Services(Vec<ServiceRecord>),
    Outage(Outage),
}

impl FetchUpdate {
    pub fn describe(&self) -> String {
        match self {
            Self::Services(services) => format!("{} services", services.len()),
            Self::Outage(outage) => format!("outage ({})", outage.kind),
        }
    }
}

/// Panel power level requested by the energy saver schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    Normal,
    Dim,
    Off,
}
