use thiserror::Error;

use crate::events::OutageKind;
use crate::render::ElementId;

/// Failure taxonomy surfaced by feed clients.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The upstream host could not be reached at all.
    #[error("connectivity failure: {0}")]
    Connectivity(String),

    /// The upstream answered with an HTTP error or a malformed payload.
    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("{0}")]
    Other(String),
}

impl FeedError {
    pub fn outage_kind(&self) -> OutageKind {
        match self {
            Self::Connectivity(_) => OutageKind::NetworkUnreachable,
            Self::Upstream(_) => OutageKind::UpstreamError,
            Self::Other(_) => OutageKind::UnknownError,
        }
    }
}

impl From<std::io::Error> for FeedError {
    fn from(err: std::io::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Errors from composing elements on a render surface.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SurfaceError {
    /// The element was already removed (or never added).
    #[error("element {0:?} is not part of the composition")]
    ElementAbsent(ElementId),
}
