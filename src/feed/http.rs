use std::time::Duration;

use reqwest::{Client, Url};
use tracing::{debug, warn};

use crate::error::FeedError;

use super::{FeedClient, RawTrip};

const USER_AGENT: &str = concat!("departure-board/", env!("CARGO_PKG_VERSION"));

/// JSON-over-HTTP feed: `GET <url>?stop=<ref>` returns an array of trips.
#[derive(Debug, Clone)]
pub struct HttpFeed {
    client: Client,
    url: Url,
    api_key: Option<String>,
}

impl HttpFeed {
    pub fn new(url: &str, timeout: Duration, api_key: Option<String>) -> Result<Self, FeedError> {
        let url = Url::parse(url)
            .map_err(|err| FeedError::Other(format!("invalid feed url {url}: {err}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| FeedError::Other(format!("failed to create HTTP client: {err}")))?;
        Ok(Self {
            client,
            url,
            api_key,
        })
    }

    async fn fetch_stop(&self, stop: &str) -> Result<Vec<RawTrip>, FeedError> {
        let url = Url::parse_with_params(self.url.as_str(), &[("stop", stop)])
            .map_err(|err| FeedError::Other(format!("invalid request url: {err}")))?;
        let mut request = self.client.get(url.clone());
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|err| {
            warn!(
                url = %url,
                error = %err,
                is_connect = err.is_connect(),
                is_timeout = err.is_timeout(),
                "feed request failed"
            );
            classify(err)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Upstream(format!("HTTP {status} from {url}")));
        }

        let trips: Vec<RawTrip> = response
            .json()
            .await
            .map_err(|err| FeedError::Upstream(format!("malformed feed payload: {err}")))?;
        debug!(stop, trips = trips.len(), "feed response decoded");
        Ok(trips)
    }
}

fn classify(err: reqwest::Error) -> FeedError {
    if err.is_connect() {
        FeedError::Connectivity(err.to_string())
    } else if err.is_timeout() || err.is_request() || err.is_status() || err.is_decode() {
        FeedError::Upstream(err.to_string())
    } else {
        FeedError::Other(err.to_string())
    }
}

impl FeedClient for HttpFeed {
    async fn fetch(&self, stops: &[String]) -> Result<Vec<RawTrip>, FeedError> {
        let mut trips = Vec::new();
        for stop in stops {
            trips.extend(self.fetch_stop(stop).await?);
        }
        Ok(trips)
    }
}
