use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::error::FeedError;

/// Host checked for reachability before every fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

/// Open and drop a TCP connection to the target.
pub async fn check(target: &ProbeTarget) -> Result<(), FeedError> {
    let address = (target.host.as_str(), target.port);
    match timeout(target.timeout, TcpStream::connect(address)).await {
        Ok(Ok(_stream)) => {
            debug!(host = %target.host, port = target.port, "reachability probe succeeded");
            Ok(())
        }
        Ok(Err(err)) => Err(FeedError::Connectivity(format!(
            "cannot reach {}:{}: {err}",
            target.host, target.port
        ))),
        Err(_) => Err(FeedError::Connectivity(format!(
            "no answer from {}:{} within {}",
            target.host,
            target.port,
            humantime::format_duration(target.timeout)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn reachable_listener_passes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let target = ProbeTarget {
            host: "127.0.0.1".to_string(),
            port,
            timeout: Duration::from_secs(1),
        };
        check(&target).await.expect("probe");
    }

    #[tokio::test]
    async fn closed_port_is_a_connectivity_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);
        let target = ProbeTarget {
            host: "127.0.0.1".to_string(),
            port,
            timeout: Duration::from_secs(1),
        };
        let err = check(&target).await.expect_err("closed port");
        assert!(matches!(err, FeedError::Connectivity(_)));
    }
}
