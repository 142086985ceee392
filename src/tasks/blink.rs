use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Result, ensure};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Process-wide blink phase for the "arriving now" glyph.
#[derive(Debug, Clone)]
pub struct BlinkState(Arc<AtomicBool>);

impl Default for BlinkState {
    fn default() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }
}

impl BlinkState {
    pub fn is_visible(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Flip the phase and return the new value.
    pub fn toggle(&self) -> bool {
        !self.0.fetch_xor(true, Ordering::Relaxed)
    }
}

/// Toggle `state` every `period` until cancelled.
pub async fn run(state: BlinkState, period: Duration, cancel: CancellationToken) -> Result<()> {
    ensure!(!period.is_zero(), "blink interval must be positive");
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                state.toggle();
            }
        }
    }
    debug!("blink ticker stopped");
    Ok(())
}
