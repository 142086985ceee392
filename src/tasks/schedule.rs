use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use config_model::{EnergySaverConfig, EnergySaverMode};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::events::PowerMode;

/// Power mode the panel should be in, given whether we are inside the window.
pub fn power_mode_for(config: &EnergySaverConfig, inactive: bool) -> PowerMode {
    if !inactive {
        return PowerMode::Normal;
    }
    match config.mode {
        EnergySaverMode::None => PowerMode::Normal,
        EnergySaverMode::Dim => PowerMode::Dim,
        EnergySaverMode::Off => PowerMode::Off,
    }
}

/// Send the power mode for the inactive-hours window whenever it changes.
pub async fn run(
    config: EnergySaverConfig,
    cancel: CancellationToken,
    control: mpsc::Sender<PowerMode>,
) -> Result<()> {
    let tz = config.timezone();
    let mut last_mode: Option<PowerMode> = None;

    loop {
        let now_local = Utc::now().with_timezone(&tz);
        let mode = power_mode_for(&config, config.is_inactive_at(now_local));

        if last_mode != Some(mode) {
            info!(%now_local, mode = ?mode, "energy saver enforcing power mode");
            control
                .send(mode)
                .await
                .context("failed to send scheduled power mode")?;
            last_mode = Some(mode);
        }

        let mut wait = Duration::from_secs(60 * 60);
        if let Some((at, inactive_after)) = config.next_transition_after(now_local) {
            let delta = at.with_timezone(&Utc).signed_duration_since(now_local.with_timezone(&Utc));
            wait = delta.to_std().unwrap_or(Duration::ZERO);
            debug!(
                %at,
                inactive_after,
                wait_secs = wait.as_secs_f64(),
                "energy saver awaiting transition"
            );
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(wait) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(yaml: &str) -> EnergySaverConfig {
        let config: EnergySaverConfig = serde_yaml::from_str(yaml).expect("yaml");
        config.validate().expect("valid");
        config
    }

    #[test]
    fn mode_follows_window_and_setting() {
        let dim = config("mode: dim\n");
        assert_eq!(power_mode_for(&dim, true), PowerMode::Dim);
        assert_eq!(power_mode_for(&dim, false), PowerMode::Normal);
        let off = config("mode: off\n");
        assert_eq!(power_mode_for(&off, true), PowerMode::Off);
        let none = config("mode: none\n");
        assert_eq!(power_mode_for(&none, true), PowerMode::Normal);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sends_initial_mode_then_stops_on_cancel() {
        let config = config("mode: off\ninactive-hours: [\"00:00\", \"23:59:59\"]\n");
        let expected = power_mode_for(&config, config.is_inactive_at(Utc::now().with_timezone(&config.timezone())));
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(config, cancel.clone(), tx));

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("initial mode")
            .expect("channel open");
        assert_eq!(first, expected);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("schedule stops")
            .expect("join")
            .expect("schedule run");
    }
}
