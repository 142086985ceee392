use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use chrono_tz::Tz;
use config_model::{EnergySaverConfig, SplashScreenConfig};
use serde::Deserialize;

use crate::board::{BoardOptions, ROW_HEIGHT, ROWS, RowSettings};
use crate::feed::probe::ProbeTarget;
use crate::feed::{Feed, FileFeed, HttpFeed, TripFilter};
use crate::render::PixelMode;
use crate::service::{CountdownStyle, DisplayTimeFormatter, TimeFormat};
use crate::tasks::fetch::FetchOptions;
use crate::tasks::frame::FrameLoopOptions;

/// Optional TCP reachability check run before each fetch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProbeConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "ProbeConfig::default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl ProbeConfig {
    const fn default_timeout() -> Duration {
        Duration::from_secs(3)
    }

    pub fn target(&self) -> ProbeTarget {
        ProbeTarget {
            host: self.host.clone(),
            port: self.port,
            timeout: self.timeout,
        }
    }
}

/// Where departures come from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FeedConfig {
    /// JSON endpoint queried once per stop.
    Http {
        url: String,
        stops: Vec<String>,
        #[serde(default = "FeedConfig::default_timeout", with = "humantime_serde")]
        timeout: Duration,
        /// Environment variable holding a bearer token.
        #[serde(default, rename = "api-key-env")]
        api_key_env: Option<String>,
        #[serde(default)]
        probe: Option<ProbeConfig>,
    },
    /// Trip list replayed from a YAML or JSON file.
    File {
        path: PathBuf,
        #[serde(default)]
        stops: Vec<String>,
        #[serde(default = "FeedConfig::default_timeout", with = "humantime_serde")]
        timeout: Duration,
        #[serde(default)]
        probe: Option<ProbeConfig>,
    },
}

impl FeedConfig {
    const fn default_timeout() -> Duration {
        Duration::from_secs(10)
    }

    pub fn stops(&self) -> &[String] {
        match self {
            Self::Http { stops, .. } | Self::File { stops, .. } => stops,
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            Self::Http { timeout, .. } | Self::File { timeout, .. } => *timeout,
        }
    }

    pub fn probe(&self) -> Option<&ProbeConfig> {
        match self {
            Self::Http { probe, .. } | Self::File { probe, .. } => probe.as_ref(),
        }
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.timeout().is_zero(), "feed.timeout must be positive");
        match self {
            Self::Http { url, stops, .. } => {
                ensure!(!url.trim().is_empty(), "feed.url must not be empty");
                ensure!(!stops.is_empty(), "feed.stops must list at least one stop");
            }
            Self::File { path, .. } => {
                ensure!(!path.as_os_str().is_empty(), "feed.path must not be empty");
            }
        }
        if let Some(probe) = self.probe() {
            ensure!(!probe.host.trim().is_empty(), "feed.probe.host must not be empty");
            ensure!(!probe.timeout.is_zero(), "feed.probe.timeout must be positive");
        }
        Ok(())
    }
}

/// Thresholds for the time column.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct CountdownConfig {
    pub style: CountdownStyle,
    /// At or below this the minutes style shows "Due".
    #[serde(with = "humantime_serde")]
    pub due_within: Duration,
    /// At or below this the glyph style shows the vehicle glyph.
    #[serde(with = "humantime_serde")]
    pub arriving_within: Duration,
    /// At or below this the vehicle glyph blinks.
    #[serde(with = "humantime_serde")]
    pub blink_within: Duration,
    /// From this on the absolute clock time is shown.
    #[serde(with = "humantime_serde")]
    pub clock_after: Duration,
    /// Below this the glyph style counts down in ten-second steps.
    #[serde(with = "humantime_serde")]
    pub fine_countdown_below: Duration,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        let formatter = DisplayTimeFormatter::default();
        Self {
            style: formatter.style,
            due_within: formatter.due_within,
            arriving_within: formatter.arriving_within,
            blink_within: formatter.blink_within,
            clock_after: formatter.clock_after,
            fine_countdown_below: formatter.fine_countdown_below,
        }
    }
}

impl CountdownConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.blink_within <= self.arriving_within,
            "countdown.blink-within must not exceed countdown.arriving-within"
        );
        ensure!(
            self.due_within < self.clock_after,
            "countdown.due-within must be shorter than countdown.clock-after"
        );
        ensure!(
            self.arriving_within < self.clock_after,
            "countdown.arriving-within must be shorter than countdown.clock-after"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub mode: PixelMode,
    /// Widen the service number column for long line names.
    pub large_line_names: bool,
    /// Prefix each line with its 1-based place in the fetched list.
    pub show_index: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 64,
            mode: PixelMode::Mono,
            large_line_names: false,
            show_index: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Configuration {
    /// Departure source.
    pub feed: FeedConfig,
    /// Keep only trips calling at a stop whose name contains this text.
    #[serde(default)]
    pub station_filter: Option<String>,
    /// Prefix removed from every stop name in the via text.
    #[serde(default)]
    pub via_strip_prefix: Option<String>,
    /// Show at most this many services.
    #[serde(default)]
    pub max_services: Option<usize>,
    /// Minimum time between fetches.
    #[serde(default = "Configuration::default_request_interval", with = "humantime_serde")]
    pub request_interval: Duration,
    /// How long a countdown text stays valid.
    #[serde(default = "Configuration::default_static_refresh", with = "humantime_serde")]
    pub static_refresh_interval: Duration,
    /// How long a blinking time text stays valid.
    #[serde(default = "Configuration::default_blink_refresh", with = "humantime_serde")]
    pub blink_refresh_interval: Duration,
    /// Period of the arriving glyph blink.
    #[serde(default = "Configuration::default_blink_interval", with = "humantime_serde")]
    pub blink_interval: Duration,
    /// Pixels per frame for reveal and via scrolling.
    #[serde(default = "Configuration::default_scroll_speed")]
    pub scroll_speed: u32,
    /// Frames a row waits between animation phases.
    #[serde(default = "Configuration::default_row_delay")]
    pub row_delay: u32,
    /// Frames spent on "no services" before fetching again.
    #[serde(default = "Configuration::default_recovery_ticks")]
    pub recovery_ticks: u32,
    /// A forced rotation happens every `row-delay` times this many frames; `0` disables it.
    #[serde(default = "Configuration::default_forced_rotation_multiplier")]
    pub forced_rotation_multiplier: u32,
    /// Keep the earliest service on the top row.
    #[serde(default = "Configuration::default_pin_earliest")]
    pub pin_earliest: bool,
    /// Skip the horizontal via scroll.
    #[serde(default)]
    pub reduced_animations: bool,
    #[serde(default)]
    pub time_format: TimeFormat,
    /// Zone used for clock times.
    #[serde(default = "Configuration::default_timezone")]
    pub timezone: Tz,
    #[serde(default)]
    pub countdown: CountdownConfig,
    #[serde(default = "Configuration::default_target_fps")]
    pub target_fps: u32,
    #[serde(default)]
    pub display: DisplayConfig,
    /// Optional inactive-hours window that dims or blanks the panel.
    #[serde(default)]
    pub energy_saver: Option<EnergySaverConfig>,
    #[serde(default)]
    pub splash_screen: SplashScreenConfig,
}

impl Configuration {
    const fn default_request_interval() -> Duration {
        Duration::from_secs(15)
    }

    const fn default_static_refresh() -> Duration {
        Duration::from_secs(5)
    }

    const fn default_blink_refresh() -> Duration {
        Duration::from_millis(500)
    }

    const fn default_blink_interval() -> Duration {
        Duration::from_millis(500)
    }

    const fn default_scroll_speed() -> u32 {
        3
    }

    const fn default_row_delay() -> u32 {
        30
    }

    const fn default_recovery_ticks() -> u32 {
        100
    }

    const fn default_forced_rotation_multiplier() -> u32 {
        4
    }

    const fn default_pin_earliest() -> bool {
        true
    }

    fn default_timezone() -> Tz {
        Tz::UTC
    }

    const fn default_target_fps() -> u32 {
        30
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        self.feed.validate().context("invalid feed configuration")?;
        ensure!(
            !self.request_interval.is_zero(),
            "request-interval must be positive"
        );
        ensure!(
            !self.static_refresh_interval.is_zero(),
            "static-refresh-interval must be positive"
        );
        ensure!(
            !self.blink_refresh_interval.is_zero(),
            "blink-refresh-interval must be positive"
        );
        ensure!(!self.blink_interval.is_zero(), "blink-interval must be positive");
        ensure!(self.scroll_speed > 0, "scroll-speed must be greater than zero");
        ensure!(self.recovery_ticks > 0, "recovery-ticks must be greater than zero");
        ensure!(
            (1..=240).contains(&self.target_fps),
            "target-fps must be between 1 and 240"
        );
        ensure!(
            self.max_services != Some(0),
            "max-services must be greater than zero when set"
        );
        let rows_height = ROW_HEIGHT * ROWS as u32;
        ensure!(
            self.display.height >= rows_height,
            "display.height must be at least {rows_height}"
        );
        ensure!(self.display.width > 0, "display.width must be greater than zero");
        ensure!(
            !(self.display.large_line_names && self.display.show_index),
            "display.large-line-names and display.show-index cannot both be enabled"
        );
        self.countdown
            .validate()
            .context("invalid countdown configuration")?;
        if let Some(energy) = &self.energy_saver {
            energy
                .validate()
                .context("invalid energy-saver configuration")?;
        }
        self.splash_screen
            .validate()
            .context("invalid splash-screen configuration")?;
        Ok(self)
    }

    pub fn formatter(&self) -> DisplayTimeFormatter {
        DisplayTimeFormatter {
            style: self.countdown.style,
            time_format: self.time_format,
            timezone: self.timezone,
            due_within: self.countdown.due_within,
            arriving_within: self.countdown.arriving_within,
            blink_within: self.countdown.blink_within,
            clock_after: self.countdown.clock_after,
            fine_countdown_below: self.countdown.fine_countdown_below,
            static_refresh: self.static_refresh_interval,
            blink_refresh: self.blink_refresh_interval,
        }
    }

    pub fn row_settings(&self) -> RowSettings {
        RowSettings {
            speed: self.scroll_speed,
            delay: self.row_delay,
            reduced_animations: self.reduced_animations,
            large_line_names: self.display.large_line_names,
            show_index: self.display.show_index,
            formatter: self.formatter(),
        }
    }

    pub fn board_options(&self) -> BoardOptions {
        BoardOptions {
            pin_earliest: self.pin_earliest,
            forced_rotation_every: self
                .row_delay
                .saturating_mul(self.forced_rotation_multiplier),
            recovery_ticks: self.recovery_ticks,
            row: Arc::new(self.row_settings()),
        }
    }

    pub fn trip_filter(&self) -> TripFilter {
        TripFilter {
            station: self.station_filter.clone(),
            via_strip_prefix: self.via_strip_prefix.clone(),
            max_services: self.max_services,
        }
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            stops: self.feed.stops().to_vec(),
            request_interval: self.request_interval,
            timeout: self.feed.timeout(),
            probe: self.feed.probe().map(ProbeConfig::target),
            filter: self.trip_filter(),
            formatter: self.formatter(),
        }
    }

    pub fn frame_options(&self, max_frames: Option<u64>) -> FrameLoopOptions {
        FrameLoopOptions {
            target_fps: self.target_fps,
            splash: self.splash_screen.clone(),
            dim_contrast: self
                .energy_saver
                .as_ref()
                .map_or(FrameLoopOptions::default().dim_contrast, |energy| {
                    energy.dim_contrast
                }),
            max_frames,
            clock: self.formatter(),
        }
    }

    /// Instantiate the configured feed client.
    pub fn build_feed(&self) -> Result<Feed> {
        match &self.feed {
            FeedConfig::Http {
                url,
                timeout,
                api_key_env,
                ..
            } => {
                let api_key = match api_key_env {
                    Some(name) => Some(
                        std::env::var(name)
                            .with_context(|| format!("environment variable {name} is not set"))?,
                    ),
                    None => None,
                };
                let feed = HttpFeed::new(url, *timeout, api_key)
                    .context("failed to create HTTP feed")?;
                Ok(Feed::Http(feed))
            }
            FeedConfig::File { path, .. } => Ok(Feed::File(FileFeed::new(path.clone()))),
        }
    }
}
