use std::borrow::Cow;
use std::time::Duration;

use anyhow::{Result, ensure};
use chrono::{
    DateTime, Duration as ChronoDuration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone,
};
use chrono_tz::Tz;
use serde::Deserialize;
use serde::de::{self, Deserializer};

pub use energy::{EnergySaverConfig, EnergySaverMode, InactiveHours};
pub use splash::SplashScreenConfig;

mod splash {
    use super::*;

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
    pub struct SplashScreenConfig {
        /// Show the splash card at startup and after the panel wakes up.
        pub enabled: bool,
        pub title: Option<String>,
        pub subtitle: Option<String>,
        pub duration_seconds: Option<f32>,
    }

    impl Default for SplashScreenConfig {
        fn default() -> Self {
            Self {
                enabled: true,
                title: None,
                subtitle: None,
                duration_seconds: None,
            }
        }
    }

    impl SplashScreenConfig {
        const DEFAULT_DURATION_SECONDS: f32 = 2.0;

        pub fn title_or_default(&self) -> Cow<'_, str> {
            match &self.title {
                Some(title) if !title.trim().is_empty() => Cow::Borrowed(title.as_str()),
                _ => Cow::Borrowed("Departures"),
            }
        }

        pub fn subtitle_or_default(&self) -> Cow<'_, str> {
            match &self.subtitle {
                Some(subtitle) if !subtitle.trim().is_empty() => Cow::Borrowed(subtitle.as_str()),
                _ => Cow::Borrowed("Waiting for data"),
            }
        }

        pub fn effective_duration(&self) -> Duration {
            if !self.enabled {
                return Duration::ZERO;
            }
            let seconds = self
                .duration_seconds
                .filter(|value| value.is_finite() && *value >= 0.0)
                .unwrap_or(Self::DEFAULT_DURATION_SECONDS)
                .max(0.0);
            Duration::from_secs_f32(seconds)
        }

        pub fn validate(&self) -> Result<()> {
            if let Some(duration) = self.duration_seconds {
                ensure!(
                    duration.is_finite() && duration >= 0.0,
                    "splash-screen.duration-seconds must be non-negative"
                );
            }
            Ok(())
        }
    }
}

mod energy {
    use super::*;

    /// What the panel does while inside the inactive window.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum EnergySaverMode {
        #[default]
        None,
        Dim,
        Off,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "kebab-case", deny_unknown_fields)]
    pub struct EnergySaverConfig {
        #[serde(default = "default_timezone")]
        pub timezone: Tz,
        #[serde(default)]
        pub mode: EnergySaverMode,
        #[serde(default = "default_inactive_hours")]
        inactive_hours: InactiveHours,
        /// Panel contrast applied while dimmed.
        #[serde(default = "default_dim_contrast")]
        pub dim_contrast: u8,
    }

    fn default_timezone() -> Tz {
        Tz::UTC
    }

    fn default_inactive_hours() -> InactiveHours {
        InactiveHours {
            start: NaiveTime::from_hms_opt(23, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or_default(),
        }
    }

    const fn default_dim_contrast() -> u8 {
        15
    }

    impl Default for EnergySaverConfig {
        fn default() -> Self {
            Self {
                timezone: default_timezone(),
                mode: EnergySaverMode::None,
                inactive_hours: default_inactive_hours(),
                dim_contrast: default_dim_contrast(),
            }
        }
    }

    impl EnergySaverConfig {
        pub fn validate(&self) -> Result<()> {
            ensure!(
                self.inactive_hours.start != self.inactive_hours.end,
                "energy-saver.inactive-hours must not start and end at the same time"
            );
            if self.mode == EnergySaverMode::Dim {
                ensure!(
                    self.dim_contrast > 0,
                    "energy-saver.dim-contrast must be positive when mode is dim"
                );
            }
            Ok(())
        }

        pub fn timezone(&self) -> Tz {
            self.timezone
        }

        pub fn inactive_hours(&self) -> InactiveHours {
            self.inactive_hours
        }

        pub fn is_enabled(&self) -> bool {
            self.mode != EnergySaverMode::None
        }

        pub fn is_inactive_at(&self, instant: DateTime<Tz>) -> bool {
            let today = instant.date_naive();
            [today - ChronoDuration::days(1), today]
                .into_iter()
                .filter_map(|date| self.interval_for_date(date))
                .any(|interval| interval.contains(instant))
        }

        /// Next boundary strictly after `from`, with `true` when the window
        /// is entered there and `false` when it is left.
        pub fn next_transition_after(&self, from: DateTime<Tz>) -> Option<(DateTime<Tz>, bool)> {
            let start_date = from.date_naive();
            for offset in -1..=2 {
                let date = start_date + ChronoDuration::days(offset);
                let Some(interval) = self.interval_for_date(date) else {
                    continue;
                };
                if interval.start > from {
                    return Some((interval.start, true));
                }
                if interval.end > from {
                    return Some((interval.end, false));
                }
            }
            None
        }

        fn interval_for_date(&self, date: NaiveDate) -> Option<ResolvedInterval> {
            let InactiveHours { start, end } = self.inactive_hours;
            let end_date = if end > start {
                date
            } else {
                date + ChronoDuration::days(1)
            };
            let start = resolve_local_datetime(self.timezone, date, start, Boundary::Start)?;
            let end = resolve_local_datetime(self.timezone, end_date, end, Boundary::End)?;
            (end > start).then_some(ResolvedInterval { start, end })
        }
    }

    /// Daily window, possibly wrapping past midnight (`["23:00", "07:00"]`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InactiveHours {
        start: NaiveTime,
        end: NaiveTime,
    }

    impl InactiveHours {
        pub fn start(&self) -> NaiveTime {
            self.start
        }

        pub fn end(&self) -> NaiveTime {
            self.end
        }

        pub fn wraps_midnight(&self) -> bool {
            self.end <= self.start
        }
    }

    impl<'de> Deserialize<'de> for InactiveHours {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let (start_raw, end_raw): (String, String) = Deserialize::deserialize(deserializer)?;
            let parse_time = |value: &str| -> Result<NaiveTime, D::Error> {
                let trimmed = value.trim();
                for format in ["%H:%M:%S", "%H:%M"] {
                    if let Ok(parsed) = NaiveTime::parse_from_str(trimmed, format) {
                        return Ok(parsed);
                    }
                }
                Err(de::Error::custom(format!("invalid time literal '{value}'")))
            };
            let start = parse_time(&start_raw)?;
            let end = parse_time(&end_raw)?;
            Ok(Self { start, end })
        }
    }

    #[derive(Debug, Clone)]
    struct ResolvedInterval {
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    }

    impl ResolvedInterval {
        fn contains(&self, instant: DateTime<Tz>) -> bool {
            instant >= self.start && instant < self.end
        }
    }

    #[derive(Debug, Clone, Copy)]
    enum Boundary {
        Start,
        End,
    }

    fn resolve_local_datetime(
        tz: Tz,
        date: NaiveDate,
        time: NaiveTime,
        boundary: Boundary,
    ) -> Option<DateTime<Tz>> {
        let mut candidate = NaiveDateTime::new(date, time);
        for _ in 0..=180 {
            match tz.from_local_datetime(&candidate) {
                LocalResult::Single(dt) => return Some(dt),
                LocalResult::Ambiguous(earliest, latest) => {
                    return Some(match boundary {
                        Boundary::Start => earliest,
                        Boundary::End => latest,
                    });
                }
                LocalResult::None => {
                    candidate += ChronoDuration::minutes(1);
                }
            }
        }
        tz.from_local_datetime(&candidate).earliest()
    }
}
