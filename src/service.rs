use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

/// Journey id reserved for the "no service in this slot" record.
pub const EMPTY_SERVICE_ID: &str = "0";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u8")]
pub enum TimeFormat {
    Twelve,
    #[default]
    TwentyFour,
}

impl TryFrom<u8> for TimeFormat {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            12 => Ok(Self::Twelve),
            24 => Ok(Self::TwentyFour),
            other => Err(format!("time-format must be 12 or 24, got {other}")),
        }
    }
}

impl TimeFormat {
    fn clock_pattern(&self) -> &'static str {
        match self {
            Self::Twelve => " %I:%M",
            Self::TwentyFour => " %H:%M",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CountdownStyle {
    /// `" Due"`, `" 7 min"`, `" 14:05"`.
    #[default]
    Minutes,
    /// Vehicle glyph when arriving, `5'30` / `12'` countdowns, clock otherwise.
    Glyph,
}

/// Text shown in the time column of a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayTime {
    Blank,
    Clock(String),
    Due,
    Minutes(i64),
    Countdown { minutes: i64, seconds: i64 },
    WholeMinutes(i64),
    Arriving,
    ArrivingBlink,
}

impl DisplayTime {
    /// Countdowns go stale with time; absolute clock times do not.
    pub fn is_countdown(&self) -> bool {
        !matches!(self, Self::Blank | Self::Clock(_))
    }

    pub fn is_blinking(&self) -> bool {
        matches!(self, Self::ArrivingBlink)
    }

    pub fn is_glyph(&self) -> bool {
        matches!(self, Self::Arriving | Self::ArrivingBlink)
    }
}

impl fmt::Display for DisplayTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blank | Self::Arriving | Self::ArrivingBlink => Ok(()),
            Self::Clock(text) => f.write_str(text),
            Self::Due => f.write_str(" Due"),
            Self::Minutes(minutes) => write!(f, " {minutes} min"),
            Self::Countdown { minutes, seconds } => write!(f, "{minutes}'{seconds:02}"),
            Self::WholeMinutes(minutes) => write!(f, "{minutes}'"),
        }
    }
}

/// Turns an arrival instant into the text of the time column.
#[derive(Debug, Clone)]
pub struct DisplayTimeFormatter {
    pub style: CountdownStyle,
    pub time_format: TimeFormat,
    pub timezone: Tz,
    pub due_within: Duration,
    pub arriving_within: Duration,
    pub blink_within: Duration,
    pub clock_after: Duration,
    pub fine_countdown_below: Duration,
    pub static_refresh: Duration,
    pub blink_refresh: Duration,
}

impl Default for DisplayTimeFormatter {
    fn default() -> Self {
        Self {
            style: CountdownStyle::Minutes,
            time_format: TimeFormat::TwentyFour,
            timezone: Tz::UTC,
            due_within: Duration::from_secs(120),
            arriving_within: Duration::from_secs(60),
            blink_within: Duration::from_secs(6),
            clock_after: Duration::from_secs(15 * 60),
            fine_countdown_below: Duration::from_secs(10 * 60),
            static_refresh: Duration::from_secs(5),
            blink_refresh: Duration::from_millis(500),
        }
    }
}

impl DisplayTimeFormatter {
    pub fn format(&self, arrival: DateTime<Utc>, now: DateTime<Utc>) -> DisplayTime {
        let diff = (arrival - now).num_milliseconds() as f64 / 1000.0;
        if diff >= self.clock_after.as_secs_f64() {
            return self.clock(arrival);
        }
        match self.style {
            CountdownStyle::Minutes => {
                if diff <= self.due_within.as_secs_f64() {
                    DisplayTime::Due
                } else {
                    DisplayTime::Minutes((diff / 60.0).trunc() as i64)
                }
            }
            CountdownStyle::Glyph => {
                if diff <= self.blink_within.as_secs_f64() {
                    DisplayTime::ArrivingBlink
                } else if diff <= self.arriving_within.as_secs_f64() {
                    DisplayTime::Arriving
                } else if diff < self.fine_countdown_below.as_secs_f64() {
                    let whole = diff.floor() as i64;
                    DisplayTime::Countdown {
                        minutes: whole / 60,
                        seconds: (whole % 60) / 10 * 10,
                    }
                } else {
                    DisplayTime::WholeMinutes((diff / 60.0).round() as i64)
                }
            }
        }
    }

    pub fn clock(&self, instant: DateTime<Utc>) -> DisplayTime {
        let local = instant.with_timezone(&self.timezone);
        DisplayTime::Clock(local.format(self.time_format.clock_pattern()).to_string())
    }

    /// How long a computed text stays fresh, `None` when it never expires.
    pub fn refresh_after(&self, display: &DisplayTime) -> Option<Duration> {
        if display.is_blinking() {
            Some(self.blink_refresh)
        } else if display.is_countdown() {
            Some(self.static_refresh)
        } else {
            None
        }
    }
}

/// One upcoming arrival at the configured stop.
#[derive(Debug, Clone)]
pub struct ServiceRecord {
    id: String,
    line: String,
    destination: String,
    via: String,
    scheduled: DateTime<Utc>,
    estimated: Option<DateTime<Utc>>,
    display: DisplayTime,
    computed_at: DateTime<Utc>,
    /// 1-based place in the fetched list, `0` when unknown.
    position: usize,
}

impl PartialEq for ServiceRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.line == other.line
            && self.destination == other.destination
            && self.via == other.via
            && self.scheduled == other.scheduled
            && self.estimated == other.estimated
    }
}

impl Eq for ServiceRecord {}

impl ServiceRecord {
    pub fn new(
        id: impl Into<String>,
        line: impl Into<String>,
        destination: impl Into<String>,
        via: impl Into<String>,
        scheduled: DateTime<Utc>,
        estimated: Option<DateTime<Utc>>,
    ) -> Self {
        let id = id.into();
        let line = line.into();
        let id = if id.trim().is_empty() || id == EMPTY_SERVICE_ID {
            synthesize_id(&line, scheduled)
        } else {
            id
        };
        Self {
            id,
            line,
            destination: destination.into(),
            via: via.into(),
            scheduled,
            estimated,
            display: DisplayTime::Blank,
            computed_at: DateTime::UNIX_EPOCH,
            position: 0,
        }
    }

    /// The sentinel occupying rows with nothing to show.
    pub fn empty() -> Self {
        Self {
            id: EMPTY_SERVICE_ID.to_string(),
            line: String::new(),
            destination: String::new(),
            via: String::new(),
            scheduled: DateTime::UNIX_EPOCH,
            estimated: None,
            display: DisplayTime::Blank,
            computed_at: DateTime::UNIX_EPOCH,
            position: 0,
        }
    }

    pub fn with_position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    pub fn with_display(mut self, formatter: &DisplayTimeFormatter, now: DateTime<Utc>) -> Self {
        self.refresh(formatter, now);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.id == EMPTY_SERVICE_ID
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Text for the number column, `"N.line"` when the index is shown.
    pub fn label(&self, show_index: bool) -> String {
        if show_index && self.position > 0 {
            format!("{}.{}", self.position, self.line)
        } else {
            self.line.clone()
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn via(&self) -> &str {
        &self.via
    }

    pub fn scheduled(&self) -> DateTime<Utc> {
        self.scheduled
    }

    pub fn estimated(&self) -> Option<DateTime<Utc>> {
        self.estimated
    }

    /// Estimated arrival when known, scheduled otherwise.
    pub fn arrival(&self) -> DateTime<Utc> {
        self.estimated.unwrap_or(self.scheduled)
    }

    pub fn display(&self) -> &DisplayTime {
        &self.display
    }

    pub fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }

    pub fn refresh(&mut self, formatter: &DisplayTimeFormatter, now: DateTime<Utc>) {
        if self.is_empty() {
            return;
        }
        self.display = formatter.format(self.arrival(), now);
        self.computed_at = now;
    }

    pub fn needs_refresh(&self, formatter: &DisplayTimeFormatter, now: DateTime<Utc>) -> bool {
        if self.is_empty() {
            return false;
        }
        let Some(limit) = formatter.refresh_after(&self.display) else {
            return false;
        };
        (now - self.computed_at)
            .to_std()
            .is_ok_and(|elapsed| elapsed > limit)
    }
}

fn synthesize_id(line: &str, scheduled: DateTime<Utc>) -> String {
    format!("{}@{}", line.trim(), scheduled.timestamp())
}
