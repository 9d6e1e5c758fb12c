//! Local wall-clock used to anchor relative dates in prompts.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Default timezone for rendered timestamps.
pub const DEFAULT_TIMEZONE: &str = "Asia/Taipei";

const ZONED_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";
const UNZONED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders the current time in a configured IANA timezone.
///
/// An unknown timezone name is not fatal: timestamps are then rendered as
/// naive UTC without an offset.
#[derive(Debug, Clone)]
pub struct LocalClock {
    zone: Option<Tz>,
}

impl LocalClock {
    /// Creates a clock for the IANA timezone `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let zone = match name.trim().parse::<Tz>() {
            Ok(zone) => Some(zone),
            Err(e) => {
                warn!(timezone = name, error = %e, "unknown timezone, using unzoned UTC timestamps");
                None
            }
        };
        Self { zone }
    }

    /// The resolved timezone, if any.
    #[must_use]
    pub fn timezone(&self) -> Option<Tz> {
        self.zone
    }

    /// The current local time.
    #[must_use]
    pub fn now(&self) -> String {
        self.format(Utc::now())
    }

    /// Renders `instant` in the clock's timezone.
    #[must_use]
    pub fn format(&self, instant: DateTime<Utc>) -> String {
        match self.zone {
            Some(zone) => instant.with_timezone(&zone).format(ZONED_FORMAT).to_string(),
            None => instant.naive_utc().format(UNZONED_FORMAT).to_string(),
        }
    }
}

impl Default for LocalClock {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}
