//! Conversion between civil wall-clock strings and UTC instants.
//!
//! Administrators type start times in the local time of the configured civil
//! zone; entries store absolute UTC instants. The normalizer handles both
//! directions, including daylight-saving offset changes.

use chrono::{
    DateTime, LocalResult, NaiveDateTime, Offset, SecondsFormat, SubsecRound, TimeDelta, TimeZone,
    Utc,
};
use chrono_tz::Tz;
use thiserror::Error;

/// Human-readable list of accepted input formats, used in error messages.
pub const ACCEPTED_FORMATS: &str = "an offset-qualified instant (e.g. 2026-06-21T16:00:00Z or \
     2026-06-21T18:00:00+02:00) or a local datetime YYYY-MM-DDTHH:mm";

/// Format used for local datetime input fields (minute precision).
pub const LOCAL_INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Default display format (day-first, 24h clock).
pub const DEFAULT_DISPLAY_FORMAT: &str = "%d.%m.%Y, %H:%M";

const LOCAL_PARSE_FORMATS: [&str; 3] = [
    LOCAL_INPUT_FORMAT,
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Errors that can occur when interpreting time input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    /// The input was empty or whitespace.
    #[error("empty time input; expected {}", ACCEPTED_FORMATS)]
    Empty,

    /// The input matched none of the accepted formats.
    #[error("unrecognized time {0:?}; expected {formats}", formats = ACCEPTED_FORMATS)]
    Unrecognized(String),

    /// Unknown IANA zone name.
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
}

/// Converts between local strings in a fixed civil zone and UTC instants.
#[derive(Debug, Clone)]
pub struct TimeNormalizer {
    tz: Tz,
    display_format: String,
}

impl TimeNormalizer {
    /// Create a normalizer for the given civil zone.
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            display_format: DEFAULT_DISPLAY_FORMAT.to_string(),
        }
    }

    /// Create a normalizer from an IANA zone name such as `Europe/Berlin`.
    pub fn from_name(name: &str) -> Result<Self, TimeError> {
        let tz = name
            .parse::<Tz>()
            .map_err(|_| TimeError::InvalidTimezone(name.to_string()))?;
        Ok(Self::new(tz))
    }

    /// Set the strftime pattern used by [`format_display`](Self::format_display).
    pub fn with_display_format(mut self, format: impl Into<String>) -> Self {
        self.display_format = format.into();
        self
    }

    /// Get the civil zone.
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Parse user input into a UTC instant.
    ///
    /// Offset-qualified strings are taken as absolute instants. Bare local
    /// datetimes are interpreted as wall-clock time in the civil zone.
    pub fn parse(&self, input: &str) -> Result<DateTime<Utc>, TimeError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TimeError::Empty);
        }

        let instant = match parse_naive(trimmed) {
            Some(naive) => self.resolve_local(naive),
            None => parse_offset_qualified(trimmed)
                .ok_or_else(|| TimeError::Unrecognized(trimmed.to_string()))?,
        };
        // Stored instants carry millisecond precision.
        Ok(instant.trunc_subsecs(3))
    }

    /// Resolve a wall-clock time in the civil zone to a UTC instant.
    ///
    /// Ambiguous times (autumn fall-back) resolve to the earlier instant.
    /// Nonexistent times (spring-forward gap) use the offset in force before
    /// the gap, which lands the same distance past the transition.
    pub fn resolve_local(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            LocalResult::None => {
                let before_gap = self
                    .tz
                    .offset_from_utc_datetime(&(naive - TimeDelta::hours(24)))
                    .fix();
                let offset = TimeDelta::seconds(i64::from(before_gap.local_minus_utc()));
                Utc.from_utc_datetime(&(naive - offset))
            }
        }
    }

    /// Render an instant as a local input string (`YYYY-MM-DDTHH:mm`).
    pub fn to_local_input(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.tz)
            .format(LOCAL_INPUT_FORMAT)
            .to_string()
    }

    /// Render an instant for display in the civil zone.
    pub fn format_display(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.tz)
            .format(&self.display_format)
            .to_string()
    }
}

/// Render an instant as a fixed-width UTC ISO string with milliseconds.
pub fn to_iso(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    LOCAL_PARSE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
}

fn parse_offset_qualified(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // RFC 3339 requires seconds; accept the minute-precision forms too.
    if let Some(naive) = s.strip_suffix(['Z', 'z']).and_then(parse_naive) {
        return Some(naive.and_utc());
    }

    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M%:z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
