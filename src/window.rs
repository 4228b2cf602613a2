//! Modification-time window resolution.
//!
//! Turns `--since`, `--until` and `--interval` into a closed epoch-second
//! interval, or no bound at all. Timestamps are interpreted in the local
//! offset captured at startup.

use thiserror::Error;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("invalid time format {0:?}; expected 'YYYY-MM-DD HH:MM:SS'")]
    Timestamp(String),
    #[error("invalid --interval {0:?}, expected number + unit: 10s, 5m, 2h, 1d")]
    IntervalFormat(String),
    #[error("invalid --interval unit in {0:?}, use: s, m, h, d")]
    IntervalUnit(String),
    #[error("invalid --interval number in {0:?}, expected e.g. 10s, 5m, 2h, 1d")]
    IntervalNumber(String),
    #[error("--interval must be > 0, got {0:?}")]
    IntervalNotPositive(String),
    #[error("--interval {0:?} is too large")]
    IntervalTooLarge(String),
    #[error("time window from --interval {0:?} is out of range")]
    WindowOutOfRange(String),
    #[error("either --since or --until must be set with --interval")]
    IntervalWithoutAnchor,
    #[error("cannot use --since, --until and --interval together")]
    OverSpecified,
    #[error("--since and --until must be given together (or use --interval)")]
    HalfOpen,
    #[error("since time must be before until time")]
    Inverted,
}

/// Inclusive `[since, until]` bound in epoch seconds.
///
/// Either both sides are set or neither is; construction goes through
/// [`TimeWindow::resolve`] or [`TimeWindow::between`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    bounds: Option<(i64, i64)>,
}

impl TimeWindow {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn between(since: i64, until: i64) -> Result<Self, InputError> {
        if since > until {
            return Err(InputError::Inverted);
        }
        Ok(Self {
            bounds: Some((since, until)),
        })
    }

    /// Resolve the user's time arguments.
    ///
    /// - interval + since: `until = since + interval`
    /// - interval + until: `since = until - interval`
    /// - no interval: since and until are both given or both absent
    pub fn resolve(
        since: Option<&str>,
        until: Option<&str>,
        interval: Option<&str>,
        offset: UtcOffset,
    ) -> Result<Self, InputError> {
        let since = since.map(|s| parse_local_timestamp(s, offset)).transpose()?;
        let until = until.map(|s| parse_local_timestamp(s, offset)).transpose()?;
        let out_of_range =
            || InputError::WindowOutOfRange(interval.unwrap_or_default().to_string());
        let interval = interval.map(parse_interval).transpose()?;

        let window = match (since, until, interval) {
            (Some(_), Some(_), Some(_)) => return Err(InputError::OverSpecified),
            (Some(s), None, Some(i)) => {
                Self::between(s, s.checked_add(i).ok_or_else(out_of_range)?)?
            }
            (None, Some(u), Some(i)) => {
                Self::between(u.checked_sub(i).ok_or_else(out_of_range)?, u)?
            }
            (None, None, Some(_)) => return Err(InputError::IntervalWithoutAnchor),
            (Some(s), Some(u), None) => Self::between(s, u)?,
            (None, None, None) => Self::unbounded(),
            (Some(_), None, None) | (None, Some(_), None) => return Err(InputError::HalfOpen),
        };

        tracing::debug!(?window, "resolved time window");
        Ok(window)
    }

    pub fn since(&self) -> Option<i64> {
        self.bounds.map(|(s, _)| s)
    }

    pub fn until(&self) -> Option<i64> {
        self.bounds.map(|(_, u)| u)
    }

    /// Whether a file with the given modification time passes the window.
    ///
    /// An unknown time passes only when there is no bound to test against.
    pub fn admits(&self, mtime: Option<i64>) -> bool {
        match (self.bounds, mtime) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some((since, until)), Some(t)) => since <= t && t <= until,
        }
    }
}

/// Parse `YYYY-MM-DD HH:MM:SS` in the given offset into epoch seconds.
pub fn parse_local_timestamp(value: &str, offset: UtcOffset) -> Result<i64, InputError> {
    let parsed = PrimitiveDateTime::parse(value.trim(), TIMESTAMP_FORMAT)
        .map_err(|_| InputError::Timestamp(value.to_string()))?;
    Ok(parsed.assume_offset(offset).unix_timestamp())
}

/// Parse an interval like `10s`, `5m`, `1.5h` or `2d` into whole seconds.
///
/// Fractional seconds round up, so a positive interval never becomes zero.
pub fn parse_interval(value: &str) -> Result<i64, InputError> {
    let s = value.trim().to_lowercase();
    let unit = match s.chars().last() {
        Some(unit) if s.chars().count() >= 2 => unit,
        _ => return Err(InputError::IntervalFormat(value.to_string())),
    };

    let multiplier: f64 = match unit {
        's' => 1.0,
        'm' => 60.0,
        'h' => 3_600.0,
        'd' => 86_400.0,
        _ => return Err(InputError::IntervalUnit(value.to_string())),
    };

    let number = &s[..s.len() - unit.len_utf8()];

    let amount: f64 = number
        .trim()
        .parse()
        .map_err(|_| InputError::IntervalNumber(value.to_string()))?;
    if !amount.is_finite() {
        return Err(InputError::IntervalNumber(value.to_string()));
    }
    if amount <= 0.0 {
        return Err(InputError::IntervalNotPositive(value.to_string()));
    }

    let seconds = (amount * multiplier).ceil();
    if seconds >= i64::MAX as f64 {
        return Err(InputError::IntervalTooLarge(value.to_string()));
    }
    Ok(seconds as i64)
}

/// Render epoch seconds as `YYYY-MM-DD HH:MM:SS` in the given offset.
///
/// Unknown times render as `N/A`.
pub fn format_timestamp(mtime: Option<i64>, offset: UtcOffset) -> String {
    mtime
        .and_then(|t| OffsetDateTime::from_unix_timestamp(t).ok())
        .and_then(|dt| dt.to_offset(offset).format(TIMESTAMP_FORMAT).ok())
        .unwrap_or_else(|| "N/A".to_string())
}

/// The local UTC offset, or UTC when the platform cannot report it.
///
/// Must be called before any threads are spawned.
pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
