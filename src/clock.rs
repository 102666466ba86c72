use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Offset, Utc};

/// Cached delta between the local clock and the database server clock.
///
/// Computed once per connection-URL generation from a single `SELECT NOW()`
/// round trip (see [`crate::DbSession::server_time`]). Stored datetimes are
/// shifted to local display time with [`ClockOffset::to_local`]; datetime
/// parameters are shifted back toward server-relative storage with
/// [`ClockOffset::to_server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockOffset {
    offset: Duration,
}

impl ClockOffset {
    /// Wrap an already-known offset (local time minus server time).
    #[must_use]
    pub fn new(offset: Duration) -> Self {
        ClockOffset { offset }
    }

    /// Derive the offset from the server's current time.
    ///
    /// The server-vs-UTC delta is truncated to whole hours, so sub-hour
    /// network latency and clock skew never leak into the cached offset;
    /// what remains is the timezone difference between this process and the
    /// server, plus any whole-hour clock misconfiguration.
    #[must_use]
    pub fn from_server_now(server_now: NaiveDateTime) -> Self {
        let local = Local::now();
        let tz_offset = Duration::seconds(i64::from(local.offset().fix().local_minus_utc()));
        let server_vs_utc = server_now - Utc::now().naive_utc();
        let offset = tz_offset - Duration::hours(server_vs_utc.num_hours());
        ClockOffset { offset }
    }

    /// Local time minus the cached offset, i.e. the server's current time
    /// without another round trip.
    #[must_use]
    pub fn server_now(&self) -> NaiveDateTime {
        Local::now().naive_local() - self.offset
    }

    /// Shift a stored datetime to local display time.
    ///
    /// The shift is skipped (the input is returned unchanged) when the
    /// result would overflow or land at or before `0001-01-01 00:00:00`;
    /// an underflowing conversion is left unconverted rather than clamped.
    #[must_use]
    pub fn to_local(&self, t: NaiveDateTime) -> NaiveDateTime {
        match t.checked_add_signed(self.offset) {
            Some(shifted) if shifted > epoch_floor() => shifted,
            _ => t,
        }
    }

    /// Shift a local datetime toward server-relative storage time, under the
    /// same underflow rule as [`ClockOffset::to_local`].
    #[must_use]
    pub fn to_server(&self, t: NaiveDateTime) -> NaiveDateTime {
        match t.checked_sub_signed(self.offset) {
            Some(shifted) if shifted > epoch_floor() => shifted,
            _ => t,
        }
    }

    #[must_use]
    pub fn as_duration(&self) -> Duration {
        self.offset
    }
}

fn epoch_floor() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}
