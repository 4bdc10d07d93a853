use std::time::{SystemTime, UNIX_EPOCH};

// Extra field IDs
pub(crate) const EXTENDED_TIMESTAMP_ID: u16 = 0x5455; // "UT" - Extended timestamp

const SECONDS_PER_DAY: i64 = 86400;

/// Represents an MS-DOS timestamp with 2-second precision.
///
/// MS-DOS timestamps are stored as packed 16-bit values for date and time,
/// with a limited range from 1980 to 2107 and 2-second precision for seconds.
/// Instants outside of that range saturate to the nearest representable one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    time: u16,
    date: u16,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00
    pub const MIN: DosDateTime = DosDateTime::new(0, (1 << 5) | 1);

    /// 2107-12-31 23:59:58
    pub const MAX: DosDateTime =
        DosDateTime::new((23 << 11) | (59 << 5) | 29, (127 << 9) | (12 << 5) | 31);

    /// Creates a new MS-DOS datetime from packed time and date values.
    #[must_use]
    pub const fn new(time: u16, date: u16) -> Self {
        Self { time, date }
    }

    /// Converts seconds since the Unix epoch, interpreted as UTC.
    #[must_use]
    pub fn from_unix(seconds: i64) -> Self {
        let (year, month, day, hour, minute, second) = unix_timestamp_to_components(seconds);
        if year < 1980 {
            return Self::MIN;
        } else if year > 2107 {
            return Self::MAX;
        }

        // Pack the date: bits 15-9: year-1980, bits 8-5: month, bits 4-0: day
        let packed_date = (((year - 1980) as u16) << 9) | ((month as u16) << 5) | (day as u16);

        // Pack the time: bits 15-11: hour, bits 10-5: minute, bits 4-0: second/2
        let packed_time = ((hour as u16) << 11) | ((minute as u16) << 5) | ((second as u16) / 2);

        Self::new(packed_time, packed_date)
    }

    #[must_use]
    pub fn from_system_time(time: SystemTime) -> Self {
        Self::from_unix(unix_seconds(time))
    }

    /// Returns the year (1980-2107).
    #[must_use]
    pub fn year(&self) -> u16 {
        ((self.date >> 9) & 0x7f) + 1980
    }

    /// Returns the month (1-12).
    #[must_use]
    pub fn month(&self) -> u8 {
        let raw_month = ((self.date >> 5) & 0x0f) as u8;
        raw_month.clamp(1, 12)
    }

    /// Returns the day of the month (1-31).
    #[must_use]
    pub fn day(&self) -> u8 {
        let raw_day = (self.date & 0x1f) as u8;
        raw_day.max(1)
    }

    /// Returns the hour (0-23).
    #[must_use]
    pub fn hour(&self) -> u8 {
        (((self.time >> 11) & 0x1f) as u8).min(23)
    }

    /// Returns the minute (0-59).
    #[must_use]
    pub fn minute(&self) -> u8 {
        (((self.time >> 5) & 0x3f) as u8).min(59)
    }

    /// Returns the second (0-58, always even due to 2-second precision).
    #[must_use]
    pub fn second(&self) -> u8 {
        (((self.time & 0x1f) * 2) as u8).min(58)
    }

    /// Returns the packed time and date components as (time, date).
    #[must_use]
    pub const fn into_parts(self) -> (u16, u16) {
        (self.time, self.date)
    }
}

/// Seconds since the Unix epoch, negative for instants before it
pub(crate) fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX),
        Err(err) => {
            let before = err.duration();
            let secs = i64::try_from(before.as_secs()).unwrap_or(i64::MAX);

            // Round toward negative infinity so the time of day stays correct
            if before.subsec_nanos() > 0 {
                secs.saturating_neg().saturating_sub(1)
            } else {
                secs.saturating_neg()
            }
        }
    }
}

/// Convert Unix timestamp to broken down date/time components
///
/// Based on Howard Hinnant's date library algorithm `civil_from_days`:
///
/// <https://howardhinnant.github.io/date_algorithms.html#civil_from_days>
fn unix_timestamp_to_components(timestamp: i64) -> (i64, u8, u8, u8, u8, u8) {
    let days = timestamp.div_euclid(SECONDS_PER_DAY);
    let seconds_in_day = timestamp.rem_euclid(SECONDS_PER_DAY);

    let hour = (seconds_in_day / 3600) as u8;
    let minute = ((seconds_in_day % 3600) / 60) as u8;
    let second = (seconds_in_day % 60) as u8;

    // Shift the epoch to 0000-03-01 so leap days fall at the end of a year
    let shifted = days.saturating_add(719468);
    let era = shifted.div_euclid(146097);
    let day_of_era = shifted.rem_euclid(146097);
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36524 - day_of_era / 146096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);

    // Months are shifted: Mar=0, Apr=1, ..., Dec=9, Jan=10, Feb=11
    let month_shifted = (5 * day_of_year + 2) / 153;
    let day = (day_of_year - (153 * month_shifted + 2) / 5 + 1) as u8;
    let month = (if month_shifted < 10 {
        month_shifted + 3
    } else {
        month_shifted - 9
    }) as u8;

    let year = era.saturating_mul(400).saturating_add(year_of_era) + i64::from(month <= 2);
    (year, month, day, hour, minute, second)
}
