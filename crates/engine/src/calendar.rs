//! US equity-options calendar helpers, all in America/New_York.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::US::Eastern;

use condor_core::OptionRight;

const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 3600.0;
const MIN_SECONDS_TO_EXPIRY: i64 = 3600;

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn at_eastern(date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let naive = date.and_time(NaiveTime::from_hms_opt(hour, minute, 0)?);
    Eastern
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Calendar date in New York at `now`.
#[must_use]
pub fn eastern_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&Eastern).date_naive()
}

/// First weekday on or after `today(ET) + dte`, or `None` past the calendar's range.
#[must_use]
pub fn expiration_date(now: DateTime<Utc>, dte: u32) -> Option<NaiveDate> {
    let mut date = eastern_date(now).checked_add_signed(Duration::days(i64::from(dte)))?;
    while is_weekend(date) {
        date = date.succ_opt()?;
    }
    Some(date)
}

/// Years from `now` to the 16:00 ET close on `expiration`, floored at one hour.
#[must_use]
pub fn years_to_expiry(now: DateTime<Utc>, expiration: NaiveDate) -> f64 {
    let seconds = at_eastern(expiration, 16, 0)
        .map_or(MIN_SECONDS_TO_EXPIRY, |close| (close - now).num_seconds())
        .max(MIN_SECONDS_TO_EXPIRY);
    seconds as f64 / SECONDS_PER_YEAR
}

/// Regular session: 09:30-16:00 ET, Monday to Friday. Holidays are not modelled.
#[must_use]
pub fn is_market_open(now: DateTime<Utc>) -> bool {
    let local = now.with_timezone(&Eastern);
    if is_weekend(local.date_naive()) {
        return false;
    }
    let minutes = local.hour() * 60 + local.minute();
    (9 * 60 + 30..16 * 60).contains(&minutes)
}

/// OCC option symbol: root, `YYMMDD`, `C`/`P`, strike x 1000 padded to 8 digits.
///
/// `occ_symbol("SPY", 2025-01-17, Put, 590.0)` is `SPY250117P00590000`.
#[must_use]
pub fn occ_symbol(root: &str, expiration: NaiveDate, right: OptionRight, strike: f64) -> String {
    let strike_thousandths = (strike * 1000.0).round().max(0.0) as u64;
    format!(
        "{root}{}{}{strike_thousandths:08}",
        expiration.format("%y%m%d"),
        right.occ_code()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn occ_symbol_formats_strike_in_thousandths() {
        let exp = NaiveDate::from_ymd_opt(2025, 1, 17).unwrap();
        assert_eq!(
            occ_symbol("SPY", exp, OptionRight::Put, 590.0),
            "SPY250117P00590000"
        );
        assert_eq!(
            occ_symbol("SPXW", exp, OptionRight::Call, 5812.5),
            "SPXW250117C05812500"
        );
    }

    #[test]
    fn zero_dte_on_a_weekday_is_today() {
        // Wednesday 2025-01-15 15:00 UTC = 10:00 ET
        let now = utc(2025, 1, 15, 15, 0);
        assert_eq!(
            expiration_date(now, 0),
            NaiveDate::from_ymd_opt(2025, 1, 15)
        );
    }

    #[test]
    fn expiration_rolls_past_the_weekend() {
        // Friday + 1 day lands on Saturday, rolls to Monday.
        let now = utc(2025, 1, 17, 15, 0);
        assert_eq!(
            expiration_date(now, 1),
            NaiveDate::from_ymd_opt(2025, 1, 20)
        );
    }

    #[test]
    fn expiration_out_of_range_is_none() {
        let now = utc(2025, 1, 15, 15, 0);
        assert_eq!(expiration_date(now, u32::MAX), None);
    }

    #[test]
    fn eastern_date_lags_utc_after_midnight() {
        // 02:00 UTC on the 16th is still the 15th in New York.
        let now = utc(2025, 1, 16, 2, 0);
        assert_eq!(eastern_date(now), NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
    }

    #[test]
    fn time_to_expiry_measures_to_the_close() {
        // 10:00 ET, six hours to the 16:00 close (EST = UTC-5).
        let now = utc(2025, 1, 15, 15, 0);
        let exp = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let expected = 6.0 * 3600.0 / SECONDS_PER_YEAR;
        assert!((years_to_expiry(now, exp) - expected).abs() < 1e-12);
    }

    #[test]
    fn time_to_expiry_is_floored_at_one_hour() {
        let now = utc(2025, 1, 15, 20, 45);
        let exp = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let floor = 3600.0 / SECONDS_PER_YEAR;
        assert!((years_to_expiry(now, exp) - floor).abs() < 1e-12);
    }

    #[test]
    fn market_hours() {
        // Wednesday 09:29 / 09:30 / 15:59 / 16:00 ET in winter.
        assert!(!is_market_open(utc(2025, 1, 15, 14, 29)));
        assert!(is_market_open(utc(2025, 1, 15, 14, 30)));
        assert!(is_market_open(utc(2025, 1, 15, 20, 59)));
        assert!(!is_market_open(utc(2025, 1, 15, 21, 0)));
        // Saturday midday.
        assert!(!is_market_open(utc(2025, 1, 18, 17, 0)));
    }
}
