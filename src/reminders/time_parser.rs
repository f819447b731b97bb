//! Normalization of human-entered reminder times.
//!
//! Users type times on a 12-hour clock ("7:30 PM"). Everything downstream works
//! with a 24-hour [`ReminderTime`], and the database stores the `"HH:MM"` form.

use super::error::TimeParseError;
use crate::todo_store::Todo;
use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

lazy_static! {
    static ref TWELVE_HOUR_CLOCK: Regex = Regex::new(r"^(\d{1,2}):(\d{2})\s+([AaPp][Mm])$").unwrap();
    static ref TWENTY_FOUR_HOUR_CLOCK: Regex = Regex::new(r"^(\d{2}):(\d{2})$").unwrap();
}

/// A time of day on the 24-hour clock, minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReminderTime {
    hour: u32,
    minute: u32,
}

impl ReminderTime {
    pub const MIDNIGHT: ReminderTime = ReminderTime { hour: 0, minute: 0 };

    pub fn new(hour: u32, minute: u32) -> Result<Self, TimeParseError> {
        if hour > 23 {
            return Err(TimeParseError::HourOutOfRange(hour));
        }
        if minute > 59 {
            return Err(TimeParseError::MinuteOutOfRange(minute));
        }
        Ok(Self { hour, minute })
    }

    /// Parses a 12-hour clock string such as `"7:30 PM"` or `"12:05 am"`.
    ///
    /// Hour and minute ranges are checked before the meridiem is applied, so
    /// `"13:00 PM"` is rejected instead of wrapping around.
    pub fn parse(input: &str) -> Result<Self, TimeParseError> {
        let trimmed = input.trim();
        let captures = TWELVE_HOUR_CLOCK
            .captures(trimmed)
            .ok_or_else(|| TimeParseError::InvalidFormat(input.to_string()))?;

        let hour: u32 = captures[1]
            .parse()
            .map_err(|_| TimeParseError::InvalidFormat(input.to_string()))?;
        let minute: u32 = captures[2]
            .parse()
            .map_err(|_| TimeParseError::InvalidFormat(input.to_string()))?;

        if !(1..=12).contains(&hour) {
            return Err(TimeParseError::HourOutOfRange(hour));
        }
        if minute > 59 {
            return Err(TimeParseError::MinuteOutOfRange(minute));
        }

        let is_pm = captures[3].eq_ignore_ascii_case("pm");
        let hour = match (hour, is_pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };

        Ok(Self { hour, minute })
    }

    /// Parses the `"HH:MM"` storage form.
    pub fn from_hhmm(input: &str) -> Result<Self, TimeParseError> {
        let captures = TWENTY_FOUR_HOUR_CLOCK
            .captures(input)
            .ok_or_else(|| TimeParseError::InvalidFormat(input.to_string()))?;
        let hour: u32 = captures[1]
            .parse()
            .map_err(|_| TimeParseError::InvalidFormat(input.to_string()))?;
        let minute: u32 = captures[2]
            .parse()
            .map_err(|_| TimeParseError::InvalidFormat(input.to_string()))?;
        Self::new(hour, minute)
    }

    pub fn to_hhmm(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn as_naive_time(&self) -> NaiveTime {
        // Both fields are range-checked on construction.
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for ReminderTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (hour, meridiem) = match self.hour {
            0 => (12, "AM"),
            h @ 1..=11 => (h, "AM"),
            12 => (12, "PM"),
            h => (h - 12, "PM"),
        };
        write!(f, "{}:{:02} {}", hour, self.minute, meridiem)
    }
}

impl FromStr for ReminderTime {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Combines `date` and `time` in the server's local time zone.
pub fn trigger_instant(date: NaiveDate, time: ReminderTime) -> DateTime<Utc> {
    trigger_instant_in(&Local, date, time)
}

/// Combines `date` and `time` in `tz`.
///
/// A wall-clock time that occurs twice (clocks going back) resolves to the
/// earlier instant. One that never occurs (clocks going forward) is moved one
/// hour later.
pub fn trigger_instant_in<Tz: TimeZone>(tz: &Tz, date: NaiveDate, time: ReminderTime) -> DateTime<Utc> {
    let naive = date.and_time(time.as_naive_time());
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(instant) => instant.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = naive + chrono::Duration::hours(1);
            tz.from_local_datetime(&shifted)
                .earliest()
                .map(|instant| instant.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
        }
    }
}

/// When the reminder for `todo` should fire, or None if it has no reminder.
///
/// Todos without a due date are reminded on `today`.
pub fn todo_trigger_instant(todo: &Todo, today: NaiveDate) -> Option<DateTime<Utc>> {
    if !todo.reminder {
        return None;
    }
    let time = todo.reminder_time?;
    Some(trigger_instant(todo.due_date.unwrap_or(today), time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::todo_store::Priority;
    use chrono::FixedOffset;

    fn hm(input: &str) -> (u32, u32) {
        let time = ReminderTime::parse(input).unwrap();
        (time.hour(), time.minute())
    }

    #[test]
    fn test_parse_midnight_and_noon() {
        assert_eq!(hm("12:00 AM"), (0, 0));
        assert_eq!(hm("12:00 PM"), (12, 0));
    }

    #[test]
    fn test_parse_afternoon_and_morning() {
        assert_eq!(hm("1:05 PM"), (13, 5));
        assert_eq!(hm("7:30 PM"), (19, 30));
        assert_eq!(hm("11:59 PM"), (23, 59));
        assert_eq!(hm("9:15 AM"), (9, 15));
        assert_eq!(hm("09:15 AM"), (9, 15));
    }

    #[test]
    fn test_parse_is_lenient_about_case_and_spacing() {
        assert_eq!(hm("7:30 pm"), (19, 30));
        assert_eq!(hm("7:30 Pm"), (19, 30));
        assert_eq!(hm("  7:30   PM "), (19, 30));
    }

    #[test]
    fn test_parse_rejects_out_of_range_hour_before_meridiem() {
        assert_eq!(
            ReminderTime::parse("13:00 PM"),
            Err(TimeParseError::HourOutOfRange(13))
        );
        assert_eq!(
            ReminderTime::parse("0:30 AM"),
            Err(TimeParseError::HourOutOfRange(0))
        );
        assert_eq!(
            ReminderTime::parse("7:60 AM"),
            Err(TimeParseError::MinuteOutOfRange(60))
        );
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        for input in ["", "7:30", "19:30", "7.30 PM", "7:3 PM", "7:30PM", "7:30 XM", "noon"] {
            assert!(
                matches!(
                    ReminderTime::parse(input),
                    Err(TimeParseError::InvalidFormat(_))
                ),
                "expected {:?} to be rejected",
                input
            );
        }
    }

    #[test]
    fn test_from_str() {
        let time: ReminderTime = "7:30 PM".parse().unwrap();
        assert_eq!(time, ReminderTime::new(19, 30).unwrap());
    }

    #[test]
    fn test_display_uses_twelve_hour_clock() {
        assert_eq!(ReminderTime::new(0, 0).unwrap().to_string(), "12:00 AM");
        assert_eq!(ReminderTime::new(12, 0).unwrap().to_string(), "12:00 PM");
        assert_eq!(ReminderTime::new(13, 5).unwrap().to_string(), "1:05 PM");
        assert_eq!(ReminderTime::new(9, 7).unwrap().to_string(), "9:07 AM");

        let time = ReminderTime::new(19, 30).unwrap();
        assert_eq!(ReminderTime::parse(&time.to_string()).unwrap(), time);
    }

    #[test]
    fn test_storage_form() {
        let time = ReminderTime::new(7, 5).unwrap();
        assert_eq!(time.to_hhmm(), "07:05");
        assert_eq!(ReminderTime::from_hhmm("07:05").unwrap(), time);
        assert_eq!(
            ReminderTime::from_hhmm("24:00"),
            Err(TimeParseError::HourOutOfRange(24))
        );
        assert!(ReminderTime::from_hhmm("7:05 PM").is_err());
    }

    #[test]
    fn test_new_validates_ranges() {
        assert!(ReminderTime::new(23, 59).is_ok());
        assert_eq!(
            ReminderTime::new(24, 0),
            Err(TimeParseError::HourOutOfRange(24))
        );
        assert_eq!(
            ReminderTime::new(0, 60),
            Err(TimeParseError::MinuteOutOfRange(60))
        );
    }

    #[test]
    fn test_trigger_instant_in_fixed_offset() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let time = ReminderTime::new(19, 30).unwrap();

        let utc = trigger_instant_in(&Utc, date, time);
        assert_eq!(utc.to_rfc3339(), "2024-06-15T19:30:00+00:00");

        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let shifted = trigger_instant_in(&plus_two, date, time);
        assert_eq!(shifted.to_rfc3339(), "2024-06-15T17:30:00+00:00");
    }

    #[test]
    fn test_trigger_instant_matches_local_wall_clock() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let time = ReminderTime::new(19, 30).unwrap();
        let local = trigger_instant(date, time).with_timezone(&Local);
        assert_eq!(local.date_naive(), date);
        assert_eq!(local.time(), time.as_naive_time());
    }

    #[test]
    fn test_todo_trigger_instant() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let due = NaiveDate::from_ymd_opt(2024, 6, 20).unwrap();
        let time = ReminderTime::new(8, 0).unwrap();
        let mut todo = Todo {
            id: 1,
            user_id: 1,
            title: "Renew passport".to_string(),
            description: None,
            due_date: Some(due),
            priority: Priority::Medium,
            completed: false,
            reminder: true,
            reminder_time: Some(time),
        };

        assert_eq!(todo_trigger_instant(&todo, today), Some(trigger_instant(due, time)));

        todo.due_date = None;
        assert_eq!(todo_trigger_instant(&todo, today), Some(trigger_instant(today, time)));

        todo.reminder = false;
        assert_eq!(todo_trigger_instant(&todo, today), None);

        todo.reminder = true;
        todo.reminder_time = None;
        assert_eq!(todo_trigger_instant(&todo, today), None);
    }
}
