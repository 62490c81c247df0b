//! Client-side input masks and validation.
//!
//! Messages are the exact strings shown to the user, so screens can display a
//! [`ValidationError`] directly.

use carelink_wire::RegistrationPayload;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please fill in all fields")]
    MissingFields,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Please enter date in YYYY-MM-DD format")]
    DateFormat,

    #[error("Please enter time in HH:MM format (24-hour)")]
    TimeFormat,

    #[error("Please enter a valid date")]
    InvalidDate,

    #[error("Please enter a valid time (00:00 - 23:59)")]
    InvalidTime,

    #[error("Unknown service type: {0}")]
    UnknownService(String),
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Mask free text into `YYYY`, `YYYY-MM` or `YYYY-MM-DD` as digits are typed.
pub fn format_date_input(text: &str) -> String {
    let digits: String = text.chars().filter(char::is_ascii_digit).take(8).collect();
    match digits.len() {
        0..=4 => digits,
        5..=6 => format!("{}-{}", &digits[..4], &digits[4..]),
        _ => format!("{}-{}-{}", &digits[..4], &digits[4..6], &digits[6..]),
    }
}

/// Mask free text into `HH` or `HH:MM` as digits are typed.
pub fn format_time_input(text: &str) -> String {
    let digits: String = text.chars().filter(char::is_ascii_digit).take(4).collect();
    match digits.len() {
        0..=2 => digits,
        _ => format!("{}:{}", &digits[..2], &digits[2..]),
    }
}

/// Login form check: both fields present and something email-shaped.
pub fn validate_login(email: &str, password: &str) -> ValidationResult<()> {
    if email.is_empty() || password.is_empty() {
        return Err(ValidationError::MissingFields);
    }
    if !email.contains('@') {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

/// Registration form check: every field present plus the login rules.
pub fn validate_registration(payload: &RegistrationPayload) -> ValidationResult<()> {
    if payload.full_name.trim().is_empty() || payload.phone_number.trim().is_empty() {
        return Err(ValidationError::MissingFields);
    }
    validate_login(&payload.email, &payload.password)
}

/// Validate a `YYYY-MM-DD` string as a real calendar date.
pub fn validate_date(date: &str) -> ValidationResult<NaiveDate> {
    if !matches_shape(date, "dddd-dd-dd") {
        return Err(ValidationError::DateFormat);
    }
    parse_calendar_date(date)
}

/// Validate an `HH:MM` string as a 24-hour clock time.
pub fn validate_time(time: &str) -> ValidationResult<NaiveTime> {
    if !matches_shape(time, "dd:dd") {
        return Err(ValidationError::TimeFormat);
    }
    parse_clock_time(time)
}

/// Validate a date and a time together.
///
/// Both shapes are checked before either value, so a malformed time is
/// reported ahead of an impossible date.
pub fn validate_schedule(date: &str, time: &str) -> ValidationResult<NaiveDateTime> {
    if !matches_shape(date, "dddd-dd-dd") {
        return Err(ValidationError::DateFormat);
    }
    if !matches_shape(time, "dd:dd") {
        return Err(ValidationError::TimeFormat);
    }
    let date = parse_calendar_date(date)?;
    let time = parse_clock_time(time)?;
    Ok(date.and_time(time))
}

/// Interpret a wall-clock schedule in `offset` and convert it to UTC.
pub fn to_utc(schedule: NaiveDateTime, offset: FixedOffset) -> ValidationResult<DateTime<Utc>> {
    schedule
        .and_local_timezone(offset)
        .single()
        .map(|t| t.with_timezone(&Utc))
        .ok_or(ValidationError::InvalidDate)
}

/// ISO-8601 with milliseconds and a `Z` suffix, as the backend expects.
pub fn format_iso_utc(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// `d` matches one ASCII digit; any other shape byte matches itself.
fn matches_shape(s: &str, shape: &str) -> bool {
    s.len() == shape.len()
        && s.bytes().zip(shape.bytes()).all(|(c, p)| match p {
            b'd' => c.is_ascii_digit(),
            _ => c == p,
        })
}

fn parse_calendar_date(date: &str) -> ValidationResult<NaiveDate> {
    let year: i32 = number(&date[0..4])?;
    let month: u32 = number(&date[5..7])?;
    let day: u32 = number(&date[8..10])?;

    // Two-digit years are not accepted.
    if year < 100 {
        return Err(ValidationError::InvalidDate);
    }
    NaiveDate::from_ymd_opt(year, month, day).ok_or(ValidationError::InvalidDate)
}

fn parse_clock_time(time: &str) -> ValidationResult<NaiveTime> {
    let hours: u32 = number(&time[0..2])?;
    let minutes: u32 = number(&time[3..5])?;

    if hours > 23 || minutes > 59 {
        return Err(ValidationError::InvalidTime);
    }
    NaiveTime::from_hms_opt(hours, minutes, 0).ok_or(ValidationError::InvalidTime)
}

fn number<T: std::str::FromStr>(digits: &str) -> ValidationResult<T> {
    digits.parse().map_err(|_| ValidationError::InvalidDate)
}
