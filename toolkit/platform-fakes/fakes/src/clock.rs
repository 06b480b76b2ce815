//! Clock accessors returning the current point in time.
//!
//! This module defines the [Clock] contract and two implementations:
//! - [SystemClock]: reads the system wall clock on every call
//! - [FixedClock]: always returns the same pre-configured point in time
//!
//! Any `Fn() -> Timestamp` is a [Clock] as well, so closures can be injected directly.
//!
//! # Example
//!
//! ```
//! use platform_fakes::clock::*;
//! let clock = fixed_clock(TEST_DATE);
//! assert_eq!(clock.now().to_string(), "1001-01-01T00:00:00.000Z");
//! ```

use std::fmt;
use time::{
	Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
	format_description::{
		BorrowedFormatItem,
		well_known::{Iso8601, Rfc2822, Rfc3339},
	},
	macros::{datetime, format_description},
};

/// Well-known date used as a stable default in tests.
pub const TEST_DATE: &str = "1001-01-01T00:00:00.000Z";

/// Pre-built clock always returning [TEST_DATE].
pub const TEST_CLOCK: FixedClock =
	FixedClock::at(Timestamp(Some(datetime!(1001-01-01 00:00:00 UTC))));

const ISO_MILLIS_FORMAT: &[BorrowedFormatItem<'static>] =
	format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

/// A point in time, or the "invalid date" sentinel produced by unparseable date strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp(Option<OffsetDateTime>);

impl Timestamp {
	/// The "invalid date" sentinel
	pub const INVALID: Self = Self(None);

	/// Wraps a valid point in time, truncated to millisecond precision
	pub fn from_datetime(datetime: OffsetDateTime) -> Self {
		let sub_millis = datetime.nanosecond() % 1_000_000;
		Self(Some(datetime - time::Duration::nanoseconds(i64::from(sub_millis))))
	}

	/// Parses a date string.
	///
	/// The date time string format `[+-YY]YYYY[-MM[-DD]][THH:mm[:ss[.sss]][Z|+HH:mm|-HH:mm]]`
	/// is tried first, then RFC 3339, ISO 8601 and RFC 2822. Date-times without an offset are
	/// read as UTC. Anything else yields [Timestamp::INVALID].
	pub fn parse(date: &str) -> Self {
		let date = date.trim();
		if let Some(datetime) = parse_date_time_string(date) {
			return Self::from_datetime(datetime);
		}
		OffsetDateTime::parse(date, &Rfc3339)
			.or_else(|_| OffsetDateTime::parse(date, &Iso8601::DEFAULT))
			.or_else(|_| PrimitiveDateTime::parse(date, &Iso8601::DEFAULT).map(|dt| dt.assume_utc()))
			.or_else(|_| Date::parse(date, &Iso8601::DEFAULT).map(|d| d.midnight().assume_utc()))
			.or_else(|_| OffsetDateTime::parse(date, &Rfc2822))
			.map(Self::from_datetime)
			.unwrap_or(Self::INVALID)
	}

	/// Reads the system wall clock
	pub fn now() -> Self {
		Self::from_datetime(OffsetDateTime::now_utc())
	}

	/// Returns `false` for the "invalid date" sentinel
	pub fn is_valid(&self) -> bool {
		self.0.is_some()
	}

	pub fn as_datetime(&self) -> Option<OffsetDateTime> {
		self.0
	}

	/// Milliseconds since Unix epoch, negative before 1970
	pub fn unix_millis(&self) -> Option<i64> {
		let millis = self.0?.unix_timestamp_nanos() / 1_000_000;
		i64::try_from(millis).ok()
	}
}

struct Cursor<'a>(&'a str);

impl Cursor<'_> {
	fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	fn eat(&mut self, expected: char) -> bool {
		match self.0.strip_prefix(expected) {
			Some(rest) => {
				self.0 = rest;
				true
			},
			None => false,
		}
	}

	fn sign(&mut self) -> Option<i32> {
		if self.eat('+') {
			Some(1)
		} else if self.eat('-') {
			Some(-1)
		} else {
			None
		}
	}

	fn digits(&mut self, count: usize) -> Option<i32> {
		let digits = self.0.get(..count).filter(|d| d.bytes().all(|b| b.is_ascii_digit()))?;
		self.0 = &self.0[count..];
		digits.parse().ok()
	}

	/// Reads a fraction of a second as whole milliseconds
	fn fraction_millis(&mut self) -> Option<i32> {
		let len = self.0.bytes().take_while(u8::is_ascii_digit).count();
		if len == 0 {
			return None;
		}
		let (fraction, rest) = self.0.split_at(len);
		self.0 = rest;
		format!("{fraction:0<3}")[..3].parse().ok()
	}
}

/// Reads `[+-YY]YYYY[-MM[-DD]][THH:mm[:ss[.sss]][Z|+HH:mm|-HH:mm]]`.
///
/// Missing month and day default to 1, a missing offset to UTC. `T24:00` is midnight of the
/// following day. Out-of-bounds fields reject the whole string.
fn parse_date_time_string(input: &str) -> Option<OffsetDateTime> {
	let mut cursor = Cursor(input);
	let year = match cursor.sign() {
		Some(sign) => match cursor.digits(6)? {
			0 if sign < 0 => return None,
			year => sign * year,
		},
		None => cursor.digits(4)?,
	};
	let (mut month, mut day) = (1, 1);
	if cursor.eat('-') {
		month = cursor.digits(2)?;
		if cursor.eat('-') {
			day = cursor.digits(2)?;
		}
	}
	let month = Month::try_from(u8::try_from(month).ok()?).ok()?;
	let date = Date::from_calendar_date(year, month, u8::try_from(day).ok()?).ok()?;
	if cursor.is_empty() {
		return Some(date.midnight().assume_utc());
	}

	if !cursor.eat('T') {
		return None;
	}
	let hour = cursor.digits(2)?;
	if !cursor.eat(':') {
		return None;
	}
	let minute = cursor.digits(2)?;
	let second = if cursor.eat(':') { cursor.digits(2)? } else { 0 };
	let millis = if cursor.eat('.') { cursor.fraction_millis()? } else { 0 };
	let offset = if cursor.eat('Z') {
		UtcOffset::UTC
	} else if let Some(sign) = cursor.sign() {
		let hours = cursor.digits(2)?;
		if !cursor.eat(':') {
			return None;
		}
		let minutes = cursor.digits(2)?;
		UtcOffset::from_hms(
			i8::try_from(sign * hours).ok()?,
			i8::try_from(sign * minutes).ok()?,
			0,
		)
		.ok()?
	} else {
		UtcOffset::UTC
	};
	if !cursor.is_empty() {
		return None;
	}

	let (date, hour) = match (hour, minute, second, millis) {
		(24, 0, 0, 0) => (date.next_day()?, 0),
		_ => (date, hour),
	};
	let time = Time::from_hms_milli(
		u8::try_from(hour).ok()?,
		u8::try_from(minute).ok()?,
		u8::try_from(second).ok()?,
		u16::try_from(millis).ok()?,
	)
	.ok()?;
	Some(PrimitiveDateTime::new(date, time).assume_offset(offset))
}

impl From<OffsetDateTime> for Timestamp {
	fn from(datetime: OffsetDateTime) -> Self {
		Self::from_datetime(datetime)
	}
}

impl fmt::Display for Timestamp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let Some(datetime) = self.0 else { return f.write_str("Invalid Date") };
		let formatted = datetime
			.to_offset(time::UtcOffset::UTC)
			.format(ISO_MILLIS_FORMAT)
			.map_err(|_| fmt::Error)?;
		f.write_str(&formatted)
	}
}

/// A source of the current point in time.
pub trait Clock: Send + Sync {
	/// Returns the current point in time
	fn now(&self) -> Timestamp;
}

impl<F> Clock for F
where
	F: Fn() -> Timestamp + Send + Sync,
{
	fn now(&self) -> Timestamp {
		self()
	}
}

/// A system clock based accessor
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Timestamp {
		Timestamp::now()
	}
}

/// An accessor returning the same point in time on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
	/// The value returned by all `now` calls
	pub timestamp: Timestamp,
}

impl FixedClock {
	pub const fn at(timestamp: Timestamp) -> Self {
		Self { timestamp }
	}
}

impl Clock for FixedClock {
	fn now(&self) -> Timestamp {
		self.timestamp
	}
}

/// Creates a clock reading the current wall-clock time on each call.
pub fn now_clock() -> SystemClock {
	SystemClock
}

/// Creates a clock always returning `date` parsed with [Timestamp::parse].
///
/// An unparseable `date` does not fail: the clock returns [Timestamp::INVALID].
pub fn fixed_clock(date: &str) -> FixedClock {
	let timestamp = Timestamp::parse(date);
	if !timestamp.is_valid() {
		log::debug!("fixed clock created with unparseable date '{date}'");
	}
	FixedClock::at(timestamp)
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use proptest::prelude::*;
	use std::time::Duration;

	#[test]
	fn test_clock_matches_parsed_test_date() {
		assert_eq!(TEST_CLOCK, fixed_clock(TEST_DATE));
		assert_eq!(TEST_CLOCK.now().to_string(), TEST_DATE);
		assert_eq!(TEST_CLOCK.now().unix_millis(), Some(-30_578_688_000_000));
	}

	#[test]
	fn fixed_clock_returns_same_value_on_every_call() {
		let clock = fixed_clock("2024-02-29T12:30:15.250+02:00");
		let first = clock.now();
		for _ in 0..10 {
			assert_eq!(clock.now(), first);
		}
		assert_eq!(first.to_string(), "2024-02-29T10:30:15.250Z");
	}

	#[test]
	fn invalid_date_yields_sentinel() {
		let clock = fixed_clock("not a date");
		assert_eq!(clock.now(), Timestamp::INVALID);
		assert!(!clock.now().is_valid());
		assert_eq!(clock.now().unix_millis(), None);
		assert_eq!(clock.now().to_string(), "Invalid Date");
	}

	#[test]
	fn parses_date_time_string_format() {
		for (input, expected) in [
			("2024", "2024-01-01T00:00:00.000Z"),
			("2024-06", "2024-06-01T00:00:00.000Z"),
			("2024-06-15", "2024-06-15T00:00:00.000Z"),
			("2024T10:00Z", "2024-01-01T10:00:00.000Z"),
			("2024-01-01T10:00Z", "2024-01-01T10:00:00.000Z"),
			("2024-01-01T10:00", "2024-01-01T10:00:00.000Z"),
			("2024-01-01T10:00:30Z", "2024-01-01T10:00:30.000Z"),
			("2024-01-01T10:00:30.123Z", "2024-01-01T10:00:30.123Z"),
			("2024-01-01T10:00:30.1Z", "2024-01-01T10:00:30.100Z"),
			("2024-01-01T10:00+02:00", "2024-01-01T08:00:00.000Z"),
			("2024-01-01T10:00:00-05:30", "2024-01-01T15:30:00.000Z"),
			("+002024-06-15T00:00:00.000Z", "2024-06-15T00:00:00.000Z"),
			("+002024", "2024-01-01T00:00:00.000Z"),
			("2024-12-31T24:00Z", "2025-01-01T00:00:00.000Z"),
		] {
			assert_eq!(Timestamp::parse(input).to_string(), expected, "parsing '{input}'");
		}
	}

	#[test]
	fn out_of_bounds_fields_yield_sentinel() {
		for input in [
			"",
			"2024-13",
			"2024-00-10",
			"2024-02-30",
			"2024-02-30T00:00:00Z",
			"2024-01-01T25:00Z",
			"2024-01-01T24:00:01Z",
			"2024-01-01T10:60Z",
		] {
			assert_eq!(Timestamp::parse(input), Timestamp::INVALID, "parsing '{input}'");
		}
		assert_eq!(parse_date_time_string("-000000-01-01T00:00:00Z"), None);
	}

	#[test]
	fn parses_date_only_as_utc_midnight() {
		assert_eq!(Timestamp::parse("1970-01-02").unix_millis(), Some(86_400_000));
	}

	#[test]
	fn sub_millisecond_precision_is_truncated() {
		assert_eq!(
			fixed_clock("2024-01-01T00:00:00.123456Z"),
			fixed_clock("2024-01-01T00:00:00.123Z")
		);
		let before_epoch = Timestamp::from_datetime(datetime!(1969-12-31 23:59:59.9999 UTC));
		assert_eq!(before_epoch.unix_millis(), Some(-1));
		assert_eq!(before_epoch.to_string(), "1969-12-31T23:59:59.999Z");
	}

	#[test]
	fn parses_date_time_without_offset_as_utc() {
		assert_eq!(Timestamp::parse("1970-01-01T00:00:01.500").unix_millis(), Some(1_500));
	}

	#[test]
	fn parses_rfc2822() {
		assert_eq!(
			Timestamp::parse("Thu, 01 Jan 1970 00:01:00 +0000").unix_millis(),
			Some(60_000)
		);
	}

	#[test]
	fn closures_are_clocks() {
		let clock = || Timestamp::parse("2000-01-01T00:00:00Z");
		assert_eq!(clock.now().unix_millis(), Some(946_684_800_000));
	}

	#[test]
	fn system_clock_follows_wall_clock() {
		let clock = now_clock();
		let before = Timestamp::now().as_datetime().unwrap();
		let first = clock.now().as_datetime().unwrap();
		let after = Timestamp::now().as_datetime().unwrap();
		assert!(before <= first && first <= after);

		std::thread::sleep(Duration::from_millis(20));
		let second = clock.now().as_datetime().unwrap();
		assert!(second - first >= time::Duration::milliseconds(20));
	}

	prop_compose! {
		fn arb_datetime()(millis in -30_000_000_000_000i64..250_000_000_000_000i64) -> OffsetDateTime {
			OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).unwrap()
		}
	}

	proptest! {
		#[test]
		fn fixed_clock_returns_parsed_date(datetime in arb_datetime()) {
			let date = Timestamp::from_datetime(datetime).to_string();
			let clock = fixed_clock(&date);
			prop_assert_eq!(clock.now(), Timestamp::parse(&date));
			prop_assert_eq!(clock.now(), Timestamp::from_datetime(datetime));
			prop_assert_eq!(clock.now(), clock.now());
		}
	}
}
