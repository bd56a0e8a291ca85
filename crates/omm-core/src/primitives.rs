//! Primitive value types that carry more structure than a plain integer:
//! - `Real` (mantissa + exponent/fraction hint)
//! - `Date`, `Time`, `DateTime`
//! - `Qos` (timeliness / rate)
//! - `State` (stream state, data state, code, text)
//!
//! Blank values are represented by `Data::Blank(DataType)` at the
//! container level; `Date`/`Time` additionally have an all-sentinel
//! blank form because partially blank dates are legal on the wire.

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Real number hints.
///
/// `EXPONENT_14 ..= EXPONENT_7` scale the mantissa by a power of ten,
/// `FRACTION_1 ..= FRACTION_256` divide it by a power of two.
pub mod real_hint {
    pub const EXPONENT_14: u8 = 0;
    pub const EXPONENT_13: u8 = 1;
    pub const EXPONENT_12: u8 = 2;
    pub const EXPONENT_11: u8 = 3;
    pub const EXPONENT_10: u8 = 4;
    pub const EXPONENT_9: u8 = 5;
    pub const EXPONENT_8: u8 = 6;
    pub const EXPONENT_7: u8 = 7;
    pub const EXPONENT_6: u8 = 8;
    pub const EXPONENT_5: u8 = 9;
    pub const EXPONENT_4: u8 = 10;
    pub const EXPONENT_3: u8 = 11;
    pub const EXPONENT_2: u8 = 12;
    pub const EXPONENT_1: u8 = 13;
    pub const EXPONENT0: u8 = 14;
    pub const EXPONENT1: u8 = 15;
    pub const EXPONENT2: u8 = 16;
    pub const EXPONENT3: u8 = 17;
    pub const EXPONENT4: u8 = 18;
    pub const EXPONENT5: u8 = 19;
    pub const EXPONENT6: u8 = 20;
    pub const EXPONENT7: u8 = 21;
    pub const FRACTION_1: u8 = 22;
    pub const FRACTION_2: u8 = 23;
    pub const FRACTION_4: u8 = 24;
    pub const FRACTION_8: u8 = 25;
    pub const FRACTION_16: u8 = 26;
    pub const FRACTION_32: u8 = 27;
    pub const FRACTION_64: u8 = 28;
    pub const FRACTION_128: u8 = 29;
    pub const FRACTION_256: u8 = 30;
    pub const INFINITY: u8 = 33;
    pub const NEG_INFINITY: u8 = 34;
    pub const NOT_A_NUMBER: u8 = 35;

    /// Hints 31 and 32 are reserved and never valid.
    pub fn is_valid(hint: u8) -> bool {
        hint <= FRACTION_256 || (INFINITY..=NOT_A_NUMBER).contains(&hint)
    }
}

// ============================================================================
// Real
// ============================================================================

/// Decimal or fractional number: `mantissa * 10^(hint-14)` or
/// `mantissa / 2^(hint-22)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Real {
    pub mantissa: i64,
    pub hint: u8,
}

impl Real {
    /// Infinity, NegInfinity and NaN carry no mantissa on the wire, so
    /// theirs is always 0.
    pub const fn new(mantissa: i64, hint: u8) -> Self {
        let mantissa = if hint >= real_hint::INFINITY { 0 } else { mantissa };
        Real { mantissa, hint }
    }

    pub fn is_special(&self) -> bool {
        self.hint >= real_hint::INFINITY
    }

    pub fn to_f64(&self) -> f64 {
        match self.hint {
            0..=21 => {
                let exp = self.hint as i32 - real_hint::EXPONENT0 as i32;
                if exp < 0 {
                    self.mantissa as f64 / 10f64.powi(-exp)
                } else {
                    self.mantissa as f64 * 10f64.powi(exp)
                }
            }
            22..=30 => self.mantissa as f64 / (1u32 << (self.hint - real_hint::FRACTION_1)) as f64,
            real_hint::INFINITY => f64::INFINITY,
            real_hint::NEG_INFINITY => f64::NEG_INFINITY,
            _ => f64::NAN,
        }
    }

    /// Build a `Real` from a float, rounding to the precision the hint allows.
    pub fn from_f64(value: f64, hint: u8) -> Self {
        if value.is_nan() {
            return Real::new(0, real_hint::NOT_A_NUMBER);
        }
        if value.is_infinite() {
            let hint = if value > 0.0 {
                real_hint::INFINITY
            } else {
                real_hint::NEG_INFINITY
            };
            return Real::new(0, hint);
        }

        let mantissa = match hint {
            0..=21 => {
                let exp = hint as i32 - real_hint::EXPONENT0 as i32;
                if exp < 0 {
                    (value * 10f64.powi(-exp)).round()
                } else {
                    (value / 10f64.powi(exp)).round()
                }
            }
            22..=30 => (value * (1u32 << (hint - real_hint::FRACTION_1)) as f64).round(),
            _ => 0.0,
        };
        Real::new(mantissa as i64, hint)
    }
}

impl fmt::Display for Real {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.hint {
            real_hint::INFINITY => f.write_str("Inf"),
            real_hint::NEG_INFINITY => f.write_str("-Inf"),
            real_hint::NOT_A_NUMBER => f.write_str("NaN"),
            0..=13 => {
                let places = (real_hint::EXPONENT0 - self.hint) as usize;
                let digits = self.mantissa.unsigned_abs().to_string();
                let digits = format!("{:0>width$}", digits, width = places + 1);
                let (whole, frac) = digits.split_at(digits.len() - places);
                let sign = if self.mantissa < 0 { "-" } else { "" };
                write!(f, "{}{}.{}", sign, whole, frac)
            }
            14..=21 => {
                if self.mantissa == 0 {
                    return f.write_str("0");
                }
                let zeros = (self.hint - real_hint::EXPONENT0) as usize;
                write!(f, "{}{}", self.mantissa, "0".repeat(zeros))
            }
            _ => write!(f, "{}", self.to_f64()),
        }
    }
}

// ============================================================================
// Date / Time / DateTime
// ============================================================================

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Calendar date. Zero in any member means "blank" for that member; all
/// three zero is a fully blank date.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Date {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl Date {
    pub const BLANK: Date = Date {
        year: 0,
        month: 0,
        day: 0,
    };

    pub const fn new(year: u16, month: u8, day: u8) -> Self {
        Date { year, month, day }
    }

    pub fn is_blank(&self) -> bool {
        *self == Self::BLANK
    }

    pub fn is_valid(&self) -> bool {
        if self.day > 31 || self.month > 12 {
            return false;
        }
        if self.year != 0 && self.month != 0 && self.day != 0 {
            return self.to_naive_date().is_some();
        }
        true
    }

    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)
    }
}

impl From<NaiveDate> for Date {
    fn from(d: NaiveDate) -> Self {
        Date::new(d.year() as u16, d.month() as u8, d.day() as u8)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_blank() {
            return Ok(());
        }
        let month = match self.month {
            1..=12 => MONTHS[self.month as usize - 1].to_string(),
            m => format!("{:02}", m),
        };
        write!(f, "{:02} {} {:04}", self.day, month, self.year)
    }
}

/// Time of day down to the nanosecond.
///
/// Each member has its own blank sentinel (255 for hour/minute/second,
/// 65535 for milliseconds, 2047 for micro/nanoseconds).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Time {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub millisecond: u16,
    pub microsecond: u16,
    pub nanosecond: u16,
}

impl Time {
    pub const BLANK: Time = Time {
        hour: 255,
        minute: 255,
        second: 255,
        millisecond: 65535,
        microsecond: 2047,
        nanosecond: 2047,
    };

    pub const fn hms(hour: u8, minute: u8, second: u8) -> Self {
        Time {
            hour,
            minute,
            second,
            millisecond: 0,
            microsecond: 0,
            nanosecond: 0,
        }
    }

    pub const fn new(
        hour: u8,
        minute: u8,
        second: u8,
        millisecond: u16,
        microsecond: u16,
        nanosecond: u16,
    ) -> Self {
        Time {
            hour,
            minute,
            second,
            millisecond,
            microsecond,
            nanosecond,
        }
    }

    pub fn is_blank(&self) -> bool {
        *self == Self::BLANK
    }

    pub fn is_valid(&self) -> bool {
        (self.hour <= 23 || self.hour == 255)
            && (self.minute <= 59 || self.minute == 255)
            && (self.second <= 60 || self.second == 255)
            && (self.millisecond <= 999 || self.millisecond == 65535)
            && (self.microsecond <= 999 || self.microsecond == 2047)
            && (self.nanosecond <= 999 || self.nanosecond == 2047)
    }

    pub fn to_naive_time(&self) -> Option<NaiveTime> {
        let nanos = self.millisecond as u32 * 1_000_000
            + self.microsecond as u32 * 1_000
            + self.nanosecond as u32;
        NaiveTime::from_hms_nano_opt(self.hour as u32, self.minute as u32, self.second as u32, nanos)
    }
}

impl Default for Time {
    fn default() -> Self {
        Time::hms(0, 0, 0)
    }
}

impl From<NaiveTime> for Time {
    fn from(t: NaiveTime) -> Self {
        let nanos = t.nanosecond() % 1_000_000_000;
        Time::new(
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            (nanos / 1_000_000) as u16,
            (nanos / 1_000 % 1_000) as u16,
            (nanos % 1_000) as u16,
        )
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_blank() {
            return Ok(());
        }
        write!(
            f,
            "{:02}:{:02}:{:02}:{:03}:{:03}:{:03}",
            self.hour, self.minute, self.second, self.millisecond, self.microsecond, self.nanosecond
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct DateTime {
    pub date: Date,
    pub time: Time,
}

impl DateTime {
    pub const BLANK: DateTime = DateTime {
        date: Date::BLANK,
        time: Time::BLANK,
    };

    pub const fn new(date: Date, time: Time) -> Self {
        DateTime { date, time }
    }

    pub fn is_blank(&self) -> bool {
        self.date.is_blank() && self.time.is_blank()
    }

    pub fn is_valid(&self) -> bool {
        self.date.is_valid() && self.time.is_valid()
    }
}

impl From<NaiveDateTime> for DateTime {
    fn from(dt: NaiveDateTime) -> Self {
        DateTime::new(dt.date().into(), dt.time().into())
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.time)
    }
}

// ============================================================================
// Qos
// ============================================================================

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum QosTimeliness {
    #[default]
    Unspecified = 0,
    Realtime = 1,
    /// Delayed by an unknown amount.
    DelayedUnknown = 2,
    /// Delayed by `Qos::time_info` seconds.
    Delayed = 3,
}

impl QosTimeliness {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(QosTimeliness::Unspecified),
            1 => Some(QosTimeliness::Realtime),
            2 => Some(QosTimeliness::DelayedUnknown),
            3 => Some(QosTimeliness::Delayed),
            _ => None,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum QosRate {
    #[default]
    Unspecified = 0,
    TickByTick = 1,
    /// Just-in-time conflated.
    JitConflated = 2,
    /// Conflated every `Qos::rate_info` milliseconds.
    TimeConflated = 3,
}

impl QosRate {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(QosRate::Unspecified),
            1 => Some(QosRate::TickByTick),
            2 => Some(QosRate::JitConflated),
            3 => Some(QosRate::TimeConflated),
            _ => None,
        }
    }
}

/// Quality of service.
///
/// `time_info` is only meaningful (and only sent) for `Delayed`, and
/// `rate_info` only for `TimeConflated`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Qos {
    pub timeliness: QosTimeliness,
    pub rate: QosRate,
    pub dynamic: bool,
    pub time_info: u16,
    pub rate_info: u16,
}

impl Qos {
    pub const fn new(timeliness: QosTimeliness, rate: QosRate) -> Self {
        Qos {
            timeliness,
            rate,
            dynamic: false,
            time_info: 0,
            rate_info: 0,
        }
    }

    /// The usual "best" QoS: realtime, tick by tick.
    pub const fn realtime_tick_by_tick() -> Self {
        Qos::new(QosTimeliness::Realtime, QosRate::TickByTick)
    }

    /// Compare with the members that are not on the wire masked out.
    pub fn wire_eq(&self, other: &Qos) -> bool {
        let a = self.normalized();
        let b = other.normalized();
        a == b
    }

    /// Copy with `time_info` / `rate_info` zeroed when they would not be sent.
    pub fn normalized(&self) -> Qos {
        let mut q = *self;
        if q.timeliness != QosTimeliness::Delayed {
            q.time_info = 0;
        }
        if q.rate != QosRate::TimeConflated {
            q.rate_info = 0;
        }
        q
    }
}

impl fmt::Display for Qos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timeliness {
            QosTimeliness::Unspecified => f.write_str("Unspecified")?,
            QosTimeliness::Realtime => f.write_str("RealTime")?,
            QosTimeliness::DelayedUnknown => f.write_str("InexactDelayed")?,
            QosTimeliness::Delayed => write!(f, "Timeliness: {}", self.time_info)?,
        }
        f.write_str("/")?;
        match self.rate {
            QosRate::Unspecified => f.write_str("Unspecified")?,
            QosRate::TickByTick => f.write_str("TickByTick")?,
            QosRate::JitConflated => f.write_str("JustInTimeConflated")?,
            QosRate::TimeConflated => write!(f, "Rate: {}", self.rate_info)?,
        }
        if self.dynamic {
            f.write_str("/Dynamic")?;
        }
        Ok(())
    }
}

// ============================================================================
// State
// ============================================================================

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum StreamState {
    #[default]
    Unspecified = 0,
    Open = 1,
    /// Snapshot only, the stream closes after the final refresh.
    NonStreaming = 2,
    /// Closed, the consumer may try again later.
    ClosedRecover = 3,
    Closed = 4,
    /// Closed, re-request using the key in the message.
    Redirected = 5,
}

impl StreamState {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(StreamState::Unspecified),
            1 => Some(StreamState::Open),
            2 => Some(StreamState::NonStreaming),
            3 => Some(StreamState::ClosedRecover),
            4 => Some(StreamState::Closed),
            5 => Some(StreamState::Redirected),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StreamState::Unspecified => "Unspecified",
            StreamState::Open => "Open",
            StreamState::NonStreaming => "NonStreaming",
            StreamState::ClosedRecover => "ClosedRecover",
            StreamState::Closed => "Closed",
            StreamState::Redirected => "Redirected",
        }
    }
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum DataState {
    #[default]
    NoChange = 0,
    Ok = 1,
    Suspect = 2,
}

impl DataState {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(DataState::NoChange),
            1 => Some(DataState::Ok),
            2 => Some(DataState::Suspect),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DataState::NoChange => "NoChange",
            DataState::Ok => "Ok",
            DataState::Suspect => "Suspect",
        }
    }
}

/// Status code attached to a `State`. Unknown codes are carried through
/// unchanged.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct StateCode(pub u8);

impl StateCode {
    pub const NONE: StateCode = StateCode(0);
    pub const NOT_FOUND: StateCode = StateCode(1);
    pub const TIMEOUT: StateCode = StateCode(2);
    pub const NOT_ENTITLED: StateCode = StateCode(3);
    pub const INVALID_ARGUMENT: StateCode = StateCode(4);
    pub const USAGE_ERROR: StateCode = StateCode(5);
    pub const PREEMPTED: StateCode = StateCode(6);
    pub const JIT_CONFLATION_STARTED: StateCode = StateCode(7);
    pub const REALTIME_RESUMED: StateCode = StateCode(8);
    pub const FAILOVER_STARTED: StateCode = StateCode(9);
    pub const FAILOVER_COMPLETED: StateCode = StateCode(10);
    pub const GAP_DETECTED: StateCode = StateCode(11);
    pub const NO_RESOURCES: StateCode = StateCode(12);
    pub const TOO_MANY_ITEMS: StateCode = StateCode(13);
    pub const ALREADY_OPEN: StateCode = StateCode(14);
    pub const SOURCE_UNKNOWN: StateCode = StateCode(15);
    pub const NOT_OPEN: StateCode = StateCode(16);

    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "None",
            1 => "NotFound",
            2 => "Timeout",
            3 => "NotEntitled",
            4 => "InvalidArgument",
            5 => "UsageError",
            6 => "Preempted",
            7 => "JitConflationStarted",
            8 => "RealtimeResumed",
            9 => "FailoverStarted",
            10 => "FailoverCompleted",
            11 => "GapDetected",
            12 => "NoResources",
            13 => "TooManyItems",
            14 => "AlreadyOpen",
            15 => "SourceUnknown",
            16 => "NotOpen",
            _ => "Unknown",
        }
    }
}

/// Stream state, data state, code and free text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct State {
    pub stream_state: StreamState,
    pub data_state: DataState,
    pub code: StateCode,
    pub text: String,
}

impl State {
    pub fn new(stream_state: StreamState, data_state: DataState) -> Self {
        State {
            stream_state,
            data_state,
            code: StateCode::NONE,
            text: String::new(),
        }
    }

    pub fn with_code(mut self, code: StateCode) -> Self {
        self.code = code;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Open / Ok / None, the state of a healthy stream.
    pub fn open_ok(text: impl Into<String>) -> Self {
        State::new(StreamState::Open, DataState::Ok).with_text(text)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} / {} / '{}'",
            self.stream_state.name(),
            self.data_state.name(),
            self.code.name(),
            self.text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_display_places_the_decimal_point() {
        assert_eq!(Real::new(12345, real_hint::EXPONENT_2).to_string(), "123.45");
        assert_eq!(Real::new(-5, real_hint::EXPONENT_3).to_string(), "-0.005");
        assert_eq!(Real::new(12, real_hint::EXPONENT2).to_string(), "1200");
        assert_eq!(Real::new(0, real_hint::NEG_INFINITY).to_string(), "-Inf");
    }

    #[test]
    fn real_float_conversion() {
        let r = Real::from_f64(123.45, real_hint::EXPONENT_2);
        assert_eq!(r, Real::new(12345, real_hint::EXPONENT_2));
        assert!((r.to_f64() - 123.45).abs() < 1e-9);

        let half = Real::from_f64(3.5, real_hint::FRACTION_2);
        assert_eq!(half.mantissa, 7);
        assert_eq!(half.to_f64(), 3.5);

        assert_eq!(Real::from_f64(f64::NAN, 0).hint, real_hint::NOT_A_NUMBER);
    }

    #[test]
    fn reserved_hints_are_invalid() {
        assert!(real_hint::is_valid(real_hint::FRACTION_256));
        assert!(!real_hint::is_valid(31));
        assert!(!real_hint::is_valid(32));
        assert!(real_hint::is_valid(real_hint::NOT_A_NUMBER));
        assert!(!real_hint::is_valid(36));
    }

    #[test]
    fn date_validation() {
        assert!(Date::new(2024, 2, 29).is_valid());
        assert!(!Date::new(2023, 2, 29).is_valid());
        assert!(Date::new(0, 5, 0).is_valid());
        assert!(!Date::new(2024, 13, 1).is_valid());
        assert!(Date::BLANK.is_valid());
        assert_eq!(Date::new(2012, 6, 1).to_string(), "01 JUN 2012");
    }

    #[test]
    fn time_validation_and_chrono() {
        assert!(Time::BLANK.is_valid());
        assert!(!Time::hms(24, 0, 0).is_valid());
        let t = Time::new(10, 20, 30, 400, 500, 600);
        let naive = t.to_naive_time().unwrap();
        assert_eq!(Time::from(naive), t);
        assert_eq!(t.to_string(), "10:20:30:400:500:600");
    }

    #[test]
    fn qos_normalization_ignores_unsent_members() {
        let mut a = Qos::realtime_tick_by_tick();
        a.time_info = 99;
        assert!(a.wire_eq(&Qos::realtime_tick_by_tick()));
        assert_ne!(a, Qos::realtime_tick_by_tick());
    }

    #[test]
    fn state_display() {
        let s = State::open_ok("All is well");
        assert_eq!(s.to_string(), "Open / Ok / None / 'All is well'");
    }
}
