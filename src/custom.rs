//! Custom setters: user-supplied binding for field types the coercion engine
//! does not know, or wants to handle differently.
//!
//! A setter claims fields through [`CustomSetter::is_applicable`]; the first
//! registered setter that claims a field handles it exclusively. Two setters
//! ship with the crate: [`DurationSetter`] for human-readable durations and
//! [`DateTimeSetter`] for chrono timestamps.

use std::any::Any;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::error::BoxError;
use crate::optional::Optional;
use crate::types::{Field, FieldDescriptor, Shape};

pub trait CustomSetter: Send + Sync {
    fn is_applicable(&self, field: &FieldDescriptor) -> bool;

    /// Store `raw` into `target`. `present` is false when `raw` is the
    /// directive's default rather than a source value.
    fn set(
        &self,
        field: &FieldDescriptor,
        target: &mut dyn Any,
        raw: &str,
        present: bool,
    ) -> Result<(), BoxError>;

    /// Text for the field's current value when writing. `None` writes the
    /// `<value>` placeholder.
    fn render(&self, field: &FieldDescriptor, value: &dyn Any) -> Option<String> {
        let _ = (field, value);
        None
    }
}

#[derive(Debug, Error)]
#[error("cannot assign to field '{0}'")]
struct WrongTarget(&'static str);

/// Store `value` into a `T` or `Optional<T>` target.
fn assign<T: 'static>(
    field: &FieldDescriptor,
    target: &mut dyn Any,
    value: T,
    present: bool,
) -> Result<(), BoxError> {
    if let Some(slot) = target.downcast_mut::<T>() {
        *slot = value;
        return Ok(());
    }
    if let Some(slot) = target.downcast_mut::<Optional<T>>() {
        *slot = if present {
            Optional::Set(value)
        } else {
            Optional::Defaulted(value)
        };
        return Ok(());
    }
    Err(Box::new(WrongTarget(field.name)))
}

/// Render a `T` or a present `Optional<T>` value.
fn render_with<T: 'static>(value: &dyn Any, format: impl Fn(&T) -> String) -> Option<String> {
    if let Some(value) = value.downcast_ref::<T>() {
        return Some(format(value));
    }
    value
        .downcast_ref::<Optional<T>>()
        .and_then(Optional::get)
        .map(format)
}

// --- durations ---

/// Binds `Duration` and `Optional<Duration>` fields from text such as `1h30m`,
/// `250ms` or `1.5s`, the notation of Go's `time.ParseDuration`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DurationSetter;

impl CustomSetter for DurationSetter {
    fn is_applicable(&self, field: &FieldDescriptor) -> bool {
        field.is::<Duration>() || field.is::<Optional<Duration>>()
    }

    fn set(
        &self,
        field: &FieldDescriptor,
        target: &mut dyn Any,
        raw: &str,
        present: bool,
    ) -> Result<(), BoxError> {
        assign(field, target, parse_duration(raw)?, present)
    }

    fn render(&self, _field: &FieldDescriptor, value: &dyn Any) -> Option<String> {
        render_with::<Duration>(value, |d| format_duration(*d))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("time: invalid duration \"{0}\"")]
    Invalid(String),
    #[error("time: missing unit in duration \"{0}\"")]
    MissingUnit(String),
    #[error("time: unknown unit \"{unit}\" in duration \"{input}\"")]
    UnknownUnit { unit: String, input: String },
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

fn unit_nanos(unit: &str) -> Option<u128> {
    Some(match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => NANOS_PER_SEC,
        "m" => 60 * NANOS_PER_SEC,
        "h" => 3_600 * NANOS_PER_SEC,
        _ => return None,
    })
}

fn leading_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

/// Parse `[+]N[.F]unit...`. Negative durations cannot be represented.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let invalid = || DurationError::Invalid(input.to_string());
    let mut rest = input.strip_prefix('+').unwrap_or(input);
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }
    let mut total: u128 = 0;
    while !rest.is_empty() {
        let (whole, after) = leading_digits(rest);
        let (fraction, after) = match after.strip_prefix('.') {
            Some(after_dot) => leading_digits(after_dot),
            None => ("", after),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        let unit_end = after
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(after.len());
        let (unit, after) = after.split_at(unit_end);
        if unit.is_empty() {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        let scale = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut nanos = whole.checked_mul(scale).ok_or_else(invalid)?;
        if !fraction.is_empty() {
            // Digits beyond nanosecond precision of the largest unit are noise.
            let fraction = &fraction[..fraction.len().min(18)];
            let digits: u128 = fraction.parse().map_err(|_| invalid())?;
            let part = digits.checked_mul(scale).ok_or_else(invalid)?
                / 10u128.pow(fraction.len() as u32);
            nanos = nanos.checked_add(part).ok_or_else(invalid)?;
        }
        total = total.checked_add(nanos).ok_or_else(invalid)?;
        rest = after;
    }
    let total = u64::try_from(total).map_err(|_| invalid())?;
    Ok(Duration::from_nanos(total))
}

fn fixed_point(value: u128, scale: u128) -> String {
    let whole = value / scale;
    let rem = value % scale;
    if rem == 0 {
        return whole.to_string();
    }
    let width = scale.ilog10() as usize;
    let fraction = format!("{rem:0width$}");
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}

/// Go-style text: `0s`, `500ns`, `1.5ms`, `2m0s`, `1h30m0s`.
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".into();
    }
    if nanos < NANOS_PER_SEC {
        let (unit, scale) = match nanos {
            n if n < 1_000 => ("ns", 1),
            n if n < 1_000_000 => ("µs", 1_000),
            _ => ("ms", 1_000_000),
        };
        return format!("{}{unit}", fixed_point(nanos, scale));
    }
    let secs = nanos / NANOS_PER_SEC;
    let (hours, minutes) = (secs / 3_600, secs % 3_600 / 60);
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    let seconds = nanos - (hours * 3_600 + minutes * 60) * NANOS_PER_SEC;
    out.push_str(&fixed_point(seconds, NANOS_PER_SEC));
    out.push('s');
    out
}

// --- timestamps ---

impl Field for DateTime<FixedOffset> {
    fn shape() -> Shape {
        Shape::Custom
    }
}

impl Field for DateTime<Utc> {
    fn shape() -> Shape {
        Shape::Custom
    }
}

/// Binds chrono `DateTime<FixedOffset>` and `DateTime<Utc>` fields (and their
/// `Optional` forms).
///
/// Without a format, values are RFC 3339. A caller format uses chrono's
/// `strftime` syntax; when it carries no offset the value is taken as UTC.
#[derive(Debug, Clone, Default)]
pub struct DateTimeSetter {
    format: Option<String>,
}

impl DateTimeSetter {
    pub fn rfc3339() -> Self {
        Self::default()
    }

    pub fn with_format(format: impl Into<String>) -> Self {
        Self {
            format: Some(format.into()),
        }
    }

    fn parse(&self, raw: &str) -> Result<DateTime<FixedOffset>, BoxError> {
        let Some(format) = &self.format else {
            return Ok(DateTime::parse_from_rfc3339(raw)?);
        };
        match DateTime::parse_from_str(raw, format) {
            Ok(dt) => Ok(dt),
            Err(err) => NaiveDateTime::parse_from_str(raw, format)
                .map(|naive| naive.and_utc().fixed_offset())
                .map_err(|_| err.into()),
        }
    }

    fn format<Tz: chrono::TimeZone>(&self, dt: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        match &self.format {
            Some(format) => dt.format(format).to_string(),
            None => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }
}

impl CustomSetter for DateTimeSetter {
    fn is_applicable(&self, field: &FieldDescriptor) -> bool {
        field.is::<DateTime<FixedOffset>>()
            || field.is::<DateTime<Utc>>()
            || field.is::<Optional<DateTime<FixedOffset>>>()
            || field.is::<Optional<DateTime<Utc>>>()
    }

    fn set(
        &self,
        field: &FieldDescriptor,
        target: &mut dyn Any,
        raw: &str,
        present: bool,
    ) -> Result<(), BoxError> {
        let parsed = self.parse(raw)?;
        if field.is::<DateTime<Utc>>() || field.is::<Optional<DateTime<Utc>>>() {
            assign(field, target, parsed.with_timezone(&Utc), present)
        } else {
            assign(field, target, parsed, present)
        }
    }

    fn render(&self, _field: &FieldDescriptor, value: &dyn Any) -> Option<String> {
        render_with::<DateTime<FixedOffset>>(value, |dt| self.format(dt))
            .or_else(|| render_with::<DateTime<Utc>>(value, |dt| self.format(dt)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_go_durations() {
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("300ms").unwrap(), Duration::from_millis(300));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5_400));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1_500));
        assert_eq!(parse_duration(".5m").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("+2us").unwrap(), Duration::from_micros(2));
        assert_eq!(parse_duration("1µs500ns").unwrap(), Duration::from_nanos(1_500));
    }

    #[test]
    fn rejects_bad_durations() {
        assert_eq!(
            parse_duration("1").unwrap_err(),
            DurationError::MissingUnit("1".into())
        );
        assert_eq!(
            parse_duration("5x").unwrap_err().to_string(),
            "time: unknown unit \"x\" in duration \"5x\""
        );
        assert!(matches!(parse_duration(""), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("-1s"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("h"), Err(DurationError::Invalid(_))));
    }

    #[test]
    fn oversized_durations_are_invalid() {
        for input in [
            "9999999999h",
            "99999999999999999999999999999999999999h",
            "999999999999999999999999999999999999999999h",
            "5124095h34m33.709551616s",
        ] {
            assert_eq!(
                parse_duration(input).unwrap_err(),
                DurationError::Invalid(input.to_string()),
                "{input}"
            );
        }
        assert_eq!(
            parse_duration("5124095h34m33.709551615s").unwrap(),
            Duration::from_nanos(u64::MAX)
        );
    }

    #[test]
    fn formats_like_go() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_nanos(500)), "500ns");
        assert_eq!(format_duration(Duration::from_micros(1_500)), "1.5ms");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m0s");
        assert_eq!(format_duration(Duration::from_secs(5_400)), "1h30m0s");
        assert_eq!(format_duration(Duration::from_millis(1_500)), "1.5s");
    }

    #[test]
    fn duration_setter_fills_plain_and_optional_targets() {
        let plain = FieldDescriptor::of::<Duration>("timeout", None, false);
        let mut value = Duration::ZERO;
        DurationSetter.set(&plain, &mut value, "2s", true).unwrap();
        assert_eq!(value, Duration::from_secs(2));
        assert_eq!(DurationSetter.render(&plain, &value).as_deref(), Some("2s"));

        let opt = FieldDescriptor::of::<Optional<Duration>>("timeout", None, false);
        assert!(DurationSetter.is_applicable(&opt));
        let mut value: Optional<Duration> = Optional::Absent;
        DurationSetter.set(&opt, &mut value, "1m", false).unwrap();
        assert_eq!(value, Optional::Defaulted(Duration::from_secs(60)));
        DurationSetter.set(&opt, &mut value, "1m", true).unwrap();
        assert!(value.was_set());
    }

    #[test]
    fn duration_setter_ignores_other_types() {
        let other = FieldDescriptor::of::<u64>("timeout", None, false);
        assert!(!DurationSetter.is_applicable(&other));
    }

    #[test]
    fn datetime_rfc3339() {
        let field = FieldDescriptor::of::<DateTime<Utc>>("at", None, false);
        let setter = DateTimeSetter::rfc3339();
        assert!(setter.is_applicable(&field));
        let mut value = DateTime::<Utc>::default();
        setter
            .set(&field, &mut value, "2024-03-01T10:00:00+02:00", true)
            .unwrap();
        assert_eq!(value.to_rfc3339(), "2024-03-01T08:00:00+00:00");
        assert_eq!(
            setter.render(&field, &value).as_deref(),
            Some("2024-03-01T08:00:00Z")
        );
    }

    #[test]
    fn datetime_custom_format_without_offset_is_utc() {
        let field = FieldDescriptor::of::<Optional<DateTime<FixedOffset>>>("at", None, false);
        let setter = DateTimeSetter::with_format("%Y-%m-%d %H:%M");
        let mut value: Optional<DateTime<FixedOffset>> = Optional::Absent;
        setter.set(&field, &mut value, "2024-03-01 10:30", true).unwrap();
        let Optional::Set(dt) = value else {
            panic!("expected a set value");
        };
        assert_eq!(dt.offset().local_minus_utc(), 0);
        assert_eq!(
            setter.render(&field, &Optional::Set(dt)).as_deref(),
            Some("2024-03-01 10:30")
        );
    }

    #[test]
    fn datetime_parse_errors_surface() {
        let field = FieldDescriptor::of::<DateTime<Utc>>("at", None, false);
        let mut value = DateTime::<Utc>::default();
        assert!(
            DateTimeSetter::rfc3339()
                .set(&field, &mut value, "yesterday", true)
                .is_err()
        );
    }
}
