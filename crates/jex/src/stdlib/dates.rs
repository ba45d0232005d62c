//! Date built-ins on `chrono` datetimes with offsets.
//!
//! The format name `"o"` (either case) is the ISO-8601 / RFC 3339 round-trip
//! form; anything else is a chrono strftime pattern. `parseDate` without a
//! format tries RFC 3339 first and then a small ladder of common naive
//! forms, which are taken as UTC.

use std::fmt::Write;

use bigdecimal::RoundingMode;
use chrono::{DateTime, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, Utc};
use num_traits::ToPrimitive;

use crate::error::{JexError, JexResult};
use crate::registry::FunctionRegistry;
use crate::stdlib::arg;
use crate::value::Value;

pub(crate) fn install(registry: &mut FunctionRegistry) {
    registry.register_builtin("now", 0, Some(0), |_, _| {
        Ok(Value::DateTime(Utc::now().fixed_offset()))
    });

    registry.register_builtin("parseDate", 1, Some(2), |_, args| {
        let text = arg(&args, 0).coerce_string();
        let parsed = match args.get(1) {
            Some(fmt) => parse_with_format(&text, &fmt.coerce_string()),
            None => parse_default(&text),
        };
        Ok(parsed.map_or(Value::Null, Value::DateTime))
    });

    registry.register_builtin("formatDate", 2, Some(2), |_, args| {
        let dt = coerce_datetime(&arg(&args, 0))?;
        let fmt = arg(&args, 1).coerce_string();
        if fmt.eq_ignore_ascii_case("o") {
            return Ok(Value::Str(dt.to_rfc3339()));
        }
        let mut out = String::new();
        write!(out, "{}", dt.format(&fmt))
            .map_err(|_| JexError::runtime(format!("invalid date format `{fmt}`")))?;
        Ok(Value::Str(out))
    });

    registry.register_builtin("dateAdd", 3, Some(3), |_, args| {
        let dt = coerce_datetime(&arg(&args, 0))?;
        let unit = arg(&args, 1).coerce_string();
        let amount = to_i64(&arg(&args, 2));
        let shifted = add_to_datetime(dt, &unit, amount)?;
        Ok(Value::DateTime(shifted))
    });

    registry.register_builtin("dateDiff", 3, Some(3), |_, args| {
        let a = coerce_datetime(&arg(&args, 0))?;
        let b = coerce_datetime(&arg(&args, 1))?;
        let unit = arg(&args, 2).coerce_string();
        let delta = a.signed_duration_since(b);
        let value = match normalize_unit(&unit).as_str() {
            "day" => delta.num_days(),
            "hour" => delta.num_hours(),
            "minute" => delta.num_minutes(),
            "second" => delta.num_seconds(),
            _ => return Err(JexError::runtime(format!("unknown dateDiff unit `{unit}`"))),
        };
        Ok(Value::Number(bigdecimal::BigDecimal::from(value)))
    });
}

fn to_i64(value: &Value) -> i64 {
    value
        .coerce_number()
        .with_scale_round(0, RoundingMode::Down)
        .to_i64()
        .unwrap_or(0)
}

/// Lowercases and singularizes a unit name (`Days` -> `day`).
fn normalize_unit(unit: &str) -> String {
    let unit = unit.trim().to_ascii_lowercase();
    unit.strip_suffix('s').map_or(unit.clone(), str::to_string)
}

fn add_to_datetime(dt: DateTime<FixedOffset>, unit: &str, amount: i64) -> JexResult<DateTime<FixedOffset>> {
    let out_of_range = || JexError::runtime(format!("dateAdd result out of range ({amount} {unit})"));
    match normalize_unit(unit).as_str() {
        "day" => dt.checked_add_signed(Duration::days(amount)).ok_or_else(out_of_range),
        "hour" => dt.checked_add_signed(Duration::hours(amount)).ok_or_else(out_of_range),
        "minute" => dt.checked_add_signed(Duration::minutes(amount)).ok_or_else(out_of_range),
        "second" => dt.checked_add_signed(Duration::seconds(amount)).ok_or_else(out_of_range),
        "month" => add_months(dt, amount).ok_or_else(out_of_range),
        "year" => add_months(dt, amount.saturating_mul(12)).ok_or_else(out_of_range),
        _ => Err(JexError::runtime(format!("unknown dateAdd unit `{unit}`"))),
    }
}

fn add_months(dt: DateTime<FixedOffset>, amount: i64) -> Option<DateTime<FixedOffset>> {
    let months = u32::try_from(amount.unsigned_abs()).ok()?;
    if amount >= 0 {
        dt.checked_add_months(Months::new(months))
    } else {
        dt.checked_sub_months(Months::new(months))
    }
}

/// Value -> datetime for the built-ins that require one.
pub(crate) fn coerce_datetime(value: &Value) -> JexResult<DateTime<FixedOffset>> {
    match value.unwrap_scalar() {
        Value::DateTime(dt) => Ok(dt),
        Value::Str(text) => {
            parse_default(&text).ok_or_else(|| JexError::runtime(format!("`{text}` is not a datetime")))
        }
        other => Err(JexError::runtime(format!(
            "expected a datetime, got {}",
            other.type_name()
        ))),
    }
}

/// Default parse ladder: RFC 3339, then common naive forms taken as UTC.
pub(crate) fn parse_default(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(naive.and_utc().fixed_offset());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().fixed_offset());
    }
    None
}

fn parse_with_format(text: &str, fmt: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if fmt.eq_ignore_ascii_case("o") {
        return DateTime::parse_from_rfc3339(text).ok();
    }
    if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
        return Some(dt);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
        return Some(naive.and_utc().fixed_offset());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().fixed_offset());
    }
    None
}
