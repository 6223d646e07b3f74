use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Months,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeDelta,
  Timelike,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

use crate::duration::{
  Duration,
  Unit
};

/// A timezone-naive point on the calendar timeline.
pub type DateMarker = NaiveDateTime;

const TIMEZONE_ENV_VAR: &str =
  "ALMANAC_TIMEZONE";

/// Source of the current wall-clock time. Sampled once per rebuild and
/// passed down explicitly.
pub trait Clock {
  fn now(&self) -> DateMarker;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
  timezone: Tz
}

impl SystemClock {
  pub fn new(timezone: Tz) -> Self {
    Self {
      timezone
    }
  }
}

impl Clock for SystemClock {
  fn now(&self) -> DateMarker {
    Utc::now()
      .with_timezone(&self.timezone)
      .naive_local()
  }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateMarker);

impl Clock for FixedClock {
  fn now(&self) -> DateMarker {
    self.0
  }
}

/// Picks the calendar timezone: environment first, then the configured
/// value, then UTC.
pub fn resolve_timezone(
  configured: Option<&str>
) -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "config")
  {
    return tz;
  }

  chrono_tz::UTC
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured calendar timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

pub fn ymd(
  year: i32,
  month: u32,
  day: u32
) -> Option<DateMarker> {
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .map(|date| date.and_time(NaiveTime::MIN))
}

#[must_use]
pub fn start_of_day(
  marker: DateMarker
) -> DateMarker {
  marker.date().and_time(NaiveTime::MIN)
}

#[must_use]
pub fn add_days(
  marker: DateMarker,
  days: i64
) -> DateMarker {
  TimeDelta::try_days(days)
    .and_then(|delta| {
      marker.checked_add_signed(delta)
    })
    .unwrap_or(marker)
}

#[must_use]
pub fn add_ms(
  marker: DateMarker,
  ms: i64
) -> DateMarker {
  TimeDelta::try_milliseconds(ms)
    .and_then(|delta| {
      marker.checked_add_signed(delta)
    })
    .unwrap_or(marker)
}

pub fn diff_ms(
  start: DateMarker,
  end: DateMarker
) -> i64 {
  (end - start).num_milliseconds()
}

/// Day-of-week index with Sunday as 0.
pub fn weekday_index(
  marker: DateMarker
) -> usize {
  marker
    .weekday()
    .num_days_from_sunday()
    as usize
}

pub fn weekday_from_index(
  index: u32
) -> Option<Weekday> {
  match index {
    | 0 => Some(Weekday::Sun),
    | 1 => Some(Weekday::Mon),
    | 2 => Some(Weekday::Tue),
    | 3 => Some(Weekday::Wed),
    | 4 => Some(Weekday::Thu),
    | 5 => Some(Weekday::Fri),
    | 6 => Some(Weekday::Sat),
    | _ => None
  }
}

#[must_use]
pub fn start_of_week(
  marker: DateMarker,
  first_day: Weekday
) -> DateMarker {
  let day_idx = marker
    .weekday()
    .num_days_from_sunday()
    as i64;
  let start_idx = first_day
    .num_days_from_sunday()
    as i64;
  let diff =
    (7 + day_idx - start_idx) % 7;
  add_days(start_of_day(marker), -diff)
}

/// Truncates `marker` to the start of the enclosing `unit`.
#[must_use]
pub fn start_of(
  marker: DateMarker,
  unit: Unit,
  first_day: Weekday
) -> DateMarker {
  let date = marker.date();
  match unit {
    | Unit::Year => {
      ymd(date.year(), 1, 1)
        .unwrap_or(marker)
    }
    | Unit::Month => {
      ymd(date.year(), date.month(), 1)
        .unwrap_or(marker)
    }
    | Unit::Week => {
      start_of_week(marker, first_day)
    }
    | Unit::Day => start_of_day(marker),
    | Unit::Hour => marker
      .with_nanosecond(0)
      .and_then(|m| m.with_second(0))
      .and_then(|m| m.with_minute(0))
      .unwrap_or(marker),
    | Unit::Minute => marker
      .with_nanosecond(0)
      .and_then(|m| m.with_second(0))
      .unwrap_or(marker),
    | Unit::Second => marker
      .with_nanosecond(0)
      .unwrap_or(marker),
    | Unit::Millisecond => marker
  }
}

/// Calendar-aware addition. Years and months move the month and clamp
/// the day to the target month's length; days and milliseconds follow.
#[must_use]
pub fn add_duration(
  marker: DateMarker,
  duration: &Duration
) -> DateMarker {
  let months = i64::from(duration.years)
    * 12
    + i64::from(duration.months);
  let mut out = marker;

  let span = u32::try_from(
    months.unsigned_abs()
  )
  .map(Months::new);

  if let Ok(span) = span {
    out = if months > 0 {
      out.checked_add_months(span)
    } else {
      out.checked_sub_months(span)
    }
    .unwrap_or(out);
  }

  out = add_days(
    out,
    i64::from(duration.days)
  );
  add_ms(out, duration.milliseconds)
}

#[must_use]
pub fn subtract_duration(
  marker: DateMarker,
  duration: &Duration
) -> DateMarker {
  add_duration(marker, &duration.negate())
}

fn relative_re() -> Option<&'static Regex>
{
  static RE: OnceLock<Option<Regex>> =
    OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(
      r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dwhm])$"
    )
    .ok()
  })
  .as_ref()
}

/// Parses a user-facing date expression relative to `now`.
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_date_marker(
  input: &str,
  now: DateMarker
) -> anyhow::Result<DateMarker> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "now" => return Ok(now),
    | "today" => {
      return Ok(start_of_day(now));
    }
    | "tomorrow" => {
      return Ok(add_days(
        start_of_day(now),
        1
      ));
    }
    | "yesterday" => {
      return Ok(add_days(
        start_of_day(now),
        -1
      ));
    }
    | _ => {}
  }

  if token.len() == 4
    && token
      .chars()
      .all(|c| c.is_ascii_digit())
  {
    let year: i32 =
      token.parse().context(
        "invalid 4-digit year"
      )?;
    return ymd(year, 1, 1).ok_or_else(
      || {
        anyhow!(
          "invalid year value: {year}"
        )
      }
    );
  }

  if let Some(target_month) =
    parse_month_name(&lower)
  {
    return ymd(
      now.year(),
      target_month,
      1
    )
    .ok_or_else(|| {
      anyhow!(
        "invalid month value: \
         {target_month}"
      )
    });
  }

  let rel_re = relative_re().ok_or_else(
    || {
      anyhow!(
        "internal regex compile \
         failure"
      )
    }
  )?;

  if let Some(caps) =
    rel_re.captures(token)
  {
    let sign = caps
      .name("sign")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative sign")
      })?;
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let unit = caps
      .name("unit")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative unit")
      })?;

    let delta = match unit {
      | "d" => TimeDelta::try_days(num),
      | "w" => TimeDelta::try_weeks(num),
      | "h" => TimeDelta::try_hours(num),
      | "m" => TimeDelta::try_minutes(num),
      | _ => {
        return Err(anyhow!(
          "unknown relative unit: \
           {unit}"
        ));
      }
    };

    let shifted =
      delta.and_then(|delta| {
        if sign == "-" {
          now.checked_sub_signed(delta)
        } else {
          now.checked_add_signed(delta)
        }
      });
    return shifted.ok_or_else(|| {
      anyhow!(
        "relative date out of range: \
         {token}"
      )
    });
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.naive_local());
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Ok(
      date.and_time(NaiveTime::MIN)
    );
  }

  for fmt in [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M"
  ] {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return Ok(ndt);
    }
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     now/today/tomorrow/yesterday, \
     4-digit year, month names (e.g. \
     march), +Nd/+Nw/+Nh/+Nm, RFC3339, \
     YYYY-MM-DD, YYYY-MM-DDTHH:MM[:SS], \
     YYYY-MM-DD HH:MM"
  })
}

fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token.trim() {
    | "january" | "jan" => Some(1),
    | "february" | "feb" => Some(2),
    | "march" | "mar" => Some(3),
    | "april" | "apr" => Some(4),
    | "may" => Some(5),
    | "june" | "jun" => Some(6),
    | "july" | "jul" => Some(7),
    | "august" | "aug" => Some(8),
    | "september" | "sep" | "sept" => {
      Some(9)
    }
    | "october" | "oct" => Some(10),
    | "november" | "nov" => Some(11),
    | "december" | "dec" => Some(12),
    | _ => None
  }
}
