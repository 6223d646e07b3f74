use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{
  Deserialize,
  Serialize
};

pub const MS_PER_SECOND: i64 = 1_000;
pub const MS_PER_MINUTE: i64 =
  60 * MS_PER_SECOND;
pub const MS_PER_HOUR: i64 =
  60 * MS_PER_MINUTE;
pub const MS_PER_DAY: i64 =
  24 * MS_PER_HOUR;

/// Calendar units, coarsest first.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
  Year,
  Month,
  Week,
  Day,
  Hour,
  Minute,
  Second,
  Millisecond
}

impl Unit {
  pub fn as_str(self) -> &'static str {
    match self {
      | Unit::Year => "year",
      | Unit::Month => "month",
      | Unit::Week => "week",
      | Unit::Day => "day",
      | Unit::Hour => "hour",
      | Unit::Minute => "minute",
      | Unit::Second => "second",
      | Unit::Millisecond => {
        "millisecond"
      }
    }
  }

  /// Units that describe whole days.
  pub fn is_all_day(self) -> bool {
    matches!(
      self,
      Unit::Year
        | Unit::Month
        | Unit::Week
        | Unit::Day
    )
  }
}

impl fmt::Display for Unit {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Unit {
  type Err = String;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let lower = s.trim().to_ascii_lowercase();
    if lower == "ms" {
      return Ok(Unit::Millisecond);
    }
    match lower.trim_end_matches('s') {
      | "year" => Ok(Unit::Year),
      | "month" => Ok(Unit::Month),
      | "week" => Ok(Unit::Week),
      | "day" => Ok(Unit::Day),
      | "hour" => Ok(Unit::Hour),
      | "minute" => Ok(Unit::Minute),
      | "second" => Ok(Unit::Second),
      | "millisecond" => {
        Ok(Unit::Millisecond)
      }
      | other => Err(format!(
        "unknown calendar unit: {other}"
      ))
    }
  }
}

/// A calendar-aware span of time.
///
/// Weeks are folded into `days`; `specified_weeks` remembers that the
/// input was written in weeks so the span can be classified as a week
/// view rather than a seven-day view.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
)]
pub struct Duration {
  pub years:           i32,
  pub months:          i32,
  pub days:            i32,
  pub milliseconds:    i64,
  #[serde(skip)]
  pub specified_weeks: bool
}

impl Duration {
  pub fn of(
    value: i64,
    unit: Unit
  ) -> Self {
    let small = i32::try_from(value)
      .unwrap_or(if value < 0 {
        i32::MIN
      } else {
        i32::MAX
      });
    match unit {
      | Unit::Year => Self {
        years: small,
        ..Self::default()
      },
      | Unit::Month => Self {
        months: small,
        ..Self::default()
      },
      | Unit::Week => Self {
        days: small.saturating_mul(7),
        specified_weeks: true,
        ..Self::default()
      },
      | Unit::Day => Self {
        days: small,
        ..Self::default()
      },
      | Unit::Hour => Self::from_ms(
        value.saturating_mul(
          MS_PER_HOUR
        )
      ),
      | Unit::Minute => Self::from_ms(
        value.saturating_mul(
          MS_PER_MINUTE
        )
      ),
      | Unit::Second => Self::from_ms(
        value.saturating_mul(
          MS_PER_SECOND
        )
      ),
      | Unit::Millisecond => {
        Self::from_ms(value)
      }
    }
  }

  pub fn days(days: i32) -> Self {
    Self::of(i64::from(days), Unit::Day)
  }

  pub fn from_ms(
    milliseconds: i64
  ) -> Self {
    Self {
      milliseconds,
      ..Self::default()
    }
  }

  pub fn is_zero(&self) -> bool {
    self.years == 0
      && self.months == 0
      && self.days == 0
      && self.milliseconds == 0
  }

  pub fn negate(&self) -> Self {
    Self {
      years:           self
        .years
        .saturating_neg(),
      months:          self
        .months
        .saturating_neg(),
      days:            self
        .days
        .saturating_neg(),
      milliseconds:    self
        .milliseconds
        .saturating_neg(),
      specified_weeks: self
        .specified_weeks
    }
  }

  pub fn as_rough_ms(&self) -> i64 {
    let days = i64::from(self.years)
      * 365
      + i64::from(self.months) * 30
      + i64::from(self.days);
    days
      .saturating_mul(MS_PER_DAY)
      .saturating_add(self.milliseconds)
  }

  pub fn as_rough_days(&self) -> f64 {
    self.as_rough_ms() as f64
      / MS_PER_DAY as f64
  }

  /// Denominator honouring how the duration was written.
  pub fn denominator(
    &self
  ) -> (Unit, i64) {
    greatest_duration_denominator(
      self,
      self.specified_weeks
    )
  }
}

/// Loosely typed duration input as it appears in configuration.
#[derive(
  Debug, Clone, PartialEq, Deserialize,
)]
#[serde(untagged)]
pub enum DurationInput {
  Days(i64),
  Text(String),
  Fields(DurationFields)
}

#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Deserialize,
)]
pub struct DurationFields {
  #[serde(alias = "year")]
  pub years:        Option<i64>,
  #[serde(alias = "month")]
  pub months:       Option<i64>,
  #[serde(alias = "week")]
  pub weeks:        Option<i64>,
  #[serde(alias = "day")]
  pub days:         Option<i64>,
  #[serde(alias = "hour")]
  pub hours:        Option<i64>,
  #[serde(alias = "minute")]
  pub minutes:      Option<i64>,
  #[serde(alias = "second")]
  pub seconds:      Option<i64>,
  #[serde(
    alias = "millisecond",
    alias = "ms"
  )]
  pub milliseconds: Option<i64>
}

impl From<&str> for DurationInput {
  fn from(raw: &str) -> Self {
    DurationInput::Text(raw.to_string())
  }
}

impl From<DurationFields>
  for DurationInput
{
  fn from(
    fields: DurationFields
  ) -> Self {
    DurationInput::Fields(fields)
  }
}

/// Parses any accepted duration shape. Returns `None` for text that is
/// not a clock-style duration.
pub fn create_duration(
  input: &DurationInput
) -> Option<Duration> {
  match input {
    | DurationInput::Days(days) => {
      i32::try_from(*days)
        .ok()
        .map(Duration::days)
    }
    | DurationInput::Text(raw) => {
      parse_clock_duration(raw)
    }
    | DurationInput::Fields(fields) => {
      from_fields(fields)
    }
  }
}

/// `None` when any field overflows.
fn from_fields(
  fields: &DurationFields
) -> Option<Duration> {
  let weeks = fields.weeks.unwrap_or(0);
  let milliseconds = clock_ms(
    fields.hours.unwrap_or(0),
    fields.minutes.unwrap_or(0),
    fields.seconds.unwrap_or(0),
    fields.milliseconds.unwrap_or(0)
  )?;
  let days = weeks
    .checked_mul(7)?
    .checked_add(fields.days.unwrap_or(0))?;

  Some(Duration {
    years: i32::try_from(
      fields.years.unwrap_or(0)
    )
    .ok()?,
    months: i32::try_from(
      fields.months.unwrap_or(0)
    )
    .ok()?,
    days: i32::try_from(days).ok()?,
    milliseconds,
    specified_weeks: fields
      .weeks
      .is_some()
  })
}

fn clock_ms(
  hours: i64,
  minutes: i64,
  seconds: i64,
  ms: i64
) -> Option<i64> {
  hours
    .checked_mul(MS_PER_HOUR)?
    .checked_add(
      minutes.checked_mul(MS_PER_MINUTE)?
    )?
    .checked_add(
      seconds.checked_mul(MS_PER_SECOND)?
    )?
    .checked_add(ms)
}

fn clock_duration_re()
-> Option<&'static Regex> {
  static RE: OnceLock<Option<Regex>> =
    OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(
      r"^(-?)(?:(\d+)\.)?(\d+):(\d\d)(?::(\d\d)(?:\.(\d\d\d))?)?$"
    )
    .ok()
  })
  .as_ref()
}

fn parse_clock_duration(
  raw: &str
) -> Option<Duration> {
  let caps = clock_duration_re()?
    .captures(raw.trim())?;
  let field = |idx: usize| -> Option<i64> {
    caps.get(idx).map_or(Some(0), |m| {
      m.as_str().parse::<i64>().ok()
    })
  };
  let sign = if caps
    .get(1)
    .is_some_and(|m| m.as_str() == "-")
  {
    -1
  } else {
    1
  };

  let days = i32::try_from(field(2)?).ok()?;
  let ms = clock_ms(
    field(3)?,
    field(4)?,
    field(5)?,
    field(6)?
  )?;

  Some(Duration {
    years:           0,
    months:          0,
    days:            sign * days,
    milliseconds:    i64::from(sign) * ms,
    specified_weeks: false
  })
}

/// Coarsest unit that evenly divides the single field carrying the
/// duration, along with the divided value.
pub fn greatest_duration_denominator(
  duration: &Duration,
  allow_weeks: bool
) -> (Unit, i64) {
  let ms = duration.milliseconds;
  if ms != 0 {
    if ms % MS_PER_SECOND != 0 {
      return (Unit::Millisecond, ms);
    }
    if ms % MS_PER_MINUTE != 0 {
      return (
        Unit::Second,
        ms / MS_PER_SECOND
      );
    }
    if ms % MS_PER_HOUR != 0 {
      return (
        Unit::Minute,
        ms / MS_PER_MINUTE
      );
    }
    return (Unit::Hour, ms / MS_PER_HOUR);
  }

  if duration.days != 0 {
    let days = i64::from(duration.days);
    if allow_weeks && days % 7 == 0 {
      return (Unit::Week, days / 7);
    }
    return (Unit::Day, days);
  }

  if duration.months != 0 {
    return (
      Unit::Month,
      i64::from(duration.months)
    );
  }

  if duration.years != 0 {
    return (
      Unit::Year,
      i64::from(duration.years)
    );
  }

  (Unit::Millisecond, 0)
}
