use std::fmt;
use std::sync::Arc;

use chrono::Weekday;
use serde::{
  Deserialize,
  Deserializer
};

use crate::datetime::{
  Clock,
  DateMarker,
  weekday_from_index
};
use crate::duration::{
  Duration,
  DurationInput,
  Unit,
  create_duration
};
use crate::range::{
  DateInput,
  RangeInput
};

pub type ComputeFn<A, T> =
  Arc<dyn Fn(A) -> Option<T> + Send + Sync>;

/// An option that is either given literally or computed from a context
/// argument at the point of use.
pub enum OptionValue<A, T> {
  Literal(T),
  Computed(ComputeFn<A, T>)
}

impl<A, T: Clone> OptionValue<A, T> {
  pub fn computed<F>(f: F) -> Self
  where
    F: Fn(A) -> Option<T>
      + Send
      + Sync
      + 'static
  {
    OptionValue::Computed(Arc::new(f))
  }

  pub fn resolve(
    &self,
    arg: A
  ) -> Option<T> {
    match self {
      | OptionValue::Literal(value) => {
        Some(value.clone())
      }
      | OptionValue::Computed(f) => f(arg)
    }
  }
}

impl<A, T: Clone> Clone
  for OptionValue<A, T>
{
  fn clone(&self) -> Self {
    match self {
      | OptionValue::Literal(value) => {
        OptionValue::Literal(value.clone())
      }
      | OptionValue::Computed(f) => {
        OptionValue::Computed(Arc::clone(f))
      }
    }
  }
}

// Computed values compare by identity of the function.
impl<A, T: PartialEq> PartialEq
  for OptionValue<A, T>
{
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      | (
        OptionValue::Literal(a),
        OptionValue::Literal(b)
      ) => a == b,
      | (
        OptionValue::Computed(a),
        OptionValue::Computed(b)
      ) => Arc::ptr_eq(a, b),
      | _ => false
    }
  }
}

impl<A, T: fmt::Debug> fmt::Debug
  for OptionValue<A, T>
{
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | OptionValue::Literal(value) => f
        .debug_tuple("Literal")
        .field(value)
        .finish(),
      | OptionValue::Computed(_) => {
        f.write_str("Computed(..)")
      }
    }
  }
}

impl<'de, A, T> Deserialize<'de>
  for OptionValue<A, T>
where
  T: Deserialize<'de>
{
  fn deserialize<D>(
    deserializer: D
  ) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>
  {
    T::deserialize(deserializer)
      .map(OptionValue::Literal)
  }
}

/// A range option; computed ranges receive "now" (valid range) or the
/// reference date (visible range).
pub type RangeOption =
  OptionValue<DateMarker, RangeInput>;

/// A "now" override; computed values take no argument.
pub type NowOption =
  OptionValue<(), DateInput>;

/// Raw, partially specified options as they come from configuration or
/// a view definition. Later layers override earlier ones field by field.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Deserialize,
)]
#[serde(default)]
pub struct CalendarOptions {
  pub duration: Option<DurationInput>,
  pub slot_min_time: Option<DurationInput>,
  pub slot_max_time: Option<DurationInput>,
  pub show_non_current_dates:
    Option<bool>,
  pub day_count: Option<u32>,
  pub date_alignment: Option<String>,
  pub date_increment: Option<DurationInput>,
  pub hidden_days: Option<Vec<u8>>,
  pub weekends: Option<bool>,
  pub now: Option<NowOption>,
  pub valid_range: Option<RangeOption>,
  pub visible_range: Option<RangeOption>,
  pub month_mode: Option<bool>,
  pub fixed_week_count: Option<bool>,
  pub first_day: Option<u8>,
  pub title_format: Option<String>,
  pub title_range_separator:
    Option<String>
}

impl CalendarOptions {
  /// Fields set on `self` win over `lower`.
  #[must_use]
  pub fn layered_over(
    &self,
    lower: &CalendarOptions
  ) -> CalendarOptions {
    CalendarOptions {
      duration: self
        .duration
        .clone()
        .or_else(|| lower.duration.clone()),
      slot_min_time: self
        .slot_min_time
        .clone()
        .or_else(|| {
          lower.slot_min_time.clone()
        }),
      slot_max_time: self
        .slot_max_time
        .clone()
        .or_else(|| {
          lower.slot_max_time.clone()
        }),
      show_non_current_dates: self
        .show_non_current_dates
        .or(lower.show_non_current_dates),
      day_count: self
        .day_count
        .or(lower.day_count),
      date_alignment: self
        .date_alignment
        .clone()
        .or_else(|| {
          lower.date_alignment.clone()
        }),
      date_increment: self
        .date_increment
        .clone()
        .or_else(|| {
          lower.date_increment.clone()
        }),
      hidden_days: self
        .hidden_days
        .clone()
        .or_else(|| {
          lower.hidden_days.clone()
        }),
      weekends: self
        .weekends
        .or(lower.weekends),
      now: self
        .now
        .clone()
        .or_else(|| lower.now.clone()),
      valid_range: self
        .valid_range
        .clone()
        .or_else(|| {
          lower.valid_range.clone()
        }),
      visible_range: self
        .visible_range
        .clone()
        .or_else(|| {
          lower.visible_range.clone()
        }),
      month_mode: self
        .month_mode
        .or(lower.month_mode),
      fixed_week_count: self
        .fixed_week_count
        .or(lower.fixed_week_count),
      first_day: self
        .first_day
        .or(lower.first_day),
      title_format: self
        .title_format
        .clone()
        .or_else(|| {
          lower.title_format.clone()
        }),
      title_range_separator: self
        .title_range_separator
        .clone()
        .or_else(|| {
          lower
            .title_range_separator
            .clone()
        })
    }
  }

  /// Resolves the current time: the `now` override when it yields a
  /// date, otherwise the clock.
  pub fn resolve_now(
    &self,
    clock: &dyn Clock
  ) -> DateMarker {
    let wall = clock.now();
    self
      .now
      .as_ref()
      .and_then(|now| now.resolve(()))
      .and_then(|input| input.resolve(wall))
      .unwrap_or(wall)
  }
}

/// Fully resolved options consumed by the date profile generator.
#[derive(Debug, Clone, PartialEq)]
pub struct DateProfileOptions {
  pub slot_min_time:          Duration,
  pub slot_max_time:          Duration,
  pub show_non_current_dates: bool,
  pub day_count:              Option<u32>,
  pub date_alignment:         Option<Unit>,
  pub date_increment:         Option<Duration>,
  pub hidden_days:            Vec<u8>,
  pub weekends:               bool,
  pub valid_range:
    Option<RangeOption>,
  pub visible_range:
    Option<RangeOption>,
  pub month_mode:             bool,
  pub fixed_week_count:       bool,
  pub first_day:              Weekday
}

impl Default for DateProfileOptions {
  fn default() -> Self {
    Self {
      slot_min_time: Duration::default(),
      slot_max_time: Duration::days(1),
      show_non_current_dates: true,
      day_count: None,
      date_alignment: None,
      date_increment: None,
      hidden_days: Vec::new(),
      weekends: true,
      valid_range: None,
      visible_range: None,
      month_mode: false,
      fixed_week_count: true,
      first_day: Weekday::Sun
    }
  }
}

impl DateProfileOptions {
  /// Resolves raw options. Anything that fails to parse is treated as
  /// absent and falls back to the default.
  #[tracing::instrument(skip_all)]
  pub fn resolve(
    raw: &CalendarOptions
  ) -> Self {
    let defaults = Self::default();

    Self {
      slot_min_time: parse_duration_option(
        "slot_min_time",
        raw.slot_min_time.as_ref()
      )
      .unwrap_or(defaults.slot_min_time),
      slot_max_time: parse_duration_option(
        "slot_max_time",
        raw.slot_max_time.as_ref()
      )
      .unwrap_or(defaults.slot_max_time),
      show_non_current_dates: raw
        .show_non_current_dates
        .unwrap_or(
          defaults.show_non_current_dates
        ),
      day_count: raw
        .day_count
        .filter(|count| *count > 0),
      date_alignment: raw
        .date_alignment
        .as_deref()
        .and_then(|name| {
          match name.parse::<Unit>() {
            | Ok(unit) => Some(unit),
            | Err(err) => {
              tracing::warn!(
                alignment = %name,
                error = %err,
                "ignoring date_alignment"
              );
              None
            }
          }
        }),
      date_increment: parse_duration_option(
        "date_increment",
        raw.date_increment.as_ref()
      ),
      hidden_days: raw
        .hidden_days
        .clone()
        .unwrap_or_default(),
      weekends: raw
        .weekends
        .unwrap_or(defaults.weekends),
      valid_range: raw.valid_range.clone(),
      visible_range: raw
        .visible_range
        .clone(),
      month_mode: raw
        .month_mode
        .unwrap_or(defaults.month_mode),
      fixed_week_count: raw
        .fixed_week_count
        .unwrap_or(
          defaults.fixed_week_count
        ),
      first_day: raw
        .first_day
        .and_then(|idx| {
          weekday_from_index(u32::from(
            idx
          ))
        })
        .unwrap_or(defaults.first_day)
    }
  }
}

pub(crate) fn parse_duration_option(
  name: &str,
  input: Option<&DurationInput>
) -> Option<Duration> {
  let input = input?;
  let parsed = create_duration(input);
  if parsed.is_none() {
    tracing::warn!(
      option = name,
      input = ?input,
      "ignoring unparseable duration"
    );
  }
  parsed
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::datetime::{
    FixedClock,
    ymd
  };
  use crate::duration::MS_PER_HOUR;

  #[test]
  fn later_layers_win_field_by_field() {
    let base = CalendarOptions {
      weekends: Some(false),
      day_count: Some(3),
      ..CalendarOptions::default()
    };
    let top = CalendarOptions {
      day_count: Some(5),
      ..CalendarOptions::default()
    };
    let merged = top.layered_over(&base);
    assert_eq!(merged.day_count, Some(5));
    assert_eq!(merged.weekends, Some(false));
  }

  #[test]
  fn unparseable_values_fall_back() {
    let raw = CalendarOptions {
      slot_min_time: Some("early".into()),
      slot_max_time: Some("26:00".into()),
      date_alignment: Some("fortnight".to_string()),
      day_count: Some(0),
      ..CalendarOptions::default()
    };
    let resolved = DateProfileOptions::resolve(&raw);
    assert_eq!(resolved.slot_min_time, Duration::default());
    assert_eq!(
      resolved.slot_max_time.milliseconds,
      26 * MS_PER_HOUR
    );
    assert_eq!(resolved.date_alignment, None);
    assert_eq!(resolved.day_count, None);
  }

  #[test]
  fn computed_values_compare_by_identity() {
    let f: RangeOption =
      OptionValue::computed(|_| None);
    let g = f.clone();
    let h: RangeOption =
      OptionValue::computed(|_| None);
    assert_eq!(f, g);
    assert_ne!(f, h);
  }

  #[test]
  fn now_override_beats_clock() {
    let clock = FixedClock(
      ymd(2030, 1, 1).expect("valid")
    );
    let opts = CalendarOptions {
      now: Some(OptionValue::Literal(
        "2024-05-05".into()
      )),
      ..CalendarOptions::default()
    };
    assert_eq!(
      opts.resolve_now(&clock),
      ymd(2024, 5, 5).expect("valid")
    );
    assert_eq!(
      CalendarOptions::default()
        .resolve_now(&clock),
      ymd(2030, 1, 1).expect("valid")
    );
  }
}
