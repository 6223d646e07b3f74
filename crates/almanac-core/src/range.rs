use std::fmt;

use chrono::Datelike;
use serde::{
  Deserialize,
  Serialize
};

use crate::datetime::{
  DateMarker,
  add_days,
  add_ms,
  diff_ms,
  parse_date_marker,
  start_of_day
};
use crate::duration::{
  MS_PER_DAY,
  MS_PER_HOUR,
  MS_PER_MINUTE,
  MS_PER_SECOND,
  Unit
};

/// Half-open `[start, end)` interval with concrete bounds. May be empty.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
)]
pub struct DateRange {
  pub start: DateMarker,
  pub end:   DateMarker
}

/// Half-open interval where a missing bound is unbounded.
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
pub struct OpenDateRange {
  pub start: Option<DateMarker>,
  pub end:   Option<DateMarker>
}

impl DateRange {
  pub fn new(
    start: DateMarker,
    end: DateMarker
  ) -> Self {
    Self {
      start,
      end
    }
  }

  pub fn empty_at(
    marker: DateMarker
  ) -> Self {
    Self::new(marker, marker)
  }

  pub fn is_empty(&self) -> bool {
    self.start >= self.end
  }

  pub fn contains(
    &self,
    marker: DateMarker
  ) -> bool {
    marker >= self.start
      && marker < self.end
  }

  pub fn as_open(&self) -> OpenDateRange {
    OpenDateRange {
      start: Some(self.start),
      end:   Some(self.end)
    }
  }

  /// Intersection with a possibly open range; bounded input stays bounded.
  pub fn intersect(
    &self,
    other: &OpenDateRange
  ) -> Option<DateRange> {
    intersect_ranges(
      &self.as_open(),
      other
    )
    .and_then(|r| r.bounded())
  }
}

impl fmt::Display for DateRange {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "[{}, {})",
      self.start, self.end
    )
  }
}

impl OpenDateRange {
  pub fn unbounded() -> Self {
    Self::default()
  }

  pub fn bounded(
    &self
  ) -> Option<DateRange> {
    Some(DateRange::new(
      self.start?,
      self.end?
    ))
  }

  pub fn contains(
    &self,
    marker: DateMarker
  ) -> bool {
    self
      .start
      .is_none_or(|start| marker >= start)
      && self
        .end
        .is_none_or(|end| marker < end)
  }
}

impl From<DateRange> for OpenDateRange {
  fn from(range: DateRange) -> Self {
    range.as_open()
  }
}

/// Overlap of two ranges, or `None` when they do not overlap.
pub fn intersect_ranges(
  a: &OpenDateRange,
  b: &OpenDateRange
) -> Option<OpenDateRange> {
  let start = match (a.start, b.start) {
    | (Some(x), Some(y)) => Some(x.max(y)),
    | (x, None) => x,
    | (None, y) => y
  };
  let end = match (a.end, b.end) {
    | (Some(x), Some(y)) => Some(x.min(y)),
    | (x, None) => x,
    | (None, y) => y
  };

  match (start, end) {
    | (Some(s), Some(e)) if s >= e => None,
    | _ => Some(OpenDateRange {
      start,
      end
    })
  }
}

pub fn ranges_intersect(
  a: &OpenDateRange,
  b: &OpenDateRange
) -> bool {
  let ends_after = match (a.end, b.start) {
    | (Some(end), Some(start)) => {
      end > start
    }
    | _ => true
  };
  let starts_before =
    match (a.start, b.end) {
      | (Some(start), Some(end)) => {
        start < end
      }
      | _ => true
    };
  ends_after && starts_before
}

pub fn range_contains_marker(
  range: &OpenDateRange,
  marker: DateMarker
) -> bool {
  range.contains(marker)
}

/// Clips `marker` into `[start, end)`; the last admissible instant is one
/// millisecond before `end`.
pub fn constrain_marker_to_range(
  marker: DateMarker,
  range: &OpenDateRange
) -> DateMarker {
  if let Some(start) = range.start
    && marker < start
  {
    return start;
  }
  if let Some(end) = range.end
    && marker >= end
  {
    return add_ms(end, -1);
  }
  marker
}

/// Range input as supplied through options: textual or concrete bounds.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Deserialize,
)]
pub struct RangeInput {
  #[serde(default)]
  pub start: Option<DateInput>,
  #[serde(default)]
  pub end:   Option<DateInput>
}

#[derive(
  Debug, Clone, PartialEq, Deserialize,
)]
#[serde(untagged)]
pub enum DateInput {
  Text(String),
  #[serde(skip)]
  Marker(DateMarker)
}

impl DateInput {
  pub fn resolve(
    &self,
    now: DateMarker
  ) -> Option<DateMarker> {
    match self {
      | DateInput::Marker(marker) => {
        Some(*marker)
      }
      | DateInput::Text(raw) => {
        match parse_date_marker(raw, now)
        {
          | Ok(marker) => Some(marker),
          | Err(err) => {
            tracing::warn!(
              input = %raw,
              error = %err,
              "ignoring unparseable date"
            );
            None
          }
        }
      }
    }
  }
}

impl From<DateMarker> for DateInput {
  fn from(marker: DateMarker) -> Self {
    DateInput::Marker(marker)
  }
}

impl From<&str> for DateInput {
  fn from(raw: &str) -> Self {
    DateInput::Text(raw.to_string())
  }
}

impl RangeInput {
  pub fn new(
    start: Option<DateInput>,
    end: Option<DateInput>
  ) -> Self {
    Self {
      start,
      end
    }
  }

  pub fn between(
    start: impl Into<DateInput>,
    end: impl Into<DateInput>
  ) -> Self {
    Self::new(
      Some(start.into()),
      Some(end.into())
    )
  }
}

/// Resolves bounds; `None` when neither bound parses or they are reversed.
pub fn parse_range(
  input: &RangeInput,
  now: DateMarker
) -> Option<OpenDateRange> {
  let start = input
    .start
    .as_ref()
    .and_then(|d| d.resolve(now));
  let end = input
    .end
    .as_ref()
    .and_then(|d| d.resolve(now));

  match (start, end) {
    | (None, None) => None,
    | (Some(s), Some(e)) if e < s => None,
    | _ => Some(OpenDateRange {
      start,
      end
    })
  }
}

/// Widens a timed range to whole days. A timed end rounds up to the next
/// midnight; an end not after the start becomes start + 1 day.
pub fn compute_visible_day_range(
  range: &OpenDateRange
) -> OpenDateRange {
  let mut end_day = range.end.map(|end| {
    let day = start_of_day(end);
    if diff_ms(day, end) > 0 {
      add_days(day, 1)
    } else {
      day
    }
  });

  let start_day =
    range.start.map(start_of_day);
  if let (Some(start), Some(end)) =
    (start_day, end_day)
    && end <= start
  {
    end_day = Some(add_days(start, 1));
  }

  OpenDateRange {
    start: start_day,
    end:   end_day
  }
}

fn same_time_of_day(
  a: DateMarker,
  b: DateMarker
) -> bool {
  a.time() == b.time()
}

pub fn diff_whole_years(
  a: DateMarker,
  b: DateMarker
) -> Option<i64> {
  if same_time_of_day(a, b)
    && a.month() == b.month()
    && a.day() == b.day()
  {
    Some(i64::from(b.year() - a.year()))
  } else {
    None
  }
}

pub fn diff_whole_months(
  a: DateMarker,
  b: DateMarker
) -> Option<i64> {
  if same_time_of_day(a, b)
    && a.day() == b.day()
  {
    Some(
      i64::from(b.year() - a.year()) * 12
        + i64::from(b.month())
        - i64::from(a.month())
    )
  } else {
    None
  }
}

pub fn diff_whole_days(
  a: DateMarker,
  b: DateMarker
) -> Option<i64> {
  if same_time_of_day(a, b) {
    Some(
      (diff_ms(a, b) as f64
        / MS_PER_DAY as f64)
        .round() as i64
    )
  } else {
    None
  }
}

/// Coarsest calendar unit that exactly spans `[start, end)`.
pub fn greatest_whole_unit(
  start: DateMarker,
  end: DateMarker
) -> (Unit, i64) {
  if let Some(n) =
    diff_whole_years(start, end)
  {
    return (Unit::Year, n);
  }
  if let Some(n) =
    diff_whole_months(start, end)
  {
    return (Unit::Month, n);
  }
  if let Some(days) =
    diff_whole_days(start, end)
  {
    if days % 7 == 0 {
      return (Unit::Week, days / 7);
    }
    return (Unit::Day, days);
  }

  let ms = diff_ms(start, end);
  if ms % MS_PER_HOUR == 0 {
    return (Unit::Hour, ms / MS_PER_HOUR);
  }
  if ms % MS_PER_MINUTE == 0 {
    return (
      Unit::Minute,
      ms / MS_PER_MINUTE
    );
  }
  if ms % MS_PER_SECOND == 0 {
    return (
      Unit::Second,
      ms / MS_PER_SECOND
    );
  }
  (Unit::Millisecond, ms)
}

#[cfg(test)]
mod tests {
  use chrono::TimeDelta;

  use super::*;
  use crate::datetime::ymd;

  fn at(
    y: i32,
    m: u32,
    d: u32
  ) -> DateMarker {
    ymd(y, m, d).expect("valid date")
  }

  fn closed(
    a: DateMarker,
    b: DateMarker
  ) -> OpenDateRange {
    DateRange::new(a, b).as_open()
  }

  #[test]
  fn intersection_takes_inner_bounds() {
    let a = closed(at(2024, 1, 1), at(2024, 1, 10));
    let b = OpenDateRange {
      start: Some(at(2024, 1, 5)),
      end:   None
    };
    assert_eq!(
      intersect_ranges(&a, &b),
      Some(closed(at(2024, 1, 5), at(2024, 1, 10)))
    );

    let c = closed(at(2024, 2, 1), at(2024, 2, 2));
    assert_eq!(intersect_ranges(&a, &c), None);
    assert!(!ranges_intersect(&a, &c));
    assert!(ranges_intersect(
      &a,
      &OpenDateRange::unbounded()
    ));
  }

  #[test]
  fn touching_ranges_do_not_intersect() {
    let a = closed(at(2024, 1, 1), at(2024, 1, 2));
    let b = closed(at(2024, 1, 2), at(2024, 1, 3));
    assert!(!ranges_intersect(&a, &b));
    assert_eq!(intersect_ranges(&a, &b), None);
  }

  #[test]
  fn containment_is_half_open() {
    let jan = closed(at(2024, 1, 1), at(2024, 2, 1));
    assert!(range_contains_marker(&jan, at(2024, 1, 1)));
    assert!(!range_contains_marker(&jan, at(2024, 2, 1)));
    let from = OpenDateRange {
      start: Some(at(2024, 1, 1)),
      end:   None
    };
    assert!(range_contains_marker(&from, at(2999, 1, 1)));
  }

  #[test]
  fn constrain_clips_to_last_instant() {
    let valid = closed(at(2024, 1, 1), at(2024, 2, 1));
    assert_eq!(
      constrain_marker_to_range(at(2023, 6, 1), &valid),
      at(2024, 1, 1)
    );
    assert_eq!(
      constrain_marker_to_range(at(2024, 3, 1), &valid),
      at(2024, 2, 1) - TimeDelta::milliseconds(1)
    );
    assert_eq!(
      constrain_marker_to_range(at(2024, 1, 15), &valid),
      at(2024, 1, 15)
    );
    assert_eq!(
      constrain_marker_to_range(
        at(1999, 1, 1),
        &OpenDateRange::unbounded()
      ),
      at(1999, 1, 1)
    );
  }

  #[test]
  fn visible_day_range_rounds_timed_end_up() {
    let timed = OpenDateRange {
      start: Some(at(2024, 1, 1) + TimeDelta::hours(10)),
      end:   Some(at(2024, 1, 3) + TimeDelta::hours(1))
    };
    assert_eq!(
      compute_visible_day_range(&timed),
      closed(at(2024, 1, 1), at(2024, 1, 4))
    );

    let collapsed = OpenDateRange {
      start: Some(at(2024, 1, 1) + TimeDelta::hours(10)),
      end:   Some(at(2024, 1, 1))
    };
    assert_eq!(
      compute_visible_day_range(&collapsed),
      closed(at(2024, 1, 1), at(2024, 1, 2))
    );
  }

  #[test]
  fn parse_range_rejects_reversed_bounds() {
    let now = at(2024, 1, 1);
    assert_eq!(
      parse_range(
        &RangeInput::between("2024-02-01", "2024-01-01"),
        now
      ),
      None
    );
    assert_eq!(
      parse_range(&RangeInput::default(), now),
      None
    );
    assert_eq!(
      parse_range(
        &RangeInput::new(Some("2024-01-05".into()), None),
        now
      ),
      Some(OpenDateRange {
        start: Some(at(2024, 1, 5)),
        end:   None
      })
    );
  }

  #[test]
  fn whole_unit_detection() {
    assert_eq!(
      greatest_whole_unit(at(2024, 1, 1), at(2025, 1, 1)),
      (Unit::Year, 1)
    );
    assert_eq!(
      greatest_whole_unit(at(2024, 1, 15), at(2024, 3, 15)),
      (Unit::Month, 2)
    );
    assert_eq!(
      greatest_whole_unit(at(2024, 1, 1), at(2024, 1, 15)),
      (Unit::Week, 2)
    );
    assert_eq!(
      greatest_whole_unit(at(2024, 1, 1), at(2024, 1, 4)),
      (Unit::Day, 3)
    );
    assert_eq!(
      greatest_whole_unit(
        at(2024, 1, 1),
        at(2024, 1, 1) + TimeDelta::hours(5)
      ),
      (Unit::Hour, 5)
    );
  }
}
