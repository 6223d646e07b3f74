use serde::Serialize;

use crate::datetime::{
  DateMarker,
  add_days,
  weekday_index
};
use crate::error::ProfileError;
use crate::range::{
  DateRange,
  OpenDateRange
};

/// Which way a date moves when stepping over hidden days.
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
#[serde(rename_all = "lowercase")]
pub enum Direction {
  Backward,
  #[default]
  Forward
}

impl Direction {
  pub fn step(self) -> i64 {
    match self {
      | Direction::Backward => -1,
      | Direction::Forward => 1
    }
  }
}

/// Weekday exclusion table, indexed by day of week with Sunday as 0.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
pub struct HiddenDays {
  table: [bool; 7]
}

impl HiddenDays {
  /// Builds the table. Saturday and Sunday are added when `weekends` is
  /// false. Fails when nothing would be left to show.
  pub fn new(
    hidden_days: &[u8],
    weekends: bool
  ) -> Result<Self, ProfileError> {
    let mut table = [false; 7];

    for &day in hidden_days {
      match table.get_mut(day as usize) {
        | Some(slot) => *slot = true,
        | None => {
          tracing::warn!(
            day,
            "ignoring out-of-range hidden day index"
          );
        }
      }
    }

    if !weekends {
      table[0] = true;
      table[6] = true;
    }

    if table.iter().all(|hidden| *hidden) {
      let mut hidden =
        hidden_days.to_vec();
      if !weekends {
        hidden.extend([0, 6]);
      }
      return Err(
        ProfileError::AllDaysHidden {
          hidden
        }
      );
    }

    Ok(Self {
      table
    })
  }

  pub fn is_hidden_weekday(
    &self,
    weekday: usize
  ) -> bool {
    self.table[weekday % 7]
  }

  pub fn is_hidden(
    &self,
    date: DateMarker
  ) -> bool {
    self.is_hidden_weekday(weekday_index(
      date
    ))
  }

  pub fn hidden_weekdays(
    &self
  ) -> Vec<u8> {
    (0..7u8)
      .filter(|d| self.table[*d as usize])
      .collect()
  }

  /// Steps `date` one day at a time in `direction` until it lands on a
  /// visible day. With `is_exclusive` the day checked is the one the
  /// step leads into, for use on exclusive end bounds. Does not consider
  /// the valid range.
  pub fn skip_hidden_days(
    &self,
    date: DateMarker,
    direction: Direction,
    is_exclusive: bool
  ) -> DateMarker {
    let inc = direction.step();
    let offset =
      if is_exclusive { inc } else { 0 };
    let mut date = date;

    while self.table[(weekday_index(date)
      as i64
      + offset
      + 7)
      .rem_euclid(7)
      as usize]
    {
      date = add_days(date, inc);
    }
    date
  }

  /// Trims hidden days from both ends. `None` when nothing is left.
  pub fn trim_open(
    &self,
    range: &OpenDateRange
  ) -> Option<OpenDateRange> {
    let start = range.start.map(|start| {
      self.skip_hidden_days(
        start,
        Direction::Forward,
        false
      )
    });
    let end = range.end.map(|end| {
      self.skip_hidden_days(
        end,
        Direction::Backward,
        true
      )
    });

    match (start, end) {
      | (Some(s), Some(e)) if s >= e => None,
      | _ => Some(OpenDateRange {
        start,
        end
      })
    }
  }

  pub fn trim_hidden_days(
    &self,
    range: &DateRange
  ) -> Option<DateRange> {
    self
      .trim_open(&range.as_open())
      .and_then(|r| r.bounded())
  }
}
