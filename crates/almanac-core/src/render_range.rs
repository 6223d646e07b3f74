use chrono::Weekday;

use crate::datetime::{
  add_days,
  diff_ms,
  start_of_week
};
use crate::duration::{
  MS_PER_DAY,
  Unit
};
use crate::range::DateRange;

/// Decides which cells get drawn around the current range. The result is
/// trimmed of hidden days by the generator afterwards.
pub trait RangeRenderingStrategy:
  std::fmt::Debug + Send + Sync
{
  fn build_render_range(
    &self,
    current: &DateRange,
    unit: Unit,
    is_all_day: bool
  ) -> DateRange;
}

/// Renders exactly the current range.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq,
)]
pub struct IdentityRange;

impl RangeRenderingStrategy for IdentityRange {
  fn build_render_range(
    &self,
    current: &DateRange,
    _unit: Unit,
    _is_all_day: bool
  ) -> DateRange {
    *current
  }
}

/// Day-grid rendering: month and year ranges are widened to whole weeks,
/// and month grids may be padded to a fixed six rows.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct TableRange {
  pub month_mode:       bool,
  pub fixed_week_count: bool,
  pub first_day:        Weekday
}

impl Default for TableRange {
  fn default() -> Self {
    Self {
      month_mode:       false,
      fixed_week_count: true,
      first_day:        Weekday::Sun
    }
  }
}

const GRID_ROWS: i64 = 6;

impl RangeRenderingStrategy for TableRange {
  fn build_render_range(
    &self,
    current: &DateRange,
    unit: Unit,
    _is_all_day: bool
  ) -> DateRange {
    let mut start = current.start;
    let mut end = current.end;

    if matches!(unit, Unit::Year | Unit::Month)
    {
      start =
        start_of_week(start, self.first_day);
      let end_of_week =
        start_of_week(end, self.first_day);
      if end_of_week != end {
        end = add_days(end_of_week, 7);
      }
    }

    if self.month_mode && self.fixed_week_count
    {
      let weeks = diff_ms(start, end) as f64
        / (7 * MS_PER_DAY) as f64;
      let rows = weeks.ceil() as i64;
      end = add_days(end, (GRID_ROWS - rows) * 7);
    }

    tracing::trace!(
      %start,
      %end,
      unit = %unit,
      "table render range"
    );

    DateRange::new(start, end)
  }
}
