use chrono::Datelike;
use chrono::format::{
  Item,
  StrftimeItems
};

use crate::datetime::{
  DateMarker,
  add_days,
  add_ms
};
use crate::duration::{
  Duration,
  Unit
};
use crate::options::CalendarOptions;
use crate::profile::DateProfile;
use crate::range::{
  DateRange,
  diff_whole_days
};

pub const DEFAULT_RANGE_SEPARATOR: &str =
  " \u{2013} ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TitleStyle {
  Year,
  Month,
  ShortDay,
  LongDay
}

fn title_style(
  profile: &DateProfile
) -> TitleStyle {
  match profile.current_range_unit {
    | Unit::Year => TitleStyle::Year,
    | Unit::Month => TitleStyle::Month,
    | _ => {
      let days = diff_whole_days(
        profile.current_range.start,
        profile.current_range.end
      );
      match days {
        | Some(days) if days > 1 => {
          TitleStyle::ShortDay
        }
        | _ => TitleStyle::LongDay
      }
    }
  }
}

/// Heading for a profile. Year and month views title their formal range;
/// shorter views title what is actually active.
pub fn compute_title(
  profile: &DateProfile,
  options: &CalendarOptions
) -> String {
  let range = match profile
    .current_range_unit
  {
    | Unit::Year | Unit::Month => {
      profile.current_range
    }
    | _ => profile
      .active_range
      .unwrap_or(profile.current_range)
  };

  let start = range.start;
  let end = if profile.is_range_all_day
    && range.end > range.start
  {
    add_ms(range.end, -1)
  } else {
    range.end
  };

  let separator = options
    .title_range_separator
    .as_deref()
    .unwrap_or(DEFAULT_RANGE_SEPARATOR);

  if let Some(format) =
    options.title_format.as_deref()
  {
    match custom_title(
      start, end, format, separator
    ) {
      | Some(title) => return title,
      | None => {
        tracing::warn!(
          format,
          "ignoring invalid title_format"
        );
      }
    }
  }

  format_range(
    start,
    end,
    title_style(profile),
    separator
  )
}

fn custom_title(
  start: DateMarker,
  end: DateMarker,
  format: &str,
  separator: &str
) -> Option<String> {
  if StrftimeItems::new(format)
    .any(|item| matches!(item, Item::Error))
  {
    return None;
  }

  let first = start.format(format).to_string();
  let last = end.format(format).to_string();
  if first == last {
    Some(first)
  } else {
    Some(format!("{first}{separator}{last}"))
  }
}

fn format_range(
  start: DateMarker,
  end: DateMarker,
  style: TitleStyle,
  separator: &str
) -> String {
  let same_year = start.year() == end.year();
  let same_month =
    same_year && start.month() == end.month();
  let same_day =
    same_month && start.day() == end.day();

  match style {
    | TitleStyle::Year => {
      if same_year {
        start.format("%Y").to_string()
      } else {
        format!(
          "{}{separator}{}",
          start.format("%Y"),
          end.format("%Y")
        )
      }
    }
    | TitleStyle::Month => {
      if same_month {
        start.format("%B %Y").to_string()
      } else if same_year {
        format!(
          "{}{separator}{}",
          start.format("%B"),
          end.format("%B %Y")
        )
      } else {
        format!(
          "{}{separator}{}",
          start.format("%B %Y"),
          end.format("%B %Y")
        )
      }
    }
    | TitleStyle::ShortDay
    | TitleStyle::LongDay => {
      let month = if style
        == TitleStyle::ShortDay
      {
        "%b"
      } else {
        "%B"
      };
      let day_month =
        format!("{month} %-d");
      let full = format!("{month} %-d, %Y");

      if same_day {
        start.format(&full).to_string()
      } else if same_month {
        format!(
          "{}{separator}{}",
          start.format(&day_month),
          end.format("%-d, %Y")
        )
      } else if same_year {
        format!(
          "{}{separator}{}",
          start.format(&day_month),
          end.format(&full)
        )
      } else {
        format!(
          "{}{separator}{}",
          start.format(&full),
          end.format(&full)
        )
      }
    }
  }
}

/// Human phrasing of a navigation step, e.g. "1 month" or "2 weeks".
pub fn describe_increment(
  duration: &Duration
) -> String {
  let (unit, value) = duration.denominator();
  let plural =
    if value.abs() == 1 { "" } else { "s" };
  format!("{value} {unit}{plural}")
}

/// Days a profile renders, for listing cells.
pub fn rendered_days(
  range: &DateRange
) -> impl Iterator<Item = DateMarker> {
  let end = range.end;
  std::iter::successors(
    Some(range.start),
    |day| {
      Some(add_days(*day, 1))
    }
  )
  .take_while(move |day| *day < end)
}
