use serde::Serialize;

use crate::datetime::{
  DateMarker,
  add_days,
  add_duration,
  start_of,
  start_of_day,
  subtract_duration
};
use crate::duration::{
  Duration,
  Unit
};
use crate::error::ProfileError;
use crate::hidden_days::{
  Direction,
  HiddenDays
};
use crate::options::{
  CalendarOptions,
  DateProfileOptions,
  RangeOption
};
use crate::range::{
  DateRange,
  OpenDateRange,
  compute_visible_day_range,
  constrain_marker_to_range,
  greatest_whole_unit,
  parse_range,
  ranges_intersect
};
use crate::render_range::RangeRenderingStrategy;
use crate::view::ViewSpec;

/// The computed date window for one view at one reference date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateProfile {
  pub valid_range:        OpenDateRange,
  pub current_range:      DateRange,
  pub current_range_unit: Unit,
  pub is_range_all_day:   bool,
  pub render_range:       DateRange,
  pub active_range:       Option<DateRange>,
  pub slot_min_time:      Duration,
  pub slot_max_time:      Duration,
  pub is_valid:           bool,
  pub date_increment:     Duration
}

/// Inputs a generator is built from.
#[derive(Debug)]
pub struct GeneratorProps {
  pub view:     ViewSpec,
  pub options:  DateProfileOptions,
  pub strategy: Box<dyn RangeRenderingStrategy>
}

impl GeneratorProps {
  /// Layers the view's defaults and overrides around the calendar options
  /// and picks the render strategy for the view's kind.
  pub fn for_view(
    view: &ViewSpec,
    calendar: &CalendarOptions
  ) -> Self {
    let merged = view.merged_options(calendar);
    let options =
      DateProfileOptions::resolve(&merged);
    let strategy =
      view.render_strategy(&options);

    Self {
      view: view.clone(),
      options,
      strategy
    }
  }
}

struct CurrentRangeInfo {
  duration: Option<Duration>,
  unit:     Unit,
  range:    DateRange
}

/// Builds date profiles for a single view configuration. Immutable once
/// constructed; build a new one when any input changes.
#[derive(Debug)]
pub struct DateProfileGenerator {
  props:  GeneratorProps,
  now:    DateMarker,
  hidden: HiddenDays
}

impl DateProfileGenerator {
  #[tracing::instrument(
    skip(props),
    fields(view = %props.view.view_type)
  )]
  pub fn new(
    props: GeneratorProps,
    now: DateMarker
  ) -> Result<Self, ProfileError> {
    let hidden = HiddenDays::new(
      &props.options.hidden_days,
      props.options.weekends
    )?;

    Ok(Self {
      props,
      now,
      hidden
    })
  }

  pub fn now(&self) -> DateMarker {
    self.now
  }

  pub fn view(&self) -> &ViewSpec {
    &self.props.view
  }

  pub fn options(
    &self
  ) -> &DateProfileOptions {
    &self.props.options
  }

  pub fn hidden_days(&self) -> &HiddenDays {
    &self.hidden
  }

  /// Profile for the window before `profile`.
  pub fn build_prev(
    &self,
    profile: &DateProfile,
    current_date: DateMarker,
    force_to_valid: bool
  ) -> DateProfile {
    let prev = subtract_duration(
      self.start_of(
        current_date,
        profile.current_range_unit
      ),
      &profile.date_increment
    );
    self.build(
      prev,
      Some(Direction::Backward),
      force_to_valid
    )
  }

  /// Profile for the window after `profile`.
  pub fn build_next(
    &self,
    profile: &DateProfile,
    current_date: DateMarker,
    force_to_valid: bool
  ) -> DateProfile {
    let next = add_duration(
      self.start_of(
        current_date,
        profile.current_range_unit
      ),
      &profile.date_increment
    );
    self.build(
      next,
      Some(Direction::Forward),
      force_to_valid
    )
  }

  /// Computes the profile around `date`. `direction` is the way the date
  /// just moved, if it moved; hidden days are skipped that way.
  #[tracing::instrument(
    skip(self),
    fields(view = %self.props.view.view_type)
  )]
  pub fn build(
    &self,
    date: DateMarker,
    direction: Option<Direction>,
    force_to_valid: bool
  ) -> DateProfile {
    let valid = self.build_valid_range();
    // An empty valid range accepts nothing.
    let valid_range =
      valid.unwrap_or_else(|| {
        let start = self.raw_valid_start();
        OpenDateRange {
          start,
          end: start
        }
      });

    let date = if force_to_valid {
      constrain_marker_to_range(
        date,
        &valid_range
      )
    } else {
      date
    };

    let info = self
      .build_current_range_info(date, direction);
    let is_range_all_day =
      info.unit.is_all_day();

    let trimmed_current = self
      .hidden
      .trim_hidden_days(&info.range)
      .unwrap_or(DateRange::empty_at(
        info.range.start
      ));
    let render_range = self
      .hidden
      .trim_hidden_days(
        &self.props.strategy.build_render_range(
          &trimmed_current,
          info.unit,
          is_range_all_day
        )
      )
      .unwrap_or(DateRange::empty_at(
        info.range.start
      ));

    let mut active_range = Some(render_range)
      .filter(|r| !r.is_empty());
    if !self.props.options.show_non_current_dates {
      active_range = active_range.and_then(
        |r| r.intersect(&info.range.as_open())
      );
    }
    let active_range = active_range
      .map(|r| self.adjust_active_range(r))
      .and_then(|r| {
        valid.and_then(|v| r.intersect(&v))
      });

    let is_valid = valid.is_some_and(|v| {
      ranges_intersect(
        &info.range.as_open(),
        &v
      )
    });

    let date_increment =
      self.build_date_increment(info.duration);

    tracing::debug!(
      current = %info.range,
      unit = %info.unit,
      render = %render_range,
      is_valid,
      "built date profile"
    );

    DateProfile {
      valid_range,
      current_range: info.range,
      current_range_unit: info.unit,
      is_range_all_day,
      render_range,
      active_range,
      slot_min_time: self
        .props
        .options
        .slot_min_time,
      slot_max_time: self
        .props
        .options
        .slot_max_time,
      is_valid,
      date_increment
    }
  }

  /// The valid range, trimmed of hidden days. `None` when trimming leaves
  /// nothing; fully open when no valid range is configured.
  fn build_valid_range(
    &self
  ) -> Option<OpenDateRange> {
    let range = self
      .range_option(
        self.props.options.valid_range.as_ref(),
        self.now
      )
      .unwrap_or_default();
    self.hidden.trim_open(&range)
  }

  fn raw_valid_start(
    &self
  ) -> Option<DateMarker> {
    self
      .range_option(
        self.props.options.valid_range.as_ref(),
        self.now
      )
      .and_then(|r| r.start)
  }

  fn build_current_range_info(
    &self,
    date: DateMarker,
    direction: Option<Direction>
  ) -> CurrentRangeInfo {
    let view = &self.props.view;

    if let (Some(duration), Some(unit)) =
      (view.duration, view.duration_unit)
    {
      return CurrentRangeInfo {
        duration: Some(duration),
        unit,
        range: self.build_range_from_duration(
          date, direction, &duration, unit
        )
      };
    }

    if let Some(day_count) =
      self.props.options.day_count
    {
      return CurrentRangeInfo {
        duration: None,
        unit:     Unit::Day,
        range:    self
          .build_range_from_day_count(
            date, direction, day_count
          )
      };
    }

    if let Some(range) =
      self.build_custom_visible_range(date)
    {
      let (unit, _) = greatest_whole_unit(
        range.start,
        range.end
      );
      return CurrentRangeInfo {
        duration: None,
        unit,
        range
      };
    }

    let duration = Duration::days(1);
    let (unit, _) = duration.denominator();
    CurrentRangeInfo {
      duration: Some(duration),
      unit,
      range: self.build_range_from_duration(
        date, direction, &duration, unit
      )
    }
  }

  fn build_range_from_duration(
    &self,
    date: DateMarker,
    direction: Option<Direction>,
    duration: &Duration,
    unit: Unit
  ) -> DateRange {
    let options = &self.props.options;
    let alignment = options
      .date_alignment
      .unwrap_or_else(|| {
        match options.date_increment {
          | Some(increment)
            if increment.as_rough_ms()
              < duration.as_rough_ms() =>
          {
            increment.denominator().0
          }
          | _ => unit
        }
      });

    let compute = |date: DateMarker| {
      let start =
        self.start_of(date, alignment);
      DateRange::new(
        start,
        add_duration(start, duration)
      )
    };

    let range = compute(date);
    if self
      .hidden
      .trim_hidden_days(&range)
      .is_none()
    {
      // Entirely hidden: move past the hidden days and try once more.
      let skipped =
        self.hidden.skip_hidden_days(
          date,
          direction.unwrap_or_default(),
          false
        );
      return compute(skipped);
    }
    range
  }

  fn build_range_from_day_count(
    &self,
    date: DateMarker,
    direction: Option<Direction>,
    day_count: u32
  ) -> DateRange {
    let mut start = date;
    if let Some(alignment) =
      self.props.options.date_alignment
    {
      start = self.start_of(start, alignment);
    }
    start = start_of_day(start);
    start = self.hidden.skip_hidden_days(
      start,
      direction.unwrap_or_default(),
      false
    );

    let mut end = start;
    let mut counted = 0;
    loop {
      end = add_days(end, 1);
      if !self.hidden.is_hidden(end) {
        counted += 1;
      }
      if counted >= day_count {
        break;
      }
    }

    DateRange::new(start, end)
  }

  fn build_custom_visible_range(
    &self,
    date: DateMarker
  ) -> Option<DateRange> {
    self
      .range_option(
        self
          .props
          .options
          .visible_range
          .as_ref(),
        date
      )?
      .bounded()
  }

  /// Extends the active range by slot times that fall outside one day.
  /// Only a negative minimum and a maximum past one day widen it.
  fn adjust_active_range(
    &self,
    range: DateRange
  ) -> DateRange {
    if !self.props.view.uses_min_max_time() {
      return range;
    }

    let options = &self.props.options;
    let mut start = range.start;
    let mut end = range.end;

    if options.slot_min_time.as_rough_days()
      < 0.0
    {
      start = add_duration(
        start_of_day(start),
        &options.slot_min_time
      );
    }

    if options.slot_max_time.as_rough_days()
      > 1.0
    {
      end = add_duration(
        add_days(start_of_day(end), -1),
        &options.slot_max_time
      );
    }

    DateRange::new(start, end)
  }

  fn build_date_increment(
    &self,
    fallback: Option<Duration>
  ) -> Duration {
    let options = &self.props.options;
    options
      .date_increment
      .or_else(|| {
        options
          .date_alignment
          .map(|unit| Duration::of(1, unit))
      })
      .or(fallback)
      .unwrap_or_else(|| Duration::days(1))
  }

  /// Resolves a range option (calling it with `arg` when computed), then
  /// parses it and widens it to whole days.
  fn range_option(
    &self,
    option: Option<&RangeOption>,
    arg: DateMarker
  ) -> Option<OpenDateRange> {
    let input = option?.resolve(arg)?;
    let range = parse_range(&input, self.now)?;
    Some(compute_visible_day_range(&range))
  }

  fn start_of(
    &self,
    date: DateMarker,
    unit: Unit
  ) -> DateMarker {
    start_of(
      date,
      unit,
      self.props.options.first_day
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::datetime::ymd;
  use crate::duration::{
    DurationInput,
    MS_PER_HOUR
  };
  use crate::options::OptionValue;
  use crate::range::RangeInput;
  use crate::view::ViewRegistry;

  fn at(
    y: i32,
    m: u32,
    d: u32
  ) -> DateMarker {
    ymd(y, m, d).expect("valid date")
  }

  fn generator(
    view_type: &str,
    options: CalendarOptions
  ) -> DateProfileGenerator {
    let registry = ViewRegistry::builtin(&options);
    let view =
      registry.get(view_type).expect("known view");
    DateProfileGenerator::new(
      GeneratorProps::for_view(view, &options),
      at(2024, 6, 12)
    )
    .expect("generator")
  }

  #[test]
  fn month_view_aligns_to_month() {
    let g_1 =
      generator("listMonth", CalendarOptions::default());
    for day in [1, 15, 31] {
      let profile =
        g_1.build(at(2024, 1, day), None, true);
      assert_eq!(
        profile.current_range,
        DateRange::new(at(2024, 1, 1), at(2024, 2, 1))
      );
      assert_eq!(profile.current_range_unit, Unit::Month);
      assert!(profile.is_range_all_day);
      assert!(profile.is_valid);
    }
  }

  #[test]
  fn prev_and_next_are_inverse_for_months() {
    let g_1 =
      generator("dayGridMonth", CalendarOptions::default());
    let date = at(2024, 3, 17);
    let profile = g_1.build(date, None, true);
    let next = g_1.build_next(&profile, date, true);
    assert_eq!(
      next.current_range,
      DateRange::new(at(2024, 4, 1), at(2024, 5, 1))
    );
    let back = g_1.build_prev(
      &next,
      next.current_range.start,
      true
    );
    assert_eq!(back.current_range, profile.current_range);
  }

  #[test]
  fn validity_tracks_valid_range() {
    let options = CalendarOptions {
      valid_range: Some(OptionValue::Literal(
        RangeInput::between("2024-01-01", "2024-02-01")
      )),
      ..CalendarOptions::default()
    };
    let g_1 = generator("dayGridMonth", options);

    let outside = g_1.build(at(2024, 3, 15), None, false);
    assert!(!outside.is_valid);
    assert_eq!(outside.active_range, None);

    let inside = g_1.build(at(2024, 1, 15), None, false);
    assert!(inside.is_valid);

    let forced = g_1.build(at(2024, 3, 15), None, true);
    assert!(forced.is_valid);
    assert_eq!(
      forced.current_range,
      DateRange::new(at(2024, 1, 1), at(2024, 2, 1))
    );
    // The grid pads past the valid range; the active range does not.
    assert_eq!(
      forced.active_range,
      Some(DateRange::new(at(2024, 1, 1), at(2024, 2, 1)))
    );
  }

  #[test]
  fn day_count_skips_hidden_days() {
    let options = CalendarOptions {
      day_count: Some(5),
      hidden_days: Some(vec![0, 6]),
      ..CalendarOptions::default()
    };
    let g_1 = generator("timeGrid", options);
    let profile = g_1.build(at(2024, 1, 1), None, true);
    assert_eq!(
      profile.current_range,
      DateRange::new(at(2024, 1, 1), at(2024, 1, 8))
    );
    assert_eq!(profile.current_range_unit, Unit::Day);
    assert_eq!(profile.date_increment, Duration::days(1));
  }

  #[test]
  fn slot_times_widen_active_range() {
    let options = CalendarOptions {
      slot_min_time: Some("-02:00".into()),
      slot_max_time: Some("26:00".into()),
      ..CalendarOptions::default()
    };
    let g_1 = generator("timeGridDay", options);
    let profile = g_1.build(at(2024, 1, 10), None, true);
    let active = profile.active_range.expect("active");
    assert_eq!(active.start, at(2024, 1, 9) + chrono::TimeDelta::hours(22));
    assert_eq!(active.end, at(2024, 1, 11) + chrono::TimeDelta::hours(2));
    assert_eq!(
      profile.slot_max_time.milliseconds,
      26 * MS_PER_HOUR
    );
    assert_eq!(
      profile.current_range,
      DateRange::new(at(2024, 1, 10), at(2024, 1, 11))
    );
  }

  #[test]
  fn list_views_ignore_slot_times() {
    let options = CalendarOptions {
      slot_min_time: Some("-02:00".into()),
      ..CalendarOptions::default()
    };
    let g_1 = generator("listDay", options);
    let profile = g_1.build(at(2024, 1, 10), None, true);
    assert_eq!(
      profile.active_range,
      Some(profile.current_range)
    );
  }

  #[test]
  fn hidden_single_day_moves_with_direction() {
    let options = CalendarOptions {
      weekends: Some(false),
      ..CalendarOptions::default()
    };
    let g_1 = generator("dayGridDay", options);
    // Saturday 2024-01-06.
    let forward = g_1.build(at(2024, 1, 6), None, true);
    assert_eq!(forward.current_range.start, at(2024, 1, 8));

    let backward = g_1.build(
      at(2024, 1, 6),
      Some(Direction::Backward),
      true
    );
    assert_eq!(backward.current_range.start, at(2024, 1, 5));
  }

  #[test]
  fn computed_visible_range_gets_reference_date() {
    let options = CalendarOptions {
      visible_range: Some(OptionValue::computed(
        |date: DateMarker| {
          Some(RangeInput::between(
            add_days(date, -1),
            add_days(date, 2)
          ))
        }
      )),
      ..CalendarOptions::default()
    };
    let g_1 = generator("timeGrid", options);
    let profile = g_1.build(at(2024, 5, 10), None, true);
    assert_eq!(
      profile.current_range,
      DateRange::new(at(2024, 5, 9), at(2024, 5, 12))
    );
    assert_eq!(profile.current_range_unit, Unit::Day);
  }

  #[test]
  fn computed_valid_range_follows_now() {
    let options = CalendarOptions {
      valid_range: Some(OptionValue::computed(
        |now: DateMarker| {
          Some(RangeInput::between(now, add_days(now, 1)))
        }
      )),
      ..CalendarOptions::default()
    };
    let g_1 = generator("dayGridDay", options);
    let today = DateRange::new(at(2024, 6, 12), at(2024, 6, 13));

    let forced = g_1.build(at(2024, 7, 1), None, true);
    assert_eq!(forced.valid_range, today.as_open());
    assert_eq!(forced.current_range, today);
    assert!(forced.is_valid);

    let free = g_1.build(at(2024, 7, 1), None, false);
    assert_eq!(
      free.current_range,
      DateRange::new(at(2024, 7, 1), at(2024, 7, 2))
    );
    assert!(!free.is_valid);
    assert_eq!(free.active_range, None);
  }

  #[test]
  fn alignment_and_increment_interplay() {
    let options = CalendarOptions {
      date_increment: Some(DurationInput::Days(1)),
      ..CalendarOptions::default()
    };
    let g_1 = generator("timeGridWeek", options);
    // Wednesday reference; the one-day increment aligns to the day.
    let profile = g_1.build(at(2024, 1, 10), None, true);
    assert_eq!(profile.current_range.start, at(2024, 1, 10));
    assert_eq!(
      profile.current_range.end,
      at(2024, 1, 17)
    );

    let aligned = generator(
      "timeGridWeek",
      CalendarOptions {
        date_alignment: Some("month".to_string()),
        ..CalendarOptions::default()
      }
    );
    let profile = aligned.build(at(2024, 1, 10), None, true);
    assert_eq!(profile.current_range.start, at(2024, 1, 1));
    assert_eq!(profile.date_increment, Duration::of(1, Unit::Month));
  }

  #[test]
  fn all_hidden_is_rejected() {
    let options = CalendarOptions {
      hidden_days: Some(vec![1, 2, 3, 4, 5]),
      weekends: Some(false),
      ..CalendarOptions::default()
    };
    let registry = ViewRegistry::builtin(&options);
    let view = registry.get("dayGridWeek").expect("view");
    let result = DateProfileGenerator::new(
      GeneratorProps::for_view(view, &options),
      at(2024, 1, 1)
    );
    assert!(matches!(
      result,
      Err(ProfileError::AllDaysHidden { .. })
    ));
  }
}
