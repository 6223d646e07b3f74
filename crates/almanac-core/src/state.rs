use std::collections::{
  BTreeMap,
  VecDeque
};
use std::sync::Arc;

use serde::Serialize;

use crate::datetime::{
  Clock,
  DateMarker,
  start_of_day
};
use crate::error::ProfileError;
use crate::navigation::ToolbarState;
use crate::options::{
  CalendarOptions,
  DateProfileOptions
};
use crate::profile::{
  DateProfile,
  DateProfileGenerator,
  GeneratorProps
};
use crate::title::{
  compute_title,
  describe_increment
};
use crate::view::{
  ViewConfig,
  ViewRegistry,
  ViewSpec
};

/// A navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  Prev,
  Next,
  Today,
  ChangeDate(DateMarker),
  ChangeViewType {
    view_type: String,
    date:      Option<DateMarker>
  }
}

/// Immutable snapshot produced after each action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarState {
  pub view_type:    String,
  pub current_date: DateMarker,
  pub now:          DateMarker,
  pub profile:      DateProfile,
  pub toolbar:      ToolbarState,
  pub title:        String,
  pub increment:    String
}

#[derive(Debug, Clone, PartialEq)]
struct GeneratorKey {
  view:    ViewSpec,
  options: DateProfileOptions,
  today:   DateMarker
}

/// Holds the generator for the most recent inputs and rebuilds it when
/// the view, its resolved options, or the current day change.
#[derive(Debug, Default)]
pub struct GeneratorCache {
  entry:  Option<(
    GeneratorKey,
    Arc<DateProfileGenerator>
  )>,
  hits:   u64,
  misses: u64
}

impl GeneratorCache {
  pub fn get_or_build(
    &mut self,
    view: &ViewSpec,
    options: &CalendarOptions,
    now: DateMarker
  ) -> Result<Arc<DateProfileGenerator>, ProfileError>
  {
    let props =
      GeneratorProps::for_view(view, options);
    let key = GeneratorKey {
      view:    props.view.clone(),
      options: props.options.clone(),
      today:   start_of_day(now)
    };

    if let Some((cached_key, generator)) =
      &self.entry
      && *cached_key == key
    {
      self.hits += 1;
      return Ok(Arc::clone(generator));
    }

    self.misses += 1;
    tracing::debug!(
      view = %view.view_type,
      misses = self.misses,
      "building date profile generator"
    );
    let generator =
      Arc::new(DateProfileGenerator::new(
        props, now
      )?);
    self.entry =
      Some((key, Arc::clone(&generator)));
    Ok(generator)
  }

  pub fn hits(&self) -> u64 {
    self.hits
  }

  pub fn misses(&self) -> u64 {
    self.misses
  }
}

/// Serialises navigation actions and keeps the latest state.
pub struct Calendar {
  options:      CalendarOptions,
  custom_views: BTreeMap<String, ViewConfig>,
  registry:     ViewRegistry,
  clock:        Box<dyn Clock>,
  cache:        GeneratorCache,
  queue:        VecDeque<Action>,
  state:        CalendarState
}

impl std::fmt::Debug for Calendar {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>
  ) -> std::fmt::Result {
    f.debug_struct("Calendar")
      .field("state", &self.state)
      .field("queued", &self.queue.len())
      .finish_non_exhaustive()
  }
}

impl Calendar {
  /// Builds the initial state at `initial_date`, or now when absent.
  #[tracing::instrument(
    skip(options, custom_views, clock)
  )]
  pub fn new(
    options: CalendarOptions,
    custom_views: BTreeMap<String, ViewConfig>,
    initial_view: &str,
    initial_date: Option<DateMarker>,
    clock: Box<dyn Clock>
  ) -> Result<Self, ProfileError> {
    let registry = ViewRegistry::build(
      &custom_views,
      &options
    );
    let mut cache = GeneratorCache::default();
    let now = options.resolve_now(clock.as_ref());
    let view = registry.get(initial_view)?;
    let generator =
      cache.get_or_build(view, &options, now)?;

    let date = initial_date.unwrap_or(now);
    let profile =
      generator.build(date, None, true);
    let current_date =
      settle_date(date, &profile);
    let state = snapshot(
      &generator,
      view,
      &options,
      profile,
      current_date,
      now
    );

    Ok(Self {
      options,
      custom_views,
      registry,
      clock,
      cache,
      queue: VecDeque::new(),
      state
    })
  }

  pub fn state(&self) -> &CalendarState {
    &self.state
  }

  pub fn options(&self) -> &CalendarOptions {
    &self.options
  }

  pub fn registry(&self) -> &ViewRegistry {
    &self.registry
  }

  pub fn cache(&self) -> &GeneratorCache {
    &self.cache
  }

  /// Generator for the current view and options.
  pub fn generator(
    &mut self
  ) -> Result<Arc<DateProfileGenerator>, ProfileError>
  {
    let now =
      self.options.resolve_now(self.clock.as_ref());
    let view =
      self.registry.get(&self.state.view_type)?;
    self.cache.get_or_build(view, &self.options, now)
  }

  /// Queues `action` and drains the queue. Actions queued while an
  /// earlier one is applied run after it, in order.
  pub fn dispatch(
    &mut self,
    action: Action
  ) -> Result<&CalendarState, ProfileError> {
    self.queue.push_back(action);
    while let Some(next) = self.queue.pop_front() {
      if let Err(err) = self.apply(next) {
        self.queue.clear();
        return Err(err);
      }
    }
    Ok(&self.state)
  }

  /// Applies each action in turn, returning the snapshot after each.
  pub fn dispatch_all(
    &mut self,
    actions: impl IntoIterator<Item = Action>
  ) -> Result<Vec<CalendarState>, ProfileError> {
    actions
      .into_iter()
      .map(|action| {
        self.dispatch(action).cloned()
      })
      .collect()
  }

  /// Replaces the calendar options, keeping the view and date.
  pub fn reconfigure(
    &mut self,
    options: CalendarOptions
  ) -> Result<&CalendarState, ProfileError> {
    let registry = ViewRegistry::build(
      &self.custom_views,
      &options
    );
    registry.get(&self.state.view_type)?;
    self.options = options;
    self.registry = registry;
    let view_type = self.state.view_type.clone();
    let date = self.state.current_date;
    self.dispatch(Action::ChangeViewType {
      view_type,
      date: Some(date)
    })
  }

  #[tracing::instrument(skip(self), fields(view = %self.state.view_type))]
  fn apply(
    &mut self,
    action: Action
  ) -> Result<(), ProfileError> {
    let now =
      self.options.resolve_now(self.clock.as_ref());
    let view_type = match &action {
      | Action::ChangeViewType {
        view_type,
        ..
      } => view_type.clone(),
      | _ => self.state.view_type.clone()
    };
    let view = self.registry.get(&view_type)?;
    let generator = self.cache.get_or_build(
      view,
      &self.options,
      now
    )?;

    let previous = &self.state;
    let current_date = previous.current_date;
    let (profile, date) = match action {
      | Action::ChangeViewType {
        date,
        ..
      } => {
        let date = date.unwrap_or(current_date);
        (generator.build(date, None, true), date)
      }
      | Action::ChangeDate(date) => {
        (rebuild_for_date(&generator, previous, date), date)
      }
      | Action::Today => {
        (rebuild_for_date(&generator, previous, now), now)
      }
      | Action::Prev => {
        let prev = generator.build_prev(
          &previous.profile,
          current_date,
          true
        );
        let profile = if prev.is_valid {
          prev
        } else {
          previous.profile.clone()
        };
        (profile, current_date)
      }
      | Action::Next => {
        let next = generator.build_next(
          &previous.profile,
          current_date,
          true
        );
        let profile = if next.is_valid {
          next
        } else {
          previous.profile.clone()
        };
        (profile, current_date)
      }
    };

    let current_date = settle_date(date, &profile);
    self.state = snapshot(
      &generator,
      view,
      &self.options,
      profile,
      current_date,
      now
    );
    tracing::info!(
      view = %self.state.view_type,
      date = %self.state.current_date,
      title = %self.state.title,
      "calendar state updated"
    );
    Ok(())
  }
}

/// Rebuilds only when the date leaves the current range.
fn rebuild_for_date(
  generator: &DateProfileGenerator,
  previous: &CalendarState,
  date: DateMarker
) -> DateProfile {
  if previous.profile.active_range.is_none()
    || !previous.profile.current_range.contains(date)
  {
    generator.build(date, None, true)
  } else {
    previous.profile.clone()
  }
}

/// Keeps the date inside the profile's current range.
fn settle_date(
  date: DateMarker,
  profile: &DateProfile
) -> DateMarker {
  if profile.current_range.contains(date) {
    date
  } else {
    profile.current_range.start
  }
}

fn snapshot(
  generator: &DateProfileGenerator,
  view: &ViewSpec,
  options: &CalendarOptions,
  profile: DateProfile,
  current_date: DateMarker,
  now: DateMarker
) -> CalendarState {
  let merged = view.merged_options(options);
  let toolbar = ToolbarState::compute(
    generator,
    &profile,
    current_date,
    now
  );
  CalendarState {
    view_type: view.view_type.clone(),
    current_date,
    now,
    title: compute_title(&profile, &merged),
    increment: describe_increment(
      &profile.date_increment
    ),
    toolbar,
    profile
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::datetime::{
    FixedClock,
    ymd
  };
  use crate::options::OptionValue;
  use crate::range::{
    DateRange,
    RangeInput
  };

  fn at(
    y: i32,
    m: u32,
    d: u32
  ) -> DateMarker {
    ymd(y, m, d).expect("valid date")
  }

  fn calendar(
    options: CalendarOptions,
    view: &str
  ) -> Calendar {
    Calendar::new(
      options,
      BTreeMap::new(),
      view,
      Some(at(2024, 6, 12)),
      Box::new(FixedClock(at(2024, 6, 12)))
    )
    .expect("calendar")
  }

  #[test]
  fn actions_apply_in_order() {
    let mut cal =
      calendar(CalendarOptions::default(), "dayGridMonth");
    let states = cal
      .dispatch_all([
        Action::Next,
        Action::Next,
        Action::Prev,
        Action::ChangeViewType {
          view_type: "timeGridWeek".to_string(),
          date:      None
        }
      ])
      .expect("dispatch");

    let titles: Vec<_> =
      states.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec![
      "July 2024",
      "August 2024",
      "July 2024",
      "Jun 30 \u{2013} Jul 6, 2024"
    ]);
    assert_eq!(cal.state().current_date, at(2024, 7, 1));
  }

  #[test]
  fn change_date_inside_range_keeps_profile() {
    let mut cal =
      calendar(CalendarOptions::default(), "dayGridMonth");
    let before = cal.state().profile.clone();
    let state = cal
      .dispatch(Action::ChangeDate(at(2024, 6, 20)))
      .expect("dispatch");
    assert_eq!(state.profile, before);
    assert_eq!(state.current_date, at(2024, 6, 20));

    let state = cal
      .dispatch(Action::ChangeDate(at(2024, 9, 2)))
      .expect("dispatch");
    assert_eq!(
      state.profile.current_range,
      DateRange::new(at(2024, 9, 1), at(2024, 10, 1))
    );
  }

  #[test]
  fn navigation_stops_at_valid_range() {
    let options = CalendarOptions {
      valid_range: Some(OptionValue::Literal(
        RangeInput::between("2024-06-01", "2024-07-01")
      )),
      ..CalendarOptions::default()
    };
    let mut cal = calendar(options, "dayGridMonth");
    let june = cal.state().profile.clone();
    assert!(!cal.state().toolbar.is_next_enabled);

    let state = cal.dispatch(Action::Next).expect("next");
    assert_eq!(state.profile, june);

    let state = cal
      .dispatch(Action::ChangeDate(at(2025, 1, 1)))
      .expect("change");
    assert_eq!(state.profile.current_range, june.current_range);
    assert_eq!(state.current_date, at(2024, 6, 1));
  }

  #[test]
  fn generator_is_reused_until_inputs_change() {
    let mut cal =
      calendar(CalendarOptions::default(), "timeGridWeek");
    cal.dispatch(Action::Next).expect("next");
    cal.dispatch(Action::Prev).expect("prev");
    assert_eq!(cal.cache().misses(), 1);
    assert!(cal.cache().hits() >= 2);

    cal
      .reconfigure(CalendarOptions {
        weekends: Some(false),
        ..CalendarOptions::default()
      })
      .expect("reconfigure");
    assert_eq!(cal.cache().misses(), 2);
    assert_eq!(
      cal.state().profile.render_range,
      DateRange::new(at(2024, 6, 10), at(2024, 6, 15))
    );
  }

  #[test]
  fn unknown_view_is_reported() {
    let mut cal =
      calendar(CalendarOptions::default(), "dayGridMonth");
    let err = cal
      .dispatch(Action::ChangeViewType {
        view_type: "gantt".to_string(),
        date:      None
      })
      .expect_err("unknown");
    assert_eq!(err, ProfileError::UnknownView("gantt".into()));
    assert_eq!(cal.state().view_type, "dayGridMonth");
  }

  #[test]
  fn today_returns_to_now() {
    let mut cal =
      calendar(CalendarOptions::default(), "dayGridMonth");
    cal.dispatch(Action::Next).expect("next");
    assert!(cal.state().toolbar.is_today_enabled);
    let state = cal.dispatch(Action::Today).expect("today");
    assert_eq!(state.current_date, at(2024, 6, 12));
    assert!(!state.toolbar.is_today_enabled);
  }
}
