use serde::Serialize;

use crate::datetime::DateMarker;
use crate::profile::{
  DateProfile,
  DateProfileGenerator
};

/// Which navigation buttons lead somewhere valid.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct ToolbarState {
  pub is_today_enabled: bool,
  pub is_prev_enabled:  bool,
  pub is_next_enabled:  bool
}

impl ToolbarState {
  /// Probes the neighbouring profiles without forcing them into the
  /// valid range, so an out-of-range neighbour reads as disabled. "Today"
  /// is also disabled while now is already on screen.
  #[tracing::instrument(skip_all)]
  pub fn compute(
    generator: &DateProfileGenerator,
    profile: &DateProfile,
    current_date: DateMarker,
    now: DateMarker
  ) -> Self {
    let today =
      generator.build(now, None, false);
    let prev = generator.build_prev(
      profile,
      current_date,
      false
    );
    let next = generator.build_next(
      profile,
      current_date,
      false
    );

    let state = Self {
      is_today_enabled: today.is_valid
        && !profile
          .current_range
          .contains(now),
      is_prev_enabled:  prev.is_valid,
      is_next_enabled:  next.is_valid
    };
    tracing::debug!(?state, "toolbar state");
    state
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::datetime::ymd;
  use crate::options::{
    CalendarOptions,
    OptionValue
  };
  use crate::profile::GeneratorProps;
  use crate::range::RangeInput;
  use crate::view::ViewRegistry;

  fn at(
    y: i32,
    m: u32,
    d: u32
  ) -> DateMarker {
    ymd(y, m, d).expect("valid date")
  }

  fn month_generator(
    now: DateMarker
  ) -> DateProfileGenerator {
    let options = CalendarOptions {
      valid_range: Some(OptionValue::Literal(
        RangeInput::between("2024-01-01", "2024-03-01")
      )),
      ..CalendarOptions::default()
    };
    let registry = ViewRegistry::builtin(&options);
    let view =
      registry.get("dayGridMonth").expect("view");
    DateProfileGenerator::new(
      GeneratorProps::for_view(view, &options),
      now
    )
    .expect("generator")
  }

  #[test]
  fn edges_of_valid_range_disable_buttons() {
    let now = at(2024, 2, 10);
    let generator = month_generator(now);

    let january = generator.build(at(2024, 1, 5), None, true);
    let state = ToolbarState::compute(
      &generator,
      &january,
      at(2024, 1, 5),
      now
    );
    assert!(!state.is_prev_enabled);
    assert!(state.is_next_enabled);
    assert!(state.is_today_enabled);

    let february = generator.build(now, None, true);
    let state =
      ToolbarState::compute(&generator, &february, now, now);
    assert!(state.is_prev_enabled);
    assert!(!state.is_next_enabled);
    assert!(!state.is_today_enabled);
  }

  #[test]
  fn today_outside_valid_range_is_disabled() {
    let now = at(2025, 7, 4);
    let generator = month_generator(now);
    let january = generator.build(at(2024, 1, 5), None, true);
    let state = ToolbarState::compute(
      &generator,
      &january,
      at(2024, 1, 5),
      now
    );
    assert!(!state.is_today_enabled);
  }
}
