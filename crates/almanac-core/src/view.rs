use std::collections::BTreeMap;

use serde::{
  Deserialize,
  Serialize
};

use crate::duration::{
  Duration,
  DurationFields,
  DurationInput,
  Unit
};
use crate::error::ProfileError;
use crate::options::{
  CalendarOptions,
  parse_duration_option
};
use crate::render_range::{
  IdentityRange,
  RangeRenderingStrategy,
  TableRange
};

/// The component family a view belongs to. It decides how the render
/// range is padded and whether slot times apply.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum ViewKind {
  DayGrid,
  TimeGrid,
  List
}

impl ViewKind {
  pub fn from_type_name(
    name: &str
  ) -> Option<Self> {
    match name {
      | "dayGrid" => Some(ViewKind::DayGrid),
      | "timeGrid" => {
        Some(ViewKind::TimeGrid)
      }
      | "list" => Some(ViewKind::List),
      | _ => None
    }
  }

  pub fn uses_min_max_time(self) -> bool {
    matches!(self, ViewKind::TimeGrid)
  }
}

/// User-supplied view definition, e.g. a four-day time grid.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Deserialize,
)]
pub struct ViewConfig {
  #[serde(rename = "type")]
  pub base:    Option<String>,
  #[serde(flatten)]
  pub options: CalendarOptions
}

/// Everything needed to build a generator for one view type.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSpec {
  pub view_type:        String,
  pub kind:             ViewKind,
  pub duration:         Option<Duration>,
  pub duration_unit:    Option<Unit>,
  pub option_defaults:  CalendarOptions,
  pub option_overrides: CalendarOptions
}

impl ViewSpec {
  pub fn uses_min_max_time(&self) -> bool {
    self.kind.uses_min_max_time()
  }

  /// Options for this view: built-in view defaults, then calendar-wide
  /// options, then the view's own overrides.
  pub fn merged_options(
    &self,
    calendar: &CalendarOptions
  ) -> CalendarOptions {
    self.option_overrides.layered_over(
      &calendar
        .layered_over(&self.option_defaults)
    )
  }

  pub fn render_strategy(
    &self,
    options: &crate::options::DateProfileOptions
  ) -> Box<dyn RangeRenderingStrategy> {
    match self.kind {
      | ViewKind::DayGrid => {
        Box::new(TableRange {
          month_mode:       options
            .month_mode,
          fixed_week_count: options
            .fixed_week_count,
          first_day:        options
            .first_day
        })
      }
      | ViewKind::TimeGrid
      | ViewKind::List => {
        Box::new(IdentityRange)
      }
    }
  }
}

struct ViewDef {
  kind:      ViewKind,
  defaults:  CalendarOptions,
  overrides: CalendarOptions
}

/// All known view types, built-in and configured.
#[derive(Debug, Clone, Default)]
pub struct ViewRegistry {
  specs: BTreeMap<String, ViewSpec>
}

impl ViewRegistry {
  pub fn builtin(
    calendar: &CalendarOptions
  ) -> Self {
    Self::build(
      &BTreeMap::new(),
      calendar
    )
  }

  /// Compiles built-in and custom definitions. Custom views inherit the
  /// kind and defaults of their `type`; unknown bases are skipped.
  #[tracing::instrument(skip_all, fields(custom = custom.len()))]
  pub fn build(
    custom: &BTreeMap<String, ViewConfig>,
    calendar: &CalendarOptions
  ) -> Self {
    let mut defs: BTreeMap<String, ViewDef> =
      builtin_defs();

    for (name, config) in custom {
      let base_name = config
        .base
        .clone()
        .unwrap_or_else(|| name.clone());
      let base = match defs.get(&base_name)
      {
        | Some(def) => Some((
          def.kind,
          def.defaults.clone(),
          def.overrides.clone()
        )),
        | None => {
          ViewKind::from_type_name(
            &base_name
          )
          .map(|kind| {
            (
              kind,
              CalendarOptions::default(),
              CalendarOptions::default()
            )
          })
        }
      };

      let Some((kind, defaults, inherited)) =
        base
      else {
        tracing::warn!(
          view = %name,
          base = %base_name,
          "skipping view with unknown base type"
        );
        continue;
      };

      defs.insert(name.clone(), ViewDef {
        kind,
        defaults,
        overrides: config
          .options
          .layered_over(&inherited)
      });
    }

    let specs = defs
      .into_iter()
      .map(|(name, def)| {
        let spec = compile_view_spec(
          &name, def, calendar
        );
        (name, spec)
      })
      .collect();

    Self {
      specs
    }
  }

  pub fn get(
    &self,
    view_type: &str
  ) -> Result<&ViewSpec, ProfileError> {
    self.specs.get(view_type).ok_or_else(
      || {
        ProfileError::UnknownView(
          view_type.to_string()
        )
      }
    )
  }

  pub fn specs(
    &self
  ) -> impl Iterator<Item = &ViewSpec> {
    self.specs.values()
  }
}

fn compile_view_spec(
  name: &str,
  def: ViewDef,
  calendar: &CalendarOptions
) -> ViewSpec {
  let duration_input = def
    .overrides
    .duration
    .as_ref()
    .or(def.defaults.duration.as_ref())
    .or(calendar.duration.as_ref());

  let duration = parse_duration_option(
    "duration",
    duration_input
  )
  .filter(|d| !d.is_zero());
  let duration_unit =
    duration.map(|d| d.denominator().0);

  tracing::trace!(
    view = %name,
    ?duration,
    ?duration_unit,
    "compiled view spec"
  );

  ViewSpec {
    view_type: name.to_string(),
    kind: def.kind,
    duration,
    duration_unit,
    option_defaults: def.defaults,
    option_overrides: def.overrides
  }
}

fn span(
  fields: DurationFields
) -> CalendarOptions {
  CalendarOptions {
    duration: Some(DurationInput::Fields(
      fields
    )),
    ..CalendarOptions::default()
  }
}

fn days(n: i64) -> DurationFields {
  DurationFields {
    days: Some(n),
    ..DurationFields::default()
  }
}

fn weeks(n: i64) -> DurationFields {
  DurationFields {
    weeks: Some(n),
    ..DurationFields::default()
  }
}

fn months(n: i64) -> DurationFields {
  DurationFields {
    months: Some(n),
    ..DurationFields::default()
  }
}

fn years(n: i64) -> DurationFields {
  DurationFields {
    years: Some(n),
    ..DurationFields::default()
  }
}

fn builtin_defs()
-> BTreeMap<String, ViewDef> {
  let month_grid = CalendarOptions {
    month_mode: Some(true),
    fixed_week_count: Some(true),
    ..span(months(1))
  };

  let table: Vec<(
    &str,
    ViewKind,
    CalendarOptions
  )> = vec![
    (
      "dayGrid",
      ViewKind::DayGrid,
      CalendarOptions::default()
    ),
    ("dayGridDay", ViewKind::DayGrid, span(days(1))),
    (
      "dayGridWeek",
      ViewKind::DayGrid,
      span(weeks(1))
    ),
    ("dayGridMonth", ViewKind::DayGrid, month_grid),
    (
      "timeGrid",
      ViewKind::TimeGrid,
      CalendarOptions::default()
    ),
    (
      "timeGridDay",
      ViewKind::TimeGrid,
      span(days(1))
    ),
    (
      "timeGridWeek",
      ViewKind::TimeGrid,
      span(weeks(1))
    ),
    (
      "list",
      ViewKind::List,
      CalendarOptions::default()
    ),
    ("listDay", ViewKind::List, span(days(1))),
    ("listWeek", ViewKind::List, span(weeks(1))),
    ("listMonth", ViewKind::List, span(months(1))),
    ("listYear", ViewKind::List, span(years(1)))
  ];

  table
    .into_iter()
    .map(|(name, kind, defaults)| {
      (name.to_string(), ViewDef {
        kind,
        defaults,
        overrides: CalendarOptions::default()
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builtin_month_view_classifies_as_month() {
    let registry =
      ViewRegistry::builtin(&CalendarOptions::default());
    let month = registry
      .get("dayGridMonth")
      .expect("month view");
    assert_eq!(month.duration_unit, Some(Unit::Month));
    assert_eq!(month.kind, ViewKind::DayGrid);

    let week = registry
      .get("timeGridWeek")
      .expect("week view");
    assert_eq!(week.duration_unit, Some(Unit::Week));
    assert!(week.uses_min_max_time());

    assert!(matches!(
      registry.get("agendaFortnight"),
      Err(ProfileError::UnknownView(_))
    ));
  }

  #[test]
  fn custom_view_inherits_base_kind() {
    let mut custom = BTreeMap::new();
    custom.insert(
      "fourDay".to_string(),
      ViewConfig {
        base:    Some("timeGrid".to_string()),
        options: span(days(4))
      }
    );
    custom.insert(
      "bogus".to_string(),
      ViewConfig {
        base:    Some("gantt".to_string()),
        options: CalendarOptions::default()
      }
    );

    let registry = ViewRegistry::build(
      &custom,
      &CalendarOptions::default()
    );
    let four = registry.get("fourDay").expect("custom");
    assert_eq!(four.kind, ViewKind::TimeGrid);
    assert_eq!(four.duration, Some(Duration::days(4)));
    assert_eq!(four.duration_unit, Some(Unit::Day));
    assert!(registry.get("bogus").is_err());
  }

  #[test]
  fn view_overrides_beat_calendar_options() {
    let registry =
      ViewRegistry::builtin(&CalendarOptions::default());
    let month = registry
      .get("dayGridMonth")
      .expect("month view");
    let calendar = CalendarOptions {
      month_mode: Some(false),
      weekends: Some(false),
      ..CalendarOptions::default()
    };
    let merged = month.merged_options(&calendar);
    assert_eq!(merged.month_mode, Some(false));
    assert_eq!(merged.weekends, Some(false));
    assert_eq!(merged.fixed_week_count, Some(true));
  }
}
