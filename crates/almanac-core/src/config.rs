use std::collections::BTreeMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

use crate::options::CalendarOptions;
use crate::view::ViewConfig;

pub const CONFIG_FILE_NAME: &str =
  "almanac.toml";
pub const CONFIG_ENV: &str =
  "ALMANAC_CONFIG";
pub const DEFAULT_VIEW: &str =
  "dayGridMonth";

fn default_initial_view() -> String {
  DEFAULT_VIEW.to_string()
}

/// Calendar configuration as read from `almanac.toml`.
#[derive(
  Debug, Clone, PartialEq, Deserialize,
)]
pub struct CalendarConfig {
  #[serde(
    default = "default_initial_view"
  )]
  pub initial_view:  String,
  #[serde(default)]
  pub initial_date:  Option<String>,
  #[serde(default)]
  pub timezone:      Option<String>,
  #[serde(default)]
  pub data_location: Option<String>,
  #[serde(default)]
  pub color:         Option<bool>,
  #[serde(default)]
  pub options:       CalendarOptions,
  #[serde(default)]
  pub views:
    BTreeMap<String, ViewConfig>
}

impl Default for CalendarConfig {
  fn default() -> Self {
    Self {
      initial_view:  default_initial_view(),
      initial_date:  None,
      timezone:      None,
      data_location: None,
      color:         None,
      options:       CalendarOptions::default(),
      views:         BTreeMap::new()
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
  pub calendar:     CalendarConfig,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  /// Loads the config file (if any), applies `key=value` overrides on
  /// top of its TOML document, then sanitizes the result.
  #[tracing::instrument(skip(
    config_override,
    overrides
  ))]
  pub fn load(
    config_override: Option<&Path>,
    overrides: &[(String, String)]
  ) -> anyhow::Result<Self> {
    let path =
      resolve_config_path(config_override)?;

    let (text, loaded_files) = match path {
      | Some(path) => {
        info!(config = %path.display(), "loading calendar config");
        let text = fs::read_to_string(&path)
          .with_context(|| {
            format!(
              "failed to read {}",
              path.display()
            )
          })?;
        (text, vec![path])
      }
      | None => {
        warn!(
          "no almanac.toml found; using \
           defaults"
        );
        (String::new(), vec![])
      }
    };

    let calendar =
      parse_calendar_config(&text, overrides)?;

    Ok(Self {
      calendar,
      loaded_files
    })
  }
}

/// Parses TOML text with overrides merged in before deserialization.
pub fn parse_calendar_config(
  text: &str,
  overrides: &[(String, String)]
) -> anyhow::Result<CalendarConfig> {
  let mut table: toml::Table = text
    .parse()
    .context("invalid calendar config")?;

  for (key, raw) in overrides {
    apply_override(&mut table, key, raw)?;
  }

  let mut calendar: CalendarConfig =
    toml::Value::Table(table)
      .try_into()
      .context(
        "calendar config has the wrong \
         shape"
      )?;
  sanitize_calendar_config(&mut calendar);
  Ok(calendar)
}

/// Sets a dotted key such as `options.weekends`. The value is read as a
/// TOML literal, falling back to a plain string.
#[tracing::instrument(skip(table))]
pub fn apply_override(
  table: &mut toml::Table,
  key: &str,
  raw: &str
) -> anyhow::Result<()> {
  let value = format!("v = {raw}")
    .parse::<toml::Table>()
    .ok()
    .and_then(|mut t| t.remove("v"))
    .unwrap_or_else(|| {
      toml::Value::String(raw.to_string())
    });

  let mut parts: Vec<&str> = key
    .split('.')
    .map(str::trim)
    .collect();
  let Some(leaf) = parts.pop() else {
    return Err(anyhow!(
      "empty override key"
    ));
  };
  if leaf.is_empty()
    || parts.iter().any(|p| p.is_empty())
  {
    return Err(anyhow!(
      "invalid override key: {key}"
    ));
  }

  let mut cursor = table;
  for part in parts {
    let entry = cursor
      .entry(part.to_string())
      .or_insert_with(|| {
        toml::Value::Table(
          toml::Table::new()
        )
      });
    cursor =
      entry.as_table_mut().ok_or_else(
        || {
          anyhow!(
            "override key {key} crosses \
             non-table value {part}"
          )
        }
      )?;
  }

  debug!(key, value = %value, "applying override");
  cursor.insert(leaf.to_string(), value);
  Ok(())
}

fn sanitize_calendar_config(
  config: &mut CalendarConfig
) {
  if config.initial_view.trim().is_empty()
  {
    config.initial_view =
      default_initial_view();
  }

  let options = &mut config.options;

  if let Some(first_day) = options.first_day
    && first_day > 6
  {
    warn!(
      first_day,
      "first_day must be 0-6; using Sunday"
    );
    options.first_day = None;
  }

  if let Some(hidden) =
    options.hidden_days.as_mut()
  {
    let before = hidden.len();
    hidden.retain(|day| *day <= 6);
    if hidden.len() != before {
      warn!(
        dropped = before - hidden.len(),
        "dropping hidden_days outside 0-6"
      );
    }
  }

  if options.day_count == Some(0) {
    warn!("day_count must be positive; ignoring");
    options.day_count = None;
  }

  if let Some(tz) = config.timezone.as_deref()
    && tz.parse::<chrono_tz::Tz>().is_err()
  {
    warn!(
      timezone = tz,
      "unknown timezone; falling back"
    );
    config.timezone = None;
  }
}

#[tracing::instrument(skip(
  config,
  override_dir
))]
pub fn resolve_data_dir(
  config: &CalendarConfig,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(location) =
    config.data_location.as_deref()
  {
    expand_tilde(Path::new(location))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(expand_tilde(path)));
  }

  if let Ok(env_path) =
    std::env::var(CONFIG_ENV)
  {
    if env_path == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(expand_tilde(
      Path::new(&env_path)
    )));
  }

  let local = PathBuf::from(CONFIG_FILE_NAME);
  if local.exists() {
    return Ok(Some(local));
  }

  if let Some(config_dir) = dirs::config_dir()
  {
    let candidate = config_dir
      .join("almanac")
      .join(CONFIG_FILE_NAME);
    if candidate.exists() {
      return Ok(Some(candidate));
    }
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  if let Some(data) = dirs::data_dir() {
    return Ok(data.join("almanac"));
  }
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".almanac"))
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::duration::DurationInput;

  const SAMPLE: &str = r#"
initial_view = "timeGridWeek"
timezone = "Europe/Berlin"

[options]
weekends = false
first_day = 1
slot_min_time = "-02:00"
valid_range = { start = "2024-01-01", end = "2024-12-31" }

[views.fourDay]
type = "timeGrid"
duration = { days = 4 }
"#;

  #[test]
  fn parses_options_and_views() {
    let cfg = parse_calendar_config(SAMPLE, &[])
      .expect("parse");
    assert_eq!(cfg.initial_view, "timeGridWeek");
    assert_eq!(cfg.options.weekends, Some(false));
    assert_eq!(cfg.options.first_day, Some(1));
    assert_eq!(
      cfg.options.slot_min_time,
      Some(DurationInput::Text("-02:00".to_string()))
    );
    assert!(cfg.options.valid_range.is_some());

    let four = cfg.views.get("fourDay").expect("view");
    assert_eq!(four.base.as_deref(), Some("timeGrid"));
    assert!(four.options.duration.is_some());
  }

  #[test]
  fn overrides_merge_before_deserializing() {
    let overrides = vec![
      ("options.day_count".to_string(), "3".to_string()),
      ("initial_view".to_string(), "listWeek".to_string()),
      ("options.weekends".to_string(), "true".to_string())
    ];
    let cfg = parse_calendar_config(SAMPLE, &overrides)
      .expect("parse");
    assert_eq!(cfg.options.day_count, Some(3));
    assert_eq!(cfg.initial_view, "listWeek");
    assert_eq!(cfg.options.weekends, Some(true));

    let err = parse_calendar_config(
      SAMPLE,
      &[("initial_view.x".to_string(), "1".to_string())]
    );
    assert!(err.is_err());
  }

  #[test]
  fn sanitizes_out_of_range_values() {
    let text = r#"
initial_view = ""
timezone = "Mars/Olympus"

[options]
first_day = 9
hidden_days = [0, 7, 6]
day_count = 0
"#;
    let cfg = parse_calendar_config(text, &[]).expect("parse");
    assert_eq!(cfg.initial_view, DEFAULT_VIEW);
    assert_eq!(cfg.timezone, None);
    assert_eq!(cfg.options.first_day, None);
    assert_eq!(cfg.options.hidden_days, Some(vec![0, 6]));
    assert_eq!(cfg.options.day_count, None);
  }

  #[test]
  fn empty_config_uses_defaults() {
    let cfg = parse_calendar_config("", &[]).expect("parse");
    assert_eq!(cfg, CalendarConfig::default());
  }
}
