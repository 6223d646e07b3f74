use std::io::Write;

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::cli::Invocation;
use crate::config::CalendarConfig;
use crate::datastore::{DataStore, Session, SessionEntry};
use crate::datetime::{Clock, DateMarker, parse_date_marker};
use crate::render::Renderer;
use crate::state::{Action, Calendar};
use crate::view::ViewRegistry;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "show", "prev", "next", "today", "goto", "view", "views", "days", "back", "json",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Runs one command against the saved session and writes its output.
#[instrument(skip(store, cfg, renderer, clock, out))]
pub fn dispatch<W: Write>(
    store: &DataStore,
    cfg: &CalendarConfig,
    renderer: &Renderer,
    clock: Box<dyn Clock>,
    inv: Invocation,
    mut out: W,
) -> anyhow::Result<()> {
    let now = cfg.options.resolve_now(clock.as_ref());
    let mut session = store.load_session()?;
    let mut calendar = open_calendar(cfg, &session, clock, now)?;
    let command = inv.command.as_str();

    debug!(command, args = ?inv.command_args, "dispatching command");

    let action = match command {
        "show" | "days" | "views" | "json" => None,
        "prev" => Some(Action::Prev),
        "next" => Some(Action::Next),
        "today" => Some(Action::Today),
        "goto" => {
            let raw = inv
                .command_args
                .first()
                .ok_or_else(|| anyhow!("goto needs a date"))?;
            Some(Action::ChangeDate(parse_date_arg(raw, now)?))
        }
        "view" => {
            let view_type = inv
                .command_args
                .first()
                .ok_or_else(|| anyhow!("view needs a view type"))?
                .clone();
            let date = inv
                .command_args
                .get(1)
                .map(|raw| parse_date_arg(raw, now))
                .transpose()?;
            Some(Action::ChangeViewType { view_type, date })
        }
        "back" => match session.back().cloned() {
            Some(entry) => Some(Action::ChangeViewType {
                view_type: entry.view_type,
                date: Some(entry.date),
            }),
            None => {
                warn!("no earlier view to go back to");
                None
            }
        },
        other => return Err(anyhow!("unknown command: {other}")),
    };

    if let Some(action) = action {
        info!(?action, "applying action");
        calendar.dispatch(action)?;
    }

    let state = calendar.state();
    let entry = SessionEntry {
        view_type: state.view_type.clone(),
        date: state.current_date,
    };
    if command == "back" {
        session.current = Some(entry);
    } else {
        session.advance(entry);
    }
    store.save_session(&session)?;

    match command {
        "days" => {
            let generator = calendar.generator()?;
            renderer.write_days(&mut out, calendar.state(), generator.hidden_days())
        }
        "views" => renderer.write_views(&mut out, calendar.registry(), &calendar.state().view_type),
        "json" => renderer.write_json(&mut out, calendar.state()),
        _ => renderer.write_state(&mut out, calendar.state()),
    }
}

/// Restores the saved view and date, or starts from the configured ones.
fn open_calendar(
    cfg: &CalendarConfig,
    session: &Session,
    clock: Box<dyn Clock>,
    now: DateMarker,
) -> anyhow::Result<Calendar> {
    let configured_date = cfg
        .initial_date
        .as_deref()
        .map(|raw| parse_date_arg(raw, now))
        .transpose()
        .context("invalid initial_date")?;

    let (view, date) = match &session.current {
        Some(entry) => (entry.view_type.clone(), Some(entry.date)),
        None => (cfg.initial_view.clone(), configured_date),
    };

    let registry = ViewRegistry::build(&cfg.views, &cfg.options);
    let view = if registry.get(&view).is_ok() {
        view
    } else {
        warn!(view = %view, fallback = %cfg.initial_view, "saved view is gone; using configured view");
        cfg.initial_view.clone()
    };

    Calendar::new(cfg.options.clone(), cfg.views.clone(), &view, date, clock)
        .with_context(|| format!("cannot show view {view}"))
}

fn parse_date_arg(raw: &str, now: DateMarker) -> anyhow::Result<DateMarker> {
    parse_date_marker(raw, now).with_context(|| format!("invalid date: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviation_rules() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("ne", &known), Some("next"));
        assert_eq!(expand_command_abbrev("view", &known), Some("view"));
        assert_eq!(expand_command_abbrev("vi", &known), None);
        assert_eq!(expand_command_abbrev("j", &known), Some("json"));
        assert_eq!(expand_command_abbrev("x", &known), None);
    }
}
