use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::config::CalendarConfig;
use crate::datetime::{DateMarker, add_days, start_of_day};
use crate::hidden_days::HiddenDays;
use crate::range::{DateRange, OpenDateRange};
use crate::state::CalendarState;
use crate::title::{describe_increment, rendered_days};
use crate::view::ViewRegistry;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &CalendarConfig) -> Self {
        Self {
            color: cfg.color.unwrap_or(true),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip_all)]
    pub fn write_state<W: Write>(&self, mut out: W, state: &CalendarState) -> anyhow::Result<()> {
        let profile = &state.profile;
        writeln!(out, "{}", self.paint(&state.title, "1"))?;
        writeln!(out)?;

        let active = profile
            .active_range
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string());
        let rows = vec![
            vec!["view".to_string(), state.view_type.clone()],
            vec!["date".to_string(), state.current_date.to_string()],
            vec!["unit".to_string(), profile.current_range_unit.to_string()],
            vec!["current".to_string(), profile.current_range.to_string()],
            vec!["render".to_string(), profile.render_range.to_string()],
            vec!["active".to_string(), active],
            vec!["valid".to_string(), format_open(&profile.valid_range)],
            vec!["is valid".to_string(), self.flag(profile.is_valid)],
            vec!["all day".to_string(), yes_no(profile.is_range_all_day)],
            vec!["step".to_string(), state.increment.clone()],
            vec!["today".to_string(), self.flag(state.toolbar.is_today_enabled)],
            vec!["prev".to_string(), self.flag(state.toolbar.is_prev_enabled)],
            vec!["next".to_string(), self.flag(state.toolbar.is_next_enabled)],
        ];

        write_table(&mut out, vec!["Field".to_string(), "Value".to_string()], rows)
    }

    /// One row per visible day of the render range.
    #[tracing::instrument(skip_all)]
    pub fn write_days<W: Write>(
        &self,
        mut out: W,
        state: &CalendarState,
        hidden: &HiddenDays,
    ) -> anyhow::Result<()> {
        let profile = &state.profile;
        let today = start_of_day(state.now);
        let mut rows = Vec::new();

        for day in rendered_days(&profile.render_range) {
            if hidden.is_hidden(day) {
                continue;
            }

            let mut marks = Vec::new();
            if !profile.current_range.contains(day) {
                marks.push("other");
            }
            if !is_active(profile.active_range.as_ref(), day) {
                marks.push("inactive");
            }
            if day == today {
                marks.push("today");
            }

            let date = day.format("%Y-%m-%d").to_string();
            let date = if day == today {
                self.paint(&date, "33")
            } else if profile.current_range.contains(day) {
                date
            } else {
                self.paint(&date, "2")
            };

            rows.push(vec![date, day.format("%a").to_string(), marks.join(",")]);
        }

        write_table(
            &mut out,
            vec!["Date".to_string(), "Day".to_string(), "Marks".to_string()],
            rows,
        )
    }

    #[tracing::instrument(skip_all)]
    pub fn write_views<W: Write>(
        &self,
        mut out: W,
        registry: &ViewRegistry,
        active: &str,
    ) -> anyhow::Result<()> {
        let rows = registry
            .specs()
            .map(|spec| {
                let name = if spec.view_type == active {
                    self.paint(&format!("*{}", spec.view_type), "32")
                } else {
                    spec.view_type.clone()
                };
                let duration = spec
                    .duration
                    .map(|d| describe_increment(&d))
                    .unwrap_or_else(|| "-".to_string());
                vec![name, format!("{:?}", spec.kind), duration]
            })
            .collect();

        write_table(
            &mut out,
            vec!["View".to_string(), "Kind".to_string(), "Span".to_string()],
            rows,
        )
    }

    pub fn write_json<W: Write>(&self, mut out: W, state: &CalendarState) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(&mut out, state)?;
        writeln!(out)?;
        Ok(())
    }

    fn flag(&self, value: bool) -> String {
        if value {
            self.paint("yes", "32")
        } else {
            self.paint("no", "31")
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn is_active(active: Option<&DateRange>, day: DateMarker) -> bool {
    active.is_some_and(|range| day < range.end && add_days(day, 1) > range.start)
}

fn yes_no(value: bool) -> String {
    if value { "yes" } else { "no" }.to_string()
}

fn format_open(range: &OpenDateRange) -> String {
    let start = range
        .start
        .map(|m| m.to_string())
        .unwrap_or_else(|| "..".to_string());
    let end = range
        .end
        .map(|m| m.to_string())
        .unwrap_or_else(|| "..".to_string());
    format!("[{start}, {end})")
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_aligns_on_visible_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["A".to_string(), "B".to_string()],
            vec![
                vec!["\x1b[31mred\x1b[0m".to_string(), "x".to_string()],
                vec!["日本".to_string(), "y".to_string()],
            ],
        )
        .expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "A    B ");
        assert_eq!(lines[1], "---- - ");
        assert_eq!(lines[3], "日本 y ");
    }

    #[test]
    fn strip_ansi_removes_escapes() {
        assert_eq!(strip_ansi("\x1b[1;32mok\x1b[0m"), "ok");
    }
}
