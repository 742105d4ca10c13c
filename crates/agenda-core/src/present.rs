use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::availability::{Availability, DayAvailability, SpacePolicies};
use crate::config::Config;
use crate::date::CalendarDate;
use crate::grid::{DayCell, MonthGrid};
use crate::item::{CalendarItem, Status};
use crate::slot::TimeRange;

const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const TITLE_MAX_WIDTH: usize = 16;
const TITLE_KEEP_WIDTH: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Green,
    Amber,
    Red,
    Gray,
    Teal,
    Blue,
}

impl Color {
    fn ansi_code(self) -> &'static str {
        match self {
            Color::Green => "32",
            Color::Amber => "33",
            Color::Red => "31",
            Color::Gray => "90",
            Color::Teal => "36",
            Color::Blue => "34",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellStyle {
    pub color: Color,
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Badge {
    pub color: Color,
    pub label: &'static str,
}

pub fn availability_style(availability: Availability) -> CellStyle {
    match availability {
        Availability::Available => CellStyle {
            color: Color::Green,
            label: "available",
        },
        Availability::PartiallyBooked => CellStyle {
            color: Color::Amber,
            label: "partially booked",
        },
        Availability::FullyBooked => CellStyle {
            color: Color::Red,
            label: "fully booked",
        },
    }
}

pub fn status_badge(status: Status) -> Badge {
    match status {
        Status::Approved => Badge {
            color: Color::Green,
            label: "approved",
        },
        Status::UnderReview => Badge {
            color: Color::Amber,
            label: "under review",
        },
        Status::Rejected => Badge {
            color: Color::Red,
            label: "rejected",
        },
        Status::Cancelled => Badge {
            color: Color::Gray,
            label: "cancelled",
        },
    }
}

/// Approved items stand out from everything still in flight.
pub fn item_color(status: Status) -> Color {
    if status == Status::Approved {
        Color::Teal
    } else {
        Color::Blue
    }
}

/// Day number with `*` for today and brackets for the selection.
pub fn day_label(cell: &DayCell) -> String {
    let mut label = cell.date().day().to_string();
    if cell.is_today() {
        label.push('*');
    }
    if cell.is_selected() {
        label = format!("[{label}]");
    }
    label
}

/// Titles wider than 16 columns keep 14 columns of text plus `...`.
pub fn truncate_title(title: &str) -> String {
    if UnicodeWidthStr::width(title) <= TITLE_MAX_WIDTH {
        return title.to_string();
    }

    let mut kept = String::new();
    let mut used = 0;
    for ch in title.chars() {
        let width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + width > TITLE_KEEP_WIDTH {
            break;
        }
        used += width;
        kept.push(ch);
    }
    format!("{kept}...")
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip_all, fields(year = grid.year(), month = grid.month()))]
    pub fn write_month<W: Write>(
        &self,
        mut out: W,
        grid: &MonthGrid,
        availability: Option<&BTreeMap<CalendarDate, DayAvailability>>,
    ) -> anyhow::Result<()> {
        let title = CalendarDate::month_start(grid.year(), grid.month())?
            .naive()
            .format("%B %Y")
            .to_string();
        writeln!(out, "{title}")?;
        writeln!(out)?;

        let headers = WEEKDAY_LABELS.iter().map(|s| s.to_string()).collect();
        let mut rows = Vec::with_capacity(grid.rows().len());
        for week in grid.rows() {
            let row: Vec<String> = week
                .iter()
                .map(|cell| self.month_cell(cell, availability))
                .collect();
            rows.push(row);
        }
        write_table(&mut out, headers, rows)?;

        let listed: Vec<(&DayCell, &CalendarItem)> = grid
            .cells()
            .filter(|cell| cell.in_current_month())
            .flat_map(|cell| cell.items().iter().map(move |item| (cell, item)))
            .collect();

        if !listed.is_empty() {
            writeln!(out)?;
            let headers = vec![
                "Date".to_string(),
                "Time".to_string(),
                "Space".to_string(),
                "Title".to_string(),
                "Status".to_string(),
            ];
            let rows = listed
                .into_iter()
                .map(|(cell, item)| self.item_row(cell.date(), item))
                .collect();
            write_table(&mut out, headers, rows)?;
        }

        if availability.is_some() {
            writeln!(out)?;
            let legend = [
                Availability::Available,
                Availability::PartiallyBooked,
                Availability::FullyBooked,
            ]
            .into_iter()
            .map(|a| {
                let style = availability_style(a);
                self.paint(style.label, style.color)
            })
            .collect::<Vec<_>>()
            .join("  ");
            writeln!(out, "{legend}")?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, out, items, day, candidates))]
    pub fn write_day<W: Write>(
        &self,
        mut out: W,
        date: CalendarDate,
        space_id: Option<&str>,
        items: &[CalendarItem],
        day: Option<&DayAvailability>,
        candidates: &[TimeRange],
    ) -> anyhow::Result<()> {
        let heading = date.naive().format("%A, %Y-%m-%d").to_string();
        match space_id {
            Some(space) => writeln!(out, "{heading}  ({space})")?,
            None => writeln!(out, "{heading}")?,
        }
        writeln!(out)?;

        let on_day: Vec<&CalendarItem> =
            items.iter().filter(|item| item.date == date).collect();
        if on_day.is_empty() {
            writeln!(out, "no events")?;
        } else {
            let headers = vec![
                "Date".to_string(),
                "Time".to_string(),
                "Space".to_string(),
                "Title".to_string(),
                "Status".to_string(),
            ];
            let rows = on_day
                .into_iter()
                .map(|item| self.item_row(date, item))
                .collect();
            write_table(&mut out, headers, rows)?;
        }

        let Some(day) = day else {
            return Ok(());
        };

        writeln!(out)?;
        let headers = vec!["Slot".to_string(), "State".to_string()];
        let rows = candidates
            .iter()
            .map(|slot| {
                let state = if day.free_slots.contains(slot) {
                    self.paint("free", Color::Green)
                } else {
                    self.paint("booked", Color::Red)
                };
                vec![slot.to_string(), state]
            })
            .collect();
        write_table(&mut out, headers, rows)?;

        let style = availability_style(day.status);
        writeln!(out)?;
        writeln!(out, "{}", self.paint(style.label, style.color))?;
        Ok(())
    }

    /// One row per day, coloured by availability. Today is marked with `*`.
    #[tracing::instrument(skip(self, out, days, today))]
    pub fn write_week<W: Write>(
        &self,
        mut out: W,
        space_id: &str,
        days: &[(CalendarDate, DayAvailability)],
        today: CalendarDate,
    ) -> anyhow::Result<()> {
        if let (Some((first, _)), Some((last, _))) = (days.first(), days.last()) {
            writeln!(out, "{first} - {last}  ({space_id})")?;
            writeln!(out)?;
        }

        let headers = vec![
            "Date".to_string(),
            "Day".to_string(),
            "Availability".to_string(),
            "Free".to_string(),
        ];
        let rows = days
            .iter()
            .map(|(date, day)| {
                let style = availability_style(day.status);
                let mut label = date.to_string();
                if *date == today {
                    label.push('*');
                }
                vec![
                    label,
                    date.naive().format("%a").to_string(),
                    self.paint(style.label, style.color),
                    day.free_slots.len().to_string(),
                ]
            })
            .collect();
        write_table(&mut out, headers, rows)
    }

    pub fn write_spaces<W: Write>(
        &self,
        mut out: W,
        policies: &SpacePolicies,
        names: &BTreeMap<String, String>,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "Space".to_string(),
            "Name".to_string(),
            "Slots".to_string(),
            "Dense".to_string(),
        ];

        let mut ids: Vec<&str> = policies.space_ids().collect();
        for id in names.keys() {
            if !ids.contains(&id.as_str()) {
                ids.push(id.as_str());
            }
        }
        ids.sort_unstable();

        let mut rows = Vec::with_capacity(ids.len() + 1);
        for id in ids {
            let policy = policies.policy_for(id);
            rows.push(vec![
                id.to_string(),
                names.get(id).cloned().unwrap_or_default(),
                slot_span(&policy.candidate_slots),
                policy.dense_threshold.to_string(),
            ]);
        }
        let fallback = policies.default_policy();
        rows.push(vec![
            "*".to_string(),
            "(default)".to_string(),
            slot_span(&fallback.candidate_slots),
            fallback.dense_threshold.to_string(),
        ]);

        write_table(&mut out, headers, rows)
    }

    fn month_cell(
        &self,
        cell: &DayCell,
        availability: Option<&BTreeMap<CalendarDate, DayAvailability>>,
    ) -> String {
        let mut text = day_label(cell);
        if !cell.items().is_empty() {
            text.push_str(&format!(" ({})", cell.items().len()));
        }

        if !cell.in_current_month() {
            return self.paint(&text, Color::Gray);
        }

        match availability.and_then(|map| map.get(&cell.date())) {
            Some(day) => self.paint(&text, availability_style(day.status).color),
            None => text,
        }
    }

    fn item_row(&self, date: CalendarDate, item: &CalendarItem) -> Vec<String> {
        let badge = status_badge(item.status);
        vec![
            date.to_string(),
            format!("{}-{}", item.start_time, item.end_time),
            item.space_id.clone(),
            self.paint(&truncate_title(&item.title), item_color(item.status)),
            self.paint(badge.label, badge.color),
        ]
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{}m{text}\x1b[0m", color.ansi_code())
    }
}

fn slot_span(slots: &[TimeRange]) -> String {
    match (slots.first(), slots.last()) {
        (Some(first), Some(last)) => format!(
            "{}-{} x{}",
            first.start,
            last.end,
            slots.len()
        ),
        _ => "-".to_string(),
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(header.as_str()))
        .collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(visible_width(cell));
        }
    }

    let header_line = headers
        .iter()
        .zip(&widths)
        .map(|(header, &width)| format!("{header:width$}"))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{}", header_line.trim_end())?;

    let rule = widths
        .iter()
        .map(|width| "-".repeat(*width))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{rule}")?;

    for row in rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| {
                let padding = width.saturating_sub(visible_width(cell));
                format!("{cell}{}", " ".repeat(padding))
            })
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn visible_width(cell: &str) -> usize {
    UnicodeWidthStr::width(strip_ansi(cell).as_str())
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
    use crate::availability::{BookingPolicy, classify_month, default_candidate_slots};
    use crate::grid::{GridOptions, build_month_grid};

    fn date(y: i32, m: u32, d: u32) -> CalendarDate {
        CalendarDate::new(y, m, d).expect("valid date")
    }

    fn workshop() -> CalendarItem {
        CalendarItem::new(
            "1",
            "Workshop de Inovação Digital",
            date(2025, 5, 15),
            "09:00-17:00".parse().expect("valid range"),
            "aud1",
            Status::Approved,
        )
    }

    #[test]
    fn truncates_long_titles() {
        assert_eq!(truncate_title("Lounge"), "Lounge");
        assert_eq!(
            truncate_title("Workshop de Inovação Digital"),
            "Workshop de In..."
        );
    }

    #[test]
    fn truncates_wide_titles_by_columns() {
        let title = "国際会議とワークショップ開催";
        let cut = truncate_title(title);
        assert_eq!(cut, "国際会議とワー...");
        assert_eq!(UnicodeWidthStr::width(cut.as_str()), TITLE_KEEP_WIDTH + 3);

        // A wide character that would straddle the limit is left out.
        assert_eq!(truncate_title("abcdefghijklm国際会議"), "abcdefghijklm...");
    }

    #[test]
    fn writes_week_rows() {
        let free = DayAvailability {
            status: Availability::Available,
            free_slots: default_candidate_slots(),
        };
        let full = DayAvailability {
            status: Availability::FullyBooked,
            free_slots: vec![],
        };
        let days = vec![
            (date(2025, 5, 29), free.clone()),
            (date(2025, 5, 30), full),
            (date(2025, 5, 31), free),
        ];

        let mut out = Vec::new();
        Renderer::plain()
            .write_week(&mut out, "sala1", &days, date(2025, 5, 30))
            .expect("render");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.starts_with("2025-05-29 - 2025-05-31  (sala1)"));
        assert!(text.contains("2025-05-30* Fri fully booked"));
        assert!(text.contains("2025-05-31  Sat available    11"));
    }

    #[test]
    fn maps_states_to_colors() {
        assert_eq!(availability_style(Availability::Available).color, Color::Green);
        assert_eq!(availability_style(Availability::PartiallyBooked).color, Color::Amber);
        assert_eq!(availability_style(Availability::FullyBooked).color, Color::Red);
        assert_eq!(status_badge(Status::Cancelled).label, "cancelled");
        assert_eq!(item_color(Status::Approved), Color::Teal);
        assert_eq!(item_color(Status::UnderReview), Color::Blue);
    }

    #[test]
    fn strips_ansi_for_width() {
        let painted = "\x1b[31mbooked\x1b[0m";
        assert_eq!(strip_ansi(painted), "booked");
        assert_eq!(visible_width(painted), 6);
    }

    #[test]
    fn writes_month_table_and_listing() {
        let items = vec![workshop()];
        let options = GridOptions {
            selected_date: Some(date(2025, 5, 20)),
            filter_space_id: None,
        };
        let grid = build_month_grid(date(2025, 5, 1), &items, &options, date(2025, 5, 2))
            .expect("grid");
        let month = classify_month(&grid, "aud1", &SpacePolicies::default()).expect("classify");

        let mut buf = Vec::new();
        Renderer::plain()
            .write_month(&mut buf, &grid, Some(&month))
            .expect("render");
        let text = String::from_utf8(buf).expect("utf8");

        assert!(text.starts_with("May 2025\n"));
        assert!(text.contains("Sun"));
        assert!(text.contains("15 (1)"));
        assert!(text.contains("2*"));
        assert!(text.contains("[20]"));
        assert!(text.contains("Workshop de In..."));
        assert!(text.contains("09:00-17:00"));
        assert!(text.contains("partially booked"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn writes_day_slots() {
        let items = vec![workshop()];
        let candidates = default_candidate_slots();
        let day = crate::availability::classify_space_day(
            &items,
            "aud1",
            date(2025, 5, 15),
            &SpacePolicies::default(),
        )
        .expect("classify");

        let mut buf = Vec::new();
        Renderer::plain()
            .write_day(
                &mut buf,
                date(2025, 5, 15),
                Some("aud1"),
                &items,
                Some(&day),
                &candidates,
            )
            .expect("render");
        let text = String::from_utf8(buf).expect("utf8");

        assert!(text.starts_with("Thursday, 2025-05-15  (aud1)"));
        assert!(text.contains("08:00-09:00 free"));
        assert!(text.contains("12:00-13:00 booked"));
        assert!(text.contains("17:00-18:00 free"));
        assert!(text.trim_end().ends_with("partially booked"));
    }

    #[test]
    fn writes_space_table_with_default_row() {
        let policies = SpacePolicies::default().with_space(
            "sala1",
            BookingPolicy {
                dense_threshold: 3,
                candidate_slots: Vec::new(),
            },
        );
        let mut names = BTreeMap::new();
        names.insert("aud1".to_string(), "Auditório Principal".to_string());

        let mut buf = Vec::new();
        Renderer::plain()
            .write_spaces(&mut buf, &policies, &names)
            .expect("render");
        let text = String::from_utf8(buf).expect("utf8");

        assert!(text.contains("Auditório Principal"));
        assert!(text.contains("08:00-19:00 x11"));
        assert!(text.contains("sala1"));
        assert!(text.contains("(default)"));
    }
}
