use std::io::Write;

use anyhow::Context;
use tracing::{debug, info, instrument};

use crate::availability::{classify_month, classify_space_day, classify_week};
use crate::cli::Command;
use crate::config::Config;
use crate::date::{CalendarDate, parse_date_expr, parse_month_expr};
use crate::filter::Filter;
use crate::grid::{GridOptions, build_month_grid, build_month_grid_with};
use crate::item::CalendarItem;
use crate::present::Renderer;

pub fn dispatch<W: Write>(
    command: Command,
    cfg: &Config,
    items: &[CalendarItem],
    renderer: &Renderer,
    today: CalendarDate,
    out: W,
) -> anyhow::Result<()> {
    debug!(?command, items = items.len(), %today, "dispatching command");

    match command {
        Command::Month {
            month,
            space,
            select,
            availability,
            filter,
        } => cmd_month(
            cfg,
            items,
            renderer,
            today,
            MonthArgs {
                month: month.as_deref(),
                space: space.as_deref(),
                select: select.as_deref(),
                availability,
                filter: &filter,
            },
            out,
        ),
        Command::Week { date, space } => {
            cmd_week(cfg, items, renderer, today, &date, &space, out)
        }
        Command::Day {
            date,
            space,
            filter,
        } => cmd_day(
            cfg,
            items,
            renderer,
            today,
            &date,
            space.as_deref(),
            &filter,
            out,
        ),
        Command::Spaces => cmd_spaces(cfg, renderer, out),
    }
}

#[derive(Debug)]
struct MonthArgs<'a> {
    month: Option<&'a str>,
    space: Option<&'a str>,
    select: Option<&'a str>,
    availability: bool,
    filter: &'a [String],
}

#[instrument(skip(cfg, items, renderer, today, out))]
fn cmd_month<W: Write>(
    cfg: &Config,
    items: &[CalendarItem],
    renderer: &Renderer,
    today: CalendarDate,
    args: MonthArgs<'_>,
    out: W,
) -> anyhow::Result<()> {
    let reference = match args.month {
        Some(raw) => parse_month_expr(raw, today)?,
        None => today.first_of_month(),
    };
    let selected = args
        .select
        .map(|raw| parse_date_expr(raw, today))
        .transpose()?;
    let filter = Filter::parse(args.filter, today)?;

    let space = args.space;
    let grid = build_month_grid_with(reference, items, selected, today, |item| {
        space.is_none_or(|id| item.space_id == id) && filter.matches(item)
    })?;
    info!(
        month = %reference,
        shown = grid.item_count(),
        "built month grid"
    );

    let availability = match (args.availability, space) {
        (true, Some(space_id)) => {
            let policies = cfg.space_policies()?;
            let occupancy = build_month_grid(
                reference,
                items,
                &GridOptions {
                    selected_date: None,
                    filter_space_id: Some(space_id.to_string()),
                },
                today,
            )?;
            Some(
                classify_month(&occupancy, space_id, &policies)
                    .with_context(|| format!("failed to classify availability of {space_id}"))?,
            )
        }
        _ => None,
    };

    renderer.write_month(out, &grid, availability.as_ref())
}

#[instrument(skip(cfg, items, renderer, today, out))]
fn cmd_week<W: Write>(
    cfg: &Config,
    items: &[CalendarItem],
    renderer: &Renderer,
    today: CalendarDate,
    raw_date: &str,
    space_id: &str,
    out: W,
) -> anyhow::Result<()> {
    let start = parse_date_expr(raw_date, today)?;
    let policies = cfg.space_policies()?;
    let week = classify_week(items, space_id, start, &policies)
        .with_context(|| format!("failed to classify the week of {start} for {space_id}"))?;
    debug!(%start, days = week.len(), "classified week");

    renderer.write_week(out, space_id, &week, today)
}

#[allow(clippy::too_many_arguments)]
#[instrument(skip(cfg, items, renderer, today, out))]
fn cmd_day<W: Write>(
    cfg: &Config,
    items: &[CalendarItem],
    renderer: &Renderer,
    today: CalendarDate,
    raw_date: &str,
    space: Option<&str>,
    filter_terms: &[String],
    out: W,
) -> anyhow::Result<()> {
    let date = parse_date_expr(raw_date, today)?;
    let filter = Filter::parse(filter_terms, today)?;

    let mut shown: Vec<CalendarItem> = items
        .iter()
        .filter(|item| {
            item.date == date
                && space.is_none_or(|id| item.space_id == id)
                && filter.matches(item)
        })
        .cloned()
        .collect();
    shown.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.space_id.cmp(&b.space_id))
    });

    let Some(space_id) = space else {
        return renderer.write_day(out, date, None, &shown, None, &[]);
    };

    let policies = cfg.space_policies()?;
    let day = classify_space_day(items, space_id, date, &policies)
        .with_context(|| format!("failed to classify availability of {space_id} on {date}"))?;
    let candidates = &policies.policy_for(space_id).candidate_slots;
    debug!(
        status = ?day.status,
        free = day.free_slots.len(),
        "classified day"
    );

    renderer.write_day(out, date, Some(space_id), &shown, Some(&day), candidates)
}

fn cmd_spaces<W: Write>(cfg: &Config, renderer: &Renderer, out: W) -> anyhow::Result<()> {
    let policies = cfg.space_policies()?;
    let names = cfg.space_names();
    renderer.write_spaces(out, &policies, &names)
}
