use std::collections::BTreeMap;

use tracing::debug;

use crate::date::CalendarDate;
use crate::error::Result;
use crate::item::CalendarItem;

pub const DAYS_PER_WEEK: u32 = 7;

/// One square of a month view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayCell {
  date:             CalendarDate,
  in_current_month: bool,
  is_today:         bool,
  is_selected:      bool,
  items:            Vec<CalendarItem>
}

impl DayCell {
  #[must_use]
  pub fn date(&self) -> CalendarDate {
    self.date
  }

  #[must_use]
  pub fn in_current_month(
    &self
  ) -> bool {
    self.in_current_month
  }

  #[must_use]
  pub fn is_today(&self) -> bool {
    self.is_today
  }

  #[must_use]
  pub fn is_selected(&self) -> bool {
    self.is_selected
  }

  /// Items in input order.
  #[must_use]
  pub fn items(
    &self
  ) -> &[CalendarItem] {
    &self.items
  }
}

/// Sunday-first weeks covering one
/// month, padded with neighbouring days.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
  year:  i32,
  month: u32,
  rows:  Vec<Vec<DayCell>>
}

impl MonthGrid {
  #[must_use]
  pub fn year(&self) -> i32 {
    self.year
  }

  #[must_use]
  pub fn month(&self) -> u32 {
    self.month
  }

  #[must_use]
  pub fn rows(&self) -> &[Vec<DayCell>] {
    &self.rows
  }

  pub fn cells(
    &self
  ) -> impl Iterator<Item = &DayCell> {
    self.rows.iter().flatten()
  }

  #[must_use]
  pub fn first_date(
    &self
  ) -> Option<CalendarDate> {
    self.cells().next().map(DayCell::date)
  }

  #[must_use]
  pub fn last_date(
    &self
  ) -> Option<CalendarDate> {
    self.cells().last().map(DayCell::date)
  }

  #[must_use]
  pub fn contains(
    &self,
    date: CalendarDate
  ) -> bool {
    match (
      self.first_date(),
      self.last_date()
    ) {
      | (Some(first), Some(last)) => {
        date >= first && date <= last
      }
      | _ => false
    }
  }

  #[must_use]
  pub fn cell(
    &self,
    date: CalendarDate
  ) -> Option<&DayCell> {
    self
      .cells()
      .find(|cell| cell.date == date)
  }

  #[must_use]
  pub fn item_count(&self) -> usize {
    self
      .cells()
      .map(|cell| cell.items.len())
      .sum()
  }
}

#[derive(Debug, Clone, Default)]
pub struct GridOptions {
  pub selected_date:   Option<CalendarDate>,
  pub filter_space_id: Option<String>
}

/// Builds the month grid for
/// `reference`'s month, keeping only
/// items in `options.filter_space_id`
/// when set.
#[tracing::instrument(skip(
  items, options
), fields(items = items.len()))]
pub fn build_month_grid(
  reference: CalendarDate,
  items: &[CalendarItem],
  options: &GridOptions,
  today: CalendarDate
) -> Result<MonthGrid> {
  let space =
    options.filter_space_id.as_deref();
  build_month_grid_with(
    reference,
    items,
    options.selected_date,
    today,
    |item| match space {
      | Some(id) => item.space_id == id,
      | None => true
    }
  )
}

/// Same as [`build_month_grid`] with a
/// caller-supplied item predicate.
pub fn build_month_grid_with<F>(
  reference: CalendarDate,
  items: &[CalendarItem],
  selected: Option<CalendarDate>,
  today: CalendarDate,
  keep: F
) -> Result<MonthGrid>
where
  F: Fn(&CalendarItem) -> bool
{
  let first = reference.first_of_month();
  let days = reference.days_in_month()?;
  let offset =
    first.weekday_from_sunday();
  let total = (days + offset)
    .div_ceil(DAYS_PER_WEEK)
    * DAYS_PER_WEEK;

  let start =
    first.add_days(-i64::from(offset))?;
  let end = start
    .add_days(i64::from(total) - 1)?;

  let mut buckets: BTreeMap<
    CalendarDate,
    Vec<CalendarItem>
  > = BTreeMap::new();
  for item in items {
    if item.date < start
      || item.date > end
      || !keep(item)
    {
      continue;
    }
    buckets
      .entry(item.date)
      .or_default()
      .push(item.clone());
  }

  let mut rows = Vec::with_capacity(
    (total / DAYS_PER_WEEK) as usize
  );
  let mut week = Vec::with_capacity(
    DAYS_PER_WEEK as usize
  );
  for index in 0..total {
    let date = start
      .add_days(i64::from(index))?;
    week.push(DayCell {
      date,
      in_current_month: date.year()
        == reference.year()
        && date.month()
          == reference.month(),
      is_today: date == today,
      is_selected: selected
        == Some(date),
      items: buckets
        .remove(&date)
        .unwrap_or_default()
    });

    if week.len()
      == DAYS_PER_WEEK as usize
    {
      rows.push(std::mem::take(
        &mut week
      ));
    }
  }

  debug!(
    year = reference.year(),
    month = reference.month(),
    weeks = rows.len(),
    grid_start = %start,
    grid_end = %end,
    "built month grid"
  );

  Ok(MonthGrid {
    year: reference.year(),
    month: reference.month(),
    rows
  })
}
