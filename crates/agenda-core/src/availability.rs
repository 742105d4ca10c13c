use std::collections::BTreeMap;

use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  trace
};

use crate::date::CalendarDate;
use crate::error::Result;
use crate::grid::{
  DAYS_PER_WEEK,
  MonthGrid
};
use crate::item::CalendarItem;
use crate::slot::{
  Clock,
  TimeRange,
  hourly_slots
};

pub const DEFAULT_DENSE_THRESHOLD: usize =
  2;
pub const DEFAULT_OPEN_HOUR: u32 = 8;
pub const DEFAULT_CLOSE_HOUR: u32 = 19;
pub const DEFAULT_STEP_MINUTES: u32 =
  60;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
  Available,
  PartiallyBooked,
  FullyBooked
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAvailability {
  pub status:     Availability,
  pub free_slots: Vec<TimeRange>
}

/// How one space is judged busy.
///
/// `dense_threshold` only applies when
/// there are no candidate slots to check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingPolicy {
  pub dense_threshold: usize,
  pub candidate_slots: Vec<TimeRange>
}

impl Default for BookingPolicy {
  fn default() -> Self {
    Self {
      dense_threshold:
        DEFAULT_DENSE_THRESHOLD,
      candidate_slots:
        default_candidate_slots()
    }
  }
}

/// Hourly slots 08:00-19:00.
#[must_use]
pub fn default_candidate_slots()
-> Vec<TimeRange> {
  match (
    Clock::new(DEFAULT_OPEN_HOUR, 0),
    Clock::new(DEFAULT_CLOSE_HOUR, 0)
  ) {
    | (Ok(open), Ok(close)) => {
      hourly_slots(
        open,
        close,
        DEFAULT_STEP_MINUTES
      )
      .unwrap_or_default()
    }
    | _ => Vec::new()
  }
}

/// Per-space booking policies with a
/// fallback for unlisted spaces.
#[derive(Debug, Clone, Default)]
pub struct SpacePolicies {
  default: BookingPolicy,
  spaces:  BTreeMap<String, BookingPolicy>
}

impl SpacePolicies {
  #[must_use]
  pub fn new(
    default: BookingPolicy
  ) -> Self {
    Self {
      default,
      spaces: BTreeMap::new()
    }
  }

  #[must_use]
  pub fn with_space(
    mut self,
    space_id: impl Into<String>,
    policy: BookingPolicy
  ) -> Self {
    self.insert(space_id, policy);
    self
  }

  pub fn insert(
    &mut self,
    space_id: impl Into<String>,
    policy: BookingPolicy
  ) {
    self
      .spaces
      .insert(space_id.into(), policy);
  }

  #[must_use]
  pub fn default_policy(
    &self
  ) -> &BookingPolicy {
    &self.default
  }

  #[must_use]
  pub fn policy_for(
    &self,
    space_id: &str
  ) -> &BookingPolicy {
    self
      .spaces
      .get(space_id)
      .unwrap_or(&self.default)
  }

  pub fn space_ids(
    &self
  ) -> impl Iterator<Item = &str> {
    self.spaces.keys().map(String::as_str)
  }
}

/// Classifies one day of one space.
///
/// Every range in both inputs must have
/// `start < end`; one malformed range
/// fails the whole call.
#[tracing::instrument(skip_all, fields(
  booked = booked.len(),
  candidates = candidates.len()
))]
pub fn classify_day(
  booked: &[TimeRange],
  candidates: &[TimeRange],
  policy: &BookingPolicy
) -> Result<DayAvailability> {
  for range in
    booked.iter().chain(candidates)
  {
    range.validate()?;
  }

  let free_slots: Vec<TimeRange> =
    candidates
      .iter()
      .filter(|slot| {
        !booked
          .iter()
          .any(|b| slot.overlaps(b))
      })
      .copied()
      .collect();

  let status = if booked.is_empty() {
    Availability::Available
  } else if !candidates.is_empty() {
    if free_slots.is_empty() {
      Availability::FullyBooked
    } else {
      Availability::PartiallyBooked
    }
  } else if booked.len()
    >= policy.dense_threshold
  {
    Availability::FullyBooked
  } else {
    Availability::PartiallyBooked
  };

  trace!(
    ?status,
    free = free_slots.len(),
    "classified day"
  );
  Ok(DayAvailability {
    status,
    free_slots
  })
}

/// Booked ranges of the items that hold
/// `space_id`, in input order.
pub fn booked_ranges<'a, I>(
  items: I,
  space_id: &str
) -> Result<Vec<TimeRange>>
where
  I: IntoIterator<Item = &'a CalendarItem>
{
  items
    .into_iter()
    .filter(|item| {
      item.space_id == space_id
        && item.status.occupies_space()
    })
    .map(CalendarItem::time_range)
    .collect()
}

/// Classifies `space_id` on `date`
/// against the space's own policy.
#[tracing::instrument(skip(
  items, policies
))]
pub fn classify_space_day(
  items: &[CalendarItem],
  space_id: &str,
  date: CalendarDate,
  policies: &SpacePolicies
) -> Result<DayAvailability> {
  let booked = booked_ranges(
    items
      .iter()
      .filter(|item| item.date == date),
    space_id
  )?;
  let policy =
    policies.policy_for(space_id);
  classify_day(
    &booked,
    &policy.candidate_slots,
    policy
  )
}

/// Classifies every cell of `grid` for
/// `space_id`, using the items already
/// bucketed into each cell.
#[tracing::instrument(skip(
  grid, policies
), fields(year = grid.year(), month = grid.month()))]
pub fn classify_month(
  grid: &MonthGrid,
  space_id: &str,
  policies: &SpacePolicies
) -> Result<
  BTreeMap<CalendarDate, DayAvailability>
> {
  let policy =
    policies.policy_for(space_id);
  let mut out = BTreeMap::new();

  for cell in grid.cells() {
    let booked = booked_ranges(
      cell.items(),
      space_id
    )?;
    let day = classify_day(
      &booked,
      &policy.candidate_slots,
      policy
    )?;
    out.insert(cell.date(), day);
  }

  debug!(
    days = out.len(),
    booked_days = out
      .values()
      .filter(|d| {
        d.status
          != Availability::Available
      })
      .count(),
    "classified month"
  );
  Ok(out)
}

/// Seven consecutive days of `space_id`,
/// starting at `start`.
#[tracing::instrument(skip(
  items, policies
))]
pub fn classify_week(
  items: &[CalendarItem],
  space_id: &str,
  start: CalendarDate,
  policies: &SpacePolicies
) -> Result<Vec<(CalendarDate, DayAvailability)>>
{
  let mut week = Vec::new();
  for offset in 0..i64::from(DAYS_PER_WEEK)
  {
    let date = start.add_days(offset)?;
    let day = classify_space_day(
      items, space_id, date, policies
    )?;
    week.push((date, day));
  }
  Ok(week)
}
