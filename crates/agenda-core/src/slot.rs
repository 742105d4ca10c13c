use std::fmt;
use std::str::FromStr;

use serde::{
  Deserialize,
  Deserializer,
  Serialize,
  Serializer
};

use crate::error::{
  AgendaError,
  Result
};

const MINUTES_PER_HOUR: u32 = 60;
const MINUTES_PER_DAY: u32 = 24 * 60;

/// Time of day, `00:00` through `24:00`.
///
/// `24:00` is accepted so a range can
/// end at midnight.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
)]
pub struct Clock {
  minutes: u32
}

impl Clock {
  pub const END_OF_DAY: Clock = Clock {
    minutes: MINUTES_PER_DAY
  };

  pub fn new(
    hour: u32,
    minute: u32
  ) -> Result<Self> {
    if minute >= MINUTES_PER_HOUR
      || hour > 24
      || (hour == 24 && minute > 0)
    {
      return Err(
        AgendaError::InvalidClock(
          format!(
            "{hour:02}:{minute:02}"
          )
        )
      );
    }

    Ok(Self {
      minutes: hour * MINUTES_PER_HOUR
        + minute
    })
  }

  pub fn from_minutes(
    minutes: u32
  ) -> Result<Self> {
    if minutes > MINUTES_PER_DAY {
      return Err(
        AgendaError::InvalidClock(
          format!(
            "{minutes} minutes past \
             midnight"
          )
        )
      );
    }
    Ok(Self {
      minutes
    })
  }

  #[must_use]
  pub fn hour(self) -> u32 {
    self.minutes / MINUTES_PER_HOUR
  }

  #[must_use]
  pub fn minute(self) -> u32 {
    self.minutes % MINUTES_PER_HOUR
  }

  #[must_use]
  pub fn minutes(self) -> u32 {
    self.minutes
  }
}

impl fmt::Display for Clock {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{:02}:{:02}",
      self.hour(),
      self.minute()
    )
  }
}

impl FromStr for Clock {
  type Err = AgendaError;

  fn from_str(
    s: &str
  ) -> Result<Self> {
    let raw = s.trim();
    let invalid = || {
      AgendaError::InvalidClock(
        raw.to_string()
      )
    };

    let (hour, minute) = raw
      .split_once(':')
      .ok_or_else(invalid)?;
    if hour.is_empty()
      || hour.len() > 2
      || minute.len() != 2
      || !hour
        .chars()
        .chain(minute.chars())
        .all(|c| c.is_ascii_digit())
    {
      return Err(invalid());
    }

    let hour = hour
      .parse::<u32>()
      .map_err(|_| invalid())?;
    let minute = minute
      .parse::<u32>()
      .map_err(|_| invalid())?;
    Clock::new(hour, minute)
  }
}

impl Serialize for Clock {
  fn serialize<S>(
    &self,
    serializer: S
  ) -> std::result::Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer
      .serialize_str(&self.to_string())
  }
}

impl<'de> Deserialize<'de> for Clock {
  fn deserialize<D>(
    deserializer: D
  ) -> std::result::Result<Self, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    raw
      .parse()
      .map_err(serde::de::Error::custom)
  }
}

/// Half-open interval `[start, end)`.
///
/// Fields are public so raw input can be
/// carried around; [`TimeRange::new`]
/// and [`TimeRange::validate`] enforce
/// `start < end`.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
)]
pub struct TimeRange {
  pub start: Clock,
  pub end:   Clock
}

impl TimeRange {
  pub fn new(
    start: Clock,
    end: Clock
  ) -> Result<Self> {
    let range = Self {
      start,
      end
    };
    range.validate()?;
    Ok(range)
  }

  pub fn validate(&self) -> Result<()> {
    if self.start < self.end {
      Ok(())
    } else {
      Err(AgendaError::InvalidRange {
        start: self.start,
        end:   self.end
      })
    }
  }

  /// Touching ranges do not overlap.
  #[must_use]
  pub fn overlaps(
    &self,
    other: &TimeRange
  ) -> bool {
    self.start < other.end
      && other.start < self.end
  }

  #[must_use]
  pub fn duration_minutes(
    &self
  ) -> u32 {
    self
      .end
      .minutes()
      .saturating_sub(
        self.start.minutes()
      )
  }
}

impl fmt::Display for TimeRange {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{}-{}",
      self.start, self.end
    )
  }
}

impl FromStr for TimeRange {
  type Err = AgendaError;

  fn from_str(
    s: &str
  ) -> Result<Self> {
    let (start, end) = s
      .trim()
      .split_once('-')
      .ok_or_else(|| {
        AgendaError::InvalidClock(
          s.trim().to_string()
        )
      })?;
    TimeRange::new(
      start.parse()?,
      end.parse()?
    )
  }
}

impl Serialize for TimeRange {
  fn serialize<S>(
    &self,
    serializer: S
  ) -> std::result::Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer
      .serialize_str(&self.to_string())
  }
}

impl<'de> Deserialize<'de>
  for TimeRange
{
  fn deserialize<D>(
    deserializer: D
  ) -> std::result::Result<Self, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    raw
      .parse()
      .map_err(serde::de::Error::custom)
  }
}

/// Consecutive slots of `step_minutes`
/// from `open` up to `close`. A trailing
/// remainder shorter than one step is
/// dropped.
#[tracing::instrument]
pub fn hourly_slots(
  open: Clock,
  close: Clock,
  step_minutes: u32
) -> Result<Vec<TimeRange>> {
  if step_minutes == 0 {
    return Err(
      AgendaError::InvalidSlotStep(0)
    );
  }
  TimeRange::new(open, close)?;

  let mut slots = Vec::new();
  let mut cursor = open.minutes();
  while let Some(next) =
    cursor.checked_add(step_minutes)
    && next <= close.minutes()
  {
    slots.push(TimeRange {
      start: Clock::from_minutes(
        cursor
      )?,
      end:   Clock::from_minutes(next)?
    });
    cursor = next;
  }

  tracing::trace!(
    count = slots.len(),
    "enumerated candidate slots"
  );
  Ok(slots)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn clock(raw: &str) -> Clock {
    raw.parse().expect("valid clock")
  }

  #[test]
  fn parses_and_formats_clock() {
    assert_eq!(
      clock("9:05").to_string(),
      "09:05"
    );
    assert_eq!(
      clock("24:00"),
      Clock::END_OF_DAY
    );
    assert!("24:01".parse::<Clock>().is_err());
    assert!("12:60".parse::<Clock>().is_err());
    assert!("1200".parse::<Clock>().is_err());
    assert!("ab:cd".parse::<Clock>().is_err());
  }

  #[test]
  fn rejects_empty_and_inverted_ranges()
  {
    let err = TimeRange::new(
      clock("12:00"),
      clock("12:00")
    )
    .expect_err("empty range");
    assert_eq!(
      err,
      AgendaError::InvalidRange {
        start: clock("12:00"),
        end:   clock("12:00")
      }
    );
    assert!(
      "17:00-09:00"
        .parse::<TimeRange>()
        .is_err()
    );
  }

  #[test]
  fn touching_ranges_do_not_overlap() {
    let morning: TimeRange = "09:00-12:00"
      .parse()
      .expect("valid range");
    let noon: TimeRange = "12:00-13:00"
      .parse()
      .expect("valid range");
    let late: TimeRange = "11:30-12:30"
      .parse()
      .expect("valid range");

    assert!(!morning.overlaps(&noon));
    assert!(morning.overlaps(&late));
    assert!(late.overlaps(&noon));
    assert_eq!(
      morning.duration_minutes(),
      180
    );
  }

  #[test]
  fn enumerates_hourly_slots() {
    let slots = hourly_slots(
      clock("08:00"),
      clock("19:00"),
      60
    )
    .expect("slots");
    assert_eq!(slots.len(), 11);
    assert_eq!(
      slots[0].to_string(),
      "08:00-09:00"
    );
    assert_eq!(
      slots[10].to_string(),
      "18:00-19:00"
    );
  }

  #[test]
  fn drops_partial_trailing_slot() {
    let slots = hourly_slots(
      clock("09:00"),
      clock("10:45"),
      30
    )
    .expect("slots");
    assert_eq!(slots.len(), 3);
    assert_eq!(
      slots[2].to_string(),
      "10:00-10:30"
    );
    assert_eq!(
      hourly_slots(
        clock("09:00"),
        clock("10:00"),
        0
      ),
      Err(
        AgendaError::InvalidSlotStep(0)
      )
    );
  }

  #[test]
  fn oversized_step_yields_no_slots() {
    let slots = hourly_slots(
      clock("08:00"),
      clock("19:00"),
      u32::MAX
    )
    .expect("slots");
    assert!(slots.is_empty());

    let slots = hourly_slots(
      clock("08:00"),
      clock("19:00"),
      12 * 60
    )
    .expect("slots");
    assert!(slots.is_empty());
  }

  #[test]
  fn range_serde_uses_text_form() {
    let range: TimeRange =
      serde_json::from_str(
        "\"14:00-17:00\""
      )
      .expect("deserialize");
    assert_eq!(
      serde_json::to_string(&range)
        .expect("serialize"),
      "\"14:00-17:00\""
    );
    assert!(
      serde_json::from_str::<TimeRange>(
        "\"17:00-14:00\""
      )
      .is_err()
    );
  }
}
