use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{
  Datelike,
  Days,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
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

const TIMEZONE_CONFIG_FILE: &str =
  "agenda-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "AGENDA_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "AGENDA_TIME_CONFIG";
const DEFAULT_TIMEZONE: &str =
  "America/Sao_Paulo";

/// A calendar day with no time of day and
/// no timezone.
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
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
  pub fn new(
    year: i32,
    month: u32,
    day: u32
  ) -> Result<Self> {
    NaiveDate::from_ymd_opt(
      year, month, day
    )
    .map(Self)
    .ok_or_else(|| {
      AgendaError::InvalidDate(format!(
        "{year:04}-{month:02}-{day:02}"
      ))
    })
  }

  /// First day of `year`/`month`.
  pub fn month_start(
    year: i32,
    month: u32
  ) -> Result<Self> {
    Self::new(year, month, 1)
  }

  #[must_use]
  pub fn naive(self) -> NaiveDate {
    self.0
  }

  #[must_use]
  pub fn year(self) -> i32 {
    self.0.year()
  }

  #[must_use]
  pub fn month(self) -> u32 {
    self.0.month()
  }

  #[must_use]
  pub fn day(self) -> u32 {
    self.0.day()
  }

  #[must_use]
  pub fn weekday(self) -> Weekday {
    self.0.weekday()
  }

  /// 0 = Sunday .. 6 = Saturday.
  #[must_use]
  pub fn weekday_from_sunday(
    self
  ) -> u32 {
    self.0.weekday().num_days_from_sunday()
  }

  #[must_use]
  pub fn first_of_month(self) -> Self {
    Self(
      self
        .0
        .with_day(1)
        .unwrap_or(self.0)
    )
  }

  pub fn last_of_month(
    self
  ) -> Result<Self> {
    let (next_year, next_month) =
      if self.month() >= 12 {
        (
          self.year().checked_add(1).ok_or_else(
            || self.out_of_range()
          )?,
          1_u32
        )
      } else {
        (self.year(), self.month() + 1)
      };
    Self::month_start(
      next_year, next_month
    )?
    .add_days(-1)
  }

  pub fn days_in_month(
    self
  ) -> Result<u32> {
    Ok(self.last_of_month()?.day())
  }

  pub fn add_days(
    self,
    days: i64
  ) -> Result<Self> {
    let shifted = if days >= 0 {
      self.0.checked_add_days(
        Days::new(days.unsigned_abs())
      )
    } else {
      self.0.checked_sub_days(
        Days::new(days.unsigned_abs())
      )
    };
    shifted
      .map(Self)
      .ok_or_else(|| self.out_of_range())
  }

  /// Moves by whole months, clamping the
  /// day to the target month's length.
  pub fn shift_months(
    self,
    months: i32
  ) -> Result<Self> {
    let index = i64::from(self.year())
      * 12
      + i64::from(self.month() - 1)
      + i64::from(months);
    let year = i32::try_from(
      index.div_euclid(12)
    )
    .map_err(|_| self.out_of_range())?;
    let month =
      index.rem_euclid(12) as u32 + 1;

    let first =
      Self::month_start(year, month)?;
    let day = self
      .day()
      .min(first.days_in_month()?);
    Self::new(year, month, day)
  }

  fn out_of_range(self) -> AgendaError {
    AgendaError::InvalidDate(format!(
      "{self} is at the edge of the \
       supported calendar range"
    ))
  }
}

impl fmt::Display for CalendarDate {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{}",
      self.0.format("%Y-%m-%d")
    )
  }
}

impl FromStr for CalendarDate {
  type Err = AgendaError;

  fn from_str(
    s: &str
  ) -> Result<Self> {
    NaiveDate::parse_from_str(
      s.trim(),
      "%Y-%m-%d"
    )
    .map(Self)
    .map_err(|err| {
      AgendaError::InvalidDate(format!(
        "{}: {err}",
        s.trim()
      ))
    })
  }
}

impl Serialize for CalendarDate {
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
  for CalendarDate
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

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Picks the zone that decides which
/// local date counts as today.
///
/// Order: `AGENDA_TIMEZONE`, the rc
/// `timezone` key, `agenda-time.toml`,
/// then the built-in default.
pub fn resolve_timezone(
  configured: Option<&str>
) -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return tz;
  }

  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "agendarc")
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_TIMEZONE,
    "DEFAULT_TIMEZONE"
  )
  .unwrap_or_else(|| {
    tracing::error!(
      "failed to parse fallback \
       timezone; using UTC"
    );
    chrono_tz::UTC
  })
}

#[must_use]
pub fn today_in(
  timezone: Tz
) -> CalendarDate {
  CalendarDate(
    Utc::now()
      .with_timezone(&timezone)
      .date_naive()
  )
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured local timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Resolves a day expression relative to
/// `today`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: CalendarDate
) -> Result<CalendarDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return today.add_days(1);
    }
    | "yesterday" => {
      return today.add_days(-1);
    }
    | _ => {}
  }

  if let Some(target) =
    parse_weekday_name(&lower)
  {
    return next_weekday_date(
      today, target
    );
  }

  if let Some((sign, num, unit)) =
    parse_relative(token)?
  {
    let amount = sign * num;
    return match unit {
      | 'd' => today.add_days(amount),
      | 'w' => today.add_days(
        amount
          .checked_mul(7)
          .ok_or_else(|| unrecognized(token))?
      ),
      | 'm' => {
        today.shift_months(
          months_from(amount, token)?
        )
      }
      | _ => Err(unrecognized(token))
    };
  }

  token.parse().map_err(|_| {
    AgendaError::InvalidDate(format!(
      "unrecognized date expression \
       '{token}'; supported: \
       today/tomorrow/yesterday, \
       weekday names, +Nd/+Nw/+Nm, \
       YYYY-MM-DD"
    ))
  })
}

/// Resolves a month expression to the
/// first day of that month.
///
/// Month names refer to `today`'s year.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_month_expr(
  input: &str,
  today: CalendarDate
) -> Result<CalendarDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" | "this" | "now" => {
      return Ok(
        today.first_of_month()
      );
    }
    | "next" => {
      return today
        .first_of_month()
        .shift_months(1);
    }
    | "prev" | "previous" | "last" => {
      return today
        .first_of_month()
        .shift_months(-1);
    }
    | _ => {}
  }

  if let Some(month) =
    parse_month_name(&lower)
  {
    return CalendarDate::month_start(
      today.year(),
      month
    );
  }

  if let Some((sign, num, unit)) =
    parse_relative(token)?
  {
    if unit != 'm' {
      return Err(unrecognized(token));
    }
    return today
      .first_of_month()
      .shift_months(months_from(
        sign * num,
        token
      )?);
  }

  if let Ok(date) =
    token.parse::<CalendarDate>()
  {
    return Ok(date.first_of_month());
  }

  let (year, month) = token
    .split_once('-')
    .ok_or_else(|| {
      unrecognized(token)
    })?;
  let year = year
    .parse::<i32>()
    .map_err(|_| unrecognized(token))?;
  let month = month
    .parse::<u32>()
    .map_err(|_| unrecognized(token))?;
  CalendarDate::month_start(year, month)
}

fn parse_relative(
  token: &str
) -> Result<Option<(i64, i64, char)>> {
  let rel_re = Regex::new(
    r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dwm])$"
  )
  .map_err(|e| {
    AgendaError::InvalidDate(format!(
      "internal regex compile \
       failure: {e}"
    ))
  })?;

  let Some(caps) =
    rel_re.captures(token)
  else {
    return Ok(None);
  };

  let sign = match caps
    .name("sign")
    .map(|m| m.as_str())
  {
    | Some("-") => -1,
    | _ => 1
  };
  let num = caps
    .name("num")
    .map(|m| m.as_str())
    .unwrap_or_default()
    .parse::<i64>()
    .map_err(|_| unrecognized(token))?;
  let unit = caps
    .name("unit")
    .and_then(|m| {
      m.as_str().chars().next()
    })
    .unwrap_or('d');

  Ok(Some((sign, num, unit)))
}

fn months_from(
  amount: i64,
  token: &str
) -> Result<i32> {
  i32::try_from(amount)
    .map_err(|_| unrecognized(token))
}

fn unrecognized(
  token: &str
) -> AgendaError {
  AgendaError::InvalidDate(format!(
    "unrecognized expression '{token}'"
  ))
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

/// Next occurrence strictly after `from`.
fn next_weekday_date(
  from: CalendarDate,
  target: Weekday
) -> Result<CalendarDate> {
  let from_idx = i64::from(
    from
      .weekday()
      .num_days_from_monday()
  );
  let target_idx = i64::from(
    target.num_days_from_monday()
  );
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from.add_days(delta)
}

fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token.trim() {
    | "january" | "jan" => Some(1),
    | "february" | "feb" => Some(2),
    | "march" | "mar" => Some(3),
    | "april" | "apr" => Some(4),
    | "may" => Some(5),
    | "june" | "jun" => Some(6),
    | "july" | "jul" => Some(7),
    | "august" | "aug" => Some(8),
    | "september" | "sep" | "sept" => {
      Some(9)
    }
    | "october" | "oct" => Some(10),
    | "november" | "nov" => Some(11),
    | "december" | "dec" => Some(12),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> CalendarDate {
    CalendarDate::new(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn rejects_out_of_range_components() {
    assert!(
      CalendarDate::new(2025, 13, 1)
        .is_err()
    );
    assert!(
      CalendarDate::new(2025, 0, 1)
        .is_err()
    );
    assert!(
      CalendarDate::new(2025, 2, 29)
        .is_err()
    );
    assert!(
      CalendarDate::new(2024, 2, 29)
        .is_ok()
    );
  }

  #[test]
  fn computes_month_bounds() {
    assert_eq!(
      date(2025, 12, 17)
        .last_of_month()
        .expect("last"),
      date(2025, 12, 31)
    );
    assert_eq!(
      date(2024, 2, 10)
        .days_in_month()
        .expect("days"),
      29
    );
    assert_eq!(
      date(2025, 5, 20).first_of_month(),
      date(2025, 5, 1)
    );
    assert_eq!(
      date(2025, 5, 1)
        .weekday_from_sunday(),
      4
    );
  }

  #[test]
  fn shifts_months_with_clamping() {
    assert_eq!(
      date(2025, 1, 31)
        .shift_months(1)
        .expect("shift"),
      date(2025, 2, 28)
    );
    assert_eq!(
      date(2025, 12, 15)
        .shift_months(1)
        .expect("shift"),
      date(2026, 1, 15)
    );
    assert_eq!(
      date(2025, 1, 15)
        .shift_months(-13)
        .expect("shift"),
      date(2023, 12, 15)
    );
  }

  #[test]
  fn add_days_crosses_year_boundary() {
    assert_eq!(
      date(2025, 12, 31)
        .add_days(1)
        .expect("add"),
      date(2026, 1, 1)
    );
    assert_eq!(
      date(2025, 3, 1)
        .add_days(-1)
        .expect("sub"),
      date(2025, 2, 28)
    );
  }

  #[test]
  fn parses_day_expressions() {
    let today = date(2025, 5, 15);
    assert_eq!(
      parse_date_expr("today", today)
        .expect("today"),
      today
    );
    assert_eq!(
      parse_date_expr("tomorrow", today)
        .expect("tomorrow"),
      date(2025, 5, 16)
    );
    assert_eq!(
      parse_date_expr("monday", today)
        .expect("weekday"),
      date(2025, 5, 19)
    );
    assert_eq!(
      parse_date_expr("thursday", today)
        .expect("same weekday"),
      date(2025, 5, 22)
    );
    assert_eq!(
      parse_date_expr("-15d", today)
        .expect("relative"),
      date(2025, 4, 30)
    );
    assert_eq!(
      parse_date_expr(
        "2025-06-05",
        today
      )
      .expect("iso"),
      date(2025, 6, 5)
    );
    assert!(
      parse_date_expr("soon", today)
        .is_err()
    );
  }

  #[test]
  fn parses_month_expressions() {
    let today = date(2025, 5, 15);
    assert_eq!(
      parse_month_expr("2025-12", today)
        .expect("year-month"),
      date(2025, 12, 1)
    );
    assert_eq!(
      parse_month_expr("march", today)
        .expect("name"),
      date(2025, 3, 1)
    );
    assert_eq!(
      parse_month_expr("+8m", today)
        .expect("relative"),
      date(2026, 1, 1)
    );
    assert_eq!(
      parse_month_expr("prev", today)
        .expect("prev"),
      date(2025, 4, 1)
    );
    assert!(
      parse_month_expr("2025-13", today)
        .is_err()
    );
    assert!(
      parse_month_expr("+2d", today)
        .is_err()
    );
  }

  #[test]
  fn huge_offsets_are_errors() {
    let today = date(2025, 5, 15);
    for raw in [
      "+2000000000000000000w",
      "-9223372036854775807d",
      "+99999999999m",
      "+99999999999999999999d",
    ] {
      assert!(
        matches!(
          parse_date_expr(raw, today),
          Err(AgendaError::InvalidDate(_))
        ),
        "expected error for {raw}"
      );
    }
    assert!(
      parse_month_expr("+99999999999m", today)
        .is_err()
    );
  }

  #[test]
  fn date_serde_uses_iso_form() {
    let parsed: CalendarDate =
      serde_json::from_str(
        "\"2025-05-18\""
      )
      .expect("deserialize");
    assert_eq!(parsed, date(2025, 5, 18));
    assert!(
      serde_json::from_str::<CalendarDate>(
        "\"2025-02-30\""
      )
      .is_err()
    );
  }
}
