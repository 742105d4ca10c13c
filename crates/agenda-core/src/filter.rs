use tracing::trace;

use crate::date::{
  CalendarDate,
  parse_date_expr
};
use crate::error::{
  AgendaError,
  Result
};
use crate::item::{
  CalendarItem,
  Status
};

/// Dashboard-style item selection.
///
/// Every set field must match. Terms are
/// `key:value` pairs (`space:aud1`,
/// `category:workshop`, `from:2025-05-01`)
/// or bare words matched against the
/// title. A repeated key replaces the
/// earlier value; bare words accumulate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
  space:    Option<String>,
  status:   Option<Status>,
  category: Option<String>,
  audience: Option<String>,
  from:     Option<CalendarDate>,
  to:       Option<CalendarDate>,
  words:    Vec<String>
}

impl Filter {
  #[tracing::instrument(skip(
    terms, today
  ))]
  pub fn parse(
    terms: &[String],
    today: CalendarDate
  ) -> Result<Self> {
    let mut filter = Self::default();
    for word in terms
      .iter()
      .flat_map(|t| t.split_whitespace())
    {
      filter.apply_term(word, today)?;
    }

    trace!(?filter, "parsed item filter");
    Ok(filter)
  }

  #[must_use]
  pub fn matches(
    &self,
    item: &CalendarItem
  ) -> bool {
    let title = item.title.to_lowercase();

    self
      .space
      .as_ref()
      .is_none_or(|s| item.space_id == *s)
      && self
        .status
        .is_none_or(|s| item.status == s)
      && same_label(
        self.category.as_deref(),
        item.category.as_deref()
      )
      && same_label(
        self.audience.as_deref(),
        item.audience.as_deref()
      )
      && self
        .from
        .is_none_or(|d| item.date >= d)
      && self
        .to
        .is_none_or(|d| item.date <= d)
      && self
        .words
        .iter()
        .all(|w| title.contains(w.as_str()))
  }

  fn apply_term(
    &mut self,
    term: &str,
    today: CalendarDate
  ) -> Result<()> {
    let Some((key, value)) =
      term.split_once(':')
    else {
      self.words.push(term.to_lowercase());
      return Ok(());
    };

    if value.is_empty() {
      return Err(
        AgendaError::InvalidFilter(
          format!(
            "missing value in '{term}'"
          )
        )
      );
    }

    match key.to_ascii_lowercase().as_str()
    {
      | "space" => {
        self.space = Some(value.to_string());
      }
      | "status" => {
        self.status = Some(value.parse()?);
      }
      | "category" | "type" => {
        self.category =
          Some(value.to_string());
      }
      | "audience" => {
        self.audience =
          Some(value.to_string());
      }
      | "from" | "after" => {
        self.from = Some(
          parse_date_expr(value, today)?
        );
      }
      | "to" | "until" | "before" => {
        self.to = Some(
          parse_date_expr(value, today)?
        );
      }
      | _ => {
        return Err(
          AgendaError::InvalidFilter(
            format!(
              "unknown filter key: {key}"
            )
          )
        );
      }
    }
    Ok(())
  }
}

/// An unset filter matches anything; a set
/// one needs an equal label, ignoring
/// ASCII case.
fn same_label(
  wanted: Option<&str>,
  actual: Option<&str>
) -> bool {
  match (wanted, actual) {
    | (None, _) => true,
    | (Some(w), Some(a)) => {
      w.eq_ignore_ascii_case(a)
    }
    | (Some(_), None) => false
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::slot::TimeRange;

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> CalendarDate {
    CalendarDate::new(y, m, d)
      .expect("valid date")
  }

  fn sample(
    title: &str,
    on: CalendarDate,
    space: &str,
    status: Status,
    category: &str
  ) -> CalendarItem {
    let mut item = CalendarItem::new(
      title,
      title,
      on,
      "09:00-12:00"
        .parse::<TimeRange>()
        .expect("valid range"),
      space,
      status
    );
    item.category =
      Some(category.to_string());
    item
  }

  fn terms(raw: &str) -> Vec<String> {
    raw
      .split_whitespace()
      .map(str::to_string)
      .collect()
  }

  #[test]
  fn empty_filter_matches_everything() {
    let filter = Filter::parse(
      &[],
      date(2025, 5, 1)
    )
    .expect("parse");
    assert_eq!(filter, Filter::default());
    assert!(filter.matches(&sample(
      "x",
      date(2025, 5, 1),
      "aud1",
      Status::Cancelled,
      "Workshop"
    )));
  }

  #[test]
  fn every_set_field_must_match() {
    let today = date(2025, 5, 1);
    let filter = Filter::parse(
      &terms(
        "space:aud1 status:approved \
         category:workshop"
      ),
      today
    )
    .expect("parse");

    assert!(filter.matches(&sample(
      "Workshop",
      date(2025, 5, 15),
      "aud1",
      Status::Approved,
      "Workshop"
    )));
    assert!(!filter.matches(&sample(
      "Workshop",
      date(2025, 5, 15),
      "sala2",
      Status::Approved,
      "Workshop"
    )));
    assert!(!filter.matches(&sample(
      "Fórum",
      date(2025, 6, 5),
      "aud1",
      Status::UnderReview,
      "Workshop"
    )));
    assert!(!filter.matches(&sample(
      "Seminário",
      date(2025, 5, 20),
      "aud1",
      Status::Approved,
      "Seminário"
    )));
  }

  #[test]
  fn audience_needs_a_value_on_the_item() {
    let filter = Filter::parse(
      &terms("audience:híbrido"),
      date(2025, 5, 1)
    )
    .expect("parse");
    let mut item = sample(
      "Fórum",
      date(2025, 6, 5),
      "esp1",
      Status::UnderReview,
      "Fórum"
    );
    assert!(!filter.matches(&item));

    item.audience =
      Some("Híbrido".to_string());
    assert!(filter.matches(&item));
  }

  #[test]
  fn later_key_replaces_earlier() {
    let filter = Filter::parse(
      &terms("space:aud1 space:sala1"),
      date(2025, 5, 1)
    )
    .expect("parse");
    assert!(filter.matches(&sample(
      "Reunião",
      date(2025, 5, 18),
      "sala1",
      Status::Approved,
      "Reunião"
    )));
  }

  #[test]
  fn date_bounds_and_title_text() {
    let today = date(2025, 5, 1);
    let filter = Filter::parse(
      &terms(
        "from:2025-05-10 to:+30d \
         inovação digital"
      ),
      today
    )
    .expect("parse");

    assert!(filter.matches(&sample(
      "Workshop de Inovação Digital",
      date(2025, 5, 15),
      "aud1",
      Status::Approved,
      "Workshop"
    )));
    assert!(!filter.matches(&sample(
      "Workshop de Inovação Digital",
      date(2025, 6, 15),
      "aud1",
      Status::Approved,
      "Workshop"
    )));
    assert!(!filter.matches(&sample(
      "Workshop de Inovação",
      date(2025, 5, 15),
      "aud1",
      Status::Approved,
      "Workshop"
    )));
  }

  #[test]
  fn rejects_malformed_terms() {
    let today = date(2025, 5, 1);
    for raw in [
      "status:archived",
      "room:aud1",
      "from:someday",
      "space:",
      "to:+2000000000000000000w",
    ] {
      assert!(
        Filter::parse(&terms(raw), today)
          .is_err(),
        "expected error for {raw}"
      );
    }
  }
}
