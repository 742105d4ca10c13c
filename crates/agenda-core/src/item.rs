use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::date::CalendarDate;
use crate::error::{AgendaError, Result};
use crate::slot::{Clock, TimeRange};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Approved,
    UnderReview,
    Rejected,
    Cancelled,
}

impl Status {
    /// Rejected and cancelled requests leave the space free.
    pub fn occupies_space(self) -> bool {
        matches!(self, Status::Approved | Status::UnderReview)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Approved => "approved",
            Status::UnderReview => "under-review",
            Status::Rejected => "rejected",
            Status::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = AgendaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approved" => Ok(Status::Approved),
            "under-review" | "review" | "pending" => Ok(Status::UnderReview),
            "rejected" => Ok(Status::Rejected),
            "cancelled" | "canceled" => Ok(Status::Cancelled),
            other => Err(AgendaError::InvalidFilter(format!(
                "unknown status: {other}"
            ))),
        }
    }
}

/// A dated booking or event as handed over by the surrounding application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarItem {
    pub id: String,

    pub title: String,

    pub date: CalendarDate,

    pub start_time: Clock,

    pub end_time: Clock,

    pub space_id: String,

    pub status: Status,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

impl CalendarItem {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        date: CalendarDate,
        slot: TimeRange,
        space_id: impl Into<String>,
        status: Status,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            date,
            start_time: slot.start,
            end_time: slot.end,
            space_id: space_id.into(),
            status,
            category: None,
            audience: None,
        }
    }

    pub fn time_range(&self) -> Result<TimeRange> {
        TimeRange::new(self.start_time, self.end_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_item_json() {
        let raw = r#"{"id":"1","title":"Workshop de Inovação Digital","date":"2025-05-15","start_time":"09:00","end_time":"17:00","space_id":"aud1","status":"approved","category":"Workshop"}"#;
        let item: CalendarItem = serde_json::from_str(raw).expect("parse item");

        assert_eq!(item.date.to_string(), "2025-05-15");
        assert_eq!(item.status, Status::Approved);
        assert_eq!(item.category.as_deref(), Some("Workshop"));
        assert_eq!(item.audience, None);
        assert_eq!(
            item.time_range().expect("valid range").duration_minutes(),
            480
        );
    }

    #[test]
    fn inverted_item_times_are_invalid_ranges() {
        let raw = r#"{"id":"2","title":"x","date":"2025-05-15","start_time":"17:00","end_time":"09:00","space_id":"aud1","status":"under-review"}"#;
        let item: CalendarItem = serde_json::from_str(raw).expect("parse item");
        assert!(matches!(
            item.time_range(),
            Err(AgendaError::InvalidRange { .. })
        ));
    }

    #[test]
    fn only_live_requests_occupy_space() {
        assert!(Status::Approved.occupies_space());
        assert!(Status::UnderReview.occupies_space());
        assert!(!Status::Rejected.occupies_space());
        assert!(!Status::Cancelled.occupies_space());
        assert_eq!("Canceled".parse::<Status>(), Ok(Status::Cancelled));
        assert!("archived".parse::<Status>().is_err());
    }
}
