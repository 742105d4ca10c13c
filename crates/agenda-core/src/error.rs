//! Error types for the calendar core.
//!
//! Grid building, slot parsing and availability classification fail with
//! [`AgendaError`]. The application layer (config, item source, commands)
//! wraps these in `anyhow` with context.

use thiserror::Error;

use crate::slot::Clock;

/// Result alias for core calendar operations.
pub type Result<T> =
  std::result::Result<T, AgendaError>;

#[derive(
  Debug, Clone, PartialEq, Eq, Error,
)]
pub enum AgendaError {
  /// Malformed or out-of-range date or
  /// month.
  #[error("invalid date: {0}")]
  InvalidDate(String),

  /// A time range whose start is not
  /// before its end.
  #[error(
    "invalid time range {start}-{end}: \
     start must be before end"
  )]
  InvalidRange {
    start: Clock,
    end:   Clock
  },

  #[error("invalid clock time: {0}")]
  InvalidClock(String),

  #[error(
    "slot step must be positive, got \
     {0} minutes"
  )]
  InvalidSlotStep(u32),

  #[error(
    "invalid filter expression: {0}"
  )]
  InvalidFilter(String)
}
