//! Daily note record and calendar-date handling.
//!
//! # Invariants
//! - At most one daily note exists per `date`.
//! - `date` is stored zero-padded as `YYYY-MM-DD`.
//! - `tasks` holds task ids in display order, without duplicates.

use crate::model::task::TaskId;
use crate::model::ValidationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for daily notes.
pub type DailyNoteId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyNote {
    pub id: DailyNoteId,
    /// Unique calendar date, `YYYY-MM-DD`.
    pub date: String,
    pub content: String,
    pub tasks: Vec<TaskId>,
}

impl DailyNote {
    pub fn new(date: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            date: date.into(),
            content: content.into(),
            tasks: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        normalize_calendar_date(&self.date).map(|_| ())
    }

    pub(crate) fn push_task(&mut self, task_id: TaskId) -> bool {
        if self.tasks.contains(&task_id) {
            return false;
        }
        self.tasks.push(task_id);
        true
    }

    pub(crate) fn remove_task(&mut self, task_id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|current| *current != task_id);
        self.tasks.len() != before
    }
}

const CALENDAR_DATE_FORMAT: &str = "%Y-%m-%d";

/// Validates a calendar date and returns it in zero-padded `YYYY-MM-DD` form.
///
/// The canonical form sorts lexicographically in date order, which listing
/// relies on.
pub fn normalize_calendar_date(value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    let date = NaiveDate::parse_from_str(trimmed, CALENDAR_DATE_FORMAT)
        .map_err(|_| ValidationError::InvalidDate(trimmed.to_string()))?;
    Ok(date.format(CALENDAR_DATE_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::normalize_calendar_date;

    #[test]
    fn accepts_valid_dates_and_trims() {
        assert_eq!(normalize_calendar_date(" 2025-03-15 ").unwrap(), "2025-03-15");
        assert!(normalize_calendar_date("2024-02-29").is_ok());
        assert!(normalize_calendar_date("2000-02-29").is_ok());
    }

    #[test]
    fn pads_month_and_day_to_canonical_form() {
        assert_eq!(normalize_calendar_date("2025-3-15").unwrap(), "2025-03-15");
        assert_eq!(normalize_calendar_date("2025-03-5").unwrap(), "2025-03-05");
    }

    #[test]
    fn rejects_malformed_and_out_of_range_dates() {
        for value in [
            "",
            "15/03/2025",
            "2025-03-15T10:00",
            "2025-13-01",
            "2025-00-10",
            "2025-04-31",
            "2023-02-29",
            "1900-02-29",
        ] {
            assert!(
                normalize_calendar_date(value).is_err(),
                "{value} should be rejected"
            );
        }
    }
}
