//! Roster resolution: schedule -> course, "held on" date string, and the
//! deliverable trainees.

use chrono::{Datelike, NaiveDate};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Course, Schedule, ScheduleType, Trainee};
use crate::repo::{RepoError, ScheduleRepo, TraineeRepo};

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("schedule not found")]
    ScheduleNotFound,
    #[error("course not found")]
    CourseNotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct Roster {
    pub course: Course,
    pub held_on: String,
    pub trainees: Vec<Trainee>,
}

/// `MM/DD/YYYY - MM/DD/YYYY` when the span exceeds one day, otherwise
/// `Month D & D, YYYY` joining start and end day.
pub fn format_regular_range(start: NaiveDate, end: NaiveDate) -> String {
    if (end - start).num_days() > 1 {
        format!("{} - {}", start.format("%m/%d/%Y"), end.format("%m/%d/%Y"))
    } else {
        format!(
            "{} {} & {}, {}",
            start.format("%B"),
            start.day(),
            end.day(),
            end.year()
        )
    }
}

/// Group staggered dates by month+year, comma-join the day numbers within a
/// group, join groups with " & ", and append the year only after the last
/// group: `Jan. 5,12 & Feb. 2, 2025`.
pub fn format_staggered_dates(dates: &[NaiveDate]) -> String {
    if dates.is_empty() {
        return String::new();
    }

    let mut groups: Vec<((i32, u32), Vec<u32>)> = Vec::new();
    for date in dates {
        let key = (date.year(), date.month());
        match groups.last_mut() {
            Some((last_key, days)) if *last_key == key => days.push(date.day()),
            _ => groups.push((key, vec![date.day()])),
        }
    }

    let parts: Vec<String> = groups
        .iter()
        .map(|((year, month), days)| {
            let month_name = NaiveDate::from_ymd_opt(*year, *month, 1)
                .map(|d| d.format("%b").to_string())
                .unwrap_or_default();
            let days = days
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(",");
            format!("{}. {}", month_name, days)
        })
        .collect();

    let last_year = dates.last().map(|d| d.year()).unwrap_or_default();
    format!("{}, {}", parts.join(" & "), last_year)
}

pub struct RosterProvider {
    schedules: Arc<dyn ScheduleRepo>,
    trainees: Arc<dyn TraineeRepo>,
}

impl RosterProvider {
    pub fn new(schedules: Arc<dyn ScheduleRepo>, trainees: Arc<dyn TraineeRepo>) -> Self {
        Self { schedules, trainees }
    }

    async fn held_on_for(&self, schedule: &Schedule) -> Result<String, RepoError> {
        Ok(match schedule.schedule_type {
            ScheduleType::Regular => match (schedule.start_date, schedule.end_date) {
                (Some(start), Some(end)) => format_regular_range(start, end),
                _ => String::new(),
            },
            ScheduleType::Staggered => {
                let dates = self.schedules.staggered_dates(schedule.id).await?;
                format_staggered_dates(&dates)
            }
        })
    }

    /// The formatted date string alone, for single renders where a missing
    /// schedule is not fatal.
    pub async fn held_on(&self, schedule_id: Uuid) -> Result<Option<String>, RepoError> {
        match self.schedules.find(schedule_id).await? {
            Some(schedule) => Ok(Some(self.held_on_for(&schedule).await?)),
            None => Ok(None),
        }
    }

    /// Resolve a schedule into its course, date string and deliverable
    /// trainees. Missing schedule or course is batch-fatal; no partial
    /// roster is ever returned.
    pub async fn resolve(&self, schedule_id: Uuid) -> Result<Roster, RosterError> {
        let schedule = self
            .schedules
            .find(schedule_id)
            .await?
            .ok_or(RosterError::ScheduleNotFound)?;
        let course = self
            .schedules
            .find_course(schedule.course_id)
            .await?
            .ok_or(RosterError::CourseNotFound)?;

        let held_on = self.held_on_for(&schedule).await?;
        let trainees = self.trainees.deliverable_for_schedule(schedule_id).await?;

        Ok(Roster {
            course,
            held_on,
            trainees,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn multi_day_regular_range_uses_slash_format() {
        assert_eq!(
            format_regular_range(date(2025, 3, 10), date(2025, 3, 12)),
            "03/10/2025 - 03/12/2025"
        );
    }

    #[test]
    fn short_regular_range_joins_start_and_end_days() {
        assert_eq!(
            format_regular_range(date(2025, 3, 10), date(2025, 3, 11)),
            "March 10 & 11, 2025"
        );
        assert_eq!(
            format_regular_range(date(2025, 3, 10), date(2025, 3, 10)),
            "March 10 & 10, 2025"
        );
    }

    #[test]
    fn staggered_dates_group_by_month_with_trailing_year() {
        let dates = [date(2025, 1, 5), date(2025, 1, 12), date(2025, 2, 2)];
        assert_eq!(format_staggered_dates(&dates), "Jan. 5,12 & Feb. 2, 2025");
    }

    #[test]
    fn staggered_single_month() {
        let dates = [date(2025, 6, 3), date(2025, 6, 10), date(2025, 6, 17)];
        assert_eq!(format_staggered_dates(&dates), "Jun. 3,10,17, 2025");
    }

    #[test]
    fn staggered_empty_is_empty() {
        assert_eq!(format_staggered_dates(&[]), "");
    }
}
