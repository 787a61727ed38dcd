//! Postgres-backed schedule and course queries.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{Course, Schedule, ScheduleType};
use crate::repo::{RepoError, ScheduleRepo};

pub struct PgScheduleRepo {
    pool: PgPool,
}

impl PgScheduleRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduleRepo for PgScheduleRepo {
    async fn find(&self, id: Uuid) -> Result<Option<Schedule>, RepoError> {
        let row = sqlx::query(
            "SELECT id, course_id, schedule_type, start_date, end_date \
             FROM schedules WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let type_str: String = row.try_get("schedule_type")?;
            let schedule_type = ScheduleType::parse(&type_str).ok_or_else(|| {
                RepoError::Other(format!("unknown schedule type '{}'", type_str))
            })?;
            Ok(Schedule {
                id: row.try_get("id")?,
                course_id: row.try_get("course_id")?,
                schedule_type,
                start_date: row.try_get("start_date")?,
                end_date: row.try_get("end_date")?,
            })
        })
        .transpose()
    }

    async fn find_course(&self, course_id: Uuid) -> Result<Option<Course>, RepoError> {
        let row = sqlx::query("SELECT id, name, serial_padding FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            let padding: i32 = row.try_get("serial_padding")?;
            Ok(Course {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                serial_padding: padding as u32,
            })
        })
        .transpose()
    }

    async fn staggered_dates(&self, schedule_id: Uuid) -> Result<Vec<NaiveDate>, RepoError> {
        let rows = sqlx::query(
            "SELECT date FROM schedule_dates WHERE schedule_id = $1 ORDER BY date",
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Ok(row.try_get("date")?))
            .collect()
    }
}
