//! Postgres-backed trainee queries.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::Trainee;
use crate::repo::{RepoError, TraineeRepo};

pub struct PgTraineeRepo {
    pool: PgPool,
}

impl PgTraineeRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TRAINEE_COLUMNS: &str = "id, schedule_id, first_name, last_name, middle_initial, \
     email, photo_url, certificate_serial, batch_number";

fn trainee_from_row(row: PgRow) -> Result<Trainee, RepoError> {
    Ok(Trainee {
        id: row.try_get("id")?,
        schedule_id: row.try_get("schedule_id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        middle_initial: row.try_get("middle_initial")?,
        email: row.try_get("email")?,
        photo_url: row.try_get("photo_url")?,
        certificate_serial: row.try_get("certificate_serial")?,
        batch_number: row.try_get("batch_number")?,
    })
}

#[async_trait]
impl TraineeRepo for PgTraineeRepo {
    async fn find(&self, trainee_id: Uuid) -> Result<Option<Trainee>, RepoError> {
        let row = sqlx::query(&format!(
            "SELECT {TRAINEE_COLUMNS} FROM trainees WHERE id = $1"
        ))
        .bind(trainee_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(trainee_from_row).transpose()
    }

    async fn serial_count(&self, course_id: Uuid) -> Result<u64, RepoError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS issued FROM trainees t \
             JOIN schedules s ON t.schedule_id = s.id \
             WHERE s.course_id = $1 AND t.certificate_serial IS NOT NULL",
        )
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;

        let issued: i64 = row.try_get("issued")?;
        Ok(issued as u64)
    }

    async fn set_serial(&self, trainee_id: Uuid, serial: &str) -> Result<(), RepoError> {
        // Serials are immutable once assigned; the guard keeps a concurrent
        // writer from clobbering an existing value.
        sqlx::query(
            "UPDATE trainees SET certificate_serial = $2 \
             WHERE id = $1 AND certificate_serial IS NULL",
        )
        .bind(trainee_id)
        .bind(serial)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn deliverable_for_schedule(
        &self,
        schedule_id: Uuid,
    ) -> Result<Vec<Trainee>, RepoError> {
        let rows = sqlx::query(&format!(
            "SELECT {TRAINEE_COLUMNS} FROM trainees \
             WHERE schedule_id = $1 \
               AND certificate_serial IS NOT NULL \
               AND email IS NOT NULL \
             ORDER BY last_name, first_name"
        ))
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(trainee_from_row).collect()
    }
}
