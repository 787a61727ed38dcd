//! Repository traits over the relational store.
//!
//! Every component takes these as `Arc<dyn ...>` at construction so tests can
//! substitute in-memory fakes; the Postgres implementations live in
//! [`crate::db`].

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Course, Schedule, Trainee};
use crate::template::models::{CertificateTemplate, TemplateField, TemplateKind};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Other(String),
}

/// Persistence for certificate templates. At most one row per
/// (course, kind); upsert is one logical operation, never check-then-insert
/// split across calls.
#[async_trait]
pub trait TemplateRepo: Send + Sync {
    async fn find(
        &self,
        course_id: Uuid,
        kind: TemplateKind,
    ) -> Result<Option<CertificateTemplate>, RepoError>;

    async fn upsert(
        &self,
        course_id: Uuid,
        kind: TemplateKind,
        image_url: &str,
        fields: &[TemplateField],
    ) -> Result<CertificateTemplate, RepoError>;

    /// Returns the deleted template's image URL so the caller can remove the
    /// stored background. Deleting a non-existent template is `Ok(None)`.
    async fn delete(
        &self,
        course_id: Uuid,
        kind: TemplateKind,
    ) -> Result<Option<String>, RepoError>;
}

#[async_trait]
pub trait TraineeRepo: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<Trainee>, RepoError>;

    /// Trainees of the course that already carry a certificate serial.
    async fn serial_count(&self, course_id: Uuid) -> Result<u64, RepoError>;

    /// Persist a freshly allocated serial. The serial column is only ever
    /// written once per trainee.
    async fn set_serial(&self, trainee_id: Uuid, serial: &str) -> Result<(), RepoError>;

    /// Trainees of the schedule with both a serial and an email, ordered by
    /// last name.
    async fn deliverable_for_schedule(
        &self,
        schedule_id: Uuid,
    ) -> Result<Vec<Trainee>, RepoError>;
}

#[async_trait]
pub trait ScheduleRepo: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<Schedule>, RepoError>;

    async fn find_course(&self, course_id: Uuid) -> Result<Option<Course>, RepoError>;

    /// The individual dates of a staggered schedule, ascending.
    async fn staggered_dates(&self, schedule_id: Uuid) -> Result<Vec<NaiveDate>, RepoError>;
}
