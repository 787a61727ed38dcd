//! Postgres-backed template store.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::repo::{RepoError, TemplateRepo};
use crate::template::models::{CertificateTemplate, TemplateField, TemplateKind};

pub struct PgTemplateRepo {
    pool: PgPool,
}

impl PgTemplateRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn template_from_row(row: PgRow) -> Result<CertificateTemplate, RepoError> {
    let kind_str: String = row.try_get("kind")?;
    let kind = TemplateKind::parse(&kind_str)
        .ok_or_else(|| RepoError::Other(format!("unknown template kind '{}'", kind_str)))?;
    let fields: sqlx::types::Json<Vec<TemplateField>> = row.try_get("fields")?;

    Ok(CertificateTemplate {
        id: row.try_get("id")?,
        course_id: row.try_get("course_id")?,
        kind,
        image_url: row.try_get("image_url")?,
        fields: fields.0,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl TemplateRepo for PgTemplateRepo {
    async fn find(
        &self,
        course_id: Uuid,
        kind: TemplateKind,
    ) -> Result<Option<CertificateTemplate>, RepoError> {
        let row = sqlx::query(
            "SELECT id, course_id, kind, image_url, fields, updated_at \
             FROM certificate_templates WHERE course_id = $1 AND kind = $2",
        )
        .bind(course_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(template_from_row).transpose()
    }

    async fn upsert(
        &self,
        course_id: Uuid,
        kind: TemplateKind,
        image_url: &str,
        fields: &[TemplateField],
    ) -> Result<CertificateTemplate, RepoError> {
        // Single logical operation: the unique (course_id, kind) index plus
        // ON CONFLICT means no duplicate row can ever appear.
        let row = sqlx::query(
            "INSERT INTO certificate_templates (id, course_id, kind, image_url, fields, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) \
             ON CONFLICT (course_id, kind) \
             DO UPDATE SET image_url = $4, fields = $5, updated_at = NOW() \
             RETURNING id, course_id, kind, image_url, fields, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(kind.as_str())
        .bind(image_url)
        .bind(sqlx::types::Json(fields.to_vec()))
        .fetch_one(&self.pool)
        .await?;

        template_from_row(row)
    }

    async fn delete(
        &self,
        course_id: Uuid,
        kind: TemplateKind,
    ) -> Result<Option<String>, RepoError> {
        let row = sqlx::query(
            "DELETE FROM certificate_templates WHERE course_id = $1 AND kind = $2 \
             RETURNING image_url",
        )
        .bind(course_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => Some(row.try_get("image_url")?),
            None => None,
        })
    }
}
