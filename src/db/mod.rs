//! Shared application state and the Postgres repository implementations.
//!
//! Split into submodules per aggregate:
//! - `template` - certificate template rows
//! - `trainee` - trainee rows and serial bookkeeping
//! - `schedule` - schedules, schedule dates and courses

mod schedule;
mod template;
mod trainee;

pub use schedule::PgScheduleRepo;
pub use template::PgTemplateRepo;
pub use trainee::PgTraineeRepo;

use dotenvy::dotenv;
use moka::future::Cache;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::certificate::{
    BatchIssuer, CertificateRender, FontCatalog, PdfRenderer, RosterProvider, SerialAllocator,
};
use crate::mailer::{Mailer, SmtpMailer};
use crate::repo::{RepoError, ScheduleRepo, TemplateRepo, TraineeRepo};
use crate::storage::{ObjectStorage, SupabaseConfig, SupabaseStorage};
use crate::template::models::{CertificateTemplate, TemplateKind};

#[derive(Clone)]
pub struct AppState {
    pub templates: Arc<dyn TemplateRepo>,
    pub trainees: Arc<dyn TraineeRepo>,
    pub schedules: Arc<dyn ScheduleRepo>,
    pub storage: Arc<dyn ObjectStorage>,
    pub mailer: Arc<dyn Mailer>,
    pub renderer: Arc<dyn CertificateRender>,
    pub template_cache: Cache<String, CertificateTemplate>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")?;

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(100)
            .min_connections(10)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(900))
            .max_lifetime(Duration::from_secs(1800))
            .connect(&database_url)
            .await?;

        let http_client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(900))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let storage = Arc::new(SupabaseStorage::new(
            SupabaseConfig::from_env()?,
            http_client.clone(),
        ));
        let mailer = Arc::new(SmtpMailer::from_env()?);
        let fonts = Arc::new(FontCatalog::load_default()?);
        let renderer = Arc::new(PdfRenderer::new(http_client.clone(), fonts));

        Ok(Self::with_parts(
            Arc::new(PgTemplateRepo::new(pool.clone())),
            Arc::new(PgTraineeRepo::new(pool.clone())),
            Arc::new(PgScheduleRepo::new(pool)),
            storage,
            mailer,
            renderer,
        ))
    }

    /// Assemble state from already-built parts. Tests use this with
    /// in-memory repositories; no database or SMTP connection is opened.
    pub fn with_parts(
        templates: Arc<dyn TemplateRepo>,
        trainees: Arc<dyn TraineeRepo>,
        schedules: Arc<dyn ScheduleRepo>,
        storage: Arc<dyn ObjectStorage>,
        mailer: Arc<dyn Mailer>,
        renderer: Arc<dyn CertificateRender>,
    ) -> Self {
        let template_cache = Cache::builder()
            .time_to_live(Duration::from_secs(10 * 60))
            .max_capacity(100)
            .build();

        AppState {
            templates,
            trainees,
            schedules,
            storage,
            mailer,
            renderer,
            template_cache,
            http_client: reqwest::Client::new(),
        }
    }

    fn template_cache_key(course_id: Uuid, kind: TemplateKind) -> String {
        format!("{}:{}", course_id, kind.as_str())
    }

    /// Template lookup through the cache; misses that find a row populate it.
    pub async fn cached_template(
        &self,
        course_id: Uuid,
        kind: TemplateKind,
    ) -> Result<Option<CertificateTemplate>, RepoError> {
        let key = Self::template_cache_key(course_id, kind);
        if let Some(hit) = self.template_cache.get(&key).await {
            return Ok(Some(hit));
        }

        let found = self.templates.find(course_id, kind).await?;
        if let Some(template) = &found {
            self.template_cache.insert(key, template.clone()).await;
        }
        Ok(found)
    }

    pub async fn invalidate_template(&self, course_id: Uuid, kind: TemplateKind) {
        self.template_cache
            .invalidate(&Self::template_cache_key(course_id, kind))
            .await;
    }

    pub fn roster_provider(&self) -> RosterProvider {
        RosterProvider::new(self.schedules.clone(), self.trainees.clone())
    }

    pub fn serial_allocator(&self) -> SerialAllocator {
        SerialAllocator::new(self.trainees.clone())
    }

    pub fn batch_issuer(&self) -> BatchIssuer {
        BatchIssuer::new(
            self.roster_provider(),
            self.serial_allocator(),
            self.templates.clone(),
            self.renderer.clone(),
            self.mailer.clone(),
        )
    }
}
