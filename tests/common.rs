//! Shared in-memory fakes for integration tests. No Postgres, SMTP or object
//! storage connection is required.

use actix_web::{web, Scope};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use psi_training_server::certificate::renderer::{
    suggested_filename, CertificateRender, RenderContext, RenderError, RenderedCertificate,
    PDF_CONTENT_TYPE,
};
use psi_training_server::mailer::{EmailAttachment, MailError, Mailer};
use psi_training_server::models::{Course, Schedule, ScheduleType, Trainee, DEFAULT_SERIAL_PADDING};
use psi_training_server::repo::{RepoError, ScheduleRepo, TemplateRepo, TraineeRepo};
use psi_training_server::storage::ObjectStorage;
use psi_training_server::template::models::{CertificateTemplate, TemplateField, TemplateKind};
use psi_training_server::{certificate, template, AppState};

/// The `/api` scope exactly as [`psi_training_server::run`] mounts it.
pub fn api_scope() -> Scope {
    web::scope("/api")
        .service(
            web::resource("/certificates/template")
                .route(web::get().to(template::handlers::get_template))
                .route(web::post().to(template::handlers::upsert_template))
                .route(web::delete().to(template::handlers::delete_template)),
        )
        .service(
            web::resource("/certificates/template/image")
                .route(web::post().to(template::handlers::upload_template_image)),
        )
        .service(
            web::resource("/certificates/render")
                .route(web::post().to(certificate::handlers::render_certificate)),
        )
        .service(
            web::resource("/certificates/batch-send")
                .route(web::post().to(certificate::handlers::batch_send)),
        )
}

pub fn state_with(
    store: Arc<InMemoryStore>,
    storage: Arc<MockObjectStorage>,
    mailer: Arc<RecordingMailer>,
    renderer: Arc<StubRenderer>,
) -> AppState {
    AppState::with_parts(
        store.clone(),
        store.clone(),
        store,
        storage,
        mailer,
        renderer,
    )
}

#[derive(Default)]
struct StoreState {
    courses: HashMap<Uuid, Course>,
    schedules: HashMap<Uuid, Schedule>,
    schedule_dates: HashMap<Uuid, Vec<NaiveDate>>,
    trainees: HashMap<Uuid, Trainee>,
    templates: HashMap<(Uuid, TemplateKind), CertificateTemplate>,
}

/// One in-memory store implementing all three repository traits; share a
/// single `Arc<InMemoryStore>` across the components under test.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert_course(&self, name: &str) -> Course {
        let course = Course {
            id: Uuid::new_v4(),
            name: name.to_string(),
            serial_padding: DEFAULT_SERIAL_PADDING,
        };
        self.inner
            .lock()
            .courses
            .insert(course.id, course.clone());
        course
    }

    pub fn insert_regular_schedule(
        &self,
        course_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Schedule {
        let schedule = Schedule {
            id: Uuid::new_v4(),
            course_id,
            schedule_type: ScheduleType::Regular,
            start_date: Some(start),
            end_date: Some(end),
        };
        self.inner
            .lock()
            .schedules
            .insert(schedule.id, schedule.clone());
        schedule
    }

    pub fn insert_staggered_schedule(&self, course_id: Uuid, dates: Vec<NaiveDate>) -> Schedule {
        let schedule = Schedule {
            id: Uuid::new_v4(),
            course_id,
            schedule_type: ScheduleType::Staggered,
            start_date: dates.first().copied(),
            end_date: dates.last().copied(),
        };
        let mut state = self.inner.lock();
        state.schedule_dates.insert(schedule.id, dates);
        state.schedules.insert(schedule.id, schedule.clone());
        schedule
    }

    pub fn insert_trainee(&self, trainee: Trainee) -> Trainee {
        self.inner
            .lock()
            .trainees
            .insert(trainee.id, trainee.clone());
        trainee
    }

    pub fn trainee(&self, id: Uuid) -> Option<Trainee> {
        self.inner.lock().trainees.get(&id).cloned()
    }

    pub fn insert_template(&self, template: CertificateTemplate) -> CertificateTemplate {
        self.inner
            .lock()
            .templates
            .insert((template.course_id, template.kind), template.clone());
        template
    }

    pub fn template(&self, course_id: Uuid, kind: TemplateKind) -> Option<CertificateTemplate> {
        self.inner.lock().templates.get(&(course_id, kind)).cloned()
    }
}

pub fn trainee_named(
    schedule_id: Uuid,
    first: &str,
    last: &str,
    serial: Option<&str>,
    email: Option<&str>,
) -> Trainee {
    Trainee {
        id: Uuid::new_v4(),
        schedule_id,
        first_name: first.to_string(),
        last_name: last.to_string(),
        middle_initial: None,
        email: email.map(str::to_string),
        photo_url: None,
        certificate_serial: serial.map(str::to_string),
        batch_number: Some("B-1".to_string()),
    }
}

pub fn template_for(course_id: Uuid, kind: TemplateKind) -> CertificateTemplate {
    CertificateTemplate {
        id: Uuid::new_v4(),
        course_id,
        kind,
        image_url: "http://storage.test/public/templates/bg.png".to_string(),
        fields: Vec::new(),
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl TemplateRepo for InMemoryStore {
    async fn find(
        &self,
        course_id: Uuid,
        kind: TemplateKind,
    ) -> Result<Option<CertificateTemplate>, RepoError> {
        Ok(self.inner.lock().templates.get(&(course_id, kind)).cloned())
    }

    async fn upsert(
        &self,
        course_id: Uuid,
        kind: TemplateKind,
        image_url: &str,
        fields: &[TemplateField],
    ) -> Result<CertificateTemplate, RepoError> {
        let template = CertificateTemplate {
            id: Uuid::new_v4(),
            course_id,
            kind,
            image_url: image_url.to_string(),
            fields: fields.to_vec(),
            updated_at: Utc::now(),
        };
        self.inner
            .lock()
            .templates
            .insert((course_id, kind), template.clone());
        Ok(template)
    }

    async fn delete(
        &self,
        course_id: Uuid,
        kind: TemplateKind,
    ) -> Result<Option<String>, RepoError> {
        Ok(self
            .inner
            .lock()
            .templates
            .remove(&(course_id, kind))
            .map(|t| t.image_url))
    }
}

#[async_trait]
impl TraineeRepo for InMemoryStore {
    async fn find(&self, id: Uuid) -> Result<Option<Trainee>, RepoError> {
        Ok(self.inner.lock().trainees.get(&id).cloned())
    }

    async fn serial_count(&self, course_id: Uuid) -> Result<u64, RepoError> {
        let state = self.inner.lock();
        let count = state
            .trainees
            .values()
            .filter(|t| t.certificate_serial.is_some())
            .filter(|t| {
                state
                    .schedules
                    .get(&t.schedule_id)
                    .map(|s| s.course_id == course_id)
                    .unwrap_or(false)
            })
            .count();
        Ok(count as u64)
    }

    async fn set_serial(&self, trainee_id: Uuid, serial: &str) -> Result<(), RepoError> {
        let mut state = self.inner.lock();
        if let Some(trainee) = state.trainees.get_mut(&trainee_id) {
            if trainee.certificate_serial.is_none() {
                trainee.certificate_serial = Some(serial.to_string());
            }
        }
        Ok(())
    }

    async fn deliverable_for_schedule(
        &self,
        schedule_id: Uuid,
    ) -> Result<Vec<Trainee>, RepoError> {
        let state = self.inner.lock();
        let mut trainees: Vec<Trainee> = state
            .trainees
            .values()
            .filter(|t| t.schedule_id == schedule_id && t.is_deliverable())
            .cloned()
            .collect();
        trainees.sort_by(|a, b| {
            (a.last_name.as_str(), a.first_name.as_str())
                .cmp(&(b.last_name.as_str(), b.first_name.as_str()))
        });
        Ok(trainees)
    }
}

#[async_trait]
impl ScheduleRepo for InMemoryStore {
    async fn find(&self, id: Uuid) -> Result<Option<Schedule>, RepoError> {
        Ok(self.inner.lock().schedules.get(&id).cloned())
    }

    async fn find_course(&self, course_id: Uuid) -> Result<Option<Course>, RepoError> {
        Ok(self.inner.lock().courses.get(&course_id).cloned())
    }

    async fn staggered_dates(&self, schedule_id: Uuid) -> Result<Vec<NaiveDate>, RepoError> {
        let mut dates = self
            .inner
            .lock()
            .schedule_dates
            .get(&schedule_id)
            .cloned()
            .unwrap_or_default();
        dates.sort();
        Ok(dates)
    }
}

/// In-memory object storage recording uploads and deletions.
#[derive(Default)]
pub struct MockObjectStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockObjectStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn has_file(&self, filename: &str) -> bool {
        self.files.lock().contains_key(filename)
    }

    pub fn seed_file(&self, filename: &str, bytes: &[u8]) {
        self.files.lock().insert(filename.to_string(), bytes.to_vec());
    }
}

#[async_trait]
impl ObjectStorage for MockObjectStorage {
    async fn upload_file(&self, filename: &str, file_data: &[u8]) -> Result<(), String> {
        self.files
            .lock()
            .insert(filename.to_string(), file_data.to_vec());
        Ok(())
    }

    async fn delete_file(&self, filename: &str) -> Result<(), String> {
        self.files.lock().remove(filename);
        Ok(())
    }

    fn get_asset_url(&self, filename: &str) -> String {
        format!("http://storage.test/public/{}", filename)
    }

    fn object_name_from_url(&self, url: &str) -> Option<String> {
        url.strip_prefix("http://storage.test/public/")
            .map(str::to_string)
    }
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub attachment_names: Vec<String>,
}

/// Mailer that records every send; recipients registered via
/// [`RecordingMailer::fail_for`] get an SMTP error instead.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, recipient: &str) {
        self.failing.lock().insert(recipient.to_string());
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        _html_body: &str,
        attachments: Vec<EmailAttachment>,
    ) -> Result<(), MailError> {
        if self.failing.lock().contains(to) {
            return Err(MailError::Smtp("connection refused".to_string()));
        }
        self.sent.lock().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            attachment_names: attachments.into_iter().map(|a| a.filename).collect(),
        });
        Ok(())
    }
}

/// Renderer producing a tiny fixed payload; trainees registered via
/// [`StubRenderer::fail_for`] get a render error instead.
#[derive(Default)]
pub struct StubRenderer {
    failing: Mutex<HashSet<Uuid>>,
}

impl StubRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, trainee_id: Uuid) {
        self.failing.lock().insert(trainee_id);
    }
}

#[async_trait]
impl CertificateRender for StubRenderer {
    async fn render(
        &self,
        template: &CertificateTemplate,
        trainee: &Trainee,
        _ctx: &RenderContext,
    ) -> Result<RenderedCertificate, RenderError> {
        if self.failing.lock().contains(&trainee.id) {
            return Err(RenderError::TemplateImage(
                "template image unreadable: stub".to_string(),
            ));
        }
        let serial = trainee.certificate_serial.as_deref().unwrap_or("UNSET");
        Ok(RenderedCertificate {
            bytes: b"%PDF-1.4 stub".to_vec(),
            filename: suggested_filename(
                template.kind,
                serial,
                &trainee.last_name,
                &trainee.first_name,
            ),
            content_type: PDF_CONTENT_TYPE,
        })
    }
}
