//! Batch issuance orchestrator.
//!
//! Resolves a roster once, then walks it strictly sequentially: confirm
//! serial, render, dispatch. It emits one typed progress event per trainee
//! into an abstract sink and exactly one terminal event. A trainee's failure
//! is an explicit `Err` branch, counted and reported, never fatal for the
//! rest of the batch.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::placeholders::TRAINING_PROVIDER;
use super::renderer::{CertificateRender, RenderContext, PDF_CONTENT_TYPE};
use super::roster::{Roster, RosterError, RosterProvider};
use super::serial::SerialAllocator;
use crate::mailer::{EmailAttachment, Mailer};
use crate::models::Trainee;
use crate::repo::TemplateRepo;
use crate::template::models::TemplateKind;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IssueEvent {
    #[serde(rename_all = "camelCase")]
    Progress {
        current: usize,
        total: usize,
        success_count: usize,
        fail_count: usize,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_sent: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Complete {
        success_count: usize,
        fail_count: usize,
        total: usize,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Roster(#[from] RosterError),
}

/// Output of the `Initializing` phase. Roster resolution failures surface
/// before any event is emitted; holding this means the stream may open.
#[derive(Debug)]
pub struct PreparedBatch {
    pub roster: Roster,
    pub kind: TemplateKind,
}

struct SentCertificate {
    trainee_name: String,
}

struct TraineeFailure {
    trainee_name: String,
    reason: String,
}

pub struct BatchIssuer {
    roster: RosterProvider,
    allocator: SerialAllocator,
    templates: Arc<dyn TemplateRepo>,
    renderer: Arc<dyn CertificateRender>,
    mailer: Arc<dyn Mailer>,
}

impl BatchIssuer {
    pub fn new(
        roster: RosterProvider,
        allocator: SerialAllocator,
        templates: Arc<dyn TemplateRepo>,
        renderer: Arc<dyn CertificateRender>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            roster,
            allocator,
            templates,
            renderer,
            mailer,
        }
    }

    /// Resolve the roster. Schedule or course lookups that miss are fatal
    /// here; no events are ever emitted for a batch that failed to prepare.
    pub async fn prepare(
        &self,
        schedule_id: Uuid,
        kind: TemplateKind,
    ) -> Result<PreparedBatch, BatchError> {
        let roster = self.roster.resolve(schedule_id).await?;
        Ok(PreparedBatch { roster, kind })
    }

    /// Walk the prepared roster sequentially, sending events into `tx`.
    /// A dropped receiver does not stop the batch (no cancellation channel;
    /// known limitation).
    pub async fn stream(&self, prepared: PreparedBatch, tx: mpsc::Sender<IssueEvent>) {
        let PreparedBatch { roster, kind } = prepared;
        let total = roster.trainees.len();
        let mut success_count = 0;
        let mut fail_count = 0;

        Self::emit(
            &tx,
            IssueEvent::Progress {
                current: 0,
                total,
                success_count,
                fail_count,
                message: format!("Starting certificate batch for {} trainees", total),
                last_sent: None,
                last_error: None,
            },
        )
        .await;

        for (index, trainee) in roster.trainees.iter().enumerate() {
            let (message, last_sent, last_error) =
                match self.process_one(&roster, kind, trainee).await {
                    Ok(sent) => {
                        success_count += 1;
                        let message = format!("Sent certificate to {}", sent.trainee_name);
                        (message, Some(sent.trainee_name), None)
                    }
                    Err(failure) => {
                        fail_count += 1;
                        log::warn!(
                            "certificate delivery failed for {}: {}",
                            failure.trainee_name,
                            failure.reason
                        );
                        let message =
                            format!("Failed to send certificate to {}", failure.trainee_name);
                        (message, None, Some(failure.reason))
                    }
                };

            Self::emit(
                &tx,
                IssueEvent::Progress {
                    current: index + 1,
                    total,
                    success_count,
                    fail_count,
                    message,
                    last_sent,
                    last_error,
                },
            )
            .await;
        }

        Self::emit(
            &tx,
            IssueEvent::Complete {
                success_count,
                fail_count,
                total,
                message: format!(
                    "Batch complete: {} sent, {} failed",
                    success_count, fail_count
                ),
            },
        )
        .await;
    }

    async fn emit(tx: &mpsc::Sender<IssueEvent>, event: IssueEvent) {
        if tx.send(event).await.is_err() {
            log::debug!("batch progress consumer disconnected; continuing");
        }
    }

    async fn process_one(
        &self,
        roster: &Roster,
        kind: TemplateKind,
        trainee: &Trainee,
    ) -> Result<SentCertificate, TraineeFailure> {
        let trainee_name = super::placeholders::format_trainee_name(
            &trainee.first_name,
            trainee.middle_initial.as_deref(),
            &trainee.last_name,
        );
        let fail = |reason: String| TraineeFailure {
            trainee_name: trainee_name.clone(),
            reason,
        };

        // Roster filtering guarantees a serial exists; allocate_one just
        // confirms and returns the stored value.
        self.allocator
            .allocate_one(&roster.course, trainee.id)
            .await
            .map_err(|e| fail(format!("serial allocation failed: {}", e)))?;

        let template = self
            .templates
            .find(roster.course.id, kind)
            .await
            .map_err(|e| fail(format!("template lookup failed: {}", e)))?
            .ok_or_else(|| {
                fail(format!(
                    "no {} template configured for this course",
                    kind.as_str()
                ))
            })?;

        let ctx = RenderContext {
            course_name: roster.course.name.clone(),
            course_title: None,
            held_on: roster.held_on.clone(),
        };
        let rendered = self
            .renderer
            .render(&template, trainee, &ctx)
            .await
            .map_err(|e| fail(format!("render failed: {}", e)))?;

        if rendered.content_type != PDF_CONTENT_TYPE {
            return Err(fail(format!(
                "unexpected render content type: {}",
                rendered.content_type
            )));
        }

        let email = trainee
            .email
            .as_deref()
            .ok_or_else(|| fail("trainee has no email".to_string()))?;
        let subject = format!(
            "{} Certificate - {}",
            kind.display_name(),
            roster.course.name
        );
        let body = format!(
            "<p>Dear {},</p>\
             <p>Attached is your Certificate of {} for <strong>{}</strong>.</p>\
             <p>{}</p>",
            trainee_name,
            kind.display_name(),
            roster.course.name,
            TRAINING_PROVIDER
        );
        let attachment = EmailAttachment {
            filename: rendered.filename,
            content_type: rendered.content_type.to_string(),
            bytes: rendered.bytes,
        };

        self.mailer
            .send(email, &subject, &body, vec![attachment])
            .await
            .map_err(|e| fail(format!("email dispatch failed: {}", e)))?;

        Ok(SentCertificate { trainee_name })
    }
}
