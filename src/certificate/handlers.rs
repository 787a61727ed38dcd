use actix_web::{
    web::{self, Json},
    HttpResponse, Responder,
};
use futures::StreamExt;
use log::{error, info};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::certificate::batch::BatchError;
use crate::certificate::renderer::RenderContext;
use crate::certificate::roster::RosterError;
use crate::db::AppState;
use crate::models::Trainee;
use crate::template::models::TemplateKind;
use crate::ErrorBody;

#[derive(Deserialize, ToSchema)]
pub struct RenderTraineeInput {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub middle_initial: Option<String>,
    #[serde(default)]
    pub certificate_number: String,
    pub batch_number: Option<String>,
    pub picture_2x2_url: Option<String>,
    pub schedule_id: Option<Uuid>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    pub trainee: RenderTraineeInput,
    #[serde(default)]
    pub course_name: String,
    pub course_title: Option<String>,
    pub course_id: Uuid,
    #[serde(default)]
    pub template_type: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchSendRequest {
    pub schedule_id: Uuid,
    /// Defaults to `completion` when absent.
    pub template_type: Option<String>,
}

fn missing_fields(body: &RenderRequest) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if body.trainee.first_name.trim().is_empty() {
        missing.push("trainee.first_name");
    }
    if body.trainee.last_name.trim().is_empty() {
        missing.push("trainee.last_name");
    }
    if body.trainee.certificate_number.trim().is_empty() {
        missing.push("trainee.certificate_number");
    }
    if body.course_name.trim().is_empty() {
        missing.push("courseName");
    }
    if body.template_type.trim().is_empty() {
        missing.push("templateType");
    }
    missing
}

#[utoipa::path(
    context_path = "/api",
    tag = "Certificates",
    post,
    path = "/certificates/render",
    request_body = RenderRequest,
    responses(
        (status = 200, description = "Rendered certificate", content_type = "application/pdf"),
        (status = 400, description = "Missing required input", body = ErrorBody),
        (status = 404, description = "No template for this course and type", body = ErrorBody),
        (status = 500, description = "Internal Server Error", body = ErrorBody)
    )
)]
pub async fn render_certificate(
    body: Json<RenderRequest>,
    data: web::Data<AppState>,
) -> impl Responder {
    let body = body.into_inner();

    let missing = missing_fields(&body);
    if !missing.is_empty() {
        return HttpResponse::BadRequest().json(ErrorBody::with_details(
            "Missing required fields",
            &missing.join(", "),
        ));
    }
    let Some(kind) = TemplateKind::parse(&body.template_type) else {
        return HttpResponse::BadRequest().json(ErrorBody::new(&format!(
            "unknown templateType '{}'",
            body.template_type
        )));
    };

    let template = match data.cached_template(body.course_id, kind).await {
        Ok(Some(template)) => template,
        Ok(None) => {
            return HttpResponse::NotFound().json(ErrorBody::new(
                "No template stored for this course and type",
            ));
        }
        Err(e) => {
            error!("Template lookup failed: {}", e);
            return HttpResponse::InternalServerError()
                .json(ErrorBody::with_details("Failed to fetch template", &e.to_string()));
        }
    };

    // A schedule that cannot be resolved leaves the date string blank rather
    // than failing the render.
    let held_on = match body.trainee.schedule_id {
        Some(schedule_id) => match data.roster_provider().held_on(schedule_id).await {
            Ok(Some(held_on)) => held_on,
            Ok(None) => String::new(),
            Err(e) => {
                error!("Schedule lookup failed: {}", e);
                return HttpResponse::InternalServerError()
                    .json(ErrorBody::with_details("Failed to resolve schedule", &e.to_string()));
            }
        },
        None => String::new(),
    };

    let trainee = Trainee {
        id: Uuid::new_v4(),
        schedule_id: body.trainee.schedule_id.unwrap_or_else(Uuid::nil),
        first_name: body.trainee.first_name,
        last_name: body.trainee.last_name,
        middle_initial: body.trainee.middle_initial,
        email: None,
        photo_url: body.trainee.picture_2x2_url,
        certificate_serial: Some(body.trainee.certificate_number),
        batch_number: body.trainee.batch_number,
    };
    let ctx = RenderContext {
        course_name: body.course_name,
        course_title: body.course_title,
        held_on,
    };

    match data.renderer.render(&template, &trainee, &ctx).await {
        Ok(rendered) => {
            info!(
                "Rendered {} certificate '{}'",
                kind.as_str(),
                rendered.filename
            );
            HttpResponse::Ok()
                .content_type(rendered.content_type)
                .insert_header((
                    "Content-Disposition",
                    format!("attachment; filename=\"{}\"", rendered.filename),
                ))
                .body(rendered.bytes)
        }
        Err(e) => {
            error!("Certificate render failed: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorBody::with_details("Failed to render certificate", &e.to_string()))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Certificates",
    post,
    path = "/certificates/batch-send",
    request_body = BatchSendRequest,
    responses(
        (status = 200, description = "SSE stream of progress events", content_type = "text/event-stream"),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 404, description = "Schedule or course not found", body = ErrorBody),
        (status = 500, description = "Internal Server Error", body = ErrorBody)
    )
)]
pub async fn batch_send(body: Json<BatchSendRequest>, data: web::Data<AppState>) -> impl Responder {
    let body = body.into_inner();
    let kind = match body.template_type.as_deref() {
        None => TemplateKind::Completion,
        Some(raw) => match TemplateKind::parse(raw) {
            Some(kind) => kind,
            None => {
                return HttpResponse::BadRequest()
                    .json(ErrorBody::new(&format!("unknown templateType '{}'", raw)));
            }
        },
    };

    let issuer = data.batch_issuer();
    let prepared = match issuer.prepare(body.schedule_id, kind).await {
        Ok(prepared) => prepared,
        Err(BatchError::Roster(RosterError::ScheduleNotFound)) => {
            return HttpResponse::NotFound().json(ErrorBody::new("Schedule not found"));
        }
        Err(BatchError::Roster(RosterError::CourseNotFound)) => {
            return HttpResponse::NotFound().json(ErrorBody::new("Course not found"));
        }
        Err(BatchError::Roster(RosterError::Repo(e))) => {
            error!("Failed to resolve roster: {}", e);
            return HttpResponse::InternalServerError()
                .json(ErrorBody::with_details("Failed to resolve roster", &e.to_string()));
        }
    };

    info!(
        "Starting {} certificate batch for schedule {} ({} trainees)",
        kind.as_str(),
        body.schedule_id,
        prepared.roster.trainees.len()
    );

    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        issuer.stream(prepared, tx).await;
    });

    let event_stream = ReceiverStream::new(rx).map(|event| {
        let json = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Ok::<_, std::io::Error>(web::Bytes::from(format!("data: {}\n\n", json)))
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("Connection", "keep-alive"))
        .streaming(event_stream)
}
