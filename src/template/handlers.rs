use actix_multipart::Multipart;
use actix_web::{
    web::{self, Json, Query},
    HttpResponse, Responder,
};
use futures::TryStreamExt;
use log::{debug, error, info, warn};
use sanitize_filename::sanitize;
use serde::{Deserialize, Serialize};
use std::path::Path as StdPath;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::AppState;
use crate::template::models::{CertificateTemplate, TemplateField, TemplateKind};
use crate::ErrorBody;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateQuery {
    pub course_id: Uuid,
    pub template_type: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertTemplateRequest {
    pub course_id: Uuid,
    pub template_type: String,
    pub image_url: String,
    pub fields: Vec<TemplateField>,
}

/// GET and POST both answer with this; `template` is `null` when the course
/// has no template of the requested kind.
#[derive(Serialize, ToSchema)]
pub struct TemplateEnvelope {
    pub template: Option<CertificateTemplate>,
}

/// Public URL of a freshly stored template background, ready to be sent back
/// as an upsert's `imageUrl`.
#[derive(Serialize, ToSchema)]
pub struct TemplateImageResponse {
    pub url: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UploadTemplateImageRequest {
    #[allow(unused)]
    pub image: Vec<u8>,
}

fn parse_kind(raw: &str) -> Result<TemplateKind, HttpResponse> {
    TemplateKind::parse(raw).ok_or_else(|| {
        HttpResponse::BadRequest().json(ErrorBody::new(&format!(
            "unknown templateType '{}'",
            raw
        )))
    })
}

#[utoipa::path(
    context_path = "/api",
    tag = "Certificate Templates",
    get,
    path = "/certificates/template",
    params(
        ("courseId" = Uuid, Query, description = "Course the template belongs to"),
        ("templateType" = String, Query, description = "participation | completion | excellence")
    ),
    responses(
        (status = 200, description = "Template, or null if none is stored", body = TemplateEnvelope),
        (status = 400, description = "Unknown template type", body = ErrorBody),
        (status = 500, description = "Internal Server Error", body = ErrorBody)
    )
)]
pub async fn get_template(query: Query<TemplateQuery>, data: web::Data<AppState>) -> impl Responder {
    let query = query.into_inner();
    let kind = match parse_kind(&query.template_type) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };

    debug!(
        "Fetching template for course {} kind {}",
        query.course_id,
        kind.as_str()
    );
    match data.cached_template(query.course_id, kind).await {
        Ok(template) => HttpResponse::Ok().json(TemplateEnvelope { template }),
        Err(e) => {
            error!("Failed to fetch template: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorBody::with_details("Failed to fetch template", &e.to_string()))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Certificate Templates",
    post,
    path = "/certificates/template",
    request_body = UpsertTemplateRequest,
    responses(
        (status = 200, description = "Template stored", body = TemplateEnvelope),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 500, description = "Internal Server Error", body = ErrorBody)
    )
)]
pub async fn upsert_template(
    body: Json<UpsertTemplateRequest>,
    data: web::Data<AppState>,
) -> impl Responder {
    let body = body.into_inner();
    let kind = match parse_kind(&body.template_type) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };
    if body.image_url.trim().is_empty() {
        return HttpResponse::BadRequest().json(ErrorBody::new("imageUrl must not be empty"));
    }

    // Remember the previous background so its object can be removed once the
    // row points at the new one.
    let previous_image = match data.templates.find(body.course_id, kind).await {
        Ok(existing) => existing.map(|t| t.image_url),
        Err(e) => {
            error!("Failed to look up existing template: {}", e);
            return HttpResponse::InternalServerError()
                .json(ErrorBody::with_details("Failed to store template", &e.to_string()));
        }
    };

    let stored = match data
        .templates
        .upsert(body.course_id, kind, &body.image_url, &body.fields)
        .await
    {
        Ok(stored) => stored,
        Err(e) => {
            error!("Failed to upsert template: {}", e);
            return HttpResponse::InternalServerError()
                .json(ErrorBody::with_details("Failed to store template", &e.to_string()));
        }
    };
    data.invalidate_template(body.course_id, kind).await;

    if let Some(old_url) = previous_image {
        if old_url != stored.image_url {
            remove_stored_image(&data, &old_url).await;
        }
    }

    info!(
        "Stored {} template for course {}",
        kind.as_str(),
        body.course_id
    );
    HttpResponse::Ok().json(TemplateEnvelope {
        template: Some(stored),
    })
}

#[utoipa::path(
    context_path = "/api",
    tag = "Certificate Templates",
    delete,
    path = "/certificates/template",
    params(
        ("courseId" = Uuid, Query, description = "Course the template belongs to"),
        ("templateType" = String, Query, description = "participation | completion | excellence")
    ),
    responses(
        (status = 200, description = "Deleted, or nothing to delete"),
        (status = 400, description = "Unknown template type", body = ErrorBody),
        (status = 500, description = "Internal Server Error", body = ErrorBody)
    )
)]
pub async fn delete_template(
    query: Query<TemplateQuery>,
    data: web::Data<AppState>,
) -> impl Responder {
    let query = query.into_inner();
    let kind = match parse_kind(&query.template_type) {
        Ok(kind) => kind,
        Err(resp) => return resp,
    };

    match data.templates.delete(query.course_id, kind).await {
        Ok(deleted_image) => {
            data.invalidate_template(query.course_id, kind).await;
            if let Some(image_url) = deleted_image {
                remove_stored_image(&data, &image_url).await;
                info!(
                    "Deleted {} template for course {}",
                    kind.as_str(),
                    query.course_id
                );
            } else {
                debug!(
                    "No {} template to delete for course {}",
                    kind.as_str(),
                    query.course_id
                );
            }
            HttpResponse::Ok().json(serde_json::json!({ "success": true }))
        }
        Err(e) => {
            error!("Failed to delete template: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorBody::with_details("Failed to delete template", &e.to_string()))
        }
    }
}

/// Background-image removal is best effort: an orphaned object in the bucket
/// is preferable to failing the row operation that already happened.
async fn remove_stored_image(data: &web::Data<AppState>, image_url: &str) {
    let Some(object_name) = data.storage.object_name_from_url(image_url) else {
        warn!("Template image URL not in managed storage: {}", image_url);
        return;
    };
    if let Err(e) = data.storage.delete_file(&object_name).await {
        warn!("Failed to delete template image '{}': {}", object_name, e);
    }
}

async fn read_image_field(mut payload: Multipart) -> Result<(String, Vec<u8>), String> {
    while let Some(mut field) = payload.try_next().await.map_err(|e| e.to_string())? {
        let Some(content_disposition) = field.content_disposition() else {
            continue;
        };
        if content_disposition.get_name() != Some("image") {
            continue;
        }
        let file_name = content_disposition
            .get_filename()
            .ok_or_else(|| "No filename".to_string())?;
        let sanitized = sanitize(file_name);

        let ext = StdPath::new(&sanitized)
            .extension()
            .and_then(std::ffi::OsStr::to_str)
            .unwrap_or("png");
        let unique_name = format!("templates/{}.{}", Uuid::new_v4(), ext);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| e.to_string())? {
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            return Err("Uploaded image is empty".to_string());
        }
        return Ok((unique_name, bytes));
    }
    Err("No 'image' field in multipart payload".to_string())
}

#[utoipa::path(
    context_path = "/api",
    tag = "Certificate Templates",
    post,
    path = "/certificates/template/image",
    request_body(content = inline(UploadTemplateImageRequest), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Image stored", body = TemplateImageResponse),
        (status = 400, description = "Invalid upload", body = ErrorBody),
        (status = 500, description = "Internal Server Error", body = ErrorBody)
    )
)]
pub async fn upload_template_image(payload: Multipart, data: web::Data<AppState>) -> impl Responder {
    let (object_name, bytes) = match read_image_field(payload).await {
        Ok(parts) => parts,
        Err(e) => {
            error!("Template image upload rejected: {}", e);
            return HttpResponse::BadRequest().json(ErrorBody::new(&e));
        }
    };

    match data.storage.upload_file(&object_name, &bytes).await {
        Ok(()) => {
            let url = data.storage.get_asset_url(&object_name);
            info!("Stored template background '{}'", object_name);
            HttpResponse::Created().json(TemplateImageResponse { url })
        }
        Err(e) => {
            error!("Failed to upload template image: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorBody::with_details("Failed to store template image", &e))
        }
    }
}
