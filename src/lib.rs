use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod certificate;
pub mod db;
pub mod mailer;
pub mod models;
pub mod repo;
pub mod storage;
pub mod template;

pub use crate::db::AppState;

/// Wire shape for every error response: `{"success": false, "error": ...}`
/// with an optional `details` string.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(error: &str) -> Self {
        Self {
            success: false,
            error: error.to_string(),
            details: None,
        }
    }

    pub fn with_details(error: &str, details: &str) -> Self {
        Self {
            success: false,
            error: error.to_string(),
            details: Some(details.to_string()),
        }
    }
}

pub async fn run() -> std::io::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    #[derive(OpenApi)]
    #[openapi(
        paths(
            crate::template::handlers::get_template,
            crate::template::handlers::upsert_template,
            crate::template::handlers::delete_template,
            crate::template::handlers::upload_template_image,
            crate::certificate::handlers::render_certificate,
            crate::certificate::handlers::batch_send
        ),
        components(
            schemas(
                template::models::CertificateTemplate,
                template::models::TemplateField,
                template::models::TemplateKind,
                template::models::FontWeight,
                template::models::FontStyle,
                template::models::FontFamily,
                template::models::Align,
                template::handlers::TemplateEnvelope,
                template::handlers::UpsertTemplateRequest,
                template::handlers::TemplateImageResponse,
                template::handlers::UploadTemplateImageRequest,
                certificate::handlers::RenderRequest,
                certificate::handlers::RenderTraineeInput,
                certificate::handlers::BatchSendRequest,
                certificate::IssueEvent,
                ErrorBody,
            )
        ),
        tags(
            (name = "Certificate Templates", description = "Certificate template persistence endpoints."),
            (name = "Certificates", description = "Certificate rendering and batch issuance endpoints.")
        ),
        servers(
            (url = "http://127.0.0.1:8080", description = "Localhost server")
        )
    )]
    struct ApiDoc;

    dotenvy::dotenv().ok();
    let app_state = match AppState::new().await {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            log::error!(
                "Failed to initialize application state. Check DATABASE_URL, SUPABASE_* and SMTP_* in .env. Error: {}",
                e
            );
            std::process::exit(1);
        }
    };

    let prometheus = PrometheusMetricsBuilder::new("psi_training_server")
        .endpoint("/metrics")
        .build()
        .expect("Failed to create Prometheus metrics middleware");

    log::info!("Starting server at http://0.0.0.0:8080");

    HttpServer::new(move || {
        let app_state = app_state.clone();
        let prometheus = prometheus.clone();
        let cors = Cors::default()
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://localhost:8080")
            .allowed_origin("http://127.0.0.1:8080")
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .app_data(app_state)
            .service(
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
                    ),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .backlog(8192)
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}
