//! Document renderer: template + trainee -> finished PDF bytes.
//!
//! The pipeline rasterizes onto an RGBA canvas (background image, optional
//! photo, positioned text fields), JPEG-encodes the canvas and embeds it as a
//! full-page image XObject in a single-page PDF with document metadata.

use async_trait::async_trait;
use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use rusttype::{point, Font, Scale};
use std::sync::Arc;
use thiserror::Error;

use super::fonts::{select_face, FontCatalog};
use super::layout::{
    self, proportional_photo_rect, PhotoRect, ID_CARD_CANVAS, ID_CARD_PHOTO_RECT,
};
use super::placeholders::{self, PlaceholderContext, TRAINING_PROVIDER};
use crate::models::Trainee;
use crate::template::models::{CertificateTemplate, TemplateKind};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
const JPEG_QUALITY: u8 = 90;

#[derive(Debug, Error)]
pub enum RenderError {
    /// The template's background could not be fetched or decoded. Aborts this
    /// single render; the caller decides batch impact.
    #[error("template image unreadable: {0}")]
    TemplateImage(String),
    #[error("canvas encoding failed: {0}")]
    Encode(String),
    #[error("document assembly failed: {0}")]
    Pdf(String),
}

/// Per-render inputs that do not live on the template or the trainee row.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub course_name: String,
    pub course_title: Option<String>,
    /// Precomputed "held on" date string for the schedule.
    pub held_on: String,
}

#[derive(Debug, Clone)]
pub struct RenderedCertificate {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: &'static str,
}

#[async_trait]
pub trait CertificateRender: Send + Sync {
    async fn render(
        &self,
        template: &CertificateTemplate,
        trainee: &Trainee,
        ctx: &RenderContext,
    ) -> Result<RenderedCertificate, RenderError>;
}

/// `<Kind>_<serial>_<lastName>_<firstName>.pdf`
pub fn suggested_filename(
    kind: TemplateKind,
    serial: &str,
    last_name: &str,
    first_name: &str,
) -> String {
    sanitize_filename::sanitize(format!(
        "{}_{}_{}_{}.pdf",
        kind.display_name(),
        serial,
        last_name,
        first_name
    ))
}

pub struct PdfRenderer {
    http: reqwest::Client,
    fonts: Arc<FontCatalog>,
}

impl PdfRenderer {
    pub fn new(http: reqwest::Client, fonts: Arc<FontCatalog>) -> Self {
        Self { http, fonts }
    }

    async fn fetch_image(&self, url: &str) -> Result<DynamicImage, String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| format!("fetch {}: {}", url, e))?;
        if !response.status().is_success() {
            return Err(format!("fetch {}: HTTP {}", url, response.status()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| format!("read {}: {}", url, e))?;
        image::load_from_memory(&bytes).map_err(|e| format!("decode {}: {}", url, e))
    }

    fn draw_photo(&self, canvas: &mut RgbaImage, photo: &DynamicImage, rect: PhotoRect) {
        let scaled = imageops::resize(
            &photo.to_rgba8(),
            rect.width,
            rect.height,
            FilterType::Triangle,
        );
        imageops::overlay(canvas, &scaled, rect.x as i64, rect.y as i64);
    }

    fn draw_line(
        &self,
        canvas: &mut RgbaImage,
        font: &Font<'static>,
        scale: Scale,
        origin_x: f32,
        baseline_y: f32,
        color: (u8, u8, u8),
        text: &str,
    ) {
        let (width, height) = (canvas.width() as i32, canvas.height() as i32);
        for glyph in font.layout(text, scale, point(origin_x, baseline_y)) {
            if let Some(bb) = glyph.pixel_bounding_box() {
                glyph.draw(|gx, gy, coverage| {
                    let px = bb.min.x + gx as i32;
                    let py = bb.min.y + gy as i32;
                    if px >= 0 && px < width && py >= 0 && py < height {
                        let pixel = canvas.get_pixel_mut(px as u32, py as u32);
                        for (channel, target) in [color.0, color.1, color.2].into_iter().enumerate()
                        {
                            let blended = target as f32 * coverage
                                + pixel[channel] as f32 * (1.0 - coverage);
                            pixel[channel] = blended.round() as u8;
                        }
                    }
                });
            }
        }
    }

    fn assemble_pdf(
        &self,
        jpeg: Vec<u8>,
        width: u32,
        height: u32,
        title: &str,
        subject: &str,
    ) -> Result<Vec<u8>, RenderError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        ));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        (width as f32).into(),
                        0.into(),
                        0.into(),
                        (height as f32).into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| RenderError::Pdf(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), (width as f32).into(), (height as f32).into()],
            "Contents" => content_id,
            "Resources" => dictionary! { "XObject" => dictionary! { "Im0" => image_id } },
        });

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);

        let creation_date = format!("D:{}", Utc::now().format("%Y%m%d%H%M%SZ"));
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
            "Author" => Object::string_literal(TRAINING_PROVIDER),
            "Subject" => Object::string_literal(subject),
            "Creator" => Object::string_literal(env!("CARGO_PKG_NAME")),
            "Producer" => Object::string_literal(env!("CARGO_PKG_NAME")),
            "CreationDate" => Object::string_literal(creation_date),
        });
        doc.trailer.set("Info", info_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| RenderError::Pdf(e.to_string()))?;
        Ok(bytes)
    }
}

#[async_trait]
impl CertificateRender for PdfRenderer {
    async fn render(
        &self,
        template: &CertificateTemplate,
        trainee: &Trainee,
        ctx: &RenderContext,
    ) -> Result<RenderedCertificate, RenderError> {
        let background = self
            .fetch_image(&template.image_url)
            .await
            .map_err(RenderError::TemplateImage)?;

        // ID-card kind renders on a fixed logical canvas; everything else
        // uses the background's native pixel dimensions.
        let (canvas_w, canvas_h) = match template.kind {
            TemplateKind::Excellence => ID_CARD_CANVAS,
            _ => (background.width(), background.height()),
        };
        let mut canvas: RgbaImage =
            imageops::resize(&background.to_rgba8(), canvas_w, canvas_h, FilterType::Triangle);

        if let Some(photo_url) = &trainee.photo_url {
            match self.fetch_image(photo_url).await {
                Ok(photo) => {
                    let rect = match template.kind {
                        TemplateKind::Excellence => ID_CARD_PHOTO_RECT,
                        _ => proportional_photo_rect(canvas_w, canvas_h),
                    };
                    self.draw_photo(&mut canvas, &photo, rect);
                }
                Err(e) => {
                    log::warn!("skipping photo for trainee {}: {}", trainee.id, e);
                }
            }
        }

        let serial = trainee.certificate_serial.clone().unwrap_or_default();
        let placeholder_ctx = PlaceholderContext {
            trainee_name: placeholders::format_trainee_name(
                &trainee.first_name,
                trainee.middle_initial.as_deref(),
                &trainee.last_name,
            ),
            course_name: ctx.course_name.clone(),
            course_title: ctx.course_title.clone(),
            certificate_number: serial.clone(),
            batch_number: trainee.batch_number.clone().unwrap_or_default(),
            held_on: ctx.held_on.clone(),
        };

        for field in &template.fields {
            let (anchor_x, anchor_y, size_px) = layout::resolve_field(field, canvas_w, canvas_h);
            let face = select_face(field.font_family, field.font_weight, field.font_style);
            let font = self.fonts.font(face);
            let scale = Scale::uniform(size_px);
            let color = field.rgb();
            let text = placeholders::substitute(&field.value, &placeholder_ctx);

            let mut baseline_y = anchor_y;
            for line in text.split('\n') {
                let line_width = self.fonts.measure(face, line, size_px);
                let origin_x = layout::line_origin_x(field.align, anchor_x, line_width);
                self.draw_line(&mut canvas, font, scale, origin_x, baseline_y, color, line);
                baseline_y += layout::line_advance(field, size_px);
            }
        }

        let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
            .encode(rgb.as_raw(), canvas_w, canvas_h, ExtendedColorType::Rgb8)
            .map_err(|e| RenderError::Encode(e.to_string()))?;

        let title = format!("{} Certificate - {}", template.kind.display_name(), serial);
        let bytes = self.assemble_pdf(jpeg, canvas_w, canvas_h, &title, &ctx.course_name)?;

        Ok(RenderedCertificate {
            bytes,
            filename: suggested_filename(
                template.kind,
                &serial,
                &trainee.last_name,
                &trainee.first_name,
            ),
            content_type: PDF_CONTENT_TYPE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggested_filename_shape() {
        assert_eq!(
            suggested_filename(
                TemplateKind::Completion,
                "PSI-FORKLIFTOP-000012",
                "Dela Cruz",
                "Juan"
            ),
            "Completion_PSI-FORKLIFTOP-000012_Dela Cruz_Juan.pdf"
        );
    }

    #[test]
    fn suggested_filename_strips_path_separators() {
        let name = suggested_filename(TemplateKind::Excellence, "PSI-X-000001", "a/b", "Juan");
        assert!(!name.contains('/'));
    }
}
