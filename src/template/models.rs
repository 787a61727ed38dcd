//! Certificate template model and the wire-level field schema.
//!
//! A template is a declarative layout: one background image plus an ordered
//! list of positioned, styled text fields. Positions and sizes are stored as
//! fractions of the canvas so a template is resolution independent; absolute
//! pixels are derived only at render time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Which certificate a template produces. At most one template exists per
/// (course, kind) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Participation,
    Completion,
    /// The ID-card variant, rendered on a fixed 1350x850 canvas.
    Excellence,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Participation => "participation",
            TemplateKind::Completion => "completion",
            TemplateKind::Excellence => "excellence",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "participation" => Some(TemplateKind::Participation),
            "completion" => Some(TemplateKind::Completion),
            "excellence" => Some(TemplateKind::Excellence),
            _ => None,
        }
    }

    /// Capitalized form used in suggested filenames and email subjects.
    pub fn display_name(&self) -> &'static str {
        match self {
            TemplateKind::Participation => "Participation",
            TemplateKind::Completion => "Completion",
            TemplateKind::Excellence => "Excellence",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
    Extrabold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// Closed set of families a template may ask for. Only Poppins ships with a
/// full face matrix; the others resolve to the regular fallback face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FontFamily {
    #[default]
    Poppins,
    Montserrat,
    Arial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

pub const DEFAULT_LINE_HEIGHT: f32 = 1.2;

fn default_color() -> String {
    "#000000".to_string()
}

/// One positioned text field. `x`/`y` are fractions of canvas width/height,
/// `font_size` a fraction of canvas height. `value` may contain placeholder
/// tokens and literal newlines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateField {
    pub id: String,
    pub label: String,
    pub value: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    #[serde(default)]
    pub font_weight: FontWeight,
    #[serde(default)]
    pub font_style: FontStyle,
    #[serde(default)]
    pub font_family: FontFamily,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub align: Align,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_height: Option<f32>,
}

impl TemplateField {
    pub fn line_height(&self) -> f32 {
        self.line_height.unwrap_or(DEFAULT_LINE_HEIGHT)
    }

    /// Parse the `#RRGGBB` color. Malformed values render as black rather
    /// than failing the whole document.
    pub fn rgb(&self) -> (u8, u8, u8) {
        parse_hex_color(&self.color).unwrap_or((0, 0, 0))
    }
}

pub fn parse_hex_color(value: &str) -> Option<(u8, u8, u8)> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((r, g, b))
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateTemplate {
    pub id: Uuid,
    pub course_id: Uuid,
    pub kind: TemplateKind,
    pub image_url: String,
    pub fields: Vec<TemplateField>,
    pub updated_at: DateTime<Utc>,
}
