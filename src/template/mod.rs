//! Certificate template storage surface: models plus persistence endpoints.

pub mod handlers;
pub mod models;

pub use models::{
    Align, CertificateTemplate, FontFamily, FontStyle, FontWeight, TemplateField, TemplateKind,
};
