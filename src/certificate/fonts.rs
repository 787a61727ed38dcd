//! Font face selection and the loaded font catalog.
//!
//! Templates pick from a closed family/weight/style set; only Poppins ships
//! with a full {regular, bold, italic, bold-italic} matrix. Face selection is
//! a pure function so the fallback rule is testable without font files.

use rusttype::{point, Font, Scale};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::template::models::{FontFamily, FontStyle, FontWeight};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFace {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

/// Resolve a field's font request to a concrete face. Extrabold maps onto the
/// bold face; any family outside the supported matrix falls back to plain
/// regular rather than failing the render.
pub fn select_face(family: FontFamily, weight: FontWeight, style: FontStyle) -> FontFace {
    if family != FontFamily::Poppins {
        return FontFace::Regular;
    }
    let bold = matches!(weight, FontWeight::Bold | FontWeight::Extrabold);
    match (bold, style) {
        (false, FontStyle::Normal) => FontFace::Regular,
        (true, FontStyle::Normal) => FontFace::Bold,
        (false, FontStyle::Italic) => FontFace::Italic,
        (true, FontStyle::Italic) => FontFace::BoldItalic,
    }
}

#[derive(Debug, Error)]
pub enum FontError {
    #[error("failed to read font file {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("failed to parse font file {0}")]
    Parse(PathBuf),
}

pub struct FontCatalog {
    regular: Font<'static>,
    bold: Font<'static>,
    italic: Font<'static>,
    bold_italic: Font<'static>,
}

fn default_font_dir() -> PathBuf {
    env::var("CERT_FONT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./static/fonts"))
}

fn load_font(dir: &Path, file: &str) -> Result<Font<'static>, FontError> {
    let path = dir.join(file);
    let data = std::fs::read(&path).map_err(|e| FontError::Read(path.clone(), e))?;
    Font::try_from_vec(data).ok_or(FontError::Parse(path))
}

impl FontCatalog {
    pub fn load(dir: &Path) -> Result<Self, FontError> {
        Ok(Self::from_fonts(
            load_font(dir, "Poppins-Regular.ttf")?,
            load_font(dir, "Poppins-Bold.ttf")?,
            load_font(dir, "Poppins-Italic.ttf")?,
            load_font(dir, "Poppins-BoldItalic.ttf")?,
        ))
    }

    /// Assemble a catalog from already-parsed faces. `load` is the deployment
    /// path; this one serves callers that embed or substitute faces.
    pub fn from_fonts(
        regular: Font<'static>,
        bold: Font<'static>,
        italic: Font<'static>,
        bold_italic: Font<'static>,
    ) -> Self {
        Self {
            regular,
            bold,
            italic,
            bold_italic,
        }
    }

    pub fn load_default() -> Result<Self, FontError> {
        Self::load(&default_font_dir())
    }

    pub fn font(&self, face: FontFace) -> &Font<'static> {
        match face {
            FontFace::Regular => &self.regular,
            FontFace::Bold => &self.bold,
            FontFace::Italic => &self.italic,
            FontFace::BoldItalic => &self.bold_italic,
        }
    }

    /// Measured advance width of one line at the given pixel size.
    pub fn measure(&self, face: FontFace, text: &str, size_px: f32) -> f32 {
        let font = self.font(face);
        let scale = Scale::uniform(size_px);
        font.layout(text, scale, point(0.0, 0.0))
            .map(|glyph| glyph.unpositioned().h_metrics().advance_width)
            .sum()
    }
}
