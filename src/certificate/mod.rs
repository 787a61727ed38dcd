//! Certificate subsystem: serial allocation, template rendering, roster
//! resolution and batch issuance.

pub mod batch;
pub mod fonts;
pub mod handlers;
pub mod layout;
pub mod placeholders;
pub mod renderer;
pub mod roster;
pub mod serial;

pub use batch::{BatchIssuer, IssueEvent};
pub use fonts::FontCatalog;
pub use renderer::{CertificateRender, PdfRenderer, RenderContext, RenderError, RenderedCertificate};
pub use roster::{Roster, RosterError, RosterProvider};
pub use serial::SerialAllocator;
