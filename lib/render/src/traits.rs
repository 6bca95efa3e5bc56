use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// One sticker on a batch sheet: the serial printed on the sticker and the
/// scannable payload embedded in its code image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetItem {
    pub serial: i64,
    pub payload: String,
}

/// A multi-page sticker sheet for one batch. Item `i` lands on page `i`,
/// in serial order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetSpec {
    pub batch_code: String,
    pub state: String,
    pub oem: String,
    pub product: String,

    /// Reprint sheets (ghost batches, bulk replacement) carry a visible
    /// REPLACEMENT marking.
    pub replacement: bool,

    pub items: Vec<SheetItem>,
}

/// Structured fields for one installation certificate document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateSpec {
    pub number: String,
    pub qr_value: String,

    /// Label → value pairs (vehicle and owner details), rendered in order.
    pub fields: Vec<(String, String)>,

    /// References to installation photos embedded in the document.
    pub photo_refs: Vec<String>,

    pub issued_at: String,
}

/// Renderer produces binary document artifacts from structured fields.
///
/// This is the boundary to the document-rendering collaborator: the
/// issuance core hands it fields and stores the returned bytes, nothing
/// more. Visual layout is entirely the implementation's concern — a
/// PDF engine with real QR images plugs in here. `PlainRenderer` is the
/// built-in deterministic implementation.
pub trait Renderer: Send + Sync {
    /// Render a multi-page sticker sheet for a batch.
    fn render_sheet(&self, sheet: &SheetSpec) -> Result<Vec<u8>, RenderError>;

    /// Render one installation certificate document.
    fn render_certificate(&self, cert: &CertificateSpec) -> Result<Vec<u8>, RenderError>;

    /// Encode a payload value into a scannable code image.
    fn encode_code(&self, value: &str) -> Result<Vec<u8>, RenderError>;
}
