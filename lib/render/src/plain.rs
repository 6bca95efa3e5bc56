use crate::error::RenderError;
use crate::traits::{CertificateSpec, Renderer, SheetSpec};

/// PlainRenderer produces deterministic structured-text artifacts.
///
/// One line per sticker page, one block per certificate. Useful as the
/// default server renderer and in tests; a PDF engine replaces it in
/// deployments that print real stickers.
pub struct PlainRenderer;

impl Renderer for PlainRenderer {
    fn render_sheet(&self, sheet: &SheetSpec) -> Result<Vec<u8>, RenderError> {
        if sheet.items.is_empty() {
            return Err(RenderError::InvalidDocument(format!(
                "sheet {} has no items",
                sheet.batch_code
            )));
        }

        let mut out = String::new();
        out.push_str(&format!(
            "STICKER SHEET {} [{}/{}/{}]\n",
            sheet.batch_code, sheet.state, sheet.oem, sheet.product
        ));
        if sheet.replacement {
            out.push_str("*** REPLACEMENT ***\n");
        }
        for (page, item) in sheet.items.iter().enumerate() {
            out.push_str(&format!(
                "page {:>4}  serial {:>8}  {}\n",
                page + 1,
                item.serial,
                item.payload
            ));
        }
        Ok(out.into_bytes())
    }

    fn render_certificate(&self, cert: &CertificateSpec) -> Result<Vec<u8>, RenderError> {
        if cert.number.is_empty() {
            return Err(RenderError::InvalidDocument("empty certificate number".into()));
        }

        let mut out = String::new();
        out.push_str(&format!("INSTALLATION CERTIFICATE {}\n", cert.number));
        out.push_str(&format!("code: {}\n", cert.qr_value));
        out.push_str(&format!("issued: {}\n", cert.issued_at));
        for (label, value) in &cert.fields {
            out.push_str(&format!("{}: {}\n", label, value));
        }
        for photo in &cert.photo_refs {
            out.push_str(&format!("photo: {}\n", photo));
        }
        Ok(out.into_bytes())
    }

    fn encode_code(&self, value: &str) -> Result<Vec<u8>, RenderError> {
        if value.is_empty() {
            return Err(RenderError::InvalidDocument("empty code value".into()));
        }
        Ok(format!("QR[{}]", value).into_bytes())
    }
}

/// A renderer that always fails. Used in tests to exercise the
/// renderer-failure paths (batch FAILED, issuance aborted).
pub struct FailingRenderer;

impl Renderer for FailingRenderer {
    fn render_sheet(&self, _sheet: &SheetSpec) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::Failed("renderer unavailable".into()))
    }

    fn render_certificate(&self, _cert: &CertificateSpec) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::Failed("renderer unavailable".into()))
    }

    fn encode_code(&self, _value: &str) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::Failed("renderer unavailable".into()))
    }
}
