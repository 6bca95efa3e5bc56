use serde::{Deserialize, Serialize};

/// Consumption status of an issued code.
///
/// Stored as an integer column: 0 = UNUSED, 1 = USED. UNUSED→USED happens
/// only inside the certificate-issuance transaction; USED→UNUSED only via
/// reactivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QrStatus {
    Unused,
    Used,
}

impl QrStatus {
    pub fn as_i64(&self) -> i64 {
        match self {
            QrStatus::Unused => 0,
            QrStatus::Used => 1,
        }
    }

    pub fn from_i64(v: i64) -> Self {
        if v == 0 { QrStatus::Unused } else { QrStatus::Used }
    }
}

/// QrCode — one issued sticker code.
///
/// `value` is the opaque random payload token, globally unique and
/// immutable. `serial` is unique within (state, oem, product). The scope
/// columns are denormalized from the owning batch so a scanned payload can
/// be cross-checked against what was actually issued.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QrCode {
    pub id: String,
    pub batch_id: String,

    pub state: String,
    pub oem: String,
    pub product: String,

    pub serial: i64,

    /// Opaque random token embedded in the scannable payload.
    pub value: String,

    /// Full scannable payload URL.
    pub payload: String,

    pub status: QrStatus,

    pub create_at: String,
    pub update_at: String,
}
