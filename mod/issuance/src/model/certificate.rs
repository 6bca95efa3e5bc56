use serde::{Deserialize, Serialize};

/// Vehicle details recorded on an installation certificate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VehicleFields {
    pub registration_no: String,
    pub chassis_no: String,
    pub engine_no: String,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Owner details recorded on an installation certificate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerFields {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Certificate — the installation record bound 1:1 to a QR code.
///
/// `number` is derived deterministically from the inspecting RTO code and
/// the QR value, so it is reproducible and collision-free as long as QR
/// values are unique. A certificate exists only while its code is USED.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: String,

    /// Certificate number: `{inspection RTO code}{QR value}`.
    pub number: String,

    /// Id of the consumed QR code row.
    pub qr_id: String,
    pub qr_value: String,

    /// Inspecting RTO code.
    pub rto: String,

    pub vehicle: VehicleFields,
    pub owner: OwnerFields,

    #[serde(default)]
    pub photo_refs: Vec<String>,

    /// Public URL of the rendered certificate document.
    pub artifact_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_by: Option<String>,

    pub create_at: String,
}
