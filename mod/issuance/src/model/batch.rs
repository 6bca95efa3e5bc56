use serde::{Deserialize, Serialize};

/// Batch lifecycle status. Transitions are monotonic:
/// PENDING → PROCESSING → {COMPLETED, FAILED}, enforced by
/// compare-and-swap updates in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "PENDING",
            BatchStatus::Processing => "PROCESSING",
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Failed => "FAILED",
        }
    }
}

impl Default for BatchStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Live batches mint new codes against the scope's sequence. Ghost
/// batches are reprints over already-used serials: they allocate
/// nothing and insert no code rows.
///
/// Every listing query filters on this discriminator; ghost batches are
/// invisible unless explicitly requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchKind {
    Live,
    Ghost,
}

impl BatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchKind::Live => "LIVE",
            BatchKind::Ghost => "GHOST",
        }
    }
}

/// Batch — one unit of requested issuance (or reprint, for ghosts).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    /// UUID primary key.
    pub id: String,

    /// Short human-readable batch code (5 alphanumeric chars), unique.
    pub code: String,

    pub state: String,
    pub oem: String,
    pub product: String,

    /// Requested sticker count. For ghost batches this is rewritten to
    /// the number of codes actually found at generation time.
    pub quantity: u32,

    pub kind: BatchKind,

    #[serde(default)]
    pub status: BatchStatus,

    /// First serial of the allocated range. Set on completion, then
    /// immutable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_serial: Option<i64>,

    /// Last serial of the allocated range (inclusive). Set on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_serial: Option<i64>,

    /// Public URL of the rendered sticker sheet. Set on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,

    /// Failure detail when status is FAILED.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Ghost batches only: reprint window starts at this serial.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ghost_from_serial: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,

    pub create_at: String,
    pub update_at: String,
}

impl Batch {
    pub fn is_ghost(&self) -> bool {
        self.kind == BatchKind::Ghost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_json_roundtrip() {
        let b = Batch {
            id: "b001".into(),
            code: "A1B2C".into(),
            state: "MH".into(),
            oem: "TATA".into(),
            product: "C3".into(),
            quantity: 500,
            kind: BatchKind::Live,
            status: BatchStatus::Pending,
            start_serial: None,
            end_serial: None,
            artifact_url: None,
            error: None,
            ghost_from_serial: None,
            requested_by: Some("op1".into()),
            create_at: "2025-06-01T10:00:00+00:00".into(),
            update_at: "2025-06-01T10:00:00+00:00".into(),
        };
        let json = serde_json::to_string(&b).unwrap();
        assert!(json.contains("\"status\":\"PENDING\""));
        assert!(json.contains("\"kind\":\"LIVE\""));
        let back: Batch = serde_json::from_str(&json).unwrap();
        assert_eq!(b, back);
    }

    #[test]
    fn status_strings() {
        assert_eq!(BatchStatus::Pending.as_str(), "PENDING");
        assert_eq!(BatchStatus::Processing.as_str(), "PROCESSING");
        assert_eq!(BatchStatus::Completed.as_str(), "COMPLETED");
        assert_eq!(BatchStatus::Failed.as_str(), "FAILED");
        assert_eq!(BatchKind::Ghost.as_str(), "GHOST");
    }
}
