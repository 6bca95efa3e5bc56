pub mod batch;
pub mod certificate;
pub mod qrcode;

pub use batch::{Batch, BatchKind, BatchStatus};
pub use certificate::{Certificate, OwnerFields, VehicleFields};
pub use qrcode::{QrCode, QrStatus};

use serde::{Deserialize, Serialize};

/// An issuance scope: the (state, OEM, product) triple a batch is
/// requested for.
///
/// Serial numbers are sequenced per (state, OEM) — all products of an OEM
/// in one state draw from the same counter — so the sequence key drops the
/// product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub state: String,
    pub oem: String,
    pub product: String,
}

impl Scope {
    pub fn new(state: &str, oem: &str, product: &str) -> Self {
        Self {
            state: state.to_string(),
            oem: oem.to_string(),
            product: product.to_string(),
        }
    }

    /// Key of the serial-number sequence this scope allocates from.
    pub fn sequence_key(&self) -> String {
        format!("{}:{}", self.state, self.oem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_key_ignores_product() {
        let a = Scope::new("MH", "TATA", "C3");
        let b = Scope::new("MH", "TATA", "C5");
        assert_eq!(a.sequence_key(), b.sequence_key());
        assert_eq!(a.sequence_key(), "MH:TATA");
    }
}
