pub mod batch;
pub mod certificate;
pub mod qrcode;
pub mod sequence;

pub use batch::{BatchFilters, BatchStore};
pub use certificate::CertificateStore;
pub use qrcode::QrCodeStore;
pub use sequence::{SERIAL_BASE, SequenceStore};

use qrseal_core::ServiceError;
use qrseal_sql::SQLError;

/// Map a store-level SQL error onto the service taxonomy.
///
/// Aborted transactions and unique-index violations are conflicts (a
/// concurrent writer won, or the key already exists); everything else is
/// a storage fault.
pub(crate) fn map_sql_err(e: SQLError) -> ServiceError {
    match e {
        SQLError::Aborted(msg) => ServiceError::Conflict(msg),
        other => {
            let msg = other.to_string();
            if msg.contains("UNIQUE constraint") {
                ServiceError::Conflict(msg)
            } else {
                ServiceError::Storage(msg)
            }
        }
    }
}
