pub mod batch;
pub mod certificate;
pub mod ghost;
pub mod reactivate;
pub mod replacement;

pub use batch::{MAX_BATCH_QUANTITY, RequestBatchInput};
pub use certificate::{IssueCertificateInput, ValidationReport};
pub use ghost::GhostRequestInput;
pub use replacement::{ReplacementInput, ReplacementResult};

use std::sync::Arc;

use tokio::sync::Notify;

use qrseal_blob::BlobStore;
use qrseal_core::ServiceError;
use qrseal_render::Renderer;
use qrseal_sql::SQLStore;
use refdata::RefdataService;

use crate::store::{BatchStore, CertificateStore, QrCodeStore, SequenceStore};

/// Issuance service — the QR code lifecycle and batch issuance engine.
///
/// Owns the four registry stores plus the collaborator boundaries:
/// reference data for validation, the renderer and blob store for
/// artifacts. All exclusivity lives in the database (atomic sequence
/// upsert, CAS status flips, multi-statement transactions); the service
/// itself holds no locks and is safe to share across request tasks and
/// generation workers.
pub struct IssuanceService {
    pub(crate) db: Arc<dyn SQLStore>,
    pub(crate) sequences: SequenceStore,
    pub(crate) batches: BatchStore,
    pub(crate) codes: QrCodeStore,
    pub(crate) certificates: CertificateStore,

    pub(crate) refdata: Arc<RefdataService>,
    pub(crate) renderer: Arc<dyn Renderer>,
    pub(crate) blob: Arc<dyn BlobStore>,

    /// Origin embedded in scannable payloads, e.g. `https://q.example.com`.
    pub(crate) payload_origin: String,

    /// Wakes generation workers when new PENDING work exists.
    notify: Arc<Notify>,
}

impl IssuanceService {
    pub fn new(
        db: Arc<dyn SQLStore>,
        refdata: Arc<RefdataService>,
        renderer: Arc<dyn Renderer>,
        blob: Arc<dyn BlobStore>,
        payload_origin: &str,
    ) -> Result<Self, ServiceError> {
        let payload_origin = payload_origin.trim_end_matches('/').to_string();
        let after_scheme = payload_origin
            .split_once("://")
            .map(|(_, rest)| rest)
            .ok_or_else(|| {
                ServiceError::Validation(format!(
                    "payload origin must carry a scheme: {:?}",
                    payload_origin
                ))
            })?;
        if after_scheme.is_empty() || after_scheme.contains('/') {
            return Err(ServiceError::Validation(format!(
                "payload origin must be scheme://host with no path: {:?}",
                payload_origin
            )));
        }

        Ok(Self {
            sequences: SequenceStore::new(Arc::clone(&db))?,
            batches: BatchStore::new(Arc::clone(&db))?,
            codes: QrCodeStore::new(Arc::clone(&db))?,
            certificates: CertificateStore::new(Arc::clone(&db))?,
            db,
            refdata,
            renderer,
            blob,
            payload_origin,
            notify: Arc::new(Notify::new()),
        })
    }

    /// The wakeup handle generation workers wait on.
    pub fn notify(&self) -> Arc<Notify> {
        Arc::clone(&self.notify)
    }

    pub(crate) fn wake_workers(&self) {
        self.notify.notify_one();
    }
}
