use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use qrseal_core::ServiceError;
use qrseal_kv::KVStore;

use crate::model::{Dealer, Oem, Product, Rto, State};

/// Reference-data service — keyed lookup tables consulted for validation.
///
/// Entities live in the KV store as JSON documents under
/// `refdata:{kind}:{code}` keys. The issuance core reads these; it never
/// mutates them.
pub struct RefdataService {
    kv: Arc<dyn KVStore>,
}

impl RefdataService {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self { kv }
    }

    // ── Generic helpers ──

    fn key(kind: &str, code: &str) -> String {
        format!("refdata:{}:{}", kind, code)
    }

    fn get_doc<T: DeserializeOwned>(&self, kind: &str, code: &str) -> Result<T, ServiceError> {
        let key = Self::key(kind, code);
        match self.kv.get(&key) {
            Ok(Some(data)) => serde_json::from_slice(&data)
                .map_err(|e| ServiceError::Internal(e.to_string())),
            Ok(None) => Err(ServiceError::NotFound(format!("{} '{}'", kind, code))),
            Err(e) => Err(ServiceError::Storage(e.to_string())),
        }
    }

    fn put_doc<T: Serialize>(&self, kind: &str, code: &str, doc: &T) -> Result<(), ServiceError> {
        if code.is_empty() || code.contains(':') || code.contains('/') {
            return Err(ServiceError::Validation(format!(
                "invalid {} code: {:?}",
                kind, code
            )));
        }
        let data = serde_json::to_vec(doc)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        self.kv
            .set(&Self::key(kind, code), &data)
            .map_err(|e| ServiceError::Storage(e.to_string()))
    }

    fn list_docs<T: DeserializeOwned>(&self, kind: &str) -> Result<Vec<T>, ServiceError> {
        let prefix = format!("refdata:{}:", kind);
        let entries = self
            .kv
            .scan(&prefix)
            .map_err(|e| ServiceError::Storage(e.to_string()))?;

        let mut docs = Vec::new();
        for (_key, value) in entries {
            let doc = serde_json::from_slice(&value)
                .map_err(|e| ServiceError::Internal(e.to_string()))?;
            docs.push(doc);
        }
        Ok(docs)
    }

    fn delete_doc(&self, kind: &str, code: &str) -> Result<(), ServiceError> {
        // Surface NotFound rather than silently deleting nothing.
        let key = Self::key(kind, code);
        match self.kv.get(&key) {
            Ok(Some(_)) => self
                .kv
                .delete(&key)
                .map_err(|e| ServiceError::Storage(e.to_string())),
            Ok(None) => Err(ServiceError::NotFound(format!("{} '{}'", kind, code))),
            Err(e) => Err(ServiceError::Storage(e.to_string())),
        }
    }

    // ── States ──

    pub fn get_state(&self, code: &str) -> Result<State, ServiceError> {
        self.get_doc("state", code)
    }

    pub fn upsert_state(&self, state: &State) -> Result<(), ServiceError> {
        self.put_doc("state", &state.code, state)
    }

    pub fn list_states(&self) -> Result<Vec<State>, ServiceError> {
        self.list_docs("state")
    }

    pub fn delete_state(&self, code: &str) -> Result<(), ServiceError> {
        self.delete_doc("state", code)
    }

    // ── OEMs ──

    pub fn get_oem(&self, code: &str) -> Result<Oem, ServiceError> {
        self.get_doc("oem", code)
    }

    pub fn upsert_oem(&self, oem: &Oem) -> Result<(), ServiceError> {
        for state in &oem.states {
            self.get_state(state)?;
        }
        self.put_doc("oem", &oem.code, oem)
    }

    pub fn list_oems(&self) -> Result<Vec<Oem>, ServiceError> {
        self.list_docs("oem")
    }

    pub fn delete_oem(&self, code: &str) -> Result<(), ServiceError> {
        self.delete_doc("oem", code)
    }

    // ── Products ──

    pub fn get_product(&self, code: &str) -> Result<Product, ServiceError> {
        self.get_doc("product", code)
    }

    pub fn upsert_product(&self, product: &Product) -> Result<(), ServiceError> {
        self.put_doc("product", &product.code, product)
    }

    pub fn list_products(&self) -> Result<Vec<Product>, ServiceError> {
        self.list_docs("product")
    }

    pub fn delete_product(&self, code: &str) -> Result<(), ServiceError> {
        self.delete_doc("product", code)
    }

    // ── RTOs ──

    pub fn get_rto(&self, code: &str) -> Result<Rto, ServiceError> {
        self.get_doc("rto", code)
    }

    pub fn upsert_rto(&self, rto: &Rto) -> Result<(), ServiceError> {
        self.get_state(&rto.state)?;
        self.put_doc("rto", &rto.code, rto)
    }

    pub fn list_rtos(&self) -> Result<Vec<Rto>, ServiceError> {
        self.list_docs("rto")
    }

    pub fn delete_rto(&self, code: &str) -> Result<(), ServiceError> {
        self.delete_doc("rto", code)
    }

    // ── Dealers ──

    pub fn get_dealer(&self, code: &str) -> Result<Dealer, ServiceError> {
        self.get_doc("dealer", code)
    }

    pub fn upsert_dealer(&self, dealer: &Dealer) -> Result<(), ServiceError> {
        self.get_state(&dealer.state)?;
        self.get_oem(&dealer.oem)?;
        self.put_doc("dealer", &dealer.code, dealer)
    }

    pub fn list_dealers(&self) -> Result<Vec<Dealer>, ServiceError> {
        self.list_docs("dealer")
    }

    pub fn delete_dealer(&self, code: &str) -> Result<(), ServiceError> {
        self.delete_doc("dealer", code)
    }

    // ── Validation used by the issuance core ──

    /// Check that a (state, oem, product) issuance scope is valid: all
    /// three exist and the OEM is authorized for the state.
    pub fn validate_scope(
        &self,
        state: &str,
        oem: &str,
        product: &str,
    ) -> Result<(), ServiceError> {
        self.get_state(state)?;
        let oem_doc = self.get_oem(oem)?;
        self.get_product(product)?;

        if !oem_doc.authorized_for(state) {
            return Err(ServiceError::Validation(format!(
                "OEM {} is not authorized for state {}",
                oem, state
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrseal_kv::RedbStore;

    fn test_service() -> (tempfile::TempDir, RefdataService) {
        let dir = tempfile::tempdir().unwrap();
        let kv = Arc::new(RedbStore::open(&dir.path().join("ref.redb")).unwrap());
        (dir, RefdataService::new(kv))
    }

    fn seed(svc: &RefdataService) {
        svc.upsert_state(&State { code: "MH".into(), name: "Maharashtra".into() })
            .unwrap();
        svc.upsert_state(&State { code: "KA".into(), name: "Karnataka".into() })
            .unwrap();
        svc.upsert_oem(&Oem {
            code: "TATA".into(),
            name: "Tata Motors".into(),
            states: vec!["MH".into()],
        })
        .unwrap();
        svc.upsert_product(&Product { code: "C3".into(), name: "Speed Limiter C3".into() })
            .unwrap();
    }

    #[test]
    fn crud_roundtrip() {
        let (_dir, svc) = test_service();
        seed(&svc);

        assert_eq!(svc.get_state("MH").unwrap().name, "Maharashtra");
        assert_eq!(svc.list_states().unwrap().len(), 2);

        svc.delete_state("KA").unwrap();
        assert!(svc.get_state("KA").is_err());
        assert!(svc.delete_state("KA").is_err());
    }

    #[test]
    fn oem_requires_known_states() {
        let (_dir, svc) = test_service();
        seed(&svc);

        let bad = Oem {
            code: "BAJAJ".into(),
            name: "Bajaj".into(),
            states: vec!["ZZ".into()],
        };
        assert!(svc.upsert_oem(&bad).is_err());
    }

    #[test]
    fn scope_validation() {
        let (_dir, svc) = test_service();
        seed(&svc);

        assert!(svc.validate_scope("MH", "TATA", "C3").is_ok());
        // OEM exists but is not authorized for KA.
        assert!(svc.validate_scope("KA", "TATA", "C3").is_err());
        // Unknown product.
        assert!(svc.validate_scope("MH", "TATA", "ZZ").is_err());
        // Unknown state.
        assert!(svc.validate_scope("DL", "TATA", "C3").is_err());
    }

    #[test]
    fn rto_and_dealer_reference_checks() {
        let (_dir, svc) = test_service();
        seed(&svc);

        svc.upsert_rto(&Rto { code: "MH01".into(), state: "MH".into(), name: "Mumbai Central".into() })
            .unwrap();
        assert!(svc
            .upsert_rto(&Rto { code: "XX99".into(), state: "XX".into(), name: "nope".into() })
            .is_err());

        svc.upsert_dealer(&Dealer {
            code: "D001".into(),
            state: "MH".into(),
            oem: "TATA".into(),
            name: "Sai Fitments".into(),
        })
        .unwrap();
        assert!(svc
            .upsert_dealer(&Dealer {
                code: "D002".into(),
                state: "MH".into(),
                oem: "NOPE".into(),
                name: "ghost dealer".into(),
            })
            .is_err());
    }

    #[test]
    fn code_format_guard() {
        let (_dir, svc) = test_service();
        let bad = State { code: "M:H".into(), name: "bad".into() };
        assert!(svc.upsert_state(&bad).is_err());
    }
}
