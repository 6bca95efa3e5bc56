use serde::{Deserialize, Serialize};

/// A state (registration jurisdiction).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct State {
    /// Short code, e.g. "MH".
    pub code: String,
    pub name: String,
}

/// A vehicle/equipment manufacturer.
///
/// `states` lists the state codes the OEM is authorized to request
/// issuance for. An empty list means not authorized anywhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Oem {
    /// Short code, e.g. "TATA".
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub states: Vec<String>,
}

impl Oem {
    pub fn authorized_for(&self, state_code: &str) -> bool {
        self.states.iter().any(|s| s == state_code)
    }
}

/// A safety-equipment product line, e.g. a speed-limiter model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Short code, e.g. "C3".
    pub code: String,
    pub name: String,
}

/// A regional transport office. Certificates are numbered after the
/// inspecting RTO.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rto {
    /// Short code, e.g. "MH01".
    pub code: String,
    pub state: String,
    pub name: String,
}

/// A fitment dealer acting on behalf of an OEM in one state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dealer {
    pub code: String,
    pub state: String,
    pub oem: String,
    pub name: String,
}
