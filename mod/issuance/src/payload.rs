//! Scannable payload format and random token generation.
//!
//! A payload is a URL with exactly four path segments after the origin:
//!
//! ```text
//! {origin}/{state}/{oem}/{product}/qr={value}
//! ```
//!
//! The parser is strict: any deviation — wrong segment count, empty
//! segment, missing `qr=` prefix, missing value — is a hard failure, and
//! parsing happens before any database access.

use rand::Rng;

use qrseal_core::ServiceError;

use crate::model::Scope;

/// Length of the random QR value token.
pub const VALUE_LEN: usize = 16;

/// Length of a human-readable batch code.
pub const BATCH_CODE_LEN: usize = 5;

/// Crockford Base32 alphabet (no I, L, O, U). 16 characters over 32
/// symbols gives 80 bits of entropy per value.
const VALUE_ALPHABET: &[u8] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Full uppercase alphanumeric alphabet for batch codes.
const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a random QR value token.
pub fn generate_value() -> String {
    let mut rng = rand::thread_rng();
    (0..VALUE_LEN)
        .map(|_| VALUE_ALPHABET[rng.gen_range(0..VALUE_ALPHABET.len())] as char)
        .collect()
}

/// Generate a random 5-character batch code.
pub fn generate_batch_code() -> String {
    let mut rng = rand::thread_rng();
    (0..BATCH_CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Check a caller-supplied batch code: exactly 5 uppercase alphanumerics.
pub fn check_batch_code(code: &str) -> Result<(), ServiceError> {
    if code.len() != BATCH_CODE_LEN
        || !code.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
    {
        return Err(ServiceError::Validation(format!(
            "batch code must be {} uppercase alphanumeric characters, got {:?}",
            BATCH_CODE_LEN, code
        )));
    }
    Ok(())
}

/// Build the payload URL for a code value in a scope.
pub fn build_payload(origin: &str, scope: &Scope, value: &str) -> String {
    format!(
        "{}/{}/{}/{}/qr={}",
        origin.trim_end_matches('/'),
        scope.state,
        scope.oem,
        scope.product,
        value
    )
}

/// The parsed parts of a scannable payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadParts {
    /// Scheme + host, e.g. `https://q.example.com`.
    pub origin: String,
    pub state: String,
    pub oem: String,
    pub product: String,
    pub value: String,
}

impl PayloadParts {
    pub fn scope(&self) -> Scope {
        Scope::new(&self.state, &self.oem, &self.product)
    }
}

/// Parse a scannable payload URL. Strict; see module docs.
pub fn parse_payload(url: &str) -> Result<PayloadParts, ServiceError> {
    let rest = url
        .split_once("://")
        .map(|(_, r)| r)
        .ok_or_else(|| malformed("missing scheme"))?;

    let (host, path) = rest
        .split_once('/')
        .ok_or_else(|| malformed("missing path"))?;
    if host.is_empty() {
        return Err(malformed("missing host"));
    }

    let scheme_len = url.len() - rest.len();
    let origin = format!("{}{}", &url[..scheme_len], host);

    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() != 4 {
        return Err(malformed(&format!(
            "expected 4 path segments, got {}",
            segments.len()
        )));
    }
    if segments.iter().any(|s| s.is_empty()) {
        return Err(malformed("empty path segment"));
    }

    let value = segments[3]
        .strip_prefix("qr=")
        .ok_or_else(|| malformed("last segment must start with qr="))?;
    if value.is_empty() {
        return Err(malformed("empty code value"));
    }

    Ok(PayloadParts {
        origin,
        state: segments[0].to_string(),
        oem: segments[1].to_string(),
        product: segments[2].to_string(),
        value: value.to_string(),
    })
}

fn malformed(detail: &str) -> ServiceError {
    ServiceError::Validation(format!("malformed payload: {}", detail))
}
