use serde_json::{Map, Value};

/// Full claim set of a credential whose signature and time/audience checks passed.
///
/// Only the verifiers construct this type, so holding one means verification ran.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims(Map<String, Value>);

impl VerifiedClaims {
    pub(crate) fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Claim rendered as a string. Integers are accepted because some issuers
    /// emit numeric ids (e.g. `companyId: 42`).
    pub fn string_claim(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
            _ => None,
        }
    }
}
