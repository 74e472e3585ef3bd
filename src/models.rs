use serde::{Deserialize, Serialize};
use serde_json::{Number, Value as JsonValue};

use crate::error::ApiError;
use crate::store::RecordKey;

/// Query parameters for a record read
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReadQuery {
    /// Record index; a missing or empty value reads as "not found"
    pub index: Option<String>,
}

impl ReadQuery {
    /// Build from raw query pairs; a repeated `index` resolves to its first value
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let index = pairs
            .into_iter()
            .find(|(name, _)| name == "index")
            .map(|(_, value)| value);
        Self { index }
    }
}

/// Body of a record write
///
/// `null` counts as missing for both fields. `index` may be a string or a
/// number; numbers are stored under their decimal form.
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct WriteRequest {
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "42")]
    pub index: Option<JsonValue>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub data: Option<JsonValue>,
}

impl WriteRequest {
    /// Parse a raw request body, whatever its declared content type
    pub fn from_body(body: &[u8]) -> Result<Self, ApiError> {
        match serde_json::from_slice::<JsonValue>(body)? {
            object @ JsonValue::Object(_) => Ok(serde_json::from_value(object)?),
            _ => Err(ApiError::InvalidBody("expected a JSON object".to_string())),
        }
    }

    /// Validate and split into the store key and the document to persist
    pub fn into_record(self) -> Result<(RecordKey, JsonValue), ApiError> {
        let index = match self.index {
            Some(JsonValue::String(s)) => s,
            Some(JsonValue::Number(n)) => number_index(&n),
            Some(_) => {
                return Err(ApiError::InvalidBody(
                    "index must be a string or a number".to_string(),
                ))
            }
            None => return Err(ApiError::InvalidBody("index is required".to_string())),
        };

        let key = RecordKey::new(index)
            .ok_or_else(|| ApiError::InvalidBody("index must not be empty".to_string()))?;
        let data = self
            .data
            .ok_or_else(|| ApiError::InvalidBody("data is required".to_string()))?;

        Ok((key, data))
    }
}

/// Decimal form of a numeric index; integral values never keep a fraction
/// or exponent, so `1e2` and `100` address the same record.
fn number_index(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
        _ => n.to_string(),
    }
}
