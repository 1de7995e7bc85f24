//! Response envelope shared by every API endpoint.

use serde::{Deserialize, Serialize};

/// `{code, data?, message?}` wrapper. `code != 200` signals failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiEnvelope<T> {
    /// 200 on success, otherwise a 4xx/5xx code.
    pub code: u16,
    /// Payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Successful envelope with a payload.
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            code: 200,
            data: Some(data),
            message: Some(message.into()),
        }
    }

    /// Failure envelope without a payload.
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            data: None,
            message: Some(message.into()),
        }
    }

    /// Whether the envelope reports success.
    pub fn is_ok(&self) -> bool {
        self.code == 200
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_omits_data() {
        let env: ApiEnvelope<()> = ApiEnvelope::error(404, "not found");
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["code"], 404);
        assert_eq!(json["message"], "not found");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_ok_envelope_roundtrip() {
        let env = ApiEnvelope::ok(vec![1, 2], "done");
        let text = serde_json::to_string(&env).unwrap();
        let back: ApiEnvelope<Vec<u32>> = serde_json::from_str(&text).unwrap();
        assert!(back.is_ok());
        assert_eq!(back.data, Some(vec![1, 2]));
    }
}
