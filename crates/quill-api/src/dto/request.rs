//! Request DTOs with validation.
//!
//! Field names are camelCase on the wire. Numeric fields accept JSON numbers
//! or numeric strings, since browser clients commonly send form values as
//! text.

use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use quill_core::error::UploadError;
use quill_service::{MergeRequest, VerifyRequest};

/// `POST /file/verify` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyBody {
    /// Client-computed content hash.
    #[serde(default)]
    #[validate(length(min = 1, message = "fileHash is required"))]
    pub file_hash: String,
    /// Original file name.
    #[serde(default)]
    #[validate(length(min = 1, message = "fileName is required"))]
    pub file_name: String,
    /// Total size in bytes.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub size: Option<i64>,
    /// Chunk size in bytes.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub chunk_size: Option<i64>,
    /// Destination folder.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub subset_id: Option<i64>,
    /// Description.
    #[serde(default)]
    pub file_desc: Option<String>,
    /// Caller token.
    #[serde(default)]
    pub token: Option<String>,
}

impl VerifyBody {
    /// Convert into the service request, requiring the numeric fields.
    pub fn into_request(self) -> Result<VerifyRequest, UploadError> {
        Ok(VerifyRequest {
            total_size: self
                .size
                .ok_or_else(|| UploadError::invalid("size is required"))?,
            chunk_size: self
                .chunk_size
                .ok_or_else(|| UploadError::invalid("chunkSize is required"))?,
            content_hash: self.file_hash,
            file_name: self.file_name,
            folder_id: self.subset_id,
            description: self.file_desc,
        })
    }
}

/// `POST /file/merge` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MergeBody {
    /// Content hash of the task to merge.
    #[serde(default)]
    #[validate(length(min = 1, message = "fileHash is required"))]
    pub file_hash: String,
    /// Original file name.
    #[serde(default)]
    #[validate(length(min = 1, message = "fileName is required"))]
    pub file_name: String,
    /// Total size in bytes.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub size: Option<i64>,
    /// Destination folder.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub subset_id: Option<i64>,
    /// Description.
    #[serde(default)]
    pub file_desc: Option<String>,
    /// Caller token.
    #[serde(default)]
    pub token: Option<String>,
}

impl MergeBody {
    /// Convert into the service request, requiring `size`.
    pub fn into_request(self) -> Result<MergeRequest, UploadError> {
        Ok(MergeRequest {
            total_size: self
                .size
                .ok_or_else(|| UploadError::invalid("size is required"))?,
            content_hash: self.file_hash,
            file_name: self.file_name,
            folder_id: self.subset_id,
            description: self.file_desc,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Parse an optional integer from a JSON number or a numeric string.
/// `null` and blank strings read as absent.
pub fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Int(n)) => Ok(Some(n)),
        Some(NumberOrString::Float(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            Ok(Some(f as i64))
        }
        Some(NumberOrString::Float(f)) => Err(D::Error::custom(format!("expected an integer, got {f}"))),
        Some(NumberOrString::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrString::Text(s)) => parse_i64(&s).map(Some).map_err(D::Error::custom),
    }
}

/// Parse a numeric form value.
pub fn parse_i64(value: &str) -> Result<i64, String> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("expected an integer, got {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_and_strings_accepted() {
        let body: VerifyBody = serde_json::from_value(serde_json::json!({
            "fileHash": "abc",
            "fileName": "a.mp4",
            "size": "2621440",
            "chunkSize": 1048576,
            "subsetId": "",
            "token": "t"
        }))
        .unwrap();
        assert_eq!(body.size, Some(2_621_440));
        assert_eq!(body.chunk_size, Some(1_048_576));
        assert_eq!(body.subset_id, None);

        let req = body.into_request().unwrap();
        assert_eq!(req.content_hash, "abc");
        assert_eq!(req.total_size, 2_621_440);
    }

    #[test]
    fn test_garbage_number_rejected() {
        let result: Result<MergeBody, _> = serde_json::from_value(serde_json::json!({
            "fileHash": "abc",
            "size": "lots",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_fields_fail_validation() {
        let body: MergeBody = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(body.validate().is_err());
        assert!(matches!(
            body.into_request(),
            Err(UploadError::InvalidRequest(_))
        ));
    }
}
