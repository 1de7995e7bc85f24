//! Response DTOs.

use serde::{Deserialize, Serialize};

use quill_service::{ChunkAck, FileInfo, VerifyResult};

/// `data` of a `/file/verify` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyData {
    /// Whether the client must upload chunks.
    pub should_upload: bool,
    /// The existing file on a dedup hit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileInfo>,
    /// Chunk indexes already stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_list: Option<Vec<u32>>,
    /// Chunks the task expects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<u32>,
}

impl VerifyData {
    /// Payload telling the client the upload already finished.
    pub fn complete(file: FileInfo) -> Self {
        Self {
            should_upload: false,
            file: Some(file),
            uploaded_list: None,
            chunk_count: None,
        }
    }
}

impl From<VerifyResult> for VerifyData {
    fn from(result: VerifyResult) -> Self {
        match result {
            VerifyResult::AlreadyUploaded { file } => Self::complete(file),
            VerifyResult::NeedsUpload {
                uploaded_indexes,
                chunk_count,
                ..
            } => Self {
                should_upload: true,
                file: None,
                uploaded_list: Some(uploaded_indexes),
                chunk_count: Some(chunk_count),
            },
        }
    }
}

/// `data` of a `/file/chunk` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkData {
    /// The chunk was accepted (stored now or earlier).
    Accepted {
        /// Content hash.
        #[serde(rename = "fileHash")]
        file_hash: String,
        /// Chunk index.
        #[serde(rename = "chunkIndex")]
        chunk_index: u32,
        /// Bytes received.
        #[serde(rename = "chunkSize")]
        chunk_size: u64,
    },
    /// The upload already finished.
    Complete(VerifyData),
}

impl ChunkData {
    /// Build the payload for `ack` on `hash`.
    pub fn from_ack(hash: &str, ack: ChunkAck) -> Self {
        match ack {
            ChunkAck::Stored { index, size_bytes } | ChunkAck::Duplicate { index, size_bytes } => {
                Self::Accepted {
                    file_hash: hash.to_string(),
                    chunk_index: index,
                    chunk_size: size_bytes,
                }
            }
            ChunkAck::AlreadyComplete { file } => Self::Complete(VerifyData::complete(file)),
        }
    }
}

/// `data` of a `/file/merge` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MergeData {
    /// The file was merged by this request.
    Merged {
        /// Absolute URL of the merged file.
        url: String,
        /// Name the file was catalogued under.
        #[serde(rename = "fileName")]
        file_name: String,
    },
    /// The upload had already been merged.
    Complete(VerifyData),
}

/// `data` of a `/health` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    /// `ok` or `degraded`.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Seconds since start.
    pub uptime_seconds: u64,
    /// Whether the ledger answered.
    pub ledger: bool,
    /// Whether the uploads root is usable.
    pub storage: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_data_shapes() {
        let fresh = VerifyData::from(VerifyResult::NeedsUpload {
            uploaded_indexes: vec![0, 2],
            chunk_count: 3,
            resumed: true,
        });
        let json = serde_json::to_value(&fresh).unwrap();
        assert_eq!(json["shouldUpload"], true);
        assert_eq!(json["uploadedList"], serde_json::json!([0, 2]));
        assert_eq!(json["chunkCount"], 3);
        assert!(json.get("file").is_none());
    }

    #[test]
    fn test_chunk_data_wire_names() {
        let data = ChunkData::from_ack(
            "abc",
            ChunkAck::Duplicate {
                index: 4,
                size_bytes: 10,
            },
        );
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            serde_json::json!({"fileHash": "abc", "chunkIndex": 4, "chunkSize": 10})
        );
    }
}
