//! Cached result records and their storage encoding
//!
//! A record is stored as a JSON document. Payload batches are embedded as
//! base64-encoded Arrow IPC streams so the backend only ever sees bytes.

use crate::error::{CacheFault, CacheResult};
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Cursor;

/// Annotation layer name -> annotation payload
pub type AnnotationData = BTreeMap<String, serde_json::Value>;

/// Record batch encoded with the Arrow IPC stream format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedBatch {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub num_rows: usize,
}

impl SerializedBatch {
    pub fn from_batch(batch: &RecordBatch) -> CacheResult<Self> {
        let mut buffer = Vec::new();
        {
            let mut writer = StreamWriter::try_new(&mut buffer, &batch.schema())?;
            writer.write(batch)?;
            writer.finish()?;
        }

        Ok(Self {
            data: buffer,
            num_rows: batch.num_rows(),
        })
    }

    pub fn to_batch(&self) -> CacheResult<RecordBatch> {
        let mut reader = StreamReader::try_new(Cursor::new(&self.data), None)?;
        match reader.next() {
            Some(batch) => Ok(batch?),
            None => Err(CacheFault::CorruptEntry(
                "No batch found in serialized payload".to_string(),
            )),
        }
    }

    pub fn from_batches(batches: &[RecordBatch]) -> CacheResult<Vec<Self>> {
        batches.iter().map(Self::from_batch).collect()
    }

    pub fn to_batches(serialized: &[Self]) -> CacheResult<Vec<RecordBatch>> {
        serialized.iter().map(Self::to_batch).collect()
    }
}

/// Value assembled from a session before it is written to a backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheValue {
    #[serde(with = "ipc_batches")]
    pub payload: Vec<RecordBatch>,
    pub query: String,
    #[serde(default)]
    pub applied_template_filters: Vec<String>,
    #[serde(default)]
    pub applied_filter_columns: Vec<String>,
    #[serde(default)]
    pub rejected_filter_columns: Vec<String>,
    #[serde(default)]
    pub annotation_data: AnnotationData,
    #[serde(default)]
    pub sql_rowcount: Option<u64>,
}

impl CacheValue {
    /// Attach the write timestamp, producing the record that gets stored
    pub fn stamp(self, dttm: DateTime<Utc>) -> CachedResult {
        CachedResult { value: self, dttm }
    }
}

/// Immutable record stored under a cache key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResult {
    #[serde(flatten)]
    pub value: CacheValue,
    /// When the record was written
    pub dttm: DateTime<Utc>,
}

impl CachedResult {
    pub fn encode(&self) -> CacheResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CacheFault::Serialization(e.to_string()))
    }

    /// Decode a stored record. Any missing required field is reported as a
    /// corrupt entry.
    pub fn decode(bytes: &[u8]) -> CacheResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| CacheFault::CorruptEntry(e.to_string()))
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(D::Error::custom)
    }
}

mod ipc_batches {
    use super::SerializedBatch;
    use arrow::record_batch::RecordBatch;
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(batches: &[RecordBatch], serializer: S) -> Result<S::Ok, S::Error> {
        SerializedBatch::from_batches(batches)
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<RecordBatch>, D::Error> {
        let encoded = Vec::<SerializedBatch>::deserialize(deserializer)?;
        SerializedBatch::to_batches(&encoded).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde_json::json;
    use std::sync::Arc;

    fn create_test_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(StringArray::from(vec!["Alice", "Bob", "Charlie"])),
            ],
        )
        .unwrap()
    }

    fn create_test_value() -> CacheValue {
        let mut annotation_data = AnnotationData::new();
        annotation_data.insert("events".to_string(), json!([{ "name": "launch" }]));
        CacheValue {
            payload: vec![create_test_batch()],
            query: "SELECT id, name FROM users".to_string(),
            applied_template_filters: vec!["from_dttm".to_string()],
            applied_filter_columns: vec!["name".to_string()],
            rejected_filter_columns: vec!["region".to_string()],
            annotation_data,
            sql_rowcount: Some(3),
        }
    }

    #[test]
    fn test_serialized_batch() {
        let batch = create_test_batch();
        let serialized = SerializedBatch::from_batch(&batch).unwrap();
        assert_eq!(serialized.num_rows, 3);
        assert_eq!(serialized.to_batch().unwrap(), batch);
    }

    #[test]
    fn test_empty_serialized_batch_is_corrupt() {
        let serialized = SerializedBatch {
            data: Vec::new(),
            num_rows: 0,
        };
        assert!(serialized.to_batch().is_err());
    }

    #[test]
    fn test_ipc_bytes_stored_as_base64() {
        let serialized = SerializedBatch::from_batch(&create_test_batch()).unwrap();
        let encoded = serde_json::to_value(&serialized).unwrap();

        let data = encoded["data"].as_str().unwrap();
        assert_eq!(data, STANDARD.encode(&serialized.data));
        assert!(data.len() < serialized.data.len() * 2);
    }

    #[test]
    fn test_invalid_base64_is_corrupt() {
        let bytes = serde_json::to_vec(&json!({
            "payload": [{ "data": "not base64!", "num_rows": 1 }],
            "query": "SELECT 1",
            "dttm": "2024-01-01T00:00:00Z",
        }))
        .unwrap();
        assert!(matches!(
            CachedResult::decode(&bytes),
            Err(CacheFault::CorruptEntry(_))
        ));
    }

    #[test]
    fn test_encode_decode_record() {
        let record = create_test_value().stamp(Utc::now());
        let bytes = record.encode().unwrap();
        let decoded = CachedResult::decode(&bytes).unwrap();

        assert_eq!(decoded, record);
    }

    #[test]
    fn test_optional_fields_default() {
        let bytes = serde_json::to_vec(&json!({
            "payload": [],
            "query": "SELECT 1",
            "dttm": "2024-01-01T00:00:00Z",
        }))
        .unwrap();

        let decoded = CachedResult::decode(&bytes).unwrap();
        assert_eq!(decoded.value.query, "SELECT 1");
        assert!(decoded.value.payload.is_empty());
        assert!(decoded.value.annotation_data.is_empty());
        assert!(decoded.value.applied_template_filters.is_empty());
        assert_eq!(decoded.value.sql_rowcount, None);
    }

    #[test]
    fn test_missing_payload_is_corrupt() {
        let bytes = serde_json::to_vec(&json!({
            "query": "SELECT 1",
            "dttm": "2024-01-01T00:00:00Z",
        }))
        .unwrap();

        match CachedResult::decode(&bytes) {
            Err(CacheFault::CorruptEntry(msg)) => assert!(msg.contains("payload")),
            other => panic!("Expected CorruptEntry, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_timestamp_is_corrupt() {
        let bytes = serde_json::to_vec(&json!({ "payload": [], "query": "SELECT 1" })).unwrap();
        assert!(matches!(
            CachedResult::decode(&bytes),
            Err(CacheFault::CorruptEntry(_))
        ));
    }

    #[test]
    fn test_garbage_is_corrupt() {
        assert!(matches!(
            CachedResult::decode(b"\x00\x01not json"),
            Err(CacheFault::CorruptEntry(_))
        ));
    }
}
