//! PayloadCodec - 入力 payload の decode

use super::task::Task;
use crate::domain::Payload;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("payload must be a JSON object")]
    NotAnObject,

    #[error("payload does not match task type {task_type}: {message}")]
    Mismatch { task_type: &'static str, message: String },
}

/// PayloadCodec は外部ストレージの bytes や inline の JSON を decode する
pub struct PayloadCodec;

impl PayloadCodec {
    /// Decode bytes fetched from external storage into an input map.
    pub fn decode_external(bytes: &[u8]) -> Result<Payload, CodecError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| CodecError::InvalidJson(e.to_string()))?;
        match value {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(CodecError::NotAnObject),
        }
    }

    /// Decode an input map into a typed task.
    pub fn decode<T: Task>(input: &Payload) -> Result<T, CodecError> {
        serde_json::from_value(serde_json::Value::Object(input.clone())).map_err(|e| {
            CodecError::Mismatch {
                task_type: T::TYPE,
                message: e.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Resize {
        width: u32,
    }

    impl Task for Resize {
        const TYPE: &'static str = "test.image.resize.v1";
    }

    #[test]
    fn decode_external_requires_object() {
        assert!(PayloadCodec::decode_external(br#"{"a": 1}"#).is_ok());
        assert!(matches!(
            PayloadCodec::decode_external(b"[1, 2]"),
            Err(CodecError::NotAnObject)
        ));
        assert!(matches!(
            PayloadCodec::decode_external(b"not json"),
            Err(CodecError::InvalidJson(_))
        ));
    }

    #[test]
    fn decode_reports_task_type_on_mismatch() {
        let input = PayloadCodec::decode_external(br#"{"width": "wide"}"#).unwrap();
        let err = PayloadCodec::decode::<Resize>(&input).unwrap_err();
        assert!(err.to_string().contains(Resize::TYPE));
    }
}
