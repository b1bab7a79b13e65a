//! Codec trait and implementations for serializing reports.
//!
//! The core never decides what format leaves the process. Anything that
//! implements [`Codec`] can turn an attendance report into bytes, and
//! [`JsonCodec`] is the default.

use serde::{Serialize, de::DeserializeOwned};

use crate::CodecError;

/// Encodes Rust values to bytes and decodes them back.
///
/// `Send + Sync + 'static` so a single codec instance can be shared by
/// every task that produces reports.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `CodecError::Encode` if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `CodecError::Decode` on malformed or mismatched input.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CodecError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// Behind the `json` feature (enabled by default).
///
/// ```rust
/// use rollcall_model::{AttendanceStatus, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&AttendanceStatus::Present).unwrap();
/// assert_eq!(bytes, b"\"present\"");
/// let back: AttendanceStatus = codec.decode(&bytes).unwrap();
/// assert_eq!(back, AttendanceStatus::Present);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(CodecError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(data).map_err(CodecError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{AttendanceRecord, SessionId, StudentId};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_json_codec_record_uses_plain_ids() {
        let session_id = SessionId::generate();
        let record = AttendanceRecord::new(
            session_id,
            StudentId(12),
            Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
        );

        let bytes = JsonCodec.encode(&record).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["student_id"], 12);
        assert_eq!(value["session_id"], session_id.to_string());
        assert_eq!(value["status"], "pending");
    }

    #[test]
    fn test_json_codec_decode_garbage_fails() {
        let result: Result<AttendanceRecord, _> = JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }
}
