use serde::{de::DeserializeOwned, Serialize};

use crate::{codec::PayloadCodec, QueueError, QueueResult};

/// JSON codec for job payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> QueueResult<String> {
        serde_json::to_string(value).map_err(|e| {
            QueueError::serialization(format!(
                "unable to encode {} as json: {}",
                std::any::type_name::<T>(),
                e
            ))
        })
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> QueueResult<T> {
        serde_json::from_str(text).map_err(|e| {
            QueueError::serialization(format!(
                "unable to decode stored payload as {}: {}",
                std::any::type_name::<T>(),
                e
            ))
        })
    }

    fn codec_id(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serializer};
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestJob {
        id: u32,
        name: String,
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("closures cannot be encoded"))
        }
    }

    #[test]
    fn test_json_codec_decodes_what_it_encoded() {
        let codec = JsonCodec;
        let job = TestJob {
            id: 42,
            name: "test job".to_string(),
        };

        let text = codec.encode(&job).unwrap();
        assert_eq!(text, r#"{"id":42,"name":"test job"}"#);

        let decoded: TestJob = codec.decode(&text).unwrap();
        assert_eq!(job, decoded);
    }

    #[test]
    fn test_encode_failure_is_serialization_error() {
        let err = JsonCodec.encode(&Unencodable).unwrap_err();
        assert!(matches!(err, QueueError::Serialization(msg) if msg.contains("closures cannot be encoded")));
    }

    #[test]
    fn test_non_string_map_keys_are_rejected() {
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple keys");
        assert!(matches!(JsonCodec.encode(&map), Err(QueueError::Serialization(_))));
    }

    #[test]
    fn test_decode_failure_names_target_type() {
        let err = JsonCodec.decode::<TestJob>(r#"{"id":"nope"}"#).unwrap_err();
        match err {
            QueueError::Serialization(msg) => assert!(msg.contains("TestJob")),
            other => panic!("expected serialization error, got {:?}", other),
        }
    }

    #[test]
    fn test_codec_id() {
        assert_eq!(JsonCodec.codec_id(), "json");
    }
}
