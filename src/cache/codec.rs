//! MessagePack value encoding for tiers that store bytes.
//!
//! Struct fields are written by name so that adding a field to an entity does
//! not corrupt older entries; the model version handles real schema breaks.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::error::CacheError;

/// Encode a value for storage.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CacheError> {
    Ok(rmp_serde::to_vec_named(value)?)
}

/// Decode a stored value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CacheError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        id: u64,
        name: String,
        model_version: u16,
    }

    #[derive(Debug, Deserialize)]
    struct Narrow {
        id: u64,
    }

    #[test]
    fn test_named_fields_tolerate_extra_data() {
        let record = Record {
            id: 9,
            name: "nine".into(),
            model_version: 3,
        };
        let bytes = encode(&record).unwrap();

        let narrow: Narrow = decode(&bytes).unwrap();
        assert_eq!(narrow.id, 9);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let result: Result<Record, _> = decode(b"\xc1not msgpack");
        assert!(matches!(result, Err(CacheError::Decode(_))));
    }
}
