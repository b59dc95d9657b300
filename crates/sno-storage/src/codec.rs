use crate::backend::{Result, StorageError};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn encode_value<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StorageError::SerializationError(e.to_string()))
}

pub fn decode_value<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| StorageError::SerializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_unsized_values() {
        let ids: &[u64] = &[3, 1, 4];
        let bytes = encode_value(ids).unwrap();
        assert_eq!(decode_value::<Vec<u64>>(&bytes).unwrap(), vec![3, 1, 4]);

        let label: &str = "supply";
        let bytes = encode_value(label).unwrap();
        assert_eq!(decode_value::<String>(&bytes).unwrap(), "supply");

        assert!(decode_value::<u64>(&[1, 2]).is_err());
    }
}
